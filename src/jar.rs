//! JAR files on either side of the transcoder, and gzip-wrapped archives.

use crate::entry::{Entry, EntrySink};
use crate::error::Error;
use crate::options::Options;

use alloc::borrow::Cow;
use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use flate2::read::GzDecoder;
use std::io::{Cursor, Read, Seek, Write};
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const SECONDS_PER_DAY: i64 = 86_400;

/// Days since 1970-01-01 of a proleptic Gregorian date.
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = year.div_euclid(400);
    let year_of_era = year - era * 400;
    let month_index = (month + 9) % 12;
    let day_of_year = (153 * month_index + 2) / 5 + day - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    return era * 146_097 + day_of_era - 719_468;
}

fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let days = days + 719_468;
    let era = days.div_euclid(146_097);
    let day_of_era = days - era * 146_097;
    let year_of_era = (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let month_index = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * month_index + 2) / 5 + 1;
    let month = if month_index < 10 { month_index + 3 } else { month_index - 9 };
    let year = year_of_era + era * 400 + if month <= 2 { 1 } else { 0 };
    return (year, month, day);
}

/// Seconds since the epoch of a DOS timestamp, taken as UTC.
pub fn dos_to_epoch(time: &DateTime) -> i32 {
    let days = days_from_civil(time.year() as i64, time.month() as i64, time.day() as i64);
    let seconds = days * SECONDS_PER_DAY + time.hour() as i64 * 3600 + time.minute() as i64 * 60 + time.second() as i64;
    return seconds as i32;
}

/// The DOS timestamp of `seconds` since the epoch, clamped to what DOS can express.
pub fn epoch_to_dos(seconds: i32) -> DateTime {
    let seconds = seconds as i64;
    let (year, month, day) = civil_from_days(seconds.div_euclid(SECONDS_PER_DAY));
    let time = seconds.rem_euclid(SECONDS_PER_DAY);
    if !(1980..=2107).contains(&year) {
        return DateTime::default();
    }
    return DateTime::from_date_and_time(
        year as u16,
        month as u8,
        day as u8,
        (time / 3600) as u8,
        (time / 60 % 60) as u8,
        (time % 60) as u8,
    )
    .unwrap_or_default();
}

/// Every member of the JAR file `bytes`, directories included, in directory order.
pub fn read_jar(bytes: &[u8]) -> Result<Vec<Entry>, Error> {
    let mut jar = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::with_capacity(jar.len());
    for i in 0..jar.len() {
        let mut file = jar.by_index(i)?;
        let mut contents = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut contents)?;
        let mut entry = Entry::new(file.name(), contents);
        entry.modtime = dos_to_epoch(&file.last_modified());
        entry.deflate_hint = file.compression() != CompressionMethod::Stored;
        entries.push(entry);
    }
    debug!(entries = entries.len(), "jar read");
    return Ok(entries);
}

/// An [`EntrySink`] that writes members into a JAR file, deflating those hinted so.
pub struct JarSink<W: Write + Seek> {
    writer: ZipWriter<W>,
}

impl<W: Write + Seek> JarSink<W> {
    pub fn new(inner: W) -> JarSink<W> {
        return JarSink {
            writer: ZipWriter::new(inner),
        };
    }

    fn write(&mut self, entry: &Entry) -> Result<(), Error> {
        let method = if entry.deflate_hint {
            CompressionMethod::Deflated
        } else {
            CompressionMethod::Stored
        };
        let options = FileOptions::default()
            .compression_method(method)
            .last_modified_time(epoch_to_dos(entry.modtime));
        if entry.name.ends_with('/') && entry.contents.is_empty() {
            self.writer.add_directory(entry.name.as_str(), options)?;
            return Ok(());
        }
        self.writer.start_file(entry.name.as_str(), options)?;
        self.writer.write_all(&entry.contents)?;
        return Ok(());
    }

    /// Write the central directory and hand back the output.
    pub fn finish(mut self) -> Result<W, Error> {
        return Ok(self.writer.finish()?);
    }
}

impl<W: Write + Seek> EntrySink for JarSink<W> {
    fn accept(&mut self, entry: Entry) -> Result<(), String> {
        return self.write(&entry).map_err(|e| format!("{}: {}", entry.name, e));
    }
}

/// Write `entries` as a JAR file.
pub fn write_jar(entries: &[Entry]) -> Result<Vec<u8>, Error> {
    let mut sink = JarSink::new(Cursor::new(Vec::new()));
    for entry in entries {
        sink.write(entry)?;
    }
    return Ok(sink.finish()?.into_inner());
}

/// `input`, or what it decompresses to if it is gzip data.
pub fn gunzip(input: &[u8]) -> Result<Cow<'_, [u8]>, Error> {
    if !input.starts_with(&GZIP_MAGIC) {
        return Ok(Cow::Borrowed(input));
    }
    let mut out = Vec::new();
    GzDecoder::new(input).read_to_end(&mut out)?;
    debug!(compressed = input.len(), bytes = out.len(), "gzip unwrapped");
    return Ok(Cow::Owned(out));
}

/// Pack the JAR file `jar`.
pub fn pack_jar(jar: &[u8], options: &Options) -> Result<Vec<u8>, Error> {
    return crate::write::pack(&read_jar(jar)?, options);
}

/// Unpack `archive`, gzip-wrapped or not, into a JAR file.
pub fn unpack_jar(archive: &[u8], options: &Options) -> Result<Vec<u8>, Error> {
    let input = gunzip(archive)?;
    let mut sink = JarSink::new(Cursor::new(Vec::new()));
    crate::read::unpack(&input, options, &mut sink)?;
    return Ok(sink.finish()?.into_inner());
}
