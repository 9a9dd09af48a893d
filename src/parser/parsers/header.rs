use super::*;

use nom::bytes::complete::{tag, take};
use nom::combinator::cond;

fn cp_number_counts(input: &[u8]) -> PackResult<'_, (usize, usize, usize, usize)> {
    let (input, int) = context("cp_Int_count", header_count("cp_Int_count"))(input)?;
    let (input, float) = context("cp_Float_count", header_count("cp_Float_count"))(input)?;
    let (input, long) = context("cp_Long_count", header_count("cp_Long_count"))(input)?;
    let (input, double) = context("cp_Double_count", header_count("cp_Double_count"))(input)?;
    return Ok((input, (int, float, long, double)));
}

fn cp_counts(input: &[u8], numbers: bool) -> PackResult<'_, CpCounts> {
    let (input, utf8) = context("cp_Utf8_count", header_count("cp_Utf8_count"))(input)?;
    let (input, numbers) = cond(numbers, cp_number_counts)(input)?;
    let (int, float, long, double) = numbers.unwrap_or_default();
    let (input, string) = context("cp_String_count", header_count("cp_String_count"))(input)?;
    let (input, class) = context("cp_Class_count", header_count("cp_Class_count"))(input)?;
    let (input, signature) = context("cp_Signature_count", header_count("cp_Signature_count"))(input)?;
    let (input, descr) = context("cp_Descr_count", header_count("cp_Descr_count"))(input)?;
    let (input, field) = context("cp_Field_count", header_count("cp_Field_count"))(input)?;
    let (input, method) = context("cp_Method_count", header_count("cp_Method_count"))(input)?;
    let (input, imethod) = context("cp_Imethod_count", header_count("cp_Imethod_count"))(input)?;
    return Ok((
        input,
        CpCounts {
            utf8,
            int,
            float,
            long,
            double,
            string,
            class,
            signature,
            descr,
            field,
            method,
            imethod,
        },
    ));
}

fn class_version<'a>(input: &'a [u8], band: &'static str) -> PackResult<'a, u16> {
    let (rest, v) = context(band, coded_value(band, UNSIGNED5))(input)?;
    return match u16::try_from(v) {
        Ok(v) => Ok((rest, v)),
        Err(_) => corrupt(input, Corruption::BadCount { band, value: v }),
    };
}

fn special_formats(input: &[u8]) -> PackResult<'_, (usize, usize)> {
    let (input, band_headers_size) = context("band_headers_size", header_count("band_headers_size"))(input)?;
    let (input, attr_definition_count) =
        context("attr_definition_count", header_count("attr_definition_count"))(input)?;
    return Ok((input, (band_headers_size, attr_definition_count)));
}

/// The archive size, next count, modtime and file count.
fn file_header(input: &[u8]) -> PackResult<'_, FileHeader> {
    let (input, size_hi) = context("archive_size_hi", coded_value("archive_size_hi", UNSIGNED5))(input)?;
    let (input, size_lo) = context("archive_size_lo", coded_value("archive_size_lo", UNSIGNED5))(input)?;
    let (input, next_count) = context("archive_next_count", header_count("archive_next_count"))(input)?;
    let (input, modtime) = context("archive_modtime", coded_value("archive_modtime", UNSIGNED5))(input)?;
    let (input, file_count) = context("file_count", header_count("file_count"))(input)?;
    return Ok((
        input,
        FileHeader {
            archive_size: ((size_hi as u32 as u64) << 32) | size_lo as u32 as u64,
            next_count,
            modtime: modtime as i32,
            file_count,
        },
    ));
}

/// The segment header, up to and including the band headers.
pub fn segment_header(input: &[u8]) -> PackResult<'_, SegmentHeader> {
    let whole = input.len();
    let (input, _) = context("archive_magic", tag(MAGIC))(input)?;
    let (input, minor_version) = context("archive_minver", coded_value("archive_minver", UNSIGNED5))(input)?;
    let (input, major_version) = context("archive_majver", coded_value("archive_majver", UNSIGNED5))(input)?;
    if (major_version, minor_version) != (MAJOR_VERSION as i64, MINOR_VERSION as i64) {
        return corrupt(
            input,
            Corruption::UnsupportedVersion {
                major: major_version as i32,
                minor: minor_version as i32,
            },
        );
    }
    let (input, options) = context("archive_options", coded_value("archive_options", UNSIGNED5))(input)?;
    let options = ArchiveOptions(options as u32);
    if options.0 & ArchiveOptions::UNUSED != 0 {
        return corrupt(input, Corruption::UnknownOptions(options.0 & ArchiveOptions::UNUSED));
    }

    let (input, file_header) = cond(options.has(ArchiveOptions::HAVE_FILE_HEADERS), file_header)(input)?;
    let (input, special) = cond(options.has(ArchiveOptions::HAVE_SPECIAL_FORMATS), special_formats)(input)?;
    let (band_headers_size, attr_definition_count) = special.unwrap_or_default();

    let (input, cp_counts) = cp_counts(input, options.has(ArchiveOptions::HAVE_CP_NUMBERS))?;
    let (input, ic_count) = context("ic_count", header_count("ic_count"))(input)?;
    let (input, default_class_minor) = class_version(input, "default_class_minver")?;
    let (input, default_class_major) = class_version(input, "default_class_majver")?;
    let (input, class_count) = context("class_count", header_count("class_count"))(input)?;
    let (input, band_headers) = context("band_headers", take(band_headers_size))(input)?;
    stage_done("segment header", whole, input);

    return Ok((
        input,
        SegmentHeader {
            minor_version: minor_version as i32,
            major_version: major_version as i32,
            options,
            file_header,
            attr_definition_count,
            cp_counts,
            ic_count,
            default_class_minor,
            default_class_major,
            class_count,
            band_headers,
        },
    ));
}
