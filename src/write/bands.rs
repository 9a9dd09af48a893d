//! Writing bands, the mirror image of `parser::band`.

use crate::codec::{BhsdCodec, UNSIGNED5};
use crate::error::Error;

use alloc::vec::Vec;
use tracing::trace;

/// Collects the bands of one segment after the header.
///
/// Band headers stay empty as long as every band uses its default coding.
#[derive(Debug, Default)]
pub struct BandWriter {
    body: Vec<u8>,
    headers: Vec<u8>,
}

/// Whether a reader would take `first` for a codec escape.
fn looks_like_escape(codec: &BhsdCodec, first: i64) -> bool {
    if codec.b() <= 1 {
        return false;
    }
    let first = codec.wrap(first);
    if codec.is_signed() {
        return (-256..=-1).contains(&first);
    }
    let l = codec.l() as i64;
    return (l..=l + 255).contains(&first);
}

/// The escape value that selects the default coding again.
fn default_escape(codec: &BhsdCodec) -> i64 {
    if codec.is_signed() {
        return -1;
    }
    return codec.l() as i64;
}

/// Append `values` written with `codec` to `out`, delta codings starting from zero.
pub fn encode_values(codec: &BhsdCodec, values: &[i64], out: &mut Vec<u8>) -> Result<(), Error> {
    let mut last = 0;
    for v in values {
        codec.encode_value(*v, last, out)?;
        last = if codec.is_delta() { codec.wrap(*v) } else { 0 };
    }
    return Ok(());
}

impl BandWriter {
    pub fn new() -> BandWriter {
        return BandWriter::default();
    }

    /// Write a band with its default coding.
    ///
    /// A band whose first value would read as an escape starts with an escape
    /// back to the default coding.
    pub fn band(&mut self, name: &'static str, codec: BhsdCodec, values: &[i64]) -> Result<(), Error> {
        if let Some(first) = values.first() {
            if looks_like_escape(&codec, *first) {
                trace!(band = name, count = values.len(), "band starts with an escape");
                codec.encode_value(default_escape(&codec), 0, &mut self.body)?;
            }
        }
        trace!(band = name, count = values.len(), codec = %codec, "band");
        return encode_values(&codec, values, &mut self.body);
    }

    /// A band of `usize` values, typically counts or indexes.
    pub fn counts(&mut self, name: &'static str, codec: BhsdCodec, values: &[usize]) -> Result<(), Error> {
        let values: Vec<i64> = values.iter().map(|v| *v as i64).collect();
        return self.band(name, codec, &values);
    }

    /// A band of indexes where zero stands for none.
    pub fn nullable(&mut self, name: &'static str, codec: BhsdCodec, values: &[Option<usize>]) -> Result<(), Error> {
        let values: Vec<i64> = values.iter().map(|v| v.map(|i| i as i64 + 1).unwrap_or(0)).collect();
        return self.band(name, codec, &values);
    }

    /// Access flags, high words first when `hi` is set.
    pub fn flags(&mut self, hi_name: &'static str, lo_name: &'static str, flags: &[u64], hi: bool) -> Result<(), Error> {
        if hi {
            let his: Vec<i64> = flags.iter().map(|f| (*f >> 32) as u32 as i32 as i64).collect();
            self.band(hi_name, UNSIGNED5, &his)?;
        }
        let los: Vec<i64> = flags.iter().map(|f| *f as u32 as i32 as i64).collect();
        return self.band(lo_name, UNSIGNED5, &los);
    }

    /// Raw bytes that are not coded.
    pub fn bytes(&mut self, name: &'static str, bytes: &[u8]) {
        trace!(band = name, count = bytes.len(), "byte band");
        self.body.extend_from_slice(bytes);
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        return self.body.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.body.is_empty();
    }

    /// The band headers and the bands.
    pub fn finish(self) -> (Vec<u8>, Vec<u8>) {
        return (self.headers, self.body);
    }
}
