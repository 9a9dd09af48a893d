//! Parsers for the band groups of a segment, in the order they appear.

mod header;
pub use header::*;
mod cp;
pub use cp::*;
mod attr_defs;
pub use attr_defs::*;
mod ic;
pub use ic::*;
mod attrs;
pub use attrs::*;
mod classes;
pub use classes::*;
mod bytecode;
pub use bytecode::*;
mod files;
pub use files::*;
#[cfg(test)]
mod test;

use super::band::*;
use super::err::*;
use super::types::*;
use crate::codec::{BhsdCodec, UNSIGNED5};
use crate::error::Corruption;

use alloc::vec::Vec;
use nom::error::context;
use tracing::debug;

/// A single value outside of any band, as the segment header has them.
pub fn coded_value<'a>(band: &'static str, codec: BhsdCodec) -> impl Fn(&'a [u8]) -> PackResult<'a, i64> {
    move |input: &'a [u8]| {
        return match codec.decode_value(input, 0) {
            Ok((rest, value)) => Ok((rest, value)),
            Err(e) => codec_failure(input, band, e),
        };
    }
}

/// A header count.
pub fn header_count<'a>(band: &'static str) -> impl Fn(&'a [u8]) -> PackResult<'a, usize> {
    move |input: &'a [u8]| {
        let (rest, value) = coded_value(band, UNSIGNED5)(input)?;
        return Ok((rest, to_usize_or_err!(input, band, value)));
    }
}

/// Check that a band value indexes a partition of length `len`.
pub fn check_index<'a>(input: &'a [u8], partition: &'static str, value: i64, len: usize) -> PackResult<'a, usize> {
    if value < 0 || value >= len as i64 {
        return corrupt(
            input,
            Corruption::IndexOutOfRange {
                partition,
                index: value,
                len,
            },
        );
    }
    return Ok((input, value as usize));
}

/// A band of indexes into a partition of length `len`.
pub fn index_band<'a>(
    input: &'a [u8],
    ctx: &mut BandContext<'a>,
    name: &'static str,
    codec: BhsdCodec,
    count: usize,
    partition: &'static str,
    len: usize,
) -> PackResult<'a, Vec<usize>> {
    let (rest, values) = context(name, |i| band(i, ctx, name, codec, count))(input)?;
    let mut indexes = Vec::with_capacity(values.len());
    for v in values {
        let (_, i) = check_index(input, partition, v as i64, len)?;
        indexes.push(i);
    }
    return Ok((rest, indexes));
}

/// A band of indexes where zero means none and `n` means entry `n - 1`.
pub fn nullable_index_band<'a>(
    input: &'a [u8],
    ctx: &mut BandContext<'a>,
    name: &'static str,
    codec: BhsdCodec,
    count: usize,
    partition: &'static str,
    len: usize,
) -> PackResult<'a, Vec<Option<usize>>> {
    let (rest, values) = context(name, |i| band(i, ctx, name, codec, count))(input)?;
    let mut indexes = Vec::with_capacity(values.len());
    for v in values {
        if v == 0 {
            indexes.push(None);
        } else {
            let (_, i) = check_index(input, partition, v as i64 - 1, len)?;
            indexes.push(Some(i));
        }
    }
    return Ok((rest, indexes));
}

/// Log the end of a band group.
fn stage_done(stage: &'static str, whole: usize, rest: &[u8]) {
    debug!(stage, consumed = whole - rest.len(), "band group read");
}
