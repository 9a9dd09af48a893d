//! Reading bands: runs of values written with one coding, optionally escaped to another.

use super::err::*;
use crate::codec::{codec_from_specifier, BhsdCodec, Codec, UNSIGNED5};
use crate::error::Corruption;
use crate::options::Limits;

use alloc::vec::Vec;
use tracing::trace;

/// State shared by all band reads of one segment.
///
/// Holds the `band_headers` bytes not yet claimed by codec escapes.
#[derive(Debug, Clone)]
pub struct BandContext<'a> {
    headers: &'a [u8],
    limits: Limits,
}

impl<'a> BandContext<'a> {
    pub fn new(headers: &'a [u8], limits: Limits) -> BandContext<'a> {
        return BandContext { headers, limits };
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Band header bytes left over once all bands are read.
    pub fn remaining_headers(&self) -> usize {
        self.headers.len()
    }
}

/// Make sure a band of `count` values can exist before anything gets allocated for it.
///
/// A count over the configured limit is a resource error. Every value takes at least one
/// byte, so a count larger than the remaining input means the archive is cut short.
pub fn check_count<'a>(input: &'a [u8], ctx: &BandContext<'a>, band: &'static str, count: usize) -> PackResult<'a, ()> {
    if count > ctx.limits.max_band_length {
        return over_limit(input, band, count, ctx.limits.max_band_length);
    }
    if count > input.len() {
        return corrupt(input, Corruption::Truncated { band });
    }
    return Ok((input, ()));
}

/// Read `count` values of `band`, written with `codec` unless the band starts with an escape.
pub fn band<'a>(
    input: &'a [u8],
    ctx: &mut BandContext<'a>,
    band: &'static str,
    codec: BhsdCodec,
    count: usize,
) -> PackResult<'a, Vec<i32>> {
    if count == 0 {
        return Ok((input, Vec::new()));
    }
    let (input, _) = check_count(input, ctx, band, count)?;

    if codec.b() > 1 {
        let (rest, first) = match codec.decode_value(input, 0) {
            Ok(v) => v,
            Err(e) => return codec_failure(input, band, e),
        };
        let l = codec.l() as i64;
        let specifier = if codec.is_signed() && (-256..=-1).contains(&first) {
            Some(-1 - first)
        } else if !codec.is_signed() && (l..=l + 255).contains(&first) {
            Some(first - l)
        } else {
            None
        };
        if let Some(specifier) = specifier {
            let (headers, chosen) = match codec_from_specifier(specifier as i32, ctx.headers, &codec) {
                Ok(v) => v,
                Err(e) => return codec_failure(input, band, e),
            };
            ctx.headers = headers;
            trace!(band, count, codec = %chosen, "escaped band");
            return match chosen.decode_values(rest, count) {
                Ok((rest, values)) => Ok((rest, values)),
                Err(e) => codec_failure(rest, band, e),
            };
        }
    }

    trace!(band, count, codec = %codec, "band");
    return match codec.decode_values(input, count) {
        Ok((rest, values)) => Ok((rest, values)),
        Err(e) => codec_failure(input, band, e),
    };
}

/// Read `count` raw bytes.
pub fn byte_band<'a>(input: &'a [u8], ctx: &BandContext<'a>, band: &'static str, count: usize) -> PackResult<'a, &'a [u8]> {
    let (input, _) = check_count(input, ctx, band, count)?;
    trace!(band, count, "byte band");
    return Ok((&input[count..], &input[..count]));
}

/// Read a band of counts and convert them.
pub fn count_band<'a>(
    input: &'a [u8],
    ctx: &mut BandContext<'a>,
    name: &'static str,
    codec: BhsdCodec,
    count: usize,
) -> PackResult<'a, Vec<usize>> {
    let (rest, values) = band(input, ctx, name, codec, count)?;
    let mut counts = Vec::with_capacity(values.len());
    for v in values {
        counts.push(to_usize_or_err!(input, name, v));
    }
    return Ok((rest, counts));
}

/// Total of a band of counts, checked against the limits.
pub fn sum_counts<'a>(input: &'a [u8], ctx: &BandContext<'a>, band: &'static str, counts: &[usize]) -> PackResult<'a, usize> {
    let mut total: usize = 0;
    for c in counts {
        total = match total.checked_add(*c) {
            Some(t) => t,
            None => return over_limit(input, band, usize::MAX, ctx.limits.max_band_length),
        };
    }
    if total > ctx.limits.max_band_length {
        return over_limit(input, band, total, ctx.limits.max_band_length);
    }
    return Ok((input, total));
}

/// Read access flags for `count` holders, with high words first when `hi` is set.
pub fn flags_band<'a>(
    input: &'a [u8],
    ctx: &mut BandContext<'a>,
    hi_name: &'static str,
    lo_name: &'static str,
    count: usize,
    hi: bool,
) -> PackResult<'a, Vec<u64>> {
    let (input, his) = if hi {
        band(input, ctx, hi_name, UNSIGNED5, count)?
    } else {
        (input, Vec::new())
    };
    let (input, los) = band(input, ctx, lo_name, UNSIGNED5, count)?;
    let flags = los
        .iter()
        .enumerate()
        .map(|(i, lo)| {
            let hi = his.get(i).map(|h| *h as u32 as u64).unwrap_or(0);
            (hi << 32) | (*lo as u32 as u64)
        })
        .collect();
    return Ok((input, flags));
}
