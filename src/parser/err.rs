use crate::codec::CodecError;
use crate::error::Corruption;

use alloc::vec::Vec;
use nom::error::*;

/// The types of errors that may be returned by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum PackParserErrorKind<I> {
    Nom(I, nom::error::ErrorKind),
    Corrupt(Corruption),
    /// A declared count larger than the configured limit.
    Limit {
        band: &'static str,
        requested: usize,
        limit: usize,
    },
}

/// The error type returned by all parsers.
#[derive(Debug, Clone, PartialEq)]
pub struct PackParserError<I> {
    /// What kind of error this is
    pub kind: PackParserErrorKind<I>,
    /// The remaining input where the error was raised, if known.
    pub input: Option<I>,
    /// All the context we have accumulated from previous errors.
    pub ctx: Vec<(I, &'static str)>,
}

impl<I: Clone> ParseError<I> for PackParserError<I> {
    fn from_error_kind(input: I, kind: ErrorKind) -> Self {
        return PackParserError::at(input.clone(), PackParserErrorKind::Nom(input, kind));
    }

    fn append(_: I, _: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<I> PackParserError<I> {
    /// Creates a new error.
    pub fn new(kind: PackParserErrorKind<I>) -> Self {
        return PackParserError {
            kind,
            input: None,
            ctx: Vec::new(),
        };
    }

    /// Creates a new error raised at `input`.
    pub fn at(input: I, kind: PackParserErrorKind<I>) -> Self {
        return PackParserError {
            kind,
            input: Some(input),
            ctx: Vec::new(),
        };
    }
}

impl<I> ContextError<I> for PackParserError<I> {
    fn add_context(input: I, ctx: &'static str, mut other: Self) -> Self {
        other.ctx.push((input, ctx));
        return other;
    }
}

/// Error type that all band parsers return.
pub type PackResult<'a, T> = nom::IResult<&'a [u8], T, PackParserError<&'a [u8]>>;

/// Fail with `cause` at `input`. Corruption is never recovered from, so this is a `Failure`.
pub fn corrupt<'a, T>(input: &'a [u8], cause: Corruption) -> PackResult<'a, T> {
    return Err(nom::Err::Failure(PackParserError::at(
        input,
        PackParserErrorKind::Corrupt(cause),
    )));
}

/// Fail because `band` would need more than `limit` values.
pub fn over_limit<'a, T>(input: &'a [u8], band: &'static str, requested: usize, limit: usize) -> PackResult<'a, T> {
    return Err(nom::Err::Failure(PackParserError::at(
        input,
        PackParserErrorKind::Limit {
            band,
            requested,
            limit,
        },
    )));
}

/// Fail with a codec problem in `band`.
pub fn codec_failure<'a, T>(input: &'a [u8], band: &'static str, cause: CodecError) -> PackResult<'a, T> {
    if cause == CodecError::UnexpectedEof {
        return corrupt(input, Corruption::Truncated { band });
    }
    return corrupt(input, Corruption::Codec { band, cause });
}

/// Convert a signed band value to `usize` or fail with a bad count.
macro_rules! to_usize_or_err {
    ($input:expr, $band:expr, $x:expr) => {{
        let value = $x;
        match usize::try_from(value) {
            Ok(res) => res,
            Err(_) => {
                return $crate::parser::corrupt(
                    $input,
                    $crate::error::Corruption::BadCount {
                        band: $band,
                        value: value as i64,
                    },
                )
            }
        }
    }};
}
pub(crate) use to_usize_or_err;
