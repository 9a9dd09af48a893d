//! The Pack200 integer codings.
//!
//! Every band is a sequence of `i32` values written with a `(B,H,S,D)` coding.
//! Bands may switch to a run coding or a population coding;
//! those are selected through codec specifiers, described in `canonical`.

mod bhsd;
pub use bhsd::*;
mod canonical;
pub use canonical::*;
mod population;
pub use population::*;
mod run;
pub use run::*;
#[cfg(test)]
mod test;

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

/// Result of a decoding step: the remaining input and the decoded value(s).
pub type CodecResult<'a, T> = Result<(&'a [u8], T), CodecError>;

/// The main interface trait for other code to use.
///
/// All codecs must implement it.
pub trait Codec {
    /// Decode `n` values from the start of `input`.
    ///
    /// Delta codings start from a previous value of zero.
    fn decode_values<'a>(&self, input: &'a [u8], n: usize) -> CodecResult<'a, Vec<i32>>;
}

/// All codings a band can be written in.
#[derive(Debug, Clone, PartialEq)]
pub enum Codecs {
    Bhsd(BhsdCodec),
    Run(Box<RunCodec>),
    Population(Box<PopulationCodec>),
}

impl Codec for Codecs {
    fn decode_values<'a>(&self, input: &'a [u8], n: usize) -> CodecResult<'a, Vec<i32>> {
        match self {
            Codecs::Bhsd(c) => return c.decode_values(input, n),
            Codecs::Run(c) => return c.decode_values(input, n),
            Codecs::Population(c) => return c.decode_values(input, n),
        }
    }
}

impl From<BhsdCodec> for Codecs {
    fn from(c: BhsdCodec) -> Self {
        return Codecs::Bhsd(c);
    }
}

impl fmt::Display for Codecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codecs::Bhsd(c) => write!(f, "{}", c),
            Codecs::Run(c) => write!(f, "run(k={}, {}, {})", c.k(), c.a(), c.b()),
            Codecs::Population(c) => write!(f, "population({}, {})", c.favoured_codec(), c.unfavoured_codec()),
        }
    }
}

/// The top-level codec error type.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// No `(B,H,S,D)` coding has these parameters.
    InvalidParameters { b: u8, h: u16, s: u8, d: bool },
    /// A codec specifier outside of 0..=188.
    InvalidSpecifier(i32),
    /// The input ended inside a value.
    UnexpectedEof,
    /// The band headers ended inside a codec specifier.
    MissingSpecifierBytes,
    /// A value that the coding cannot represent.
    ValueOutOfRange { value: i64, codec: BhsdCodec },
    /// A run coding where both halves use the default codec.
    RunBothDefault,
    /// Population codings favour a value at most once per band value.
    TooManyFavoured { n: usize },
    /// A population token naming a favoured value that does not exist.
    BadToken { token: i32, k: usize },
    /// No token coding fits the number of favoured values.
    NoTokenCodec { k: usize },
    /// This part of a composite coding needs to decode a single value at a time.
    NotSingleValue,
    /// Codec specifiers nest more than `MAX_SPECIFIER_DEPTH` levels.
    NestingTooDeep,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::InvalidParameters { b, h, s, d } => {
                write!(f, "invalid coding parameters ({},{},{},{})", b, h, s, *d as u8)
            }
            CodecError::InvalidSpecifier(v) => write!(f, "invalid codec specifier {}", v),
            CodecError::UnexpectedEof => write!(f, "input ended inside a coded value"),
            CodecError::MissingSpecifierBytes => write!(f, "band headers ended inside a codec specifier"),
            CodecError::ValueOutOfRange { value, codec } => {
                write!(f, "value {} cannot be written with {}", value, codec)
            }
            CodecError::RunBothDefault => write!(f, "run coding with both halves defaulted"),
            CodecError::TooManyFavoured { n } => {
                write!(f, "population coding favours more than {} values", n)
            }
            CodecError::BadToken { token, k } => {
                write!(f, "population token {} with only {} favoured values", token, k)
            }
            CodecError::NoTokenCodec { k } => write!(f, "no token coding for {} favoured values", k),
            CodecError::NotSingleValue => write!(f, "composite coding used where a single value coding is needed"),
            CodecError::NestingTooDeep => write!(f, "codec specifiers nest too deeply"),
        }
    }
}
