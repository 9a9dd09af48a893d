//! This module provides the top-level error type for this crate.

use crate::classfile::ClassFileError;
use crate::codec::CodecError;
use crate::layout::{AttributeContext, LayoutError};
use crate::parser::{PackParserError, PackParserErrorKind};

use alloc::string::String;
use alloc::vec::Vec;
use core::convert::From;
use core::fmt;

/// Ways in which the bands of a segment can contradict each other.
#[derive(Debug, Clone, PartialEq)]
pub enum Corruption {
    BadMagic,
    /// The input ended inside a band.
    Truncated { band: &'static str },
    UnsupportedVersion { major: i32, minor: i32 },
    /// `archive_options` bits this format version does not define.
    UnknownOptions(u32),
    Codec { band: &'static str, cause: CodecError },
    /// A count, size or length that is negative or does not fit.
    BadCount { band: &'static str, value: i64 },
    IndexOutOfRange { partition: &'static str, index: i64, len: usize },
    BadLayout { name: String, cause: LayoutError },
    DuplicateLayout { context: AttributeContext, index: usize },
    UndefinedLayout { context: AttributeContext, index: usize },
    /// A block of operand bands ran out while handing out values.
    BandExhausted { band: &'static str },
    BadOpcode { opcode: u8 },
    BadBranch { target: i64 },
    BadDescriptor(String),
    /// A class name, signature or string that is not valid UTF-16.
    BadName { partition: &'static str, index: usize },
    /// A `_super` form in a class without a superclass, or an `_init` form without a preceding `new`.
    MissingImplicitClass { opcode: u8 },
    /// An inner class local entry naming a class without a global entry.
    MissingInnerClass(String),
    /// A constant loaded by `ldc` that does not fit an 8-bit index.
    LdcIndexTooLarge { index: usize },
    /// A value too large for the class file field it ends up in.
    ValueTooLarge { what: &'static str, value: i64 },
    /// More class stubs in the file bands than classes in the segment.
    TooManyClassStubs,
    /// Unpacked code does not fit a class file.
    CodeTooLarge,
}

impl fmt::Display for Corruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Corruption::BadMagic => write!(f, "not a pack200 segment"),
            Corruption::Truncated { band } => write!(f, "input ends inside {}", band),
            Corruption::UnsupportedVersion { major, minor } => {
                write!(f, "unsupported archive version {}.{}", major, minor)
            }
            Corruption::UnknownOptions(bits) => write!(f, "unknown archive option bits {:#x}", bits),
            Corruption::Codec { band, cause } => write!(f, "{}: {}", band, cause),
            Corruption::BadCount { band, value } => write!(f, "{}: bad count {}", band, value),
            Corruption::IndexOutOfRange {
                partition,
                index,
                len,
            } => write!(f, "{} index {} out of range (length {})", partition, index, len),
            Corruption::BadLayout { name, cause } => write!(f, "attribute {}: {}", name, cause),
            Corruption::DuplicateLayout { context, index } => {
                write!(f, "{} attribute layout {} defined twice", context.name(), index)
            }
            Corruption::UndefinedLayout { context, index } => {
                write!(f, "{} attribute layout {} is not defined", context.name(), index)
            }
            Corruption::BandExhausted { band } => write!(f, "{} ran out of values", band),
            Corruption::BadOpcode { opcode } => write!(f, "bad packed opcode {}", opcode),
            Corruption::BadBranch { target } => write!(f, "branch to instruction {} outside the code", target),
            Corruption::BadDescriptor(d) => write!(f, "bad descriptor {}", d),
            Corruption::BadName { partition, index } => write!(f, "{} entry {} is not valid UTF-16", partition, index),
            Corruption::MissingImplicitClass { opcode } => {
                write!(f, "packed opcode {} has no class to refer to", opcode)
            }
            Corruption::MissingInnerClass(name) => write!(f, "no inner class entry for {}", name),
            Corruption::LdcIndexTooLarge { index } => {
                write!(f, "ldc constant at index {} does not fit a byte", index)
            }
            Corruption::ValueTooLarge { what, value } => write!(f, "{} {} is too large", what, value),
            Corruption::TooManyClassStubs => write!(f, "more class stubs than classes"),
            Corruption::CodeTooLarge => write!(f, "method code exceeds 65535 bytes"),
        }
    }
}

/// Errors raised because the configured options said so.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyError {
    /// An attribute whose action is `error`.
    Attribute { context: AttributeContext, name: String, class: String },
    /// A class using something the archive format cannot carry, with the `error` action.
    Unsupported { class: String, feature: String },
    /// An option key or value that makes no sense.
    BadOption { key: String, value: String },
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::Attribute {
                context,
                name,
                class,
            } => write!(f, "{} attribute {} in {} is configured as an error", context.name(), name, class),
            PolicyError::Unsupported { class, feature } => {
                write!(f, "{} uses {}, which cannot be packed", class, feature)
            }
            PolicyError::BadOption { key, value } => write!(f, "bad option {}={}", key, value),
        }
    }
}

/// The top-level error type for this crate.
#[derive(Debug)]
pub enum Error {
    /// The archive is malformed.
    Corrupt {
        /// Byte offset into the input at which the problem was noticed, when known.
        offset: Option<usize>,
        cause: Corruption,
        /// Bands and stages that were being read, innermost first.
        context: Vec<&'static str>,
    },
    /// A declared size exceeds what the input or the configured limits allow.
    ResourceLimit {
        band: &'static str,
        requested: usize,
        limit: usize,
    },
    Policy(PolicyError),
    ClassFile(ClassFileError),
    Codec(CodecError),
    Layout(LayoutError),
    /// The output sink refused an entry.
    Sink(String),
    /// No archive member has the requested name.
    NoSuchEntry(String),
    #[cfg(feature = "std")]
    Io(std::io::Error),
    #[cfg(feature = "std")]
    Jar(zip::result::ZipError),
}

impl Error {
    /// Convert a parser error, computing its offset within `whole`.
    pub fn from_parser(whole: &[u8], e: PackParserError<&[u8]>) -> Error {
        let offset = e.input.map(|rest| whole.len().saturating_sub(rest.len()));
        let context = e.ctx.iter().map(|(_, c)| *c).collect();
        match e.kind {
            PackParserErrorKind::Limit {
                band,
                requested,
                limit,
            } => {
                return Error::ResourceLimit {
                    band,
                    requested,
                    limit,
                }
            }
            PackParserErrorKind::Corrupt(cause) => {
                return Error::Corrupt {
                    offset,
                    cause,
                    context,
                }
            }
            PackParserErrorKind::Nom(rest, kind) => {
                let offset = Some(whole.len().saturating_sub(rest.len()));
                let band = context.first().copied().unwrap_or("segment");
                let cause = match kind {
                    nom::error::ErrorKind::Tag => Corruption::BadMagic,
                    _ => Corruption::Truncated { band },
                };
                return Error::Corrupt {
                    offset,
                    cause,
                    context,
                };
            }
        }
    }

    /// A corruption noticed after all bands were read.
    pub fn corrupt(cause: Corruption) -> Error {
        return Error::Corrupt {
            offset: None,
            cause,
            context: Vec::new(),
        };
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Corrupt {
                offset,
                cause,
                context,
            } => {
                write!(f, "corrupt archive: {}", cause)?;
                if let Some(offset) = offset {
                    write!(f, " at byte {}", offset)?;
                }
                for c in context {
                    write!(f, ", in {}", c)?;
                }
                return Ok(());
            }
            Error::ResourceLimit {
                band,
                requested,
                limit,
            } => write!(f, "{} declares {} values, more than the limit of {}", band, requested, limit),
            Error::Policy(e) => write!(f, "{}", e),
            Error::ClassFile(e) => write!(f, "{}", e),
            Error::Codec(e) => write!(f, "{}", e),
            Error::Layout(e) => write!(f, "{}", e),
            Error::Sink(e) => write!(f, "output rejected an entry: {}", e),
            Error::NoSuchEntry(name) => write!(f, "no member named {}", name),
            #[cfg(feature = "std")]
            Error::Io(e) => write!(f, "{}", e),
            #[cfg(feature = "std")]
            Error::Jar(e) => write!(f, "{}", e),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl From<Corruption> for Error {
    fn from(cause: Corruption) -> Self {
        return Error::corrupt(cause);
    }
}

impl From<PolicyError> for Error {
    fn from(e: PolicyError) -> Self {
        return Error::Policy(e);
    }
}

impl From<ClassFileError> for Error {
    fn from(e: ClassFileError) -> Self {
        return Error::ClassFile(e);
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        return Error::Codec(e);
    }
}

impl From<LayoutError> for Error {
    fn from(e: LayoutError) -> Self {
        return Error::Layout(e);
    }
}

#[cfg(feature = "std")]
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        return Error::Io(e);
    }
}

#[cfg(feature = "std")]
impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        return Error::Jar(e);
    }
}
