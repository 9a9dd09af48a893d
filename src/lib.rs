#![forbid(unsafe_code)]
//! A crate for packing and unpacking Pack200 archives.
//! Class files are transcoded through a symbolic model, so unpacking reproduces
//! them up to constant pool order; other members travel byte for byte.

#![cfg_attr(not(feature = "std"), no_std)]
#![allow(clippy::needless_return)]

extern crate alloc;

pub mod bytecode;
pub mod classfile;
pub mod codec;
pub mod entry;
pub mod error;
#[cfg(feature = "std")]
pub mod jar;
pub mod layout;
pub mod options;
mod parser;
pub mod read;
pub mod write;

pub use entry::{Entry, EntrySink};
pub use error::{Corruption, Error, PolicyError};
pub use options::{AttributeAction, DeflateHint, Limits, Options};
pub use parser::types::{ArchiveOptions, IcTuple, IC_EXPLICIT};
pub use read::{extract_entry, unpack, unpack_to_vec};
pub use write::pack;
