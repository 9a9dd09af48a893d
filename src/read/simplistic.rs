//! This module provides a "simplistic" API for unpacking archives.
//!
//! It trades off precise control for ease of use.

use super::unpack;
use crate::entry::Entry;
use crate::error::Error;
use crate::options::Options;

use alloc::string::String;
use alloc::vec::Vec;

/// Unpack every member of `archive_data` with the default options.
pub fn unpack_to_vec(archive_data: &[u8]) -> Result<Vec<Entry>, Error> {
    let mut entries = Vec::new();
    unpack(archive_data, &Options::default(), &mut entries)?;
    return Ok(entries);
}

/// Unpack the member called `name`.
///
/// This materializes the whole archive, so it's not very efficient.
pub fn extract_entry(name: &str, archive_data: &[u8]) -> Result<Entry, Error> {
    return match unpack_to_vec(archive_data)?.into_iter().find(|e| e.name == name) {
        Some(entry) => Ok(entry),
        None => Err(Error::NoSuchEntry(String::from(name))),
    };
}
