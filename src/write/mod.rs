//! This module implements packing: archive members in, archive bytes out.
//!
//! Class files are lifted into the symbolic model, their constants gathered into one
//! pool per segment, and every band is written with its default coding in the order
//! the unpacker reads it.

mod attrs;
mod bands;
mod classes;
mod code;
mod lift;
mod pool;
mod segment;
#[cfg(test)]
mod test;

pub use bands::*;
pub use classes::{LocalInnerClasses, PackedClass};
pub use lift::*;
pub use pool::{partition_of, split_signature};
pub use segment::*;

use crate::entry::Entry;
use crate::error::Error;
use crate::options::Options;

use alloc::vec::Vec;
use tracing::debug;

/// The members in archive order: as given, or resources ahead of class files.
fn member_order<'e>(entries: &'e [Entry], options: &Options) -> Vec<&'e Entry> {
    if options.keep_file_order {
        return entries.iter().collect();
    }
    let (classes, resources): (Vec<&Entry>, Vec<&Entry>) = entries.iter().partition(|e| e.is_class());
    return resources.into_iter().chain(classes).collect();
}

/// Split `members` into segments of at most `limit` content bytes each.
/// A member larger than the limit gets a segment of its own.
pub fn split_segments<'e>(members: Vec<&'e Entry>, limit: Option<u64>) -> Vec<Vec<&'e Entry>> {
    let limit = match limit {
        Some(limit) => limit,
        None => return Vec::from([members]),
    };
    let mut segments = Vec::new();
    let mut current: Vec<&Entry> = Vec::new();
    let mut size = 0u64;
    for member in members {
        let len = member.contents.len() as u64;
        if !current.is_empty() && size + len > limit {
            segments.push(core::mem::take(&mut current));
            size = 0;
        }
        size += len;
        current.push(member);
    }
    if !current.is_empty() || segments.is_empty() {
        segments.push(current);
    }
    return segments;
}

/// Pack `entries` into an archive of one or more segments.
pub fn pack(entries: &[Entry], options: &Options) -> Result<Vec<u8>, Error> {
    let layouts = Layouts::new(options)?;
    let segments = split_segments(member_order(entries, options), options.segment_limit);
    let mut out = Vec::new();
    for (n, members) in segments.iter().enumerate() {
        let start = out.len();
        write_segment(members, &layouts, options, &mut out)?;
        debug!(segment = n, members = members.len(), bytes = out.len() - start, "segment packed");
    }
    return Ok(out);
}
