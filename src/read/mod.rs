//! This module implements unpacking: archive bytes in, archive members out.
//!
//! Each segment is read band group by band group, materialized into class models,
//! written out as class files and flushed to the sink before the next one is read.

mod class;
mod code;
mod decode;
mod iter;
mod segment;
mod simplistic;
#[cfg(test)]
mod test;

pub use class::*;
pub use code::*;
pub use decode::*;
pub use iter::*;
pub use segment::*;
pub use simplistic::*;

use crate::entry::EntrySink;
use crate::error::{Corruption, Error};
use crate::options::Options;

use tracing::debug;

/// Unpack every segment of `input` into `sink`.
///
/// Members of a segment reach the sink once the whole segment has been read.
/// On error, members of earlier segments stay where they are.
pub fn unpack<S: EntrySink>(input: &[u8], options: &Options, sink: &mut S) -> Result<(), Error> {
    if input.is_empty() {
        return Err(Error::corrupt(Corruption::Truncated { band: "archive_magic" }));
    }
    let segments = SegmentIterator::new(input, options.limits);
    for (n, segment) in segments.enumerate() {
        let segment = segment?;
        let classes = materialize_classes(&segment)?;
        debug!(stage = Stage::Materialize.name(), segment = n, classes = classes.len(), "classes materialized");
        let entries = segment_entries(&segment, classes, options)?;
        let count = entries.len();
        for entry in entries {
            sink.accept(entry).map_err(Error::Sink)?;
        }
        debug!(stage = Stage::Flush.name(), segment = n, entries = count, "segment flushed");
    }
    return Ok(());
}
