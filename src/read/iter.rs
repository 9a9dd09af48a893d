use super::segment::{read_segment, Segment};
use crate::error::Error;
use crate::options::Limits;

use core::iter::Iterator;

/// Iterates over the segments of an archive, reading each one's bands when asked for it.
///
/// Stops after the first error.
#[derive(Debug, Clone)]
pub struct SegmentIterator<'a> {
    whole: &'a [u8],
    rest: &'a [u8],
    limits: Limits,
    failed: bool,
}

impl<'a> SegmentIterator<'a> {
    /// Create a new iterator over the segments in `input`.
    pub fn new(input: &'a [u8], limits: Limits) -> SegmentIterator<'a> {
        SegmentIterator {
            whole: input,
            rest: input,
            limits,
            failed: false,
        }
    }

    /// Byte offset of the next segment.
    pub fn offset(&self) -> usize {
        return self.whole.len() - self.rest.len();
    }
}

impl<'a> Iterator for SegmentIterator<'a> {
    type Item = Result<Segment<'a>, Error>;
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.rest.is_empty() {
            return None;
        }
        match read_segment(self.whole, self.rest, &self.limits) {
            Ok((rest, segment)) => {
                self.rest = rest;
                return Some(Ok(segment));
            }
            Err(e) => {
                self.failed = true;
                return Some(Err(e));
            }
        }
    }
}
