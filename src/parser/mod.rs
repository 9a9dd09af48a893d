//! Reading the bands of a segment.
//!
//! Parsers take the remaining input and return the rest, nom style.
//! Every band group gets the [`BandContext`] of its segment, which holds the
//! band headers used by escaped bands and the allocation limits.

mod band;
pub use band::*;
mod err;
pub use err::*;
pub mod parsers;
pub mod types;
