//! Structures that make up Pack200 segments.
//! These are "low-level", meaning that they reflect how data is stored in the bands,
//! with references still held as partition indexes.

mod attr;
mod class;
mod code;
mod cp;
mod file;
mod header;
mod ic;
pub use attr::*;
pub use class::*;
pub use code::*;
pub use cp::*;
pub use file::*;
pub use header::*;
pub use ic::*;
