//! Reading every band group of one segment.

use crate::codec::UNSIGNED5;
use crate::error::{Corruption, Error};
use crate::options::Limits;
use crate::parser::parsers::*;
use crate::parser::types::*;
use crate::parser::{BandContext, PackResult};

use alloc::vec::Vec;
use tracing::{debug, warn};

/// The stages a segment goes through while being unpacked.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    HeaderRead,
    ConstantPoolRead,
    AttributeDefsRead,
    ClassBandsRead,
    BytecodeRead,
    FileBandsRead,
    Materialize,
    Flush,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::HeaderRead => "header",
            Stage::ConstantPoolRead => "constant pool",
            Stage::AttributeDefsRead => "attribute definitions",
            Stage::ClassBandsRead => "class bands",
            Stage::BytecodeRead => "byte codes",
            Stage::FileBandsRead => "file bands",
            Stage::Materialize => "materialize",
            Stage::Flush => "flush",
        }
    }
}

/// Record that `stage` is complete.
pub(crate) fn reached(stage: Stage, offset: usize) {
    debug!(stage = stage.name(), offset, "segment stage reached");
}

/// All bands of one segment, with references still held as indexes.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment<'a> {
    pub header: SegmentHeader<'a>,
    pub pool: ConstantPool,
    pub definitions: AttributeDefinitions,
    pub inner_classes: Vec<IcTuple>,
    pub classes: ClassBands,
    pub byte_codes: ByteCodes<'a>,
    pub files: Vec<FileBands<'a>>,
}

/// Turn a parser result into the crate's error type, with offsets into `whole`.
fn finish<'a, T>(whole: &'a [u8], res: PackResult<'a, T>) -> Result<(&'a [u8], T), Error> {
    match res {
        Ok(ok) => return Ok(ok),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => return Err(Error::from_parser(whole, e)),
        Err(nom::Err::Incomplete(_)) => return Err(Error::corrupt(Corruption::Truncated { band: "segment" })),
    }
}

fn coded_len(value: i64) -> usize {
    let mut out = Vec::with_capacity(5);
    return match UNSIGNED5.encode_value(value, 0, &mut out) {
        Ok(()) => out.len(),
        Err(_) => 0,
    };
}

/// Bytes from the magic number up to and including `archive_size_lo`.
pub fn size_prefix_len(header: &SegmentHeader, archive_size: u64) -> usize {
    return MAGIC.len()
        + coded_len(header.minor_version as i64)
        + coded_len(header.major_version as i64)
        + coded_len(header.options.0 as i64)
        + coded_len((archive_size >> 32) as i64)
        + coded_len((archive_size & 0xFFFF_FFFF) as i64);
}

fn offset(whole: &[u8], rest: &[u8]) -> usize {
    return whole.len() - rest.len();
}

/// Read the segment at the start of `input`, which lies within `whole`.
/// Returns the input after the segment.
pub fn read_segment<'a>(whole: &'a [u8], input: &'a [u8], limits: &Limits) -> Result<(&'a [u8], Segment<'a>), Error> {
    let start = input;
    let (input, header) = finish(whole, segment_header(input))?;
    reached(Stage::HeaderRead, offset(whole, input));
    let mut ctx = BandContext::new(header.band_headers, *limits);

    let (input, pool) = finish(whole, cp_bands(input, &mut ctx, &header.cp_counts))?;
    reached(Stage::ConstantPoolRead, offset(whole, input));

    let mut definitions = AttributeDefinitions::predefined()?;
    let (input, ()) = finish(
        whole,
        attr_definitions(
            input,
            &mut ctx,
            header.attr_definition_count,
            header.options,
            &pool,
            &mut definitions,
        ),
    )?;
    reached(Stage::AttributeDefsRead, offset(whole, input));

    let (input, inner_classes) = finish(whole, ic_bands(input, &mut ctx, header.ic_count, &pool))?;
    let (input, classes) = finish(whole, class_bands(input, &mut ctx, &header, &definitions, &pool))?;
    reached(Stage::ClassBandsRead, offset(whole, input));

    let (input, byte_codes) = finish(whole, bc_bands(input, &mut ctx, classes.codes.len()))?;
    reached(Stage::BytecodeRead, offset(whole, input));

    let (input, files) = finish(whole, file_bands(input, &mut ctx, &header, &pool))?;
    reached(Stage::FileBandsRead, offset(whole, input));

    if ctx.remaining_headers() > 0 {
        warn!(unused = ctx.remaining_headers(), "band headers left over");
    }
    if let Some(file_header) = &header.file_header {
        let expected = size_prefix_len(&header, file_header.archive_size) as u64 + file_header.archive_size;
        let actual = (start.len() - input.len()) as u64;
        if expected != actual {
            warn!(expected, actual, "archive size does not match the segment");
        }
    }

    let segment = Segment {
        header,
        pool,
        definitions,
        inner_classes,
        classes,
        byte_codes,
        files,
    };
    return Ok((input, segment));
}
