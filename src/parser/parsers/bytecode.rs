use super::*;
use crate::bytecode::{form, OperandBand, Shape, END_MARKER};
use crate::classfile::WIDE;

use alloc::vec;
use nom::bytes::complete::take;

/// Operand counts of each band that do not depend on other operand bands.
#[derive(Debug, Default)]
struct OperandCounts {
    counts: [usize; OperandBand::ALL.len()],
    switches: Vec<u8>,
}

impl OperandCounts {
    fn add(&mut self, band: OperandBand) {
        self.counts[band.position()] += 1;
    }
}

/// Split off one method's byte codes, up to and excluding the end marker.
fn method_codes<'a>(input: &'a [u8], counts: &mut OperandCounts) -> PackResult<'a, &'a [u8]> {
    let mut position = 0;
    let mut wide = false;
    loop {
        let code = match input.get(position) {
            Some(c) => *c,
            None => return corrupt(&input[position..], Corruption::Truncated { band: "bc_codes" }),
        };
        if code == END_MARKER {
            break;
        }
        let at = &input[position..];
        position += 1;
        let f = match form(code) {
            Some(f) => f,
            None => return corrupt(at, Corruption::BadOpcode { opcode: code }),
        };
        if wide && !matches!(f.shape, Shape::Local | Shape::Iinc) {
            return corrupt(at, Corruption::BadOpcode { opcode: code });
        }
        match f.shape {
            Shape::None => {}
            Shape::Byte => counts.add(OperandBand::Byte),
            Shape::Short => counts.add(OperandBand::Short),
            Shape::Local => counts.add(OperandBand::Local),
            Shape::Iinc => {
                counts.add(OperandBand::Local);
                counts.add(if wide { OperandBand::Short } else { OperandBand::Byte });
            }
            Shape::Label => counts.add(OperandBand::Label),
            Shape::TableSwitch | Shape::LookupSwitch => {
                counts.add(OperandBand::CaseCount);
                counts.switches.push(code);
            }
            Shape::Ref(band) => counts.add(band),
            Shape::MultiANewArray => {
                counts.add(OperandBand::ClassRef);
                counts.add(OperandBand::Byte);
            }
            Shape::Wide => {}
            Shape::RefEscape => {
                counts.add(OperandBand::EscRefSize);
                counts.add(OperandBand::EscRef);
            }
            Shape::ByteEscape => counts.add(OperandBand::EscSize),
        }
        wide = f.shape == Shape::Wide && code == WIDE;
    }
    if wide {
        return corrupt(&input[position..], Corruption::BadOpcode { opcode: WIDE });
    }
    let (rest, codes) = take(position)(input)?;
    let (rest, _) = take(1usize)(rest)?;
    return Ok((rest, codes));
}

/// The byte codes of `code_count` methods and every operand band.
pub fn bc_bands<'a>(input: &'a [u8], ctx: &mut BandContext<'a>, code_count: usize) -> PackResult<'a, ByteCodes<'a>> {
    let whole = input.len();
    let (mut input, _) = check_count(input, ctx, "bc_codes", code_count)?;
    let mut counts = OperandCounts::default();
    let mut codes = Vec::with_capacity(code_count);
    for _ in 0..code_count {
        let (rest, c) = context("bc_codes", |i| method_codes(i, &mut counts))(input)?;
        input = rest;
        codes.push(c);
    }

    let mut operands = vec![Vec::new(); OperandBand::ALL.len()];
    for operand in OperandBand::ALL {
        let count = match operand {
            OperandBand::CaseValue => {
                let case_counts = &operands[OperandBand::CaseCount.position()];
                let mut n: usize = 0;
                for (code, cases) in counts.switches.iter().zip(case_counts.iter()) {
                    let cases = to_usize_or_err!(input, "bc_case_count", *cases);
                    n = n.saturating_add(if *code == crate::classfile::TABLESWITCH { 1 } else { cases });
                }
                n
            }
            OperandBand::Label => {
                let case_counts = &operands[OperandBand::CaseCount.position()];
                let mut n = counts.counts[operand.position()];
                for cases in case_counts.iter() {
                    let cases = to_usize_or_err!(input, "bc_case_count", *cases);
                    n = n.saturating_add(cases).saturating_add(1);
                }
                n
            }
            OperandBand::EscByte => {
                let sizes = &operands[OperandBand::EscSize.position()];
                let mut n: usize = 0;
                for size in sizes.iter() {
                    n = n.saturating_add(to_usize_or_err!(input, "bc_escsize", *size));
                }
                n
            }
            _ => counts.counts[operand.position()],
        };
        let name = operand.name();
        let (rest, values) = context(name, |i| band(i, ctx, name, operand.codec(), count))(input)?;
        input = rest;
        operands[operand.position()] = values;
    }
    stage_done("byte codes", whole, input);
    return Ok((input, ByteCodes { codes, operands }));
}
