//! Method code from the byte codes and the operand bands.

use crate::bytecode::{form, InitClass, MemberIndex, OperandBand, Shape};
use crate::classfile::{self as cf, argument_slots, Attribute, Code, Constant, Handler, Instruction, Operand};
use crate::error::Corruption;
use crate::parser::types::*;

use alloc::string::String;
use alloc::vec::Vec;
use tracing::warn;

/// Hands out the values of the operand bands, each band in order.
#[derive(Debug)]
pub struct OperandManager<'b> {
    bands: &'b [Vec<i32>],
    cursors: [usize; OperandBand::ALL.len()],
}

impl<'b> OperandManager<'b> {
    pub fn new(byte_codes: &'b ByteCodes<'_>) -> OperandManager<'b> {
        return OperandManager {
            bands: &byte_codes.operands,
            cursors: [0; OperandBand::ALL.len()],
        };
    }

    pub fn next(&mut self, band: OperandBand) -> Result<i32, Corruption> {
        let p = band.position();
        let value = self
            .bands
            .get(p)
            .and_then(|b| b.get(self.cursors[p]))
            .copied()
            .ok_or(Corruption::BandExhausted { band: band.name() })?;
        self.cursors[p] += 1;
        return Ok(value);
    }

    fn next_usize(&mut self, band: OperandBand) -> Result<usize, Corruption> {
        let value = self.next(band)?;
        return usize::try_from(value).map_err(|_| Corruption::BadCount {
            band: band.name(),
            value: value as i64,
        });
    }

    /// Complain about values nothing asked for.
    pub fn check_drained(&self) {
        for band in OperandBand::ALL {
            let len = self.bands.get(band.position()).map(|b| b.len()).unwrap_or(0);
            let used = self.cursors[band.position()];
            if used < len {
                warn!(band = band.name(), unused = len - used, "operand band not used up");
            }
        }
    }
}

/// What method code refers to beyond the constant pool.
#[derive(Debug, Clone, Copy)]
pub struct CodeContext<'c> {
    pub pool: &'c ConstantPool,
    pub members: &'c MemberIndex,
    /// Class index.
    pub this_class: usize,
    /// Class index.
    pub super_class: Option<usize>,
}

fn constant(pool: &ConstantPool, kind: CpKind, value: i32) -> Result<Constant, Corruption> {
    let index = usize::try_from(value).map_err(|_| Corruption::IndexOutOfRange {
        partition: kind.name(),
        index: value as i64,
        len: pool.len(kind),
    })?;
    return pool.constant(kind, index);
}

fn local(value: i32) -> Result<u16, Corruption> {
    return u16::try_from(value).map_err(|_| Corruption::BadCount {
        band: OperandBand::Local.name(),
        value: value as i64,
    });
}

/// Instruction `at` plus a label.
fn label(at: usize, ops: &mut OperandManager) -> Result<i64, Corruption> {
    return Ok(at as i64 + ops.next(OperandBand::Label)? as i64);
}

fn in_code(target: i64, count: usize) -> Result<usize, Corruption> {
    if target < 0 || target >= count as i64 {
        return Err(Corruption::BadBranch { target });
    }
    return Ok(target as usize);
}

/// Branch targets as read, before the instruction count is known.
enum Pending {
    Branch(i64),
    Table { default: i64, low: i32, targets: Vec<i64> },
    Lookup { default: i64, pairs: Vec<(i32, i64)> },
}

/// The instructions of one method.
fn instructions(
    codes: &[u8],
    cx: &CodeContext,
    ops: &mut OperandManager,
) -> Result<Vec<Instruction>, Corruption> {
    let mut out: Vec<Instruction> = Vec::with_capacity(codes.len());
    let mut pending: Vec<(usize, Pending)> = Vec::new();
    let mut wide = false;
    let mut last_new: Option<usize> = None;
    for &code in codes {
        if code == cf::WIDE {
            wide = true;
            continue;
        }
        let f = form(code).ok_or(Corruption::BadOpcode { opcode: code })?;
        if f.aload_0 {
            out.push(Instruction::simple(cf::ALOAD_0));
        }
        let at = out.len();
        let operand = match f.shape {
            Shape::None | Shape::Wide => Operand::None,
            Shape::Byte => {
                let value = ops.next(OperandBand::Byte)?;
                if f.opcode == cf::BIPUSH {
                    Operand::Immediate(value as u8 as i8 as i32)
                } else {
                    Operand::Immediate(value as u8 as i32)
                }
            }
            Shape::Short => Operand::Immediate(ops.next(OperandBand::Short)? as i16 as i32),
            Shape::Local => Operand::Local {
                index: local(ops.next(OperandBand::Local)?)?,
                wide,
            },
            Shape::Iinc => {
                let index = local(ops.next(OperandBand::Local)?)?;
                let delta = if wide {
                    ops.next(OperandBand::Short)? as i16
                } else {
                    ops.next(OperandBand::Byte)? as u8 as i8 as i16
                };
                Operand::Iinc { index, delta, wide }
            }
            Shape::Label => {
                pending.push((at, Pending::Branch(label(at, ops)?)));
                Operand::None
            }
            Shape::TableSwitch => {
                let n = ops.next_usize(OperandBand::CaseCount)?;
                let low = ops.next(OperandBand::CaseValue)?;
                let default = label(at, ops)?;
                let mut targets = Vec::with_capacity(n);
                for _ in 0..n {
                    targets.push(label(at, ops)?);
                }
                pending.push((at, Pending::Table { default, low, targets }));
                Operand::None
            }
            Shape::LookupSwitch => {
                let n = ops.next_usize(OperandBand::CaseCount)?;
                let mut keys = Vec::with_capacity(n);
                for _ in 0..n {
                    keys.push(ops.next(OperandBand::CaseValue)?);
                }
                let default = label(at, ops)?;
                let mut pairs = Vec::with_capacity(n);
                for key in keys {
                    pairs.push((key, label(at, ops)?));
                }
                pending.push((at, Pending::Lookup { default, pairs }));
                Operand::None
            }
            Shape::Ref(
                band @ (OperandBand::ThisField
                | OperandBand::SuperField
                | OperandBand::ThisMethod
                | OperandBand::SuperMethod
                | OperandBand::InitRef),
            ) => {
                let class = match (band, f.init) {
                    (OperandBand::ThisField | OperandBand::ThisMethod, _) => Some(cx.this_class),
                    (_, Some(InitClass::This)) => Some(cx.this_class),
                    (_, Some(InitClass::New)) => last_new,
                    _ => cx.super_class,
                }
                .ok_or(Corruption::MissingImplicitClass { opcode: code })?;
                let entry = cx.members.resolve(band, class, ops.next(band)?)?;
                Operand::Constant(cx.pool.constant(band.partition(), entry)?)
            }
            Shape::Ref(band) => {
                let value = ops.next(band)?;
                if code == cf::NEW {
                    last_new = usize::try_from(value).ok();
                }
                Operand::Constant(constant(cx.pool, band.partition(), value)?)
            }
            Shape::MultiANewArray => {
                let value = ops.next(OperandBand::ClassRef)?;
                let index = usize::try_from(value).map_err(|_| Corruption::IndexOutOfRange {
                    partition: CpKind::Class.name(),
                    index: value as i64,
                    len: cx.pool.len(CpKind::Class),
                })?;
                let class = String::from(cx.pool.class_name(index)?);
                let dimensions = ops.next(OperandBand::Byte)? as u8;
                Operand::MultiANewArray { class, dimensions }
            }
            Shape::RefEscape => {
                let size = ops.next(OperandBand::EscRefSize)?;
                let width = match size {
                    1 | 2 => size as u8,
                    _ => {
                        return Err(Corruption::BadCount {
                            band: OperandBand::EscRefSize.name(),
                            value: size as i64,
                        })
                    }
                };
                let index = ops.next_usize(OperandBand::EscRef)?;
                Operand::EscapedRef {
                    constant: cx.pool.any(index)?,
                    width,
                }
            }
            Shape::ByteEscape => {
                let n = ops.next_usize(OperandBand::EscSize)?;
                let mut bytes = Vec::with_capacity(n);
                for _ in 0..n {
                    bytes.push(ops.next(OperandBand::EscByte)? as u8);
                }
                Operand::EscapedBytes(bytes)
            }
        };
        out.push(Instruction::new(f.opcode, operand));
        wide = false;
    }

    let count = out.len();
    for (at, p) in pending {
        out[at].operand = match p {
            Pending::Branch(t) => Operand::Branch(in_code(t, count)?),
            Pending::Table { default, low, targets } => Operand::TableSwitch {
                default: in_code(default, count)?,
                low,
                targets: targets.into_iter().map(|t| in_code(t, count)).collect::<Result<_, _>>()?,
            },
            Pending::Lookup { default, pairs } => Operand::LookupSwitch {
                default: in_code(default, count)?,
                pairs: pairs
                    .into_iter()
                    .map(|(k, t)| Ok((k, in_code(t, count)?)))
                    .collect::<Result<_, Corruption>>()?,
            },
        };
    }
    return Ok(out);
}

fn handlers(bands: &[HandlerBands], count: usize, pool: &ConstantPool) -> Result<Vec<Handler>, Corruption> {
    let mut out = Vec::with_capacity(bands.len());
    for h in bands {
        let start = h.start as i64;
        let end = start + h.end as i64;
        let handler = end + h.catch as i64;
        for position in [start, end] {
            if position < 0 || position > count as i64 {
                return Err(Corruption::BadBranch { target: position });
            }
        }
        let catch_type = match h.class {
            Some(c) => Some(String::from(pool.class_name(c)?)),
            None => None,
        };
        out.push(Handler {
            start: start as usize,
            end: end as usize,
            handler: in_code(handler, count)?,
            catch_type,
        });
    }
    return Ok(out);
}

/// The `Code` of a method with access flags `method_flags` and descriptor `descriptor`.
pub fn materialize_code(
    codes: &[u8],
    bands: &CodeBands,
    method_flags: u16,
    descriptor: &str,
    cx: &CodeContext,
    ops: &mut OperandManager,
    attributes: Vec<Attribute>,
) -> Result<Code, Corruption> {
    let instructions = instructions(codes, cx, ops)?;
    let handlers = handlers(&bands.handlers, instructions.len(), cx.pool)?;
    let arguments = argument_slots(descriptor).map_err(|_| Corruption::BadDescriptor(String::from(descriptor)))?;
    let receiver = if method_flags & cf::ACC_STATIC == 0 { 1 } else { 0 };
    let max_locals = bands.max_na_locals as usize + arguments + receiver;
    let max_locals = u16::try_from(max_locals).map_err(|_| Corruption::ValueTooLarge {
        what: "max_locals",
        value: max_locals as i64,
    })?;
    return Ok(Code {
        max_stack: bands.max_stack,
        max_locals,
        instructions,
        handlers,
        attributes,
    });
}
