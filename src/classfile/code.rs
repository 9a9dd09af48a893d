//! Bytecode: decoding and encoding the instructions of a `Code` attribute.

use super::*;

pub const BIPUSH: u8 = 16;
pub const SIPUSH: u8 = 17;
pub const LDC: u8 = 18;
pub const LDC_W: u8 = 19;
pub const LDC2_W: u8 = 20;
pub const ILOAD: u8 = 21;
pub const ALOAD: u8 = 25;
pub const ALOAD_0: u8 = 42;
pub const ISTORE: u8 = 54;
pub const ASTORE: u8 = 58;
pub const IINC: u8 = 132;
pub const IFEQ: u8 = 153;
pub const JSR: u8 = 168;
pub const RET: u8 = 169;
pub const TABLESWITCH: u8 = 170;
pub const LOOKUPSWITCH: u8 = 171;
pub const GETSTATIC: u8 = 178;
pub const PUTSTATIC: u8 = 179;
pub const GETFIELD: u8 = 180;
pub const PUTFIELD: u8 = 181;
pub const INVOKEVIRTUAL: u8 = 182;
pub const INVOKESPECIAL: u8 = 183;
pub const INVOKESTATIC: u8 = 184;
pub const INVOKEINTERFACE: u8 = 185;
pub const INVOKEDYNAMIC: u8 = 186;
pub const NEW: u8 = 187;
pub const NEWARRAY: u8 = 188;
pub const ANEWARRAY: u8 = 189;
pub const CHECKCAST: u8 = 192;
pub const INSTANCEOF: u8 = 193;
pub const WIDE: u8 = 196;
pub const MULTIANEWARRAY: u8 = 197;
pub const IFNULL: u8 = 198;
pub const IFNONNULL: u8 = 199;
pub const GOTO_W: u8 = 200;
pub const JSR_W: u8 = 201;

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: u8,
    pub operand: Operand,
}

impl Instruction {
    pub fn new(opcode: u8, operand: Operand) -> Instruction {
        return Instruction { opcode, operand };
    }

    pub fn simple(opcode: u8) -> Instruction {
        return Instruction::new(opcode, Operand::None);
    }
}

/// Instruction operands. Branch targets are instruction indexes.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    None,
    /// `bipush`, `sipush` and `newarray`.
    Immediate(i32),
    Local { index: u16, wide: bool },
    Iinc { index: u16, delta: i16, wide: bool },
    Constant(Constant),
    MultiANewArray { class: String, dimensions: u8 },
    Branch(usize),
    TableSwitch { default: usize, low: i32, targets: Vec<usize> },
    LookupSwitch { default: usize, pairs: Vec<(i32, usize)> },
    /// A constant pool index written straight into the code, `width` bytes wide.
    EscapedRef { constant: Constant, width: u8 },
    /// Bytes written straight into the code.
    EscapedBytes(Vec<u8>),
}

impl Operand {
    fn targets_mut(&mut self) -> Vec<&mut usize> {
        match self {
            Operand::Branch(t) => return vec![t],
            Operand::TableSwitch { default, targets, .. } => {
                let mut all = vec![default];
                all.extend(targets.iter_mut());
                return all;
            }
            Operand::LookupSwitch { default, pairs } => {
                let mut all = vec![default];
                all.extend(pairs.iter_mut().map(|(_, t)| t));
                return all;
            }
            _ => return Vec::new(),
        }
    }
}

fn u1(code: &[u8], at: usize) -> Result<u8, ClassFileError> {
    return code.get(at).copied().ok_or(ClassFileError::Truncated);
}

fn u2(code: &[u8], at: usize) -> Result<u16, ClassFileError> {
    return Ok(u16::from_be_bytes([u1(code, at)?, u1(code, at + 1)?]));
}

fn i4(code: &[u8], at: usize) -> Result<i32, ClassFileError> {
    let b = code.get(at..at + 4).ok_or(ClassFileError::Truncated)?;
    return Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]));
}

fn target(pc: usize, relative: i64) -> Result<usize, ClassFileError> {
    let t = pc as i64 + relative;
    return usize::try_from(t).map_err(|_| ClassFileError::BadCodePosition { offset: t });
}

fn switch_padding(pc: usize) -> usize {
    return 3 - pc % 4;
}

fn decode_one(code: &[u8], pc: usize, pool: &ClassPool) -> Result<(usize, Instruction), ClassFileError> {
    let op = code[pc];
    let constant = |index: u16| pool.get(index).map(|c| Operand::Constant(c.clone()));
    let (len, operand) = match op {
        BIPUSH => (2, Operand::Immediate(u1(code, pc + 1)? as i8 as i32)),
        SIPUSH => (3, Operand::Immediate(u2(code, pc + 1)? as i16 as i32)),
        NEWARRAY => (2, Operand::Immediate(u1(code, pc + 1)? as i32)),
        LDC => (2, constant(u1(code, pc + 1)? as u16)?),
        LDC_W | LDC2_W | GETSTATIC..=INVOKESTATIC | NEW | ANEWARRAY | CHECKCAST | INSTANCEOF => {
            (3, constant(u2(code, pc + 1)?)?)
        }
        INVOKEINTERFACE => (5, constant(u2(code, pc + 1)?)?),
        INVOKEDYNAMIC => return Err(ClassFileError::Unsupported(String::from("invokedynamic"))),
        MULTIANEWARRAY => {
            let class = pool.class_name(u2(code, pc + 1)?)?;
            let dimensions = u1(code, pc + 3)?;
            (4, Operand::MultiANewArray { class, dimensions })
        }
        ILOAD..=ALOAD | ISTORE..=ASTORE | RET => {
            let index = u1(code, pc + 1)? as u16;
            (2, Operand::Local { index, wide: false })
        }
        IINC => {
            let index = u1(code, pc + 1)? as u16;
            let delta = u1(code, pc + 2)? as i8 as i16;
            (3, Operand::Iinc { index, delta, wide: false })
        }
        IFEQ..=JSR | IFNULL | IFNONNULL => (3, Operand::Branch(target(pc, u2(code, pc + 1)? as i16 as i64)?)),
        GOTO_W | JSR_W => (5, Operand::Branch(target(pc, i4(code, pc + 1)? as i64)?)),
        TABLESWITCH => {
            let base = pc + 1 + switch_padding(pc);
            let default = target(pc, i4(code, base)? as i64)?;
            let low = i4(code, base + 4)?;
            let high = i4(code, base + 8)?;
            let n = high as i64 - low as i64 + 1;
            if n < 0 || n as usize > code.len() / 4 {
                return Err(ClassFileError::BadOpcode { offset: pc, opcode: op });
            }
            let mut targets = Vec::with_capacity(n as usize);
            for i in 0..n as usize {
                targets.push(target(pc, i4(code, base + 12 + 4 * i)? as i64)?);
            }
            (base + 12 + 4 * n as usize - pc, Operand::TableSwitch { default, low, targets })
        }
        LOOKUPSWITCH => {
            let base = pc + 1 + switch_padding(pc);
            let default = target(pc, i4(code, base)? as i64)?;
            let n = i4(code, base + 4)?;
            if n < 0 || n as usize > code.len() / 8 {
                return Err(ClassFileError::BadOpcode { offset: pc, opcode: op });
            }
            let mut pairs = Vec::with_capacity(n as usize);
            for i in 0..n as usize {
                let key = i4(code, base + 8 + 8 * i)?;
                pairs.push((key, target(pc, i4(code, base + 12 + 8 * i)? as i64)?));
            }
            (base + 8 + 8 * n as usize - pc, Operand::LookupSwitch { default, pairs })
        }
        WIDE => {
            let inner = u1(code, pc + 1)?;
            let index = u2(code, pc + 2)?;
            return match inner {
                IINC => {
                    let delta = u2(code, pc + 4)? as i16;
                    Ok((6, Instruction::new(IINC, Operand::Iinc { index, delta, wide: true })))
                }
                ILOAD..=ALOAD | ISTORE..=ASTORE | RET => {
                    Ok((4, Instruction::new(inner, Operand::Local { index, wide: true })))
                }
                _ => Err(ClassFileError::BadOpcode {
                    offset: pc + 1,
                    opcode: inner,
                }),
            };
        }
        0..=JSR_W => (1, Operand::None),
        _ => return Err(ClassFileError::BadOpcode { offset: pc, opcode: op }),
    };
    return Ok((len, Instruction::new(op, operand)));
}

/// Instruction index of the instruction starting at byte `offset`.
/// The code length maps to the instruction count.
pub fn instruction_at(offsets: &[usize], offset: i64) -> Result<usize, ClassFileError> {
    let bad = ClassFileError::BadCodePosition { offset };
    let offset = usize::try_from(offset).map_err(|_| bad.clone())?;
    return offsets.binary_search(&offset).map_err(|_| bad);
}

/// Decode a method's code.
///
/// Returns the instructions and the byte offset of each, followed by the code length.
pub fn decode_code(code: &[u8], pool: &ClassPool) -> Result<(Vec<Instruction>, Vec<usize>), ClassFileError> {
    let mut instructions = Vec::new();
    let mut offsets = Vec::new();
    let mut pc = 0;
    while pc < code.len() {
        let (len, instruction) = decode_one(code, pc, pool)?;
        offsets.push(pc);
        instructions.push(instruction);
        pc += len;
    }
    if pc != code.len() {
        return Err(ClassFileError::Truncated);
    }
    offsets.push(pc);
    for instruction in instructions.iter_mut() {
        for t in instruction.operand.targets_mut() {
            *t = instruction_at(&offsets, *t as i64)?;
        }
    }
    return Ok((instructions, offsets));
}

fn size_at(instruction: &Instruction, pc: usize) -> usize {
    match &instruction.operand {
        Operand::None => 1,
        Operand::Immediate(_) if instruction.opcode == SIPUSH => 3,
        Operand::Immediate(_) => 2,
        Operand::Local { wide: true, .. } => 4,
        Operand::Local { .. } => 2,
        Operand::Iinc { wide: true, .. } => 6,
        Operand::Iinc { .. } => 3,
        Operand::Constant(_) if instruction.opcode == LDC => 2,
        Operand::Constant(_) if instruction.opcode == INVOKEINTERFACE => 5,
        Operand::Constant(_) => 3,
        Operand::MultiANewArray { .. } => 4,
        Operand::Branch(_) if matches!(instruction.opcode, GOTO_W | JSR_W) => 5,
        Operand::Branch(_) => 3,
        Operand::TableSwitch { targets, .. } => 1 + switch_padding(pc) + 12 + 4 * targets.len(),
        Operand::LookupSwitch { pairs, .. } => 1 + switch_padding(pc) + 8 + 8 * pairs.len(),
        Operand::EscapedRef { width, .. } => *width as usize,
        Operand::EscapedBytes(bytes) => bytes.len(),
    }
}

/// Byte offsets of each instruction, followed by the code length.
pub fn code_offsets(instructions: &[Instruction]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(instructions.len() + 1);
    let mut pc = 0;
    for instruction in instructions {
        offsets.push(pc);
        pc += size_at(instruction, pc);
    }
    offsets.push(pc);
    return offsets;
}

fn narrow_local(index: u16) -> Result<u8, ClassFileError> {
    return u8::try_from(index).map_err(|_| ClassFileError::TooLarge("local variable slots"));
}

fn relative(offsets: &[usize], pc: usize, target: usize) -> Result<i64, ClassFileError> {
    let to = offsets.get(target).ok_or(ClassFileError::BadCodePosition {
        offset: target as i64,
    })?;
    return Ok(*to as i64 - pc as i64);
}

/// Encode instructions, adding their constants to `pool`.
///
/// Returns the code bytes and the offsets as [`code_offsets`] computes them.
pub fn encode_code<S: ConstantSink>(
    instructions: &[Instruction],
    pool: &mut S,
) -> Result<(Vec<u8>, Vec<usize>), ClassFileError> {
    let offsets = code_offsets(instructions);
    let len = offsets[instructions.len()];
    if len > 65535 {
        return Err(ClassFileError::TooLarge("code bytes"));
    }
    let mut out = Vec::with_capacity(len);
    for (i, instruction) in instructions.iter().enumerate() {
        let pc = offsets[i];
        let op = instruction.opcode;
        match &instruction.operand {
            Operand::None => out.push(op),
            Operand::Immediate(v) => {
                out.push(op);
                match op {
                    SIPUSH => out.extend_from_slice(&(*v as i16).to_be_bytes()),
                    _ => out.push(*v as u8),
                }
            }
            Operand::Local { index, wide: true } => {
                out.extend_from_slice(&[WIDE, op]);
                out.extend_from_slice(&index.to_be_bytes());
            }
            Operand::Local { index, .. } => out.extend_from_slice(&[op, narrow_local(*index)?]),
            Operand::Iinc {
                index,
                delta,
                wide: true,
            } => {
                out.extend_from_slice(&[WIDE, IINC]);
                out.extend_from_slice(&index.to_be_bytes());
                out.extend_from_slice(&delta.to_be_bytes());
            }
            Operand::Iinc { index, delta, .. } => {
                let delta = i8::try_from(*delta).map_err(|_| ClassFileError::TooLarge("iinc increment"))?;
                out.extend_from_slice(&[IINC, narrow_local(*index)?, delta as u8]);
            }
            Operand::Constant(c) if op == LDC => {
                let index = pool.index(c, true)?;
                let index = u8::try_from(index).map_err(|_| ClassFileError::TooLarge("ldc constants"))?;
                out.extend_from_slice(&[op, index]);
            }
            Operand::Constant(c) => {
                out.push(op);
                out.extend_from_slice(&pool.index(c, false)?.to_be_bytes());
                if op == INVOKEINTERFACE {
                    let descriptor = match c {
                        Constant::InterfaceMethod(m) | Constant::Method(m) => &m.descriptor,
                        _ => return Err(ClassFileError::BadDescriptor(format!("{:?}", c))),
                    };
                    let slots = 1 + argument_slots(descriptor)?;
                    let slots = u8::try_from(slots).map_err(|_| ClassFileError::TooLarge("arguments"))?;
                    out.extend_from_slice(&[slots, 0]);
                }
            }
            Operand::MultiANewArray { class, dimensions } => {
                out.push(op);
                out.extend_from_slice(&pool.index(&Constant::Class(class.clone()), false)?.to_be_bytes());
                out.push(*dimensions);
            }
            Operand::Branch(t) => {
                let rel = relative(&offsets, pc, *t)?;
                out.push(op);
                if matches!(op, GOTO_W | JSR_W) {
                    out.extend_from_slice(&(rel as i32).to_be_bytes());
                } else {
                    let rel = i16::try_from(rel).map_err(|_| ClassFileError::TooLarge("branch distance"))?;
                    out.extend_from_slice(&rel.to_be_bytes());
                }
            }
            Operand::TableSwitch { default, low, targets } => {
                out.push(op);
                out.resize(out.len() + switch_padding(pc), 0);
                out.extend_from_slice(&(relative(&offsets, pc, *default)? as i32).to_be_bytes());
                let high = *low as i64 + targets.len() as i64 - 1;
                out.extend_from_slice(&low.to_be_bytes());
                out.extend_from_slice(&(high as i32).to_be_bytes());
                for t in targets {
                    out.extend_from_slice(&(relative(&offsets, pc, *t)? as i32).to_be_bytes());
                }
            }
            Operand::LookupSwitch { default, pairs } => {
                out.push(op);
                out.resize(out.len() + switch_padding(pc), 0);
                out.extend_from_slice(&(relative(&offsets, pc, *default)? as i32).to_be_bytes());
                out.extend_from_slice(&(pairs.len() as i32).to_be_bytes());
                for (key, t) in pairs {
                    out.extend_from_slice(&key.to_be_bytes());
                    out.extend_from_slice(&(relative(&offsets, pc, *t)? as i32).to_be_bytes());
                }
            }
            Operand::EscapedRef { constant, width } => {
                let index = pool.index(constant, *width == 1)?;
                if *width == 1 {
                    let index = u8::try_from(index).map_err(|_| ClassFileError::TooLarge("ldc constants"))?;
                    out.push(index);
                } else {
                    out.extend_from_slice(&index.to_be_bytes());
                }
            }
            Operand::EscapedBytes(bytes) => out.extend_from_slice(bytes),
        }
    }
    return Ok((out, offsets));
}
