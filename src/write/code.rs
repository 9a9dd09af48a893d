//! Method code into `bc_codes` and the operand bands, choosing superinstructions on the way.

use super::bands::BandWriter;
use super::pool::SegmentPool;
use crate::bytecode::*;
use crate::classfile::{self as cf, ClassFileError, Code, Constant, Instruction, MemberRef, Operand};
use crate::error::Error;
use crate::parser::types::CpKind;

use alloc::format;
use alloc::vec;
use alloc::vec::Vec;

/// The class whose methods are being written.
#[derive(Debug, Clone, Copy)]
pub struct CodeContext<'c> {
    pub pool: &'c SegmentPool,
    pub members: &'c MemberIndex,
    pub this_name: &'c str,
    pub super_name: Option<&'c str>,
    /// Class index.
    pub this_class: usize,
    /// Class index.
    pub super_class: Option<usize>,
}

/// A field or method instruction that refers to its own class or the superclass.
struct Linked {
    opcode: u8,
    band: OperandBand,
    superclass: bool,
    position: usize,
}

fn unsupported(insn: &Instruction) -> Error {
    return ClassFileError::Unsupported(format!("operand of opcode {}", insn.opcode)).into();
}

/// Collects the byte codes and operand bands of every method of a segment.
#[derive(Debug)]
pub struct CodeWriter {
    codes: Vec<u8>,
    operands: Vec<Vec<i64>>,
    methods: usize,
}

impl Default for CodeWriter {
    fn default() -> Self {
        return CodeWriter {
            codes: Vec::new(),
            operands: vec![Vec::new(); OperandBand::ALL.len()],
            methods: 0,
        };
    }
}

impl CodeWriter {
    pub fn new() -> CodeWriter {
        return CodeWriter::default();
    }

    fn put(&mut self, band: OperandBand, value: i64) {
        self.operands[band.position()].push(value);
    }

    fn label(&mut self, at: usize, target: usize) {
        self.put(OperandBand::Label, target as i64 - at as i64);
    }

    fn member_index(cx: &CodeContext, kind: CpKind, member: &MemberRef) -> Result<usize, Error> {
        return cx.pool.member(kind, member);
    }

    /// The `_this` or `_super` form that fits `insn`, if any.
    fn linked(cx: &CodeContext, insn: &Instruction) -> Result<Option<Linked>, Error> {
        let (member, field) = match (insn.opcode, &insn.operand) {
            (cf::GETSTATIC..=cf::PUTFIELD, Operand::Constant(Constant::Field(m))) => (m, true),
            (cf::INVOKEVIRTUAL..=cf::INVOKESTATIC, Operand::Constant(Constant::Method(m))) => (m, false),
            _ => return Ok(None),
        };
        if insn.opcode == cf::INVOKESPECIAL && member.name == "<init>" {
            return Ok(None);
        }
        let (class, superclass) = if member.class == cx.this_name {
            (cx.this_class, false)
        } else if Some(member.class.as_str()) == cx.super_name {
            match cx.super_class {
                Some(c) => (c, true),
                None => return Ok(None),
            }
        } else {
            return Ok(None);
        };
        let band = match (field, superclass) {
            (true, false) => OperandBand::ThisField,
            (true, true) => OperandBand::SuperField,
            (false, false) => OperandBand::ThisMethod,
            (false, true) => OperandBand::SuperMethod,
        };
        let kind = if field { CpKind::Field } else { CpKind::Method };
        let entry = CodeWriter::member_index(cx, kind, member)?;
        return Ok(cx.members.position(band, class, entry).map(|position| Linked {
            opcode: insn.opcode,
            band,
            superclass,
            position,
        }));
    }

    /// The `_init` form of an `invokespecial` calling a constructor, if any.
    fn init(cx: &CodeContext, member: &MemberRef, last_new: Option<usize>) -> Result<Option<(u8, usize)>, Error> {
        let class = cx.pool.class(&member.class)?;
        let code = if class == cx.this_class {
            INVOKE_INIT
        } else if Some(class) == cx.super_class {
            INVOKE_INIT + 1
        } else if Some(class) == last_new {
            INVOKE_INIT + 2
        } else {
            return Ok(None);
        };
        let entry = CodeWriter::member_index(cx, CpKind::Method, member)?;
        return Ok(cx.members.position(OperandBand::InitRef, class, entry).map(|p| (code, p)));
    }

    fn constant(
        &mut self,
        cx: &CodeContext,
        insn: &Instruction,
        constant: &Constant,
        last_new: &mut Option<usize>,
    ) -> Result<(), Error> {
        let pool = cx.pool;
        match (insn.opcode, constant) {
            (cf::LDC | cf::LDC_W | cf::LDC2_W, c) => {
                let (code, band) = ldc_code(insn.opcode, c).ok_or_else(|| unsupported(insn))?;
                self.codes.push(code);
                let index = pool.constant(band.partition(), c)?;
                self.put(band, index as i64);
            }
            (cf::INVOKESPECIAL, Constant::Method(m)) if m.name == "<init>" => {
                match CodeWriter::init(cx, m, *last_new)? {
                    Some((code, position)) => {
                        self.codes.push(code);
                        self.put(OperandBand::InitRef, position as i64);
                    }
                    None => {
                        self.codes.push(insn.opcode);
                        let index = pool.member(CpKind::Method, m)?;
                        self.put(OperandBand::MethodRef, index as i64);
                    }
                }
            }
            (cf::GETSTATIC..=cf::PUTFIELD, Constant::Field(m)) => {
                self.codes.push(insn.opcode);
                let index = pool.member(CpKind::Field, m)?;
                self.put(OperandBand::FieldRef, index as i64);
            }
            (cf::INVOKEVIRTUAL..=cf::INVOKESTATIC, Constant::Method(m)) => {
                self.codes.push(insn.opcode);
                let index = pool.member(CpKind::Method, m)?;
                self.put(OperandBand::MethodRef, index as i64);
            }
            (cf::INVOKEINTERFACE, Constant::InterfaceMethod(m)) => {
                self.codes.push(insn.opcode);
                let index = pool.member(CpKind::IMethod, m)?;
                self.put(OperandBand::IMethodRef, index as i64);
            }
            (cf::NEW | cf::ANEWARRAY | cf::CHECKCAST | cf::INSTANCEOF, Constant::Class(name)) => {
                self.codes.push(insn.opcode);
                let index = pool.class(name)?;
                if insn.opcode == cf::NEW {
                    *last_new = Some(index);
                }
                self.put(OperandBand::ClassRef, index as i64);
            }
            _ => return Err(unsupported(insn)),
        }
        return Ok(());
    }

    /// Write one method's instructions, followed by the end marker.
    pub fn method(&mut self, code: &Code, cx: &CodeContext) -> Result<(), Error> {
        let instructions = &code.instructions;
        let mut last_new: Option<usize> = None;
        let mut i = 0;
        while i < instructions.len() {
            let insn = &instructions[i];
            if insn.opcode == cf::ALOAD_0 && insn.operand == Operand::None {
                if let Some(next) = instructions.get(i + 1) {
                    if let Some(linked) = CodeWriter::linked(cx, next)? {
                        let code = self_linker_code(linked.opcode, true, linked.superclass).ok_or_else(|| unsupported(next))?;
                        self.codes.push(code);
                        self.put(linked.band, linked.position as i64);
                        i += 2;
                        continue;
                    }
                }
            }
            if let Some(linked) = CodeWriter::linked(cx, insn)? {
                let code = self_linker_code(linked.opcode, false, linked.superclass).ok_or_else(|| unsupported(insn))?;
                self.codes.push(code);
                self.put(linked.band, linked.position as i64);
                i += 1;
                continue;
            }
            self.instruction(cx, i, insn, &mut last_new)?;
            i += 1;
        }
        self.codes.push(END_MARKER);
        self.methods += 1;
        return Ok(());
    }

    fn instruction(
        &mut self,
        cx: &CodeContext,
        at: usize,
        insn: &Instruction,
        last_new: &mut Option<usize>,
    ) -> Result<(), Error> {
        let op = insn.opcode;
        match &insn.operand {
            Operand::None => self.codes.push(op),
            Operand::Immediate(v) => {
                self.codes.push(op);
                match op {
                    cf::SIPUSH => self.put(OperandBand::Short, *v as i64),
                    _ => self.put(OperandBand::Byte, (*v as u8) as i64),
                }
            }
            Operand::Local { index, wide } => {
                if *wide {
                    self.codes.push(cf::WIDE);
                }
                self.codes.push(op);
                self.put(OperandBand::Local, *index as i64);
            }
            Operand::Iinc { index, delta, wide } => {
                if *wide {
                    self.codes.push(cf::WIDE);
                }
                self.codes.push(op);
                self.put(OperandBand::Local, *index as i64);
                if *wide {
                    self.put(OperandBand::Short, *delta as i64);
                } else {
                    self.put(OperandBand::Byte, (*delta as u8) as i64);
                }
            }
            Operand::Branch(target) => {
                self.codes.push(op);
                self.label(at, *target);
            }
            Operand::TableSwitch { default, low, targets } => {
                self.codes.push(op);
                self.put(OperandBand::CaseCount, targets.len() as i64);
                self.put(OperandBand::CaseValue, *low as i64);
                self.label(at, *default);
                for t in targets {
                    self.label(at, *t);
                }
            }
            Operand::LookupSwitch { default, pairs } => {
                self.codes.push(op);
                self.put(OperandBand::CaseCount, pairs.len() as i64);
                for (key, _) in pairs {
                    self.put(OperandBand::CaseValue, *key as i64);
                }
                self.label(at, *default);
                for (_, t) in pairs {
                    self.label(at, *t);
                }
            }
            Operand::Constant(c) => self.constant(cx, insn, c, last_new)?,
            Operand::MultiANewArray { class, dimensions } => {
                self.codes.push(op);
                self.put(OperandBand::ClassRef, cx.pool.class(class)? as i64);
                self.put(OperandBand::Byte, *dimensions as i64);
            }
            Operand::EscapedRef { constant, width } => {
                self.codes.push(REF_ESCAPE);
                self.put(OperandBand::EscRefSize, *width as i64);
                self.put(OperandBand::EscRef, cx.pool.any(constant)? as i64);
            }
            Operand::EscapedBytes(bytes) => {
                self.codes.push(BYTE_ESCAPE);
                self.put(OperandBand::EscSize, bytes.len() as i64);
                for b in bytes {
                    self.put(OperandBand::EscByte, *b as i64);
                }
            }
        }
        return Ok(());
    }

    /// Methods written so far.
    pub fn method_count(&self) -> usize {
        return self.methods;
    }

    /// Write `bc_codes` and the operand bands.
    pub fn finish(self, w: &mut BandWriter) -> Result<(), Error> {
        w.bytes("bc_codes", &self.codes);
        for band in OperandBand::ALL {
            w.band(band.name(), band.codec(), &self.operands[band.position()])?;
        }
        return Ok(());
    }
}
