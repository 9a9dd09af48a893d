//! The byte codes of the `bc_codes` band.
//!
//! Archives carry standard opcodes without their operands, plus a few superinstructions
//! which fold an implied class or a preceding `aload_0` into the opcode.
//! Operands travel in the operand bands named by [`OperandBand`].

mod members;
pub use members::*;
#[cfg(test)]
mod test;

use crate::classfile::{self as cf, Constant};
use crate::codec::{BhsdCodec, BYTE1, BRANCH5, DELTA5, UNSIGNED5};
use crate::parser::types::CpKind;

/// First of the `_this`/`_super` superinstructions.
pub const SELF_LINKER: u8 = 202;
const LINKER_OPS: u8 = 7;
const ALOAD_0_FLAG: u8 = LINKER_OPS;
const SUPER_FLAG: u8 = 2 * LINKER_OPS;
/// First of the three `invokespecial` forms calling `<init>`.
pub const INVOKE_INIT: u8 = 230;
pub const CLDC: u8 = 233;
pub const ILDC: u8 = 234;
pub const FLDC: u8 = 235;
pub const CLDC_W: u8 = 236;
pub const ILDC_W: u8 = 237;
pub const FLDC_W: u8 = 238;
pub const DLDC2_W: u8 = 239;
pub const REF_ESCAPE: u8 = 253;
pub const BYTE_ESCAPE: u8 = 254;
pub const END_MARKER: u8 = 255;

/// Operand bands, in the order they follow `bc_codes`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum OperandBand {
    CaseCount,
    CaseValue,
    Byte,
    Short,
    Local,
    Label,
    IntRef,
    FloatRef,
    LongRef,
    DoubleRef,
    StringRef,
    ClassRef,
    FieldRef,
    MethodRef,
    IMethodRef,
    ThisField,
    SuperField,
    ThisMethod,
    SuperMethod,
    InitRef,
    EscRef,
    EscRefSize,
    EscSize,
    EscByte,
}

impl OperandBand {
    pub const ALL: [OperandBand; 24] = [
        OperandBand::CaseCount,
        OperandBand::CaseValue,
        OperandBand::Byte,
        OperandBand::Short,
        OperandBand::Local,
        OperandBand::Label,
        OperandBand::IntRef,
        OperandBand::FloatRef,
        OperandBand::LongRef,
        OperandBand::DoubleRef,
        OperandBand::StringRef,
        OperandBand::ClassRef,
        OperandBand::FieldRef,
        OperandBand::MethodRef,
        OperandBand::IMethodRef,
        OperandBand::ThisField,
        OperandBand::SuperField,
        OperandBand::ThisMethod,
        OperandBand::SuperMethod,
        OperandBand::InitRef,
        OperandBand::EscRef,
        OperandBand::EscRefSize,
        OperandBand::EscSize,
        OperandBand::EscByte,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OperandBand::CaseCount => "bc_case_count",
            OperandBand::CaseValue => "bc_case_value",
            OperandBand::Byte => "bc_byte",
            OperandBand::Short => "bc_short",
            OperandBand::Local => "bc_local",
            OperandBand::Label => "bc_label",
            OperandBand::IntRef => "bc_intref",
            OperandBand::FloatRef => "bc_floatref",
            OperandBand::LongRef => "bc_longref",
            OperandBand::DoubleRef => "bc_doubleref",
            OperandBand::StringRef => "bc_stringref",
            OperandBand::ClassRef => "bc_classref",
            OperandBand::FieldRef => "bc_fieldref",
            OperandBand::MethodRef => "bc_methodref",
            OperandBand::IMethodRef => "bc_imethodref",
            OperandBand::ThisField => "bc_thisfield",
            OperandBand::SuperField => "bc_superfield",
            OperandBand::ThisMethod => "bc_thismethod",
            OperandBand::SuperMethod => "bc_supermethod",
            OperandBand::InitRef => "bc_initref",
            OperandBand::EscRef => "bc_escref",
            OperandBand::EscRefSize => "bc_escrefsize",
            OperandBand::EscSize => "bc_escsize",
            OperandBand::EscByte => "bc_escbyte",
        }
    }

    pub fn codec(&self) -> BhsdCodec {
        match self {
            OperandBand::Byte | OperandBand::EscByte => BYTE1,
            OperandBand::Label => BRANCH5,
            OperandBand::CaseValue
            | OperandBand::Short
            | OperandBand::IntRef
            | OperandBand::FloatRef
            | OperandBand::LongRef
            | OperandBand::DoubleRef
            | OperandBand::StringRef
            | OperandBand::FieldRef
            | OperandBand::IMethodRef => DELTA5,
            _ => UNSIGNED5,
        }
    }

    /// Position in [`OperandBand::ALL`].
    pub fn position(&self) -> usize {
        return *self as usize;
    }

    /// The partition a reference band points into.
    /// The member bands of the implied class forms go through a [`MemberIndex`] first.
    pub fn partition(&self) -> CpKind {
        match self {
            OperandBand::IntRef => CpKind::Int,
            OperandBand::FloatRef => CpKind::Float,
            OperandBand::LongRef => CpKind::Long,
            OperandBand::DoubleRef => CpKind::Double,
            OperandBand::StringRef => CpKind::String,
            OperandBand::ClassRef => CpKind::Class,
            OperandBand::FieldRef | OperandBand::ThisField | OperandBand::SuperField => CpKind::Field,
            OperandBand::IMethodRef => CpKind::IMethod,
            _ => CpKind::Method,
        }
    }
}

/// Which class an `invokespecial <init>` form calls into.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum InitClass {
    This,
    Super,
    /// The class of the most recent `new`.
    New,
}

/// The operands a byte code takes from the operand bands.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Shape {
    None,
    /// One `bc_byte` value.
    Byte,
    /// One `bc_short` value.
    Short,
    Local,
    /// A local and an increment; the increment is a short after `wide`.
    Iinc,
    Label,
    TableSwitch,
    LookupSwitch,
    /// One reference into the given band.
    Ref(OperandBand),
    /// A class reference and a dimension count in `bc_byte`.
    MultiANewArray,
    /// Prefix of the next byte code.
    Wide,
    RefEscape,
    ByteEscape,
}

/// What a byte code stands for.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Form {
    /// The class file opcode it unpacks to.
    pub opcode: u8,
    /// Unpacks to `aload_0` followed by `opcode`.
    pub aload_0: bool,
    pub shape: Shape,
    pub init: Option<InitClass>,
}

const fn plain(opcode: u8, shape: Shape) -> Form {
    return Form {
        opcode,
        aload_0: false,
        shape,
        init: None,
    };
}

/// The meaning of byte code `code`, or `None` if archives may not contain it.
pub fn form(code: u8) -> Option<Form> {
    let shape = match code {
        cf::BIPUSH | cf::NEWARRAY => Shape::Byte,
        cf::SIPUSH => Shape::Short,
        cf::LDC | cf::LDC_W => Shape::Ref(OperandBand::StringRef),
        cf::LDC2_W => Shape::Ref(OperandBand::LongRef),
        cf::ILOAD..=cf::ALOAD | cf::ISTORE..=cf::ASTORE | cf::RET => Shape::Local,
        cf::IINC => Shape::Iinc,
        cf::IFEQ..=cf::JSR | cf::IFNULL..=cf::JSR_W => Shape::Label,
        cf::TABLESWITCH => Shape::TableSwitch,
        cf::LOOKUPSWITCH => Shape::LookupSwitch,
        cf::GETSTATIC..=cf::PUTFIELD => Shape::Ref(OperandBand::FieldRef),
        cf::INVOKEVIRTUAL..=cf::INVOKESTATIC => Shape::Ref(OperandBand::MethodRef),
        cf::INVOKEINTERFACE => Shape::Ref(OperandBand::IMethodRef),
        cf::INVOKEDYNAMIC => return None,
        cf::NEW | cf::ANEWARRAY | cf::CHECKCAST | cf::INSTANCEOF => Shape::Ref(OperandBand::ClassRef),
        cf::MULTIANEWARRAY => Shape::MultiANewArray,
        cf::WIDE => Shape::Wide,
        0..=cf::JSR_W => Shape::None,
        SELF_LINKER..=229 => {
            let rel = code - SELF_LINKER;
            let superclass = rel >= SUPER_FLAG;
            let aload_0 = rel % SUPER_FLAG >= ALOAD_0_FLAG;
            let opcode = cf::GETSTATIC + rel % LINKER_OPS;
            let band = match (opcode <= cf::PUTFIELD, superclass) {
                (true, false) => OperandBand::ThisField,
                (true, true) => OperandBand::SuperField,
                (false, false) => OperandBand::ThisMethod,
                (false, true) => OperandBand::SuperMethod,
            };
            return Some(Form {
                opcode,
                aload_0,
                shape: Shape::Ref(band),
                init: None,
            });
        }
        INVOKE_INIT..=232 => {
            let init = match code - INVOKE_INIT {
                0 => InitClass::This,
                1 => InitClass::Super,
                _ => InitClass::New,
            };
            return Some(Form {
                opcode: cf::INVOKESPECIAL,
                aload_0: false,
                shape: Shape::Ref(OperandBand::InitRef),
                init: Some(init),
            });
        }
        CLDC => return Some(plain(cf::LDC, Shape::Ref(OperandBand::ClassRef))),
        ILDC => return Some(plain(cf::LDC, Shape::Ref(OperandBand::IntRef))),
        FLDC => return Some(plain(cf::LDC, Shape::Ref(OperandBand::FloatRef))),
        CLDC_W => return Some(plain(cf::LDC_W, Shape::Ref(OperandBand::ClassRef))),
        ILDC_W => return Some(plain(cf::LDC_W, Shape::Ref(OperandBand::IntRef))),
        FLDC_W => return Some(plain(cf::LDC_W, Shape::Ref(OperandBand::FloatRef))),
        DLDC2_W => return Some(plain(cf::LDC2_W, Shape::Ref(OperandBand::DoubleRef))),
        REF_ESCAPE => return Some(plain(code, Shape::RefEscape)),
        BYTE_ESCAPE => return Some(plain(code, Shape::ByteEscape)),
        _ => return None,
    };
    return Some(plain(code, shape));
}

/// The `_this` or `_super` form of a field or method instruction.
pub fn self_linker_code(opcode: u8, aload_0: bool, superclass: bool) -> Option<u8> {
    if !(cf::GETSTATIC..=cf::INVOKESTATIC).contains(&opcode) {
        return None;
    }
    let mut code = SELF_LINKER + (opcode - cf::GETSTATIC);
    if aload_0 {
        code += ALOAD_0_FLAG;
    }
    if superclass {
        code += SUPER_FLAG;
    }
    return Some(code);
}

/// The typed form of an `ldc` family instruction loading `constant`, with its band.
pub fn ldc_code(opcode: u8, constant: &Constant) -> Option<(u8, OperandBand)> {
    let code = match (opcode, constant) {
        (cf::LDC, Constant::String(_)) => (cf::LDC, OperandBand::StringRef),
        (cf::LDC_W, Constant::String(_)) => (cf::LDC_W, OperandBand::StringRef),
        (cf::LDC, Constant::Integer(_)) => (ILDC, OperandBand::IntRef),
        (cf::LDC_W, Constant::Integer(_)) => (ILDC_W, OperandBand::IntRef),
        (cf::LDC, Constant::Float(_)) => (FLDC, OperandBand::FloatRef),
        (cf::LDC_W, Constant::Float(_)) => (FLDC_W, OperandBand::FloatRef),
        (cf::LDC, Constant::Class(_)) => (CLDC, OperandBand::ClassRef),
        (cf::LDC_W, Constant::Class(_)) => (CLDC_W, OperandBand::ClassRef),
        (cf::LDC2_W, Constant::Long(_)) => (cf::LDC2_W, OperandBand::LongRef),
        (cf::LDC2_W, Constant::Double(_)) => (DLDC2_W, OperandBand::DoubleRef),
        _ => return None,
    };
    return Some(code);
}
