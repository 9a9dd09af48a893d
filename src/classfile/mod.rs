//! Class files.
//!
//! Both directions work on a symbolic model of a class: every constant pool reference
//! is held by value and every bytecode position by instruction index.
//! `reader` turns class file bytes into raw structures, `writer` turns the model back
//! into bytes, building a fresh constant pool on the way.

mod attr;
pub use attr::*;
mod code;
pub use code::*;
mod reader;
pub use reader::*;
mod writer;
pub use writer::*;
#[cfg(test)]
mod test;

use crate::layout::AttributeLayout;

use alloc::format;
use alloc::vec;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use widestring::U16String;

pub const MAGIC: u32 = 0xCAFE_BABE;

pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_SYNTHETIC: u16 = 0x1000;

/// Constant pool entries, by value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Constant {
    Utf8(U16String),
    Integer(i32),
    /// Raw IEEE bits, so that every NaN survives.
    Float(u32),
    Long(i64),
    /// Raw IEEE bits.
    Double(u64),
    Class(String),
    String(U16String),
    NameAndType { name: String, descriptor: String },
    Field(MemberRef),
    Method(MemberRef),
    InterfaceMethod(MemberRef),
}

impl Constant {
    pub fn utf8(s: &str) -> Constant {
        return Constant::Utf8(U16String::from_str(s));
    }

    /// Long and Double take two constant pool slots.
    pub fn is_wide(&self) -> bool {
        matches!(self, Constant::Long(_) | Constant::Double(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MemberRef {
    pub class: String,
    pub name: String,
    pub descriptor: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub minor_version: u16,
    pub major_version: u16,
    pub access_flags: u16,
    pub this_class: String,
    pub super_class: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<Member>,
    pub methods: Vec<Member>,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub access_flags: u16,
    pub name: String,
    pub descriptor: String,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Code(Code),
    InnerClasses(Vec<InnerClass>),
    /// An attribute whose body follows a layout.
    Layout(LayoutAttribute),
}

impl Attribute {
    pub fn name(&self) -> &str {
        match self {
            Attribute::Code(_) => "Code",
            Attribute::InnerClasses(_) => "InnerClasses",
            Attribute::Layout(l) => l.layout.name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutAttribute {
    pub layout: Rc<AttributeLayout>,
    /// Values of the layout's first callable.
    pub values: Vec<AttrValue>,
}

/// The value of one layout element.
///
/// Bytecode positions (`P`, `PO`, `O`, `OS` elements) are held the way bands hold them:
/// as instruction indexes, or index deltas from the previous position in the attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Ref(Option<Constant>),
    Replication(Vec<Vec<AttrValue>>),
    Union { tag: i32, body: Vec<AttrValue> },
    Call(Vec<AttrValue>),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct InnerClass {
    pub inner: String,
    pub outer: Option<String>,
    pub name: Option<String>,
    pub flags: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub instructions: Vec<Instruction>,
    pub handlers: Vec<Handler>,
    pub attributes: Vec<Attribute>,
}

/// An exception handler, by instruction index. `end` may equal the instruction count.
#[derive(Debug, Clone, PartialEq)]
pub struct Handler {
    pub start: usize,
    pub end: usize,
    pub handler: usize,
    pub catch_type: Option<String>,
}

/// The number of local variable slots taken by the arguments of `descriptor`.
pub fn argument_slots(descriptor: &str) -> Result<usize, ClassFileError> {
    let bad = || ClassFileError::BadDescriptor(String::from(descriptor));
    let bytes = descriptor.as_bytes();
    if bytes.first() != Some(&b'(') {
        return Err(bad());
    }
    let mut slots = 0;
    let mut i = 1;
    loop {
        match bytes.get(i) {
            Some(b')') => return Ok(slots),
            Some(b'J') | Some(b'D') => {
                slots += 2;
                i += 1;
            }
            Some(b'[') => {
                while bytes.get(i) == Some(&b'[') {
                    i += 1;
                }
                i = skip_field_type(bytes, i).ok_or_else(bad)?;
                slots += 1;
            }
            Some(_) => {
                i = skip_field_type(bytes, i).ok_or_else(bad)?;
                slots += 1;
            }
            None => return Err(bad()),
        }
    }
}

fn skip_field_type(bytes: &[u8], i: usize) -> Option<usize> {
    match bytes.get(i)? {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => return Some(i + 1),
        b'L' => {
            let end = bytes[i..].iter().position(|b| *b == b';')?;
            return Some(i + end + 1);
        }
        _ => return None,
    }
}

/// The class name part of a class file entry name, e.g. `a/B$C` for `a/B$C.class`.
pub fn class_name_of_entry(entry: &str) -> Option<&str> {
    return entry.strip_suffix(".class");
}

/// Errors in class files handed to the packer, or produced while writing one.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassFileError {
    BadMagic,
    Truncated,
    /// Bytes left after the last attribute.
    TrailingBytes,
    BadConstantIndex(u16),
    BadConstantTag(u8),
    BadUtf8,
    BadDescriptor(String),
    BadOpcode { offset: usize, opcode: u8 },
    /// A branch, handler or attribute position that is not an instruction boundary.
    BadCodePosition { offset: i64 },
    /// Attribute bytes or values that do not follow the attribute's layout.
    AttributeMismatch { name: String },
    /// A feature the archive format has no way to carry.
    Unsupported(String),
    /// More constants, members or bytes than a class file can index.
    TooLarge(&'static str),
}

impl fmt::Display for ClassFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassFileError::BadMagic => write!(f, "not a class file"),
            ClassFileError::Truncated => write!(f, "class file is truncated"),
            ClassFileError::TrailingBytes => write!(f, "class file has trailing bytes"),
            ClassFileError::BadConstantIndex(i) => write!(f, "bad constant pool index {}", i),
            ClassFileError::BadConstantTag(t) => write!(f, "bad constant pool tag {}", t),
            ClassFileError::BadUtf8 => write!(f, "malformed modified UTF-8"),
            ClassFileError::BadDescriptor(d) => write!(f, "bad descriptor {}", d),
            ClassFileError::BadOpcode { offset, opcode } => {
                write!(f, "bad opcode {} at {}", opcode, offset)
            }
            ClassFileError::BadCodePosition { offset } => {
                write!(f, "code position {} is not an instruction boundary", offset)
            }
            ClassFileError::AttributeMismatch { name } => {
                write!(f, "{} attribute does not match its layout", name)
            }
            ClassFileError::Unsupported(what) => write!(f, "unsupported: {}", what),
            ClassFileError::TooLarge(what) => write!(f, "too many {} for a class file", what),
        }
    }
}
