use crate::classfile::{Constant, MemberRef};
use crate::error::Corruption;

use alloc::string::String;
use alloc::vec::Vec;
use widestring::{U16Str, U16String};

/// The partitions of a segment's constant pool.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum CpKind {
    Utf8,
    Int,
    Float,
    Long,
    Double,
    String,
    Class,
    Signature,
    Descr,
    Field,
    Method,
    IMethod,
}

impl CpKind {
    /// All partitions, in band order. Also the order of the combined index.
    pub const ALL: [CpKind; 12] = [
        CpKind::Utf8,
        CpKind::Int,
        CpKind::Float,
        CpKind::Long,
        CpKind::Double,
        CpKind::String,
        CpKind::Class,
        CpKind::Signature,
        CpKind::Descr,
        CpKind::Field,
        CpKind::Method,
        CpKind::IMethod,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CpKind::Utf8 => "cp_Utf8",
            CpKind::Int => "cp_Int",
            CpKind::Float => "cp_Float",
            CpKind::Long => "cp_Long",
            CpKind::Double => "cp_Double",
            CpKind::String => "cp_String",
            CpKind::Class => "cp_Class",
            CpKind::Signature => "cp_Signature",
            CpKind::Descr => "cp_Descr",
            CpKind::Field => "cp_Field",
            CpKind::Method => "cp_Method",
            CpKind::IMethod => "cp_Imethod",
        }
    }
}

/// A signature: a form with one `L` per class, and those classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEntry {
    pub form: usize,
    pub classes: Vec<usize>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DescrEntry {
    pub name: usize,
    pub signature: usize,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MemberEntry {
    pub class: usize,
    pub descr: usize,
}

/// Access to a constant pool by partition and index.
pub trait ConstantPoolProvider {
    fn len(&self, kind: CpKind) -> usize;

    /// Entry `index` of `kind`, as a class file constant.
    fn constant(&self, kind: CpKind, index: usize) -> Result<Constant, Corruption>;

    fn class_name(&self, index: usize) -> Result<&str, Corruption>;

    fn utf8(&self, index: usize) -> Result<&U16Str, Corruption>;

    /// The `(name, descriptor)` of a `cp_Descr` entry.
    fn descr(&self, index: usize) -> Result<(String, &str), Corruption>;

    /// The class and descr indexes of a member reference.
    fn member(&self, kind: CpKind, index: usize) -> Result<MemberEntry, Corruption>;

    /// Entry `index` of all partitions one after another.
    fn any(&self, index: usize) -> Result<Constant, Corruption> {
        let mut rest = index;
        for kind in CpKind::ALL {
            let len = self.len(kind);
            if rest < len {
                return self.constant(kind, rest);
            }
            rest -= len;
        }
        let len = CpKind::ALL.iter().map(|k| self.len(*k)).sum();
        return Err(Corruption::IndexOutOfRange {
            partition: "cp_All",
            index: index as i64,
            len,
        });
    }

    fn utf8_string(&self, index: usize) -> Result<String, Corruption> {
        return self.utf8(index)?.to_string().map_err(|_| Corruption::BadName {
            partition: CpKind::Utf8.name(),
            index,
        });
    }
}

fn out_of_range(kind: CpKind, index: usize, len: usize) -> Corruption {
    return Corruption::IndexOutOfRange {
        partition: kind.name(),
        index: index as i64,
        len,
    };
}

fn get<T>(kind: CpKind, items: &[T], index: usize) -> Result<&T, Corruption> {
    return items.get(index).ok_or_else(|| out_of_range(kind, index, items.len()));
}

/// A segment's constant pool.
///
/// Indexes between partitions are checked when the bands are read,
/// and class names and signatures are spelled out once up front.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstantPool {
    pub utf8: Vec<U16String>,
    pub int: Vec<i32>,
    pub float: Vec<u32>,
    pub long: Vec<i64>,
    pub double: Vec<u64>,
    /// Utf8 indexes.
    pub string: Vec<usize>,
    /// Utf8 indexes.
    pub class: Vec<usize>,
    pub signature: Vec<SignatureEntry>,
    pub descr: Vec<DescrEntry>,
    pub field: Vec<MemberEntry>,
    pub method: Vec<MemberEntry>,
    pub imethod: Vec<MemberEntry>,
    class_names: Vec<String>,
    signatures: Vec<String>,
}

impl ConstantPool {
    /// Spell out class names and signatures. Call once every partition is filled in.
    pub fn resolve_names(&mut self) -> Result<(), Corruption> {
        let mut class_names = Vec::with_capacity(self.class.len());
        for (i, utf8) in self.class.iter().enumerate() {
            let name = get(CpKind::Utf8, &self.utf8, *utf8)?;
            class_names.push(name.to_string().map_err(|_| Corruption::BadName {
                partition: CpKind::Class.name(),
                index: i,
            })?);
        }
        let mut signatures = Vec::with_capacity(self.signature.len());
        for (i, sig) in self.signature.iter().enumerate() {
            let bad = || Corruption::BadName {
                partition: CpKind::Signature.name(),
                index: i,
            };
            let form = get(CpKind::Utf8, &self.utf8, sig.form)?.to_string().map_err(|_| bad())?;
            let mut classes = sig.classes.iter();
            let mut text = String::with_capacity(form.len());
            for c in form.chars() {
                text.push(c);
                if c == 'L' {
                    let class = classes.next().ok_or_else(bad)?;
                    text.push_str(get(CpKind::Class, &class_names, *class)?);
                }
            }
            if classes.next().is_some() {
                return Err(bad());
            }
            signatures.push(text);
        }
        self.class_names = class_names;
        self.signatures = signatures;
        return Ok(());
    }

    pub fn signature_text(&self, index: usize) -> Result<&str, Corruption> {
        return get(CpKind::Signature, &self.signatures, index).map(|s| s.as_str());
    }

    fn member_ref(&self, kind: CpKind, index: usize) -> Result<MemberRef, Corruption> {
        let entry = self.member(kind, index)?;
        let (name, descriptor) = self.descr(entry.descr)?;
        return Ok(MemberRef {
            class: String::from(self.class_name(entry.class)?),
            name,
            descriptor: String::from(descriptor),
        });
    }
}

impl ConstantPoolProvider for ConstantPool {
    fn len(&self, kind: CpKind) -> usize {
        match kind {
            CpKind::Utf8 => self.utf8.len(),
            CpKind::Int => self.int.len(),
            CpKind::Float => self.float.len(),
            CpKind::Long => self.long.len(),
            CpKind::Double => self.double.len(),
            CpKind::String => self.string.len(),
            CpKind::Class => self.class.len(),
            CpKind::Signature => self.signature.len(),
            CpKind::Descr => self.descr.len(),
            CpKind::Field => self.field.len(),
            CpKind::Method => self.method.len(),
            CpKind::IMethod => self.imethod.len(),
        }
    }

    fn constant(&self, kind: CpKind, index: usize) -> Result<Constant, Corruption> {
        let constant = match kind {
            CpKind::Utf8 => Constant::Utf8(get(kind, &self.utf8, index)?.clone()),
            CpKind::Int => Constant::Integer(*get(kind, &self.int, index)?),
            CpKind::Float => Constant::Float(*get(kind, &self.float, index)?),
            CpKind::Long => Constant::Long(*get(kind, &self.long, index)?),
            CpKind::Double => Constant::Double(*get(kind, &self.double, index)?),
            CpKind::String => {
                let utf8 = *get(kind, &self.string, index)?;
                Constant::String(self.utf8(utf8)?.to_ustring())
            }
            CpKind::Class => Constant::Class(String::from(self.class_name(index)?)),
            CpKind::Signature => Constant::utf8(self.signature_text(index)?),
            CpKind::Descr => {
                let (name, descriptor) = self.descr(index)?;
                Constant::NameAndType {
                    name,
                    descriptor: String::from(descriptor),
                }
            }
            CpKind::Field => Constant::Field(self.member_ref(kind, index)?),
            CpKind::Method => Constant::Method(self.member_ref(kind, index)?),
            CpKind::IMethod => Constant::InterfaceMethod(self.member_ref(kind, index)?),
        };
        return Ok(constant);
    }

    fn class_name(&self, index: usize) -> Result<&str, Corruption> {
        return get(CpKind::Class, &self.class_names, index).map(|s| s.as_str());
    }

    fn utf8(&self, index: usize) -> Result<&U16Str, Corruption> {
        return get(CpKind::Utf8, &self.utf8, index).map(|s| s.as_ustr());
    }

    fn descr(&self, index: usize) -> Result<(String, &str), Corruption> {
        let entry = get(CpKind::Descr, &self.descr, index)?;
        return Ok((self.utf8_string(entry.name)?, self.signature_text(entry.signature)?));
    }

    fn member(&self, kind: CpKind, index: usize) -> Result<MemberEntry, Corruption> {
        let items = match kind {
            CpKind::Field => &self.field,
            CpKind::Method => &self.method,
            _ => &self.imethod,
        };
        return get(kind, items, index).copied();
    }
}
