//! The constant pool of a segment as the packer builds it.
//!
//! Everything the segment's classes refer to is collected first, partition by partition.
//! Each partition is then sorted and numbered, which fixes every index before any band
//! is written.

use super::attrs::visit_values;
use super::bands::BandWriter;
use crate::classfile::{AttrValue, Attribute, Class, Constant, InnerClass, Instruction, MemberRef, Operand};
use crate::codec::{CHAR3, DELTA5, UDELTA5, UNSIGNED5};
use crate::error::{Corruption, Error};
use crate::layout::{AttributeLayout, Element, RefKind, Reference};
use crate::parser::types::*;

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use alloc::vec::Vec;
use widestring::{U16Str, U16String};

/// Split a signature into its form and its classes.
///
/// Every `L` of the form is followed by a class name, running up to the next `;` or `<`.
pub fn split_signature(text: &str) -> (String, Vec<String>) {
    let mut form = String::with_capacity(text.len());
    let mut classes = Vec::new();
    let mut rest = text;
    while let Some(at) = rest.find('L') {
        form.push_str(&rest[..=at]);
        let tail = &rest[at + 1..];
        let end = tail.find([';', '<']).unwrap_or(tail.len());
        classes.push(String::from(&tail[..end]));
        rest = &tail[end..];
    }
    form.push_str(rest);
    return (form, classes);
}

/// The partition the segment keeps a class file constant in.
pub fn partition_of(constant: &Constant) -> CpKind {
    match constant {
        Constant::Utf8(_) => CpKind::Utf8,
        Constant::Integer(_) => CpKind::Int,
        Constant::Float(_) => CpKind::Float,
        Constant::Long(_) => CpKind::Long,
        Constant::Double(_) => CpKind::Double,
        Constant::String(_) => CpKind::String,
        Constant::Class(_) => CpKind::Class,
        Constant::NameAndType { .. } => CpKind::Descr,
        Constant::Field(_) => CpKind::Field,
        Constant::Method(_) => CpKind::Method,
        Constant::InterfaceMethod(_) => CpKind::IMethod,
    }
}

/// Text of a `Utf8` constant that a signature reference points at.
///
/// Lifting refuses classes whose signatures are not valid UTF-16, so nothing is lost here.
fn signature_text(constant: &Constant) -> Option<String> {
    match constant {
        Constant::Utf8(s) => return Some(s.to_string_lossy()),
        _ => return None,
    }
}

/// What a segment refers to, before numbering.
#[derive(Debug, Clone, Default)]
pub struct PoolCollector {
    utf8: BTreeSet<U16String>,
    int: BTreeSet<i32>,
    float: BTreeSet<u32>,
    long: BTreeSet<i64>,
    double: BTreeSet<u64>,
    string: BTreeSet<U16String>,
    class: BTreeSet<String>,
    signature: BTreeSet<String>,
    descr: BTreeSet<(String, String)>,
    field: BTreeSet<MemberRef>,
    method: BTreeSet<MemberRef>,
    imethod: BTreeSet<MemberRef>,
}

impl PoolCollector {
    pub fn new() -> PoolCollector {
        let mut collector = PoolCollector::default();
        collector.utf8.insert(U16String::new());
        return collector;
    }

    pub fn utf8(&mut self, s: &str) {
        self.utf8.insert(U16String::from_str(s));
    }

    pub fn class(&mut self, name: &str) {
        if self.class.insert(String::from(name)) {
            self.utf8(name);
        }
    }

    pub fn signature(&mut self, text: &str) {
        if self.signature.insert(String::from(text)) {
            let (form, classes) = split_signature(text);
            self.utf8(&form);
            for class in classes {
                self.class(&class);
            }
        }
    }

    pub fn descr(&mut self, name: &str, descriptor: &str) {
        if self.descr.insert((String::from(name), String::from(descriptor))) {
            self.utf8(name);
            self.signature(descriptor);
        }
    }

    fn member(&mut self, kind: CpKind, member: &MemberRef) {
        let set = match kind {
            CpKind::Field => &mut self.field,
            CpKind::Method => &mut self.method,
            _ => &mut self.imethod,
        };
        if set.insert(member.clone()) {
            self.class(&member.class);
            self.descr(&member.name, &member.descriptor);
        }
    }

    pub fn constant(&mut self, constant: &Constant) {
        match constant {
            Constant::Utf8(s) => {
                self.utf8.insert(s.clone());
            }
            Constant::Integer(v) => {
                self.int.insert(*v);
            }
            Constant::Float(v) => {
                self.float.insert(*v);
            }
            Constant::Long(v) => {
                self.long.insert(*v);
            }
            Constant::Double(v) => {
                self.double.insert(*v);
            }
            Constant::String(s) => {
                if self.string.insert(s.clone()) {
                    self.utf8.insert(s.clone());
                }
            }
            Constant::Class(name) => self.class(name),
            Constant::NameAndType { name, descriptor } => self.descr(name, descriptor),
            Constant::Field(m) => self.member(CpKind::Field, m),
            Constant::Method(m) => self.member(CpKind::Method, m),
            Constant::InterfaceMethod(m) => self.member(CpKind::IMethod, m),
        }
    }

    fn reference(&mut self, reference: &Reference, constant: &Constant) {
        if reference.kind == RefKind::Signature {
            if let Some(text) = signature_text(constant) {
                self.signature(&text);
            }
            return;
        }
        self.constant(constant);
    }

    fn layout_values(&mut self, layout: &AttributeLayout, values: &[AttrValue]) {
        let top = match layout.callables().first() {
            Some(c) => c.body.as_slice(),
            None => return,
        };
        let _: Result<(), ()> = visit_values(layout, top, values, 0, &mut |id, value, _| {
            if let (Element::Reference(r), AttrValue::Ref(Some(c))) = (layout.element(id), value) {
                self.reference(r, c);
            }
            return Ok(());
        });
    }

    fn attributes(&mut self, attributes: &[Attribute]) {
        for attribute in attributes {
            match attribute {
                Attribute::Layout(l) => self.layout_values(&l.layout, &l.values),
                Attribute::Code(code) => {
                    for insn in &code.instructions {
                        self.instruction(insn);
                    }
                    for h in &code.handlers {
                        if let Some(class) = &h.catch_type {
                            self.class(class);
                        }
                    }
                    self.attributes(&code.attributes);
                }
                Attribute::InnerClasses(list) => self.inner_classes(list),
            }
        }
    }

    fn instruction(&mut self, insn: &Instruction) {
        match &insn.operand {
            Operand::Constant(c) | Operand::EscapedRef { constant: c, .. } => self.constant(c),
            Operand::MultiANewArray { class, .. } => self.class(class),
            _ => {}
        }
    }

    pub fn inner_classes(&mut self, list: &[InnerClass]) {
        for ic in list {
            self.class(&ic.inner);
            if let Some(outer) = &ic.outer {
                self.class(outer);
            }
            if let Some(name) = &ic.name {
                self.utf8(name);
            }
        }
    }

    /// Everything `class` refers to.
    pub fn class_file(&mut self, class: &Class) {
        self.class(&class.this_class);
        if let Some(super_class) = &class.super_class {
            self.class(super_class);
        }
        for interface in &class.interfaces {
            self.class(interface);
        }
        for member in class.fields.iter().chain(class.methods.iter()) {
            self.descr(&member.name, &member.descriptor);
            self.attributes(&member.attributes);
        }
        self.attributes(&class.attributes);
    }

    pub fn has_numbers(&self) -> bool {
        return !(self.int.is_empty() && self.float.is_empty() && self.long.is_empty() && self.double.is_empty());
    }

    /// Number every partition.
    pub fn freeze(self) -> Result<SegmentPool, Error> {
        let utf8 = numbered(self.utf8.iter().cloned());
        let class = numbered(self.class.iter().cloned());
        let signature = numbered(self.signature.iter().cloned());
        let descr = numbered(self.descr.iter().cloned());
        let mut frozen = SegmentPool {
            pool: ConstantPool::default(),
            utf8,
            int: numbered(self.int.iter().copied()),
            float: numbered(self.float.iter().copied()),
            long: numbered(self.long.iter().copied()),
            double: numbered(self.double.iter().copied()),
            string: numbered(self.string.iter().cloned()),
            class,
            signature,
            descr,
            field: numbered(self.field.iter().cloned()),
            method: numbered(self.method.iter().cloned()),
            imethod: numbered(self.imethod.iter().cloned()),
        };

        let mut pool = ConstantPool::default();
        pool.utf8 = self.utf8.into_iter().collect();
        pool.int = self.int.into_iter().collect();
        pool.float = self.float.into_iter().collect();
        pool.long = self.long.into_iter().collect();
        pool.double = self.double.into_iter().collect();
        for s in &self.string {
            pool.string.push(frozen.utf16(s)?);
        }
        for name in &self.class {
            pool.class.push(frozen.utf8(name)?);
        }
        for text in &self.signature {
            let (form, classes) = split_signature(text);
            let mut entry = SignatureEntry {
                form: frozen.utf8(&form)?,
                classes: Vec::with_capacity(classes.len()),
            };
            for c in classes {
                entry.classes.push(frozen.class(&c)?);
            }
            pool.signature.push(entry);
        }
        for (name, descriptor) in &self.descr {
            pool.descr.push(DescrEntry {
                name: frozen.utf8(name)?,
                signature: frozen.signature(descriptor)?,
            });
        }
        for (kind, set) in [
            (CpKind::Field, &self.field),
            (CpKind::Method, &self.method),
            (CpKind::IMethod, &self.imethod),
        ] {
            let mut entries = Vec::with_capacity(set.len());
            for m in set {
                entries.push(MemberEntry {
                    class: frozen.class(&m.class)?,
                    descr: frozen.descr(&m.name, &m.descriptor)?,
                });
            }
            match kind {
                CpKind::Field => pool.field = entries,
                CpKind::Method => pool.method = entries,
                _ => pool.imethod = entries,
            }
        }
        pool.resolve_names()?;
        frozen.pool = pool;
        return Ok(frozen);
    }
}

fn numbered<K: Ord>(items: impl Iterator<Item = K>) -> BTreeMap<K, usize> {
    return items.enumerate().map(|(i, k)| (k, i)).collect();
}

fn missing(kind: CpKind, len: usize) -> Error {
    return Error::corrupt(Corruption::IndexOutOfRange {
        partition: kind.name(),
        index: -1,
        len,
    });
}

fn lookup<K: Ord + ?Sized, Q: Ord>(map: &BTreeMap<Q, usize>, key: &K, kind: CpKind) -> Result<usize, Error>
where
    Q: core::borrow::Borrow<K>,
{
    return map.get(key).copied().ok_or_else(|| missing(kind, map.len()));
}

/// A numbered segment constant pool.
#[derive(Debug, Clone)]
pub struct SegmentPool {
    /// The pool the way the unpacker will see it.
    pub pool: ConstantPool,
    utf8: BTreeMap<U16String, usize>,
    int: BTreeMap<i32, usize>,
    float: BTreeMap<u32, usize>,
    long: BTreeMap<i64, usize>,
    double: BTreeMap<u64, usize>,
    string: BTreeMap<U16String, usize>,
    class: BTreeMap<String, usize>,
    signature: BTreeMap<String, usize>,
    descr: BTreeMap<(String, String), usize>,
    field: BTreeMap<MemberRef, usize>,
    method: BTreeMap<MemberRef, usize>,
    imethod: BTreeMap<MemberRef, usize>,
}

impl SegmentPool {
    pub fn utf8(&self, s: &str) -> Result<usize, Error> {
        return self.utf16(&U16String::from_str(s));
    }

    fn utf16(&self, s: &U16Str) -> Result<usize, Error> {
        return lookup(&self.utf8, s, CpKind::Utf8);
    }

    pub fn class(&self, name: &str) -> Result<usize, Error> {
        return lookup(&self.class, name, CpKind::Class);
    }

    pub fn signature(&self, text: &str) -> Result<usize, Error> {
        return lookup(&self.signature, text, CpKind::Signature);
    }

    pub fn descr(&self, name: &str, descriptor: &str) -> Result<usize, Error> {
        let key = (String::from(name), String::from(descriptor));
        return lookup(&self.descr, &key, CpKind::Descr);
    }

    pub fn member(&self, kind: CpKind, member: &MemberRef) -> Result<usize, Error> {
        let map = match kind {
            CpKind::Field => &self.field,
            CpKind::Method => &self.method,
            _ => &self.imethod,
        };
        return lookup(map, member, kind);
    }

    pub fn len(&self, kind: CpKind) -> usize {
        return self.pool.len(kind);
    }

    /// The index of `constant` in partition `kind`.
    pub fn constant(&self, kind: CpKind, constant: &Constant) -> Result<usize, Error> {
        let index = match (kind, constant) {
            (CpKind::Utf8, Constant::Utf8(s)) => self.utf16(s),
            (CpKind::Int, Constant::Integer(v)) => lookup(&self.int, v, kind),
            (CpKind::Float, Constant::Float(v)) => lookup(&self.float, v, kind),
            (CpKind::Long, Constant::Long(v)) => lookup(&self.long, v, kind),
            (CpKind::Double, Constant::Double(v)) => lookup(&self.double, v, kind),
            (CpKind::String, Constant::String(s)) => lookup(&self.string, s.as_ustr(), kind),
            (CpKind::Class, Constant::Class(name)) => self.class(name),
            (CpKind::Signature, c) => match signature_text(c) {
                Some(text) => self.signature(&text),
                None => Err(missing(kind, self.len(kind))),
            },
            (CpKind::Descr, Constant::NameAndType { name, descriptor }) => self.descr(name, descriptor),
            (CpKind::Field, Constant::Field(m))
            | (CpKind::Method, Constant::Method(m))
            | (CpKind::IMethod, Constant::InterfaceMethod(m)) => self.member(kind, m),
            _ => Err(missing(kind, self.len(kind))),
        };
        return index;
    }

    /// The index of `constant` in all partitions one after another.
    pub fn any(&self, constant: &Constant) -> Result<usize, Error> {
        let kind = partition_of(constant);
        let mut offset = 0;
        for k in CpKind::ALL {
            if k == kind {
                break;
            }
            offset += self.len(k);
        }
        return Ok(offset + self.constant(kind, constant)?);
    }

    /// The band value of a reference element.
    pub fn reference(&self, reference: &Reference, constant: Option<&Constant>) -> Result<i64, Error> {
        let constant = match constant {
            Some(c) => c,
            None if reference.nullable => return Ok(0),
            None => return Err(missing(CpKind::Utf8, 0)),
        };
        let index = match reference.kind {
            RefKind::Signature => self.constant(CpKind::Signature, constant)?,
            RefKind::Any => self.any(constant)?,
            _ => self.constant(partition_of(constant), constant)?,
        };
        return Ok(index as i64 + reference.nullable as i64);
    }

    pub fn counts(&self) -> CpCounts {
        return CpCounts {
            utf8: self.len(CpKind::Utf8),
            int: self.len(CpKind::Int),
            float: self.len(CpKind::Float),
            long: self.len(CpKind::Long),
            double: self.len(CpKind::Double),
            string: self.len(CpKind::String),
            class: self.len(CpKind::Class),
            signature: self.len(CpKind::Signature),
            descr: self.len(CpKind::Descr),
            field: self.len(CpKind::Field),
            method: self.len(CpKind::Method),
            imethod: self.len(CpKind::IMethod),
        };
    }

    /// Write every partition, in band order.
    pub fn write(&self, w: &mut BandWriter) -> Result<(), Error> {
        let pool = &self.pool;
        utf8_partition(w, &pool.utf8)?;
        let ints: Vec<i64> = pool.int.iter().map(|v| *v as i64).collect();
        w.band("cp_Int", UDELTA5, &ints)?;
        let floats: Vec<i64> = pool.float.iter().map(|v| *v as i32 as i64).collect();
        w.band("cp_Float", UDELTA5, &floats)?;
        let longs: Vec<u64> = pool.long.iter().map(|v| *v as u64).collect();
        wide_partition(w, "cp_Long_hi", "cp_Long_lo", &longs)?;
        wide_partition(w, "cp_Double_hi", "cp_Double_lo", &pool.double)?;
        w.counts("cp_String", UDELTA5, &pool.string)?;
        w.counts("cp_Class", UDELTA5, &pool.class)?;
        let forms: Vec<usize> = pool.signature.iter().map(|s| s.form).collect();
        w.counts("cp_Signature_form", DELTA5, &forms)?;
        let classes: Vec<usize> = pool.signature.iter().flat_map(|s| s.classes.iter().copied()).collect();
        w.counts("cp_Signature_classes", UDELTA5, &classes)?;
        let names: Vec<usize> = pool.descr.iter().map(|d| d.name).collect();
        w.counts("cp_Descr_name", DELTA5, &names)?;
        let types: Vec<usize> = pool.descr.iter().map(|d| d.signature).collect();
        w.counts("cp_Descr_type", UDELTA5, &types)?;
        members(w, "cp_Field_class", "cp_Field_desc", &pool.field)?;
        members(w, "cp_Method_class", "cp_Method_desc", &pool.method)?;
        members(w, "cp_Imethod_class", "cp_Imethod_desc", &pool.imethod)?;
        return Ok(());
    }
}

/// Strings as shared prefixes and suffixes. An empty suffix goes to the big suffix bands.
fn utf8_partition(w: &mut BandWriter, strings: &[U16String]) -> Result<(), Error> {
    let mut prefixes = Vec::new();
    let mut suffixes = Vec::new();
    let mut chars = Vec::new();
    let mut big: Vec<Vec<i64>> = Vec::new();
    for i in 1..strings.len() {
        let previous = strings[i - 1].as_slice();
        let current = strings[i].as_slice();
        let prefix = if i >= 2 {
            let shared = previous.iter().zip(current.iter()).take_while(|(a, b)| a == b).count();
            prefixes.push(shared);
            shared
        } else {
            0
        };
        let suffix = &current[prefix..];
        if suffix.is_empty() {
            suffixes.push(0);
            big.push(Vec::new());
        } else {
            suffixes.push(suffix.len());
            chars.extend(suffix.iter().map(|c| *c as i64));
        }
    }
    w.counts("cp_Utf8_prefix", DELTA5, &prefixes)?;
    w.counts("cp_Utf8_suffix", UNSIGNED5, &suffixes)?;
    w.band("cp_Utf8_chars", CHAR3, &chars)?;
    let sizes: Vec<usize> = big.iter().map(|b| b.len()).collect();
    w.counts("cp_Utf8_big_suffix", DELTA5, &sizes)?;
    for chars in big {
        w.band("cp_Utf8_big_chars", DELTA5, &chars)?;
    }
    return Ok(());
}

fn wide_partition(w: &mut BandWriter, hi_name: &'static str, lo_name: &'static str, values: &[u64]) -> Result<(), Error> {
    let hi: Vec<i64> = values.iter().map(|v| (*v >> 32) as u32 as i32 as i64).collect();
    let lo: Vec<i64> = values.iter().map(|v| *v as u32 as i32 as i64).collect();
    w.band(hi_name, UDELTA5, &hi)?;
    return w.band(lo_name, DELTA5, &lo);
}

fn members(w: &mut BandWriter, class_name: &'static str, desc_name: &'static str, entries: &[MemberEntry]) -> Result<(), Error> {
    let classes: Vec<usize> = entries.iter().map(|e| e.class).collect();
    let descrs: Vec<usize> = entries.iter().map(|e| e.descr).collect();
    w.counts(class_name, DELTA5, &classes)?;
    return w.counts(desc_name, UDELTA5, &descrs);
}
