//! Writing classes.
//!
//! A class is emitted twice: once into a [`ConstantCollector`] to learn which constants it
//! uses, then again into the [`ConstantPoolBuilder`] made from what was collected.
//! Constants loaded by `ldc` get the lowest indexes so that they fit into one byte.

use super::*;

use alloc::collections::{BTreeMap, BTreeSet};

/// Something that hands out constant pool indexes.
pub trait ConstantSink {
    /// The index of `constant`. `narrow` asks for an index below 256.
    fn index(&mut self, constant: &Constant, narrow: bool) -> Result<u16, ClassFileError>;
}

/// Records the constants a class uses, in order of first use.
#[derive(Debug, Clone, Default)]
pub struct ConstantCollector {
    order: Vec<Constant>,
    seen: BTreeSet<Constant>,
    narrow: BTreeSet<Constant>,
}

impl ConstantSink for ConstantCollector {
    fn index(&mut self, constant: &Constant, narrow: bool) -> Result<u16, ClassFileError> {
        if self.seen.insert(constant.clone()) {
            self.order.push(constant.clone());
        }
        if narrow {
            self.narrow.insert(constant.clone());
        }
        return Ok(0);
    }
}

impl ConstantCollector {
    /// Lay out a constant pool: narrow constants first, then everything else in order of use.
    pub fn into_pool(self) -> Result<ConstantPoolBuilder, ClassFileError> {
        let mut pool = ConstantPoolBuilder::default();
        for c in self.order.iter().filter(|c| self.narrow.contains(*c)) {
            pool.insert(c)?;
        }
        for c in self.order.iter() {
            pool.add(c)?;
        }
        return Ok(pool);
    }
}

/// A constant pool under construction.
#[derive(Debug, Clone)]
pub struct ConstantPoolBuilder {
    entries: Vec<Option<Constant>>,
    indexes: BTreeMap<Constant, u16>,
}

impl Default for ConstantPoolBuilder {
    fn default() -> Self {
        return ConstantPoolBuilder {
            entries: vec![None],
            indexes: BTreeMap::new(),
        };
    }
}

fn components(c: &Constant) -> Vec<Constant> {
    match c {
        Constant::Class(name) => return vec![Constant::utf8(name)],
        Constant::String(s) => return vec![Constant::Utf8(s.clone())],
        Constant::NameAndType { name, descriptor } => return vec![Constant::utf8(name), Constant::utf8(descriptor)],
        Constant::Field(m) | Constant::Method(m) | Constant::InterfaceMethod(m) => {
            return vec![
                Constant::Class(m.class.clone()),
                Constant::NameAndType {
                    name: m.name.clone(),
                    descriptor: m.descriptor.clone(),
                },
            ]
        }
        _ => return Vec::new(),
    }
}

impl ConstantPoolBuilder {
    /// Give `c` an index without adding what it refers to.
    fn insert(&mut self, c: &Constant) -> Result<u16, ClassFileError> {
        if let Some(i) = self.indexes.get(c) {
            return Ok(*i);
        }
        let index = u16::try_from(self.entries.len())
            .ok()
            .filter(|i| *i < u16::MAX - 1)
            .ok_or(ClassFileError::TooLarge("constants"))?;
        self.entries.push(Some(c.clone()));
        if c.is_wide() {
            self.entries.push(None);
        }
        self.indexes.insert(c.clone(), index);
        return Ok(index);
    }

    /// Add `c` and everything it refers to.
    pub fn add(&mut self, c: &Constant) -> Result<u16, ClassFileError> {
        let index = self.insert(c)?;
        for component in components(c) {
            self.add(&component)?;
        }
        return Ok(index);
    }

    /// Names of all `CONSTANT_Class` entries.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        return self.entries.iter().filter_map(|e| match e {
            Some(Constant::Class(name)) => Some(name.as_str()),
            _ => None,
        });
    }

    /// The `constant_pool_count` and the entries, as they appear in a class file.
    pub fn write(&self, out: &mut Vec<u8>) -> Result<(), ClassFileError> {
        out.extend_from_slice(&(self.entries.len() as u16).to_be_bytes());
        for entry in self.entries.iter().flatten() {
            let index = |c: &Constant| -> Result<[u8; 2], ClassFileError> {
                let i = self.indexes.get(c).ok_or(ClassFileError::BadConstantIndex(0))?;
                return Ok(i.to_be_bytes());
            };
            match entry {
                Constant::Utf8(s) => {
                    let bytes = encode_modified_utf8(s.as_slice());
                    let len = u16::try_from(bytes.len()).map_err(|_| ClassFileError::TooLarge("string bytes"))?;
                    out.push(1);
                    out.extend_from_slice(&len.to_be_bytes());
                    out.extend_from_slice(&bytes);
                }
                Constant::Integer(v) => {
                    out.push(3);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Float(v) => {
                    out.push(4);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Long(v) => {
                    out.push(5);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Double(v) => {
                    out.push(6);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                Constant::Class(name) => {
                    out.push(7);
                    out.extend_from_slice(&index(&Constant::utf8(name))?);
                }
                Constant::String(s) => {
                    out.push(8);
                    out.extend_from_slice(&index(&Constant::Utf8(s.clone()))?);
                }
                Constant::Field(_) | Constant::Method(_) | Constant::InterfaceMethod(_) => {
                    out.push(match entry {
                        Constant::Field(_) => 9,
                        Constant::Method(_) => 10,
                        _ => 11,
                    });
                    for component in components(entry) {
                        out.extend_from_slice(&index(&component)?);
                    }
                }
                Constant::NameAndType { name, descriptor } => {
                    out.push(12);
                    out.extend_from_slice(&index(&Constant::utf8(name))?);
                    out.extend_from_slice(&index(&Constant::utf8(descriptor))?);
                }
            }
        }
        return Ok(());
    }
}

impl ConstantSink for ConstantPoolBuilder {
    fn index(&mut self, constant: &Constant, _narrow: bool) -> Result<u16, ClassFileError> {
        return self.add(constant);
    }
}

/// Encode UTF-16 code units as modified UTF-8.
pub fn encode_modified_utf8(units: &[u16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(units.len());
    for u in units.iter().map(|u| *u as u32) {
        match u {
            0x01..=0x7F => out.push(u as u8),
            0x00 | 0x80..=0x7FF => out.extend_from_slice(&[0xC0 | (u >> 6) as u8, 0x80 | (u & 0x3F) as u8]),
            _ => out.extend_from_slice(&[
                0xE0 | (u >> 12) as u8,
                0x80 | ((u >> 6) & 0x3F) as u8,
                0x80 | (u & 0x3F) as u8,
            ]),
        }
    }
    return out;
}

fn u2_len(len: usize, what: &'static str) -> Result<[u8; 2], ClassFileError> {
    let len = u16::try_from(len).map_err(|_| ClassFileError::TooLarge(what))?;
    return Ok(len.to_be_bytes());
}

fn write_attribute<S: ConstantSink>(
    out: &mut Vec<u8>,
    pool: &mut S,
    name: &str,
    info: &[u8],
) -> Result<(), ClassFileError> {
    let len = u32::try_from(info.len()).map_err(|_| ClassFileError::TooLarge("attribute bytes"))?;
    out.extend_from_slice(&pool.index(&Constant::utf8(name), false)?.to_be_bytes());
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(info);
    return Ok(());
}

fn write_attributes<S: ConstantSink>(
    out: &mut Vec<u8>,
    pool: &mut S,
    attributes: &[Attribute],
    offsets: Option<&[usize]>,
) -> Result<(), ClassFileError> {
    out.extend_from_slice(&u2_len(attributes.len(), "attributes")?);
    for attribute in attributes {
        let info = match attribute {
            Attribute::Code(code) => code_body(pool, code)?,
            Attribute::InnerClasses(ics) => {
                let mut info = Vec::with_capacity(2 + 8 * ics.len());
                info.extend_from_slice(&u2_len(ics.len(), "inner classes")?);
                for ic in ics {
                    info.extend_from_slice(&pool.index(&Constant::Class(ic.inner.clone()), false)?.to_be_bytes());
                    let outer = match &ic.outer {
                        Some(outer) => pool.index(&Constant::Class(outer.clone()), false)?,
                        None => 0,
                    };
                    info.extend_from_slice(&outer.to_be_bytes());
                    let name = match &ic.name {
                        Some(name) => pool.index(&Constant::utf8(name), false)?,
                        None => 0,
                    };
                    info.extend_from_slice(&name.to_be_bytes());
                    info.extend_from_slice(&ic.flags.to_be_bytes());
                }
                info
            }
            Attribute::Layout(l) => render_layout_attribute(l, pool, offsets)?,
        };
        write_attribute(out, pool, attribute.name(), &info)?;
    }
    return Ok(());
}

fn code_body<S: ConstantSink>(pool: &mut S, code: &Code) -> Result<Vec<u8>, ClassFileError> {
    let (bytes, offsets) = encode_code(&code.instructions, pool)?;
    let mut out = Vec::with_capacity(bytes.len() + 12);
    out.extend_from_slice(&code.max_stack.to_be_bytes());
    out.extend_from_slice(&code.max_locals.to_be_bytes());
    out.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    out.extend_from_slice(&bytes);
    out.extend_from_slice(&u2_len(code.handlers.len(), "exception handlers")?);
    let pc = |index: usize| -> Result<[u8; 2], ClassFileError> {
        let offset = offsets.get(index).ok_or(ClassFileError::BadCodePosition {
            offset: index as i64,
        })?;
        return Ok((*offset as u16).to_be_bytes());
    };
    for handler in code.handlers.iter() {
        out.extend_from_slice(&pc(handler.start)?);
        out.extend_from_slice(&pc(handler.end)?);
        out.extend_from_slice(&pc(handler.handler)?);
        let catch = match &handler.catch_type {
            Some(class) => pool.index(&Constant::Class(class.clone()), false)?,
            None => 0,
        };
        out.extend_from_slice(&catch.to_be_bytes());
    }
    write_attributes(&mut out, pool, &code.attributes, Some(&offsets))?;
    return Ok(out);
}

fn write_member<S: ConstantSink>(out: &mut Vec<u8>, pool: &mut S, member: &Member) -> Result<(), ClassFileError> {
    out.extend_from_slice(&member.access_flags.to_be_bytes());
    out.extend_from_slice(&pool.index(&Constant::utf8(&member.name), false)?.to_be_bytes());
    out.extend_from_slice(&pool.index(&Constant::utf8(&member.descriptor), false)?.to_be_bytes());
    return write_attributes(out, pool, &member.attributes, None);
}

/// Everything of a class file after the constant pool.
fn class_body<S: ConstantSink>(pool: &mut S, class: &Class) -> Result<Vec<u8>, ClassFileError> {
    let mut out = Vec::new();
    out.extend_from_slice(&class.access_flags.to_be_bytes());
    out.extend_from_slice(&pool.index(&Constant::Class(class.this_class.clone()), false)?.to_be_bytes());
    let super_class = match &class.super_class {
        Some(name) => pool.index(&Constant::Class(name.clone()), false)?,
        None => 0,
    };
    out.extend_from_slice(&super_class.to_be_bytes());
    out.extend_from_slice(&u2_len(class.interfaces.len(), "interfaces")?);
    for interface in class.interfaces.iter() {
        out.extend_from_slice(&pool.index(&Constant::Class(interface.clone()), false)?.to_be_bytes());
    }
    out.extend_from_slice(&u2_len(class.fields.len(), "fields")?);
    for field in class.fields.iter() {
        write_member(&mut out, pool, field)?;
    }
    out.extend_from_slice(&u2_len(class.methods.len(), "methods")?);
    for method in class.methods.iter() {
        write_member(&mut out, pool, method)?;
    }
    write_attributes(&mut out, pool, &class.attributes, None)?;
    return Ok(out);
}

/// The constant pool `class` would be written with.
pub fn constant_pool_of(class: &Class) -> Result<ConstantPoolBuilder, ClassFileError> {
    let mut collector = ConstantCollector::default();
    class_body(&mut collector, class)?;
    return collector.into_pool();
}

/// Write `class` as a class file.
pub fn write_class(class: &Class) -> Result<Vec<u8>, ClassFileError> {
    let mut pool = constant_pool_of(class)?;
    let body = class_body(&mut pool, class)?;
    let mut out = Vec::with_capacity(body.len() + 1024);
    out.extend_from_slice(&MAGIC.to_be_bytes());
    out.extend_from_slice(&class.minor_version.to_be_bytes());
    out.extend_from_slice(&class.major_version.to_be_bytes());
    pool.write(&mut out)?;
    out.extend_from_slice(&body);
    return Ok(out);
}
