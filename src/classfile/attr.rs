//! Attributes described by layouts: between class file bytes and [`AttrValue`] trees.

use super::*;
use crate::layout::{union_case, Element, ElementId, Integral, IntegralKind, RefKind, Reference, Width};

fn mismatch(layout: &AttributeLayout) -> ClassFileError {
    return ClassFileError::AttributeMismatch {
        name: String::from(layout.name()),
    };
}

fn write_width(out: &mut Vec<u8>, width: Width, value: i64) {
    match width {
        Width::Byte => out.push(value as u8),
        Width::Short => out.extend_from_slice(&(value as u16).to_be_bytes()),
        Width::Int => out.extend_from_slice(&(value as u32).to_be_bytes()),
        Width::Void => {}
    }
}

/// Writes the bytes of a layout attribute.
struct Renderer<'a, S> {
    layout: &'a AttributeLayout,
    pool: &'a mut S,
    offsets: Option<&'a [usize]>,
    out: Vec<u8>,
    /// Instruction index of the last `P` or `PO` value.
    last: Option<usize>,
}

impl<'a, S: ConstantSink> Renderer<'a, S> {
    fn offset(&self, index: i64) -> Result<usize, ClassFileError> {
        let offsets = self.offsets.ok_or_else(|| mismatch(self.layout))?;
        let index = usize::try_from(index).map_err(|_| ClassFileError::BadCodePosition { offset: index })?;
        return offsets
            .get(index)
            .copied()
            .ok_or(ClassFileError::BadCodePosition { offset: index as i64 });
    }

    fn integral(&mut self, integral: &Integral, value: i64) -> Result<(), ClassFileError> {
        let written = match integral.kind {
            IntegralKind::Unsigned | IntegralKind::Signed | IntegralKind::Flag => value,
            IntegralKind::Bci => {
                self.last = Some(value as usize);
                self.offset(value)? as i64
            }
            IntegralKind::BciOffset => {
                let index = self.last.map(|l| l as i64).unwrap_or(0) + value;
                self.last = Some(index as usize);
                self.offset(index)? as i64
            }
            IntegralKind::Offset | IntegralKind::SignedOffset => {
                let from = self.last.ok_or_else(|| mismatch(self.layout))? as i64;
                self.offset(from + value)? as i64 - self.offset(from)? as i64
            }
        };
        write_width(&mut self.out, integral.width, written);
        return Ok(());
    }

    fn body(&mut self, ids: &[ElementId], values: &[AttrValue]) -> Result<(), ClassFileError> {
        if ids.len() != values.len() {
            return Err(mismatch(self.layout));
        }
        let layout = self.layout;
        for (id, value) in ids.iter().zip(values) {
            match (layout.element(*id), value) {
                (Element::Integral(i), AttrValue::Int(v)) => self.integral(i, *v)?,
                (Element::Reference(r), AttrValue::Ref(c)) => {
                    let index = match c {
                        None if r.nullable => 0,
                        None => return Err(mismatch(layout)),
                        Some(c) => self.pool.index(c, r.width == Width::Byte)?,
                    };
                    if r.width == Width::Byte && index > 255 {
                        return Err(ClassFileError::TooLarge("byte-wide constant references"));
                    }
                    write_width(&mut self.out, r.width, index as i64);
                }
                (Element::Replication { count, body }, AttrValue::Replication(items)) => {
                    write_width(&mut self.out, count.width, items.len() as i64);
                    for item in items {
                        self.body(body, item)?;
                    }
                }
                (Element::Union { tag, cases, default }, AttrValue::Union { tag: t, body }) => {
                    write_width(&mut self.out, tag.width, *t as i64);
                    self.body(union_case(cases, default, *t), body)?;
                }
                (Element::Call { callable }, AttrValue::Call(values)) => {
                    self.body(&layout.callables()[*callable].body, values)?;
                }
                _ => return Err(mismatch(layout)),
            }
        }
        return Ok(());
    }
}

/// The bytes of `attr`, with its constants added to `pool`.
///
/// `offsets` are the code offsets of the enclosing method for attributes of code.
pub fn render_layout_attribute<S: ConstantSink>(
    attr: &LayoutAttribute,
    pool: &mut S,
    offsets: Option<&[usize]>,
) -> Result<Vec<u8>, ClassFileError> {
    let layout: &AttributeLayout = &attr.layout;
    let mut renderer = Renderer {
        layout,
        pool,
        offsets,
        out: Vec::new(),
        last: None,
    };
    let top = match layout.callables().first() {
        Some(c) => &c.body,
        None => return Err(mismatch(layout)),
    };
    renderer.body(top, &attr.values)?;
    return Ok(renderer.out);
}

/// Reads the bytes of a layout attribute.
struct Reader<'a> {
    layout: &'a AttributeLayout,
    pool: &'a ClassPool,
    offsets: Option<&'a [usize]>,
    field_descriptor: Option<&'a str>,
    input: &'a [u8],
    last: Option<usize>,
    max_depth: usize,
}

impl<'a> Reader<'a> {
    fn read(&mut self, width: Width, signed: bool) -> Result<i64, ClassFileError> {
        let n = width.bytes();
        if self.input.len() < n {
            return Err(mismatch(self.layout));
        }
        let (bytes, rest) = self.input.split_at(n);
        self.input = rest;
        let v = match (width, signed) {
            (Width::Void, _) => 0,
            (Width::Byte, false) => bytes[0] as i64,
            (Width::Byte, true) => bytes[0] as i8 as i64,
            (Width::Short, false) => u16::from_be_bytes([bytes[0], bytes[1]]) as i64,
            (Width::Short, true) => i16::from_be_bytes([bytes[0], bytes[1]]) as i64,
            (Width::Int, false) => u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64,
            (Width::Int, true) => i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64,
        };
        return Ok(v);
    }

    fn index_of(&self, offset: i64) -> Result<usize, ClassFileError> {
        let offsets = self.offsets.ok_or_else(|| mismatch(self.layout))?;
        return instruction_at(offsets, offset);
    }

    fn integral(&mut self, integral: &Integral) -> Result<i64, ClassFileError> {
        let raw = self.read(integral.width, integral.kind.is_signed())?;
        match integral.kind {
            IntegralKind::Unsigned | IntegralKind::Signed | IntegralKind::Flag => return Ok(raw),
            IntegralKind::Bci => {
                let index = self.index_of(raw)?;
                self.last = Some(index);
                return Ok(index as i64);
            }
            IntegralKind::BciOffset => {
                let index = self.index_of(raw)?;
                let from = self.last.unwrap_or(0) as i64;
                self.last = Some(index);
                return Ok(index as i64 - from);
            }
            IntegralKind::Offset | IntegralKind::SignedOffset => {
                let from = self.last.ok_or_else(|| mismatch(self.layout))?;
                let start = self.offsets.and_then(|o| o.get(from).copied()).unwrap_or(0) as i64;
                let index = self.index_of(start + raw)?;
                return Ok(index as i64 - from as i64);
            }
        }
    }

    fn reference(&mut self, r: &Reference) -> Result<Option<Constant>, ClassFileError> {
        let index = self.read(r.width, false)? as u16;
        let constant = match self.pool.get_optional(index)? {
            None if r.nullable => return Ok(None),
            None => return Err(ClassFileError::BadConstantIndex(0)),
            Some(c) => c,
        };
        let fits = match (r.kind, constant) {
            (RefKind::Int, Constant::Integer(_))
            | (RefKind::Long, Constant::Long(_))
            | (RefKind::Float, Constant::Float(_))
            | (RefKind::Double, Constant::Double(_))
            | (RefKind::String, Constant::String(_))
            | (RefKind::Class, Constant::Class(_))
            | (RefKind::Signature, Constant::Utf8(_))
            | (RefKind::Utf8, Constant::Utf8(_))
            | (RefKind::Descr, Constant::NameAndType { .. })
            | (RefKind::Field, Constant::Field(_))
            | (RefKind::Method, Constant::Method(_))
            | (RefKind::IMethod, Constant::InterfaceMethod(_))
            | (RefKind::Any, _) => true,
            (RefKind::FieldConstant, c) => field_constant_kind(self.field_descriptor) == constant_kind(c),
            _ => false,
        };
        if !fits {
            return Err(mismatch(self.layout));
        }
        return Ok(Some(constant.clone()));
    }

    fn body(&mut self, ids: &[ElementId], depth: usize) -> Result<Vec<AttrValue>, ClassFileError> {
        if depth > self.max_depth {
            return Err(ClassFileError::TooLarge("nested layout calls"));
        }
        let layout = self.layout;
        let mut values = Vec::with_capacity(ids.len());
        for id in ids {
            let value = match layout.element(*id) {
                Element::Integral(i) => AttrValue::Int(self.integral(i)?),
                Element::Reference(r) => AttrValue::Ref(self.reference(r)?),
                Element::Replication { count, body } => {
                    let n = self.read(count.width, false)? as usize;
                    if n > self.input.len() && !body.is_empty() {
                        return Err(mismatch(layout));
                    }
                    let mut items = Vec::with_capacity(n.min(self.input.len()));
                    for _ in 0..n {
                        items.push(self.body(body, depth)?);
                    }
                    AttrValue::Replication(items)
                }
                Element::Union { tag, cases, default } => {
                    let t = self.read(tag.width, tag.kind.is_signed())? as i32;
                    let body = self.body(union_case(cases, default, t), depth)?;
                    AttrValue::Union { tag: t, body }
                }
                Element::Call { callable } => {
                    AttrValue::Call(self.body(&layout.callables()[*callable].body, depth + 1)?)
                }
            };
            values.push(value);
        }
        return Ok(values);
    }
}

/// Which constant a `KQ` reference holds, by the field's descriptor.
pub fn field_constant_kind(descriptor: Option<&str>) -> Option<RefKind> {
    match descriptor? {
        "I" | "B" | "C" | "S" | "Z" => return Some(RefKind::Int),
        "J" => return Some(RefKind::Long),
        "F" => return Some(RefKind::Float),
        "D" => return Some(RefKind::Double),
        "Ljava/lang/String;" => return Some(RefKind::String),
        _ => return None,
    }
}

fn constant_kind(c: &Constant) -> Option<RefKind> {
    match c {
        Constant::Integer(_) => return Some(RefKind::Int),
        Constant::Long(_) => return Some(RefKind::Long),
        Constant::Float(_) => return Some(RefKind::Float),
        Constant::Double(_) => return Some(RefKind::Double),
        Constant::String(_) => return Some(RefKind::String),
        _ => return None,
    }
}

/// Read the bytes of an attribute the way `layout` describes them.
///
/// `offsets` are the code offsets of the enclosing method for attributes of code,
/// `field_descriptor` the enclosing field's type for `KQ` references.
pub fn parse_layout_attribute(
    layout: &Rc<AttributeLayout>,
    info: &[u8],
    pool: &ClassPool,
    offsets: Option<&[usize]>,
    field_descriptor: Option<&str>,
    max_depth: usize,
) -> Result<LayoutAttribute, ClassFileError> {
    let mut reader = Reader {
        layout,
        pool,
        offsets,
        field_descriptor,
        input: info,
        last: None,
        max_depth,
    };
    let top = match layout.callables().first() {
        Some(c) => &c.body,
        None => return Err(mismatch(layout)),
    };
    let values = reader.body(top, 0)?;
    if !reader.input.is_empty() {
        return Err(mismatch(layout));
    }
    return Ok(LayoutAttribute {
        layout: layout.clone(),
        values,
    });
}
