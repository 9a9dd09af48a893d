//! Attribute bands of one context: which holder has which attribute, and the attribute bodies.
//!
//! Bodies of layout-described attributes are spread over one band per layout element.
//! All instances of a layout are read band by band first, then dealt out to the holders.

use super::*;
use crate::classfile::{field_constant_kind, AttrValue, Constant, LayoutAttribute};
use crate::layout::*;

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec;
use bitvec::prelude::*;

/// Band names of a context.
struct ContextBands {
    attr_count: &'static str,
    attr_indexes: &'static str,
    attr_calls: &'static str,
    layout: &'static str,
}

fn band_names(context: AttributeContext) -> ContextBands {
    match context {
        AttributeContext::Class => ContextBands {
            attr_count: "class_attr_count",
            attr_indexes: "class_attr_indexes",
            attr_calls: "class_attr_calls",
            layout: "class_attr_bands",
        },
        AttributeContext::Field => ContextBands {
            attr_count: "field_attr_count",
            attr_indexes: "field_attr_indexes",
            attr_calls: "field_attr_calls",
            layout: "field_attr_bands",
        },
        AttributeContext::Method => ContextBands {
            attr_count: "method_attr_count",
            attr_indexes: "method_attr_indexes",
            attr_calls: "method_attr_calls",
            layout: "method_attr_bands",
        },
        AttributeContext::Code => ContextBands {
            attr_count: "code_attr_count",
            attr_indexes: "code_attr_indexes",
            attr_calls: "code_attr_calls",
            layout: "code_attr_bands",
        },
    }
}

/// The layout indexes announced by `flags`, lowest first, without the overflow bit.
/// Also returns the flags with those bits cleared.
fn flag_indexes<'a>(
    input: &'a [u8],
    context: AttributeContext,
    defs: &AttributeDefinitions,
    flags: u64,
    hi: bool,
) -> PackResult<'a, (Vec<usize>, u16)> {
    let limit = if hi { FIRST_OVERFLOW_INDEX_HI } else { FIRST_OVERFLOW_INDEX };
    let bits = BitArray::<[u32; 2], Lsb0>::new([flags as u32, (flags >> 32) as u32]);
    let mut access = flags as u16;
    let mut indexes = Vec::new();
    for i in bits.iter_ones().filter(|i| *i != OVERFLOW_BIT && *i < limit) {
        if defs.get(context, i).is_some() {
            indexes.push(i);
            if i < 16 {
                access &= !(1 << i);
            }
        } else if i >= 16 || context == AttributeContext::Code {
            return corrupt(input, Corruption::UndefinedLayout { context, index: i });
        }
    }
    return Ok((input, (indexes, access)));
}

/// Band values of every element of a layout, by element id.
struct LayoutBands {
    layout: Rc<AttributeLayout>,
    values: Vec<Vec<i32>>,
    cursors: Vec<usize>,
    band: &'static str,
}

#[allow(clippy::too_many_arguments)]
fn read_body<'a>(
    mut input: &'a [u8],
    ctx: &mut BandContext<'a>,
    name: &'static str,
    layout: &AttributeLayout,
    ids: &[ElementId],
    count: usize,
    current: usize,
    counts: &mut [usize],
    values: &mut [Vec<i32>],
) -> PackResult<'a, ()> {
    for id in ids {
        let element = layout.element(*id);
        let codec = element.band_codec();
        match element {
            Element::Integral(_) | Element::Reference(_) => {
                if let Some(codec) = codec {
                    let (rest, v) = band(input, ctx, name, codec, count)?;
                    input = rest;
                    values[id.0] = v;
                }
            }
            Element::Replication { body, .. } => {
                let (rest, v) = count_band(input, ctx, name, codec.unwrap_or(UNSIGNED5), count)?;
                let (rest, total) = sum_counts(rest, ctx, name, &v)?;
                values[id.0] = v.into_iter().map(|c| c as i32).collect();
                let (rest, _) = read_body(rest, ctx, name, layout, body, total, current, counts, values)?;
                input = rest;
            }
            Element::Union { cases, default, .. } => {
                let (rest, tags) = band(input, ctx, name, codec.unwrap_or(UNSIGNED5), count)?;
                input = rest;
                let mut case_counts = vec![0usize; cases.len() + 1];
                for tag in tags.iter() {
                    let case = cases.iter().position(|(t, _)| t.contains(tag)).unwrap_or(cases.len());
                    case_counts[case] += 1;
                }
                values[id.0] = tags;
                for (k, (_, body)) in cases.iter().enumerate() {
                    let (rest, _) = read_body(input, ctx, name, layout, body, case_counts[k], current, counts, values)?;
                    input = rest;
                }
                let (rest, _) = read_body(
                    input,
                    ctx,
                    name,
                    layout,
                    default,
                    case_counts[cases.len()],
                    current,
                    counts,
                    values,
                )?;
                input = rest;
            }
            Element::Call { callable } => {
                if *callable > current {
                    counts[*callable] = counts[*callable].saturating_add(count);
                }
            }
        }
    }
    return Ok((input, ()));
}

/// Read the bands of `instances` uses of `layout`.
///
/// `back_calls` holds one `attr_calls` value per backward-called callable.
fn layout_bands<'a>(
    input: &'a [u8],
    ctx: &mut BandContext<'a>,
    name: &'static str,
    layout: &Rc<AttributeLayout>,
    instances: usize,
    back_calls: &[usize],
) -> PackResult<'a, LayoutBands> {
    let callables = layout.callables();
    let mut counts = vec![0usize; callables.len()];
    if let Some(first) = counts.first_mut() {
        *first = instances;
    }
    let mut values = vec![Vec::new(); layout.elements().len()];
    let mut back = back_calls.iter();
    let mut input = input;
    for (i, callable) in callables.iter().enumerate() {
        if callable.backward_called {
            counts[i] = counts[i].saturating_add(back.next().copied().unwrap_or(0));
        }
        let (rest, _) = read_body(input, ctx, name, layout, &callable.body, counts[i], i, &mut counts, &mut values)?;
        input = rest;
    }
    return Ok((
        input,
        LayoutBands {
            layout: layout.clone(),
            cursors: vec![0; values.len()],
            values,
            band: name,
        },
    ));
}

fn cp_kind(kind: RefKind) -> Option<CpKind> {
    let kind = match kind {
        RefKind::Int => CpKind::Int,
        RefKind::Long => CpKind::Long,
        RefKind::Float => CpKind::Float,
        RefKind::Double => CpKind::Double,
        RefKind::String => CpKind::String,
        RefKind::Class => CpKind::Class,
        RefKind::Signature => CpKind::Signature,
        RefKind::Descr => CpKind::Descr,
        RefKind::Field => CpKind::Field,
        RefKind::Method => CpKind::Method,
        RefKind::IMethod => CpKind::IMethod,
        RefKind::Utf8 => CpKind::Utf8,
        RefKind::FieldConstant | RefKind::Any => return None,
    };
    return Some(kind);
}

/// The constant a reference element points at.
pub fn resolve_reference<P: ConstantPoolProvider>(
    pool: &P,
    reference: &Reference,
    value: i32,
    field_descriptor: Option<&str>,
) -> Result<Option<Constant>, Corruption> {
    let index = if reference.nullable {
        if value == 0 {
            return Ok(None);
        }
        value as i64 - 1
    } else {
        value as i64
    };
    let kind = match reference.kind {
        RefKind::FieldConstant => match field_constant_kind(field_descriptor).and_then(cp_kind) {
            Some(kind) => Some(kind),
            None => {
                return Err(Corruption::BadDescriptor(String::from(
                    field_descriptor.unwrap_or_default(),
                )))
            }
        },
        kind => cp_kind(kind),
    };
    let bad_index = |partition: &'static str, len: usize| Corruption::IndexOutOfRange {
        partition,
        index,
        len,
    };
    let constant = match kind {
        Some(kind) => {
            if index < 0 {
                return Err(bad_index(kind.name(), pool.len(kind)));
            }
            pool.constant(kind, index as usize)?
        }
        None => {
            if index < 0 {
                return Err(bad_index("cp_All", 0));
            }
            pool.any(index as usize)?
        }
    };
    return Ok(Some(constant));
}

impl LayoutBands {
    fn next(&mut self, id: ElementId) -> Result<i32, Corruption> {
        let cursor = &mut self.cursors[id.0];
        let value = self.values[id.0]
            .get(*cursor)
            .copied()
            .ok_or(Corruption::BandExhausted { band: self.band })?;
        *cursor += 1;
        return Ok(value);
    }

    /// Take the values of the next use of the layout.
    fn instance<'a, P: ConstantPoolProvider>(
        &mut self,
        input: &'a [u8],
        pool: &P,
        field_descriptor: Option<&str>,
        max_depth: usize,
    ) -> PackResult<'a, LayoutAttribute> {
        let layout = self.layout.clone();
        let top = match layout.callables().first() {
            Some(c) => c.body.as_slice(),
            None => &[],
        };
        let (input, values) = self.body(input, &layout, top, pool, field_descriptor, 0, max_depth)?;
        return Ok((input, LayoutAttribute { layout, values }));
    }

    #[allow(clippy::too_many_arguments)]
    fn body<'a, P: ConstantPoolProvider>(
        &mut self,
        input: &'a [u8],
        layout: &AttributeLayout,
        ids: &[ElementId],
        pool: &P,
        field_descriptor: Option<&str>,
        depth: usize,
        max_depth: usize,
    ) -> PackResult<'a, Vec<AttrValue>> {
        if depth > max_depth {
            return over_limit(input, "attribute layout calls", depth, max_depth);
        }
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let value = match layout.element(*id) {
                Element::Integral(i) if i.width == Width::Void => AttrValue::Int(0),
                Element::Integral(_) => match self.next(*id) {
                    Ok(v) => AttrValue::Int(v as i64),
                    Err(cause) => return corrupt(input, cause),
                },
                Element::Reference(r) => {
                    let resolved = self
                        .next(*id)
                        .and_then(|v| resolve_reference(pool, r, v, field_descriptor));
                    match resolved {
                        Ok(c) => AttrValue::Ref(c),
                        Err(cause) => return corrupt(input, cause),
                    }
                }
                Element::Replication { body, .. } => {
                    let n = match self.next(*id) {
                        Ok(n) => n,
                        Err(cause) => return corrupt(input, cause),
                    };
                    let mut items = Vec::new();
                    for _ in 0..n.max(0) {
                        let (_, item) = self.body(input, layout, body, pool, field_descriptor, depth, max_depth)?;
                        items.push(item);
                    }
                    AttrValue::Replication(items)
                }
                Element::Union { cases, default, .. } => {
                    let tag = match self.next(*id) {
                        Ok(t) => t,
                        Err(cause) => return corrupt(input, cause),
                    };
                    let case = union_case(cases, default, tag);
                    let (_, body) = self.body(input, layout, case, pool, field_descriptor, depth, max_depth)?;
                    AttrValue::Union { tag, body }
                }
                Element::Call { callable } => {
                    let target = &layout.callables()[*callable].body;
                    let (_, body) = self.body(input, layout, target, pool, field_descriptor, depth + 1, max_depth)?;
                    AttrValue::Call(body)
                }
            };
            out.push(value);
        }
        return Ok((input, out));
    }
}

/// What was read for one used attribute index.
enum IndexBands {
    Layout(LayoutBands),
    InnerClasses(vec::IntoIter<Vec<LocalInnerClass>>),
    Versions(vec::IntoIter<(u16, u16)>),
    Code,
}

fn inner_class_bands<'a>(
    input: &'a [u8],
    ctx: &mut BandContext<'a>,
    pool: &ConstantPool,
    instances: usize,
) -> PackResult<'a, Vec<Vec<LocalInnerClass>>> {
    let class = CpKind::Class.name();
    let classes = pool.len(CpKind::Class);
    let (input, counts) = count_band(input, ctx, "class_InnerClasses_N", UNSIGNED5, instances)?;
    let (input, total) = sum_counts(input, ctx, "class_InnerClasses_N", &counts)?;
    let (input, inner) = index_band(input, ctx, "class_InnerClasses_RC", UNSIGNED5, total, class, classes)?;
    let (input, flags) = band(input, ctx, "class_InnerClasses_F", UNSIGNED5, total)?;
    let explicit = flags.iter().filter(|f| **f != 0).count();
    let (input, outer) =
        nullable_index_band(input, ctx, "class_InnerClasses_outer_RCN", UNSIGNED5, explicit, class, classes)?;
    let (input, name) = nullable_index_band(
        input,
        ctx,
        "class_InnerClasses_name_RUN",
        UNSIGNED5,
        explicit,
        CpKind::Utf8.name(),
        pool.len(CpKind::Utf8),
    )?;

    let mut entries = inner.into_iter().zip(flags);
    let mut outer = outer.into_iter();
    let mut name = name.into_iter();
    let mut lists = Vec::with_capacity(instances);
    for n in counts {
        let mut list = Vec::with_capacity(n);
        for (class, flags) in entries.by_ref().take(n) {
            let explicit = if flags == 0 {
                None
            } else {
                Some(ExplicitInnerClass {
                    flags: flags as u16,
                    outer: outer.next().flatten(),
                    name: name.next().flatten(),
                })
            };
            list.push(LocalInnerClass { class, explicit });
        }
        lists.push(list);
    }
    return Ok((input, lists));
}

fn version_bands<'a>(input: &'a [u8], ctx: &mut BandContext<'a>, instances: usize) -> PackResult<'a, Vec<(u16, u16)>> {
    let (input, minor) = band(input, ctx, "class_file_version_minor_H", UNSIGNED5, instances)?;
    let (input, major) = band(input, ctx, "class_file_version_major_H", UNSIGNED5, instances)?;
    let mut versions = Vec::with_capacity(instances);
    for (minor, major) in minor.into_iter().zip(major) {
        match (u16::try_from(minor), u16::try_from(major)) {
            (Ok(minor), Ok(major)) => versions.push((minor, major)),
            _ => {
                return corrupt(
                    input,
                    Corruption::BadCount {
                        band: "class_file_version",
                        value: minor.max(major) as i64,
                    },
                )
            }
        }
    }
    return Ok((input, versions));
}

/// Per-holder inputs for reading a context's attributes.
pub struct Holders<'h> {
    /// Flags of every holder, high words included.
    pub flags: &'h [u64],
    /// Whether the flags have high words.
    pub hi: bool,
    /// Field descriptors, for `KQ` references.
    pub field_descriptors: Option<&'h [String]>,
}

/// Read the attribute bands of `context` for `holders`, which were announced by their flags.
pub fn context_attributes<'a>(
    input: &'a [u8],
    ctx: &mut BandContext<'a>,
    attr_context: AttributeContext,
    defs: &AttributeDefinitions,
    pool: &ConstantPool,
    holders: &Holders,
) -> PackResult<'a, ContextAttributes> {
    let names = band_names(attr_context);
    let overflow = 1u64 << OVERFLOW_BIT;

    let mut lists = Vec::with_capacity(holders.flags.len());
    let mut access_flags = Vec::with_capacity(holders.flags.len());
    for flags in holders.flags {
        let (_, (indexes, access)) = flag_indexes(input, attr_context, defs, *flags, holders.hi)?;
        lists.push(indexes);
        access_flags.push(access);
    }

    let overflowing = holders.flags.iter().filter(|f| **f & overflow != 0).count();
    let (input, attr_counts) = count_band(input, ctx, names.attr_count, UNSIGNED5, overflowing)?;
    let (input, total) = sum_counts(input, ctx, names.attr_count, &attr_counts)?;
    let (input, attr_indexes) = count_band(input, ctx, names.attr_indexes, UNSIGNED5, total)?;
    let mut attr_counts = attr_counts.into_iter();
    let mut attr_indexes = attr_indexes.into_iter();
    for (list, flags) in lists.iter_mut().zip(holders.flags) {
        if flags & overflow == 0 {
            continue;
        }
        for index in attr_indexes.by_ref().take(attr_counts.next().unwrap_or(0)) {
            if defs.get(attr_context, index).is_none() {
                return corrupt(input, Corruption::UndefinedLayout { context: attr_context, index });
            }
            list.push(index);
        }
    }

    let mut instances: BTreeMap<usize, usize> = BTreeMap::new();
    for index in lists.iter().flatten() {
        *instances.entry(*index).or_default() += 1;
    }
    let mut call_count = 0;
    for index in instances.keys() {
        if let Some(LayoutSlot::Layout(layout)) = defs.get(attr_context, *index) {
            call_count += layout.backward_call_count();
        }
    }
    let (mut input, calls) = count_band(input, ctx, names.attr_calls, UNSIGNED5, call_count)?;
    let mut calls = calls.as_slice();

    let mut read: BTreeMap<usize, IndexBands> = BTreeMap::new();
    for (index, n) in instances.iter() {
        let bands = match defs.get(attr_context, *index) {
            Some(LayoutSlot::Layout(layout)) => {
                let (mine, rest) = calls.split_at(layout.backward_call_count().min(calls.len()));
                calls = rest;
                let (rest, bands) = context(names.layout, |i| layout_bands(i, ctx, names.layout, layout, *n, mine))(input)?;
                input = rest;
                IndexBands::Layout(bands)
            }
            Some(LayoutSlot::Special(SpecialLayout::InnerClasses)) => {
                let (rest, lists) = context("class_InnerClasses", |i| inner_class_bands(i, ctx, pool, *n))(input)?;
                input = rest;
                IndexBands::InnerClasses(lists.into_iter())
            }
            Some(LayoutSlot::Special(SpecialLayout::ClassFileVersion)) => {
                let (rest, versions) = context("class_file_version", |i| version_bands(i, ctx, *n))(input)?;
                input = rest;
                IndexBands::Versions(versions.into_iter())
            }
            Some(LayoutSlot::Special(SpecialLayout::Code)) => IndexBands::Code,
            None => return corrupt(input, Corruption::UndefinedLayout { context: attr_context, index: *index }),
        };
        read.insert(*index, bands);
    }

    let max_depth = ctx.limits().max_call_depth;
    let mut holder_slots = Vec::with_capacity(lists.len());
    for (h, list) in lists.iter().enumerate() {
        let descriptor = holders
            .field_descriptors
            .and_then(|d| d.get(h))
            .map(|d| d.as_str());
        let mut slots = Vec::with_capacity(list.len());
        for index in list {
            let slot = match read.get_mut(index) {
                Some(IndexBands::Layout(bands)) => {
                    let (_, attr) = bands.instance(input, pool, descriptor, max_depth)?;
                    AttrSlot::Layout(attr)
                }
                Some(IndexBands::InnerClasses(lists)) => AttrSlot::InnerClasses(lists.next().unwrap_or_default()),
                Some(IndexBands::Versions(versions)) => match versions.next() {
                    Some((minor, major)) => AttrSlot::Version { minor, major },
                    None => return corrupt(input, Corruption::BandExhausted { band: "class_file_version" }),
                },
                Some(IndexBands::Code) => AttrSlot::Code,
                None => return corrupt(input, Corruption::UndefinedLayout { context: attr_context, index: *index }),
            };
            slots.push(slot);
        }
        holder_slots.push(slots);
    }

    return Ok((
        input,
        ContextAttributes {
            holders: holder_slots,
            access_flags,
        },
    ));
}
