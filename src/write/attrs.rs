//! Attribute bands of one context, written in the order `parser::parsers::attrs` reads them.

use super::bands::BandWriter;
use super::pool::SegmentPool;
use crate::classfile::{AttrValue, InnerClass, LayoutAttribute};
use crate::codec::UNSIGNED5;
use crate::error::Error;
use crate::layout::*;
use crate::parser::types::IcTuple;

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;

/// Visit `values`, the values of `ids`, in the order the reader deals them out.
///
/// `f` gets each element with its value and the callable whose body holds it.
pub fn visit_values<E, F>(
    layout: &AttributeLayout,
    ids: &[ElementId],
    values: &[AttrValue],
    current: usize,
    f: &mut F,
) -> Result<(), E>
where
    F: FnMut(ElementId, &AttrValue, usize) -> Result<(), E>,
{
    for (id, value) in ids.iter().zip(values) {
        f(*id, value, current)?;
        match (layout.element(*id), value) {
            (Element::Replication { body, .. }, AttrValue::Replication(items)) => {
                for item in items {
                    visit_values(layout, body, item, current, f)?;
                }
            }
            (Element::Union { cases, default, .. }, AttrValue::Union { tag, body }) => {
                visit_values(layout, union_case(cases, default, *tag), body, current, f)?;
            }
            (Element::Call { callable }, AttrValue::Call(body)) => {
                if let Some(target) = layout.callables().get(*callable) {
                    visit_values(layout, &target.body, body, *callable, f)?;
                }
            }
            _ => {}
        }
    }
    return Ok(());
}

/// The index a special layout sits at in `context`.
pub fn special_index(context: AttributeContext, special: SpecialLayout) -> usize {
    return predefined(context)
        .find(|p| p.source == LayoutSource::Special(special))
        .map(|p| p.index)
        .unwrap_or(OVERFLOW_BIT);
}

/// One attribute of a holder, as it goes into the bands.
#[derive(Debug, Clone)]
pub enum OutAttribute<'c> {
    Layout(&'c LayoutAttribute),
    /// The holder's `Code`, whose bands the code writer fills.
    Code,
    /// The local inner class entries of a class.
    InnerClasses(Vec<InnerClass>),
}

impl<'c> OutAttribute<'c> {
    pub fn index(&self, context: AttributeContext) -> usize {
        match self {
            OutAttribute::Layout(l) => l.layout.index(),
            OutAttribute::Code => special_index(context, SpecialLayout::Code),
            OutAttribute::InnerClasses(_) => special_index(context, SpecialLayout::InnerClasses),
        }
    }
}

/// A class, field, method or code and its attributes.
#[derive(Debug, Clone, Default)]
pub struct Holder<'c> {
    pub access_flags: u16,
    pub attributes: Vec<OutAttribute<'c>>,
    /// A class file version other than the segment's default.
    pub version: Option<(u16, u16)>,
}

/// The flags announcing a holder's attributes, and the indexes that go to `attr_indexes`.
///
/// Attributes stay in place: the longest ascending run at the front goes into the flags,
/// the rest follows in the overflow list.
pub fn announce(context: AttributeContext, holder: &Holder) -> (u64, Vec<usize>) {
    let mut flags = holder.access_flags as u64;
    let mut overflow = Vec::new();
    let mut last: Option<usize> = None;
    for attribute in &holder.attributes {
        let index = attribute.index(context);
        let in_flags = overflow.is_empty()
            && index < FIRST_OVERFLOW_INDEX
            && index != OVERFLOW_BIT
            && last.map_or(true, |l| index > l);
        if in_flags {
            flags |= 1 << index;
            last = Some(index);
        } else {
            overflow.push(index);
        }
    }
    if holder.version.is_some() {
        flags |= 1 << special_index(context, SpecialLayout::ClassFileVersion);
    }
    if !overflow.is_empty() {
        flags |= 1 << OVERFLOW_BIT;
    }
    return (flags, overflow);
}

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

/// Every use of one attribute index, in reading order.
enum Uses<'c> {
    Layout(Rc<AttributeLayout>, Vec<&'c LayoutAttribute>),
    InnerClasses(Vec<&'c [InnerClass]>),
    Versions(Vec<(u16, u16)>),
    Code,
}

fn top_body(layout: &AttributeLayout) -> &[ElementId] {
    return layout.callables().first().map(|c| c.body.as_slice()).unwrap_or(&[]);
}

/// The `attr_calls` values of a layout: calls from a callable to itself or an earlier one.
fn backward_calls(layout: &AttributeLayout, uses: &[&LayoutAttribute]) -> Vec<usize> {
    let mut calls = vec![0usize; layout.callables().len()];
    for attribute in uses {
        let _: Result<(), ()> = visit_values(layout, top_body(layout), &attribute.values, 0, &mut |id, _, current| {
            if let Element::Call { callable } = layout.element(id) {
                if *callable <= current {
                    calls[*callable] += 1;
                }
            }
            return Ok(());
        });
    }
    return layout
        .callables()
        .iter()
        .zip(calls)
        .filter(|(c, _)| c.backward_called)
        .map(|(_, n)| n)
        .collect();
}

fn layout_bands(
    w: &mut BandWriter,
    name: &'static str,
    layout: &AttributeLayout,
    uses: &[&LayoutAttribute],
    pool: &SegmentPool,
) -> Result<(), Error> {
    let mut values: Vec<Vec<i64>> = vec![Vec::new(); layout.elements().len()];
    for attribute in uses {
        visit_values(layout, top_body(layout), &attribute.values, 0, &mut |id, value, _| {
            let v = match (layout.element(id), value) {
                (Element::Integral(_), AttrValue::Int(v)) => *v,
                (Element::Reference(r), AttrValue::Ref(c)) => pool.reference(r, c.as_ref())?,
                (Element::Replication { .. }, AttrValue::Replication(items)) => items.len() as i64,
                (Element::Union { .. }, AttrValue::Union { tag, .. }) => *tag as i64,
                _ => return Ok(()),
            };
            values[id.0].push(v);
            return Ok::<(), Error>(());
        })?;
    }
    for id in layout.band_order() {
        if let Some(codec) = layout.element(id).band_codec() {
            w.band(name, codec, &values[id.0])?;
        }
    }
    return Ok(());
}

fn inner_class_bands(w: &mut BandWriter, lists: &[&[InnerClass]], pool: &SegmentPool, global: &[IcTuple]) -> Result<(), Error> {
    let counts: Vec<usize> = lists.iter().map(|l| l.len()).collect();
    let mut classes = Vec::new();
    let mut flags = Vec::new();
    let mut outers = Vec::new();
    let mut names = Vec::new();
    for entry in lists.iter().flat_map(|l| l.iter()) {
        classes.push(pool.class(&entry.inner)?);
        let copies_global = global
            .iter()
            .find(|t| t.class == entry.inner)
            .map_or(false, |t| t.to_inner_class() == *entry);
        if copies_global {
            flags.push(0);
            continue;
        }
        flags.push(entry.flags as i64 | crate::parser::types::IC_EXPLICIT as i64);
        outers.push(entry.outer.as_deref().map(|o| pool.class(o)).transpose()?);
        names.push(entry.name.as_deref().map(|n| pool.utf8(n)).transpose()?);
    }
    w.counts("class_InnerClasses_N", UNSIGNED5, &counts)?;
    w.counts("class_InnerClasses_RC", UNSIGNED5, &classes)?;
    w.band("class_InnerClasses_F", UNSIGNED5, &flags)?;
    w.nullable("class_InnerClasses_outer_RCN", UNSIGNED5, &outers)?;
    return w.nullable("class_InnerClasses_name_RUN", UNSIGNED5, &names);
}

/// Write the attribute bands of `holders`, whose flags are already out.
///
/// `overflow` holds each holder's `attr_indexes` as returned by [`announce`].
pub fn attribute_bands(
    w: &mut BandWriter,
    context: AttributeContext,
    holders: &[Holder],
    overflow: &[Vec<usize>],
    pool: &SegmentPool,
    global: &[IcTuple],
) -> Result<(), Error> {
    let names = band_names(context);
    let counts: Vec<usize> = overflow.iter().filter(|o| !o.is_empty()).map(|o| o.len()).collect();
    w.counts(names.attr_count, UNSIGNED5, &counts)?;
    let indexes: Vec<usize> = overflow.iter().flatten().copied().collect();
    w.counts(names.attr_indexes, UNSIGNED5, &indexes)?;

    let mut uses: BTreeMap<usize, Uses> = BTreeMap::new();
    for holder in holders {
        for attribute in &holder.attributes {
            let index = attribute.index(context);
            match attribute {
                OutAttribute::Layout(l) => {
                    let entry = uses
                        .entry(index)
                        .or_insert_with(|| Uses::Layout(l.layout.clone(), Vec::new()));
                    if let Uses::Layout(_, list) = entry {
                        list.push(l);
                    }
                }
                OutAttribute::InnerClasses(entries) => {
                    let entry = uses.entry(index).or_insert_with(|| Uses::InnerClasses(Vec::new()));
                    if let Uses::InnerClasses(list) = entry {
                        list.push(entries.as_slice());
                    }
                }
                OutAttribute::Code => {
                    uses.insert(index, Uses::Code);
                }
            }
        }
        if let Some(version) = holder.version {
            let index = special_index(context, SpecialLayout::ClassFileVersion);
            let entry = uses.entry(index).or_insert_with(|| Uses::Versions(Vec::new()));
            if let Uses::Versions(list) = entry {
                list.push(version);
            }
        }
    }

    let mut calls = Vec::new();
    for u in uses.values() {
        if let Uses::Layout(layout, list) = u {
            calls.extend(backward_calls(layout, list));
        }
    }
    w.counts(names.attr_calls, UNSIGNED5, &calls)?;

    for u in uses.values() {
        match u {
            Uses::Layout(layout, list) => layout_bands(w, names.layout, layout, list, pool)?,
            Uses::InnerClasses(lists) => inner_class_bands(w, lists, pool, global)?,
            Uses::Versions(versions) => {
                let minor: Vec<i64> = versions.iter().map(|(minor, _)| *minor as i64).collect();
                let major: Vec<i64> = versions.iter().map(|(_, major)| *major as i64).collect();
                w.band("class_file_version_minor_H", UNSIGNED5, &minor)?;
                w.band("class_file_version_major_H", UNSIGNED5, &major)?;
            }
            Uses::Code => {}
        }
    }
    return Ok(());
}
