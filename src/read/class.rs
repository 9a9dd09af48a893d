//! Classes from the class bands, with inner classes and version filled in.

use super::code::{materialize_code, CodeContext, OperandManager};
use super::segment::Segment;
use crate::bytecode::MemberIndex;
use crate::classfile::{constant_pool_of, Attribute, Class, InnerClass, Member};
use crate::error::{Corruption, Error};
use crate::parser::types::*;

use alloc::string::String;
use alloc::vec::Vec;
use tracing::trace;

/// Layout attributes only. Other slots have no place on fields or code.
fn layout_attributes(slots: &[AttrSlot]) -> Vec<Attribute> {
    return slots
        .iter()
        .filter_map(|s| match s {
            AttrSlot::Layout(l) => Some(Attribute::Layout(l.clone())),
            _ => None,
        })
        .collect();
}

fn class_string(pool: &ConstantPool, index: usize) -> Result<String, Corruption> {
    return pool.class_name(index).map(String::from);
}

fn local_inner_classes(segment: &Segment, local: &[LocalInnerClass]) -> Result<Vec<InnerClass>, Corruption> {
    let pool = &segment.pool;
    let mut out = Vec::with_capacity(local.len());
    for entry in local {
        let inner = pool.class_name(entry.class)?;
        match &entry.explicit {
            None => {
                let tuple = segment
                    .inner_classes
                    .iter()
                    .find(|t| t.class == inner)
                    .ok_or_else(|| Corruption::MissingInnerClass(String::from(inner)))?;
                out.push(tuple.to_inner_class());
            }
            Some(explicit) => out.push(InnerClass {
                inner: String::from(inner),
                outer: explicit.outer.map(|c| class_string(pool, c)).transpose()?,
                name: explicit.name.map(|u| pool.utf8_string(u)).transpose()?,
                flags: explicit.flags,
            }),
        }
    }
    return Ok(out);
}

fn materialize_class(
    segment: &Segment,
    entry: &ClassEntry,
    members: &MemberIndex,
    ops: &mut OperandManager,
) -> Result<Class, Error> {
    let pool = &segment.pool;
    let mut fields = Vec::with_capacity(entry.fields.len());
    for f in &entry.fields {
        let (name, descriptor) = pool.descr(f.descr)?;
        fields.push(Member {
            access_flags: f.flags,
            name,
            descriptor: String::from(descriptor),
            attributes: layout_attributes(&f.attributes),
        });
    }

    let cx = CodeContext {
        pool,
        members,
        this_class: entry.this,
        super_class: entry.super_class,
    };
    let mut methods = Vec::with_capacity(entry.methods.len());
    for m in &entry.methods {
        let (name, descriptor) = pool.descr(m.descr)?;
        let mut attributes = Vec::with_capacity(m.attributes.len());
        for slot in &m.attributes {
            match slot {
                AttrSlot::Layout(l) => attributes.push(Attribute::Layout(l.clone())),
                AttrSlot::Code => {
                    let k = m.code.ok_or(Corruption::Truncated { band: "code_headers" })?;
                    let bands = segment.classes.codes.get(k).ok_or(Corruption::Truncated { band: "code_headers" })?;
                    let codes = segment
                        .byte_codes
                        .codes
                        .get(k)
                        .copied()
                        .ok_or(Corruption::Truncated { band: "bc_codes" })?;
                    let code_attributes = layout_attributes(&bands.attributes);
                    let code = materialize_code(codes, bands, m.flags, descriptor, &cx, ops, code_attributes)?;
                    attributes.push(Attribute::Code(code));
                }
                _ => {}
            }
        }
        methods.push(Member {
            access_flags: m.flags,
            name,
            descriptor: String::from(descriptor),
            attributes,
        });
    }

    let mut version = (segment.header.default_class_minor, segment.header.default_class_major);
    let mut local = None;
    let mut attributes = Vec::with_capacity(entry.attributes.len());
    for slot in &entry.attributes {
        match slot {
            AttrSlot::Layout(l) => attributes.push(Attribute::Layout(l.clone())),
            AttrSlot::Version { minor, major } => version = (*minor, *major),
            AttrSlot::InnerClasses(entries) => local = Some((attributes.len(), entries)),
            AttrSlot::Code => {}
        }
    }

    let mut class = Class {
        minor_version: version.0,
        major_version: version.1,
        access_flags: entry.flags,
        this_class: class_string(pool, entry.this)?,
        super_class: entry.super_class.map(|c| class_string(pool, c)).transpose()?,
        interfaces: entry
            .interfaces
            .iter()
            .map(|c| class_string(pool, *c))
            .collect::<Result<Vec<_>, _>>()?,
        fields,
        methods,
        attributes,
    };

    let names = constant_pool_of(&class)?;
    let implied = implied_inner_classes(&segment.inner_classes, names.class_names());
    match local {
        Some((at, entries)) => {
            let local = local_inner_classes(segment, entries)?;
            if !local.is_empty() {
                let merged = merge_inner_classes(&implied, &local);
                if !merged.is_empty() {
                    class.attributes.insert(at, Attribute::InnerClasses(merged));
                }
            }
        }
        None if !implied.is_empty() => class.attributes.push(Attribute::InnerClasses(implied)),
        None => {}
    }
    trace!(class = class.this_class.as_str(), methods = class.methods.len(), "class materialized");
    return Ok(class);
}

/// Every class of the segment, in class band order.
pub fn materialize_classes(segment: &Segment) -> Result<Vec<Class>, Error> {
    let members = MemberIndex::new(&segment.pool)?;
    let mut ops = OperandManager::new(&segment.byte_codes);
    let mut classes = Vec::with_capacity(segment.classes.classes.len());
    for entry in &segment.classes.classes {
        classes.push(materialize_class(segment, entry, &members, &mut ops)?);
    }
    ops.check_drained();
    return Ok(classes);
}
