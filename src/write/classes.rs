//! The class bands, from `class_this` to the code attributes, with the byte codes
//! collected on the way.

use super::attrs::{announce, attribute_bands, Holder, OutAttribute};
use super::bands::BandWriter;
use super::code::{CodeContext, CodeWriter};
use super::pool::SegmentPool;
use crate::bytecode::MemberIndex;
use crate::classfile::{argument_slots, Attribute, Class, ClassFileError, Code, InnerClass, Member, ACC_STATIC};
use crate::codec::{BCI5, BRANCH5, DELTA5, MDELTA5, UNSIGNED5};
use crate::error::Error;
use crate::layout::AttributeContext;
use crate::parser::parsers::short_code_header_for;
use crate::parser::types::IcTuple;

use alloc::vec::Vec;
use tracing::debug;

/// What a class's inner classes turn into on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalInnerClasses {
    /// Nothing is sent. The unpacker appends the implied entries, if there are any.
    Absent,
    /// Local entries sent where the class has its `InnerClasses` attribute, or at the end.
    /// The unpacker merges them with the implied entries; no entries mean no attribute.
    Slot(Vec<InnerClass>),
}

/// A class ready for the class bands.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedClass {
    pub class: Class,
    pub inner_classes: LocalInnerClasses,
}

fn member_holder(member: &Member) -> Holder<'_> {
    let attributes = member
        .attributes
        .iter()
        .filter_map(|a| match a {
            Attribute::Layout(l) => Some(OutAttribute::Layout(l)),
            Attribute::Code(_) => Some(OutAttribute::Code),
            Attribute::InnerClasses(_) => None,
        })
        .collect();
    return Holder {
        access_flags: member.access_flags,
        attributes,
        version: None,
    };
}

fn class_holder(packed: &PackedClass, default_version: (u16, u16)) -> Holder<'_> {
    let class = &packed.class;
    let mut attributes = Vec::with_capacity(class.attributes.len() + 1);
    let mut placed = false;
    for a in &class.attributes {
        match a {
            Attribute::Layout(l) => attributes.push(OutAttribute::Layout(l)),
            Attribute::InnerClasses(_) => {
                if let LocalInnerClasses::Slot(entries) = &packed.inner_classes {
                    attributes.push(OutAttribute::InnerClasses(entries.clone()));
                    placed = true;
                }
            }
            Attribute::Code(_) => {}
        }
    }
    if let (LocalInnerClasses::Slot(entries), false) = (&packed.inner_classes, placed) {
        attributes.push(OutAttribute::InnerClasses(entries.clone()));
    }
    let version = (class.minor_version, class.major_version);
    return Holder {
        access_flags: class.access_flags,
        attributes,
        version: if version == default_version { None } else { Some(version) },
    };
}

/// `max_locals` without the slots of the arguments and the receiver.
fn max_na_locals(code: &Code, method: &Member) -> Result<u16, Error> {
    let receiver = if method.access_flags & ACC_STATIC == 0 { 1 } else { 0 };
    let arguments = argument_slots(&method.descriptor)? + receiver;
    return (code.max_locals as usize)
        .checked_sub(arguments)
        .map(|n| n as u16)
        .ok_or_else(|| ClassFileError::BadDescriptor(method.descriptor.clone()).into());
}

fn announce_all(context: AttributeContext, holders: &[Holder]) -> (Vec<u64>, Vec<Vec<usize>>) {
    return holders.iter().map(|h| announce(context, h)).unzip();
}

/// Shared inputs of the class bands.
pub struct ClassSet<'s> {
    pub pool: &'s SegmentPool,
    pub members: &'s MemberIndex,
    pub inner_classes: &'s [IcTuple],
    pub default_version: (u16, u16),
}

struct CodeEntry<'c> {
    code: &'c Code,
    max_na_locals: u16,
}

/// Write the code bands of `codes`, numbered in method order.
fn code_bands(w: &mut BandWriter, codes: &[CodeEntry], set: &ClassSet) -> Result<(), Error> {
    let pool = set.pool;
    let mut headers = Vec::with_capacity(codes.len());
    let mut max_stack = Vec::new();
    let mut max_na_locals = Vec::new();
    let mut handler_counts = Vec::new();
    let mut holders = Vec::with_capacity(codes.len());
    let mut long_holders = Vec::new();
    for entry in codes {
        let code = entry.code;
        let holder = Holder {
            access_flags: 0,
            attributes: code
                .attributes
                .iter()
                .filter_map(|a| match a {
                    Attribute::Layout(l) => Some(OutAttribute::Layout(l)),
                    _ => None,
                })
                .collect(),
            version: None,
        };
        let short = if holder.attributes.is_empty() {
            short_code_header_for(code.max_stack, entry.max_na_locals, code.handlers.len())
        } else {
            None
        };
        match short {
            Some(header) => headers.push(header),
            None => {
                headers.push(0);
                max_stack.push(code.max_stack as usize);
                max_na_locals.push(entry.max_na_locals as usize);
                handler_counts.push(code.handlers.len());
                long_holders.push(holders.len());
            }
        }
        holders.push(holder);
    }
    w.bytes("code_headers", &headers);
    w.counts("code_max_stack", UNSIGNED5, &max_stack)?;
    w.counts("code_max_na_locals", UNSIGNED5, &max_na_locals)?;
    w.counts("code_handler_count", UNSIGNED5, &handler_counts)?;

    let mut start = Vec::new();
    let mut end = Vec::new();
    let mut catch = Vec::new();
    let mut class = Vec::new();
    for h in codes.iter().flat_map(|c| c.code.handlers.iter()) {
        start.push(h.start as i64);
        end.push(h.end as i64 - h.start as i64);
        catch.push(h.handler as i64 - h.end as i64);
        class.push(h.catch_type.as_deref().map(|c| pool.class(c)).transpose()?);
    }
    w.band("code_handler_start_P", BCI5, &start)?;
    w.band("code_handler_end_PO", BRANCH5, &end)?;
    w.band("code_handler_catch_PO", BRANCH5, &catch)?;
    w.nullable("code_handler_class_RCN", UNSIGNED5, &class)?;

    let (flags, overflow) = announce_all(AttributeContext::Code, &holders);
    let long_flags: Vec<u64> = long_holders.iter().map(|i| flags[*i]).collect();
    w.flags("code_flags_hi", "code_flags_lo", &long_flags, false)?;
    return attribute_bands(w, AttributeContext::Code, &holders, &overflow, pool, set.inner_classes);
}

/// Write the class bands of `classes` and collect their byte codes into `bytecode`.
pub fn class_bands(
    w: &mut BandWriter,
    classes: &[PackedClass],
    set: &ClassSet,
    bytecode: &mut CodeWriter,
) -> Result<(), Error> {
    let pool = set.pool;
    let mut this = Vec::with_capacity(classes.len());
    let mut supers = Vec::with_capacity(classes.len());
    let mut interface_counts = Vec::with_capacity(classes.len());
    let mut interfaces = Vec::new();
    let mut field_counts = Vec::with_capacity(classes.len());
    let mut method_counts = Vec::with_capacity(classes.len());
    let mut field_descr = Vec::new();
    let mut method_descr = Vec::new();
    let mut field_holders = Vec::new();
    let mut method_holders = Vec::new();
    let mut class_holders = Vec::with_capacity(classes.len());
    let mut codes = Vec::new();

    for packed in classes {
        let class = &packed.class;
        let this_class = pool.class(&class.this_class)?;
        let super_class = class.super_class.as_deref().map(|s| pool.class(s)).transpose()?;
        this.push(this_class);
        supers.push(super_class.unwrap_or(this_class));
        interface_counts.push(class.interfaces.len());
        for interface in &class.interfaces {
            interfaces.push(pool.class(interface)?);
        }
        field_counts.push(class.fields.len());
        method_counts.push(class.methods.len());
        for field in &class.fields {
            field_descr.push(pool.descr(&field.name, &field.descriptor)?);
            field_holders.push(member_holder(field));
        }

        let cx = CodeContext {
            pool,
            members: set.members,
            this_name: &class.this_class,
            super_name: class.super_class.as_deref(),
            this_class,
            super_class,
        };
        for method in &class.methods {
            method_descr.push(pool.descr(&method.name, &method.descriptor)?);
            method_holders.push(member_holder(method));
            for a in &method.attributes {
                if let Attribute::Code(code) = a {
                    bytecode.method(code, &cx)?;
                    codes.push(CodeEntry {
                        code,
                        max_na_locals: max_na_locals(code, method)?,
                    });
                }
            }
        }
        class_holders.push(class_holder(packed, set.default_version));
    }

    w.counts("class_this", DELTA5, &this)?;
    w.counts("class_super", DELTA5, &supers)?;
    w.counts("class_interface_count", DELTA5, &interface_counts)?;
    w.counts("class_interface", DELTA5, &interfaces)?;
    w.counts("class_field_count", DELTA5, &field_counts)?;
    w.counts("class_method_count", DELTA5, &method_counts)?;

    w.counts("field_descr", DELTA5, &field_descr)?;
    let (flags, overflow) = announce_all(AttributeContext::Field, &field_holders);
    w.flags("field_flags_hi", "field_flags_lo", &flags, false)?;
    attribute_bands(w, AttributeContext::Field, &field_holders, &overflow, pool, set.inner_classes)?;

    w.counts("method_descr", MDELTA5, &method_descr)?;
    let (flags, overflow) = announce_all(AttributeContext::Method, &method_holders);
    w.flags("method_flags_hi", "method_flags_lo", &flags, false)?;
    attribute_bands(w, AttributeContext::Method, &method_holders, &overflow, pool, set.inner_classes)?;

    let (flags, overflow) = announce_all(AttributeContext::Class, &class_holders);
    w.flags("class_flags_hi", "class_flags_lo", &flags, false)?;
    attribute_bands(w, AttributeContext::Class, &class_holders, &overflow, pool, set.inner_classes)?;

    code_bands(w, &codes, set)?;
    debug!(classes = classes.len(), codes = codes.len(), "class bands written");
    return Ok(());
}
