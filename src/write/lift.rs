//! Class files as the packer sees them: parsed, checked against what the archive format
//! can carry, and lifted into the symbolic model.

use super::attrs::visit_values;
use super::pool::partition_of;
use crate::bytecode::ldc_code;
use crate::classfile::{self as cf, *};
use crate::error::{Error, PolicyError};
use crate::layout::*;
use crate::options::{AttributeAction, Options};
use crate::parser::types::{AttributeDefinitions, LayoutSlot};

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use either::Either;
use tracing::{debug, warn};

/// Highest index an attribute definition header byte can name.
const LAST_DEFINABLE_INDEX: usize = 62;

/// The attribute layouts the packer works with: the predefined ones, plus one per
/// layout configured in the options, each at the next free index of its context.
#[derive(Debug, Clone)]
pub struct Layouts {
    definitions: AttributeDefinitions,
    configured: BTreeMap<(AttributeContext, String), usize>,
}

impl Layouts {
    pub fn new(options: &Options) -> Result<Layouts, Error> {
        let mut definitions = AttributeDefinitions::predefined()?;
        let mut configured = BTreeMap::new();
        let mut next = [FIRST_OVERFLOW_INDEX; 4];
        for ((context, name), action) in &options.attribute_actions {
            let text = match action {
                AttributeAction::Layout(text) => text,
                _ => continue,
            };
            let index = next[*context as usize];
            if index > LAST_DEFINABLE_INDEX {
                return Err(PolicyError::BadOption {
                    key: format!("pack.{}.attribute.{}", context.name(), name),
                    value: text.clone(),
                }
                .into());
            }
            next[*context as usize] += 1;
            let layout = AttributeLayout::bounded(name, *context, index, text, options.limits.max_layout_depth)?;
            definitions.define(layout);
            configured.insert((*context, name.clone()), index);
        }
        return Ok(Layouts {
            definitions,
            configured,
        });
    }

    pub fn definitions(&self) -> &AttributeDefinitions {
        return &self.definitions;
    }

    fn layout_at(&self, context: AttributeContext, index: usize) -> Option<&Rc<AttributeLayout>> {
        match self.definitions.get(context, index) {
            Some(LayoutSlot::Layout(l)) => return Some(l),
            _ => return None,
        }
    }

    fn configured(&self, context: AttributeContext, name: &str) -> Option<&Rc<AttributeLayout>> {
        let index = self.configured.get(&(context, String::from(name)))?;
        return self.layout_at(context, *index);
    }

    fn find(&self, context: AttributeContext, name: &str) -> Option<&Rc<AttributeLayout>> {
        match self.definitions.find(context, name) {
            Some((_, LayoutSlot::Layout(l))) => return Some(l),
            _ => return None,
        }
    }

    /// Layouts from the options, in index order within each context.
    pub fn configured_layouts(&self) -> Vec<Rc<AttributeLayout>> {
        let mut out: Vec<Rc<AttributeLayout>> = self
            .configured
            .iter()
            .filter_map(|((context, _), index)| self.layout_at(*context, *index).cloned())
            .collect();
        out.sort_by_key(|l| (l.context(), l.index()));
        return out;
    }
}

/// Why a class file does not go into the class bands.
#[derive(Debug)]
enum Refusal {
    /// Send it as a resource.
    Pass(String),
    /// Send it as a resource, unless unknown attributes are errors.
    Unsupported(String),
    Fail(Error),
}

impl From<ClassFileError> for Refusal {
    fn from(e: ClassFileError) -> Self {
        match e {
            ClassFileError::Unsupported(feature) => return Refusal::Unsupported(feature),
            e => return Refusal::Pass(format!("{}", e)),
        }
    }
}

impl From<PolicyError> for Refusal {
    fn from(e: PolicyError) -> Self {
        return Refusal::Fail(e.into());
    }
}

type Lifted<T> = Result<T, Refusal>;

/// Whether the operand of `insn` is one the packed form of its opcode can carry.
fn check_operand(insn: &Instruction) -> Lifted<()> {
    let constant = match &insn.operand {
        Operand::Constant(c) => c,
        _ => return Ok(()),
    };
    let fits = match (insn.opcode, constant) {
        (cf::GETSTATIC..=cf::PUTFIELD, Constant::Field(_)) => true,
        (cf::INVOKEVIRTUAL..=cf::INVOKESTATIC, Constant::Method(_)) => true,
        (cf::INVOKEINTERFACE, Constant::InterfaceMethod(_)) => true,
        (cf::NEW | cf::ANEWARRAY | cf::CHECKCAST | cf::INSTANCEOF, Constant::Class(_)) => true,
        (cf::LDC | cf::LDC_W | cf::LDC2_W, c) => ldc_code(insn.opcode, c).is_some(),
        _ => false,
    };
    if !fits {
        return Err(Refusal::Unsupported(format!(
            "opcode {} with a {} operand",
            insn.opcode,
            partition_of(constant).name()
        )));
    }
    return Ok(());
}

/// Signatures go into a partition of Java strings, so they must be valid UTF-16.
fn check_signatures(attr: &LayoutAttribute) -> Lifted<()> {
    let layout: &AttributeLayout = &attr.layout;
    let top = match layout.callables().first() {
        Some(c) => c.body.as_slice(),
        None => return Ok(()),
    };
    return visit_values(layout, top, &attr.values, 0, &mut |id, value, _| {
        if let (Element::Reference(r), AttrValue::Ref(Some(Constant::Utf8(s)))) = (layout.element(id), value) {
            if r.kind == RefKind::Signature && s.to_string().is_err() {
                return Err(Refusal::Pass(format!("{} has a signature that is not valid UTF-16", layout.name())));
            }
        }
        return Ok(());
    });
}

struct Lifter<'a> {
    layouts: &'a Layouts,
    options: &'a Options,
    pool: &'a ClassPool,
    class: &'a str,
}

impl<'a> Lifter<'a> {
    fn layout(&self, context: AttributeContext, name: &str) -> Lifted<Option<Rc<AttributeLayout>>> {
        match self.options.attribute_action(context, name) {
            Some(AttributeAction::Layout(_)) => return Ok(self.layouts.configured(context, name).cloned()),
            Some(_) => return Ok(None),
            None => return Ok(self.layouts.find(context, name).cloned()),
        }
    }

    /// What to do with an attribute that has no layout. `None` drops it.
    fn unknown(&self, context: AttributeContext, name: &str) -> Lifted<()> {
        let action = self
            .options
            .attribute_action(context, name)
            .unwrap_or(&self.options.unknown_attribute);
        match action {
            AttributeAction::Strip => return Ok(()),
            AttributeAction::Error => {
                return Err(PolicyError::Attribute {
                    context,
                    name: String::from(name),
                    class: String::from(self.class),
                }
                .into())
            }
            _ => return Err(Refusal::Pass(format!("{} attribute {}", context.name(), name))),
        }
    }

    fn attributes(
        &self,
        context: AttributeContext,
        raw: &[RawAttribute],
        flags: &mut u16,
        descriptor: Option<&str>,
        offsets: Option<&[usize]>,
    ) -> Lifted<Vec<Attribute>> {
        let mut out = Vec::with_capacity(raw.len());
        for a in raw {
            let name = a.name.as_str();
            if self.options.strip_debug && DEBUG_ATTRIBUTES.contains(&name) {
                continue;
            }
            let action = self.options.attribute_action(context, name);
            if matches!(action, Some(AttributeAction::Strip | AttributeAction::Error | AttributeAction::Pass)) {
                self.unknown(context, name)?;
                continue;
            }
            match (context, name) {
                (AttributeContext::Class | AttributeContext::Field | AttributeContext::Method, "Synthetic")
                    if a.info.is_empty() && action.is_none() =>
                {
                    *flags |= ACC_SYNTHETIC;
                    continue;
                }
                (AttributeContext::Method, "Code") => {
                    if out.iter().any(|a| matches!(a, Attribute::Code(_))) {
                        return Err(Refusal::Pass(String::from("method with two Code attributes")));
                    }
                    out.push(Attribute::Code(self.code(a.info, *flags, descriptor.unwrap_or_default())?));
                    continue;
                }
                (AttributeContext::Class, "InnerClasses") => {
                    out.push(Attribute::InnerClasses(read_inner_classes(a.info, self.pool)?));
                    continue;
                }
                _ => {}
            }
            let layout = match self.layout(context, name)? {
                Some(layout) => layout,
                None => {
                    self.unknown(context, name)?;
                    continue;
                }
            };
            let field_descriptor = if context == AttributeContext::Field { descriptor } else { None };
            let max_depth = self.options.limits.max_call_depth;
            let attr = parse_layout_attribute(&layout, a.info, self.pool, offsets, field_descriptor, max_depth)?;
            check_signatures(&attr)?;
            out.push(Attribute::Layout(attr));
        }
        return Ok(out);
    }

    fn code(&self, info: &[u8], method_flags: u16, descriptor: &str) -> Lifted<Code> {
        let raw = read_code(info, self.pool)?;
        let (instructions, offsets) = decode_code(raw.code, self.pool)?;
        for insn in &instructions {
            check_operand(insn)?;
        }
        let count = instructions.len();
        let mut handlers = Vec::with_capacity(raw.handlers.len());
        for h in &raw.handlers {
            let handler = instruction_at(&offsets, h.handler_pc as i64)?;
            if handler == count {
                return Err(ClassFileError::BadCodePosition {
                    offset: h.handler_pc as i64,
                }
                .into());
            }
            handlers.push(Handler {
                start: instruction_at(&offsets, h.start_pc as i64)?,
                end: instruction_at(&offsets, h.end_pc as i64)?,
                handler,
                catch_type: h.catch_type.clone(),
            });
        }
        let receiver = if method_flags & ACC_STATIC == 0 { 1 } else { 0 };
        if argument_slots(descriptor)? + receiver > raw.max_locals as usize {
            return Err(Refusal::Pass(String::from("max_locals is smaller than the arguments")));
        }
        let mut no_flags = 0;
        let attributes = self.attributes(AttributeContext::Code, &raw.attributes, &mut no_flags, None, Some(&offsets))?;
        return Ok(Code {
            max_stack: raw.max_stack,
            max_locals: raw.max_locals,
            instructions,
            handlers,
            attributes,
        });
    }

    fn members(&self, context: AttributeContext, raw: &[RawMember]) -> Lifted<Vec<Member>> {
        let mut out = Vec::with_capacity(raw.len());
        for m in raw {
            let mut flags = m.access_flags;
            let attributes = self.attributes(context, &m.attributes, &mut flags, Some(&m.descriptor), None)?;
            out.push(Member {
                access_flags: flags,
                name: m.name.clone(),
                descriptor: m.descriptor.clone(),
                attributes,
            });
        }
        return Ok(out);
    }
}

fn lift(bytes: &[u8], layouts: &Layouts, options: &Options) -> Lifted<Class> {
    let raw = read_class(bytes)?;
    if let Some(tag) = raw.pool.unsupported_tag() {
        return Err(Refusal::Unsupported(format!("constant pool tag {}", tag)));
    }
    let lifter = Lifter {
        layouts,
        options,
        pool: &raw.pool,
        class: &raw.this_class,
    };
    let fields = lifter.members(AttributeContext::Field, &raw.fields)?;
    let methods = lifter.members(AttributeContext::Method, &raw.methods)?;
    let mut access_flags = raw.access_flags;
    let attributes = lifter.attributes(AttributeContext::Class, &raw.attributes, &mut access_flags, None, None)?;
    return Ok(Class {
        minor_version: raw.minor_version,
        major_version: raw.major_version,
        access_flags,
        this_class: raw.this_class.clone(),
        super_class: raw.super_class.clone(),
        interfaces: raw.interfaces.clone(),
        fields,
        methods,
        attributes,
    });
}

/// Lift the class file `name`. `Right` carries the reason it has to travel as a resource.
pub fn lift_class(name: &str, bytes: &[u8], layouts: &Layouts, options: &Options) -> Result<Either<Class, String>, Error> {
    match lift(bytes, layouts, options) {
        Ok(class) => {
            debug!(entry = name, methods = class.methods.len(), "class lifted");
            return Ok(Either::Left(class));
        }
        Err(Refusal::Fail(e)) => return Err(e),
        Err(Refusal::Unsupported(feature)) if options.unknown_attribute == AttributeAction::Error => {
            return Err(PolicyError::Unsupported {
                class: String::from(name),
                feature,
            }
            .into())
        }
        Err(Refusal::Pass(reason)) | Err(Refusal::Unsupported(reason)) => {
            warn!(entry = name, reason = reason.as_str(), "class passed through as a resource");
            return Ok(Either::Right(reason));
        }
    }
}
