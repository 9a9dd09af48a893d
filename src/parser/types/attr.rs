use crate::classfile::LayoutAttribute;
use crate::layout::*;

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::vec::Vec;

/// What sits at one attribute index.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutSlot {
    Special(SpecialLayout),
    Layout(Rc<AttributeLayout>),
}

impl LayoutSlot {
    pub fn name(&self) -> &str {
        match self {
            LayoutSlot::Special(SpecialLayout::Code) => "Code",
            LayoutSlot::Special(SpecialLayout::InnerClasses) => "InnerClasses",
            LayoutSlot::Special(SpecialLayout::ClassFileVersion) => ".ClassFile.version",
            LayoutSlot::Layout(l) => l.name(),
        }
    }
}

/// The attribute layouts in force for a segment, per context and index.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDefinitions {
    contexts: [BTreeMap<usize, LayoutSlot>; 4],
}

impl AttributeDefinitions {
    /// The predefined layouts only.
    pub fn predefined() -> Result<AttributeDefinitions, LayoutError> {
        let mut contexts: [BTreeMap<usize, LayoutSlot>; 4] = Default::default();
        for p in PREDEFINED {
            let slot = match p.source {
                LayoutSource::Special(s) => LayoutSlot::Special(s),
                LayoutSource::Notation(layout) => {
                    LayoutSlot::Layout(Rc::new(AttributeLayout::new(p.name, p.context, p.index, layout)?))
                }
            };
            contexts[p.context as usize].insert(p.index, slot);
        }
        return Ok(AttributeDefinitions { contexts });
    }

    /// Put a layout at its index, replacing whatever was there.
    pub fn define(&mut self, layout: AttributeLayout) {
        let context = layout.context() as usize;
        self.contexts[context].insert(layout.index(), LayoutSlot::Layout(Rc::new(layout)));
    }

    pub fn get(&self, context: AttributeContext, index: usize) -> Option<&LayoutSlot> {
        return self.contexts[context as usize].get(&index);
    }

    pub fn context(&self, context: AttributeContext) -> &BTreeMap<usize, LayoutSlot> {
        return &self.contexts[context as usize];
    }

    /// The index and slot of the attribute called `name`, the highest index winning.
    pub fn find(&self, context: AttributeContext, name: &str) -> Option<(usize, &LayoutSlot)> {
        return self.contexts[context as usize]
            .iter()
            .rev()
            .find(|(_, slot)| slot.name() == name)
            .map(|(i, slot)| (*i, slot));
    }
}

/// An attribute as the class bands deliver it.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrSlot {
    Layout(LayoutAttribute),
    /// The holder's `Code`, in the code bands.
    Code,
    /// The class's local inner classes.
    InnerClasses(Vec<LocalInnerClass>),
    /// The class file version of the class.
    Version { minor: u16, major: u16 },
}

/// The attributes of every holder in one context.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContextAttributes {
    pub holders: Vec<Vec<AttrSlot>>,
    /// The holders' flags without the bits that announce attributes.
    pub access_flags: Vec<u16>,
}

/// One entry of a class's local `InnerClasses` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInnerClass {
    /// Class index.
    pub class: usize,
    /// `None` to copy the global entry of the class.
    pub explicit: Option<ExplicitInnerClass>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplicitInnerClass {
    pub flags: u16,
    /// Class index.
    pub outer: Option<usize>,
    /// Utf8 index.
    pub name: Option<usize>,
}
