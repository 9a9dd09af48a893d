//! The attribute layouts every segment starts out with.

use super::*;

/// Flag bit announcing that a holder has an `attr_count` entry.
pub const OVERFLOW_BIT: usize = 16;
/// First index given to attribute definitions that ask for the next free one.
pub const FIRST_OVERFLOW_INDEX: usize = 32;
/// First such index when the context transmits high flag words.
pub const FIRST_OVERFLOW_INDEX_HI: usize = 63;

/// Layouts with bands of their own instead of a layout string.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpecialLayout {
    Code,
    InnerClasses,
    ClassFileVersion,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LayoutSource {
    Notation(&'static str),
    Special(SpecialLayout),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Predefined {
    pub context: AttributeContext,
    pub index: usize,
    pub name: &'static str,
    pub source: LayoutSource,
}

pub const ANNOTATIONS: &str = "[NH[(1)]][RSHNH[RUH(1)]][TB(66,67,73,83,90)[KIH](68)[KDH](70)[KFH](74)[KJH](99)[RSH](101)[RSHRUH](115)[RUH](91)[NH[(0)]](64)[RSHNH[RUH(0)]]()[]]";
pub const PARAMETER_ANNOTATIONS: &str = "[NB[(1)]][NH[(1)]][RSHNH[RUH(1)]][TB(66,67,73,83,90)[KIH](68)[KDH](70)[KFH](74)[KJH](99)[RSH](101)[RSHRUH](115)[RUH](91)[NH[(0)]](64)[RSHNH[RUH(0)]]()[]]";
pub const ANNOTATION_DEFAULT: &str = "[TB(66,67,73,83,90)[KIH](68)[KDH](70)[KFH](74)[KJH](99)[RSH](101)[RSHRUH](115)[RUH](91)[NH[(0)]](64)[RSHNH[RUH(0)]]()[]]";

const fn notation(context: AttributeContext, index: usize, name: &'static str, layout: &'static str) -> Predefined {
    return Predefined {
        context,
        index,
        name,
        source: LayoutSource::Notation(layout),
    };
}

const fn special(context: AttributeContext, index: usize, name: &'static str, layout: SpecialLayout) -> Predefined {
    return Predefined {
        context,
        index,
        name,
        source: LayoutSource::Special(layout),
    };
}

use AttributeContext::{Class, Code, Field, Method};

pub const PREDEFINED: &[Predefined] = &[
    notation(Class, 17, "SourceFile", "RUNH"),
    notation(Class, 18, "EnclosingMethod", "RCHRDNH"),
    notation(Class, 19, "Signature", "RSH"),
    notation(Class, 20, "Deprecated", ""),
    notation(Class, 21, "RuntimeVisibleAnnotations", ANNOTATIONS),
    notation(Class, 22, "RuntimeInvisibleAnnotations", ANNOTATIONS),
    special(Class, 23, "InnerClasses", SpecialLayout::InnerClasses),
    special(Class, 24, ".ClassFile.version", SpecialLayout::ClassFileVersion),
    notation(Field, 17, "ConstantValue", "KQH"),
    notation(Field, 19, "Signature", "RSH"),
    notation(Field, 20, "Deprecated", ""),
    notation(Field, 21, "RuntimeVisibleAnnotations", ANNOTATIONS),
    notation(Field, 22, "RuntimeInvisibleAnnotations", ANNOTATIONS),
    special(Method, 17, "Code", SpecialLayout::Code),
    notation(Method, 18, "Exceptions", "NH[RCH]"),
    notation(Method, 19, "Signature", "RSH"),
    notation(Method, 20, "Deprecated", ""),
    notation(Method, 21, "RuntimeVisibleAnnotations", ANNOTATIONS),
    notation(Method, 22, "RuntimeInvisibleAnnotations", ANNOTATIONS),
    notation(Method, 23, "RuntimeVisibleParameterAnnotations", PARAMETER_ANNOTATIONS),
    notation(Method, 24, "RuntimeInvisibleParameterAnnotations", PARAMETER_ANNOTATIONS),
    notation(Method, 25, "AnnotationDefault", ANNOTATION_DEFAULT),
    notation(Code, 1, "LineNumberTable", "NH[PHH]"),
    notation(Code, 2, "LocalVariableTable", "NH[PHOHRUHRSHH]"),
    notation(Code, 3, "LocalVariableTypeTable", "NH[PHOHRUHRSHH]"),
];

/// The predefined layouts of one context.
pub fn predefined(context: AttributeContext) -> impl Iterator<Item = &'static Predefined> {
    return PREDEFINED.iter().filter(move |p| p.context == context);
}

/// Attributes dropped by the strip-debug option.
pub const DEBUG_ATTRIBUTES: &[&str] = &[
    "SourceFile",
    "LineNumberTable",
    "LocalVariableTable",
    "LocalVariableTypeTable",
];
