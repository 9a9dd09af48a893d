use super::AttrSlot;

use alloc::vec::Vec;

/// A field or method.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberBands {
    /// Descr index.
    pub descr: usize,
    pub flags: u16,
    pub attributes: Vec<AttrSlot>,
    /// Position in [`ClassBands::codes`].
    pub code: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassEntry {
    /// Class index.
    pub this: usize,
    /// Class index, `None` for a class whose super is itself.
    pub super_class: Option<usize>,
    pub interfaces: Vec<usize>,
    pub flags: u16,
    pub fields: Vec<MemberBands>,
    pub methods: Vec<MemberBands>,
    pub attributes: Vec<AttrSlot>,
}

/// An exception handler by instruction index, as the code bands hold it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerBands {
    pub start: i32,
    /// Distance from `start`.
    pub end: i32,
    /// Distance from the end.
    pub catch: i32,
    /// Class index.
    pub class: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeBands {
    pub max_stack: u16,
    /// Locals beyond those taken by the arguments.
    pub max_na_locals: u16,
    pub handlers: Vec<HandlerBands>,
    pub attributes: Vec<AttrSlot>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClassBands {
    pub classes: Vec<ClassEntry>,
    /// The codes of all methods that have one, in order.
    pub codes: Vec<CodeBands>,
}
