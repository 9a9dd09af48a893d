//! Attribute layouts.
//!
//! Every attribute the format knows how to transmit is described by a layout string,
//! e.g. `NH[PHOHRUHRSHH]` for `LocalVariableTable`.
//! A layout is parsed into a tree of [`LayoutElement`]s and then flattened into
//! an [`AttributeLayout`]: an arena of elements with every call resolved to
//! the index of its callable.

mod parse;
pub use parse::*;
mod predefined;
pub use predefined::*;
#[cfg(test)]
mod test;

use crate::codec::{BhsdCodec, BCI5, BRANCH5, BYTE1, SIGNED5, UNSIGNED5};
use crate::options::Limits;

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

/// Where an attribute may appear.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttributeContext {
    Class = 0,
    Field = 1,
    Method = 2,
    Code = 3,
}

impl AttributeContext {
    pub const ALL: [AttributeContext; 4] = [
        AttributeContext::Class,
        AttributeContext::Field,
        AttributeContext::Method,
        AttributeContext::Code,
    ];

    pub fn from_bits(bits: u8) -> AttributeContext {
        match bits & 3 {
            0 => AttributeContext::Class,
            1 => AttributeContext::Field,
            2 => AttributeContext::Method,
            _ => AttributeContext::Code,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttributeContext::Class => "class",
            AttributeContext::Field => "field",
            AttributeContext::Method => "method",
            AttributeContext::Code => "code",
        }
    }
}

/// Byte width of an integral or reference element.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Width {
    Byte,
    Short,
    Int,
    /// Occupies no bytes in the class file.
    Void,
}

impl Width {
    pub fn bytes(&self) -> usize {
        match self {
            Width::Byte => 1,
            Width::Short => 2,
            Width::Int => 4,
            Width::Void => 0,
        }
    }

    fn letter(&self) -> char {
        match self {
            Width::Byte => 'B',
            Width::Short => 'H',
            Width::Int => 'I',
            Width::Void => 'V',
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IntegralKind {
    Unsigned,
    Signed,
    Flag,
    /// `P`: a bytecode index.
    Bci,
    /// `PO`: a bytecode index relative to the previous one.
    BciOffset,
    /// `O`: a length in bytecode, relative to the previous index.
    Offset,
    /// `OS`: a signed length in bytecode, relative to the previous index.
    SignedOffset,
}

impl IntegralKind {
    fn prefix(&self) -> &'static str {
        match self {
            IntegralKind::Unsigned => "",
            IntegralKind::Signed => "S",
            IntegralKind::Flag => "F",
            IntegralKind::Bci => "P",
            IntegralKind::BciOffset => "PO",
            IntegralKind::Offset => "O",
            IntegralKind::SignedOffset => "OS",
        }
    }

    /// Whether the class file stores the value as a signed number.
    pub fn is_signed(&self) -> bool {
        matches!(self, IntegralKind::Signed | IntegralKind::SignedOffset)
    }

    /// Whether values are renumbered between bytecode offsets and instruction indexes.
    pub fn is_bci_relative(&self) -> bool {
        matches!(
            self,
            IntegralKind::Bci | IntegralKind::BciOffset | IntegralKind::Offset | IntegralKind::SignedOffset
        )
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Integral {
    pub kind: IntegralKind,
    pub width: Width,
}

impl Integral {
    pub const fn new(kind: IntegralKind, width: Width) -> Integral {
        return Integral { kind, width };
    }

    pub fn tag(&self) -> String {
        return format!("{}{}", self.kind.prefix(), self.width.letter());
    }
}

/// The constant pool partition a reference points into.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum RefKind {
    /// `KI`
    Int,
    /// `KJ`
    Long,
    /// `KF`
    Float,
    /// `KD`
    Double,
    /// `KS`
    String,
    /// `KQ`: the constant type follows the enclosing field's descriptor.
    FieldConstant,
    /// `RC`
    Class,
    /// `RS`
    Signature,
    /// `RD`
    Descr,
    /// `RF`
    Field,
    /// `RM`
    Method,
    /// `RI`
    IMethod,
    /// `RU`
    Utf8,
    /// `RQ`: an index into all partitions at once.
    Any,
}

impl RefKind {
    fn tag(&self) -> &'static str {
        match self {
            RefKind::Int => "KI",
            RefKind::Long => "KJ",
            RefKind::Float => "KF",
            RefKind::Double => "KD",
            RefKind::String => "KS",
            RefKind::FieldConstant => "KQ",
            RefKind::Class => "RC",
            RefKind::Signature => "RS",
            RefKind::Descr => "RD",
            RefKind::Field => "RF",
            RefKind::Method => "RM",
            RefKind::IMethod => "RI",
            RefKind::Utf8 => "RU",
            RefKind::Any => "RQ",
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Reference {
    pub kind: RefKind,
    pub nullable: bool,
    pub width: Width,
}

impl Reference {
    pub fn tag(&self) -> String {
        let n = if self.nullable { "N" } else { "" };
        return format!("{}{}{}", self.kind.tag(), n, self.width.letter());
    }
}

/// A parsed layout element, before calls are resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutElement {
    Integral(Integral),
    Reference(Reference),
    Replication {
        count: Integral,
        body: Vec<LayoutElement>,
    },
    Union {
        tag: Integral,
        cases: Vec<UnionCase>,
        default: Vec<LayoutElement>,
    },
    /// Relative callable number: 0 is the enclosing callable, 1 the next one, -1 the previous one.
    Call(i32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionCase {
    pub tags: Vec<i32>,
    pub body: Vec<LayoutElement>,
}

impl LayoutElement {
    /// The element's layout notation, without any bodies.
    pub fn tag(&self) -> String {
        match self {
            LayoutElement::Integral(i) => i.tag(),
            LayoutElement::Reference(r) => r.tag(),
            LayoutElement::Replication { count, .. } => format!("N{}", count.tag()),
            LayoutElement::Union { tag, .. } => format!("T{}", tag.tag()),
            LayoutElement::Call(n) => format!("({})", n),
        }
    }
}

/// Index of an element within its [`AttributeLayout`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ElementId(pub usize);

/// A layout element whose children are arena indices.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Integral(Integral),
    Reference(Reference),
    Replication {
        count: Integral,
        body: Vec<ElementId>,
    },
    Union {
        tag: Integral,
        cases: Vec<(Vec<i32>, Vec<ElementId>)>,
        default: Vec<ElementId>,
    },
    Call {
        callable: usize,
    },
}

impl Element {
    /// The coding of this element's band, if it has one.
    pub fn band_codec(&self) -> Option<BhsdCodec> {
        let tag = match self {
            Element::Integral(i) if i.width == Width::Void => return None,
            Element::Integral(i) => i.tag(),
            Element::Reference(_) => return Some(UNSIGNED5),
            Element::Replication { count, .. } => format!("N{}", count.tag()),
            Element::Union { tag, .. } => format!("T{}", tag.tag()),
            Element::Call { .. } => return None,
        };
        return Some(codec_for_tag(&tag));
    }
}

/// The body a union takes for `tag`: the first case listing it, else the default.
pub fn union_case<'l>(cases: &'l [(Vec<i32>, Vec<ElementId>)], default: &'l [ElementId], tag: i32) -> &'l [ElementId] {
    return cases
        .iter()
        .find(|(tags, _)| tags.contains(&tag))
        .map(|(_, body)| body.as_slice())
        .unwrap_or(default);
}

/// The coding of a layout band, chosen from the element's notation.
pub fn codec_for_tag(tag: &str) -> BhsdCodec {
    if tag.contains('O') {
        return BRANCH5;
    }
    if tag.contains('P') {
        return BCI5;
    }
    if tag.contains('S') && !tag.contains("KS") && !tag.contains("RS") {
        return SIGNED5;
    }
    if tag.contains('B') {
        return BYTE1;
    }
    return UNSIGNED5;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Callable {
    pub body: Vec<ElementId>,
    /// Reached by a call from itself or from a later callable.
    pub backward_called: bool,
}

/// A named, fully resolved layout.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeLayout {
    name: String,
    context: AttributeContext,
    index: usize,
    layout: String,
    elements: Vec<Element>,
    callables: Vec<Callable>,
}

impl AttributeLayout {
    /// Parse `layout` and resolve its calls, with the default nesting limit.
    pub fn new(
        name: &str,
        context: AttributeContext,
        index: usize,
        layout: &str,
    ) -> Result<AttributeLayout, LayoutError> {
        return AttributeLayout::bounded(name, context, index, layout, Limits::default().max_layout_depth);
    }

    /// Parse `layout`, refusing brackets nested more than `max_depth` deep, and resolve its calls.
    pub fn bounded(
        name: &str,
        context: AttributeContext,
        index: usize,
        layout: &str,
        max_depth: usize,
    ) -> Result<AttributeLayout, LayoutError> {
        let tree = parse_layout(layout, max_depth)?;
        let mut elements = Vec::new();
        let mut callables: Vec<Callable> = tree
            .iter()
            .map(|_| Callable {
                body: Vec::new(),
                backward_called: false,
            })
            .collect();
        for (i, body) in tree.iter().enumerate() {
            let ids = flatten(body, i, &mut elements, &mut callables)?;
            callables[i].body = ids;
        }
        return Ok(AttributeLayout {
            name: String::from(name),
            context,
            index,
            layout: String::from(layout),
            elements,
            callables,
        });
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> AttributeContext {
        self.context
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn layout(&self) -> &str {
        &self.layout
    }

    pub fn element(&self, id: ElementId) -> &Element {
        &self.elements[id.0]
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn callables(&self) -> &[Callable] {
        &self.callables
    }

    /// How many callables need an entry in the `attr_calls` band per use of this layout.
    pub fn backward_call_count(&self) -> usize {
        return self.callables.iter().filter(|c| c.backward_called).count();
    }

    /// Ids of the elements that own a band, in band order:
    /// callables in order, depth first, union cases before the default.
    pub fn band_order(&self) -> Vec<ElementId> {
        let mut order = Vec::new();
        for callable in self.callables.iter() {
            self.collect_band_order(&callable.body, &mut order);
        }
        return order;
    }

    fn collect_band_order(&self, body: &[ElementId], order: &mut Vec<ElementId>) {
        for id in body {
            let element = self.element(*id);
            if element.band_codec().is_some() {
                order.push(*id);
            }
            match element {
                Element::Replication { body, .. } => self.collect_band_order(body, order),
                Element::Union { cases, default, .. } => {
                    for (_, case) in cases {
                        self.collect_band_order(case, order);
                    }
                    self.collect_band_order(default, order);
                }
                _ => {}
            }
        }
    }
}

fn flatten(
    body: &[LayoutElement],
    callable: usize,
    elements: &mut Vec<Element>,
    callables: &mut [Callable],
) -> Result<Vec<ElementId>, LayoutError> {
    let mut ids = Vec::with_capacity(body.len());
    for e in body {
        let element = match e {
            LayoutElement::Integral(i) => Element::Integral(*i),
            LayoutElement::Reference(r) => Element::Reference(*r),
            LayoutElement::Replication { count, body } => Element::Replication {
                count: *count,
                body: flatten(body, callable, elements, callables)?,
            },
            LayoutElement::Union {
                tag,
                cases,
                default,
            } => {
                let mut flat_cases = Vec::with_capacity(cases.len());
                for case in cases {
                    flat_cases.push((
                        case.tags.clone(),
                        flatten(&case.body, callable, elements, callables)?,
                    ));
                }
                Element::Union {
                    tag: *tag,
                    cases: flat_cases,
                    default: flatten(default, callable, elements, callables)?,
                }
            }
            LayoutElement::Call(offset) => {
                let target = callable as i64 + *offset as i64;
                if target < 0 || target >= callables.len() as i64 {
                    return Err(LayoutError::new(
                        0,
                        LayoutErrorReason::UnresolvedCall {
                            callable,
                            offset: *offset,
                        },
                    ));
                }
                if *offset <= 0 {
                    callables[target as usize].backward_called = true;
                }
                Element::Call {
                    callable: target as usize,
                }
            }
        };
        elements.push(element);
        ids.push(ElementId(elements.len() - 1));
    }
    return Ok(ids);
}

/// Why a layout string was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutErrorReason {
    Syntax,
    TrailingInput,
    BadNumber,
    /// Brackets nest deeper than `limit`.
    TooDeep { limit: usize },
    UnresolvedCall { callable: usize, offset: i32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutError {
    /// Byte position in the layout string.
    pub position: usize,
    pub reason: LayoutErrorReason,
}

impl LayoutError {
    pub fn new(position: usize, reason: LayoutErrorReason) -> LayoutError {
        return LayoutError { position, reason };
    }
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            LayoutErrorReason::Syntax => write!(f, "layout syntax error at {}", self.position),
            LayoutErrorReason::TrailingInput => {
                write!(f, "unexpected layout text at {}", self.position)
            }
            LayoutErrorReason::BadNumber => write!(f, "bad number in layout at {}", self.position),
            LayoutErrorReason::TooDeep { limit } => {
                write!(f, "layout nests more than {} deep at {}", limit, self.position)
            }
            LayoutErrorReason::UnresolvedCall { callable, offset } => write!(
                f,
                "call ({}) in callable {} does not name a callable",
                offset, callable
            ),
        }
    }
}
