//! Settings that steer packing and unpacking.
//!
//! Options can be built in code or set from the conventional property names,
//! e.g. `pack.strip.debug=true` or `pack.class.attribute.SourceID=RUH`.

use crate::error::PolicyError;
use crate::layout::AttributeContext;

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Upper bounds on what a segment may ask the reader to allocate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Limits {
    /// Most values any one band, or any derived total, may hold.
    pub max_band_length: usize,
    /// Deepest nesting of layout calls followed while materializing an attribute.
    pub max_call_depth: usize,
    /// Deepest bracket nesting accepted in a layout string.
    pub max_layout_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        return Limits {
            max_band_length: 1 << 24,
            max_call_depth: 256,
            max_layout_depth: 64,
        };
    }
}

/// What to do with the deflate hints of archive members.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DeflateHint {
    /// Transmit or reproduce each member's own hint.
    Keep,
    /// Every member is to be deflated.
    True,
    /// No member is to be deflated.
    False,
}

impl DeflateHint {
    fn parse(key: &str, value: &str) -> Result<DeflateHint, PolicyError> {
        match value {
            "keep" => return Ok(DeflateHint::Keep),
            "true" => return Ok(DeflateHint::True),
            "false" => return Ok(DeflateHint::False),
            _ => return Err(bad_option(key, value)),
        }
    }

    /// Apply the policy to a member's own hint.
    pub fn resolve(&self, member: bool) -> bool {
        match self {
            DeflateHint::Keep => member,
            DeflateHint::True => true,
            DeflateHint::False => false,
        }
    }
}

/// What the packer does with an attribute it has no layout for, or one named explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AttributeAction {
    /// Transmit the whole class file as an opaque resource.
    Pass,
    /// Refuse to pack.
    Error,
    /// Drop the attribute.
    Strip,
    /// Transmit the attribute using this layout.
    Layout(String),
}

impl AttributeAction {
    fn parse(value: &str) -> AttributeAction {
        match value {
            "pass" => AttributeAction::Pass,
            "error" => AttributeAction::Error,
            "strip" => AttributeAction::Strip,
            layout => AttributeAction::Layout(String::from(layout)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Options {
    /// Drop `SourceFile`, `LineNumberTable`, `LocalVariableTable` and `LocalVariableTypeTable`.
    pub strip_debug: bool,
    /// Deflate hint policy for packing.
    pub deflate_hint: DeflateHint,
    /// Deflate hint policy for unpacking, overriding what the archive says.
    pub unpack_deflate_hint: DeflateHint,
    /// Approximate most input bytes per segment, `None` for a single segment.
    pub segment_limit: Option<u64>,
    /// Keep archive members in their input order.
    /// Otherwise class files are moved behind the resources.
    pub keep_file_order: bool,
    /// Action for attributes that have neither a predefined nor a configured layout.
    pub unknown_attribute: AttributeAction,
    /// Actions for attributes by context and name.
    pub attribute_actions: BTreeMap<(AttributeContext, String), AttributeAction>,
    pub limits: Limits,
}

impl Default for Options {
    fn default() -> Self {
        return Options {
            strip_debug: false,
            deflate_hint: DeflateHint::Keep,
            unpack_deflate_hint: DeflateHint::Keep,
            segment_limit: None,
            keep_file_order: true,
            unknown_attribute: AttributeAction::Pass,
            attribute_actions: BTreeMap::new(),
            limits: Limits::default(),
        };
    }
}

impl Options {
    pub fn new() -> Options {
        return Options::default();
    }

    pub fn strip_debug(mut self, strip: bool) -> Options {
        self.strip_debug = strip;
        return self;
    }

    pub fn deflate_hint(mut self, hint: DeflateHint) -> Options {
        self.deflate_hint = hint;
        return self;
    }

    pub fn segment_limit(mut self, limit: Option<u64>) -> Options {
        self.segment_limit = limit;
        return self;
    }

    pub fn keep_file_order(mut self, keep: bool) -> Options {
        self.keep_file_order = keep;
        return self;
    }

    pub fn unknown_attribute(mut self, action: AttributeAction) -> Options {
        self.unknown_attribute = action;
        return self;
    }

    pub fn limits(mut self, limits: Limits) -> Options {
        self.limits = limits;
        return self;
    }

    /// Configure `name` attributes in `context`.
    pub fn attribute(mut self, context: AttributeContext, name: &str, action: AttributeAction) -> Options {
        self.attribute_actions.insert((context, String::from(name)), action);
        return self;
    }

    /// The action configured for an attribute, if any.
    pub fn attribute_action(&self, context: AttributeContext, name: &str) -> Option<&AttributeAction> {
        return self.attribute_actions.get(&(context, name.to_string()));
    }

    /// Set an option from its property name.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), PolicyError> {
        match key {
            "pack.strip.debug" => self.strip_debug = parse_bool(key, value)?,
            "pack.deflate.hint" => self.deflate_hint = DeflateHint::parse(key, value)?,
            "unpack.deflate.hint" => self.unpack_deflate_hint = DeflateHint::parse(key, value)?,
            "pack.keep.file.order" => self.keep_file_order = parse_bool(key, value)?,
            "pack.segment.limit" => {
                let limit: i64 = value.parse().map_err(|_| bad_option(key, value))?;
                self.segment_limit = if limit < 0 { None } else { Some(limit as u64) };
            }
            "pack.unknown.attribute" => {
                self.unknown_attribute = match AttributeAction::parse(value) {
                    AttributeAction::Layout(_) => return Err(bad_option(key, value)),
                    action => action,
                }
            }
            _ => {
                let contexts = [
                    ("pack.class.attribute.", AttributeContext::Class),
                    ("pack.field.attribute.", AttributeContext::Field),
                    ("pack.method.attribute.", AttributeContext::Method),
                    ("pack.code.attribute.", AttributeContext::Code),
                ];
                for (prefix, context) in contexts {
                    if let Some(name) = key.strip_prefix(prefix) {
                        if name.is_empty() {
                            return Err(bad_option(key, value));
                        }
                        self.attribute_actions
                            .insert((context, String::from(name)), AttributeAction::parse(value));
                        return Ok(());
                    }
                }
                return Err(bad_option(key, value));
            }
        }
        return Ok(());
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, PolicyError> {
    match value {
        "true" => return Ok(true),
        "false" => return Ok(false),
        _ => return Err(bad_option(key, value)),
    }
}

fn bad_option(key: &str, value: &str) -> PolicyError {
    return PolicyError::BadOption {
        key: String::from(key),
        value: String::from(value),
    };
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn properties_set_options() {
        let mut options = Options::new();
        options.set("pack.strip.debug", "true").unwrap();
        options.set("pack.deflate.hint", "false").unwrap();
        options.set("pack.segment.limit", "-1").unwrap();
        options.set("pack.code.attribute.CoverageTable", "NH[PHHII]").unwrap();
        options.set("pack.class.attribute.SourceID", "strip").unwrap();
        assert!(options.strip_debug);
        assert_eq!(options.deflate_hint, DeflateHint::False);
        assert_eq!(options.segment_limit, None);
        assert_eq!(
            options.attribute_action(AttributeContext::Code, "CoverageTable"),
            Some(&AttributeAction::Layout(String::from("NH[PHHII]")))
        );
        assert_eq!(
            options.attribute_action(AttributeContext::Class, "SourceID"),
            Some(&AttributeAction::Strip)
        );
    }

    #[test]
    fn bad_properties_are_policy_errors() {
        let mut options = Options::new();
        assert!(options.set("pack.strip.debug", "yes").is_err());
        assert!(options.set("pack.unknown.attribute", "NH[H]").is_err());
        assert!(options.set("pack.bogus", "1").is_err());
        assert!(options.set("pack.field.attribute.", "pass").is_err());
    }
}
