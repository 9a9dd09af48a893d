use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use alloc::vec::Vec;

use crate::classfile::InnerClass;

/// `ic_flags` bit saying that outer class and name are transmitted.
pub const IC_EXPLICIT: u32 = 1 << 16;

/// One entry of the segment's global inner class table.
///
/// Unless [`IC_EXPLICIT`] is set, the outer class and the simple name are predicted
/// from the inner class name, split at its last `$` or `#`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcTuple {
    pub class: String,
    pub flags: u32,
    pub outer: Option<String>,
    pub name: Option<String>,
}

fn is_all_digits(s: &str) -> bool {
    return !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
}

impl IcTuple {
    pub fn predicted(class: &str, flags: u16) -> IcTuple {
        return IcTuple {
            class: String::from(class),
            flags: flags as u32,
            outer: None,
            name: None,
        };
    }

    pub fn explicit(class: &str, flags: u16, outer: Option<&str>, name: Option<&str>) -> IcTuple {
        return IcTuple {
            class: String::from(class),
            flags: flags as u32 | IC_EXPLICIT,
            outer: outer.map(String::from),
            name: name.map(String::from),
        };
    }

    pub fn is_explicit(&self) -> bool {
        return self.flags & IC_EXPLICIT != 0;
    }

    /// Access flags, without the explicit bit.
    pub fn access_flags(&self) -> u16 {
        return self.flags as u16;
    }

    /// The class name split into outer prefix and simple name.
    fn split(&self) -> Option<(&str, &str)> {
        let at = self.class.rfind(['$', '#'])?;
        let (outer, simple) = (&self.class[..at], &self.class[at + 1..]);
        if outer.is_empty() || simple.is_empty() {
            return None;
        }
        return Some((outer, simple));
    }

    pub fn simple_class_name(&self) -> &str {
        if let (true, Some(name)) = (self.is_explicit(), &self.name) {
            return name;
        }
        return match self.split() {
            Some((_, simple)) => simple,
            None => &self.class,
        };
    }

    pub fn outer_class_string(&self) -> Option<&str> {
        if self.is_explicit() {
            return self.outer.as_deref();
        }
        return self.split().map(|(outer, _)| outer);
    }

    pub fn is_anonymous(&self) -> bool {
        return is_all_digits(self.simple_class_name());
    }

    /// A named class nested in a named class.
    pub fn is_member(&self) -> bool {
        if self.is_anonymous() {
            return false;
        }
        return match self.split() {
            Some((outer, _)) => !outer.split(['$', '#']).skip(1).any(is_all_digits),
            None => false,
        };
    }

    /// The outer class an `InnerClasses` entry records.
    pub fn effective_outer(&self) -> Option<&str> {
        if self.is_explicit() {
            return self.outer.as_deref();
        }
        if self.is_member() {
            return self.outer_class_string();
        }
        return None;
    }

    /// The simple name an `InnerClasses` entry records.
    pub fn effective_name(&self) -> Option<&str> {
        if self.is_explicit() {
            return self.name.as_deref();
        }
        if self.is_anonymous() {
            return None;
        }
        return Some(self.simple_class_name());
    }

    /// Whether prediction gets this entry right, so that it can be sent without outer and name.
    pub fn is_predictable(entry: &InnerClass) -> bool {
        let predicted = IcTuple::predicted(&entry.inner, entry.flags);
        return predicted.split().is_some()
            && predicted.effective_outer() == entry.outer.as_deref()
            && predicted.effective_name() == entry.name.as_deref();
    }

    pub fn to_inner_class(&self) -> InnerClass {
        return InnerClass {
            inner: self.class.clone(),
            outer: self.effective_outer().map(String::from),
            name: self.effective_name().map(String::from),
            flags: self.access_flags(),
        };
    }
}

/// The inner class entries a class gets without transmitting any: the global entries of
/// every class it names, and of their outer classes, in global table order.
pub fn implied_inner_classes<'n>(tuples: &[IcTuple], class_names: impl Iterator<Item = &'n str>) -> Vec<InnerClass> {
    let mut by_name: BTreeMap<&str, usize> = BTreeMap::new();
    for (i, t) in tuples.iter().enumerate() {
        by_name.entry(t.class.as_str()).or_insert(i);
    }
    let mut pending: Vec<&str> = Vec::new();
    for name in class_names {
        pending.push(name);
    }
    let mut wanted = BTreeSet::new();
    while let Some(name) = pending.pop() {
        if let Some(i) = by_name.get(name) {
            if wanted.insert(*i) {
                if let Some(outer) = tuples[*i].effective_outer() {
                    pending.push(outer);
                }
            }
        }
    }
    return wanted.into_iter().map(|i| tuples[i].to_inner_class()).collect();
}

/// A class's inner classes from the implied entries and the transmitted ones:
/// implied entries not transmitted, then transmitted entries not implied.
pub fn merge_inner_classes(implied: &[InnerClass], local: &[InnerClass]) -> Vec<InnerClass> {
    let mut out: Vec<InnerClass> = implied.iter().filter(|ic| !local.contains(ic)).cloned().collect();
    out.extend(local.iter().filter(|ic| !implied.contains(ic)).cloned());
    return out;
}
