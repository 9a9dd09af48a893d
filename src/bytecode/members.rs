//! Per-class views of the member partitions.
//!
//! The `_this`, `_super` and `_init` forms do not index `cp_Field` or `cp_Method` directly,
//! only the entries whose class is the implied one.

use super::OperandBand;
use crate::error::Corruption;
use crate::parser::types::{ConstantPool, ConstantPoolProvider};

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MemberIndex {
    fields: BTreeMap<usize, Vec<usize>>,
    methods: BTreeMap<usize, Vec<usize>>,
    /// Methods named `<init>`.
    inits: BTreeMap<usize, Vec<usize>>,
}

impl MemberIndex {
    pub fn new(pool: &ConstantPool) -> Result<MemberIndex, Corruption> {
        let mut index = MemberIndex::default();
        for (i, field) in pool.field.iter().enumerate() {
            index.fields.entry(field.class).or_default().push(i);
        }
        for (i, method) in pool.method.iter().enumerate() {
            index.methods.entry(method.class).or_default().push(i);
            if pool.descr(method.descr)?.0 == "<init>" {
                index.inits.entry(method.class).or_default().push(i);
            }
        }
        return Ok(index);
    }

    fn subset(&self, band: OperandBand, class: usize) -> &[usize] {
        let lists = match band {
            OperandBand::ThisField | OperandBand::SuperField => &self.fields,
            OperandBand::InitRef => &self.inits,
            _ => &self.methods,
        };
        return lists.get(&class).map(|l| l.as_slice()).unwrap_or(&[]);
    }

    /// The partition index of entry `n` of `class`'s subset for `band`.
    pub fn resolve(&self, band: OperandBand, class: usize, n: i32) -> Result<usize, Corruption> {
        let subset = self.subset(band, class);
        return usize::try_from(n)
            .ok()
            .and_then(|n| subset.get(n).copied())
            .ok_or(Corruption::IndexOutOfRange {
                partition: band.name(),
                index: n as i64,
                len: subset.len(),
            });
    }

    /// Where partition entry `entry` sits in `class`'s subset for `band`.
    pub fn position(&self, band: OperandBand, class: usize, entry: usize) -> Option<usize> {
        return self.subset(band, class).iter().position(|e| *e == entry);
    }
}
