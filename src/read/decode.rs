//! Archive members from the file bands and the materialized classes.

use super::segment::Segment;
use crate::classfile::{write_class, Class};
use crate::entry::Entry;
use crate::error::{Corruption, Error};
use crate::options::Options;
use crate::parser::types::*;

use alloc::format;
use alloc::vec::Vec;

fn class_entry(class: &Class, name: &str, modtime: i32, deflate_hint: bool) -> Result<Entry, Error> {
    let mut entry = if name.is_empty() {
        Entry::new(&format!("{}.class", class.this_class), write_class(class)?)
    } else {
        Entry::new(name, write_class(class)?)
    };
    entry.modtime = modtime;
    entry.deflate_hint = deflate_hint;
    return Ok(entry);
}

/// The segment's members in file band order, followed by classes no file names.
pub fn segment_entries(segment: &Segment, classes: Vec<Class>, options: &Options) -> Result<Vec<Entry>, Error> {
    let archive_modtime = segment.header.modtime();
    let archive_hint = segment.header.options.has(ArchiveOptions::DEFLATE_HINT);
    let hint = |member: bool| options.unpack_deflate_hint.resolve(archive_hint || member);

    let mut classes = classes.into_iter();
    let mut entries = Vec::with_capacity(segment.files.len());
    for file in &segment.files {
        let name = segment.pool.utf8_string(file.name)?;
        let modtime = archive_modtime.wrapping_add(file.modtime);
        if file.is_class_stub() {
            let class = classes.next().ok_or(Corruption::TooManyClassStubs)?;
            entries.push(class_entry(&class, &name, modtime, hint(file.deflate_hint()))?);
        } else {
            let mut entry = Entry::new(&name, file.bits.to_vec());
            entry.modtime = modtime;
            entry.deflate_hint = hint(file.deflate_hint());
            entries.push(entry);
        }
    }
    for class in classes {
        entries.push(class_entry(&class, "", archive_modtime, hint(false))?);
    }
    return Ok(entries);
}
