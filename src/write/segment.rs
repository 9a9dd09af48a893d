//! One segment: members in, header and bands out.

use super::bands::BandWriter;
use super::classes::{class_bands, ClassSet, LocalInnerClasses, PackedClass};
use super::code::CodeWriter;
use super::lift::{lift_class, Layouts};
use super::pool::{PoolCollector, SegmentPool};
use crate::bytecode::MemberIndex;
use crate::classfile::{constant_pool_of, Attribute, Class, InnerClass};
use crate::codec::{BYTE1, DELTA5, UDELTA5, UNSIGNED5};
use crate::entry::Entry;
use crate::error::Error;
use crate::layout::{AttributeContext, AttributeLayout};
use crate::options::{DeflateHint, Options};
use crate::parser::types::*;

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use either::Either;
use tracing::debug;

/// A member as it goes into the segment.
enum Member<'e> {
    Class { entry: &'e Entry, class: Class },
    Resource(&'e Entry),
}

impl<'e> Member<'e> {
    fn entry(&self) -> &'e Entry {
        match self {
            Member::Class { entry, .. } => *entry,
            Member::Resource(entry) => *entry,
        }
    }
}

fn inner_classes_of(class: &Class) -> impl Iterator<Item = &Vec<InnerClass>> {
    return class.attributes.iter().filter_map(|a| match a {
        Attribute::InnerClasses(list) => Some(list),
        _ => None,
    });
}

/// The global table: every inner class named by some class, first appearance first.
pub fn global_inner_classes<'c>(classes: impl Iterator<Item = &'c Class>) -> Vec<IcTuple> {
    let mut seen = BTreeSet::new();
    let mut tuples = Vec::new();
    for class in classes {
        for entry in inner_classes_of(class).flatten() {
            if !seen.insert(entry.inner.as_str()) {
                continue;
            }
            tuples.push(if IcTuple::is_predictable(entry) {
                IcTuple::predicted(&entry.inner, entry.flags)
            } else {
                IcTuple::explicit(&entry.inner, entry.flags, entry.outer.as_deref(), entry.name.as_deref())
            });
        }
    }
    return tuples;
}

/// What to send for `class`'s inner classes so that unpacking yields them again.
/// `None` when no local list can do that.
pub fn local_inner_classes(class: &Class, global: &[IcTuple]) -> Result<Option<LocalInnerClasses>, Error> {
    let mut bare = class.clone();
    bare.attributes.retain(|a| !matches!(a, Attribute::InnerClasses(_)));
    let implied = implied_inner_classes(global, constant_pool_of(&bare)?.class_names());

    let declared: Vec<(usize, &Vec<InnerClass>)> = class
        .attributes
        .iter()
        .enumerate()
        .filter_map(|(i, a)| match a {
            Attribute::InnerClasses(list) => Some((i, list)),
            _ => None,
        })
        .collect();
    let (at, wanted) = match declared.as_slice() {
        [] if implied.is_empty() => return Ok(Some(LocalInnerClasses::Absent)),
        [] => return Ok(Some(LocalInnerClasses::Slot(Vec::new()))),
        [(at, wanted)] => (*at, *wanted),
        _ => return Ok(None),
    };
    if wanted.is_empty() {
        return Ok(None);
    }
    if at + 1 == class.attributes.len() && *wanted == implied {
        return Ok(Some(LocalInnerClasses::Absent));
    }
    let local = merge_inner_classes(&implied, wanted);
    if local.is_empty() || merge_inner_classes(&implied, &local) != *wanted {
        return Ok(None);
    }
    return Ok(Some(LocalInnerClasses::Slot(local)));
}

/// Decide the inner classes of every class, moving classes that cannot be
/// represented out to the resources until the table settles.
fn plan_inner_classes(members: &mut Vec<Member>) -> Result<(Vec<IcTuple>, Vec<LocalInnerClasses>), Error> {
    loop {
        let global = global_inner_classes(members.iter().filter_map(|m| match m {
            Member::Class { class, .. } => Some(class),
            Member::Resource(_) => None,
        }));
        let mut plans = Vec::new();
        let mut demoted = Vec::new();
        for (i, member) in members.iter().enumerate() {
            if let Member::Class { class, .. } = member {
                match local_inner_classes(class, &global)? {
                    Some(plan) => plans.push(plan),
                    None => demoted.push(i),
                }
            }
        }
        if demoted.is_empty() {
            return Ok((global, plans));
        }
        for i in demoted {
            let entry = members[i].entry();
            debug!(entry = entry.name.as_str(), "inner classes not representable, class passed as a resource");
            members[i] = Member::Resource(entry);
        }
    }
}

/// The most common class file version, which then needs no attribute.
fn default_version<'c>(classes: impl Iterator<Item = &'c Class>) -> (u16, u16) {
    let mut counts: BTreeMap<(u16, u16), usize> = BTreeMap::new();
    for class in classes {
        *counts.entry((class.minor_version, class.major_version)).or_default() += 1;
    }
    return counts
        .into_iter()
        .max_by_key(|(_, n)| *n)
        .map(|(version, _)| version)
        .unwrap_or((0, 0));
}

fn layout_uses(attributes: &[Attribute], used: &mut BTreeSet<(AttributeContext, usize)>) {
    for a in attributes {
        match a {
            Attribute::Layout(l) => {
                used.insert((l.layout.context(), l.layout.index()));
            }
            Attribute::Code(code) => layout_uses(&code.attributes, used),
            Attribute::InnerClasses(_) => {}
        }
    }
}

/// The configured layouts some class uses, which the segment has to define.
fn used_definitions(layouts: &Layouts, classes: &[PackedClass]) -> Vec<Rc<AttributeLayout>> {
    let mut used = BTreeSet::new();
    for packed in classes {
        let class = &packed.class;
        layout_uses(&class.attributes, &mut used);
        for member in class.fields.iter().chain(class.methods.iter()) {
            layout_uses(&member.attributes, &mut used);
        }
    }
    return layouts
        .configured_layouts()
        .into_iter()
        .filter(|l| used.contains(&(l.context(), l.index())))
        .collect();
}

fn attr_definition_bands(w: &mut BandWriter, definitions: &[Rc<AttributeLayout>], pool: &SegmentPool) -> Result<(), Error> {
    let headers: Vec<usize> = definitions
        .iter()
        .map(|l| ((l.index() + 1) << 2) | l.context() as usize)
        .collect();
    let names = definitions.iter().map(|l| pool.utf8(l.name())).collect::<Result<Vec<_>, _>>()?;
    let texts = definitions.iter().map(|l| pool.utf8(l.layout())).collect::<Result<Vec<_>, _>>()?;
    w.counts("attr_definition_headers", BYTE1, &headers)?;
    w.counts("attr_definition_name", UNSIGNED5, &names)?;
    return w.counts("attr_definition_layout", UNSIGNED5, &texts);
}

fn ic_bands(w: &mut BandWriter, tuples: &[IcTuple], pool: &SegmentPool) -> Result<(), Error> {
    let classes = tuples.iter().map(|t| pool.class(&t.class)).collect::<Result<Vec<_>, _>>()?;
    let flags: Vec<i64> = tuples.iter().map(|t| t.flags as i64).collect();
    let mut outers = Vec::new();
    let mut names = Vec::new();
    for t in tuples.iter().filter(|t| t.is_explicit()) {
        outers.push(t.outer.as_deref().map(|o| pool.class(o)).transpose()?);
        names.push(t.name.as_deref().map(|n| pool.utf8(n)).transpose()?);
    }
    w.counts("ic_this_class", UDELTA5, &classes)?;
    w.band("ic_flags", UNSIGNED5, &flags)?;
    w.nullable("ic_outer_class", DELTA5, &outers)?;
    return w.nullable("ic_name", DELTA5, &names);
}

/// A file band entry: a resource with its bits, or a stub standing for the next class.
struct FileOut<'e> {
    name: String,
    size: u64,
    modtime: i32,
    options: u32,
    bits: &'e [u8],
}

fn file_bands(w: &mut BandWriter, files: &[FileOut], options: ArchiveOptions, pool: &SegmentPool) -> Result<(), Error> {
    let names = files.iter().map(|f| pool.utf8(&f.name)).collect::<Result<Vec<_>, _>>()?;
    w.counts("file_name", UNSIGNED5, &names)?;
    if options.has(ArchiveOptions::HAVE_FILE_SIZE_HI) {
        let his: Vec<i64> = files.iter().map(|f| (f.size >> 32) as i64).collect();
        w.band("file_size_hi", UNSIGNED5, &his)?;
    }
    let los: Vec<i64> = files.iter().map(|f| (f.size & 0xFFFF_FFFF) as i64).collect();
    w.band("file_size_lo", UNSIGNED5, &los)?;
    if options.has(ArchiveOptions::HAVE_FILE_MODTIME) {
        let modtimes: Vec<i64> = files.iter().map(|f| f.modtime as i64).collect();
        w.band("file_modtime", DELTA5, &modtimes)?;
    }
    if options.has(ArchiveOptions::HAVE_FILE_OPTIONS) {
        let bits: Vec<i64> = files.iter().map(|f| f.options as i64).collect();
        w.band("file_options", UNSIGNED5, &bits)?;
    }
    for f in files {
        w.bytes("file_bits", f.bits);
    }
    return Ok(());
}

fn header_value(out: &mut Vec<u8>, value: i64) -> Result<(), Error> {
    UNSIGNED5.encode_value(value, 0, out)?;
    return Ok(());
}

/// Pack `entries` into one segment appended to `out`.
pub fn write_segment(entries: &[&Entry], layouts: &Layouts, options: &Options, out: &mut Vec<u8>) -> Result<(), Error> {
    let mut members = Vec::with_capacity(entries.len());
    for &entry in entries {
        if !entry.is_class() {
            members.push(Member::Resource(entry));
            continue;
        }
        match lift_class(&entry.name, &entry.contents, layouts, options)? {
            Either::Left(class) => members.push(Member::Class { entry, class }),
            Either::Right(_) => members.push(Member::Resource(entry)),
        }
    }
    let (global, plans) = plan_inner_classes(&mut members)?;

    let mut classes = Vec::new();
    let mut files = Vec::with_capacity(members.len());
    let archive_modtime = entries.iter().map(|e| e.modtime).min().unwrap_or(0);
    let per_file_hint = options.deflate_hint == DeflateHint::Keep;
    let mut plans = plans.into_iter();
    for member in members {
        let entry = member.entry();
        let mut file = FileOut {
            name: entry.name.clone(),
            size: 0,
            modtime: entry.modtime.wrapping_sub(archive_modtime),
            options: if per_file_hint && entry.deflate_hint { FILE_DEFLATE_HINT } else { 0 },
            bits: &[],
        };
        match member {
            Member::Class { class, .. } => {
                if entry.name == format!("{}.class", class.this_class) {
                    file.name = String::new();
                }
                file.options |= FILE_CLASS_STUB;
                let inner_classes = plans.next().unwrap_or(LocalInnerClasses::Absent);
                classes.push(PackedClass { class, inner_classes });
            }
            Member::Resource(_) => {
                file.size = entry.contents.len() as u64;
                file.bits = &entry.contents;
            }
        }
        files.push(file);
    }

    let definitions = used_definitions(layouts, &classes);
    let mut collector = PoolCollector::new();
    for packed in &classes {
        collector.class_file(&packed.class);
        if let LocalInnerClasses::Slot(entries) = &packed.inner_classes {
            collector.inner_classes(entries);
        }
    }
    for t in &global {
        collector.class(&t.class);
        if let Some(outer) = &t.outer {
            collector.class(outer);
        }
        if let Some(name) = &t.name {
            collector.utf8(name);
        }
    }
    for l in &definitions {
        collector.utf8(l.name());
        collector.utf8(l.layout());
    }
    for f in &files {
        collector.utf8(&f.name);
    }
    let numbers = collector.has_numbers();
    let pool = collector.freeze()?;
    let members = MemberIndex::new(&pool.pool)?;
    let version = default_version(classes.iter().map(|p| &p.class));

    let mut w = BandWriter::new();
    pool.write(&mut w)?;
    attr_definition_bands(&mut w, &definitions, &pool)?;
    ic_bands(&mut w, &global, &pool)?;
    let set = ClassSet {
        pool: &pool,
        members: &members,
        inner_classes: &global,
        default_version: version,
    };
    let mut bytecode = CodeWriter::new();
    class_bands(&mut w, &classes, &set, &mut bytecode)?;
    let methods = bytecode.method_count();
    bytecode.finish(&mut w)?;

    let mut archive_options = ArchiveOptions::default()
        .with(ArchiveOptions::HAVE_FILE_HEADERS, true)
        .with(ArchiveOptions::HAVE_CP_NUMBERS, numbers)
        .with(ArchiveOptions::DEFLATE_HINT, options.deflate_hint == DeflateHint::True)
        .with(ArchiveOptions::HAVE_FILE_SIZE_HI, files.iter().any(|f| f.size > u32::MAX as u64))
        .with(ArchiveOptions::HAVE_FILE_MODTIME, files.iter().any(|f| f.modtime != 0))
        .with(ArchiveOptions::HAVE_FILE_OPTIONS, files.iter().any(|f| f.options != 0));
    file_bands(&mut w, &files, archive_options, &pool)?;
    let (band_headers, body) = w.finish();
    archive_options = archive_options.with(
        ArchiveOptions::HAVE_SPECIAL_FORMATS,
        !definitions.is_empty() || !band_headers.is_empty(),
    );

    // Everything after archive_size_lo.
    let mut rest = Vec::with_capacity(body.len() + 64);
    header_value(&mut rest, 0)?;
    header_value(&mut rest, archive_modtime as i64)?;
    header_value(&mut rest, files.len() as i64)?;
    if archive_options.has(ArchiveOptions::HAVE_SPECIAL_FORMATS) {
        header_value(&mut rest, band_headers.len() as i64)?;
        header_value(&mut rest, definitions.len() as i64)?;
    }
    let counts = pool.counts();
    header_value(&mut rest, counts.utf8 as i64)?;
    if numbers {
        for n in [counts.int, counts.float, counts.long, counts.double] {
            header_value(&mut rest, n as i64)?;
        }
    }
    for n in [
        counts.string,
        counts.class,
        counts.signature,
        counts.descr,
        counts.field,
        counts.method,
        counts.imethod,
    ] {
        header_value(&mut rest, n as i64)?;
    }
    header_value(&mut rest, global.len() as i64)?;
    header_value(&mut rest, version.0 as i64)?;
    header_value(&mut rest, version.1 as i64)?;
    header_value(&mut rest, classes.len() as i64)?;
    rest.extend_from_slice(&band_headers);
    rest.extend_from_slice(&body);

    let archive_size = rest.len() as u64;
    out.extend_from_slice(&MAGIC);
    header_value(out, MINOR_VERSION as i64)?;
    header_value(out, MAJOR_VERSION as i64)?;
    header_value(out, archive_options.0 as i64)?;
    header_value(out, (archive_size >> 32) as i64)?;
    header_value(out, (archive_size & 0xFFFF_FFFF) as i64)?;
    out.extend_from_slice(&rest);
    debug!(
        files = files.len(),
        classes = classes.len(),
        methods,
        inner_classes = global.len(),
        bytes = archive_size,
        "segment written"
    );
    return Ok(());
}
