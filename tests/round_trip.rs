mod common;

use pack200::classfile::{read_class, read_code};
use pack200::jar::{pack_jar, read_jar, unpack_jar, write_jar};
use pack200::write::{lift_class, Layouts};
use pack200::{pack, unpack_to_vec, Entry, Options};

fn member(name: &str, contents: Vec<u8>, deflate: bool) -> Entry {
    let mut entry = Entry::new(name, contents);
    entry.modtime = 1_262_304_000;
    entry.deflate_hint = deflate;
    return entry;
}

fn model(entry: &Entry) -> pack200::classfile::Class {
    let options = Options::default();
    let layouts = Layouts::new(&options).unwrap();
    return lift_class(&entry.name, &entry.contents, &layouts, &options)
        .unwrap()
        .left()
        .expect("class lifts");
}

fn jar() -> Vec<Entry> {
    return vec![
        member("META-INF/", Vec::new(), false),
        member("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\n\r\n".to_vec(), true),
        member("Hello.class", common::hello(), true),
        member("Outer.class", common::outer(), true),
        member("Outer$Inner.class", common::inner(), false),
        member("res/data.bin", (0..=255).collect(), false),
    ];
}

#[test]
fn jar_round_trip_reproduces_every_member() {
    let input = jar();
    let packed = pack_jar(&write_jar(&input).unwrap(), &Options::default()).unwrap();
    let output = read_jar(&unpack_jar(&packed, &Options::default()).unwrap()).unwrap();

    assert_eq!(output.len(), input.len());
    for (i, o) in input.iter().zip(&output) {
        assert_eq!(o.name, i.name);
        assert_eq!(o.modtime, i.modtime);
        assert_eq!(o.deflate_hint, i.deflate_hint);
        if i.is_class() {
            assert_eq!(model(o), model(i), "{}", i.name);
        } else {
            assert_eq!(o.contents, i.contents, "{}", i.name);
        }
    }
}

#[test]
fn single_class_jar_keeps_its_shape() {
    let original = common::hello();
    let packed = pack(&[member("Hello.class", original.clone(), false)], &Options::default()).unwrap();
    let output = unpack_to_vec(&packed).unwrap();
    assert_eq!(output.len(), 1);
    assert_eq!(output[0].name, "Hello.class");

    let before = read_class(&original).unwrap();
    let after = read_class(&output[0].contents).unwrap();
    assert_eq!(&output[0].contents[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
    assert_eq!(after.pool.len(), before.pool.len());
    assert_eq!(after.methods.len(), before.methods.len());
    for (a, b) in after.methods.iter().zip(&before.methods) {
        let a = read_code(a.attributes[0].info, &after.pool).unwrap();
        let b = read_code(b.attributes[0].info, &before.pool).unwrap();
        assert_eq!(a.code.len(), b.code.len());
    }
}

#[test]
fn inner_classes_come_back_where_they_were() {
    let input = jar();
    let output = unpack_to_vec(&pack(&input, &Options::default()).unwrap()).unwrap();
    let outer = read_class(&output[3].contents).unwrap();
    let inner = read_class(&output[4].contents).unwrap();
    assert_eq!(outer.attributes.last().map(|a| a.name.as_str()), Some("InnerClasses"));
    assert_eq!(inner.attributes.last().map(|a| a.name.as_str()), Some("InnerClasses"));
}

#[test]
fn gzip_wrapped_archives_unpack() {
    use std::io::Write;

    let packed = pack(&jar(), &Options::default()).unwrap();
    let mut gz = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    gz.write_all(&packed).unwrap();
    let wrapped = gz.finish().unwrap();
    let plain = read_jar(&unpack_jar(&packed, &Options::default()).unwrap()).unwrap();
    let unwrapped = read_jar(&unpack_jar(&wrapped, &Options::default()).unwrap()).unwrap();
    assert_eq!(plain, unwrapped);
}

#[test]
fn strip_debug_drops_source_file() {
    let options = Options::default().strip_debug(true);
    let packed = pack(&[member("Hello.class", common::hello(), false)], &options).unwrap();
    let output = unpack_to_vec(&packed).unwrap();
    let class = read_class(&output[0].contents).unwrap();
    assert!(class.attributes.iter().all(|a| a.name != "SourceFile"));
}

#[test]
fn annotations_round_trip() {
    let input = member("Annotated.class", common::annotated(), true);
    let output = unpack_to_vec(&pack(&[input.clone()], &Options::default()).unwrap()).unwrap();
    assert_eq!(output.len(), 1);
    assert_eq!(model(&output[0]), model(&input));

    let class = read_class(&output[0].contents).unwrap();
    let names: Vec<&str> = class.attributes.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["RuntimeVisibleAnnotations", "RuntimeInvisibleAnnotations"]);
    assert_eq!(class.methods[0].attributes[0].name, "AnnotationDefault");
    assert_eq!(class.methods[1].attributes[0].name, "RuntimeVisibleParameterAnnotations");
}
