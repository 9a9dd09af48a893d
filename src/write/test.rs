extern crate std;
use super::attrs::{announce, Holder, OutAttribute};
use super::*;
use crate::classfile::{self as cf, *};
use crate::layout::{AttributeContext, AttributeLayout};
use crate::options::DeflateHint;
use crate::parser::types::{IcTuple, LayoutSlot};
use crate::read::unpack;

use alloc::rc::Rc;
use std::prelude::rust_2018::*;
use test_case::test_case;

fn member(class: &str, name: &str, descriptor: &str) -> MemberRef {
    return MemberRef {
        class: class.to_string(),
        name: name.to_string(),
        descriptor: descriptor.to_string(),
    };
}

fn code(max_stack: u16, max_locals: u16, instructions: Vec<Instruction>) -> Attribute {
    return Attribute::Code(Code {
        max_stack,
        max_locals,
        instructions,
        handlers: vec![],
        attributes: vec![],
    });
}

/// A class with a field, a constructor and a getter.
fn counter() -> Class {
    let init = vec![
        Instruction::simple(cf::ALOAD_0),
        Instruction::new(
            cf::INVOKESPECIAL,
            Operand::Constant(Constant::Method(member("java/lang/Object", "<init>", "()V"))),
        ),
        Instruction::simple(177),
    ];
    let get = vec![
        Instruction::simple(cf::ALOAD_0),
        Instruction::new(cf::GETFIELD, Operand::Constant(Constant::Field(member("Counter", "count", "I")))),
        Instruction::simple(172),
    ];
    return Class {
        minor_version: 0,
        major_version: 50,
        access_flags: 0x21,
        this_class: "Counter".to_string(),
        super_class: Some("java/lang/Object".to_string()),
        interfaces: vec![],
        fields: vec![Member {
            access_flags: 0x02,
            name: "count".to_string(),
            descriptor: "I".to_string(),
            attributes: vec![],
        }],
        methods: vec![
            Member {
                access_flags: 0x01,
                name: "<init>".to_string(),
                descriptor: "()V".to_string(),
                attributes: vec![code(1, 1, init)],
            },
            Member {
                access_flags: 0x01,
                name: "get".to_string(),
                descriptor: "()I".to_string(),
                attributes: vec![code(1, 1, get)],
            },
        ],
        attributes: vec![],
    };
}

fn entry(name: &str, contents: Vec<u8>, modtime: i32, deflate_hint: bool) -> Entry {
    let mut e = Entry::new(name, contents);
    e.modtime = modtime;
    e.deflate_hint = deflate_hint;
    return e;
}

fn class_entry(class: &Class) -> Entry {
    return entry(&format!("{}.class", class.this_class), write_class(class).unwrap(), 1_000_000, true);
}

fn round_trip(entries: &[Entry], options: &Options) -> Vec<Entry> {
    let archive = pack(entries, options).unwrap();
    let mut out = Vec::new();
    unpack(&archive, options, &mut out).unwrap();
    return out;
}

fn lifted(e: &Entry) -> Class {
    let options = Options::default();
    let layouts = Layouts::new(&options).unwrap();
    return lift_class(&e.name, &e.contents, &layouts, &options).unwrap().left().unwrap();
}

#[test]
fn classes_and_resources_survive() {
    let input = vec![
        entry("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\n".to_vec(), 1_000_050, false),
        class_entry(&counter()),
    ];
    let output = round_trip(&input, &Options::default());
    assert_eq!(output.len(), 2);
    assert_eq!(output[0], input[0]);
    assert_eq!(output[1].name, "Counter.class");
    assert_eq!(output[1].modtime, 1_000_000);
    assert!(output[1].deflate_hint);
    assert_eq!(lifted(&output[1]), lifted(&input[1]));
}

#[test]
fn unpacked_classes_are_written_identically() {
    let input = vec![class_entry(&counter())];
    let output = round_trip(&input, &Options::default());
    assert_eq!(output[0].contents, input[0].contents);
}

#[test]
fn empty_input_packs_to_one_segment() {
    let archive = pack(&[], &Options::default()).unwrap();
    assert_eq!(&archive[..4], &[0xCA, 0xFE, 0xD0, 0x0D]);
    let mut out = Vec::new();
    unpack(&archive, &Options::default(), &mut out).unwrap();
    assert!(out.is_empty());
}

#[test]
fn resources_move_ahead_of_classes() {
    let input = vec![class_entry(&counter()), entry("a.txt", b"a".to_vec(), 0, false)];
    let options = Options::default().keep_file_order(false);
    let names: Vec<String> = round_trip(&input, &options).into_iter().map(|e| e.name).collect();
    assert_eq!(names, vec!["a.txt", "Counter.class"]);
}

#[test]
fn deflate_hint_policy_applies_to_every_member() {
    let input = vec![entry("a.txt", b"a".to_vec(), 0, false), entry("b.txt", b"b".to_vec(), 0, true)];
    let options = Options::default().deflate_hint(DeflateHint::True);
    assert!(round_trip(&input, &options).iter().all(|e| e.deflate_hint));
    let options = Options::default().deflate_hint(DeflateHint::False);
    assert!(round_trip(&input, &options).iter().all(|e| !e.deflate_hint));
}

#[test_case(None, &[3, 3, 3], &[3] ; "no limit")]
#[test_case(Some(6), &[3, 3, 3], &[2, 1] ; "fills up")]
#[test_case(Some(2), &[3, 1, 1], &[1, 2] ; "oversized member alone")]
#[test_case(Some(10), &[], &[0] ; "nothing")]
fn segments_split_by_size(limit: Option<u64>, sizes: &[usize], expected: &[usize]) {
    let entries: Vec<Entry> = sizes
        .iter()
        .enumerate()
        .map(|(i, n)| Entry::new(&format!("{}", i), vec![0; *n]))
        .collect();
    let segments = split_segments(entries.iter().collect(), limit);
    let lens: Vec<usize> = segments.iter().map(|s| s.len()).collect();
    assert_eq!(lens, expected);
}

#[test]
fn segments_are_read_in_order() {
    let input: Vec<Entry> = (0..4).map(|i| entry(&format!("r{}", i), vec![i as u8; 100], i, false)).collect();
    let options = Options::default().segment_limit(Some(150));
    let archive = pack(&input, &options).unwrap();
    let mut out = Vec::new();
    unpack(&archive, &options, &mut out).unwrap();
    assert_eq!(out, input);
}

fn layout_attribute(context: AttributeContext, index: usize) -> LayoutAttribute {
    return LayoutAttribute {
        layout: Rc::new(AttributeLayout::new("X", context, index, "").unwrap()),
        values: vec![],
    };
}

#[test]
fn attributes_out_of_order_overflow() {
    let a = layout_attribute(AttributeContext::Class, 21);
    let b = layout_attribute(AttributeContext::Class, 17);
    let holder = Holder {
        access_flags: 1,
        attributes: vec![OutAttribute::Layout(&a), OutAttribute::Layout(&b)],
        version: Some((0, 45)),
    };
    let (flags, overflow) = announce(AttributeContext::Class, &holder);
    assert_eq!(flags, 1 | 1 << 21 | 1 << 24 | 1 << 16);
    assert_eq!(overflow, vec![17]);
}

#[test]
fn ascending_attributes_fit_in_the_flags() {
    let a = layout_attribute(AttributeContext::Field, 17);
    let b = layout_attribute(AttributeContext::Field, 19);
    let holder = Holder {
        access_flags: 0,
        attributes: vec![OutAttribute::Layout(&a), OutAttribute::Layout(&b)],
        version: None,
    };
    assert_eq!(announce(AttributeContext::Field, &holder), (1 << 17 | 1 << 19, vec![]));
}

fn nested(flags: u16) -> InnerClass {
    return InnerClass {
        inner: "Outer$Nested".to_string(),
        outer: Some("Outer".to_string()),
        name: Some("Nested".to_string()),
        flags,
    };
}

fn outer(attributes: Vec<Attribute>) -> Class {
    let mut class = counter();
    class.this_class = "Outer".to_string();
    class.methods.clear();
    class.fields[0].descriptor = "LOuter$Nested;".to_string();
    class.interfaces = vec!["Outer$Nested".to_string()];
    class.attributes = attributes;
    return class;
}

#[test]
fn predictable_inner_classes_go_unsaid() {
    let class = outer(vec![Attribute::InnerClasses(vec![nested(0x09)])]);
    let global = segment::global_inner_classes([&class].into_iter());
    assert_eq!(global, vec![IcTuple::predicted("Outer$Nested", 0x09)]);
    assert_eq!(segment::local_inner_classes(&class, &global).unwrap(), Some(LocalInnerClasses::Absent));
}

#[test]
fn implied_entries_without_attribute_are_cancelled() {
    let with = outer(vec![Attribute::InnerClasses(vec![nested(0x09)])]);
    let without = outer(vec![]);
    let global = segment::global_inner_classes([&with].into_iter());
    assert_eq!(
        segment::local_inner_classes(&without, &global).unwrap(),
        Some(LocalInnerClasses::Slot(vec![]))
    );
}

#[test]
fn empty_inner_classes_attribute_cannot_be_sent() {
    let class = outer(vec![Attribute::InnerClasses(vec![])]);
    let global = segment::global_inner_classes([&class].into_iter());
    assert_eq!(segment::local_inner_classes(&class, &global).unwrap(), None);
}

#[test]
fn unpredictable_names_are_explicit() {
    let entry = InnerClass {
        inner: "Outer$1".to_string(),
        outer: None,
        name: Some("Odd".to_string()),
        flags: 0,
    };
    let class = outer(vec![Attribute::InnerClasses(vec![entry.clone()])]);
    let global = segment::global_inner_classes([&class].into_iter());
    assert!(global[0].is_explicit());
    assert_eq!(global[0].to_inner_class(), entry);
}

#[test]
fn inner_classes_round_trip() {
    let with = outer(vec![Attribute::InnerClasses(vec![nested(0x09)])]);
    let without = {
        let mut class = outer(vec![]);
        class.this_class = "Other".to_string();
        class
    };
    let input = vec![class_entry(&with), class_entry(&without)];
    let output = round_trip(&input, &Options::default());
    assert_eq!(lifted(&output[0]), lifted(&input[0]));
    assert_eq!(lifted(&output[1]), lifted(&input[1]));
}

/// A tree node of the `Tree` layout below: a value and its children.
fn tree_node(value: i64, children: Vec<AttrValue>) -> AttrValue {
    return AttrValue::Call(vec![
        AttrValue::Int(value),
        AttrValue::Replication(children.into_iter().map(|c| vec![c]).collect()),
    ]);
}

#[test]
fn recursive_layouts_round_trip() {
    let mut options = Options::default();
    options.set("pack.class.attribute.Tree", "[(1)][HNH[(0)]]").unwrap();
    let layouts = Layouts::new(&options).unwrap();
    let layout = match layouts.definitions().find(AttributeContext::Class, "Tree") {
        Some((_, LayoutSlot::Layout(layout))) => layout.clone(),
        other => panic!("Tree is not configured: {:?}", other),
    };
    let tree = tree_node(1, vec![tree_node(2, vec![]), tree_node(3, vec![tree_node(4, vec![])])]);
    let mut class = counter();
    class.attributes.push(Attribute::Layout(LayoutAttribute {
        layout,
        values: vec![tree],
    }));

    let input = vec![class_entry(&class)];
    let output = round_trip(&input, &options);
    assert_eq!(output[0].contents, input[0].contents);
    let back = lift_class(&output[0].name, &output[0].contents, &layouts, &options)
        .unwrap()
        .left()
        .unwrap();
    assert_eq!(back.attributes, class.attributes);
}
