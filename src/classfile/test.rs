extern crate std;
use super::*;
use crate::layout::AttributeContext;

use std::prelude::rust_2018::*;
use test_case::test_case;

fn layout(name: &str, context: AttributeContext, index: usize, notation: &str) -> Rc<AttributeLayout> {
    return Rc::new(AttributeLayout::new(name, context, index, notation).unwrap());
}

fn member(class: &str, name: &str, descriptor: &str) -> MemberRef {
    return MemberRef {
        class: class.to_string(),
        name: name.to_string(),
        descriptor: descriptor.to_string(),
    };
}

fn line_numbers() -> Rc<AttributeLayout> {
    return layout("LineNumberTable", AttributeContext::Code, 1, "NH[PHH]");
}

fn hello_code() -> Vec<Instruction> {
    return vec![
        Instruction::new(
            GETSTATIC,
            Operand::Constant(Constant::Field(member("java/lang/System", "out", "Ljava/io/PrintStream;"))),
        ),
        Instruction::new(LDC, Operand::Constant(Constant::String(U16String::from_str("hi")))),
        Instruction::new(
            INVOKEVIRTUAL,
            Operand::Constant(Constant::Method(member("java/io/PrintStream", "println", "(Ljava/lang/String;)V"))),
        ),
        Instruction::simple(3),
        Instruction::new(IFEQ, Operand::Branch(6)),
        Instruction::simple(0),
        Instruction::simple(177),
    ];
}

fn hello_class() -> Class {
    let constant_value = layout("ConstantValue", AttributeContext::Field, 17, "KQH");
    return Class {
        minor_version: 0,
        major_version: 49,
        access_flags: 0x21,
        this_class: "Hello".to_string(),
        super_class: Some("java/lang/Object".to_string()),
        interfaces: vec![],
        fields: vec![Member {
            access_flags: 0x1A,
            name: "COUNT".to_string(),
            descriptor: "I".to_string(),
            attributes: vec![Attribute::Layout(LayoutAttribute {
                layout: constant_value,
                values: vec![AttrValue::Ref(Some(Constant::Integer(42)))],
            })],
        }],
        methods: vec![Member {
            access_flags: 0x09,
            name: "main".to_string(),
            descriptor: "([Ljava/lang/String;)V".to_string(),
            attributes: vec![Attribute::Code(Code {
                max_stack: 2,
                max_locals: 1,
                instructions: hello_code(),
                handlers: vec![Handler {
                    start: 0,
                    end: 3,
                    handler: 6,
                    catch_type: None,
                }],
                attributes: vec![Attribute::Layout(LayoutAttribute {
                    layout: line_numbers(),
                    values: vec![AttrValue::Replication(vec![
                        vec![AttrValue::Int(0), AttrValue::Int(3)],
                        vec![AttrValue::Int(6), AttrValue::Int(4)],
                    ])],
                })],
            })],
        }],
        attributes: vec![],
    };
}

#[test]
fn class_files_read_back() {
    let bytes = write_class(&hello_class()).unwrap();
    assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
    let raw = read_class(&bytes).unwrap();
    assert_eq!(raw.major_version, 49);
    assert_eq!(raw.this_class, "Hello");
    assert_eq!(raw.super_class.as_deref(), Some("java/lang/Object"));
    assert_eq!(raw.fields[0].name, "COUNT");
    assert_eq!(raw.methods[0].attributes[0].name, "Code");

    let code = read_code(raw.methods[0].attributes[0].info, &raw.pool).unwrap();
    assert_eq!(code.max_stack, 2);
    assert_eq!(code.handlers[0].end_pc, 8);
    assert_eq!(code.handlers[0].handler_pc, 13);
    let (instructions, offsets) = decode_code(code.code, &raw.pool).unwrap();
    assert_eq!(instructions, hello_code());
    assert_eq!(offsets, vec![0, 3, 5, 8, 9, 12, 13, 14]);

    let lnt = parse_layout_attribute(&line_numbers(), code.attributes[0].info, &raw.pool, Some(&offsets), None, 16).unwrap();
    assert_eq!(
        lnt.values,
        vec![AttrValue::Replication(vec![
            vec![AttrValue::Int(0), AttrValue::Int(3)],
            vec![AttrValue::Int(6), AttrValue::Int(4)],
        ])]
    );
    // pc 13 for the second entry
    assert_eq!(&code.attributes[0].info[6..8], &[0, 13]);
}

#[test]
fn ldc_constants_come_first() {
    let bytes = write_class(&hello_class()).unwrap();
    let raw = read_class(&bytes).unwrap();
    assert_eq!(raw.pool.get(1).unwrap(), &Constant::String(U16String::from_str("hi")));
    // ldc operand
    let code = read_code(raw.methods[0].attributes[0].info, &raw.pool).unwrap();
    assert_eq!(&code.code[3..5], &[LDC, 1]);
}

#[test]
fn writing_is_deterministic() {
    assert_eq!(write_class(&hello_class()).unwrap(), write_class(&hello_class()).unwrap());
}

#[test]
fn field_constants_follow_the_descriptor() {
    let bytes = write_class(&hello_class()).unwrap();
    let raw = read_class(&bytes).unwrap();
    let constant_value = layout("ConstantValue", AttributeContext::Field, 17, "KQH");
    let info = raw.fields[0].attributes[0].info;
    let value = parse_layout_attribute(&constant_value, info, &raw.pool, None, Some("I"), 16).unwrap();
    assert_eq!(value.values, vec![AttrValue::Ref(Some(Constant::Integer(42)))]);
    assert!(parse_layout_attribute(&constant_value, info, &raw.pool, None, Some("J"), 16).is_err());
}

#[test]
fn switches_are_padded() {
    let instructions = vec![
        Instruction::simple(3),
        Instruction::new(
            TABLESWITCH,
            Operand::TableSwitch {
                default: 2,
                low: 0,
                targets: vec![2, 2],
            },
        ),
        Instruction::simple(177),
    ];
    let mut pool = ConstantPoolBuilder::default();
    let (bytes, offsets) = encode_code(&instructions, &mut pool).unwrap();
    assert_eq!(offsets, vec![0, 1, 24, 25]);
    assert_eq!(&bytes[2..4], &[0, 0]);
    let (decoded, _) = decode_code(&bytes, &ClassPool::default()).unwrap();
    assert_eq!(decoded, instructions);
}

#[test]
fn wide_locals() {
    let instructions = vec![
        Instruction::new(ILOAD, Operand::Local { index: 300, wide: true }),
        Instruction::new(
            IINC,
            Operand::Iinc {
                index: 2,
                delta: -1000,
                wide: true,
            },
        ),
        Instruction::new(ILOAD, Operand::Local { index: 4, wide: false }),
    ];
    let mut pool = ConstantPoolBuilder::default();
    let (bytes, _) = encode_code(&instructions, &mut pool).unwrap();
    assert_eq!(bytes, vec![WIDE, ILOAD, 1, 44, WIDE, IINC, 0, 2, 0xFC, 0x18, ILOAD, 4]);
    let (decoded, _) = decode_code(&bytes, &ClassPool::default()).unwrap();
    assert_eq!(decoded, instructions);
}

#[test]
fn narrow_local_overflow_is_an_error() {
    let instructions = vec![Instruction::new(ILOAD, Operand::Local { index: 256, wide: false })];
    let mut pool = ConstantPoolBuilder::default();
    assert!(encode_code(&instructions, &mut pool).is_err());
}

#[test]
fn modified_utf8_keeps_every_code_unit() {
    let units = [0x0000, 0x0041, 0xD800, 0x20AC];
    let bytes = encode_modified_utf8(&units);
    assert_eq!(bytes, vec![0xC0, 0x80, 0x41, 0xED, 0xA0, 0x80, 0xE2, 0x82, 0xAC]);
    assert_eq!(decode_modified_utf8(&bytes).unwrap().as_slice(), &units);
    assert_eq!(decode_modified_utf8(&[0xE2, 0x82]), Err(ClassFileError::BadUtf8));
}

#[test_case("()V", 0)]
#[test_case("(IJ[Ljava/lang/String;D)V", 6)]
#[test_case("([[J)I", 1)]
#[test_case("(Ljava/util/List;Z)V", 2)]
fn argument_slots_count(descriptor: &str, expected: usize) {
    assert_eq!(argument_slots(descriptor).unwrap(), expected);
}

#[test_case("I")]
#[test_case("(Q)V")]
#[test_case("(Ljava/lang/String")]
fn bad_descriptors(descriptor: &str) {
    assert!(argument_slots(descriptor).is_err());
}

#[test]
fn unsupported_constants_are_reported() {
    // A pool holding one MethodType entry, used as this_class.
    let mut bytes = vec![0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52, 0, 2, 16, 0, 1];
    bytes.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    let err = read_class(&bytes).unwrap_err();
    assert_eq!(err, ClassFileError::Unsupported("constant pool tag 16".to_string()));
}
