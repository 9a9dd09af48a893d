extern crate std;
use super::*;
use crate::bytecode::{self_linker_code, MemberIndex, OperandBand, INVOKE_INIT};
use crate::classfile::{self as cf, Constant, Handler, Instruction, MemberRef, Operand};
use crate::parser::types::*;

use alloc::string::String;
use alloc::vec;
use std::prelude::rust_2018::*;
use widestring::U16String;

/// A pool with classes `Foo` and `java/lang/Object`, field `Foo.x:I` and `Object.<init>()V`.
fn pool() -> ConstantPool {
    let mut pool = ConstantPool::default();
    pool.utf8 = ["", "Foo", "java/lang/Object", "x", "I", "<init>", "()V"]
        .iter()
        .map(|s| U16String::from_str(s))
        .collect();
    pool.class = vec![1, 2];
    pool.signature = vec![
        SignatureEntry {
            form: 4,
            classes: Vec::new(),
        },
        SignatureEntry {
            form: 6,
            classes: Vec::new(),
        },
    ];
    pool.descr = vec![DescrEntry { name: 3, signature: 0 }, DescrEntry { name: 5, signature: 1 }];
    pool.field = vec![MemberEntry { class: 0, descr: 0 }];
    pool.method = vec![MemberEntry { class: 1, descr: 1 }];
    pool.resolve_names().unwrap();
    return pool;
}

fn byte_codes(operands: &[(OperandBand, Vec<i32>)]) -> ByteCodes<'static> {
    let mut bc = ByteCodes {
        codes: Vec::new(),
        operands: vec![Vec::new(); OperandBand::ALL.len()],
    };
    for (band, values) in operands {
        bc.operands[band.position()] = values.clone();
    }
    return bc;
}

fn bands() -> CodeBands {
    return CodeBands {
        max_stack: 2,
        max_na_locals: 0,
        handlers: Vec::new(),
        attributes: Vec::new(),
    };
}

fn run(codes: &[u8], operands: &[(OperandBand, Vec<i32>)], bands: &CodeBands) -> Result<cf::Code, Corruption> {
    let pool = pool();
    let members = MemberIndex::new(&pool).unwrap();
    let bc = byte_codes(operands);
    let mut ops = OperandManager::new(&bc);
    let cx = CodeContext {
        pool: &pool,
        members: &members,
        this_class: 0,
        super_class: Some(1),
    };
    return materialize_code(codes, bands, 0, "()I", &cx, &mut ops, Vec::new());
}

fn object_init() -> Constant {
    return Constant::Method(MemberRef {
        class: String::from("java/lang/Object"),
        name: String::from("<init>"),
        descriptor: String::from("()V"),
    });
}

#[test]
fn operands_in_order() {
    let bc = byte_codes(&[(OperandBand::Byte, vec![4, 5])]);
    let mut ops = OperandManager::new(&bc);
    assert_eq!(ops.next(OperandBand::Byte), Ok(4));
    assert_eq!(ops.next(OperandBand::Byte), Ok(5));
    assert_eq!(ops.next(OperandBand::Byte), Err(Corruption::BandExhausted { band: "bc_byte" }));
    assert_eq!(ops.next(OperandBand::Short), Err(Corruption::BandExhausted { band: "bc_short" }));
}

#[test]
fn aload_0_getfield_this() {
    let getfield = self_linker_code(cf::GETFIELD, true, false).unwrap();
    let code = run(&[getfield, 172], &[(OperandBand::ThisField, vec![0])], &bands()).unwrap();
    let field = Constant::Field(MemberRef {
        class: String::from("Foo"),
        name: String::from("x"),
        descriptor: String::from("I"),
    });
    assert_eq!(
        code.instructions,
        vec![
            Instruction::simple(cf::ALOAD_0),
            Instruction::new(cf::GETFIELD, Operand::Constant(field)),
            Instruction::simple(172),
        ]
    );
    // Non-static `()I` takes only the receiver.
    assert_eq!(code.max_locals, 1);
    assert_eq!(code.max_stack, 2);
}

#[test]
fn immediates() {
    let code = run(
        &[cf::BIPUSH, cf::SIPUSH, cf::NEWARRAY, 172],
        &[(OperandBand::Byte, vec![255, 10]), (OperandBand::Short, vec![-2])],
        &bands(),
    )
    .unwrap();
    assert_eq!(code.instructions[0].operand, Operand::Immediate(-1));
    assert_eq!(code.instructions[1].operand, Operand::Immediate(-2));
    assert_eq!(code.instructions[2].operand, Operand::Immediate(10));
}

#[test]
fn labels_count_instructions() {
    // goto +1; return
    let code = run(&[167, 177], &[(OperandBand::Label, vec![1])], &bands()).unwrap();
    assert_eq!(code.instructions[0].operand, Operand::Branch(1));

    let err = run(&[167, 177], &[(OperandBand::Label, vec![5])], &bands()).unwrap_err();
    assert_eq!(err, Corruption::BadBranch { target: 5 });
}

#[test]
fn tableswitch_labels() {
    // tableswitch low=3 with two cases; return
    let code = run(
        &[cf::TABLESWITCH, 177],
        &[
            (OperandBand::CaseCount, vec![2]),
            (OperandBand::CaseValue, vec![3]),
            (OperandBand::Label, vec![1, 1, 0]),
        ],
        &bands(),
    )
    .unwrap();
    assert_eq!(
        code.instructions[0].operand,
        Operand::TableSwitch {
            default: 1,
            low: 3,
            targets: vec![1, 0],
        }
    );
}

#[test]
fn init_after_new() {
    let code = run(
        &[cf::NEW, 89, INVOKE_INIT + 2, 177],
        &[(OperandBand::ClassRef, vec![1]), (OperandBand::InitRef, vec![0])],
        &bands(),
    )
    .unwrap();
    assert_eq!(code.instructions[0].operand, Operand::Constant(Constant::Class(String::from("java/lang/Object"))));
    assert_eq!(code.instructions[2], Instruction::new(cf::INVOKESPECIAL, Operand::Constant(object_init())));
}

#[test]
fn init_super() {
    let code = run(&[INVOKE_INIT + 1, 177], &[(OperandBand::InitRef, vec![0])], &bands()).unwrap();
    assert_eq!(code.instructions[0].operand, Operand::Constant(object_init()));
}

#[test]
fn init_without_new() {
    let err = run(&[INVOKE_INIT + 2, 177], &[(OperandBand::InitRef, vec![0])], &bands()).unwrap_err();
    assert_eq!(err, Corruption::MissingImplicitClass { opcode: INVOKE_INIT + 2 });
}

#[test]
fn this_has_no_init() {
    let err = run(&[INVOKE_INIT, 177], &[(OperandBand::InitRef, vec![0])], &bands()).unwrap_err();
    assert!(matches!(err, Corruption::IndexOutOfRange { partition: "bc_initref", .. }));
}

#[test]
fn handlers_by_delta() {
    let mut b = bands();
    b.handlers.push(HandlerBands {
        start: 0,
        end: 1,
        catch: 0,
        class: Some(1),
    });
    let code = run(&[0, 177], &[], &b).unwrap();
    assert_eq!(
        code.handlers,
        vec![Handler {
            start: 0,
            end: 1,
            handler: 1,
            catch_type: Some(String::from("java/lang/Object")),
        }]
    );
}

#[test]
fn escapes() {
    let code = run(
        &[crate::bytecode::BYTE_ESCAPE, crate::bytecode::REF_ESCAPE, 177],
        &[
            (OperandBand::EscSize, vec![1]),
            (OperandBand::EscByte, vec![0xB8]),
            (OperandBand::EscRefSize, vec![2]),
            (OperandBand::EscRef, vec![7]),
        ],
        &bands(),
    )
    .unwrap();
    assert_eq!(code.instructions[0].operand, Operand::EscapedBytes(vec![0xB8]));
    // 7 utf8 entries, then the classes.
    assert_eq!(
        code.instructions[1].operand,
        Operand::EscapedRef {
            constant: Constant::Class(String::from("Foo")),
            width: 2,
        }
    );
}

#[test]
fn empty_input() {
    let mut out: Vec<crate::entry::Entry> = Vec::new();
    let err = unpack(&[], &Options::default(), &mut out).unwrap_err();
    assert!(matches!(
        err,
        Error::Corrupt {
            cause: Corruption::Truncated { .. },
            ..
        }
    ));
}

#[test]
fn stage_order() {
    assert!(Stage::HeaderRead < Stage::ConstantPoolRead);
    assert!(Stage::FileBandsRead < Stage::Materialize);
    assert_eq!(Stage::Flush.name(), "flush");
}
