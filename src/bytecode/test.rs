extern crate std;
use super::*;

use test_case::test_case;

#[test_case(202, cf::GETSTATIC, false, OperandBand::ThisField)]
#[test_case(204, cf::GETFIELD, false, OperandBand::ThisField)]
#[test_case(206, cf::INVOKEVIRTUAL, false, OperandBand::ThisMethod)]
#[test_case(210, cf::PUTSTATIC, true, OperandBand::ThisField)]
#[test_case(215, cf::INVOKESTATIC, true, OperandBand::ThisMethod)]
#[test_case(219, cf::PUTFIELD, false, OperandBand::SuperField)]
#[test_case(227, cf::INVOKEVIRTUAL, true, OperandBand::SuperMethod)]
fn self_linker_forms(code: u8, opcode: u8, aload_0: bool, band: OperandBand) {
    let f = form(code).unwrap();
    assert_eq!(f.opcode, opcode);
    assert_eq!(f.aload_0, aload_0);
    assert_eq!(f.shape, Shape::Ref(band));
    let superclass = matches!(band, OperandBand::SuperField | OperandBand::SuperMethod);
    assert_eq!(self_linker_code(opcode, aload_0, superclass), Some(code));
}

#[test]
fn init_forms() {
    assert_eq!(form(230).unwrap().init, Some(InitClass::This));
    assert_eq!(form(231).unwrap().init, Some(InitClass::Super));
    let f = form(232).unwrap();
    assert_eq!(f.init, Some(InitClass::New));
    assert_eq!(f.opcode, cf::INVOKESPECIAL);
}

#[test_case(cf::LDC, Constant::Integer(1), ILDC)]
#[test_case(cf::LDC_W, Constant::Float(0), FLDC_W)]
#[test_case(cf::LDC, Constant::Class(std::string::String::from("A")), CLDC)]
#[test_case(cf::LDC2_W, Constant::Double(0), DLDC2_W)]
#[test_case(cf::LDC2_W, Constant::Long(0), cf::LDC2_W)]
fn typed_ldc(opcode: u8, constant: Constant, code: u8) {
    let (c, band) = ldc_code(opcode, &constant).unwrap();
    assert_eq!(c, code);
    assert_eq!(form(code).unwrap().shape, Shape::Ref(band));
    assert_eq!(form(code).unwrap().opcode, opcode);
}

#[test_case(cf::INVOKEDYNAMIC)]
#[test_case(240)]
#[test_case(252)]
#[test_case(END_MARKER)]
fn codes_without_a_form(code: u8) {
    assert_eq!(form(code), None);
}

#[test]
fn operand_bands_in_order() {
    for (i, band) in OperandBand::ALL.iter().enumerate() {
        assert_eq!(band.position(), i);
    }
    assert_eq!(OperandBand::Label.codec(), BRANCH5);
    assert_eq!(OperandBand::ClassRef.codec(), UNSIGNED5);
    assert_eq!(OperandBand::StringRef.codec(), DELTA5);
}
