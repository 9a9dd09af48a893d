extern crate std;
use super::*;

use alloc::vec;
use std::prelude::rust_2018::*;
use test_case::test_case;

fn encode(codec: &BhsdCodec, value: i64, last: i64) -> Vec<u8> {
    let mut out = Vec::new();
    codec.encode_value(value, last, &mut out).unwrap();
    return out;
}

#[test]
fn cardinalities() {
    assert_eq!(BYTE1.cardinality(), 256);
    assert_eq!(UNSIGNED5.cardinality(), 4346097856);
    assert_eq!(BCI5.cardinality(), 86956);
    assert_eq!(BhsdCodec::new(2, 256, 0, false).unwrap().cardinality(), 65536);
}

#[test]
fn invalid_parameters_are_rejected() {
    assert!(BhsdCodec::new(0, 64, 0, false).is_err());
    assert!(BhsdCodec::new(6, 64, 0, false).is_err());
    assert!(BhsdCodec::new(1, 64, 0, false).is_err());
    assert!(BhsdCodec::new(5, 256, 0, false).is_err());
    assert!(BhsdCodec::new(3, 128, 3, false).is_err());
    assert!(BhsdCodec::new(3, 0, 0, false).is_err());
    assert_eq!(BhsdCodec::new(3, 128, 0, false), Ok(CHAR3));
}

#[test_case(0, &[0]; "zero")]
#[test_case(191, &[191]; "largest single byte")]
#[test_case(192, &[192, 0]; "smallest two bytes")]
#[test_case(255, &[255, 0]; "byte boundary")]
#[test_case(256, &[192, 1]; "next radix digit")]
fn unsigned5_bytes(value: i64, expected: &[u8]) {
    assert_eq!(encode(&UNSIGNED5, value, 0), expected);
    let (rest, decoded) = UNSIGNED5.decode_value(expected, 0).unwrap();
    assert_eq!(decoded, value);
    assert!(rest.is_empty());
}

#[test_case(0, &[0])]
#[test_case(-1, &[1])]
#[test_case(1, &[2])]
#[test_case(-2, &[3])]
fn signed5_bytes(value: i64, expected: &[u8]) {
    assert_eq!(encode(&SIGNED5, value, 0), expected);
}

#[test_case(BYTE1)]
#[test_case(CHAR3)]
#[test_case(BCI5)]
#[test_case(BRANCH5)]
#[test_case(UNSIGNED5)]
#[test_case(UDELTA5)]
#[test_case(SIGNED5)]
#[test_case(DELTA5)]
#[test_case(MDELTA5)]
fn boundary_values_survive(codec: BhsdCodec) {
    let candidates = [
        0,
        -1,
        1,
        i32::MAX as i64,
        i32::MIN as i64,
        codec.min(),
        codec.max(),
    ];
    let lasts = [0, -1, codec.max(), codec.min()];
    for &value in candidates.iter() {
        if !codec.is_full_range() && !codec.encodes(value) {
            continue;
        }
        for &last in lasts.iter() {
            let bytes = encode(&codec, value, last);
            assert!(bytes.len() <= codec.b() as usize);
            let (rest, decoded) = codec.decode_value(&bytes, last).unwrap();
            assert!(rest.is_empty());
            if codec.is_full_range() {
                assert_eq!(decoded as i32, value as i32, "{} via {} from {}", value, codec, last);
            } else {
                assert_eq!(decoded, value, "{} via {} from {}", value, codec, last);
            }
        }
    }
}

#[test]
fn delta_wraps_at_32_bits() {
    let bytes = encode(&DELTA5, i32::MIN as i64, i32::MAX as i64);
    assert_eq!(bytes, vec![2]);
    let (_, decoded) = DELTA5.decode_value(&bytes, i32::MAX as i64).unwrap();
    assert_eq!(decoded, i32::MIN as i64);
}

#[test]
fn narrow_delta_wraps_into_range() {
    let byte_delta = BhsdCodec::new(1, 256, 0, true).unwrap();
    let bytes = encode(&byte_delta, 0, 255);
    assert_eq!(bytes, vec![1]);
    let (_, decoded) = byte_delta.decode_value(&bytes, 255).unwrap();
    assert_eq!(decoded, 0);
}

#[test]
fn values_outside_narrow_codecs_fail() {
    let mut out = Vec::new();
    assert!(BYTE1.encode_value(256, 0, &mut out).is_err());
    assert!(BCI5.encode_value(-1, 0, &mut out).is_err());
}

#[test]
fn truncated_value_is_reported() {
    assert_eq!(UNSIGNED5.decode_value(&[200, 200], 0), Err(CodecError::UnexpectedEof));
}

#[test]
fn band_decoding_consumes_exact_bytes() {
    let mut bytes = Vec::new();
    let mut last = 0;
    for v in [5i64, 300, -7, 100000] {
        DELTA5.encode_value(v, last, &mut bytes).unwrap();
        last = v;
    }
    let total = bytes.len();
    bytes.extend_from_slice(&[0xAA, 0xBB]);
    let (rest, values) = DELTA5.decode_values(&bytes, 4).unwrap();
    assert_eq!(values, vec![5, 300, -7, 100000]);
    assert_eq!(bytes.len() - rest.len(), total);
}

#[test_case(BYTE1, Some(1))]
#[test_case(BCI5, Some(17))]
#[test_case(BRANCH5, Some(19))]
#[test_case(UNSIGNED5, Some(26))]
#[test_case(SIGNED5, Some(27))]
#[test_case(UDELTA5, Some(41))]
#[test_case(DELTA5, Some(42))]
#[test_case(MDELTA5, Some(43))]
#[test_case(CHAR3, None)]
fn canonical_indices(codec: BhsdCodec, index: Option<i32>) {
    assert_eq!(canonical_index(&codec), index);
    if let Some(i) = index {
        assert_eq!(canonical_codec(i), Some(codec));
    }
}

#[test]
fn arbitrary_specifier_reads_two_header_bytes() {
    let headers = CHAR3.specifier_bytes();
    let (rest, codec) = codec_from_specifier(ARBITRARY_SPECIFIER, &headers, &UNSIGNED5).unwrap();
    assert_eq!(codec, Codecs::Bhsd(CHAR3));
    assert!(rest.is_empty());
}

#[test]
fn run_codec_switches_after_k_values() {
    // kx = 0, k from default kb = 3, first half defaulted, second half given as BYTE1.
    let headers = [1u8];
    let (rest, codec) = codec_from_specifier(125, &headers, &UNSIGNED5).unwrap();
    assert!(rest.is_empty());
    let mut bytes = Vec::new();
    for v in [1i64, 2, 3, 250] {
        UNSIGNED5.encode_value(v, 0, &mut bytes).unwrap();
    }
    bytes.extend_from_slice(&[200, 201]);
    let (rest, values) = codec.decode_values(&bytes, 6).unwrap();
    assert_eq!(values, vec![1, 2, 3, 250, 200, 201]);
    assert!(rest.is_empty());
}

#[test]
fn population_codec_expands_tokens() {
    // Favoured and unfavoured default, token coding implied from L = 4.
    let (_, codec) = codec_from_specifier(148, &[], &UNSIGNED5).unwrap();
    let bytes = [5u8, 9, 9, 1, 0, 2, 1, 100];
    let (rest, values) = codec.decode_values(&bytes, 4).unwrap();
    assert_eq!(values, vec![5, 100, 9, 5]);
    assert!(rest.is_empty());
}

#[test]
fn run_codec_reads_kb_then_nested_specifiers() {
    // kx = 3, kb given, first half explicit, second half defaulted.
    let headers = [0u8, 1, 0xEE];
    let (rest, codec) = codec_from_specifier(140, &headers, &UNSIGNED5).unwrap();
    assert_eq!(rest, &[0xEE]);
    match codec {
        Codecs::Run(run) => {
            assert_eq!(run.k(), 4096);
            assert_eq!(run.a(), &Codecs::Bhsd(BYTE1));
            assert_eq!(run.b(), &Codecs::Bhsd(UNSIGNED5));
        }
        other => panic!("expected a run coding, got {}", other),
    }
}

#[test]
fn deeply_nested_specifiers_are_rejected() {
    let headers = [117u8; 64];
    assert_eq!(
        codec_from_specifier(117, &headers, &UNSIGNED5),
        Err(CodecError::NestingTooDeep)
    );
}

#[test]
fn specifiers_past_the_table_are_rejected() {
    assert_eq!(
        codec_from_specifier(189, &[], &UNSIGNED5),
        Err(CodecError::InvalidSpecifier(189))
    );
}
