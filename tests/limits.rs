mod common;

use pack200::codec::UNSIGNED5;
use pack200::{pack, unpack, Entry, Error, Limits, Options};

fn header_value(out: &mut Vec<u8>, v: i64) {
    UNSIGNED5.encode_value(v, 0, out).unwrap();
}

/// A segment header declaring `utf8` strings and nothing else, followed by a few bytes.
fn claims_strings(utf8: i64) -> Vec<u8> {
    let mut out = vec![0xCA, 0xFE, 0xD0, 0x0D];
    for v in [7, 150, 0] {
        header_value(&mut out, v);
    }
    header_value(&mut out, utf8);
    // string, class, signature, descr, field, method, imethod, ic
    for _ in 0..8 {
        header_value(&mut out, 0);
    }
    // default class version and class count
    for _ in 0..3 {
        header_value(&mut out, 0);
    }
    out.extend_from_slice(&[0; 16]);
    return out;
}

#[test]
fn huge_counts_fail_before_allocating() {
    let mut out: Vec<Entry> = Vec::new();
    let err = unpack(&claims_strings(1 << 30), &Options::default(), &mut out).unwrap_err();
    assert!(matches!(err, Error::ResourceLimit { .. }), "{}", err);
    assert!(out.is_empty());
}

#[test]
fn configured_limits_apply_to_file_bits() {
    let packed = pack(&[Entry::new("big.bin", vec![7; 4096])], &Options::default()).unwrap();
    let limits = Limits {
        max_band_length: 1024,
        ..Limits::default()
    };
    let mut out: Vec<Entry> = Vec::new();
    let err = unpack(&packed, &Options::default().limits(limits), &mut out).unwrap_err();
    match err {
        Error::ResourceLimit { requested, limit, .. } => {
            assert_eq!(requested, 4096);
            assert_eq!(limit, 1024);
        }
        other => panic!("unexpected error {}", other),
    }
}

#[test]
fn truncated_archives_are_corrupt() {
    let packed = pack(&[Entry::new("a.txt", b"hello".to_vec())], &Options::default()).unwrap();
    let mut out: Vec<Entry> = Vec::new();
    let err = unpack(&packed[..5], &Options::default(), &mut out).unwrap_err();
    assert!(matches!(err, Error::Corrupt { .. }), "{}", err);
}
