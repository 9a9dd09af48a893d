extern crate std;
use super::*;
use crate::codec::{BRANCH5, BYTE1, DELTA5, UDELTA5};
use crate::classfile::AttrValue;
use crate::layout::{AttributeContext, AttributeLayout, LayoutErrorReason};
use crate::options::Limits;

use alloc::vec;
use std::prelude::rust_2018::*;
use test_case::test_case;

/// `values` written one after another with `codec`.
fn coded(codec: BhsdCodec, values: &[i64]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut last = 0;
    for v in values {
        codec.encode_value(*v, last, &mut out).unwrap();
        last = *v;
    }
    return out;
}

fn no_headers() -> BandContext<'static> {
    return BandContext::new(&[], Limits::default());
}

fn corruption<T>(res: PackResult<'_, T>) -> Corruption {
    match res {
        Err(nom::Err::Failure(PackParserError {
            kind: PackParserErrorKind::Corrupt(cause),
            ..
        })) => return cause,
        Err(e) => panic!("unexpected error {:?}", e),
        Ok(_) => panic!("parsed corrupt input"),
    }
}

const MINIMAL_HEADER: &[u8] = &[
    0xCA, 0xFE, 0xD0, 0x0D, // magic
    7, 150, 0, // version, options
    1, 0, 0, 0, 0, 0, 0, 0, // cp counts
    0, // ic_count
    0, 49, // default class version
    0, // class_count
];

#[test]
fn minimal_segment_header() {
    let (rest, header) = segment_header(MINIMAL_HEADER).unwrap();
    assert!(rest.is_empty());
    assert_eq!(header.major_version, 150);
    assert_eq!(header.cp_counts.utf8, 1);
    assert_eq!(header.cp_counts.class, 0);
    assert_eq!(header.default_class_major, 49);
    assert_eq!(header.file_header, None);
    assert!(header.band_headers.is_empty());
}

#[test]
fn segment_header_with_files_and_numbers() {
    let mut input = vec![0xCA, 0xFE, 0xD0, 0x0D, 7, 150];
    let options = ArchiveOptions::HAVE_FILE_HEADERS | ArchiveOptions::HAVE_CP_NUMBERS | ArchiveOptions::HAVE_SPECIAL_FORMATS;
    input.extend(coded(UNSIGNED5, &[options as i64]));
    input.extend(coded(UNSIGNED5, &[0, 1000, 0, 1_234_567, 2]));
    input.extend(coded(UNSIGNED5, &[2, 0]));
    input.extend(coded(UNSIGNED5, &[1, 2, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0]));
    input.extend(coded(UNSIGNED5, &[0, 3, 45, 0]));
    input.extend([0xAA, 0xBB]);
    let (rest, header) = segment_header(&input).unwrap();
    assert!(rest.is_empty());
    let files = header.file_header.clone().unwrap();
    assert_eq!(files.archive_size, 1000);
    assert_eq!(files.modtime, 1_234_567);
    assert_eq!(header.file_count(), 2);
    assert_eq!(header.cp_counts.int, 2);
    assert_eq!(header.cp_counts.string, 1);
    assert_eq!(header.default_class_minor, 3);
    assert_eq!(header.band_headers, &[0xAA, 0xBB]);
}

#[test]
fn unsupported_version() {
    let mut input = MINIMAL_HEADER.to_vec();
    input[5] = 160;
    assert_eq!(
        corruption(segment_header(&input)),
        Corruption::UnsupportedVersion { major: 160, minor: 7 }
    );
}

#[test]
fn unknown_option_bits() {
    let mut input = MINIMAL_HEADER.to_vec();
    input[6] = 8;
    assert_eq!(corruption(segment_header(&input)), Corruption::UnknownOptions(8));
}

#[test]
fn bad_magic_is_a_nom_error() {
    let mut input = MINIMAL_HEADER.to_vec();
    input[0] = 0x50;
    assert!(matches!(segment_header(&input), Err(nom::Err::Error(_))));
}

#[test]
fn utf8_prefixes_and_suffixes() {
    let counts = CpCounts {
        utf8: 4,
        ..CpCounts::default()
    };
    let mut input = coded(DELTA5, &[1, 1]);
    input.extend(coded(UNSIGNED5, &[2, 1, 0]));
    input.extend(coded(crate::codec::CHAR3, &['a' as i64, 'b' as i64, 'c' as i64]));
    input.extend(coded(DELTA5, &[2]));
    input.extend(coded(DELTA5, &['\u{e9}' as i64, 'z' as i64]));
    let mut ctx = no_headers();
    let (rest, pool) = cp_bands(&input, &mut ctx, &counts).unwrap();
    assert!(rest.is_empty());
    let strings: Vec<String> = (0..4).map(|i| pool.utf8_string(i).unwrap()).collect();
    assert_eq!(strings, vec!["", "ab", "ac", "a\u{e9}z"]);
}

#[test]
fn lone_utf8_entry_takes_no_bytes() {
    let counts = CpCounts {
        utf8: 1,
        ..CpCounts::default()
    };
    let mut ctx = no_headers();
    let (rest, pool) = cp_bands(&[], &mut ctx, &counts).unwrap();
    assert!(rest.is_empty());
    assert_eq!(pool.len(CpKind::Utf8), 1);
    assert_eq!(pool.utf8_string(0).unwrap(), "");
}

#[test]
fn prefix_longer_than_previous_string() {
    let counts = CpCounts {
        utf8: 3,
        ..CpCounts::default()
    };
    let mut input = coded(DELTA5, &[5]);
    input.extend(coded(UNSIGNED5, &[1, 1]));
    input.extend(coded(crate::codec::CHAR3, &['a' as i64, 'b' as i64]));
    let mut ctx = no_headers();
    assert_eq!(
        corruption(cp_bands(&input, &mut ctx, &counts)),
        Corruption::BadCount {
            band: "cp_Utf8_prefix",
            value: 5
        }
    );
}

#[test]
fn class_index_out_of_range() {
    let counts = CpCounts {
        utf8: 1,
        class: 1,
        ..CpCounts::default()
    };
    let input = coded(UDELTA5, &[3]);
    let mut ctx = no_headers();
    assert_eq!(
        corruption(cp_bands(&input, &mut ctx, &counts)),
        Corruption::IndexOutOfRange {
            partition: "cp_Utf8",
            index: 3,
            len: 1
        }
    );
}

#[test]
fn attribute_definitions() {
    let pool = utf8_pool(&["SourceID", "RUH", "Coverage", "NH[PH]"]);
    let mut defs = AttributeDefinitions::predefined().unwrap();
    let class_at_25 = ((25 + 1) << 2) | AttributeContext::Class as i64;
    let code_next = AttributeContext::Code as i64;
    let mut input = coded(BYTE1, &[class_at_25, code_next]);
    input.extend(coded(UNSIGNED5, &[1, 3]));
    input.extend(coded(UNSIGNED5, &[2, 4]));
    let mut ctx = no_headers();
    let (rest, _) = attr_definitions(&input, &mut ctx, 2, ArchiveOptions::default(), &pool, &mut defs).unwrap();
    assert!(rest.is_empty());
    assert_eq!(defs.get(AttributeContext::Class, 25).map(|s| s.name()), Some("SourceID"));
    let (index, slot) = defs.find(AttributeContext::Code, "Coverage").unwrap();
    assert_eq!(index, 32);
    match slot {
        LayoutSlot::Layout(layout) => assert_eq!(layout.layout(), "NH[PH]"),
        other => panic!("unexpected slot {:?}", other),
    }
}

#[test]
fn duplicate_attribute_definition() {
    let pool = utf8_pool(&["A", "H"]);
    let mut defs = AttributeDefinitions::predefined().unwrap();
    let header = (40 << 2) | AttributeContext::Field as i64;
    let mut input = coded(BYTE1, &[header, header]);
    input.extend(coded(UNSIGNED5, &[1, 1]));
    input.extend(coded(UNSIGNED5, &[2, 2]));
    let mut ctx = no_headers();
    assert_eq!(
        corruption(attr_definitions(&input, &mut ctx, 2, ArchiveOptions::default(), &pool, &mut defs)),
        Corruption::DuplicateLayout {
            context: AttributeContext::Field,
            index: 39
        }
    );
}

#[test]
fn deeply_nested_attribute_definition() {
    let deep = format!("{}H{}", "NH[".repeat(3000), "]".repeat(3000));
    let pool = utf8_pool(&["Deep", &deep]);
    let mut defs = AttributeDefinitions::predefined().unwrap();
    let header = ((40 + 1) << 2) | AttributeContext::Class as i64;
    let mut input = coded(BYTE1, &[header]);
    input.extend(coded(UNSIGNED5, &[1]));
    input.extend(coded(UNSIGNED5, &[2]));
    let mut ctx = no_headers();
    match corruption(attr_definitions(&input, &mut ctx, 1, ArchiveOptions::default(), &pool, &mut defs)) {
        Corruption::BadLayout { name, cause } => {
            assert_eq!(name, "Deep");
            assert_eq!(
                cause.reason,
                LayoutErrorReason::TooDeep {
                    limit: Limits::default().max_layout_depth
                }
            );
        }
        other => panic!("unexpected corruption {:?}", other),
    }
}

/// Read the class attributes of holders announced by `flags`, with `layout` at index 25.
/// Returns how many bytes were consumed and each holder's attribute values.
fn class_attributes_at_25(layout: &str, flags: &[u64], input: &[u8]) -> (usize, Vec<Vec<AttrValue>>) {
    let mut defs = AttributeDefinitions::predefined().unwrap();
    defs.define(AttributeLayout::new("X", AttributeContext::Class, 25, layout).unwrap());
    let pool = utf8_pool(&[]);
    let holders = Holders {
        flags,
        hi: false,
        field_descriptors: None,
    };
    let mut ctx = no_headers();
    let (rest, attributes) =
        context_attributes(input, &mut ctx, AttributeContext::Class, &defs, &pool, &holders).unwrap();
    let values = attributes
        .holders
        .into_iter()
        .map(|slots| match slots.as_slice() {
            [AttrSlot::Layout(attribute)] => attribute.values.clone(),
            other => panic!("unexpected attributes {:?}", other),
        })
        .collect();
    return (input.len() - rest.len(), values);
}

#[test]
fn zero_count_replication_reads_no_body() {
    let (consumed, values) = class_attributes_at_25("NH[H]", &[1 << 25], &[0, 5]);
    assert_eq!(consumed, 1);
    assert_eq!(values, vec![vec![AttrValue::Replication(vec![])]]);
}

#[test]
fn replication_body_band_holds_every_item() {
    let (consumed, values) = class_attributes_at_25("NH[H]", &[1 << 25, 1 << 25], &[0, 2, 7, 9, 5]);
    assert_eq!(consumed, 4);
    assert_eq!(values[0], vec![AttrValue::Replication(vec![])]);
    assert_eq!(
        values[1],
        vec![AttrValue::Replication(vec![vec![AttrValue::Int(7)], vec![AttrValue::Int(9)]])]
    );
}

#[test]
fn unmatched_tag_with_empty_default_emits_nothing() {
    let (consumed, values) = class_attributes_at_25("TB(1)[H]()[]", &[1 << 25], &[9, 5]);
    assert_eq!(consumed, 1);
    assert_eq!(values, vec![vec![AttrValue::Union { tag: 9, body: vec![] }]]);
}

#[test]
fn union_cases_read_only_their_holders() {
    let (consumed, values) = class_attributes_at_25("TB(1)[H]()[]", &[1 << 25, 1 << 25], &[1, 9, 4, 5]);
    assert_eq!(consumed, 3);
    assert_eq!(
        values[0],
        vec![AttrValue::Union {
            tag: 1,
            body: vec![AttrValue::Int(4)]
        }]
    );
    assert_eq!(values[1], vec![AttrValue::Union { tag: 9, body: vec![] }]);
}

#[test]
fn self_calls_are_counted_by_attr_calls() {
    // A tree 1 -> (2, 3 -> (4)) as `[(1)][HNH[(0)]]`: three calls back into the node callable.
    let input = [3, 1, 2, 3, 4, 2, 0, 1, 0, 5];
    let (consumed, values) = class_attributes_at_25("[(1)][HNH[(0)]]", &[1 << 25], &input);
    assert_eq!(consumed, 9);
    let node = |n: i64, children: Vec<AttrValue>| {
        AttrValue::Call(vec![
            AttrValue::Int(n),
            AttrValue::Replication(children.into_iter().map(|c| vec![c]).collect()),
        ])
    };
    let tree = node(1, vec![node(2, vec![]), node(3, vec![node(4, vec![])])]);
    assert_eq!(values, vec![vec![tree]]);
}

#[test]
fn predicted_inner_class() {
    let mut pool = utf8_pool(&["java/util/AbstractList$2$Local"]);
    pool.class = vec![1];
    pool.resolve_names().unwrap();
    let mut input = coded(UDELTA5, &[0]);
    input.extend(coded(UNSIGNED5, &[8]));
    let mut ctx = no_headers();
    let (rest, tuples) = ic_bands(&input, &mut ctx, 1, &pool).unwrap();
    assert!(rest.is_empty());
    let tuple = &tuples[0];
    assert!(!tuple.is_explicit());
    assert_eq!(tuple.simple_class_name(), "Local");
    assert_eq!(tuple.outer_class_string(), Some("java/util/AbstractList$2"));
    assert!(!tuple.is_member());
    assert_eq!(tuple.effective_outer(), None);
    assert_eq!(tuple.effective_name(), Some("Local"));
}

#[test]
fn explicit_inner_class() {
    let mut pool = utf8_pool(&["a/B", "a/C", "Inner"]);
    pool.class = vec![1, 2];
    pool.resolve_names().unwrap();
    let mut input = coded(UDELTA5, &[1]);
    input.extend(coded(UNSIGNED5, &[(IC_EXPLICIT | 1) as i64]));
    input.extend(coded(DELTA5, &[1]));
    input.extend(coded(DELTA5, &[4]));
    let mut ctx = no_headers();
    let (_, tuples) = ic_bands(&input, &mut ctx, 1, &pool).unwrap();
    assert_eq!(tuples[0].class, "a/C");
    assert_eq!(tuples[0].effective_outer(), Some("a/B"));
    assert_eq!(tuples[0].effective_name(), Some("Inner"));
    assert_eq!(tuples[0].access_flags(), 1);
}

#[test_case(1, (0, 0, 0))]
#[test_case(12, (11, 0, 0))]
#[test_case(13, (0, 1, 0))]
#[test_case(144, (11, 11, 0))]
#[test_case(145, (0, 0, 1))]
#[test_case(209, (0, 0, 2))]
#[test_case(255, (4, 6, 2))]
fn short_code_headers(header: u8, sizes: (u16, u16, usize)) {
    assert_eq!(short_code_header(header), Some(sizes));
    assert_eq!(short_code_header_for(sizes.0, sizes.1, sizes.2), Some(header));
}

#[test]
fn long_code_headers() {
    assert_eq!(short_code_header(0), None);
    assert_eq!(short_code_header_for(12, 0, 0), None);
    assert_eq!(short_code_header_for(0, 0, 3), None);
}

#[test]
fn operand_band_counts() {
    let mut input = vec![16, 170, 255];
    input.extend(coded(UNSIGNED5, &[2]));
    input.extend(coded(DELTA5, &[5]));
    input.extend(coded(BYTE1, &[7]));
    input.extend(coded(BRANCH5, &[1, 2, 3]));
    let mut ctx = no_headers();
    let (rest, codes) = bc_bands(&input, &mut ctx, 1).unwrap();
    assert!(rest.is_empty());
    assert_eq!(codes.codes, vec![&[16u8, 170][..]]);
    assert_eq!(codes.operand_band(crate::bytecode::OperandBand::CaseValue), &[5]);
    assert_eq!(codes.operand_band(crate::bytecode::OperandBand::Byte), &[7]);
    assert_eq!(codes.operand_band(crate::bytecode::OperandBand::Label), &[1, 2, 3]);
}

#[test]
fn invokedynamic_is_not_a_packed_opcode() {
    let input = [186, 0, 0, 255];
    let mut ctx = no_headers();
    assert_eq!(
        corruption(bc_bands(&input, &mut ctx, 1)),
        Corruption::BadOpcode { opcode: 186 }
    );
}

#[test]
fn missing_end_marker() {
    let input = [0, 0, 0];
    let mut ctx = no_headers();
    assert_eq!(
        corruption(bc_bands(&input, &mut ctx, 1)),
        Corruption::Truncated { band: "bc_codes" }
    );
}

#[test]
fn declared_count_beyond_input() {
    let input = [1, 2, 3];
    let mut ctx = no_headers();
    assert_eq!(
        corruption(bc_bands(&input, &mut ctx, 1000)),
        Corruption::Truncated { band: "bc_codes" }
    );
}

#[test]
fn declared_count_over_the_limit() {
    let input = [0u8; 16];
    let limits = Limits {
        max_band_length: 8,
        ..Limits::default()
    };
    let mut ctx = BandContext::new(&[], limits);
    match band(&input, &mut ctx, "cp_Int", UDELTA5, 10) {
        Err(nom::Err::Failure(PackParserError {
            kind: PackParserErrorKind::Limit { band, requested, limit },
            ..
        })) => {
            assert_eq!(band, "cp_Int");
            assert_eq!(requested, 10);
            assert_eq!(limit, 8);
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[test]
fn file_bands_with_options() {
    let pool = utf8_pool(&["META-INF/MANIFEST.MF"]);
    let (_, mut header) = segment_header(MINIMAL_HEADER).unwrap();
    header.options = ArchiveOptions(ArchiveOptions::HAVE_FILE_HEADERS | ArchiveOptions::HAVE_FILE_OPTIONS);
    header.file_header = Some(FileHeader {
        file_count: 1,
        ..FileHeader::default()
    });
    let mut input = coded(UNSIGNED5, &[1, 3, FILE_DEFLATE_HINT as i64]);
    input.extend(b"abc");
    let mut ctx = no_headers();
    let (rest, files) = file_bands(&input, &mut ctx, &header, &pool).unwrap();
    assert!(rest.is_empty());
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, 1);
    assert_eq!(files[0].bits, b"abc");
    assert!(files[0].deflate_hint());
    assert!(!files[0].is_class_stub());
}
