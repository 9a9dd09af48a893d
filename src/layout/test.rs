extern crate std;
use super::*;

use crate::codec::*;
use alloc::vec;
use std::prelude::rust_2018::*;
use test_case::test_case;

const DEPTH: usize = 64;

fn tags(body: &[LayoutElement]) -> Vec<String> {
    return body.iter().map(|e| e.tag()).collect();
}

#[test]
fn replication_of_local_variable_entries() {
    let callables = parse_layout("NH[PHOHRUHRSHH]", DEPTH).unwrap();
    assert_eq!(callables.len(), 1);
    assert_eq!(callables[0].len(), 1);
    match &callables[0][0] {
        LayoutElement::Replication { count, body } => {
            assert_eq!(*count, Integral::new(IntegralKind::Unsigned, Width::Short));
            assert_eq!(tags(body), vec!["PH", "OH", "RUH", "RSH", "H"]);
        }
        other => panic!("expected a replication, got {:?}", other),
    }
}

#[test]
fn union_with_empty_case_and_default() {
    let callables = parse_layout("TB(55)[FH](23)[]()[RSH]", DEPTH).unwrap();
    match &callables[0][0] {
        LayoutElement::Union {
            tag,
            cases,
            default,
        } => {
            assert_eq!(tag.tag(), "B");
            assert_eq!(cases.len(), 2);
            assert_eq!(cases[0].tags, vec![55]);
            assert_eq!(tags(&cases[0].body), vec!["FH"]);
            assert_eq!(cases[1].tags, vec![23]);
            assert!(cases[1].body.is_empty());
            assert_eq!(tags(default), vec!["RSH"]);
        }
        other => panic!("expected a union, got {:?}", other),
    }
}

#[test]
fn union_case_lists_and_negative_tags() {
    let callables = parse_layout("TSH(-1,2,3)[B]()[]", DEPTH).unwrap();
    match &callables[0][0] {
        LayoutElement::Union { tag, cases, .. } => {
            assert_eq!(tag.kind, IntegralKind::Signed);
            assert_eq!(cases[0].tags, vec![-1, 2, 3]);
        }
        other => panic!("expected a union, got {:?}", other),
    }
}

#[test_case("RUNH", RefKind::Utf8, true, Width::Short)]
#[test_case("KQH", RefKind::FieldConstant, false, Width::Short)]
#[test_case("RCNI", RefKind::Class, true, Width::Int)]
#[test_case("RQB", RefKind::Any, false, Width::Byte)]
fn references(layout: &str, kind: RefKind, nullable: bool, width: Width) {
    let callables = parse_layout(layout, DEPTH).unwrap();
    assert_eq!(
        callables[0],
        vec![LayoutElement::Reference(Reference {
            kind,
            nullable,
            width
        })]
    );
}

#[test]
fn integral_prefixes() {
    let callables = parse_layout("BSHFIPBPOHOIOSHV", DEPTH).unwrap();
    assert_eq!(
        tags(&callables[0]),
        vec!["B", "SH", "FI", "PB", "POH", "OI", "OSH", "V"]
    );
}

#[test]
fn annotation_callables_resolve() {
    let layout = AttributeLayout::new("RuntimeVisibleAnnotations", AttributeContext::Class, 21, ANNOTATIONS).unwrap();
    assert_eq!(layout.callables().len(), 3);
    assert!(!layout.callables()[0].backward_called);
    assert!(!layout.callables()[1].backward_called);
    assert!(layout.callables()[2].backward_called);
    assert_eq!(layout.backward_call_count(), 1);
    let calls: Vec<usize> = layout
        .elements()
        .iter()
        .filter_map(|e| match e {
            Element::Call { callable } => Some(*callable),
            _ => None,
        })
        .collect();
    assert_eq!(calls, vec![1, 2, 2, 2]);
}

#[test_case("[(1)]", 0, 1)]
#[test_case("(-1)", 0, -1)]
#[test_case("[H][(-2)]", 1, -2)]
fn unresolved_calls_are_errors(layout: &str, callable: usize, offset: i32) {
    let err = AttributeLayout::new("X", AttributeContext::Code, 32, layout).unwrap_err();
    assert_eq!(err.reason, LayoutErrorReason::UnresolvedCall { callable, offset });
}

#[test_case("NH[PH", 5; "unclosed replication")]
#[test_case("X", 0; "unknown element")]
#[test_case("HX", 1; "junk after element")]
#[test_case("TB(1)[H]", 8; "union without default")]
fn malformed_layouts(layout: &str, position: usize) {
    let err = parse_layout(layout, DEPTH).unwrap_err();
    assert_eq!(err.position, position, "{:?}", err);
}

fn nested_replications(depth: usize) -> String {
    return format!("{}H{}", "NH[".repeat(depth), "]".repeat(depth));
}

#[test]
fn nesting_up_to_the_limit_parses() {
    let callables = parse_layout(&nested_replications(4), 4).unwrap();
    assert_eq!(tags(&callables[0]), vec!["NH"]);
}

#[test]
fn nesting_past_the_limit_is_refused() {
    let err = parse_layout(&nested_replications(5), 4).unwrap_err();
    assert_eq!(err.reason, LayoutErrorReason::TooDeep { limit: 4 });
    assert_eq!(err.position, 14);
}

#[test]
fn deeply_nested_layouts_fail_without_recursing() {
    let deep = nested_replications(3000);
    let err = AttributeLayout::new("X", AttributeContext::Class, 40, &deep).unwrap_err();
    assert_eq!(err.reason, LayoutErrorReason::TooDeep { limit: DEPTH });
}

#[test]
fn callable_brackets_count_towards_the_limit() {
    assert!(parse_layout("[NH[H]]", 2).is_ok());
    let err = parse_layout("[NH[H]]", 1).unwrap_err();
    assert_eq!(err.reason, LayoutErrorReason::TooDeep { limit: 1 });
}

#[test]
fn empty_layout_has_one_empty_callable() {
    assert_eq!(parse_layout("", DEPTH).unwrap(), vec![Vec::<LayoutElement>::new()]);
}

#[test_case("B", BYTE1)]
#[test_case("H", UNSIGNED5)]
#[test_case("SH", SIGNED5)]
#[test_case("PH", BCI5)]
#[test_case("POH", BRANCH5)]
#[test_case("OH", BRANCH5)]
#[test_case("RSH", UNSIGNED5)]
#[test_case("KSH", UNSIGNED5)]
#[test_case("NB", BYTE1)]
#[test_case("TB", BYTE1)]
fn band_codings(tag: &str, codec: BhsdCodec) {
    assert_eq!(codec_for_tag(tag), codec);
}

#[test]
fn band_order_is_depth_first() {
    let layout = AttributeLayout::new("LocalVariableTable", AttributeContext::Code, 2, "NH[PHOHRUHRSHH]").unwrap();
    let order = layout.band_order();
    assert_eq!(order.len(), 6);
    assert!(matches!(layout.element(order[0]), Element::Replication { .. }));
    assert!(matches!(layout.element(order[5]), Element::Integral(_)));
}

#[test]
fn every_predefined_notation_parses() {
    for p in PREDEFINED {
        if let LayoutSource::Notation(notation) = p.source {
            AttributeLayout::new(p.name, p.context, p.index, notation).unwrap();
        }
    }
}
