//! nom parsers for the layout notation.

use super::*;

use nom::branch::alt;
use nom::bytes::complete::tag;
use nom::character::complete::{char, digit1, one_of};
use nom::combinator::{cut, map, map_res, opt, recognize, success, value};
use nom::error::{context, ErrorKind};
use nom::multi::{many0, many1, separated_list1};
use nom::sequence::{delimited, pair, preceded, tuple};
use nom::IResult;

type LayoutResult<'a, T> = IResult<&'a str, T>;

/// Parse a layout string into its callables.
///
/// A layout that does not start with `[` is a single implicit callable.
/// Brackets may nest at most `max_depth` deep.
pub fn parse_layout(layout: &str, max_depth: usize) -> Result<Vec<Vec<LayoutElement>>, LayoutError> {
    let parsed = if layout.starts_with('[') {
        many1(|i| bracketed(i, max_depth))(layout)
    } else {
        map(|i| body(i, max_depth), |b| alloc::vec![b])(layout)
    };
    match parsed {
        Ok(("", callables)) => return Ok(callables),
        Ok((rest, _)) => {
            return Err(LayoutError::new(
                layout.len() - rest.len(),
                LayoutErrorReason::TrailingInput,
            ))
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let reason = match e.code {
                ErrorKind::MapRes => LayoutErrorReason::BadNumber,
                ErrorKind::TooLarge => LayoutErrorReason::TooDeep { limit: max_depth },
                _ => LayoutErrorReason::Syntax,
            };
            return Err(LayoutError::new(layout.len() - e.input.len(), reason));
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(LayoutError::new(layout.len(), LayoutErrorReason::Syntax))
        }
    }
}

/// Elements up to the next `]`. `depth` is how many more brackets may open inside.
fn body(input: &str, depth: usize) -> LayoutResult<'_, Vec<LayoutElement>> {
    return many0(|i| element(i, depth))(input);
}

fn element(input: &str, depth: usize) -> LayoutResult<'_, LayoutElement> {
    return alt((
        context("replication", |i| replication(i, depth)),
        context("union", |i| union(i, depth)),
        context("call", map(call, LayoutElement::Call)),
        context("reference", map(reference, LayoutElement::Reference)),
        context("integral", map(integral, LayoutElement::Integral)),
    ))(input);
}

fn width(input: &str) -> LayoutResult<'_, Width> {
    return alt((
        value(Width::Byte, char('B')),
        value(Width::Short, char('H')),
        value(Width::Int, char('I')),
        value(Width::Void, char('V')),
    ))(input);
}

fn integral_kind(input: &str) -> LayoutResult<'_, IntegralKind> {
    return alt((
        value(IntegralKind::BciOffset, tag("PO")),
        value(IntegralKind::SignedOffset, tag("OS")),
        value(IntegralKind::Bci, char('P')),
        value(IntegralKind::Offset, char('O')),
        value(IntegralKind::Signed, char('S')),
        value(IntegralKind::Flag, char('F')),
        success(IntegralKind::Unsigned),
    ))(input);
}

fn integral(input: &str) -> LayoutResult<'_, Integral> {
    let (input, (kind, width)) = pair(integral_kind, width)(input)?;
    return Ok((input, Integral::new(kind, width)));
}

fn ref_kind(input: &str) -> LayoutResult<'_, RefKind> {
    let constant = preceded(
        char('K'),
        map(one_of("IJFDSQ"), |c| match c {
            'I' => RefKind::Int,
            'J' => RefKind::Long,
            'F' => RefKind::Float,
            'D' => RefKind::Double,
            'S' => RefKind::String,
            _ => RefKind::FieldConstant,
        }),
    );
    let pool = preceded(
        char('R'),
        map(one_of("CSDFMIUQ"), |c| match c {
            'C' => RefKind::Class,
            'S' => RefKind::Signature,
            'D' => RefKind::Descr,
            'F' => RefKind::Field,
            'M' => RefKind::Method,
            'I' => RefKind::IMethod,
            'U' => RefKind::Utf8,
            _ => RefKind::Any,
        }),
    );
    return alt((constant, pool))(input);
}

fn reference(input: &str) -> LayoutResult<'_, Reference> {
    let (input, (kind, nullable, width)) = tuple((
        ref_kind,
        map(opt(char('N')), |n| n.is_some()),
        alt((
            value(Width::Byte, char('B')),
            value(Width::Short, char('H')),
            value(Width::Int, char('I')),
        )),
    ))(input)?;
    return Ok((
        input,
        Reference {
            kind,
            nullable,
            width,
        },
    ));
}

fn bracketed(input: &str, depth: usize) -> LayoutResult<'_, Vec<LayoutElement>> {
    let (rest, _) = char('[')(input)?;
    let depth = match depth.checked_sub(1) {
        Some(d) => d,
        None => return Err(nom::Err::Failure(nom::error::Error::new(input, ErrorKind::TooLarge))),
    };
    let (rest, body) = body(rest, depth)?;
    let (rest, _) = cut(char(']'))(rest)?;
    return Ok((rest, body));
}

fn replication(input: &str, depth: usize) -> LayoutResult<'_, LayoutElement> {
    let (input, count) = preceded(char('N'), integral)(input)?;
    let (input, body) = cut(|i| bracketed(i, depth))(input)?;
    return Ok((input, LayoutElement::Replication { count, body }));
}

fn signed_int(input: &str) -> LayoutResult<'_, i32> {
    return map_res(recognize(pair(opt(char('-')), digit1)), |s: &str| {
        s.parse::<i32>()
    })(input);
}

fn union_case(input: &str, depth: usize) -> LayoutResult<'_, UnionCase> {
    let (input, tags) = delimited(char('('), separated_list1(char(','), signed_int), char(')'))(input)?;
    let (input, body) = bracketed(input, depth)?;
    return Ok((input, UnionCase { tags, body }));
}

fn union(input: &str, depth: usize) -> LayoutResult<'_, LayoutElement> {
    let (input, tag_integral) = preceded(char('T'), integral)(input)?;
    let (input, cases) = many0(|i| union_case(i, depth))(input)?;
    let (input, default) = cut(preceded(tag("()"), |i| bracketed(i, depth)))(input)?;
    return Ok((
        input,
        LayoutElement::Union {
            tag: tag_integral,
            cases,
            default,
        },
    ));
}

fn call(input: &str) -> LayoutResult<'_, i32> {
    return delimited(char('('), signed_int, char(')'))(input);
}
