use super::*;
use crate::codec::{BCI5, BRANCH5, DELTA5, MDELTA5};
use crate::layout::AttributeContext;

use alloc::string::String;

/// Short code headers: handler count, first header byte and the number of `max_stack` values.
const SHORT_HEADERS: [(usize, u8, u8); 3] = [(0, 1, 12), (1, 145, 8), (2, 209, 7)];

/// `(max_stack, max_na_locals, handler_count)` of a short code header.
pub fn short_code_header(header: u8) -> Option<(u16, u16, usize)> {
    for (handlers, base, lims) in SHORT_HEADERS.iter().rev() {
        if header >= *base {
            let rel = header - base;
            return Some(((rel % lims) as u16, (rel / lims) as u16, *handlers));
        }
    }
    return None;
}

/// The short code header for these sizes, if there is one.
pub fn short_code_header_for(max_stack: u16, max_na_locals: u16, handlers: usize) -> Option<u8> {
    let (_, base, lims) = SHORT_HEADERS.iter().find(|(h, _, _)| *h == handlers)?;
    let (s, l) = (max_stack as u32, max_na_locals as u32);
    let lims = *lims as u32;
    if s >= lims || l >= lims {
        return None;
    }
    let header = *base as u32 + s + lims * l;
    return u8::try_from(header).ok();
}

fn descriptors<'a>(input: &'a [u8], pool: &ConstantPool, descrs: &[usize]) -> PackResult<'a, Vec<String>> {
    let mut out = Vec::with_capacity(descrs.len());
    for d in descrs {
        match pool.descr(*d) {
            Ok((_, descriptor)) => out.push(String::from(descriptor)),
            Err(cause) => return corrupt(input, cause),
        }
    }
    return Ok((input, out));
}

fn u16_values<'a>(input: &'a [u8], band: &'static str, values: Vec<i32>) -> PackResult<'a, Vec<u16>> {
    let mut out = Vec::with_capacity(values.len());
    for v in values {
        match u16::try_from(v) {
            Ok(v) => out.push(v),
            Err(_) => return corrupt(input, Corruption::BadCount { band, value: v as i64 }),
        }
    }
    return Ok((input, out));
}

/// Read the code bands of `count` methods.
fn code_bands<'a>(
    input: &'a [u8],
    ctx: &mut BandContext<'a>,
    header: &SegmentHeader,
    defs: &AttributeDefinitions,
    pool: &ConstantPool,
    count: usize,
) -> PackResult<'a, Vec<CodeBands>> {
    let options = header.options;
    let (input, headers) = context("code_headers", |i| byte_band(i, ctx, "code_headers", count))(input)?;
    let specials = headers.iter().filter(|h| **h == 0).count();
    let (input, max_stack) = band(input, ctx, "code_max_stack", UNSIGNED5, specials)?;
    let (input, max_stack) = u16_values(input, "code_max_stack", max_stack)?;
    let (input, max_na_locals) = band(input, ctx, "code_max_na_locals", UNSIGNED5, specials)?;
    let (input, max_na_locals) = u16_values(input, "code_max_na_locals", max_na_locals)?;
    let (input, handler_counts) = count_band(input, ctx, "code_handler_count", UNSIGNED5, specials)?;

    let mut max_stack = max_stack.into_iter();
    let mut max_na_locals = max_na_locals.into_iter();
    let mut handler_counts = handler_counts.into_iter();
    let mut sizes = Vec::with_capacity(count);
    for h in headers {
        let size = match short_code_header(*h) {
            Some(size) => size,
            None => (
                max_stack.next().unwrap_or(0),
                max_na_locals.next().unwrap_or(0),
                handler_counts.next().unwrap_or(0),
            ),
        };
        sizes.push(size);
    }
    let per_code: Vec<usize> = sizes.iter().map(|(_, _, h)| *h).collect();
    let (input, handlers) = sum_counts(input, ctx, "code_handler_count", &per_code)?;
    let (input, start) = band(input, ctx, "code_handler_start_P", BCI5, handlers)?;
    let (input, end) = band(input, ctx, "code_handler_end_PO", BRANCH5, handlers)?;
    let (input, catch) = band(input, ctx, "code_handler_catch_PO", BRANCH5, handlers)?;
    let (input, class) = nullable_index_band(
        input,
        ctx,
        "code_handler_class_RCN",
        UNSIGNED5,
        handlers,
        CpKind::Class.name(),
        pool.len(CpKind::Class),
    )?;

    let all_flags = options.has(ArchiveOptions::HAVE_ALL_CODE_FLAGS);
    let flag_count = if all_flags { count } else { specials };
    let hi = options.flags_hi(AttributeContext::Code);
    let (input, flags) = flags_band(input, ctx, "code_flags_hi", "code_flags_lo", flag_count, hi)?;
    let flags = if all_flags {
        flags
    } else {
        let mut transmitted = flags.into_iter();
        headers
            .iter()
            .map(|h| if *h == 0 { transmitted.next().unwrap_or(0) } else { 0 })
            .collect()
    };
    let holders = Holders {
        flags: &flags,
        hi,
        field_descriptors: None,
    };
    let (input, attrs) = context("code attributes", |i| {
        context_attributes(i, ctx, AttributeContext::Code, defs, pool, &holders)
    })(input)?;

    let mut handler_list = start.into_iter().zip(end).zip(catch).zip(class);
    let mut codes = Vec::with_capacity(count);
    for ((max_stack, max_na_locals, handlers), attributes) in sizes.into_iter().zip(attrs.holders) {
        let handlers = handler_list
            .by_ref()
            .take(handlers)
            .map(|(((start, end), catch), class)| HandlerBands {
                start,
                end,
                catch,
                class,
            })
            .collect();
        codes.push(CodeBands {
            max_stack,
            max_na_locals,
            handlers,
            attributes,
        });
    }
    return Ok((input, codes));
}

/// Take `counts[i]` items for holder `i`.
fn split_by<T>(items: Vec<T>, counts: &[usize]) -> Vec<Vec<T>> {
    let mut items = items.into_iter();
    return counts.iter().map(|n| items.by_ref().take(*n).collect()).collect();
}

fn members(descrs: Vec<usize>, attrs: ContextAttributes) -> Vec<MemberBands> {
    return descrs
        .into_iter()
        .zip(attrs.access_flags)
        .zip(attrs.holders)
        .map(|((descr, flags), attributes)| MemberBands {
            descr,
            flags,
            attributes,
            code: None,
        })
        .collect();
}

/// The class bands of a segment, from `class_this` to the code attributes.
pub fn class_bands<'a>(
    input: &'a [u8],
    ctx: &mut BandContext<'a>,
    header: &SegmentHeader,
    defs: &AttributeDefinitions,
    pool: &ConstantPool,
) -> PackResult<'a, ClassBands> {
    let whole = input.len();
    let n = header.class_count;
    let options = header.options;
    let class = CpKind::Class.name();
    let classes = pool.len(CpKind::Class);
    let descr = CpKind::Descr.name();
    let descrs = pool.len(CpKind::Descr);

    let (input, this) = index_band(input, ctx, "class_this", DELTA5, n, class, classes)?;
    let (input, super_class) = index_band(input, ctx, "class_super", DELTA5, n, class, classes)?;
    let (input, interface_counts) = count_band(input, ctx, "class_interface_count", DELTA5, n)?;
    let (input, interface_total) = sum_counts(input, ctx, "class_interface", &interface_counts)?;
    let (input, interfaces) = index_band(input, ctx, "class_interface", DELTA5, interface_total, class, classes)?;
    let (input, field_counts) = count_band(input, ctx, "class_field_count", DELTA5, n)?;
    let (input, method_counts) = count_band(input, ctx, "class_method_count", DELTA5, n)?;

    let (input, field_total) = sum_counts(input, ctx, "field_descr", &field_counts)?;
    let (input, field_descr) = index_band(input, ctx, "field_descr", DELTA5, field_total, descr, descrs)?;
    let field_hi = options.flags_hi(AttributeContext::Field);
    let (input, field_flags) = flags_band(input, ctx, "field_flags_hi", "field_flags_lo", field_total, field_hi)?;
    let (input, field_types) = descriptors(input, pool, &field_descr)?;
    let holders = Holders {
        flags: &field_flags,
        hi: field_hi,
        field_descriptors: Some(&field_types),
    };
    let (input, field_attrs) = context("field attributes", |i| {
        context_attributes(i, ctx, AttributeContext::Field, defs, pool, &holders)
    })(input)?;

    let (input, method_total) = sum_counts(input, ctx, "method_descr", &method_counts)?;
    let (input, method_descr) = index_band(input, ctx, "method_descr", MDELTA5, method_total, descr, descrs)?;
    let method_hi = options.flags_hi(AttributeContext::Method);
    let (input, method_flags) =
        flags_band(input, ctx, "method_flags_hi", "method_flags_lo", method_total, method_hi)?;
    let holders = Holders {
        flags: &method_flags,
        hi: method_hi,
        field_descriptors: None,
    };
    let (input, method_attrs) = context("method attributes", |i| {
        context_attributes(i, ctx, AttributeContext::Method, defs, pool, &holders)
    })(input)?;

    let class_hi = options.flags_hi(AttributeContext::Class);
    let (input, class_flags) = flags_band(input, ctx, "class_flags_hi", "class_flags_lo", n, class_hi)?;
    let holders = Holders {
        flags: &class_flags,
        hi: class_hi,
        field_descriptors: None,
    };
    let (input, class_attrs) = context("class attributes", |i| {
        context_attributes(i, ctx, AttributeContext::Class, defs, pool, &holders)
    })(input)?;

    let mut methods = members(method_descr, method_attrs);
    let mut code_count = 0;
    for m in methods.iter_mut() {
        if m.attributes.iter().any(|a| matches!(a, AttrSlot::Code)) {
            m.code = Some(code_count);
            code_count += 1;
        }
    }
    let (input, codes) = context("code bands", |i| code_bands(i, ctx, header, defs, pool, code_count))(input)?;

    let fields = split_by(members(field_descr, field_attrs), &field_counts);
    let methods = split_by(methods, &method_counts);
    let interfaces = split_by(interfaces, &interface_counts);
    let mut entries = Vec::with_capacity(n);
    let per_class = this
        .into_iter()
        .zip(super_class)
        .zip(interfaces)
        .zip(fields.into_iter().zip(methods))
        .zip(class_attrs.access_flags.into_iter().zip(class_attrs.holders));
    for ((((this, super_class), interfaces), (fields, methods)), (flags, attributes)) in per_class {
        entries.push(ClassEntry {
            this,
            super_class: if super_class == this { None } else { Some(super_class) },
            interfaces,
            flags,
            fields,
            methods,
            attributes,
        });
    }
    stage_done("class bands", whole, input);
    return Ok((input, ClassBands { classes: entries, codes }));
}
