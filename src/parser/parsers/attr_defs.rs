use super::*;
use crate::codec::BYTE1;
use crate::layout::*;

use alloc::collections::BTreeSet;

/// Read the segment's attribute definitions and add them to `defs`.
pub fn attr_definitions<'a>(
    input: &'a [u8],
    ctx: &mut BandContext<'a>,
    count: usize,
    options: ArchiveOptions,
    pool: &ConstantPool,
    defs: &mut AttributeDefinitions,
) -> PackResult<'a, ()> {
    let whole = input.len();
    let (input, headers) = context("attr_definition_headers", |i| {
        band(i, ctx, "attr_definition_headers", BYTE1, count)
    })(input)?;
    let utf8 = CpKind::Utf8.name();
    let utf8_len = pool.len(CpKind::Utf8);
    let (input, names) = index_band(input, ctx, "attr_definition_name", UNSIGNED5, count, utf8, utf8_len)?;
    let (input, layouts) = index_band(input, ctx, "attr_definition_layout", UNSIGNED5, count, utf8, utf8_len)?;

    let mut next_index: [usize; 4] = [0; 4];
    for context in AttributeContext::ALL {
        next_index[context as usize] = if options.flags_hi(context) {
            FIRST_OVERFLOW_INDEX_HI
        } else {
            FIRST_OVERFLOW_INDEX
        };
    }
    let mut seen = BTreeSet::new();
    for ((header, name), layout) in headers.iter().zip(names).zip(layouts) {
        let context = AttributeContext::from_bits(*header as u8);
        let index = match (*header >> 2) - 1 {
            -1 => {
                let i = next_index[context as usize];
                next_index[context as usize] += 1;
                i
            }
            i => i as usize,
        };
        if !seen.insert((context, index)) {
            return corrupt(input, Corruption::DuplicateLayout { context, index });
        }
        let name = match pool.utf8_string(name) {
            Ok(n) => n,
            Err(cause) => return corrupt(input, cause),
        };
        let text = match pool.utf8_string(layout) {
            Ok(t) => t,
            Err(cause) => return corrupt(input, cause),
        };
        let layout = match AttributeLayout::bounded(&name, context, index, &text, ctx.limits().max_layout_depth) {
            Ok(l) => l,
            Err(cause) => return corrupt(input, Corruption::BadLayout { name, cause }),
        };
        tracing::trace!(context = context.name(), index, name = layout.name(), "attribute defined");
        defs.define(layout);
    }
    stage_done("attribute definitions", whole, input);
    return Ok((input, ()));
}
