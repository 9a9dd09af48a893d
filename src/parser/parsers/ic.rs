use super::*;
use crate::codec::{DELTA5, UDELTA5};

use alloc::string::String;

fn class_string<'a>(input: &'a [u8], pool: &ConstantPool, index: usize) -> PackResult<'a, String> {
    return match pool.class_name(index) {
        Ok(name) => Ok((input, String::from(name))),
        Err(cause) => corrupt(input, cause),
    };
}

/// The global inner class table.
pub fn ic_bands<'a>(
    input: &'a [u8],
    ctx: &mut BandContext<'a>,
    count: usize,
    pool: &ConstantPool,
) -> PackResult<'a, Vec<IcTuple>> {
    let whole = input.len();
    let classes = pool.len(CpKind::Class);
    let class = CpKind::Class.name();
    let (input, this_class) = index_band(input, ctx, "ic_this_class", UDELTA5, count, class, classes)?;
    let (input, flags) = context("ic_flags", |i| band(i, ctx, "ic_flags", UNSIGNED5, count))(input)?;
    let explicit = flags.iter().filter(|f| **f as u32 & IC_EXPLICIT != 0).count();
    let (input, outer) = nullable_index_band(input, ctx, "ic_outer_class", DELTA5, explicit, class, classes)?;
    let (input, name) = nullable_index_band(
        input,
        ctx,
        "ic_name",
        DELTA5,
        explicit,
        CpKind::Utf8.name(),
        pool.len(CpKind::Utf8),
    )?;

    let mut outer = outer.into_iter();
    let mut name = name.into_iter();
    let mut tuples = Vec::with_capacity(count);
    for (this, flags) in this_class.into_iter().zip(flags) {
        let (_, class) = class_string(input, pool, this)?;
        let flags = flags as u32;
        let mut tuple = IcTuple {
            class,
            flags,
            outer: None,
            name: None,
        };
        if flags & IC_EXPLICIT != 0 {
            if let Some(Some(o)) = outer.next() {
                tuple.outer = Some(class_string(input, pool, o)?.1);
            }
            if let Some(Some(n)) = name.next() {
                tuple.name = match pool.utf8_string(n) {
                    Ok(n) => Some(n),
                    Err(cause) => return corrupt(input, cause),
                };
            }
        }
        tuples.push(tuple);
    }
    stage_done("inner classes", whole, input);
    return Ok((input, tuples));
}
