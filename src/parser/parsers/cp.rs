use super::*;
use crate::codec::{CHAR3, DELTA5, UDELTA5};

use widestring::U16String;

fn utf8_partition<'a>(input: &'a [u8], ctx: &mut BandContext<'a>, n: usize) -> PackResult<'a, Vec<U16String>> {
    let (input, prefixes) = count_band(input, ctx, "cp_Utf8_prefix", DELTA5, n.saturating_sub(2))?;
    let (input, suffixes) = count_band(input, ctx, "cp_Utf8_suffix", UNSIGNED5, n.saturating_sub(1))?;
    let (input, char_count) = sum_counts(input, ctx, "cp_Utf8_chars", &suffixes)?;
    let (input, chars) = band(input, ctx, "cp_Utf8_chars", CHAR3, char_count)?;
    let big = suffixes.iter().filter(|s| **s == 0).count();
    let (mut input, big_suffixes) = count_band(input, ctx, "cp_Utf8_big_suffix", DELTA5, big)?;

    let mut big_chars = Vec::with_capacity(big);
    for size in big_suffixes.iter() {
        let (rest, chars) = band(input, ctx, "cp_Utf8_big_chars", DELTA5, *size)?;
        input = rest;
        big_chars.push(chars);
    }

    let mut strings: Vec<U16String> = Vec::with_capacity(n);
    if n == 0 {
        return Ok((input, strings));
    }
    strings.push(U16String::new());
    let mut chars = chars.into_iter();
    let mut big_chars = big_chars.into_iter();
    for i in 1..n {
        let prefix = if i >= 2 { prefixes[i - 2] } else { 0 };
        let previous = strings[i - 1].as_slice();
        if prefix > previous.len() {
            return corrupt(
                input,
                Corruption::BadCount {
                    band: "cp_Utf8_prefix",
                    value: prefix as i64,
                },
            );
        }
        let mut units = previous[..prefix].to_vec();
        let suffix: Vec<i32> = match suffixes[i - 1] {
            0 => big_chars.next().unwrap_or_default(),
            len => chars.by_ref().take(len).collect(),
        };
        for c in suffix {
            match u16::try_from(c) {
                Ok(unit) => units.push(unit),
                Err(_) => {
                    return corrupt(
                        input,
                        Corruption::BadCount {
                            band: "cp_Utf8_chars",
                            value: c as i64,
                        },
                    )
                }
            }
        }
        strings.push(U16String::from_vec(units));
    }
    return Ok((input, strings));
}

/// Numbers split into a high and a low word.
fn wide_partition<'a>(
    input: &'a [u8],
    ctx: &mut BandContext<'a>,
    hi_name: &'static str,
    lo_name: &'static str,
    n: usize,
) -> PackResult<'a, Vec<u64>> {
    let (input, hi) = band(input, ctx, hi_name, UDELTA5, n)?;
    let (input, lo) = band(input, ctx, lo_name, DELTA5, n)?;
    let values = hi
        .iter()
        .zip(lo.iter())
        .map(|(hi, lo)| ((*hi as u32 as u64) << 32) | *lo as u32 as u64)
        .collect();
    return Ok((input, values));
}

fn signatures<'a>(
    input: &'a [u8],
    ctx: &mut BandContext<'a>,
    n: usize,
    utf8: &[U16String],
    classes: usize,
) -> PackResult<'a, Vec<SignatureEntry>> {
    let utf8_name = CpKind::Utf8.name();
    let (input, forms) = index_band(input, ctx, "cp_Signature_form", DELTA5, n, utf8_name, utf8.len())?;
    let l = u16::from(b'L');
    let class_counts: Vec<usize> = forms
        .iter()
        .map(|f| utf8[*f].as_slice().iter().filter(|c| **c == l).count())
        .collect();
    let (input, total) = sum_counts(input, ctx, "cp_Signature_classes", &class_counts)?;
    let (input, all_classes) = index_band(
        input,
        ctx,
        "cp_Signature_classes",
        UDELTA5,
        total,
        CpKind::Class.name(),
        classes,
    )?;
    let mut all_classes = all_classes.into_iter();
    let entries = forms
        .into_iter()
        .zip(class_counts)
        .map(|(form, count)| SignatureEntry {
            form,
            classes: all_classes.by_ref().take(count).collect(),
        })
        .collect();
    return Ok((input, entries));
}

fn members<'a>(
    input: &'a [u8],
    ctx: &mut BandContext<'a>,
    class_name: &'static str,
    desc_name: &'static str,
    n: usize,
    classes: usize,
    descrs: usize,
) -> PackResult<'a, Vec<MemberEntry>> {
    let (input, class) = index_band(input, ctx, class_name, DELTA5, n, CpKind::Class.name(), classes)?;
    let (input, descr) = index_band(input, ctx, desc_name, UDELTA5, n, CpKind::Descr.name(), descrs)?;
    let entries = class
        .into_iter()
        .zip(descr)
        .map(|(class, descr)| MemberEntry { class, descr })
        .collect();
    return Ok((input, entries));
}

/// All constant pool partitions, in band order.
pub fn cp_bands<'a>(input: &'a [u8], ctx: &mut BandContext<'a>, counts: &CpCounts) -> PackResult<'a, ConstantPool> {
    let whole = input.len();
    let (input, utf8) = context("cp_Utf8", |i| utf8_partition(i, ctx, counts.utf8))(input)?;
    let (input, int) = context("cp_Int", |i| band(i, ctx, "cp_Int", UDELTA5, counts.int))(input)?;
    let (input, float) = context("cp_Float", |i| band(i, ctx, "cp_Float", UDELTA5, counts.float))(input)?;
    let (input, long) = context("cp_Long", |i| wide_partition(i, ctx, "cp_Long_hi", "cp_Long_lo", counts.long))(input)?;
    let (input, double) = context("cp_Double", |i| {
        wide_partition(i, ctx, "cp_Double_hi", "cp_Double_lo", counts.double)
    })(input)?;
    let utf8_name = CpKind::Utf8.name();
    let (input, string) = index_band(input, ctx, "cp_String", UDELTA5, counts.string, utf8_name, utf8.len())?;
    let (input, class) = index_band(input, ctx, "cp_Class", UDELTA5, counts.class, utf8_name, utf8.len())?;
    let (input, signature) = context("cp_Signature", |i| signatures(i, ctx, counts.signature, &utf8, class.len()))(input)?;
    let (input, descr_name) =
        index_band(input, ctx, "cp_Descr_name", DELTA5, counts.descr, utf8_name, utf8.len())?;
    let (input, descr_type) = index_band(
        input,
        ctx,
        "cp_Descr_type",
        UDELTA5,
        counts.descr,
        CpKind::Signature.name(),
        signature.len(),
    )?;
    let descr = descr_name
        .into_iter()
        .zip(descr_type)
        .map(|(name, signature)| DescrEntry { name, signature })
        .collect::<Vec<_>>();
    let (input, field) = members(
        input,
        ctx,
        "cp_Field_class",
        "cp_Field_desc",
        counts.field,
        class.len(),
        descr.len(),
    )?;
    let (input, method) = members(
        input,
        ctx,
        "cp_Method_class",
        "cp_Method_desc",
        counts.method,
        class.len(),
        descr.len(),
    )?;
    let (input, imethod) = members(
        input,
        ctx,
        "cp_Imethod_class",
        "cp_Imethod_desc",
        counts.imethod,
        class.len(),
        descr.len(),
    )?;

    let mut pool = ConstantPool::default();
    pool.utf8 = utf8;
    pool.int = int;
    pool.float = float.into_iter().map(|f| f as u32).collect();
    pool.long = long.into_iter().map(|l| l as i64).collect();
    pool.double = double;
    pool.string = string;
    pool.class = class;
    pool.signature = signature;
    pool.descr = descr;
    pool.field = field;
    pool.method = method;
    pool.imethod = imethod;
    if let Err(cause) = pool.resolve_names() {
        return corrupt(input, cause);
    }
    stage_done("constant pool", whole, input);
    return Ok((input, pool));
}

/// A pool holding the implied empty string and `strings`.
#[cfg(test)]
pub fn utf8_pool(strings: &[&str]) -> ConstantPool {
    let mut pool = ConstantPool::default();
    pool.utf8 = Vec::from([U16String::new()]);
    pool.utf8.extend(strings.iter().map(|s| U16String::from_str(s)));
    return pool;
}
