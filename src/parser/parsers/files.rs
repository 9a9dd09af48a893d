use super::*;
use crate::codec::DELTA5;

/// The file bands: names, sizes, modtimes, options and the bits of every file.
pub fn file_bands<'a>(
    input: &'a [u8],
    ctx: &mut BandContext<'a>,
    header: &SegmentHeader,
    pool: &ConstantPool,
) -> PackResult<'a, Vec<FileBands<'a>>> {
    let whole = input.len();
    let n = header.file_count();
    let options = header.options;
    let (input, names) = index_band(
        input,
        ctx,
        "file_name",
        UNSIGNED5,
        n,
        CpKind::Utf8.name(),
        pool.len(CpKind::Utf8),
    )?;
    let (input, size_hi) = if options.has(ArchiveOptions::HAVE_FILE_SIZE_HI) {
        band(input, ctx, "file_size_hi", UNSIGNED5, n)?
    } else {
        (input, Vec::new())
    };
    let (input, size_lo) = band(input, ctx, "file_size_lo", UNSIGNED5, n)?;
    let (input, modtimes) = if options.has(ArchiveOptions::HAVE_FILE_MODTIME) {
        band(input, ctx, "file_modtime", DELTA5, n)?
    } else {
        (input, Vec::new())
    };
    let (input, file_options) = if options.has(ArchiveOptions::HAVE_FILE_OPTIONS) {
        band(input, ctx, "file_options", UNSIGNED5, n)?
    } else {
        (input, Vec::new())
    };

    let mut sizes = Vec::with_capacity(n);
    for (i, lo) in size_lo.iter().enumerate() {
        let hi = size_hi.get(i).copied().unwrap_or(0) as u32 as u64;
        let size = (hi << 32) | *lo as u32 as u64;
        sizes.push(to_usize_or_err!(input, "file_size", size));
    }
    let (mut input, _) = sum_counts(input, ctx, "file_bits", &sizes)?;

    let mut files = Vec::with_capacity(n);
    for (i, name) in names.into_iter().enumerate() {
        let (rest, bits) = context("file_bits", |r| byte_band(r, ctx, "file_bits", sizes[i]))(input)?;
        input = rest;
        files.push(FileBands {
            name,
            size: sizes[i] as u64,
            modtime: modtimes.get(i).copied().unwrap_or(0),
            options: file_options.get(i).copied().unwrap_or(0) as u32,
            bits,
        });
    }
    stage_done("file bands", whole, input);
    return Ok((input, files));
}
