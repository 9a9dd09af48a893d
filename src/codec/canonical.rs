use super::*;

/// Specifier meaning "an arbitrary coding, parameters follow in two band header bytes".
pub const ARBITRARY_SPECIFIER: i32 = 116;
const RUN_FIRST: i32 = 117;
const RUN_LAST: i32 = 140;
const POPULATION_FIRST: i32 = 141;
const POPULATION_LAST: i32 = 188;

/// Composite codings may contain other codings, but not without bound.
pub const MAX_SPECIFIER_DEPTH: usize = 8;

/// `(b, h, s, d)` for specifiers 1..=115. Index 0 stands for the band's default coding.
const CANONICAL: [(u8, u16, u8, u8); 116] = [
    (0, 0, 0, 0),
    // 1..=16
    (1, 256, 0, 0), (1, 256, 1, 0), (1, 256, 0, 1), (1, 256, 1, 1),
    (2, 256, 0, 0), (2, 256, 1, 0), (2, 256, 0, 1), (2, 256, 1, 1),
    (3, 256, 0, 0), (3, 256, 1, 0), (3, 256, 0, 1), (3, 256, 1, 1),
    (4, 256, 0, 0), (4, 256, 1, 0), (4, 256, 0, 1), (4, 256, 1, 1),
    // 17..=31
    (5, 4, 0, 0), (5, 4, 1, 0), (5, 4, 2, 0),
    (5, 16, 0, 0), (5, 16, 1, 0), (5, 16, 2, 0),
    (5, 32, 0, 0), (5, 32, 1, 0), (5, 32, 2, 0),
    (5, 64, 0, 0), (5, 64, 1, 0), (5, 64, 2, 0),
    (5, 128, 0, 0), (5, 128, 1, 0), (5, 128, 2, 0),
    // 32..=46
    (5, 4, 0, 1), (5, 4, 1, 1), (5, 4, 2, 1),
    (5, 16, 0, 1), (5, 16, 1, 1), (5, 16, 2, 1),
    (5, 32, 0, 1), (5, 32, 1, 1), (5, 32, 2, 1),
    (5, 64, 0, 1), (5, 64, 1, 1), (5, 64, 2, 1),
    (5, 128, 0, 1), (5, 128, 1, 1), (5, 128, 2, 1),
    // 47..=51
    (2, 192, 0, 0), (2, 224, 0, 0), (2, 240, 0, 0), (2, 248, 0, 0), (2, 252, 0, 0),
    // 52..=69
    (2, 8, 0, 1), (2, 8, 1, 1), (2, 16, 0, 1), (2, 16, 1, 1),
    (2, 32, 0, 1), (2, 32, 1, 1), (2, 64, 0, 1), (2, 64, 1, 1),
    (2, 128, 0, 1), (2, 128, 1, 1), (2, 192, 0, 1), (2, 192, 1, 1),
    (2, 224, 0, 1), (2, 224, 1, 1), (2, 240, 0, 1), (2, 240, 1, 1),
    (2, 248, 0, 1), (2, 248, 1, 1),
    // 70..=74
    (3, 192, 0, 0), (3, 224, 0, 0), (3, 240, 0, 0), (3, 248, 0, 0), (3, 252, 0, 0),
    // 75..=92
    (3, 8, 0, 1), (3, 8, 1, 1), (3, 16, 0, 1), (3, 16, 1, 1),
    (3, 32, 0, 1), (3, 32, 1, 1), (3, 64, 0, 1), (3, 64, 1, 1),
    (3, 128, 0, 1), (3, 128, 1, 1), (3, 192, 0, 1), (3, 192, 1, 1),
    (3, 224, 0, 1), (3, 224, 1, 1), (3, 240, 0, 1), (3, 240, 1, 1),
    (3, 248, 0, 1), (3, 248, 1, 1),
    // 93..=97
    (4, 192, 0, 0), (4, 224, 0, 0), (4, 240, 0, 0), (4, 248, 0, 0), (4, 252, 0, 0),
    // 98..=115
    (4, 8, 0, 1), (4, 8, 1, 1), (4, 16, 0, 1), (4, 16, 1, 1),
    (4, 32, 0, 1), (4, 32, 1, 1), (4, 64, 0, 1), (4, 64, 1, 1),
    (4, 128, 0, 1), (4, 128, 1, 1), (4, 192, 0, 1), (4, 192, 1, 1),
    (4, 224, 0, 1), (4, 224, 1, 1), (4, 240, 0, 1), (4, 240, 1, 1),
    (4, 248, 0, 1), (4, 248, 1, 1),
];

/// The coding with canonical specifier `index`, if there is one.
pub fn canonical_codec(index: i32) -> Option<BhsdCodec> {
    if !(1..=115).contains(&index) {
        return None;
    }
    let (b, h, s, d) = CANONICAL[index as usize];
    return Some(BhsdCodec::of(b, h, s, d == 1));
}

/// The canonical specifier of `codec`, if the table has one.
pub fn canonical_index(codec: &BhsdCodec) -> Option<i32> {
    return CANONICAL
        .iter()
        .skip(1)
        .position(|&(b, h, s, d)| {
            b == codec.b() && h == codec.h() && s == codec.s() && (d == 1) == codec.is_delta()
        })
        .map(|i| i as i32 + 1);
}

/// Decode the coding named by `specifier`.
///
/// Composite and arbitrary codings take their parameters from `headers`,
/// the remaining band header bytes, which are returned advanced past what was used.
pub fn codec_from_specifier<'a>(
    specifier: i32,
    headers: &'a [u8],
    default: &BhsdCodec,
) -> CodecResult<'a, Codecs> {
    return specifier_at_depth(specifier, headers, default, 0);
}

fn specifier_at_depth<'a>(
    specifier: i32,
    headers: &'a [u8],
    default: &BhsdCodec,
    depth: usize,
) -> CodecResult<'a, Codecs> {
    if depth > MAX_SPECIFIER_DEPTH {
        return Err(CodecError::NestingTooDeep);
    }
    match specifier {
        0 => return Ok((headers, Codecs::Bhsd(*default))),
        1..=115 => match canonical_codec(specifier) {
            Some(c) => return Ok((headers, Codecs::Bhsd(c))),
            None => return Err(CodecError::InvalidSpecifier(specifier)),
        },
        ARBITRARY_SPECIFIER => {
            let (headers, b0) = header_byte(headers)?;
            let (headers, b1) = header_byte(headers)?;
            let d = b0 & 1 == 1;
            let s = (b0 >> 1) & 3;
            let b = ((b0 >> 3) & 7) + 1;
            let h = b1 as u16 + 1;
            let codec = BhsdCodec::new(b, h, s, d)?;
            return Ok((headers, Codecs::Bhsd(codec)));
        }
        RUN_FIRST..=RUN_LAST => {
            let offset = specifier - RUN_FIRST;
            let kx = (offset & 3) as u32;
            let kb_given = (offset >> 2) & 1 == 1;
            let a_default = (offset >> 3) & 1 == 1;
            let b_default = (offset >> 4) & 1 == 1;
            if a_default && b_default {
                return Err(CodecError::RunBothDefault);
            }
            let (headers, kb) = if kb_given {
                header_byte(headers)?
            } else {
                (headers, 3)
            };
            let k = (kb as usize + 1) * 16usize.pow(kx);
            let (headers, a) = if a_default {
                (headers, Codecs::Bhsd(*default))
            } else {
                nested(headers, default, depth)?
            };
            let (headers, b) = if b_default {
                (headers, Codecs::Bhsd(*default))
            } else {
                nested(headers, default, depth)?
            };
            return Ok((headers, Codecs::Run(Box::new(RunCodec::new(k, a, b)))));
        }
        POPULATION_FIRST..=POPULATION_LAST => {
            let offset = specifier - POPULATION_FIRST;
            let favoured_default = offset & 1 == 1;
            let unfavoured_default = (offset >> 1) & 1 == 1;
            let token_l = (offset >> 2) as usize;
            let (headers, favoured) = if favoured_default {
                (headers, Codecs::Bhsd(*default))
            } else {
                nested(headers, default, depth)?
            };
            let (headers, token) = if token_l == 0 {
                let (headers, token) = nested(headers, default, depth)?;
                (headers, Some(token))
            } else {
                (headers, None)
            };
            let (headers, unfavoured) = if unfavoured_default {
                (headers, Codecs::Bhsd(*default))
            } else {
                nested(headers, default, depth)?
            };
            let codec = PopulationCodec::new(favoured, token, TOKEN_L[token_l], unfavoured);
            return Ok((headers, Codecs::Population(Box::new(codec))));
        }
        _ => return Err(CodecError::InvalidSpecifier(specifier)),
    }
}

fn nested<'a>(headers: &'a [u8], default: &BhsdCodec, depth: usize) -> CodecResult<'a, Codecs> {
    let (headers, specifier) = header_byte(headers)?;
    return specifier_at_depth(specifier as i32, headers, default, depth + 1);
}

fn header_byte(headers: &[u8]) -> CodecResult<'_, u8> {
    match headers.split_first() {
        Some((byte, rest)) => return Ok((rest, *byte)),
        None => return Err(CodecError::MissingSpecifierBytes),
    }
}
