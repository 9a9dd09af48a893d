use super::*;

/// A `(B,H,S,D)` coding: at most `b` bytes of a base-`h` numeral,
/// `s` low bits selecting negative values and an optional running delta.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BhsdCodec {
    b: u8,
    h: u16,
    s: u8,
    d: bool,
    cardinality: i64,
    min: i64,
    max: i64,
}

/// `i32` wide cardinalities cover every value a band may hold.
const FULL_RANGE: i64 = 1 << 32;

impl BhsdCodec {
    /// Build a codec, validating the parameters.
    pub fn new(b: u8, h: u16, s: u8, d: bool) -> Result<BhsdCodec, CodecError> {
        let valid = (1..=5).contains(&b)
            && (1..=256).contains(&h)
            && s <= 2
            && (b != 1 || h == 256)
            && (h != 256 || b < 5);
        if !valid {
            return Err(CodecError::InvalidParameters { b, h, s, d });
        }
        return Ok(BhsdCodec::of(b, h, s, d));
    }

    /// Build a codec whose parameters are known to be valid.
    pub(crate) const fn of(b: u8, h: u16, s: u8, d: bool) -> BhsdCodec {
        let cardinality = cardinality(b, h);
        let (min, max) = if cardinality >= FULL_RANGE {
            if s == 0 {
                (0, i32::MAX as i64)
            } else {
                (i32::MIN as i64, i32::MAX as i64)
            }
        } else if s == 0 {
            (0, cardinality - 1)
        } else {
            let mut min = 0;
            let mut max = 0;
            let mut z = if cardinality > 4 { cardinality - 4 } else { 0 };
            while z < cardinality {
                let x = decode_sign(z, s);
                if x < min {
                    min = x;
                }
                if x > max {
                    max = x;
                }
                z += 1;
            }
            (min, max)
        };
        return BhsdCodec {
            b,
            h,
            s,
            d,
            cardinality,
            min,
            max,
        };
    }

    pub fn b(&self) -> u8 {
        self.b
    }

    pub fn h(&self) -> u16 {
        self.h
    }

    pub fn s(&self) -> u8 {
        self.s
    }

    pub fn is_delta(&self) -> bool {
        self.d
    }

    pub fn is_signed(&self) -> bool {
        self.s != 0
    }

    /// `256 - H`, the count of byte values that terminate a numeral.
    pub fn l(&self) -> u16 {
        256 - self.h
    }

    /// Number of distinct numerals this codec can express.
    pub fn cardinality(&self) -> i64 {
        self.cardinality
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    /// Whether every `i32` value is representable, deltas wrapping at 32 bits.
    pub fn is_full_range(&self) -> bool {
        self.cardinality >= FULL_RANGE
    }

    /// True if `value` can be written by this codec without a delta.
    pub fn encodes(&self, value: i64) -> bool {
        return value >= self.min && value <= self.max;
    }

    /// Decode a single value. `last` is the previous value of the band, used by delta codecs.
    pub fn decode_value<'a>(&self, input: &'a [u8], last: i64) -> CodecResult<'a, i64> {
        let l = self.l() as i64;
        let h = self.h as i64;
        let mut rest = input;
        let mut z: i64 = 0;
        let mut weight: i64 = 1;
        for _ in 0..self.b {
            let (byte, tail) = match rest.split_first() {
                Some((byte, tail)) => (*byte as i64, tail),
                None => return Err(CodecError::UnexpectedEof),
            };
            rest = tail;
            z += byte * weight;
            weight *= h;
            if byte < l {
                break;
            }
        }
        let mut x = self.from_numeral(z);
        if self.d {
            x = self.wrap(x + last);
        }
        return Ok((rest, x));
    }

    /// Append the encoding of a single value.
    pub fn encode_value(&self, value: i64, last: i64, out: &mut Vec<u8>) -> Result<(), CodecError> {
        let value = if self.d {
            self.wrap(value - last)
        } else {
            value
        };
        let mut z = self.to_numeral(value)?;
        let l = self.l() as i64;
        let h = self.h as i64;
        for i in 0..self.b {
            if z < l || i == self.b - 1 {
                out.push(z as u8);
                return Ok(());
            }
            z -= l;
            out.push((l + z % h) as u8);
            z /= h;
        }
        return Ok(());
    }

    /// Bring a value into this codec's range, wrapping like the band arithmetic does.
    pub(crate) fn wrap(&self, value: i64) -> i64 {
        if self.is_full_range() {
            return value as i32 as i64;
        }
        let mut v = value % self.cardinality;
        if v > self.max {
            v -= self.cardinality;
        }
        if v < self.min {
            v += self.cardinality;
        }
        return v;
    }

    fn from_numeral(&self, z: i64) -> i64 {
        let x = decode_sign(z, self.s);
        if self.is_full_range() {
            return x as i32 as i64;
        }
        return x;
    }

    fn to_numeral(&self, value: i64) -> Result<i64, CodecError> {
        if self.is_full_range() {
            // Any numeral whose 32-bit truncation is the value will do.
            let x = value as i32 as i64;
            for candidate in [x, x + FULL_RANGE, x - FULL_RANGE] {
                let z = encode_sign(candidate, self.s);
                if z >= 0 && z < self.cardinality && decode_sign(z, self.s) == candidate {
                    return Ok(z);
                }
            }
        } else if self.encodes(value) {
            return Ok(encode_sign(value, self.s));
        }
        return Err(CodecError::ValueOutOfRange {
            value,
            codec: *self,
        });
    }

    /// The specifier bytes used when this codec has no canonical index.
    pub fn specifier_bytes(&self) -> [u8; 2] {
        return [
            ((self.b - 1) << 3) | (self.s << 1) | (self.d as u8),
            (self.h - 1) as u8,
        ];
    }
}

const fn cardinality(b: u8, h: u16) -> i64 {
    let h = h as i64;
    let l = 256 - h;
    let mut sum = 0;
    let mut power = 1;
    let mut k = 0;
    while k + 1 < b {
        sum += l * power;
        power *= h;
        k += 1;
    }
    return sum + 256 * power;
}

const fn decode_sign(z: i64, s: u8) -> i64 {
    if s == 0 {
        return z;
    }
    let mask = (1i64 << s) - 1;
    if z & mask == mask {
        return !(z >> s);
    }
    return z - (z >> s);
}

const fn encode_sign(x: i64, s: u8) -> i64 {
    if s == 0 {
        return x;
    }
    let mask = (1i64 << s) - 1;
    if x < 0 {
        return ((!x) << s) | mask;
    }
    return ((x / mask) << s) + x % mask;
}

impl Codec for BhsdCodec {
    fn decode_values<'a>(&self, input: &'a [u8], n: usize) -> CodecResult<'a, Vec<i32>> {
        let mut values = Vec::with_capacity(n.min(input.len()));
        let mut rest = input;
        let mut last = 0;
        for _ in 0..n {
            let (tail, value) = self.decode_value(rest, last)?;
            rest = tail;
            last = value;
            values.push(value as i32);
        }
        return Ok((rest, values));
    }
}

impl fmt::Display for BhsdCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{}", self.b, self.h)?;
        if self.s != 0 || self.d {
            write!(f, ",{}", self.s)?;
        }
        if self.d {
            write!(f, ",1")?;
        }
        return write!(f, ")");
    }
}

pub const BYTE1: BhsdCodec = BhsdCodec::of(1, 256, 0, false);
pub const CHAR3: BhsdCodec = BhsdCodec::of(3, 128, 0, false);
pub const BCI5: BhsdCodec = BhsdCodec::of(5, 4, 0, false);
pub const BRANCH5: BhsdCodec = BhsdCodec::of(5, 4, 2, false);
pub const UNSIGNED5: BhsdCodec = BhsdCodec::of(5, 64, 0, false);
pub const UDELTA5: BhsdCodec = BhsdCodec::of(5, 64, 0, true);
pub const SIGNED5: BhsdCodec = BhsdCodec::of(5, 64, 1, false);
pub const DELTA5: BhsdCodec = BhsdCodec::of(5, 64, 1, true);
pub const MDELTA5: BhsdCodec = BhsdCodec::of(5, 64, 2, true);
