use super::*;

/// Token coding `L` values selected by population specifiers 145..=188.
pub const TOKEN_L: [u16; 12] = [0, 4, 8, 16, 32, 64, 128, 192, 224, 240, 248, 252];

/// A table of favoured values, a token per band value selecting one of them,
/// and a separate coding for the values that are not favoured.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationCodec {
    favoured: Codecs,
    token: Option<Codecs>,
    token_l: u16,
    unfavoured: Codecs,
}

impl PopulationCodec {
    pub fn new(favoured: Codecs, token: Option<Codecs>, token_l: u16, unfavoured: Codecs) -> Self {
        return PopulationCodec {
            favoured,
            token,
            token_l,
            unfavoured,
        };
    }

    pub fn favoured_codec(&self) -> &Codecs {
        &self.favoured
    }

    pub fn unfavoured_codec(&self) -> &Codecs {
        &self.unfavoured
    }

    /// The token coding for `k` favoured values when none was given explicitly.
    fn implied_token_codec(&self, k: usize) -> Result<Codecs, CodecError> {
        if k < 256 {
            return Ok(Codecs::Bhsd(BYTE1));
        }
        for b in 2..5 {
            let codec = BhsdCodec::new(b, 256 - self.token_l, 0, false)?;
            if codec.encodes(k as i64) {
                return Ok(Codecs::Bhsd(codec));
            }
        }
        return Err(CodecError::NoTokenCodec { k });
    }
}

impl Codec for PopulationCodec {
    fn decode_values<'a>(&self, input: &'a [u8], n: usize) -> CodecResult<'a, Vec<i32>> {
        let favoured_codec = match &self.favoured {
            Codecs::Bhsd(c) => c,
            _ => return Err(CodecError::NotSingleValue),
        };

        // The favoured table ends at the first repeat of its smallest magnitude value
        // or of the value before it.
        let mut favoured: Vec<i32> = Vec::new();
        let mut rest = input;
        let mut smallest: i64 = i64::MAX;
        let mut last: i64 = 0;
        loop {
            let (tail, value) = favoured_codec.decode_value(rest, last)?;
            rest = tail;
            if !favoured.is_empty() && (value == smallest || value == last) {
                break;
            }
            if favoured.len() >= n.max(1) {
                return Err(CodecError::TooManyFavoured { n });
            }
            favoured.push(value as i32);
            if smallest.abs() > value.abs() {
                smallest = value;
            } else if smallest.abs() == value.abs() {
                smallest = smallest.abs();
            }
            last = value;
        }

        let k = favoured.len();
        let token_codec = match &self.token {
            Some(c) => c.clone(),
            None => self.implied_token_codec(k)?,
        };
        let (rest, tokens) = token_codec.decode_values(rest, n)?;
        let unfavoured_count = tokens.iter().filter(|t| **t == 0).count();
        let (rest, unfavoured) = self.unfavoured.decode_values(rest, unfavoured_count)?;

        let mut unfavoured = unfavoured.into_iter();
        let mut values = Vec::with_capacity(n);
        for token in tokens {
            let value = if token == 0 {
                match unfavoured.next() {
                    Some(v) => v,
                    None => return Err(CodecError::UnexpectedEof),
                }
            } else {
                match favoured.get(token as usize - 1) {
                    Some(v) => *v,
                    None => return Err(CodecError::BadToken { token, k }),
                }
            };
            values.push(value);
        }
        return Ok((rest, values));
    }
}
