use super::*;

/// The first `k` values of a band use coding `a`, the rest use coding `b`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunCodec {
    k: usize,
    a: Codecs,
    b: Codecs,
}

impl RunCodec {
    pub fn new(k: usize, a: Codecs, b: Codecs) -> RunCodec {
        return RunCodec { k, a, b };
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn a(&self) -> &Codecs {
        &self.a
    }

    pub fn b(&self) -> &Codecs {
        &self.b
    }
}

impl Codec for RunCodec {
    fn decode_values<'a>(&self, input: &'a [u8], n: usize) -> CodecResult<'a, Vec<i32>> {
        let first = n.min(self.k);
        let (input, mut values) = self.a.decode_values(input, first)?;
        if first < n {
            let (input, rest) = self.b.decode_values(input, n - first)?;
            values.extend(rest);
            return Ok((input, values));
        }
        return Ok((input, values));
    }
}
