//! The binary-arithmetic range coder.
//!
//! LZMA's entropy stage carries an interval over the 32-bit space, splitting
//! it at each decision according to an 11-bit adaptive probability. The
//! encoder accumulates carries in a 40-bit `low` and retroactively patches
//! already-scheduled bytes through a cache byte/counter pair; the decoder
//! mirrors the arithmetic by refilling a 32-bit `code` one byte at a time.
//!
//! Bit prices are measured in 1/64-bit fixed point (shift 6) and looked up
//! from a table quantized to 32 probability steps; the optimal parser sums
//! these prices instead of ever touching the coder itself.

use packarc_core::error::{PackArcError, Result};
use std::io::Read;

/// Number of bits in the probability model.
pub const PROB_BITS: u32 = 11;

/// Total probability weight (`2^11`).
pub const PROB_MAX: u16 = 1 << PROB_BITS;

/// Initial (equiprobable) probability value.
pub const PROB_INIT: u16 = PROB_MAX / 2;

/// Adaptation shift for probability updates.
pub const MOVE_BITS: u32 = 5;

/// Renormalization threshold: the range never drops below `2^24`.
const TOP: u32 = 1 << 24;

/// Probability quantization shift for the price table.
const MOVE_REDUCING_BITS: u32 = 2;

/// Fixed-point shift of bit prices: prices are in 1/64-bit units.
pub const BIT_PRICE_SHIFT: u32 = 6;

/// Price considered unreachable by the optimal parser.
pub const INFINITY_PRICE: u32 = 1 << 30;

// Price of encoding a bit against each quantized probability, in 1/64-bit
// units: a piecewise-linear -log2 over 32-probability buckets.
static PROB_PRICES: [u32; (PROB_MAX >> MOVE_REDUCING_BITS) as usize] = {
    const NUM_BITS: u32 = PROB_BITS - MOVE_REDUCING_BITS;
    let mut prices = [0u32; (PROB_MAX >> MOVE_REDUCING_BITS) as usize];
    let mut i = NUM_BITS as i32 - 1;
    while i >= 0 {
        let start = 1u32 << (NUM_BITS - i as u32 - 1);
        let end = 1u32 << (NUM_BITS - i as u32);
        let mut j = start;
        while j < end {
            prices[j as usize] = ((i as u32) << BIT_PRICE_SHIFT)
                + (((end - j) << BIT_PRICE_SHIFT) >> (NUM_BITS - i as u32 - 1));
            j += 1;
        }
        i -= 1;
    }
    prices
};

/// Price of encoding a zero bit against `prob`.
#[inline]
pub fn price0(prob: u16) -> u32 {
    PROB_PRICES[(prob >> MOVE_REDUCING_BITS) as usize]
}

/// Price of encoding a one bit against `prob`.
#[inline]
pub fn price1(prob: u16) -> u32 {
    PROB_PRICES[((PROB_MAX - prob) >> MOVE_REDUCING_BITS) as usize]
}

/// Price of encoding `bit` against `prob`.
#[inline]
pub fn price(prob: u16, bit: u32) -> u32 {
    if bit == 0 { price0(prob) } else { price1(prob) }
}

/// Price of `count` equiprobable direct bits.
#[inline]
pub fn direct_bits_price(count: u32) -> u32 {
    count << BIT_PRICE_SHIFT
}

/// Range encoder.
///
/// Output is staged in an internal buffer; the driver drains it to the sink
/// between blocks so the coder itself stays infallible on the hot path.
#[derive(Debug)]
pub struct RangeEncoder {
    low: u64,
    range: u32,
    cache: u8,
    cache_size: u64,
    buffer: Vec<u8>,
}

impl RangeEncoder {
    /// Create a new range encoder.
    pub fn new() -> Self {
        Self {
            low: 0,
            range: 0xFFFF_FFFF,
            cache: 0,
            cache_size: 1,
            buffer: Vec::new(),
        }
    }

    /// Reset for a new stream, keeping the buffer allocation.
    pub fn reset(&mut self) {
        self.low = 0;
        self.range = 0xFFFF_FFFF;
        self.cache = 0;
        self.cache_size = 1;
        self.buffer.clear();
    }

    // Emit one byte of `low`, propagating a pending carry into bytes that
    // were scheduled earlier (they sit behind the cache byte as a run of
    // 0xFF that a carry turns into 0x00).
    fn shift_low(&mut self) {
        if self.low < 0xFF00_0000 || self.low > 0xFFFF_FFFF {
            let mut tmp = self.cache;
            let carry = (self.low >> 32) as u8;
            loop {
                self.buffer.push(tmp.wrapping_add(carry));
                tmp = 0xFF;
                self.cache_size -= 1;
                if self.cache_size == 0 {
                    break;
                }
            }
            self.cache = (self.low >> 24) as u8;
        }
        self.cache_size += 1;
        self.low = (self.low << 8) & 0xFFFF_FFFF;
    }

    /// Encode one bit against an adaptive probability.
    #[inline]
    pub fn encode_bit(&mut self, prob: &mut u16, bit: u32) {
        let bound = (self.range >> PROB_BITS) * (*prob as u32);
        if bit == 0 {
            self.range = bound;
            *prob += (PROB_MAX - *prob) >> MOVE_BITS;
        } else {
            self.low += bound as u64;
            self.range -= bound;
            *prob -= *prob >> MOVE_BITS;
        }
        if self.range < TOP {
            self.range <<= 8;
            self.shift_low();
        }
    }

    /// Encode `count` raw equiprobable bits, most significant first.
    pub fn encode_direct_bits(&mut self, value: u32, count: u32) {
        for i in (0..count).rev() {
            self.range >>= 1;
            if (value >> i) & 1 != 0 {
                self.low += self.range as u64;
            }
            if self.range < TOP {
                self.range <<= 8;
                self.shift_low();
            }
        }
    }

    /// Finalize the stream: five shift-lows push out everything pending.
    pub fn flush(&mut self) {
        for _ in 0..5 {
            self.shift_low();
        }
    }

    /// Bytes staged so far (including any flushed tail).
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Drain the staged bytes.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }
}

impl Default for RangeEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Range decoder over a byte source.
#[derive(Debug)]
pub struct RangeDecoder<R> {
    inner: R,
    range: u32,
    code: u32,
    bytes_read: u64,
}

impl<R: Read> RangeDecoder<R> {
    /// Create a decoder, consuming the 5-byte coder preamble
    /// (one discarded zero byte plus the initial `code`).
    pub fn new(mut inner: R) -> Result<Self> {
        let mut preamble = [0u8; 5];
        inner
            .read_exact(&mut preamble)
            .map_err(|e| PackArcError::from_read(e, 0))?;
        if preamble[0] != 0 {
            return Err(PackArcError::malformed(0, "nonzero range coder lead byte"));
        }
        let code = u32::from_be_bytes([preamble[1], preamble[2], preamble[3], preamble[4]]);
        Ok(Self {
            inner,
            range: 0xFFFF_FFFF,
            code,
            bytes_read: 5,
        })
    }

    /// Bytes consumed from the source, preamble included.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Whether the coder landed exactly on the end of its payload.
    pub fn is_finished(&self) -> bool {
        self.code == 0
    }

    #[inline]
    fn normalize(&mut self) -> Result<()> {
        if self.range < TOP {
            let mut byte = [0u8; 1];
            self.inner
                .read_exact(&mut byte)
                .map_err(|e| PackArcError::from_read(e, self.bytes_read))?;
            self.bytes_read += 1;
            self.range <<= 8;
            self.code = (self.code << 8) | byte[0] as u32;
        }
        Ok(())
    }

    /// Decode one bit against an adaptive probability.
    #[inline]
    pub fn decode_bit(&mut self, prob: &mut u16) -> Result<u32> {
        self.normalize()?;
        let bound = (self.range >> PROB_BITS) * (*prob as u32);
        if self.code < bound {
            self.range = bound;
            *prob += (PROB_MAX - *prob) >> MOVE_BITS;
            Ok(0)
        } else {
            self.range -= bound;
            self.code -= bound;
            *prob -= *prob >> MOVE_BITS;
            Ok(1)
        }
    }

    /// Decode `count` raw equiprobable bits, most significant first.
    pub fn decode_direct_bits(&mut self, count: u32) -> Result<u32> {
        let mut result = 0u32;
        for _ in 0..count {
            self.normalize()?;
            self.range >>= 1;
            self.code = self.code.wrapping_sub(self.range);
            let bit = if (self.code as i32) < 0 {
                self.code = self.code.wrapping_add(self.range);
                0
            } else {
                1
            };
            result = (result << 1) | bit;
        }
        Ok(result)
    }
}

/// Encode `num_bits` of `symbol` through a bit tree, MSB first.
pub fn encode_bit_tree(rc: &mut RangeEncoder, probs: &mut [u16], num_bits: u32, symbol: u32) {
    let mut m = 1usize;
    for i in (0..num_bits).rev() {
        let bit = (symbol >> i) & 1;
        rc.encode_bit(&mut probs[m], bit);
        m = (m << 1) | bit as usize;
    }
}

/// Decode `num_bits` through a bit tree, MSB first.
pub fn decode_bit_tree<R: Read>(
    rc: &mut RangeDecoder<R>,
    probs: &mut [u16],
    num_bits: u32,
) -> Result<u32> {
    let mut m = 1usize;
    for _ in 0..num_bits {
        let bit = rc.decode_bit(&mut probs[m])?;
        m = (m << 1) | bit as usize;
    }
    Ok(m as u32 - (1 << num_bits))
}

/// Encode `num_bits` of `symbol` through a reverse bit tree, LSB first.
pub fn encode_bit_tree_reverse(
    rc: &mut RangeEncoder,
    probs: &mut [u16],
    num_bits: u32,
    symbol: u32,
) {
    let mut m = 1usize;
    for i in 0..num_bits {
        let bit = (symbol >> i) & 1;
        rc.encode_bit(&mut probs[m], bit);
        m = (m << 1) | bit as usize;
    }
}

/// Decode `num_bits` through a reverse bit tree, LSB first.
pub fn decode_bit_tree_reverse<R: Read>(
    rc: &mut RangeDecoder<R>,
    probs: &mut [u16],
    num_bits: u32,
) -> Result<u32> {
    let mut m = 1usize;
    let mut symbol = 0u32;
    for i in 0..num_bits {
        let bit = rc.decode_bit(&mut probs[m])?;
        m = (m << 1) | bit as usize;
        symbol |= bit << i;
    }
    Ok(symbol)
}

/// Encode through a reverse tree packed into `probs` at a base offset.
///
/// The distance "special" models pack one tree per slot into a single flat
/// array; `base + node` addresses the slot's tree, where `base` may be -1
/// because node indices start at 1.
pub fn encode_bit_tree_reverse_offset(
    rc: &mut RangeEncoder,
    probs: &mut [u16],
    base: i32,
    num_bits: u32,
    symbol: u32,
) {
    let mut m = 1i32;
    for i in 0..num_bits {
        let bit = (symbol >> i) & 1;
        rc.encode_bit(&mut probs[(base + m) as usize], bit);
        m = (m << 1) | bit as i32;
    }
}

/// Decode counterpart of [`encode_bit_tree_reverse_offset`].
pub fn decode_bit_tree_reverse_offset<R: Read>(
    rc: &mut RangeDecoder<R>,
    probs: &mut [u16],
    base: i32,
    num_bits: u32,
) -> Result<u32> {
    let mut m = 1i32;
    let mut symbol = 0u32;
    for i in 0..num_bits {
        let bit = rc.decode_bit(&mut probs[(base + m) as usize])?;
        m = (m << 1) | bit as i32;
        symbol |= bit << i;
    }
    Ok(symbol)
}

/// Price counterpart of [`encode_bit_tree_reverse_offset`].
pub fn bit_tree_reverse_price_offset(
    probs: &[u16],
    base: i32,
    num_bits: u32,
    symbol: u32,
) -> u32 {
    let mut total = 0u32;
    let mut m = 1i32;
    for i in 0..num_bits {
        let bit = (symbol >> i) & 1;
        total += price(probs[(base + m) as usize], bit);
        m = (m << 1) | bit as i32;
    }
    total
}

/// Price of a bit-tree-encoded symbol.
pub fn bit_tree_price(probs: &[u16], num_bits: u32, symbol: u32) -> u32 {
    let mut total = 0u32;
    let mut m = 1usize;
    for i in (0..num_bits).rev() {
        let bit = (symbol >> i) & 1;
        total += price(probs[m], bit);
        m = (m << 1) | bit as usize;
    }
    total
}

/// Price of a reverse-bit-tree-encoded symbol.
pub fn bit_tree_reverse_price(probs: &[u16], num_bits: u32, symbol: u32) -> u32 {
    let mut total = 0u32;
    let mut m = 1usize;
    for i in 0..num_bits {
        let bit = (symbol >> i) & 1;
        total += price(probs[m], bit);
        m = (m << 1) | bit as usize;
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_prob_constants() {
        assert_eq!(PROB_INIT, 1024);
        assert_eq!(PROB_MAX, 2048);
    }

    #[test]
    fn test_equiprobable_bit_costs_one_bit() {
        // 1/64-bit units: one bit is 64, give or take quantization.
        let p = price0(PROB_INIT);
        assert!((60..=68).contains(&p), "price {p}");
        assert_eq!(price0(PROB_INIT), price1(PROB_INIT));
    }

    #[test]
    fn test_price_monotonicity() {
        // A more likely zero must make zero cheaper and one dearer.
        assert!(price0(1800) < price0(1024));
        assert!(price1(1800) > price1(1024));
    }

    #[test]
    fn test_encode_decode_bits() {
        let mut rc = RangeEncoder::new();
        let mut prob = PROB_INIT;
        let pattern = [0u32, 1, 0, 1, 1, 0, 0, 1, 1, 1, 0];
        for &bit in &pattern {
            rc.encode_bit(&mut prob, bit);
        }
        rc.flush();
        let bytes = rc.take_bytes();

        let mut dec = RangeDecoder::new(Cursor::new(bytes)).unwrap();
        let mut prob = PROB_INIT;
        for &bit in &pattern {
            assert_eq!(dec.decode_bit(&mut prob).unwrap(), bit);
        }
    }

    #[test]
    fn test_direct_bits_roundtrip() {
        let mut rc = RangeEncoder::new();
        rc.encode_direct_bits(0x2A5, 10);
        rc.encode_direct_bits(0x3FFF_FFFF, 30);
        rc.flush();
        let bytes = rc.take_bytes();

        let mut dec = RangeDecoder::new(Cursor::new(bytes)).unwrap();
        assert_eq!(dec.decode_direct_bits(10).unwrap(), 0x2A5);
        assert_eq!(dec.decode_direct_bits(30).unwrap(), 0x3FFF_FFFF);
    }

    #[test]
    fn test_bit_tree_roundtrip() {
        let mut rc = RangeEncoder::new();
        let mut enc_probs = [PROB_INIT; 64];
        for symbol in [0u32, 5, 31, 17, 31, 0] {
            encode_bit_tree(&mut rc, &mut enc_probs, 5, symbol);
        }
        let mut rev_probs = [PROB_INIT; 16];
        encode_bit_tree_reverse(&mut rc, &mut rev_probs, 4, 0xB);
        rc.flush();

        let mut dec = RangeDecoder::new(Cursor::new(rc.take_bytes())).unwrap();
        let mut dec_probs = [PROB_INIT; 64];
        for symbol in [0u32, 5, 31, 17, 31, 0] {
            assert_eq!(decode_bit_tree(&mut dec, &mut dec_probs, 5).unwrap(), symbol);
        }
        let mut rev_probs = [PROB_INIT; 16];
        assert_eq!(decode_bit_tree_reverse(&mut dec, &mut rev_probs, 4).unwrap(), 0xB);
    }

    #[test]
    fn test_lead_byte_is_zero() {
        let mut rc = RangeEncoder::new();
        let mut prob = PROB_INIT;
        rc.encode_bit(&mut prob, 1);
        rc.flush();
        let bytes = rc.take_bytes();
        assert_eq!(bytes[0], 0);
        assert_eq!(bytes.len(), 5);
    }

    #[test]
    fn test_truncated_payload_is_malformed() {
        let err = RangeDecoder::new(Cursor::new(vec![0u8, 1, 2])).err().unwrap();
        assert!(matches!(err, PackArcError::Malformed { .. }));
    }

    #[test]
    fn test_nonzero_lead_byte_rejected() {
        let err = RangeDecoder::new(Cursor::new(vec![7u8, 0, 0, 0, 0])).err().unwrap();
        assert!(matches!(err, PackArcError::Malformed { .. }));
    }
}
