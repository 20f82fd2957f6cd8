//! LZMA encoder driver.
//!
//! The driver owns the range coder, the match finder and every model array;
//! it feeds the optimal parser, replays the chosen symbols through the
//! coder, maintains the amortized price caches and produces the stream
//! header and end marker.

use crate::coders::{LengthPriceTable, encode_literal_matched, encode_literal_normal};
use crate::lz::{MatchFinder, MatchFinderKind};
use crate::model::{
    ALIGN_BITS, ALIGN_MASK, ALIGN_SIZE, DIST_SLOT_BITS, DIST_SLOTS, END_POS_MODEL_INDEX,
    FULL_DISTANCES, LzmaModel, LzmaProperties, MATCH_LEN_MAX, MATCH_LEN_MIN, NUM_LEN_TO_POS_STATES,
    NUM_REPS, START_POS_MODEL_INDEX, State, dist_slot, len_to_pos_state,
};
use crate::optimal::{NUM_OPTS, Optimal};
use crate::range_coder::{
    self, RangeEncoder, bit_tree_price, bit_tree_reverse_price, bit_tree_reverse_price_offset,
    encode_bit_tree, encode_bit_tree_reverse, encode_bit_tree_reverse_offset,
};
use log::debug;
use packarc_core::error::{PackArcError, Result};
use packarc_core::progress::Progress;
use std::io::{Read, Write};

/// Maximum dictionary size accepted by the encoder (1 GiB).
pub const DICT_SIZE_MAX: u32 = 1 << 30;

const DIST_PRICE_UPDATE_THRESHOLD: u32 = 1 << 7;
const ALIGN_PRICE_UPDATE_THRESHOLD: u32 = ALIGN_SIZE as u32;
const PROGRESS_BLOCK: u64 = 1 << 12;

/// Encoder configuration.
#[derive(Debug, Clone)]
pub struct LzmaOptions {
    /// Sliding-window size in bytes (`2^0..=2^30`); also bounds match
    /// distances.
    pub dict_size: u32,
    /// Literal context bits (0..=8).
    pub lc: u32,
    /// Literal position bits (0..=4).
    pub lp: u32,
    /// Position bits (0..=4).
    pub pb: u32,
    /// The parser's "good enough" match length (5..=273).
    pub nice_len: u32,
    /// Match finder flavour.
    pub match_finder: MatchFinderKind,
    /// Emit the terminating end marker. The marker is always emitted when
    /// the input size is unknown, since the stream would otherwise be
    /// undecodable.
    pub end_marker: bool,
}

impl Default for LzmaOptions {
    fn default() -> Self {
        Self {
            dict_size: 1 << 22,
            lc: 3,
            lp: 0,
            pb: 2,
            nice_len: 32,
            match_finder: MatchFinderKind::Bt4,
            end_marker: false,
        }
    }
}

impl LzmaOptions {
    /// Check every option against its legal range.
    pub fn validate(&self) -> Result<()> {
        if self.dict_size == 0 || self.dict_size > DICT_SIZE_MAX {
            return Err(PackArcError::config(
                "dict_size",
                format!("must be within 1..=2^30, got {}", self.dict_size),
            ));
        }
        if self.lc > 8 {
            return Err(PackArcError::config(
                "lc",
                format!("must be at most 8, got {}", self.lc),
            ));
        }
        if self.lp > 4 {
            return Err(PackArcError::config(
                "lp",
                format!("must be at most 4, got {}", self.lp),
            ));
        }
        if self.pb > 4 {
            return Err(PackArcError::config(
                "pb",
                format!("must be at most 4, got {}", self.pb),
            ));
        }
        if self.nice_len < 5 || self.nice_len > MATCH_LEN_MAX {
            return Err(PackArcError::config(
                "nice_len",
                format!("must be within 5..=273, got {}", self.nice_len),
            ));
        }
        Ok(())
    }
}

/// LZMA encoder.
pub struct LzmaEncoder {
    pub(crate) props: LzmaProperties,
    dict_size: u32,
    pub(crate) nice_len: u32,
    mf_kind: MatchFinderKind,
    end_marker: bool,

    pub(crate) model: LzmaModel,
    rc: RangeEncoder,
    pub(crate) mf: MatchFinder,

    pub(crate) state: State,
    pub(crate) reps: [u32; NUM_REPS],
    pub(crate) prev_byte: u8,
    additional_offset: u32,
    now_pos: u64,

    pub(crate) optimum: Vec<Optimal>,
    pub(crate) opt_cur: u32,
    pub(crate) opt_end: u32,
    pub(crate) match_distances: Vec<u32>,
    pub(crate) longest_match_len: u32,
    pub(crate) num_dist_pairs: u32,
    pub(crate) longest_match_found: bool,

    pub(crate) len_prices: LengthPriceTable,
    pub(crate) rep_len_prices: LengthPriceTable,
    pos_slot_prices: [[u32; DIST_SLOTS]; NUM_LEN_TO_POS_STATES],
    distances_prices: [[u32; FULL_DISTANCES as usize]; NUM_LEN_TO_POS_STATES],
    align_prices: [u32; ALIGN_SIZE],
    align_price_count: u32,
    match_price_count: u32,
    dist_table_size: u32,
}

impl LzmaEncoder {
    /// Create an encoder, validating every option up front.
    pub fn new(options: LzmaOptions) -> Result<Self> {
        options.validate()?;
        let props = LzmaProperties::new(options.lc, options.lp, options.pb);
        let num_pos_states = props.num_pos_states();
        let table_size = options.nice_len + 1 - MATCH_LEN_MIN;
        Ok(Self {
            props,
            dict_size: options.dict_size,
            nice_len: options.nice_len,
            mf_kind: options.match_finder,
            end_marker: options.end_marker,
            model: LzmaModel::new(props),
            rc: RangeEncoder::new(),
            mf: MatchFinder::new(
                options.match_finder,
                options.dict_size,
                NUM_OPTS as u32,
                options.nice_len,
                MATCH_LEN_MAX + 1,
            ),
            state: State::new(),
            reps: [0; NUM_REPS],
            prev_byte: 0,
            additional_offset: 0,
            now_pos: 0,
            optimum: vec![Optimal::default(); NUM_OPTS],
            opt_cur: 0,
            opt_end: 0,
            match_distances: vec![0; MATCH_LEN_MAX as usize * 2 + 2],
            longest_match_len: 0,
            num_dist_pairs: 0,
            longest_match_found: false,
            len_prices: LengthPriceTable::new(num_pos_states, table_size),
            rep_len_prices: LengthPriceTable::new(num_pos_states, table_size),
            pos_slot_prices: [[0; DIST_SLOTS]; NUM_LEN_TO_POS_STATES],
            distances_prices: [[0; FULL_DISTANCES as usize]; NUM_LEN_TO_POS_STATES],
            align_prices: [0; ALIGN_SIZE],
            align_price_count: 0,
            match_price_count: 0,
            dist_table_size: dist_table_size_for(options.dict_size),
        })
    }

    /// The configured stream properties.
    pub fn properties(&self) -> LzmaProperties {
        self.props
    }

    /// The configured dictionary size.
    pub fn dict_size(&self) -> u32 {
        self.dict_size
    }

    /// Replace the whole configuration, validating it first; takes effect
    /// on the next stream.
    pub fn set_coder_properties(&mut self, options: LzmaOptions) -> Result<()> {
        *self = Self::new(options)?;
        Ok(())
    }

    /// Replace the dictionary size; takes effect on the next stream.
    pub fn set_dictionary_size(&mut self, dict_size: u32) -> Result<()> {
        if dict_size == 0 || dict_size > DICT_SIZE_MAX {
            return Err(PackArcError::config(
                "dict_size",
                format!("must be within 1..=2^30, got {dict_size}"),
            ));
        }
        self.dict_size = dict_size;
        self.dist_table_size = dist_table_size_for(dict_size);
        Ok(())
    }

    /// Write the 5-byte coder properties: the packed properties byte plus
    /// the little-endian dictionary size.
    pub fn write_coder_properties<W: Write>(&self, sink: &mut W) -> Result<()> {
        let mut header = [0u8; 5];
        header[0] = self.props.to_byte();
        header[1..5].copy_from_slice(&self.dict_size.to_le_bytes());
        sink.write_all(&header).map_err(PackArcError::sink_closed)
    }

    /// Encode a full `.lzma` stream: 13-byte header followed by the
    /// range-coded payload. `input_size` of `None` writes the "unknown"
    /// sentinel and terminates with the end marker.
    pub fn encode<R: Read, W: Write>(
        &mut self,
        src: &mut R,
        sink: &mut W,
        input_size: Option<u64>,
    ) -> Result<u64> {
        let mut noop = |_: f32, _: &str| {};
        self.encode_with_progress(src, sink, input_size, &mut noop)
    }

    /// [`encode`](Self::encode) with a progress callback invoked between
    /// blocks of at least 4096 input bytes.
    pub fn encode_with_progress<R: Read, W: Write>(
        &mut self,
        src: &mut R,
        sink: &mut W,
        input_size: Option<u64>,
        progress: &mut dyn Progress,
    ) -> Result<u64> {
        self.write_coder_properties(sink)?;
        let size_field = input_size.unwrap_or(u64::MAX);
        sink.write_all(&size_field.to_le_bytes())
            .map_err(PackArcError::sink_closed)?;
        self.encode_raw(src, sink, input_size, progress)
    }

    /// Encode only the range-coded payload (no header).
    pub fn encode_raw<R: Read, W: Write>(
        &mut self,
        src: &mut R,
        sink: &mut W,
        input_size: Option<u64>,
        progress: &mut dyn Progress,
    ) -> Result<u64> {
        self.init_stream(src)?;
        let emit_marker = self.end_marker || input_size.is_none();
        loop {
            let finished = self.code_one_block(src, emit_marker)?;
            let bytes = self.rc.take_bytes();
            if !bytes.is_empty() {
                sink.write_all(&bytes).map_err(PackArcError::sink_closed)?;
            }
            let fraction = match input_size {
                Some(0) => 1.0,
                Some(total) => (self.now_pos as f64 / total as f64).min(1.0) as f32,
                None => 0.0,
            };
            progress.report(fraction, "lzma");
            if finished {
                break;
            }
        }
        if let Some(expected) = input_size {
            if self.now_pos < expected {
                return Err(PackArcError::source_exhausted(expected, self.now_pos));
            }
        }
        debug!("lzma: encoded {} bytes", self.now_pos);
        Ok(self.now_pos)
    }

    fn init_stream<R: Read>(&mut self, src: &mut R) -> Result<()> {
        self.mf = MatchFinder::new(
            self.mf_kind,
            self.dict_size,
            NUM_OPTS as u32,
            self.nice_len,
            MATCH_LEN_MAX + 1,
        );
        self.mf.init(src)?;
        self.rc.reset();
        self.model.reset();
        self.state = State::new();
        self.reps = [0; NUM_REPS];
        self.prev_byte = 0;
        self.additional_offset = 0;
        self.now_pos = 0;
        self.opt_cur = 0;
        self.opt_end = 0;
        self.longest_match_found = false;
        for opt in &mut self.optimum {
            *opt = Optimal::default();
        }
        self.len_prices.update_all(&self.model.match_len);
        self.rep_len_prices.update_all(&self.model.rep_len);
        self.fill_distances_prices();
        self.fill_align_prices();
        Ok(())
    }

    fn code_one_block<R: Read>(&mut self, src: &mut R, emit_marker: bool) -> Result<bool> {
        let progress_prev = self.now_pos;

        if self.now_pos == 0 {
            if self.mf.num_available() == 0 {
                self.finish_stream(emit_marker);
                return Ok(true);
            }
            // The very first byte has no context to model a match from;
            // code it as a plain literal.
            self.read_match_distances(src)?;
            let pos_state = (self.now_pos as u32 & self.props.pos_mask()) as usize;
            let state_idx = self.state.index();
            self.rc
                .encode_bit(&mut self.model.is_match[state_idx][pos_state], 0);
            let cur_byte = self.mf.get_index_byte(-(self.additional_offset as i32));
            let ctx = self.model.literal.context(self.now_pos as u32, self.prev_byte);
            encode_literal_normal(&mut self.rc, &mut self.model.literal.probs[ctx], cur_byte);
            self.prev_byte = cur_byte;
            self.state.update_char();
            self.additional_offset -= 1;
            self.now_pos += 1;
        }
        if self.mf.num_available() == 0 {
            self.finish_stream(emit_marker);
            return Ok(true);
        }

        loop {
            let (len, back) = self.get_optimum(src, self.now_pos as u32)?;
            let pos_state = (self.now_pos as u32 & self.props.pos_mask()) as usize;
            let state_idx = self.state.index();

            if len == 1 && back == u32::MAX {
                self.rc
                    .encode_bit(&mut self.model.is_match[state_idx][pos_state], 0);
                let cur_byte = self.mf.get_index_byte(-(self.additional_offset as i32));
                let ctx = self.model.literal.context(self.now_pos as u32, self.prev_byte);
                if !self.state.is_char_state() {
                    let match_byte = self.mf.get_index_byte(
                        -(self.reps[0] as i32) - 1 - self.additional_offset as i32,
                    );
                    encode_literal_matched(
                        &mut self.rc,
                        &mut self.model.literal.probs[ctx],
                        match_byte,
                        cur_byte,
                    );
                } else {
                    encode_literal_normal(
                        &mut self.rc,
                        &mut self.model.literal.probs[ctx],
                        cur_byte,
                    );
                }
                self.prev_byte = cur_byte;
                self.state.update_char();
            } else {
                self.rc
                    .encode_bit(&mut self.model.is_match[state_idx][pos_state], 1);
                if back < NUM_REPS as u32 {
                    self.rc.encode_bit(&mut self.model.is_rep[state_idx], 1);
                    if back == 0 {
                        self.rc.encode_bit(&mut self.model.is_rep_g0[state_idx], 0);
                        let long = u32::from(len != 1);
                        self.rc
                            .encode_bit(&mut self.model.is_rep0_long[state_idx][pos_state], long);
                    } else {
                        self.rc.encode_bit(&mut self.model.is_rep_g0[state_idx], 1);
                        if back == 1 {
                            self.rc.encode_bit(&mut self.model.is_rep_g1[state_idx], 0);
                        } else {
                            self.rc.encode_bit(&mut self.model.is_rep_g1[state_idx], 1);
                            self.rc
                                .encode_bit(&mut self.model.is_rep_g2[state_idx], back - 2);
                        }
                    }
                    if len == 1 {
                        self.state.update_short_rep();
                    } else {
                        self.rep_len_prices.encode(
                            &mut self.rc,
                            &mut self.model.rep_len,
                            len,
                            pos_state,
                        );
                        self.state.update_rep();
                    }
                    // MRU promotion of the reused distance.
                    let distance = self.reps[back as usize];
                    if back != 0 {
                        for i in (1..=back as usize).rev() {
                            self.reps[i] = self.reps[i - 1];
                        }
                        self.reps[0] = distance;
                    }
                } else {
                    self.rc.encode_bit(&mut self.model.is_rep[state_idx], 0);
                    self.state.update_match();
                    self.len_prices
                        .encode(&mut self.rc, &mut self.model.match_len, len, pos_state);
                    let dist = back - NUM_REPS as u32;
                    self.encode_distance(dist, len);
                    self.match_price_count += 1;
                    self.reps[3] = self.reps[2];
                    self.reps[2] = self.reps[1];
                    self.reps[1] = self.reps[0];
                    self.reps[0] = dist;
                }
                self.prev_byte = self
                    .mf
                    .get_index_byte(len as i32 - 1 - self.additional_offset as i32);
            }

            self.additional_offset -= len;
            self.now_pos += len as u64;

            if self.additional_offset == 0 {
                if self.match_price_count >= DIST_PRICE_UPDATE_THRESHOLD {
                    self.fill_distances_prices();
                }
                if self.align_price_count >= ALIGN_PRICE_UPDATE_THRESHOLD {
                    self.fill_align_prices();
                }
                if self.mf.num_available() == 0 {
                    self.finish_stream(emit_marker);
                    return Ok(true);
                }
                if self.now_pos - progress_prev >= PROGRESS_BLOCK {
                    return Ok(false);
                }
            }
        }
    }

    fn encode_distance(&mut self, dist: u32, len: u32) {
        let lps = len_to_pos_state(len);
        let slot = dist_slot(dist);
        encode_bit_tree(
            &mut self.rc,
            &mut self.model.distance.slot[lps],
            DIST_SLOT_BITS,
            slot,
        );
        if slot >= START_POS_MODEL_INDEX {
            let footer_bits = (slot >> 1) - 1;
            let base = (2 | (slot & 1)) << footer_bits;
            let reduced = dist - base;
            if slot < END_POS_MODEL_INDEX {
                encode_bit_tree_reverse_offset(
                    &mut self.rc,
                    &mut self.model.distance.special,
                    base as i32 - slot as i32 - 1,
                    footer_bits,
                    reduced,
                );
            } else {
                self.rc
                    .encode_direct_bits(reduced >> ALIGN_BITS, footer_bits - ALIGN_BITS);
                encode_bit_tree_reverse(
                    &mut self.rc,
                    &mut self.model.distance.align,
                    ALIGN_BITS,
                    reduced & ALIGN_MASK,
                );
                self.align_price_count += 1;
            }
        }
    }

    fn finish_stream(&mut self, emit_marker: bool) {
        if emit_marker {
            // Canonical end marker: a length-2 match in slot 63 whose 30
            // reduced-distance bits are all ones, decoding to 0xFFFFFFFF.
            let pos_state = (self.now_pos as u32 & self.props.pos_mask()) as usize;
            let state_idx = self.state.index();
            self.rc
                .encode_bit(&mut self.model.is_match[state_idx][pos_state], 1);
            self.rc.encode_bit(&mut self.model.is_rep[state_idx], 0);
            self.state.update_match();
            let len = MATCH_LEN_MIN;
            self.len_prices
                .encode(&mut self.rc, &mut self.model.match_len, len, pos_state);
            let slot = DIST_SLOTS as u32 - 1;
            encode_bit_tree(
                &mut self.rc,
                &mut self.model.distance.slot[len_to_pos_state(len)],
                DIST_SLOT_BITS,
                slot,
            );
            let footer_bits = 30;
            let reduced = (1u32 << footer_bits) - 1;
            self.rc
                .encode_direct_bits(reduced >> ALIGN_BITS, footer_bits - ALIGN_BITS);
            encode_bit_tree_reverse(
                &mut self.rc,
                &mut self.model.distance.align,
                ALIGN_BITS,
                reduced & ALIGN_MASK,
            );
        }
        self.rc.flush();
    }

    pub(crate) fn read_match_distances<R: Read>(&mut self, src: &mut R) -> Result<(u32, u32)> {
        let num_pairs = self.mf.get_matches(src, &mut self.match_distances)?;
        let mut len = 0;
        if num_pairs > 0 {
            len = self.match_distances[num_pairs as usize - 2];
            if len == self.nice_len {
                // The finder stops at nice_len; see how far the best match
                // really runs.
                len += self.mf.get_match_len(
                    len as i32 - 1,
                    self.match_distances[num_pairs as usize - 1],
                    MATCH_LEN_MAX - len,
                );
            }
        }
        self.additional_offset += 1;
        Ok((len, num_pairs))
    }

    pub(crate) fn move_ahead<R: Read>(&mut self, src: &mut R, num: u32) -> Result<()> {
        if num > 0 {
            self.additional_offset += num;
            self.mf.skip(src, num)?;
        }
        Ok(())
    }

    pub(crate) fn rep_len1_price(&self, state: State, pos_state: usize) -> u32 {
        range_coder::price0(self.model.is_rep_g0[state.index()])
            + range_coder::price0(self.model.is_rep0_long[state.index()][pos_state])
    }

    pub(crate) fn pure_rep_price(&self, rep_index: u32, state: State, pos_state: usize) -> u32 {
        let s = state.index();
        if rep_index == 0 {
            range_coder::price0(self.model.is_rep_g0[s])
                + range_coder::price1(self.model.is_rep0_long[s][pos_state])
        } else {
            let mut total = range_coder::price1(self.model.is_rep_g0[s]);
            if rep_index == 1 {
                total += range_coder::price0(self.model.is_rep_g1[s]);
            } else {
                total += range_coder::price1(self.model.is_rep_g1[s]);
                total += range_coder::price(self.model.is_rep_g2[s], rep_index - 2);
            }
            total
        }
    }

    pub(crate) fn rep_price(&self, rep_index: u32, len: u32, state: State, pos_state: usize) -> u32 {
        self.rep_len_prices.price(len, pos_state) + self.pure_rep_price(rep_index, state, pos_state)
    }

    pub(crate) fn pos_len_price(&self, dist: u32, len: u32, pos_state: usize) -> u32 {
        let lps = len_to_pos_state(len);
        let dist_price = if dist < FULL_DISTANCES {
            self.distances_prices[lps][dist as usize]
        } else {
            self.pos_slot_prices[lps][dist_slot(dist) as usize]
                + self.align_prices[(dist & ALIGN_MASK) as usize]
        };
        dist_price + self.len_prices.price(len, pos_state)
    }

    fn fill_distances_prices(&mut self) {
        let mut temp_prices = [0u32; FULL_DISTANCES as usize];
        for i in START_POS_MODEL_INDEX..FULL_DISTANCES {
            let slot = dist_slot(i);
            let footer_bits = (slot >> 1) - 1;
            let base = (2 | (slot & 1)) << footer_bits;
            temp_prices[i as usize] = bit_tree_reverse_price_offset(
                &self.model.distance.special,
                base as i32 - slot as i32 - 1,
                footer_bits,
                i - base,
            );
        }
        for lps in 0..NUM_LEN_TO_POS_STATES {
            let tree = &self.model.distance.slot[lps];
            let slot_prices = &mut self.pos_slot_prices[lps];
            for slot in 0..self.dist_table_size {
                slot_prices[slot as usize] = bit_tree_price(tree, DIST_SLOT_BITS, slot);
            }
            for slot in END_POS_MODEL_INDEX..self.dist_table_size {
                slot_prices[slot as usize] +=
                    range_coder::direct_bits_price((slot >> 1) - 1 - ALIGN_BITS);
            }
            let dist_prices = &mut self.distances_prices[lps];
            for i in 0..START_POS_MODEL_INDEX {
                dist_prices[i as usize] = slot_prices[i as usize];
            }
            for i in START_POS_MODEL_INDEX..FULL_DISTANCES {
                dist_prices[i as usize] =
                    slot_prices[dist_slot(i) as usize] + temp_prices[i as usize];
            }
        }
        self.match_price_count = 0;
        debug!("lzma: distance price tables refreshed");
    }

    fn fill_align_prices(&mut self) {
        for i in 0..ALIGN_SIZE as u32 {
            self.align_prices[i as usize] =
                bit_tree_reverse_price(&self.model.distance.align, ALIGN_BITS, i);
        }
        self.align_price_count = 0;
    }
}

fn dist_table_size_for(dict_size: u32) -> u32 {
    let mut log = 0u32;
    while (1u64 << log) < dict_size as u64 {
        log += 1;
    }
    log * 2
}

/// Compress a whole buffer into a `.lzma` stream with default options.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    compress_with(data, LzmaOptions::default())
}

/// Compress a whole buffer into a `.lzma` stream.
pub fn compress_with(data: &[u8], options: LzmaOptions) -> Result<Vec<u8>> {
    let mut encoder = LzmaEncoder::new(options)?;
    let mut out = Vec::new();
    let mut src = data;
    encoder.encode(&mut src, &mut out, Some(data.len() as u64))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_validation() {
        assert!(LzmaOptions::default().validate().is_ok());

        let bad = LzmaOptions { lc: 9, ..Default::default() };
        assert!(matches!(
            bad.validate(),
            Err(PackArcError::Config { parameter: "lc", .. })
        ));

        let bad = LzmaOptions { pb: 5, ..Default::default() };
        assert!(matches!(
            bad.validate(),
            Err(PackArcError::Config { parameter: "pb", .. })
        ));

        let bad = LzmaOptions { nice_len: 4, ..Default::default() };
        assert!(bad.validate().is_err());
        let bad = LzmaOptions { nice_len: 274, ..Default::default() };
        assert!(bad.validate().is_err());
        let ok = LzmaOptions { nice_len: 273, ..Default::default() };
        assert!(ok.validate().is_ok());

        let bad = LzmaOptions { dict_size: 0, ..Default::default() };
        assert!(bad.validate().is_err());
        let bad = LzmaOptions { dict_size: (1 << 30) + 1, ..Default::default() };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_coder_properties_bytes() {
        let encoder = LzmaEncoder::new(LzmaOptions {
            dict_size: 0x10000,
            ..Default::default()
        })
        .unwrap();
        let mut header = Vec::new();
        encoder.write_coder_properties(&mut header).unwrap();
        assert_eq!(header, vec![0x5D, 0x00, 0x00, 0x01, 0x00]);
    }

    #[test]
    fn test_dist_table_size() {
        assert_eq!(dist_table_size_for(1), 0);
        assert_eq!(dist_table_size_for(2), 2);
        assert_eq!(dist_table_size_for(1 << 12), 24);
        assert_eq!(dist_table_size_for(1 << 22), 44);
        assert_eq!(dist_table_size_for((1 << 22) + 1), 46);
    }

    #[test]
    fn test_empty_input_stream_layout() {
        let out = compress(b"").unwrap();
        // 13-byte header plus the 5 flush bytes of an empty payload.
        assert_eq!(out.len(), 18);
        assert_eq!(out[0], 0x5D);
        assert_eq!(&out[5..13], &0u64.to_le_bytes());
        assert_eq!(out[13], 0);
    }
}
