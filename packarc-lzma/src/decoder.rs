//! LZMA decoder driver.

use crate::coders::{decode_length, decode_literal_matched, decode_literal_normal};
use crate::lz::OutputWindow;
use crate::model::{
    ALIGN_BITS, DIST_SLOT_BITS, END_POS_MODEL_INDEX, LzmaModel, LzmaProperties,
    START_POS_MODEL_INDEX, State, len_to_pos_state,
};
use crate::range_coder::{
    RangeDecoder, decode_bit_tree, decode_bit_tree_reverse, decode_bit_tree_reverse_offset,
};
use log::debug;
use packarc_core::error::{PackArcError, Result};
use std::io::{Read, Write};

/// Distance value reserved for the end-of-stream marker.
const END_MARKER_DISTANCE: u32 = 0xFFFF_FFFF;

/// Minimum output window the decoder allocates, whatever the header says.
const MIN_WINDOW_SIZE: u32 = 1 << 12;

/// Parse a 13-byte `.lzma` stream header into properties, dictionary size
/// and the declared uncompressed size (`None` when unknown).
pub fn parse_header(header: &[u8; 13]) -> Result<(LzmaProperties, u32, Option<u64>)> {
    let props = LzmaProperties::from_byte(header[0])
        .ok_or_else(|| PackArcError::malformed(0, format!("bad properties byte {:#04x}", header[0])))?;
    let dict_size = u32::from_le_bytes([header[1], header[2], header[3], header[4]]);
    let size = u64::from_le_bytes([
        header[5], header[6], header[7], header[8], header[9], header[10], header[11], header[12],
    ]);
    let size = if size == u64::MAX { None } else { Some(size) };
    Ok((props, dict_size, size))
}

/// LZMA decoder.
pub struct LzmaDecoder {
    props: LzmaProperties,
    dict_size_check: u32,
    model: LzmaModel,
    window: OutputWindow,
    declared_size: Option<u64>,
}

impl LzmaDecoder {
    /// Create a decoder for the given properties and dictionary size.
    ///
    /// A zero dictionary size is legal in headers and coerced to one byte
    /// for the bounds check; the window itself never drops below 4 KiB.
    pub fn new(props: LzmaProperties, dict_size: u32) -> Result<Self> {
        if props.lc > 8 || props.lp > 4 || props.pb > 4 {
            return Err(PackArcError::malformed(0, "bad literal/position properties"));
        }
        let dict_size_check = dict_size.max(1);
        let window_size = dict_size_check.max(MIN_WINDOW_SIZE);
        Ok(Self {
            props,
            dict_size_check,
            model: LzmaModel::new(props),
            window: OutputWindow::new(window_size),
            declared_size: None,
        })
    }

    /// Reconfigure from coder properties: either the 5-byte form
    /// (properties byte + dictionary size) or the full 13-byte stream
    /// header, which additionally records the declared size.
    pub fn set_decoder_properties(&mut self, header: &[u8]) -> Result<()> {
        match header.len() {
            5 => {
                let props = LzmaProperties::from_byte(header[0]).ok_or_else(|| {
                    PackArcError::malformed(0, format!("bad properties byte {:#04x}", header[0]))
                })?;
                let dict_size = u32::from_le_bytes([header[1], header[2], header[3], header[4]]);
                *self = Self::new(props, dict_size)?;
                Ok(())
            }
            13 => {
                let mut fixed = [0u8; 13];
                fixed.copy_from_slice(header);
                let (props, dict_size, size) = parse_header(&fixed)?;
                *self = Self::new(props, dict_size)?;
                self.declared_size = size;
                Ok(())
            }
            n => Err(PackArcError::malformed(
                0,
                format!("decoder properties must be 5 or 13 bytes, got {n}"),
            )),
        }
    }

    /// The uncompressed size recorded by [`set_decoder_properties`]
    /// (`None` if unknown or never set).
    pub fn declared_size(&self) -> Option<u64> {
        self.declared_size
    }

    /// Pre-fill the dictionary from a companion source (solid mode), so
    /// distances reaching into that data are valid from the first byte.
    pub fn train<R: Read>(&mut self, src: &mut R) -> Result<u32> {
        self.window.train(src)
    }

    /// Decode one range-coded payload from `src` into `sink`.
    ///
    /// With `output_size` the decoder stops after exactly that many bytes;
    /// without it, it runs until the end marker. A decoder instance decodes
    /// one stream; reconfigure it through
    /// [`set_decoder_properties`](Self::set_decoder_properties) before reuse.
    pub fn decode<R: Read, W: Write>(
        &mut self,
        src: &mut R,
        sink: &mut W,
        output_size: Option<u64>,
    ) -> Result<u64> {
        let mut rc = RangeDecoder::new(src)?;
        self.model.reset();
        let mut state = State::new();
        let mut reps = [0u32; 4];
        let pos_mask = self.props.pos_mask();
        let train_size = self.window.train_size() as u64;
        let mut bytes_out: u64 = 0;

        loop {
            if let Some(limit) = output_size {
                if bytes_out >= limit {
                    break;
                }
            }
            let pos_state = (bytes_out as u32 & pos_mask) as usize;
            let state_idx = state.index();

            if rc.decode_bit(&mut self.model.is_match[state_idx][pos_state])? == 0 {
                let prev_byte = if bytes_out == 0 && train_size == 0 {
                    0
                } else {
                    self.window.get_byte(0)
                };
                let ctx = self.model.literal.context(bytes_out as u32, prev_byte);
                let byte = if state.is_char_state() {
                    decode_literal_normal(&mut rc, &mut self.model.literal.probs[ctx])?
                } else {
                    let match_byte = self.window.get_byte(reps[0]);
                    decode_literal_matched(&mut rc, &mut self.model.literal.probs[ctx], match_byte)?
                };
                self.window.put_byte(byte, sink)?;
                bytes_out += 1;
                state.update_char();
                continue;
            }

            let len;
            if rc.decode_bit(&mut self.model.is_rep[state_idx])? == 1 {
                if rc.decode_bit(&mut self.model.is_rep_g0[state_idx])? == 0 {
                    if rc.decode_bit(&mut self.model.is_rep0_long[state_idx][pos_state])? == 0 {
                        // Short rep: one byte from rep0, no length payload.
                        if reps[0] as u64 >= train_size + bytes_out
                            || reps[0] >= self.dict_size_check
                        {
                            return Err(PackArcError::malformed(
                                bytes_out,
                                "repeated distance out of range",
                            ));
                        }
                        state.update_short_rep();
                        let byte = self.window.get_byte(reps[0]);
                        self.window.put_byte(byte, sink)?;
                        bytes_out += 1;
                        continue;
                    }
                } else {
                    // MRU promotion of rep1..rep3.
                    let dist;
                    if rc.decode_bit(&mut self.model.is_rep_g1[state_idx])? == 0 {
                        dist = reps[1];
                    } else if rc.decode_bit(&mut self.model.is_rep_g2[state_idx])? == 0 {
                        dist = reps[2];
                        reps[2] = reps[1];
                    } else {
                        dist = reps[3];
                        reps[3] = reps[2];
                        reps[2] = reps[1];
                    }
                    reps[1] = reps[0];
                    reps[0] = dist;
                }
                len = decode_length(&mut rc, &mut self.model.rep_len, pos_state)?;
                state.update_rep();
            } else {
                reps[3] = reps[2];
                reps[2] = reps[1];
                reps[1] = reps[0];
                len = decode_length(&mut rc, &mut self.model.match_len, pos_state)?;
                state.update_match();
                reps[0] = self.decode_distance(&mut rc, len)?;
                if reps[0] == END_MARKER_DISTANCE {
                    if output_size.is_some() {
                        return Err(PackArcError::malformed(
                            bytes_out,
                            "end marker inside sized stream",
                        ));
                    }
                    break;
                }
            }

            if reps[0] as u64 >= train_size + bytes_out || reps[0] >= self.dict_size_check {
                return Err(PackArcError::malformed(bytes_out, "match distance out of range"));
            }
            if let Some(limit) = output_size {
                if bytes_out + len as u64 > limit {
                    return Err(PackArcError::malformed(
                        bytes_out,
                        "match overruns declared size",
                    ));
                }
            }
            self.window.copy_block(reps[0], len, sink)?;
            bytes_out += len as u64;
        }

        self.window.flush(sink)?;
        debug!("lzma: decoded {bytes_out} bytes");
        Ok(bytes_out)
    }

    fn decode_distance<R: Read>(&mut self, rc: &mut RangeDecoder<R>, len: u32) -> Result<u32> {
        let lps = len_to_pos_state(len);
        let slot = decode_bit_tree(rc, &mut self.model.distance.slot[lps], DIST_SLOT_BITS)?;
        if slot < START_POS_MODEL_INDEX {
            return Ok(slot);
        }
        let footer_bits = (slot >> 1) - 1;
        let mut dist = (2 | (slot & 1)) << footer_bits;
        if slot < END_POS_MODEL_INDEX {
            dist += decode_bit_tree_reverse_offset(
                rc,
                &mut self.model.distance.special,
                dist as i32 - slot as i32 - 1,
                footer_bits,
            )?;
        } else {
            dist += rc.decode_direct_bits(footer_bits - ALIGN_BITS)? << ALIGN_BITS;
            dist += decode_bit_tree_reverse(rc, &mut self.model.distance.align, ALIGN_BITS)?;
        }
        Ok(dist)
    }
}

/// Decompress a complete `.lzma` stream (13-byte header + payload).
pub fn decompress<R: Read>(mut reader: R) -> Result<Vec<u8>> {
    let mut header = [0u8; 13];
    reader
        .read_exact(&mut header)
        .map_err(|e| PackArcError::from_read(e, 0))?;
    let (props, dict_size, size) = parse_header(&header)?;
    let mut decoder = LzmaDecoder::new(props, dict_size)?;
    let mut out = Vec::new();
    decoder.decode(&mut reader, &mut out, size)?;
    Ok(out)
}

/// Decompress a raw payload with out-of-band properties.
pub fn decompress_raw<R: Read>(
    mut reader: R,
    props: LzmaProperties,
    dict_size: u32,
    output_size: Option<u64>,
) -> Result<Vec<u8>> {
    let mut decoder = LzmaDecoder::new(props, dict_size)?;
    let mut out = Vec::new();
    decoder.decode(&mut reader, &mut out, output_size)?;
    Ok(out)
}
