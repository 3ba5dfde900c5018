//! LZMA decompression.
//!
//! The decoder mirrors the encoder's contexts symbol by symbol and rebuilds
//! the output in an [`OutWindow`] that streams to the sink as it wraps.
//!
//! A stream ends either after the declared number of bytes or, when the
//! size is unknown, at the end marker (a match with distance `0xFFFF_FFFF`).

use crate::header::LzmaHeader;
use crate::model::{
    END_MARKER_DISTANCE, END_POS_MODEL_INDEX, LzmaModel, LzmaProperties, MATCH_MIN_LEN,
    NUM_ALIGN_BITS, NUM_POS_SLOT_BITS, NUM_REP_DISTANCES, START_POS_MODEL_INDEX, State,
    len_to_pos_state, push_rep, rotate_reps,
};
use crate::out_window::OutWindow;
use crate::range_coder::RangeDecoder;
use log::debug;
use oxilzma_core::error::{OxiLzmaError, Result};
use oxilzma_core::progress::{CodeProgress, NoProgress};
use std::io::{Read, Write};

/// Smallest output window, whatever the dictionary size.
const MIN_WINDOW_SIZE: u32 = 1 << 12;

/// Output bytes between two progress reports.
const PROGRESS_INTERVAL: u64 = 1 << 16;

/// LZMA decoder.
///
/// Can be reused for several streams with the same properties. History is
/// kept across streams only when [`LzmaDecoder::train`] was called before.
#[derive(Debug)]
pub struct LzmaDecoder {
    model: LzmaModel,
    window: OutWindow,
    dict_size: u32,
    /// Largest valid distance plus one.
    dict_size_check: u32,
    pos_state_mask: u32,
    /// Keep the window contents at the next `decode`.
    solid: bool,
}

impl LzmaDecoder {
    /// Create a decoder for the given properties and dictionary size.
    pub fn new(props: LzmaProperties, dict_size: u32) -> Result<Self> {
        props.validate_for_decoding()?;
        let dict_size_check = dict_size.max(1);

        debug!(
            "lzma decoder: lc={} lp={} pb={}, dict {} bytes",
            props.lc, props.lp, props.pb, dict_size
        );

        Ok(Self {
            model: LzmaModel::new(props),
            window: OutWindow::new(dict_size_check.max(MIN_WINDOW_SIZE)),
            dict_size,
            dict_size_check,
            pos_state_mask: props.pos_mask(),
            solid: false,
        })
    }

    /// Create a decoder from a parsed header.
    pub fn from_header(header: &LzmaHeader) -> Result<Self> {
        Self::new(header.props, header.dict_size)
    }

    /// Create a decoder from the 5 coder property bytes.
    pub fn from_properties(bytes: &[u8]) -> Result<Self> {
        let (props, dict_size) = LzmaHeader::parse_properties(bytes)?;
        Self::new(props, dict_size)
    }

    /// Literal and position bits.
    pub fn properties(&self) -> LzmaProperties {
        self.model.props
    }

    /// Dictionary size from the stream properties.
    pub fn dict_size(&self) -> u32 {
        self.dict_size
    }

    /// Pre-seed the history with the tail of `reader`.
    ///
    /// The next stream may refer back into these bytes; they are not part of
    /// the output. Returns the number of bytes kept.
    pub fn train<R: Read>(&mut self, mut reader: R) -> Result<u32> {
        let kept = self.window.train(&mut reader)?;
        self.solid = true;
        debug!("lzma decoder: trained on {} bytes", kept);
        Ok(kept)
    }

    /// Decode one stream body into `writer`.
    ///
    /// `size` is the declared uncompressed size; `None` means the stream
    /// ends with an end marker. Returns the number of bytes written.
    pub fn decode<R: Read, W: Write>(
        &mut self,
        reader: R,
        writer: &mut W,
        size: Option<u64>,
    ) -> Result<u64> {
        self.decode_with_progress(reader, writer, size, &mut NoProgress)
    }

    /// [`LzmaDecoder::decode`] with a progress callback, called every
    /// 64 KiB of output with `(compressed bytes read, bytes written)`.
    pub fn decode_with_progress<R: Read, W: Write, P: CodeProgress>(
        &mut self,
        reader: R,
        writer: &mut W,
        size: Option<u64>,
        progress: &mut P,
    ) -> Result<u64> {
        if !std::mem::take(&mut self.solid) {
            self.window.reset();
        }
        self.model.reset();

        let mut rd = RangeDecoder::new(reader)?;
        let mut state = State::new();
        let mut reps = [0u32; NUM_REP_DISTANCES];
        let train_size = self.window.train_size() as u64;
        let limit = size.unwrap_or(u64::MAX);
        let mut now_pos = 0u64;
        let mut next_report = PROGRESS_INTERVAL;
        let mut end_marker = false;

        while now_pos < limit {
            let pos_state = (now_pos as u32 & self.pos_state_mask) as usize;
            let st = state.value();

            if rd.decode_bit(&mut self.model.is_match[st][pos_state])? == 0 {
                // the first literal never looks at trained history
                let prev_byte = if now_pos == 0 {
                    0
                } else {
                    self.window.get_byte(0)
                };
                let lit_state = self.model.literal.get_state(now_pos as u32, prev_byte);
                let byte = if state.is_literal() {
                    self.model.literal.decode(&mut rd, lit_state)?
                } else {
                    let match_byte = self.window.get_byte(reps[0]);
                    self.model
                        .literal
                        .decode_matched(&mut rd, lit_state, match_byte)?
                };
                self.window.put_byte(byte, writer)?;
                state.update_literal();
                now_pos += 1;
            } else {
                let len;
                if rd.decode_bit(&mut self.model.is_rep[st])? == 1 {
                    if now_pos == 0 {
                        return Err(OxiLzmaError::corrupted(
                            rd.position(),
                            "stream starts with a rep match",
                        ));
                    }
                    let rep_index = if rd.decode_bit(&mut self.model.is_rep_g0[st])? == 0 {
                        if rd.decode_bit(&mut self.model.is_rep0_long[st][pos_state])? == 0 {
                            state.update_short_rep();
                            let byte = self.window.get_byte(reps[0]);
                            self.window.put_byte(byte, writer)?;
                            now_pos += 1;
                            continue;
                        }
                        0
                    } else if rd.decode_bit(&mut self.model.is_rep_g1[st])? == 0 {
                        1
                    } else if rd.decode_bit(&mut self.model.is_rep_g2[st])? == 0 {
                        2
                    } else {
                        3
                    };
                    rotate_reps(&mut reps, rep_index);
                    len = self.model.rep_len.decode(&mut rd, pos_state)? + MATCH_MIN_LEN;
                    state.update_long_rep();
                } else {
                    len = self.model.match_len.decode(&mut rd, pos_state)? + MATCH_MIN_LEN;
                    state.update_match();
                    let distance = self.decode_distance(&mut rd, len)?;
                    if distance == END_MARKER_DISTANCE {
                        end_marker = true;
                        break;
                    }
                    if now_pos == 0 {
                        return Err(OxiLzmaError::corrupted(
                            rd.position(),
                            "stream starts with a match",
                        ));
                    }
                    push_rep(&mut reps, distance);
                }

                let rep0 = reps[0];
                if rep0 as u64 >= train_size + now_pos || rep0 >= self.dict_size_check {
                    return Err(OxiLzmaError::corrupted(
                        rd.position(),
                        format!(
                            "match distance {} at output position {} is out of range",
                            rep0 as u64 + 1,
                            now_pos
                        ),
                    ));
                }
                if now_pos + len as u64 > limit {
                    return Err(OxiLzmaError::corrupted(
                        rd.position(),
                        format!("match of {} bytes runs past the declared size", len),
                    ));
                }

                self.window.copy_block(rep0, len, writer)?;
                now_pos += len as u64;
            }

            if now_pos >= next_report {
                progress.set_progress(rd.position(), now_pos)?;
                next_report = now_pos + PROGRESS_INTERVAL;
            }
        }

        if end_marker {
            if let Some(expected) = size {
                return Err(OxiLzmaError::corrupted(
                    rd.position(),
                    format!(
                        "end marker after {} of {} declared bytes",
                        now_pos, expected
                    ),
                ));
            }
            if !rd.is_finished_ok() {
                return Err(OxiLzmaError::corrupted(
                    rd.position(),
                    "range coder not finished after the end marker",
                ));
            }
        }

        self.window.flush(writer)?;
        progress.set_progress(rd.position(), now_pos)?;

        debug!(
            "lzma decoder: {} -> {} bytes, {}, window {} bytes",
            rd.position(),
            now_pos,
            if end_marker {
                "end marker"
            } else {
                "declared size reached"
            },
            self.window.allocated()
        );
        Ok(now_pos)
    }

    /// Decode a zero-based match distance for a match of `len` bytes.
    fn decode_distance<R: Read>(&mut self, rd: &mut RangeDecoder<R>, len: u32) -> Result<u32> {
        let pos_slot = rd.decode_bit_tree(
            &mut self.model.pos_slot[len_to_pos_state(len)],
            NUM_POS_SLOT_BITS,
        )?;
        if pos_slot < START_POS_MODEL_INDEX {
            return Ok(pos_slot);
        }

        let num_direct_bits = (pos_slot >> 1) - 1;
        let mut distance = (2 | (pos_slot & 1)) << num_direct_bits;
        if pos_slot < END_POS_MODEL_INDEX {
            distance += rd.decode_bit_tree_reverse(
                &mut self.model.pos_special[(distance - pos_slot) as usize..],
                num_direct_bits,
            )?;
        } else {
            distance += rd.decode_direct_bits(num_direct_bits - NUM_ALIGN_BITS)? << NUM_ALIGN_BITS;
            distance += rd.decode_bit_tree_reverse(&mut self.model.align, NUM_ALIGN_BITS)?;
        }
        Ok(distance)
    }
}

/// Decompress a `.lzma` stream (header and body) from `reader` into `writer`.
///
/// Returns the number of bytes written.
pub fn decompress_stream<R: Read, W: Write>(mut reader: R, writer: &mut W) -> Result<u64> {
    let header = LzmaHeader::read_from(&mut reader)?;
    debug!(
        "lzma header: props {:#04x}, dict {}, size {:?}",
        header.props.to_byte(),
        header.dict_size,
        header.uncompressed_size
    );
    let mut decoder = LzmaDecoder::from_header(&header)?;
    decoder.decode(reader, writer, header.uncompressed_size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::LzmaEncoder;
    use crate::options::EncoderOptions;
    use std::io::Cursor;

    fn encode(data: &[u8], options: &EncoderOptions, size: Option<u64>) -> Vec<u8> {
        let encoder = LzmaEncoder::new(Cursor::new(data.to_vec()), options).unwrap();
        let mut out = Vec::new();
        encoder.encode(&mut out, size, &mut NoProgress).unwrap();
        out
    }

    fn decoder(options: &EncoderOptions) -> LzmaDecoder {
        LzmaDecoder::new(options.properties(), options.dict_size).unwrap()
    }

    #[test]
    fn test_roundtrip_known_size() {
        let data = b"Hello, World! Hello, World! Hello, LZMA!".repeat(20);
        let options = EncoderOptions::default().with_dict_size(1 << 16);
        let body = encode(&data, &options, Some(data.len() as u64));

        let mut out = Vec::new();
        let n = decoder(&options)
            .decode(Cursor::new(body), &mut out, Some(data.len() as u64))
            .unwrap();
        assert_eq!(n, data.len() as u64);
        assert_eq!(out, data);
    }

    #[test]
    fn test_roundtrip_end_marker() {
        let data: Vec<u8> = (0..30_000u32).map(|i| (i / 7 % 256) as u8).collect();
        let options = EncoderOptions::default().with_dict_size(1 << 16);
        let body = encode(&data, &options, None);

        let mut out = Vec::new();
        decoder(&options)
            .decode(Cursor::new(body), &mut out, None)
            .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_empty_with_end_marker() {
        let options = EncoderOptions::default();
        let body = encode(&[], &options, None);
        let mut out = Vec::new();
        assert_eq!(
            decoder(&options)
                .decode(Cursor::new(body), &mut out, None)
                .unwrap(),
            0
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_end_marker_before_declared_size() {
        let data = b"short".to_vec();
        let options = EncoderOptions::default();
        let body = encode(&data, &options, None);
        let err = decoder(&options)
            .decode(Cursor::new(body), &mut Vec::new(), Some(10))
            .unwrap_err();
        assert!(matches!(err, OxiLzmaError::CorruptedData { .. }));
    }

    #[test]
    fn test_truncated_body() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i * 13 % 256) as u8).collect();
        let options = EncoderOptions::default().with_dict_size(1 << 16);
        let body = encode(&data, &options, Some(data.len() as u64));
        let cut = &body[..body.len() / 2];
        let err = decoder(&options)
            .decode(Cursor::new(cut.to_vec()), &mut Vec::new(), Some(data.len() as u64))
            .unwrap_err();
        assert!(err.is_truncation());
    }

    #[test]
    fn test_bad_start_byte() {
        let options = EncoderOptions::default();
        let err = decoder(&options)
            .decode(Cursor::new(vec![1, 0, 0, 0, 0, 0]), &mut Vec::new(), Some(1))
            .unwrap_err();
        assert!(matches!(err, OxiLzmaError::CorruptedData { .. }));
    }

    #[test]
    fn test_distance_beyond_output_is_caught() {
        // The same body decoded with a smaller dictionary must fail, never
        // read outside the history.
        let mut data: Vec<u8> = (0..3000u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 24) as u8).collect();
        let prefix = data[..100].to_vec();
        data.extend_from_slice(&prefix);
        let options = EncoderOptions::default().with_dict_size(1 << 16);
        let body = encode(&data, &options, Some(data.len() as u64));

        let mut small = LzmaDecoder::new(options.properties(), 1000).unwrap();
        let err = small
            .decode(Cursor::new(body), &mut Vec::new(), Some(data.len() as u64))
            .unwrap_err();
        assert!(matches!(err, OxiLzmaError::CorruptedData { .. }));
    }

    #[test]
    fn test_trained_roundtrip() {
        let reference = b"The quick brown fox jumps over the lazy dog. ".repeat(30);
        let data = b"The quick brown fox jumps over the lazy cat.".to_vec();
        let options = EncoderOptions::default().with_dict_size(1 << 16);

        let encoder = LzmaEncoder::new(Cursor::new(data.clone()), &options)
            .unwrap()
            .with_dictionary(&reference);
        let mut trained_body = Vec::new();
        encoder
            .encode(&mut trained_body, Some(data.len() as u64), &mut NoProgress)
            .unwrap();
        let plain_body = encode(&data, &options, Some(data.len() as u64));
        assert!(trained_body.len() < plain_body.len());

        let mut dec = decoder(&options);
        assert_eq!(dec.train(Cursor::new(reference)).unwrap(), 1350);
        let mut out = Vec::new();
        dec.decode(Cursor::new(trained_body), &mut out, Some(data.len() as u64))
            .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_decoder_reuse_resets_history() {
        let options = EncoderOptions::default().with_dict_size(1 << 16);
        let mut dec = decoder(&options);
        for data in [b"first stream first".to_vec(), b"second".to_vec()] {
            let body = encode(&data, &options, Some(data.len() as u64));
            let mut out = Vec::new();
            dec.decode(Cursor::new(body), &mut out, Some(data.len() as u64))
                .unwrap();
            assert_eq!(out, data);
        }
    }

    #[test]
    fn test_decompress_stream() {
        let data = b"streaming through a header".to_vec();
        let mut packed = Vec::new();
        crate::encoder::compress_stream(
            Cursor::new(data.clone()),
            &mut packed,
            &EncoderOptions::default(),
            None,
        )
        .unwrap();
        let mut out = Vec::new();
        let n = decompress_stream(Cursor::new(packed), &mut out).unwrap();
        assert_eq!(n, data.len() as u64);
        assert_eq!(out, data);
    }

    #[test]
    fn test_rejects_bad_properties() {
        assert!(LzmaDecoder::new(LzmaProperties::new(9, 0, 2), 1 << 16).is_err());
        assert!(LzmaDecoder::new(LzmaProperties::new(3, 0, 5), 1 << 16).is_err());
        assert!(LzmaDecoder::from_properties(&[0x5D, 0, 0]).is_err());
        let dec = LzmaDecoder::from_properties(&[0x5D, 0, 0, 1, 0]).unwrap();
        assert_eq!(dec.dict_size(), 1 << 16);
        assert_eq!(dec.properties(), LzmaProperties::default());
    }
}
