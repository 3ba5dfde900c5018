//! Integration tests for `.lzma` stream compression and decompression.
//!
//! These tests drive the public API only: buffer helpers, the streaming
//! encoder/decoder pair, trained coding and error reporting.

use oxilzma::{
    EncoderOptions, HEADER_SIZE, LzmaDecoder, LzmaEncoder, LzmaHeader, LzmaLevel, MatchFinderKind,
    NoProgress, OxiLzmaError, compress, compress_stream, compress_with, decompress, decompress_stream,
};
use std::io::Cursor;

fn small_options() -> EncoderOptions {
    EncoderOptions::default().with_dict_size(1 << 16)
}

fn pseudo_random(len: usize, mut seed: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(len);
    for _ in 0..len {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        data.push((seed >> 56) as u8);
    }
    data
}

fn text_like(len: usize) -> Vec<u8> {
    let words: &[&[u8]] = &[
        b"range ", b"coder ", b"literal ", b"match ", b"distance ", b"window ", b"the ", b"of ",
        b"and ", b"state\n",
    ];
    let mut data = Vec::with_capacity(len);
    let mut seed = 7u64;
    while data.len() < len {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1);
        let word = words[(seed >> 60) as usize % words.len()];
        data.extend_from_slice(word);
    }
    data.truncate(len);
    data
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn test_roundtrip_text() {
    let data = text_like(50_000);
    let compressed = compress_with(&data, &small_options()).expect("compress failed");
    assert!(compressed.len() < data.len() / 3);
    assert_eq!(decompress(&compressed).expect("decompress failed"), data);
}

#[test]
fn test_roundtrip_random() {
    let data = pseudo_random(20_000, 0xDEAD_BEEF);
    let compressed = compress_with(&data, &small_options()).expect("compress failed");
    // Incompressible input grows only by the header and range coder overhead.
    assert!(compressed.len() < data.len() + data.len() / 50 + 64);
    assert_eq!(decompress(&compressed).expect("decompress failed"), data);
}

#[test]
fn test_roundtrip_all_byte_values() {
    let data: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    let compressed = compress_with(&data, &small_options()).unwrap();
    assert_eq!(decompress(&compressed).unwrap(), data);
}

#[test]
fn test_empty_input() {
    let compressed = compress(b"").unwrap();
    let header = LzmaHeader::parse(&compressed).unwrap();
    assert_eq!(header.uncompressed_size, Some(0));
    assert!(decompress(&compressed).unwrap().is_empty());

    let mut unknown = Vec::new();
    compress_stream(&b""[..], &mut unknown, &small_options(), None).unwrap();
    assert!(unknown.len() > compressed.len());
    let mut out = Vec::new();
    assert_eq!(decompress_stream(Cursor::new(&unknown), &mut out).unwrap(), 0);
    assert!(out.is_empty());
}

#[test]
fn test_repeated_bytes_compress_far_below_input() {
    let data = vec![0x5Au8; 100_000];
    let compressed = compress_with(&data, &small_options()).unwrap();
    assert!(
        compressed.len() < 200,
        "100 000 repeated bytes took {} bytes",
        compressed.len()
    );
    assert_eq!(decompress(&compressed).unwrap(), data);
}

#[test]
fn test_deterministic_output() {
    let data = text_like(30_000);
    for kind in [MatchFinderKind::Bt2, MatchFinderKind::Bt4] {
        let options = small_options().with_match_finder(kind);
        let first = compress_with(&data, &options).unwrap();
        let second = compress_with(&data, &options).unwrap();
        assert_eq!(first, second, "{} output differs between runs", kind);
    }
}

#[test]
fn test_bt2_roundtrip() {
    let data = text_like(40_000);
    let options = small_options().with_match_finder(MatchFinderKind::Bt2);
    let compressed = compress_with(&data, &options).unwrap();
    assert!(compressed.len() < data.len() / 3);
    assert_eq!(decompress(&compressed).unwrap(), data);
}

#[test]
fn test_all_levels_roundtrip() {
    let data = text_like(8_000);
    for level in 0..=9 {
        let options = EncoderOptions::from_level(LzmaLevel::new(level)).with_dict_size(1 << 16);
        let compressed = compress_with(&data, &options).unwrap();
        assert_eq!(
            decompress(&compressed).unwrap(),
            data,
            "level {} roundtrip failed",
            level
        );
    }
}

#[test]
fn test_literal_and_position_bits() {
    let data = text_like(10_000);
    for (lc, lp, pb) in [(0, 0, 0), (8, 0, 0), (0, 4, 4), (3, 0, 2), (4, 4, 0), (1, 2, 3)] {
        let options = small_options().with_properties(lc, lp, pb);
        let compressed = compress_with(&data, &options).unwrap();
        assert_eq!(compressed[0] as u32, (pb * 5 + lp) * 9 + lc);
        assert_eq!(
            decompress(&compressed).unwrap(),
            data,
            "lc={} lp={} pb={}",
            lc,
            lp,
            pb
        );
    }
}

#[test]
fn test_small_dictionary_long_input() {
    // Matches must never reach further back than the dictionary.
    let mut data = text_like(20_000);
    data.extend_from_slice(&data.clone());
    let options = EncoderOptions::default().with_dict_size(1 << 12);
    let compressed = compress_with(&data, &options).unwrap();
    assert_eq!(decompress(&compressed).unwrap(), data);
}

#[test]
fn test_long_period_repeats() {
    // After the first period everything is a repeat of the same distance.
    let a = pseudo_random(300, 1);
    let b = pseudo_random(300, 2);
    let mut data = Vec::new();
    for _ in 0..40 {
        data.extend_from_slice(&a);
        data.extend_from_slice(&b);
    }
    let compressed = compress_with(&data, &small_options()).unwrap();
    assert!(
        compressed.len() < 800,
        "alternating blocks took {} bytes",
        compressed.len()
    );
    assert_eq!(decompress(&compressed).unwrap(), data);
}

// ============================================================================
// Reference streams
// ============================================================================

/// `xz --format=lzma` (XZ Utils 5.8) output for [`reference_records`].
///
/// The parse uses all four rep slots, short reps and an end marker.
const XZ_RECORDS_LZMA: &[u8] = &[
    0x5D, 0x00, 0x00, 0x80, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0x00, 0x18, 0x68, 0x9B, 0x0C, 0x66, 0x25, 0x97, 0xC6, 0x5C, 0x7C,
    0xF3, 0xFC, 0x24, 0x44, 0x9A, 0x90, 0xEF, 0x8D, 0x29, 0x63, 0xF6, 0xF9,
    0xA6, 0x15, 0xF3, 0x86, 0x79, 0xD7, 0x98, 0x2E, 0x2F, 0x0E, 0x93, 0x95,
    0xCC, 0x81, 0x04, 0xC4, 0x2A, 0xEF, 0xEB, 0x64, 0x72, 0xE0, 0x78, 0x72,
    0x8D, 0xED, 0xC8, 0xD6, 0x71, 0x27, 0x2E, 0xBD, 0x90, 0x08, 0x65, 0x85,
    0x16, 0xDE, 0x44, 0xA1, 0xF8, 0xB1, 0x9F, 0x39, 0x3C, 0xF5, 0x02, 0xB3,
    0x88, 0xFC, 0x90, 0x5C, 0x43, 0x9B, 0xDE, 0xAA, 0x0D, 0xEC, 0xBB, 0xC9,
    0x3A, 0x31, 0xDA, 0x3C, 0xF0, 0xB0, 0xDE, 0x3B, 0x61, 0x3E, 0xCF, 0x3F,
    0xD1, 0xFA, 0xA4, 0x64, 0x28, 0xF4, 0x37, 0xAA, 0x62, 0xFF, 0xFF, 0xDE,
    0x9A, 0x00, 0x00,
];

fn reference_records() -> Vec<u8> {
    let animals = ["cat", "dog", "eel", "fox", "gnu"];
    let counts = ["one", "two"];
    let marks = ["x", "yy", "zzz", "w"];
    let mut text = String::new();
    for i in 0..16 {
        text.push_str(&format!(
            "{:04}|{}|{}|{}|end\n",
            i * 7 % 13,
            animals[i % 5],
            counts[i % 2],
            marks[i % 4]
        ));
    }
    text.into_bytes()
}

#[test]
fn test_decode_xz_reference_stream() {
    let header = LzmaHeader::parse(XZ_RECORDS_LZMA).unwrap();
    assert_eq!(header.dict_size, 1 << 23);
    assert_eq!(header.uncompressed_size, None);

    let expected = reference_records();
    assert_eq!(expected.len(), 316);
    assert_eq!(decompress(XZ_RECORDS_LZMA).unwrap(), expected);
}

#[test]
fn test_reference_records_roundtrip() {
    let data = reference_records();
    for kind in [MatchFinderKind::Bt2, MatchFinderKind::Bt4] {
        let options = small_options().with_match_finder(kind);
        let compressed = compress_with(&data, &options).unwrap();
        assert!(compressed.len() < data.len() / 2);
        assert_eq!(decompress(&compressed).unwrap(), data);
    }
}

// ============================================================================
// Streaming API
// ============================================================================

#[test]
fn test_stream_unknown_size_uses_end_marker() {
    let data = text_like(70_000);
    let mut compressed = Vec::new();
    let written = compress_stream(Cursor::new(&data), &mut compressed, &small_options(), None)
        .expect("compress failed");
    assert_eq!(written as usize, compressed.len());
    assert!(compressed[5..HEADER_SIZE].iter().all(|&b| b == 0xFF));

    let mut out = Vec::new();
    let produced = decompress_stream(Cursor::new(&compressed), &mut out).unwrap();
    assert_eq!(produced, data.len() as u64);
    assert_eq!(out, data);
}

#[test]
fn test_stream_known_size_with_end_marker() {
    let data = text_like(5_000);
    let options = small_options().with_end_marker(true);
    let with_marker = compress_with(&data, &options).unwrap();
    let without_marker = compress_with(&data, &small_options()).unwrap();
    assert!(with_marker.len() > without_marker.len());
    assert_eq!(decompress(&with_marker).unwrap(), data);
}

#[test]
fn test_encoder_decoder_progress() {
    let data = text_like(200_000);
    let mut compressed = Vec::new();
    let encoder = LzmaEncoder::new(Cursor::new(&data), &small_options()).unwrap();
    encoder.header(Some(data.len() as u64)).write_to(&mut compressed).unwrap();

    let mut encoder_calls = Vec::new();
    let mut on_encode = |in_size: u64, out_size: u64| -> oxilzma::Result<()> {
        encoder_calls.push((in_size, out_size));
        Ok(())
    };
    encoder
        .encode(&mut compressed, Some(data.len() as u64), &mut on_encode)
        .unwrap();
    assert!(encoder_calls.len() > 1);
    assert!(encoder_calls.windows(2).all(|w| w[0].0 <= w[1].0));
    assert_eq!(encoder_calls.last().map(|c| c.0), Some(data.len() as u64));

    let header = LzmaHeader::parse(&compressed).unwrap();
    let mut decoder = LzmaDecoder::from_header(&header).unwrap();
    let mut decoder_calls = 0;
    let mut on_decode = |_in: u64, _out: u64| -> oxilzma::Result<()> {
        decoder_calls += 1;
        Ok(())
    };
    let mut out = Vec::new();
    decoder
        .decode_with_progress(
            Cursor::new(&compressed[HEADER_SIZE..]),
            &mut out,
            header.uncompressed_size,
            &mut on_decode,
        )
        .unwrap();
    assert!(decoder_calls >= 3);
    assert_eq!(out, data);
}

#[test]
fn test_decoder_cancellation() {
    let data = text_like(200_000);
    let compressed = compress_with(&data, &small_options()).unwrap();
    let header = LzmaHeader::parse(&compressed).unwrap();
    let mut decoder = LzmaDecoder::from_header(&header).unwrap();
    let mut cancel = |_in: u64, _out: u64| -> oxilzma::Result<()> {
        Err(OxiLzmaError::invalid_parameter("progress", "cancelled"))
    };
    let mut out = Vec::new();
    let err = decoder
        .decode_with_progress(
            Cursor::new(&compressed[HEADER_SIZE..]),
            &mut out,
            header.uncompressed_size,
            &mut cancel,
        )
        .unwrap_err();
    assert!(matches!(err, OxiLzmaError::InvalidParameter { name: "progress", .. }));
}

// ============================================================================
// Trained coding
// ============================================================================

#[test]
fn test_trained_roundtrip() {
    let reference = text_like(16_000);
    let mut data = reference[4_000..12_000].to_vec();
    data.extend_from_slice(b"tail that the reference does not contain");

    let options = small_options();
    let encoder = LzmaEncoder::new(Cursor::new(&data), &options)
        .unwrap()
        .with_dictionary(&reference);
    let mut body = Vec::new();
    encoder
        .encode(&mut body, Some(data.len() as u64), &mut NoProgress)
        .unwrap();

    let plain = compress_with(&data, &options).unwrap();
    assert!(body.len() + HEADER_SIZE < plain.len());

    let mut decoder = LzmaDecoder::new(options.properties(), options.dict_size).unwrap();
    decoder.train(Cursor::new(&reference)).unwrap();
    let mut out = Vec::new();
    decoder
        .decode(Cursor::new(&body), &mut out, Some(data.len() as u64))
        .unwrap();
    assert_eq!(out, data);

    // Without the history the same body refers outside the window.
    let mut untrained = LzmaDecoder::new(options.properties(), options.dict_size).unwrap();
    let mut out = Vec::new();
    assert!(
        untrained
            .decode(Cursor::new(&body), &mut out, Some(data.len() as u64))
            .is_err()
            || out != data
    );
}

// ============================================================================
// Error handling
// ============================================================================

#[test]
fn test_truncated_stream() {
    let data = text_like(30_000);
    let compressed = compress_with(&data, &small_options()).unwrap();
    for cut in [HEADER_SIZE + 2, HEADER_SIZE + 5, compressed.len() / 2, compressed.len() * 3 / 4] {
        let err = decompress(&compressed[..cut]).unwrap_err();
        assert!(
            err.is_truncation() || matches!(err, OxiLzmaError::CorruptedData { .. }),
            "cut at {}: {:?}",
            cut,
            err
        );
    }
}

#[test]
fn test_truncated_header() {
    let compressed = compress(b"abc").unwrap();
    let err = decompress(&compressed[..HEADER_SIZE - 1]).unwrap_err();
    assert!(matches!(err, OxiLzmaError::InvalidHeader { .. }));
}

#[test]
fn test_invalid_properties_byte() {
    let mut compressed = compress(b"abc").unwrap();
    compressed[0] = 9 * 5 * 5;
    assert!(matches!(
        decompress(&compressed),
        Err(OxiLzmaError::InvalidHeader { .. })
    ));
}

#[test]
fn test_corrupted_body_is_detected() {
    let data = text_like(3_000);
    let compressed = compress_with(&data, &EncoderOptions::default().with_dict_size(1 << 12)).unwrap();
    let mut trials = 0;
    let mut errors = 0;
    for index in HEADER_SIZE..compressed.len() {
        for flip in [0x01u8, 0x80, 0xFF] {
            let mut damaged = compressed.clone();
            damaged[index] ^= flip;
            trials += 1;
            match decompress(&damaged) {
                Ok(out) => assert_eq!(out.len(), data.len()),
                Err(_) => errors += 1,
            }
        }
    }
    // a flip in the final flush bytes can go unnoticed
    assert!(
        errors * 10 >= trials * 9,
        "{} of {} damaged streams decoded without error",
        trials - errors,
        trials
    );
}

#[test]
fn test_distance_outside_history_is_corrupted() {
    let history = pseudo_random(4_000, 11);
    let options = small_options();
    let encoder = LzmaEncoder::new(Cursor::new(&history), &options)
        .unwrap()
        .with_dictionary(&history);
    let mut body = Vec::new();
    encoder
        .encode(&mut body, Some(history.len() as u64), &mut NoProgress)
        .unwrap();

    // the second symbol copies from history this decoder never saw
    let mut decoder = LzmaDecoder::new(options.properties(), options.dict_size).unwrap();
    let mut out = Vec::new();
    let err = decoder
        .decode(Cursor::new(&body), &mut out, Some(history.len() as u64))
        .unwrap_err();
    assert!(matches!(err, OxiLzmaError::CorruptedData { .. }), "{:?}", err);
}

#[test]
fn test_distance_beyond_dictionary_is_corrupted() {
    let block = pseudo_random(20_000, 5);
    let mut data = block.clone();
    data.extend_from_slice(&block);
    let mut compressed = compress_with(&data, &small_options()).unwrap();
    assert_eq!(decompress(&compressed).unwrap(), data);

    compressed[1..5].copy_from_slice(&4096u32.to_le_bytes());
    assert!(matches!(
        decompress(&compressed),
        Err(OxiLzmaError::CorruptedData { .. })
    ));
}

#[test]
fn test_huge_declared_dictionary() {
    let mut stream = vec![0x5D, 0xFF, 0xFF, 0xFF, 0xFF];
    stream.extend_from_slice(&(1u64 << 40).to_le_bytes());
    stream.extend_from_slice(&[0; 7]);
    let err = decompress(&stream).unwrap_err();
    assert!(err.is_truncation(), "{:?}", err);

    let decoder = LzmaDecoder::from_properties(&stream[..5]).unwrap();
    assert_eq!(decoder.dict_size(), u32::MAX);
}

#[test]
fn test_wrong_declared_size() {
    let data = text_like(2_000);
    let mut compressed = compress_with(&data, &small_options().with_end_marker(true)).unwrap();
    assert_eq!(decompress(&compressed).unwrap(), data);

    // A longer declared size hits the end marker first.
    compressed[5..HEADER_SIZE].copy_from_slice(&5_000u64.to_le_bytes());
    assert!(matches!(
        decompress(&compressed),
        Err(OxiLzmaError::CorruptedData { .. })
    ));
}

#[test]
fn test_encoder_rejects_invalid_options() {
    for options in [
        small_options().with_num_fast_bytes(4),
        small_options().with_num_fast_bytes(274),
        small_options().with_properties(9, 0, 0),
        small_options().with_properties(3, 5, 0),
        small_options().with_properties(3, 0, 5),
        EncoderOptions::default().with_dict_size(0),
        EncoderOptions::default().with_dict_size((1 << 30) + 1),
    ] {
        assert!(matches!(
            compress_with(b"data", &options),
            Err(OxiLzmaError::InvalidParameter { .. })
        ));
    }
}
