//! Property-based tests using proptest.
//!
//! Any input must survive a compress/decompress round trip under any valid
//! combination of coder properties, and headers must survive serialization.

use oxilzma::{
    EncoderOptions, LzmaHeader, LzmaProperties, MatchFinderKind, compress_stream, compress_with,
    decompress, decompress_stream,
};
use proptest::prelude::*;
use std::io::Cursor;

/// Inputs with a mix of literal runs and copies of earlier bytes.
fn repetitive_bytes() -> impl Strategy<Value = Vec<u8>> {
    proptest::collection::vec((any::<u8>(), 1usize..40, 0usize..64), 0..60).prop_map(|parts| {
        let mut data = Vec::new();
        for (byte, run, back) in parts {
            if back > 0 && back <= data.len() {
                let start = data.len() - back;
                for i in 0..run {
                    let b = data[start + i % back];
                    data.push(b);
                }
            } else {
                data.extend(std::iter::repeat_n(byte, run));
            }
        }
        data
    })
}

fn match_finder() -> impl Strategy<Value = MatchFinderKind> {
    prop_oneof![Just(MatchFinderKind::Bt2), Just(MatchFinderKind::Bt4)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Arbitrary bytes round-trip with default properties.
    #[test]
    fn roundtrip_arbitrary(data in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let options = EncoderOptions::default().with_dict_size(1 << 16);
        let compressed = compress_with(&data, &options).unwrap();
        prop_assert_eq!(decompress(&compressed).unwrap(), data);
    }

    /// Repetitive data round-trips for every property and match finder choice.
    #[test]
    fn roundtrip_any_properties(
        data in repetitive_bytes(),
        lc in 0u32..=8,
        lp in 0u32..=4,
        pb in 0u32..=4,
        fast_bytes in 5u32..=273,
        kind in match_finder(),
    ) {
        let options = EncoderOptions::default()
            .with_dict_size(1 << 16)
            .with_properties(lc, lp, pb)
            .with_num_fast_bytes(fast_bytes)
            .with_match_finder(kind);
        let compressed = compress_with(&data, &options).unwrap();
        prop_assert_eq!(decompress(&compressed).unwrap(), data);
    }

    /// Streams of unknown length end with a marker and decode to the input.
    #[test]
    fn roundtrip_unknown_size(data in repetitive_bytes()) {
        let options = EncoderOptions::default().with_dict_size(1 << 16);
        let mut compressed = Vec::new();
        compress_stream(Cursor::new(&data), &mut compressed, &options, None).unwrap();
        let mut out = Vec::new();
        decompress_stream(Cursor::new(&compressed), &mut out).unwrap();
        prop_assert_eq!(out, data);
    }

    /// Decoding arbitrary garbage after a valid header never panics.
    #[test]
    fn garbage_body_is_rejected_or_bounded(body in proptest::collection::vec(any::<u8>(), 0..512)) {
        let header = LzmaHeader::new(LzmaProperties::default(), 1 << 12, Some(2048));
        let mut stream = header.to_bytes().to_vec();
        stream.extend_from_slice(&body);
        if let Ok(out) = decompress(&stream) {
            prop_assert_eq!(out.len(), 2048);
        }
    }

    /// Headers round-trip for all valid properties and dictionary sizes.
    #[test]
    fn header_roundtrip(
        lc in 0u32..=8,
        lp in 0u32..=4,
        pb in 0u32..=4,
        dict_size in any::<u32>(),
        size in proptest::option::of(0u64..u64::MAX),
    ) {
        let header = LzmaHeader::new(LzmaProperties::new(lc, lp, pb), dict_size, size);
        let bytes = header.to_bytes();
        prop_assert_eq!(bytes[0] as u32, (pb * 5 + lp) * 9 + lc);
        prop_assert_eq!(LzmaHeader::parse(&bytes).unwrap(), header);
    }
}
