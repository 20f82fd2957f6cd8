//! End-to-end round-trip coverage for the LZMA codec.

use packarc_core::error::PackArcError;
use packarc_lzma::{LzmaDecoder, LzmaOptions, MatchFinderKind, compress, compress_with, decompress, parse_header};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn roundtrip(data: &[u8], options: LzmaOptions) -> usize {
    let packed = compress_with(data, options.clone()).unwrap();
    let unpacked = decompress(&packed[..]).unwrap();
    assert_eq!(unpacked, data, "round trip failed for {options:?}");
    packed.len()
}

fn sample_text() -> Vec<u8> {
    let mut data = Vec::new();
    for i in 0..400 {
        data.extend_from_slice(b"the quick brown fox jumps over the lazy dog ");
        data.extend_from_slice(format!("{i} ").as_bytes());
        if i % 3 == 0 {
            data.extend_from_slice(b"pack my box with five dozen liquor jugs ");
        }
    }
    data
}

#[test]
fn configuration_grid_round_trips() {
    let data = sample_text();
    for &lc in &[0u32, 3, 8] {
        for &lp in &[0u32, 2, 4] {
            for &pb in &[0u32, 2, 4] {
                for &dict_size in &[1u32 << 12, 1 << 16, 1 << 22] {
                    for &match_finder in &[MatchFinderKind::Bt2, MatchFinderKind::Bt4] {
                        roundtrip(
                            &data,
                            LzmaOptions {
                                dict_size,
                                lc,
                                lp,
                                pb,
                                match_finder,
                                ..Default::default()
                            },
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn nice_len_extremes_round_trip() {
    let data = sample_text();
    for &nice_len in &[5u32, 16, 273] {
        roundtrip(
            &data,
            LzmaOptions {
                nice_len,
                dict_size: 1 << 16,
                ..Default::default()
            },
        );
    }
}

#[test]
fn input_straddling_dictionary_size_round_trips() {
    let dict_size = 1u32 << 12;
    let mut rng = StdRng::seed_from_u64(7);
    // Mildly compressible data, exactly at and just past the window size.
    for extra in [0usize, 1] {
        let data: Vec<u8> = (0..dict_size as usize + extra)
            .map(|_| b"abcdefgh"[rng.gen_range(0..8)])
            .collect();
        roundtrip(
            &data,
            LzmaOptions {
                dict_size,
                ..Default::default()
            },
        );
    }
}

#[test]
fn incompressible_expansion_is_bounded() {
    let mut rng = StdRng::seed_from_u64(42);
    let data: Vec<u8> = (0..1 << 20).map(|_| rng.r#gen()).collect();
    let packed = compress(&data).unwrap();
    assert!(
        packed.len() <= data.len() + data.len().div_ceil(20),
        "expanded to {} bytes",
        packed.len()
    );
    assert_eq!(decompress(&packed[..]).unwrap(), data);
}

#[test]
fn fibonacci_bytes_round_trip() {
    // First 1024 bytes of F_i mod 256 under the degenerate (0,0,0) config.
    let mut data = vec![0u8; 1024];
    data[1] = 1;
    for i in 2..1024 {
        data[i] = data[i - 1].wrapping_add(data[i - 2]);
    }
    roundtrip(
        &data,
        LzmaOptions {
            lc: 0,
            lp: 0,
            pb: 0,
            dict_size: 0x400,
            ..Default::default()
        },
    );
}

#[test]
fn empty_stream_layout_and_decode() {
    let packed = compress_with(
        b"",
        LzmaOptions {
            dict_size: 0x1000,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(packed.len() >= 13);
    assert_eq!(packed[0], 0x5D);
    assert_eq!(&packed[1..5], &0x1000u32.to_le_bytes());
    assert!(decompress(&packed[..]).unwrap().is_empty());
}

#[test]
fn repeated_byte_compresses_hard() {
    let data = vec![0x41u8; 1024];
    let packed = compress_with(
        &data,
        LzmaOptions {
            dict_size: 0x10000,
            ..Default::default()
        },
    )
    .unwrap();
    assert!(packed.len() <= 40, "got {} bytes", packed.len());
    assert_eq!(decompress(&packed[..]).unwrap(), data);
}

#[test]
fn unknown_size_header_decodes_to_end_marker() {
    let data = b"unknown size stream, unknown size stream";
    let mut encoder = packarc_lzma::LzmaEncoder::new(LzmaOptions {
        dict_size: 1 << 16,
        ..Default::default()
    })
    .unwrap();
    let mut packed = Vec::new();
    encoder.encode(&mut &data[..], &mut packed, None).unwrap();

    // Header: 5D 00 00 01 00 then eight 0xFF size bytes.
    assert_eq!(packed[0], 0x5D);
    assert_eq!(&packed[5..13], &[0xFF; 8]);
    assert_eq!(decompress(&packed[..]).unwrap(), data);
}

#[test]
fn zero_dictionary_header_is_coerced() {
    // A zero dictionary size is legal in the header; the decoder checks
    // distances against max(dict, 1), so a literal-only stream decodes.
    let data = b"ab";
    let mut packed = compress(data).unwrap();
    packed[1..5].copy_from_slice(&0u32.to_le_bytes());
    assert_eq!(decompress(&packed[..]).unwrap(), data);
}

#[test]
fn truncation_of_any_tail_byte_is_malformed() {
    let data = sample_text();
    let packed = compress(&data).unwrap();
    for cut in 1..=4 {
        let err = decompress(&packed[..packed.len() - cut]).err().unwrap();
        assert!(matches!(err, PackArcError::Malformed { .. }), "cut {cut}: {err:?}");
    }
}

#[test]
fn properties_flip_never_silently_matches() {
    let data = sample_text();
    let mut packed = compress(&data).unwrap();
    packed[0] ^= 1;
    let header: [u8; 13] = packed[..13].try_into().unwrap();
    match parse_header(&header) {
        Err(_) => {}
        Ok(_) => match decompress(&packed[..]) {
            Err(_) => {}
            Ok(decoded) => assert_ne!(decoded, data, "flipped properties silently matched"),
        },
    }
}

#[test]
fn streaming_decode_into_sink() {
    let data = sample_text();
    let packed = compress(&data).unwrap();

    let header: [u8; 13] = packed[..13].try_into().unwrap();
    let (props, dict_size, size) = parse_header(&header).unwrap();
    let mut decoder = LzmaDecoder::new(props, dict_size).unwrap();
    let mut sink = Vec::new();
    let n = decoder.decode(&mut &packed[13..], &mut sink, size).unwrap();
    assert_eq!(n as usize, data.len());
    assert_eq!(sink, data);
}

#[test]
fn progress_reports_reach_completion() {
    let data = vec![0xA5u8; 64 * 1024];
    let mut encoder = packarc_lzma::LzmaEncoder::new(LzmaOptions::default()).unwrap();
    let mut packed = Vec::new();
    let mut fractions = Vec::new();
    encoder
        .encode_with_progress(
            &mut &data[..],
            &mut packed,
            Some(data.len() as u64),
            &mut |fraction: f32, _label: &str| fractions.push(fraction),
        )
        .unwrap();
    assert!(!fractions.is_empty());
    assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*fractions.last().unwrap(), 1.0);
    assert_eq!(decompress(&packed[..]).unwrap(), data);
}
