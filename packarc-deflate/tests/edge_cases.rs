//! Edge-case coverage for the DEFLATE codec.

use packarc_core::error::PackArcError;
use packarc_deflate::{deflate, inflate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn level_grid_roundtrip() {
    let samples: Vec<Vec<u8>> = vec![
        Vec::new(),
        vec![0x42],
        b"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_vec(),
        b"the rain in spain stays mainly in the plain".repeat(50),
        (0..u8::MAX).collect(),
    ];
    for data in &samples {
        for level in [0u8, 1, 6, 9] {
            let packed = deflate(data, level).unwrap();
            assert_eq!(&inflate(&packed).unwrap(), data, "level {level}");
        }
    }
}

#[test]
fn incompressible_random_roundtrip() {
    let mut rng = StdRng::seed_from_u64(99);
    let data: Vec<u8> = (0..256 * 1024).map(|_| rng.r#gen()).collect();
    let packed = deflate(&data, 6).unwrap();
    // Stored blocks bound the expansion to the per-block header overhead.
    assert!(packed.len() <= data.len() + data.len() / 65535 * 5 + 16);
    assert_eq!(inflate(&packed).unwrap(), data);
}

#[test]
fn window_spanning_matches_roundtrip() {
    // Repeat a page-sized pattern so matches reach far back but stay
    // within the 32 KiB window.
    let page: Vec<u8> = (0..4096u32).map(|i| (i * 31 % 251) as u8).collect();
    let mut data = Vec::new();
    for _ in 0..24 {
        data.extend_from_slice(&page);
    }
    let packed = deflate(&data, 9).unwrap();
    assert!(packed.len() * 4 < data.len());
    assert_eq!(inflate(&packed).unwrap(), data);
}

#[test]
fn corrupt_stream_reports_malformed() {
    let data = b"some context so the stream has structure".repeat(10);
    let mut packed = deflate(&data, 6).unwrap();
    // Truncation.
    let err = inflate(&packed[..packed.len() / 2]).err().unwrap();
    assert!(matches!(err, PackArcError::Malformed { .. }));
    // Bit flip in the header area.
    packed[0] ^= 0x02;
    assert!(inflate(&packed).is_err() || inflate(&packed).unwrap() != data);
}

#[test]
fn maximum_length_matches() {
    // Runs longer than 258 force back-to-back maximum-length matches.
    let data = vec![b'q'; 3000];
    let packed = deflate(&data, 6).unwrap();
    assert!(packed.len() < 64);
    assert_eq!(inflate(&packed).unwrap(), data);
}
