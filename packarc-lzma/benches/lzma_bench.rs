//! LZMA throughput benchmarks.

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use packarc_lzma::{LzmaOptions, MatchFinderKind, compress_with, decompress};
use std::hint::black_box;

fn sample_data(size: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(size);
    let words: &[&[u8]] = &[b"range ", b"coder ", b"window ", b"match ", b"finder "];
    let mut i = 0usize;
    while data.len() < size {
        data.extend_from_slice(words[i % words.len()]);
        data.push((i % 251) as u8);
        i += 1;
    }
    data.truncate(size);
    data
}

fn bench_compress(c: &mut Criterion) {
    let data = sample_data(256 * 1024);
    let mut group = c.benchmark_group("lzma_compress");
    group.throughput(Throughput::Bytes(data.len() as u64));
    for (name, mf) in [("bt4", MatchFinderKind::Bt4), ("bt2", MatchFinderKind::Bt2)] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let options = LzmaOptions {
                    dict_size: 1 << 16,
                    match_finder: mf,
                    ..Default::default()
                };
                black_box(compress_with(black_box(&data), options).unwrap())
            })
        });
    }
    group.finish();
}

fn bench_decompress(c: &mut Criterion) {
    let data = sample_data(256 * 1024);
    let packed = compress_with(&data, LzmaOptions::default()).unwrap();
    let mut group = c.benchmark_group("lzma_decompress");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("default", |b| {
        b.iter(|| black_box(decompress(black_box(&packed[..])).unwrap()))
    });
    group.finish();
}

criterion_group!(benches, bench_compress, bench_decompress);
criterion_main!(benches);
