// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

use std::hint::black_box;
use std::path::PathBuf;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use testlens_core::prelude::*;

/// Build a stream of `tests` tests in one group, each with `lines` output lines
fn synthetic_stream(tests: usize, lines: usize) -> (TestCatalog, String) {
    let cases: Vec<String> = (0..tests).map(|i| format!("TestCase{i}")).collect();
    let catalog =
        TestCatalog::from_groups([("bench/pkg", cases.iter().map(String::as_str))]);

    let mut stream = String::new();
    for (i, case) in cases.iter().enumerate() {
        stream.push_str(&format!(
            r#"{{"Action":"run","Package":"bench/pkg","Test":"{case}"}}"#
        ));
        stream.push('\n');
        for n in 0..lines {
            let text = if i % 10 == 0 && n == 0 {
                "    bench_test.go:42: expected 1, got: 2\\n".to_string()
            } else {
                format!("progress line {n}\\n")
            };
            stream.push_str(&format!(
                r#"{{"Action":"output","Package":"bench/pkg","Test":"{case}","Output":"{text}"}}"#
            ));
            stream.push('\n');
        }
        let action = if i % 10 == 0 { "fail" } else { "pass" };
        stream.push_str(&format!(
            r#"{{"Action":"{action}","Package":"bench/pkg","Test":"{case}","Elapsed":0.01}}"#
        ));
        stream.push('\n');
    }
    (catalog, stream)
}

fn decoder_benchmarks(c: &mut Criterion) {
    let (_, stream) = synthetic_stream(100, 20);
    let mut group = c.benchmark_group("decoder");
    group.throughput(Throughput::Bytes(stream.len() as u64));

    group.bench_function("single_chunk", |b| {
        b.iter(|| {
            let mut decoder = StreamDecoder::new();
            black_box(decoder.feed(stream.as_bytes()).count())
        })
    });

    for chunk_size in [64usize, 4096] {
        group.bench_with_input(
            BenchmarkId::new("chunked", chunk_size),
            &chunk_size,
            |b, &size| {
                b.iter(|| {
                    let mut decoder = StreamDecoder::new();
                    let mut count = 0;
                    for chunk in stream.as_bytes().chunks(size) {
                        count += decoder.feed(chunk).count();
                    }
                    black_box(count)
                })
            },
        );
    }

    group.finish();
}

fn aggregation_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregation");

    for tests in [100usize, 1000] {
        let (catalog, stream) = synthetic_stream(tests, 10);
        group.bench_with_input(BenchmarkId::new("full_run", tests), &tests, |b, _| {
            b.iter(|| {
                let mut aggregator = Aggregator::new(
                    catalog.clone(),
                    PathBuf::from("/bench"),
                    RecordingReporter::new(),
                    MemoryLogSink::new(),
                );
                aggregator.begin_run();
                let mut decoder = StreamDecoder::new();
                aggregator.handle_batch(decoder.feed(stream.as_bytes()));
                black_box(aggregator.finish_run())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, decoder_benchmarks, aggregation_benchmarks);
criterion_main!(benches);
