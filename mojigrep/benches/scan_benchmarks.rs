#![allow(unused_must_use)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mojigrep::config::{ScanConfig, ScanOptions};
use mojigrep::engine::run_scan;
use mojigrep::results::ReportHeader;
use mojigrep::sink::OutputSink;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::{fs::File, io::Write};
use tempfile::tempdir;

fn create_test_files(
    dir: &tempfile::TempDir,
    file_count: usize,
    lines_per_file: usize,
) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(file_count);
    for i in 0..file_count {
        let file_path = dir.path().join(format!("bench_{i}.txt"));
        let mut file = File::create(&file_path)?;
        for j in 0..lines_per_file {
            writeln!(
                file,
                "line {j} with ERROR code {i} and some filler text to scan past"
            )?;
        }
        paths.push(file_path);
    }
    Ok(paths)
}

fn create_config(pattern: &str, threads: usize) -> ScanConfig {
    ScanOptions {
        pattern: pattern.to_string(),
        parallelism: NonZeroUsize::new(threads).unwrap(),
        quiet: true,
        ..Default::default()
    }
    .into_config()
    .unwrap()
}

fn run_once(files: &[PathBuf], config: &ScanConfig) -> usize {
    let out = tempdir().unwrap();
    let mut sink = OutputSink::create(&out.path().join("result.txt")).unwrap();
    let summary = run_scan(files, config, &ReportHeader::default(), &sink, None, None).unwrap();
    sink.close().unwrap();
    summary.total_matches
}

fn bench_parallelism(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let files = create_test_files(&dir, 64, 200).unwrap();

    let mut group = c.benchmark_group("Parallelism");
    for threads in [1usize, 2, 4, 8] {
        let config = create_config("ERROR", threads);
        group.bench_function(format!("threads_{threads}"), |b| {
            b.iter(|| black_box(run_once(&files, &config)));
        });
    }
    group.finish();
}

fn bench_pattern_kinds(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let files = create_test_files(&dir, 16, 200).unwrap();

    let mut group = c.benchmark_group("Pattern");
    let literal = create_config("ERROR", 4);
    group.bench_function("literal", |b| {
        b.iter(|| black_box(run_once(&files, &literal)));
    });

    let regex = ScanOptions {
        pattern: r"ERROR code \d+".to_string(),
        use_regex: true,
        parallelism: NonZeroUsize::new(4).unwrap(),
        quiet: true,
        ..Default::default()
    }
    .into_config()
    .unwrap();
    group.bench_function("regex", |b| {
        b.iter(|| black_box(run_once(&files, &regex)));
    });
    group.finish();
}

fn bench_encoding_detection(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let mut paths = Vec::new();
    for i in 0..16 {
        let path = dir.path().join(format!("ja_{i}.txt"));
        let mut file = File::create(&path).unwrap();
        for j in 0..200 {
            writeln!(file, "日本語のログ行 {j} に ERROR が含まれます").unwrap();
        }
        paths.push(path);
    }

    let config = create_config("ERROR", 4);
    c.bench_function("utf8_japanese_auto_detect", |b| {
        b.iter(|| black_box(run_once(&paths, &config)));
    });
}

criterion_group!(
    benches,
    bench_parallelism,
    bench_pattern_kinds,
    bench_encoding_detection
);
criterion_main!(benches);
