//! Performance benchmarks for the file core hot paths.
//!
//! These benchmarks measure:
//! - Path confinement for typical, deep and hostile paths
//! - Directory listing and sorting of a populated plugins folder

use std::fs;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use panel::files::browser::{compare_names, list_directory};
use panel::files::ServerRoots;
use tempfile::TempDir;

/// Benchmark confinement of client paths.
fn bench_confine(c: &mut Criterion) {
    let mut group = c.benchmark_group("confine");
    let roots = ServerRoots::new("/data/servers").unwrap();

    group.bench_function("simple", |b| {
        b.iter(|| roots.confine(black_box("survival"), black_box("server.properties")))
    });

    group.bench_function("nested", |b| {
        b.iter(|| {
            roots.confine(
                black_box("survival"),
                black_box("world/region/../datapacks/./vanilla/data/minecraft/tags/blocks/logs.json"),
            )
        })
    });

    group.bench_function("traversal_rejected", |b| {
        b.iter(|| roots.confine(black_box("survival"), black_box("..\\..\\..\\etc/passwd")))
    });

    group.bench_function("global", |b| {
        b.iter(|| roots.confine(black_box("__global__"), black_box("creative/mc-data/ops.json")))
    });

    group.finish();
}

/// Benchmark listing a directory with mixed files and folders.
fn bench_listing(c: &mut Criterion) {
    let mut group = c.benchmark_group("listing");

    let temp_dir = TempDir::new().unwrap();
    let plugins = temp_dir.path().join("survival/mc-data/plugins");
    fs::create_dir_all(&plugins).unwrap();
    for i in 0..200 {
        fs::write(plugins.join(format!("Plugin{i:03}.jar")), [0u8; 16]).unwrap();
        if i % 4 == 0 {
            fs::create_dir_all(plugins.join(format!("plugin{i:03}"))).unwrap();
        }
    }

    let roots = ServerRoots::new(temp_dir.path()).unwrap();
    let dir = roots.confine("survival", "plugins").unwrap();

    group.throughput(Throughput::Elements(250));
    group.bench_function("plugins_250", |b| b.iter(|| list_directory(black_box(&dir))));

    group.finish();
}

/// Benchmark the name collation used for sorting.
fn bench_compare_names(c: &mut Criterion) {
    c.bench_function("compare_names", |b| {
        b.iter(|| {
            compare_names(
                black_box("WorldEdit-7.3.0.jar"),
                black_box("worldguard-7.0.9.jar"),
            )
        })
    });
}

criterion_group!(benches, bench_confine, bench_listing, bench_compare_names);
criterion_main!(benches);
