//! Benchmarks for the hot paths of a linkage check.
//!
//! ## Class files
//! - Parsing a single class file
//! - Symbol extraction over a whole jar
//!
//! ## Classpath
//! - Reachability graph construction
//! - A full check over generated jars

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use linkage_checker::classfile::{AccessFlags, ClassBuilder, ClassInfo};
use linkage_checker::{
    CheckerConfig, ClassReferenceGraph, ClasspathBuilder, ExcludedErrors, LinkageChecker,
    SymbolReferences,
};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

// ============================================================================
// Fixture generation
// ============================================================================

/// A class that calls `calls` methods on classes of the other package.
fn generate_class(package: &str, other: &str, index: usize, calls: usize) -> ClassBuilder {
    let mut builder = ClassBuilder::new(&format!("{}.C{}", package, index))
        .field(AccessFlags::PUBLIC, "value", "I");
    for i in 0..calls {
        builder = builder
            .method(AccessFlags::PUBLIC, &format!("m{}", i), "(Ljava/lang/String;)I")
            .invokes(
                &format!("{}.C{}", other, (index + i) % 50),
                &format!("m{}", i),
                "(Ljava/lang/String;)I",
            );
    }
    builder
}

fn generate_jar(dir: &Path, package: &str, other: &str, classes: usize) -> PathBuf {
    let path = dir.join(format!("{}.jar", package));
    let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
    for index in 0..classes {
        writer
            .start_file(
                format!("{}/C{}.class", package, index),
                SimpleFileOptions::default(),
            )
            .unwrap();
        writer
            .write_all(&generate_class(package, other, index, 10).build())
            .unwrap();
    }
    writer.finish().unwrap();
    path
}

fn generate_classpath(classes: usize) -> (TempDir, Vec<PathBuf>) {
    let dir = TempDir::new().unwrap();
    let jars = vec![
        generate_jar(dir.path(), "app", "lib", classes),
        generate_jar(dir.path(), "lib", "app", classes),
    ];
    (dir, jars)
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_class_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("class_parsing");
    for calls in [1, 10, 100] {
        let bytes = generate_class("app", "lib", 0, calls).build();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", calls), &bytes, |b, bytes| {
            b.iter(|| ClassInfo::parse(black_box(bytes)).unwrap())
        });
    }
    group.finish();
}

fn bench_symbol_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("symbol_extraction");
    for classes in [10, 50] {
        let (_dir, jars) = generate_classpath(classes);
        let classpath = ClasspathBuilder::from_jars(&jars);
        group.throughput(Throughput::Elements((classes * 2) as u64));
        group.bench_with_input(
            BenchmarkId::new("extract", classes),
            &classpath,
            |b, classpath| b.iter(|| SymbolReferences::extract(&classpath.entries()).unwrap()),
        );
    }
    group.finish();
}

fn bench_reachability(c: &mut Criterion) {
    let (_dir, jars) = generate_classpath(50);
    let classpath = ClasspathBuilder::from_jars(&jars);
    let references = SymbolReferences::extract(&classpath.entries()).unwrap();
    let entry_points = &classpath.entry_points[..1];

    c.bench_function("reachability_graph", |b| {
        b.iter(|| ClassReferenceGraph::build(black_box(&references), entry_points).unwrap())
    });
}

fn bench_full_check(c: &mut Criterion) {
    let (_dir, jars) = generate_classpath(50);
    let classpath = ClasspathBuilder::from_jars(&jars);
    let config = CheckerConfig::default();

    c.bench_function("full_check_100_classes", |b| {
        b.iter(|| {
            LinkageChecker::create(&classpath, &config, ExcludedErrors::default())
                .unwrap()
                .find_linkage_problems()
                .unwrap()
        })
    });
}

criterion_group!(
    benches,
    bench_class_parsing,
    bench_symbol_extraction,
    bench_reachability,
    bench_full_check
);
criterion_main!(benches);
