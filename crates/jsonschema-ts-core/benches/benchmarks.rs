//! Criterion benchmarks for the schema → TypeScript pipeline.
//!
//! Fixtures are pre-parsed outside the benchmark loop so that only
//! compilation is measured, not JSON parsing or file I/O.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::Value;
use std::fs;
use std::path::Path;

use jsonschema_ts_core::{compile, formatter, generator, optimizer, parser, resolver, CompileOptions};

/// Load and parse a fixture schema from the shared test fixtures directory.
fn load_fixture(name: &str) -> Value {
    let fixtures_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../../tests/schemas");
    let path = Path::new(fixtures_dir).join(name);
    let content = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", path.display(), e));
    serde_json::from_str(&content)
        .unwrap_or_else(|e| panic!("Failed to parse fixture {}: {}", path.display(), e))
}

fn bench_compile_simple(c: &mut Criterion) {
    let schema = load_fixture("simple.json");
    let options = CompileOptions::default();

    c.bench_function("compile/simple", |b| {
        b.iter(|| compile(black_box(&schema), "Simple", black_box(&options)).unwrap())
    });
}

fn bench_compile_kitchen_sink(c: &mut Criterion) {
    let schema = load_fixture("kitchen_sink.json");
    let options = CompileOptions::default();

    c.bench_function("compile/kitchen_sink", |b| {
        b.iter(|| compile(black_box(&schema), "KitchenSink", black_box(&options)).unwrap())
    });
}

fn bench_compile_recursive(c: &mut Criterion) {
    let schema = load_fixture("recursive.json");
    let options = CompileOptions::default();

    c.bench_function("compile/recursive", |b| {
        b.iter(|| compile(black_box(&schema), "Recursive", black_box(&options)).unwrap())
    });
}

fn bench_stages_kitchen_sink(c: &mut Criterion) {
    let schema = load_fixture("kitchen_sink.json");
    let options = CompileOptions::default();

    // Pre-run the earlier stages so each benchmark isolates one stage
    let graph = resolver::dereference(&schema, None, &options).unwrap();
    let ast = parser::parse(&graph, "KitchenSink", &options).unwrap();
    let optimized = optimizer::optimize(&ast, &options);
    let text = generator::generate(&optimized, &options).unwrap();

    c.bench_function("stage/parse", |b| {
        b.iter(|| parser::parse(black_box(&graph), "KitchenSink", &options).unwrap())
    });
    c.bench_function("stage/optimize", |b| {
        b.iter(|| optimizer::optimize(black_box(&ast), &options))
    });
    c.bench_function("stage/generate", |b| {
        b.iter(|| generator::generate(black_box(&optimized), &options).unwrap())
    });
    c.bench_function("stage/format", |b| {
        b.iter(|| formatter::format(black_box(&text), &options.style).unwrap())
    });
}

criterion_group!(
    benches,
    bench_compile_simple,
    bench_compile_kitchen_sink,
    bench_compile_recursive,
    bench_stages_kitchen_sink,
);
criterion_main!(benches);
