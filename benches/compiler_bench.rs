// Pipeline benchmark: lex -> parse -> check -> codegen end to end on one
// representative Clarity module, rather than timing any single stage in
// isolation (the stages are cheap enough individually that noise would
// dominate).

use clarity_compiler::Compiler;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const SAMPLE_SOURCE: &str = r#"
module Bench

type Shape =
    | Circle(radius: Float64)
    | Rectangle(width: Float64, height: Float64)

function area(shape: Shape) -> Float64 {
    match shape {
        Circle(radius) -> radius * radius * 3.14159,
        Rectangle(width, height) -> width * height,
    }
}

function fib(n: Int64, a: Int64, b: Int64) -> Int64 {
    match n {
        0 -> a,
        _ -> fib(n - 1, b, a + b),
    }
}

function describe(shape: Shape) -> String {
    let computed = area(shape)
    "area is ${intToString(floatToInt(floor(computed)))}"
}

function classify(n: Int64) -> Option<String> {
    match n {
        0 -> None,
        _ -> Some("nonzero"),
    }
}
"#;

fn compile_pipeline(c: &mut Criterion) {
    c.bench_function("compile_sample_module", |b| {
        b.iter(|| {
            let compiler = Compiler::new("bench.cl");
            let result = compiler.compile_source(black_box(SAMPLE_SOURCE));
            black_box(result.is_ok());
        });
    });
}

fn parse_only(c: &mut Criterion) {
    c.bench_function("parse_sample_module", |b| {
        b.iter(|| {
            let compiler = Compiler::new("bench.cl");
            let result = compiler.parse(black_box(SAMPLE_SOURCE));
            black_box(result.is_ok());
        });
    });
}

criterion_group!(benches, compile_pipeline, parse_only);
criterion_main!(benches);
