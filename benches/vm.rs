//! Benchmarks for the compiler and the bytecode VM.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use brisk::bytecode::{Bytecode, Compiler, Vm, VmOptions};
use brisk::lexer::Scanner;
use brisk::parser::Parser;

const FIB: &str = include_str!("../demos/fib.bk");

/// Parse source into an AST.
fn parse(source: &str) -> brisk::ast::Program {
    let tokens = Scanner::new(source).scan_tokens().expect("lexer error");
    Parser::new(tokens).parse().expect("parser error")
}

fn compile(source: &str) -> Bytecode {
    Compiler::new()
        .compile(&parse(source))
        .expect("compile error")
}

fn execute(bytecode: &Bytecode) -> u64 {
    Vm::new(bytecode, VmOptions::default(), std::io::sink())
        .run()
        .expect("vm runtime error")
}

fn fib_source(n: u32) -> String {
    format!(
        "
fun fib(i32 n) -> i32 begin
    if n < 2 then return n end
    return fib(n - 1) + fib(n - 2)
end
fun main() -> i32 begin return fib({}) end
",
        n
    )
}

fn loop_source(n: u32) -> String {
    format!(
        "
fun main() -> u64 begin
    var i : u64 = 0
    var sum : u64 = 0
    while i < {} begin
        sum += i * i
        i += 1
    end
    return sum
end
",
        n
    )
}

fn fib_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("fib_recursive");

    for n in [10, 15, 20] {
        let bytecode = compile(&fib_source(n));
        group.bench_with_input(BenchmarkId::new("vm", n), &bytecode, |b, bytecode| {
            b.iter(|| execute(black_box(bytecode)))
        });
    }

    group.finish();
}

fn loop_sum(c: &mut Criterion) {
    let bytecode = compile(&loop_source(100_000));
    c.bench_function("loop_sum", |b| b.iter(|| execute(black_box(&bytecode))));
}

/// Compilation time alone, without execution.
fn compilation_overhead(c: &mut Criterion) {
    let mut group = c.benchmark_group("compilation_overhead");

    let program = parse(FIB);
    group.bench_function("compile_fib", |b| {
        b.iter(|| Compiler::new().compile(black_box(&program)).unwrap())
    });

    let source = loop_source(10);
    group.bench_function("pipeline_loop", |b| {
        b.iter(|| brisk::compile(black_box(&source)).unwrap())
    });

    group.finish();
}

criterion_group!(benches, fib_scaling, loop_sum, compilation_overhead);

criterion_main!(benches);
