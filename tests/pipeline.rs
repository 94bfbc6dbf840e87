//! Integration tests for the public pipeline API.

use brisk::bytecode::{disassemble, Vm, VmOptions};
use brisk::diagnostics::Diagnostic;
use brisk::error::{BriskError, CompileError, LexerError, ParserError, RuntimeError};
use brisk::lexer::TokenKind;
use pretty_assertions::assert_eq;

const FIB: &str = include_str!("../demos/fib.bk");
const FIZZBUZZ: &str = include_str!("../demos/fizzbuzz.bk");

fn output(source: &str) -> (u64, String) {
    let mut out = Vec::new();
    let result = brisk::run_with_output(source, &mut out).unwrap();
    (result, String::from_utf8(out).unwrap())
}

#[test]
fn test_tokenize_integer() {
    let tokens = brisk::tokenize("123").unwrap();
    let kinds: Vec<_> = tokens.into_iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec![TokenKind::IntLiteral(123), TokenKind::Eof]);
}

#[test]
fn test_tokenize_is_idempotent() {
    let first = brisk::tokenize(FIZZBUZZ).unwrap();
    let second = brisk::tokenize(FIZZBUZZ).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_fib_demo() {
    let (result, out) = output(FIB);
    assert_eq!(result, 6765);
    assert_eq!(out, "2880067194370816120\n");
}

#[test]
fn test_fizzbuzz_demo() {
    let (_, out) = output(FIZZBUZZ);
    let expected = [
        "1", "2", "Fizz", "4", "Buzz", "Fizz", "7", "8", "Fizz", "Buzz", "11", "Fizz", "13",
        "14", "FizzBuzz",
    ];
    assert_eq!(out.lines().collect::<Vec<_>>(), expected);
}

#[test]
fn test_run_named_function() {
    let mut out = Vec::new();
    let result = brisk::run_function(FIB, "main", &mut out).unwrap();
    assert_eq!(result, 6765);

    let source = "fun seven() -> u8 begin return 7 end";
    assert_eq!(brisk::run_function(source, "seven", &mut out).unwrap(), 7);
}

#[test]
fn test_errors_carry_their_stage() {
    let lex = brisk::compile("fun main() -> unit begin $ end").unwrap_err();
    assert!(matches!(lex, BriskError::Lexer(LexerError::UnexpectedChar { .. })));
    assert_eq!(lex.stage(), "lex");

    let parse = brisk::compile("fun main() -> unit begin return end end").unwrap_err();
    assert!(matches!(parse, BriskError::Parser(ParserError::ExpectedDeclaration { .. })));
    assert_eq!(parse.stage(), "parse");

    let compile = brisk::compile("fun main() -> i32 begin return nope end").unwrap_err();
    assert!(matches!(compile, BriskError::Compile(CompileError::Undeclared { .. })));
    assert_eq!(compile.stage(), "compile");

    let mut out = Vec::new();
    let runtime = brisk::run_with_output("fun start() -> unit begin end", &mut out).unwrap_err();
    assert!(matches!(runtime, BriskError::Runtime(RuntimeError::MissingEntry(_))));
    assert_eq!(runtime.stage(), "runtime");
    assert_eq!(runtime.span(), None);
}

#[test]
fn test_compile_error_points_at_source() {
    colored::control::set_override(false);
    let source = "fun main() -> i32 begin\n    return nope\nend";
    let error = brisk::compile(source).unwrap_err();
    let span = error.span().unwrap();
    assert_eq!((span.line, span.column), (2, 12));

    let rendered = Diagnostic::from_error(&error).render(Some(source), "main.bk");
    assert!(rendered.starts_with("error[compile]: "));
    assert!(rendered.contains(" --> main.bk:2:12\n"));
    assert!(rendered.ends_with("  |     return nope\n  |            ^^^^\n"));
}

#[test]
fn test_compiled_program_runs_repeatedly() {
    let bytecode = brisk::compile(FIZZBUZZ).unwrap();
    let mut outputs = Vec::new();
    for _ in 0..3 {
        let mut out = Vec::new();
        Vm::new(&bytecode, VmOptions::default(), &mut out)
            .run()
            .unwrap();
        outputs.push(out);
    }
    assert_eq!(outputs[0], outputs[1]);
    assert_eq!(outputs[1], outputs[2]);
}

#[test]
fn test_stack_limit_option() {
    let source = "
        fun deep(u64 n) -> u64 begin
            if n then return deep(n - 1) end
            return 0
        end
        fun main() -> u64 begin return deep(500) end";
    let bytecode = brisk::compile(source).unwrap();

    let roomy = Vm::new(&bytecode, VmOptions::default(), Vec::new()).run();
    assert_eq!(roomy.unwrap(), 0);

    let options = VmOptions {
        max_stack: 256,
        ..VmOptions::default()
    };
    let cramped = Vm::new(&bytecode, options, Vec::new()).run();
    assert!(matches!(cramped, Err(RuntimeError::StackOverflow { limit: 256, .. })));
}

#[test]
fn test_disassembly_lists_every_function() {
    let bytecode = brisk::compile(FIB).unwrap();
    let listing = disassemble(&bytecode);
    for function in &bytecode.functions {
        assert!(listing.contains(&format!("== {} (", function.name)));
    }
    assert!(listing.contains("enter"));
    assert!(listing.contains("call 0x"));
    assert!(listing.contains("sys PRINT_U64"));
}
