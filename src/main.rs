//! brisk command-line driver.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{ArgAction, Parser};
use colored::Colorize;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use brisk::bytecode::{self, Compiler, Vm, VmOptions};
use brisk::diagnostics::Diagnostic;
use brisk::error::BriskError;

#[derive(Parser, Debug)]
#[command(name = "brisk", version)]
#[command(about = "Compile and run brisk programs on the bytecode VM")]
struct Cli {
    /// Source files, each compiled and run on its own
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Print the disassembly of each file to stderr
    #[arg(short, long)]
    disassemble: bool,

    /// Entry function
    #[arg(short, long, default_value = bytecode::vm::DEFAULT_ENTRY)]
    entry: String,

    /// Dump the token stream and stop
    #[arg(long)]
    tokens: bool,

    /// Dump the AST and stop
    #[arg(long)]
    ast: bool,

    /// Compile only
    #[arg(long)]
    no_run: bool,

    /// VM stack limit in bytes
    #[arg(long, default_value_t = bytecode::vm::STACK_MAX)]
    max_stack: usize,

    /// Raise the log level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut failed = 0;
    for path in &cli.files {
        if let Err(e) = process_file(path, &cli) {
            failed += 1;
            // Pipeline errors were already rendered with their source.
            if e.downcast_ref::<BriskError>().is_none() {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            warn!(file = %path.display(), "failed");
        }
    }

    if failed > 0 {
        error!("{} of {} file(s) failed", failed, cli.files.len());
        process::exit(1);
    }
}

fn process_file(path: &Path, cli: &Cli) -> anyhow::Result<()> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    debug!(file = %path.display(), bytes = source.len(), "read source");

    run_source(&source, cli).map_err(|e| {
        let diagnostic = Diagnostic::from_error(&e);
        eprint!("{}", diagnostic.render(Some(&source), &path.display().to_string()));
        anyhow::Error::new(e)
    })
}

fn run_source(source: &str, cli: &Cli) -> Result<(), BriskError> {
    let tokens = brisk::tokenize(source)?;
    if cli.tokens {
        for token in &tokens {
            println!("{:>4}:{:<4} {}", token.span.line, token.span.column, token.kind);
        }
        return Ok(());
    }

    let program = brisk::parser::Parser::new(tokens).parse()?;
    if cli.ast {
        println!("{:#?}", program);
        return Ok(());
    }

    let bytecode = Compiler::new().compile(&program)?;
    if cli.disassemble {
        eprint!("{}", bytecode::disassemble(&bytecode));
    }
    if cli.no_run {
        return Ok(());
    }

    let options = VmOptions {
        entry: cli.entry.clone(),
        max_stack: cli.max_stack,
        ..VmOptions::default()
    };
    let stdout = io::stdout();
    let mut vm = Vm::new(&bytecode, options, stdout.lock());
    let result = vm.run()?;
    info!(entry = %cli.entry, result, "program finished");
    Ok(())
}
