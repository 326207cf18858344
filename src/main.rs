// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for the MiniLang compiler.

use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use clap::Parser;

use minilang::cli::{validate_cli, Cli, EmitStage};
use minilang::pipeline::{self, Artifacts, CompileOptions};
use minilang::report::{Diagnostic, ErrorKind, Severity};
use minilang::vm::{InputProvider, Vm};

fn plain_error(kind: ErrorKind, message: String) -> String {
    Diagnostic::new(0, Severity::Error, kind, message).format_with_context(None, false)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match validate_cli(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", plain_error(ErrorKind::Cli, err.message));
            return ExitCode::from(1);
        }
    };

    let source = match std::fs::read_to_string(&cli.file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!(
                "{}",
                plain_error(ErrorKind::Io, format!("Error reading {}: {err}", cli.file.display()))
            );
            return ExitCode::from(2);
        }
    };
    let source_lines: Vec<String> = source.lines().map(str::to_string).collect();
    let use_color = std::env::var("NO_COLOR").is_err();

    let options = CompileOptions {
        optimize: config.optimize,
    };
    let artifacts = match pipeline::compile(&source, &options) {
        Ok(artifacts) => artifacts,
        Err(err) => {
            let diag = err.diagnostic();
            eprintln!("{}", diag.format_with_context(Some(&source_lines), use_color));
            return ExitCode::from(1);
        }
    };

    for warning in &artifacts.warnings {
        eprintln!(
            "{}",
            warning.format_with_context(Some(&source_lines), use_color)
        );
    }

    if cli.trace_ir {
        print!("{}", artifacts.ir_text());
    }
    if cli.trace_asm {
        print!("{}", artifacts.asm_text());
    }

    if let Some(dir) = &config.emit_all_dir {
        if let Err(err) = artifacts.write_all(dir) {
            eprintln!(
                "{}",
                plain_error(
                    ErrorKind::Io,
                    format!("Error writing artifacts to {}: {err}", dir.display())
                )
            );
            return ExitCode::from(2);
        }
    }

    if let Some(stage) = cli.emit {
        print!("{}", emit_stage_text(&artifacts, stage));
        return ExitCode::SUCCESS;
    }

    if cli.run {
        return run_vm(&cli, &artifacts);
    }

    ExitCode::SUCCESS
}

fn emit_stage_text(artifacts: &Artifacts, stage: EmitStage) -> String {
    match stage {
        EmitStage::Tokens => artifacts.tokens_text(),
        EmitStage::Ast => artifacts.ast_text(),
        EmitStage::Ir => artifacts.ir_text(),
        EmitStage::Asm => artifacts.asm_text(),
        EmitStage::Machine => artifacts.machine_text(),
    }
}

fn run_vm(cli: &Cli, artifacts: &Artifacts) -> ExitCode {
    let input: InputProvider = match &cli.inputs {
        Some(values) => minilang::vm::batch_input(values.clone()),
        None => stdin_input(),
    };
    match Vm::new(&artifacts.machine, input, cli.trace_vm).run() {
        Ok(result) => {
            if cli.trace_vm {
                if let Some(trace) = &result.trace {
                    for entry in trace {
                        eprintln!("{entry}");
                    }
                }
            }
            let mut stdout = io::stdout().lock();
            for value in &result.outputs {
                let _ = writeln!(stdout, "{value}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!(
                "{}",
                pipeline::runtime_diagnostic(&err).format_with_context(None, false)
            );
            ExitCode::from(1)
        }
    }
}

/// Reads one integer per line from standard input; EOF or a non-numeric
/// line ends the stream, which the VM reports as input exhaustion.
fn stdin_input() -> InputProvider {
    Box::new(|| {
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => line.trim().parse().ok(),
            Err(_) => None,
        }
    })
}
