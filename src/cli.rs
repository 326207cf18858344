// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing and argument validation.

use std::fmt;
use std::path::PathBuf;

use clap::{ArgAction, Parser, ValueEnum};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const LONG_ABOUT: &str = "MiniLang compiler targeting a simple accumulator machine.

Compiles the source through lexing, parsing, constant folding, initialization
analysis, three-address code, accumulator assembly, and linking. Use --run to
execute the linked program on the built-in VM, --emit to print one stage, or
--emit-all with --out-dir to write every stage artifact to disk.";

#[derive(Parser, Debug)]
#[command(
    name = "minilang",
    version = VERSION,
    about = "MiniLang compiler and accumulator-machine VM",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    /// MiniLang source file.
    pub file: PathBuf,
    #[arg(
        long = "no-opt",
        action = ArgAction::SetTrue,
        long_help = "Disable AST-level constant folding."
    )]
    pub no_opt: bool,
    #[arg(
        long = "run",
        action = ArgAction::SetTrue,
        long_help = "Execute the linked program on the VM after compilation."
    )]
    pub run: bool,
    #[arg(
        long = "inputs",
        value_name = "N",
        num_args = 1..,
        allow_negative_numbers = true,
        long_help = "Preload integer inputs for read statements. Without this, --run reads from standard input."
    )]
    pub inputs: Option<Vec<i64>>,
    #[arg(
        long = "emit",
        value_enum,
        value_name = "STAGE",
        long_help = "Serialize one stage to stdout and exit without running."
    )]
    pub emit: Option<EmitStage>,
    #[arg(
        long = "emit-all",
        action = ArgAction::SetTrue,
        long_help = "Write tokens.txt, ast.txt, ir.txt, asm.txt, machine.txt and machine.json to --out-dir."
    )]
    pub emit_all: bool,
    #[arg(
        long = "out-dir",
        value_name = "DIR",
        long_help = "Directory for --emit-all artifacts; created if missing."
    )]
    pub out_dir: Option<PathBuf>,
    #[arg(
        long = "trace-ir",
        action = ArgAction::SetTrue,
        long_help = "Print the generated three-address code."
    )]
    pub trace_ir: bool,
    #[arg(
        long = "trace-asm",
        action = ArgAction::SetTrue,
        long_help = "Print the generated accumulator assembly."
    )]
    pub trace_asm: bool,
    #[arg(
        long = "trace-vm",
        action = ArgAction::SetTrue,
        long_help = "Print a per-instruction VM trace while running."
    )]
    pub trace_vm: bool,
}

/// Pipeline stages that can be serialized with --emit.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitStage {
    Tokens,
    Ast,
    Ir,
    Asm,
    Machine,
}

/// Error from CLI validation.
#[derive(Debug, Clone)]
pub struct CliError {
    pub message: String,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Validated run configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub optimize: bool,
    pub emit_all_dir: Option<PathBuf>,
}

pub fn validate_cli(cli: &Cli) -> Result<CliConfig, CliError> {
    let emit_all_dir = if cli.emit_all {
        match &cli.out_dir {
            Some(dir) => Some(dir.clone()),
            None => {
                return Err(CliError {
                    message: "--emit-all requires --out-dir".to_string(),
                });
            }
        }
    } else {
        None
    };
    Ok(CliConfig {
        optimize: !cli.no_opt,
        emit_all_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("cli parse failure")
    }

    #[test]
    fn defaults_enable_optimization() {
        let cli = parse(&["minilang", "prog.ml"]);
        let config = validate_cli(&cli).expect("validate failure");
        assert!(config.optimize);
        assert!(config.emit_all_dir.is_none());
    }

    #[test]
    fn no_opt_disables_folding() {
        let cli = parse(&["minilang", "prog.ml", "--no-opt"]);
        let config = validate_cli(&cli).expect("validate failure");
        assert!(!config.optimize);
    }

    #[test]
    fn emit_all_requires_out_dir() {
        let cli = parse(&["minilang", "prog.ml", "--emit-all"]);
        let err = validate_cli(&cli).unwrap_err();
        assert!(err.message.contains("--out-dir"));
    }

    #[test]
    fn inputs_accept_negative_values() {
        let cli = parse(&["minilang", "prog.ml", "--run", "--inputs", "3", "-7", "0"]);
        assert_eq!(cli.inputs, Some(vec![3, -7, 0]));
    }

    #[test]
    fn emit_stage_values_parse() {
        let cli = parse(&["minilang", "prog.ml", "--emit", "machine"]);
        assert_eq!(cli.emit, Some(EmitStage::Machine));
    }
}
