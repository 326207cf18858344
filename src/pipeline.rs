// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Pipeline driver composing the compilation stages.
//!
//! Data flow is strictly forward: source → tokens → AST → (optional folded
//! AST) → TAC → assembly → machine program. Each stage produces a fresh
//! artifact; nothing mutates a prior stage's output. Lex, parse, and link
//! errors abort at their stage; semantic warnings accumulate and never
//! abort.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use crate::asm::{self, AsmInstr};
use crate::ast::Program;
use crate::ir::{self, TacInstr};
use crate::lexer::{self, LexError};
use crate::link::{const_value_map, Assembler, LinkError, MachineProgram};
use crate::optimizer;
use crate::parser::{ParseError, Parser};
use crate::report::{Diagnostic, ErrorKind, Severity};
use crate::semantic::{self, SymbolTable};
use crate::token::Token;
use crate::vm::{batch_input, RuntimeError, Vm, VmResult};

/// Stage-selection switches for one compilation.
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions {
    pub optimize: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self { optimize: true }
    }
}

/// Error aborting the pipeline, tagged by its originating stage.
#[derive(Debug)]
pub enum CompileError {
    Lex(LexError),
    Parse(ParseError),
    Link(LinkError),
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::Lex(_) => ErrorKind::Lex,
            CompileError::Parse(_) => ErrorKind::Parse,
            CompileError::Link(_) => ErrorKind::Link,
        }
    }

    /// Diagnostic for rendering with source context.
    pub fn diagnostic(&self) -> Diagnostic {
        match self {
            CompileError::Lex(err) => {
                Diagnostic::new(err.line, Severity::Error, ErrorKind::Lex, err.message.clone())
                    .with_column(Some(err.column))
            }
            CompileError::Parse(err) => Diagnostic::new(
                err.line,
                Severity::Error,
                ErrorKind::Parse,
                err.message.clone(),
            )
            .with_column(Some(err.column)),
            CompileError::Link(err) => {
                Diagnostic::new(0, Severity::Error, ErrorKind::Link, err.message.clone())
            }
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Lex(err) => write!(f, "{err}"),
            CompileError::Parse(err) => write!(f, "{err}"),
            CompileError::Link(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<LexError> for CompileError {
    fn from(err: LexError) -> Self {
        CompileError::Lex(err)
    }
}

impl From<ParseError> for CompileError {
    fn from(err: ParseError) -> Self {
        CompileError::Parse(err)
    }
}

impl From<LinkError> for CompileError {
    fn from(err: LinkError) -> Self {
        CompileError::Link(err)
    }
}

/// Every stage's artifact from one successful compilation.
#[derive(Debug)]
pub struct Artifacts {
    pub tokens: Vec<Token>,
    pub ast: Program,
    pub table: SymbolTable,
    pub warnings: Vec<Diagnostic>,
    pub ir: Vec<TacInstr>,
    pub asm: Vec<AsmInstr>,
    pub machine: MachineProgram,
}

/// Run the full front-to-back compilation.
pub fn compile(source: &str, options: &CompileOptions) -> Result<Artifacts, CompileError> {
    let tokens = lexer::tokenize(source)?;
    let mut ast = Parser::new(tokens.clone()).parse()?;
    if options.optimize {
        ast = optimizer::fold_program(ast);
    }
    let sem = semantic::analyze(&ast);
    let ir = ir::generate(&ast);
    let asm = asm::generate(&ir);
    let machine = Assembler::assemble(&asm.lines)?.link(&const_value_map(&asm.consts))?;
    Ok(Artifacts {
        tokens,
        ast,
        table: sem.table,
        warnings: sem.warnings,
        ir,
        asm: asm.lines,
        machine,
    })
}

/// Execute a linked program against a pre-supplied input batch.
pub fn run_with_inputs(
    machine: &MachineProgram,
    inputs: Vec<i64>,
    trace: bool,
) -> Result<VmResult, RuntimeError> {
    Vm::new(machine, batch_input(inputs), trace).run()
}

/// Diagnostic for a VM failure (no source position).
pub fn runtime_diagnostic(err: &RuntimeError) -> Diagnostic {
    Diagnostic::new(0, Severity::Error, ErrorKind::Runtime, err.to_string())
}

impl Artifacts {
    pub fn tokens_text(&self) -> String {
        let mut out = String::new();
        for tok in &self.tokens {
            out.push_str(&tok.to_string());
            out.push('\n');
        }
        out
    }

    pub fn ast_text(&self) -> String {
        self.ast.to_string()
    }

    pub fn ir_text(&self) -> String {
        let mut out = String::new();
        for instr in &self.ir {
            out.push_str(&instr.to_string());
            out.push('\n');
        }
        out
    }

    pub fn asm_text(&self) -> String {
        let mut out = String::new();
        for instr in &self.asm {
            out.push_str(&instr.to_string());
            out.push('\n');
        }
        out
    }

    pub fn machine_text(&self) -> String {
        self.machine.to_text()
    }

    /// Write one file per stage into `out_dir`, creating it if needed.
    pub fn write_all(&self, out_dir: &Path) -> io::Result<()> {
        fs::create_dir_all(out_dir)?;
        fs::write(out_dir.join("tokens.txt"), self.tokens_text())?;
        fs::write(out_dir.join("ast.txt"), self.ast_text())?;
        fs::write(out_dir.join("ir.txt"), self.ir_text())?;
        fs::write(out_dir.join("asm.txt"), self.asm_text())?;
        fs::write(out_dir.join("machine.txt"), self.machine_text())?;
        fs::write(
            out_dir.join("machine.json"),
            format!("{}\n", self.machine.to_json()),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn compile_default(source: &str) -> Artifacts {
        compile(source, &CompileOptions::default()).expect("compile failure")
    }

    fn run_source(source: &str, inputs: Vec<i64>) -> Result<Vec<i64>, RuntimeError> {
        let artifacts = compile_default(source);
        run_with_inputs(&artifacts.machine, inputs, false).map(|r| r.outputs)
    }

    fn run_source_unopt(source: &str, inputs: Vec<i64>) -> Result<Vec<i64>, RuntimeError> {
        let artifacts =
            compile(source, &CompileOptions { optimize: false }).expect("compile failure");
        run_with_inputs(&artifacts.machine, inputs, false).map(|r| r.outputs)
    }

    #[test]
    fn sum_branch_and_loop_scenario() {
        let src = "
            read a;
            read b;
            c = a + b * 2;
            if c >= 10 { print c; } else { print 0; }
            i = 0;
            while i < c { print i; i = i + 1; }
            end
        ";
        let outputs = run_source(src, vec![3, 7]).expect("vm failure");
        let mut expected = vec![17];
        expected.extend(0..17);
        assert_eq!(outputs, expected);
    }

    #[test]
    fn nested_if_scenario() {
        let src = "
            read x;
            read y;
            if x < y {
                if x + y > 10 { print x + y; } else { print x; }
            } else {
                print y;
            }
            if x == y { print 1; } else { print 0; }
            end
        ";
        assert_eq!(run_source(src, vec![5, 10]).expect("vm failure"), vec![15, 0]);
    }

    #[test]
    fn zero_iteration_loop_scenario() {
        let src = "read n; i = 0; while i < n { print i; i = i + 1; } print 999; end";
        assert_eq!(run_source(src, vec![0]).expect("vm failure"), vec![999]);
    }

    #[test]
    fn constant_expression_scenario() {
        let src = "
            print 2+3*4;
            print 20/5;
            print 2+(3+1);
            print (2+3)*4;
            print (1<2);
            print (3==3);
            end
        ";
        let expected = vec![14, 4, 6, 20, 1, 1];
        assert_eq!(run_source(src, vec![]).expect("vm failure"), expected);
        assert_eq!(run_source_unopt(src, vec![]).expect("vm failure"), expected);
    }

    #[test]
    fn interleaved_read_print_scenario() {
        let src = "read a; print a; read b; print b; read c; print c; end";
        assert_eq!(
            run_source(src, vec![42, 7, 0]).expect("vm failure"),
            vec![42, 7, 0]
        );
    }

    #[test]
    fn division_by_zero_scenario() {
        let src = "read x; y = x / 0; print y; end";
        let err = run_source(src, vec![1]).unwrap_err();
        assert!(matches!(err, RuntimeError::DivideByZero { .. }));
    }

    #[test]
    fn folded_and_unfolded_programs_agree() {
        let src = "
            read a;
            b = 2 * 3 + a;
            if 1 < 2 { print b; } else { print 0; }
            print -4 / 3;
            print 7 / -2;
            end
        ";
        assert_eq!(
            run_source(src, vec![10]).expect("vm failure"),
            run_source_unopt(src, vec![10]).expect("vm failure")
        );
    }

    #[test]
    fn two_runs_are_deterministic() {
        let src = "read n; i = 0; while i < n { print i * i; i = i + 1; } end";
        let artifacts = compile_default(src);
        let first = run_with_inputs(&artifacts.machine, vec![5], true).expect("vm failure");
        let second = run_with_inputs(&artifacts.machine, vec![5], true).expect("vm failure");
        assert_eq!(first.outputs, second.outputs);
        assert_eq!(first.trace, second.trace);
    }

    #[test]
    fn warnings_survive_to_artifacts() {
        let artifacts = compile_default("print x; end");
        assert_eq!(artifacts.warnings.len(), 1);
        assert!(artifacts.warnings[0]
            .message()
            .contains("'x' may be uninitialized"));
        assert!(artifacts.table.contains("x"));
    }

    #[test]
    fn input_exhaustion_is_a_runtime_error() {
        let err = run_source("read a; read b; end", vec![1]).unwrap_err();
        assert!(matches!(err, RuntimeError::InputExhausted { .. }));
    }

    #[test]
    fn compile_error_diagnostics_carry_positions() {
        let err = compile("print 1 end", &CompileOptions::default()).unwrap_err();
        let diag = err.diagnostic();
        assert_eq!(diag.line(), 1);
        assert_eq!(diag.column(), Some(9));
    }

    #[test]
    fn stage_artifacts_render_nonempty_text() {
        let artifacts = compile_default("read a; print a + 1; end");
        assert!(artifacts.tokens_text().contains("Token(READ"));
        assert!(artifacts.ast_text().starts_with("Program"));
        assert!(artifacts.ir_text().contains("label END"));
        assert!(artifacts.asm_text().ends_with("HALT\n"));
        assert!(artifacts.machine_text().starts_with("CODE: "));
    }

    proptest! {
        #[test]
        fn multiplication_binds_tighter_than_addition(
            a in -50i64..50,
            b in -50i64..50,
            c in -50i64..50,
        ) {
            let src = format!("print {a} + {b} * {c}; end");
            let outputs = run_source_unopt(&src, vec![]).expect("vm failure");
            prop_assert_eq!(outputs, vec![a + b * c]);
        }

        #[test]
        fn subtraction_is_left_associative(
            a in -50i64..50,
            b in -50i64..50,
            c in -50i64..50,
        ) {
            let src = format!("print {a} - {b} - {c}; end");
            let outputs = run_source_unopt(&src, vec![]).expect("vm failure");
            prop_assert_eq!(outputs, vec![(a - b) - c]);
        }

        #[test]
        fn unary_minus_binds_tighter_than_multiplication(
            a in 0i64..50,
            b in -50i64..50,
        ) {
            let src = format!("print -{a} * {b}; end");
            let outputs = run_source_unopt(&src, vec![]).expect("vm failure");
            prop_assert_eq!(outputs, vec![(-a) * b]);
        }

        #[test]
        fn folded_arithmetic_matches_runtime(
            a in -100i64..100,
            b in -100i64..100,
            c in 1i64..100,
        ) {
            let src = format!("print {a} * {b} + {a} / {c}; end");
            let folded = run_source(&src, vec![]).expect("vm failure");
            let unfolded = run_source_unopt(&src, vec![]).expect("vm failure");
            prop_assert_eq!(folded, unfolded);
        }
    }
}
