// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Flow-sensitive initialization analysis.
//!
//! Tracks the set of variables definitely initialized at each program point
//! and warns on uses that may read an uninitialized variable. Warnings
//! accumulate; they never abort compilation. The analysis is deliberately
//! conservative: one pass, no fixed point for loops.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{Expr, Program, Stmt};
use crate::report::{Diagnostic, ErrorKind, Severity};

/// Declaration and initialization state of one variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolInfo {
    pub declared: bool,
    pub initialized: bool,
}

/// Name-indexed symbol table with deterministic iteration order.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: BTreeMap<String, SymbolInfo>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declaration is implicit on first mention; repeat declarations keep
    /// the existing initialization state.
    pub fn declare(&mut self, name: &str) {
        self.symbols.entry(name.to_string()).or_insert(SymbolInfo {
            declared: true,
            initialized: false,
        });
    }

    pub fn set_initialized(&mut self, name: &str) {
        self.declare(name);
        if let Some(info) = self.symbols.get_mut(name) {
            info.initialized = true;
        }
    }

    pub fn is_initialized(&self, name: &str) -> bool {
        self.symbols.get(name).map(|i| i.initialized).unwrap_or(false)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &SymbolInfo)> {
        self.symbols.iter().map(|(name, info)| (name.as_str(), info))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Result of the analysis: the populated table plus accumulated warnings.
#[derive(Debug)]
pub struct SemanticReport {
    pub table: SymbolTable,
    pub warnings: Vec<Diagnostic>,
}

pub struct SemanticAnalyzer {
    table: SymbolTable,
    warnings: Vec<Diagnostic>,
}

impl SemanticAnalyzer {
    pub fn new() -> Self {
        Self {
            table: SymbolTable::new(),
            warnings: Vec::new(),
        }
    }

    pub fn analyze(mut self, program: &Program) -> SemanticReport {
        let mut init = BTreeSet::new();
        for stmt in &program.body {
            init = self.analyze_stmt(stmt, init);
        }
        for name in &init {
            self.table.set_initialized(name);
        }
        SemanticReport {
            table: self.table,
            warnings: self.warnings,
        }
    }

    fn analyze_block(
        &mut self,
        body: &[Stmt],
        init: BTreeSet<String>,
    ) -> BTreeSet<String> {
        let mut current = init;
        for stmt in body {
            current = self.analyze_stmt(stmt, current);
        }
        current
    }

    fn analyze_stmt(&mut self, stmt: &Stmt, mut init: BTreeSet<String>) -> BTreeSet<String> {
        match stmt {
            Stmt::Read { name, .. } => {
                self.table.declare(name);
                init.insert(name.clone());
                init
            }
            Stmt::Print { expr, .. } => {
                self.check_expr(expr, &init);
                init
            }
            Stmt::Assign { name, expr, .. } => {
                self.check_expr(expr, &init);
                self.table.declare(name);
                init.insert(name.clone());
                init
            }
            Stmt::IfElse {
                cond,
                then_body,
                else_body,
                ..
            } => {
                self.check_expr(cond, &init);
                let then_out = self.analyze_block(then_body, init.clone());
                let else_out = self.analyze_block(else_body, init);
                // Only variables initialized on BOTH branches are guaranteed after.
                then_out.intersection(&else_out).cloned().collect()
            }
            Stmt::While { cond, body, .. } => {
                self.check_expr(cond, &init);
                // The body is analyzed for its own warnings, but the loop may
                // run zero times, so nothing it initializes escapes.
                let _ = self.analyze_block(body, init.clone());
                init
            }
        }
    }

    fn check_expr(&mut self, expr: &Expr, init: &BTreeSet<String>) {
        match expr {
            Expr::Number(_, _) => {}
            Expr::Var(name, span) => {
                self.table.declare(name);
                if !init.contains(name) {
                    self.warnings.push(
                        Diagnostic::new(
                            span.line,
                            Severity::Warning,
                            ErrorKind::Semantic,
                            format!("variable '{name}' may be uninitialized"),
                        )
                        .with_column(Some(span.column)),
                    );
                }
            }
            Expr::Unary { expr, .. } => self.check_expr(expr, init),
            Expr::Binary { left, right, .. } => {
                self.check_expr(left, init);
                self.check_expr(right, init);
            }
        }
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Analyze a program with a fresh analyzer.
pub fn analyze(program: &Program) -> SemanticReport {
    SemanticAnalyzer::new().analyze(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn analyze_source(source: &str) -> SemanticReport {
        let program = Parser::new(tokenize(source).expect("lex failure"))
            .parse()
            .expect("parse failure");
        analyze(&program)
    }

    fn warning_messages(report: &SemanticReport) -> Vec<String> {
        report
            .warnings
            .iter()
            .map(|w| w.message().to_string())
            .collect()
    }

    #[test]
    fn use_before_assignment_warns() {
        let report = analyze_source("print x; end");
        assert_eq!(
            warning_messages(&report),
            vec!["variable 'x' may be uninitialized"]
        );
        assert!(report.table.contains("x"));
        assert!(!report.table.is_initialized("x"));
    }

    #[test]
    fn assignment_then_use_is_clean() {
        let report = analyze_source("x = 1; print x; end");
        assert!(report.warnings.is_empty());
        assert!(report.table.is_initialized("x"));
    }

    #[test]
    fn read_initializes() {
        let report = analyze_source("read a; print a; end");
        assert!(report.warnings.is_empty());
        assert!(report.table.is_initialized("a"));
    }

    #[test]
    fn branch_initialization_requires_both_arms() {
        // `x` is only assigned on the then-arm, so the later use warns.
        let src = "read c; if c { x = 1; } else { y = 1; } print x; end";
        let report = analyze_source(src);
        assert_eq!(
            warning_messages(&report),
            vec!["variable 'x' may be uninitialized"]
        );
    }

    #[test]
    fn initialization_on_both_arms_is_guaranteed() {
        let src = "read c; if c { x = 1; } else { x = 2; } print x; end";
        let report = analyze_source(src);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn while_body_does_not_initialize_after_loop() {
        let src = "read n; while n { x = 1; n = n - 1; } print x; end";
        let report = analyze_source(src);
        assert_eq!(
            warning_messages(&report),
            vec!["variable 'x' may be uninitialized"]
        );
    }

    #[test]
    fn warning_carries_source_position() {
        let report = analyze_source("read a;\nprint b;\nend");
        let warning = &report.warnings[0];
        assert_eq!(warning.line(), 2);
        assert_eq!(warning.column(), Some(7));
    }

    #[test]
    fn table_entries_iterate_in_name_order() {
        let report = analyze_source("read b; read a; c = a + b; end");
        assert_eq!(report.table.len(), 3);
        assert!(!report.table.is_empty());
        let names: Vec<&str> = report.table.entries().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(report.table.entries().all(|(_, info)| info.declared));
    }

    #[test]
    fn uses_inside_while_body_are_checked() {
        let src = "read n; while n { print x; n = n - 1; } end";
        let report = analyze_source(src);
        assert_eq!(
            warning_messages(&report),
            vec!["variable 'x' may be uninitialized"]
        );
    }
}
