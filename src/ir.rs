// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Three-address intermediate code and its generator.
//!
//! Operands are a tagged sum rather than raw strings, so the assembly stage
//! dispatches by match instead of re-parsing text. Temporary and label
//! counters live in the generator instance, scoped to one compilation.

use std::fmt;

use crate::ast::{BinOp, Expr, Program, Stmt, UnOp};

/// Sentinel label closing every TAC program.
pub const END_LABEL: &str = "END";

/// A TAC operand: program variable, compiler temporary, or integer literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Var(String),
    Temp(u32),
    Literal(i64),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Var(name) => write!(f, "{name}"),
            Operand::Temp(id) => write!(f, "t{id}"),
            Operand::Literal(value) => write!(f, "{value}"),
        }
    }
}

/// One TAC instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TacInstr {
    Assign {
        src: Operand,
        dest: Operand,
    },
    Unary {
        op: UnOp,
        src: Operand,
        dest: Operand,
    },
    Binary {
        op: BinOp,
        left: Operand,
        right: Operand,
        dest: Operand,
    },
    Label(String),
    Goto(String),
    IfNz {
        cond: Operand,
        target: String,
    },
    Read(String),
    Print(Operand),
}

impl fmt::Display for TacInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TacInstr::Assign { src, dest } => write!(f, "assign {src} {dest}"),
            TacInstr::Unary { op: UnOp::Neg, src, dest } => write!(f, "uminus {src} {dest}"),
            TacInstr::Binary {
                op,
                left,
                right,
                dest,
            } => write!(f, "{} {left} {right} {dest}", op.symbol()),
            TacInstr::Label(name) => write!(f, "label {name}"),
            TacInstr::Goto(name) => write!(f, "goto {name}"),
            TacInstr::IfNz { cond, target } => write!(f, "ifnz {cond} {target}"),
            TacInstr::Read(name) => write!(f, "read {name}"),
            TacInstr::Print(src) => write!(f, "print {src}"),
        }
    }
}

/// AST → TAC lowering.
pub struct IrGen {
    temp_counter: u32,
    label_counter: u32,
    ir: Vec<TacInstr>,
}

impl IrGen {
    pub fn new() -> Self {
        Self {
            temp_counter: 0,
            label_counter: 0,
            ir: Vec::new(),
        }
    }

    /// Lower a program, appending the terminal `END` label.
    pub fn generate(mut self, program: &Program) -> Vec<TacInstr> {
        for stmt in &program.body {
            self.emit_stmt(stmt);
        }
        self.ir.push(TacInstr::Label(END_LABEL.to_string()));
        self.ir
    }

    fn new_temp(&mut self) -> Operand {
        self.temp_counter += 1;
        Operand::Temp(self.temp_counter)
    }

    fn new_label(&mut self) -> String {
        self.label_counter += 1;
        format!("L{}", self.label_counter)
    }

    fn emit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Read { name, .. } => {
                self.ir.push(TacInstr::Read(name.clone()));
            }
            Stmt::Print { expr, .. } => {
                let val = self.emit_expr(expr);
                self.ir.push(TacInstr::Print(val));
            }
            Stmt::Assign { name, expr, .. } => {
                let val = self.emit_expr(expr);
                self.ir.push(TacInstr::Assign {
                    src: val,
                    dest: Operand::Var(name.clone()),
                });
            }
            Stmt::IfElse {
                cond,
                then_body,
                else_body,
                ..
            } => {
                let cond_val = self.emit_expr(cond);
                let l_true = self.new_label();
                let l_end = self.new_label();
                self.ir.push(TacInstr::IfNz {
                    cond: cond_val,
                    target: l_true.clone(),
                });
                for stmt in else_body {
                    self.emit_stmt(stmt);
                }
                self.ir.push(TacInstr::Goto(l_end.clone()));
                self.ir.push(TacInstr::Label(l_true));
                for stmt in then_body {
                    self.emit_stmt(stmt);
                }
                self.ir.push(TacInstr::Label(l_end));
            }
            Stmt::While { cond, body, .. } => {
                let l_start = self.new_label();
                let l_body = self.new_label();
                let l_end = self.new_label();
                self.ir.push(TacInstr::Label(l_start.clone()));
                let cond_val = self.emit_expr(cond);
                self.ir.push(TacInstr::IfNz {
                    cond: cond_val,
                    target: l_body.clone(),
                });
                self.ir.push(TacInstr::Goto(l_end.clone()));
                self.ir.push(TacInstr::Label(l_body));
                for stmt in body {
                    self.emit_stmt(stmt);
                }
                self.ir.push(TacInstr::Goto(l_start));
                self.ir.push(TacInstr::Label(l_end));
            }
        }
    }

    /// Post-order expression lowering; returns the operand holding the
    /// result. Variables lower to themselves, literals to a fresh temp.
    fn emit_expr(&mut self, expr: &Expr) -> Operand {
        match expr {
            Expr::Number(value, _) => {
                let t = self.new_temp();
                self.ir.push(TacInstr::Assign {
                    src: Operand::Literal(*value),
                    dest: t.clone(),
                });
                t
            }
            Expr::Var(name, _) => Operand::Var(name.clone()),
            Expr::Unary { op, expr, .. } => {
                let val = self.emit_expr(expr);
                let t = self.new_temp();
                self.ir.push(TacInstr::Unary {
                    op: *op,
                    src: val,
                    dest: t.clone(),
                });
                t
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                let l = self.emit_expr(left);
                let r = self.emit_expr(right);
                let t = self.new_temp();
                self.ir.push(TacInstr::Binary {
                    op: *op,
                    left: l,
                    right: r,
                    dest: t.clone(),
                });
                t
            }
        }
    }
}

impl Default for IrGen {
    fn default() -> Self {
        Self::new()
    }
}

/// Lower a program with a fresh generator.
pub fn generate(program: &Program) -> Vec<TacInstr> {
    IrGen::new().generate(program)
}
