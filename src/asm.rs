// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Accumulator assembly: instruction model and TAC lowering.
//!
//! Every integer literal the lowering encounters becomes a named constant
//! symbol `const_<k>` preloaded with value `k` at link time. Instructions
//! render as text (`LOAD x`) and parse back, so the assembler accepts both
//! the in-memory stream and edited text listings.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::ast::{BinOp, UnOp};
use crate::ir::{Operand, TacInstr, END_LABEL};
use crate::vm;

/// Accumulator-machine mnemonics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
    Load,
    Store,
    Add,
    Sub,
    Mul,
    Div,
    Jmp,
    Jlt,
    Jgt,
    Jle,
    Jge,
    Jeq,
    Jne,
    In,
    Out,
    Label,
    Halt,
}

impl Mnemonic {
    pub fn as_str(self) -> &'static str {
        match self {
            Mnemonic::Load => "LOAD",
            Mnemonic::Store => "STORE",
            Mnemonic::Add => "ADD",
            Mnemonic::Sub => "SUB",
            Mnemonic::Mul => "MUL",
            Mnemonic::Div => "DIV",
            Mnemonic::Jmp => "JMP",
            Mnemonic::Jlt => "JLT",
            Mnemonic::Jgt => "JGT",
            Mnemonic::Jle => "JLE",
            Mnemonic::Jge => "JGE",
            Mnemonic::Jeq => "JEQ",
            Mnemonic::Jne => "JNE",
            Mnemonic::In => "IN",
            Mnemonic::Out => "OUT",
            Mnemonic::Label => "LABEL",
            Mnemonic::Halt => "HALT",
        }
    }

    /// Opcode from the external contract table. `LABEL` occupies no code
    /// space and has none.
    pub fn opcode(self) -> Option<i64> {
        match self {
            Mnemonic::Load => Some(vm::OP_LOAD),
            Mnemonic::Store => Some(vm::OP_STORE),
            Mnemonic::Add => Some(vm::OP_ADD),
            Mnemonic::Sub => Some(vm::OP_SUB),
            Mnemonic::Mul => Some(vm::OP_MUL),
            Mnemonic::Div => Some(vm::OP_DIV),
            Mnemonic::Jmp => Some(vm::OP_JMP),
            Mnemonic::Jlt => Some(vm::OP_JLT),
            Mnemonic::Jgt => Some(vm::OP_JGT),
            Mnemonic::Jle => Some(vm::OP_JLE),
            Mnemonic::Jge => Some(vm::OP_JGE),
            Mnemonic::Jeq => Some(vm::OP_JEQ),
            Mnemonic::Jne => Some(vm::OP_JNE),
            Mnemonic::In => Some(vm::OP_IN),
            Mnemonic::Out => Some(vm::OP_OUT),
            Mnemonic::Label => None,
            Mnemonic::Halt => Some(vm::OP_HALT),
        }
    }

    /// Jump mnemonics take a label operand resolved to an instruction index.
    pub fn is_jump(self) -> bool {
        matches!(
            self,
            Mnemonic::Jmp
                | Mnemonic::Jlt
                | Mnemonic::Jgt
                | Mnemonic::Jle
                | Mnemonic::Jge
                | Mnemonic::Jeq
                | Mnemonic::Jne
        )
    }

    /// Data-movement/arithmetic/IO mnemonics take a memory-symbol operand.
    pub fn is_memory_ref(self) -> bool {
        matches!(
            self,
            Mnemonic::Load
                | Mnemonic::Store
                | Mnemonic::Add
                | Mnemonic::Sub
                | Mnemonic::Mul
                | Mnemonic::Div
                | Mnemonic::In
                | Mnemonic::Out
        )
    }

    pub fn requires_operand(self) -> bool {
        !matches!(self, Mnemonic::Halt)
    }
}

/// Error from parsing a textual assembly line.
#[derive(Debug, Clone)]
pub struct AsmParseError {
    pub message: String,
}

impl AsmParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for AsmParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AsmParseError {}

impl FromStr for Mnemonic {
    type Err = AsmParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOAD" => Ok(Mnemonic::Load),
            "STORE" => Ok(Mnemonic::Store),
            "ADD" => Ok(Mnemonic::Add),
            "SUB" => Ok(Mnemonic::Sub),
            "MUL" => Ok(Mnemonic::Mul),
            "DIV" => Ok(Mnemonic::Div),
            "JMP" => Ok(Mnemonic::Jmp),
            "JLT" => Ok(Mnemonic::Jlt),
            "JGT" => Ok(Mnemonic::Jgt),
            "JLE" => Ok(Mnemonic::Jle),
            "JGE" => Ok(Mnemonic::Jge),
            "JEQ" => Ok(Mnemonic::Jeq),
            "JNE" => Ok(Mnemonic::Jne),
            "IN" => Ok(Mnemonic::In),
            "OUT" => Ok(Mnemonic::Out),
            "LABEL" => Ok(Mnemonic::Label),
            "HALT" => Ok(Mnemonic::Halt),
            other => Err(AsmParseError::new(format!("Unknown mnemonic: {other}"))),
        }
    }
}

/// One assembly instruction: mnemonic plus optional symbolic operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmInstr {
    pub mnemonic: Mnemonic,
    pub operand: Option<String>,
}

impl AsmInstr {
    pub fn new(mnemonic: Mnemonic, operand: impl Into<String>) -> Self {
        Self {
            mnemonic,
            operand: Some(operand.into()),
        }
    }

    pub fn bare(mnemonic: Mnemonic) -> Self {
        Self {
            mnemonic,
            operand: None,
        }
    }
}

impl fmt::Display for AsmInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.operand {
            Some(operand) => write!(f, "{} {operand}", self.mnemonic.as_str()),
            None => write!(f, "{}", self.mnemonic.as_str()),
        }
    }
}

impl FromStr for AsmInstr {
    type Err = AsmParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let head = parts
            .next()
            .ok_or_else(|| AsmParseError::new("Empty assembly line"))?;
        let mnemonic: Mnemonic = head.parse()?;
        let operand = parts.next().map(str::to_string);
        if parts.next().is_some() {
            return Err(AsmParseError::new(format!(
                "Trailing text after operand: {s}"
            )));
        }
        if mnemonic.requires_operand() && operand.is_none() {
            return Err(AsmParseError::new(format!(
                "Mnemonic {} requires an operand",
                mnemonic.as_str()
            )));
        }
        if !mnemonic.requires_operand() && operand.is_some() {
            return Err(AsmParseError::new(format!(
                "Mnemonic {} takes no operand",
                mnemonic.as_str()
            )));
        }
        Ok(Self { mnemonic, operand })
    }
}

/// Output of the lowering: the instruction stream plus the symbol and
/// constant sets the linker lays out in memory.
#[derive(Debug, Clone, Default)]
pub struct AsmProgram {
    pub lines: Vec<AsmInstr>,
    pub syms: BTreeSet<String>,
    pub consts: BTreeSet<i64>,
}

impl AsmProgram {
    pub fn text(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(&line.to_string());
            out.push('\n');
        }
        out
    }
}

/// TAC → accumulator assembly lowering.
pub struct AsmGen {
    program: AsmProgram,
}

impl AsmGen {
    pub fn new() -> Self {
        Self {
            program: AsmProgram::default(),
        }
    }

    pub fn generate(mut self, ir: &[TacInstr]) -> AsmProgram {
        for instr in ir {
            self.emit_instr(instr);
        }
        self.program
    }

    fn emit_instr(&mut self, instr: &TacInstr) {
        match instr {
            TacInstr::Assign { src, dest } => {
                let src = self.operand_sym(src);
                let dest = self.operand_sym(dest);
                self.emit(Mnemonic::Load, &src);
                self.emit(Mnemonic::Store, &dest);
            }
            TacInstr::Unary {
                op: UnOp::Neg,
                src,
                dest,
            } => {
                let src = self.operand_sym(src);
                let dest = self.operand_sym(dest);
                let zero = self.const_sym(0);
                self.emit(Mnemonic::Load, &zero);
                self.emit(Mnemonic::Sub, &src);
                self.emit(Mnemonic::Store, &dest);
            }
            TacInstr::Binary {
                op,
                left,
                right,
                dest,
            } => {
                if op.is_relational() {
                    self.emit_relational(*op, left, right, dest);
                } else {
                    let l = self.operand_sym(left);
                    let r = self.operand_sym(right);
                    let dest = self.operand_sym(dest);
                    self.emit(Mnemonic::Load, &l);
                    let arith = match op {
                        BinOp::Add => Mnemonic::Add,
                        BinOp::Sub => Mnemonic::Sub,
                        BinOp::Mul => Mnemonic::Mul,
                        BinOp::Div => Mnemonic::Div,
                        _ => unreachable!("relational handled above"),
                    };
                    self.emit(arith, &r);
                    self.emit(Mnemonic::Store, &dest);
                }
            }
            TacInstr::Label(name) => {
                self.emit(Mnemonic::Label, name);
                if name == END_LABEL {
                    self.program.lines.push(AsmInstr::bare(Mnemonic::Halt));
                }
            }
            TacInstr::Goto(target) => {
                self.emit(Mnemonic::Jmp, target);
            }
            TacInstr::IfNz { cond, target } => {
                let cond = self.operand_sym(cond);
                self.emit(Mnemonic::Load, &cond);
                self.emit(Mnemonic::Jne, target);
            }
            TacInstr::Read(name) => {
                let name = self.operand_sym(&Operand::Var(name.clone()));
                self.emit(Mnemonic::In, &name);
            }
            TacInstr::Print(src) => {
                let src = self.operand_sym(src);
                self.emit(Mnemonic::Out, &src);
            }
        }
    }

    /// Materialize a relational result as 0/1 through a compare-and-branch
    /// pattern. After `LOAD left; SUB right` the accumulator holds
    /// `left - right`; the truth jump tests it against zero.
    fn emit_relational(&mut self, op: BinOp, left: &Operand, right: &Operand, dest: &Operand) {
        let l = self.operand_sym(left);
        let r = self.operand_sym(right);
        let dest = self.operand_sym(dest);
        let l_true = format!("LBL_TRUE_{dest}");
        let l_end = format!("LBL_END_{dest}");
        let jump = match op {
            BinOp::Eq => Mnemonic::Jeq,
            BinOp::Ne => Mnemonic::Jne,
            BinOp::Lt => Mnemonic::Jlt,
            BinOp::Gt => Mnemonic::Jgt,
            BinOp::Le => Mnemonic::Jle,
            BinOp::Ge => Mnemonic::Jge,
            _ => unreachable!("caller checked is_relational"),
        };
        let zero = self.const_sym(0);
        let one = self.const_sym(1);

        self.emit(Mnemonic::Load, &l);
        self.emit(Mnemonic::Sub, &r);
        self.emit(jump, &l_true);
        self.emit(Mnemonic::Load, &zero);
        self.emit(Mnemonic::Store, &dest);
        self.emit(Mnemonic::Jmp, &l_end);
        self.emit(Mnemonic::Label, &l_true);
        self.emit(Mnemonic::Load, &one);
        self.emit(Mnemonic::Store, &dest);
        self.emit(Mnemonic::Label, &l_end);
    }

    fn emit(&mut self, mnemonic: Mnemonic, operand: &str) {
        self.program.lines.push(AsmInstr::new(mnemonic, operand));
    }

    /// Resolve an operand to its symbol name, recording variables and
    /// temporaries in the symbol set and literals in the constant set.
    fn operand_sym(&mut self, operand: &Operand) -> String {
        match operand {
            Operand::Literal(value) => self.const_sym(*value),
            Operand::Var(_) | Operand::Temp(_) => {
                let name = operand.to_string();
                self.program.syms.insert(name.clone());
                name
            }
        }
    }

    fn const_sym(&mut self, value: i64) -> String {
        self.program.consts.insert(value);
        format!("const_{value}")
    }
}

impl Default for AsmGen {
    fn default() -> Self {
        Self::new()
    }
}

/// Lower a TAC program with a fresh generator.
pub fn generate(ir: &[TacInstr]) -> AsmProgram {
    AsmGen::new().generate(ir)
}
