// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Assembler and linker: assembly stream → machine program.
//!
//! Assembly is two phases. *Assemble* scans instructions into records and
//! maps each `LABEL` to the next instruction index (labels occupy no code
//! space). *Link* lays out memory deterministically, resolves every operand,
//! and emits the flat `[opcode, operand]` code array.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde_json::json;

use crate::asm::{AsmInstr, Mnemonic};

/// Error from the assemble or link phase. An unresolved symbol or label at
/// this point indicates a compiler bug upstream.
#[derive(Debug, Clone)]
pub struct LinkError {
    pub message: String,
}

impl LinkError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for LinkError {}

/// A linked machine program: bytecode plus the memory and label maps needed
/// to run or inspect it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineProgram {
    pub code: Vec<i64>,
    pub sym_addrs: BTreeMap<String, usize>,
    pub mem_init: BTreeMap<usize, i64>,
    pub labels: BTreeMap<String, usize>,
}

impl MachineProgram {
    /// Memory is sized to the highest assigned address, never empty.
    pub fn memory_size(&self) -> usize {
        self.sym_addrs
            .values()
            .max()
            .map(|max| max + 1)
            .unwrap_or(1)
            .max(1)
    }

    /// Stable text form: the bytecode as whitespace-separated decimals,
    /// then the symbol, memory-initialization, and label maps.
    pub fn to_text(&self) -> String {
        let code: Vec<String> = self.code.iter().map(|v| v.to_string()).collect();

        let mut syms: Vec<(&String, &usize)> = self.sym_addrs.iter().collect();
        syms.sort_by_key(|(_, addr)| **addr);
        let syms: Vec<String> = syms
            .into_iter()
            .map(|(name, addr)| format!("{name}={addr}"))
            .collect();

        let mem_init: Vec<String> = self
            .mem_init
            .iter()
            .map(|(addr, value)| format!("{addr}={value}"))
            .collect();

        let mut labels: Vec<(&String, &usize)> = self.labels.iter().collect();
        labels.sort_by_key(|(_, index)| **index);
        let labels: Vec<String> = labels
            .into_iter()
            .map(|(name, index)| format!("{name}={index}"))
            .collect();

        format!(
            "CODE: {}\nSYMS: {}\nMEM_INIT: {}\nLABELS: {}\n",
            code.join(" "),
            syms.join(" "),
            mem_init.join(" "),
            labels.join(" ")
        )
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut syms: Vec<(&String, &usize)> = self.sym_addrs.iter().collect();
        syms.sort_by_key(|(_, addr)| **addr);
        let symbols: Vec<serde_json::Value> = syms
            .into_iter()
            .map(|(name, addr)| json!({ "name": name, "address": addr }))
            .collect();
        let mem_init: Vec<serde_json::Value> = self
            .mem_init
            .iter()
            .map(|(addr, value)| json!({ "address": addr, "value": value }))
            .collect();
        let mut labels: Vec<(&String, &usize)> = self.labels.iter().collect();
        labels.sort_by_key(|(_, index)| **index);
        let labels: Vec<serde_json::Value> = labels
            .into_iter()
            .map(|(name, index)| json!({ "name": name, "index": index }))
            .collect();
        json!({
            "code": self.code,
            "symbols": symbols,
            "mem_init": mem_init,
            "labels": labels,
        })
    }
}

/// Assembled instruction records with the label map and referenced symbols.
#[derive(Debug)]
pub struct Assembler {
    instructions: Vec<AsmInstr>,
    labels: BTreeMap<String, usize>,
    syms: BTreeSet<String>,
}

impl Assembler {
    /// Scan an instruction stream: record labels, collect memory symbols.
    pub fn assemble(lines: &[AsmInstr]) -> Result<Self, LinkError> {
        let mut instructions = Vec::new();
        let mut labels = BTreeMap::new();
        let mut syms = BTreeSet::new();
        for instr in lines {
            if instr.mnemonic == Mnemonic::Label {
                let name = instr.operand.clone().ok_or_else(|| {
                    LinkError::new("LABEL without a name")
                })?;
                labels.insert(name, instructions.len());
                continue;
            }
            if instr.mnemonic.is_memory_ref() {
                if let Some(operand) = &instr.operand {
                    if operand.parse::<i64>().is_err() {
                        syms.insert(operand.clone());
                    }
                }
            }
            instructions.push(instr.clone());
        }
        Ok(Self {
            instructions,
            labels,
            syms,
        })
    }

    /// Scan textual assembly; blank lines and `#` comments are skipped.
    pub fn assemble_text(text: &str) -> Result<Self, LinkError> {
        let mut lines = Vec::new();
        for raw in text.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let instr: AsmInstr = line
                .parse()
                .map_err(|err: crate::asm::AsmParseError| LinkError::new(err.message))?;
            lines.push(instr);
        }
        Self::assemble(&lines)
    }

    /// Assign memory addresses and resolve operands into bytecode.
    ///
    /// Layout order is deterministic: constants first (smallest value
    /// first), then program variables lexicographically, then temporaries
    /// by numeric suffix.
    pub fn link(
        self,
        const_values: &BTreeMap<String, i64>,
    ) -> Result<MachineProgram, LinkError> {
        let mut all_syms: BTreeSet<String> = self.syms.clone();
        all_syms.extend(const_values.keys().cloned());

        let mut constants: Vec<(&str, i64)> = Vec::new();
        let mut variables: Vec<&str> = Vec::new();
        let mut temporaries: Vec<(&str, u64)> = Vec::new();
        for name in &all_syms {
            if let Some(value) = const_values.get(name) {
                constants.push((name.as_str(), *value));
            } else if let Some(suffix) = temp_suffix(name) {
                temporaries.push((name.as_str(), suffix));
            } else {
                variables.push(name.as_str());
            }
        }
        constants.sort_by_key(|(_, value)| *value);
        temporaries.sort_by_key(|(_, suffix)| *suffix);

        let mut sym_addrs = BTreeMap::new();
        let mut mem_init = BTreeMap::new();
        let mut addr = 0usize;
        for (name, value) in constants {
            sym_addrs.insert(name.to_string(), addr);
            mem_init.insert(addr, value);
            addr += 1;
        }
        for name in variables {
            sym_addrs.insert(name.to_string(), addr);
            addr += 1;
        }
        for (name, _) in temporaries {
            sym_addrs.insert(name.to_string(), addr);
            addr += 1;
        }

        let mut code = Vec::with_capacity(self.instructions.len() * 2);
        for instr in &self.instructions {
            let opcode = instr.mnemonic.opcode().ok_or_else(|| {
                LinkError::new(format!(
                    "Mnemonic {} has no opcode",
                    instr.mnemonic.as_str()
                ))
            })?;
            let operand = self.resolve_operand(instr, &sym_addrs)?;
            code.push(opcode);
            code.push(operand);
        }

        Ok(MachineProgram {
            code,
            sym_addrs,
            mem_init,
            labels: self.labels,
        })
    }

    fn resolve_operand(
        &self,
        instr: &AsmInstr,
        sym_addrs: &BTreeMap<String, usize>,
    ) -> Result<i64, LinkError> {
        let mnemonic = instr.mnemonic;
        if mnemonic == Mnemonic::Halt {
            return Ok(-1);
        }
        let operand = instr.operand.as_deref().ok_or_else(|| {
            LinkError::new(format!(
                "Mnemonic {} is missing its operand",
                mnemonic.as_str()
            ))
        })?;
        if mnemonic.is_jump() {
            return self
                .labels
                .get(operand)
                .map(|index| *index as i64)
                .ok_or_else(|| LinkError::new(format!("Unresolved label: {operand}")));
        }
        if let Some(addr) = sym_addrs.get(operand) {
            return Ok(*addr as i64);
        }
        // Raw numeric addresses are accepted in hand-written listings.
        if let Ok(value) = operand.parse::<i64>() {
            return Ok(value);
        }
        Err(LinkError::new(format!("Unresolved symbol: {operand}")))
    }
}

fn temp_suffix(name: &str) -> Option<u64> {
    let rest = name.strip_prefix('t')?;
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

/// Build the `const_<k>` value map the linker consumes.
pub fn const_value_map(consts: &BTreeSet<i64>) -> BTreeMap<String, i64> {
    consts
        .iter()
        .map(|value| (format!("const_{value}"), *value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::{self, AsmProgram};
    use crate::ir;
    use crate::lexer::tokenize;
    use crate::parser::Parser;

    fn lower(source: &str) -> AsmProgram {
        let program = Parser::new(tokenize(source).expect("lex failure"))
            .parse()
            .expect("parse failure");
        asm::generate(&ir::generate(&program))
    }

    fn link_source(source: &str) -> MachineProgram {
        let asm = lower(source);
        Assembler::assemble(&asm.lines)
            .expect("assemble failure")
            .link(&const_value_map(&asm.consts))
            .expect("link failure")
    }

    #[test]
    fn labels_do_not_occupy_code_space() {
        let asm = lower("read c; if c { print 1; } else { print 0; } end");
        let assembler = Assembler::assemble(&asm.lines).expect("assemble failure");
        let label_count = asm
            .lines
            .iter()
            .filter(|l| l.mnemonic == Mnemonic::Label)
            .count();
        let machine = assembler.link(&const_value_map(&asm.consts)).expect("link failure");
        assert_eq!(
            machine.code.len(),
            (asm.lines.len() - label_count) * 2
        );
    }

    #[test]
    fn layout_orders_constants_variables_then_temporaries() {
        // Uses constants 0/1/3, variables a/x, temporaries t1/t2.
        let machine = link_source("read a; x = a < 3; end");
        let addr = |name: &str| machine.sym_addrs[name];
        assert_eq!(addr("const_0"), 0);
        assert_eq!(addr("const_1"), 1);
        assert_eq!(addr("const_3"), 2);
        assert_eq!(addr("a"), 3);
        assert_eq!(addr("x"), 4);
        assert_eq!(addr("t1"), 5);
        assert_eq!(addr("t2"), 6);
    }

    #[test]
    fn temporaries_sort_by_numeric_suffix_not_text() {
        let mut lines = Vec::new();
        for idx in 1..=12 {
            lines.push(AsmInstr::new(Mnemonic::Load, format!("t{idx}")));
        }
        lines.push(AsmInstr::bare(Mnemonic::Halt));
        let machine = Assembler::assemble(&lines)
            .expect("assemble failure")
            .link(&BTreeMap::new())
            .expect("link failure");
        assert!(machine.sym_addrs["t2"] < machine.sym_addrs["t10"]);
        assert!(machine.sym_addrs["t9"] < machine.sym_addrs["t12"]);
    }

    #[test]
    fn constants_are_preloaded_in_memory() {
        let machine = link_source("x = 5; end");
        let addr = machine.sym_addrs["const_5"];
        assert_eq!(machine.mem_init[&addr], 5);
    }

    #[test]
    fn every_jump_resolves_to_a_valid_instruction_index() {
        let machine =
            link_source("read a; i = 0; while i < a { print i; i = i + 1; } end");
        let instr_count = machine.code.len() / 2;
        for pair in machine.code.chunks(2) {
            let (op, arg) = (pair[0], pair[1]);
            if (crate::vm::OP_JMP..=crate::vm::OP_JNE).contains(&op) {
                assert!(arg >= 0 && (arg as usize) <= instr_count, "jump {arg} out of range");
            }
        }
    }

    #[test]
    fn every_memory_operand_resolves_to_a_valid_address() {
        let machine =
            link_source("read a; i = 0; while i < a { print i; i = i + 1; } end");
        let mem_size = machine.memory_size();
        for pair in machine.code.chunks(2) {
            let (op, arg) = (pair[0], pair[1]);
            let memory_op = matches!(
                op,
                crate::vm::OP_LOAD
                    | crate::vm::OP_STORE
                    | crate::vm::OP_ADD
                    | crate::vm::OP_SUB
                    | crate::vm::OP_MUL
                    | crate::vm::OP_DIV
                    | crate::vm::OP_IN
                    | crate::vm::OP_OUT
            );
            if memory_op {
                assert!(arg >= 0 && (arg as usize) < mem_size, "address {arg} out of range");
            }
        }
    }

    #[test]
    fn unresolved_jump_label_is_a_link_error() {
        let lines = vec![AsmInstr::new(Mnemonic::Jmp, "NOWHERE")];
        let err = Assembler::assemble(&lines)
            .expect("assemble failure")
            .link(&BTreeMap::new())
            .unwrap_err();
        assert!(err.message.contains("Unresolved label: NOWHERE"));
    }

    #[test]
    fn halt_operand_is_minus_one() {
        let machine = link_source("end");
        assert_eq!(machine.code, vec![crate::vm::OP_HALT, -1]);
        assert_eq!(machine.labels["END"], 0);
    }

    #[test]
    fn assemble_text_skips_blanks_and_comments() {
        let text = "# header\n\nLOAD a\nSTORE b\n  # tail\nHALT\n";
        let assembler = Assembler::assemble_text(text).expect("assemble failure");
        let machine = assembler.link(&BTreeMap::new()).expect("link failure");
        assert_eq!(machine.code.len(), 6);
        assert_eq!(machine.sym_addrs.len(), 2);
    }

    #[test]
    fn assemble_text_rejects_unknown_mnemonics() {
        let err = Assembler::assemble_text("FLY away\n").unwrap_err();
        assert!(err.message.contains("Unknown mnemonic"));
    }

    #[test]
    fn text_form_is_stable_and_ordered() {
        let machine = link_source("x = 5; end");
        let text = machine.to_text();
        assert!(text.starts_with("CODE: "));
        assert!(text.contains("SYMS: const_5=0 x=1 t1=2"));
        assert!(text.contains("MEM_INIT: 0=5"));
        assert!(text.contains("LABELS: END=4"));
    }

    #[test]
    fn json_form_lists_symbols_by_address() {
        let machine = link_source("x = 5; end");
        let value = machine.to_json();
        let symbols = value["symbols"].as_array().expect("symbols array");
        assert_eq!(symbols[0]["name"], "const_5");
        assert_eq!(symbols[0]["address"], 0);
        assert_eq!(value["code"].as_array().expect("code array").len(), machine.code.len());
    }
}
