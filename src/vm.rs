// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Virtual machine interpreting linked accumulator bytecode.
//!
//! The bytecode is a flat integer array of `[opcode, operand]` pairs. The
//! program counter advances in slots of two; jump operands are instruction
//! indices that the VM multiplies by 2 on use. Both conventions are part of
//! the external contract: any consumer of an emitted machine program must
//! implement this exact opcode table.

use std::fmt;

use crate::link::MachineProgram;

pub const OP_LOAD: i64 = 1;
pub const OP_STORE: i64 = 2;
pub const OP_ADD: i64 = 3;
pub const OP_SUB: i64 = 4;
pub const OP_MUL: i64 = 5;
pub const OP_DIV: i64 = 6;
pub const OP_JMP: i64 = 7;
pub const OP_JLT: i64 = 8;
pub const OP_JGT: i64 = 9;
pub const OP_JLE: i64 = 10;
pub const OP_JGE: i64 = 11;
pub const OP_JEQ: i64 = 12;
pub const OP_JNE: i64 = 13;
pub const OP_IN: i64 = 14;
pub const OP_OUT: i64 = 15;
pub const OP_HALT: i64 = 16;

/// Runtime failures surfaced as structured results, distinct from a normal
/// `HALT` termination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    DivideByZero { pc: usize },
    InputExhausted { pc: usize },
    UnknownOpcode { opcode: i64, pc: usize },
    MemoryFault { address: i64, pc: usize },
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::DivideByZero { pc } => {
                write!(f, "Division by zero at pc={pc}")
            }
            RuntimeError::InputExhausted { pc } => {
                write!(f, "Input exhausted at pc={pc}")
            }
            RuntimeError::UnknownOpcode { opcode, pc } => {
                write!(f, "Unknown opcode {opcode} at pc={pc}")
            }
            RuntimeError::MemoryFault { address, pc } => {
                write!(f, "Memory reference out of range ({address}) at pc={pc}")
            }
        }
    }
}

impl std::error::Error for RuntimeError {}

/// Input callback for `IN`: `None` means the source ran dry.
pub type InputProvider = Box<dyn FnMut() -> Option<i64>>;

/// Provider draining a pre-supplied batch of inputs.
pub fn batch_input(values: Vec<i64>) -> InputProvider {
    let mut iter = values.into_iter();
    Box::new(move || iter.next())
}

/// One trace record per executed instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    pub pc_before: usize,
    pub op: i64,
    pub arg: i64,
    pub acc: i64,
    pub mem: Vec<i64>,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mem: Vec<String> = self.mem.iter().map(|v| v.to_string()).collect();
        write!(
            f,
            "pc={} op={} arg={} acc={} mem=[{}]",
            self.pc_before,
            self.op,
            self.arg,
            self.acc,
            mem.join(" ")
        )
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmResult {
    pub outputs: Vec<i64>,
    pub trace: Option<Vec<TraceEntry>>,
}

const TRACE_MEM_CELLS: usize = 32;

/// Interpreter state for a single `run()`. The machine program is borrowed
/// read-only; memory is pre-sized at construction and never grows.
pub struct Vm<'a> {
    code: &'a [i64],
    pc: usize,
    acc: i64,
    mem: Vec<i64>,
    outputs: Vec<i64>,
    trace: Option<Vec<TraceEntry>>,
    input: InputProvider,
}

impl<'a> Vm<'a> {
    pub fn new(program: &'a MachineProgram, input: InputProvider, trace: bool) -> Self {
        let mut mem = vec![0i64; program.memory_size()];
        for (addr, value) in program.mem_init.iter() {
            if *addr < mem.len() {
                mem[*addr] = *value;
            }
        }
        Self {
            code: &program.code,
            pc: 0,
            acc: 0,
            mem,
            outputs: Vec::new(),
            trace: if trace { Some(Vec::new()) } else { None },
            input,
        }
    }

    /// Fetch-decode-execute until `HALT`, the end of code, or a runtime
    /// error.
    pub fn run(mut self) -> Result<VmResult, RuntimeError> {
        while self.pc < self.code.len() {
            let pc_before = self.pc;
            let op = self.code[self.pc];
            let arg = self.code.get(self.pc + 1).copied().unwrap_or(-1);
            self.pc += 2;

            match op {
                OP_LOAD => self.acc = self.mem_read(arg, pc_before)?,
                OP_STORE => self.mem_write(arg, self.acc, pc_before)?,
                OP_ADD => {
                    self.acc = self.acc.wrapping_add(self.mem_read(arg, pc_before)?);
                }
                OP_SUB => {
                    self.acc = self.acc.wrapping_sub(self.mem_read(arg, pc_before)?);
                }
                OP_MUL => {
                    self.acc = self.acc.wrapping_mul(self.mem_read(arg, pc_before)?);
                }
                OP_DIV => {
                    let divisor = self.mem_read(arg, pc_before)?;
                    if divisor == 0 {
                        return Err(RuntimeError::DivideByZero { pc: pc_before });
                    }
                    self.acc = self.acc.wrapping_div(divisor);
                }
                OP_JMP => self.jump(arg, pc_before)?,
                OP_JLT => {
                    if self.acc < 0 {
                        self.jump(arg, pc_before)?;
                    }
                }
                OP_JGT => {
                    if self.acc > 0 {
                        self.jump(arg, pc_before)?;
                    }
                }
                OP_JLE => {
                    if self.acc <= 0 {
                        self.jump(arg, pc_before)?;
                    }
                }
                OP_JGE => {
                    if self.acc >= 0 {
                        self.jump(arg, pc_before)?;
                    }
                }
                OP_JEQ => {
                    if self.acc == 0 {
                        self.jump(arg, pc_before)?;
                    }
                }
                OP_JNE => {
                    if self.acc != 0 {
                        self.jump(arg, pc_before)?;
                    }
                }
                OP_IN => {
                    let value = (self.input)()
                        .ok_or(RuntimeError::InputExhausted { pc: pc_before })?;
                    self.mem_write(arg, value, pc_before)?;
                }
                OP_OUT => {
                    let value = self.mem_read(arg, pc_before)?;
                    self.outputs.push(value);
                }
                OP_HALT => break,
                _ => {
                    return Err(RuntimeError::UnknownOpcode {
                        opcode: op,
                        pc: pc_before,
                    });
                }
            }

            if let Some(trace) = &mut self.trace {
                let cells = self.mem.len().min(TRACE_MEM_CELLS);
                trace.push(TraceEntry {
                    pc_before,
                    op,
                    arg,
                    acc: self.acc,
                    mem: self.mem[..cells].to_vec(),
                });
            }
        }
        Ok(VmResult {
            outputs: self.outputs,
            trace: self.trace,
        })
    }

    fn addr(&self, arg: i64, pc: usize) -> Result<usize, RuntimeError> {
        let addr = usize::try_from(arg).map_err(|_| RuntimeError::MemoryFault {
            address: arg,
            pc,
        })?;
        if addr >= self.mem.len() {
            return Err(RuntimeError::MemoryFault { address: arg, pc });
        }
        Ok(addr)
    }

    fn mem_read(&self, arg: i64, pc: usize) -> Result<i64, RuntimeError> {
        Ok(self.mem[self.addr(arg, pc)?])
    }

    fn mem_write(&mut self, arg: i64, value: i64, pc: usize) -> Result<(), RuntimeError> {
        let addr = self.addr(arg, pc)?;
        self.mem[addr] = value;
        Ok(())
    }

    /// Jump operands are instruction indices; convert to a slot index.
    fn jump(&mut self, arg: i64, pc: usize) -> Result<(), RuntimeError> {
        let index = usize::try_from(arg).map_err(|_| RuntimeError::MemoryFault {
            address: arg,
            pc,
        })?;
        self.pc = index * 2;
        Ok(())
    }
}
