//! Register file of the machine.
//!
//! - ACC: 32-bit accumulator (primary ALU operand and result)
//! - VR: 32-bit value register (second ALU operand)
//! - IR: instruction register (raw encoded word)
//! - PC: program counter
//! - AR: address register (resolved operand address)
//! - jump flag: result of the last conditional test
//!
//! plus the micro-step counter and the current cycle phase.

use serde::{Serialize, Deserialize};
use std::fmt;

/// Coarse state of the instruction cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    /// Load the next instruction word into IR.
    #[default]
    Fetch,
    /// Decode and resolve the operand address.
    Indirect,
    /// Perform the data or control effect.
    Execute,
    /// Terminal; only a reset leaves it.
    Halt,
}

impl Phase {
    /// Display label used in traces and front ends.
    pub const fn label(self) -> &'static str {
        match self {
            Phase::Fetch => "FETCH",
            Phase::Indirect => "INDIRECT",
            Phase::Execute => "EXECUTE",
            Phase::Halt => "HALT",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Identifies an observable register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    Accumulator,
    Value,
    Instruction,
    ProgramCounter,
    Address,
    JumpFlag,
}

impl Register {
    /// All observable registers in display order.
    pub const ALL: [Register; 6] = [
        Register::Accumulator,
        Register::Value,
        Register::Instruction,
        Register::ProgramCounter,
        Register::Address,
        Register::JumpFlag,
    ];

    /// Short name.
    pub const fn name(self) -> &'static str {
        match self {
            Register::Accumulator => "ACC",
            Register::Value => "VR",
            Register::Instruction => "IR",
            Register::ProgramCounter => "PC",
            Register::Address => "AR",
            Register::JumpFlag => "JF",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The register file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// ACC: primary ALU operand/result
    pub accumulator: i32,

    /// VR: secondary ALU operand, from memory or the immediate field
    pub value: i32,

    /// IR: the currently fetched encoded instruction word
    pub instruction: i32,

    /// PC: address of the next instruction, always in `[0, N)`
    pub program_counter: usize,

    /// AR: resolved operand address, always in `[0, N)`
    pub address: usize,

    /// Result of the last conditional test, consumed by branch resolution.
    pub jmp_flag: bool,

    /// Sub-step index within the current phase.
    pub micro: u8,

    /// Current cycle phase.
    pub phase: Phase,
}

impl Registers {
    /// Create a register file with all values zeroed, phase FETCH.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all registers to zero and the phase to FETCH.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Read an observable register as a wide integer.
    pub fn get(&self, reg: Register) -> i64 {
        match reg {
            Register::Accumulator => self.accumulator as i64,
            Register::Value => self.value as i64,
            Register::Instruction => self.instruction as i64,
            Register::ProgramCounter => self.program_counter as i64,
            Register::Address => self.address as i64,
            Register::JumpFlag => self.jmp_flag as i64,
        }
    }
}
