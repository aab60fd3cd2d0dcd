//! Instruction codec.
//!
//! An instruction is a 32-bit word: the top 8 bits select the opcode and
//! the low 24 bits are an unsigned operand. The opcode byte indexes a fixed
//! table of (operation, addressing mode) pairs; bytes past the end of the
//! table decode to `NOP`.
//!
//! ```text
//!  31      24 23                             0
//! +----------+--------------------------------+
//! |  opcode  |           operand24            |
//! +----------+--------------------------------+
//! ```

use serde::{Serialize, Deserialize};
use std::fmt;

/// Mask selecting the operand field of an instruction word.
pub const OPERAND_MASK: u32 = 0x00FF_FFFF;

/// Largest value the operand field can hold.
pub const OPERAND_MAX: u32 = OPERAND_MASK;

/// How the operand field is interpreted.
///
/// The mode is orthogonal to the [`Operation`]: the cycle engine resolves
/// addresses by mode and performs effects by operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddrMode {
    /// Operand is a memory address (no mnemonic suffix).
    Direct,
    /// Operand points at a cell holding the real address (`I` suffix).
    Indirect,
    /// Operand is the value or target itself (`M` suffix).
    Immediate,
    /// No operand at all (NOP, HALT, BREAK, NOT).
    Implied,
}

impl AddrMode {
    /// Mnemonic suffix.
    pub const fn suffix(self) -> &'static str {
        match self {
            AddrMode::Direct | AddrMode::Implied => "",
            AddrMode::Indirect => "I",
            AddrMode::Immediate => "M",
        }
    }

    /// Whether the INDIRECT phase loads the operand into the address register.
    pub const fn needs_address(self) -> bool {
        matches!(self, AddrMode::Direct | AddrMode::Indirect)
    }

    /// Number of INDIRECT micro-steps this mode takes.
    pub const fn resolve_steps(self) -> u8 {
        match self {
            AddrMode::Indirect => 2,
            _ => 1,
        }
    }
}

/// Binary ALU operations. All take ACC and VR and leave the result in ACC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AluOp {
    Add,
    Sub,
    Mult,
    Div,
    Mod,
    And,
    Or,
}

impl AluOp {
    pub const ALL: [AluOp; 7] = [
        AluOp::Add,
        AluOp::Sub,
        AluOp::Mult,
        AluOp::Div,
        AluOp::Mod,
        AluOp::And,
        AluOp::Or,
    ];

    /// Apply the operation with 32-bit wraparound.
    ///
    /// Returns `None` when dividing or taking the remainder by zero.
    pub fn apply(self, acc: i32, value: i32) -> Option<i32> {
        if self.divides() && value == 0 {
            return None;
        }
        Some(match self {
            AluOp::Add => acc.wrapping_add(value),
            AluOp::Sub => acc.wrapping_sub(value),
            AluOp::Mult => acc.wrapping_mul(value),
            AluOp::Div => acc.wrapping_div(value),
            AluOp::Mod => acc.wrapping_rem(value),
            AluOp::And => acc & value,
            AluOp::Or => acc | value,
        })
    }

    /// Whether a zero VR is a fault for this operation.
    pub const fn divides(self) -> bool {
        matches!(self, AluOp::Div | AluOp::Mod)
    }

    pub const fn name(self) -> &'static str {
        match self {
            AluOp::Add => "ADD",
            AluOp::Sub => "SUB",
            AluOp::Mult => "MULT",
            AluOp::Div => "DIV",
            AluOp::Mod => "MOD",
            AluOp::And => "AND",
            AluOp::Or => "OR",
        }
    }
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Predicates of the conditional jumps, all testing ACC against zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl Condition {
    pub const ALL: [Condition; 6] = [
        Condition::Eq,
        Condition::Ne,
        Condition::Gt,
        Condition::Lt,
        Condition::Ge,
        Condition::Le,
    ];

    /// Evaluate the predicate against the accumulator.
    pub const fn test(self, acc: i32) -> bool {
        match self {
            Condition::Eq => acc == 0,
            Condition::Ne => acc != 0,
            Condition::Gt => acc > 0,
            Condition::Lt => acc < 0,
            Condition::Ge => acc >= 0,
            Condition::Le => acc <= 0,
        }
    }

    /// Relational operator, e.g. `>=` for `Ge`.
    pub const fn symbol(self) -> &'static str {
        match self {
            Condition::Eq => "==",
            Condition::Ne => "!=",
            Condition::Gt => ">",
            Condition::Lt => "<",
            Condition::Ge => ">=",
            Condition::Le => "<=",
        }
    }
}

/// What an instruction does, independent of addressing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Nop,
    Halt,
    /// Debug pause: notifies the observer, then continues.
    Break,
    /// ACC := operand value
    Load,
    /// [AR] := ACC
    Store,
    /// ACC := ACC op VR
    Alu(AluOp),
    /// ACC := !ACC
    Not,
    /// PC := target
    Jump,
    /// PC := target if the condition holds, otherwise PC + 1
    JumpIf(Condition),
}

/// A decoded opcode: an operation paired with an addressing mode.
///
/// Only the combinations listed in the opcode table exist; there is no
/// `STOREM`, and implied-mode operations have no suffixed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Opcode {
    operation: Operation,
    mode: AddrMode,
}

const fn op(operation: Operation, mode: AddrMode) -> Opcode {
    Opcode { operation, mode }
}

use AddrMode::{Direct as D, Immediate as M, Implied, Indirect as I};

/// The opcode table; the index is the opcode byte.
const OPCODES: [Opcode; 51] = [
    op(Operation::Nop, Implied),
    op(Operation::Halt, Implied),
    op(Operation::Break, Implied),
    op(Operation::Load, D),
    op(Operation::Load, I),
    op(Operation::Load, M),
    op(Operation::Store, D),
    op(Operation::Store, I),
    op(Operation::Alu(AluOp::Add), D),
    op(Operation::Alu(AluOp::Add), I),
    op(Operation::Alu(AluOp::Add), M),
    op(Operation::Alu(AluOp::Sub), D),
    op(Operation::Alu(AluOp::Sub), I),
    op(Operation::Alu(AluOp::Sub), M),
    op(Operation::Alu(AluOp::Mult), D),
    op(Operation::Alu(AluOp::Mult), I),
    op(Operation::Alu(AluOp::Mult), M),
    op(Operation::Alu(AluOp::Div), D),
    op(Operation::Alu(AluOp::Div), I),
    op(Operation::Alu(AluOp::Div), M),
    op(Operation::Alu(AluOp::Mod), D),
    op(Operation::Alu(AluOp::Mod), I),
    op(Operation::Alu(AluOp::Mod), M),
    op(Operation::Alu(AluOp::And), D),
    op(Operation::Alu(AluOp::And), I),
    op(Operation::Alu(AluOp::And), M),
    op(Operation::Alu(AluOp::Or), D),
    op(Operation::Alu(AluOp::Or), I),
    op(Operation::Alu(AluOp::Or), M),
    op(Operation::Not, Implied),
    op(Operation::Jump, D),
    op(Operation::Jump, I),
    op(Operation::Jump, M),
    op(Operation::JumpIf(Condition::Eq), D),
    op(Operation::JumpIf(Condition::Eq), I),
    op(Operation::JumpIf(Condition::Eq), M),
    op(Operation::JumpIf(Condition::Ne), D),
    op(Operation::JumpIf(Condition::Ne), I),
    op(Operation::JumpIf(Condition::Ne), M),
    op(Operation::JumpIf(Condition::Gt), D),
    op(Operation::JumpIf(Condition::Gt), I),
    op(Operation::JumpIf(Condition::Gt), M),
    op(Operation::JumpIf(Condition::Lt), D),
    op(Operation::JumpIf(Condition::Lt), I),
    op(Operation::JumpIf(Condition::Lt), M),
    op(Operation::JumpIf(Condition::Ge), D),
    op(Operation::JumpIf(Condition::Ge), I),
    op(Operation::JumpIf(Condition::Ge), M),
    op(Operation::JumpIf(Condition::Le), D),
    op(Operation::JumpIf(Condition::Le), I),
    op(Operation::JumpIf(Condition::Le), M),
];

/// Mnemonics, parallel to [`OPCODES`].
const MNEMONICS: [&str; 51] = [
    "NOP", "HALT", "BREAK",
    "LOAD", "LOADI", "LOADM",
    "STORE", "STOREI",
    "ADD", "ADDI", "ADDM",
    "SUB", "SUBI", "SUBM",
    "MULT", "MULTI", "MULTM",
    "DIV", "DIVI", "DIVM",
    "MOD", "MODI", "MODM",
    "AND", "ANDI", "ANDM",
    "OR", "ORI", "ORM",
    "NOT",
    "JMP", "JMPI", "JMPM",
    "JMPEQ", "JMPEQI", "JMPEQM",
    "JMPNE", "JMPNEI", "JMPNEM",
    "JMPGT", "JMPGTI", "JMPGTM",
    "JMPLT", "JMPLTI", "JMPLTM",
    "JMPGE", "JMPGEI", "JMPGEM",
    "JMPLE", "JMPLEI", "JMPLEM",
];

impl Opcode {
    /// Number of defined opcodes.
    pub const COUNT: usize = OPCODES.len();

    pub const NOP: Opcode = op(Operation::Nop, Implied);
    pub const HALT: Opcode = op(Operation::Halt, Implied);
    pub const BREAK: Opcode = op(Operation::Break, Implied);
    pub const NOT: Opcode = op(Operation::Not, Implied);

    /// Look up a table entry for an operation and addressing mode.
    pub fn new(operation: Operation, mode: AddrMode) -> Option<Self> {
        let candidate = op(operation, mode);
        OPCODES.contains(&candidate).then_some(candidate)
    }

    /// Decode an opcode byte, or `None` if it is not in the table.
    pub fn try_from_byte(byte: u8) -> Option<Self> {
        OPCODES.get(byte as usize).copied()
    }

    /// Decode an opcode byte. Unknown bytes decode to `NOP`.
    pub fn from_byte(byte: u8) -> Self {
        Self::try_from_byte(byte).unwrap_or(Self::NOP)
    }

    /// The opcode byte.
    pub fn byte(self) -> u8 {
        OPCODES
            .iter()
            .position(|&o| o == self)
            .map_or(0, |i| i as u8)
    }

    pub fn operation(self) -> Operation {
        self.operation
    }

    pub fn mode(self) -> AddrMode {
        self.mode
    }

    /// Assembly mnemonic, e.g. `JMPGEI`.
    pub fn mnemonic(self) -> &'static str {
        MNEMONICS[self.byte() as usize]
    }

    /// Look up an opcode by mnemonic (case-insensitive).
    pub fn from_mnemonic(mnemonic: &str) -> Option<Self> {
        MNEMONICS
            .iter()
            .position(|m| m.eq_ignore_ascii_case(mnemonic))
            .map(|i| OPCODES[i])
    }

    /// Every defined opcode in byte order.
    pub fn all() -> impl Iterator<Item = Opcode> {
        OPCODES.into_iter()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A decoded instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    /// Low 24 bits of the word; an address or an immediate value.
    pub operand: u32,
}

impl Instruction {
    pub fn new(opcode: Opcode, operand: u32) -> Self {
        Self {
            opcode,
            operand: operand & OPERAND_MASK,
        }
    }

    /// Encode back to a memory word.
    pub fn encode(&self) -> i32 {
        encode(self.opcode, self.operand)
    }
}

impl Default for Instruction {
    fn default() -> Self {
        Self::new(Opcode::NOP, 0)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.opcode.mode() == AddrMode::Implied {
            write!(f, "{}", self.opcode)
        } else {
            write!(f, "{} {}", self.opcode, self.operand)
        }
    }
}

/// Raw opcode byte of a word: the top byte, rotated down and masked.
#[inline]
pub fn opcode_byte(word: i32) -> u8 {
    ((word as u32).rotate_right(24) & 0xFF) as u8
}

/// Raw operand field of a word.
#[inline]
pub fn operand(word: i32) -> u32 {
    word as u32 & OPERAND_MASK
}

/// Decode a word. Never fails: unknown opcode bytes yield `NOP`.
pub fn decode(word: i32) -> Instruction {
    Instruction {
        opcode: Opcode::from_byte(opcode_byte(word)),
        operand: operand(word),
    }
}

/// Encode an opcode and operand into a word. The operand is truncated to 24 bits.
pub fn encode(opcode: Opcode, operand: u32) -> i32 {
    (((opcode.byte() as u32) << 24) | (operand & OPERAND_MASK)) as i32
}
