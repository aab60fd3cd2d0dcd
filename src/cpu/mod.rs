//! The machine core.
//!
//! - N cells of 32-bit signed memory holding code and data
//! - registers: ACC, VR, IR, PC, AR and the jump flag
//! - 51 opcodes: 8-bit opcode, 24-bit operand, direct/indirect/immediate addressing
//! - a micro-stepped FETCH -> INDIRECT -> EXECUTE cycle with an observer port

pub mod memory;
pub mod registers;
pub mod decode;
pub mod observer;
pub mod execute;

pub use memory::{Memory, MemoryError, MAX_CELLS};
pub use registers::{Phase, Register, Registers};
pub use decode::{decode, encode, AddrMode, AluOp, Condition, Instruction, Opcode, Operation};
pub use observer::{Event, HaltReason, LogObserver, MicroOp, NullObserver, Observer, Recorder, MICROCODE};
pub use execute::{Machine, MachineError, RunOutcome, Snapshot};
