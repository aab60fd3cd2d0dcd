//! # Von Neumann Simulator
//!
//! A micro-stepped simulator of a simple stored-program computer.
//!
//! One memory array holds both code and data. Each call to
//! [`Machine::step`] performs a single micro-step of the
//! FETCH / INDIRECT / EXECUTE cycle and reports every register, memory and
//! phase change through an [`Observer`], so a front end can animate the
//! machine one transfer at a time.
//!
//! ```
//! use vonneumann::{assemble, Machine, RunOutcome, HaltReason};
//!
//! let program = assemble("LOADM 3\nADDM 4\nHALT").unwrap();
//! let mut machine = Machine::new(16).unwrap();
//! machine.load_memory(&program).unwrap();
//! assert_eq!(machine.run(1000).unwrap(), RunOutcome::Stopped(HaltReason::Halt));
//! assert_eq!(machine.registers().accumulator, 7);
//! ```

pub mod cpu;
pub mod asm;
pub mod config;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use cpu::{
    Machine, MachineError, RunOutcome, HaltReason, Phase, Register, Registers,
    Observer, Recorder, Event, Instruction, Opcode, Memory,
};
pub use asm::{assemble, disassemble, AssemblerError, ProgramImage, load_image, save_image};
pub use config::MachineConfig;

#[cfg(feature = "tui")]
pub use tui::run_debugger;
