//! TUI debugger.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register file and phase display
//! - Microcode listing with the active transfer highlighted
//! - Memory and disassembly views
//! - Micro-step, instruction-step, run and breakpoint controls

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
