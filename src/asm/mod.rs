//! Program authoring tools.
//!
//! This module provides:
//! - A two-pass assembler (text -> memory words)
//! - A disassembler (memory words -> text)
//! - Program image files (JSON or plain text)

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, disassemble_word};
pub use image::{ProgramImage, ImageError, load_image, save_image};
