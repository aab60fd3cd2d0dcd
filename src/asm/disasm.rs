//! Disassembler.
//!
//! Converts memory words back to readable assembly. Words whose opcode byte
//! is not in the table are shown as data.

use crate::cpu::decode::{decode, opcode_byte, Opcode};

/// Disassemble a single word to text.
pub fn disassemble_word(word: i32) -> String {
    match Opcode::try_from_byte(opcode_byte(word)) {
        Some(_) => decode(word).to_string(),
        None => format!("DAT {}", word),
    }
}

/// Disassemble a memory image into a listing.
pub fn disassemble(words: &[i32]) -> String {
    let mut output = String::new();
    output.push_str("; Disassembly\n");
    output.push_str("; -----------\n\n");

    for (addr, &word) in words.iter().enumerate() {
        let line = disassemble_word(word);
        output.push_str(&format!("{:04}: {:<16} ; 0x{:08X}\n", addr, line, word as u32));
    }

    output
}
