//! Two-pass assembler.
//!
//! Syntax:
//! ```text
//! ; Comment
//! LOOP:           ; Define a label
//!     LOAD 10     ; ACC := M[10]
//!     ADDM 1      ; ACC := ACC + 1
//!     ADDI PTR    ; ACC := ACC + M[M[PTR]]
//!     JMPNEM LOOP ; Branch to LOOP if ACC != 0
//!     HALT
//!
//!     ORG 50      ; Set origin address
//! PTR: DAT 42     ; Define data value
//! ```
//!
//! Mnemonics and labels are case-insensitive. Operands are decimal, `0x`
//! hex, or a label; labels may be used before they are defined.

use crate::cpu::decode::{encode, AddrMode, Opcode, OPERAND_MAX};
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to a memory image starting at address 0.
pub fn assemble(source: &str) -> Result<Vec<i32>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// What to patch once a label is known.
#[derive(Debug, Clone, Copy)]
enum Patch {
    /// Re-encode an instruction with the label as its operand.
    Operand(Opcode),
    /// Store the label's address as a data word.
    Data,
}

#[derive(Debug)]
struct Fixup {
    addr: usize,
    label: String,
    line: usize,
    patch: Patch,
}

/// An operand as written in the source.
enum Value {
    Number(i64),
    Label(String),
}

/// The assembler state.
struct Assembler {
    /// Address of the next emitted word.
    current_addr: usize,
    /// Symbol table (label -> address).
    symbols: HashMap<String, usize>,
    /// Forward references to resolve in pass 2.
    pending: Vec<Fixup>,
    /// Output words, indexed by address.
    output: Vec<i32>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            current_addr: 0,
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<i32>, AssemblerError> {
        // Pass 1: collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: patch label references
        self.resolve_references()?;

        Ok(std::mem::take(&mut self.output))
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments
        let line = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        }
        .trim();

        if line.is_empty() {
            return Ok(());
        }

        // Label definition, optionally followed by an instruction
        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_uppercase();
            if !is_identifier(&label) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid label '{}'", label),
                });
            }
            if self.symbols.insert(label.clone(), self.current_addr).is_some() {
                return Err(AssemblerError::DuplicateLabel { line: line_num, label });
            }

            let rest = line[colon_idx + 1..].trim();
            if !rest.is_empty() {
                return self.process_instruction(rest, line_num);
            }
            return Ok(());
        }

        self.process_instruction(line, line_num)
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let mnemonic = parts[0].to_uppercase();
        if parts.len() > 2 {
            return Err(AssemblerError::SyntaxError {
                line: line_num,
                message: format!("unexpected '{}'", parts[2]),
            });
        }
        let operand = parts.get(1).copied();

        match mnemonic.as_str() {
            // Directives
            "ORG" => {
                let value = self.require(operand, "ORG requires an address", line_num)?;
                match parse_value(value, line_num)? {
                    Value::Number(n) if (0..=OPERAND_MAX as i64).contains(&n) => {
                        self.current_addr = n as usize
                    }
                    Value::Number(n) => {
                        return Err(AssemblerError::ValueOutOfRange { line: line_num, value: n })
                    }
                    Value::Label(_) => {
                        return Err(AssemblerError::SyntaxError {
                            line: line_num,
                            message: "ORG requires a numeric address".into(),
                        })
                    }
                }
            }

            "DAT" | "DATA" => {
                let value = self.require(operand, "DAT requires a value", line_num)?;
                match parse_value(value, line_num)? {
                    Value::Number(n) => {
                        let word = data_word(n).ok_or(AssemblerError::ValueOutOfRange {
                            line: line_num,
                            value: n,
                        })?;
                        self.emit(word, line_num)?;
                    }
                    Value::Label(label) => {
                        self.defer(label, line_num, Patch::Data);
                        self.emit(0, line_num)?;
                    }
                }
            }

            // Instructions
            _ => {
                let opcode = Opcode::from_mnemonic(&mnemonic).ok_or_else(|| {
                    AssemblerError::UnknownMnemonic {
                        line: line_num,
                        mnemonic: mnemonic.clone(),
                    }
                })?;
                let word = self.parse_instruction(opcode, operand, line_num)?;
                self.emit(word, line_num)?;
            }
        }

        Ok(())
    }

    fn parse_instruction(
        &mut self,
        opcode: Opcode,
        operand: Option<&str>,
        line_num: usize,
    ) -> Result<i32, AssemblerError> {
        if opcode.mode() == AddrMode::Implied {
            if let Some(op) = operand {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("{} takes no operand, found '{}'", opcode, op),
                });
            }
            return Ok(encode(opcode, 0));
        }

        let message = format!("{} requires an operand", opcode);
        let text = self.require(operand, &message, line_num)?;
        match parse_value(text, line_num)? {
            Value::Number(n) if (0..=OPERAND_MAX as i64).contains(&n) => Ok(encode(opcode, n as u32)),
            Value::Number(n) => Err(AssemblerError::ValueOutOfRange { line: line_num, value: n }),
            Value::Label(label) => {
                self.defer(label, line_num, Patch::Operand(opcode));
                Ok(encode(opcode, 0))
            }
        }
    }

    fn require<'a>(
        &self,
        operand: Option<&'a str>,
        message: &str,
        line_num: usize,
    ) -> Result<&'a str, AssemblerError> {
        operand.ok_or_else(|| AssemblerError::SyntaxError {
            line: line_num,
            message: message.into(),
        })
    }

    fn defer(&mut self, label: String, line: usize, patch: Patch) {
        self.pending.push(Fixup {
            addr: self.current_addr,
            label,
            line,
            patch,
        });
    }

    /// Write a word at the current address. Addresses stop at the operand range.
    fn emit(&mut self, word: i32, line_num: usize) -> Result<(), AssemblerError> {
        if self.current_addr > OPERAND_MAX as usize {
            return Err(AssemblerError::ValueOutOfRange {
                line: line_num,
                value: self.current_addr as i64,
            });
        }
        if self.output.len() <= self.current_addr {
            self.output.resize(self.current_addr + 1, 0);
        }
        self.output[self.current_addr] = word;
        self.current_addr += 1;
        Ok(())
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for fixup in &self.pending {
            let addr = *self.symbols.get(&fixup.label).ok_or_else(|| {
                AssemblerError::UndefinedLabel {
                    line: fixup.line,
                    label: fixup.label.clone(),
                }
            })?;

            self.output[fixup.addr] = match fixup.patch {
                Patch::Operand(opcode) => {
                    if addr as u64 > OPERAND_MAX as u64 {
                        return Err(AssemblerError::ValueOutOfRange {
                            line: fixup.line,
                            value: addr as i64,
                        });
                    }
                    encode(opcode, addr as u32)
                }
                Patch::Data => addr as i32,
            };
        }
        Ok(())
    }
}

/// Parse a numeric literal or label reference.
fn parse_value(text: &str, line_num: usize) -> Result<Value, AssemblerError> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let parsed = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else if digits.starts_with(|c: char| c.is_ascii_digit()) {
        digits.parse::<i64>().ok()
    } else if !negative && is_identifier(text) {
        return Ok(Value::Label(text.to_uppercase()));
    } else {
        None
    };

    parsed
        .map(|n| Value::Number(if negative { -n } else { n }))
        .ok_or_else(|| AssemblerError::SyntaxError {
            line: line_num,
            message: format!("invalid operand '{}'", text),
        })
}

/// A data word may be any `i32`, or a `u32` bit pattern such as `0xFFFFFFFF`.
fn data_word(n: i64) -> Option<i32> {
    i32::try_from(n)
        .ok()
        .or_else(|| u32::try_from(n).ok().map(|u| u as i32))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: i64 },
}
