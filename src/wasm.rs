//! WebAssembly bindings.
//!
//! JavaScript-friendly wrappers around the machine, for a browser front end
//! that animates each micro-step.

use wasm_bindgen::prelude::*;
use crate::cpu::{Event, Machine, Recorder};
use crate::asm::assembler::assemble;
use crate::asm::disasm::disassemble_word;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// WebAssembly-friendly machine wrapper.
#[wasm_bindgen]
pub struct WasmMachine {
    machine: Machine<Recorder>,
    program: Vec<i32>,
    highlight: usize,
}

#[wasm_bindgen]
impl WasmMachine {
    /// Create a machine with `size` memory cells.
    #[wasm_bindgen(constructor)]
    pub fn new(size: usize) -> Result<WasmMachine, JsError> {
        let machine = Machine::with_observer(size, Recorder::new())
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        Ok(Self {
            machine,
            program: Vec::new(),
            highlight: 0,
        })
    }

    /// Load a program from assembly source code. Returns the word count.
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str) -> Result<usize, JsError> {
        let words = assemble(source)
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        self.load_words(words)
    }

    /// Load raw memory words.
    #[wasm_bindgen]
    pub fn load_words(&mut self, words: Vec<i32>) -> Result<usize, JsError> {
        self.machine.load_memory(&words)
            .map_err(|e| JsError::new(&format!("{}", e)))?;
        let len = words.len();
        self.program = words;
        self.drain();
        Ok(len)
    }

    /// Perform one micro-step. Returns the trace lines it produced.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let result = self.machine.step();
        let lines = self.drain();
        result.map_err(|e| JsError::new(&format!("{}", e)))?;
        Ok(lines.join("\n"))
    }

    /// Step to the start of the next instruction.
    #[wasm_bindgen]
    pub fn step_instruction(&mut self) -> Result<String, JsError> {
        let result = self.machine.step_instruction();
        let lines = self.drain();
        result.map_err(|e| JsError::new(&format!("{}", e)))?;
        Ok(lines.join("\n"))
    }

    /// Run until halt, BREAK, or `max_steps` micro-steps. Returns the step count.
    #[wasm_bindgen]
    pub fn run(&mut self, max_steps: u32) -> Result<u64, JsError> {
        let result = self.machine.run(max_steps as u64);
        self.drain();
        result.map_err(|e| JsError::new(&format!("{}", e)))?;
        Ok(self.machine.steps())
    }

    /// Reset and reload the last loaded program.
    #[wasm_bindgen]
    pub fn reset(&mut self) -> Result<(), JsError> {
        self.machine.reset();
        let result = if self.program.is_empty() {
            Ok(())
        } else {
            self.machine.load_memory(&self.program)
        };
        self.drain();
        result.map_err(|e| JsError::new(&format!("{}", e)))
    }

    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.machine.is_halted()
    }

    /// Current phase name (FETCH, INDIRECT, EXECUTE or HALT).
    #[wasm_bindgen]
    pub fn phase(&self) -> String {
        self.machine.phase().label().to_string()
    }

    #[wasm_bindgen]
    pub fn steps(&self) -> u64 {
        self.machine.steps()
    }

    #[wasm_bindgen]
    pub fn pc(&self) -> usize {
        self.machine.registers().program_counter
    }

    #[wasm_bindgen]
    pub fn accumulator(&self) -> i32 {
        self.machine.registers().accumulator
    }

    /// Microcode line of the last micro-step.
    #[wasm_bindgen]
    pub fn highlight_line(&self) -> usize {
        self.highlight
    }

    /// Get memory cell value at index, or 0 when out of range.
    #[wasm_bindgen]
    pub fn memory_at(&self, index: usize) -> i32 {
        self.machine.memory().get(index).copied().unwrap_or(0)
    }

    /// All memory cells as a typed array.
    #[wasm_bindgen]
    pub fn memory_all(&self) -> js_sys::Int32Array {
        js_sys::Int32Array::from(self.machine.memory())
    }

    /// Registers and counters as a JSON string.
    #[wasm_bindgen]
    pub fn registers_json(&self) -> Result<String, JsError> {
        let snapshot = self.machine.snapshot();
        serde_json::to_string(&serde_json::json!({
            "registers": snapshot.registers,
            "instruction": snapshot.instruction.to_string(),
            "steps": snapshot.steps,
            "instructions": snapshot.instructions,
        }))
        .map_err(|e| JsError::new(&format!("{}", e)))
    }

    /// Take recorded events, keeping the highlight and returning trace lines.
    fn drain(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        for event in self.machine.observer_mut().drain() {
            match event {
                Event::Trace { line } => lines.push(line),
                Event::Highlight { op } => self.highlight = op.line(),
                _ => {}
            }
        }
        lines
    }
}

/// Assemble source code and return the word count.
#[wasm_bindgen]
pub fn wasm_assemble(source: &str) -> Result<usize, JsError> {
    let words = assemble(source)
        .map_err(|e| JsError::new(&format!("{}", e)))?;
    Ok(words.len())
}

/// Disassemble a single memory word.
#[wasm_bindgen]
pub fn wasm_disassemble(value: i32) -> String {
    disassemble_word(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(size: usize) -> WasmMachine {
        match WasmMachine::new(size) {
            Ok(m) => m,
            Err(_) => panic!("failed to create machine"),
        }
    }

    #[test]
    fn test_reset_reloads_program() {
        let mut wasm = machine(8);
        assert!(wasm.load_asm("LOADM 5\nHALT").is_ok());
        let first = wasm.memory_at(0);
        assert!(wasm.run(100).is_ok());
        assert!(wasm.is_halted());
        assert_eq!(wasm.accumulator(), 5);

        assert!(wasm.reset().is_ok());
        assert!(!wasm.is_halted());
        assert_eq!(wasm.accumulator(), 0);
        assert_eq!(wasm.memory_at(0), first);
        assert_eq!(wasm.phase(), "FETCH");
    }

    #[test]
    fn test_reset_without_program() {
        let mut wasm = machine(4);
        assert!(wasm.reset().is_ok());
        assert_eq!(wasm.memory_at(0), 0);
    }
}
