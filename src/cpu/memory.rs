//! Main memory of the machine.
//!
//! A fixed number of 32-bit signed cells holding both code and data.
//! Addresses loaded from operands or pointers are reduced into range with
//! [`Memory::wrap`]; the program counter is never wrapped (see the cycle
//! engine).

use super::decode::OPERAND_MAX;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Largest memory an operand can address: the full 24-bit range.
pub const MAX_CELLS: usize = OPERAND_MAX as usize + 1;

/// Fixed-size word memory.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<i32>,
}

impl Memory {
    /// Create a zeroed memory of `size` cells.
    pub fn new(size: usize) -> Result<Self, MemoryError> {
        if size == 0 {
            return Err(MemoryError::Empty);
        }
        if size > MAX_CELLS {
            return Err(MemoryError::TooLarge { size, max: MAX_CELLS });
        }
        Ok(Self {
            cells: vec![0; size],
        })
    }

    /// Number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always false: zero-sized memories are rejected at construction.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Read a cell.
    ///
    /// # Panics
    /// Panics if `addr` is out of range. Engine addresses are always
    /// produced by [`Memory::wrap`] or bounded by the program counter policy.
    #[inline]
    pub fn read(&self, addr: usize) -> i32 {
        assert!(addr < self.cells.len(), "memory address {} out of range (0-{})", addr, self.cells.len() - 1);
        self.cells[addr]
    }

    /// Write a cell.
    ///
    /// # Panics
    /// Panics if `addr` is out of range.
    #[inline]
    pub fn write(&mut self, addr: usize, value: i32) {
        assert!(addr < self.cells.len(), "memory address {} out of range (0-{})", addr, self.cells.len() - 1);
        self.cells[addr] = value;
    }

    /// Checked read for callers holding untrusted addresses.
    pub fn get(&self, addr: usize) -> Result<i32, MemoryError> {
        self.cells
            .get(addr)
            .copied()
            .ok_or(MemoryError::AddressOutOfRange { addr, size: self.cells.len() })
    }

    /// Reduce an arbitrary value into `[0, len)` using Euclidean modulo.
    #[inline]
    pub fn wrap(&self, value: i64) -> usize {
        value.rem_euclid(self.cells.len() as i64) as usize
    }

    /// Zero every cell.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Replace the contents wholesale. Cells past the end of `words` are zeroed.
    pub fn load(&mut self, words: &[i32]) -> Result<(), MemoryError> {
        if words.len() > self.cells.len() {
            return Err(MemoryError::ProgramTooLarge {
                size: words.len(),
                available: self.cells.len(),
            });
        }
        self.cells.fill(0);
        self.cells[..words.len()].copy_from_slice(words);
        Ok(())
    }

    /// The full cell array.
    pub fn cells(&self) -> &[i32] {
        &self.cells
    }

    /// Dump a window of memory (for debugging).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, i32)> {
        let end = start.saturating_add(count).min(self.cells.len());
        (start.min(end)..end).map(|i| (i, self.cells[i])).collect()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&c| c != 0).count();
        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &self.cells.len())
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("memory size must be at least one cell")]
    Empty,

    #[error("memory size {size} exceeds the addressable {max} cells")]
    TooLarge { size: usize, max: usize },

    #[error("memory address {addr} out of range (0-{})", size.saturating_sub(1))]
    AddressOutOfRange { addr: usize, size: usize },

    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}
