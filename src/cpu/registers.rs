//! 4004 index registers.
//!
//! The 4004 has 16 four-bit index registers R0-R15. For 8-bit operations
//! (FIM, SRC, FIN, JIN) they are grouped into 8 pairs P0-P7, where pair `i`
//! is made of R(2i) as the low nibble and R(2i+1) as the high nibble.

use crate::cpu::NIBBLE_MASK;
use serde::{Serialize, Deserialize};

/// Number of index registers.
pub const REGISTER_COUNT: usize = 16;

/// Number of register pairs.
pub const PAIR_COUNT: usize = 8;

/// The 4004 index register file.
///
/// Every write is masked to 4 bits, so a register never holds a value
/// outside 0..=15.
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Registers {
    cells: [u8; REGISTER_COUNT],
}

impl Registers {
    /// Create a register file with all registers zeroed.
    pub const fn new() -> Self {
        Self { cells: [0; REGISTER_COUNT] }
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        self.cells = [0; REGISTER_COUNT];
    }

    /// Read register `index` (0-15).
    #[inline]
    pub fn get(&self, index: u8) -> u8 {
        self.cells[usize::from(index & 0x0F)]
    }

    /// Write register `index` (0-15), masking the value to 4 bits.
    #[inline]
    pub fn set(&mut self, index: u8, value: u8) {
        self.cells[usize::from(index & 0x0F)] = value & NIBBLE_MASK;
    }

    /// Increment register `index` modulo 16 and return the new value.
    pub fn increment(&mut self, index: u8) -> u8 {
        let value = self.get(index).wrapping_add(1) & NIBBLE_MASK;
        self.set(index, value);
        value
    }

    /// Read pair `index` (0-7) as an 8-bit value.
    pub fn pair(&self, index: u8) -> u8 {
        let base = (index & 0x07) * 2;
        let low = self.get(base);
        let high = self.get(base + 1);
        (high << 4) | low
    }

    /// Write an 8-bit value into pair `index` (0-7).
    pub fn set_pair(&mut self, index: u8, value: u8) {
        let base = (index & 0x07) * 2;
        self.set(base, value & 0x0F);
        self.set(base + 1, value >> 4);
    }

    /// All 16 registers in order.
    pub fn as_array(&self) -> &[u8; REGISTER_COUNT] {
        &self.cells
    }

    /// Check that every register holds a nibble.
    pub fn validate(&self) -> Result<(), String> {
        match self.cells.iter().position(|v| *v > NIBBLE_MASK) {
            Some(i) => Err(format!("R{} holds 0x{:X}", i, self.cells[i])),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "R=[")?;
        for (i, cell) in self.cells.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:X}", cell)?;
        }
        write!(f, "]")
    }
}
