//! Reference ROM and RAM collaborators.
//!
//! The 4004 addresses 4 KiB of program ROM through its 12-bit program
//! counter. Data RAM is reached indirectly: SRC latches an 8-bit address
//! and DCL picks one of four banks.

use crate::cpu::ports::{DataMemory, ProgramMemory};
use crate::cpu::{ADDRESS_MASK, ADDRESS_SPACE, NIBBLE_MASK};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Number of RAM banks selectable by DCL.
pub const RAM_BANKS: usize = 4;

/// Characters per RAM bank.
pub const RAM_CHARACTERS: usize = 16;

/// Nibbles per character.
pub const RAM_NIBBLES: usize = 4;

/// Program ROM: 4096 bytes, zero-filled (NOP).
#[derive(Clone, Serialize, Deserialize)]
pub struct Rom {
    bytes: Vec<u8>,
}

impl Rom {
    pub fn new() -> Self {
        Self {
            bytes: vec![0; ADDRESS_SPACE],
        }
    }

    /// Read a byte, masking the address to 12 bits.
    #[inline]
    pub fn read(&self, address: u16) -> u8 {
        self.bytes[usize::from(address & ADDRESS_MASK)]
    }

    /// Write a single byte, masking the address to 12 bits.
    #[inline]
    pub fn write(&mut self, address: u16, value: u8) {
        self.bytes[usize::from(address & ADDRESS_MASK)] = value;
    }

    /// Load a program starting at `start`.
    pub fn load_program(&mut self, start: u16, program: &[u8]) -> Result<(), MemoryError> {
        let start = usize::from(start);
        if start + program.len() > ADDRESS_SPACE {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available: ADDRESS_SPACE.saturating_sub(start),
            });
        }

        self.bytes[start..start + program.len()].copy_from_slice(program);
        Ok(())
    }

    /// Fill the whole ROM with NOPs.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Check that a deserialized ROM covers the whole address space.
    pub fn validate(&self) -> Result<(), String> {
        if self.bytes.len() != ADDRESS_SPACE {
            return Err(format!("ROM holds {} bytes, expected {}", self.bytes.len(), ADDRESS_SPACE));
        }
        Ok(())
    }

    /// Bytes in `start..start + count`, clipped to the address space.
    pub fn dump(&self, start: u16, count: usize) -> &[u8] {
        let start = usize::from(start & ADDRESS_MASK);
        let end = (start + count).min(ADDRESS_SPACE);
        &self.bytes[start..end]
    }
}

impl Default for Rom {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgramMemory for Rom {
    fn read_program_byte(&self, address: u16) -> u8 {
        self.read(address)
    }
}

impl std::fmt::Debug for Rom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.bytes.iter().filter(|b| **b != 0).count();

        f.debug_struct("Rom")
            .field("non_zero_bytes", &non_zero)
            .field("total_bytes", &ADDRESS_SPACE)
            .finish()
    }
}

/// Data RAM: 4 banks of 16 characters, 4 nibbles each.
///
/// An SRC address is split as character = bits 7-4 and nibble = bits 3-2.
/// Bits 1-0 are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ram {
    banks: [[[u8; RAM_NIBBLES]; RAM_CHARACTERS]; RAM_BANKS],
    bank: u8,
    character: u8,
    nibble: u8,
}

impl Ram {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently selected bank (0-3).
    pub fn bank(&self) -> u8 {
        self.bank
    }

    /// Currently selected character (0-15).
    pub fn character(&self) -> u8 {
        self.character
    }

    /// Currently selected nibble within the character (0-3).
    pub fn nibble(&self) -> u8 {
        self.nibble
    }

    /// Read a cell directly, bypassing the selection latches.
    pub fn peek(&self, bank: u8, character: u8, nibble: u8) -> u8 {
        self.banks[usize::from(bank) % RAM_BANKS][usize::from(character) % RAM_CHARACTERS]
            [usize::from(nibble) % RAM_NIBBLES]
    }

    /// Write a cell directly, bypassing the selection latches.
    pub fn poke(&mut self, bank: u8, character: u8, nibble: u8, value: u8) {
        self.banks[usize::from(bank) % RAM_BANKS][usize::from(character) % RAM_CHARACTERS]
            [usize::from(nibble) % RAM_NIBBLES] = value & NIBBLE_MASK;
    }

    /// Zero every cell and the selection latches.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Check latches and cells of a deserialized RAM.
    pub fn validate(&self) -> Result<(), String> {
        if usize::from(self.bank) >= RAM_BANKS
            || usize::from(self.character) >= RAM_CHARACTERS
            || usize::from(self.nibble) >= RAM_NIBBLES
        {
            return Err(format!(
                "RAM selection {}/{}/{} out of range",
                self.bank, self.character, self.nibble
            ));
        }
        if self.banks.iter().flatten().flatten().any(|v| *v > NIBBLE_MASK) {
            return Err("RAM cell holds more than 4 bits".into());
        }
        Ok(())
    }
}

impl DataMemory for Ram {
    fn set_data_address(&mut self, value: u8) {
        self.character = value >> 4;
        self.nibble = (value >> 2) & 0x03;
    }

    fn read_data_nibble(&mut self) -> u8 {
        self.peek(self.bank, self.character, self.nibble)
    }

    fn write_data_nibble(&mut self, value: u8) {
        self.poke(self.bank, self.character, self.nibble, value);
    }

    fn select_ram_bank(&mut self, bank: u8) {
        self.bank = bank & 0x03;
        tracing::debug!("selected RAM bank {}", self.bank);
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rom_load_and_read() {
        let mut rom = Rom::new();
        rom.load_program(0x200, &[0xD5, 0xB1]).unwrap();

        assert_eq!(rom.read(0x200), 0xD5);
        assert_eq!(rom.read(0x201), 0xB1);
        assert_eq!(rom.read(0x202), 0x00);

        // Addresses wrap at 12 bits
        assert_eq!(rom.read(0x1200), 0xD5);
    }

    #[test]
    fn test_rom_bounds() {
        let mut rom = Rom::new();
        assert!(rom.load_program(0xFFE, &[1, 2]).is_ok());
        assert_eq!(
            rom.load_program(0xFFE, &[1, 2, 3]),
            Err(MemoryError::ProgramTooLarge { size: 3, available: 2 })
        );
    }

    #[test]
    fn test_rom_clear() {
        let mut rom = Rom::new();
        rom.load_program(0x10, &[0xD5, 0xB1]).unwrap();
        rom.clear();

        assert_eq!(rom.dump(0x10, 2), &[0, 0]);
        assert!(rom.validate().is_ok());
    }

    #[test]
    fn test_ram_address_decoding() {
        let mut ram = Ram::new();
        let cases = [(0x13, 0x1, 0x0), (0x24, 0x2, 0x1), (0x3C, 0x3, 0x3), (0xF0, 0xF, 0x0)];

        for (address, character, nibble) in cases {
            ram.set_data_address(address);
            assert_eq!(ram.character(), character, "address 0x{:02X}", address);
            assert_eq!(ram.nibble(), nibble, "address 0x{:02X}", address);
        }
    }

    #[test]
    fn test_ram_write_read() {
        let mut ram = Ram::new();
        ram.set_data_address(0x15);
        ram.write_data_nibble(0x19);

        assert_eq!(ram.read_data_nibble(), 0x9);
        assert_eq!(ram.peek(0, 1, 1), 0x9);
    }

    #[test]
    fn test_ram_banks_are_separate() {
        let mut ram = Ram::new();
        ram.set_data_address(0x00);
        ram.write_data_nibble(7);

        ram.select_ram_bank(2);
        assert_eq!(ram.read_data_nibble(), 0);
        ram.write_data_nibble(3);

        // Only two bits of the bank select are kept
        ram.select_ram_bank(4);
        assert_eq!(ram.bank(), 0);
        assert_eq!(ram.read_data_nibble(), 7);
        assert_eq!(ram.peek(2, 0, 0), 3);
    }
}
