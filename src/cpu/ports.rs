//! Capability traits for everything outside the CPU core.
//!
//! The core only sees these traits. A board implements them for its ROM,
//! RAM and IO lines; [`Ports`] bundles borrowed implementations for the
//! duration of one `step` or `execute` call, so the same collaborators can
//! be shared between several CPUs as long as the caller serializes access.

/// Program storage (ROM).
pub trait ProgramMemory {
    /// Read the byte at a 12-bit address. Must not have side effects.
    fn read_program_byte(&self, address: u16) -> u8;
}

/// Data memory (RAM) selected by SRC and DCL.
pub trait DataMemory {
    /// Latch the 8-bit register-pair value sent by SRC. How it splits into
    /// chip, character and nibble is up to the implementation.
    fn set_data_address(&mut self, value: u8);

    /// Read the 4-bit cell at the selected address.
    fn read_data_nibble(&mut self) -> u8;

    /// Write a 4-bit value to the selected address.
    fn write_data_nibble(&mut self, value: u8);

    /// Select one of the RAM banks (DCL).
    fn select_ram_bank(&mut self, bank: u8);
}

/// IO lines: ports, RAM status channels and the TEST pin.
pub trait IoPort {
    fn read_input_port(&mut self, port: u8) -> u8;

    fn write_output_port(&mut self, port: u8, value: u8);

    /// Read status channel 0-3 (RD0-RD3).
    fn read_status_channel(&mut self, channel: u8) -> u8;

    /// Write status channel 0-3 (WR0-WR3).
    fn write_status_channel(&mut self, channel: u8, value: u8);

    /// Level of the TEST input pin, consulted only by JCN.
    fn test_input_pin(&mut self) -> bool;
}

/// Borrowed collaborators handed to [`Cpu::step`](crate::cpu::Cpu::step).
pub struct Ports<'a> {
    pub program: &'a dyn ProgramMemory,
    pub data: &'a mut dyn DataMemory,
    pub io: &'a mut dyn IoPort,
}

impl<'a> Ports<'a> {
    pub fn new(
        program: &'a dyn ProgramMemory,
        data: &'a mut dyn DataMemory,
        io: &'a mut dyn IoPort,
    ) -> Self {
        Self { program, data, io }
    }
}
