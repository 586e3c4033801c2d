//! CPU emulation for the Intel 4004.
//!
//! This module implements the instruction-level 4004 core:
//! - 16 four-bit index registers, addressable as 8 register pairs
//! - 4-bit accumulator and 1-bit carry flag
//! - 12-bit program counter and a 3-level call stack
//! - the documented MCS-4 instruction set, fetched from an external ROM
//!
//! The core never touches storage directly. Program bytes, data memory and
//! IO go through the capability traits in [`ports`].

pub mod registers;
pub mod stack;
pub mod ports;
pub mod decode;
pub mod diagnostic;
pub mod execute;
pub mod memory;
pub mod io;

pub use registers::Registers;
pub use stack::CallStack;
pub use ports::{DataMemory, IoPort, Ports, ProgramMemory};
pub use decode::{decode, encode, instruction_length, Instruction};
pub use diagnostic::Diagnostic;
pub use execute::{Cpu, CyclePhase, Step};
pub use memory::{MemoryError, Ram, Rom};
pub use io::IoBoard;

/// Mask for a 4-bit value.
pub const NIBBLE_MASK: u8 = 0x0F;

/// Mask for a 12-bit ROM address.
pub const ADDRESS_MASK: u16 = 0x0FFF;

/// Size of the 12-bit program address space.
pub const ADDRESS_SPACE: usize = 4096;
