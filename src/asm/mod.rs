//! Assembler and disassembler for 4004 programs.
//!
//! This module provides:
//! - A two-pass assembler (text → ROM image)
//! - A disassembler (ROM bytes → readable text)
//! - The hex text image format used to store programs

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, disassemble_instruction};
pub use image::{load_binary, load_hex, parse_hex, save_hex, to_hex_string, ImageError, RomImage};
