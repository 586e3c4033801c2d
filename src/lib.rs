//! # Intel 4004 Emulator
//!
//! An instruction-level emulator of the Intel 4004, the 4-bit CPU of the
//! MCS-4 family (1971).
//!
//! The [`cpu`] module holds the core: decoder, execution engine and the
//! two-phase fetch/execute state machine. It reaches ROM, RAM and IO only
//! through capability traits, so it can be wired to any board. [`machine`]
//! wires it to reference ROM, RAM and IO implementations.

pub mod cpu;
pub mod machine;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use cpu::{Cpu, CyclePhase, Diagnostic, Instruction, IoBoard, Ports, Ram, Registers, Rom, Step};
pub use machine::{Machine, RunSummary, SnapshotError};
pub use asm::{assemble, disassemble, AssemblerError, ImageError, RomImage, load_hex, save_hex};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
