//! TUI debugger for the 4004 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Disassembly following the program counter
//! - Register, stack and counter view
//! - View of the selected RAM bank
//! - Step/run/breakpoint controls

mod app;
mod ui;

pub use app::{DebuggerApp, run_debugger};
