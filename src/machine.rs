//! A complete MCS-4 board: one 4004 wired to ROM, RAM and IO.

use crate::asm::RomImage;
use crate::cpu::{Cpu, Diagnostic, Instruction, IoBoard, MemoryError, Ports, Ram, Rom, Step};
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Result of a bounded [`Machine::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Full instructions executed during this run.
    pub instructions: u64,
    /// Diagnostics reported during this run, in order.
    pub diagnostics: Vec<Diagnostic>,
    /// True if the run ended early on a diagnostic.
    pub stopped_on_diagnostic: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Machine {
    pub cpu: Cpu,
    pub rom: Rom,
    pub ram: Ram,
    pub io: IoBoard,
    entry: u16,
}

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load an image into ROM and point the PC at its origin.
    pub fn load_image(&mut self, image: &RomImage) -> Result<(), MemoryError> {
        self.rom.load_program(image.origin, &image.bytes)?;
        self.set_entry(image.origin);
        Ok(())
    }

    /// Set the address the CPU starts from after a reset.
    pub fn set_entry(&mut self, entry: u16) {
        self.entry = entry;
        self.cpu.set_pc(entry);
    }

    /// Reset the CPU, RAM and IO latches. ROM contents are kept.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.cpu.set_pc(self.entry);
        self.ram.clear();
        self.io = IoBoard::new();
    }

    /// Advance by one half-cycle.
    pub fn step(&mut self) -> Step {
        let mut ports = Ports::new(&self.rom, &mut self.ram, &mut self.io);
        self.cpu.step(&mut ports)
    }

    /// Execute a single instruction directly, bypassing fetch.
    pub fn execute(&mut self, instr: Instruction) -> Option<Diagnostic> {
        let mut ports = Ports::new(&self.rom, &mut self.ram, &mut self.io);
        self.cpu.execute(instr, &mut ports)
    }

    /// Step until the next instruction has been executed.
    ///
    /// Returns the executed instruction, its address and any diagnostic.
    pub fn step_instruction(&mut self) -> (u16, Instruction, Option<Diagnostic>) {
        loop {
            if let Step::Executed { address, instruction, diagnostic } = self.step() {
                return (address, instruction, diagnostic);
            }
        }
    }

    /// Run at most `max_instructions` instructions.
    pub fn run(&mut self, max_instructions: u64, stop_on_diagnostic: bool) -> RunSummary {
        let mut summary = RunSummary {
            instructions: 0,
            diagnostics: Vec::new(),
            stopped_on_diagnostic: false,
        };

        while summary.instructions < max_instructions {
            let (_, _, diagnostic) = self.step_instruction();
            summary.instructions += 1;

            if let Some(diag) = diagnostic {
                summary.diagnostics.push(diag);
                if stop_on_diagnostic {
                    summary.stopped_on_diagnostic = true;
                    break;
                }
            }
        }

        summary
    }

    /// Serialize the whole board to JSON.
    pub fn snapshot(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Restore a board from [`Machine::snapshot`] output.
    ///
    /// Rejects snapshots whose state the CPU could never reach, such as a
    /// short ROM or a stack cursor outside its three slots.
    pub fn restore(json: &str) -> Result<Self, SnapshotError> {
        let machine: Self = serde_json::from_str(json)?;

        machine.cpu.validate()
            .and_then(|()| machine.rom.validate())
            .and_then(|()| machine.ram.validate())
            .and_then(|()| machine.io.validate())
            .map_err(SnapshotError::Inconsistent)?;
        if machine.entry > crate::cpu::ADDRESS_MASK {
            return Err(SnapshotError::Inconsistent(format!(
                "entry 0x{:X} exceeds 12 bits",
                machine.entry
            )));
        }

        Ok(machine)
    }
}

/// Errors that can occur while restoring a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid snapshot JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("inconsistent snapshot: {0}")]
    Inconsistent(String),
}
