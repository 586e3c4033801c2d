//! Debugger application state and logic.

use crate::asm::disasm::disassemble_instruction;
use crate::{Machine, RomImage};
use std::collections::HashSet;

/// Bytes of ROM the disassembly view follows before it re-centers on PC.
const VIEW_WINDOW: u16 = 24;

/// Instructions executed per frame while running.
const STEPS_PER_TICK: usize = 64;

/// Debugger application state.
pub struct DebuggerApp {
    /// The board being debugged.
    pub machine: Machine,
    /// Breakpoints (by ROM address).
    pub breakpoints: HashSet<u16>,
    /// Is the debugger running continuously?
    pub running: bool,
    /// Should we quit?
    pub should_quit: bool,
    /// Status message to display.
    pub status: String,
    /// First address shown in the disassembly view.
    view_start: u16,
}

impl DebuggerApp {
    /// Create a new debugger with a loaded program.
    pub fn new(image: &RomImage) -> Self {
        let mut machine = Machine::new();
        let status = match machine.load_image(image) {
            Ok(()) => "Ready. Press 's' to step, 'r' to run, 'q' to quit.".to_string(),
            Err(e) => format!("Load failed: {}", e),
        };

        Self {
            machine,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status,
            view_start: image.origin,
        }
    }

    /// Step one instruction.
    pub fn step(&mut self) {
        let (address, instr, diagnostic) = self.machine.step_instruction();
        match diagnostic {
            Some(diag) => {
                self.status = format!("{:03X}: {}  [{}]", address, instr, diag);
                self.running = false;
            }
            None => self.status = format!("{:03X}: {}", address, instr),
        }
        self.follow_pc();
    }

    /// Start continuous execution.
    pub fn run(&mut self) {
        self.running = true;
        self.status = "Running...".into();

        // Leave a breakpoint we are sitting on
        if self.breakpoints.contains(&self.machine.cpu.pc()) {
            self.step();
        }
    }

    /// Run one batch of continuous execution.
    pub fn tick(&mut self) {
        for _ in 0..STEPS_PER_TICK {
            if !self.running {
                return;
            }

            let pc = self.machine.cpu.pc();
            if self.breakpoints.contains(&pc) {
                self.running = false;
                self.status = format!("Breakpoint at PC={:03X}", pc);
                return;
            }

            self.step();
        }
    }

    /// Toggle breakpoint at current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.machine.cpu.pc();
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at PC={:03X}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at PC={:03X}", pc);
        }
    }

    /// Reset the board; ROM and breakpoints are kept.
    pub fn reset(&mut self) {
        self.machine.reset();
        self.running = false;
        self.view_start = self.machine.cpu.pc();
        self.status = "Reset. Ready.".into();
    }

    /// Disassembly listing from the view start: (address, text, is_pc).
    pub fn get_disassembly(&self, lines: usize) -> Vec<(u16, String, bool)> {
        let pc = self.machine.cpu.pc();
        let mut addr = self.view_start;
        let mut listing = Vec::with_capacity(lines);

        while listing.len() < lines && usize::from(addr) < crate::cpu::ADDRESS_SPACE {
            let (instr, len) = disassemble_instruction(self.machine.rom.dump(addr, 2), 0);
            listing.push((addr, instr.to_string(), addr == pc));
            addr += len as u16;
        }

        listing
    }

    fn follow_pc(&mut self) {
        let pc = self.machine.cpu.pc();
        if pc < self.view_start || pc >= self.view_start.saturating_add(VIEW_WINDOW) {
            self.view_start = pc;
        }
    }
}

/// Run the debugger with a program.
pub fn run_debugger(image: &RomImage) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(image);

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => {
                            app.running = false;
                            app.status = "Paused.".into();
                        }
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        _ => {}
                    }
                }
            }
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}
