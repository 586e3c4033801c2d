//! The 4004 three-level call stack.
//!
//! The hardware stack holds three 12-bit return addresses behind a single
//! cursor. Both directions wrap modulo 3: a fourth JMS overwrites the
//! oldest frame, and a BBL with no frame on the stack still pops whatever
//! slot the cursor lands on. [`CallStack::depth`] counts live frames so the
//! executor can report those cases without changing the wraparound.

use crate::cpu::ADDRESS_MASK;
use serde::{Serialize, Deserialize};

/// Number of stack slots.
pub const STACK_DEPTH: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallStack {
    slots: [u16; STACK_DEPTH],
    pointer: u8,
    depth: u8,
}

impl CallStack {
    pub const fn new() -> Self {
        Self {
            slots: [0; STACK_DEPTH],
            pointer: 0,
            depth: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Push a return address.
    ///
    /// Returns the address that was overwritten when all three frames were
    /// already live.
    pub fn push(&mut self, address: u16) -> Option<u16> {
        let slot = usize::from(self.pointer);
        let overwritten = self.is_full().then_some(self.slots[slot]);

        self.slots[slot] = address & ADDRESS_MASK;
        self.pointer = (self.pointer + 1) % STACK_DEPTH as u8;
        self.depth = (self.depth + 1).min(STACK_DEPTH as u8);

        overwritten
    }

    /// Pop a return address, wrapping the cursor below slot 0.
    pub fn pop(&mut self) -> u16 {
        self.pointer = (self.pointer + STACK_DEPTH as u8 - 1) % STACK_DEPTH as u8;
        self.depth = self.depth.saturating_sub(1);
        self.slots[usize::from(self.pointer)]
    }

    /// Cursor position in 0..3.
    pub fn pointer(&self) -> u8 {
        self.pointer
    }

    /// Number of live frames (0-3).
    pub fn depth(&self) -> u8 {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }

    pub fn is_full(&self) -> bool {
        usize::from(self.depth) == STACK_DEPTH
    }

    /// Raw slot contents, in slot order (not push order).
    pub fn slots(&self) -> &[u16; STACK_DEPTH] {
        &self.slots
    }

    /// Check a deserialized stack: cursor in 0..3, depth in 0..=3,
    /// 12-bit slots.
    pub fn validate(&self) -> Result<(), String> {
        if usize::from(self.pointer) >= STACK_DEPTH {
            return Err(format!("stack pointer {} out of range", self.pointer));
        }
        if usize::from(self.depth) > STACK_DEPTH {
            return Err(format!("stack depth {} out of range", self.depth));
        }
        if let Some(slot) = self.slots.iter().find(|a| **a > ADDRESS_MASK) {
            return Err(format!("stack slot 0x{:X} exceeds 12 bits", slot));
        }
        Ok(())
    }
}
