//! Non-fatal conditions reported by the execution engine.
//!
//! The core never stops on its own. Each of these is returned to the caller
//! (and logged at `warn`), and the embedding host decides whether to halt.

use serde::{Serialize, Deserialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Diagnostic {
    /// The byte is not in the opcode map. It was executed as NOP.
    #[error("unknown opcode 0x{opcode:02X} at PC=0x{pc:03X}")]
    UnknownOpcode { opcode: u8, pc: u16 },

    /// JMS with all three frames live. The oldest return address was lost.
    #[error("call stack overflow at PC=0x{pc:03X}: return address 0x{overwritten:03X} overwritten")]
    StackOverflow { pc: u16, overwritten: u16 },

    /// BBL with no live frame. The stack cursor wrapped.
    #[error("call stack underflow at PC=0x{pc:03X}")]
    StackUnderflow { pc: u16 },
}

impl Diagnostic {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Diagnostic::UnknownOpcode { .. } => "unknown-opcode",
            Diagnostic::StackOverflow { .. } => "stack-overflow",
            Diagnostic::StackUnderflow { .. } => "stack-underflow",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_code() {
        let diag = Diagnostic::UnknownOpcode { opcode: 0xE3, pc: 0x201 };
        assert_eq!(diag.code(), "unknown-opcode");
        assert_eq!(diag.to_string(), "unknown opcode 0xE3 at PC=0x201");
    }
}
