//! Disassembler for 4004 programs.
//!
//! Converts ROM bytes back to assembler text that [`assemble`](super::assemble)
//! accepts.

use crate::cpu::decode::{decode, Instruction};
use std::fmt;

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.mnemonic();
        match *self {
            Instruction::Jcn { condition, address } => write!(f, "{} {}, 0x{:02X}", name, condition, address),
            Instruction::Fim { pair, data } => write!(f, "{} P{}, 0x{:02X}", name, pair, data),
            Instruction::Src { pair } | Instruction::Fin { pair } | Instruction::Jin { pair } => {
                write!(f, "{} P{}", name, pair)
            }
            Instruction::Jun { address } | Instruction::Jms { address } => {
                write!(f, "{} 0x{:03X}", name, address)
            }
            Instruction::Isz { register, address } => write!(f, "{} R{}, 0x{:02X}", name, register, address),
            Instruction::Inc { register }
            | Instruction::Add { register }
            | Instruction::Sub { register }
            | Instruction::Ld { register }
            | Instruction::Xch { register } => write!(f, "{} R{}", name, register),
            Instruction::Bbl { data } | Instruction::Ldm { data } => write!(f, "{} {}", name, data),
            Instruction::Unknown { opcode } => write!(f, "??? 0x{:02X}", opcode),
            _ => f.write_str(name),
        }
    }
}

/// Decode the instruction at `offset` in `bytes`.
///
/// Returns the instruction and its length. A two-byte instruction cut off
/// by the end of the slice reads its operand as 0x00.
pub fn disassemble_instruction(bytes: &[u8], offset: usize) -> (Instruction, usize) {
    let opcode = bytes.get(offset).copied().unwrap_or(0x00);
    let mut len = 1;
    let instr = decode(opcode, || {
        let byte = bytes.get(offset + len).copied().unwrap_or(0x00);
        len += 1;
        byte
    });
    (instr, len)
}

/// Disassemble a byte slice loaded at `origin` into an annotated listing.
pub fn disassemble(bytes: &[u8], origin: u16) -> String {
    let mut output = String::new();
    output.push_str("; 4004 disassembly\n");
    output.push_str("; -----------------\n\n");

    let mut offset = 0;
    while offset < bytes.len() {
        let (instr, len) = disassemble_instruction(bytes, offset);
        let end = (offset + len).min(bytes.len());
        let raw: Vec<String> = bytes[offset..end].iter().map(|b| format!("{:02X}", b)).collect();

        output.push_str(&format!(
            "{:03X}: {:<6} {}\n",
            usize::from(origin) + offset,
            raw.join(" "),
            instr
        ));
        offset += len;
    }

    output
}
