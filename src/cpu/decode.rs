//! Instruction decoder for the 4004.
//!
//! Instructions are one or two bytes. The high nibble of the first byte
//! (OPR) selects the instruction class, the low nibble (OPA) carries a
//! register, pair, condition, immediate or sub-opcode. JCN, FIM, JUN, JMS
//! and ISZ take a second byte.

use crate::cpu::{ADDRESS_MASK, NIBBLE_MASK};
use serde::{Serialize, Deserialize};

/// Decoded 4004 instruction.
///
/// Each variant carries only the operands it uses. Register indices are
/// 0-15, pair indices 0-7, immediates and conditions are 4-bit, JCN/ISZ
/// targets are 8-bit and JUN/JMS targets are 12-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Machine instructions ====================

    /// No operation
    Nop,

    /// Jump conditional: if the condition holds, PC := address
    Jcn { condition: u8, address: u8 },

    /// Fetch immediate: P := data
    Fim { pair: u8, data: u8 },

    /// Send register control: select the RAM address held in P
    Src { pair: u8 },

    /// Fetch indirect: P := ROM[P0]
    Fin { pair: u8 },

    /// Jump indirect: PC := P
    Jin { pair: u8 },

    /// Jump unconditional: PC := address
    Jun { address: u16 },

    /// Jump to subroutine: push PC, PC := address
    Jms { address: u16 },

    /// Increment register: R := R + 1
    Inc { register: u8 },

    /// Increment and skip: R := R + 1, jump if R wrapped to zero
    Isz { register: u8, address: u8 },

    /// Add register to accumulator with carry out
    Add { register: u8 },

    /// Subtract register from accumulator with borrow
    Sub { register: u8 },

    /// Load accumulator from register
    Ld { register: u8 },

    /// Exchange accumulator and register
    Xch { register: u8 },

    /// Branch back (pop PC) and load accumulator
    Bbl { data: u8 },

    /// Load accumulator immediate
    Ldm { data: u8 },

    // ==================== IO and RAM (0xE_) ====================

    Wrm,
    Wmp,
    Wrr,
    Wr0,
    Wr1,
    Wr2,
    Wr3,
    Sbm,
    Rdm,
    Rdr,
    Adm,
    Rd0,
    Rd1,
    Rd2,
    Rd3,

    // ==================== Accumulator group (0xF_) ====================

    Clb,
    Clc,
    Iac,
    Cmc,
    Cma,
    Ral,
    Rar,
    Tcc,
    Dac,
    Tcs,
    Stc,
    Daa,
    Kbp,
    Dcl,

    /// Byte outside the documented opcode map. `opcode` is the raw byte,
    /// kept for diagnostics only; execution ignores it and acts as NOP.
    Unknown { opcode: u8 },
}

impl Instruction {
    /// Assembler mnemonic.
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Nop => "NOP",
            Instruction::Jcn { .. } => "JCN",
            Instruction::Fim { .. } => "FIM",
            Instruction::Src { .. } => "SRC",
            Instruction::Fin { .. } => "FIN",
            Instruction::Jin { .. } => "JIN",
            Instruction::Jun { .. } => "JUN",
            Instruction::Jms { .. } => "JMS",
            Instruction::Inc { .. } => "INC",
            Instruction::Isz { .. } => "ISZ",
            Instruction::Add { .. } => "ADD",
            Instruction::Sub { .. } => "SUB",
            Instruction::Ld { .. } => "LD",
            Instruction::Xch { .. } => "XCH",
            Instruction::Bbl { .. } => "BBL",
            Instruction::Ldm { .. } => "LDM",
            Instruction::Wrm => "WRM",
            Instruction::Wmp => "WMP",
            Instruction::Wrr => "WRR",
            Instruction::Wr0 => "WR0",
            Instruction::Wr1 => "WR1",
            Instruction::Wr2 => "WR2",
            Instruction::Wr3 => "WR3",
            Instruction::Sbm => "SBM",
            Instruction::Rdm => "RDM",
            Instruction::Rdr => "RDR",
            Instruction::Adm => "ADM",
            Instruction::Rd0 => "RD0",
            Instruction::Rd1 => "RD1",
            Instruction::Rd2 => "RD2",
            Instruction::Rd3 => "RD3",
            Instruction::Clb => "CLB",
            Instruction::Clc => "CLC",
            Instruction::Iac => "IAC",
            Instruction::Cmc => "CMC",
            Instruction::Cma => "CMA",
            Instruction::Ral => "RAL",
            Instruction::Rar => "RAR",
            Instruction::Tcc => "TCC",
            Instruction::Dac => "DAC",
            Instruction::Tcs => "TCS",
            Instruction::Stc => "STC",
            Instruction::Daa => "DAA",
            Instruction::Kbp => "KBP",
            Instruction::Dcl => "DCL",
            Instruction::Unknown { .. } => "???",
        }
    }

    /// Encoded length in bytes.
    pub fn encoded_len(&self) -> usize {
        match self {
            Instruction::Jcn { .. }
            | Instruction::Fim { .. }
            | Instruction::Jun { .. }
            | Instruction::Jms { .. }
            | Instruction::Isz { .. } => 2,
            _ => 1,
        }
    }
}

/// Number of bytes occupied by the instruction starting with `opcode`.
pub fn instruction_length(opcode: u8) -> usize {
    match opcode >> 4 {
        0x1 | 0x4 | 0x5 | 0x7 => 2,
        0x2 if opcode & 0x01 == 0 => 2,
        _ => 1,
    }
}

/// Decode the instruction starting with `opcode`.
///
/// `fetch_next` must return the next program byte and advance the program
/// counter. It is called exactly once for two-byte instructions and never
/// otherwise. Bytes outside the opcode map decode to
/// [`Instruction::Unknown`].
pub fn decode<F>(opcode: u8, mut fetch_next: F) -> Instruction
where
    F: FnMut() -> u8,
{
    let opa = opcode & NIBBLE_MASK;
    let pair = opa >> 1;

    match opcode >> 4 {
        0x0 if opcode == 0x00 => Instruction::Nop,
        0x1 => Instruction::Jcn { condition: opa, address: fetch_next() },
        0x2 if opa & 0x01 == 1 => Instruction::Src { pair },
        0x2 => Instruction::Fim { pair, data: fetch_next() },
        0x3 if opa & 0x01 == 1 => Instruction::Jin { pair },
        0x3 => Instruction::Fin { pair },
        0x4 => Instruction::Jun { address: long_address(opa, fetch_next()) },
        0x5 => Instruction::Jms { address: long_address(opa, fetch_next()) },
        0x6 => Instruction::Inc { register: opa },
        0x7 => Instruction::Isz { register: opa, address: fetch_next() },
        0x8 => Instruction::Add { register: opa },
        0x9 => Instruction::Sub { register: opa },
        0xA => Instruction::Ld { register: opa },
        0xB => Instruction::Xch { register: opa },
        0xC => Instruction::Bbl { data: opa },
        0xD => Instruction::Ldm { data: opa },
        0xE => decode_io(opcode),
        0xF => decode_accumulator(opcode),
        _ => Instruction::Unknown { opcode },
    }
}

fn long_address(high: u8, low: u8) -> u16 {
    ((u16::from(high) << 8) | u16::from(low)) & ADDRESS_MASK
}

fn decode_io(opcode: u8) -> Instruction {
    match opcode {
        0xE0 => Instruction::Wrm,
        0xE1 => Instruction::Wmp,
        0xE2 => Instruction::Wrr,
        0xE4 => Instruction::Wr0,
        0xE5 => Instruction::Wr1,
        0xE6 => Instruction::Wr2,
        0xE7 => Instruction::Wr3,
        0xE8 => Instruction::Sbm,
        0xE9 => Instruction::Rdm,
        0xEA => Instruction::Rdr,
        0xEB => Instruction::Adm,
        0xEC => Instruction::Rd0,
        0xED => Instruction::Rd1,
        0xEE => Instruction::Rd2,
        0xEF => Instruction::Rd3,
        _ => Instruction::Unknown { opcode },
    }
}

fn decode_accumulator(opcode: u8) -> Instruction {
    match opcode {
        0xF0 => Instruction::Clb,
        0xF1 => Instruction::Clc,
        0xF2 => Instruction::Iac,
        0xF3 => Instruction::Cmc,
        0xF4 => Instruction::Cma,
        0xF5 => Instruction::Ral,
        0xF6 => Instruction::Rar,
        0xF7 => Instruction::Tcc,
        0xF8 => Instruction::Dac,
        0xF9 => Instruction::Tcs,
        0xFA => Instruction::Stc,
        0xFB => Instruction::Daa,
        0xFC => Instruction::Kbp,
        0xFD => Instruction::Dcl,
        _ => Instruction::Unknown { opcode },
    }
}

/// Encode an instruction back to its byte form.
///
/// Operands are masked to their field widths.
pub fn encode(instr: &Instruction) -> Vec<u8> {
    let nibble = |v: u8| v & NIBBLE_MASK;
    let pair = |p: u8| (p & 0x07) << 1;

    match *instr {
        Instruction::Nop => vec![0x00],
        Instruction::Jcn { condition, address } => vec![0x10 | nibble(condition), address],
        Instruction::Fim { pair: p, data } => vec![0x20 | pair(p), data],
        Instruction::Src { pair: p } => vec![0x21 | pair(p)],
        Instruction::Fin { pair: p } => vec![0x30 | pair(p)],
        Instruction::Jin { pair: p } => vec![0x31 | pair(p)],
        Instruction::Jun { address } => {
            vec![0x40 | ((address >> 8) as u8 & NIBBLE_MASK), address as u8]
        }
        Instruction::Jms { address } => {
            vec![0x50 | ((address >> 8) as u8 & NIBBLE_MASK), address as u8]
        }
        Instruction::Inc { register } => vec![0x60 | nibble(register)],
        Instruction::Isz { register, address } => vec![0x70 | nibble(register), address],
        Instruction::Add { register } => vec![0x80 | nibble(register)],
        Instruction::Sub { register } => vec![0x90 | nibble(register)],
        Instruction::Ld { register } => vec![0xA0 | nibble(register)],
        Instruction::Xch { register } => vec![0xB0 | nibble(register)],
        Instruction::Bbl { data } => vec![0xC0 | nibble(data)],
        Instruction::Ldm { data } => vec![0xD0 | nibble(data)],
        Instruction::Wrm => vec![0xE0],
        Instruction::Wmp => vec![0xE1],
        Instruction::Wrr => vec![0xE2],
        Instruction::Wr0 => vec![0xE4],
        Instruction::Wr1 => vec![0xE5],
        Instruction::Wr2 => vec![0xE6],
        Instruction::Wr3 => vec![0xE7],
        Instruction::Sbm => vec![0xE8],
        Instruction::Rdm => vec![0xE9],
        Instruction::Rdr => vec![0xEA],
        Instruction::Adm => vec![0xEB],
        Instruction::Rd0 => vec![0xEC],
        Instruction::Rd1 => vec![0xED],
        Instruction::Rd2 => vec![0xEE],
        Instruction::Rd3 => vec![0xEF],
        Instruction::Clb => vec![0xF0],
        Instruction::Clc => vec![0xF1],
        Instruction::Iac => vec![0xF2],
        Instruction::Cmc => vec![0xF3],
        Instruction::Cma => vec![0xF4],
        Instruction::Ral => vec![0xF5],
        Instruction::Rar => vec![0xF6],
        Instruction::Tcc => vec![0xF7],
        Instruction::Dac => vec![0xF8],
        Instruction::Tcs => vec![0xF9],
        Instruction::Stc => vec![0xFA],
        Instruction::Daa => vec![0xFB],
        Instruction::Kbp => vec![0xFC],
        Instruction::Dcl => vec![0xFD],
        Instruction::Unknown { opcode } => vec![opcode],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Decode from a byte slice, counting how many extra bytes were pulled.
    fn decode_bytes(bytes: &[u8]) -> (Instruction, usize) {
        let mut fetched = 0;
        let instr = decode(bytes[0], || {
            fetched += 1;
            bytes.get(fetched).copied().unwrap_or(0)
        });
        (instr, fetched)
    }

    #[test]
    fn test_decode_nop() {
        assert_eq!(decode_bytes(&[0x00]), (Instruction::Nop, 0));
    }

    #[test]
    fn test_decode_two_byte_forms() {
        assert_eq!(
            decode_bytes(&[0x14, 0x23]),
            (Instruction::Jcn { condition: 4, address: 0x23 }, 1)
        );
        assert_eq!(
            decode_bytes(&[0x22, 0xAB]),
            (Instruction::Fim { pair: 1, data: 0xAB }, 1)
        );
        assert_eq!(
            decode_bytes(&[0x4A, 0xBC]),
            (Instruction::Jun { address: 0xABC }, 1)
        );
        assert_eq!(
            decode_bytes(&[0x52, 0x00]),
            (Instruction::Jms { address: 0x200 }, 1)
        );
        assert_eq!(
            decode_bytes(&[0x7F, 0x10]),
            (Instruction::Isz { register: 15, address: 0x10 }, 1)
        );
    }

    #[test]
    fn test_decode_pair_forms() {
        assert_eq!(decode_bytes(&[0x2B]), (Instruction::Src { pair: 5 }, 0));
        assert_eq!(decode_bytes(&[0x3E]), (Instruction::Fin { pair: 7 }, 0));
        assert_eq!(decode_bytes(&[0x33]), (Instruction::Jin { pair: 1 }, 0));
    }

    #[test]
    fn test_decode_register_and_immediate_forms() {
        assert_eq!(decode_bytes(&[0x63]).0, Instruction::Inc { register: 3 });
        assert_eq!(decode_bytes(&[0x81]).0, Instruction::Add { register: 1 });
        assert_eq!(decode_bytes(&[0x9C]).0, Instruction::Sub { register: 12 });
        assert_eq!(decode_bytes(&[0xA7]).0, Instruction::Ld { register: 7 });
        assert_eq!(decode_bytes(&[0xB2]).0, Instruction::Xch { register: 2 });
        assert_eq!(decode_bytes(&[0xC9]).0, Instruction::Bbl { data: 9 });
        assert_eq!(decode_bytes(&[0xD5]).0, Instruction::Ldm { data: 5 });
    }

    #[test]
    fn test_decode_io_and_accumulator_groups() {
        assert_eq!(decode_bytes(&[0xE0]).0, Instruction::Wrm);
        assert_eq!(decode_bytes(&[0xE7]).0, Instruction::Wr3);
        assert_eq!(decode_bytes(&[0xEB]).0, Instruction::Adm);
        assert_eq!(decode_bytes(&[0xEC]).0, Instruction::Rd0);
        assert_eq!(decode_bytes(&[0xF0]).0, Instruction::Clb);
        assert_eq!(decode_bytes(&[0xFB]).0, Instruction::Daa);
        assert_eq!(decode_bytes(&[0xFD]).0, Instruction::Dcl);
    }

    #[test]
    fn test_decode_unknown() {
        for opcode in [0x01, 0x0F, 0xE3, 0xFE, 0xFF] {
            assert_eq!(
                decode_bytes(&[opcode]),
                (Instruction::Unknown { opcode }, 0),
                "opcode 0x{:02X}",
                opcode
            );
        }
    }

    #[test]
    fn test_fetch_count_matches_length() {
        for opcode in 0..=0xFFu8 {
            let (instr, fetched) = decode_bytes(&[opcode, 0x00]);
            assert_eq!(fetched + 1, instruction_length(opcode), "opcode 0x{:02X}", opcode);
            assert_eq!(instr.encoded_len(), instruction_length(opcode));
        }
    }

    #[test]
    fn test_encode_inverts_decode() {
        for opcode in 0..=0xFFu8 {
            let bytes = [opcode, 0x5A];
            let (instr, fetched) = decode_bytes(&bytes);
            assert_eq!(encode(&instr), bytes[..=fetched].to_vec());
        }
    }
}
