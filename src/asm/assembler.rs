//! Two-pass assembler for 4004 programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//!         ORG 0x200       ; Set load address (forward only)
//! START:  FIM P0, 0x21    ; Pair operand as Pn or a number
//!         SRC P0
//! LOOP:   INC R3          ; Register operand as Rn or a number
//!         ISZ R4, LOOP    ; 8-bit absolute target
//!         JUN START       ; 12-bit target
//!         DB 0x12, 34     ; Raw bytes
//! ```
//!
//! Pass 1 assigns an address to every label from instruction lengths,
//! pass 2 encodes with all labels known.

use crate::asm::image::RomImage;
use crate::cpu::decode::{encode, Instruction};
use crate::cpu::ADDRESS_SPACE;
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to a ROM image.
pub fn assemble(source: &str) -> Result<RomImage, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// One line of source that produces bytes.
struct Statement<'a> {
    line: usize,
    address: u16,
    mnemonic: String,
    operands: Vec<&'a str>,
}

/// The assembler state.
struct Assembler<'a> {
    /// Address of the next byte.
    current_addr: u32,
    /// Load address of the first byte, once known.
    origin: Option<u16>,
    /// Symbol table (label -> address).
    symbols: HashMap<String, u16>,
    /// Statements collected in pass 1.
    statements: Vec<Statement<'a>>,
}

impl<'a> Assembler<'a> {
    fn new() -> Self {
        Self {
            current_addr: 0,
            origin: None,
            symbols: HashMap::new(),
            statements: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &'a str) -> Result<RomImage, AssemblerError> {
        // Pass 1: collect labels and statement addresses
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: encode
        let origin = self.origin.unwrap_or(0);
        let mut bytes = Vec::new();
        for stmt in &self.statements {
            let offset = usize::from(stmt.address - origin);
            if bytes.len() < offset {
                bytes.resize(offset, 0x00);
            }
            bytes.extend(self.encode_statement(stmt)?);
        }

        Ok(RomImage::new(origin, bytes))
    }

    fn process_line(&mut self, line: &'a str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments
        let line = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let mut line = line.trim();

        // Check for label definition
        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_uppercase();
            if !is_identifier(&label) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid label '{}'", label),
                });
            }
            if self.symbols.insert(label.clone(), self.current_addr as u16).is_some() {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("duplicate label '{}'", label),
                });
            }
            line = line[colon_idx + 1..].trim();
        }

        if line.is_empty() {
            return Ok(());
        }

        let (mnemonic, rest) = match line.find(char::is_whitespace) {
            Some(idx) => (&line[..idx], line[idx..].trim()),
            None => (line, ""),
        };
        let mnemonic = mnemonic.to_uppercase();
        let operands: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',').map(str::trim).collect()
        };

        let size = match mnemonic.as_str() {
            "ORG" => {
                let [operand] = expect_operands::<1>(&operands, line_num)?;
                let addr = parse_number(operand).ok_or_else(|| AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("ORG needs a numeric address, found '{}'", operand),
                })?;
                if addr as usize >= ADDRESS_SPACE {
                    return Err(AssemblerError::ValueOutOfRange { line: line_num, value: addr });
                }
                if addr < self.current_addr && !self.statements.is_empty() {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: format!("ORG 0x{:03X} moves backwards", addr),
                    });
                }
                self.current_addr = addr;
                return Ok(());
            }
            "DB" => {
                if operands.is_empty() {
                    return Err(AssemblerError::SyntaxError {
                        line: line_num,
                        message: "DB requires at least one byte".into(),
                    });
                }
                operands.len()
            }
            other => mnemonic_length(other).ok_or_else(|| AssemblerError::UnknownMnemonic {
                line: line_num,
                mnemonic: other.to_string(),
            })?,
        };

        if self.current_addr as usize + size > ADDRESS_SPACE {
            return Err(AssemblerError::ValueOutOfRange { line: line_num, value: self.current_addr });
        }
        if self.origin.is_none() {
            self.origin = Some(self.current_addr as u16);
        }

        self.statements.push(Statement {
            line: line_num,
            address: self.current_addr as u16,
            mnemonic,
            operands,
        });
        self.current_addr += size as u32;
        Ok(())
    }

    fn encode_statement(&self, stmt: &Statement<'_>) -> Result<Vec<u8>, AssemblerError> {
        let line = stmt.line;
        let ops = &stmt.operands;

        if stmt.mnemonic == "DB" {
            return ops.iter().map(|op| self.value(op, 0xFF, line).map(|v| v as u8)).collect();
        }

        let instr = match stmt.mnemonic.as_str() {
            "NOP" => none(ops, line, Instruction::Nop)?,
            "JCN" => {
                let [cond, target] = expect_operands::<2>(ops, line)?;
                Instruction::Jcn {
                    condition: self.value(cond, 0x0F, line)? as u8,
                    address: self.value(target, 0xFF, line)? as u8,
                }
            }
            "FIM" => {
                let [pair, data] = expect_operands::<2>(ops, line)?;
                Instruction::Fim { pair: parse_pair(pair, line)?, data: self.value(data, 0xFF, line)? as u8 }
            }
            "SRC" => Instruction::Src { pair: parse_pair(single(ops, line)?, line)? },
            "FIN" => Instruction::Fin { pair: parse_pair(single(ops, line)?, line)? },
            "JIN" => Instruction::Jin { pair: parse_pair(single(ops, line)?, line)? },
            "JUN" => Instruction::Jun { address: self.value(single(ops, line)?, 0xFFF, line)? as u16 },
            "JMS" => Instruction::Jms { address: self.value(single(ops, line)?, 0xFFF, line)? as u16 },
            "INC" => Instruction::Inc { register: parse_register(single(ops, line)?, line)? },
            "ISZ" => {
                let [reg, target] = expect_operands::<2>(ops, line)?;
                Instruction::Isz {
                    register: parse_register(reg, line)?,
                    address: self.value(target, 0xFF, line)? as u8,
                }
            }
            "ADD" => Instruction::Add { register: parse_register(single(ops, line)?, line)? },
            "SUB" => Instruction::Sub { register: parse_register(single(ops, line)?, line)? },
            "LD" => Instruction::Ld { register: parse_register(single(ops, line)?, line)? },
            "XCH" => Instruction::Xch { register: parse_register(single(ops, line)?, line)? },
            "BBL" => Instruction::Bbl { data: self.value(single(ops, line)?, 0x0F, line)? as u8 },
            "LDM" => Instruction::Ldm { data: self.value(single(ops, line)?, 0x0F, line)? as u8 },
            other => none(ops, line, implied(other).ok_or_else(|| AssemblerError::UnknownMnemonic {
                line,
                mnemonic: other.to_string(),
            })?)?,
        };

        Ok(encode(&instr))
    }

    /// Resolve a numeric literal or label and check it against `max`.
    fn value(&self, operand: &str, max: u32, line: usize) -> Result<u32, AssemblerError> {
        let value = match parse_number(operand) {
            Some(v) => v,
            None => {
                let label = operand.to_uppercase();
                if !is_identifier(&label) {
                    return Err(AssemblerError::SyntaxError {
                        line,
                        message: format!("invalid operand '{}'", operand),
                    });
                }
                let addr = self.symbols.get(&label)
                    .ok_or(AssemblerError::UndefinedLabel { line, label })?;
                u32::from(*addr)
            }
        };

        if value > max {
            return Err(AssemblerError::ValueOutOfRange { line, value });
        }
        Ok(value)
    }
}

/// Encoded length of a mnemonic, or `None` if it is not an instruction.
fn mnemonic_length(mnemonic: &str) -> Option<usize> {
    match mnemonic {
        "JCN" | "FIM" | "JUN" | "JMS" | "ISZ" => Some(2),
        "NOP" | "SRC" | "FIN" | "JIN" | "INC" | "ADD" | "SUB" | "LD" | "XCH" | "BBL" | "LDM" => Some(1),
        other => implied(other).map(|_| 1),
    }
}

/// Instructions without operands in the 0xE_ and 0xF_ groups.
fn implied(mnemonic: &str) -> Option<Instruction> {
    let instr = match mnemonic {
        "WRM" => Instruction::Wrm,
        "WMP" => Instruction::Wmp,
        "WRR" => Instruction::Wrr,
        "WR0" => Instruction::Wr0,
        "WR1" => Instruction::Wr1,
        "WR2" => Instruction::Wr2,
        "WR3" => Instruction::Wr3,
        "SBM" => Instruction::Sbm,
        "RDM" => Instruction::Rdm,
        "RDR" => Instruction::Rdr,
        "ADM" => Instruction::Adm,
        "RD0" => Instruction::Rd0,
        "RD1" => Instruction::Rd1,
        "RD2" => Instruction::Rd2,
        "RD3" => Instruction::Rd3,
        "CLB" => Instruction::Clb,
        "CLC" => Instruction::Clc,
        "IAC" => Instruction::Iac,
        "CMC" => Instruction::Cmc,
        "CMA" => Instruction::Cma,
        "RAL" => Instruction::Ral,
        "RAR" => Instruction::Rar,
        "TCC" => Instruction::Tcc,
        "DAC" => Instruction::Dac,
        "TCS" => Instruction::Tcs,
        "STC" => Instruction::Stc,
        "DAA" => Instruction::Daa,
        "KBP" => Instruction::Kbp,
        "DCL" => Instruction::Dcl,
        _ => return None,
    };
    Some(instr)
}

fn expect_operands<'o, const N: usize>(
    operands: &[&'o str],
    line: usize,
) -> Result<[&'o str; N], AssemblerError> {
    <[&str; N]>::try_from(operands).map_err(|_| AssemblerError::SyntaxError {
        line,
        message: format!("expected {} operand(s), found {}", N, operands.len()),
    })
}

fn single<'o>(operands: &[&'o str], line: usize) -> Result<&'o str, AssemblerError> {
    expect_operands::<1>(operands, line).map(|[op]| op)
}

fn none(operands: &[&str], line: usize, instr: Instruction) -> Result<Instruction, AssemblerError> {
    expect_operands::<0>(operands, line).map(|_| instr)
}

fn parse_register(operand: &str, line: usize) -> Result<u8, AssemblerError> {
    parse_indexed(operand, 'R', 15, line)
}

fn parse_pair(operand: &str, line: usize) -> Result<u8, AssemblerError> {
    parse_indexed(operand, 'P', 7, line)
}

/// Parse `Xn` or a bare number, checking it against `max`.
fn parse_indexed(operand: &str, prefix: char, max: u32, line: usize) -> Result<u8, AssemblerError> {
    let digits = operand
        .strip_prefix(prefix)
        .or_else(|| operand.strip_prefix(prefix.to_ascii_lowercase()))
        .unwrap_or(operand);

    let value = parse_number(digits).ok_or_else(|| AssemblerError::SyntaxError {
        line,
        message: format!("expected {}0-{}{}, found '{}'", prefix, prefix, max, operand),
    })?;
    if value > max {
        return Err(AssemblerError::ValueOutOfRange { line, value });
    }
    Ok(value as u8)
}

/// Parse a decimal or `0x` hex literal.
fn parse_number(operand: &str) -> Option<u32> {
    if let Some(hex) = operand.strip_prefix("0x").or_else(|| operand.strip_prefix("0X")) {
        return u32::from_str_radix(hex, 16).ok();
    }
    operand.parse::<u32>().ok()
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: u32 },
}
