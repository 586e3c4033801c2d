//! CPU execution engine for the 4004.
//!
//! Implements the two-phase fetch/execute cycle and all instruction
//! behaviors.

use crate::cpu::decode::{self, Instruction};
use crate::cpu::diagnostic::Diagnostic;
use crate::cpu::ports::{Ports, ProgramMemory};
use crate::cpu::{CallStack, Registers, ADDRESS_MASK, NIBBLE_MASK};
use serde::{Serialize, Deserialize};

/// Which half of the instruction cycle the next [`Cpu::step`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CyclePhase {
    /// Read and decode the next instruction.
    #[default]
    Fetch,
    /// Execute the pending instruction.
    Execute,
}

/// What a single [`Cpu::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// An instruction was fetched from `address` and is now pending.
    Fetched { address: u16, instruction: Instruction },
    /// The pending instruction (fetched from `address`) was executed.
    Executed {
        address: u16,
        instruction: Instruction,
        diagnostic: Option<Diagnostic>,
    },
}

/// The 4004 CPU state.
///
/// Owned by the caller and advanced only through [`Cpu::step`] and
/// [`Cpu::execute`]. Registers and the stack mask their own values; the
/// accumulator, carry and PC are reached through accessors that mask on
/// write.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cpu {
    /// Index registers R0-R15.
    pub regs: Registers,
    /// Three-level return address stack.
    pub stack: CallStack,
    accumulator: u8,
    carry: bool,
    pc: u16,
    phase: CyclePhase,
    pending: Option<Instruction>,
    pending_address: u16,
    instructions_executed: u64,
    cycles_executed: u64,
}

impl Cpu {
    /// Create a CPU in the power-on state.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            stack: CallStack::new(),
            accumulator: 0,
            carry: false,
            pc: 0,
            phase: CyclePhase::Fetch,
            pending: None,
            pending_address: 0,
            instructions_executed: 0,
            cycles_executed: 0,
        }
    }

    /// Reinitialize every field in place.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn accumulator(&self) -> u8 {
        self.accumulator
    }

    pub fn set_accumulator(&mut self, value: u8) {
        self.accumulator = value & NIBBLE_MASK;
    }

    pub fn carry(&self) -> bool {
        self.carry
    }

    pub fn set_carry(&mut self, carry: bool) {
        self.carry = carry;
    }

    pub fn pc(&self) -> u16 {
        self.pc
    }

    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc & ADDRESS_MASK;
    }

    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Instruction waiting for the execute phase, if any.
    pub fn pending(&self) -> Option<Instruction> {
        self.pending
    }

    /// Check the state of a deserialized CPU.
    pub fn validate(&self) -> Result<(), String> {
        self.regs.validate()?;
        self.stack.validate()?;
        if self.accumulator > NIBBLE_MASK {
            return Err(format!("accumulator holds 0x{:X}", self.accumulator));
        }
        if self.pc > ADDRESS_MASK || self.pending_address > ADDRESS_MASK {
            return Err(format!("PC 0x{:X} exceeds 12 bits", self.pc));
        }
        Ok(())
    }

    pub fn instructions_executed(&self) -> u64 {
        self.instructions_executed
    }

    pub fn cycles_executed(&self) -> u64 {
        self.cycles_executed
    }

    /// Advance by one half-cycle.
    ///
    /// Two calls make one full instruction, whatever its encoded length.
    pub fn step(&mut self, ports: &mut Ports<'_>) -> Step {
        self.cycles_executed += 1;

        match self.phase {
            CyclePhase::Fetch => {
                let address = self.pc;
                let program = ports.program;
                let opcode = fetch(&mut self.pc, program);
                let instruction = decode::decode(opcode, || fetch(&mut self.pc, program));
                tracing::trace!("fetched 0x{:03X}: {:?}", address, instruction);

                self.pending = Some(instruction);
                self.pending_address = address;
                self.phase = CyclePhase::Execute;
                Step::Fetched { address, instruction }
            }
            CyclePhase::Execute => {
                let instruction = self.pending.take().unwrap_or(Instruction::Nop);
                let diagnostic = self.execute(instruction, ports);

                self.phase = CyclePhase::Fetch;
                self.instructions_executed += 1;
                Step::Executed {
                    address: self.pending_address,
                    instruction,
                    diagnostic,
                }
            }
        }
    }

    /// Execute a decoded instruction against the current state.
    ///
    /// Never fails. Conditions worth reporting come back as a
    /// [`Diagnostic`] and are also logged.
    pub fn execute(&mut self, instr: Instruction, ports: &mut Ports<'_>) -> Option<Diagnostic> {
        let mut diagnostic = None;

        match instr {
            Instruction::Nop => {}

            // ==================== Control Flow ====================

            Instruction::Jcn { condition, address } => {
                if self.condition_holds(condition, ports) {
                    self.pc = u16::from(address);
                }
            }

            Instruction::Jin { pair } => {
                self.pc = u16::from(self.regs.pair(pair));
            }

            Instruction::Jun { address } => {
                self.set_pc(address);
            }

            Instruction::Jms { address } => {
                if let Some(overwritten) = self.stack.push(self.pc) {
                    diagnostic = Some(Diagnostic::StackOverflow { pc: self.pc, overwritten });
                }
                self.set_pc(address);
            }

            Instruction::Isz { register, address } => {
                if self.regs.increment(register) == 0 {
                    self.pc = u16::from(address);
                }
            }

            Instruction::Bbl { data } => {
                if self.stack.is_empty() {
                    diagnostic = Some(Diagnostic::StackUnderflow { pc: self.pc });
                }
                self.pc = self.stack.pop();
                self.set_accumulator(data);
            }

            // ==================== Register Transfer ====================

            Instruction::Fim { pair, data } => {
                self.regs.set_pair(pair, data);
            }

            Instruction::Src { pair } => {
                ports.data.set_data_address(self.regs.pair(pair));
            }

            Instruction::Fin { pair } => {
                let address = u16::from(self.regs.pair(0));
                let data = ports.program.read_program_byte(address);
                self.regs.set_pair(pair, data);
            }

            Instruction::Inc { register } => {
                self.regs.increment(register);
            }

            Instruction::Ld { register } => {
                self.accumulator = self.regs.get(register);
            }

            Instruction::Xch { register } => {
                let value = self.regs.get(register);
                self.regs.set(register, self.accumulator);
                self.accumulator = value;
            }

            Instruction::Ldm { data } => {
                self.set_accumulator(data);
            }

            // ==================== Arithmetic ====================

            Instruction::Add { register } => {
                let operand = self.regs.get(register);
                self.add(operand);
            }

            Instruction::Sub { register } => {
                let operand = self.regs.get(register);
                self.subtract(operand);
            }

            Instruction::Adm => {
                let operand = ports.data.read_data_nibble() & NIBBLE_MASK;
                self.add(operand);
            }

            Instruction::Sbm => {
                let operand = ports.data.read_data_nibble() & NIBBLE_MASK;
                self.subtract(operand);
            }

            // ==================== RAM and IO ====================

            Instruction::Wrm => ports.data.write_data_nibble(self.accumulator),
            Instruction::Rdm => self.set_accumulator(ports.data.read_data_nibble()),
            Instruction::Wmp => ports.io.write_output_port(0, self.accumulator),

            // ROM ports are not modeled
            Instruction::Wrr | Instruction::Rdr => {}

            Instruction::Wr0 => ports.io.write_status_channel(0, self.accumulator),
            Instruction::Wr1 => ports.io.write_status_channel(1, self.accumulator),
            Instruction::Wr2 => ports.io.write_status_channel(2, self.accumulator),
            Instruction::Wr3 => ports.io.write_status_channel(3, self.accumulator),

            Instruction::Rd0 => self.set_accumulator(ports.io.read_status_channel(0)),
            Instruction::Rd1 => self.set_accumulator(ports.io.read_status_channel(1)),
            Instruction::Rd2 => self.set_accumulator(ports.io.read_status_channel(2)),
            Instruction::Rd3 => self.set_accumulator(ports.io.read_status_channel(3)),

            Instruction::Dcl => ports.data.select_ram_bank(self.accumulator & 0x03),

            // ==================== Accumulator Group ====================

            Instruction::Clb => {
                self.accumulator = 0;
                self.carry = false;
            }

            Instruction::Clc => self.carry = false,

            Instruction::Iac => {
                self.accumulator = (self.accumulator + 1) & NIBBLE_MASK;
                self.carry = self.accumulator == 0;
            }

            Instruction::Cmc => self.carry = !self.carry,

            Instruction::Cma => self.accumulator = !self.accumulator & NIBBLE_MASK,

            Instruction::Ral => {
                let carry_out = self.accumulator & 0x08 != 0;
                self.accumulator = ((self.accumulator << 1) | u8::from(self.carry)) & NIBBLE_MASK;
                self.carry = carry_out;
            }

            Instruction::Rar => {
                let carry_out = self.accumulator & 0x01 != 0;
                self.accumulator = (self.accumulator >> 1) | (u8::from(self.carry) << 3);
                self.carry = carry_out;
            }

            Instruction::Tcc => {
                self.accumulator = u8::from(self.carry);
                self.carry = false;
            }

            Instruction::Dac => {
                self.accumulator = self.accumulator.wrapping_sub(1) & NIBBLE_MASK;
                self.carry = self.accumulator != 0x0F;
            }

            Instruction::Tcs => {
                self.accumulator = if self.carry { 10 } else { 9 };
                self.carry = false;
            }

            Instruction::Stc => self.carry = true,

            Instruction::Daa => {
                if self.accumulator > 9 || self.carry {
                    self.accumulator = (self.accumulator + 6) & NIBBLE_MASK;
                    self.carry = true;
                }
            }

            Instruction::Kbp => {
                self.accumulator = match self.accumulator {
                    0b0001 => 0,
                    0b0010 => 1,
                    0b0100 => 2,
                    0b1000 => 3,
                    _ => 0x0F,
                };
            }

            // ==================== Special ====================

            Instruction::Unknown { opcode } => {
                diagnostic = Some(Diagnostic::UnknownOpcode { opcode, pc: self.pc });
            }
        }

        tracing::trace!(
            "executed {:?}  ACC={:X} CY={} PC=0x{:03X}",
            instr,
            self.accumulator,
            u8::from(self.carry),
            self.pc
        );
        if let Some(diag) = &diagnostic {
            tracing::warn!(code = diag.code(), "{}", diag);
        }

        diagnostic
    }

    /// Evaluate a JCN condition nibble.
    ///
    /// Bit 3 tests carry clear, bit 2 accumulator zero, bit 1 the TEST pin.
    /// The active tests are ORed; bit 0 inverts the result.
    fn condition_holds(&self, condition: u8, ports: &mut Ports<'_>) -> bool {
        let mut jump = false;
        if condition & 0b1000 != 0 && !self.carry {
            jump = true;
        }
        if condition & 0b0100 != 0 && self.accumulator == 0 {
            jump = true;
        }
        if condition & 0b0010 != 0 && ports.io.test_input_pin() {
            jump = true;
        }
        if condition & 0b0001 != 0 {
            jump = !jump;
        }
        jump
    }

    /// ACC := ACC + operand, carry out. Incoming carry is not added.
    fn add(&mut self, operand: u8) {
        let sum = self.accumulator + operand;
        self.accumulator = sum & NIBBLE_MASK;
        self.carry = sum > 0x0F;
    }

    /// ACC := ACC - operand - borrow, where borrow is the inverted carry.
    /// Carry is set when no borrow occurred.
    fn subtract(&mut self, operand: u8) {
        let borrow = i16::from(!self.carry);
        let diff = i16::from(self.accumulator) - i16::from(operand) - borrow;
        self.accumulator = (diff & 0x0F) as u8;
        self.carry = diff >= 0;
    }
}

/// Read the byte at `pc` and advance it, wrapping at 4096.
fn fetch(pc: &mut u16, program: &dyn ProgramMemory) -> u8 {
    let byte = program.read_program_byte(*pc);
    *pc = (*pc + 1) & ADDRESS_MASK;
    byte
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("pc", &format_args!("0x{:03X}", self.pc))
            .field("acc", &self.accumulator)
            .field("carry", &self.carry)
            .field("regs", &self.regs)
            .field("stack", &self.stack)
            .field("phase", &self.phase)
            .field("instructions", &self.instructions_executed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::decode::encode;
    use crate::cpu::registers::PAIR_COUNT;
    use crate::cpu::{IoBoard, Ram, Rom};
    use proptest::prelude::*;

    struct Board {
        rom: Rom,
        ram: Ram,
        io: IoBoard,
    }

    impl Board {
        fn new() -> Self {
            Self {
                rom: Rom::new(),
                ram: Ram::new(),
                io: IoBoard::new(),
            }
        }

        fn exec(&mut self, cpu: &mut Cpu, instr: Instruction) -> Option<Diagnostic> {
            let mut ports = Ports::new(&self.rom, &mut self.ram, &mut self.io);
            cpu.execute(instr, &mut ports)
        }

        fn step(&mut self, cpu: &mut Cpu) -> Step {
            let mut ports = Ports::new(&self.rom, &mut self.ram, &mut self.io);
            cpu.step(&mut ports)
        }
    }

    fn make_program(instructions: &[Instruction]) -> Vec<u8> {
        instructions.iter().flat_map(encode).collect()
    }

    #[test]
    fn test_ldm_then_add() {
        let mut cpu = Cpu::new();
        let mut board = Board::new();

        board.exec(&mut cpu, Instruction::Ldm { data: 5 });
        cpu.regs.set(1, 3);
        board.exec(&mut cpu, Instruction::Add { register: 1 });

        assert_eq!(cpu.accumulator(), 8);
        assert!(!cpu.carry());
    }

    #[test]
    fn test_iac_overflow() {
        let mut cpu = Cpu::new();
        let mut board = Board::new();
        cpu.set_accumulator(15);

        board.exec(&mut cpu, Instruction::Iac);

        assert_eq!(cpu.accumulator(), 0);
        assert!(cpu.carry());
    }

    #[test]
    fn test_fim_then_read_pair() {
        let mut cpu = Cpu::new();
        let mut board = Board::new();

        board.exec(&mut cpu, Instruction::Fim { pair: 0, data: 0xAB });

        assert_eq!(cpu.regs.pair(0), 0xAB);
    }

    #[test]
    fn test_program_at_0x200() {
        let mut cpu = Cpu::new();
        let mut board = Board::new();
        board.rom.load_program(0x200, &[0xD5, 0xB1, 0xD3, 0x81, 0xB2]).unwrap();
        cpu.set_pc(0x200);

        for _ in 0..5 {
            assert!(matches!(board.step(&mut cpu), Step::Fetched { .. }));
            assert!(matches!(board.step(&mut cpu), Step::Executed { .. }));
        }

        assert_eq!(cpu.regs.get(1), 5);
        assert_eq!(cpu.regs.get(2), 8);
        assert_eq!(cpu.accumulator(), 0);
        assert_eq!(cpu.pc(), 0x205);
        assert_eq!(cpu.instructions_executed(), 5);
        assert_eq!(cpu.cycles_executed(), 10);
    }

    #[test]
    fn test_unknown_opcode_is_nop_with_diagnostic() {
        let mut cpu = Cpu::new();
        let mut board = Board::new();
        board.rom.write(0, 0xE3);

        let fetched = board.step(&mut cpu);
        assert_eq!(
            fetched,
            Step::Fetched { address: 0, instruction: Instruction::Unknown { opcode: 0xE3 } }
        );

        let mut before = cpu.clone();
        let executed = board.step(&mut cpu);
        assert_eq!(
            executed,
            Step::Executed {
                address: 0,
                instruction: Instruction::Unknown { opcode: 0xE3 },
                diagnostic: Some(Diagnostic::UnknownOpcode { opcode: 0xE3, pc: 1 }),
            }
        );

        // Only the cycle bookkeeping moved
        before.phase = CyclePhase::Fetch;
        before.pending = None;
        before.instructions_executed += 1;
        before.cycles_executed += 1;
        assert_eq!(cpu, before);
    }

    #[test]
    fn test_direct_unknown_leaves_state() {
        let mut cpu = Cpu::new();
        let mut board = Board::new();
        cpu.set_accumulator(7);
        cpu.regs.set_pair(3, 0x42);
        let before = cpu.clone();

        let diag = board.exec(&mut cpu, Instruction::Unknown { opcode: 0xFF });

        assert_eq!(diag, Some(Diagnostic::UnknownOpcode { opcode: 0xFF, pc: 0 }));
        assert_eq!(cpu, before);
        assert_eq!(board.ram, Ram::new());
        assert_eq!(board.io, IoBoard::new());
    }

    #[test]
    fn test_jcn_zero_test() {
        let mut board = Board::new();
        for carry in [false, true] {
            for pin in [false, true] {
                board.io.set_test_pin(pin);

                let mut cpu = Cpu::new();
                cpu.set_carry(carry);
                cpu.set_accumulator(1);
                board.exec(&mut cpu, Instruction::Jcn { condition: 0b0100, address: 0x23 });
                assert_eq!(cpu.pc(), 0);

                cpu.set_accumulator(0);
                board.exec(&mut cpu, Instruction::Jcn { condition: 0b0100, address: 0x23 });
                assert_eq!(cpu.pc(), 0x23);
            }
        }
    }

    #[test]
    fn test_jcn_carry_test_and_invert() {
        let mut board = Board::new();

        let mut cpu = Cpu::new();
        board.exec(&mut cpu, Instruction::Jcn { condition: 0b1000, address: 0x40 });
        assert_eq!(cpu.pc(), 0x40);

        let mut cpu = Cpu::new();
        cpu.set_carry(true);
        board.exec(&mut cpu, Instruction::Jcn { condition: 0b1000, address: 0x40 });
        assert_eq!(cpu.pc(), 0);

        // Inverted: jump when carry is set
        board.exec(&mut cpu, Instruction::Jcn { condition: 0b1001, address: 0x40 });
        assert_eq!(cpu.pc(), 0x40);

        // No tests selected, inverted: always jump
        let mut cpu = Cpu::new();
        board.exec(&mut cpu, Instruction::Jcn { condition: 0b0001, address: 0x11 });
        assert_eq!(cpu.pc(), 0x11);

        // No tests selected at all: never jump
        let mut cpu = Cpu::new();
        board.exec(&mut cpu, Instruction::Jcn { condition: 0b0000, address: 0x11 });
        assert_eq!(cpu.pc(), 0);
    }

    #[test]
    fn test_jcn_test_pin() {
        let mut board = Board::new();
        let mut cpu = Cpu::new();
        cpu.set_accumulator(3);
        cpu.set_carry(true);

        board.exec(&mut cpu, Instruction::Jcn { condition: 0b0010, address: 0x80 });
        assert_eq!(cpu.pc(), 0);

        board.io.set_test_pin(true);
        board.exec(&mut cpu, Instruction::Jcn { condition: 0b0010, address: 0x80 });
        assert_eq!(cpu.pc(), 0x80);
    }

    #[test]
    fn test_jms_bbl_round_trip() {
        let mut board = Board::new();
        let mut cpu = Cpu::new();
        cpu.set_pc(0x123);

        board.exec(&mut cpu, Instruction::Jms { address: 0x456 });
        assert_eq!(cpu.pc(), 0x456);
        assert_eq!(cpu.stack.depth(), 1);

        board.exec(&mut cpu, Instruction::Bbl { data: 9 });
        assert_eq!(cpu.pc(), 0x123);
        assert_eq!(cpu.accumulator(), 9);
        assert!(cpu.stack.is_empty());
    }

    #[test]
    fn test_nested_calls() {
        let mut board = Board::new();
        let mut cpu = Cpu::new();

        for (from, to) in [(0x010, 0x100), (0x102, 0x200), (0x202, 0x300)] {
            cpu.set_pc(from);
            assert_eq!(board.exec(&mut cpu, Instruction::Jms { address: to }), None);
        }

        for (expected, data) in [(0x202, 3), (0x102, 2), (0x010, 1)] {
            assert_eq!(board.exec(&mut cpu, Instruction::Bbl { data }), None);
            assert_eq!(cpu.pc(), expected);
            assert_eq!(cpu.accumulator(), data);
        }
    }

    #[test]
    fn test_stack_overflow_and_underflow_wrap() {
        let mut board = Board::new();
        let mut cpu = Cpu::new();

        for pc in [0x001, 0x002, 0x003] {
            cpu.set_pc(pc);
            board.exec(&mut cpu, Instruction::Jms { address: 0x800 });
        }

        cpu.set_pc(0x004);
        let diag = board.exec(&mut cpu, Instruction::Jms { address: 0x800 });
        assert_eq!(diag, Some(Diagnostic::StackOverflow { pc: 0x004, overwritten: 0x001 }));

        for expected in [0x004, 0x003, 0x002] {
            assert_eq!(board.exec(&mut cpu, Instruction::Bbl { data: 0 }), None);
            assert_eq!(cpu.pc(), expected);
        }

        // Fourth pop wraps onto the slot that held 0x004
        let diag = board.exec(&mut cpu, Instruction::Bbl { data: 0 });
        assert_eq!(diag, Some(Diagnostic::StackUnderflow { pc: 0x002 }));
        assert_eq!(cpu.pc(), 0x004);
    }

    #[test]
    fn test_jun_jin_isz() {
        let mut board = Board::new();
        let mut cpu = Cpu::new();

        board.exec(&mut cpu, Instruction::Jun { address: 0xABC });
        assert_eq!(cpu.pc(), 0xABC);

        cpu.regs.set_pair(2, 0x7E);
        board.exec(&mut cpu, Instruction::Jin { pair: 2 });
        assert_eq!(cpu.pc(), 0x7E);

        cpu.regs.set(4, 14);
        board.exec(&mut cpu, Instruction::Isz { register: 4, address: 0x10 });
        assert_eq!(cpu.regs.get(4), 15);
        assert_eq!(cpu.pc(), 0x7E);

        board.exec(&mut cpu, Instruction::Isz { register: 4, address: 0x10 });
        assert_eq!(cpu.regs.get(4), 0);
        assert_eq!(cpu.pc(), 0x10);
    }

    #[test]
    fn test_inc_does_not_touch_carry() {
        let mut board = Board::new();
        let mut cpu = Cpu::new();
        cpu.regs.set(9, 15);

        board.exec(&mut cpu, Instruction::Inc { register: 9 });

        assert_eq!(cpu.regs.get(9), 0);
        assert!(!cpu.carry());
    }

    #[test]
    fn test_ld_xch() {
        let mut board = Board::new();
        let mut cpu = Cpu::new();
        cpu.regs.set(6, 0xC);
        cpu.set_accumulator(0x3);

        board.exec(&mut cpu, Instruction::Xch { register: 6 });
        assert_eq!(cpu.accumulator(), 0xC);
        assert_eq!(cpu.regs.get(6), 0x3);

        board.exec(&mut cpu, Instruction::Ld { register: 6 });
        assert_eq!(cpu.accumulator(), 0x3);
    }

    #[test]
    fn test_fin_reads_through_pair_zero() {
        let mut board = Board::new();
        board.rom.write(0x42, 0x9D);
        let mut cpu = Cpu::new();
        cpu.regs.set_pair(0, 0x42);

        board.exec(&mut cpu, Instruction::Fin { pair: 3 });

        assert_eq!(cpu.regs.pair(3), 0x9D);
        assert_eq!(cpu.regs.pair(0), 0x42);
    }

    #[test]
    fn test_src_wrm_rdm() {
        let mut board = Board::new();
        let mut cpu = Cpu::new();
        cpu.regs.set_pair(0, 0x15);
        board.exec(&mut cpu, Instruction::Src { pair: 0 });

        cpu.set_accumulator(0x9);
        board.exec(&mut cpu, Instruction::Wrm);
        board.exec(&mut cpu, Instruction::Clb);
        board.exec(&mut cpu, Instruction::Rdm);

        assert_eq!(cpu.accumulator(), 0x9);
        assert_eq!(board.ram.peek(0, 1, 1), 0x9);
    }

    #[test]
    fn test_adm_sbm() {
        let mut board = Board::new();
        board.ram.poke(0, 0, 0, 7);
        let mut cpu = Cpu::new();

        cpu.set_accumulator(12);
        board.exec(&mut cpu, Instruction::Adm);
        assert_eq!(cpu.accumulator(), 3);
        assert!(cpu.carry());

        // Carry set means no borrow: 3 - 7 = -4
        board.exec(&mut cpu, Instruction::Sbm);
        assert_eq!(cpu.accumulator(), 12);
        assert!(!cpu.carry());
    }

    #[test]
    fn test_dcl_selects_bank() {
        let mut board = Board::new();
        let mut cpu = Cpu::new();
        cpu.set_accumulator(0b0110);

        board.exec(&mut cpu, Instruction::Dcl);

        assert_eq!(board.ram.bank(), 2);
    }

    #[test]
    fn test_io_instructions() {
        let mut board = Board::new();
        board.io.set_status(2, 0xB);
        let mut cpu = Cpu::new();

        cpu.set_accumulator(0x6);
        board.exec(&mut cpu, Instruction::Wmp);
        board.exec(&mut cpu, Instruction::Wr3);
        assert_eq!(board.io.output(0), 0x6);
        assert_eq!(board.io.status(3), 0x6);

        board.exec(&mut cpu, Instruction::Rd2);
        assert_eq!(cpu.accumulator(), 0xB);

        let before = cpu.clone();
        board.exec(&mut cpu, Instruction::Wrr);
        board.exec(&mut cpu, Instruction::Rdr);
        assert_eq!(cpu, before);
    }

    #[test]
    fn test_carry_instructions() {
        let mut board = Board::new();
        let mut cpu = Cpu::new();

        board.exec(&mut cpu, Instruction::Stc);
        assert!(cpu.carry());
        board.exec(&mut cpu, Instruction::Cmc);
        assert!(!cpu.carry());
        board.exec(&mut cpu, Instruction::Cmc);
        board.exec(&mut cpu, Instruction::Clc);
        assert!(!cpu.carry());

        cpu.set_accumulator(5);
        cpu.set_carry(true);
        board.exec(&mut cpu, Instruction::Clb);
        assert_eq!(cpu.accumulator(), 0);
        assert!(!cpu.carry());
    }

    #[test]
    fn test_tcc_tcs() {
        let mut board = Board::new();
        let mut cpu = Cpu::new();

        cpu.set_carry(true);
        board.exec(&mut cpu, Instruction::Tcc);
        assert_eq!((cpu.accumulator(), cpu.carry()), (1, false));
        board.exec(&mut cpu, Instruction::Tcc);
        assert_eq!((cpu.accumulator(), cpu.carry()), (0, false));

        cpu.set_carry(true);
        board.exec(&mut cpu, Instruction::Tcs);
        assert_eq!((cpu.accumulator(), cpu.carry()), (10, false));
        board.exec(&mut cpu, Instruction::Tcs);
        assert_eq!((cpu.accumulator(), cpu.carry()), (9, false));
    }

    #[test]
    fn test_cma() {
        let mut board = Board::new();
        let mut cpu = Cpu::new();
        cpu.set_accumulator(0b1010);

        board.exec(&mut cpu, Instruction::Cma);

        assert_eq!(cpu.accumulator(), 0b0101);
    }

    #[test]
    fn test_rotates_through_carry() {
        let mut board = Board::new();
        let mut cpu = Cpu::new();

        cpu.set_accumulator(0b1001);
        board.exec(&mut cpu, Instruction::Ral);
        assert_eq!((cpu.accumulator(), cpu.carry()), (0b0010, true));
        board.exec(&mut cpu, Instruction::Ral);
        assert_eq!((cpu.accumulator(), cpu.carry()), (0b0101, false));

        board.exec(&mut cpu, Instruction::Rar);
        assert_eq!((cpu.accumulator(), cpu.carry()), (0b0010, true));
        board.exec(&mut cpu, Instruction::Rar);
        assert_eq!((cpu.accumulator(), cpu.carry()), (0b1001, false));
    }

    #[test]
    fn test_daa() {
        let mut board = Board::new();
        let mut cpu = Cpu::new();

        cpu.set_accumulator(9);
        board.exec(&mut cpu, Instruction::Daa);
        assert_eq!((cpu.accumulator(), cpu.carry()), (9, false));

        cpu.set_accumulator(0xC);
        board.exec(&mut cpu, Instruction::Daa);
        assert_eq!((cpu.accumulator(), cpu.carry()), (2, true));

        // Carry already set: adjust again, carry stays set
        cpu.set_accumulator(1);
        board.exec(&mut cpu, Instruction::Daa);
        assert_eq!((cpu.accumulator(), cpu.carry()), (7, true));
    }

    #[test]
    fn test_kbp() {
        let mut board = Board::new();
        for input in 0..16u8 {
            let mut cpu = Cpu::new();
            cpu.set_accumulator(input);
            board.exec(&mut cpu, Instruction::Kbp);

            let expected = match input {
                1 => 0,
                2 => 1,
                4 => 2,
                8 => 3,
                _ => 15,
            };
            assert_eq!(cpu.accumulator(), expected, "KBP of {:04b}", input);
        }
    }

    #[test]
    fn test_two_byte_instruction_takes_two_steps() {
        let mut board = Board::new();
        let program = make_program(&[
            Instruction::Jun { address: 0x010 },
            Instruction::Ldm { data: 1 },
        ]);
        board.rom.load_program(0, &program).unwrap();
        let mut cpu = Cpu::new();

        assert_eq!(
            board.step(&mut cpu),
            Step::Fetched { address: 0, instruction: Instruction::Jun { address: 0x010 } }
        );
        assert_eq!(cpu.phase(), CyclePhase::Execute);
        assert_eq!(cpu.pending(), Some(Instruction::Jun { address: 0x010 }));
        assert_eq!(cpu.pc(), 2);

        board.step(&mut cpu);
        assert_eq!(cpu.phase(), CyclePhase::Fetch);
        assert_eq!(cpu.pending(), None);
        assert_eq!(cpu.pc(), 0x010);
        assert_eq!(cpu.instructions_executed(), 1);
    }

    #[test]
    fn test_pc_wraps_during_fetch() {
        let mut board = Board::new();
        board.rom.write(0xFFF, 0x40);
        board.rom.write(0x000, 0x77);
        let mut cpu = Cpu::new();
        cpu.set_pc(0xFFF);

        let step = board.step(&mut cpu);

        assert_eq!(step, Step::Fetched { address: 0xFFF, instruction: Instruction::Jun { address: 0x077 } });
        assert_eq!(cpu.pc(), 0x001);
    }

    #[test]
    fn test_reset() {
        let mut board = Board::new();
        let mut cpu = Cpu::new();
        cpu.set_accumulator(4);
        cpu.set_pc(0x300);
        board.exec(&mut cpu, Instruction::Jms { address: 0x100 });
        board.step(&mut cpu);

        cpu.reset();

        assert_eq!(cpu, Cpu::new());
    }

    proptest! {
        #[test]
        fn prop_add(a in 0u8..16, b in 0u8..16, carry in any::<bool>()) {
            let mut board = Board::new();
            let mut cpu = Cpu::new();
            cpu.set_accumulator(a);
            cpu.set_carry(carry);
            cpu.regs.set(0, b);

            board.exec(&mut cpu, Instruction::Add { register: 0 });

            prop_assert_eq!(cpu.accumulator(), (a + b) % 16);
            prop_assert_eq!(cpu.carry(), a + b > 15);
        }

        #[test]
        fn prop_sub(a in 0u8..16, b in 0u8..16, carry in any::<bool>()) {
            let mut board = Board::new();
            let mut cpu = Cpu::new();
            cpu.set_accumulator(a);
            cpu.set_carry(carry);
            cpu.regs.set(7, b);

            board.exec(&mut cpu, Instruction::Sub { register: 7 });

            let diff = i16::from(a) - i16::from(b) - if carry { 0 } else { 1 };
            prop_assert_eq!(i16::from(cpu.accumulator()), diff.rem_euclid(16));
            prop_assert_eq!(cpu.carry(), diff >= 0);
        }

        #[test]
        fn prop_iac(a in 0u8..16, carry in any::<bool>()) {
            let mut board = Board::new();
            let mut cpu = Cpu::new();
            cpu.set_accumulator(a);
            cpu.set_carry(carry);

            board.exec(&mut cpu, Instruction::Iac);

            prop_assert_eq!(cpu.accumulator(), (a + 1) % 16);
            prop_assert_eq!(cpu.carry(), cpu.accumulator() == 0);
        }

        #[test]
        fn prop_dac(a in 0u8..16, carry in any::<bool>()) {
            let mut board = Board::new();
            let mut cpu = Cpu::new();
            cpu.set_accumulator(a);
            cpu.set_carry(carry);

            board.exec(&mut cpu, Instruction::Dac);

            prop_assert_eq!(cpu.accumulator(), (a + 15) % 16);
            prop_assert_eq!(cpu.carry(), cpu.accumulator() != 15);
        }

        #[test]
        fn prop_fim_round_trip(pair in 0..PAIR_COUNT as u8, data in any::<u8>()) {
            let mut board = Board::new();
            let mut cpu = Cpu::new();

            board.exec(&mut cpu, Instruction::Fim { pair, data });

            prop_assert_eq!(cpu.regs.pair(pair), data);
        }
    }
}
