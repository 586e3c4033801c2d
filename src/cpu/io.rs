//! Reference IO collaborator.
//!
//! Latches for the 4-bit input and output ports, the four RAM status
//! channels, and the TEST pin.

use crate::cpu::ports::IoPort;
use crate::cpu::NIBBLE_MASK;
use serde::{Serialize, Deserialize};

/// Number of 4-bit IO ports on each side.
pub const IO_PORTS: usize = 16;

/// Number of status channels (WR0-WR3 / RD0-RD3).
pub const STATUS_CHANNELS: usize = 4;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoBoard {
    inputs: [u8; IO_PORTS],
    outputs: [u8; IO_PORTS],
    status: [u8; STATUS_CHANNELS],
    test_pin: bool,
}

impl IoBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive an input port from outside the CPU.
    pub fn set_input(&mut self, port: u8, value: u8) {
        self.inputs[usize::from(port) % IO_PORTS] = value & NIBBLE_MASK;
    }

    /// Last value written to an output port.
    pub fn output(&self, port: u8) -> u8 {
        self.outputs[usize::from(port) % IO_PORTS]
    }

    /// Current value of a status channel.
    pub fn status(&self, channel: u8) -> u8 {
        self.status[usize::from(channel) % STATUS_CHANNELS]
    }

    pub fn set_status(&mut self, channel: u8, value: u8) {
        self.status[usize::from(channel) % STATUS_CHANNELS] = value & NIBBLE_MASK;
    }

    pub fn set_test_pin(&mut self, level: bool) {
        self.test_pin = level;
    }

    pub fn test_pin(&self) -> bool {
        self.test_pin
    }

    /// Check that every latch holds a nibble.
    pub fn validate(&self) -> Result<(), String> {
        let mut latches = self.inputs.iter().chain(&self.outputs).chain(&self.status);
        if latches.any(|v| *v > NIBBLE_MASK) {
            return Err("IO latch holds more than 4 bits".into());
        }
        Ok(())
    }
}

impl IoPort for IoBoard {
    fn read_input_port(&mut self, port: u8) -> u8 {
        self.inputs[usize::from(port) % IO_PORTS]
    }

    fn write_output_port(&mut self, port: u8, value: u8) {
        let value = value & NIBBLE_MASK;
        tracing::debug!("output port {} <- 0x{:X}", port, value);
        self.outputs[usize::from(port) % IO_PORTS] = value;
    }

    fn read_status_channel(&mut self, channel: u8) -> u8 {
        self.status(channel)
    }

    fn write_status_channel(&mut self, channel: u8, value: u8) {
        tracing::debug!("status channel {} <- 0x{:X}", channel, value & NIBBLE_MASK);
        self.set_status(channel, value);
    }

    fn test_input_pin(&mut self) -> bool {
        self.test_pin
    }
}
