// Feetech STS serial bus, as used by the swerve steering and drive channels
//
// Packet format: [0xFF, 0xFF, ID, Length, Instruction, Params..., Checksum]
// Drive motors run in velocity mode, steering motors in PWM mode. Any motor can
// be switched to PWM when a tuning session takes raw control of it.

use serialport::{self, SerialPort};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BAUDRATE: u32 = 1_000_000;
pub const DEFAULT_TIMEOUT_MS: u64 = 20; // one control cycle

/// Encoder resolution of the STS3215
pub const STEPS_PER_REVOLUTION: f64 = 4096.0;

/// Full-scale PWM command in PWM mode
pub const MAX_PWM: i16 = 1000;

const HEADER: [u8; 2] = [0xFF, 0xFF];

#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Instruction {
    Ping = 0x01,
    Read = 0x02,
    Write = 0x03,
}

/// RAM registers touched by the runtime
#[repr(u8)]
#[derive(Debug, Clone, Copy)]
pub enum Register {
    OperatingMode = 33,   // 1 byte
    TorqueEnable = 40,    // 1 byte
    GoalTime = 44,        // 2 bytes, PWM duty in PWM mode (signed)
    GoalVelocity = 46,    // 2 bytes, steps/s in velocity mode (signed)
    Lock = 55,            // 1 byte
    PresentPosition = 56, // 2 bytes, 0..4095
    PresentVelocity = 58, // 2 bytes, steps/s (signed)
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatingMode {
    Velocity = 1,
    Pwm = 2,
}

#[derive(Debug, thiserror::Error)]
pub enum FeetechError {
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response from motor {id}: {reason}")]
    InvalidResponse { id: u8, reason: String },

    #[error("Checksum mismatch for motor {id}")]
    ChecksumMismatch { id: u8 },

    #[error("Motor {id} returned error status: 0x{status:02X}")]
    MotorError { id: u8, status: u8 },

    #[error("Timeout waiting for response from motor {id}")]
    Timeout { id: u8 },
}

pub type Result<T> = std::result::Result<T, FeetechError>;

/// Half-duplex serial bus shared by every motor on the base
pub struct FeetechBus {
    port: Box<dyn SerialPort>,
}

impl FeetechBus {
    pub fn open(port_name: &str) -> Result<Self> {
        Self::open_with_baudrate(port_name, DEFAULT_BAUDRATE)
    }

    pub fn open_with_baudrate(port_name: &str, baudrate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baudrate)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .open()?;

        Ok(Self { port })
    }

    /// Checksum over everything after the header
    fn checksum(data: &[u8]) -> u8 {
        let sum: u16 = data.iter().map(|&b| b as u16).sum();
        (!sum & 0xFF) as u8
    }

    fn build_packet(id: u8, instruction: Instruction, params: &[u8]) -> Vec<u8> {
        let length = (params.len() + 2) as u8; // instruction + params + checksum
        let mut packet = Vec::with_capacity(6 + params.len());

        packet.extend_from_slice(&HEADER);
        packet.push(id);
        packet.push(length);
        packet.push(instruction as u8);
        packet.extend_from_slice(params);
        packet.push(Self::checksum(&packet[2..]));

        packet
    }

    /// Send a packet and return the status packet's parameters
    fn transact(&mut self, id: u8, instruction: Instruction, params: &[u8]) -> Result<Vec<u8>> {
        let packet = Self::build_packet(id, instruction, params);
        self.port.write_all(&packet)?;
        self.port.flush()?;
        self.read_response(id)
    }

    fn read_exact_or_timeout(&mut self, id: u8, buf: &mut [u8]) -> Result<()> {
        self.port.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                FeetechError::Timeout { id }
            } else {
                FeetechError::Io(e)
            }
        })
    }

    fn read_response(&mut self, expected_id: u8) -> Result<Vec<u8>> {
        let mut header = [0u8; 2];
        self.read_exact_or_timeout(expected_id, &mut header)?;
        if header != HEADER {
            return Err(FeetechError::InvalidResponse {
                id: expected_id,
                reason: format!("Invalid header: {:02X?}", header),
            });
        }

        let mut id_length = [0u8; 2];
        self.read_exact_or_timeout(expected_id, &mut id_length)?;
        let [id, length] = id_length;
        if id != expected_id {
            return Err(FeetechError::InvalidResponse {
                id: expected_id,
                reason: format!("ID mismatch: expected {}, got {}", expected_id, id),
            });
        }
        if length < 2 {
            return Err(FeetechError::InvalidResponse {
                id,
                reason: format!("Status packet too short: length {}", length),
            });
        }

        // error byte + params + checksum
        let mut remaining = vec![0u8; length as usize];
        self.read_exact_or_timeout(expected_id, &mut remaining)?;
        Self::parse_status(id, length, &remaining)
    }

    /// Validate checksum and status byte of a status packet body
    fn parse_status(id: u8, length: u8, body: &[u8]) -> Result<Vec<u8>> {
        let (received_checksum, payload) = match body.split_last() {
            Some(split) => split,
            None => {
                return Err(FeetechError::InvalidResponse {
                    id,
                    reason: "Empty status packet".to_string(),
                });
            }
        };

        let mut checksum_data = vec![id, length];
        checksum_data.extend_from_slice(payload);
        if Self::checksum(&checksum_data) != *received_checksum {
            return Err(FeetechError::ChecksumMismatch { id });
        }

        match payload.split_first() {
            Some((&0, params)) => Ok(params.to_vec()),
            Some((&status, _)) => Err(FeetechError::MotorError { id, status }),
            None => Err(FeetechError::InvalidResponse {
                id,
                reason: "Missing status byte".to_string(),
            }),
        }
    }

    pub fn ping(&mut self, id: u8) -> Result<bool> {
        match self.transact(id, Instruction::Ping, &[]) {
            Ok(_) => Ok(true),
            Err(FeetechError::Timeout { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn write_u8(&mut self, id: u8, register: Register, value: u8) -> Result<()> {
        debug!("Write u8 to motor {}: reg={:?}, value={}", id, register, value);
        self.transact(id, Instruction::Write, &[register as u8, value])?;
        Ok(())
    }

    pub fn write_i16(&mut self, id: u8, register: Register, value: i16) -> Result<()> {
        let [lo, hi] = encode_sign_magnitude(value).to_le_bytes();
        debug!("Write i16 to motor {}: reg={:?}, value={}", id, register, value);
        self.transact(id, Instruction::Write, &[register as u8, lo, hi])?;
        Ok(())
    }

    pub fn read_u16(&mut self, id: u8, register: Register) -> Result<u16> {
        let response = self.transact(id, Instruction::Read, &[register as u8, 2])?;
        match response.as_slice() {
            [lo, hi, ..] => Ok(u16::from_le_bytes([*lo, *hi])),
            _ => Err(FeetechError::InvalidResponse {
                id,
                reason: format!("Expected 2 bytes, got {}", response.len()),
            }),
        }
    }

    /// Change operating mode; torque has to be off while the mode register changes
    pub fn switch_mode(&mut self, id: u8, mode: OperatingMode) -> Result<()> {
        debug!("Switching motor {} to {:?} mode", id, mode);
        self.write_u8(id, Register::TorqueEnable, 0)?;
        self.write_u8(id, Register::Lock, 0)?;
        self.write_u8(id, Register::OperatingMode, mode as u8)?;
        self.write_u8(id, Register::TorqueEnable, 1)?;
        self.write_u8(id, Register::Lock, 1)
    }

    /// Goal velocity in steps/s (velocity mode)
    pub fn set_velocity(&mut self, id: u8, steps_per_sec: i16) -> Result<()> {
        self.write_i16(id, Register::GoalVelocity, steps_per_sec)
    }

    /// PWM duty in [-MAX_PWM, MAX_PWM] (PWM mode)
    pub fn set_pwm(&mut self, id: u8, duty: i16) -> Result<()> {
        self.write_i16(id, Register::GoalTime, duty.clamp(-MAX_PWM, MAX_PWM))
    }

    pub fn get_velocity(&mut self, id: u8) -> Result<i16> {
        let raw = self.read_u16(id, Register::PresentVelocity)?;
        Ok(decode_sign_magnitude(raw))
    }

    /// Present position in encoder steps, 0..4095
    pub fn get_position(&mut self, id: u8) -> Result<u16> {
        Ok(self.read_u16(id, Register::PresentPosition)? % STEPS_PER_REVOLUTION as u16)
    }
}

/// Bit 15 = sign (1 = negative), bits 0-14 = magnitude
fn encode_sign_magnitude(value: i16) -> u16 {
    let magnitude = value.unsigned_abs().min(0x7FFF);
    if value < 0 { 0x8000 | magnitude } else { magnitude }
}

fn decode_sign_magnitude(raw: u16) -> i16 {
    let magnitude = (raw & 0x7FFF) as i16;
    if raw & 0x8000 != 0 { -magnitude } else { magnitude }
}
