// BrickPi3 SPI frame codec
//
// Every transaction is a single full-duplex transfer of equal-length buffers:
// Request:  [ADDRESS, Message, Payload..., 0x00, 0x00, Padding...]
// Response: [x, x, x, ACK, Reply...]   (reply = payload.len() + padding bytes)

use tracing::debug;

use super::sensor::{SensorPort, SensorType};
use super::transport::{Transport, TransportError};

/// Fixed peripheral address of the board on the bus
pub const ADDRESS: u8 = 0x01;

/// Value the board writes at offset 3 of every successful reply
pub const ACK: u8 = 0xA5;

/// Bytes clocked out before the reply payload starts
pub const REPLY_HEADER_LEN: usize = 4;

/// Zero bytes the board needs between the request and its acknowledgement
const TURNAROUND_LEN: usize = 2;

/// Message set (base opcodes; port-addressed messages add the port offset)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    ReadManufacturer = 0x01,
    ReadDeviceName = 0x02,
    ReadHardwareVersion = 0x03,
    ReadFirmwareVersion = 0x04,
    ReadId = 0x05,
    SetLed = 0x06,
    ReadVoltage3v3 = 0x07,
    ReadVoltage5v = 0x08,
    ReadVoltage9v = 0x09,
    ReadVoltageVcc = 0x0A,
    SetSensorType = 0x14,         // + sensor port
    ReadSensor = 0x18,            // + sensor port
    SetMotorSpeed = 0x1C,         // + motor port
    SetMotorPosition = 0x20,      // + motor port
    SetMotorEncoderOffset = 0x38, // + motor port
    ReadMotorEncoder = 0x3C,      // + motor port
}

impl Message {
    /// Opcode for messages that do not address a port
    pub fn opcode(self) -> u8 {
        self as u8
    }

    /// Opcode for a port-addressed message
    pub fn with_offset(self, offset: u8) -> u8 {
        (self as u8).wrapping_add(offset)
    }
}

/// Error types for board communication
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Transport fault: {0}")]
    TransportFault(#[from] TransportError),

    #[error("Bad acknowledgement for opcode 0x{opcode:02X}: got 0x{received:02X}")]
    BadAcknowledgement { opcode: u8, received: u8 },

    #[error("Sensor port {0:?} is not configured")]
    NotConfigured(SensorPort),

    #[error("Sensor port {port:?} is configured as {configured:?}, which cannot serve this read")]
    SensorMismatch {
        port: SensorPort,
        configured: SensorType,
    },

    #[error("Sensor type {0:?} has no known reply length")]
    UnsupportedVariant(SensorType),

    #[error("Reply too short: expected at least {expected} bytes, got {actual}")]
    ShortPayload { expected: usize, actual: usize },

    #[error("Version value {0} has too few digits")]
    MalformedVersion(i32),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

/// One request frame, ready to be clocked out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    /// Build a request frame. `padding` is the number of reply bytes expected
    /// beyond the payload echo (0 for writes).
    pub fn encode(opcode: u8, payload: &[u8], padding: usize) -> Self {
        let len = 2 + payload.len() + TURNAROUND_LEN + padding;
        let mut bytes = Vec::with_capacity(len);

        bytes.push(ADDRESS);
        bytes.push(opcode);
        bytes.extend_from_slice(payload);
        bytes.resize(len, 0x00);

        Self { bytes }
    }

    pub fn opcode(&self) -> u8 {
        self.bytes[1]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of reply bytes `exchange` returns for this frame
    pub fn reply_len(&self) -> usize {
        self.bytes.len() - REPLY_HEADER_LEN
    }

    /// Validate a response to this frame and strip its header
    pub fn unwrap_response(&self, response: &[u8]) -> Result<Vec<u8>> {
        if response.len() != self.bytes.len() {
            return Err(TransportError::LengthMismatch {
                sent: self.bytes.len(),
                received: response.len(),
            }
            .into());
        }

        let received = response[3];
        if received != ACK {
            return Err(ProtocolError::BadAcknowledgement {
                opcode: self.opcode(),
                received,
            });
        }

        Ok(response[REPLY_HEADER_LEN..].to_vec())
    }
}

/// Perform one transaction: clock `frame` out, check the acknowledgement,
/// and return the reply bytes. No retries.
pub fn exchange<T: Transport + ?Sized>(frame: &Frame, port: &mut T) -> Result<Vec<u8>> {
    debug!("SPI request: {:02X?}", frame.as_bytes());
    let response = port.exchange(frame.as_bytes())?;
    debug!("SPI response: {:02X?}", response);

    frame.unwrap_response(&response)
}
