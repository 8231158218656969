// Sensor ports, sensor types, and the per-port configuration registry
//
// The board needs to be told what is plugged into each port before it can
// be read; the configured type fixes how long the reply is and how it decodes.

use std::collections::HashMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::frame::{ProtocolError, Result};

/// Sensor ports, in wire order
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum SensorPort {
    S1 = 0,
    S2 = 1,
    S3 = 2,
    S4 = 3,
}

impl SensorPort {
    pub const ALL: [SensorPort; 4] = [Self::S1, Self::S2, Self::S3, Self::S4];

    /// Offset added to port-addressed base opcodes
    pub fn offset(self) -> u8 {
        self as u8
    }
}

/// Supported sensor types, in wire order (type code = ordinal + 1)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    None = 0,
    I2c,
    Custom,
    Touch,
    NxtTouch,
    Ev3Touch,
    NxtLightOn,
    NxtLightOff,
    NxtColorRed,
    NxtColorGreen,
    NxtColorBlue,
    NxtColorFull,
    NxtColorOff,
    NxtUltrasonic,
    Ev3GyroAbs,
    Ev3GyroDps,
    Ev3GyroAbsDps,
    Ev3ColorReflected,
    Ev3ColorAmbient,
    Ev3ColorColor,
    Ev3ColorRawReflected,
    Ev3ColorColorComponents,
    Ev3UltrasonicCm,
    Ev3UltrasonicInches,
    Ev3UltrasonicListen,
    Ev3InfraredProximity,
    Ev3InfraredSeek,
    Ev3InfraredRemote,
}

/// Types that report a pressed/released flag
pub const TOUCH_FAMILY: [SensorType; 3] =
    [SensorType::Touch, SensorType::NxtTouch, SensorType::Ev3Touch];

/// Types that report a distance in centimetres
pub const DISTANCE_CM: [SensorType; 2] = [SensorType::NxtUltrasonic, SensorType::Ev3UltrasonicCm];

/// Reply length (bytes) per type. Types missing here cannot be read raw.
const REPLY_LENGTHS: &[(SensorType, usize)] = &[
    (SensorType::Touch, 3),
    (SensorType::NxtTouch, 3),
    (SensorType::Ev3Touch, 3),
    (SensorType::NxtUltrasonic, 3),
    (SensorType::Ev3UltrasonicListen, 3),
    (SensorType::Ev3ColorReflected, 3),
    (SensorType::Ev3ColorAmbient, 3),
    (SensorType::Ev3ColorColor, 3),
    (SensorType::Ev3InfraredProximity, 3),
    (SensorType::NxtLightOn, 4),
    (SensorType::NxtLightOff, 4),
    (SensorType::NxtColorRed, 4),
    (SensorType::NxtColorGreen, 4),
    (SensorType::NxtColorBlue, 4),
    (SensorType::NxtColorOff, 4),
    (SensorType::Ev3GyroAbs, 4),
    (SensorType::Ev3GyroDps, 4),
    (SensorType::Ev3UltrasonicCm, 4),
    (SensorType::Ev3UltrasonicInches, 4),
    (SensorType::NxtColorFull, 8),
];

impl SensorType {
    /// Code sent in the set-sensor-type message
    pub fn type_code(self) -> u8 {
        self as u8 + 1
    }

    /// Expected reply length for a raw read of this type
    pub fn expected_payload_len(self) -> Result<usize> {
        REPLY_LENGTHS
            .iter()
            .find(|(ty, _)| *ty == self)
            .map(|&(_, len)| len)
            .ok_or(ProtocolError::UnsupportedVariant(self))
    }
}

/// Sensor state byte reported in every sensor reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorState {
    ValidData,
    NotConfigured,
    Configuring,
    NoData,
    Unknown(u8),
}

impl From<u8> for SensorState {
    fn from(raw: u8) -> Self {
        match raw {
            0 => Self::ValidData,
            1 => Self::NotConfigured,
            2 => Self::Configuring,
            3 => Self::NoData,
            other => Self::Unknown(other),
        }
    }
}

/// Raw reply to a read-sensor message: [type code, state, data...]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReading {
    bytes: Vec<u8>,
}

impl RawReading {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Type code echoed back by the board
    pub fn type_code(&self) -> Option<u8> {
        self.bytes.first().copied()
    }

    pub fn state(&self) -> Option<SensorState> {
        self.bytes.get(1).copied().map(SensorState::from)
    }

    /// Byte at `index`, or `ShortPayload` if the reply does not reach it
    pub fn byte(&self, index: usize) -> Result<u8> {
        self.bytes
            .get(index)
            .copied()
            .ok_or(ProtocolError::ShortPayload {
                expected: index + 1,
                actual: self.bytes.len(),
            })
    }
}

/// What is configured on each sensor port
#[derive(Debug, Default, Clone)]
pub struct SensorRegistry {
    ports: HashMap<SensorPort, SensorType>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the type configured on a port, replacing any previous one
    pub fn configure(&mut self, port: SensorPort, sensor: SensorType) {
        self.ports.insert(port, sensor);
    }

    /// Currently configured type; `None` counts as not configured
    pub fn current(&self, port: SensorPort) -> Result<SensorType> {
        match self.ports.get(&port) {
            Some(&sensor) if sensor != SensorType::None => Ok(sensor),
            _ => Err(ProtocolError::NotConfigured(port)),
        }
    }

    /// Reply length for the type configured on `port`
    pub fn expected_payload_len(&self, port: SensorPort) -> Result<usize> {
        self.current(port)?.expected_payload_len()
    }

    /// Check the port is configured as one of `candidates`
    pub fn require_one_of(&self, port: SensorPort, candidates: &[SensorType]) -> Result<SensorType> {
        let configured = self.current(port)?;
        if candidates.contains(&configured) {
            Ok(configured)
        } else {
            Err(ProtocolError::SensorMismatch { port, configured })
        }
    }
}
