// Motor ports and status

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Speed limit (percent of full power) accepted by the board
pub const MAX_SPEED: i32 = 100;

/// Motor ports, in wire order
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum MotorPort {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
}

impl MotorPort {
    pub const ALL: [MotorPort; 4] = [Self::A, Self::B, Self::C, Self::D];

    /// Offset added to port-addressed base opcodes
    pub fn offset(self) -> u8 {
        self as u8
    }
}

/// Motor status as reported by the driver
///
/// The board's status message has no defined layout yet, so only `Unknown`
/// is ever produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum MotorStatus {
    Unknown,
}

/// Clamp a speed request to [-100, 100] and encode it as one wire byte
pub fn speed_byte(speed: i32) -> u8 {
    speed.clamp(-MAX_SPEED, MAX_SPEED) as i8 as u8
}
