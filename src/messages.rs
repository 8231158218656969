// Report types printed by the probe tool

use serde::{Deserialize, Serialize};

use crate::board::frame::Result;
use crate::board::{BrickPi3, RawReading, SensorPort, SensorState, SensorType, Transport, VoltageRail};

/// Board identity, as reported by the firmware
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardInfo {
    pub manufacturer: String,
    pub device_name: String,
    pub board_id: String,
    pub hardware_version: String,
    pub firmware_version: String,
}

impl BoardInfo {
    pub fn read<T: Transport>(bp: &BrickPi3<T>) -> Result<Self> {
        Ok(Self {
            manufacturer: bp.manufacturer()?,
            device_name: bp.device_name()?,
            board_id: bp.board_id()?,
            hardware_version: bp.hardware_version()?,
            firmware_version: bp.firmware_version()?,
        })
    }
}

/// All power rails, in millivolts
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Voltages {
    pub battery_mv: u16,
    pub v3v3_mv: u16,
    pub v5_mv: u16,
    pub v9_mv: u16,
}

impl Voltages {
    pub fn read<T: Transport>(bp: &BrickPi3<T>) -> Result<Self> {
        Ok(Self {
            battery_mv: bp.voltage(VoltageRail::Battery)?,
            v3v3_mv: bp.voltage(VoltageRail::V3v3)?,
            v5_mv: bp.voltage(VoltageRail::V5)?,
            v9_mv: bp.voltage(VoltageRail::V9)?,
        })
    }
}

/// One raw sensor reading with its decoded header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReport {
    pub port: SensorPort,
    pub sensor_type: SensorType,
    pub state: Option<SensorState>,
    pub raw: Vec<u8>,
}

impl SensorReport {
    pub fn new(port: SensorPort, sensor_type: SensorType, reading: &RawReading) -> Self {
        Self {
            port,
            sensor_type,
            state: reading.state(),
            raw: reading.bytes().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::SimulatedBoard;

    #[test]
    fn test_voltages_report() {
        let board = SimulatedBoard::new();
        board.set_reply(0x0A, vec![0x1C, 0x84]);
        board.set_reply(0x07, vec![0x0C, 0xE4]);
        board.set_reply(0x08, vec![0x13, 0x88]);
        board.set_reply(0x09, vec![0x23, 0x28]);
        let bp = BrickPi3::new(board);

        let voltages = Voltages::read(&bp).unwrap();
        assert_eq!(
            voltages,
            Voltages {
                battery_mv: 7300,
                v3v3_mv: 3300,
                v5_mv: 5000,
                v9_mv: 9000,
            }
        );
    }

    #[test]
    fn test_sensor_report_json() {
        let reading = RawReading::new(vec![5, 3, 1]);
        let report = SensorReport::new(SensorPort::S1, SensorType::NxtTouch, &reading);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["sensor_type"], "nxt_touch");
        assert_eq!(json["state"], "no_data");
        assert_eq!(json["raw"], serde_json::json!([5, 3, 1]));
    }
}
