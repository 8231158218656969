// BrickPi3 board driver
//
// Provides:
// - SPI frame codec (address, opcode, padding, acknowledgement check)
// - Sensor type registry and reply decoding
// - High-level driver API over any full-duplex transport

pub mod decode;
mod driver;
pub mod frame;
pub mod motor;
pub mod sensor;
pub mod transport;

pub use driver::{BrickPi3, VoltageRail};
pub use frame::{Frame, Message, ProtocolError};
pub use motor::{MotorPort, MotorStatus};
pub use sensor::{RawReading, SensorPort, SensorRegistry, SensorState, SensorType};
pub use transport::{SimulatedBoard, Transport, TransportError};
