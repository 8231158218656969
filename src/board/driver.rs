// High-level BrickPi3 driver
//
// Owns the bus, the sensor registry and the cached version strings behind a
// single lock: one transaction in flight at a time.

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::decode;
use super::frame::{self, Frame, Message, Result};
use super::motor::{MotorPort, MotorStatus, speed_byte};
use super::sensor::{DISTANCE_CM, RawReading, SensorPort, SensorRegistry, SensorType, TOUCH_FAMILY};
use super::transport::Transport;

/// Reply lengths of the fixed-size messages
const NAME_LEN: usize = 20;
const ID_LEN: usize = 16;
const VERSION_LEN: usize = 4;
const VOLTAGE_LEN: usize = 2;
const ENCODER_LEN: usize = 4;

/// LED brightness range (percent)
const LED_MAX: i32 = 100;

/// Power rails the board can measure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoltageRail {
    Battery,
    V3v3,
    V5,
    V9,
}

impl VoltageRail {
    fn message(self) -> Message {
        match self {
            Self::Battery => Message::ReadVoltageVcc,
            Self::V3v3 => Message::ReadVoltage3v3,
            Self::V5 => Message::ReadVoltage5v,
            Self::V9 => Message::ReadVoltage9v,
        }
    }
}

struct Inner<T> {
    bus: T,
    sensors: SensorRegistry,
    hardware_version: Option<String>,
    firmware_version: Option<String>,
}

impl<T: Transport> Inner<T> {
    fn transact(&mut self, opcode: u8, payload: &[u8], padding: usize) -> Result<Vec<u8>> {
        let request = Frame::encode(opcode, payload, padding);
        frame::exchange(&request, &mut self.bus)
    }

    fn read_version(&mut self, message: Message) -> Result<String> {
        let reply = self.transact(message.opcode(), &[], VERSION_LEN)?;
        decode::version(decode::be_i32(&reply)?)
    }

    fn read_sensor(&mut self, port: SensorPort) -> Result<RawReading> {
        let len = self.sensors.expected_payload_len(port)?;
        let reply = self.transact(Message::ReadSensor.with_offset(port.offset()), &[], len)?;
        debug!("Sensor {:?} on port {:?}", reply, port);
        Ok(RawReading::new(reply))
    }

    fn set_sensor_type(&mut self, port: SensorPort, sensor: SensorType) -> Result<()> {
        let opcode = Message::SetSensorType.with_offset(port.offset());
        debug!("Set sensor type on {:?}: {:?} (code {})", port, sensor, sensor.type_code());
        self.transact(opcode, &[sensor.type_code()], 0)?;

        self.sensors.configure(port, sensor);
        Ok(())
    }

    fn set_motor_speed(&mut self, port: MotorPort, speed: i32) -> Result<()> {
        let opcode = Message::SetMotorSpeed.with_offset(port.offset());
        self.transact(opcode, &[speed_byte(speed)], 0)?;
        Ok(())
    }
}

/// Driver handle for one BrickPi3 board
pub struct BrickPi3<T: Transport> {
    inner: Mutex<Inner<T>>,
}

impl<T: Transport> BrickPi3<T> {
    /// Wrap an already configured bus. No traffic is sent.
    pub fn new(bus: T) -> Self {
        info!("BrickPi3 driver attached");
        Self {
            inner: Mutex::new(Inner {
                bus,
                sensors: SensorRegistry::new(),
                hardware_version: None,
                firmware_version: None,
            }),
        }
    }

    /// Swap in a new bus connection. Cached version strings are dropped;
    /// sensor configuration is kept.
    pub fn reconnect(&self, bus: T) {
        info!("Reconnecting BrickPi3 bus");
        let mut inner = self.inner.lock();
        inner.bus = bus;
        inner.hardware_version = None;
        inner.firmware_version = None;
    }

    // === Identity ===

    pub fn manufacturer(&self) -> Result<String> {
        let reply = self.inner.lock().transact(Message::ReadManufacturer.opcode(), &[], NAME_LEN)?;
        let name = decode::name(&reply);
        debug!("Manufacturer: {}", name);
        Ok(name)
    }

    pub fn device_name(&self) -> Result<String> {
        let reply = self.inner.lock().transact(Message::ReadDeviceName.opcode(), &[], NAME_LEN)?;
        let name = decode::name(&reply);
        debug!("Device name: {}", name);
        Ok(name)
    }

    /// Board serial number as 32 hex digits
    pub fn board_id(&self) -> Result<String> {
        let reply = self.inner.lock().transact(Message::ReadId.opcode(), &[], ID_LEN)?;
        Ok(decode::hex_id(&reply))
    }

    /// Hardware revision, read once per connection
    pub fn hardware_version(&self) -> Result<String> {
        let mut inner = self.inner.lock();
        if let Some(version) = &inner.hardware_version {
            return Ok(version.clone());
        }
        let version = inner.read_version(Message::ReadHardwareVersion)?;
        inner.hardware_version = Some(version.clone());
        Ok(version)
    }

    /// Firmware revision, read once per connection
    pub fn firmware_version(&self) -> Result<String> {
        let mut inner = self.inner.lock();
        if let Some(version) = &inner.firmware_version {
            return Ok(version.clone());
        }
        let version = inner.read_version(Message::ReadFirmwareVersion)?;
        inner.firmware_version = Some(version.clone());
        Ok(version)
    }

    // === Power and LED ===

    /// Rail voltage in millivolts
    pub fn voltage(&self, rail: VoltageRail) -> Result<u16> {
        let reply = self.inner.lock().transact(rail.message().opcode(), &[], VOLTAGE_LEN)?;
        decode::be_u16(&reply, 0)
    }

    pub fn battery_voltage(&self) -> Result<u16> {
        self.voltage(VoltageRail::Battery)
    }

    pub fn voltage_3v3(&self) -> Result<u16> {
        self.voltage(VoltageRail::V3v3)
    }

    pub fn voltage_5v(&self) -> Result<u16> {
        self.voltage(VoltageRail::V5)
    }

    pub fn voltage_9v(&self) -> Result<u16> {
        self.voltage(VoltageRail::V9)
    }

    /// Set the LED brightness, clamped to 0-100
    pub fn set_led(&self, value: i32) -> Result<()> {
        let value = value.clamp(0, LED_MAX) as u8;
        debug!("LED value: {}", value);
        self.inner.lock().transact(Message::SetLed.opcode(), &[value], 0)?;
        Ok(())
    }

    // === Sensors ===

    /// Tell the board what is plugged into `port`. The registry is only
    /// updated once the board has acknowledged.
    pub fn set_sensor_type(&self, port: SensorPort, sensor: SensorType) -> Result<()> {
        self.inner.lock().set_sensor_type(port, sensor)
    }

    /// Type currently configured on `port`
    pub fn sensor_type(&self, port: SensorPort) -> Result<SensorType> {
        self.inner.lock().sensors.current(port)
    }

    /// Raw sensor reply; its length is fixed by the configured type
    pub fn read_sensor(&self, port: SensorPort) -> Result<RawReading> {
        self.inner.lock().read_sensor(port)
    }

    fn read_guarded(&self, port: SensorPort, candidates: &[SensorType]) -> Result<(SensorType, RawReading)> {
        let mut inner = self.inner.lock();
        let sensor = inner.sensors.require_one_of(port, candidates)?;
        let reading = inner.read_sensor(port)?;
        Ok((sensor, reading))
    }

    /// Touch sensor state
    pub fn is_pressed(&self, port: SensorPort) -> Result<bool> {
        let (_, reading) = self.read_guarded(port, &TOUCH_FAMILY)?;
        Ok(reading.byte(2)? == 1)
    }

    /// Ultrasonic distance in centimetres
    pub fn distance_cm(&self, port: SensorPort) -> Result<i32> {
        let (sensor, reading) = self.read_guarded(port, &DISTANCE_CM)?;
        match sensor {
            SensorType::NxtUltrasonic => Ok(reading.byte(2)? as i8 as i32),
            _ => Ok(decode::be_u16(reading.bytes(), 2)? as i32),
        }
    }

    /// NXT light sensor with its LED on
    pub fn reflected_light(&self, port: SensorPort) -> Result<i32> {
        let (_, reading) = self.read_guarded(port, &[SensorType::NxtLightOn])?;
        decode::light(reading.bytes())
    }

    /// NXT light sensor with its LED off
    pub fn ambient_light(&self, port: SensorPort) -> Result<i32> {
        let (_, reading) = self.read_guarded(port, &[SensorType::NxtLightOff])?;
        decode::light(reading.bytes())
    }

    /// Gyro absolute angle in degrees.
    // Any configured type is accepted here, unlike the other typed readers.
    pub fn absolute_rotation(&self, port: SensorPort) -> Result<i32> {
        let reading = self.read_sensor(port)?;
        decode::rotation(reading.bytes())
    }

    /// Gyro rotation rate in degrees per second
    pub fn rotation_rate(&self, port: SensorPort) -> Result<i32> {
        let reading = self.read_sensor(port)?;
        decode::rotation(reading.bytes())
    }

    // === Motors ===

    /// Motor power in percent, clamped to -100..=100
    pub fn set_motor_speed(&self, port: MotorPort, speed: i32) -> Result<()> {
        debug!("Motor {:?} speed: {}", port, speed);
        self.inner.lock().set_motor_speed(port, speed)
    }

    /// Target position in degrees
    pub fn set_motor_position(&self, port: MotorPort, position: i32) -> Result<()> {
        let opcode = Message::SetMotorPosition.with_offset(port.offset());
        self.inner.lock().transact(opcode, &position.to_be_bytes(), 0)?;
        Ok(())
    }

    pub fn set_motor_encoder_offset(&self, port: MotorPort, offset: i32) -> Result<()> {
        let opcode = Message::SetMotorEncoderOffset.with_offset(port.offset());
        self.inner.lock().transact(opcode, &offset.to_be_bytes(), 0)?;
        Ok(())
    }

    /// Encoder position in degrees.
    // The board reports a signed count but it is returned unsigned, matching
    // existing callers.
    pub fn motor_encoder(&self, port: MotorPort) -> Result<u32> {
        let opcode = Message::ReadMotorEncoder.with_offset(port.offset());
        let reply = self.inner.lock().transact(opcode, &[], ENCODER_LEN)?;
        decode::be_u32(&reply)
    }

    /// Always `Unknown`; sends nothing
    pub fn motor_status(&self, _port: MotorPort) -> MotorStatus {
        MotorStatus::Unknown
    }

    // === Whole board ===

    /// Unconfigure every sensor port and stop every motor
    pub fn reset_all(&self) -> Result<()> {
        info!("Resetting all sensors and motors");
        let mut inner = self.inner.lock();
        for port in SensorPort::ALL {
            inner.set_sensor_type(port, SensorType::None)?;
        }
        for port in MotorPort::ALL {
            inner.set_motor_speed(port, 0)?;
        }
        Ok(())
    }

    /// Stop every motor
    pub fn stop(&self) -> Result<()> {
        info!("Stopping all motors");
        let mut inner = self.inner.lock();
        for port in MotorPort::ALL {
            inner.set_motor_speed(port, 0)?;
        }
        Ok(())
    }
}

impl<T: Transport> Drop for BrickPi3<T> {
    fn drop(&mut self) {
        // Try to stop motors when driver is dropped (safety measure)
        if let Err(e) = self.stop() {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::frame::{ACK, ProtocolError};
    use crate::board::transport::SimulatedBoard;

    fn driver() -> (BrickPi3<SimulatedBoard>, SimulatedBoard) {
        let board = SimulatedBoard::new();
        (BrickPi3::new(board.clone()), board)
    }

    #[test]
    fn test_led_clamping() {
        let (bp, board) = driver();
        bp.set_led(150).unwrap();
        bp.set_led(-5).unwrap();
        bp.set_led(42).unwrap();

        let requests = board.requests();
        assert_eq!(requests[0], vec![0x01, 0x06, 100, 0, 0]);
        assert_eq!(requests[1], vec![0x01, 0x06, 0, 0, 0]);
        assert_eq!(requests[2], vec![0x01, 0x06, 42, 0, 0]);
    }

    #[test]
    fn test_motor_speed_clamping() {
        let (bp, board) = driver();
        bp.set_motor_speed(MotorPort::B, 250).unwrap();
        bp.set_motor_speed(MotorPort::B, -250).unwrap();

        let requests = board.requests();
        assert_eq!(requests[0], vec![0x01, 0x1D, 100, 0, 0]);
        assert_eq!(requests[1], vec![0x01, 0x1D, 0x9C, 0, 0]);
    }

    #[test]
    fn test_voltage_decode() {
        let (bp, board) = driver();
        board.set_reply(0x0A, vec![0x0C, 0x80]);
        assert_eq!(bp.battery_voltage().unwrap(), 3200);
        assert_eq!(board.requests()[0], vec![0x01, 0x0A, 0, 0, 0, 0]);

        board.set_reply(0x08, vec![0x13, 0x88]);
        assert_eq!(bp.voltage_5v().unwrap(), 5000);
    }

    #[test]
    fn test_names() {
        let (bp, board) = driver();
        board.set_reply(0x01, b"Dexter\0Industries".to_vec());
        board.set_reply(0x02, vec![0x41, 0x00, 0x42, 0x00, 0x43]);

        assert_eq!(bp.manufacturer().unwrap(), "DexterIndustries");
        assert_eq!(bp.device_name().unwrap(), "ABC");
        // 20-byte reply + 4 header bytes
        assert_eq!(board.requests()[1].len(), 24);
    }

    #[test]
    fn test_board_id() {
        let (bp, board) = driver();
        board.set_reply(0x05, (0u8..16).collect());
        assert_eq!(bp.board_id().unwrap(), "000102030405060708090A0B0C0D0E0F");
    }

    #[test]
    fn test_versions_are_cached_until_reconnect() {
        let (bp, board) = driver();
        board.set_reply(0x03, 3_000_033i32.to_be_bytes().to_vec());
        board.set_reply(0x04, 1_004_009i32.to_be_bytes().to_vec());

        assert_eq!(bp.hardware_version().unwrap(), "3.0.3");
        assert_eq!(bp.hardware_version().unwrap(), "3.0.3");
        assert_eq!(bp.firmware_version().unwrap(), "1.4.9");
        assert_eq!(board.requests().len(), 2);

        let fresh = SimulatedBoard::new();
        fresh.set_reply(0x03, 4_000_000i32.to_be_bytes().to_vec());
        bp.reconnect(fresh.clone());
        assert_eq!(bp.hardware_version().unwrap(), "4.0.0");
        assert_eq!(fresh.requests().len(), 1);
    }

    #[test]
    fn test_failed_version_read_is_not_cached() {
        let (bp, board) = driver();
        board.set_reply(0x03, 12i32.to_be_bytes().to_vec());
        assert!(matches!(bp.hardware_version(), Err(ProtocolError::MalformedVersion(12))));

        board.set_reply(0x03, 3_000_033i32.to_be_bytes().to_vec());
        assert_eq!(bp.hardware_version().unwrap(), "3.0.3");
    }

    #[test]
    fn test_configure_then_read_uses_variant_length() {
        let (bp, board) = driver();
        bp.set_sensor_type(SensorPort::S2, SensorType::NxtLightOn).unwrap();
        assert_eq!(board.requests()[0], vec![0x01, 0x15, 7, 0, 0]);

        let reading = bp.read_sensor(SensorPort::S2).unwrap();
        assert_eq!(reading.bytes().len(), 4);
        assert_eq!(board.requests()[1], vec![0x01, 0x19, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_unconfigured_read_never_touches_bus() {
        let (bp, board) = driver();
        for port in SensorPort::ALL {
            assert!(matches!(bp.read_sensor(port), Err(ProtocolError::NotConfigured(p)) if p == port));
            assert!(matches!(bp.is_pressed(port), Err(ProtocolError::NotConfigured(_))));
            assert!(matches!(bp.absolute_rotation(port), Err(ProtocolError::NotConfigured(_))));
        }
        assert!(board.requests().is_empty());
    }

    #[test]
    fn test_unsupported_variant_never_touches_bus() {
        let (bp, board) = driver();
        bp.set_sensor_type(SensorPort::S1, SensorType::Ev3InfraredSeek).unwrap();
        board.clear_requests();

        assert!(matches!(
            bp.read_sensor(SensorPort::S1),
            Err(ProtocolError::UnsupportedVariant(SensorType::Ev3InfraredSeek))
        ));
        assert!(board.requests().is_empty());
    }

    #[test]
    fn test_failed_configure_leaves_port_unconfigured() {
        let (bp, board) = driver();
        board.fail_next("bus fault");
        assert!(matches!(
            bp.set_sensor_type(SensorPort::S1, SensorType::NxtTouch),
            Err(ProtocolError::TransportFault(_))
        ));
        assert!(matches!(bp.sensor_type(SensorPort::S1), Err(ProtocolError::NotConfigured(_))));

        board.set_ack(0x00);
        assert!(matches!(
            bp.set_sensor_type(SensorPort::S1, SensorType::NxtTouch),
            Err(ProtocolError::BadAcknowledgement { opcode: 0x14, received: 0x00 })
        ));
        assert!(matches!(bp.sensor_type(SensorPort::S1), Err(ProtocolError::NotConfigured(_))));

        board.set_ack(ACK);
    }

    #[test]
    fn test_is_pressed() {
        let (bp, board) = driver();
        bp.set_sensor_type(SensorPort::S1, SensorType::Ev3Touch).unwrap();

        board.set_reply(0x18, vec![6, 0, 1]);
        assert!(bp.is_pressed(SensorPort::S1).unwrap());
        board.set_reply(0x18, vec![6, 0, 0]);
        assert!(!bp.is_pressed(SensorPort::S1).unwrap());
    }

    #[test]
    fn test_typed_reader_rejects_wrong_sensor() {
        let (bp, board) = driver();
        bp.set_sensor_type(SensorPort::S4, SensorType::NxtLightOff).unwrap();
        board.clear_requests();

        assert!(matches!(
            bp.reflected_light(SensorPort::S4),
            Err(ProtocolError::SensorMismatch {
                port: SensorPort::S4,
                configured: SensorType::NxtLightOff
            })
        ));
        assert!(matches!(bp.is_pressed(SensorPort::S4), Err(ProtocolError::SensorMismatch { .. })));
        assert!(board.requests().is_empty());

        board.set_reply(0x1B, vec![8, 0, 0x01, 0x2C]);
        assert_eq!(bp.ambient_light(SensorPort::S4).unwrap(), 300);
    }

    #[test]
    fn test_distance_cm() {
        let (bp, board) = driver();
        bp.set_sensor_type(SensorPort::S1, SensorType::NxtUltrasonic).unwrap();
        bp.set_sensor_type(SensorPort::S2, SensorType::Ev3UltrasonicCm).unwrap();

        // Single signed byte
        board.set_reply(0x18, vec![14, 0, 0xFF]);
        assert_eq!(bp.distance_cm(SensorPort::S1).unwrap(), -1);

        board.set_reply(0x19, vec![23, 0, 0x01, 0x02]);
        assert_eq!(bp.distance_cm(SensorPort::S2).unwrap(), 258);
    }

    #[test]
    fn test_rotation_readers() {
        let (bp, board) = driver();
        bp.set_sensor_type(SensorPort::S3, SensorType::Ev3GyroAbs).unwrap();

        board.set_reply(0x1A, vec![15, 0, 0x10, 0x01]);
        assert_eq!(bp.absolute_rotation(SensorPort::S3).unwrap(), 0x1001 - 0x10000);

        board.set_reply(0x1A, vec![15, 0, 0x00, 0x2D]);
        assert_eq!(bp.rotation_rate(SensorPort::S3).unwrap(), 45);
    }

    #[test]
    fn test_rotation_on_short_reply_type() {
        let (bp, _board) = driver();
        bp.set_sensor_type(SensorPort::S1, SensorType::NxtTouch).unwrap();
        assert!(matches!(
            bp.absolute_rotation(SensorPort::S1),
            Err(ProtocolError::ShortPayload { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_motor_position_and_encoder() {
        let (bp, board) = driver();
        bp.set_motor_position(MotorPort::C, -2).unwrap();
        bp.set_motor_encoder_offset(MotorPort::A, 0x01020304).unwrap();

        let requests = board.requests();
        assert_eq!(requests[0], vec![0x01, 0x22, 0xFF, 0xFF, 0xFF, 0xFE, 0, 0]);
        assert_eq!(requests[1], vec![0x01, 0x38, 0x01, 0x02, 0x03, 0x04, 0, 0]);

        board.set_reply(0x3D, vec![0xFF, 0xFF, 0xFF, 0xFE]);
        assert_eq!(bp.motor_encoder(MotorPort::B).unwrap(), 0xFFFF_FFFE);
    }

    #[test]
    fn test_motor_status_is_unknown() {
        let (bp, board) = driver();
        assert_eq!(bp.motor_status(MotorPort::D), MotorStatus::Unknown);
        assert!(board.requests().is_empty());
    }

    #[test]
    fn test_reset_all() {
        let (bp, board) = driver();
        bp.set_sensor_type(SensorPort::S1, SensorType::NxtTouch).unwrap();
        board.clear_requests();

        bp.reset_all().unwrap();
        let requests = board.requests();
        assert_eq!(requests.len(), 8);
        assert_eq!(requests[0], vec![0x01, 0x14, 1, 0, 0]);
        assert_eq!(requests[7], vec![0x01, 0x1F, 0, 0, 0]);
        assert!(matches!(bp.read_sensor(SensorPort::S1), Err(ProtocolError::NotConfigured(_))));
    }

    #[test]
    fn test_drop_stops_motors() {
        let (bp, board) = driver();
        drop(bp);
        let requests = board.requests();
        assert_eq!(requests.len(), 4);
        assert!(requests.iter().all(|r| r[2] == 0));
    }

    #[test]
    fn test_shared_across_threads() {
        let board = SimulatedBoard::new();
        board.set_reply(0x0A, vec![0x0C, 0x80]);
        let bp = std::sync::Arc::new(BrickPi3::new(board.clone()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let bp = bp.clone();
                std::thread::spawn(move || bp.battery_voltage().unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), 3200);
        }
        assert_eq!(board.requests().len(), 4);
    }
}
