// Board diagnostic: walk through identity, power and sensor queries
//
// Nothing here moves a motor. Runs against the simulated board; swap in a
// platform transport to point it at hardware.
//
// Usage: cargo run --example board_diagnostic

use brickpi3::board::{BrickPi3, SensorPort, SensorType, SimulatedBoard, VoltageRail};
use brickpi3::config::BusConfig;

const RAILS: [(VoltageRail, &str); 4] = [
    (VoltageRail::Battery, "Battery"),
    (VoltageRail::V9, "9V"),
    (VoltageRail::V5, "5V"),
    (VoltageRail::V3v3, "3.3V"),
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("debug".parse()?),
        )
        .init();

    let config = BusConfig::default();
    println!("BrickPi3 diagnostic");
    println!("SPI device: {} @ {} Hz, mode {}", config.device, config.speed_hz, config.mode);
    println!();

    let board = SimulatedBoard::new();
    board.set_reply(0x01, b"Dexter Industries".to_vec());
    board.set_reply(0x02, b"BrickPi3".to_vec());
    board.set_reply(0x0A, 7400u16.to_be_bytes().to_vec());
    board.set_reply(0x18, vec![SensorType::NxtTouch.type_code(), 0, 1]);
    let bp = BrickPi3::new(board);

    println!("Step 1: Identity...");
    match bp.manufacturer() {
        Ok(name) => println!("  ✓ Manufacturer: {}", name),
        Err(e) => {
            println!("  ✗ Failed to talk to the board: {}", e);
            println!();
            println!("Troubleshooting:");
            println!("  - Check SPI is enabled on the host");
            println!("  - Verify the board has battery power");
            return Err(e.into());
        }
    }
    println!("  ✓ Device: {}", bp.device_name()?);
    println!();

    println!("Step 2: Power rails...");
    for (rail, name) in RAILS {
        match bp.voltage(rail) {
            Ok(mv) => println!("  {:>8}: {:>5} mV", name, mv),
            Err(e) => println!("  {:>8}: ✗ ERROR: {}", name, e),
        }
    }
    println!();

    println!("Step 3: Touch sensor on S1...");
    bp.set_sensor_type(SensorPort::S1, SensorType::NxtTouch)?;
    let pressed = bp.is_pressed(SensorPort::S1)?;
    println!("  ✓ Pressed: {}", pressed);
    println!();

    println!("Diagnostic complete.");
    Ok(())
}
