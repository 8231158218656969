// brickpi3-probe: drive the BrickPi3 command layer from the shell
//
// Runs against the in-process simulated board, so every command can be tried
// without hardware. Output is JSON on stdout; logs go to stderr.

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use brickpi3::board::frame::ACK;
use brickpi3::board::{BrickPi3, MotorPort, SensorPort, SensorType, SimulatedBoard};
use brickpi3::config::BusConfig;
use brickpi3::messages::{BoardInfo, SensorReport, Voltages};

#[derive(Parser)]
#[command(name = "brickpi3-probe", version, about = "Exercise the BrickPi3 driver")]
struct Cli {
    /// Acknowledgement byte the simulated board replies with
    #[arg(long, default_value_t = ACK)]
    ack: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the bus configuration
    Config,
    /// Read manufacturer, name, id and versions
    Info,
    /// Read every power rail
    Voltages,
    /// Set LED brightness (0-100)
    Led {
        #[arg(allow_hyphen_values = true)]
        value: i32,
    },
    /// Configure a sensor port and take one raw reading
    Sensor {
        #[arg(value_enum)]
        port: SensorPort,
        #[arg(long = "type", value_enum)]
        sensor_type: SensorType,
    },
    /// Set motor power (-100..100)
    Motor {
        #[arg(value_enum)]
        port: MotorPort,
        #[arg(allow_hyphen_values = true)]
        speed: i32,
    },
    /// Read a motor encoder
    Encoder {
        #[arg(value_enum)]
        port: MotorPort,
    },
}

/// Simulated board preloaded with plausible identity and power readings
fn simulated_board(ack: u8) -> SimulatedBoard {
    let board = SimulatedBoard::new();
    board.set_ack(ack);
    board.set_reply(0x01, b"Dexter Industries".to_vec());
    board.set_reply(0x02, b"BrickPi3".to_vec());
    board.set_reply(0x05, vec![0xA0, 0x1B, 0x3C, 0x42, 0x51, 0x50, 0x4A, 0x31, 0x2E, 0x20, 0x20, 0x20, 0xFF, 0x0D, 0x1A, 0x0C]);
    board.set_reply(0x03, 3_000_000i32.to_be_bytes().to_vec());
    board.set_reply(0x04, 1_004_004i32.to_be_bytes().to_vec());
    board.set_reply(0x07, 3300u16.to_be_bytes().to_vec());
    board.set_reply(0x08, 5000u16.to_be_bytes().to_vec());
    board.set_reply(0x09, 9000u16.to_be_bytes().to_vec());
    board.set_reply(0x0A, 7400u16.to_be_bytes().to_vec());
    board
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Setup logging (set RUST_LOG=debug to see frame traffic)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    let config = BusConfig::default();
    info!("Simulating board on {} at {} Hz", config.device, config.speed_hz);

    let bp = BrickPi3::new(simulated_board(cli.ack));

    let output = match cli.command {
        Command::Config => serde_json::to_string_pretty(&config)?,
        Command::Info => serde_json::to_string_pretty(&BoardInfo::read(&bp)?)?,
        Command::Voltages => serde_json::to_string_pretty(&Voltages::read(&bp)?)?,
        Command::Led { value } => {
            bp.set_led(value)?;
            serde_json::to_string(&serde_json::json!({ "led": value.clamp(0, 100) }))?
        }
        Command::Sensor { port, sensor_type } => {
            bp.set_sensor_type(port, sensor_type)?;
            let reading = bp.read_sensor(port)?;
            serde_json::to_string_pretty(&SensorReport::new(port, sensor_type, &reading))?
        }
        Command::Motor { port, speed } => {
            bp.set_motor_speed(port, speed)?;
            serde_json::to_string(&serde_json::json!({ "port": port, "speed": speed.clamp(-100, 100) }))?
        }
        Command::Encoder { port } => {
            let position = bp.motor_encoder(port)?;
            serde_json::to_string(&serde_json::json!({ "port": port, "encoder": position }))?
        }
    };

    println!("{}", output);
    Ok(())
}
