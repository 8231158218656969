// Bus parameters and GPIO bootstrap pins
use serde::{Deserialize, Serialize};

// SPI device the board is wired to (chip select 1 on bus 0)
pub const SPI_DEVICE: &str = "SPI0.1";

// 500 kHz, 8 bits per word, MSB first, mode 0
pub const SPI_SPEED_HZ: u32 = 500_000;
pub const SPI_BITS_PER_WORD: u8 = 8;
pub const SPI_MODE: u8 = 0;

// Pins driven low before first use; every other pin is left as an input
pub const IDLE_LOW_PINS: [&str; 3] = ["BCM4", "BCM5", "BCM6"];

/// SPI settings handed to the platform when opening the bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusConfig {
    pub device: String,
    pub speed_hz: u32,
    pub bits_per_word: u8,
    pub lsb_first: bool,
    pub mode: u8,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            device: SPI_DEVICE.to_string(),
            speed_hz: SPI_SPEED_HZ,
            bits_per_word: SPI_BITS_PER_WORD,
            lsb_first: false,
            mode: SPI_MODE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bus_config() {
        let config = BusConfig::default();
        assert_eq!(config.device, "SPI0.1");
        assert_eq!(config.speed_hz, 500_000);
        assert_eq!(config.bits_per_word, 8);
        assert!(!config.lsb_first);
        assert_eq!(config.mode, 0);
    }

    #[test]
    fn test_bus_config_from_json() {
        let config: BusConfig = serde_json::from_str(
            r#"{"device":"SPI0.0","speed_hz":250000,"bits_per_word":8,"lsb_first":false,"mode":0}"#,
        )
        .unwrap();
        assert_eq!(config.device, "SPI0.0");
        assert_eq!(config.speed_hz, 250_000);
    }
}
