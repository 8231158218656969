// GPIO bring-up before the board is first used
//
// The header pins shared with the board must start in a known state:
// the reset/control lines low, everything else floating as inputs.

use tracing::{debug, warn};

use crate::config::IDLE_LOW_PINS;

/// Minimal GPIO access provided by the platform
pub trait GpioController {
    type Error: std::fmt::Display;

    /// Names of every pin the platform exposes
    fn pin_names(&mut self) -> Result<Vec<String>, Self::Error>;

    /// Configure `pin` as an output, initially low (active high)
    fn drive_low(&mut self, pin: &str) -> Result<(), Self::Error>;

    /// Configure `pin` as an input
    fn release(&mut self, pin: &str) -> Result<(), Self::Error>;
}

/// Put every pin into its idle state. Returns how many pins were set.
///
/// Failures on individual pins are logged and skipped; a platform that cannot
/// list its pins resets nothing.
pub fn reset_pins<G: GpioController>(gpio: &mut G) -> usize {
    let pins = match gpio.pin_names() {
        Ok(pins) => pins,
        Err(e) => {
            warn!("Cannot list GPIO pins: {}", e);
            return 0;
        }
    };

    let mut count = 0;
    for pin in &pins {
        let result = if IDLE_LOW_PINS.contains(&pin.as_str()) {
            gpio.drive_low(pin)
        } else {
            gpio.release(pin)
        };

        match result {
            Ok(()) => count += 1,
            Err(e) => warn!("Failed to reset pin {}: {}", pin, e),
        }
    }

    debug!("Reset {} of {} GPIO pins", count, pins.len());
    count
}
