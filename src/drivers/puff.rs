//! Air-puff solenoid valve driver.
//!
//! A dumb actuator: the phase machine decides *when* the valve opens; this
//! driver only translates open/close into the GPIO level and keeps the
//! readback state for the service's idempotent re-assertion.

use crate::drivers::hw;
use crate::pins;

#[derive(Debug)]
pub struct PuffValve {
    open: bool,
}

impl PuffValve {
    pub fn new() -> Self {
        // Ensure the valve starts closed regardless of reset state.
        hw::gpio_write(pins::PUFF_GPIO, false);
        Self { open: false }
    }

    pub fn open(&mut self) {
        if self.open {
            return;
        }
        hw::gpio_write(pins::PUFF_GPIO, true);
        self.open = true;
    }

    pub fn close(&mut self) {
        if !self.open {
            return;
        }
        hw::gpio_write(pins::PUFF_GPIO, false);
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl Default for PuffValve {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_close_drives_gpio() {
        let mut v = PuffValve::new();
        v.open();
        assert!(v.is_open());
        assert!(hw::sim_gpio_level(pins::PUFF_GPIO));
        v.close();
        assert!(!v.is_open());
        assert!(!hw::sim_gpio_level(pins::PUFF_GPIO));
    }
}
