//! LED distractor driver.
//!
//! During the ITI the rig blinks an LED as a visual attention control.  The
//! historical rig bit-banged this with blocking delays; here the cadence is
//! a non-blocking toggler driven once per control tick, so the phase machine
//! and sampler keep running underneath it.

use crate::adapters::time::elapsed_at_least;
use crate::drivers::hw;
use crate::pins;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlinkState {
    Dark,
    Lit { since_ms: u32 },
    Off { since_ms: u32 },
}

#[derive(Debug)]
pub struct DistractorDriver {
    on_ms: u32,
    off_ms: u32,
    state: BlinkState,
}

impl DistractorDriver {
    pub fn new(on_ms: u32, off_ms: u32) -> Self {
        Self {
            on_ms,
            off_ms: off_ms.max(1),
            state: BlinkState::Dark,
        }
    }

    /// Advance the blink cadence.  `active` comes from the phase machine's
    /// stimulus commands; when it drops, the LED goes dark immediately.
    pub fn tick(&mut self, now_ms: u32, active: bool) {
        if !active || self.on_ms == 0 {
            if self.state != BlinkState::Dark {
                hw::gpio_write(pins::DISTRACTOR_GPIO, false);
                self.state = BlinkState::Dark;
            }
            return;
        }

        match self.state {
            BlinkState::Dark => {
                hw::gpio_write(pins::DISTRACTOR_GPIO, true);
                self.state = BlinkState::Lit { since_ms: now_ms };
            }
            BlinkState::Lit { since_ms } => {
                if elapsed_at_least(now_ms, since_ms, self.on_ms) {
                    hw::gpio_write(pins::DISTRACTOR_GPIO, false);
                    self.state = BlinkState::Off { since_ms: now_ms };
                }
            }
            BlinkState::Off { since_ms } => {
                if elapsed_at_least(now_ms, since_ms, self.off_ms) {
                    hw::gpio_write(pins::DISTRACTOR_GPIO, true);
                    self.state = BlinkState::Lit { since_ms: now_ms };
                }
            }
        }
    }

    pub fn is_lit(&self) -> bool {
        matches!(self.state, BlinkState::Lit { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blinks_with_configured_cadence() {
        let mut d = DistractorDriver::new(100, 900);
        d.tick(0, true);
        assert!(d.is_lit());
        d.tick(50, true);
        assert!(d.is_lit());
        d.tick(100, true);
        assert!(!d.is_lit(), "goes dark after on_ms");
        d.tick(999, true);
        assert!(!d.is_lit());
        d.tick(1000, true);
        assert!(d.is_lit(), "relights after off_ms");
    }

    #[test]
    fn inactive_forces_dark() {
        let mut d = DistractorDriver::new(100, 900);
        d.tick(0, true);
        assert!(d.is_lit());
        d.tick(10, false);
        assert!(!d.is_lit());
    }

    #[test]
    fn zero_on_time_disables() {
        let mut d = DistractorDriver::new(0, 900);
        d.tick(0, true);
        assert!(!d.is_lit());
    }
}
