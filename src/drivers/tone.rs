//! CS tone driver.
//!
//! Emits a square wave at one of the two session tone frequencies through
//! the LEDC channel on [`pins::TONE_GPIO`](crate::pins::TONE_GPIO).
//! Idempotent: re-asserting the same frequency does not touch the hardware,
//! so the control loop can call it every tick.

use crate::drivers::hw;

#[derive(Debug)]
pub struct ToneDriver {
    current_hz: Option<u16>,
}

impl ToneDriver {
    pub fn new() -> Self {
        Self { current_hz: None }
    }

    /// Start (or retune) the tone.
    pub fn on(&mut self, freq_hz: u16) {
        if self.current_hz == Some(freq_hz) {
            return;
        }
        hw::tone_start(freq_hz);
        self.current_hz = Some(freq_hz);
    }

    /// Silence the tone.
    pub fn off(&mut self) {
        if self.current_hz.is_none() {
            return;
        }
        hw::tone_stop();
        self.current_hz = None;
    }

    pub fn is_on(&self) -> bool {
        self.current_hz.is_some()
    }

    /// Frequency currently playing, if any.
    pub fn current_hz(&self) -> Option<u16> {
        self.current_hz
    }
}

impl Default for ToneDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_on_off_state() {
        let mut t = ToneDriver::new();
        assert!(!t.is_on());
        t.on(3500);
        assert_eq!(t.current_hz(), Some(3500));
        t.on(9500);
        assert_eq!(t.current_hz(), Some(9500));
        t.off();
        assert!(!t.is_on());
    }
}
