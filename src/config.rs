//! Session configuration parameters.
//!
//! A [`SessionConfig`] is assembled once by the serial handshake (mouse ID,
//! session-type index, session number) and is immutable for the lifetime of
//! the session.  Every duration the phase machine consumes comes from here.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::planner::Condition;

/// Protocol variant selected by the session-type index during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SessionType {
    /// Unpaired control protocol: 50 trials, 250 ms trace interval.
    Control = 0,
    /// Trace conditioning: 100 trials, 250 ms gap between CS offset and US.
    Trace = 1,
    /// Delay conditioning: 100 trials, US follows CS immediately (no trace).
    Delay = 2,
}

impl SessionType {
    /// Decode the handshake's numeric session-type answer.
    pub fn from_index(index: u8) -> Result<Self> {
        match index {
            0 => Ok(Self::Control),
            1 => Ok(Self::Trace),
            2 => Ok(Self::Delay),
            _ => Err(Error::Config("session type index out of range")),
        }
    }

    /// Short label used in log comments.
    pub fn label(self) -> &'static str {
        match self {
            Self::Control => "Cntrl",
            Self::Trace => "Trace",
            Self::Delay => "Delay",
        }
    }

    /// Number of trials this protocol runs.
    pub fn total_trials(self) -> u16 {
        match self {
            Self::Control => 50,
            Self::Trace | Self::Delay => 100,
        }
    }

    /// Trace-interval duration for this protocol.
    pub fn trace_ms(self) -> u32 {
        match self {
            Self::Control | Self::Trace => 250,
            Self::Delay => 0,
        }
    }
}

/// Core session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    // --- Identity (from the handshake) ---
    /// Numeric mouse identifier (non-zero).
    pub mouse_id: u16,
    /// Selected protocol.
    pub session_type: SessionType,
    /// Session number for this animal (non-zero).
    pub session_number: u16,

    // --- Trial phase durations (milliseconds) ---
    /// Baseline window before CS onset.
    pub pre_ms: u32,
    /// Conditioned-stimulus tone duration.
    pub cs_ms: u32,
    /// Silent gap between CS offset and US onset (0 for delay protocols).
    pub trace_ms: u32,
    /// Air-puff (US) duration; also times the US_SUPPRESSED window.
    pub puff_ms: u32,
    /// Observation window after the US.
    pub post_ms: u32,
    /// Inter-trial interval.
    pub iti_ms: u32,

    // --- Trial plan ---
    /// Total trials in this session.
    pub total_trials: u16,
    /// Fraction of CS+ trials, in tenths (0–10; 5 → 50 %).
    pub cs_fraction_tenths: u8,
    /// Swaps which physical tone is treated as CS+ (counterbalancing).
    pub flipped: bool,
    /// Mean spacing between probe trials, in trials.
    pub probe_mean_spacing: u8,
    /// Uniform jitter (± trials) applied to each probe slot.
    pub probe_jitter: u8,

    // --- Stimulus parameters ---
    /// First CS tone frequency (Hz); CS+ when not flipped.
    pub cs_tone_1_hz: u16,
    /// Second CS tone frequency (Hz); CS- when not flipped.
    pub cs_tone_2_hz: u16,
    /// LED distractor on-time during the ITI (0 disables the distractor).
    pub distractor_on_ms: u32,
    /// LED distractor off-time during the ITI.
    pub distractor_off_ms: u32,

    // --- Sampling ---
    /// Blink-sensor sampling interval (milliseconds).
    pub sample_interval_ms: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mouse_id: 1,
            session_type: SessionType::Trace,
            session_number: 1,

            pre_ms: 2000,
            cs_ms: 350,
            trace_ms: SessionType::Trace.trace_ms(),
            puff_ms: 100,
            post_ms: 2000,
            iti_ms: 5000,

            total_trials: SessionType::Trace.total_trials(),
            cs_fraction_tenths: 5,
            flipped: false,
            probe_mean_spacing: 5,
            probe_jitter: 2,

            cs_tone_1_hz: 3500,
            cs_tone_2_hz: 9500,
            distractor_on_ms: 100,
            distractor_off_ms: 900,

            sample_interval_ms: 10,
        }
    }
}

impl SessionConfig {
    /// Build a session configuration from the handshake answers.
    ///
    /// `mouse_id` and `session_number` must be non-zero (a zero answer is a
    /// handshake parse artefact, never a real animal or session).
    pub fn for_session(mouse_id: u16, session_type_index: u8, session_number: u16) -> Result<Self> {
        if mouse_id == 0 {
            return Err(Error::Config("mouse id must be non-zero"));
        }
        if session_number == 0 {
            return Err(Error::Config("session number must be non-zero"));
        }
        let session_type = SessionType::from_index(session_type_index)?;
        Ok(Self {
            mouse_id,
            session_type,
            session_number,
            trace_ms: session_type.trace_ms(),
            total_trials: session_type.total_trials(),
            ..Self::default()
        })
    }

    /// Physical tone frequency for a condition, honouring the flip flag.
    pub fn tone_for(&self, condition: Condition) -> u16 {
        match (condition, self.flipped) {
            (Condition::CsPlus, false) | (Condition::CsMinus, true) => self.cs_tone_1_hz,
            (Condition::CsMinus, false) | (Condition::CsPlus, true) => self.cs_tone_2_hz,
        }
    }

    /// Whether the LED distractor is enabled at all.
    pub fn distractor_enabled(&self) -> bool {
        self.distractor_on_ms > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let c = SessionConfig::default();
        assert!(c.cs_fraction_tenths <= 10);
        assert!(c.pre_ms > 0 && c.cs_ms > 0 && c.puff_ms > 0);
        assert!(c.sample_interval_ms > 0);
        assert!(c.total_trials > 0);
        assert!(c.cs_tone_1_hz != c.cs_tone_2_hz);
    }

    #[test]
    fn session_type_table() {
        assert_eq!(SessionType::Control.total_trials(), 50);
        assert_eq!(SessionType::Trace.total_trials(), 100);
        assert_eq!(SessionType::Delay.total_trials(), 100);
        assert_eq!(SessionType::Delay.trace_ms(), 0);
        assert_eq!(SessionType::Trace.trace_ms(), 250);
    }

    #[test]
    fn for_session_applies_type_table() {
        let c = SessionConfig::for_session(7, 2, 3).unwrap();
        assert_eq!(c.session_type, SessionType::Delay);
        assert_eq!(c.trace_ms, 0);
        assert_eq!(c.total_trials, 100);
    }

    #[test]
    fn for_session_rejects_zero_identity() {
        assert!(SessionConfig::for_session(0, 1, 1).is_err());
        assert!(SessionConfig::for_session(1, 1, 0).is_err());
        assert!(SessionConfig::for_session(1, 9, 1).is_err());
    }

    #[test]
    fn flip_swaps_tone_mapping() {
        let mut c = SessionConfig::default();
        assert_eq!(c.tone_for(Condition::CsPlus), c.cs_tone_1_hz);
        assert_eq!(c.tone_for(Condition::CsMinus), c.cs_tone_2_hz);
        c.flipped = true;
        assert_eq!(c.tone_for(Condition::CsPlus), c.cs_tone_2_hz);
        assert_eq!(c.tone_for(Condition::CsMinus), c.cs_tone_1_hz);
    }

    #[test]
    fn serde_roundtrip() {
        let c = SessionConfig::default();
        let json = serde_json::to_string(&c).unwrap();
        let c2: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(c.mouse_id, c2.mouse_id);
        assert_eq!(c.session_type, c2.session_type);
        assert_eq!(c.iti_ms, c2.iti_ms);
        assert_eq!(c.cs_fraction_tenths, c2.cs_fraction_tenths);
    }
}
