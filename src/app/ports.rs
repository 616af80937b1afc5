//! Port traits — the boundary between the trial controller and the rig.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ RigService (domain)
//! ```
//!
//! Driven adapters (blink ADC, stimulus lines, serial RX, serial TX)
//! implement these traits.  The [`RigService`](super::service::RigService)
//! consumes them via generics, so the trial logic never touches hardware
//! directly and the whole session can run against mocks on the host.

use super::events::RigEvent;

// ───────────────────────────────────────────────────────────────
// Blink sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port for the blink sensor's analog channel.
pub trait BlinkSensorPort {
    /// One raw ADC reading.  Glitch filtering happens in the driver; the
    /// domain always receives an in-range value.
    fn read_blink(&mut self) -> u16;
}

// ───────────────────────────────────────────────────────────────
// Stimulus port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port for the rig's stimulus lines.
///
/// All calls are idempotent: the service re-asserts the desired level every
/// tick, and drivers skip hardware writes when nothing changed.
pub trait StimulusPort {
    /// Start the tone at the given frequency (Hz).
    fn tone_on(&mut self, freq_hz: u16);

    /// Silence the tone.
    fn tone_off(&mut self);

    /// Open the air-puff solenoid valve.
    fn puff_on(&mut self);

    /// Close the air-puff solenoid valve.
    fn puff_off(&mut self);

    /// Drive the LED distractor line.
    fn set_distractor(&mut self, lit: bool);

    /// Kill every stimulus output (reset, session end).
    fn all_off(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Command port (driven adapter: host serial RX → domain)
// ───────────────────────────────────────────────────────────────

/// Non-blocking inbound byte source for the command channel and handshake.
pub trait CommandPort {
    /// Next buffered byte, or `None` when the line is idle.  Must never wait.
    fn read_byte(&mut self) -> Option<u8>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → host serial TX)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`RigEvent`]s through this port.  The serial
/// adapter renders them into the line-oriented framed log stream; test sinks
/// record them for assertion.
pub trait EventSink {
    fn emit(&mut self, event: &RigEvent);
}
