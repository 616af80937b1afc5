//! Physical pin / channel assignments for the rig peripherals.
//!
//! Pin-level wiring is out of scope for the control logic (spec §6); these
//! constants are the single place the drivers name the lines they drive.  On
//! the host build only their distinctness matters — the GPIO simulation in
//! [`crate::drivers::hw`] keys its level bitmask on the pin number.

/// Air-puff solenoid output line.
pub const PUFF_GPIO: i32 = 4;

/// Distractor LED output line.
pub const DISTRACTOR_GPIO: i32 = 5;

/// Tone (CS) LEDC output line.
pub const TONE_GPIO: i32 = 18;

/// LEDC duty for the tone square wave (~50% of the 8-bit duty range).
pub const TONE_PWM_DUTY: u32 = 128;
