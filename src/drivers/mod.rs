//! Stimulus and supervision drivers.
//!
//! Every driver follows the same dual-target pattern: on ESP-IDF it drives
//! the real peripheral through the [`hw`] glue; on the host it tracks state
//! in memory so the full control loop is testable without a rig.

pub mod distractor;
pub mod hw;
pub mod keypad;
pub mod puff;
pub mod tone;
pub mod watchdog;
