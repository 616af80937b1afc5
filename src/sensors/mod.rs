//! Sensor drivers.

pub mod blink;
