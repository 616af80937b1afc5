//! Eye-blink conditioning rig firmware library.
//!
//! Real-time trial controller for classical (trace/delay) eye-blink
//! conditioning: a deterministic phase state machine drives the tone (CS),
//! air puff (US), and LED distractor, samples the blink sensor on a fixed
//! schedule, streams framed data lines to the host, and takes command
//! interrupts on the same serial link — all from a single cooperative
//! control loop guarded by a hardware watchdog.
//!
//! Exposes the pure-logic modules for host-side integration testing.  All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod command;
pub mod config;
pub mod handshake;
pub mod planner;
pub mod profiling;
pub mod sampler;

mod error;
mod pins;

pub use error::{Error, Result};

pub mod adapters;
pub mod drivers;
pub mod fsm;
pub mod sensors;
