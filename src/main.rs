//! Rig firmware — main entry point.
//!
//! Boot sequence: bring up logging and peripherals, arm the watchdog, run
//! the serial configuration handshake (mouse ID → session type → session
//! number), then hand control to the single cooperative loop:
//!
//! ```text
//! loop {
//!     watchdog tick → command poll → pause check → phase advance → sample
//! }
//! ```
//!
//! The loop never blocks.  At session end (or on an `rr` reset outside a
//! running session) the service stops feeding the watchdog and the hardware
//! timer restarts the controller — a fresh boot is the only state this
//! firmware trusts after a session.

use anyhow::{anyhow, Result};
use log::info;

use blinkrig::adapters::hardware::{self, RigHardware};
use blinkrig::adapters::serial::{SerialCommandPort, SerialEventSink};
use blinkrig::adapters::time::RigClock;
use blinkrig::app::service::RigService;
use blinkrig::config::SessionConfig;
use blinkrig::drivers::keypad::Keypad;
use blinkrig::drivers::watchdog::Watchdog;
use blinkrig::handshake::Handshake;

fn main() -> Result<()> {
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    info!("blinkrig {} booting", env!("CARGO_PKG_VERSION"));

    hardware::init_peripherals().map_err(|e| anyhow!("peripheral init: {e}"))?;

    let clock = RigClock::new();
    let mut watchdog = Watchdog::new();
    let mut cmd = SerialCommandPort::new();
    let mut sink = SerialEventSink::new();

    // ── Configuration handshake (bounded retry, non-blocking) ──
    let config = loop {
        let mut handshake = Handshake::new();
        let setup = loop {
            watchdog.tick();
            match handshake.poll(clock.now_ms(), &mut cmd, &mut sink) {
                Ok(Some(setup)) => break Ok(setup),
                Ok(None) => esp_idf_svc::hal::delay::FreeRtos::delay_ms(10),
                Err(e) => break Err(e),
            }
        };
        match setup.and_then(blinkrig::handshake::SessionSetup::into_config) {
            Ok(config) => break config,
            Err(e) => {
                log::warn!("handshake failed ({e}); restarting prompts");
            }
        }
    };
    announce_session(&config);

    // ── Control loop ──────────────────────────────────────────
    let seed = u64::from(unsafe { esp_idf_svc::sys::esp_random() });
    let mut hw = RigHardware::new(config.distractor_on_ms, config.distractor_off_ms);
    let mut service = RigService::new(config, seed, watchdog);
    let mut keypad = Keypad::new();

    loop {
        let tick_start_us = clock.now_us();
        let now_ms = clock.now_ms();
        hw.set_now_ms(now_ms);
        if let Some(key) = keypad.feed(hardware::read_keypad_adc()) {
            service.handle_key(key, now_ms, &mut hw, &mut sink);
        }
        service.tick(now_ms, &mut hw, &mut cmd, &mut sink);
        service.record_tick_us((clock.now_us() - tick_start_us) as u32);

        if service.reboot_requested() {
            // Keep looping without feeding the watchdog; the hardware timer
            // fires within its window and restarts the controller.
            esp_idf_svc::hal::delay::FreeRtos::delay_ms(100);
            continue;
        }
        esp_idf_svc::hal::delay::FreeRtos::delay_ms(1);
    }
}

fn announce_session(config: &SessionConfig) {
    info!(
        "configured: MouseK{} {} session {} ({} trials, trace {} ms)",
        config.mouse_id,
        config.session_type.label(),
        config.session_number,
        config.total_trials,
        config.trace_ms,
    );
}
