//! Hardware watchdog driver with controlled-reboot suppression.
//!
//! The control loop must call [`Watchdog::tick`] at least once every
//! [`WATCHDOG_TIMEOUT_MS`] or the platform forcibly restarts the
//! controller — the sole recovery mechanism for a hung loop.  A stalled
//! controller cannot be trusted to resume, so the restart deliberately
//! forfeits in-memory session state.
//!
//! [`Watchdog::request_reboot`] flips a suppression flag that turns every
//! subsequent `tick()` into a no-op: the hardware timer is then guaranteed
//! to expire and perform a clean restart.  This is how the rig reboots
//! itself at session end.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

/// Hardware watchdog window.  A tick must land inside every window.
pub const WATCHDOG_TIMEOUT_MS: u32 = 2_000;

pub struct Watchdog {
    /// When set, `tick()` stops feeding the hardware timer.
    reboot_requested: bool,
    #[cfg(target_os = "espidf")]
    subscribed: bool,
    /// Host builds: ticks actually served (observable in tests).
    #[cfg(not(target_os = "espidf"))]
    ticks_served: u32,
}

impl Watchdog {
    /// Initialise the hardware timer and subscribe the control-loop task.
    pub fn new() -> Self {
        #[cfg(target_os = "espidf")]
        {
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms: WATCHDOG_TIMEOUT_MS,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!("watchdog reconfigure returned {ret}");
                }
                let subscribed = esp_task_wdt_add(core::ptr::null_mut()) == ESP_OK;
                if subscribed {
                    info!("watchdog armed ({WATCHDOG_TIMEOUT_MS} ms window)");
                } else {
                    log::warn!("watchdog subscription failed");
                }
                Self {
                    reboot_requested: false,
                    subscribed,
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            info!("watchdog(sim): armed ({WATCHDOG_TIMEOUT_MS} ms window)");
            Self {
                reboot_requested: false,
                ticks_served: 0,
            }
        }
    }

    /// Feed the hardware timer.  No-op once a reboot has been requested —
    /// the timer then expires on its own and restarts the controller.
    pub fn tick(&mut self) {
        if self.reboot_requested {
            return;
        }

        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.ticks_served = self.ticks_served.wrapping_add(1);
        }
    }

    /// Stop feeding the timer so the hardware performs a clean restart.
    pub fn request_reboot(&mut self) {
        if !self.reboot_requested {
            info!("reboot requested: watchdog feeding suppressed");
        }
        self.reboot_requested = true;
    }

    pub fn reboot_requested(&self) -> bool {
        self.reboot_requested
    }

    /// Ticks actually served (host builds; test observability).
    #[cfg(not(target_os = "espidf"))]
    pub fn ticks_served(&self) -> u32 {
        self.ticks_served
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_feed_until_reboot_requested() {
        let mut wd = Watchdog::new();
        wd.tick();
        wd.tick();
        assert_eq!(wd.ticks_served(), 2);

        wd.request_reboot();
        wd.tick();
        wd.tick();
        assert_eq!(wd.ticks_served(), 2, "suppressed ticks must not feed");
        assert!(wd.reboot_requested());
    }
}
