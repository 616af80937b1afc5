//! Monotonic millisecond timebase.
//!
//! Every duration in the controller is computed by subtraction on this
//! clock, with `u32::wrapping_sub`, so the ~49.7-day wrap of the counter is
//! harmless as long as no single phase or pause approaches it.
//!
//! - **`target_os = "espidf"`** — wraps `esp_timer_get_time()` (microsecond
//!   monotonic) truncated to milliseconds.
//! - **host** — `std::time::Instant`, for tests and simulation.

/// Monotonic clock for the rig.
pub struct RigClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl RigClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds since boot, wrapping at `u32::MAX`.
    #[cfg(target_os = "espidf")]
    pub fn now_ms(&self) -> u32 {
        ((unsafe { esp_idf_svc::sys::esp_timer_get_time() }) / 1000) as u32
    }

    /// Milliseconds since construction, wrapping at `u32::MAX`.
    #[cfg(not(target_os = "espidf"))]
    pub fn now_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }

    /// Microseconds since boot (profiling granularity).
    #[cfg(target_os = "espidf")]
    pub fn now_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since construction.
    #[cfg(not(target_os = "espidf"))]
    pub fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Default for RigClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap-tolerant "b happened at least `interval` after a".
pub fn elapsed_at_least(now_ms: u32, since_ms: u32, interval_ms: u32) -> bool {
    now_ms.wrapping_sub(since_ms) >= interval_ms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic() {
        let clock = RigClock::new();
        let a = clock.now_ms();
        let b = clock.now_ms();
        assert!(b.wrapping_sub(a) < 1000);
    }

    #[test]
    fn elapsed_survives_wraparound() {
        // 100 ms before the wrap point to 50 ms after it → 150 ms elapsed.
        let since = u32::MAX - 100;
        let now = 50u32;
        assert!(elapsed_at_least(now, since, 150));
        assert!(!elapsed_at_least(now, since, 152));
    }
}
