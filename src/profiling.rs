//! Control-loop latency profiler.
//!
//! Accumulates per-tick execution times so the session log can carry a
//! `$`-framed timing dump at session end.  A tick that approaches the
//! sample interval means the virtual sample clock is drifting behind wall
//! time — worth knowing when analysing blink latencies.

/// Snapshot of accumulated loop timing, emitted with the `$` marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileSummary {
    /// Ticks measured since the last reset.
    pub ticks: u32,
    /// Mean tick duration (µs).
    pub avg_us: u32,
    /// Worst-case tick duration (µs).
    pub max_us: u32,
}

#[derive(Debug, Default)]
pub struct TickProfiler {
    ticks: u32,
    total_us: u64,
    max_us: u32,
}

impl TickProfiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one tick's execution time.
    pub fn record(&mut self, elapsed_us: u32) {
        self.ticks = self.ticks.saturating_add(1);
        self.total_us += u64::from(elapsed_us);
        self.max_us = self.max_us.max(elapsed_us);
    }

    /// Current accumulated summary.
    pub fn summary(&self) -> ProfileSummary {
        let avg_us = if self.ticks == 0 {
            0
        } else {
            (self.total_us / u64::from(self.ticks)) as u32
        };
        ProfileSummary {
            ticks: self.ticks,
            avg_us,
            max_us: self.max_us,
        }
    }

    /// Clear the accumulators (new session).
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_mean_and_max() {
        let mut p = TickProfiler::new();
        p.record(10);
        p.record(20);
        p.record(60);
        let s = p.summary();
        assert_eq!(s.ticks, 3);
        assert_eq!(s.avg_us, 30);
        assert_eq!(s.max_us, 60);
    }

    #[test]
    fn empty_profiler_reports_zeroes() {
        let p = TickProfiler::new();
        assert_eq!(
            p.summary(),
            ProfileSummary {
                ticks: 0,
                avg_us: 0,
                max_us: 0
            }
        );
    }

    #[test]
    fn reset_clears_accumulators() {
        let mut p = TickProfiler::new();
        p.record(100);
        p.reset();
        assert_eq!(p.summary().ticks, 0);
        assert_eq!(p.summary().max_us, 0);
    }
}
