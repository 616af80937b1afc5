//! Randomized trial planner.
//!
//! Decides, per trial, which condition (CS+ / CS-) and whether the trial is
//! a probe (US withheld).  Constraints:
//!
//! - The fraction of CS+ trials converges to `cs_fraction_tenths / 10`.
//! - No three consecutive trials share a condition (anti-streak rule, so the
//!   animal cannot learn a block structure).
//! - Probe trials follow a schedule pre-seeded at planner construction:
//!   multiples of the mean spacing, each jittered by a bounded random offset.
//!
//! The planner is pure: it is seeded once at session start (the entry point
//! supplies entropy) and performs no I/O, so every decision is reproducible
//! from the seed.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::SessionConfig;

/// Upper bound on trials per session; sizes the probe lookup table.
pub const MAX_TRIALS: usize = 100;

/// Bounded redraw budget for the anti-streak resampler.  After this many
/// rejected draws the opposite condition is forced, so the invariant holds
/// even for degenerate CS+ fractions of 0 or 10.
const MAX_REDRAWS: u8 = 8;

// ---------------------------------------------------------------------------
// Trial condition
// ---------------------------------------------------------------------------

/// Trial condition: does the tone predict an air puff?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Paired tone — predicts the US.
    CsPlus,
    /// Unpaired tone — never followed by the US.
    CsMinus,
}

impl Condition {
    /// Numeric code used on the trial-marker log line (1 = CS+, 0 = CS-).
    pub fn code(self) -> u8 {
        match self {
            Self::CsPlus => 1,
            Self::CsMinus => 0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Self::CsPlus => Self::CsMinus,
            Self::CsMinus => Self::CsPlus,
        }
    }
}

// ---------------------------------------------------------------------------
// Trial plan
// ---------------------------------------------------------------------------

/// Per-trial record handed to the phase machine at trial start.
///
/// Returned by value; the planner never retains a handle into the state
/// machine's storage.  Once consumed it is read-only history (the planner
/// keeps only the last-two-conditions window for the anti-streak check).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialPlan {
    /// 1-based trial index.
    pub index: u16,
    pub condition: Condition,
    /// Probe trial: the US is withheld to measure anticipatory responding.
    pub is_probe: bool,
}

// ---------------------------------------------------------------------------
// Probe schedule
// ---------------------------------------------------------------------------

/// Bounded lookup table marking which trial indices are probe trials.
///
/// Built once at planner initialisation: walk multiples of the mean spacing,
/// jitter each by a uniform offset in `[-jitter, +jitter]`, and mark the
/// resulting slot.  Jittered indices falling outside `2..=MAX_TRIALS` are
/// dropped rather than wrapped.
#[derive(Debug, Clone)]
pub struct ProbeSchedule {
    slots: [bool; MAX_TRIALS],
}

impl ProbeSchedule {
    /// An empty schedule (no probe trials).
    pub fn none() -> Self {
        Self {
            slots: [false; MAX_TRIALS],
        }
    }

    /// Seed the schedule from the planner's RNG.
    ///
    /// The walk starts at the first multiple of `mean_spacing`, so trial 1
    /// (always a forced CS+) can never land on a probe slot.
    pub fn build(rng: &mut SmallRng, mean_spacing: u8, jitter: u8) -> Self {
        let mut schedule = Self::none();
        if mean_spacing == 0 {
            return schedule;
        }
        let mean = i32::from(mean_spacing);
        let jitter = i32::from(jitter);
        let mut anchor = mean;
        while anchor <= MAX_TRIALS as i32 {
            let offset = if jitter == 0 {
                0
            } else {
                rng.random_range(-jitter..=jitter)
            };
            let index = anchor + offset;
            if (2..=MAX_TRIALS as i32).contains(&index) {
                schedule.slots[(index - 1) as usize] = true;
            }
            anchor += mean;
        }
        schedule
    }

    /// Is the given 1-based trial index a probe trial?
    pub fn is_probe(&self, trial_index: u16) -> bool {
        let i = trial_index as usize;
        (1..=MAX_TRIALS).contains(&i) && self.slots[i - 1]
    }

    /// Number of probe slots in the schedule.
    pub fn count(&self) -> usize {
        self.slots.iter().filter(|p| **p).count()
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Draws the next trial's parameters under the session's design constraints.
pub struct TrialPlanner {
    rng: SmallRng,
    probes: ProbeSchedule,
    cs_fraction_tenths: u8,
    /// Conditions of the two most recent planned trials (anti-streak window).
    last_two: [Option<Condition>; 2],
    next_index: u16,
}

impl TrialPlanner {
    /// Seed the planner for a session.  `seed` comes from the platform
    /// entropy source at session start; the planner itself does no I/O.
    pub fn new(config: &SessionConfig, seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        let probes = ProbeSchedule::build(&mut rng, config.probe_mean_spacing, config.probe_jitter);
        Self {
            rng,
            probes,
            cs_fraction_tenths: config.cs_fraction_tenths.min(10),
            last_two: [None, None],
            next_index: 1,
        }
    }

    /// Plan for the first trial of the session.
    ///
    /// Always CS+ — the host-side reader assumes the session opens with a
    /// paired trial, so the first draw is not stochastic.
    pub fn first_plan(&mut self) -> TrialPlan {
        debug_assert_eq!(self.next_index, 1);
        self.take_plan(Condition::CsPlus)
    }

    /// Plan the next trial under the fraction and anti-streak constraints.
    pub fn plan_next(&mut self) -> TrialPlan {
        let condition = self.draw_condition();
        self.take_plan(condition)
    }

    /// The probe schedule (read-only; used by tests and diagnostics).
    pub fn probe_schedule(&self) -> &ProbeSchedule {
        &self.probes
    }

    /// Index the next `plan_next` call will assign.
    pub fn next_index(&self) -> u16 {
        self.next_index
    }

    /// Forget all history and restart numbering from trial 1.
    /// The probe schedule is retained: it is part of the session design.
    pub fn reset(&mut self) {
        self.last_two = [None, None];
        self.next_index = 1;
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn take_plan(&mut self, condition: Condition) -> TrialPlan {
        let index = self.next_index;
        self.next_index = self.next_index.saturating_add(1);
        self.last_two = [self.last_two[1], Some(condition)];
        TrialPlan {
            index,
            condition,
            is_probe: self.probes.is_probe(index),
        }
    }

    fn draw_condition(&mut self) -> Condition {
        let p_plus = f64::from(self.cs_fraction_tenths) / 10.0;
        let mut draw = self.bernoulli(p_plus);
        let mut redraws = 0;
        while self.would_streak(draw) && redraws < MAX_REDRAWS {
            draw = self.bernoulli(p_plus);
            redraws += 1;
        }
        if self.would_streak(draw) {
            draw = draw.opposite();
        }
        draw
    }

    fn bernoulli(&mut self, p_plus: f64) -> Condition {
        if self.rng.random_bool(p_plus) {
            Condition::CsPlus
        } else {
            Condition::CsMinus
        }
    }

    /// Would `candidate` make three consecutive trials of one condition?
    fn would_streak(&self, candidate: Condition) -> bool {
        self.last_two == [Some(candidate), Some(candidate)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;

    fn planner_with_seed(seed: u64) -> TrialPlanner {
        TrialPlanner::new(&SessionConfig::default(), seed)
    }

    #[test]
    fn first_trial_is_forced_cs_plus() {
        for seed in 0..20 {
            let mut p = planner_with_seed(seed);
            let plan = p.first_plan();
            assert_eq!(plan.index, 1);
            assert_eq!(plan.condition, Condition::CsPlus);
            assert!(!plan.is_probe, "forced first trial must not be a probe");
        }
    }

    #[test]
    fn indices_are_sequential() {
        let mut p = planner_with_seed(3);
        assert_eq!(p.first_plan().index, 1);
        assert_eq!(p.plan_next().index, 2);
        assert_eq!(p.plan_next().index, 3);
    }

    #[test]
    fn no_three_consecutive_conditions() {
        for seed in 0..50 {
            let mut p = planner_with_seed(seed);
            let mut history = vec![p.first_plan().condition];
            for _ in 1..MAX_TRIALS {
                history.push(p.plan_next().condition);
            }
            for w in history.windows(3) {
                assert!(
                    !(w[0] == w[1] && w[1] == w[2]),
                    "streak of three at seed {seed}: {w:?}"
                );
            }
        }
    }

    #[test]
    fn anti_streak_holds_even_for_degenerate_fractions() {
        for tenths in [0u8, 10u8] {
            let config = SessionConfig {
                cs_fraction_tenths: tenths,
                ..SessionConfig::default()
            };
            let mut p = TrialPlanner::new(&config, 11);
            let mut history = vec![p.first_plan().condition];
            for _ in 1..MAX_TRIALS {
                history.push(p.plan_next().condition);
            }
            for w in history.windows(3) {
                assert!(!(w[0] == w[1] && w[1] == w[2]));
            }
        }
    }

    #[test]
    fn cs_fraction_roughly_converges() {
        // With the anti-streak rule a 50 % target stays near 50 %.
        let mut p = planner_with_seed(9);
        let mut plus = 0usize;
        p.first_plan();
        for _ in 1..MAX_TRIALS {
            if p.plan_next().condition == Condition::CsPlus {
                plus += 1;
            }
        }
        let frac = plus as f64 / (MAX_TRIALS - 1) as f64;
        assert!((0.35..=0.65).contains(&frac), "fraction drifted to {frac}");
    }

    #[test]
    fn probe_schedule_spacing() {
        let mut rng = SmallRng::seed_from_u64(17);
        let sched = ProbeSchedule::build(&mut rng, 5, 2);
        let n = sched.count();
        // 100 trials at mean spacing 5 → about 20 probe slots; jitter can
        // collapse neighbours or push one off the end.
        assert!((10..=20).contains(&n), "unexpected probe count {n}");
        assert!(!sched.is_probe(1));
        assert!(!sched.is_probe(0));
        assert!(!sched.is_probe(MAX_TRIALS as u16 + 1));
    }

    #[test]
    fn zero_spacing_disables_probes() {
        let mut rng = SmallRng::seed_from_u64(17);
        let sched = ProbeSchedule::build(&mut rng, 0, 2);
        assert_eq!(sched.count(), 0);
    }

    #[test]
    fn same_seed_same_plan() {
        let mut a = planner_with_seed(42);
        let mut b = planner_with_seed(42);
        a.first_plan();
        b.first_plan();
        for _ in 0..30 {
            assert_eq!(a.plan_next(), b.plan_next());
        }
    }

    #[test]
    fn reset_restarts_numbering_but_keeps_schedule() {
        let mut p = planner_with_seed(5);
        p.first_plan();
        for _ in 0..10 {
            p.plan_next();
        }
        let probes_before = p.probe_schedule().count();
        p.reset();
        assert_eq!(p.next_index(), 1);
        assert_eq!(p.first_plan().index, 1);
        assert_eq!(p.probe_schedule().count(), probes_before);
    }
}
