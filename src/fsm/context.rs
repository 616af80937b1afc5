//! Shared mutable context threaded through every phase handler.
//!
//! `TrialContext` is the single struct phase handlers read from and write
//! to: session configuration, the live trial plan, the millisecond clock,
//! phase-entry bookkeeping, and the stimulus command outputs.  The control
//! loop owns it and passes it by reference — there are no ambient globals
//! for phase, trial, or pause state.

use crate::config::SessionConfig;
use crate::planner::{Condition, TrialPlan};

use super::Phase;

// ---------------------------------------------------------------------------
// Stimulus commands (written by phase handlers; applied by the service)
// ---------------------------------------------------------------------------

/// Desired stimulus-line levels.  Phase handlers write these; the service
/// applies them to the [`StimulusPort`](crate::app::ports::StimulusPort)
/// after each advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StimulusCommands {
    /// Tone frequency to emit, or `None` for silence.
    pub tone_hz: Option<u16>,
    /// Air-puff solenoid open.
    pub puff: bool,
    /// LED distractor enabled for the current phase (the driver supplies
    /// the on/off blink cadence).
    pub distractor: bool,
}

impl StimulusCommands {
    /// All outputs off — safe default.
    pub fn all_off() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// Pause bookkeeping
// ---------------------------------------------------------------------------

/// Snapshot of the phase interrupted by a pause command.
///
/// Storing the *elapsed* time (not the entry timestamp) makes the restore
/// arithmetic immune to clock wrap during an arbitrarily long pause.
#[derive(Debug, Clone, Copy)]
pub struct InterruptedPhase {
    pub phase: Phase,
    /// Time already spent in the phase when the pause hit.
    pub elapsed_ms: u32,
}

// ---------------------------------------------------------------------------
// TrialContext
// ---------------------------------------------------------------------------

/// The blackboard passed to every phase handler.
pub struct TrialContext {
    // -- Configuration --
    /// Immutable session parameters.
    pub config: SessionConfig,

    // -- Trial plan --
    /// Plan for the trial in flight.  Installed at each trial boundary.
    pub plan: TrialPlan,

    // -- Timing --
    /// Current session-relative time (ms).  Set by the service each tick.
    pub now_ms: u32,
    /// Session time at which the active phase was entered.  Shifted forward
    /// on unpause so that paused intervals never accrue.
    pub phase_started_ms: u32,

    // -- Outputs --
    /// Stimulus levels requested by the phase handlers.
    pub commands: StimulusCommands,

    // -- Pause --
    /// Phase frozen by an in-progress pause, if any.
    pub interrupted: Option<InterruptedPhase>,

    // -- Trial bookkeeping --
    /// Set by the ITI handler when it wraps to the next trial; consumed by
    /// the service, which installs the next plan and emits the `@` marker.
    pub trial_boundary: bool,
    /// Set on TERMINAL entry; the service closes the log stream and requests
    /// the watchdog-mediated reboot.
    pub session_over: bool,
}

impl TrialContext {
    /// Fresh context for a session.  `first_plan` is the forced-CS+ plan for
    /// trial 1.
    pub fn new(config: SessionConfig, first_plan: TrialPlan) -> Self {
        Self {
            config,
            plan: first_plan,
            now_ms: 0,
            phase_started_ms: 0,
            commands: StimulusCommands::all_off(),
            interrupted: None,
            trial_boundary: false,
            session_over: false,
        }
    }

    /// Milliseconds spent in the active phase (wrap-tolerant).
    pub fn phase_elapsed_ms(&self) -> u32 {
        self.now_ms.wrapping_sub(self.phase_started_ms)
    }

    /// Trial condition shorthand for phase handlers.
    pub fn condition(&self) -> Condition {
        self.plan.condition
    }

    /// Physical tone frequency for the current trial's condition.
    pub fn cs_tone_hz(&self) -> u16 {
        self.config.tone_for(self.plan.condition)
    }

    /// True while a pause is in effect.
    pub fn is_paused(&self) -> bool {
        self.interrupted.is_some()
    }

    /// Wipe per-trial state back to a session origin (reset command).
    /// The configuration survives; outputs are cleared.
    pub fn reset_for_new_session(&mut self, first_plan: TrialPlan, now_ms: u32) {
        self.plan = first_plan;
        self.now_ms = now_ms;
        self.phase_started_ms = now_ms;
        self.commands = StimulusCommands::all_off();
        self.interrupted = None;
        self.trial_boundary = false;
        self.session_over = false;
    }
}
