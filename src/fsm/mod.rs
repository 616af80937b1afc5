//! Function-pointer finite state machine for the trial phase sequence.
//!
//! Classic embedded FSM pattern: a static table of per-phase descriptors,
//! each row holding plain `fn` pointers — no closures, no dynamic dispatch,
//! no heap.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  PhaseTable                                                 │
//! │  ┌──────────────┬──────────┬──────────┬──────────────────┐  │
//! │  │ Phase        │ on_enter │ on_exit  │ on_update        │  │
//! │  ├──────────────┼──────────┼──────────┼──────────────────┤  │
//! │  │ Pre          │ —        │ —        │ fn(ctx)->Option  │  │
//! │  │ CsPlus/Minus │ tone on  │ tone off │ …                │  │
//! │  │ Trace        │ —        │ —        │ …                │  │
//! │  │ Us           │ puff on  │ puff off │ …                │  │
//! │  │ …            │          │          │                  │  │
//! │  └──────────────┴──────────┴──────────┴──────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Unlike a tick-counting FSM, phase lifetimes here are millisecond budgets:
//! each `on_update` compares `ctx.phase_elapsed_ms()` against the relevant
//! duration from `SessionConfig`.  Pause and resume are engine-level
//! operations that bypass the enter/exit hooks so that stimulus outputs
//! stay frozen at their current values.

pub mod context;
pub mod phases;

use context::{InterruptedPhase, TrialContext};
use log::{debug, info};

// ---------------------------------------------------------------------------
// Phase identity
// ---------------------------------------------------------------------------

/// Enumeration of all trial phases.
/// Must stay in sync with the table built in [`phases::build_phase_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Phase {
    /// Baseline window before CS onset.
    Pre = 0,
    /// CS+ tone playing.
    CsPlus = 1,
    /// CS- tone playing.
    CsMinus = 2,
    /// Silent trace interval between CS offset and US onset.
    Trace = 3,
    /// Air puff delivered.
    Us = 4,
    /// US window with the puff withheld (CS- or probe trial).
    UsSuppressed = 5,
    /// Observation window after the US.
    Post = 6,
    /// Inter-trial interval.
    Iti = 7,
    /// Operator pause; the interrupted phase is stored for restore.
    Paused = 8,
    /// Session complete; outputs dead until reboot.
    Terminal = 9,
}

impl Phase {
    /// Total number of phases — sizes the table array.
    pub const COUNT: usize = 10;

    /// Convert a `u8` index back to `Phase`.  Panics on out-of-range in
    /// debug builds; returns `Terminal` in release (safe fallback: outputs
    /// stay off).
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Pre,
            1 => Self::CsPlus,
            2 => Self::CsMinus,
            3 => Self::Trace,
            4 => Self::Us,
            5 => Self::UsSuppressed,
            6 => Self::Post,
            7 => Self::Iti,
            8 => Self::Paused,
            9 => Self::Terminal,
            _ => {
                debug_assert!(false, "invalid phase index: {idx}");
                Self::Terminal
            }
        }
    }

    /// Phases during which the sampler logs blink data.
    pub fn is_logged(self) -> bool {
        !matches!(self, Self::Paused | Self::Terminal)
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
/// These run exactly once per transition — stimulus side effects live here.
pub type PhaseActionFn = fn(&mut TrialContext);

/// Signature for the per-tick update handler.
/// Returns `Some(next)` to trigger a transition, or `None` to stay.
pub type PhaseUpdateFn = fn(&mut TrialContext) -> Option<Phase>;

// ---------------------------------------------------------------------------
// Phase descriptor (one row in the table)
// ---------------------------------------------------------------------------

/// Static descriptor for a single phase.
pub struct PhaseDescriptor {
    pub id: Phase,
    pub name: &'static str,
    pub on_enter: Option<PhaseActionFn>,
    pub on_exit: Option<PhaseActionFn>,
    pub on_update: PhaseUpdateFn,
}

// ---------------------------------------------------------------------------
// Transition record
// ---------------------------------------------------------------------------

/// Returned by [`Fsm::advance`] when a phase boundary was crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
    /// Wall-clock time the old phase actually lasted (paused time excluded).
    pub realized_ms: u32,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

/// The phase state machine engine.
///
/// Owns the phase table and the current-phase pointer; all timing state
/// lives in the [`TrialContext`] so the control loop can reason about it.
pub struct Fsm {
    /// Fixed-size table indexed by `Phase as usize`.
    table: [PhaseDescriptor; Phase::COUNT],
    /// Index of the currently active phase.
    current: usize,
}

impl Fsm {
    /// Construct with the given table, starting in `initial`.
    pub fn new(table: [PhaseDescriptor; Phase::COUNT], initial: Phase) -> Self {
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Run the initial `on_enter` for the starting phase.
    /// Call once after construction, before the first `advance()`.
    pub fn start(&mut self, ctx: &mut TrialContext) {
        info!("FSM starting in phase {}", self.table[self.current].name);
        ctx.phase_started_ms = ctx.now_ms;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance the machine by one control-loop tick.
    ///
    /// `ctx.now_ms` must already be current.  Calls the active phase's
    /// `on_update`; if it requests a transition, executes
    /// `on_exit(current)` → pointer update → `on_enter(next)` and returns
    /// the transition record (with the old phase's realized duration).
    pub fn advance(&mut self, ctx: &mut TrialContext) -> Option<PhaseTransition> {
        let next = (self.table[self.current].on_update)(ctx);
        next.map(|next_id| self.transition(next_id, ctx))
    }

    /// Force an immediate transition (reset command, session start).
    /// Runs the full exit/enter hook sequence.
    pub fn force(&mut self, next: Phase, ctx: &mut TrialContext) -> PhaseTransition {
        self.transition(next, ctx)
    }

    /// Freeze the machine for an operator pause.
    ///
    /// Bypasses the enter/exit hooks: stimulus outputs stay at their current
    /// values and the interrupted phase's elapsed time is captured so no
    /// time accrues while paused.
    pub fn suspend(&mut self, ctx: &mut TrialContext) {
        if self.current == Phase::Paused as usize {
            return;
        }
        ctx.interrupted = Some(InterruptedPhase {
            phase: self.current_phase(),
            elapsed_ms: ctx.phase_elapsed_ms(),
        });
        info!(
            "paused in {} after {} ms",
            self.table[self.current].name,
            ctx.phase_elapsed_ms()
        );
        self.current = Phase::Paused as usize;
        ctx.phase_started_ms = ctx.now_ms;
    }

    /// Restore the phase interrupted by [`suspend`](Self::suspend).
    ///
    /// The phase-entry timestamp is shifted forward by the paused duration:
    /// elapsed-time accounting resumes exactly where it left off.
    pub fn resume(&mut self, ctx: &mut TrialContext) {
        let Some(interrupted) = ctx.interrupted.take() else {
            return;
        };
        self.current = interrupted.phase as usize;
        ctx.phase_started_ms = ctx.now_ms.wrapping_sub(interrupted.elapsed_ms);
        info!(
            "resumed {} with {} ms already elapsed",
            self.table[self.current].name, interrupted.elapsed_ms
        );
    }

    /// The current phase's identity.
    pub fn current_phase(&self) -> Phase {
        Phase::from_index(self.current)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next_id: Phase, ctx: &mut TrialContext) -> PhaseTransition {
        let from = self.current_phase();
        let realized_ms = ctx.phase_elapsed_ms();
        let next_idx = next_id as usize;

        debug!(
            "phase {} -> {} after {} ms",
            self.table[self.current].name, self.table[next_idx].name, realized_ms
        );

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next_idx;
        ctx.phase_started_ms = ctx.now_ms;

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }

        PhaseTransition {
            from,
            to: next_id,
            realized_ms,
        }
    }
}
