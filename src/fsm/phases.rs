//! Concrete phase handler functions and table builder.
//!
//! One trial walks the table left to right:
//!
//! ```text
//!  PRE ──▶ CS+ / CS- ──▶ TRACE ──▶ US / NO-PUFF ──▶ POST ──▶ ITI ─┐
//!   ▲          (trace_ms == 0 skips TRACE)                        │
//!   └──────────────── next trial (or TERMINAL) ◀──────────────────┘
//! ```
//!
//! Probe trials and every CS- trial take the NO-PUFF (US_SUPPRESSED) branch:
//! the solenoid never opens, but the window still runs so trial timing is
//! identical either way.  Pause/reset do not appear here — they are engine-
//! and service-level operations, not timed phases.

use super::context::TrialContext;
use super::{Phase, PhaseDescriptor};
use crate::planner::Condition;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static phase table.  Called once at session start.
pub fn build_phase_table() -> [PhaseDescriptor; Phase::COUNT] {
    [
        // Index 0 — Pre
        PhaseDescriptor {
            id: Phase::Pre,
            name: "Pre",
            on_enter: None,
            on_exit: None,
            on_update: pre_update,
        },
        // Index 1 — CS+
        PhaseDescriptor {
            id: Phase::CsPlus,
            name: "CS+",
            on_enter: Some(cs_enter),
            on_exit: Some(cs_exit),
            on_update: cs_update,
        },
        // Index 2 — CS-
        PhaseDescriptor {
            id: Phase::CsMinus,
            name: "CS-",
            on_enter: Some(cs_enter),
            on_exit: Some(cs_exit),
            on_update: cs_update,
        },
        // Index 3 — Trace
        PhaseDescriptor {
            id: Phase::Trace,
            name: "Trace",
            on_enter: None,
            on_exit: None,
            on_update: trace_update,
        },
        // Index 4 — US
        PhaseDescriptor {
            id: Phase::Us,
            name: "US",
            on_enter: Some(us_enter),
            on_exit: Some(us_exit),
            on_update: us_window_update,
        },
        // Index 5 — US suppressed (no puff)
        PhaseDescriptor {
            id: Phase::UsSuppressed,
            name: "No-Puff",
            on_enter: None,
            on_exit: None,
            on_update: us_window_update,
        },
        // Index 6 — Post
        PhaseDescriptor {
            id: Phase::Post,
            name: "Post",
            on_enter: None,
            on_exit: None,
            on_update: post_update,
        },
        // Index 7 — ITI
        PhaseDescriptor {
            id: Phase::Iti,
            name: "ITI",
            on_enter: Some(iti_enter),
            on_exit: Some(iti_exit),
            on_update: iti_update,
        },
        // Index 8 — Paused (engine-managed; never advances on its own)
        PhaseDescriptor {
            id: Phase::Paused,
            name: "Pause",
            on_enter: None,
            on_exit: None,
            on_update: hold,
        },
        // Index 9 — Terminal
        PhaseDescriptor {
            id: Phase::Terminal,
            name: "End",
            on_enter: Some(terminal_enter),
            on_exit: None,
            on_update: hold,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  PRE — baseline before CS onset
// ═══════════════════════════════════════════════════════════════════════════

fn pre_update(ctx: &mut TrialContext) -> Option<Phase> {
    if ctx.phase_elapsed_ms() < ctx.config.pre_ms {
        return None;
    }
    match ctx.condition() {
        Condition::CsPlus => Some(Phase::CsPlus),
        Condition::CsMinus => Some(Phase::CsMinus),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CS+ / CS- — tone on for cs_ms
// ═══════════════════════════════════════════════════════════════════════════

fn cs_enter(ctx: &mut TrialContext) {
    ctx.commands.tone_hz = Some(ctx.cs_tone_hz());
}

fn cs_exit(ctx: &mut TrialContext) {
    ctx.commands.tone_hz = None;
}

fn cs_update(ctx: &mut TrialContext) -> Option<Phase> {
    if ctx.phase_elapsed_ms() < ctx.config.cs_ms {
        return None;
    }
    if ctx.config.trace_ms > 0 {
        Some(Phase::Trace)
    } else {
        Some(us_branch(ctx))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  TRACE — silent gap between CS offset and US onset
// ═══════════════════════════════════════════════════════════════════════════

fn trace_update(ctx: &mut TrialContext) -> Option<Phase> {
    if ctx.phase_elapsed_ms() < ctx.config.trace_ms {
        return None;
    }
    Some(us_branch(ctx))
}

/// The puff is delivered only on non-probe CS+ trials.  Probe trials — both
/// CS+ probes (testing anticipation) and every CS- trial — run the same
/// window with the solenoid closed.
fn us_branch(ctx: &TrialContext) -> Phase {
    if ctx.condition() == Condition::CsPlus && !ctx.plan.is_probe {
        Phase::Us
    } else {
        Phase::UsSuppressed
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  US / US suppressed — puff window
// ═══════════════════════════════════════════════════════════════════════════

fn us_enter(ctx: &mut TrialContext) {
    ctx.commands.puff = true;
}

fn us_exit(ctx: &mut TrialContext) {
    ctx.commands.puff = false;
}

fn us_window_update(ctx: &mut TrialContext) -> Option<Phase> {
    if ctx.phase_elapsed_ms() < ctx.config.puff_ms {
        return None;
    }
    Some(Phase::Post)
}

// ═══════════════════════════════════════════════════════════════════════════
//  POST — observation window after the US
// ═══════════════════════════════════════════════════════════════════════════

fn post_update(ctx: &mut TrialContext) -> Option<Phase> {
    if ctx.phase_elapsed_ms() < ctx.config.post_ms {
        return None;
    }
    Some(Phase::Iti)
}

// ═══════════════════════════════════════════════════════════════════════════
//  ITI — inter-trial interval (distractor window)
// ═══════════════════════════════════════════════════════════════════════════

fn iti_enter(ctx: &mut TrialContext) {
    ctx.commands.distractor = ctx.config.distractor_enabled();
}

fn iti_exit(ctx: &mut TrialContext) {
    ctx.commands.distractor = false;
}

fn iti_update(ctx: &mut TrialContext) -> Option<Phase> {
    if ctx.phase_elapsed_ms() < ctx.config.iti_ms {
        return None;
    }
    if ctx.plan.index >= ctx.config.total_trials {
        return Some(Phase::Terminal);
    }
    // Flag the boundary; the service installs the next trial's plan before
    // the Pre handler ever reads it.
    ctx.trial_boundary = true;
    Some(Phase::Pre)
}

// ═══════════════════════════════════════════════════════════════════════════
//  Paused / Terminal
// ═══════════════════════════════════════════════════════════════════════════

fn hold(_ctx: &mut TrialContext) -> Option<Phase> {
    None
}

fn terminal_enter(ctx: &mut TrialContext) {
    ctx.commands = super::context::StimulusCommands::all_off();
    ctx.session_over = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::fsm::Fsm;
    use crate::planner::TrialPlan;

    fn ctx_with(condition: Condition, is_probe: bool) -> TrialContext {
        let plan = TrialPlan {
            index: 1,
            condition,
            is_probe,
        };
        TrialContext::new(SessionConfig::default(), plan)
    }

    /// Step the clock forward 1 ms at a time until the FSM leaves `from`,
    /// returning the phase it lands in.
    fn run_until_leave(fsm: &mut Fsm, ctx: &mut TrialContext, from: Phase) -> Phase {
        assert_eq!(fsm.current_phase(), from);
        for _ in 0..120_000 {
            ctx.now_ms = ctx.now_ms.wrapping_add(1);
            if fsm.advance(ctx).is_some() {
                return fsm.current_phase();
            }
        }
        panic!("phase {from:?} never expired");
    }

    #[test]
    fn cs_plus_trial_walks_full_sequence() {
        let mut ctx = ctx_with(Condition::CsPlus, false);
        let mut fsm = Fsm::new(build_phase_table(), Phase::Pre);
        fsm.start(&mut ctx);

        assert_eq!(run_until_leave(&mut fsm, &mut ctx, Phase::Pre), Phase::CsPlus);
        assert_eq!(ctx.commands.tone_hz, Some(ctx.config.cs_tone_1_hz));
        assert_eq!(run_until_leave(&mut fsm, &mut ctx, Phase::CsPlus), Phase::Trace);
        assert_eq!(ctx.commands.tone_hz, None, "tone stops at CS offset");
        assert_eq!(run_until_leave(&mut fsm, &mut ctx, Phase::Trace), Phase::Us);
        assert!(ctx.commands.puff, "puff opens on US entry");
        assert_eq!(run_until_leave(&mut fsm, &mut ctx, Phase::Us), Phase::Post);
        assert!(!ctx.commands.puff, "puff closes on US exit");
        assert_eq!(run_until_leave(&mut fsm, &mut ctx, Phase::Post), Phase::Iti);
        assert!(ctx.commands.distractor);
    }

    #[test]
    fn cs_minus_trial_never_puffs() {
        let mut ctx = ctx_with(Condition::CsMinus, false);
        let mut fsm = Fsm::new(build_phase_table(), Phase::Pre);
        fsm.start(&mut ctx);

        assert_eq!(run_until_leave(&mut fsm, &mut ctx, Phase::Pre), Phase::CsMinus);
        assert_eq!(ctx.commands.tone_hz, Some(ctx.config.cs_tone_2_hz));
        assert_eq!(run_until_leave(&mut fsm, &mut ctx, Phase::CsMinus), Phase::Trace);
        assert_eq!(
            run_until_leave(&mut fsm, &mut ctx, Phase::Trace),
            Phase::UsSuppressed
        );
        assert!(!ctx.commands.puff);
        assert_eq!(
            run_until_leave(&mut fsm, &mut ctx, Phase::UsSuppressed),
            Phase::Post
        );
        assert!(!ctx.commands.puff);
    }

    #[test]
    fn cs_plus_probe_suppresses_us() {
        let mut ctx = ctx_with(Condition::CsPlus, true);
        let mut fsm = Fsm::new(build_phase_table(), Phase::Pre);
        fsm.start(&mut ctx);

        run_until_leave(&mut fsm, &mut ctx, Phase::Pre);
        run_until_leave(&mut fsm, &mut ctx, Phase::CsPlus);
        assert_eq!(
            run_until_leave(&mut fsm, &mut ctx, Phase::Trace),
            Phase::UsSuppressed
        );
        assert!(!ctx.commands.puff, "probe trial must never open the valve");
    }

    #[test]
    fn zero_trace_skips_straight_to_us() {
        let mut ctx = ctx_with(Condition::CsPlus, false);
        ctx.config.trace_ms = 0; // delay protocol
        let mut fsm = Fsm::new(build_phase_table(), Phase::Pre);
        fsm.start(&mut ctx);

        run_until_leave(&mut fsm, &mut ctx, Phase::Pre);
        assert_eq!(run_until_leave(&mut fsm, &mut ctx, Phase::CsPlus), Phase::Us);
    }

    #[test]
    fn iti_flags_trial_boundary_until_last_trial() {
        let mut ctx = ctx_with(Condition::CsPlus, false);
        ctx.config.total_trials = 2;
        let mut fsm = Fsm::new(build_phase_table(), Phase::Iti);
        fsm.start(&mut ctx);

        assert_eq!(run_until_leave(&mut fsm, &mut ctx, Phase::Iti), Phase::Pre);
        assert!(ctx.trial_boundary);
        assert!(!ctx.session_over);

        // Pretend the service installed trial 2's plan.
        ctx.trial_boundary = false;
        ctx.plan.index = 2;
        fsm.force(Phase::Iti, &mut ctx);
        assert_eq!(run_until_leave(&mut fsm, &mut ctx, Phase::Iti), Phase::Terminal);
        assert!(ctx.session_over);
        assert_eq!(ctx.commands, crate::fsm::context::StimulusCommands::all_off());
    }

    #[test]
    fn realized_durations_sum_to_configured_trial_length() {
        let mut ctx = ctx_with(Condition::CsPlus, false);
        let cfg = ctx.config.clone();
        let mut fsm = Fsm::new(build_phase_table(), Phase::Pre);
        fsm.start(&mut ctx);

        let mut realized_total: u32 = 0;
        let mut transitions = 0;
        while transitions < 6 {
            ctx.now_ms = ctx.now_ms.wrapping_add(1);
            if let Some(tr) = fsm.advance(&mut ctx) {
                realized_total += tr.realized_ms;
                transitions += 1;
            }
        }
        let configured =
            cfg.pre_ms + cfg.cs_ms + cfg.trace_ms + cfg.puff_ms + cfg.post_ms + cfg.iti_ms;
        // One tick of rounding slack per phase boundary.
        assert!(realized_total >= configured);
        assert!(realized_total <= configured + 6);
    }
}
