//! Rig service — one struct owning the whole trial controller.
//!
//! ```text
//!  CommandPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                  │          RigService          │
//!  BlinkSensor ──▶ │  FSM · Planner · Sampler ·   │
//!  StimulusPort ◀──│  Command channel · Watchdog  │
//!                  └──────────────────────────────┘
//! ```
//!
//! [`RigService::tick`] is the single control-loop entry point.  Per tick,
//! strictly in this order: feed the watchdog, poll one command, honour a
//! pause, advance the phase machine, re-assert stimulus outputs, and emit a
//! blink sample if one is due.  A pause command polled this tick therefore
//! takes effect *before* this tick's phase advance: a phase boundary crossed
//! exactly on the pause tick is deferred until after unpause.
//!
//! All shared state (phase, trial index, pause bookkeeping, reboot flag)
//! lives in this struct and is reached only from the single control-loop
//! context — no ambient globals, no locking.

use log::{info, warn};

use crate::command::{CommandChannel, CommandToken};
use crate::config::SessionConfig;
use crate::drivers::keypad::KeypadKey;
use crate::drivers::watchdog::Watchdog;
use crate::fsm::context::TrialContext;
use crate::fsm::phases::build_phase_table;
use crate::fsm::{Fsm, Phase, PhaseTransition};
use crate::planner::{Condition, TrialPlanner};
use crate::profiling::TickProfiler;
use crate::sampler::BlinkSampler;

use super::events::RigEvent;
use super::ports::{BlinkSensorPort, CommandPort, EventSink, StimulusPort};

// ───────────────────────────────────────────────────────────────
// Manual stimulus overrides (diagnostic commands)
// ───────────────────────────────────────────────────────────────

/// A timed manual pulse requested by a `11`/`22`/`pp` command.  Manual
/// pulses drive the outputs directly; they never touch the phase machine
/// or trial bookkeeping.
#[derive(Debug, Clone, Copy)]
struct ManualPulse {
    started_ms: u32,
    duration_ms: u32,
}

impl ManualPulse {
    fn active(&self, now_ms: u32) -> bool {
        now_ms.wrapping_sub(self.started_ms) < self.duration_ms
    }
}

// ───────────────────────────────────────────────────────────────
// RigService
// ───────────────────────────────────────────────────────────────

pub struct RigService {
    fsm: Fsm,
    ctx: TrialContext,
    planner: TrialPlanner,
    sampler: BlinkSampler,
    channel: CommandChannel,
    watchdog: Watchdog,
    profiler: TickProfiler,

    /// `ss` received; the trial sequence is running.
    started: bool,
    /// Raw-clock origin of the session-relative timebase.
    session_origin_ms: u32,

    manual_tone: Option<(u16, ManualPulse)>,
    manual_puff: Option<ManualPulse>,
}

impl RigService {
    /// Build the controller for one session.  `seed` feeds the trial
    /// planner's PRNG; `watchdog` is armed by the caller at boot so it also
    /// covers the handshake.
    pub fn new(config: SessionConfig, seed: u64, watchdog: Watchdog) -> Self {
        let mut planner = TrialPlanner::new(&config, seed);
        let first_plan = planner.first_plan();
        let sampler = BlinkSampler::new(config.sample_interval_ms);
        let ctx = TrialContext::new(config, first_plan);
        let fsm = Fsm::new(build_phase_table(), Phase::Pre);

        Self {
            fsm,
            ctx,
            planner,
            sampler,
            channel: CommandChannel::new(),
            watchdog,
            profiler: TickProfiler::new(),
            started: false,
            session_origin_ms: 0,
            manual_tone: None,
            manual_puff: None,
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle.  `now_ms` is the raw monotonic clock.
    pub fn tick(
        &mut self,
        now_ms: u32,
        hw: &mut (impl BlinkSensorPort + StimulusPort),
        cmd: &mut impl CommandPort,
        sink: &mut impl EventSink,
    ) {
        // 1. Watchdog first: even a command flood must not starve it.
        self.watchdog.tick();

        // 2. At most one command per tick.
        self.ctx.now_ms = self.session_time(now_ms);
        if let Some(token) = self.channel.poll(cmd) {
            self.handle_token(token, now_ms, hw, sink);
        }

        if !self.started {
            // Pre-session: only manual diagnostic pulses drive the rig.
            let t = self.session_time(now_ms);
            self.apply_stimulus(t, hw);
            return;
        }

        // 3. Pause freezes phase time, outputs, and sampling.
        if self.ctx.is_paused() {
            return;
        }

        // 4. Phase advance (session-relative clock).
        let t = self.session_time(now_ms);
        self.ctx.now_ms = t;
        if let Some(tr) = self.fsm.advance(&mut self.ctx) {
            self.after_transition(tr, sink);
        }

        // 5. Re-assert stimulus outputs.
        self.apply_stimulus(t, hw);

        // 6. Blink sampling within logged phases.
        if self.fsm.current_phase().is_logged() {
            if let Some(rec) = self.sampler.maybe_sample(t, hw) {
                sink.emit(&RigEvent::Sample(rec));
            }
        }
    }

    /// Record the previous tick's execution time for the `$` dump.
    pub fn record_tick_us(&mut self, elapsed_us: u32) {
        self.profiler.record(elapsed_us);
    }

    /// Operator keypad gestures map onto the same actions as the serial
    /// tokens: Select starts the session, Right pauses, Left unpauses, and
    /// Up/Down fire the manual puff/tone used while positioning the animal.
    pub fn handle_key(
        &mut self,
        key: KeypadKey,
        now_ms: u32,
        hw: &mut (impl BlinkSensorPort + StimulusPort),
        sink: &mut impl EventSink,
    ) {
        let token = match key {
            KeypadKey::Select => CommandToken::Select,
            KeypadKey::Right => CommandToken::Pause,
            KeypadKey::Left => CommandToken::Unpause,
            KeypadKey::Up => CommandToken::ForcePuff,
            KeypadKey::Down => CommandToken::ForceCsPlus,
            KeypadKey::None => return,
        };
        self.handle_token(token, now_ms, hw, sink);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.fsm.current_phase()
    }

    pub fn trial_index(&self) -> u16 {
        self.ctx.plan.index
    }

    /// The plan for the trial in flight.
    pub fn plan(&self) -> crate::planner::TrialPlan {
        self.ctx.plan
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_paused(&self) -> bool {
        self.ctx.is_paused()
    }

    pub fn session_over(&self) -> bool {
        self.ctx.session_over
    }

    pub fn reboot_requested(&self) -> bool {
        self.watchdog.reboot_requested()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.ctx.config
    }

    /// Sampler state (test observability).
    pub fn sampler(&self) -> &BlinkSampler {
        &self.sampler
    }

    // ── Session lifecycle ─────────────────────────────────────

    /// Open the session: log framing, phase machine, sample clock.
    /// Invoked by the `ss` token; callable directly by tests.
    pub fn start_session(&mut self, now_ms: u32, sink: &mut impl EventSink) {
        if self.started {
            return;
        }
        info!(
            "session start: mouse {} type {} session {}",
            self.ctx.config.mouse_id,
            self.ctx.config.session_type.label(),
            self.ctx.config.session_number
        );
        self.started = true;
        self.session_origin_ms = now_ms;
        self.manual_tone = None;
        self.manual_puff = None;
        self.ctx.now_ms = 0;

        sink.emit(&RigEvent::SessionBegin);
        self.emit_trial_open(sink);
        self.fsm.start(&mut self.ctx);
        self.sampler.arm(0);
    }

    // ── Internal ──────────────────────────────────────────────

    /// Session-relative milliseconds (raw clock before the session starts).
    fn session_time(&self, now_ms: u32) -> u32 {
        if self.started {
            now_ms.wrapping_sub(self.session_origin_ms)
        } else {
            now_ms
        }
    }

    fn handle_token(
        &mut self,
        token: CommandToken,
        now_ms: u32,
        hw: &mut (impl BlinkSensorPort + StimulusPort),
        sink: &mut impl EventSink,
    ) {
        let t = self.session_time(now_ms);
        if self.started {
            // Keep the context clock current even when invoked off the tick
            // path (keypad edges land here directly).
            self.ctx.now_ms = t;
        }
        log::debug!("command {}", token.code());
        match token {
            CommandToken::Select => self.start_session(now_ms, sink),

            CommandToken::Reset => self.handle_reset(t, hw, sink),

            CommandToken::Pause => {
                if self.started && !self.ctx.is_paused() {
                    self.fsm.suspend(&mut self.ctx);
                    self.sampler.disarm();
                }
            }

            CommandToken::Unpause => {
                if self.ctx.is_paused() {
                    self.fsm.resume(&mut self.ctx);
                    self.sampler.arm(t);
                }
            }

            // Manual diagnostic triggers: outputs only, no phase effect.
            CommandToken::ForceCsPlus | CommandToken::ForceCsMinus => {
                if self.ctx.is_paused() {
                    warn!("manual tone ignored while paused");
                    return;
                }
                let condition = if token == CommandToken::ForceCsPlus {
                    Condition::CsPlus
                } else {
                    Condition::CsMinus
                };
                let freq = self.ctx.config.tone_for(condition);
                self.manual_tone = Some((
                    freq,
                    ManualPulse {
                        started_ms: t,
                        duration_ms: self.ctx.config.cs_ms,
                    },
                ));
            }

            CommandToken::ForcePuff => {
                if self.ctx.is_paused() {
                    warn!("manual puff ignored while paused");
                    return;
                }
                self.manual_puff = Some(ManualPulse {
                    started_ms: t,
                    duration_ms: self.ctx.config.puff_ms,
                });
            }
        }
    }

    /// Reset is always honoured.  During a session it abandons the pending
    /// trial (its logging included) and returns to PRE with trial index 1;
    /// at TERMINAL, or before any session exists, it falls through to a
    /// watchdog-mediated reboot instead.
    fn handle_reset(
        &mut self,
        t: u32,
        hw: &mut (impl BlinkSensorPort + StimulusPort),
        sink: &mut impl EventSink,
    ) {
        if !self.started || self.ctx.session_over {
            self.watchdog.request_reboot();
            return;
        }
        info!("reset: abandoning trial {}", self.ctx.plan.index);

        // Run exit hooks for whatever was active, then wipe trial state.
        let _ = self.fsm.force(Phase::Pre, &mut self.ctx);
        self.planner.reset();
        let first_plan = self.planner.first_plan();
        self.ctx.reset_for_new_session(first_plan, t);
        self.channel.clear();
        self.manual_tone = None;
        self.manual_puff = None;
        hw.all_off();
        // The sample clock restarts at the reset instant: no sample after
        // this point may carry an earlier timestamp.
        self.sampler.arm(t);

        sink.emit(&RigEvent::DataEnd);
        sink.emit(&RigEvent::comment("session reset"));
        self.emit_trial_open(sink);
    }

    fn after_transition(&mut self, tr: PhaseTransition, sink: &mut impl EventSink) {
        if tr.to == Phase::Pre && self.ctx.trial_boundary {
            self.ctx.trial_boundary = false;
            self.ctx.plan = self.planner.plan_next();
            sink.emit(&RigEvent::DataEnd);
            self.emit_trial_open(sink);
        }

        if tr.to == Phase::Terminal {
            info!("session complete after trial {}", self.ctx.plan.index);
            self.sampler.disarm();
            sink.emit(&RigEvent::DataEnd);
            sink.emit(&RigEvent::Profile(self.profiler.summary()));
            sink.emit(&RigEvent::SessionEnd);
            // Let the hardware watchdog perform the restart: a fresh boot is
            // the only state this controller trusts after a session.
            self.watchdog.request_reboot();
        }
    }

    fn emit_trial_open(&self, sink: &mut impl EventSink) {
        sink.emit(&RigEvent::TrialBegin {
            index: self.ctx.plan.index,
            condition: self.ctx.plan.condition,
        });
        sink.emit(&RigEvent::DataBegin);
    }

    /// Merge phase commands with any live manual pulse and push the result
    /// to the stimulus port.  Idempotent by driver contract.
    fn apply_stimulus(&mut self, t: u32, hw: &mut impl StimulusPort) {
        if let Some((_, pulse)) = self.manual_tone {
            if !pulse.active(t) {
                self.manual_tone = None;
            }
        }
        if let Some(pulse) = self.manual_puff {
            if !pulse.active(t) {
                self.manual_puff = None;
            }
        }

        let tone = self
            .manual_tone
            .map(|(freq, _)| freq)
            .or(self.ctx.commands.tone_hz);
        match tone {
            Some(freq) => hw.tone_on(freq),
            None => hw.tone_off(),
        }

        if self.ctx.commands.puff || self.manual_puff.is_some() {
            hw.puff_on();
        } else {
            hw.puff_off();
        }

        hw.set_distractor(self.ctx.commands.distractor);
    }
}
