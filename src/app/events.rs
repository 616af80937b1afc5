//! Outbound application events and the serial log-stream framing.
//!
//! The host-side reader delimits the session's data stream with one-character
//! line markers.  Everything the rig says to the host is one of these
//! [`RigEvent`]s, rendered by the serial adapter:
//!
//! ```text
//! <                session begin
//! # free text      comment (prompts, status, echo)
//! @                trial boundary marker, followed by "index condition"
//! [                data block begin
//! 512\t1230        sample line: analog reading TAB timestamp mod 10000
//! ]                data block end
//! $                profiling dump, followed by "ticks avg_us max_us"
//! >                session end
//! ```

use crate::planner::Condition;
use crate::profiling::ProfileSummary;
use crate::sampler::SampleRecord;

// ── Framing markers ───────────────────────────────────────────

pub const DATA_BEGIN_MARKER: char = '[';
pub const DATA_END_MARKER: char = ']';
pub const COMMENT_MARKER: char = '#';
pub const TRIAL_DATA_MARKER: char = '@';
pub const PROFILING_DATA_MARKER: char = '$';
pub const SESSION_BEGIN_MARKER: char = '<';
pub const SESSION_END_MARKER: char = '>';

// ── Events ────────────────────────────────────────────────────

/// Structured events emitted by the rig service.
#[derive(Debug, Clone, PartialEq)]
pub enum RigEvent {
    /// Session data stream opens (`<`).
    SessionBegin,

    /// Session data stream closes (`>`).
    SessionEnd,

    /// A new trial begins (`@` + "index condition" line).
    TrialBegin { index: u16, condition: Condition },

    /// A trial's sample block opens (`[`).
    DataBegin,

    /// A trial's sample block closes (`]`).
    DataEnd,

    /// One timestamped blink sample (data line).
    Sample(SampleRecord),

    /// Free-text comment line (`#…`): handshake prompts, status echo.
    Comment(heapless::String<64>),

    /// Control-loop timing dump at session end (`$` + summary line).
    Profile(ProfileSummary),
}

impl RigEvent {
    /// Build a comment event, truncating over-long text.
    pub fn comment(text: &str) -> Self {
        let mut s = heapless::String::new();
        let end = text.len().min(63);
        let _ = s.push_str(&text[..end]);
        Self::Comment(s)
    }
}
