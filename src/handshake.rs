//! Session-configuration handshake.
//!
//! Before a session starts, the host answers three prompts on the serial
//! line: mouse ID, session-type index, and session number.  The historical
//! rig sat in blocking read loops for this; here each question is a bounded
//! retry state polled from the single-threaded control loop, so the
//! watchdog keeps getting fed while the rig waits.
//!
//! Rules per question:
//! - The prompt is re-sent every [`PROMPT_INTERVAL_MS`] until answered.
//! - An answer is digits terminated by CR/LF.  Non-numeric or zero answers
//!   are rejected with a fresh prompt, never silently defaulted.
//! - After [`MAX_PROMPTS`] unanswered prompts the handshake fails with a
//!   typed error; the caller decides whether to start over.

use core::fmt::Write as _;

use crate::app::events::RigEvent;
use crate::app::ports::{CommandPort, EventSink};
use crate::config::SessionConfig;
use crate::error::{Error, HandshakeError, Result};

/// Re-prompt cadence while waiting for an answer.
pub const PROMPT_INTERVAL_MS: u32 = 1_000;

/// Prompts per question before the handshake gives up.
pub const MAX_PROMPTS: u8 = 120;

/// The three answers, in protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSetup {
    pub mouse_id: u16,
    pub session_type_index: u8,
    pub session_number: u16,
}

impl SessionSetup {
    /// Materialise the session configuration from the answers.
    pub fn into_config(self) -> Result<SessionConfig> {
        SessionConfig::for_session(self.mouse_id, self.session_type_index, self.session_number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Question {
    MouseId,
    SessionTypeIndex,
    SessionNumber,
}

impl Question {
    fn prompt(self) -> &'static str {
        match self {
            Self::MouseId => "Q1: Please enter the mouse ID number:",
            Self::SessionTypeIndex => "Q2: Please enter the session type index:",
            Self::SessionNumber => "Q3: Please enter the session number:",
        }
    }

    fn next(self) -> Option<Self> {
        match self {
            Self::MouseId => Some(Self::SessionTypeIndex),
            Self::SessionTypeIndex => Some(Self::SessionNumber),
            Self::SessionNumber => None,
        }
    }

    /// Mouse ID and session number must be non-zero; the session-type index
    /// must name a protocol (0 = Control is legal here).
    fn answer_is_valid(self, value: u32) -> bool {
        match self {
            Self::MouseId | Self::SessionNumber => value > 0,
            Self::SessionTypeIndex => value <= 2,
        }
    }
}

/// Poll-driven handshake state machine.
pub struct Handshake {
    question: Question,
    line: heapless::String<16>,
    last_prompt_ms: Option<u32>,
    prompts_sent: u8,
    mouse_id: u16,
    session_type_index: u8,
}

impl Handshake {
    pub fn new() -> Self {
        Self {
            question: Question::MouseId,
            line: heapless::String::new(),
            last_prompt_ms: None,
            prompts_sent: 0,
            mouse_id: 0,
            session_type_index: 0,
        }
    }

    /// Advance the handshake by one poll.
    ///
    /// Returns `Ok(Some(setup))` once all three answers are in,
    /// `Ok(None)` while still waiting, and `Err` when a question exhausted
    /// its prompt budget.
    pub fn poll(
        &mut self,
        now_ms: u32,
        port: &mut impl CommandPort,
        sink: &mut impl EventSink,
    ) -> Result<Option<SessionSetup>> {
        self.maybe_prompt(now_ms, sink)?;

        while let Some(byte) = port.read_byte() {
            match byte {
                b'\r' | b'\n' => {
                    if self.line.is_empty() {
                        continue; // stray terminator between answers
                    }
                    let parsed = self
                        .line
                        .parse::<u32>()
                        .ok()
                        .filter(|v| self.question.answer_is_valid(*v));
                    self.line.clear();
                    match parsed {
                        Some(value) => {
                            if let Some(setup) = self.accept(value, sink) {
                                return Ok(Some(setup));
                            }
                        }
                        None => {
                            sink.emit(&RigEvent::comment("invalid answer; try again"));
                            // Re-prompt immediately on the next poll.
                            self.last_prompt_ms = None;
                        }
                    }
                }
                b'0'..=b'9' => {
                    if self.line.push(byte as char).is_err() {
                        // Longer than any real answer: discard as line noise.
                        self.line.clear();
                    }
                }
                _ => {
                    // Non-digit noise invalidates the partial answer.
                    self.line.clear();
                }
            }
        }
        Ok(None)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn maybe_prompt(&mut self, now_ms: u32, sink: &mut impl EventSink) -> Result<()> {
        let due = match self.last_prompt_ms {
            None => true,
            Some(at) => crate::adapters::time::elapsed_at_least(now_ms, at, PROMPT_INTERVAL_MS),
        };
        if !due {
            return Ok(());
        }
        if self.prompts_sent >= MAX_PROMPTS {
            return Err(Error::Handshake(HandshakeError::NoAnswer));
        }
        sink.emit(&RigEvent::comment(self.question.prompt()));
        self.last_prompt_ms = Some(now_ms);
        self.prompts_sent = self.prompts_sent.saturating_add(1);
        Ok(())
    }

    /// Record a valid numeric answer; returns the setup once complete.
    fn accept(&mut self, value: u32, sink: &mut impl EventSink) -> Option<SessionSetup> {
        let mut echo = heapless::String::<48>::new();
        match self.question {
            Question::MouseId => {
                self.mouse_id = value.min(u32::from(u16::MAX)) as u16;
                let _ = write!(echo, "Got mouse name: MouseK{}", self.mouse_id);
            }
            Question::SessionTypeIndex => {
                self.session_type_index = value.min(255) as u8;
                let _ = write!(echo, "Got session type: {}", self.session_type_index);
            }
            Question::SessionNumber => {
                let _ = write!(echo, "Got session: {value}");
            }
        }
        sink.emit(&RigEvent::comment(echo.as_str()));

        match self.question.next() {
            Some(next) => {
                self.question = next;
                self.last_prompt_ms = None;
                self.prompts_sent = 0;
                None
            }
            None => Some(SessionSetup {
                mouse_id: self.mouse_id,
                session_type_index: self.session_type_index,
                session_number: value.min(u32::from(u16::MAX)) as u16,
            }),
        }
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::events::RigEvent;
    use std::collections::VecDeque;

    struct Feed(VecDeque<u8>);

    impl Feed {
        fn new() -> Self {
            Self(VecDeque::new())
        }
        fn push(&mut self, s: &str) {
            self.0.extend(s.bytes());
        }
    }

    impl CommandPort for Feed {
        fn read_byte(&mut self) -> Option<u8> {
            self.0.pop_front()
        }
    }

    #[derive(Default)]
    struct Recorder(Vec<String>);

    impl EventSink for Recorder {
        fn emit(&mut self, event: &RigEvent) {
            if let RigEvent::Comment(text) = event {
                self.0.push(text.to_string());
            }
        }
    }

    #[test]
    fn happy_path_yields_setup() {
        let mut hs = Handshake::new();
        let mut feed = Feed::new();
        let mut sink = Recorder::default();

        assert_eq!(hs.poll(0, &mut feed, &mut sink).unwrap(), None);
        feed.push("12\n");
        assert_eq!(hs.poll(10, &mut feed, &mut sink).unwrap(), None);
        feed.push("1\n");
        assert_eq!(hs.poll(20, &mut feed, &mut sink).unwrap(), None);
        feed.push("3\n");
        let setup = hs.poll(30, &mut feed, &mut sink).unwrap().unwrap();
        assert_eq!(
            setup,
            SessionSetup {
                mouse_id: 12,
                session_type_index: 1,
                session_number: 3
            }
        );
        let config = setup.into_config().unwrap();
        assert_eq!(config.mouse_id, 12);
        assert_eq!(config.total_trials, 100);
    }

    #[test]
    fn prompts_are_resent_on_interval() {
        let mut hs = Handshake::new();
        let mut feed = Feed::new();
        let mut sink = Recorder::default();

        hs.poll(0, &mut feed, &mut sink).unwrap();
        hs.poll(500, &mut feed, &mut sink).unwrap();
        hs.poll(PROMPT_INTERVAL_MS, &mut feed, &mut sink).unwrap();
        let q1_count = sink.0.iter().filter(|l| l.starts_with("Q1")).count();
        assert_eq!(q1_count, 2);
    }

    #[test]
    fn zero_and_garbage_answers_are_rejected() {
        let mut hs = Handshake::new();
        let mut feed = Feed::new();
        let mut sink = Recorder::default();

        feed.push("0\n");
        assert_eq!(hs.poll(0, &mut feed, &mut sink).unwrap(), None);
        feed.push("abc\n");
        assert_eq!(hs.poll(10, &mut feed, &mut sink).unwrap(), None);
        assert!(sink.0.iter().any(|l| l.contains("invalid answer")));

        // Still on Q1: a valid answer advances to Q2.
        feed.push("5\n");
        hs.poll(20, &mut feed, &mut sink).unwrap();
        assert!(sink.0.iter().any(|l| l.contains("MouseK5")));
    }

    #[test]
    fn exhausted_prompt_budget_fails() {
        let mut hs = Handshake::new();
        let mut feed = Feed::new();
        let mut sink = Recorder::default();

        let mut now = 0u32;
        for _ in 0..MAX_PROMPTS {
            assert!(hs.poll(now, &mut feed, &mut sink).unwrap().is_none());
            now = now.wrapping_add(PROMPT_INTERVAL_MS);
        }
        assert_eq!(
            hs.poll(now, &mut feed, &mut sink),
            Err(Error::Handshake(HandshakeError::NoAnswer))
        );
    }

    #[test]
    fn session_type_zero_is_a_legal_answer() {
        let mut hs = Handshake::new();
        let mut feed = Feed::new();
        let mut sink = Recorder::default();

        feed.push("4\n0\n2\n");
        let mut setup = None;
        for now in [0, 10, 20] {
            if let Some(s) = hs.poll(now, &mut feed, &mut sink).unwrap() {
                setup = Some(s);
            }
        }
        let setup = setup.expect("handshake should complete");
        assert_eq!(setup.session_type_index, 0, "Control protocol is index 0");
        let config = setup.into_config().unwrap();
        assert_eq!(config.total_trials, 50);
    }

    #[test]
    fn crlf_terminators_are_tolerated() {
        let mut hs = Handshake::new();
        let mut feed = Feed::new();
        let mut sink = Recorder::default();

        feed.push("7\r\n");
        assert_eq!(hs.poll(0, &mut feed, &mut sink).unwrap(), None);
        assert!(sink.0.iter().any(|l| l.contains("MouseK7")));
    }
}
