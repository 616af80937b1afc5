//! Serial command channel.
//!
//! The host drives the rig with fixed two-character ASCII tokens.  The
//! channel is strictly non-blocking: it drains bytes only while they are
//! already buffered, recognises at most **one** token per poll (so a command
//! flood can never starve phase advancement), and silently discards anything
//! that does not form a token — lossy by design, per the serial protocol.
//!
//! Matching runs over a sliding two-byte window: the unmatched trailing byte
//! is held across polls, so a token split by garbage (`"x" "rr"`) or across
//! two polls is still recognised.

use crate::app::ports::CommandPort;

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// The seven recognised command tokens.
///
/// A token exists only for the duration of one poll: it is either consumed
/// (acted upon by the control loop) or it never existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandToken {
    /// `rr` — unconditional session reset.
    Reset,
    /// `ss` — select / start the session.
    Select,
    /// `11` — manually force the CS+ tone (diagnostic).
    ForceCsPlus,
    /// `22` — manually force the CS- tone (diagnostic).
    ForceCsMinus,
    /// `pp` — manually force an air puff (diagnostic).
    ForcePuff,
    /// `ww` — pause: freeze phase-time accounting.
    Pause,
    /// `cc` — unpause: resume the interrupted phase.
    Unpause,
}

impl CommandToken {
    /// Decode a two-byte window into a token, if it matches one.
    pub fn from_pair(first: u8, second: u8) -> Option<Self> {
        match [first, second] {
            [b'r', b'r'] => Some(Self::Reset),
            [b's', b's'] => Some(Self::Select),
            [b'1', b'1'] => Some(Self::ForceCsPlus),
            [b'2', b'2'] => Some(Self::ForceCsMinus),
            [b'p', b'p'] => Some(Self::ForcePuff),
            [b'w', b'w'] => Some(Self::Pause),
            [b'c', b'c'] => Some(Self::Unpause),
            _ => None,
        }
    }

    /// The wire code for this token.
    pub fn code(self) -> &'static str {
        match self {
            Self::Reset => "rr",
            Self::Select => "ss",
            Self::ForceCsPlus => "11",
            Self::ForceCsMinus => "22",
            Self::ForcePuff => "pp",
            Self::Pause => "ww",
            Self::Unpause => "cc",
        }
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Sliding-window token recogniser over an inbound byte stream.
#[derive(Debug, Default)]
pub struct CommandChannel {
    /// Trailing byte that has not yet completed a token.
    held: Option<u8>,
}

impl CommandChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain buffered bytes until a token completes or the port runs dry.
    /// Never waits; never returns more than one token.
    pub fn poll(&mut self, port: &mut impl CommandPort) -> Option<CommandToken> {
        while let Some(byte) = port.read_byte() {
            match self.held.take() {
                None => self.held = Some(byte),
                Some(prev) => {
                    if let Some(token) = CommandToken::from_pair(prev, byte) {
                        return Some(token);
                    }
                    // No match: `prev` is noise, slide the window.
                    self.held = Some(byte);
                }
            }
        }
        None
    }

    /// Drop any half-recognised token (used when the session resets).
    pub fn clear(&mut self) {
        self.held = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct ByteFeed(VecDeque<u8>);

    impl ByteFeed {
        fn new(bytes: &[u8]) -> Self {
            Self(bytes.iter().copied().collect())
        }
    }

    impl CommandPort for ByteFeed {
        fn read_byte(&mut self) -> Option<u8> {
            self.0.pop_front()
        }
    }

    fn drain(channel: &mut CommandChannel, feed: &mut ByteFeed) -> Vec<CommandToken> {
        let mut out = Vec::new();
        while let Some(t) = channel.poll(feed) {
            out.push(t);
        }
        out
    }

    #[test]
    fn recognises_every_token() {
        for (code, expected) in [
            ("rr", CommandToken::Reset),
            ("ss", CommandToken::Select),
            ("11", CommandToken::ForceCsPlus),
            ("22", CommandToken::ForceCsMinus),
            ("pp", CommandToken::ForcePuff),
            ("ww", CommandToken::Pause),
            ("cc", CommandToken::Unpause),
        ] {
            let mut ch = CommandChannel::new();
            let mut feed = ByteFeed::new(code.as_bytes());
            assert_eq!(ch.poll(&mut feed), Some(expected), "code {code}");
        }
    }

    #[test]
    fn invalid_prefix_is_discarded() {
        // The serial-protocol acceptance sequence: "xzrrpp" → rr, pp.
        let mut ch = CommandChannel::new();
        let mut feed = ByteFeed::new(b"xzrrpp");
        assert_eq!(
            drain(&mut ch, &mut feed),
            vec![CommandToken::Reset, CommandToken::ForcePuff]
        );
    }

    #[test]
    fn one_token_per_poll() {
        let mut ch = CommandChannel::new();
        let mut feed = ByteFeed::new(b"rrpp");
        assert_eq!(ch.poll(&mut feed), Some(CommandToken::Reset));
        assert_eq!(ch.poll(&mut feed), Some(CommandToken::ForcePuff));
        assert_eq!(ch.poll(&mut feed), None);
    }

    #[test]
    fn token_split_across_polls() {
        let mut ch = CommandChannel::new();
        let mut first = ByteFeed::new(b"r");
        assert_eq!(ch.poll(&mut first), None);
        let mut second = ByteFeed::new(b"r");
        assert_eq!(ch.poll(&mut second), Some(CommandToken::Reset));
    }

    #[test]
    fn token_preceded_by_single_noise_byte() {
        // "xrr": the window slides over the noise byte instead of chunking.
        let mut ch = CommandChannel::new();
        let mut feed = ByteFeed::new(b"xrr");
        assert_eq!(ch.poll(&mut feed), Some(CommandToken::Reset));
    }

    #[test]
    fn empty_port_returns_none() {
        let mut ch = CommandChannel::new();
        let mut feed = ByteFeed::new(b"");
        assert_eq!(ch.poll(&mut feed), None);
    }

    #[test]
    fn clear_drops_held_byte() {
        let mut ch = CommandChannel::new();
        let mut feed = ByteFeed::new(b"r");
        assert_eq!(ch.poll(&mut feed), None);
        ch.clear();
        let mut rest = ByteFeed::new(b"r");
        assert_eq!(ch.poll(&mut rest), None, "held byte must be gone");
    }
}
