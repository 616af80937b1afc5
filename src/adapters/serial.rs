//! Serial adapters: the framed log stream out, command bytes in.
//!
//! [`SerialEventSink`] renders [`RigEvent`]s into the line-oriented framing
//! the host-side reader parses (see `app::events` for the marker table).
//! On ESP-IDF the lines go to the USB-CDC console; on the host they are
//! captured in a buffer so integration tests can assert on the exact
//! stream.

use core::fmt::Write as _;

use crate::app::events::{
    RigEvent, COMMENT_MARKER, DATA_BEGIN_MARKER, DATA_END_MARKER, PROFILING_DATA_MARKER,
    SESSION_BEGIN_MARKER, SESSION_END_MARKER, TRIAL_DATA_MARKER,
};
use crate::app::ports::{CommandPort, EventSink};

// ───────────────────────────────────────────────────────────────
// Outbound: framed log stream
// ───────────────────────────────────────────────────────────────

/// Renders rig events into framed ASCII lines on the serial channel.
pub struct SerialEventSink {
    /// Host builds: captured lines, in emission order.
    #[cfg(not(target_os = "espidf"))]
    captured: Vec<String>,
}

impl SerialEventSink {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            captured: Vec::new(),
        }
    }

    /// Captured stream (host builds; test observability).
    #[cfg(not(target_os = "espidf"))]
    pub fn lines(&self) -> &[String] {
        &self.captured
    }

    fn write_line(&mut self, line: &str) {
        #[cfg(target_os = "espidf")]
        println!("{line}");

        #[cfg(not(target_os = "espidf"))]
        self.captured.push(line.to_owned());
    }
}

impl Default for SerialEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for SerialEventSink {
    fn emit(&mut self, event: &RigEvent) {
        // Formatting into a fixed-capacity line cannot fail for the field
        // widths involved; a truncated line is preferable to a panic anyway.
        let mut line = heapless::String::<96>::new();
        match event {
            RigEvent::SessionBegin => {
                let _ = line.push(SESSION_BEGIN_MARKER);
            }
            RigEvent::SessionEnd => {
                let _ = line.push(SESSION_END_MARKER);
            }
            RigEvent::TrialBegin { index, condition } => {
                let _ = line.push(TRIAL_DATA_MARKER);
                self.write_line(line.as_str());
                line.clear();
                let _ = write!(line, "{} {}", index, condition.code());
            }
            RigEvent::DataBegin => {
                let _ = line.push(DATA_BEGIN_MARKER);
            }
            RigEvent::DataEnd => {
                let _ = line.push(DATA_END_MARKER);
            }
            RigEvent::Sample(rec) => {
                let _ = write!(line, "{}\t{}", rec.reading, rec.timestamp_ms);
            }
            RigEvent::Comment(text) => {
                let _ = line.push(COMMENT_MARKER);
                let _ = line.push_str(text.as_str());
            }
            RigEvent::Profile(summary) => {
                let _ = line.push(PROFILING_DATA_MARKER);
                self.write_line(line.as_str());
                line.clear();
                let _ = write!(
                    line,
                    "{} {} {}",
                    summary.ticks, summary.avg_us, summary.max_us
                );
            }
        }
        self.write_line(line.as_str());
    }
}

// ───────────────────────────────────────────────────────────────
// Inbound: command bytes
// ───────────────────────────────────────────────────────────────

/// Non-blocking byte source for the command channel.
///
/// On ESP-IDF this drains the UART RX FIFO; on the host it pops from an
/// injected buffer, which tests fill via [`SerialCommandPort::inject`].
pub struct SerialCommandPort {
    #[cfg(not(target_os = "espidf"))]
    buffered: std::collections::VecDeque<u8>,
}

impl SerialCommandPort {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            buffered: std::collections::VecDeque::new(),
        }
    }

    /// Queue inbound bytes (host builds).
    #[cfg(not(target_os = "espidf"))]
    pub fn inject(&mut self, bytes: &[u8]) {
        self.buffered.extend(bytes);
    }
}

impl Default for SerialCommandPort {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandPort for SerialCommandPort {
    #[cfg(target_os = "espidf")]
    fn read_byte(&mut self) -> Option<u8> {
        let mut byte = 0u8;
        let read = unsafe {
            esp_idf_sys::uart_read_bytes(
                esp_idf_sys::uart_port_t_UART_NUM_0,
                core::ptr::addr_of_mut!(byte).cast(),
                1,
                0, // zero tick timeout: never waits
            )
        };
        (read == 1).then_some(byte)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_byte(&mut self) -> Option<u8> {
        self.buffered.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::Condition;
    use crate::profiling::ProfileSummary;
    use crate::sampler::SampleRecord;

    #[test]
    fn frames_match_the_host_reader_grammar() {
        let mut sink = SerialEventSink::new();
        sink.emit(&RigEvent::SessionBegin);
        sink.emit(&RigEvent::TrialBegin {
            index: 1,
            condition: Condition::CsPlus,
        });
        sink.emit(&RigEvent::DataBegin);
        sink.emit(&RigEvent::Sample(SampleRecord {
            reading: 512,
            timestamp_ms: 1230,
        }));
        sink.emit(&RigEvent::DataEnd);
        sink.emit(&RigEvent::SessionEnd);

        assert_eq!(
            sink.lines(),
            &["<", "@", "1 1", "[", "512\t1230", "]", ">"]
        );
    }

    #[test]
    fn comment_lines_carry_the_hash_marker() {
        let mut sink = SerialEventSink::new();
        sink.emit(&RigEvent::comment("Q1: Please enter the mouse ID number:"));
        assert_eq!(sink.lines(), &["#Q1: Please enter the mouse ID number:"]);
    }

    #[test]
    fn profile_dump_uses_dollar_marker() {
        let mut sink = SerialEventSink::new();
        sink.emit(&RigEvent::Profile(ProfileSummary {
            ticks: 1000,
            avg_us: 42,
            max_us: 180,
        }));
        assert_eq!(sink.lines(), &["$", "1000 42 180"]);
    }

    #[test]
    fn command_port_pops_injected_bytes() {
        let mut port = SerialCommandPort::new();
        port.inject(b"rr");
        assert_eq!(port.read_byte(), Some(b'r'));
        assert_eq!(port.read_byte(), Some(b'r'));
        assert_eq!(port.read_byte(), None);
    }
}
