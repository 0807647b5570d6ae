// SPDX-License-Identifier: MIT

//! Serial response writer.
//!
//! Formats the `{H_ok}` / `{H_false}` / `{H_<value>}` acknowledgement family
//! and longer status lines, and never blocks on a full TX buffer: a response
//! that does not fit whole is parked in a single pending slot and retried on
//! the next flush; parking a new response over an unsent one drops the older
//! and counts it.

use core::fmt::Write as _;

use heapless::String;

use crate::hal::ByteSink;

/// Longest single response line (the diagnostics block).
pub const MAX_RESPONSE: usize = 160;

pub struct ResponseWriter<S: ByteSink> {
    sink: S,
    pending: String<MAX_RESPONSE>,
    dropped: u16,
}

impl<S: ByteSink> ResponseWriter<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            pending: String::new(),
            dropped: 0,
        }
    }

    /// Responses dropped because the pending slot was overwritten.
    pub fn dropped(&self) -> u16 {
        self.dropped
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Drive the sink and retry the pending response if any.
    pub fn service(&mut self) {
        self.sink.pump();
        if self.pending.is_empty() {
            return;
        }
        if self.sink.writable() >= self.pending.len() {
            self.sink.write(self.pending.as_bytes());
            self.pending.clear();
        }
    }

    /// `{hello_ok}` handshake reply.
    pub fn send_hello(&mut self) {
        self.send_line("{hello_ok}");
    }

    /// `{H_ok}`, or the generic `{ok}` when no token was supplied.
    pub fn send_ok(&mut self, h: &str) {
        if h.is_empty() {
            self.send_line("{ok}");
        } else {
            let mut line: String<MAX_RESPONSE> = String::new();
            let _ = write!(line, "{{{h}_ok}}");
            self.send_line(&line);
        }
    }

    pub fn send_false(&mut self, h: &str) {
        let mut line: String<MAX_RESPONSE> = String::new();
        let _ = write!(line, "{{{h}_false}}");
        self.send_line(&line);
    }

    pub fn send_true(&mut self, h: &str) {
        let mut line: String<MAX_RESPONSE> = String::new();
        let _ = write!(line, "{{{h}_true}}");
        self.send_line(&line);
    }

    /// `{H_<value>}` for sensor readings.
    pub fn send_value(&mut self, h: &str, value: u32) {
        let mut line: String<MAX_RESPONSE> = String::new();
        let _ = write!(line, "{{{h}_{value}}}");
        self.send_line(&line);
    }

    /// Send an arbitrary line (diagnostics block, boot status). A trailing
    /// newline is appended for host parsing convenience.
    pub fn send_line(&mut self, line: &str) {
        self.service();
        let needed = line.len() + 1;
        if self.sink.writable() >= needed {
            self.sink.write(line.as_bytes());
            self.sink.write(b"\n");
            return;
        }
        // Park it; an unsent previous response loses its slot.
        if !self.pending.is_empty() {
            self.dropped = self.dropped.saturating_add(1);
        }
        self.pending.clear();
        let _ = self.pending.push_str(line);
        let _ = self.pending.push('\n');
    }

    /// Send a pre-encoded binary frame. Dropped whole if it does not fit;
    /// a partial frame on the wire would just be line noise to the host.
    pub fn send_frame(&mut self, frame: &[u8]) {
        self.sink.pump();
        if self.sink.writable() >= frame.len() {
            self.sink.write(frame);
        } else {
            self.dropped = self.dropped.saturating_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sink with an adjustable free-space ceiling.
    struct TestSink {
        data: std::vec::Vec<u8>,
        capacity: usize,
    }

    impl TestSink {
        fn new(capacity: usize) -> Self {
            Self {
                data: std::vec::Vec::new(),
                capacity,
            }
        }

        fn text(&self) -> &str {
            core::str::from_utf8(&self.data).unwrap()
        }
    }

    impl ByteSink for TestSink {
        fn writable(&self) -> usize {
            self.capacity.saturating_sub(self.data.len())
        }

        fn write(&mut self, bytes: &[u8]) -> usize {
            let take = bytes.len().min(self.writable());
            self.data.extend_from_slice(&bytes[..take]);
            take
        }
    }

    #[test]
    fn ack_family_formats() {
        let mut writer = ResponseWriter::new(TestSink::new(256));
        writer.send_hello();
        writer.send_ok("ab");
        writer.send_ok("");
        writer.send_false("ab");
        writer.send_true("ab");
        writer.send_value("bt", 7421);
        assert_eq!(
            writer.sink_mut().text(),
            "{hello_ok}\n{ab_ok}\n{ok}\n{ab_false}\n{ab_true}\n{bt_7421}\n"
        );
    }

    #[test]
    fn full_sink_parks_one_response_and_drops_older() {
        let mut writer = ResponseWriter::new(TestSink::new(4));
        writer.send_ok("aa"); // does not fit: parked
        assert_eq!(writer.dropped(), 0);
        writer.send_ok("bb"); // replaces the parked response
        assert_eq!(writer.dropped(), 1);

        // Free the line; only the newest response goes out.
        writer.sink_mut().capacity = 64;
        writer.service();
        assert_eq!(writer.sink_mut().text(), "{bb_ok}\n");
    }

    #[test]
    fn pending_retries_until_space() {
        let mut writer = ResponseWriter::new(TestSink::new(0));
        writer.send_ok("ab");
        writer.service();
        assert_eq!(writer.sink_mut().text(), "");

        writer.sink_mut().capacity = 64;
        writer.service();
        assert_eq!(writer.sink_mut().text(), "{ab_ok}\n");
        // Slot is cleared after delivery.
        writer.service();
        assert_eq!(writer.sink_mut().text(), "{ab_ok}\n");
    }

    #[test]
    fn frames_never_sent_partially() {
        let mut writer = ResponseWriter::new(TestSink::new(3));
        writer.send_frame(&[0xAA, 0x55, 2, 1, 1, 0, 0]);
        assert_eq!(writer.sink_mut().data.len(), 0);
        assert_eq!(writer.dropped(), 1);
    }
}
