// SPDX-License-Identifier: MIT

//! Dual-format command intake.
//!
//! The serial stream multiplexes two framings, told apart by first byte:
//! 0xAA opens a binary frame, `{` opens a text frame. Bytes are routed to
//! whichever state machine claims them; a 0xAA always wins, which keeps the
//! binary decoder resynchronizing even if it lands mid-text-frame.
//!
//! Valid binary messages are translated onto the same command table the
//! text protocol uses, so the dispatcher only ever sees [`ParsedCommand`].

use crate::protocol::decoder::{Decoder, Frame};
use crate::protocol::messages::{cmd, msg, ParsedCommand, HEADER_0};
use crate::protocol::parser::{FrameParser, ParseStats};

/// Where a command arrived from; binary commands carry the sender's
/// sequence number so the acknowledgement frame can echo it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Source {
    Text,
    Binary { seq: u8 },
}

/// Aggregated link diagnostics for the diagnostics command.
#[derive(Copy, Clone, Debug, Default)]
pub struct LinkStats {
    pub rx_overflow: u16,
    pub dropped_long: u16,
    pub parse_errors: u16,
    pub crc_failures: u16,
    pub last_cmd_ms: u32,
}

pub struct Intake {
    parser: FrameParser,
    decoder: Decoder,
}

impl Intake {
    pub fn new() -> Self {
        Self {
            parser: FrameParser::new(),
            decoder: Decoder::new(),
        }
    }

    /// Feed one byte from the serial stream.
    pub fn push(&mut self, byte: u8, now_ms: u32) -> Option<(ParsedCommand, Source)> {
        if byte == HEADER_0 || self.decoder.in_frame() {
            if self.decoder.push(byte) {
                let frame = self.decoder.take_frame()?;
                let seq = frame.seq;
                return translate(&frame).map(|cmd| (cmd, Source::Binary { seq }));
            }
            return None;
        }

        if self.parser.push(byte, now_ms) {
            return self.parser.take_command().map(|cmd| (cmd, Source::Text));
        }
        None
    }

    /// Link counters, merged with the RX-side overflow count the byte
    /// source tracks.
    pub fn stats(&self, rx_overflow: u16) -> LinkStats {
        let parse: ParseStats = self.parser.stats();
        LinkStats {
            rx_overflow,
            dropped_long: parse.dropped_long,
            parse_errors: parse.parse_errors,
            crc_failures: self.decoder.crc_failures(),
            last_cmd_ms: parse.last_cmd_ms,
        }
    }
}

impl Default for Intake {
    fn default() -> Self {
        Self::new()
    }
}

/// Map a binary message onto the dispatch command table. Messages with no
/// equivalent on this target (mode/LED/config) are dropped here.
fn translate(frame: &Frame) -> Option<ParsedCommand> {
    let payload = frame.payload();
    match frame.kind {
        msg::HELLO => Some(ParsedCommand::bare(cmd::HELLO)),
        msg::E_STOP => Some(ParsedCommand::bare(cmd::STOP)),
        msg::DRIVE_TWIST => {
            // v: i16 LE, w: i16 LE, ttl: u16 LE
            if payload.len() < 6 {
                return None;
            }
            let mut c = ParsedCommand::bare(cmd::SETPOINT);
            c.d1 = i16::from_le_bytes([payload[0], payload[1]]) as i32;
            c.d2 = i16::from_le_bytes([payload[2], payload[3]]) as i32;
            c.t = u16::from_le_bytes([payload[4], payload[5]]) as u32;
            Some(c)
        }
        msg::DRIVE_TANK => {
            // left: i16 LE, right: i16 LE
            if payload.len() < 4 {
                return None;
            }
            let mut c = ParsedCommand::bare(cmd::DIRECT_PWM);
            c.d1 = i16::from_le_bytes([payload[0], payload[1]]) as i32;
            c.d2 = i16::from_le_bytes([payload[2], payload[3]]) as i32;
            Some(c)
        }
        msg::SERVO => {
            let mut c = ParsedCommand::bare(cmd::SERVO);
            c.d1 = *payload.first()? as i32;
            Some(c)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encoder;
    use crate::protocol::messages::MAX_FRAME;

    fn push_all(intake: &mut Intake, bytes: &[u8]) -> Option<(ParsedCommand, Source)> {
        let mut out = None;
        for &b in bytes {
            if let Some(hit) = intake.push(b, 10) {
                out = Some(hit);
            }
        }
        out
    }

    #[test]
    fn text_frame_yields_text_command() {
        let mut intake = Intake::new();
        let (cmd, src) = push_all(&mut intake, b"{\"N\":201,\"H\":\"st\"}").unwrap();
        assert_eq!(cmd.n, 201);
        assert_eq!(src, Source::Text);
    }

    #[test]
    fn binary_twist_translates_to_setpoint() {
        let mut buf = [0u8; MAX_FRAME];
        let mut payload = [0u8; 6];
        payload[0..2].copy_from_slice(&100i16.to_le_bytes());
        payload[2..4].copy_from_slice(&(-40i16).to_le_bytes());
        payload[4..6].copy_from_slice(&250u16.to_le_bytes());
        let len = encoder::encode(msg::DRIVE_TWIST, 9, &payload, &mut buf);

        let mut intake = Intake::new();
        let (cmd, src) = push_all(&mut intake, &buf[..len]).unwrap();
        assert_eq!(cmd.n, super::cmd::SETPOINT);
        assert_eq!(cmd.d1, 100);
        assert_eq!(cmd.d2, -40);
        assert_eq!(cmd.t, 250);
        assert_eq!(src, Source::Binary { seq: 9 });
    }

    #[test]
    fn binary_estop_translates_to_stop() {
        let mut buf = [0u8; MAX_FRAME];
        let len = encoder::encode(msg::E_STOP, 3, &[], &mut buf);
        let mut intake = Intake::new();
        let (cmd, _) = push_all(&mut intake, &buf[..len]).unwrap();
        assert_eq!(cmd.n, super::cmd::STOP);
    }

    #[test]
    fn unmapped_binary_type_is_dropped() {
        let mut buf = [0u8; MAX_FRAME];
        let len = encoder::encode(msg::LED, 1, &[0xFF], &mut buf);
        let mut intake = Intake::new();
        assert!(push_all(&mut intake, &buf[..len]).is_none());
    }

    #[test]
    fn formats_interleave_cleanly() {
        let mut buf = [0u8; MAX_FRAME];
        let len = encoder::encode(msg::HELLO, 1, &[], &mut buf);

        let mut intake = Intake::new();
        // Binary frame first, then a text frame on the same stream.
        let (bin, _) = push_all(&mut intake, &buf[..len]).unwrap();
        assert_eq!(bin.n, super::cmd::HELLO);
        let (text, src) = push_all(&mut intake, b"{\"N\":5,\"D1\":45}").unwrap();
        assert_eq!(text.n, 5);
        assert_eq!(src, Source::Text);
    }

    #[test]
    fn short_twist_payload_rejected() {
        let mut buf = [0u8; MAX_FRAME];
        let len = encoder::encode(msg::DRIVE_TWIST, 2, &[1, 2, 3], &mut buf);
        let mut intake = Intake::new();
        assert!(push_all(&mut intake, &buf[..len]).is_none());
    }
}
