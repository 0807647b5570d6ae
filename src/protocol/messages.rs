// SPDX-License-Identifier: MIT

//! Wire constants and command records shared by both serial formats.
//!
//! The link carries two interleaved framings, told apart by their first
//! byte: 0xAA opens a CRC-checked binary frame, `{` opens a text frame.
//! Both decode into the same [`ParsedCommand`] record consumed by the
//! dispatcher.

use heapless::String;

/// Binary frame sync bytes.
pub const HEADER_0: u8 = 0xAA;
pub const HEADER_1: u8 = 0x55;

/// Payload ceiling for a binary frame.
pub const MAX_PAYLOAD: usize = 32;
/// LEN field covers TYPE + SEQ + payload.
pub const MAX_LEN: u8 = (2 + MAX_PAYLOAD) as u8;
/// Whole-frame ceiling: header(2) + len(1) + type + seq + payload + crc(2).
pub const MAX_FRAME: usize = 3 + 2 + MAX_PAYLOAD + 2;

/// Binary message types.
pub mod msg {
    // Host → robot
    pub const HELLO: u8 = 0x01;
    pub const SET_MODE: u8 = 0x02;
    pub const DRIVE_TWIST: u8 = 0x03;
    pub const DRIVE_TANK: u8 = 0x04;
    pub const SERVO: u8 = 0x05;
    pub const LED: u8 = 0x06;
    pub const E_STOP: u8 = 0x07;
    pub const CONFIG_SET: u8 = 0x08;

    // Robot → host
    pub const INFO: u8 = 0x81;
    pub const ACK: u8 = 0x82;
    pub const TELEMETRY: u8 = 0x83;
    pub const FAULT: u8 = 0x84;
}

/// Command numbers carried in the text protocol's `N` field.
pub mod cmd {
    pub const HELLO: i32 = 0;
    pub const SERVO: i32 = 5;
    pub const ULTRASONIC: i32 = 21;
    pub const LINE_SENSOR: i32 = 22;
    pub const BATTERY: i32 = 23;
    pub const LEGACY_STOP_A: i32 = 100;
    pub const LEGACY_STOP_B: i32 = 110;
    pub const DIAGNOSTICS: i32 = 120;
    pub const SELF_CHECK: i32 = 130;
    pub const DRIVE_CONFIG: i32 = 140;
    pub const SETPOINT: i32 = 200;
    pub const STOP: i32 = 201;
    pub const MACRO_START: i32 = 210;
    pub const MACRO_CANCEL: i32 = 211;
    pub const DIRECT_PWM: i32 = 999;
}

/// Longest `H` echo token the firmware keeps.
pub const HEADER_TOKEN_MAX: usize = 7;

/// One decoded command, produced once per well-formed frame and consumed
/// exactly once by the dispatcher.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedCommand {
    /// Command number; the only required field.
    pub n: i32,
    /// Short token echoed back in acknowledgements.
    pub h: String<HEADER_TOKEN_MAX>,
    pub d1: i32,
    pub d2: i32,
    pub d3: i32,
    pub d4: i32,
    /// Duration / time-to-live in milliseconds.
    pub t: u32,
}

impl ParsedCommand {
    /// Record with just a command number, everything else defaulted. Used
    /// when translating binary messages onto the dispatch table.
    pub fn bare(n: i32) -> Self {
        Self {
            n,
            ..Self::default()
        }
    }
}
