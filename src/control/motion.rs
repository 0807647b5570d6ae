// SPDX-License-Identifier: MIT

//! Setpoint/TTL motion controller.
//!
//! Holds a single `(v, w)` drive setpoint with a time-to-live. A host
//! streaming setpoints at a few hertz keeps motion continuous because a new
//! command received while the previous one is still live *extends* the TTL
//! window by the remaining time instead of restarting it; if the stream
//! dies, the setpoint expires and the robot stops within one TTL.
//!
//! The controller never writes motor pins. `update` returns the mixed PWM
//! pair while the setpoint is live and `None` once it expires or another
//! mode takes over; the dispatcher applies or ignores the output according
//! to the current motion owner.

use crate::config::{SETPOINT_TTL_MAX_MS, SETPOINT_TTL_MIN_MS};
use crate::control::{clamp_pwm, DriveCommand};

/// Controller states. The macro mode lives in the dispatcher's owner enum,
/// not here: macros bypass this controller entirely.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MotionState {
    Idle,
    Setpoint,
    /// Direct PWM control; `update` is inert so an external direct write is
    /// not fought.
    Direct,
}

#[derive(Copy, Clone, Debug, Default)]
struct Setpoint {
    v: i16,
    w: i16,
    ttl_ms: u32,
    timestamp: u32,
}

pub struct MotionController {
    state: MotionState,
    setpoint: Setpoint,
    output: DriveCommand,
}

impl MotionController {
    pub fn new() -> Self {
        Self {
            state: MotionState::Idle,
            setpoint: Setpoint::default(),
            output: DriveCommand::STOP,
        }
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == MotionState::Setpoint
    }

    /// Current setpoint, for diagnostics.
    pub fn setpoint(&self) -> (i16, i16) {
        (self.setpoint.v, self.setpoint.w)
    }

    /// Install a new setpoint and return the mixed PWM pair for immediate
    /// application.
    ///
    /// `v`/`w` clamp to [-255, 255], `ttl_ms` to its configured window. If a
    /// setpoint is already live, the un-elapsed remainder of its window is
    /// added to the new TTL. A clock that appears to run backwards
    /// (wraparound) is treated as an expired window.
    pub fn set_setpoint(&mut self, v: i16, w: i16, ttl_ms: u32, now: u32) -> DriveCommand {
        let v = clamp_pwm(v as i32);
        let w = clamp_pwm(w as i32);
        let mut ttl = ttl_ms.clamp(SETPOINT_TTL_MIN_MS, SETPOINT_TTL_MAX_MS);

        if self.state == MotionState::Setpoint && self.setpoint.timestamp > 0 {
            let elapsed = now.wrapping_sub(self.setpoint.timestamp);
            if now >= self.setpoint.timestamp && elapsed < self.setpoint.ttl_ms {
                // Still live: extend rather than reset.
                let remaining = self.setpoint.ttl_ms - elapsed;
                ttl += remaining;
            }
        }

        self.setpoint = Setpoint {
            v,
            w,
            ttl_ms: ttl,
            timestamp: now,
        };
        self.state = MotionState::Setpoint;
        self.output = DriveCommand::mix(v, w);
        self.output
    }

    /// Re-assert the mixed output while the setpoint is live; `None` in any
    /// other state or once the TTL has lapsed (the controller drops to
    /// `Idle` and the caller is responsible for the actual stop).
    pub fn update(&mut self, now: u32) -> Option<DriveCommand> {
        if self.state != MotionState::Setpoint {
            return None;
        }

        let expired =
            now < self.setpoint.timestamp || now - self.setpoint.timestamp >= self.setpoint.ttl_ms;
        if expired {
            self.stop();
            return None;
        }

        self.output = DriveCommand::mix(self.setpoint.v, self.setpoint.w);
        Some(self.output)
    }

    /// Return to `Idle` and zero the cached setpoint, whatever the state.
    pub fn stop(&mut self) {
        self.state = MotionState::Idle;
        self.setpoint = Setpoint::default();
        self.output = DriveCommand::STOP;
    }

    /// Hand the outputs to an external direct-PWM writer; `update` goes
    /// inert until `stop` or a new setpoint.
    pub fn set_direct_mode(&mut self) {
        self.state = MotionState::Direct;
    }
}

impl Default for MotionController {
    fn default() -> Self {
        Self::new()
    }
}
