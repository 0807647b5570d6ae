// SPDX-License-Identifier: MIT

//! Table-driven macro engine.
//!
//! Each macro id maps to a fixed list of `(v, w, duration)` steps that play
//! out one scheduler tick at a time; nothing here blocks. The intensity
//! argument scales the *first* step only, which gives a gentle or punchy
//! entry without rescaling the whole pattern. An overall TTL bounds the
//! macro regardless of its step table.
//!
//! `cancel` only drops the active flag. The engine never writes motor pins;
//! the dispatcher stops consuming its output the moment it goes inactive.

use micromath::F32Ext;

use crate::config::{MACRO_TTL_MAX_MS, MACRO_TTL_MIN_MS};
use crate::control::DriveCommand;

/// Preprogrammed motion patterns, by wire id.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MacroId {
    Figure8 = 1,
    Spin360 = 2,
    Wiggle = 3,
    ForwardThenStop = 4,
}

impl MacroId {
    pub fn from_wire(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Figure8),
            2 => Some(Self::Spin360),
            3 => Some(Self::Wiggle),
            4 => Some(Self::ForwardThenStop),
            _ => None,
        }
    }
}

#[derive(Copy, Clone)]
struct Step {
    v: i16,
    w: i16,
    duration_ms: u32,
}

const fn step(v: i16, w: i16, duration_ms: u32) -> Step {
    Step { v, w, duration_ms }
}

const FIGURE_8: &[Step] = &[
    step(150, 75, 2000),  // forward-right arc
    step(150, -75, 2000), // forward-left arc
    step(150, 75, 2000),
    step(150, -75, 2000),
    step(0, 0, 500),
];

const SPIN_360: &[Step] = &[
    step(0, 250, 1800), // spin in place
    step(0, 0, 500),
];

const WIGGLE: &[Step] = &[
    step(100, 150, 300),
    step(100, -150, 300),
    step(100, 150, 300),
    step(100, -150, 300),
    step(0, 0, 500),
];

const FORWARD_THEN_STOP: &[Step] = &[step(200, 0, 2000), step(0, 0, 500)];

fn steps_for(id: MacroId) -> &'static [Step] {
    match id {
        MacroId::Figure8 => FIGURE_8,
        MacroId::Spin360 => SPIN_360,
        MacroId::Wiggle => WIGGLE,
        MacroId::ForwardThenStop => FORWARD_THEN_STOP,
    }
}

pub struct MacroEngine {
    id: MacroId,
    step_index: usize,
    step_start: u32,
    step_duration: u32,
    target_v: i16,
    target_w: i16,
    active: bool,
    ttl_ms: u32,
    start: u32,
}

impl MacroEngine {
    pub fn new() -> Self {
        Self {
            id: MacroId::Figure8,
            step_index: 0,
            step_start: 0,
            step_duration: 0,
            target_v: 0,
            target_w: 0,
            active: false,
            ttl_ms: 0,
            start: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn current(&self) -> MacroId {
        self.id
    }

    /// Arm a macro. `intensity` (0-255) scales the first step; `ttl_ms`
    /// clamps to its configured window and bounds the whole run.
    pub fn start(&mut self, id: MacroId, intensity: u8, ttl_ms: u32, now: u32) -> bool {
        let steps = steps_for(id);
        let ttl = ttl_ms.clamp(MACRO_TTL_MIN_MS, MACRO_TTL_MAX_MS);

        self.id = id;
        self.step_index = 0;
        self.step_start = now;
        self.start = now;
        self.ttl_ms = ttl;

        let scale = intensity as f32 / 255.0;
        self.step_duration = steps[0].duration_ms;
        self.target_v = (steps[0].v as f32 * scale).round() as i16;
        self.target_w = (steps[0].w as f32 * scale).round() as i16;

        self.active = true;
        true
    }

    /// Drop the active flag. Motor pins are untouched; only the dispatcher
    /// writes hardware.
    pub fn cancel(&mut self) {
        self.active = false;
    }

    /// Advance the pattern and return the mixed PWM for this tick, or
    /// `None` once the macro has finished, expired, or been cancelled.
    pub fn update(&mut self, now: u32) -> Option<DriveCommand> {
        if !self.active {
            return None;
        }

        if now.wrapping_sub(self.start) >= self.ttl_ms {
            self.cancel();
            return None;
        }

        if now.wrapping_sub(self.step_start) >= self.step_duration {
            self.step_index += 1;
            self.step_start = now;

            let steps = steps_for(self.id);
            if self.step_index >= steps.len() {
                self.cancel();
                return None;
            }

            // Intensity applies once, at start; later steps run unscaled.
            let next = &steps[self.step_index];
            self.step_duration = next.duration_ms;
            self.target_v = next.v;
            self.target_w = next.w;
        }

        Some(DriveCommand::mix(self.target_v, self.target_w))
    }
}

impl Default for MacroEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: u32 = 20;

    /// Run the engine at the control cadence until it deactivates; returns
    /// the time of the last Some output.
    fn run_to_completion(engine: &mut MacroEngine, start: u32) -> u32 {
        let mut t = start;
        let mut last_active = start;
        while engine.is_active() {
            if engine.update(t).is_some() {
                last_active = t;
            }
            t += TICK;
            assert!(t < start + 60_000, "macro failed to terminate");
        }
        last_active
    }

    #[test]
    fn spin_macro_terminates_within_ttl() {
        let mut engine = MacroEngine::new();
        assert!(engine.start(MacroId::Spin360, 128, 1500, 0));
        let last = run_to_completion(&mut engine, 0);
        assert!(last <= 1500);
        assert!(!engine.is_active());
    }

    #[test]
    fn ttl_clamped_to_window() {
        let mut engine = MacroEngine::new();
        engine.start(MacroId::Figure8, 255, 50, 0);
        // Floor is 1000 ms: the macro must still be running at 900.
        assert!(engine.update(900).is_some());
        assert!(engine.update(1000).is_none());

        engine.start(MacroId::Figure8, 255, 60_000, 0);
        // Ceiling is 10 s.
        let last = run_to_completion(&mut engine, 0);
        assert!(last < 10_000);
    }

    #[test]
    fn intensity_scales_first_step_only() {
        let mut engine = MacroEngine::new();
        engine.start(MacroId::ForwardThenStop, 128, 5000, 0);

        // First step: v=200 scaled by 128/255 ≈ 100.
        let first = engine.update(TICK).unwrap();
        assert_eq!(first, DriveCommand::mix(100, 0));

        // Past the first step boundary: unscaled second step (0, 0).
        let second = engine.update(2000 + TICK).unwrap();
        assert_eq!(second, DriveCommand::STOP);
    }

    #[test]
    fn zero_intensity_first_step_is_stopped() {
        let mut engine = MacroEngine::new();
        engine.start(MacroId::Spin360, 0, 3000, 0);
        assert_eq!(engine.update(TICK).unwrap(), DriveCommand::STOP);
    }

    #[test]
    fn steps_advance_in_order() {
        let mut engine = MacroEngine::new();
        engine.start(MacroId::Wiggle, 255, 10_000, 0);

        assert_eq!(engine.update(100).unwrap(), DriveCommand::mix(100, 150));
        assert_eq!(engine.update(320).unwrap(), DriveCommand::mix(100, -150));
        assert_eq!(engine.update(640).unwrap(), DriveCommand::mix(100, 150));
    }

    #[test]
    fn cancel_only_flips_flag() {
        let mut engine = MacroEngine::new();
        engine.start(MacroId::Figure8, 255, 5000, 0);
        assert!(engine.update(TICK).is_some());
        engine.cancel();
        assert!(!engine.is_active());
        assert!(engine.update(2 * TICK).is_none());
    }

    #[test]
    fn invalid_wire_id_rejected() {
        assert!(MacroId::from_wire(0).is_none());
        assert!(MacroId::from_wire(5).is_none());
        assert_eq!(MacroId::from_wire(2), Some(MacroId::Spin360));
    }
}
