// SPDX-License-Identifier: MIT

//! Drive safety layer: battery-aware PWM shaping.
//!
//! Every PWM pair headed for the motor driver passes through this pipeline,
//! in fixed order:
//!
//! 1. **cap** - clamp magnitude to a battery-state ceiling (or an operator
//!    override),
//! 2. **slew** - bound per-tick change with independent accel/decel steps;
//!    reversals always take the decel step,
//! 3. **kickstart** - on a standstill-to-moving transition, hold the output
//!    at deadband+boost for a few ticks to break static friction,
//! 4. **deadband** - lift small non-zero magnitudes up to the wheel's
//!    deadband; zero stays zero.
//!
//! Battery state comes from pack voltage against two thresholds; each
//! threshold gates its own transition, so recovering from `Crit` requires
//! re-crossing the `Crit` threshold, not the `Low` one.

use crate::config::{
    BATT_THRESH_LOW_MV, BATT_THRESH_OK_MV, KICKSTART_BOOST, KICKSTART_DURATION_TICKS,
    PWM_CAP_CRIT, PWM_CAP_LOW, PWM_CAP_OK, PWM_DEADBAND_LEFT, PWM_DEADBAND_RIGHT,
    RAMP_ACCEL_STEP_CRIT, RAMP_ACCEL_STEP_LOW, RAMP_ACCEL_STEP_OK, RAMP_DECEL_STEP_CRIT,
    RAMP_DECEL_STEP_LOW, RAMP_DECEL_STEP_OK,
};
use crate::control::DriveCommand;

/// Battery classification from pack voltage.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BatteryState {
    Ok,
    Low,
    Crit,
}

impl BatteryState {
    pub fn as_u8(self) -> u8 {
        match self {
            BatteryState::Ok => 0,
            BatteryState::Low => 1,
            BatteryState::Crit => 2,
        }
    }
}

pub struct DriveSafetyLayer {
    battery: BatteryState,

    deadband_left: u8,
    deadband_right: u8,

    // Post-pipeline outputs from the previous tick, the slew reference.
    current_left: i16,
    current_right: i16,

    // Kickstart bookkeeping; 0 means no kick in flight.
    kick_left_end: u8,
    kick_right_end: u8,
    tick: u8,

    // Operator overrides; 0 / None means "use the battery-based default".
    accel_override: u8,
    decel_override: u8,
    max_pwm_override: u8,
    kick_override: Option<bool>,
}

impl DriveSafetyLayer {
    pub fn new() -> Self {
        Self {
            battery: BatteryState::Ok,
            deadband_left: PWM_DEADBAND_LEFT,
            deadband_right: PWM_DEADBAND_RIGHT,
            current_left: 0,
            current_right: 0,
            kick_left_end: 0,
            kick_right_end: 0,
            tick: 0,
            accel_override: 0,
            decel_override: 0,
            max_pwm_override: 0,
            kick_override: None,
        }
    }

    /// Classify pack voltage. Fed from the slow sensor task.
    pub fn update_battery_state(&mut self, voltage_mv: u16) {
        self.battery = if voltage_mv >= BATT_THRESH_OK_MV {
            BatteryState::Ok
        } else if voltage_mv >= BATT_THRESH_LOW_MV {
            BatteryState::Low
        } else {
            BatteryState::Crit
        };
    }

    pub fn battery_state(&self) -> BatteryState {
        self.battery
    }

    /// Run one PWM pair through the full pipeline. Call at the control
    /// cadence; the tick counter drives kickstart timing.
    pub fn apply_limits(&mut self, target: DriveCommand) -> DriveCommand {
        self.tick = self.tick.wrapping_add(1);

        let accel = self.effective_accel_step();
        let decel = self.effective_decel_step();
        let cap = self.effective_max_pwm();

        let target_l = apply_cap(target.left, cap);
        let target_r = apply_cap(target.right, cap);

        // Slew references are last tick's outputs, saved before we overwrite
        // them; kickstart triggers off the same values.
        let prev_l = self.current_left;
        let prev_r = self.current_right;

        let mut limited_l = apply_slew(prev_l, target_l, accel, decel);
        let mut limited_r = apply_slew(prev_r, target_r, accel, decel);

        if self.kick_enabled() {
            limited_l = self.apply_kickstart(limited_l, prev_l, self.deadband_left, Side::Left);
            limited_r = self.apply_kickstart(limited_r, prev_r, self.deadband_right, Side::Right);
        }

        limited_l = apply_deadband(limited_l, self.deadband_left);
        limited_r = apply_deadband(limited_r, self.deadband_right);

        self.current_left = limited_l;
        self.current_right = limited_r;

        DriveCommand {
            left: limited_l,
            right: limited_r,
        }
    }

    /// Forget the tracked outputs and kick timers. Call whenever control of
    /// the motors is (re)acquired after an out-of-band stop, so the slew
    /// limiter does not chase a stale value.
    pub fn reset_slew(&mut self) {
        self.current_left = 0;
        self.current_right = 0;
        self.kick_left_end = 0;
        self.kick_right_end = 0;
    }

    // ---- runtime configuration ----

    pub fn set_deadbands(&mut self, left: u8, right: u8) {
        self.deadband_left = left;
        self.deadband_right = right;
    }

    pub fn set_accel_override(&mut self, step: u8) {
        self.accel_override = step;
    }

    pub fn clear_accel_override(&mut self) {
        self.accel_override = 0;
    }

    pub fn set_decel_override(&mut self, step: u8) {
        self.decel_override = step;
    }

    pub fn clear_decel_override(&mut self) {
        self.decel_override = 0;
    }

    pub fn set_max_pwm_override(&mut self, cap: u8) {
        self.max_pwm_override = cap;
    }

    pub fn clear_max_pwm_override(&mut self) {
        self.max_pwm_override = 0;
    }

    pub fn set_kick_override(&mut self, enabled: bool) {
        self.kick_override = Some(enabled);
    }

    pub fn clear_kick_override(&mut self) {
        self.kick_override = None;
    }

    // ---- diagnostics ----

    pub fn deadbands(&self) -> (u8, u8) {
        (self.deadband_left, self.deadband_right)
    }

    pub fn effective_accel_step(&self) -> u8 {
        if self.accel_override > 0 {
            return self.accel_override;
        }
        match self.battery {
            BatteryState::Ok => RAMP_ACCEL_STEP_OK,
            BatteryState::Low => RAMP_ACCEL_STEP_LOW,
            BatteryState::Crit => RAMP_ACCEL_STEP_CRIT,
        }
    }

    pub fn effective_decel_step(&self) -> u8 {
        if self.decel_override > 0 {
            return self.decel_override;
        }
        match self.battery {
            BatteryState::Ok => RAMP_DECEL_STEP_OK,
            BatteryState::Low => RAMP_DECEL_STEP_LOW,
            BatteryState::Crit => RAMP_DECEL_STEP_CRIT,
        }
    }

    pub fn effective_max_pwm(&self) -> u8 {
        if self.max_pwm_override > 0 {
            return self.max_pwm_override;
        }
        match self.battery {
            BatteryState::Ok => PWM_CAP_OK,
            BatteryState::Low => PWM_CAP_LOW,
            BatteryState::Crit => PWM_CAP_CRIT,
        }
    }

    pub fn kick_enabled(&self) -> bool {
        match self.kick_override {
            Some(enabled) => enabled,
            // Default: only with a healthy battery.
            None => self.battery == BatteryState::Ok,
        }
    }

    /// Last shaped outputs, for diagnostics.
    pub fn limited(&self) -> (i16, i16) {
        (self.current_left, self.current_right)
    }

    fn apply_kickstart(&mut self, pwm: i16, prev: i16, deadband: u8, side: Side) -> i16 {
        let end_tick = match side {
            Side::Left => &mut self.kick_left_end,
            Side::Right => &mut self.kick_right_end,
        };

        let kick_pwm = deadband as i16 + KICKSTART_BOOST as i16;

        if *end_tick != 0 {
            let elapsed = self
                .tick
                .wrapping_sub(*end_tick)
                .wrapping_add(KICKSTART_DURATION_TICKS);
            if elapsed >= KICKSTART_DURATION_TICKS {
                *end_tick = 0;
            } else if pwm != 0 && pwm.abs() < kick_pwm {
                return if pwm > 0 { kick_pwm } else { -kick_pwm };
            }
        }

        // Standstill to moving: start a new kick.
        if prev == 0 && pwm != 0 && *end_tick == 0 {
            *end_tick = self.tick.wrapping_add(KICKSTART_DURATION_TICKS);
            if pwm.abs() < kick_pwm {
                return if pwm > 0 { kick_pwm } else { -kick_pwm };
            }
        }

        pwm
    }
}

impl Default for DriveSafetyLayer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Copy, Clone)]
enum Side {
    Left,
    Right,
}

fn apply_cap(pwm: i16, cap: u8) -> i16 {
    pwm.clamp(-(cap as i16), cap as i16)
}

fn apply_slew(current: i16, target: i16, accel_step: u8, decel_step: u8) -> i16 {
    let diff = target - current;
    if diff == 0 {
        return target;
    }

    // Classify the change. Anything that is not a same-sign magnitude
    // increase from a moving wheel counts as deceleration; reversals never
    // get the faster accel step.
    let accelerating = if target == 0 {
        false
    } else if current == 0 {
        true
    } else if (current > 0) == (target > 0) {
        target.abs() > current.abs()
    } else {
        false
    };

    let max_step = if accelerating { accel_step } else { decel_step } as i16;

    if diff.abs() <= max_step {
        target
    } else if diff > 0 {
        current + max_step
    } else {
        current - max_step
    }
}

fn apply_deadband(pwm: i16, deadband: u8) -> i16 {
    if pwm == 0 {
        return 0;
    }
    let deadband = deadband as i16;
    if pwm.abs() < deadband {
        if pwm > 0 {
            deadband
        } else {
            -deadband
        }
    } else {
        pwm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A layer with deadband and kickstart out of the way, so slew behavior
    /// is observable in isolation.
    fn plain_layer() -> DriveSafetyLayer {
        let mut layer = DriveSafetyLayer::new();
        layer.set_deadbands(0, 0);
        layer.set_kick_override(false);
        layer
    }

    fn cmd(left: i16, right: i16) -> DriveCommand {
        DriveCommand { left, right }
    }

    #[test]
    fn slew_bounds_acceleration() {
        let mut layer = plain_layer();
        layer.set_accel_override(5);

        let mut cycles = 0;
        loop {
            let out = layer.apply_limits(cmd(200, 0));
            cycles += 1;
            if out.left == 200 {
                break;
            }
            assert!(cycles < 100, "never reached target");
        }
        // 200 / 5 = 40 cycles minimum.
        assert!(cycles >= 40, "reached 200 in only {cycles} cycles");
    }

    #[test]
    fn decel_step_is_independent() {
        let mut layer = plain_layer();
        layer.set_accel_override(5);
        layer.set_decel_override(50);

        while layer.apply_limits(cmd(200, 0)).left != 200 {}

        // Deceleration uses its own, faster step.
        let out = layer.apply_limits(cmd(0, 0));
        assert_eq!(out.left, 150);
        let out = layer.apply_limits(cmd(0, 0));
        assert_eq!(out.left, 100);
    }

    #[test]
    fn reversal_takes_decel_step() {
        let mut layer = plain_layer();
        layer.set_accel_override(50);
        layer.set_decel_override(10);

        while layer.apply_limits(cmd(100, 0)).left != 100 {}

        // Sign flip: conservative decel step, not the faster accel one.
        let out = layer.apply_limits(cmd(-100, 0));
        assert_eq!(out.left, 90);
    }

    #[test]
    fn deadband_lifts_small_magnitudes() {
        let mut layer = DriveSafetyLayer::new();
        layer.set_kick_override(false);
        layer.set_deadbands(55, 40);

        let out = layer.apply_limits(cmd(10, -10));
        assert_eq!(out.left, 55);
        assert_eq!(out.right, -40);
    }

    #[test]
    fn zero_stays_zero_regardless_of_deadband() {
        let mut layer = DriveSafetyLayer::new();
        layer.set_deadbands(55, 55);
        let out = layer.apply_limits(cmd(0, 0));
        assert_eq!(out, DriveCommand::STOP);
    }

    #[test]
    fn battery_state_caps_pwm() {
        let mut layer = plain_layer();
        layer.set_accel_override(255);
        layer.set_decel_override(255);

        layer.update_battery_state(7500);
        assert_eq!(layer.battery_state(), BatteryState::Ok);
        assert_eq!(layer.apply_limits(cmd(255, -255)), cmd(255, -255));

        layer.update_battery_state(7200);
        assert_eq!(layer.battery_state(), BatteryState::Low);
        assert_eq!(layer.apply_limits(cmd(255, -255)), cmd(180, -180));

        layer.update_battery_state(6500);
        assert_eq!(layer.battery_state(), BatteryState::Crit);
        assert_eq!(layer.apply_limits(cmd(255, -255)), cmd(100, -100));
    }

    #[test]
    fn battery_recovery_requires_recrossing_each_threshold() {
        let mut layer = DriveSafetyLayer::new();
        layer.update_battery_state(6500);
        assert_eq!(layer.battery_state(), BatteryState::Crit);
        // Crossing only the Crit threshold lands in Low, not Ok.
        layer.update_battery_state(7100);
        assert_eq!(layer.battery_state(), BatteryState::Low);
        layer.update_battery_state(7400);
        assert_eq!(layer.battery_state(), BatteryState::Ok);
    }

    #[test]
    fn operator_cap_override_wins() {
        let mut layer = plain_layer();
        layer.set_accel_override(255);
        layer.set_max_pwm_override(120);
        assert_eq!(layer.apply_limits(cmd(255, 255)), cmd(120, 120));

        layer.clear_max_pwm_override();
        assert_eq!(layer.apply_limits(cmd(255, 255)), cmd(255, 255));
    }

    #[test]
    fn kickstart_boosts_standstill_transition() {
        let mut layer = DriveSafetyLayer::new();
        layer.set_kick_override(true);
        layer.set_deadbands(55, 55);
        layer.set_accel_override(5);

        // First tick from standstill: deadband + boost instead of a slew
        // step that would otherwise only reach the deadband floor.
        let out = layer.apply_limits(cmd(200, 0));
        assert_eq!(out.left, 55 + 25);

        // Ramping continues from the boosted value.
        let out = layer.apply_limits(cmd(200, 0));
        assert_eq!(out.left, 85);

        // ...and relaxes to the commanded value.
        let mut last = 0;
        for _ in 0..40 {
            last = layer.apply_limits(cmd(200, 0)).left;
        }
        assert_eq!(last, 200);
    }

    #[test]
    fn no_kick_without_standstill_transition() {
        let mut layer = DriveSafetyLayer::new();
        layer.set_kick_override(false);
        layer.set_deadbands(55, 55);
        layer.set_accel_override(5);

        // Without the kick, the first tick only reaches the deadband floor.
        let out = layer.apply_limits(cmd(200, 0));
        assert_eq!(out.left, 55);
    }

    #[test]
    fn kickstart_defaults_follow_battery_state() {
        let mut layer = DriveSafetyLayer::new();
        layer.update_battery_state(7500);
        assert!(layer.kick_enabled());
        layer.update_battery_state(7100);
        assert!(!layer.kick_enabled());
        layer.set_kick_override(true);
        assert!(layer.kick_enabled());
    }

    #[test]
    fn reset_slew_forgets_tracked_output() {
        let mut layer = plain_layer();
        layer.set_accel_override(255);
        layer.apply_limits(cmd(200, 200));
        assert_eq!(layer.limited(), (200, 200));

        layer.reset_slew();
        assert_eq!(layer.limited(), (0, 0));

        // After reacquiring the motors, ramping starts from zero again.
        layer.set_accel_override(5);
        let out = layer.apply_limits(cmd(200, 200));
        assert_eq!(out.left, 5);
    }

    #[test]
    fn accel_override_clears_to_battery_default() {
        let mut layer = DriveSafetyLayer::new();
        layer.update_battery_state(7100);
        layer.set_accel_override(30);
        assert_eq!(layer.effective_accel_step(), 30);
        layer.clear_accel_override();
        assert_eq!(layer.effective_accel_step(), RAMP_ACCEL_STEP_LOW);
    }
}
