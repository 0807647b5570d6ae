// SPDX-License-Identifier: MIT

//! Boot self-check.
//!
//! Non-blocking hardware validation run once at power-up: settle the motor
//! driver standby line, center the pan servo, sample every sensor once,
//! then pulse the drivetrain forward, reverse, and through both spin
//! directions. The pauses after the spins sample the IMU so a grossly dead
//! gyro is caught without wheel encoders. Each `update` call advances at
//! most one step, timed against the step's start; the whole sequence lands
//! around 1.7 seconds and every motor pulse goes through the drive safety
//! limiter like any other motion.
//!
//! The sequence never touches hardware itself: it emits a [`BootOutput`]
//! and the dispatcher, as the motor owner during boot, applies it.

use core::fmt::Write as _;

use heapless::String;

use crate::config::{
    BATT_THRESH_LOW_MV, BATT_THRESH_OK_MV, BOOT_MIN_YAW_DELTA_DECIDEG, BOOT_MOTOR_PWM,
    BOOT_MOTOR_PWM_LOW_BATT, BOOT_STEP_MOTOR_MS, BOOT_STEP_PAUSE_MS, BOOT_STEP_SENSOR_MS,
    BOOT_STEP_SERVO_MS, BOOT_STEP_SPIN_MS, BOOT_STEP_STBY_MS, SERVO_ANGLE_CENTER,
    ULTRASONIC_MAX_CM,
};
use crate::control::DriveCommand;
use crate::hal::SensorSnapshot;

/// Overall sequence state, reported by diagnostics.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BootState {
    Pending,
    Running,
    Done,
    Warn,
}

impl BootState {
    pub fn as_u8(self) -> u8 {
        match self {
            BootState::Pending => 0,
            BootState::Running => 1,
            BootState::Done => 2,
            BootState::Warn => 3,
        }
    }
}

/// Warning bits accumulated while checking.
pub mod warn {
    pub const BATT_LOW: u8 = 0x01;
    pub const BATT_CRIT: u8 = 0x02;
    pub const IMU_MISSING: u8 = 0x04;
    pub const IMU_NO_MOTION: u8 = 0x08;
    pub const ULTRA_MISSING: u8 = 0x10;
    pub const SERVO_SKIP: u8 = 0x20;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Step {
    Idle,
    StbySetup,
    ServoCenter,
    SensorCheck,
    MotorFwd,
    Pause1,
    MotorRev,
    Pause2,
    SpinLeft,
    Pause3,
    SpinRight,
    Complete,
}

/// What the dispatcher should do with the hardware this tick.
#[derive(Clone, Debug, Default)]
pub struct BootOutput {
    /// Motor command, routed through the drive safety layer. `None` while
    /// the sequence is idle.
    pub drive: Option<DriveCommand>,
    /// Standby line request, when the step wants it changed.
    pub standby: Option<bool>,
    /// Servo angle request.
    pub servo_angle: Option<u8>,
    /// Set on the tick the sequence finishes; the caller stops the motors,
    /// resets slew state, and prints the status line.
    pub completed: bool,
}

pub struct BootSequence {
    state: BootState,
    step: Step,
    warn_bits: u8,
    step_start: u32,

    yaw_before_spin: i16,
    yaw_after_spin_left: i16,
    yaw_delta: i16,

    battery_mv: u16,
    ultrasonic_cm: u16,

    // One-shot latches within steps.
    stby_toggled: bool,
    servo_centered: bool,
    sensors_read: bool,
    baseline_sampled: bool,
    after_left_sampled: bool,
}

impl BootSequence {
    pub fn new() -> Self {
        Self {
            state: BootState::Pending,
            step: Step::Idle,
            warn_bits: 0,
            step_start: 0,
            yaw_before_spin: 0,
            yaw_after_spin_left: 0,
            yaw_delta: 0,
            battery_mv: 0,
            ultrasonic_cm: 0,
            stby_toggled: false,
            servo_centered: false,
            sensors_read: false,
            baseline_sampled: false,
            after_left_sampled: false,
        }
    }

    pub fn state(&self) -> BootState {
        self.state
    }

    pub fn warn_bits(&self) -> u8 {
        self.warn_bits
    }

    /// Observed yaw change across the spin test, tenths of a degree.
    pub fn yaw_delta(&self) -> i16 {
        self.yaw_delta
    }

    /// Readings captured during the sensor-check step.
    pub fn sensor_readings(&self) -> (u16, u16) {
        (self.battery_mv, self.ultrasonic_cm)
    }

    pub fn is_running(&self) -> bool {
        self.step != Step::Idle
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, BootState::Done | BootState::Warn)
    }

    /// Begin the sequence. No-op if already running.
    pub fn start(&mut self, now: u32) {
        if self.state == BootState::Running {
            return;
        }
        *self = Self::new();
        self.state = BootState::Running;
        self.enter(Step::StbySetup, now);
    }

    /// Restart from scratch (the self-check command).
    pub fn request_rerun(&mut self, now: u32) {
        *self = Self::new();
        self.state = BootState::Running;
        self.enter(Step::StbySetup, now);
    }

    /// Cancel a run in progress. A completed sequence keeps its state and
    /// warnings.
    pub fn abort(&mut self) {
        self.step = Step::Idle;
        if self.state == BootState::Running {
            self.state = BootState::Pending;
        }
    }

    /// Advance the state machine by at most one step.
    pub fn update(&mut self, now: u32, sensors: &SensorSnapshot) -> BootOutput {
        let mut out = BootOutput::default();
        if self.step == Step::Idle {
            return out;
        }

        let elapsed = now.wrapping_sub(self.step_start);

        match self.step {
            Step::Idle => {}
            Step::StbySetup => {
                // Cycle standby low then high so the driver starts clean.
                if !self.stby_toggled && elapsed < 10 {
                    out.standby = Some(false);
                } else if !self.stby_toggled {
                    out.standby = Some(true);
                    self.stby_toggled = true;
                }
                if elapsed >= BOOT_STEP_STBY_MS {
                    self.enter(Step::ServoCenter, now);
                }
            }
            Step::ServoCenter => {
                if !self.servo_centered {
                    if self.warn_bits & warn::BATT_CRIT == 0 {
                        out.servo_angle = Some(SERVO_ANGLE_CENTER);
                    } else {
                        // Save what little charge is left.
                        self.warn_bits |= warn::SERVO_SKIP;
                    }
                    self.servo_centered = true;
                }
                if elapsed >= BOOT_STEP_SERVO_MS {
                    self.enter(Step::SensorCheck, now);
                }
            }
            Step::SensorCheck => {
                if !self.sensors_read {
                    self.sample_sensors(sensors);
                    self.sensors_read = true;
                }
                if elapsed >= BOOT_STEP_SENSOR_MS {
                    self.enter(Step::MotorFwd, now);
                }
            }
            Step::MotorFwd => {
                let pwm = self.pulse_pwm();
                out.drive = Some(DriveCommand::new(pwm, pwm));
                if elapsed >= BOOT_STEP_MOTOR_MS {
                    self.enter(Step::Pause1, now);
                }
            }
            Step::Pause1 => {
                out.drive = Some(DriveCommand::STOP);
                if !self.baseline_sampled && sensors.imu_present {
                    self.yaw_before_spin = sensors.yaw_decideg;
                    self.baseline_sampled = true;
                }
                if elapsed >= BOOT_STEP_PAUSE_MS {
                    self.enter(Step::MotorRev, now);
                }
            }
            Step::MotorRev => {
                let pwm = self.pulse_pwm();
                out.drive = Some(DriveCommand::new(-pwm, -pwm));
                if elapsed >= BOOT_STEP_MOTOR_MS {
                    self.enter(Step::Pause2, now);
                }
            }
            Step::Pause2 => {
                out.drive = Some(DriveCommand::STOP);
                if elapsed >= BOOT_STEP_PAUSE_MS {
                    // A critical battery cannot be asked to spin.
                    if self.warn_bits & warn::BATT_CRIT != 0 {
                        self.enter(Step::Complete, now);
                    } else {
                        self.enter(Step::SpinLeft, now);
                    }
                }
            }
            Step::SpinLeft => {
                let pwm = self.pulse_pwm();
                out.drive = Some(DriveCommand::new(-pwm, pwm));
                if elapsed >= BOOT_STEP_SPIN_MS {
                    self.enter(Step::Pause3, now);
                }
            }
            Step::Pause3 => {
                out.drive = Some(DriveCommand::STOP);
                if !self.after_left_sampled && sensors.imu_present {
                    self.yaw_after_spin_left = sensors.yaw_decideg;
                    self.after_left_sampled = true;
                }
                if elapsed >= BOOT_STEP_PAUSE_MS {
                    self.enter(Step::SpinRight, now);
                }
            }
            Step::SpinRight => {
                let pwm = self.pulse_pwm();
                out.drive = Some(DriveCommand::new(pwm, -pwm));
                if elapsed >= BOOT_STEP_SPIN_MS {
                    self.enter(Step::Complete, now);
                }
            }
            Step::Complete => {
                self.finish(sensors);
                out.drive = Some(DriveCommand::STOP);
                out.completed = true;
                self.step = Step::Idle;
            }
        }

        out
    }

    /// Compact completion line, e.g.
    /// `INIT:done batt=7520 imu=1 yaw=18`.
    pub fn status_line(&self, imu_present: bool) -> String<96> {
        let mut line = String::new();
        let verdict = if self.state == BootState::Done {
            "done"
        } else {
            "warn"
        };
        let _ = write!(
            line,
            "INIT:{verdict} batt={} imu={} yaw={}",
            self.battery_mv,
            imu_present as u8,
            self.yaw_delta / 10
        );
        if self.warn_bits & warn::BATT_LOW != 0 {
            let _ = line.push_str(" !batt");
        }
        if self.warn_bits & warn::BATT_CRIT != 0 {
            let _ = line.push_str(" !batt_crit");
        }
        if self.warn_bits & warn::IMU_MISSING != 0 {
            let _ = line.push_str(" !imu");
        }
        if self.warn_bits & warn::IMU_NO_MOTION != 0 {
            let _ = line.push_str(" !imu_motion");
        }
        if self.warn_bits & warn::ULTRA_MISSING != 0 {
            let _ = line.push_str(" !ultra");
        }
        if self.warn_bits & warn::SERVO_SKIP != 0 {
            let _ = line.push_str(" !servo");
        }
        line
    }

    fn enter(&mut self, step: Step, now: u32) {
        self.step = step;
        self.step_start = now;
    }

    fn sample_sensors(&mut self, sensors: &SensorSnapshot) {
        self.battery_mv = sensors.battery_mv;
        if self.battery_mv < BATT_THRESH_LOW_MV {
            self.warn_bits |= warn::BATT_CRIT;
        } else if self.battery_mv < BATT_THRESH_OK_MV {
            self.warn_bits |= warn::BATT_LOW;
        }

        self.ultrasonic_cm = sensors.ultrasonic_cm;
        if self.ultrasonic_cm == 0 || self.ultrasonic_cm > ULTRASONIC_MAX_CM {
            self.warn_bits |= warn::ULTRA_MISSING;
        }

        if !sensors.imu_present {
            self.warn_bits |= warn::IMU_MISSING;
        }
    }

    fn finish(&mut self, sensors: &SensorSnapshot) {
        if sensors.imu_present && self.baseline_sampled && self.after_left_sampled {
            self.yaw_delta = self.yaw_after_spin_left.wrapping_sub(self.yaw_before_spin);
            if self.yaw_delta.abs() < BOOT_MIN_YAW_DELTA_DECIDEG {
                self.warn_bits |= warn::IMU_NO_MOTION;
            }
        }
        self.state = if self.warn_bits == 0 {
            BootState::Done
        } else {
            BootState::Warn
        };
    }

    fn pulse_pwm(&self) -> i16 {
        if self.warn_bits & (warn::BATT_CRIT | warn::BATT_LOW) != 0 {
            BOOT_MOTOR_PWM_LOW_BATT as i16
        } else {
            BOOT_MOTOR_PWM as i16
        }
    }
}

impl Default for BootSequence {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: u32 = 20;

    fn healthy_sensors() -> SensorSnapshot {
        SensorSnapshot {
            battery_mv: 7800,
            ultrasonic_cm: 42,
            imu_present: true,
            yaw_decideg: 0,
            ..SensorSnapshot::default()
        }
    }

    /// Tick the sequence until it completes; returns every drive command in
    /// order and the completion time.
    fn run_sequence(
        boot: &mut BootSequence,
        sensors: &mut SensorSnapshot,
        yaw_during_spin: i16,
    ) -> (std::vec::Vec<DriveCommand>, u32) {
        let mut drives = std::vec::Vec::new();
        let mut now = 0;
        boot.start(now);
        while boot.is_running() {
            // Crude gyro model: spinning left moves the heading.
            if matches!(boot.step, Step::SpinLeft) {
                sensors.yaw_decideg = yaw_during_spin;
            }
            let out = boot.update(now, sensors);
            if let Some(cmd) = out.drive {
                drives.push(cmd);
            }
            now += TICK;
            assert!(now < 10_000, "sequence failed to terminate");
        }
        (drives, now)
    }

    #[test]
    fn healthy_run_completes_clean() {
        let mut boot = BootSequence::new();
        let mut sensors = healthy_sensors();
        let (drives, finished) = run_sequence(&mut boot, &mut sensors, 450);

        assert_eq!(boot.state(), BootState::Done);
        assert_eq!(boot.warn_bits(), 0);
        // Roughly the documented 1.7 s.
        assert!((1_200..2_500).contains(&finished));

        let pwm = BOOT_MOTOR_PWM as i16;
        // Forward, reverse, and both spin polarities all appeared.
        assert!(drives.contains(&DriveCommand::new(pwm, pwm)));
        assert!(drives.contains(&DriveCommand::new(-pwm, -pwm)));
        assert!(drives.contains(&DriveCommand::new(-pwm, pwm)));
        assert!(drives.contains(&DriveCommand::new(pwm, -pwm)));
        // And it ends stopped.
        assert_eq!(drives.last(), Some(&DriveCommand::STOP));
    }

    #[test]
    fn critical_battery_skips_spins_and_derates_pulses() {
        let mut boot = BootSequence::new();
        let mut sensors = healthy_sensors();
        sensors.battery_mv = 6_500;
        let (drives, _) = run_sequence(&mut boot, &mut sensors, 450);

        assert_ne!(boot.warn_bits() & warn::BATT_CRIT, 0);
        let pwm = BOOT_MOTOR_PWM_LOW_BATT as i16;
        assert!(drives.contains(&DriveCommand::new(pwm, pwm)));
        // No spin commands at critical battery.
        assert!(!drives.contains(&DriveCommand::new(-pwm, pwm)));
        assert!(!drives.contains(&DriveCommand::new(pwm, -pwm)));
        assert_eq!(boot.state(), BootState::Warn);
    }

    #[test]
    fn missing_sensors_set_warn_bits() {
        let mut boot = BootSequence::new();
        let mut sensors = SensorSnapshot {
            battery_mv: 7_200, // low but not critical
            ultrasonic_cm: 0,  // no echo
            imu_present: false,
            ..SensorSnapshot::default()
        };
        run_sequence(&mut boot, &mut sensors, 0);

        let bits = boot.warn_bits();
        assert_ne!(bits & warn::BATT_LOW, 0);
        assert_ne!(bits & warn::ULTRA_MISSING, 0);
        assert_ne!(bits & warn::IMU_MISSING, 0);
        assert_eq!(boot.state(), BootState::Warn);
    }

    #[test]
    fn stationary_gyro_flags_no_motion() {
        let mut boot = BootSequence::new();
        let mut sensors = healthy_sensors();
        // Yaw never moves during the spins.
        run_sequence(&mut boot, &mut sensors, 0);
        assert_ne!(boot.warn_bits() & warn::IMU_NO_MOTION, 0);
    }

    #[test]
    fn moving_gyro_passes_motion_check() {
        let mut boot = BootSequence::new();
        let mut sensors = healthy_sensors();
        run_sequence(&mut boot, &mut sensors, 450);
        assert_eq!(boot.warn_bits() & warn::IMU_NO_MOTION, 0);
        assert_eq!(boot.yaw_delta(), 450);
    }

    #[test]
    fn servo_centered_early_unless_battery_critical() {
        let mut boot = BootSequence::new();
        let sensors = healthy_sensors();
        boot.start(0);
        // Walk into the servo step.
        let mut saw_servo = false;
        for t in (0..600).step_by(10) {
            if boot.update(t, &sensors).servo_angle == Some(SERVO_ANGLE_CENTER) {
                saw_servo = true;
            }
        }
        assert!(saw_servo);
    }

    #[test]
    fn abort_while_running_returns_to_pending() {
        let mut boot = BootSequence::new();
        let sensors = healthy_sensors();
        boot.start(0);
        boot.update(0, &sensors);
        boot.abort();
        assert!(!boot.is_running());
        assert_eq!(boot.state(), BootState::Pending);
    }

    #[test]
    fn abort_after_completion_preserves_result() {
        let mut boot = BootSequence::new();
        let mut sensors = healthy_sensors();
        run_sequence(&mut boot, &mut sensors, 450);
        let state = boot.state();
        let bits = boot.warn_bits();

        boot.abort();
        assert_eq!(boot.state(), state);
        assert_eq!(boot.warn_bits(), bits);
    }

    #[test]
    fn rerun_restarts_from_scratch() {
        let mut boot = BootSequence::new();
        let mut sensors = healthy_sensors();
        run_sequence(&mut boot, &mut sensors, 450);
        assert!(boot.is_done());

        boot.request_rerun(5_000);
        assert!(boot.is_running());
        assert_eq!(boot.state(), BootState::Running);
        assert_eq!(boot.warn_bits(), 0);
    }

    #[test]
    fn status_line_reflects_outcome() {
        let mut boot = BootSequence::new();
        let mut sensors = healthy_sensors();
        run_sequence(&mut boot, &mut sensors, 450);
        let line = boot.status_line(true);
        assert!(line.starts_with("INIT:done batt=7800 imu=1 yaw=45"));

        let mut boot = BootSequence::new();
        let mut sensors = healthy_sensors();
        sensors.imu_present = false;
        run_sequence(&mut boot, &mut sensors, 0);
        let line = boot.status_line(false);
        assert!(line.starts_with("INIT:warn"));
        assert!(line.contains("!imu"));
    }
}
