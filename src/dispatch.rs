// SPDX-License-Identifier: MIT

//! Command dispatcher and motion ownership.
//!
//! `Commander` is the one component that holds the motor handle. Everything
//! that wants to move the robot - streamed setpoints, macros, the boot
//! self-check, direct PWM - produces a [`DriveCommand`] and the commander
//! applies exactly the current owner's output, always through the drive
//! safety pipeline. Switching owner is therefore a state change, not a pin
//! write race: the losing component's output simply stops being consumed.
//!
//! The command table (the `N` numbers of the text protocol, plus binary
//! messages translated onto the same numbers):
//!
//! | N   | action                      | reply        |
//! |-----|-----------------------------|--------------|
//! | 0   | handshake                   | `{hello_ok}` |
//! | 5   | pan servo to D1 degrees     | `{H_ok}`     |
//! | 21  | ultrasonic query            | `{H_true}` / `{H_false}` / `{H_<cm>}` |
//! | 22  | line sensor raw (D1=L/M/R)  | `{H_<raw>}`  |
//! | 23  | battery millivolts          | `{H_<mV>}`   |
//! | 100/110 | legacy stop             | `{ok}`       |
//! | 120 | diagnostics                 | state block + stats line |
//! | 130 | rerun boot self-check       | `{H_ok}`     |
//! | 140 | drive config (D1 selector)  | `{H_ok}`     |
//! | 200 | setpoint (D1=v, D2=w, T=ttl)| none (fire-and-forget) |
//! | 201 | immediate stop              | `{H_ok}`     |
//! | 210 | start macro                 | `{H_ok}` / `{H_false}` |
//! | 211 | cancel macro                | `{H_ok}`     |
//! | 999 | direct PWM                  | `{H_ok}`     |
//! | other 1-199 | legacy passthrough  | `{H_ok}`     |

use core::fmt::Write as _;

use heapless::String;

use crate::config::{HARDWARE_PROFILE, OBSTACLE_THRESHOLD_CM, PWM_DEADBAND_LEFT,
    PWM_DEADBAND_RIGHT};
use crate::control::{
    clamp_pwm, DriveCommand, DriveSafetyLayer, MacroEngine, MacroId, MotionController,
    MotionOwner, SafetyGate,
};
use crate::boot::BootSequence;
use crate::hal::{ByteSink, MotorOutputs, PanServo, SensorSnapshot};
use crate::protocol::encoder::{self, SeqGen};
use crate::protocol::intake::{LinkStats, Source};
use crate::protocol::messages::{cmd, msg, ParsedCommand, MAX_FRAME};
use crate::protocol::response::ResponseWriter;

pub struct Commander<M: MotorOutputs> {
    motors: M,
    owner: MotionOwner,

    motion: MotionController,
    sequences: MacroEngine,
    safety: DriveSafetyLayer,
    gate: SafetyGate,
    boot: BootSequence,

    /// Last direct-PWM request, re-asserted each tick while owner is Direct.
    direct: DriveCommand,

    /// Owner tag at the last command, for diagnostics: I/M/A/D/B/X.
    last_owner_tag: char,
    reset_count: u8,
    seq: SeqGen,
}

impl<M: MotorOutputs> Commander<M> {
    pub fn new(motors: M) -> Self {
        Self {
            motors,
            owner: MotionOwner::Idle,
            motion: MotionController::new(),
            sequences: MacroEngine::new(),
            safety: DriveSafetyLayer::new(),
            gate: SafetyGate::new(),
            boot: BootSequence::new(),
            direct: DriveCommand::STOP,
            last_owner_tag: 'I',
            reset_count: 1,
            seq: SeqGen::new(),
        }
    }

    pub fn owner(&self) -> MotionOwner {
        self.owner
    }

    pub fn drive_safety(&mut self) -> &mut DriveSafetyLayer {
        &mut self.safety
    }

    pub fn boot_state(&self) -> &BootSequence {
        &self.boot
    }

    /// Kick off the boot self-check; it owns the motors until it finishes.
    pub fn start_boot(&mut self, now: u32) {
        self.owner = MotionOwner::Boot;
        self.last_owner_tag = 'B';
        self.boot.start(now);
    }

    /// One control-loop tick: run the owning component and put its output
    /// on the motors, shaped by the drive safety layer.
    pub fn control_tick<S: ByteSink>(
        &mut self,
        now: u32,
        sensors: &SensorSnapshot,
        servo: &mut impl PanServo,
        out: &mut ResponseWriter<S>,
    ) {
        if self.owner == MotionOwner::Boot {
            let tick = self.boot.update(now, sensors);
            if let Some(high) = tick.standby {
                if high {
                    self.motors.enable();
                } else {
                    self.motors.disable();
                }
            }
            if let Some(angle) = tick.servo_angle {
                servo.set_angle(angle);
            }
            if let Some(drive) = tick.drive {
                self.apply(drive);
            }
            if tick.completed {
                log::info!(
                    "self-check finished: {:?}, warn bits {:#04x}",
                    self.boot.state(),
                    self.boot.warn_bits()
                );
                out.send_line(self.boot.status_line(sensors.imu_present).as_str());
                self.motors.stop();
                self.safety.reset_slew();
                self.owner = MotionOwner::Idle;
            } else if !self.boot.is_running() {
                // Aborted out from under us.
                self.owner = MotionOwner::Idle;
            }
            return;
        }

        match self.owner {
            MotionOwner::Setpoint => match self.motion.update(now) {
                Some(drive) => self.apply(drive),
                None => {
                    // TTL lapsed; ramp down through the pipeline.
                    self.owner = MotionOwner::Idle;
                    self.apply(DriveCommand::STOP);
                }
            },
            MotionOwner::Macro => match self.sequences.update(now) {
                Some(drive) => self.apply(drive),
                None => {
                    self.owner = MotionOwner::Idle;
                    self.apply(DriveCommand::STOP);
                }
            },
            MotionOwner::Direct => {
                let drive = self.direct;
                self.apply(drive);
            }
            MotionOwner::Idle => {
                // Keep asserting stop so a lapsed owner decays to zero and
                // nothing else can quietly hold the pins.
                self.apply(DriveCommand::STOP);
            }
            MotionOwner::Boot => unreachable!("handled above"),
        }
    }

    /// Refresh battery-dependent limits from the slow sensor task.
    pub fn sensors_tick(&mut self, sensors: &SensorSnapshot) {
        self.safety.update_battery_state(sensors.battery_mv);
    }

    /// Route one parsed command.
    pub fn handle<S: ByteSink>(
        &mut self,
        command: &ParsedCommand,
        source: Source,
        now: u32,
        sensors: &SensorSnapshot,
        link: &LinkStats,
        servo: &mut impl PanServo,
        out: &mut ResponseWriter<S>,
    ) {
        let h = command.h.as_str();

        // Motion commands are rate limited; the stop command never is.
        let motion_command = command.n >= cmd::SETPOINT && command.n != cmd::STOP;
        if motion_command && !self.gate.check_rate_limit(now) {
            log::warn!("rate limit: N={} rejected", command.n);
            if command.n != cmd::SETPOINT {
                out.send_false(h);
            }
            return;
        }
        self.gate.record_command(now);

        match command.n {
            cmd::HELLO => out.send_hello(),

            cmd::SERVO => {
                let angle = command.d1.clamp(0, 180) as u8;
                servo.set_angle(angle);
                out.send_ok(h);
            }

            cmd::ULTRASONIC => match command.d1 {
                1 => {
                    let distance = sensors.ultrasonic_cm;
                    if distance > 0 && distance <= OBSTACLE_THRESHOLD_CM {
                        out.send_true(h);
                    } else {
                        out.send_false(h);
                    }
                }
                2 => out.send_value(h, sensors.ultrasonic_cm as u32),
                _ => out.send_ok(h),
            },

            cmd::LINE_SENSOR => {
                let index = command.d1.clamp(0, 2) as usize;
                out.send_value(h, sensors.line[index] as u32);
            }

            cmd::BATTERY => {
                if command.d1 == 1 {
                    // Raw-ADC diagnostic variant.
                    let pin_mv = (sensors.battery_raw as u32 * 3300) / 4095;
                    let mut line: String<96> = String::new();
                    let _ = write!(
                        line,
                        "{{{h}_adc:{},a3_mv:{},batt_mv:{}}}",
                        sensors.battery_raw, pin_mv, sensors.battery_mv
                    );
                    out.send_line(&line);
                } else {
                    out.send_value(h, sensors.battery_mv as u32);
                }
            }

            cmd::LEGACY_STOP_A | cmd::LEGACY_STOP_B => {
                self.stop_all();
                out.send_ok("");
            }

            cmd::DIAGNOSTICS => {
                self.send_diagnostics(now, sensors, link, out);
            }

            cmd::SELF_CHECK => {
                self.motion.stop();
                self.sequences.cancel();
                self.motors.stop();
                self.safety.reset_slew();
                self.owner = MotionOwner::Boot;
                self.last_owner_tag = 'B';
                self.boot.request_rerun(now);
                out.send_ok(h);
            }

            cmd::DRIVE_CONFIG => {
                self.apply_drive_config(command.d1, command.d2);
                out.send_ok(h);
            }

            cmd::SETPOINT => {
                // Fire-and-forget: no reply, the stream is the ack.
                if self.sequences.is_active() {
                    self.sequences.cancel();
                }
                if self.owner == MotionOwner::Boot {
                    self.boot.abort();
                }
                self.owner = MotionOwner::Setpoint;
                self.last_owner_tag = 'M';
                self.gate.enable_motors();
                self.motors.enable();
                let v = clamp_pwm(command.d1);
                let w = clamp_pwm(command.d2);
                let drive = self.motion.set_setpoint(v, w, command.t, now);
                self.apply(drive);
            }

            cmd::STOP => {
                self.last_owner_tag = 'X';
                self.stop_all();
                self.boot.abort();
                self.motors.disable();
                out.send_ok(h);
            }

            cmd::MACRO_START => {
                self.motion.stop();
                match MacroId::from_wire(command.d1) {
                    Some(id) => {
                        let intensity = command.d2.clamp(0, 255) as u8;
                        if self.sequences.start(id, intensity, command.t, now) {
                            self.owner = MotionOwner::Macro;
                            self.last_owner_tag = 'A';
                            self.gate.enable_motors();
                            self.motors.enable();
                            out.send_ok(h);
                        } else {
                            out.send_false(h);
                        }
                    }
                    None => out.send_false(h),
                }
            }

            cmd::MACRO_CANCEL => {
                self.sequences.cancel();
                if self.owner == MotionOwner::Macro {
                    self.owner = MotionOwner::Idle;
                }
                out.send_ok(h);
            }

            cmd::DIRECT_PWM => {
                self.motion.set_direct_mode();
                self.sequences.cancel();
                self.owner = MotionOwner::Direct;
                self.last_owner_tag = 'D';
                self.direct = DriveCommand::new(clamp_pwm(command.d1), clamp_pwm(command.d2));
                self.gate.enable_motors();
                self.motors.enable();
                let drive = self.direct;
                self.apply(drive);
                out.send_ok(h);
            }

            // Two legacy commands acknowledge only after their own timers in
            // the original runtime; keep them silent rather than lie.
            2 | 7 => {}

            n if (1..=199).contains(&n) => out.send_ok(h),

            _ => out.send_false(h),
        }

        if let Source::Binary { seq } = source {
            self.send_binary_ack(command.n, seq, out);
        }
    }

    /// Stop everything from a local trigger (mode button) without a serial
    /// reply.
    pub fn local_stop(&mut self) {
        self.last_owner_tag = 'X';
        self.stop_all();
        self.boot.abort();
        self.motors.disable();
    }

    /// The only place outside `apply` that touches the pins: an immediate
    /// zero, bypassing the ramp because the caller wants the robot stopped
    /// *now*. Slew state is reset so the next owner ramps from zero.
    fn stop_all(&mut self) {
        self.owner = MotionOwner::Idle;
        self.direct = DriveCommand::STOP;
        self.motion.stop();
        self.sequences.cancel();
        self.safety.reset_slew();
        self.motors.stop();
    }

    fn apply(&mut self, drive: DriveCommand) {
        let shaped = self.safety.apply_limits(drive);
        self.motors.set(shaped.left, shaped.right);
    }

    fn apply_drive_config(&mut self, selector: i32, value: i32) {
        match selector {
            1 => {
                // Deadbands packed into D2: high byte left, low byte right;
                // zero restores the default.
                let mut left = ((value >> 8) & 0xFF) as u8;
                let mut right = (value & 0xFF) as u8;
                if left == 0 {
                    left = PWM_DEADBAND_LEFT;
                }
                if right == 0 {
                    right = PWM_DEADBAND_RIGHT;
                }
                self.safety.set_deadbands(left, right);
            }
            2 => {
                if value == 0 {
                    self.safety.clear_accel_override();
                } else {
                    self.safety.set_accel_override(value.clamp(1, 50) as u8);
                }
            }
            3 => {
                if value == 0 {
                    self.safety.clear_decel_override();
                } else {
                    self.safety.set_decel_override(value.clamp(1, 50) as u8);
                }
            }
            4 => match value {
                0 => self.safety.set_kick_override(false),
                1 => self.safety.set_kick_override(true),
                _ => self.safety.clear_kick_override(),
            },
            5 => {
                if value == 0 {
                    self.safety.clear_max_pwm_override();
                } else {
                    self.safety.set_max_pwm_override(value.clamp(50, 255) as u8);
                }
            }
            _ => {}
        }
    }

    fn send_diagnostics<S: ByteSink>(
        &mut self,
        now: u32,
        sensors: &SensorSnapshot,
        link: &LinkStats,
        out: &mut ResponseWriter<S>,
    ) {
        let (db_l, db_r) = self.safety.deadbands();
        let mut line: String<160> = String::new();
        let _ = write!(
            line,
            "{{{}{},{},{},{},hw:{},imu:{},stby:{},batt:{},b:{},cap:{},db:{}/{},ramp:{}/{},kick:{},init:{}}}",
            self.last_owner_tag,
            self.direct.left,
            self.direct.right,
            motion_state_code(&self.motion),
            self.reset_count,
            HARDWARE_PROFILE,
            sensors.imu_present as u8,
            self.gate.should_enable_motors() as u8,
            sensors.battery_mv,
            self.safety.battery_state().as_u8(),
            self.safety.effective_max_pwm(),
            db_l,
            db_r,
            self.safety.effective_accel_step(),
            self.safety.effective_decel_step(),
            self.safety.kick_enabled() as u8,
            self.boot.state().as_u8(),
        );
        out.send_line(&line);

        let ms_ago = if link.last_cmd_ms > 0 {
            now.wrapping_sub(link.last_cmd_ms)
        } else {
            0
        };
        let mut stats: String<96> = String::new();
        let _ = write!(
            stats,
            "{{stats:rx={},jd={},pe={},crc={},tx={},ms={}}}",
            link.rx_overflow,
            link.dropped_long,
            link.parse_errors,
            link.crc_failures,
            out.dropped(),
            ms_ago
        );
        out.send_line(&stats);
    }

    fn send_binary_ack<S: ByteSink>(&mut self, n: i32, seq: u8, out: &mut ResponseWriter<S>) {
        let payload = [(n & 0xFF) as u8, 0u8];
        let mut frame = [0u8; MAX_FRAME];
        let len = encoder::encode(msg::ACK, seq, &payload, &mut frame);
        if len > 0 {
            out.send_frame(&frame[..len]);
        }
        // Keep our own sequence stream advancing past echoes.
        let _ = self.seq.next();
    }
}

fn motion_state_code(motion: &MotionController) -> u8 {
    match motion.state() {
        crate::control::MotionState::Idle => 0,
        crate::control::MotionState::Setpoint => 1,
        crate::control::MotionState::Direct => 3,
    }
}
