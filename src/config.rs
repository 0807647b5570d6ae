//! System-wide tuning constants.
//!
//! Everything that a field engineer might want to retune lives here: task
//! cadences, protocol limits, TTL windows, and the drive safety parameters.
//! Values are in PWM counts (0-255), milliseconds, or millivolts unless noted.

/// Serial link baud rate.
pub const SERIAL_BAUD: u32 = 115_200;

/// Identifies the board wiring this firmware was validated against.
/// Echoed in the boot status line and the diagnostics command.
pub const HARDWARE_PROFILE: &str = "f767-tb6612-v1";

// ---------------------------------------------------------------------------
// Task cadences
// ---------------------------------------------------------------------------

/// Control loop (motion + macros + boot check) period.
pub const CONTROL_LOOP_MS: u32 = 20; // 50 Hz
/// Slow sensor refresh period (ultrasonic, battery, line, IMU).
pub const SENSORS_SLOW_MS: u32 = 100; // 10 Hz
/// Protocol intake polling period.
pub const INTAKE_MS: u32 = 1;
/// Mode button polling period.
pub const BUTTON_MS: u32 = 10;

/// Intake byte budget per task call; keeps worst-case latency bounded.
pub const INTAKE_MAX_BYTES: usize = 48;
/// Intake wall-time budget per task call.
pub const INTAKE_MAX_MS: u32 = 5;
/// Watchdog is fed at least this often inside long byte loops.
pub const INTAKE_FEED_EVERY: usize = 8;

// ---------------------------------------------------------------------------
// Motion control
// ---------------------------------------------------------------------------

/// Setpoint TTL clamp window (ms). Streaming hosts refresh well inside this.
pub const SETPOINT_TTL_MIN_MS: u32 = 150;
pub const SETPOINT_TTL_MAX_MS: u32 = 10_000;

/// Macro TTL clamp window (ms).
pub const MACRO_TTL_MIN_MS: u32 = 1_000;
pub const MACRO_TTL_MAX_MS: u32 = 10_000;

/// Command-rate ceiling: commands per window before rejection.
pub const RATE_LIMIT_MAX_COMMANDS: usize = 50;
/// Rate limiter sliding window length (ms).
pub const RATE_LIMIT_WINDOW_MS: u32 = 1_000;

// ---------------------------------------------------------------------------
// Drive safety layer
// ---------------------------------------------------------------------------

/// Battery classification thresholds (pack millivolts, 2S Li-ion).
pub const BATT_THRESH_OK_MV: u16 = 7_400;
pub const BATT_THRESH_LOW_MV: u16 = 7_000;

/// Per-wheel PWM deadband defaults.
pub const PWM_DEADBAND_LEFT: u8 = 55;
pub const PWM_DEADBAND_RIGHT: u8 = 55;

/// Slew steps (PWM counts per 50 Hz tick) by battery state.
pub const RAMP_ACCEL_STEP_OK: u8 = 12;
pub const RAMP_DECEL_STEP_OK: u8 = 20;
pub const RAMP_ACCEL_STEP_LOW: u8 = 6;
pub const RAMP_DECEL_STEP_LOW: u8 = 15;
pub const RAMP_ACCEL_STEP_CRIT: u8 = 4;
pub const RAMP_DECEL_STEP_CRIT: u8 = 10;

/// PWM magnitude caps by battery state.
pub const PWM_CAP_OK: u8 = 255;
pub const PWM_CAP_LOW: u8 = 180;
pub const PWM_CAP_CRIT: u8 = 100;

/// Kickstart pulse: duration in control ticks, boost above deadband.
pub const KICKSTART_DURATION_TICKS: u8 = 4; // 80 ms at 50 Hz
pub const KICKSTART_BOOST: u8 = 25;

// ---------------------------------------------------------------------------
// Boot self-check
// ---------------------------------------------------------------------------

/// Step durations (ms). Whole sequence lands around 1.7 s.
pub const BOOT_STEP_STBY_MS: u32 = 20;
pub const BOOT_STEP_SERVO_MS: u32 = 350;
pub const BOOT_STEP_SENSOR_MS: u32 = 100;
pub const BOOT_STEP_MOTOR_MS: u32 = 150;
pub const BOOT_STEP_PAUSE_MS: u32 = 200;
pub const BOOT_STEP_SPIN_MS: u32 = 150;

/// Motor pulse strength during the self-check.
pub const BOOT_MOTOR_PWM: u8 = 120;
pub const BOOT_MOTOR_PWM_LOW_BATT: u8 = 80;

/// Minimum yaw change (tenths of a degree) the spin test must produce
/// before the IMU is believed to be seeing real motion.
pub const BOOT_MIN_YAW_DELTA_DECIDEG: i16 = 30;

// ---------------------------------------------------------------------------
// Sensors / misc
// ---------------------------------------------------------------------------

/// Ultrasonic distances outside (0, this] cm are treated as "no echo".
pub const ULTRASONIC_MAX_CM: u16 = 400;
/// Obstacle report threshold for the obstacle-query command (cm).
pub const OBSTACLE_THRESHOLD_CM: u16 = 20;

/// Pan servo center position (degrees).
pub const SERVO_ANGLE_CENTER: u8 = 90;

/// Mode button debounce settle time (ms).
pub const BUTTON_DEBOUNCE_MS: u32 = 50;

/// Hardware watchdog timeout (ms).
pub const WATCHDOG_TIMEOUT_MS: u32 = 4_000;
