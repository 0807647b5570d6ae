//! Interfaces between the firmware core and the hardware it drives.
//!
//! Every component takes one of these traits at its seam instead of reaching
//! for a global driver instance. The motor interface is deliberately narrow:
//! whoever holds the `MotorOutputs` value is the only code that can touch the
//! pins, which is what makes the single-writer ownership model structural
//! rather than a convention.

/// Two-channel signed PWM actuation plus the driver standby line.
///
/// `left`/`right` are in [-255, 255]; negative values reverse the wheel.
pub trait MotorOutputs {
    fn set(&mut self, left: i16, right: i16);

    /// Zero both PWM channels without touching standby.
    fn stop(&mut self);

    /// Raise standby; motors can run.
    fn enable(&mut self);

    /// Drop standby; driver outputs go high-impedance.
    fn disable(&mut self);
}

/// Hardware watchdog feed point.
pub trait Watchdog {
    fn feed(&mut self);
}

/// Non-blocking byte intake (serial RX side).
pub trait ByteSource {
    /// Next buffered byte, or `None` when the line is idle.
    fn read_byte(&mut self) -> Option<u8>;

    /// Bytes lost to RX buffer overflow since boot.
    fn overflow_count(&self) -> u16 {
        0
    }
}

/// Non-blocking bounded byte output (serial TX side).
///
/// Writes never block; a full buffer simply accepts fewer bytes. Callers
/// that need all-or-nothing delivery check `writable()` first.
pub trait ByteSink {
    /// Free space in the TX buffer, in bytes.
    fn writable(&self) -> usize;

    /// Queue as many of `bytes` as fit; returns the number accepted.
    fn write(&mut self, bytes: &[u8]) -> usize;

    /// Drive the underlying transmitter forward. Default is a no-op for
    /// sinks that drain themselves.
    fn pump(&mut self) {}
}

/// Millisecond-resolution monotonic clock.
pub trait MillisClock {
    fn now_ms(&self) -> u32;
}

/// Microsecond-resolution clock for pulse timing (ultrasonic echo).
pub trait MicrosClock {
    fn micros(&self) -> u32;
}

/// Pan servo positioning.
pub trait PanServo {
    /// Command an absolute angle, 0-180 degrees.
    fn set_angle(&mut self, degrees: u8);
}

/// Inertial sensor as the core sees it: presence plus a filtered yaw.
pub trait Imu {
    fn present(&self) -> bool;

    /// Advance the sensor's internal filter. Called from the slow task.
    fn update(&mut self, now_ms: u32);

    /// Heading in tenths of a degree.
    fn yaw_decidegrees(&self) -> i16;
}

/// Placeholder IMU for boards without one; always reports absent.
#[derive(Default)]
pub struct NoImu;

impl Imu for NoImu {
    fn present(&self) -> bool {
        false
    }

    fn update(&mut self, _now_ms: u32) {}

    fn yaw_decidegrees(&self) -> i16 {
        0
    }
}

/// Most recent sensor readings, refreshed by the slow sensor task and read
/// by the dispatcher and the boot self-check. Values are cached so command
/// handlers never wait on hardware.
#[derive(Copy, Clone, Debug, Default)]
pub struct SensorSnapshot {
    /// Pack voltage in millivolts.
    pub battery_mv: u16,
    /// Raw ADC counts behind `battery_mv`, for the diagnostics command.
    pub battery_raw: u16,
    /// Ultrasonic range in cm; 0 means no echo.
    pub ultrasonic_cm: u16,
    /// Line sensor raw readings, left/middle/right.
    pub line: [u16; 3],
    /// Whether an IMU responded at boot.
    pub imu_present: bool,
    /// IMU heading in tenths of a degree.
    pub yaw_decideg: i16,
}
