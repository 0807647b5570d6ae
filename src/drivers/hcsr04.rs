// SPDX-License-Identifier: MIT

//! HC-SR04 ultrasonic ranger.
//!
//! A 10 µs trigger pulse starts a measurement; the sensor answers with an
//! echo pulse whose width encodes round-trip time at ~58 µs/cm. Both wait
//! loops carry hard timeouts so a disconnected or wedged sensor costs a
//! bounded ~25 ms, never a hang. Reads happen from the 10 Hz sensor task;
//! the last good distance is cached for everyone else.

use embedded_hal::digital::{InputPin, OutputPin};

use crate::config::ULTRASONIC_MAX_CM;
use crate::hal::MicrosClock;

/// Echo round-trip scale.
const US_PER_CM: u32 = 58;
/// Give up waiting for the echo edge after this long.
const ECHO_TIMEOUT_US: u32 = 25_000;

pub struct HcSr04<TRIG, ECHO> {
    trig: TRIG,
    echo: ECHO,
    last_cm: u16,
}

impl<TRIG: OutputPin, ECHO: InputPin> HcSr04<TRIG, ECHO> {
    pub fn new(mut trig: TRIG, echo: ECHO) -> Self {
        trig.set_low().ok();
        Self {
            trig,
            echo,
            last_cm: 0,
        }
    }

    /// Last measured distance in cm; 0 means no echo.
    pub fn last_cm(&self) -> u16 {
        self.last_cm
    }

    /// Fire one measurement. Returns the distance in cm, or 0 when the
    /// sensor is absent or out of range.
    pub fn measure(&mut self, clock: &impl MicrosClock) -> u16 {
        // 10 µs trigger pulse.
        self.trig.set_high().ok();
        busy_wait_until(clock, clock.micros().wrapping_add(10));
        self.trig.set_low().ok();

        // Wait for the echo to rise.
        let deadline = clock.micros().wrapping_add(ECHO_TIMEOUT_US);
        while !self.echo.is_high().unwrap_or(false) {
            if past(clock.micros(), deadline) {
                self.last_cm = 0;
                return 0;
            }
        }

        // Measure the high time.
        let rise = clock.micros();
        let deadline = rise.wrapping_add(ECHO_TIMEOUT_US);
        while self.echo.is_high().unwrap_or(false) {
            if past(clock.micros(), deadline) {
                self.last_cm = 0;
                return 0;
            }
        }
        let width = clock.micros().wrapping_sub(rise);

        let cm = (width / US_PER_CM) as u16;
        self.last_cm = if cm == 0 || cm > ULTRASONIC_MAX_CM { 0 } else { cm };
        self.last_cm
    }
}

fn busy_wait_until(clock: &impl MicrosClock, deadline: u32) {
    while !past(clock.micros(), deadline) {}
}

fn past(now: u32, deadline: u32) -> bool {
    // Wrap-safe "now >= deadline".
    now.wrapping_sub(deadline) < u32::MAX / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    /// Clock that advances a fixed amount per query.
    struct StepClock {
        t: Cell<u32>,
        step: u32,
    }

    impl MicrosClock for StepClock {
        fn micros(&self) -> u32 {
            let t = self.t.get();
            self.t.set(t.wrapping_add(self.step));
            t
        }
    }

    struct ScriptedEcho {
        /// (rise_after, fall_after) in clock queries; crude but enough to
        /// exercise the edges.
        high_between: (u32, u32),
        queries: Cell<u32>,
    }

    impl embedded_hal::digital::ErrorType for ScriptedEcho {
        type Error = core::convert::Infallible;
    }

    impl InputPin for ScriptedEcho {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            let q = self.queries.get() + 1;
            self.queries.set(q);
            Ok(q >= self.high_between.0 && q < self.high_between.1)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            self.is_high().map(|h| !h)
        }
    }

    struct DummyTrig;

    impl embedded_hal::digital::ErrorType for DummyTrig {
        type Error = core::convert::Infallible;
    }

    impl OutputPin for DummyTrig {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn echo_width_converts_to_cm() {
        // 2 µs per query; echo high for 580 queries ≈ 1160 µs ≈ 20 cm.
        let clock = StepClock {
            t: Cell::new(0),
            step: 2,
        };
        let echo = ScriptedEcho {
            high_between: (1, 581),
            queries: Cell::new(0),
        };
        let mut sensor = HcSr04::new(DummyTrig, echo);
        let cm = sensor.measure(&clock);
        assert!((18..=22).contains(&cm), "got {cm}");
        assert_eq!(sensor.last_cm(), cm);
    }

    #[test]
    fn missing_echo_times_out_to_zero() {
        let clock = StepClock {
            t: Cell::new(0),
            step: 100,
        };
        let echo = ScriptedEcho {
            high_between: (u32::MAX, u32::MAX),
            queries: Cell::new(0),
        };
        let mut sensor = HcSr04::new(DummyTrig, echo);
        assert_eq!(sensor.measure(&clock), 0);
    }

    #[test]
    fn stuck_high_echo_times_out_to_zero() {
        let clock = StepClock {
            t: Cell::new(0),
            step: 100,
        };
        let echo = ScriptedEcho {
            high_between: (0, u32::MAX),
            queries: Cell::new(0),
        };
        let mut sensor = HcSr04::new(DummyTrig, echo);
        assert_eq!(sensor.measure(&clock), 0);
    }
}
