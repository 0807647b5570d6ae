// SPDX-License-Identifier: MIT

//! Pan servo on a 50 Hz PWM channel.
//!
//! Standard hobby-servo timing: 0-180 degrees maps linearly onto a
//! 600-2400 µs pulse.

use crate::hal::PanServo;
use crate::hw::pwm::PulseOut;

const PULSE_MIN_US: u16 = 600;
const PULSE_MAX_US: u16 = 2400;

pub struct PanServoSg90<P: PulseOut> {
    pwm: P,
    angle: u8,
}

impl<P: PulseOut> PanServoSg90<P> {
    pub fn new(pwm: P) -> Self {
        Self { pwm, angle: 90 }
    }

    pub fn angle(&self) -> u8 {
        self.angle
    }
}

impl<P: PulseOut> PanServo for PanServoSg90<P> {
    fn set_angle(&mut self, degrees: u8) {
        let degrees = degrees.min(180);
        self.angle = degrees;
        let span = (PULSE_MAX_US - PULSE_MIN_US) as u32;
        let pulse = PULSE_MIN_US as u32 + span * degrees as u32 / 180;
        self.pwm.set_pulse_us(pulse as u16);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockPulse {
        us: u16,
    }

    impl PulseOut for MockPulse {
        fn set_pulse_us(&mut self, us: u16) {
            self.us = us;
        }
    }

    #[test]
    fn endpoints_and_center() {
        let mut servo = PanServoSg90::new(MockPulse { us: 0 });
        servo.set_angle(0);
        assert_eq!(servo.pwm.us, 600);
        servo.set_angle(90);
        assert_eq!(servo.pwm.us, 1500);
        servo.set_angle(180);
        assert_eq!(servo.pwm.us, 2400);
    }

    #[test]
    fn overrange_clamps() {
        let mut servo = PanServoSg90::new(MockPulse { us: 0 });
        servo.set_angle(200);
        assert_eq!(servo.angle(), 180);
        assert_eq!(servo.pwm.us, 2400);
    }
}
