// SPDX-License-Identifier: MIT

//! TB6612FNG dual H-bridge motor driver.
//!
//! Each bridge takes a PWM magnitude and one direction pin; the shared STBY
//! line must be high for either output to drive at all, which doubles as
//! the hardware-level motor enable. Channel A is the right wheel, channel B
//! the left, matching the drivetrain wiring.
//!
//! This driver is a dumb actuator on purpose: all shaping (ramps, deadband,
//! kickstart, battery caps) happens upstream in the drive safety layer, and
//! ownership of this struct is what authorizes pin writes.

use embedded_hal::digital::OutputPin;

use crate::hal::MotorOutputs;
use crate::hw::pwm::DualPwm;

pub struct Tb6612<PWM, AIN1, BIN1, STBY> {
    pwm: PWM,
    ain1: AIN1,
    bin1: BIN1,
    stby: STBY,
}

impl<PWM, AIN1, BIN1, STBY> Tb6612<PWM, AIN1, BIN1, STBY>
where
    PWM: DualPwm,
    AIN1: OutputPin,
    BIN1: OutputPin,
    STBY: OutputPin,
{
    /// Take ownership of the bridge pins. Outputs start zeroed with the
    /// driver in standby.
    pub fn new(pwm: PWM, ain1: AIN1, bin1: BIN1, mut stby: STBY) -> Self {
        stby.set_low().ok();
        let mut driver = Self {
            pwm,
            ain1,
            bin1,
            stby,
        };
        driver.stop();
        driver
    }
}

impl<PWM, AIN1, BIN1, STBY> MotorOutputs for Tb6612<PWM, AIN1, BIN1, STBY>
where
    PWM: DualPwm,
    AIN1: OutputPin,
    BIN1: OutputPin,
    STBY: OutputPin,
{
    fn set(&mut self, left: i16, right: i16) {
        // Right wheel, bridge A: forward = AIN1 high.
        if right > 0 {
            self.ain1.set_high().ok();
            self.pwm.set_duty_a(right.min(255) as u8);
        } else if right < 0 {
            self.ain1.set_low().ok();
            self.pwm.set_duty_a((-right).min(255) as u8);
        } else {
            self.pwm.set_duty_a(0);
        }

        // Left wheel, bridge B: forward = BIN1 high.
        if left > 0 {
            self.bin1.set_high().ok();
            self.pwm.set_duty_b(left.min(255) as u8);
        } else if left < 0 {
            self.bin1.set_low().ok();
            self.pwm.set_duty_b((-left).min(255) as u8);
        } else {
            self.pwm.set_duty_b(0);
        }
    }

    fn stop(&mut self) {
        self.pwm.set_duty_a(0);
        self.pwm.set_duty_b(0);
    }

    fn enable(&mut self) {
        self.stby.set_high().ok();
    }

    fn disable(&mut self) {
        self.stby.set_low().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockPwm {
        a: u8,
        b: u8,
    }

    impl DualPwm for MockPwm {
        fn set_duty_a(&mut self, duty: u8) {
            self.a = duty;
        }

        fn set_duty_b(&mut self, duty: u8) {
            self.b = duty;
        }
    }

    #[derive(Default)]
    struct MockPin {
        high: bool,
    }

    impl embedded_hal::digital::ErrorType for MockPin {
        type Error = core::convert::Infallible;
    }

    impl OutputPin for MockPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.high = true;
            Ok(())
        }
    }

    fn driver() -> Tb6612<MockPwm, MockPin, MockPin, MockPin> {
        Tb6612::new(
            MockPwm::default(),
            MockPin::default(),
            MockPin::default(),
            MockPin::default(),
        )
    }

    #[test]
    fn starts_in_standby_with_zero_duty() {
        let drv = driver();
        assert!(!drv.stby.high);
        assert_eq!((drv.pwm.a, drv.pwm.b), (0, 0));
    }

    #[test]
    fn forward_sets_direction_high() {
        let mut drv = driver();
        drv.set(100, 150);
        assert!(drv.bin1.high);
        assert!(drv.ain1.high);
        assert_eq!((drv.pwm.b, drv.pwm.a), (100, 150));
    }

    #[test]
    fn reverse_sets_direction_low_with_positive_duty() {
        let mut drv = driver();
        drv.set(-80, -40);
        assert!(!drv.bin1.high);
        assert!(!drv.ain1.high);
        assert_eq!((drv.pwm.b, drv.pwm.a), (80, 40));
    }

    #[test]
    fn zero_clears_duty_without_flipping_direction() {
        let mut drv = driver();
        drv.set(100, -100);
        drv.set(0, 0);
        assert_eq!((drv.pwm.a, drv.pwm.b), (0, 0));
        // Direction pins keep their last value, like the wiring expects.
        assert!(drv.bin1.high);
        assert!(!drv.ain1.high);
    }

    #[test]
    fn enable_and_disable_toggle_standby() {
        let mut drv = driver();
        drv.enable();
        assert!(drv.stby.high);
        drv.disable();
        assert!(!drv.stby.high);
    }
}
