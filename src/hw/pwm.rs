//! Timer PWM support using direct PAC register access.
//!
//! Two fixed roles, matching the board wiring:
//!
//! - [`MotorPwm`]: TIM3 CH1/CH2 at ~7.8 kHz with a 255-count period, so
//!   motor duty is written in the same 0-255 units the control code uses.
//! - [`ServoPwm`]: TIM4 CH1 at 50 Hz with a 1 µs tick, so servo pulses are
//!   written directly in microseconds.

use stm32f7xx_hal::pac;

/// Two-channel duty interface the TB6612 driver sits on. Channel A is
/// TIM3_CH1 (right wheel), channel B is TIM3_CH2 (left wheel).
pub trait DualPwm {
    fn set_duty_a(&mut self, duty: u8);
    fn set_duty_b(&mut self, duty: u8);
}

/// Single pulse-width channel for the servo.
pub trait PulseOut {
    fn set_pulse_us(&mut self, us: u16);
}

/// TIM3 CH1/CH2, 0-255 duty.
pub struct MotorPwm {
    tim: pac::TIM3,
}

impl MotorPwm {
    /// `timer_clk_hz` is the TIM3 kernel clock (APB1 timer clock).
    pub fn new(tim: pac::TIM3, timer_clk_hz: u32) -> Self {
        let rcc = unsafe { &*pac::RCC::ptr() };
        rcc.apb1enr.modify(|_, w| w.tim3en().set_bit());

        // 2 MHz counter over a 256-count period: ~7.8 kHz PWM.
        let psc = (timer_clk_hz / 2_000_000).saturating_sub(1) as u16;
        tim.psc.write(|w| unsafe { w.psc().bits(psc) });
        tim.arr.write(|w| unsafe { w.bits(255) });

        // PWM mode 1 with preload on both channels.
        tim.ccmr1_output().modify(|_, w| unsafe {
            w.oc1m().bits(0b110);
            w.oc1pe().set_bit();
            w.oc2m().bits(0b110);
            w.oc2pe().set_bit();
            w
        });
        tim.ccer
            .modify(|_, w| w.cc1e().set_bit().cc2e().set_bit());

        tim.ccr1().write(|w| unsafe { w.bits(0) });
        tim.ccr2().write(|w| unsafe { w.bits(0) });

        tim.cr1.modify(|_, w| w.arpe().set_bit().cen().set_bit());
        tim.egr.write(|w| w.ug().set_bit());

        Self { tim }
    }
}

impl DualPwm for MotorPwm {
    fn set_duty_a(&mut self, duty: u8) {
        self.tim.ccr1().write(|w| unsafe { w.bits(duty as u32) });
    }

    fn set_duty_b(&mut self, duty: u8) {
        self.tim.ccr2().write(|w| unsafe { w.bits(duty as u32) });
    }
}

/// TIM4 CH1, 50 Hz frame, 1 µs resolution.
pub struct ServoPwm {
    tim: pac::TIM4,
}

impl ServoPwm {
    /// `timer_clk_hz` is the TIM4 kernel clock (APB1 timer clock).
    pub fn new(tim: pac::TIM4, timer_clk_hz: u32) -> Self {
        let rcc = unsafe { &*pac::RCC::ptr() };
        rcc.apb1enr.modify(|_, w| w.tim4en().set_bit());

        // 1 MHz tick, 20 ms frame.
        let psc = (timer_clk_hz / 1_000_000).saturating_sub(1) as u16;
        tim.psc.write(|w| unsafe { w.psc().bits(psc) });
        tim.arr.write(|w| unsafe { w.bits(19_999) });

        tim.ccmr1_output().modify(|_, w| unsafe {
            w.oc1m().bits(0b110);
            w.oc1pe().set_bit();
            w
        });
        tim.ccer.modify(|_, w| w.cc1e().set_bit());

        tim.ccr1().write(|w| unsafe { w.bits(0) });

        tim.cr1.modify(|_, w| w.arpe().set_bit().cen().set_bit());
        tim.egr.write(|w| w.ug().set_bit());

        Self { tim }
    }
}

impl PulseOut for ServoPwm {
    fn set_pulse_us(&mut self, us: u16) {
        self.tim.ccr1().write(|w| unsafe { w.bits(us as u32) });
    }
}
