// SPDX-License-Identifier: MIT

//! Pin definitions for the STM32F767 drivetrain board.

use stm32f7xx_hal::{
    gpio::{gpioa, gpiob, gpioc, Alternate, Analog, Floating, Input, Output, PushPull},
    pac,
    prelude::*,
};

/// All board pins. Construct this once at startup using:
///
/// ```ignore
/// let pins = BoardPins::new(dp.GPIOA, dp.GPIOB, dp.GPIOC);
/// ```
pub struct BoardPins {
    pub usart1: Usart1Pins,
    pub motor: MotorPins,
    pub servo: ServoPins,
    pub ultrasonic: UltrasonicPins,
    pub analog: AnalogPins,
    pub button: ButtonPins,
}

/// USART1 TX/RX (the WiFi-bridge link).
pub struct Usart1Pins {
    pub tx: gpioa::PA9<Alternate<7>>,
    pub rx: gpioa::PA10<Alternate<7>>,
}

/// TB6612 control pins.
pub struct MotorPins {
    pub pwma: gpioa::PA6<Alternate<2>>, // TIM3_CH1, right wheel
    pub pwmb: gpioa::PA7<Alternate<2>>, // TIM3_CH2, left wheel
    pub ain1: gpiob::PB4<Output<PushPull>>,
    pub bin1: gpiob::PB5<Output<PushPull>>,
    pub stby: gpiob::PB3<Output<PushPull>>,
}

/// Pan servo on TIM4_CH1.
pub struct ServoPins {
    pub pwm: gpiob::PB6<Alternate<2>>,
}

/// HC-SR04 trigger/echo.
pub struct UltrasonicPins {
    pub trig: gpioc::PC0<Output<PushPull>>,
    pub echo: gpioc::PC1<Input<Floating>>,
}

/// ADC inputs: battery divider and the three line-sensor channels.
pub struct AnalogPins {
    pub battery: gpiob::PB1<Analog>, // ADC1_IN9
    pub line_left: gpioa::PA0<Analog>, // ADC1_IN0
    pub line_mid: gpioa::PA1<Analog>, // ADC1_IN1
    pub line_right: gpioa::PA4<Analog>, // ADC1_IN4
}

/// Mode button (active low, internal pull-up).
pub struct ButtonPins {
    pub mode: gpioc::PC13<Input<Floating>>,
}

impl BoardPins {
    /// Create all named pins from raw GPIO peripherals.
    pub fn new(gpioa: pac::GPIOA, gpiob: pac::GPIOB, gpioc: pac::GPIOC) -> Self {
        let gpioa = gpioa.split();
        let gpiob = gpiob.split();
        let gpioc = gpioc.split();

        Self {
            usart1: Usart1Pins {
                tx: gpioa.pa9.into_alternate::<7>(),
                rx: gpioa.pa10.into_alternate::<7>(),
            },

            motor: MotorPins {
                pwma: gpioa.pa6.into_alternate::<2>(),
                pwmb: gpioa.pa7.into_alternate::<2>(),
                ain1: gpiob.pb4.into_push_pull_output(),
                bin1: gpiob.pb5.into_push_pull_output(),
                stby: gpiob.pb3.into_push_pull_output(),
            },

            servo: ServoPins {
                pwm: gpiob.pb6.into_alternate::<2>(),
            },

            ultrasonic: UltrasonicPins {
                trig: gpioc.pc0.into_push_pull_output(),
                echo: gpioc.pc1.into_floating_input(),
            },

            analog: AnalogPins {
                battery: gpiob.pb1.into_analog(),
                line_left: gpioa.pa0.into_analog(),
                line_mid: gpioa.pa1.into_analog(),
                line_right: gpioa.pa4.into_analog(),
            },

            button: ButtonPins {
                mode: gpioc.pc13.into_floating_input(),
            },
        }
    }
}

/// ADC channel numbers matching [`AnalogPins`].
pub mod channel {
    pub const BATTERY: u8 = 9;
    pub const LINE_LEFT: u8 = 0;
    pub const LINE_MID: u8 = 1;
    pub const LINE_RIGHT: u8 = 4;
}
