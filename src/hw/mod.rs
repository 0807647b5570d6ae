pub mod adc;
pub mod clock;
pub mod pins;
pub mod pwm;
pub mod usart;
pub mod watchdog;

pub use adc::Adc;
pub use clock::SysClock;
pub use pins::BoardPins;
pub use pwm::{MotorPwm, ServoPwm};
pub use usart::{Usart, UsartRx, UsartTx};
pub use watchdog::IwdgWatchdog;
