// SPDX-License-Identifier: MIT

//! # Device-Specific Drivers
//!
//! This module contains device-specific drivers that sit above the raw `hw/`
//! layer and below the application logic.
//!
//! ## Existing drivers
//!
//! - [`tb6612`] – Toshiba TB6612FNG dual H-bridge drivetrain driver
//! - [`battery`] – pack voltage monitor behind a resistor divider
//! - [`hcsr04`] – HC-SR04 ultrasonic ranger
//! - [`line_itr20001`] – ITR20001/T three-channel IR line sensor
//! - [`servo`] – pan servo on a 50 Hz PWM channel
//! - [`button`] – debounced mode button

pub mod battery;
pub mod button;
pub mod hcsr04;
pub mod line_itr20001;
pub mod servo;
pub mod tb6612;

pub use battery::BatteryMonitor;
pub use button::ModeButton;
pub use hcsr04::HcSr04;
pub use line_itr20001::LineSensor;
pub use servo::PanServoSg90;
pub use tb6612::Tb6612;
