// SPDX-License-Identifier: MIT

//! # zipbot Firmware
//!
//! Firmware core for a small two-motor differential-drive robot commanded
//! over a serial link, written in Rust, targeting an STM32F7 MCU. The link
//! is shared between a CRC-checked binary framing and a bracket-delimited
//! text framing; both feed one dispatcher that drives the wheels through a
//! battery-aware safety pipeline under a hardware watchdog.
//!
//! ## Crate Structure
//!
//! | Module | Purpose |
//! | ------ | ------- |
//! | [`protocol`] | Frame codecs, command parsing, response encoding |
//! | [`control`] | Motion controller, macro engine, drive safety, rate limiting |
//! | [`dispatch`] | Command routing and single-writer motor ownership |
//! | [`scheduler`] | Cooperative task runner with watchdog interleaving |
//! | [`boot`] | Non-blocking boot self-check state machine |
//! | [`hal`] | Seam traits between the core and hardware |
//! | [`drivers`] | Device-level drivers (TB6612, HC-SR04, battery, ...) |
//! | [`hw`] | MCU-level wrappers around USART, ADC, timers, IWDG |
//!
//! ## Getting Started
//!
//! Build docs:
//!
//! ```bash
//! cargo doc --no-deps --open
//! ```
//!
//! Flash the board:
//!
//! ```bash
//! cargo run --release
//! ```
//!
//! Run the host-side test suite:
//!
//! ```bash
//! cargo test --lib
//! ```

#![no_std]

#[cfg(test)]
extern crate std;

pub mod boot;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod drivers;
pub mod hal;
pub mod hw;
pub mod protocol;
pub mod scheduler;
