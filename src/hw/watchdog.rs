//! Independent watchdog (IWDG) using direct PAC register access.
//!
//! The IWDG runs off the ~32 kHz LSI and, once started, cannot be stopped:
//! a missed feed inside the timeout hard-resets the MCU. That reset is the
//! firmware's only fatal error path; everything else degrades to the
//! startup-safe motors-disabled state.
//!
//! `start` consumes the peripheral and hands back a `Copy` handle; feeding
//! is a single key-register write, so both the scheduler and the byte
//! intake loop can carry a handle without sharing machinery.

use stm32f7xx_hal::pac;

use crate::hal::Watchdog;

const KEY_UNLOCK: u16 = 0x5555;
const KEY_START: u16 = 0xCCCC;
const KEY_FEED: u16 = 0xAAAA;

/// LSI frequency the reload math assumes.
const LSI_HZ: u32 = 32_000;

/// Handle to the started watchdog.
#[derive(Copy, Clone)]
pub struct IwdgWatchdog {
    _priv: (),
}

impl IwdgWatchdog {
    /// Start the watchdog with the given timeout. It cannot be stopped
    /// afterwards.
    pub fn start(iwdg: pac::IWDG, timeout_ms: u32) -> Self {
        // Prescaler /256: 125 Hz tick, up to ~32 s of reach.
        let ticks = (timeout_ms * (LSI_HZ / 256) / 1000).clamp(1, 0x0FFF);

        iwdg.kr.write(|w| unsafe { w.key().bits(KEY_UNLOCK) });
        iwdg.pr.write(|w| unsafe { w.pr().bits(0b110) });
        iwdg.rlr.write(|w| unsafe { w.rl().bits(ticks as u16) });
        iwdg.kr.write(|w| unsafe { w.key().bits(KEY_START) });
        iwdg.kr.write(|w| unsafe { w.key().bits(KEY_FEED) });

        Self { _priv: () }
    }
}

impl Watchdog for IwdgWatchdog {
    fn feed(&mut self) {
        let iwdg = unsafe { &*pac::IWDG::ptr() };
        iwdg.kr.write(|w| unsafe { w.key().bits(KEY_FEED) });
    }
}
