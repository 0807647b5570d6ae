//! SysTick-based monotonic clock.
//!
//! A 1 kHz SysTick interrupt feeds a millisecond counter; microseconds are
//! interpolated from the live countdown register for the one consumer that
//! needs them (ultrasonic pulse timing). Handles are `Copy` so every task
//! can carry one without ownership games.

use core::sync::atomic::{AtomicU32, Ordering};

use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::SYST;
#[cfg(target_arch = "arm")]
use cortex_m_rt::exception;

use crate::hal::{MicrosClock, MillisClock};

static MILLIS: AtomicU32 = AtomicU32::new(0);

/// Monotonic clock handle.
#[derive(Copy, Clone)]
pub struct SysClock {
    ticks_per_us: u32,
    reload: u32,
}

impl SysClock {
    /// Configure SysTick for a 1 ms tick at the given core clock.
    pub fn start(mut syst: SYST, sysclk_hz: u32) -> Self {
        let reload = sysclk_hz / 1_000 - 1;
        syst.set_clock_source(SystClkSource::Core);
        syst.set_reload(reload);
        syst.clear_current();
        syst.enable_counter();
        syst.enable_interrupt();

        Self {
            ticks_per_us: sysclk_hz / 1_000_000,
            reload,
        }
    }
}

impl MillisClock for SysClock {
    fn now_ms(&self) -> u32 {
        MILLIS.load(Ordering::Relaxed)
    }
}

impl MicrosClock for SysClock {
    fn micros(&self) -> u32 {
        // Sample until ms is stable around the countdown read.
        loop {
            let ms = MILLIS.load(Ordering::Relaxed);
            let count = SYST::get_current();
            if ms == MILLIS.load(Ordering::Relaxed) {
                let us_into_ms = (self.reload - count) / self.ticks_per_us;
                return ms.wrapping_mul(1_000).wrapping_add(us_into_ms);
            }
        }
    }
}

#[cfg(target_arch = "arm")]
#[exception]
fn SysTick() {
    MILLIS.fetch_add(1, Ordering::Relaxed);
}
