// SPDX-License-Identifier: MIT

//! Debounced mode button.
//!
//! Active-low input with a fixed settle window: a reading has to hold for
//! the debounce time before it becomes the accepted state. `is_pressed`
//! reports rising edges, so holding the button yields exactly one event.

use embedded_hal::digital::InputPin;

use crate::config::BUTTON_DEBOUNCE_MS;

pub struct ModeButton<P: InputPin> {
    pin: P,
    last_reading: bool,
    stable: bool,
    previous_stable: bool,
    last_change: u32,
}

impl<P: InputPin> ModeButton<P> {
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            last_reading: false,
            stable: false,
            previous_stable: false,
            last_change: 0,
        }
    }

    fn read(&mut self) -> bool {
        // Pull-up wiring: pressed reads low.
        !self.pin.is_high().unwrap_or(true)
    }

    /// Poll the pin; call at the button task cadence.
    pub fn update(&mut self, now: u32) {
        let reading = self.read();
        if reading != self.last_reading {
            self.last_change = now;
        }

        self.previous_stable = self.stable;
        if now.wrapping_sub(self.last_change) > BUTTON_DEBOUNCE_MS && reading != self.stable {
            self.stable = reading;
        }

        self.last_reading = reading;
    }

    /// True exactly once per press, on the debounced rising edge.
    pub fn is_pressed(&self) -> bool {
        self.stable && !self.previous_stable
    }
}
