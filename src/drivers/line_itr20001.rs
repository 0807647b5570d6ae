// SPDX-License-Identifier: MIT

//! ITR20001/T three-channel IR line sensor.
//!
//! Three reflectance photodiodes on ADC channels; higher counts mean more
//! reflected IR. The raw values go to the host untouched - thresholding is
//! host policy, not firmware policy.

use crate::hw::adc::AdcRead;

pub struct LineSensor {
    channels: [u8; 3],
    last: [u16; 3],
}

impl LineSensor {
    /// `channels` are ADC channel numbers, left/middle/right.
    pub fn new(channels: [u8; 3]) -> Self {
        Self {
            channels,
            last: [0; 3],
        }
    }

    /// Sample all three channels; results are cached.
    pub fn read_all(&mut self, adc: &mut impl AdcRead) -> [u16; 3] {
        for (slot, &ch) in self.last.iter_mut().zip(self.channels.iter()) {
            *slot = adc.read_channel(ch);
        }
        self.last
    }

    pub fn last(&self) -> [u16; 3] {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeAdc;

    impl AdcRead for FakeAdc {
        fn read_channel(&mut self, ch: u8) -> u16 {
            ch as u16 * 100
        }
    }

    #[test]
    fn reads_channels_in_order() {
        let mut sensor = LineSensor::new([0, 1, 4]);
        assert_eq!(sensor.read_all(&mut FakeAdc), [0, 100, 400]);
        assert_eq!(sensor.last(), [0, 100, 400]);
    }
}
