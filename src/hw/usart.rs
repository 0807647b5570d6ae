// SPDX-License-Identifier: MIT

//! USART abstraction layer.
//!
//! Splits a serial port into a polled RX side and a bounded TX side, both
//! non-blocking: the RX half drains the hardware into a software ring (with
//! an overflow counter the diagnostics command reports), and the TX half
//! queues bytes that `pump` pushes out one register-write at a time. No
//! code path here ever spins on the wire; the protocol intake task and the
//! response writer decide what to do when buffers run dry or fill up.

use heapless::Deque;

use stm32f7xx_hal::{
    prelude::*,
    serial::{Instance, Pins, Rx, Serial, Tx},
};

use crate::hal::{ByteSink, ByteSource};

/// Software RX ring; deep enough for a burst of frames between intake polls.
const RX_RING: usize = 128;
/// Software TX queue; sized for the diagnostics block plus a response.
const TX_RING: usize = 256;

pub struct Usart;

impl Usart {
    /// Split a configured serial port into the RX/TX halves the firmware
    /// core consumes.
    pub fn split<U: Instance, PINS: Pins<U>>(
        serial: Serial<U, PINS>,
    ) -> (UsartRx<U>, UsartTx<U>) {
        let (tx, rx) = serial.split();
        (
            UsartRx {
                rx,
                ring: Deque::new(),
                overflow: 0,
            },
            UsartTx {
                tx,
                ring: Deque::new(),
            },
        )
    }
}

pub struct UsartRx<U: Instance> {
    rx: Rx<U>,
    ring: Deque<u8, RX_RING>,
    overflow: u16,
}

impl<U: Instance> UsartRx<U> {
    /// Drain the hardware receiver into the ring. Call before reading.
    pub fn pump(&mut self) {
        while let Ok(byte) = self.rx.read() {
            if self.ring.push_back(byte).is_err() {
                self.overflow = self.overflow.saturating_add(1);
                break;
            }
        }
    }
}

impl<U: Instance> ByteSource for UsartRx<U> {
    fn read_byte(&mut self) -> Option<u8> {
        self.ring.pop_front()
    }

    fn overflow_count(&self) -> u16 {
        self.overflow
    }
}

pub struct UsartTx<U: Instance> {
    tx: Tx<U>,
    ring: Deque<u8, TX_RING>,
}

impl<U: Instance> UsartTx<U> {
    /// Block until both the queue and the hardware transmitter are empty.
    /// Only used around the boot marker; steady-state output never blocks.
    pub fn flush(&mut self) {
        while !self.ring.is_empty() {
            self.drain();
        }
        let _ = nb::block!(self.tx.flush());
    }

    /// Push queued bytes into the transmitter until it reports busy.
    fn drain(&mut self) {
        while let Some(&byte) = self.ring.front() {
            match self.tx.write(byte) {
                Ok(()) => {
                    self.ring.pop_front();
                }
                Err(_) => break,
            }
        }
    }
}

impl<U: Instance> ByteSink for UsartTx<U> {
    fn writable(&self) -> usize {
        self.ring.capacity() - self.ring.len()
    }

    fn write(&mut self, bytes: &[u8]) -> usize {
        let mut written = 0;
        for &byte in bytes {
            if self.ring.push_back(byte).is_err() {
                break;
            }
            written += 1;
        }
        self.drain();
        written
    }

    fn pump(&mut self) {
        self.drain();
    }
}
