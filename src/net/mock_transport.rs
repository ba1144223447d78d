//! Mock transport implementation for testing.
//!
//! This module provides a mock implementation of [`NetIo`] that can be used
//! in unit tests to drive the state machines without a network interface.
//!
//! ## Example
//!
//! ```
//! use avdecc_pico::addressing::Eui48;
//! use avdecc_pico::net::mock_transport::MockNetIo;
//! use avdecc_pico::net::transport::NetIo;
//!
//! let mut net = MockNetIo::new(Eui48::new([0x02, 0, 0, 0, 0, 1]));
//! net.push_incoming(vec![0xFF; 60]);
//! net.advance(250);
//!
//! let mut buf = [0u8; 640];
//! assert_eq!(net.receive_frame(&mut buf).unwrap(), Some(60));
//! assert_eq!(net.time_in_millis(), 250);
//! ```

use crate::addressing::Eui48;
use crate::error::{AvdeccError, Result};
use crate::net::transport::NetIo;

use std::collections::VecDeque;
use std::vec::Vec;

/// Mock transport for exercising AVDECC state machines without a network.
///
/// This mock transport allows you to:
/// - Queue frames that will be returned by `receive_frame()`
/// - Inspect frames sent via `send_frame_parts()`
/// - Control the clock
/// - Simulate send failures
#[derive(Debug, Default)]
pub struct MockNetIo {
    mac: Eui48,
    now: u64,
    incoming: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    fail_sends: bool,
}

impl MockNetIo {
    /// Create a mock interface with the given MAC address at time 0.
    pub fn new(mac: Eui48) -> Self {
        Self {
            mac,
            ..Self::default()
        }
    }

    /// Set the clock.
    pub fn set_time(&mut self, now: u64) {
        self.now = now;
    }

    /// Move the clock forward.
    pub fn advance(&mut self, ms: u64) {
        self.now += ms;
    }

    /// Queue a frame for the next `receive_frame()` call. Frames are
    /// returned in FIFO order.
    pub fn push_incoming(&mut self, frame: Vec<u8>) {
        self.incoming.push_back(frame);
    }

    /// Number of frames still queued for reception.
    pub fn pending_incoming(&self) -> usize {
        self.incoming.len()
    }

    /// All frames sent so far.
    pub fn sent_frames(&self) -> &[Vec<u8>] {
        &self.sent
    }

    /// The last frame sent.
    pub fn last_sent(&self) -> Option<&[u8]> {
        self.sent.last().map(Vec::as_slice)
    }

    /// Take all sent frames, leaving the history empty.
    pub fn take_sent(&mut self) -> Vec<Vec<u8>> {
        core::mem::take(&mut self.sent)
    }

    /// Clear the sent frame history.
    pub fn clear_sent(&mut self) {
        self.sent.clear();
    }

    /// Make every following send fail with `SendFailed`.
    pub fn set_fail_sends(&mut self, fail: bool) {
        self.fail_sends = fail;
    }
}

impl NetIo for MockNetIo {
    fn mac_address(&self) -> Eui48 {
        self.mac
    }

    fn time_in_millis(&self) -> u64 {
        self.now
    }

    fn send_frame_parts(&mut self, frame: &[u8], extra1: &[u8], extra2: &[u8]) -> Result<()> {
        if self.fail_sends {
            return Err(AvdeccError::send_failed());
        }
        let mut out = Vec::with_capacity(frame.len() + extra1.len() + extra2.len());
        out.extend_from_slice(frame);
        out.extend_from_slice(extra1);
        out.extend_from_slice(extra2);
        self.sent.push(out);
        Ok(())
    }

    fn receive_frame(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        Ok(self.incoming.pop_front().map(|frame| {
            let len = frame.len().min(buf.len());
            buf[..len].copy_from_slice(&frame[..len]);
            len
        }))
    }
}
