//! Raw Ethernet transport abstraction.
//!
//! This module provides the [`NetIo`] trait that abstracts the link the stack
//! talks over, enabling:
//! - Testability through mock implementations
//! - Interchangeable backends (embassy-net drivers, raw sockets, pcap replay)
//! - Explicit injection instead of a global network handle
//!
//! ## Design Pattern
//!
//! The state machines never own a transport. Every operation that may send
//! takes `&mut dyn NetIo`, so one transport can serve an advertiser, an entity
//! and any number of control senders at the same time.
//!
//! ## Example
//!
//! ```
//! use avdecc_pico::addressing::Eui48;
//! use avdecc_pico::error::Result;
//! use avdecc_pico::net::transport::NetIo;
//!
//! /// Transport that drops everything
//! struct NullNet;
//!
//! impl NetIo for NullNet {
//!     fn mac_address(&self) -> Eui48 {
//!         Eui48::new([0x02, 0, 0, 0, 0, 1])
//!     }
//!
//!     fn time_in_millis(&self) -> u64 {
//!         0
//!     }
//!
//!     fn send_frame_parts(&mut self, _frame: &[u8], _extra1: &[u8], _extra2: &[u8]) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     fn receive_frame(&mut self, _buf: &mut [u8]) -> Result<Option<usize>> {
//!         Ok(None)
//!     }
//! }
//!
//! let mut net = NullNet;
//! net.send_frame(&[0u8; 60]).unwrap();
//! ```

use crate::addressing::Eui48;
use crate::error::{AvdeccError, Result};

/// Raw Ethernet frame transport and clock.
///
/// Frames passed in and out include the 14-byte Ethernet header but no FCS.
pub trait NetIo {
    /// MAC address of the local interface.
    fn mac_address(&self) -> Eui48;

    /// Monotonic time in milliseconds.
    fn time_in_millis(&self) -> u64;

    /// Send `frame` followed by `extra1` and `extra2` as one Ethernet frame.
    ///
    /// # Errors
    ///
    /// Returns `SendFailed` if the frame could not be handed to the link.
    fn send_frame_parts(&mut self, frame: &[u8], extra1: &[u8], extra2: &[u8]) -> Result<()>;

    /// Poll for one received frame without blocking.
    ///
    /// Returns `Ok(None)` when nothing is pending.
    fn receive_frame(&mut self, buf: &mut [u8]) -> Result<Option<usize>>;

    /// Send a complete frame.
    fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.send_frame_parts(frame, &[], &[])
    }

    /// Send `frame` back to where it came from.
    ///
    /// The destination becomes the frame's original source and the source
    /// becomes the local MAC address.
    fn send_reply_frame(&mut self, frame: &mut [u8], extra1: &[u8], extra2: &[u8]) -> Result<()> {
        if frame.len() < 12 {
            return Err(AvdeccError::malformed_pdu());
        }
        let (destination, source) = frame.split_at_mut(6);
        destination.copy_from_slice(&source[..6]);
        source[..6].copy_from_slice(&self.mac_address().octets());
        self.send_frame_parts(frame, extra1, extra2)
    }
}
