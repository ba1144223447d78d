//! Embassy Ethernet driver adapter for [`NetIo`].
//!
//! This module provides an adapter that wraps any
//! [`embassy_net_driver::Driver`] (for example a W5500, an ENC28J60 or a
//! MCU MAC driver) and exposes it as a raw AVTP frame transport, with
//! `embassy_time` as the millisecond clock.
//!
//! The driver is polled with a no-op waker: the AVDECC state machines are
//! driven by `tick` from a superloop or a periodic task, so there is nothing
//! to wake.
//!
//! ## Example
//!
//! ```rust,ignore
//! use avdecc_pico::net::embassy_adapter::EmbassyNetIo;
//!
//! let mut net = EmbassyNetIo::new(driver)?;
//! loop {
//!     group.poll(&mut net)?;
//!     Timer::after_millis(5).await;
//! }
//! ```

use crate::addressing::Eui48;
use crate::error::{AvdeccError, Result};
use crate::net::transport::NetIo;
use core::task::{Context, Waker};
use embassy_net_driver::{Driver, HardwareAddress, RxToken, TxToken};

/// Adapter for an `embassy_net_driver::Driver` implementing [`NetIo`].
///
/// # Type Parameters
///
/// - `D` - Ethernet driver type
pub struct EmbassyNetIo<D: Driver> {
    driver: D,
    mac: Eui48,
}

impl<D: Driver> EmbassyNetIo<D> {
    /// Wrap a driver.
    ///
    /// # Errors
    ///
    /// Returns `NoHardwareAddress` if the driver is not an Ethernet driver.
    pub fn new(driver: D) -> Result<Self> {
        let mac = match driver.hardware_address() {
            HardwareAddress::Ethernet(octets) => Eui48::new(octets),
            _ => return Err(AvdeccError::no_hardware_address()),
        };
        crate::avdecc_log!(info, "AVTP transport on {}", mac);
        Ok(Self { driver, mac })
    }

    /// Give the driver back.
    pub fn into_inner(self) -> D {
        self.driver
    }
}

impl<D: Driver> core::fmt::Debug for EmbassyNetIo<D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EmbassyNetIo")
            .field("mac", &self.mac)
            .finish_non_exhaustive()
    }
}

impl<D: Driver> NetIo for EmbassyNetIo<D> {
    fn mac_address(&self) -> Eui48 {
        self.mac
    }

    fn time_in_millis(&self) -> u64 {
        embassy_time::Instant::now().as_millis()
    }

    fn send_frame_parts(&mut self, frame: &[u8], extra1: &[u8], extra2: &[u8]) -> Result<()> {
        let mut cx = Context::from_waker(Waker::noop());
        let Some(token) = self.driver.transmit(&mut cx) else {
            crate::avdecc_log!(warn, "No transmit buffer available");
            return Err(AvdeccError::send_failed());
        };
        let len = frame.len() + extra1.len() + extra2.len();
        token.consume(len, |buf| {
            let (head, rest) = buf.split_at_mut(frame.len());
            head.copy_from_slice(frame);
            let (middle, tail) = rest.split_at_mut(extra1.len());
            middle.copy_from_slice(extra1);
            tail.copy_from_slice(extra2);
        });
        Ok(())
    }

    fn receive_frame(&mut self, buf: &mut [u8]) -> Result<Option<usize>> {
        let mut cx = Context::from_waker(Waker::noop());
        let Some((rx, _tx)) = self.driver.receive(&mut cx) else {
            return Ok(None);
        };
        let len = rx.consume(|data| {
            let len = data.len().min(buf.len());
            buf[..len].copy_from_slice(&data[..len]);
            len
        });
        Ok(Some(len))
    }
}
