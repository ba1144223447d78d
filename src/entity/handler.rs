//! Frame dispatch.
//!
//! A [`HandlerGroup`] offers every received frame to its handlers in
//! registration order until one of them claims it, and forwards `tick` to
//! all of them.

use crate::error::{AvdeccError, Result};
use crate::net::transport::NetIo;
use crate::protocol::constants::MAX_FRAME_SIZE;

/// Something that consumes AVDECC frames and runs timers.
pub trait Handler {
    /// Advance timers to `now` (milliseconds).
    fn tick(&mut self, _net: &mut dyn NetIo, _now: u64) -> Result<()> {
        Ok(())
    }

    /// Offer a received frame. Returns `Ok(true)` if the frame was consumed.
    ///
    /// Frames that fail to parse are not errors; they are left for the next handler.
    fn receive_pdu(&mut self, net: &mut dyn NetIo, frame: &[u8]) -> Result<bool>;
}

/// Bounded list of handlers sharing one transport.
///
/// # Examples
///
/// ```
/// use avdecc_pico::configuration::EntityConfig;
/// use avdecc_pico::entity::{AdpAdvertiser, HandlerGroup};
/// use avdecc_pico::eui64;
///
/// let mut advertiser = AdpAdvertiser::new(EntityConfig::new(eui64!(0x1), eui64!(0x2)));
/// let mut group: HandlerGroup<'_, 4> = HandlerGroup::new();
/// group.add(&mut advertiser).unwrap();
/// assert_eq!(group.len(), 1);
/// ```
pub struct HandlerGroup<'a, const N: usize> {
    handlers: heapless::Vec<&'a mut (dyn Handler + 'a), N>,
}

impl<'a, const N: usize> HandlerGroup<'a, N> {
    pub const fn new() -> Self {
        Self {
            handlers: heapless::Vec::new(),
        }
    }

    /// Register a handler. Earlier handlers see frames first.
    ///
    /// # Errors
    ///
    /// Returns `TableFull` when `N` handlers are already registered.
    pub fn add(&mut self, handler: &'a mut (dyn Handler + 'a)) -> Result<()> {
        self.handlers
            .push(handler)
            .map_err(|_| AvdeccError::table_full())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Drain all pending frames from the transport, then tick every handler.
    ///
    /// A frame whose handler fails does not stop the drain, and a failing
    /// receive only ends it. Handlers are ticked either way and the first
    /// error is returned.
    pub fn poll(&mut self, net: &mut dyn NetIo) -> Result<()> {
        let mut first_error = None;
        let mut buf = [0u8; MAX_FRAME_SIZE];
        loop {
            let len = match net.receive_frame(&mut buf) {
                Ok(Some(len)) => len,
                Ok(None) => break,
                Err(e) => {
                    crate::avdecc_log!(warn, "Receive failed: {}", e);
                    first_error.get_or_insert(e);
                    break;
                }
            };
            if let Err(e) = self.receive_pdu(net, &buf[..len]) {
                crate::avdecc_log!(warn, "Handling {} byte frame failed: {}", len, e);
                first_error.get_or_insert(e);
            }
        }
        let now = net.time_in_millis();
        let ticked = self.tick(net, now);
        match first_error {
            Some(e) => Err(e),
            None => ticked,
        }
    }
}

impl<const N: usize> Handler for HandlerGroup<'_, N> {
    /// Tick every handler. All handlers run even if one fails; the first
    /// error is returned.
    fn tick(&mut self, net: &mut dyn NetIo, now: u64) -> Result<()> {
        let mut first_error = None;
        for handler in &mut self.handlers {
            if let Err(e) = handler.tick(net, now) {
                crate::avdecc_log!(warn, "Handler tick failed: {}", e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn receive_pdu(&mut self, net: &mut dyn NetIo, frame: &[u8]) -> Result<bool> {
        for handler in &mut self.handlers {
            if handler.receive_pdu(net, frame)? {
                return Ok(true);
            }
        }
        crate::avdecc_log!(trace, "Unclaimed frame of {} bytes", frame.len());
        Ok(false)
    }
}

impl<const N: usize> Default for HandlerGroup<'_, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> core::fmt::Debug for HandlerGroup<'_, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandlerGroup")
            .field("handlers", &self.handlers.len())
            .field("capacity", &N)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::Eui48;
    use crate::net::mock_transport::MockNetIo;

    struct Claimer {
        first_byte: u8,
        seen: usize,
        ticks: usize,
        fail_tick: bool,
        fail_first_byte: Option<u8>,
    }

    impl Claimer {
        fn new(first_byte: u8) -> Self {
            Self {
                first_byte,
                seen: 0,
                ticks: 0,
                fail_tick: false,
                fail_first_byte: None,
            }
        }
    }

    impl Handler for Claimer {
        fn tick(&mut self, _net: &mut dyn NetIo, _now: u64) -> Result<()> {
            self.ticks += 1;
            if self.fail_tick {
                Err(AvdeccError::Timeout)
            } else {
                Ok(())
            }
        }

        fn receive_pdu(&mut self, _net: &mut dyn NetIo, frame: &[u8]) -> Result<bool> {
            self.seen += 1;
            if self.fail_first_byte.is_some() && frame.first() == self.fail_first_byte.as_ref() {
                return Err(AvdeccError::InvalidState);
            }
            Ok(frame.first() == Some(&self.first_byte))
        }
    }

    #[test]
    fn test_first_claim_wins() {
        let mut a = Claimer::new(1);
        let mut b = Claimer::new(1);
        let mut net = MockNetIo::new(Eui48::ZERO);
        {
            let mut group: HandlerGroup<'_, 2> = HandlerGroup::new();
            group.add(&mut a).unwrap();
            group.add(&mut b).unwrap();
            assert!(group.receive_pdu(&mut net, &[1]).unwrap());
            assert!(!group.receive_pdu(&mut net, &[2]).unwrap());
        }
        assert_eq!(a.seen, 2);
        assert_eq!(b.seen, 1);
    }

    #[test]
    fn test_add_beyond_capacity() {
        let mut a = Claimer::new(1);
        let mut b = Claimer::new(2);
        let mut group: HandlerGroup<'_, 1> = HandlerGroup::new();
        group.add(&mut a).unwrap();
        match group.add(&mut b) {
            Err(AvdeccError::Capacity(e)) => assert!(e.is_table_full()),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_tick_runs_all_and_reports_first_error() {
        let mut a = Claimer::new(1);
        a.fail_tick = true;
        let mut b = Claimer::new(2);
        let mut net = MockNetIo::new(Eui48::ZERO);
        {
            let mut group: HandlerGroup<'_, 2> = HandlerGroup::new();
            group.add(&mut a).unwrap();
            group.add(&mut b).unwrap();
            assert!(group.tick(&mut net, 10).is_err());
        }
        assert_eq!(a.ticks, 1);
        assert_eq!(b.ticks, 1);
    }

    #[test]
    fn test_poll_drains_transport() {
        let mut a = Claimer::new(1);
        let mut net = MockNetIo::new(Eui48::ZERO);
        net.push_incoming(vec![1, 0, 0]);
        net.push_incoming(vec![2, 0, 0]);
        {
            let mut group: HandlerGroup<'_, 1> = HandlerGroup::new();
            group.add(&mut a).unwrap();
            group.poll(&mut net).unwrap();
        }
        assert_eq!(a.seen, 2);
        assert_eq!(a.ticks, 1);
        assert_eq!(net.pending_incoming(), 0);
    }

    #[test]
    fn test_poll_keeps_draining_after_handler_error() {
        let mut a = Claimer::new(1);
        a.fail_first_byte = Some(9);
        a.fail_tick = true;
        let mut b = Claimer::new(2);
        let mut net = MockNetIo::new(Eui48::ZERO);
        net.push_incoming(vec![9, 0, 0]);
        net.push_incoming(vec![1, 0, 0]);
        net.push_incoming(vec![2, 0, 0]);
        {
            let mut group: HandlerGroup<'_, 2> = HandlerGroup::new();
            group.add(&mut a).unwrap();
            group.add(&mut b).unwrap();
            // The receive error comes first, so it wins over the tick error
            assert!(matches!(group.poll(&mut net), Err(AvdeccError::InvalidState)));
        }
        assert_eq!(net.pending_incoming(), 0);
        assert_eq!(a.seen, 3);
        assert_eq!(b.seen, 1);
        assert_eq!(a.ticks, 1);
        assert_eq!(b.ticks, 1);
    }
}
