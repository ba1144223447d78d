//! ADP advertiser.
//!
//! Sends ENTITY_AVAILABLE for one local entity every `valid_time * 250` ms
//! (four advertisements per validity period), answers ENTITY_DISCOVER
//! immediately and announces ENTITY_DEPARTING on request.
//!
//! ## Example
//!
//! ```
//! use avdecc_pico::addressing::Eui48;
//! use avdecc_pico::configuration::EntityConfig;
//! use avdecc_pico::entity::{AdpAdvertiser, Handler};
//! use avdecc_pico::eui64;
//! use avdecc_pico::net::MockNetIo;
//!
//! let mut net = MockNetIo::new(Eui48::new([0x02, 0, 0, 0, 0, 1]));
//! let mut adp = AdpAdvertiser::new(EntityConfig::new(eui64!(0x10), eui64!(0x20)));
//!
//! adp.tick(&mut net, 0).unwrap();
//! adp.tick(&mut net, 1_000).unwrap();
//! assert_eq!(net.sent_frames().len(), 1);
//! assert_eq!(adp.available_index(), 1);
//! ```

use crate::addressing::Eui64;
use crate::configuration::EntityConfig;
use crate::entity::handler::Handler;
use crate::error::Result;
use crate::net::transport::NetIo;
use crate::protocol::adpdu::Adpdu;
use crate::protocol::constants::{AdpMessageType, ADP_FRAME_SIZE};
use crate::protocol::frame::FrameBuffer;

/// Periodic ADP ENTITY_AVAILABLE sender for one entity.
#[derive(Debug)]
pub struct AdpAdvertiser {
    config: EntityConfig,
    available_index: u32,
    /// 0 means "send on the next tick"
    next_send_time: u64,
    tx: FrameBuffer<ADP_FRAME_SIZE>,
}

impl AdpAdvertiser {
    pub fn new(config: EntityConfig) -> Self {
        Self {
            config,
            available_index: 0,
            next_send_time: 0,
            tx: FrameBuffer::new(),
        }
    }

    pub const fn config(&self) -> &EntityConfig {
        &self.config
    }

    /// Replace the advertised configuration and readvertise on the next tick.
    pub fn set_config(&mut self, config: EntityConfig) {
        self.config = config;
        self.next_send_time = 0;
    }

    /// Index carried by the next ENTITY_AVAILABLE.
    pub const fn available_index(&self) -> u32 {
        self.available_index
    }

    pub const fn next_send_time(&self) -> u64 {
        self.next_send_time
    }

    /// Record a new gPTP grandmaster. A change forces an advertisement on
    /// the next tick.
    pub fn set_gptp_grandmaster_id(&mut self, grandmaster_id: Eui64, domain_number: u8) {
        if self.config.gptp_grandmaster_id == grandmaster_id
            && self.config.gptp_domain_number == domain_number
        {
            return;
        }
        crate::avdecc_log!(info, "gPTP grandmaster changed to {}", grandmaster_id);
        self.config.gptp_grandmaster_id = grandmaster_id;
        self.config.gptp_domain_number = domain_number;
        self.next_send_time = 0;
    }

    /// Send ENTITY_AVAILABLE now, then advance `available_index`.
    pub fn send_adp(&mut self, net: &mut dyn NetIo) -> Result<()> {
        self.send(net, AdpMessageType::EntityAvailable)?;
        self.available_index = self.available_index.wrapping_add(1);
        Ok(())
    }

    /// Send ENTITY_DEPARTING. The caller stops ticking the advertiser afterwards.
    pub fn send_departing(&mut self, net: &mut dyn NetIo) -> Result<()> {
        crate::avdecc_log!(info, "Entity {} departing", self.config.entity_id);
        self.send(net, AdpMessageType::EntityDeparting)
    }

    fn send(&mut self, net: &mut dyn NetIo, message_type: AdpMessageType) -> Result<()> {
        self.tx.clear();
        Adpdu::from_config(&self.config, message_type, self.available_index)
            .encode(net.mac_address(), &mut self.tx)?;
        net.send_frame(self.tx.as_slice())
    }
}

impl Handler for AdpAdvertiser {
    fn tick(&mut self, net: &mut dyn NetIo, now: u64) -> Result<()> {
        if now >= self.next_send_time {
            self.send_adp(net)?;
            self.next_send_time = now + self.config.advertise_interval_ms();
        }
        Ok(())
    }

    /// Answers ENTITY_DISCOVER for everyone or for this entity. A discover
    /// aimed at this entity is claimed; a global one is left for the other
    /// advertisers sharing the transport.
    fn receive_pdu(&mut self, net: &mut dyn NetIo, frame: &[u8]) -> Result<bool> {
        let Ok(adpdu) = Adpdu::parse(frame) else {
            return Ok(false);
        };
        if adpdu.message_type != AdpMessageType::EntityDiscover {
            return Ok(false);
        }
        let targeted = adpdu.entity_id == self.config.entity_id;
        if !targeted && adpdu.entity_id.is_set() {
            return Ok(false);
        }

        crate::avdecc_log!(debug, "ENTITY_DISCOVER for {}", adpdu.entity_id);
        self.send_adp(net)?;
        self.next_send_time = net.time_in_millis() + self.config.advertise_interval_ms();
        Ok(targeted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addressing::Eui48;
    use crate::net::mock_transport::MockNetIo;
    use crate::protocol::constants::ADP_MULTICAST_MAC;

    const OWN_MAC: Eui48 = Eui48::new([0x02, 0, 0, 0, 0, 0x01]);

    fn advertiser() -> AdpAdvertiser {
        AdpAdvertiser::new(
            EntityConfig::new(Eui64::from_u64(0x10), Eui64::from_u64(0x20)).with_valid_time(62),
        )
    }

    fn discover_frame(entity_id: Eui64) -> Vec<u8> {
        let mut fb: FrameBuffer = FrameBuffer::new();
        Adpdu::discover(entity_id)
            .encode(Eui48::new([0x02, 0, 0, 0, 0, 0x99]), &mut fb)
            .unwrap();
        fb.as_slice().to_vec()
    }

    #[test]
    fn test_cadence_is_quarter_of_valid_time() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut adp = advertiser();

        adp.tick(&mut net, 0).unwrap();
        assert_eq!(adp.next_send_time(), 15_500);
        adp.tick(&mut net, 15_499).unwrap();
        assert_eq!(net.sent_frames().len(), 1);
        adp.tick(&mut net, 15_500).unwrap();
        assert_eq!(net.sent_frames().len(), 2);
        assert_eq!(adp.next_send_time(), 31_000);
    }

    #[test]
    fn test_available_index_increments_after_send() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut adp = advertiser();

        adp.send_adp(&mut net).unwrap();
        adp.send_adp(&mut net).unwrap();

        let first = Adpdu::parse(&net.sent_frames()[0]).unwrap();
        let second = Adpdu::parse(&net.sent_frames()[1]).unwrap();
        assert_eq!(first.available_index, 0);
        assert_eq!(second.available_index, 1);
        assert_eq!(first.message_type, AdpMessageType::EntityAvailable);
        assert_eq!(&net.sent_frames()[0][..6], &ADP_MULTICAST_MAC.octets());
        assert_eq!(&net.sent_frames()[0][6..12], &OWN_MAC.octets());
    }

    #[test]
    fn test_available_index_wraps_to_zero() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut adp = advertiser();
        adp.available_index = u32::MAX;

        adp.send_adp(&mut net).unwrap();
        adp.send_adp(&mut net).unwrap();

        let first = Adpdu::parse(&net.sent_frames()[0]).unwrap();
        let second = Adpdu::parse(&net.sent_frames()[1]).unwrap();
        assert_eq!(first.available_index, u32::MAX);
        assert_eq!(second.available_index, 0);
        assert_eq!(adp.available_index(), 1);
    }

    #[test]
    fn test_out_of_range_valid_time_keeps_cadence_inside_window() {
        let mut config = EntityConfig::new(Eui64::from_u64(0x10), Eui64::from_u64(0x20));
        config.valid_time_seconds = 255;
        let mut net = MockNetIo::new(OWN_MAC);
        let mut adp = AdpAdvertiser::new(config);

        adp.tick(&mut net, 0).unwrap();
        let advertised = Adpdu::parse(net.last_sent().unwrap()).unwrap().valid_time_seconds;
        assert_eq!(advertised, 62);
        assert!(adp.next_send_time() <= u64::from(advertised) * 1_000);
        assert_eq!(adp.next_send_time(), 15_500);

        config.valid_time_seconds = 0;
        let mut net = MockNetIo::new(OWN_MAC);
        let mut adp = AdpAdvertiser::new(config);
        for now in 0..10 {
            adp.tick(&mut net, now).unwrap();
        }
        assert_eq!(net.sent_frames().len(), 1);
        let advertised = Adpdu::parse(net.last_sent().unwrap()).unwrap().valid_time_seconds;
        assert_eq!(advertised, 2);
        assert_eq!(adp.next_send_time(), 500);
    }

    #[test]
    fn test_failed_send_keeps_index_and_retries() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut adp = advertiser();
        net.set_fail_sends(true);
        assert!(adp.tick(&mut net, 0).is_err());
        assert_eq!(adp.available_index(), 0);

        net.set_fail_sends(false);
        adp.tick(&mut net, 5).unwrap();
        assert_eq!(adp.available_index(), 1);
    }

    #[test]
    fn test_departing_does_not_advance_index() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut adp = advertiser();
        adp.send_departing(&mut net).unwrap();

        let pdu = Adpdu::parse(net.last_sent().unwrap()).unwrap();
        assert_eq!(pdu.message_type, AdpMessageType::EntityDeparting);
        assert_eq!(adp.available_index(), 0);
    }

    #[test]
    fn test_discover_triggers_advertisement() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut adp = advertiser();
        adp.tick(&mut net, 0).unwrap();
        net.clear_sent();
        net.set_time(1_000);

        assert!(!adp.receive_pdu(&mut net, &discover_frame(Eui64::ZERO)).unwrap());
        assert_eq!(net.sent_frames().len(), 1);
        assert_eq!(adp.next_send_time(), 16_500);

        assert!(adp.receive_pdu(&mut net, &discover_frame(Eui64::from_u64(0x10))).unwrap());
        assert_eq!(net.sent_frames().len(), 2);

        assert!(!adp.receive_pdu(&mut net, &discover_frame(Eui64::from_u64(0x11))).unwrap());
        assert_eq!(net.sent_frames().len(), 2);
    }

    #[test]
    fn test_ignores_other_adp_messages() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut adp = advertiser();
        let mut fb: FrameBuffer = FrameBuffer::new();
        Adpdu::from_config(
            &EntityConfig::new(Eui64::from_u64(0x77), Eui64::ZERO),
            AdpMessageType::EntityAvailable,
            3,
        )
        .encode(Eui48::new([0x02, 0, 0, 0, 0, 0x77]), &mut fb)
        .unwrap();

        assert!(!adp.receive_pdu(&mut net, fb.as_slice()).unwrap());
        assert!(!adp.receive_pdu(&mut net, &[0u8; 20]).unwrap());
        assert!(net.sent_frames().is_empty());
    }

    #[test]
    fn test_grandmaster_change_forces_readvertise() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut adp = advertiser();
        adp.tick(&mut net, 0).unwrap();

        adp.set_gptp_grandmaster_id(Eui64::ZERO, 0);
        assert_eq!(adp.next_send_time(), 15_500);

        adp.set_gptp_grandmaster_id(Eui64::from_u64(0xABCD), 0);
        adp.tick(&mut net, 100).unwrap();
        assert_eq!(net.sent_frames().len(), 2);
        let pdu = Adpdu::parse(net.last_sent().unwrap()).unwrap();
        assert_eq!(pdu.gptp_grandmaster_id, Eui64::from_u64(0xABCD));
    }
}
