//! ADP (AVDECC Discovery Protocol) data units.
//!
//! ```text
//! offset  field (after the Ethernet header)
//!  0      cd | subtype 0x7A
//!  1      sv | version | message_type
//!  2      valid_time(5) | control_data_length(11) = 56
//!  4      entity_id
//! 12      entity_model_id
//! 20      entity_capabilities
//! 24      talker_stream_sources, talker_capabilities
//! 28      listener_stream_sinks, listener_capabilities
//! 32      controller_capabilities
//! 36      available_index
//! 40      gptp_grandmaster_id
//! 48      gptp_domain_number, reserved(3)
//! 52      identify_control_index, interface_index
//! 56      association_id
//! 64      reserved(4)
//! ```

use crate::addressing::{EntityId, EntityModelId, Eui48, Eui64};
use crate::configuration::EntityConfig;
use crate::error::{AvdeccError, Result};
use crate::protocol::constants::{
    AdpMessageType, ADPDU_CONTROL_DATA_LENGTH, ADP_MULTICAST_MAC, SUBTYPE_ADP,
};
use crate::protocol::frame::{
    avtp_payload, ControlHeader, EthernetHeader, FrameBuffer, FrameReader,
};

/// One ADP message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Adpdu {
    pub message_type: AdpMessageType,
    /// Validity in seconds (carried in 2-second units)
    pub valid_time_seconds: u8,
    pub entity_id: EntityId,
    pub entity_model_id: EntityModelId,
    pub entity_capabilities: u32,
    pub talker_stream_sources: u16,
    pub talker_capabilities: u16,
    pub listener_stream_sinks: u16,
    pub listener_capabilities: u16,
    pub controller_capabilities: u32,
    pub available_index: u32,
    pub gptp_grandmaster_id: Eui64,
    pub gptp_domain_number: u8,
    pub identify_control_index: u16,
    pub interface_index: u16,
    pub association_id: Eui64,
}

impl Adpdu {
    /// Build an advertisement from the live configuration.
    pub fn from_config(
        config: &EntityConfig,
        message_type: AdpMessageType,
        available_index: u32,
    ) -> Self {
        Self {
            message_type,
            valid_time_seconds: config.encoded_valid_time() * 2,
            entity_id: config.entity_id,
            entity_model_id: config.entity_model_id,
            entity_capabilities: config.entity_capabilities,
            talker_stream_sources: config.talker_stream_sources,
            talker_capabilities: config.talker_capabilities,
            listener_stream_sinks: config.listener_stream_sinks,
            listener_capabilities: config.listener_capabilities,
            controller_capabilities: config.controller_capabilities,
            available_index,
            gptp_grandmaster_id: config.gptp_grandmaster_id,
            gptp_domain_number: config.gptp_domain_number,
            identify_control_index: config.identify_control_index,
            interface_index: config.interface_index,
            association_id: config.association_id,
        }
    }

    /// ENTITY_DISCOVER for one entity, or for everyone with [`Eui64::ZERO`].
    pub fn discover(entity_id: EntityId) -> Self {
        let mut pdu = Self::from_config(&EntityConfig::default(), AdpMessageType::EntityDiscover, 0);
        pdu.valid_time_seconds = 0;
        pdu.entity_id = entity_id;
        pdu.entity_capabilities = 0;
        pdu
    }

    /// Write a complete Ethernet frame addressed to the ADP multicast MAC.
    pub fn encode<const N: usize>(&self, source: Eui48, fb: &mut FrameBuffer<N>) -> Result<()> {
        EthernetHeader::avtp(ADP_MULTICAST_MAC, source).encode(fb)?;
        ControlHeader {
            subtype: SUBTYPE_ADP,
            message_type: self.message_type.to_u8(),
            status: (self.valid_time_seconds / 2).min(31),
            control_data_length: ADPDU_CONTROL_DATA_LENGTH,
            entity_id: self.entity_id,
        }
        .encode(fb)?;
        fb.put_eui64(self.entity_model_id)?;
        fb.put_u32(self.entity_capabilities)?;
        fb.put_u16(self.talker_stream_sources)?;
        fb.put_u16(self.talker_capabilities)?;
        fb.put_u16(self.listener_stream_sinks)?;
        fb.put_u16(self.listener_capabilities)?;
        fb.put_u32(self.controller_capabilities)?;
        fb.put_u32(self.available_index)?;
        fb.put_eui64(self.gptp_grandmaster_id)?;
        fb.put_u8(self.gptp_domain_number)?;
        fb.put_zeros(3)?;
        fb.put_u16(self.identify_control_index)?;
        fb.put_u16(self.interface_index)?;
        fb.put_eui64(self.association_id)?;
        fb.put_zeros(4)
    }

    /// Parse an ADP frame including its Ethernet header.
    ///
    /// # Errors
    ///
    /// - `InvalidEthertype` / `UnexpectedSubtype` for frames that are not ADP
    /// - `UnexpectedMessageType` for an unknown ADP message type
    /// - `MalformedPdu` if the frame is shorter than its declared length
    pub fn parse(frame: &[u8]) -> Result<Self> {
        let avtp = avtp_payload(frame)?;
        let header = ControlHeader::parse(avtp)?;
        if header.subtype != SUBTYPE_ADP {
            return Err(AvdeccError::unexpected_subtype());
        }
        let message_type = AdpMessageType::from_u8(header.message_type)
            .ok_or_else(AvdeccError::unexpected_message_type)?;
        if header.control_data_length < ADPDU_CONTROL_DATA_LENGTH {
            return Err(AvdeccError::malformed_pdu());
        }

        let mut r = FrameReader::at(avtp, ControlHeader::SIZE);
        let entity_model_id = r.get_eui64()?;
        let entity_capabilities = r.get_u32()?;
        let talker_stream_sources = r.get_u16()?;
        let talker_capabilities = r.get_u16()?;
        let listener_stream_sinks = r.get_u16()?;
        let listener_capabilities = r.get_u16()?;
        let controller_capabilities = r.get_u32()?;
        let available_index = r.get_u32()?;
        let gptp_grandmaster_id = r.get_eui64()?;
        let gptp_domain_number = r.get_u8()?;
        r.skip(3)?;
        let identify_control_index = r.get_u16()?;
        let interface_index = r.get_u16()?;
        let association_id = r.get_eui64()?;
        r.skip(4)?;

        Ok(Self {
            message_type,
            valid_time_seconds: header.status * 2,
            entity_id: header.entity_id,
            entity_model_id,
            entity_capabilities,
            talker_stream_sources,
            talker_capabilities,
            listener_stream_sinks,
            listener_capabilities,
            controller_capabilities,
            available_index,
            gptp_grandmaster_id,
            gptp_domain_number,
            identify_control_index,
            interface_index,
            association_id,
        })
    }
}
