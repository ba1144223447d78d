//! AECP (AVDECC Enumeration and Control Protocol) PDUs.
//!
//! This module provides zero-copy views over received AEM and Address Access
//! frames, classification helpers, and the helpers that turn a command into
//! its response.
//!
//! ## AEM Frame Layout
//!
//! ```text
//! offset  field (from the start of the Ethernet frame)
//!  0      Ethernet header (14 bytes)
//! 14      cd | subtype 0x7B
//! 15      sv | version | message_type
//! 16      status(5) | control_data_length(11)
//! 18      target_entity_id
//! 26      controller_entity_id      <- control_data_length counts from here
//! 34      sequence_id
//! 36      u | command_type          (AA: tlv_count)
//! 38      command specific data     (AA: TLVs)
//! ```
//!
//! ## Example
//!
//! ```
//! use avdecc_pico::addressing::{Eui48, Eui64};
//! use avdecc_pico::protocol::aecp::{AemHeader, AemPdu};
//! use avdecc_pico::protocol::constants::{AecpMessageType, AemCommandType};
//! use avdecc_pico::protocol::frame::FrameBuffer;
//!
//! let header = AemHeader::command(
//!     Eui64::from_u64(0x10),
//!     Eui64::from_u64(0x20),
//!     7,
//!     AemCommandType::GetConfiguration,
//! );
//! let mut frame: FrameBuffer = FrameBuffer::new();
//! header
//!     .encode(Eui48::new([2, 0, 0, 0, 0, 0x10]), Eui48::new([2, 0, 0, 0, 0, 0x20]), &[0, 0, 0, 0], &mut frame)
//!     .unwrap();
//!
//! let pdu = AemPdu::parse(frame.as_slice()).unwrap();
//! assert!(pdu.is_command_for(Eui64::from_u64(0x10)));
//! assert_eq!(pdu.command_type(), Some(AemCommandType::GetConfiguration));
//! assert_eq!(pdu.message_type(), AecpMessageType::AemCommand);
//! ```

use crate::addressing::{EntityId, Eui48, Eui64};
use crate::error::{AvdeccError, Result};
use crate::protocol::constants::{
    AaMode, AecpMessageType, AemCommandType, AemStatus, AEM_UNSOLICITED_BIT, ETHERNET_HEADER_SIZE,
    SUBTYPE_AECP,
};
use crate::protocol::frame::{
    avtp_payload, pack_status_length, ControlHeader, EthernetHeader, FrameBuffer, FrameReader,
};

/// Offset of the message type byte
pub const MESSAGE_TYPE_OFFSET: usize = ETHERNET_HEADER_SIZE + 1;
/// Offset of the status / control_data_length doublet
pub const STATUS_LENGTH_OFFSET: usize = ETHERNET_HEADER_SIZE + 2;
/// Offset of target_entity_id
pub const TARGET_ENTITY_ID_OFFSET: usize = ETHERNET_HEADER_SIZE + 4;
/// Offset from which control_data_length is counted
pub const CONTROL_DATA_OFFSET: usize = ETHERNET_HEADER_SIZE + ControlHeader::SIZE;
/// Offset of controller_entity_id
pub const CONTROLLER_ENTITY_ID_OFFSET: usize = CONTROL_DATA_OFFSET;
/// Offset of sequence_id
pub const SEQUENCE_ID_OFFSET: usize = CONTROL_DATA_OFFSET + 8;
/// Offset of command_type (AEM) or tlv_count (AA)
pub const COMMAND_TYPE_OFFSET: usize = CONTROL_DATA_OFFSET + 10;
/// Offset of the command specific data (AEM) or the first TLV (AA)
pub const PAYLOAD_OFFSET: usize = CONTROL_DATA_OFFSET + 12;
/// Smallest valid control_data_length for AEM and AA PDUs
pub const MIN_CONTROL_DATA_LENGTH: u16 = 12;

/// Parse the parts common to AEM and AA PDUs and return the frame trimmed to
/// its declared length.
fn parse_aecp(frame: &[u8]) -> Result<(&[u8], ControlHeader, AecpMessageType)> {
    let avtp = avtp_payload(frame)?;
    let header = ControlHeader::parse(avtp)?;
    if header.subtype != SUBTYPE_AECP {
        return Err(AvdeccError::unexpected_subtype());
    }
    let message_type = AecpMessageType::from_u8(header.message_type)
        .ok_or_else(AvdeccError::unexpected_message_type)?;
    let total = CONTROL_DATA_OFFSET + header.control_data_length as usize;
    if header.control_data_length < MIN_CONTROL_DATA_LENGTH || total > frame.len() {
        return Err(AvdeccError::malformed_pdu());
    }
    Ok((&frame[..total], header, message_type))
}

#[inline(always)]
fn read_u16(data: &[u8], pos: usize) -> u16 {
    u16::from_be_bytes([data[pos], data[pos + 1]])
}

#[inline(always)]
fn read_eui64(data: &[u8], pos: usize) -> Eui64 {
    let mut octets = [0u8; 8];
    octets.copy_from_slice(&data[pos..pos + 8]);
    Eui64::new(octets)
}

#[inline(always)]
fn read_eui48(data: &[u8], pos: usize) -> Eui48 {
    let mut octets = [0u8; 6];
    octets.copy_from_slice(&data[pos..pos + 6]);
    Eui48::new(octets)
}

// =============================================================================
// AEM
// =============================================================================

/// Zero-copy view of an AEM command or response frame.
#[derive(Debug, Clone, Copy)]
pub struct AemPdu<'a> {
    data: &'a [u8],
    message_type: AecpMessageType,
    status: u8,
}

impl<'a> AemPdu<'a> {
    /// Parse an AEM frame including its Ethernet header.
    ///
    /// # Errors
    ///
    /// - `InvalidEthertype` / `UnexpectedSubtype` for non-AECP frames
    /// - `UnsupportedVersion` if the AVTP version is not 0
    /// - `UnexpectedMessageType` for Address Access or vendor unique PDUs
    /// - `MalformedPdu` if the declared length does not fit the frame
    #[inline]
    pub fn parse(frame: &'a [u8]) -> Result<Self> {
        let (data, header, message_type) = parse_aecp(frame)?;
        if !matches!(
            message_type,
            AecpMessageType::AemCommand | AecpMessageType::AemResponse
        ) {
            return Err(AvdeccError::unexpected_message_type());
        }
        Ok(Self {
            data,
            message_type,
            status: header.status,
        })
    }

    #[inline(always)]
    pub const fn message_type(&self) -> AecpMessageType {
        self.message_type
    }

    #[inline(always)]
    pub const fn is_command(&self) -> bool {
        self.message_type.is_command()
    }

    /// Raw 5-bit status
    #[inline(always)]
    pub const fn status(&self) -> u8 {
        self.status
    }

    pub const fn aem_status(&self) -> Option<AemStatus> {
        AemStatus::from_u8(self.status)
    }

    pub fn target_entity_id(&self) -> EntityId {
        read_eui64(self.data, TARGET_ENTITY_ID_OFFSET)
    }

    pub fn controller_entity_id(&self) -> EntityId {
        read_eui64(self.data, CONTROLLER_ENTITY_ID_OFFSET)
    }

    pub fn sequence_id(&self) -> u16 {
        read_u16(self.data, SEQUENCE_ID_OFFSET)
    }

    /// command_type including the unsolicited bit
    pub fn raw_command_type(&self) -> u16 {
        read_u16(self.data, COMMAND_TYPE_OFFSET)
    }

    /// command_type with the unsolicited bit stripped
    pub fn stripped_command_type(&self) -> u16 {
        self.raw_command_type() & !AEM_UNSOLICITED_BIT
    }

    pub fn command_type(&self) -> Option<AemCommandType> {
        AemCommandType::from_u16(self.raw_command_type())
    }

    pub fn is_unsolicited(&self) -> bool {
        self.raw_command_type() & AEM_UNSOLICITED_BIT != 0
    }

    pub fn destination_mac(&self) -> Eui48 {
        read_eui48(self.data, 0)
    }

    pub fn source_mac(&self) -> Eui48 {
        read_eui48(self.data, 6)
    }

    /// Command specific data
    #[inline(always)]
    pub fn payload(&self) -> &'a [u8] {
        &self.data[PAYLOAD_OFFSET..]
    }

    /// The whole frame, trimmed to the declared length
    #[inline(always)]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// AEM command addressed to `entity_id`
    pub fn is_command_for(&self, entity_id: EntityId) -> bool {
        self.is_command() && self.target_entity_id() == entity_id
    }

    /// AEM response addressed to the controller `entity_id`
    pub fn is_response_for(&self, entity_id: EntityId) -> bool {
        !self.is_command() && self.controller_entity_id() == entity_id
    }
}

/// Header fields of an AEM PDU to be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AemHeader {
    pub message_type: AecpMessageType,
    pub status: u8,
    pub target_entity_id: EntityId,
    pub controller_entity_id: EntityId,
    pub sequence_id: u16,
    /// command_type including the unsolicited bit
    pub command_type: u16,
}

impl AemHeader {
    /// Header of an AEM_COMMAND
    pub const fn command(
        target_entity_id: EntityId,
        controller_entity_id: EntityId,
        sequence_id: u16,
        command_type: AemCommandType,
    ) -> Self {
        Self {
            message_type: AecpMessageType::AemCommand,
            status: 0,
            target_entity_id,
            controller_entity_id,
            sequence_id,
            command_type: command_type.to_u16(),
        }
    }

    /// Write a complete AEM frame with `payload` as command specific data.
    pub fn encode<const N: usize>(
        &self,
        destination: Eui48,
        source: Eui48,
        payload: &[u8],
        fb: &mut FrameBuffer<N>,
    ) -> Result<()> {
        let control_data_length = MIN_CONTROL_DATA_LENGTH as usize + payload.len();
        if control_data_length > ControlHeader::MAX_CONTROL_DATA_LENGTH as usize {
            return Err(AvdeccError::buffer_overflow());
        }
        EthernetHeader::avtp(destination, source).encode(fb)?;
        ControlHeader {
            subtype: SUBTYPE_AECP,
            message_type: self.message_type.to_u8(),
            status: self.status,
            control_data_length: control_data_length as u16,
            entity_id: self.target_entity_id,
        }
        .encode(fb)?;
        fb.put_eui64(self.controller_entity_id)?;
        fb.put_u16(self.sequence_id)?;
        fb.put_u16(self.command_type)?;
        fb.put_slice(payload)
    }
}

// =============================================================================
// Command -> Response
// =============================================================================

/// Turn a command frame into its response in place.
///
/// Flips `*_COMMAND` to `*_RESPONSE`, writes `status` and recomputes
/// control_data_length for a frame that is `new_total_length` bytes long
/// (Ethernet header included). Addresses are left alone; the transport swaps
/// them when the reply is sent.
pub fn rewrite_as_reply(buf: &mut [u8], status: u8, new_total_length: usize) -> Result<()> {
    if buf.len() < PAYLOAD_OFFSET || new_total_length < PAYLOAD_OFFSET {
        return Err(AvdeccError::malformed_pdu());
    }
    let control_data_length = new_total_length - CONTROL_DATA_OFFSET;
    if control_data_length > ControlHeader::MAX_CONTROL_DATA_LENGTH as usize {
        return Err(AvdeccError::buffer_overflow());
    }
    let message_type = AecpMessageType::from_u8(buf[MESSAGE_TYPE_OFFSET] & 0x0F)
        .ok_or_else(AvdeccError::unexpected_message_type)?;
    buf[MESSAGE_TYPE_OFFSET] =
        (buf[MESSAGE_TYPE_OFFSET] & 0xF0) | message_type.to_response().to_u8();
    let packed = pack_status_length(status, control_data_length as u16);
    buf[STATUS_LENGTH_OFFSET..STATUS_LENGTH_OFFSET + 2].copy_from_slice(&packed.to_be_bytes());
    Ok(())
}

/// Build the response to `command` into a fresh buffer.
///
/// Produces the same bytes as copying the command header, appending
/// `payload` and calling [`rewrite_as_reply`].
pub fn build_response<const N: usize>(
    command: &AemPdu<'_>,
    status: AemStatus,
    payload: &[u8],
    fb: &mut FrameBuffer<N>,
) -> Result<()> {
    fb.clear();
    fb.put_slice(&command.as_bytes()[..PAYLOAD_OFFSET])?;
    fb.put_slice(payload)?;
    let len = fb.len();
    rewrite_as_reply(fb.as_mut_slice(), status.to_u8(), len)
}

// =============================================================================
// Address Access
// =============================================================================

/// Zero-copy view of an Address Access command or response frame.
#[derive(Debug, Clone, Copy)]
pub struct AaPdu<'a> {
    data: &'a [u8],
    message_type: AecpMessageType,
    status: u8,
}

impl<'a> AaPdu<'a> {
    /// Parse an Address Access frame including its Ethernet header.
    pub fn parse(frame: &'a [u8]) -> Result<Self> {
        let (data, header, message_type) = parse_aecp(frame)?;
        if !matches!(
            message_type,
            AecpMessageType::AddressAccessCommand | AecpMessageType::AddressAccessResponse
        ) {
            return Err(AvdeccError::unexpected_message_type());
        }
        Ok(Self {
            data,
            message_type,
            status: header.status,
        })
    }

    pub const fn message_type(&self) -> AecpMessageType {
        self.message_type
    }

    pub const fn is_command(&self) -> bool {
        self.message_type.is_command()
    }

    pub const fn status(&self) -> u8 {
        self.status
    }

    pub fn target_entity_id(&self) -> EntityId {
        read_eui64(self.data, TARGET_ENTITY_ID_OFFSET)
    }

    pub fn controller_entity_id(&self) -> EntityId {
        read_eui64(self.data, CONTROLLER_ENTITY_ID_OFFSET)
    }

    pub fn sequence_id(&self) -> u16 {
        read_u16(self.data, SEQUENCE_ID_OFFSET)
    }

    pub fn tlv_count(&self) -> u16 {
        read_u16(self.data, COMMAND_TYPE_OFFSET)
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    pub fn is_command_for(&self, entity_id: EntityId) -> bool {
        self.is_command() && self.target_entity_id() == entity_id
    }

    pub fn is_response_for(&self, entity_id: EntityId) -> bool {
        !self.is_command() && self.controller_entity_id() == entity_id
    }

    /// Iterate the TLVs. READ TLVs carry data only in responses.
    pub fn tlvs(&self) -> AaTlvIter<'a> {
        AaTlvIter {
            reader: FrameReader::at(self.data, PAYLOAD_OFFSET),
            remaining: self.tlv_count(),
            is_command: self.is_command(),
        }
    }
}

/// One Address Access TLV.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AaTlv<'a> {
    /// Raw 4-bit mode
    pub mode: u8,
    /// Number of bytes to access
    pub length: u16,
    pub address: u64,
    /// Data carried in the PDU (empty for READ commands)
    pub data: &'a [u8],
}

impl AaTlv<'_> {
    /// Size of the mode/length and address fields
    pub const HEADER_SIZE: usize = 10;

    pub const fn aa_mode(&self) -> Option<AaMode> {
        AaMode::from_u8(self.mode)
    }

    /// Size on the wire
    pub const fn encoded_len(&self) -> usize {
        Self::HEADER_SIZE + self.data.len()
    }

    /// Append this TLV to a frame buffer
    pub fn encode<const N: usize>(&self, fb: &mut FrameBuffer<N>) -> Result<()> {
        fb.put_u16((u16::from(self.mode & 0x0F) << 12) | (self.length & 0x0FFF))?;
        fb.put_u64(self.address)?;
        fb.put_slice(self.data)
    }
}

/// Iterator over the TLVs of an [`AaPdu`]. Yields `MalformedPdu` once and
/// stops if a TLV runs past the end of the frame.
#[derive(Debug, Clone)]
pub struct AaTlvIter<'a> {
    reader: FrameReader<'a>,
    remaining: u16,
    is_command: bool,
}

impl<'a> AaTlvIter<'a> {
    fn read_tlv(&mut self) -> Result<AaTlv<'a>> {
        let mode_length = self.reader.get_u16()?;
        let mode = (mode_length >> 12) as u8;
        let length = mode_length & 0x0FFF;
        let address = self.reader.get_u64()?;
        let data: &'a [u8] = if self.is_command && mode == AaMode::Read.to_u8() {
            &[]
        } else {
            self.reader.get_slice(length as usize)?
        };
        Ok(AaTlv {
            mode,
            length,
            address,
            data,
        })
    }
}

impl<'a> Iterator for AaTlvIter<'a> {
    type Item = Result<AaTlv<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let tlv = self.read_tlv();
        if tlv.is_err() {
            self.remaining = 0;
        }
        Some(tlv)
    }
}

/// Header fields of an Address Access PDU to be sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AaHeader {
    pub message_type: AecpMessageType,
    pub status: u8,
    pub target_entity_id: EntityId,
    pub controller_entity_id: EntityId,
    pub sequence_id: u16,
}

impl AaHeader {
    /// Write an Address Access frame carrying `tlvs`.
    pub fn encode<const N: usize>(
        &self,
        destination: Eui48,
        source: Eui48,
        tlvs: &[AaTlv<'_>],
        fb: &mut FrameBuffer<N>,
    ) -> Result<()> {
        let body: usize = tlvs.iter().map(AaTlv::encoded_len).sum();
        let control_data_length = MIN_CONTROL_DATA_LENGTH as usize + body;
        if control_data_length > ControlHeader::MAX_CONTROL_DATA_LENGTH as usize {
            return Err(AvdeccError::buffer_overflow());
        }
        EthernetHeader::avtp(destination, source).encode(fb)?;
        ControlHeader {
            subtype: SUBTYPE_AECP,
            message_type: self.message_type.to_u8(),
            status: self.status,
            control_data_length: control_data_length as u16,
            entity_id: self.target_entity_id,
        }
        .encode(fb)?;
        fb.put_eui64(self.controller_entity_id)?;
        fb.put_u16(self.sequence_id)?;
        fb.put_u16(tlvs.len() as u16)?;
        for tlv in tlvs {
            tlv.encode(fb)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: Eui64 = Eui64::from_u64(0x0001_0203_0405_0607);
    const CONTROLLER: Eui64 = Eui64::from_u64(0x1011_1213_1415_1617);
    const TARGET_MAC: Eui48 = Eui48::new([0x02, 0, 0, 0, 0, 0x01]);
    const CONTROLLER_MAC: Eui48 = Eui48::new([0x02, 0, 0, 0, 0, 0x02]);

    fn command(command_type: AemCommandType, payload: &[u8]) -> FrameBuffer {
        let mut fb = FrameBuffer::new();
        AemHeader::command(TARGET, CONTROLLER, 0x1234, command_type)
            .encode(TARGET_MAC, CONTROLLER_MAC, payload, &mut fb)
            .unwrap();
        fb
    }

    #[test]
    fn test_command_layout() {
        let fb = command(AemCommandType::SetControl, &[0xAA, 0xBB]);
        let bytes = fb.as_slice();
        assert_eq!(bytes.len(), PAYLOAD_OFFSET + 2);
        assert_eq!(bytes[14], 0xFB);
        assert_eq!(bytes[15], 0x00);
        assert_eq!(&bytes[16..18], &[0x00, 14]);
        assert_eq!(&bytes[34..36], &[0x12, 0x34]);
        assert_eq!(&bytes[36..38], &[0x00, 0x18]);
    }

    #[test]
    fn test_parse_accessors() {
        let fb = command(AemCommandType::GetName, &[1, 2, 3]);
        let pdu = AemPdu::parse(fb.as_slice()).unwrap();
        assert_eq!(pdu.target_entity_id(), TARGET);
        assert_eq!(pdu.controller_entity_id(), CONTROLLER);
        assert_eq!(pdu.sequence_id(), 0x1234);
        assert_eq!(pdu.command_type(), Some(AemCommandType::GetName));
        assert_eq!(pdu.source_mac(), CONTROLLER_MAC);
        assert_eq!(pdu.destination_mac(), TARGET_MAC);
        assert_eq!(pdu.payload(), &[1, 2, 3]);
        assert!(pdu.is_command_for(TARGET));
        assert!(!pdu.is_command_for(CONTROLLER));
        assert!(!pdu.is_response_for(CONTROLLER));
    }

    #[test]
    fn test_parse_ignores_trailing_padding() {
        let mut fb = command(AemCommandType::GetName, &[1, 2]);
        fb.put_zeros(20).unwrap();
        let pdu = AemPdu::parse(fb.as_slice()).unwrap();
        assert_eq!(pdu.payload(), &[1, 2]);
    }

    #[test]
    fn test_parse_rejects_bad_lengths() {
        let fb = command(AemCommandType::GetName, &[1, 2, 3]);
        let err = AemPdu::parse(&fb.as_slice()[..fb.len() - 1]).unwrap_err();
        assert!(matches!(err, AvdeccError::Protocol(ref e) if e.is_malformed()));

        let mut short = command(AemCommandType::GetName, &[]);
        short.set_u16_at(STATUS_LENGTH_OFFSET, 11).unwrap();
        assert!(AemPdu::parse(short.as_slice()).is_err());
    }

    #[test]
    fn test_parse_classifies_foreign_frames() {
        let mut fb = command(AemCommandType::GetName, &[]);
        fb.set_u8_at(MESSAGE_TYPE_OFFSET, 2).unwrap();
        assert!(AemPdu::parse(fb.as_slice()).unwrap_err().is_not_for_me());
        assert!(AaPdu::parse(fb.as_slice()).is_ok());

        fb.set_u8_at(ETHERNET_HEADER_SIZE, 0xFA).unwrap();
        assert!(AemPdu::parse(fb.as_slice()).unwrap_err().is_not_for_me());
    }

    #[test]
    fn test_rewrite_as_reply_reparses_as_response() {
        let fb = command(AemCommandType::SetConfiguration, &[0, 0, 0, 1]);
        let mut reply = fb.clone();
        let len = reply.len();
        rewrite_as_reply(reply.as_mut_slice(), AemStatus::EntityLocked.to_u8(), len).unwrap();

        let pdu = AemPdu::parse(reply.as_slice()).unwrap();
        assert_eq!(pdu.message_type(), AecpMessageType::AemResponse);
        assert_eq!(pdu.aem_status(), Some(AemStatus::EntityLocked));
        assert_eq!(pdu.target_entity_id(), TARGET);
        assert_eq!(pdu.controller_entity_id(), CONTROLLER);
        assert_eq!(pdu.sequence_id(), 0x1234);
        assert!(pdu.is_response_for(CONTROLLER));
    }

    #[test]
    fn test_build_response_matches_rewrite() {
        let fb = command(AemCommandType::GetConfiguration, &[0, 0, 0, 0]);
        let pdu = AemPdu::parse(fb.as_slice()).unwrap();

        let mut built: FrameBuffer = FrameBuffer::new();
        build_response(&pdu, AemStatus::Success, &[0, 0, 0, 3], &mut built).unwrap();

        let mut rewritten = fb.clone();
        rewritten.set_u16_at(PAYLOAD_OFFSET + 2, 3).unwrap();
        let len = rewritten.len();
        rewrite_as_reply(rewritten.as_mut_slice(), 0, len).unwrap();

        assert_eq!(built.as_slice(), rewritten.as_slice());
    }

    #[test]
    fn test_aa_tlvs() {
        let data = [1, 2, 3, 4];
        let tlvs = [
            AaTlv {
                mode: AaMode::Read.to_u8(),
                length: 16,
                address: 0x100,
                data: &[],
            },
            AaTlv {
                mode: AaMode::Write.to_u8(),
                length: 4,
                address: 0x200,
                data: &data,
            },
        ];
        let mut fb: FrameBuffer = FrameBuffer::new();
        AaHeader {
            message_type: AecpMessageType::AddressAccessCommand,
            status: 0,
            target_entity_id: TARGET,
            controller_entity_id: CONTROLLER,
            sequence_id: 9,
        }
        .encode(TARGET_MAC, CONTROLLER_MAC, &tlvs, &mut fb)
        .unwrap();

        let pdu = AaPdu::parse(fb.as_slice()).unwrap();
        assert!(pdu.is_command_for(TARGET));
        assert_eq!(pdu.tlv_count(), 2);
        let parsed: heapless::Vec<AaTlv<'_>, 4> = pdu.tlvs().map(|t| t.unwrap()).collect();
        assert_eq!(parsed.as_slice(), &tlvs);
    }

    #[test]
    fn test_aa_truncated_tlv_stops_iteration() {
        let mut fb: FrameBuffer = FrameBuffer::new();
        AaHeader {
            message_type: AecpMessageType::AddressAccessCommand,
            status: 0,
            target_entity_id: TARGET,
            controller_entity_id: CONTROLLER,
            sequence_id: 1,
        }
        .encode(TARGET_MAC, CONTROLLER_MAC, &[], &mut fb)
        .unwrap();
        // Claim one TLV that is not there
        fb.set_u16_at(COMMAND_TYPE_OFFSET, 1).unwrap();

        let pdu = AaPdu::parse(fb.as_slice()).unwrap();
        let mut it = pdu.tlvs();
        assert!(it.next().unwrap().is_err());
        assert!(it.next().is_none());
    }
}
