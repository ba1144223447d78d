//! CONTROL descriptor values on the wire.
//!
//! - [`ControlValueHolder`]: fixed-size value storage with a dirty flag
//! - [`ControlSender`]: pushes a holder to a remote CONTROL with SET_CONTROL
//! - [`ControlReceiver`]: serves a contiguous range of local CONTROL descriptors
//!
//! A sender/receiver pair gives a lightweight "remote knob": the sender side
//! updates its holder, the next tick transmits the new value, and the
//! receiver side writes it into the matching holder.

use crate::addressing::{EntityId, Eui48};
use crate::entity::handler::Handler;
use crate::error::{AvdeccError, Result};
use crate::net::transport::NetIo;
use crate::protocol::aecp::{rewrite_as_reply, AemHeader, AemPdu, PAYLOAD_OFFSET};
use crate::protocol::aem::{ControlPayload, DescriptorRef, ReadDescriptorPayload};
use crate::protocol::constants::{AemCommandType, AemStatus, DESCRIPTOR_CONTROL};
use crate::protocol::frame::FrameBuffer;

// =============================================================================
// ControlValueHolder
// =============================================================================

/// Up to `N` bytes of control values: a scalar or an array of 1, 2 or 4
/// byte big-endian elements.
///
/// # Examples
///
/// ```
/// use avdecc_pico::entity::ControlValueHolder;
///
/// let mut level: ControlValueHolder<4> = ControlValueHolder::new(2, 1).unwrap();
/// assert!(level.set_u16(0, 0x1234).unwrap());
/// assert!(level.is_dirty());
/// assert_eq!(level.as_bytes(), &[0x12, 0x34]);
///
/// level.clear_dirty();
/// assert!(!level.set_u16(0, 0x1234).unwrap());
/// assert!(!level.is_dirty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlValueHolder<const N: usize> {
    values: [u8; N],
    element_size: u8,
    count: u16,
    dirty: bool,
}

impl<const N: usize> ControlValueHolder<N> {
    /// Holder for `count` elements of `element_size` bytes, all zero.
    ///
    /// # Errors
    ///
    /// - `InvalidState` if `element_size` is not 1, 2 or 4, or `count` is 0
    /// - `BufferOverflow` if the values do not fit in `N` bytes
    pub fn new(element_size: u8, count: u16) -> Result<Self> {
        if !matches!(element_size, 1 | 2 | 4) || count == 0 {
            return Err(AvdeccError::InvalidState);
        }
        if usize::from(element_size) * usize::from(count) > N {
            return Err(AvdeccError::buffer_overflow());
        }
        Ok(Self {
            values: [0; N],
            element_size,
            count,
            dirty: false,
        })
    }

    #[inline(always)]
    pub const fn element_size(&self) -> u8 {
        self.element_size
    }

    #[inline(always)]
    pub const fn count(&self) -> u16 {
        self.count
    }

    /// Size of the values in bytes
    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.element_size as usize * self.count as usize
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.values[..self.len()]
    }

    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Force the next sender tick to transmit.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Replace all values. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// `BufferOverflow` if `bytes` is not exactly [`len`](Self::len) long.
    pub fn set_bytes(&mut self, bytes: &[u8]) -> Result<bool> {
        if bytes.len() != self.len() {
            return Err(AvdeccError::buffer_overflow());
        }
        self.store(0, bytes)
    }

    pub fn set_u8(&mut self, index: u16, value: u8) -> Result<bool> {
        self.set_element(index, &[value])
    }

    pub fn set_u16(&mut self, index: u16, value: u16) -> Result<bool> {
        self.set_element(index, &value.to_be_bytes())
    }

    pub fn set_u32(&mut self, index: u16, value: u32) -> Result<bool> {
        self.set_element(index, &value.to_be_bytes())
    }

    pub fn get_u8(&self, index: u16) -> Option<u8> {
        self.element(index).map(|b| b[0])
    }

    pub fn get_u16(&self, index: u16) -> Option<u16> {
        self.element(index)
            .and_then(|b| b.try_into().ok())
            .map(u16::from_be_bytes)
    }

    pub fn get_u32(&self, index: u16) -> Option<u32> {
        self.element(index)
            .and_then(|b| b.try_into().ok())
            .map(u32::from_be_bytes)
    }

    fn element(&self, index: u16) -> Option<&[u8]> {
        if index >= self.count {
            return None;
        }
        let size = usize::from(self.element_size);
        let start = usize::from(index) * size;
        Some(&self.values[start..start + size])
    }

    fn set_element(&mut self, index: u16, bytes: &[u8]) -> Result<bool> {
        if index >= self.count || bytes.len() != usize::from(self.element_size) {
            return Err(AvdeccError::buffer_overflow());
        }
        self.store(usize::from(index) * bytes.len(), bytes)
    }

    fn store(&mut self, start: usize, bytes: &[u8]) -> Result<bool> {
        let slot = &mut self.values[start..start + bytes.len()];
        if slot == bytes {
            return Ok(false);
        }
        slot.copy_from_slice(bytes);
        self.dirty = true;
        Ok(true)
    }
}

// =============================================================================
// ControlSender
// =============================================================================

/// Sends a [`ControlValueHolder`] to a remote CONTROL descriptor.
///
/// SET_CONTROL goes out untracked when the value changed or, with a
/// non-zero `update_interval_ms`, whenever the interval has elapsed since the
/// last send. An interval of 0 sends on change only.
#[derive(Debug)]
pub struct ControlSender<const N: usize> {
    controller_entity_id: EntityId,
    target_entity_id: EntityId,
    target_mac: Eui48,
    descriptor_index: u16,
    value: ControlValueHolder<N>,
    update_interval_ms: u64,
    last_send_time: Option<u64>,
    sequence_id: u16,
}

impl<const N: usize> ControlSender<N> {
    pub fn new(
        controller_entity_id: EntityId,
        target_entity_id: EntityId,
        target_mac: Eui48,
        descriptor_index: u16,
        value: ControlValueHolder<N>,
        update_interval_ms: u64,
    ) -> Self {
        Self {
            controller_entity_id,
            target_entity_id,
            target_mac,
            descriptor_index,
            value,
            update_interval_ms,
            last_send_time: None,
            sequence_id: 0,
        }
    }

    pub const fn value(&self) -> &ControlValueHolder<N> {
        &self.value
    }

    pub fn value_mut(&mut self) -> &mut ControlValueHolder<N> {
        &mut self.value
    }

    /// Sequence id of the last SET_CONTROL sent
    pub const fn sequence_id(&self) -> u16 {
        self.sequence_id
    }

    fn is_due(&self, now: u64) -> bool {
        if self.value.is_dirty() {
            return true;
        }
        if self.update_interval_ms == 0 {
            return false;
        }
        self.last_send_time
            .is_none_or(|last| now.saturating_sub(last) >= self.update_interval_ms)
    }

    fn send(&mut self, net: &mut dyn NetIo, now: u64) -> Result<()> {
        let mut payload: FrameBuffer = FrameBuffer::new();
        ControlPayload {
            descriptor: DescriptorRef::new(DESCRIPTOR_CONTROL, self.descriptor_index),
            values: self.value.as_bytes(),
        }
        .encode(&mut payload)?;

        let sequence_id = self.sequence_id.wrapping_add(1);
        let mut frame: FrameBuffer = FrameBuffer::new();
        AemHeader::command(
            self.target_entity_id,
            self.controller_entity_id,
            sequence_id,
            AemCommandType::SetControl,
        )
        .encode(self.target_mac, net.mac_address(), payload.as_slice(), &mut frame)?;
        net.send_frame(frame.as_slice())?;

        self.sequence_id = sequence_id;
        self.value.clear_dirty();
        self.last_send_time = Some(now);
        Ok(())
    }
}

impl<const N: usize> Handler for ControlSender<N> {
    fn tick(&mut self, net: &mut dyn NetIo, now: u64) -> Result<()> {
        if self.is_due(now) {
            self.send(net, now)?;
        }
        Ok(())
    }

    /// Claims the responses to this sender's own SET_CONTROL commands.
    fn receive_pdu(&mut self, _net: &mut dyn NetIo, frame: &[u8]) -> Result<bool> {
        let Ok(response) = AemPdu::parse(frame) else {
            return Ok(false);
        };
        let ours = response.is_response_for(self.controller_entity_id)
            && !response.is_unsolicited()
            && response.target_entity_id() == self.target_entity_id
            && response.command_type() == Some(AemCommandType::SetControl)
            && response.sequence_id() == self.sequence_id;
        if ours && response.aem_status() != Some(AemStatus::Success) {
            crate::avdecc_log!(
                debug,
                "SET_CONTROL #{} to {} answered with status {}",
                self.sequence_id,
                self.target_entity_id,
                response.status()
            );
        }
        Ok(ours)
    }
}

// =============================================================================
// ControlReceiver
// =============================================================================

/// Serves CONTROL descriptors `[descriptor_offset, descriptor_offset + K)`
/// of the local entity, one [`ControlValueHolder`] each.
///
/// Register it ahead of the [`Entity`](crate::entity::Entity) in a
/// [`HandlerGroup`](crate::entity::HandlerGroup) so it sees its commands
/// first. A command repeating the last sequence id from the same controller
/// gets the previous response again without being applied twice.
#[derive(Debug)]
pub struct ControlReceiver<const N: usize, const K: usize> {
    entity_id: EntityId,
    descriptor_offset: u16,
    holders: [ControlValueHolder<N>; K],
    last_command: Option<(EntityId, u16)>,
    tx: FrameBuffer,
}

impl<const N: usize, const K: usize> ControlReceiver<N, K> {
    pub fn new(
        entity_id: EntityId,
        descriptor_offset: u16,
        holders: [ControlValueHolder<N>; K],
    ) -> Self {
        Self {
            entity_id,
            descriptor_offset,
            holders,
            last_command: None,
            tx: FrameBuffer::new(),
        }
    }

    /// Holder for CONTROL descriptor `descriptor_index`
    pub fn holder(&self, descriptor_index: u16) -> Option<&ControlValueHolder<N>> {
        self.slot(descriptor_index).map(|i| &self.holders[i])
    }

    pub fn holder_mut(&mut self, descriptor_index: u16) -> Option<&mut ControlValueHolder<N>> {
        self.slot(descriptor_index).map(|i| &mut self.holders[i])
    }

    pub fn holders(&self) -> &[ControlValueHolder<N>] {
        &self.holders
    }

    fn slot(&self, descriptor_index: u16) -> Option<usize> {
        let slot = usize::from(descriptor_index.checked_sub(self.descriptor_offset)?);
        (slot < K).then_some(slot)
    }

    /// CONTROL descriptor addressed by a command this receiver handles
    fn addressed_control(command: &AemPdu<'_>) -> Option<(AemCommandType, DescriptorRef)> {
        let command_type = command.command_type()?;
        let descriptor = match command_type {
            AemCommandType::SetControl | AemCommandType::GetControl => {
                DescriptorRef::parse(command.payload()).ok()?
            }
            AemCommandType::ReadDescriptor => {
                ReadDescriptorPayload::parse(command.payload()).ok()?.descriptor
            }
            _ => return None,
        };
        (descriptor.descriptor_type == DESCRIPTOR_CONTROL).then_some((command_type, descriptor))
    }

    fn respond(
        &mut self,
        command: &AemPdu<'_>,
        command_type: AemCommandType,
        slot: usize,
    ) -> Result<AemStatus> {
        self.tx.clear();
        self.tx.put_slice(command.as_bytes())?;
        let holder = &mut self.holders[slot];
        let status = match command_type {
            AemCommandType::SetControl => {
                let values = &command.payload()[DescriptorRef::SIZE..];
                match holder.set_bytes(values) {
                    Ok(_) => AemStatus::Success,
                    Err(_) => AemStatus::EntityMisbehaving,
                }
            }
            AemCommandType::GetControl => {
                self.tx.truncate(PAYLOAD_OFFSET + DescriptorRef::SIZE);
                self.tx.put_slice(holder.as_bytes())?;
                AemStatus::Success
            }
            _ => AemStatus::NotImplemented,
        };
        let len = self.tx.len();
        rewrite_as_reply(self.tx.as_mut_slice(), status.to_u8(), len)?;
        Ok(status)
    }
}

impl<const N: usize, const K: usize> Handler for ControlReceiver<N, K> {
    fn receive_pdu(&mut self, net: &mut dyn NetIo, frame: &[u8]) -> Result<bool> {
        let Ok(command) = AemPdu::parse(frame) else {
            return Ok(false);
        };
        if !command.is_command_for(self.entity_id) {
            return Ok(false);
        }
        let Some((command_type, descriptor)) = Self::addressed_control(&command) else {
            return Ok(false);
        };
        let Some(slot) = self.slot(descriptor.descriptor_index) else {
            return Ok(false);
        };

        let key = (command.controller_entity_id(), command.sequence_id());
        if self.last_command == Some(key) {
            crate::avdecc_log!(trace, "Repeated control command #{}", key.1);
            net.send_frame(self.tx.as_slice())?;
            return Ok(true);
        }

        let status = self.respond(&command, command_type, slot)?;
        self.last_command = Some(key);
        crate::avdecc_log!(
            debug,
            "{:?} CONTROL {} from {} -> {:?}",
            command_type,
            descriptor.descriptor_index,
            key.0,
            status
        );
        net.send_reply_frame(self.tx.as_mut_slice(), &[], &[])?;
        Ok(true)
    }
}
