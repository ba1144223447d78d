//! Entity (target role) AECP state machine.
//!
//! [`Entity`] answers AEM and Address Access commands addressed to one local
//! entity. It owns:
//!
//! - the acquire state (unowned, owned, or an acquire waiting for the current
//!   owner to answer a CONTROLLER_AVAILABLE probe)
//! - the lock state, which expires after `lock_timeout_ms`
//! - the single outstanding-command slot shared with the controller role
//! - the table of controllers registered for unsolicited notifications
//!
//! Everything that depends on the device's descriptor model goes through the
//! [`EntityModel`] hooks. Their default implementations answer
//! `NOT_IMPLEMENTED`.
//!
//! Responses are built in the entity's own transmit buffer from a copy of the
//! command. The received frame is never modified.
//!
//! ## Example
//!
//! ```
//! use avdecc_pico::addressing::Eui48;
//! use avdecc_pico::configuration::EntityConfig;
//! use avdecc_pico::entity::{Entity, Handler, NoModel};
//! use avdecc_pico::eui64;
//! use avdecc_pico::net::MockNetIo;
//!
//! let mut net = MockNetIo::new(Eui48::new([0x02, 0, 0, 0, 0, 1]));
//! let mut entity = Entity::new(EntityConfig::new(eui64!(0x10), eui64!(0x20)), NoModel);
//!
//! entity.tick(&mut net, 0).unwrap();
//! assert!(entity.acquired_by().is_none());
//! assert!(entity.can_send_command());
//! ```

use crate::addressing::{EntityId, Eui48, Eui64};
use crate::configuration::EntityConfig;
use crate::entity::handler::Handler;
use crate::error::{AvdeccError, Result};
use crate::net::transport::NetIo;
use crate::protocol::aecp::{
    rewrite_as_reply, AaPdu, AaTlv, AemHeader, AemPdu, COMMAND_TYPE_OFFSET,
    CONTROLLER_ENTITY_ID_OFFSET, PAYLOAD_OFFSET, SEQUENCE_ID_OFFSET,
};
use crate::protocol::aem::{
    AcquirePayload, AvdeccName, ConfigurationPayload, ControlPayload, DescriptorRef,
    NameAddress, ReadDescriptorPayload,
};
use crate::protocol::constants::{
    AaMode, AaStatus, AecpMessageType, AemCommandType, AemStatus, ACQUIRE_FLAG_RELEASE,
    AEM_UNSOLICITED_BIT, DESCRIPTOR_CONFIGURATION, DESCRIPTOR_CONTROL, DESCRIPTOR_ENTITY,
    DESCRIPTOR_LOCALE, DESCRIPTOR_MEMORY_OBJECT, DESCRIPTOR_STRINGS, LOCK_FLAG_UNLOCK,
    MAX_REGISTERED_CONTROLLERS,
};
use crate::protocol::frame::FrameBuffer;

/// Outcome of a model hook that produces a value.
pub type HookResult<T> = core::result::Result<T, AemStatus>;

// =============================================================================
// Model hooks
// =============================================================================

/// Device-specific behaviour of an [`Entity`].
///
/// Hooks that produce response data append it to `out`, which already holds
/// the response header and any fixed prefix. When a hook reports a failure
/// the entity discards whatever it appended and echoes the command payload.
#[allow(unused_variables)]
pub trait EntityModel {
    /// READ_DESCRIPTOR. The default routes to the per-type hooks below and
    /// answers `NO_SUCH_DESCRIPTOR` for every other descriptor type.
    ///
    /// The descriptor written to `out` starts with its own
    /// `descriptor_type` and `descriptor_index`.
    fn read_descriptor(
        &mut self,
        configuration_index: u16,
        descriptor: DescriptorRef,
        out: &mut FrameBuffer,
    ) -> AemStatus {
        let index = descriptor.descriptor_index;
        match descriptor.descriptor_type {
            DESCRIPTOR_ENTITY => self.read_entity_descriptor(configuration_index, index, out),
            DESCRIPTOR_CONFIGURATION => {
                self.read_configuration_descriptor(configuration_index, index, out)
            }
            DESCRIPTOR_CONTROL => self.read_control_descriptor(configuration_index, index, out),
            DESCRIPTOR_LOCALE => self.read_locale_descriptor(configuration_index, index, out),
            DESCRIPTOR_STRINGS => self.read_strings_descriptor(configuration_index, index, out),
            DESCRIPTOR_MEMORY_OBJECT => {
                self.read_memory_object_descriptor(configuration_index, index, out)
            }
            _ => AemStatus::NoSuchDescriptor,
        }
    }

    fn read_entity_descriptor(
        &mut self,
        configuration_index: u16,
        descriptor_index: u16,
        out: &mut FrameBuffer,
    ) -> AemStatus {
        AemStatus::NotImplemented
    }

    fn read_configuration_descriptor(
        &mut self,
        configuration_index: u16,
        descriptor_index: u16,
        out: &mut FrameBuffer,
    ) -> AemStatus {
        AemStatus::NotImplemented
    }

    fn read_control_descriptor(
        &mut self,
        configuration_index: u16,
        descriptor_index: u16,
        out: &mut FrameBuffer,
    ) -> AemStatus {
        AemStatus::NotImplemented
    }

    fn read_locale_descriptor(
        &mut self,
        configuration_index: u16,
        descriptor_index: u16,
        out: &mut FrameBuffer,
    ) -> AemStatus {
        AemStatus::NotImplemented
    }

    fn read_strings_descriptor(
        &mut self,
        configuration_index: u16,
        descriptor_index: u16,
        out: &mut FrameBuffer,
    ) -> AemStatus {
        AemStatus::NotImplemented
    }

    fn read_memory_object_descriptor(
        &mut self,
        configuration_index: u16,
        descriptor_index: u16,
        out: &mut FrameBuffer,
    ) -> AemStatus {
        AemStatus::NotImplemented
    }

    fn set_configuration(&mut self, configuration_index: u16) -> AemStatus {
        AemStatus::NotImplemented
    }

    /// Current configuration index
    fn get_configuration(&mut self) -> HookResult<u16> {
        Err(AemStatus::NotImplemented)
    }

    fn set_name(&mut self, address: &NameAddress, name: &AvdeccName) -> AemStatus {
        AemStatus::NotImplemented
    }

    fn get_name(&mut self, address: &NameAddress) -> HookResult<AvdeccName> {
        Err(AemStatus::NotImplemented)
    }

    /// SET_CONTROL for CONTROL descriptor `descriptor_index`. The response
    /// echoes `values`.
    fn set_control(&mut self, descriptor_index: u16, values: &[u8]) -> AemStatus {
        AemStatus::NotImplemented
    }

    /// Append the current values of CONTROL descriptor `descriptor_index`.
    fn get_control(&mut self, descriptor_index: u16, out: &mut FrameBuffer) -> AemStatus {
        AemStatus::NotImplemented
    }

    /// Fill `out` from memory at `address`.
    fn aa_read(&mut self, address: u32, out: &mut [u8]) -> AaStatus {
        AaStatus::NotImplemented
    }

    fn aa_write(&mut self, address: u32, data: &[u8]) -> AaStatus {
        AaStatus::NotImplemented
    }

    fn aa_execute(&mut self, address: u32, data: &[u8]) -> AaStatus {
        AaStatus::NotImplemented
    }

    /// A tracked command sent by this entity got no response in time.
    fn command_timed_out(&mut self, command: &OutstandingCommand) {}
}

/// Model without descriptors. Every hook answers `NOT_IMPLEMENTED`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoModel;

impl EntityModel for NoModel {}

// =============================================================================
// State
// =============================================================================

/// A controller known by entity id and MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerRef {
    pub entity_id: EntityId,
    pub mac: Eui48,
}

/// The command currently awaiting its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutstandingCommand {
    pub target_entity_id: EntityId,
    /// command_type without the unsolicited bit
    pub command_type: u16,
    pub sequence_id: u16,
    pub sent_at: u64,
}

impl OutstandingCommand {
    fn is_probe_of(&self, owner: EntityId) -> bool {
        self.command_type == AemCommandType::ControllerAvailable.to_u16()
            && self.target_entity_id == owner
    }
}

/// A controller waiting for the final answer to its ACQUIRE_ENTITY.
#[derive(Debug, Clone, Copy)]
struct PendingAcquire {
    controller: ControllerRef,
    sequence_id: u16,
    flags: u32,
}

#[derive(Debug, Clone, Copy)]
enum Ownership {
    Unowned,
    Owned(ControllerRef),
    /// `owner` is being probed with CONTROLLER_AVAILABLE on behalf of `candidate`
    AcquirePending {
        owner: ControllerRef,
        candidate: PendingAcquire,
    },
}

impl Ownership {
    fn owner(&self) -> Option<ControllerRef> {
        match self {
            Ownership::Unowned => None,
            Ownership::Owned(owner) | Ownership::AcquirePending { owner, .. } => Some(*owner),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Lock {
    Unlocked,
    Locked { controller: EntityId, since: u64 },
}

// =============================================================================
// Entity
// =============================================================================

/// AECP target-role state machine for one local entity.
#[derive(Debug)]
pub struct Entity<M> {
    config: EntityConfig,
    model: M,
    ownership: Ownership,
    lock: Lock,
    outstanding: Option<OutstandingCommand>,
    subscribers: heapless::Vec<ControllerRef, MAX_REGISTERED_CONTROLLERS>,
    sequence_id: u16,
    unsolicited_sequence_id: u16,
    tx: FrameBuffer,
}

impl<M: EntityModel> Entity<M> {
    pub fn new(config: EntityConfig, model: M) -> Self {
        Self {
            config,
            model,
            ownership: Ownership::Unowned,
            lock: Lock::Unlocked,
            outstanding: None,
            subscribers: heapless::Vec::new(),
            sequence_id: 0,
            unsolicited_sequence_id: 0,
            tx: FrameBuffer::new(),
        }
    }

    #[inline(always)]
    pub const fn entity_id(&self) -> EntityId {
        self.config.entity_id
    }

    pub const fn config(&self) -> &EntityConfig {
        &self.config
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    /// Current owner. Stays the old owner while a new acquire is being arbitrated.
    pub fn acquired_by(&self) -> Option<EntityId> {
        self.ownership.owner().map(|owner| owner.entity_id)
    }

    /// Controller whose ACQUIRE_ENTITY is waiting for the owner probe.
    pub fn acquire_in_progress_by(&self) -> Option<EntityId> {
        match self.ownership {
            Ownership::AcquirePending { candidate, .. } => Some(candidate.controller.entity_id),
            _ => None,
        }
    }

    pub fn locked_by(&self) -> Option<EntityId> {
        match self.lock {
            Lock::Locked { controller, .. } => Some(controller),
            Lock::Unlocked => None,
        }
    }

    /// True when no tracked command is waiting for its response.
    pub fn can_send_command(&self) -> bool {
        self.outstanding.is_none()
    }

    pub fn outstanding_command(&self) -> Option<&OutstandingCommand> {
        self.outstanding.as_ref()
    }

    /// Controllers registered for unsolicited notifications.
    pub fn registered_controllers(&self) -> &[ControllerRef] {
        &self.subscribers
    }

    /// Whether `requester` may change entity state.
    pub fn validate_permissions(&self, requester: EntityId) -> AemStatus {
        if let Some(owner) = self.ownership.owner() {
            return if owner.entity_id == requester {
                AemStatus::Success
            } else {
                AemStatus::EntityAcquired
            };
        }
        match self.lock {
            Lock::Locked { controller, .. } if controller != requester => AemStatus::EntityLocked,
            _ => AemStatus::Success,
        }
    }

    /// Send an AEM command with a fresh sequence id and return that id.
    ///
    /// With `track_for_ack` the command occupies the outstanding slot until
    /// its response arrives or it times out.
    ///
    /// # Errors
    ///
    /// - `CommandInFlight` if tracking is requested while another command is outstanding
    /// - `BufferOverflow` if the payload does not fit a frame
    /// - transport errors from the send
    pub fn send_command(
        &mut self,
        net: &mut dyn NetIo,
        target_entity_id: EntityId,
        target_mac: Eui48,
        command_type: AemCommandType,
        track_for_ack: bool,
        payload: &[u8],
    ) -> Result<u16> {
        if track_for_ack && self.outstanding.is_some() {
            return Err(AvdeccError::command_in_flight());
        }
        self.sequence_id = self.sequence_id.wrapping_add(1);
        let sequence_id = self.sequence_id;

        let mut frame: FrameBuffer = FrameBuffer::new();
        AemHeader::command(
            target_entity_id,
            self.config.entity_id,
            sequence_id,
            command_type,
        )
        .encode(target_mac, net.mac_address(), payload, &mut frame)?;
        net.send_frame(frame.as_slice())?;

        if track_for_ack {
            self.outstanding = Some(OutstandingCommand {
                target_entity_id,
                command_type: command_type.to_u16(),
                sequence_id,
                sent_at: net.time_in_millis(),
            });
        }
        crate::avdecc_log!(
            debug,
            "Sent {:?} #{} to {}",
            command_type,
            sequence_id,
            target_entity_id
        );
        Ok(sequence_id)
    }

    fn answers_outstanding(&self, response: &AemPdu<'_>) -> bool {
        self.outstanding.is_some_and(|command| {
            command.target_entity_id == response.target_entity_id()
                && command.command_type == response.stripped_command_type()
                && command.sequence_id == response.sequence_id()
        })
    }

    /// Clear the outstanding slot if `response` answers it.
    pub(crate) fn complete_outstanding(&mut self, response: &AemPdu<'_>) -> bool {
        if !self.answers_outstanding(response) {
            return false;
        }
        self.outstanding = None;
        true
    }

    /// IN_PROGRESS for the outstanding command: keep it and restart its timer.
    pub(crate) fn extend_outstanding(&mut self, response: &AemPdu<'_>, now: u64) -> bool {
        if !self.answers_outstanding(response) {
            return false;
        }
        if let Some(command) = self.outstanding.as_mut() {
            command.sent_at = now;
        }
        true
    }

    /// Expire the lock and the outstanding command.
    ///
    /// Returns the command that timed out, unless it was an acquire probe
    /// (which is resolved here by promoting the waiting candidate).
    pub(crate) fn check_timeouts(
        &mut self,
        net: &mut dyn NetIo,
        now: u64,
    ) -> Result<Option<OutstandingCommand>> {
        if let Lock::Locked { controller, since } = self.lock {
            if now.saturating_sub(since) > self.config.lock_timeout_ms {
                crate::avdecc_log!(info, "Lock held by {} expired", controller);
                self.lock = Lock::Unlocked;
            }
        }

        let Some(command) = self.outstanding else {
            return Ok(None);
        };
        if now.saturating_sub(command.sent_at) <= self.config.command_timeout_ms {
            return Ok(None);
        }
        self.outstanding = None;

        if let Ownership::AcquirePending { owner, candidate } = self.ownership {
            if command.is_probe_of(owner.entity_id) {
                crate::avdecc_log!(info, "Owner {} did not answer the probe", owner.entity_id);
                self.promote_candidate(net, candidate)?;
                return Ok(None);
            }
        }
        crate::avdecc_log!(
            warn,
            "Command {} #{} to {} timed out",
            command.command_type,
            command.sequence_id,
            command.target_entity_id
        );
        Ok(Some(command))
    }

    /// Handle the frames the target role is interested in.
    pub(crate) fn handle_frame(&mut self, net: &mut dyn NetIo, frame: &[u8]) -> Result<bool> {
        let entity_id = self.config.entity_id;
        match AemPdu::parse(frame) {
            Ok(pdu) if pdu.is_command_for(entity_id) => {
                self.received_aem_command(net, &pdu)?;
                Ok(true)
            }
            Ok(pdu) if pdu.is_response_for(entity_id) => self.received_probe_response(net, &pdu),
            Ok(_) => Ok(false),
            Err(e) if e.is_not_for_me() => match AaPdu::parse(frame) {
                Ok(pdu) if pdu.is_command_for(entity_id) => {
                    self.received_aa_command(net, &pdu)?;
                    Ok(true)
                }
                _ => Ok(false),
            },
            Err(e) => {
                crate::avdecc_log!(trace, "Dropping AECP frame: {}", e);
                Ok(false)
            }
        }
    }

    // ===== AEM commands =====

    fn received_aem_command(&mut self, net: &mut dyn NetIo, command: &AemPdu<'_>) -> Result<()> {
        let requester = ControllerRef {
            entity_id: command.controller_entity_id(),
            mac: command.source_mac(),
        };
        self.tx.clear();
        self.tx.put_slice(command.as_bytes())?;

        let command_type = command.command_type();
        let status = match command_type {
            Some(kind) if kind.is_state_mutating() => {
                match self.validate_permissions(requester.entity_id) {
                    AemStatus::Success => self.dispatch(net, kind, command, requester)?,
                    denied => denied,
                }
            }
            Some(kind) => self.dispatch(net, kind, command, requester)?,
            None => AemStatus::NotImplemented,
        };
        crate::avdecc_log!(
            debug,
            "AEM command {:#06x} #{} from {} -> {:?}",
            command.raw_command_type(),
            command.sequence_id(),
            requester.entity_id,
            status
        );

        let len = self.tx.len();
        rewrite_as_reply(self.tx.as_mut_slice(), status.to_u8(), len)?;
        net.send_reply_frame(self.tx.as_mut_slice(), &[], &[])?;

        if status.is_success() && command_type.is_some_and(AemCommandType::is_state_mutating) {
            self.notify_subscribers(net, requester.entity_id)?;
        }
        Ok(())
    }

    fn dispatch(
        &mut self,
        net: &mut dyn NetIo,
        command_type: AemCommandType,
        command: &AemPdu<'_>,
        requester: ControllerRef,
    ) -> Result<AemStatus> {
        let status = match command_type {
            AemCommandType::AcquireEntity => self.acquire_entity(net, command, requester)?,
            AemCommandType::LockEntity => {
                let now = net.time_in_millis();
                self.lock_entity(command, requester, now)?
            }
            AemCommandType::EntityAvailable | AemCommandType::ControllerAvailable => {
                AemStatus::Success
            }
            AemCommandType::ReadDescriptor => self.read_descriptor(command)?,
            AemCommandType::SetConfiguration => {
                match ConfigurationPayload::parse(command.payload()) {
                    Ok(request) => self.model.set_configuration(request.configuration_index),
                    Err(_) => AemStatus::BadArguments,
                }
            }
            AemCommandType::GetConfiguration => self.get_configuration()?,
            AemCommandType::SetName => self.set_name(command),
            AemCommandType::GetName => self.get_name(command)?,
            AemCommandType::SetControl => self.set_control(command),
            AemCommandType::GetControl => self.get_control(command)?,
            AemCommandType::RegisterUnsolicitedNotification => self.register(requester),
            AemCommandType::DeregisterUnsolicitedNotification => self.deregister(requester),
            _ => AemStatus::NotImplemented,
        };
        Ok(status)
    }

    /// Reset the response payload to a copy of the command payload.
    fn echo_payload(&mut self, command: &AemPdu<'_>) -> Result<()> {
        self.tx.truncate(PAYLOAD_OFFSET);
        self.tx.put_slice(command.payload())
    }

    // ===== Acquire =====

    fn acquire_entity(
        &mut self,
        net: &mut dyn NetIo,
        command: &AemPdu<'_>,
        requester: ControllerRef,
    ) -> Result<AemStatus> {
        let Ok(request) = AcquirePayload::parse(command.payload()) else {
            return Ok(AemStatus::BadArguments);
        };
        if !request.targets_entity() {
            return Ok(AemStatus::BadArguments);
        }

        let status = if request.flags & ACQUIRE_FLAG_RELEASE != 0 {
            self.release(net, requester)?
        } else {
            self.acquire(net, &request, command.sequence_id(), requester)?
        };
        let owner = self.acquired_by().unwrap_or(Eui64::ZERO);
        self.tx.set_eui64_at(PAYLOAD_OFFSET + 4, owner)?;
        Ok(status)
    }

    fn acquire(
        &mut self,
        net: &mut dyn NetIo,
        request: &AcquirePayload,
        sequence_id: u16,
        requester: ControllerRef,
    ) -> Result<AemStatus> {
        if let Lock::Locked { controller, .. } = self.lock {
            if controller != requester.entity_id {
                return Ok(AemStatus::EntityLocked);
            }
        }

        let status = match self.ownership {
            Ownership::Unowned => {
                crate::avdecc_log!(info, "Acquired by {}", requester.entity_id);
                self.ownership = Ownership::Owned(requester);
                AemStatus::Success
            }
            Ownership::Owned(owner) if owner.entity_id == requester.entity_id => {
                self.ownership = Ownership::Owned(requester);
                AemStatus::Success
            }
            Ownership::Owned(owner) => {
                if !self.can_send_command() {
                    crate::avdecc_log!(debug, "Cannot probe {}: command in flight", owner.entity_id);
                    return Ok(AemStatus::EntityAcquired);
                }
                self.send_command(
                    net,
                    owner.entity_id,
                    owner.mac,
                    AemCommandType::ControllerAvailable,
                    true,
                    &[],
                )?;
                crate::avdecc_log!(
                    info,
                    "Acquire by {} pending, probing owner {}",
                    requester.entity_id,
                    owner.entity_id
                );
                self.ownership = Ownership::AcquirePending {
                    owner,
                    candidate: PendingAcquire {
                        controller: requester,
                        sequence_id,
                        flags: request.flags,
                    },
                };
                AemStatus::InProgress
            }
            Ownership::AcquirePending { owner, mut candidate } => {
                if candidate.controller.entity_id == requester.entity_id {
                    candidate.sequence_id = sequence_id;
                    self.ownership = Ownership::AcquirePending { owner, candidate };
                    AemStatus::InProgress
                } else if owner.entity_id == requester.entity_id {
                    // The owner is evidently still alive
                    self.clear_probe(owner.entity_id);
                    self.reject_candidate(net, owner, candidate)?;
                    AemStatus::Success
                } else {
                    AemStatus::EntityAcquired
                }
            }
        };
        Ok(status)
    }

    fn release(&mut self, net: &mut dyn NetIo, requester: ControllerRef) -> Result<AemStatus> {
        let status = match self.ownership {
            Ownership::Unowned => AemStatus::Success,
            Ownership::Owned(owner) if owner.entity_id == requester.entity_id => {
                crate::avdecc_log!(info, "Released by {}", requester.entity_id);
                self.ownership = Ownership::Unowned;
                AemStatus::Success
            }
            Ownership::AcquirePending { owner, candidate }
                if owner.entity_id == requester.entity_id =>
            {
                self.clear_probe(owner.entity_id);
                self.promote_candidate(net, candidate)?;
                AemStatus::Success
            }
            _ => AemStatus::EntityAcquired,
        };
        Ok(status)
    }

    fn clear_probe(&mut self, owner: EntityId) {
        if self.outstanding.is_some_and(|command| command.is_probe_of(owner)) {
            self.outstanding = None;
        }
    }

    fn promote_candidate(&mut self, net: &mut dyn NetIo, candidate: PendingAcquire) -> Result<()> {
        crate::avdecc_log!(info, "Acquired by {}", candidate.controller.entity_id);
        self.ownership = Ownership::Owned(candidate.controller);
        self.lock = Lock::Unlocked;
        self.send_acquire_result(net, &candidate, AemStatus::Success, candidate.controller.entity_id)
    }

    fn reject_candidate(
        &mut self,
        net: &mut dyn NetIo,
        owner: ControllerRef,
        candidate: PendingAcquire,
    ) -> Result<()> {
        crate::avdecc_log!(
            info,
            "Owner {} answered, acquire by {} refused",
            owner.entity_id,
            candidate.controller.entity_id
        );
        self.ownership = Ownership::Owned(owner);
        self.send_acquire_result(net, &candidate, AemStatus::EntityAcquired, owner.entity_id)
    }

    /// Final ACQUIRE_ENTITY response to a candidate that was told IN_PROGRESS.
    fn send_acquire_result(
        &mut self,
        net: &mut dyn NetIo,
        candidate: &PendingAcquire,
        status: AemStatus,
        owner_id: EntityId,
    ) -> Result<()> {
        let mut payload: FrameBuffer<{ AcquirePayload::SIZE }> = FrameBuffer::new();
        AcquirePayload {
            flags: candidate.flags,
            owner_id,
            ..AcquirePayload::entity(0)
        }
        .encode(&mut payload)?;

        let mut frame: FrameBuffer<64> = FrameBuffer::new();
        AemHeader {
            message_type: AecpMessageType::AemResponse,
            status: status.to_u8(),
            target_entity_id: self.config.entity_id,
            controller_entity_id: candidate.controller.entity_id,
            sequence_id: candidate.sequence_id,
            command_type: AemCommandType::AcquireEntity.to_u16(),
        }
        .encode(candidate.controller.mac, net.mac_address(), payload.as_slice(), &mut frame)?;
        net.send_frame(frame.as_slice())
    }

    /// CONTROLLER_AVAILABLE answered by the owner we are probing.
    fn received_probe_response(&mut self, net: &mut dyn NetIo, response: &AemPdu<'_>) -> Result<bool> {
        let Ownership::AcquirePending { owner, candidate } = self.ownership else {
            return Ok(false);
        };
        let is_probe = self
            .outstanding
            .is_some_and(|command| command.is_probe_of(owner.entity_id));
        if !is_probe || !self.complete_outstanding(response) {
            return Ok(false);
        }
        self.reject_candidate(net, owner, candidate)?;
        Ok(true)
    }

    // ===== Lock =====

    fn lock_entity(
        &mut self,
        command: &AemPdu<'_>,
        requester: ControllerRef,
        now: u64,
    ) -> Result<AemStatus> {
        let Ok(request) = AcquirePayload::parse(command.payload()) else {
            return Ok(AemStatus::BadArguments);
        };
        if !request.targets_entity() {
            return Ok(AemStatus::BadArguments);
        }
        let requester = requester.entity_id;

        let status = if request.flags & LOCK_FLAG_UNLOCK != 0 {
            match self.lock {
                Lock::Unlocked => AemStatus::Success,
                Lock::Locked { controller, .. } if controller == requester => {
                    crate::avdecc_log!(info, "Unlocked by {}", requester);
                    self.lock = Lock::Unlocked;
                    AemStatus::Success
                }
                Lock::Locked { .. } => AemStatus::EntityLocked,
            }
        } else if self.acquired_by().is_some_and(|owner| owner != requester) {
            AemStatus::EntityAcquired
        } else {
            match self.lock {
                Lock::Locked { controller, .. } if controller != requester => AemStatus::EntityLocked,
                Lock::Locked { .. } => {
                    self.lock = Lock::Locked {
                        controller: requester,
                        since: now,
                    };
                    AemStatus::Success
                }
                Lock::Unlocked => {
                    crate::avdecc_log!(info, "Locked by {}", requester);
                    self.lock = Lock::Locked {
                        controller: requester,
                        since: now,
                    };
                    AemStatus::Success
                }
            }
        };
        let locker = self.locked_by().unwrap_or(Eui64::ZERO);
        self.tx.set_eui64_at(PAYLOAD_OFFSET + 4, locker)?;
        Ok(status)
    }

    // ===== Model-backed commands =====

    fn read_descriptor(&mut self, command: &AemPdu<'_>) -> Result<AemStatus> {
        let Ok(request) = ReadDescriptorPayload::parse(command.payload()) else {
            return Ok(AemStatus::BadArguments);
        };
        self.tx.truncate(PAYLOAD_OFFSET);
        self.tx.put_u16(request.configuration_index)?;
        self.tx.put_zeros(2)?;
        let status = self.model.read_descriptor(
            request.configuration_index,
            request.descriptor,
            &mut self.tx,
        );
        if !status.is_success() {
            self.echo_payload(command)?;
        }
        Ok(status)
    }

    fn get_configuration(&mut self) -> Result<AemStatus> {
        match self.model.get_configuration() {
            Ok(configuration_index) => {
                self.tx.truncate(PAYLOAD_OFFSET);
                ConfigurationPayload { configuration_index }.encode(&mut self.tx)?;
                Ok(AemStatus::Success)
            }
            Err(status) => Ok(status),
        }
    }

    fn set_name(&mut self, command: &AemPdu<'_>) -> AemStatus {
        let payload = command.payload();
        let Ok(address) = NameAddress::parse(payload) else {
            return AemStatus::BadArguments;
        };
        let Some(Ok(name)) = payload.get(NameAddress::SIZE..).map(AvdeccName::parse) else {
            return AemStatus::BadArguments;
        };
        self.model.set_name(&address, &name)
    }

    fn get_name(&mut self, command: &AemPdu<'_>) -> Result<AemStatus> {
        let Ok(address) = NameAddress::parse(command.payload()) else {
            return Ok(AemStatus::BadArguments);
        };
        match self.model.get_name(&address) {
            Ok(name) => {
                self.tx.truncate(PAYLOAD_OFFSET);
                address.encode(&mut self.tx)?;
                name.encode(&mut self.tx)?;
                Ok(AemStatus::Success)
            }
            Err(status) => Ok(status),
        }
    }

    fn set_control(&mut self, command: &AemPdu<'_>) -> AemStatus {
        let Ok(request) = ControlPayload::parse(command.payload()) else {
            return AemStatus::BadArguments;
        };
        if request.descriptor.descriptor_type != DESCRIPTOR_CONTROL {
            return AemStatus::NoSuchDescriptor;
        }
        self.model
            .set_control(request.descriptor.descriptor_index, request.values)
    }

    fn get_control(&mut self, command: &AemPdu<'_>) -> Result<AemStatus> {
        let Ok(descriptor) = DescriptorRef::parse(command.payload()) else {
            return Ok(AemStatus::BadArguments);
        };
        if descriptor.descriptor_type != DESCRIPTOR_CONTROL {
            return Ok(AemStatus::NoSuchDescriptor);
        }
        self.tx.truncate(PAYLOAD_OFFSET);
        descriptor.encode(&mut self.tx)?;
        let status = self
            .model
            .get_control(descriptor.descriptor_index, &mut self.tx);
        if !status.is_success() {
            self.echo_payload(command)?;
        }
        Ok(status)
    }

    // ===== Unsolicited notifications =====

    fn register(&mut self, requester: ControllerRef) -> AemStatus {
        if let Some(existing) = self
            .subscribers
            .iter_mut()
            .find(|c| c.entity_id == requester.entity_id)
        {
            existing.mac = requester.mac;
            return AemStatus::Success;
        }
        match self.subscribers.push(requester) {
            Ok(()) => {
                crate::avdecc_log!(info, "{} registered for notifications", requester.entity_id);
                AemStatus::Success
            }
            Err(_) => {
                crate::avdecc_log!(warn, "Subscriber table full, refusing {}", requester.entity_id);
                AemStatus::NoResources
            }
        }
    }

    fn deregister(&mut self, requester: ControllerRef) -> AemStatus {
        self.subscribers
            .retain(|c| c.entity_id != requester.entity_id);
        AemStatus::Success
    }

    /// Re-send the response in `tx` as an unsolicited response to every
    /// subscriber except the requester.
    fn notify_subscribers(&mut self, net: &mut dyn NetIo, requester: EntityId) -> Result<()> {
        let command_type = self.tx.get_u16_at(COMMAND_TYPE_OFFSET)?;
        self.tx
            .set_u16_at(COMMAND_TYPE_OFFSET, command_type | AEM_UNSOLICITED_BIT)?;
        self.tx.set_eui48_at(6, net.mac_address())?;

        for subscriber in &self.subscribers {
            if subscriber.entity_id == requester {
                continue;
            }
            self.tx.set_eui48_at(0, subscriber.mac)?;
            self.tx
                .set_eui64_at(CONTROLLER_ENTITY_ID_OFFSET, subscriber.entity_id)?;
            self.tx
                .set_u16_at(SEQUENCE_ID_OFFSET, self.unsolicited_sequence_id)?;
            self.unsolicited_sequence_id = self.unsolicited_sequence_id.wrapping_add(1);
            if let Err(e) = net.send_frame(self.tx.as_slice()) {
                crate::avdecc_log!(warn, "Notification to {} failed: {}", subscriber.entity_id, e);
            }
        }
        Ok(())
    }

    // ===== Address Access =====

    fn received_aa_command(&mut self, net: &mut dyn NetIo, command: &AaPdu<'_>) -> Result<()> {
        self.tx.clear();
        self.tx.put_slice(&command.as_bytes()[..PAYLOAD_OFFSET])?;

        let mut status = AaStatus::Success;
        let mut tlv_count: u16 = 0;
        for tlv in command.tlvs() {
            let Ok(tlv) = tlv else {
                status = AaStatus::TlvInvalid;
                break;
            };
            let before = self.tx.len();
            status = self.access_memory(&tlv)?;
            if self.tx.len() > before {
                tlv_count += 1;
            }
            if !status.is_success() {
                break;
            }
        }
        crate::avdecc_log!(
            debug,
            "Address access #{} from {} -> {:?}",
            command.sequence_id(),
            command.controller_entity_id(),
            status
        );

        self.tx.set_u16_at(COMMAND_TYPE_OFFSET, tlv_count)?;
        let len = self.tx.len();
        rewrite_as_reply(self.tx.as_mut_slice(), status.to_u8(), len)?;
        net.send_reply_frame(self.tx.as_mut_slice(), &[], &[])
    }

    /// Run one TLV against the model and append its response TLV.
    fn access_memory(&mut self, tlv: &AaTlv<'_>) -> Result<AaStatus> {
        let start = self.tx.len();
        self.tx
            .put_u16((u16::from(tlv.mode & 0x0F) << 12) | (tlv.length & 0x0FFF))?;
        self.tx.put_u64(tlv.address)?;

        let Ok(address) = u32::try_from(tlv.address) else {
            self.tx.put_slice(tlv.data)?;
            return Ok(AaStatus::AddressInvalid);
        };
        let status = match tlv.aa_mode() {
            Some(AaMode::Read) => {
                let length = usize::from(tlv.length);
                if length > self.tx.remaining() {
                    self.tx.truncate(start);
                    return Ok(AaStatus::TlvInvalid);
                }
                let out = self.tx.reserve(length)?;
                out.fill(0);
                self.model.aa_read(address, out)
            }
            Some(AaMode::Write) => {
                self.tx.put_slice(tlv.data)?;
                self.model.aa_write(address, tlv.data)
            }
            Some(AaMode::Execute) => {
                self.tx.put_slice(tlv.data)?;
                self.model.aa_execute(address, tlv.data)
            }
            None => {
                self.tx.put_slice(tlv.data)?;
                AaStatus::TlvInvalid
            }
        };
        Ok(status)
    }
}

impl<M: EntityModel> Handler for Entity<M> {
    fn tick(&mut self, net: &mut dyn NetIo, now: u64) -> Result<()> {
        if let Some(command) = self.check_timeouts(net, now)? {
            self.model.command_timed_out(&command);
        }
        Ok(())
    }

    fn receive_pdu(&mut self, net: &mut dyn NetIo, frame: &[u8]) -> Result<bool> {
        self.handle_frame(net, frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::mock_transport::MockNetIo;
    use crate::protocol::aecp::AaHeader;

    const ENTITY_ID: Eui64 = Eui64::from_u64(0x0001_0000_0000_0001);
    const OWN_MAC: Eui48 = Eui48::new([0x02, 0, 0, 0, 0, 0x01]);
    const A: Eui64 = Eui64::from_u64(0xA);
    const B: Eui64 = Eui64::from_u64(0xB);
    const C: Eui64 = Eui64::from_u64(0xC);

    fn mac_of(id: Eui64) -> Eui48 {
        Eui48::new([0x02, 0, 0, 0, 0x10, id.to_u64() as u8])
    }

    #[derive(Debug, Default)]
    struct TestModel {
        configuration: u16,
        name: AvdeccName,
        control: [u8; 2],
        memory: [u8; 16],
        timed_out: Vec<OutstandingCommand>,
    }

    impl EntityModel for TestModel {
        fn read_entity_descriptor(
            &mut self,
            _configuration_index: u16,
            descriptor_index: u16,
            out: &mut FrameBuffer,
        ) -> AemStatus {
            if descriptor_index != 0 {
                return AemStatus::NoSuchDescriptor;
            }
            match DescriptorRef::new(DESCRIPTOR_ENTITY, 0)
                .encode(out)
                .and_then(|()| out.put_eui64(ENTITY_ID))
            {
                Ok(()) => AemStatus::Success,
                Err(_) => AemStatus::NoResources,
            }
        }

        fn set_configuration(&mut self, configuration_index: u16) -> AemStatus {
            self.configuration = configuration_index;
            AemStatus::Success
        }

        fn get_configuration(&mut self) -> HookResult<u16> {
            Ok(self.configuration)
        }

        fn set_name(&mut self, _address: &NameAddress, name: &AvdeccName) -> AemStatus {
            self.name = *name;
            AemStatus::Success
        }

        fn get_name(&mut self, _address: &NameAddress) -> HookResult<AvdeccName> {
            Ok(self.name)
        }

        fn set_control(&mut self, descriptor_index: u16, values: &[u8]) -> AemStatus {
            if descriptor_index != 0 || values.len() != 2 {
                return AemStatus::BadArguments;
            }
            self.control.copy_from_slice(values);
            AemStatus::Success
        }

        fn get_control(&mut self, _descriptor_index: u16, out: &mut FrameBuffer) -> AemStatus {
            match out.put_slice(&self.control) {
                Ok(()) => AemStatus::Success,
                Err(_) => AemStatus::NoResources,
            }
        }

        fn aa_read(&mut self, address: u32, out: &mut [u8]) -> AaStatus {
            let start = address as usize;
            match self.memory.get(start..start + out.len()) {
                Some(bytes) => {
                    out.copy_from_slice(bytes);
                    AaStatus::Success
                }
                None => AaStatus::AddressTooHigh,
            }
        }

        fn aa_write(&mut self, address: u32, data: &[u8]) -> AaStatus {
            let start = address as usize;
            match self.memory.get_mut(start..start + data.len()) {
                Some(bytes) => {
                    bytes.copy_from_slice(data);
                    AaStatus::Success
                }
                None => AaStatus::AddressTooHigh,
            }
        }

        fn command_timed_out(&mut self, command: &OutstandingCommand) {
            self.timed_out.push(*command);
        }
    }

    fn entity() -> Entity<TestModel> {
        Entity::new(
            EntityConfig::new(ENTITY_ID, Eui64::from_u64(0x99)),
            TestModel::default(),
        )
    }

    fn command(controller: Eui64, sequence_id: u16, kind: AemCommandType, payload: &[u8]) -> Vec<u8> {
        let mut fb: FrameBuffer = FrameBuffer::new();
        AemHeader::command(ENTITY_ID, controller, sequence_id, kind)
            .encode(OWN_MAC, mac_of(controller), payload, &mut fb)
            .unwrap();
        fb.as_slice().to_vec()
    }

    fn acquire(controller: Eui64, sequence_id: u16, flags: u32) -> Vec<u8> {
        let mut payload: FrameBuffer<16> = FrameBuffer::new();
        AcquirePayload::entity(flags).encode(&mut payload).unwrap();
        command(controller, sequence_id, AemCommandType::AcquireEntity, payload.as_slice())
    }

    fn lock(controller: Eui64, sequence_id: u16, flags: u32) -> Vec<u8> {
        let mut payload: FrameBuffer<16> = FrameBuffer::new();
        AcquirePayload::entity(flags).encode(&mut payload).unwrap();
        command(controller, sequence_id, AemCommandType::LockEntity, payload.as_slice())
    }

    fn set_control(controller: Eui64, sequence_id: u16, values: &[u8]) -> Vec<u8> {
        let mut payload: FrameBuffer<16> = FrameBuffer::new();
        ControlPayload {
            descriptor: DescriptorRef::new(DESCRIPTOR_CONTROL, 0),
            values,
        }
        .encode(&mut payload)
        .unwrap();
        command(controller, sequence_id, AemCommandType::SetControl, payload.as_slice())
    }

    fn deliver(entity: &mut Entity<TestModel>, net: &mut MockNetIo, frame: &[u8]) {
        assert!(entity.receive_pdu(net, frame).unwrap());
    }

    fn last_response(net: &MockNetIo) -> AemPdu<'_> {
        AemPdu::parse(net.last_sent().unwrap()).unwrap()
    }

    fn owner_in(response: &AemPdu<'_>) -> Eui64 {
        AcquirePayload::parse(response.payload()).unwrap().owner_id
    }

    #[test]
    fn test_acquire_unowned_entity() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();
        deliver(&mut entity, &mut net, &acquire(A, 1, 0));

        let response = last_response(&net);
        assert_eq!(response.message_type(), AecpMessageType::AemResponse);
        assert_eq!(response.aem_status(), Some(AemStatus::Success));
        assert_eq!(response.sequence_id(), 1);
        assert_eq!(response.controller_entity_id(), A);
        assert_eq!(response.destination_mac(), mac_of(A));
        assert_eq!(response.source_mac(), OWN_MAC);
        assert_eq!(owner_in(&response), A);
        assert_eq!(entity.acquired_by(), Some(A));
    }

    #[test]
    fn test_acquire_preemption_after_probe_timeout() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();
        deliver(&mut entity, &mut net, &acquire(A, 1, 0));
        net.clear_sent();

        net.set_time(1_000);
        deliver(&mut entity, &mut net, &acquire(B, 7, 0));

        let sent = net.take_sent();
        assert_eq!(sent.len(), 2);
        let probe = AemPdu::parse(&sent[0]).unwrap();
        assert!(probe.is_command());
        assert_eq!(probe.command_type(), Some(AemCommandType::ControllerAvailable));
        assert_eq!(probe.target_entity_id(), A);
        assert_eq!(probe.destination_mac(), mac_of(A));
        let in_progress = AemPdu::parse(&sent[1]).unwrap();
        assert_eq!(in_progress.aem_status(), Some(AemStatus::InProgress));
        assert_eq!(owner_in(&in_progress), A);
        assert_eq!(entity.acquired_by(), Some(A));
        assert_eq!(entity.acquire_in_progress_by(), Some(B));

        entity.tick(&mut net, 1_250).unwrap();
        assert!(net.sent_frames().is_empty());

        entity.tick(&mut net, 1_251).unwrap();
        let result = last_response(&net);
        assert_eq!(result.aem_status(), Some(AemStatus::Success));
        assert_eq!(result.sequence_id(), 7);
        assert_eq!(result.controller_entity_id(), B);
        assert_eq!(result.destination_mac(), mac_of(B));
        assert_eq!(owner_in(&result), B);
        assert_eq!(entity.acquired_by(), Some(B));
        assert!(entity.acquire_in_progress_by().is_none());
        assert!(entity.can_send_command());
        assert!(entity.model().timed_out.is_empty());
    }

    #[test]
    fn test_owner_answering_probe_keeps_ownership() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();
        deliver(&mut entity, &mut net, &acquire(A, 1, 0));
        deliver(&mut entity, &mut net, &acquire(B, 2, 0));
        let probe_sequence = entity.outstanding_command().unwrap().sequence_id;
        net.clear_sent();

        // A answers the CONTROLLER_AVAILABLE probe
        let mut answer: FrameBuffer = FrameBuffer::new();
        AemHeader {
            message_type: AecpMessageType::AemResponse,
            status: 0,
            target_entity_id: A,
            controller_entity_id: ENTITY_ID,
            sequence_id: probe_sequence,
            command_type: AemCommandType::ControllerAvailable.to_u16(),
        }
        .encode(OWN_MAC, mac_of(A), &[], &mut answer)
        .unwrap();
        deliver(&mut entity, &mut net, answer.as_slice());

        let refused = last_response(&net);
        assert_eq!(refused.aem_status(), Some(AemStatus::EntityAcquired));
        assert_eq!(refused.controller_entity_id(), B);
        assert_eq!(owner_in(&refused), A);
        assert_eq!(entity.acquired_by(), Some(A));
        assert!(entity.acquire_in_progress_by().is_none());
        assert!(entity.can_send_command());
    }

    #[test]
    fn test_owner_release_while_pending_promotes_candidate() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();
        deliver(&mut entity, &mut net, &acquire(A, 1, 0));
        deliver(&mut entity, &mut net, &acquire(B, 2, 0));
        net.clear_sent();

        deliver(&mut entity, &mut net, &acquire(A, 3, ACQUIRE_FLAG_RELEASE));
        let sent = net.take_sent();
        assert_eq!(sent.len(), 2);
        let promoted = AemPdu::parse(&sent[0]).unwrap();
        assert_eq!(promoted.controller_entity_id(), B);
        assert_eq!(promoted.aem_status(), Some(AemStatus::Success));
        let released = AemPdu::parse(&sent[1]).unwrap();
        assert_eq!(released.controller_entity_id(), A);
        assert_eq!(released.aem_status(), Some(AemStatus::Success));
        assert_eq!(entity.acquired_by(), Some(B));
        assert!(entity.can_send_command());
    }

    #[test]
    fn test_release_rules() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();

        deliver(&mut entity, &mut net, &acquire(B, 1, ACQUIRE_FLAG_RELEASE));
        assert_eq!(last_response(&net).aem_status(), Some(AemStatus::Success));

        deliver(&mut entity, &mut net, &acquire(A, 2, 0));
        deliver(&mut entity, &mut net, &acquire(B, 3, ACQUIRE_FLAG_RELEASE));
        assert_eq!(last_response(&net).aem_status(), Some(AemStatus::EntityAcquired));
        assert_eq!(entity.acquired_by(), Some(A));

        deliver(&mut entity, &mut net, &acquire(A, 4, ACQUIRE_FLAG_RELEASE));
        let response = last_response(&net);
        assert_eq!(response.aem_status(), Some(AemStatus::Success));
        assert_eq!(owner_in(&response), Eui64::ZERO);
        assert!(entity.acquired_by().is_none());
    }

    #[test]
    fn test_acquire_non_entity_descriptor_is_bad_arguments() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();
        let mut payload: FrameBuffer<16> = FrameBuffer::new();
        AcquirePayload {
            descriptor_type: DESCRIPTOR_CONTROL,
            ..AcquirePayload::entity(0)
        }
        .encode(&mut payload)
        .unwrap();
        deliver(
            &mut entity,
            &mut net,
            &command(A, 1, AemCommandType::AcquireEntity, payload.as_slice()),
        );
        assert_eq!(last_response(&net).aem_status(), Some(AemStatus::BadArguments));
        assert!(entity.acquired_by().is_none());

        deliver(&mut entity, &mut net, &command(A, 2, AemCommandType::AcquireEntity, &[0; 3]));
        assert_eq!(last_response(&net).aem_status(), Some(AemStatus::BadArguments));
    }

    #[test]
    fn test_second_candidate_is_refused_while_pending() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();
        deliver(&mut entity, &mut net, &acquire(A, 1, 0));
        deliver(&mut entity, &mut net, &acquire(B, 2, 0));
        deliver(&mut entity, &mut net, &acquire(C, 3, 0));
        assert_eq!(last_response(&net).aem_status(), Some(AemStatus::EntityAcquired));
        assert_eq!(entity.acquire_in_progress_by(), Some(B));
    }

    #[test]
    fn test_lock_and_expiry() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();

        net.set_time(100);
        deliver(&mut entity, &mut net, &lock(A, 1, 0));
        let response = last_response(&net);
        assert_eq!(response.aem_status(), Some(AemStatus::Success));
        assert_eq!(owner_in(&response), A);
        assert_eq!(entity.locked_by(), Some(A));

        deliver(&mut entity, &mut net, &lock(B, 1, 0));
        assert_eq!(last_response(&net).aem_status(), Some(AemStatus::EntityLocked));
        deliver(&mut entity, &mut net, &acquire(B, 2, 0));
        assert_eq!(last_response(&net).aem_status(), Some(AemStatus::EntityLocked));
        deliver(&mut entity, &mut net, &set_control(B, 3, &[1, 2]));
        assert_eq!(last_response(&net).aem_status(), Some(AemStatus::EntityLocked));

        entity.tick(&mut net, 60_100).unwrap();
        assert_eq!(entity.locked_by(), Some(A));
        entity.tick(&mut net, 60_101).unwrap();
        assert!(entity.locked_by().is_none());
    }

    #[test]
    fn test_lock_refresh_and_unlock() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();
        deliver(&mut entity, &mut net, &lock(A, 1, 0));
        net.set_time(50_000);
        deliver(&mut entity, &mut net, &lock(A, 2, 0));
        entity.tick(&mut net, 70_000).unwrap();
        assert_eq!(entity.locked_by(), Some(A));

        deliver(&mut entity, &mut net, &lock(B, 3, LOCK_FLAG_UNLOCK));
        assert_eq!(last_response(&net).aem_status(), Some(AemStatus::EntityLocked));
        deliver(&mut entity, &mut net, &lock(A, 4, LOCK_FLAG_UNLOCK));
        let response = last_response(&net);
        assert_eq!(response.aem_status(), Some(AemStatus::Success));
        assert_eq!(owner_in(&response), Eui64::ZERO);
        assert!(entity.locked_by().is_none());
    }

    #[test]
    fn test_lock_refused_when_acquired_by_other() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();
        deliver(&mut entity, &mut net, &acquire(A, 1, 0));
        deliver(&mut entity, &mut net, &lock(B, 1, 0));
        assert_eq!(last_response(&net).aem_status(), Some(AemStatus::EntityAcquired));
        deliver(&mut entity, &mut net, &lock(A, 2, 0));
        assert_eq!(last_response(&net).aem_status(), Some(AemStatus::Success));
    }

    #[test]
    fn test_mutating_commands_respect_ownership() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();
        deliver(&mut entity, &mut net, &acquire(A, 1, 0));

        let mut payload: FrameBuffer<8> = FrameBuffer::new();
        ConfigurationPayload {
            configuration_index: 3,
        }
        .encode(&mut payload)
        .unwrap();
        deliver(
            &mut entity,
            &mut net,
            &command(B, 2, AemCommandType::SetConfiguration, payload.as_slice()),
        );
        assert_eq!(last_response(&net).aem_status(), Some(AemStatus::EntityAcquired));
        assert_eq!(entity.model().configuration, 0);

        deliver(
            &mut entity,
            &mut net,
            &command(A, 3, AemCommandType::SetConfiguration, payload.as_slice()),
        );
        assert_eq!(last_response(&net).aem_status(), Some(AemStatus::Success));
        assert_eq!(entity.model().configuration, 3);

        // Reads are never gated
        deliver(&mut entity, &mut net, &command(B, 4, AemCommandType::GetConfiguration, &[0; 4]));
        let response = last_response(&net);
        assert_eq!(response.aem_status(), Some(AemStatus::Success));
        assert_eq!(ConfigurationPayload::parse(response.payload()).unwrap().configuration_index, 3);
    }

    #[test]
    fn test_unknown_command_echoes_payload() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();
        deliver(&mut entity, &mut net, &command(A, 9, AemCommandType::StartStreaming, &[0, 5, 0, 1]));
        let response = last_response(&net);
        assert_eq!(response.aem_status(), Some(AemStatus::NotImplemented));
        assert_eq!(response.payload(), &[0, 5, 0, 1]);
        assert_eq!(response.sequence_id(), 9);
    }

    #[test]
    fn test_read_descriptor() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();
        let mut payload: FrameBuffer<8> = FrameBuffer::new();
        ReadDescriptorPayload {
            configuration_index: 0,
            descriptor: DescriptorRef::new(DESCRIPTOR_ENTITY, 0),
        }
        .encode(&mut payload)
        .unwrap();
        deliver(&mut entity, &mut net, &command(A, 1, AemCommandType::ReadDescriptor, payload.as_slice()));
        let response = last_response(&net);
        assert_eq!(response.aem_status(), Some(AemStatus::Success));
        assert_eq!(response.payload().len(), 4 + 4 + 8);
        assert_eq!(&response.payload()[8..], &ENTITY_ID.octets());

        payload.clear();
        ReadDescriptorPayload {
            configuration_index: 0,
            descriptor: DescriptorRef::new(0x0042, 0),
        }
        .encode(&mut payload)
        .unwrap();
        deliver(&mut entity, &mut net, &command(A, 2, AemCommandType::ReadDescriptor, payload.as_slice()));
        let response = last_response(&net);
        assert_eq!(response.aem_status(), Some(AemStatus::NoSuchDescriptor));
        assert_eq!(response.payload(), payload.as_slice());
    }

    #[test]
    fn test_default_model_answers_not_implemented() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = Entity::new(EntityConfig::new(ENTITY_ID, Eui64::ZERO), NoModel);
        let mut payload: FrameBuffer<8> = FrameBuffer::new();
        ReadDescriptorPayload {
            configuration_index: 0,
            descriptor: DescriptorRef::new(DESCRIPTOR_ENTITY, 0),
        }
        .encode(&mut payload)
        .unwrap();
        assert!(entity
            .receive_pdu(&mut net, &command(A, 1, AemCommandType::ReadDescriptor, payload.as_slice()))
            .unwrap());
        assert_eq!(last_response(&net).aem_status(), Some(AemStatus::NotImplemented));
    }

    #[test]
    fn test_set_and_get_name() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();
        let address = NameAddress {
            descriptor: DescriptorRef::new(DESCRIPTOR_ENTITY, 0),
            name_index: 0,
            configuration_index: 0,
        };
        let mut payload: FrameBuffer<80> = FrameBuffer::new();
        address.encode(&mut payload).unwrap();
        AvdeccName::new("Stage Left").encode(&mut payload).unwrap();
        deliver(&mut entity, &mut net, &command(A, 1, AemCommandType::SetName, payload.as_slice()));
        assert_eq!(last_response(&net).aem_status(), Some(AemStatus::Success));

        payload.clear();
        address.encode(&mut payload).unwrap();
        deliver(&mut entity, &mut net, &command(A, 2, AemCommandType::GetName, payload.as_slice()));
        let response = last_response(&net);
        assert_eq!(response.aem_status(), Some(AemStatus::Success));
        let name = AvdeccName::parse(&response.payload()[NameAddress::SIZE..]).unwrap();
        assert_eq!(name.as_str(), "Stage Left");

        deliver(&mut entity, &mut net, &command(A, 3, AemCommandType::SetName, &[0; 8]));
        assert_eq!(last_response(&net).aem_status(), Some(AemStatus::BadArguments));
    }

    #[test]
    fn test_get_control_appends_values() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();
        deliver(&mut entity, &mut net, &set_control(A, 1, &[0x12, 0x34]));
        assert_eq!(last_response(&net).aem_status(), Some(AemStatus::Success));

        let mut payload: FrameBuffer<4> = FrameBuffer::new();
        DescriptorRef::new(DESCRIPTOR_CONTROL, 0)
            .encode(&mut payload)
            .unwrap();
        deliver(&mut entity, &mut net, &command(A, 2, AemCommandType::GetControl, payload.as_slice()));
        let response = last_response(&net);
        let control = ControlPayload::parse(response.payload()).unwrap();
        assert_eq!(control.values, &[0x12, 0x34]);
    }

    #[test]
    fn test_unsolicited_fan_out_skips_requester() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();
        deliver(&mut entity, &mut net, &command(A, 1, AemCommandType::RegisterUnsolicitedNotification, &[]));
        deliver(&mut entity, &mut net, &command(B, 1, AemCommandType::RegisterUnsolicitedNotification, &[]));
        assert_eq!(entity.registered_controllers().len(), 2);
        net.clear_sent();

        deliver(&mut entity, &mut net, &set_control(A, 5, &[0, 1]));
        let sent = net.take_sent();
        assert_eq!(sent.len(), 2);

        let solicited = AemPdu::parse(&sent[0]).unwrap();
        assert!(!solicited.is_unsolicited());
        assert_eq!(solicited.controller_entity_id(), A);
        assert_eq!(solicited.destination_mac(), mac_of(A));

        let unsolicited = AemPdu::parse(&sent[1]).unwrap();
        assert!(unsolicited.is_unsolicited());
        assert_eq!(unsolicited.command_type(), Some(AemCommandType::SetControl));
        assert_eq!(unsolicited.controller_entity_id(), B);
        assert_eq!(unsolicited.destination_mac(), mac_of(B));
        assert_eq!(unsolicited.source_mac(), OWN_MAC);
        assert_eq!(unsolicited.sequence_id(), 0);
        assert_eq!(unsolicited.payload(), solicited.payload());

        // Failures are not announced
        deliver(&mut entity, &mut net, &set_control(A, 6, &[0, 1, 2]));
        assert_eq!(net.take_sent().len(), 1);

        deliver(&mut entity, &mut net, &set_control(A, 7, &[0, 2]));
        let sent = net.take_sent();
        assert_eq!(AemPdu::parse(&sent[1]).unwrap().sequence_id(), 1);
    }

    #[test]
    fn test_subscriber_table_limits() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();
        for id in 1..=MAX_REGISTERED_CONTROLLERS as u64 {
            deliver(
                &mut entity,
                &mut net,
                &command(Eui64::from_u64(id), 1, AemCommandType::RegisterUnsolicitedNotification, &[]),
            );
            assert_eq!(last_response(&net).aem_status(), Some(AemStatus::Success));
        }
        deliver(&mut entity, &mut net, &command(C, 1, AemCommandType::RegisterUnsolicitedNotification, &[]));
        assert_eq!(last_response(&net).aem_status(), Some(AemStatus::NoResources));

        // Re-registering an existing controller still works
        deliver(
            &mut entity,
            &mut net,
            &command(Eui64::from_u64(1), 2, AemCommandType::RegisterUnsolicitedNotification, &[]),
        );
        assert_eq!(last_response(&net).aem_status(), Some(AemStatus::Success));

        deliver(
            &mut entity,
            &mut net,
            &command(Eui64::from_u64(1), 3, AemCommandType::DeregisterUnsolicitedNotification, &[]),
        );
        assert_eq!(entity.registered_controllers().len(), MAX_REGISTERED_CONTROLLERS - 1);
    }

    fn address_access(controller: Eui64, tlvs: &[AaTlv<'_>]) -> Vec<u8> {
        let mut fb: FrameBuffer = FrameBuffer::new();
        AaHeader {
            message_type: AecpMessageType::AddressAccessCommand,
            status: 0,
            target_entity_id: ENTITY_ID,
            controller_entity_id: controller,
            sequence_id: 4,
        }
        .encode(OWN_MAC, mac_of(controller), tlvs, &mut fb)
        .unwrap();
        fb.as_slice().to_vec()
    }

    #[test]
    fn test_address_access_write_then_read() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();
        let write = AaTlv {
            mode: AaMode::Write.to_u8(),
            length: 2,
            address: 4,
            data: &[0xCA, 0xFE],
        };
        deliver(&mut entity, &mut net, &address_access(A, &[write]));
        let response = AaPdu::parse(net.last_sent().unwrap()).unwrap();
        assert_eq!(response.status(), AaStatus::Success.to_u8());
        assert_eq!(response.tlv_count(), 1);

        let read = AaTlv {
            mode: AaMode::Read.to_u8(),
            length: 3,
            address: 3,
            data: &[],
        };
        deliver(&mut entity, &mut net, &address_access(A, &[read]));
        let response = AaPdu::parse(net.last_sent().unwrap()).unwrap();
        assert_eq!(response.message_type(), AecpMessageType::AddressAccessResponse);
        let tlv = response.tlvs().next().unwrap().unwrap();
        assert_eq!(tlv.data, &[0x00, 0xCA, 0xFE]);
    }

    #[test]
    fn test_address_access_rejects_wide_address() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();
        let tlvs = [
            AaTlv {
                mode: AaMode::Write.to_u8(),
                length: 1,
                address: 0x1_0000_0000,
                data: &[1],
            },
            AaTlv {
                mode: AaMode::Write.to_u8(),
                length: 1,
                address: 0,
                data: &[1],
            },
        ];
        deliver(&mut entity, &mut net, &address_access(A, &tlvs));
        let response = AaPdu::parse(net.last_sent().unwrap()).unwrap();
        assert_eq!(response.status(), AaStatus::AddressInvalid.to_u8());
        assert_eq!(response.tlv_count(), 1);
        assert_eq!(entity.model().memory[0], 0);
    }

    #[test]
    fn test_frames_for_others_are_not_claimed() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();
        let mut fb: FrameBuffer = FrameBuffer::new();
        AemHeader::command(Eui64::from_u64(0x77), A, 1, AemCommandType::GetConfiguration)
            .encode(OWN_MAC, mac_of(A), &[0; 4], &mut fb)
            .unwrap();
        assert!(!entity.receive_pdu(&mut net, fb.as_slice()).unwrap());
        assert!(!entity.receive_pdu(&mut net, &[0u8; 10]).unwrap());
        assert!(net.sent_frames().is_empty());
    }

    #[test]
    fn test_send_command_tracks_one_in_flight() {
        let mut net = MockNetIo::new(OWN_MAC);
        let mut entity = entity();
        let first = entity
            .send_command(&mut net, A, mac_of(A), AemCommandType::EntityAvailable, true, &[])
            .unwrap();
        assert!(!entity.can_send_command());
        match entity.send_command(&mut net, A, mac_of(A), AemCommandType::EntityAvailable, true, &[]) {
            Err(AvdeccError::Command(e)) => assert!(e.is_in_flight()),
            other => panic!("unexpected result {other:?}"),
        }
        let untracked = entity
            .send_command(&mut net, A, mac_of(A), AemCommandType::EntityAvailable, false, &[])
            .unwrap();
        assert_eq!(untracked, first.wrapping_add(1));

        entity.tick(&mut net, 251).unwrap();
        assert!(entity.can_send_command());
        assert_eq!(entity.model().timed_out.len(), 1);
        assert_eq!(entity.model().timed_out[0].sequence_id, first);

        entity.tick(&mut net, 1_000).unwrap();
        assert_eq!(entity.model().timed_out.len(), 1);
    }
}
