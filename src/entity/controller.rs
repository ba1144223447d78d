//! Controller role.
//!
//! [`ControllerEntity`] is an [`Entity`] that also sends AEM commands to
//! other entities and routes their responses to a [`ControllerObserver`].
//! Both roles share the entity's single outstanding-command slot, so only
//! one tracked command can be in flight at a time. Sending another tracked
//! command before the first completes fails with `CommandInFlight`.
//!
//! ## Example
//!
//! ```
//! use avdecc_pico::addressing::Eui48;
//! use avdecc_pico::configuration::EntityConfig;
//! use avdecc_pico::entity::{ControllerEntity, NoModel, NoObserver};
//! use avdecc_pico::eui64;
//! use avdecc_pico::net::MockNetIo;
//!
//! let mut net = MockNetIo::new(Eui48::new([0x02, 0, 0, 0, 0, 1]));
//! let config = EntityConfig::new(eui64!(0x10), eui64!(0x20)).as_controller();
//! let mut controller = ControllerEntity::new(config, NoModel, NoObserver);
//!
//! let target_mac = Eui48::new([0x02, 0, 0, 0, 0, 2]);
//! controller.send_acquire_entity(&mut net, eui64!(0x99), target_mac, 0).unwrap();
//! assert!(!controller.can_send_command());
//! assert!(controller.send_get_configuration(&mut net, eui64!(0x99), target_mac).is_err());
//! ```

use crate::addressing::{EntityId, Eui48};
use crate::configuration::EntityConfig;
use crate::entity::handler::Handler;
use crate::entity::target::{Entity, EntityModel, OutstandingCommand};
use crate::error::Result;
use crate::net::transport::NetIo;
use crate::protocol::aecp::AemPdu;
use crate::protocol::aem::{
    AcquirePayload, AvdeccName, ConfigurationPayload, ControlPayload, DescriptorRef,
    NameAddress, ReadDescriptorPayload,
};
use crate::protocol::constants::{AemCommandType, AemStatus, DESCRIPTOR_CONTROL};
use crate::protocol::frame::FrameBuffer;

/// Receives the responses a [`ControllerEntity`] finds interesting.
///
/// Solicited responses arrive only for the command that was in flight;
/// unsolicited ones arrive whenever a target announces a change.
#[allow(unused_variables)]
pub trait ControllerObserver {
    fn acquire_entity_response(&mut self, response: &AemPdu<'_>) {}
    fn lock_entity_response(&mut self, response: &AemPdu<'_>) {}
    fn controller_available_response(&mut self, response: &AemPdu<'_>) {}
    fn entity_available_response(&mut self, response: &AemPdu<'_>) {}
    fn read_descriptor_response(&mut self, response: &AemPdu<'_>) {}
    fn set_configuration_response(&mut self, response: &AemPdu<'_>) {}
    fn get_configuration_response(&mut self, response: &AemPdu<'_>) {}
    fn set_name_response(&mut self, response: &AemPdu<'_>) {}
    fn get_name_response(&mut self, response: &AemPdu<'_>) {}
    fn set_control_response(&mut self, response: &AemPdu<'_>) {}
    fn get_control_response(&mut self, response: &AemPdu<'_>) {}
    /// REGISTER_ or DEREGISTER_UNSOLICITED_NOTIFICATION answered
    fn register_unsolicited_notification_response(&mut self, response: &AemPdu<'_>) {}

    /// The tracked command got no response within the command timeout.
    fn command_timed_out(&mut self, command: &OutstandingCommand) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoObserver;

impl ControllerObserver for NoObserver {}

/// An entity acting as an AVDECC controller.
#[derive(Debug)]
pub struct ControllerEntity<M, O> {
    entity: Entity<M>,
    observer: O,
}

impl<M: EntityModel, O: ControllerObserver> ControllerEntity<M, O> {
    pub fn new(config: EntityConfig, model: M, observer: O) -> Self {
        Self {
            entity: Entity::new(config, model),
            observer,
        }
    }

    pub fn entity(&self) -> &Entity<M> {
        &self.entity
    }

    pub fn entity_mut(&mut self) -> &mut Entity<M> {
        &mut self.entity
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    pub fn can_send_command(&self) -> bool {
        self.entity.can_send_command()
    }

    /// See [`Entity::send_command`].
    pub fn send_command(
        &mut self,
        net: &mut dyn NetIo,
        target_entity_id: EntityId,
        target_mac: Eui48,
        command_type: AemCommandType,
        track_for_ack: bool,
        payload: &[u8],
    ) -> Result<u16> {
        self.entity.send_command(
            net,
            target_entity_id,
            target_mac,
            command_type,
            track_for_ack,
            payload,
        )
    }

    // ===== Command wrappers =====

    /// ACQUIRE_ENTITY for the whole entity. Pass `ACQUIRE_FLAG_RELEASE` to release.
    pub fn send_acquire_entity(
        &mut self,
        net: &mut dyn NetIo,
        target_entity_id: EntityId,
        target_mac: Eui48,
        flags: u32,
    ) -> Result<u16> {
        let mut payload: FrameBuffer<{ AcquirePayload::SIZE }> = FrameBuffer::new();
        AcquirePayload::entity(flags).encode(&mut payload)?;
        self.send_command(
            net,
            target_entity_id,
            target_mac,
            AemCommandType::AcquireEntity,
            true,
            payload.as_slice(),
        )
    }

    /// LOCK_ENTITY for the whole entity. Pass `LOCK_FLAG_UNLOCK` to unlock.
    pub fn send_lock_entity(
        &mut self,
        net: &mut dyn NetIo,
        target_entity_id: EntityId,
        target_mac: Eui48,
        flags: u32,
    ) -> Result<u16> {
        let mut payload: FrameBuffer<{ AcquirePayload::SIZE }> = FrameBuffer::new();
        AcquirePayload::entity(flags).encode(&mut payload)?;
        self.send_command(
            net,
            target_entity_id,
            target_mac,
            AemCommandType::LockEntity,
            true,
            payload.as_slice(),
        )
    }

    pub fn send_entity_available(
        &mut self,
        net: &mut dyn NetIo,
        target_entity_id: EntityId,
        target_mac: Eui48,
    ) -> Result<u16> {
        self.send_command(
            net,
            target_entity_id,
            target_mac,
            AemCommandType::EntityAvailable,
            true,
            &[],
        )
    }

    pub fn send_controller_available(
        &mut self,
        net: &mut dyn NetIo,
        target_entity_id: EntityId,
        target_mac: Eui48,
    ) -> Result<u16> {
        self.send_command(
            net,
            target_entity_id,
            target_mac,
            AemCommandType::ControllerAvailable,
            true,
            &[],
        )
    }

    pub fn send_read_descriptor(
        &mut self,
        net: &mut dyn NetIo,
        target_entity_id: EntityId,
        target_mac: Eui48,
        configuration_index: u16,
        descriptor: DescriptorRef,
    ) -> Result<u16> {
        let mut payload: FrameBuffer<{ ReadDescriptorPayload::SIZE }> = FrameBuffer::new();
        ReadDescriptorPayload {
            configuration_index,
            descriptor,
        }
        .encode(&mut payload)?;
        self.send_command(
            net,
            target_entity_id,
            target_mac,
            AemCommandType::ReadDescriptor,
            true,
            payload.as_slice(),
        )
    }

    pub fn send_set_configuration(
        &mut self,
        net: &mut dyn NetIo,
        target_entity_id: EntityId,
        target_mac: Eui48,
        configuration_index: u16,
    ) -> Result<u16> {
        let mut payload: FrameBuffer<{ ConfigurationPayload::SIZE }> = FrameBuffer::new();
        ConfigurationPayload {
            configuration_index,
        }
        .encode(&mut payload)?;
        self.send_command(
            net,
            target_entity_id,
            target_mac,
            AemCommandType::SetConfiguration,
            true,
            payload.as_slice(),
        )
    }

    pub fn send_get_configuration(
        &mut self,
        net: &mut dyn NetIo,
        target_entity_id: EntityId,
        target_mac: Eui48,
    ) -> Result<u16> {
        self.send_command(
            net,
            target_entity_id,
            target_mac,
            AemCommandType::GetConfiguration,
            true,
            &[0; ConfigurationPayload::SIZE],
        )
    }

    pub fn send_set_name(
        &mut self,
        net: &mut dyn NetIo,
        target_entity_id: EntityId,
        target_mac: Eui48,
        address: NameAddress,
        name: &AvdeccName,
    ) -> Result<u16> {
        let mut payload: FrameBuffer<{ NameAddress::SIZE + AvdeccName::SIZE }> =
            FrameBuffer::new();
        address.encode(&mut payload)?;
        name.encode(&mut payload)?;
        self.send_command(
            net,
            target_entity_id,
            target_mac,
            AemCommandType::SetName,
            true,
            payload.as_slice(),
        )
    }

    pub fn send_get_name(
        &mut self,
        net: &mut dyn NetIo,
        target_entity_id: EntityId,
        target_mac: Eui48,
        address: NameAddress,
    ) -> Result<u16> {
        let mut payload: FrameBuffer<{ NameAddress::SIZE }> = FrameBuffer::new();
        address.encode(&mut payload)?;
        self.send_command(
            net,
            target_entity_id,
            target_mac,
            AemCommandType::GetName,
            true,
            payload.as_slice(),
        )
    }

    /// SET_CONTROL. Streams of control updates usually go untracked so they
    /// never block other commands.
    pub fn send_set_control(
        &mut self,
        net: &mut dyn NetIo,
        target_entity_id: EntityId,
        target_mac: Eui48,
        descriptor_index: u16,
        values: &[u8],
        track_for_ack: bool,
    ) -> Result<u16> {
        let mut payload: FrameBuffer = FrameBuffer::new();
        ControlPayload {
            descriptor: DescriptorRef::new(DESCRIPTOR_CONTROL, descriptor_index),
            values,
        }
        .encode(&mut payload)?;
        self.send_command(
            net,
            target_entity_id,
            target_mac,
            AemCommandType::SetControl,
            track_for_ack,
            payload.as_slice(),
        )
    }

    pub fn send_get_control(
        &mut self,
        net: &mut dyn NetIo,
        target_entity_id: EntityId,
        target_mac: Eui48,
        descriptor_index: u16,
    ) -> Result<u16> {
        let mut payload: FrameBuffer<{ DescriptorRef::SIZE }> = FrameBuffer::new();
        DescriptorRef::new(DESCRIPTOR_CONTROL, descriptor_index).encode(&mut payload)?;
        self.send_command(
            net,
            target_entity_id,
            target_mac,
            AemCommandType::GetControl,
            true,
            payload.as_slice(),
        )
    }

    pub fn send_register_unsolicited_notification(
        &mut self,
        net: &mut dyn NetIo,
        target_entity_id: EntityId,
        target_mac: Eui48,
    ) -> Result<u16> {
        self.send_command(
            net,
            target_entity_id,
            target_mac,
            AemCommandType::RegisterUnsolicitedNotification,
            true,
            &[],
        )
    }

    pub fn send_deregister_unsolicited_notification(
        &mut self,
        net: &mut dyn NetIo,
        target_entity_id: EntityId,
        target_mac: Eui48,
    ) -> Result<u16> {
        self.send_command(
            net,
            target_entity_id,
            target_mac,
            AemCommandType::DeregisterUnsolicitedNotification,
            true,
            &[],
        )
    }

    // ===== Responses =====

    /// Route an AEM response to the observer. Returns `true` if the response
    /// was addressed to this controller and was either unsolicited or the
    /// answer to the outstanding command. IN_PROGRESS keeps the command
    /// outstanding and restarts its timeout at `now`.
    pub fn received_aem_response(&mut self, response: &AemPdu<'_>, now: u64) -> bool {
        if !response.is_response_for(self.entity.entity_id()) {
            return false;
        }
        let matched = if response.is_unsolicited() {
            true
        } else if response.aem_status() == Some(AemStatus::InProgress) {
            self.entity.extend_outstanding(response, now)
        } else {
            self.entity.complete_outstanding(response)
        };
        if !matched {
            crate::avdecc_log!(
                trace,
                "Unexpected response #{} from {}",
                response.sequence_id(),
                response.target_entity_id()
            );
            return false;
        }

        let observer = &mut self.observer;
        match response.command_type() {
            Some(AemCommandType::AcquireEntity) => observer.acquire_entity_response(response),
            Some(AemCommandType::LockEntity) => observer.lock_entity_response(response),
            Some(AemCommandType::ControllerAvailable) => {
                observer.controller_available_response(response);
            }
            Some(AemCommandType::EntityAvailable) => observer.entity_available_response(response),
            Some(AemCommandType::ReadDescriptor) => observer.read_descriptor_response(response),
            Some(AemCommandType::SetConfiguration) => {
                observer.set_configuration_response(response);
            }
            Some(AemCommandType::GetConfiguration) => {
                observer.get_configuration_response(response);
            }
            Some(AemCommandType::SetName) => observer.set_name_response(response),
            Some(AemCommandType::GetName) => observer.get_name_response(response),
            Some(AemCommandType::SetControl) => observer.set_control_response(response),
            Some(AemCommandType::GetControl) => observer.get_control_response(response),
            Some(
                AemCommandType::RegisterUnsolicitedNotification
                | AemCommandType::DeregisterUnsolicitedNotification,
            ) => observer.register_unsolicited_notification_response(response),
            _ => {}
        }
        true
    }
}

impl<M: EntityModel, O: ControllerObserver> Handler for ControllerEntity<M, O> {
    fn tick(&mut self, net: &mut dyn NetIo, now: u64) -> Result<()> {
        if let Some(command) = self.entity.check_timeouts(net, now)? {
            self.observer.command_timed_out(&command);
        }
        Ok(())
    }

    fn receive_pdu(&mut self, net: &mut dyn NetIo, frame: &[u8]) -> Result<bool> {
        if self.entity.handle_frame(net, frame)? {
            return Ok(true);
        }
        match AemPdu::parse(frame) {
            Ok(response) => Ok(self.received_aem_response(&response, net.time_in_millis())),
            Err(_) => Ok(false),
        }
    }
}
