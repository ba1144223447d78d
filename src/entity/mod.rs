//! AVDECC state machines.
//!
//! Every piece implements [`Handler`]: it is offered received frames and
//! ticked with the current time. A [`HandlerGroup`] ties several of them to
//! one transport.
//!
//! - [`AdpAdvertiser`]: ENTITY_AVAILABLE / ENTITY_DISCOVER / ENTITY_DEPARTING
//! - [`Entity`]: AECP target (acquire, lock, descriptors, Address Access)
//! - [`ControllerEntity`]: an [`Entity`] that also sends commands
//! - [`ControlSender`] / [`ControlReceiver`]: CONTROL values over SET_CONTROL
//!
//! ## Example
//!
//! ```
//! use avdecc_pico::addressing::Eui48;
//! use avdecc_pico::configuration::EntityConfig;
//! use avdecc_pico::entity::{AdpAdvertiser, Entity, HandlerGroup, NoModel};
//! use avdecc_pico::eui64;
//! use avdecc_pico::net::MockNetIo;
//!
//! let config = EntityConfig::new(eui64!(0x70b3_d5ed_c000_0001), eui64!(0x70b3_d5ed_c000_0000));
//! let mut net = MockNetIo::new(Eui48::new([0x02, 0, 0, 0, 0, 0x01]));
//! let mut advertiser = AdpAdvertiser::new(config);
//! let mut entity = Entity::new(config, NoModel);
//!
//! let mut group: HandlerGroup<'_, 2> = HandlerGroup::new();
//! group.add(&mut advertiser).unwrap();
//! group.add(&mut entity).unwrap();
//! group.poll(&mut net).unwrap();
//!
//! // First tick advertised the entity
//! assert_eq!(net.sent_frames().len(), 1);
//! ```

pub mod advertiser;
pub mod control;
pub mod controller;
pub mod handler;
pub mod target;

pub use advertiser::AdpAdvertiser;
pub use control::{ControlReceiver, ControlSender, ControlValueHolder};
pub use controller::{ControllerEntity, ControllerObserver, NoObserver};
pub use handler::{Handler, HandlerGroup};
pub use target::{ControllerRef, Entity, EntityModel, HookResult, NoModel, OutstandingCommand};
