#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![doc = include_str!("../README.md")]

//! ## Modules
//!
//! - [`addressing`]: EUI-64 entity identifiers and EUI-48 MAC addresses
//! - [`configuration`]: per-entity settings ([`EntityConfig`])
//! - [`protocol`]: IEEE 1722 / 1722.1 frame codec (ADP, AECP, AEM, Address Access)
//! - [`net`]: the [`NetIo`] transport abstraction and its backends
//! - [`entity`]: advertiser, target, controller and control value state machines
//! - [`error`]: [`AvdeccError`] and the crate [`Result`]

// Macro modules (must be declared before use)
#[macro_use]
pub mod macros;
#[macro_use]
pub mod logging;

pub mod addressing;
pub mod configuration;
pub mod entity;
pub mod error;
pub mod net;
pub mod protocol;

// Re-export commonly used types
#[doc(inline)]
pub use addressing::{EntityId, Eui48, Eui64};
#[doc(inline)]
pub use configuration::EntityConfig;
#[doc(inline)]
pub use entity::{
    AdpAdvertiser, ControllerEntity, Entity, EntityModel, Handler, HandlerGroup,
};
#[doc(inline)]
pub use error::{AvdeccError, Result};
#[doc(inline)]
pub use net::NetIo;
