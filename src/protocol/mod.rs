//! IEEE 1722 / 1722.1 wire protocol.
//!
//! This module contains the frame codec, the ADP and AECP data units and the
//! AEM command data layouts. Nothing here keeps state; the state machines live
//! in [`crate::entity`].

pub mod adpdu;
pub mod aecp;
pub mod aem;
pub mod constants;
pub mod frame;

pub use adpdu::Adpdu;
pub use aecp::{AaPdu, AaTlv, AemHeader, AemPdu};
pub use aem::AvdeccName;
pub use constants::*;
pub use frame::{FrameBuffer, FrameReader};
