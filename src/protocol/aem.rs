//! AEM command specific data layouts.
//!
//! Each type here describes the bytes that follow `command_type` in one or
//! more AEM commands. They parse from [`AemPdu::payload`](super::aecp::AemPdu::payload)
//! and encode into a [`FrameBuffer`].

use crate::addressing::{EntityId, Eui64};
use crate::error::{AvdeccError, Result};
use crate::protocol::constants::DESCRIPTOR_ENTITY;
use crate::protocol::frame::{FrameBuffer, FrameReader};
use core::fmt;

/// ACQUIRE_ENTITY and LOCK_ENTITY data.
///
/// ```text
/// ┌──────────┬────────────────────┬─────────────────┬──────────────────┐
/// │ flags(4) │ owner / locker (8) │ descriptor_type │ descriptor_index │
/// └──────────┴────────────────────┴─────────────────┴──────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AcquirePayload {
    pub flags: u32,
    /// Current owner (ACQUIRE) or locker (LOCK); zero in commands
    pub owner_id: EntityId,
    pub descriptor_type: u16,
    pub descriptor_index: u16,
}

/// LOCK_ENTITY shares the ACQUIRE_ENTITY layout
pub type LockPayload = AcquirePayload;

impl AcquirePayload {
    pub const SIZE: usize = 16;

    /// Entity-level request with the given flags
    pub const fn entity(flags: u32) -> Self {
        Self {
            flags,
            owner_id: Eui64::ZERO,
            descriptor_type: DESCRIPTOR_ENTITY,
            descriptor_index: 0,
        }
    }

    /// True if this targets ENTITY descriptor 0
    pub const fn targets_entity(&self) -> bool {
        self.descriptor_type == DESCRIPTOR_ENTITY && self.descriptor_index == 0
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = FrameReader::new(data);
        Ok(Self {
            flags: r.get_u32()?,
            owner_id: r.get_eui64()?,
            descriptor_type: r.get_u16()?,
            descriptor_index: r.get_u16()?,
        })
    }

    pub fn encode<const N: usize>(&self, fb: &mut FrameBuffer<N>) -> Result<()> {
        fb.put_u32(self.flags)?;
        fb.put_eui64(self.owner_id)?;
        fb.put_u16(self.descriptor_type)?;
        fb.put_u16(self.descriptor_index)
    }
}

/// A descriptor reference (`descriptor_type`, `descriptor_index`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DescriptorRef {
    pub descriptor_type: u16,
    pub descriptor_index: u16,
}

impl DescriptorRef {
    pub const SIZE: usize = 4;

    pub const fn new(descriptor_type: u16, descriptor_index: u16) -> Self {
        Self {
            descriptor_type,
            descriptor_index,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = FrameReader::new(data);
        Ok(Self {
            descriptor_type: r.get_u16()?,
            descriptor_index: r.get_u16()?,
        })
    }

    pub fn encode<const N: usize>(&self, fb: &mut FrameBuffer<N>) -> Result<()> {
        fb.put_u16(self.descriptor_type)?;
        fb.put_u16(self.descriptor_index)
    }
}

/// READ_DESCRIPTOR command data. The response repeats the first four bytes
/// and follows them with the descriptor itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadDescriptorPayload {
    pub configuration_index: u16,
    pub descriptor: DescriptorRef,
}

impl ReadDescriptorPayload {
    pub const SIZE: usize = 8;

    /// Bytes of the response that precede the descriptor
    pub const RESPONSE_PREFIX: usize = 4;

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = FrameReader::new(data);
        let configuration_index = r.get_u16()?;
        r.skip(2)?;
        let descriptor_type = r.get_u16()?;
        let descriptor_index = r.get_u16()?;
        Ok(Self {
            configuration_index,
            descriptor: DescriptorRef::new(descriptor_type, descriptor_index),
        })
    }

    pub fn encode<const N: usize>(&self, fb: &mut FrameBuffer<N>) -> Result<()> {
        fb.put_u16(self.configuration_index)?;
        fb.put_zeros(2)?;
        self.descriptor.encode(fb)
    }
}

/// SET_CONFIGURATION / GET_CONFIGURATION data: `reserved(2)`, `configuration_index(2)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigurationPayload {
    pub configuration_index: u16,
}

impl ConfigurationPayload {
    pub const SIZE: usize = 4;

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = FrameReader::new(data);
        r.skip(2)?;
        Ok(Self {
            configuration_index: r.get_u16()?,
        })
    }

    pub fn encode<const N: usize>(&self, fb: &mut FrameBuffer<N>) -> Result<()> {
        fb.put_zeros(2)?;
        fb.put_u16(self.configuration_index)
    }
}

/// Which name a SET_NAME / GET_NAME addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NameAddress {
    pub descriptor: DescriptorRef,
    pub name_index: u16,
    pub configuration_index: u16,
}

impl NameAddress {
    pub const SIZE: usize = 8;

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = FrameReader::new(data);
        let descriptor_type = r.get_u16()?;
        let descriptor_index = r.get_u16()?;
        Ok(Self {
            descriptor: DescriptorRef::new(descriptor_type, descriptor_index),
            name_index: r.get_u16()?,
            configuration_index: r.get_u16()?,
        })
    }

    pub fn encode<const N: usize>(&self, fb: &mut FrameBuffer<N>) -> Result<()> {
        self.descriptor.encode(fb)?;
        fb.put_u16(self.name_index)?;
        fb.put_u16(self.configuration_index)
    }
}

/// 64-byte, NUL padded UTF-8 name.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AvdeccName([u8; AvdeccName::SIZE]);

impl AvdeccName {
    pub const SIZE: usize = 64;

    pub const EMPTY: Self = Self([0; Self::SIZE]);

    /// Name from text, truncated at 64 bytes on a character boundary.
    pub fn new(text: &str) -> Self {
        let mut end = text.len().min(Self::SIZE);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        let mut bytes = [0u8; Self::SIZE];
        bytes[..end].copy_from_slice(&text.as_bytes()[..end]);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; Self::SIZE]) -> Self {
        Self(bytes)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut bytes = [0u8; Self::SIZE];
        bytes.copy_from_slice(FrameReader::new(data).get_slice(Self::SIZE)?);
        Ok(Self(bytes))
    }

    pub fn encode<const N: usize>(&self, fb: &mut FrameBuffer<N>) -> Result<()> {
        fb.put_slice(&self.0)
    }

    pub const fn as_bytes(&self) -> &[u8; Self::SIZE] {
        &self.0
    }

    /// Text up to the first NUL. Invalid UTF-8 is cut at the first bad byte.
    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(Self::SIZE);
        match core::str::from_utf8(&self.0[..len]) {
            Ok(s) => s,
            Err(e) => core::str::from_utf8(&self.0[..e.valid_up_to()]).unwrap_or_default(),
        }
    }
}

impl Default for AvdeccName {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for AvdeccName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AvdeccName({:?})", self.as_str())
    }
}

impl fmt::Display for AvdeccName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for AvdeccName {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(f, "{=str}", self.as_str());
    }
}

/// SET_CONTROL / GET_CONTROL data: a descriptor reference followed by values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlPayload<'a> {
    pub descriptor: DescriptorRef,
    pub values: &'a [u8],
}

impl<'a> ControlPayload<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        let descriptor = DescriptorRef::parse(data)?;
        Ok(Self {
            descriptor,
            values: data
                .get(DescriptorRef::SIZE..)
                .ok_or_else(AvdeccError::malformed_pdu)?,
        })
    }

    pub fn encode<const N: usize>(&self, fb: &mut FrameBuffer<N>) -> Result<()> {
        self.descriptor.encode(fb)?;
        fb.put_slice(self.values)
    }
}
