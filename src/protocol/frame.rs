//! AVTP frame encoding and parsing.
//!
//! This module provides the byte-level building blocks shared by ADP and AECP:
//! a fixed-capacity append-only [`FrameBuffer`], a bounds-checked
//! [`FrameReader`], the Ethernet header and the AVTP control header.
//!
//! ## Frame Structure
//!
//! Every AVDECC control frame has this layout:
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  Ethernet header (14 bytes)         │
//! │  - Destination MAC: 6 bytes         │
//! │  - Source MAC: 6 bytes              │
//! │  - Ethertype 0x22F0: 2 bytes        │
//! ├─────────────────────────────────────┤
//! │  AVTP control header (12 bytes)     │
//! │  - cd | subtype: 1 byte             │
//! │  - sv | version | msg type: 1 byte  │
//! │  - status(5) | data length(11)      │
//! │  - entity id: 8 bytes               │
//! ├─────────────────────────────────────┤
//! │  Control data (data length bytes)   │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use avdecc_pico::protocol::frame::{FrameBuffer, FrameReader};
//!
//! let mut frame: FrameBuffer = FrameBuffer::new();
//! frame.put_u16(0x22F0).unwrap();
//! frame.put_u32(0xDEAD_BEEF).unwrap();
//!
//! let mut reader = FrameReader::new(frame.as_slice());
//! assert_eq!(reader.get_u16().unwrap(), 0x22F0);
//! assert_eq!(reader.get_u32().unwrap(), 0xDEAD_BEEF);
//! assert!(reader.get_u8().is_err());
//! ```

use crate::addressing::{Eui48, Eui64};
use crate::error::{AvdeccError, Result};
use crate::protocol::constants::{
    AVTP_ETHERTYPE, AVTP_VERSION, CONTROL_DATA_BIT, CONTROL_HEADER_SIZE, ETHERNET_HEADER_SIZE,
    MAX_FRAME_SIZE,
};

// =============================================================================
// FrameBuffer
// =============================================================================

/// Append-only big-endian writer over a fixed backing array.
///
/// Writes past the capacity fail with `BufferOverflow` and leave the buffer
/// unchanged. Absolute `set_*_at` accessors patch bytes that were already
/// written, which is how headers are fixed up after the payload is known.
#[derive(Clone)]
pub struct FrameBuffer<const N: usize = MAX_FRAME_SIZE> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> FrameBuffer<N> {
    /// Create an empty buffer
    pub const fn new() -> Self {
        Self { buf: [0; N], len: 0 }
    }

    /// Create a buffer holding a copy of `data`
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let mut fb = Self::new();
        fb.put_slice(data)?;
        Ok(fb)
    }

    /// Number of bytes written
    #[inline(always)]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// True if nothing has been written
    #[inline(always)]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total capacity in bytes
    #[inline(always)]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Bytes still available for writing
    #[inline(always)]
    pub const fn remaining(&self) -> usize {
        N - self.len
    }

    /// Forget all written bytes
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Shorten the written length. Does nothing if `len` is not shorter.
    pub fn truncate(&mut self, len: usize) {
        if len < self.len {
            self.len = len;
        }
    }

    /// The written bytes
    #[inline(always)]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// The written bytes, mutable
    #[inline(always)]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf[..self.len]
    }

    /// Append `n` bytes and return them for the caller to fill in.
    pub fn reserve(&mut self, n: usize) -> Result<&mut [u8]> {
        if n > self.remaining() {
            return Err(AvdeccError::buffer_overflow());
        }
        let start = self.len;
        self.len += n;
        Ok(&mut self.buf[start..self.len])
    }

    pub fn put_slice(&mut self, data: &[u8]) -> Result<()> {
        self.reserve(data.len())?.copy_from_slice(data);
        Ok(())
    }

    pub fn put_zeros(&mut self, n: usize) -> Result<()> {
        self.reserve(n)?.fill(0);
        Ok(())
    }

    pub fn put_u8(&mut self, value: u8) -> Result<()> {
        self.put_slice(&[value])
    }

    pub fn put_u16(&mut self, value: u16) -> Result<()> {
        self.put_slice(&value.to_be_bytes())
    }

    pub fn put_u32(&mut self, value: u32) -> Result<()> {
        self.put_slice(&value.to_be_bytes())
    }

    pub fn put_u64(&mut self, value: u64) -> Result<()> {
        self.put_slice(&value.to_be_bytes())
    }

    pub fn put_eui48(&mut self, value: Eui48) -> Result<()> {
        self.put_slice(&value.octets())
    }

    pub fn put_eui64(&mut self, value: Eui64) -> Result<()> {
        self.put_slice(&value.octets())
    }

    /// Overwrite already written bytes at `pos`.
    pub fn set_slice_at(&mut self, pos: usize, data: &[u8]) -> Result<()> {
        let end = pos
            .checked_add(data.len())
            .filter(|&end| end <= self.len)
            .ok_or_else(AvdeccError::buffer_overflow)?;
        self.buf[pos..end].copy_from_slice(data);
        Ok(())
    }

    pub fn set_u8_at(&mut self, pos: usize, value: u8) -> Result<()> {
        self.set_slice_at(pos, &[value])
    }

    pub fn set_u16_at(&mut self, pos: usize, value: u16) -> Result<()> {
        self.set_slice_at(pos, &value.to_be_bytes())
    }

    pub fn set_u32_at(&mut self, pos: usize, value: u32) -> Result<()> {
        self.set_slice_at(pos, &value.to_be_bytes())
    }

    pub fn set_eui48_at(&mut self, pos: usize, value: Eui48) -> Result<()> {
        self.set_slice_at(pos, &value.octets())
    }

    pub fn set_eui64_at(&mut self, pos: usize, value: Eui64) -> Result<()> {
        self.set_slice_at(pos, &value.octets())
    }

    pub fn get_u8_at(&self, pos: usize) -> Result<u8> {
        FrameReader::at(self.as_slice(), pos).get_u8()
    }

    pub fn get_u16_at(&self, pos: usize) -> Result<u16> {
        FrameReader::at(self.as_slice(), pos).get_u16()
    }

    pub fn get_u32_at(&self, pos: usize) -> Result<u32> {
        FrameReader::at(self.as_slice(), pos).get_u32()
    }

    pub fn get_eui64_at(&self, pos: usize) -> Result<Eui64> {
        FrameReader::at(self.as_slice(), pos).get_eui64()
    }
}

impl<const N: usize> Default for FrameBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> core::fmt::Debug for FrameBuffer<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("len", &self.len)
            .field("capacity", &N)
            .finish()
    }
}

// =============================================================================
// FrameReader
// =============================================================================

/// Big-endian cursor over received bytes.
///
/// Reads past the end fail with `MalformedPdu` and do not advance.
#[derive(Debug, Clone)]
pub struct FrameReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    /// Start reading at the beginning of `data`
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Start reading at offset `pos`
    pub const fn at(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    /// Current offset
    #[inline(always)]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left to read
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn get_slice(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(AvdeccError::malformed_pdu)?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn get_array<const K: usize>(&mut self) -> Result<[u8; K]> {
        let mut out = [0u8; K];
        out.copy_from_slice(self.get_slice(K)?);
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.get_slice(n).map(|_| ())
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.get_array::<1>()?[0])
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        self.get_array().map(u16::from_be_bytes)
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        self.get_array().map(u32::from_be_bytes)
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        self.get_array().map(u64::from_be_bytes)
    }

    pub fn get_eui48(&mut self) -> Result<Eui48> {
        self.get_array().map(Eui48::new)
    }

    pub fn get_eui64(&mut self) -> Result<Eui64> {
        self.get_array().map(Eui64::new)
    }
}

// =============================================================================
// Ethernet Header
// =============================================================================

/// Ethernet II header (14 bytes)
///
/// ```text
/// ┌──────────────────┬──────────────────┬────────────┐
/// │ Destination MAC  │   Source MAC     │ Ethertype  │
/// │    (6 bytes)     │   (6 bytes)      │ (2 bytes)  │
/// └──────────────────┴──────────────────┴────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EthernetHeader {
    pub destination: Eui48,
    pub source: Eui48,
    pub ethertype: u16,
}

impl EthernetHeader {
    /// Size of the header in bytes
    pub const SIZE: usize = ETHERNET_HEADER_SIZE;

    /// AVTP header with the given addresses
    pub const fn avtp(destination: Eui48, source: Eui48) -> Self {
        Self {
            destination,
            source,
            ethertype: AVTP_ETHERTYPE,
        }
    }

    /// Parse the header at the start of a frame
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = FrameReader::new(data);
        Ok(Self {
            destination: r.get_eui48()?,
            source: r.get_eui48()?,
            ethertype: r.get_u16()?,
        })
    }

    /// Append the header to a frame buffer
    pub fn encode<const N: usize>(&self, fb: &mut FrameBuffer<N>) -> Result<()> {
        fb.put_eui48(self.destination)?;
        fb.put_eui48(self.source)?;
        fb.put_u16(self.ethertype)
    }
}

// =============================================================================
// AVTP Control Header
// =============================================================================

/// AVTP control header (12 bytes) common to ADP, AECP and ACMP.
///
/// ```text
/// ┌────┬─────────┬────┬─────────┬──────────┬──────────────────┐
/// │ cd │ subtype │ sv │ version │ msg type │ status │ length  │
/// │ 1b │   7b    │ 1b │   3b    │    4b    │   5b   │   11b   │
/// ├────┴─────────┴────┴─────────┴──────────┴──────────────────┤
/// │         stream id / entity id (8 bytes)                   │
/// └───────────────────────────────────────────────────────────┘
/// ```
///
/// For ADP the `status` field carries `valid_time` in 2-second units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControlHeader {
    pub subtype: u8,
    pub message_type: u8,
    pub status: u8,
    pub control_data_length: u16,
    pub entity_id: Eui64,
}

impl ControlHeader {
    /// Size of the header in bytes
    pub const SIZE: usize = CONTROL_HEADER_SIZE;

    /// Largest value the 11-bit length field can hold
    pub const MAX_CONTROL_DATA_LENGTH: u16 = 0x07FF;

    /// Parse a control header starting right after the Ethernet header.
    ///
    /// # Errors
    ///
    /// - `MalformedPdu` if fewer than 12 bytes are available
    /// - `UnexpectedSubtype` if this is not a control frame
    /// - `UnsupportedVersion` if the AVTP version is not 0
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut r = FrameReader::new(data);
        let b0 = r.get_u8()?;
        let b1 = r.get_u8()?;
        let status_length = r.get_u16()?;
        let entity_id = r.get_eui64()?;

        if b0 & CONTROL_DATA_BIT == 0 {
            return Err(AvdeccError::unexpected_subtype());
        }
        if (b1 >> 4) & 0x07 != AVTP_VERSION {
            return Err(AvdeccError::unsupported_version());
        }

        Ok(Self {
            subtype: b0 & !CONTROL_DATA_BIT,
            message_type: b1 & 0x0F,
            status: (status_length >> 11) as u8,
            control_data_length: status_length & Self::MAX_CONTROL_DATA_LENGTH,
            entity_id,
        })
    }

    /// Append the header to a frame buffer
    pub fn encode<const N: usize>(&self, fb: &mut FrameBuffer<N>) -> Result<()> {
        fb.put_u8(CONTROL_DATA_BIT | self.subtype)?;
        fb.put_u8((AVTP_VERSION << 4) | (self.message_type & 0x0F))?;
        fb.put_u16(pack_status_length(self.status, self.control_data_length))?;
        fb.put_eui64(self.entity_id)
    }
}

/// Pack a 5-bit status and an 11-bit control data length into the
/// `(status << 3) | len_hi`, `len_lo` pair.
#[inline(always)]
pub const fn pack_status_length(status: u8, control_data_length: u16) -> u16 {
    ((status as u16 & 0x1F) << 11) | (control_data_length & ControlHeader::MAX_CONTROL_DATA_LENGTH)
}

/// Check the ethertype of a raw frame and return the AVTP part after the
/// Ethernet header.
pub fn avtp_payload(frame: &[u8]) -> Result<&[u8]> {
    let eth = EthernetHeader::parse(frame)?;
    if eth.ethertype != AVTP_ETHERTYPE {
        return Err(AvdeccError::invalid_ethertype());
    }
    Ok(&frame[EthernetHeader::SIZE..])
}
