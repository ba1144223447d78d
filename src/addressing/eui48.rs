//! EUI-48 (MAC) addresses.

use crate::error::{AvdeccError, Result};
use core::fmt;

/// 48-bit Ethernet MAC address.
///
/// # Examples
///
/// ```
/// use avdecc_pico::addressing::Eui48;
///
/// let mac: Eui48 = "91:e0:f0:01:00:00".parse().unwrap();
/// assert!(mac.is_multicast());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Eui48 {
    octets: [u8; 6],
}

/// MAC address of an entity or controller.
pub type MacAddress = Eui48;

impl Eui48 {
    /// Size on the wire in bytes
    pub const SIZE: usize = 6;

    /// All-zero address
    pub const ZERO: Self = Self { octets: [0; 6] };

    /// Ethernet broadcast address
    pub const BROADCAST: Self = Self { octets: [0xFF; 6] };

    /// Create an address from its octets.
    #[inline]
    pub const fn new(octets: [u8; 6]) -> Self {
        Self { octets }
    }

    /// Create an address from the low 48 bits of a `u64`.
    #[inline]
    pub const fn from_u64(value: u64) -> Self {
        let b = value.to_be_bytes();
        Self {
            octets: [b[2], b[3], b[4], b[5], b[6], b[7]],
        }
    }

    /// The address as the low 48 bits of a `u64`.
    #[inline]
    pub const fn to_u64(self) -> u64 {
        let o = self.octets;
        u64::from_be_bytes([0, 0, o[0], o[1], o[2], o[3], o[4], o[5]])
    }

    /// The six octets, transmitted first to last.
    #[inline]
    pub const fn octets(&self) -> [u8; 6] {
        self.octets
    }

    /// True for group (multicast and broadcast) addresses.
    #[inline]
    pub const fn is_multicast(&self) -> bool {
        self.octets[0] & 0x01 != 0
    }

    /// True for the all-zero and broadcast addresses.
    #[inline]
    pub const fn is_unset(&self) -> bool {
        let v = self.to_u64();
        v == 0 || v == 0xFFFF_FFFF_FFFF
    }

    /// Decode an address from the start of a byte buffer.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPdu` if the buffer holds fewer than 6 bytes.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let octets: [u8; 6] = buf
            .get(..Self::SIZE)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(AvdeccError::malformed_pdu)?;
        Ok(Self { octets })
    }
}

impl fmt::Display for Eui48 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.octets;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl From<[u8; 6]> for Eui48 {
    #[inline]
    fn from(octets: [u8; 6]) -> Self {
        Self { octets }
    }
}

impl From<Eui48> for [u8; 6] {
    #[inline]
    fn from(mac: Eui48) -> [u8; 6] {
        mac.octets
    }
}

impl core::str::FromStr for Eui48 {
    type Err = AvdeccError;

    fn from_str(s: &str) -> Result<Self> {
        let mut octets = [0u8; 6];
        super::parse_hex_octets(s, &mut octets)?;
        Ok(Self { octets })
    }
}
