//! EUI-64 identifiers.
//!
//! AVDECC names entities, entity models, controllers and gPTP grandmasters with
//! 64-bit extended unique identifiers. On the wire they are 8 big-endian octets.
//! Both all-zero and all-ones values mean "no identifier".

use crate::error::{AvdeccError, Result};
use core::fmt;

/// 64-bit extended unique identifier.
///
/// # Examples
///
/// ```
/// use avdecc_pico::addressing::Eui64;
///
/// let id: Eui64 = "70:b3:d5:ed:c0:00:00:01".parse().unwrap();
/// assert_eq!(id.to_u64(), 0x70b3_d5ed_c000_0001);
/// assert_eq!(id.to_string(), "70:b3:d5:ed:c0:00:00:01");
/// assert!(!id.is_unset());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Eui64 {
    octets: [u8; 8],
}

/// Entity identifier.
pub type EntityId = Eui64;

/// Entity model identifier.
pub type EntityModelId = Eui64;

impl Eui64 {
    /// Size on the wire in bytes
    pub const SIZE: usize = 8;

    /// All-zero identifier ("unset")
    pub const ZERO: Self = Self { octets: [0; 8] };

    /// All-ones identifier ("unset" in some fields)
    pub const ALL_ONES: Self = Self { octets: [0xFF; 8] };

    /// Create an identifier from its octets.
    #[inline]
    pub const fn new(octets: [u8; 8]) -> Self {
        Self { octets }
    }

    /// Create an identifier from a big-endian `u64`.
    #[inline]
    pub const fn from_u64(value: u64) -> Self {
        Self {
            octets: value.to_be_bytes(),
        }
    }

    /// Big-endian `u64` value of this identifier.
    #[inline]
    pub const fn to_u64(self) -> u64 {
        u64::from_be_bytes(self.octets)
    }

    /// The eight octets, most significant first.
    #[inline]
    pub const fn octets(&self) -> [u8; 8] {
        self.octets
    }

    /// True for the all-zero and all-ones identifiers.
    #[inline]
    pub const fn is_unset(&self) -> bool {
        let v = self.to_u64();
        v == 0 || v == u64::MAX
    }

    /// True when the identifier names something.
    #[inline]
    pub const fn is_set(&self) -> bool {
        !self.is_unset()
    }

    /// Decode an identifier from the start of a byte buffer.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPdu` if the buffer holds fewer than 8 bytes.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let octets: [u8; 8] = buf
            .get(..Self::SIZE)
            .and_then(|s| s.try_into().ok())
            .ok_or_else(AvdeccError::malformed_pdu)?;
        Ok(Self { octets })
    }
}

impl fmt::Display for Eui64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.octets;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5], o[6], o[7]
        )
    }
}

impl From<u64> for Eui64 {
    #[inline]
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl From<Eui64> for u64 {
    #[inline]
    fn from(id: Eui64) -> u64 {
        id.to_u64()
    }
}

impl From<[u8; 8]> for Eui64 {
    #[inline]
    fn from(octets: [u8; 8]) -> Self {
        Self { octets }
    }
}

impl core::str::FromStr for Eui64 {
    type Err = AvdeccError;

    /// Accepts `70:b3:d5:ed:c0:00:00:01`, `70-b3-...`, `70b3d5edc0000001`
    /// and `0x70b3d5edc0000001`.
    fn from_str(s: &str) -> Result<Self> {
        let mut octets = [0u8; 8];
        super::parse_hex_octets(s, &mut octets)?;
        Ok(Self { octets })
    }
}
