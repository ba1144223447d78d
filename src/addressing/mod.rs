//! AVDECC addressing.
//!
//! AVDECC uses two kinds of identifiers:
//! - EUI-64 for entities, entity models and controllers
//! - EUI-48 MAC addresses for the Ethernet frames carrying them

pub mod eui48;
pub mod eui64;

pub use eui48::{Eui48, MacAddress};
pub use eui64::{EntityId, EntityModelId, Eui64};

use crate::error::{AvdeccError, Result};

/// Parse `out.len()` hex octets separated by `:` or `-`, or written as one
/// contiguous run of hex digits with an optional `0x` prefix.
pub(crate) fn parse_hex_octets(s: &str, out: &mut [u8]) -> Result<()> {
    let s = s.trim();
    if s.contains(':') || s.contains('-') {
        let mut parts = s.split([':', '-']);
        for octet in out.iter_mut() {
            let part = parts.next().ok_or_else(AvdeccError::invalid_eui)?;
            if part.is_empty() || part.len() > 2 {
                return Err(AvdeccError::invalid_eui());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| AvdeccError::invalid_eui())?;
        }
        if parts.next().is_some() {
            return Err(AvdeccError::invalid_eui());
        }
        return Ok(());
    }

    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    if digits.len() != out.len() * 2 || !digits.is_ascii() {
        return Err(AvdeccError::invalid_eui());
    }
    for (i, octet) in out.iter_mut().enumerate() {
        let pair = &digits[i * 2..i * 2 + 2];
        *octet = u8::from_str_radix(pair, 16).map_err(|_| AvdeccError::invalid_eui())?;
    }
    Ok(())
}
