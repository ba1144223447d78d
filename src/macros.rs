//! Convenience macros for working with AVDECC identifiers.
//!
//! These declarative macros build [`Eui64`](crate::addressing::Eui64) and
//! [`Eui48`](crate::addressing::Eui48) values from integer literals and reject
//! out-of-range values at compile time.

/// Creates an [`Eui64`](crate::addressing::Eui64) from a `u64` literal.
///
/// Entity IDs and entity model IDs are usually written as a single 64-bit hex
/// number, which is exactly what this macro takes.
///
/// # Examples
///
/// ```
/// use avdecc_pico::eui64;
///
/// let entity_id = eui64!(0x70b3_d5ed_c000_0001);
/// assert_eq!(entity_id.to_u64(), 0x70b3_d5ed_c000_0001);
/// ```
#[macro_export]
macro_rules! eui64 {
    ($value:literal) => {{
        const VALUE: u64 = $value;
        $crate::addressing::Eui64::from_u64(VALUE)
    }};
}

/// Creates an [`Eui48`](crate::addressing::Eui48) (MAC address) from an integer literal.
///
/// # Examples
///
/// ```
/// use avdecc_pico::eui48;
///
/// let mac = eui48!(0x91e0_f001_0000);
/// assert_eq!(mac.octets(), [0x91, 0xe0, 0xf0, 0x01, 0x00, 0x00]);
/// ```
///
/// # Compile-Time Validation
///
/// ```compile_fail
/// // More than 48 bits
/// let mac = avdecc_pico::eui48!(0x1_0000_0000_0000);
/// ```
#[macro_export]
macro_rules! eui48 {
    ($value:literal) => {{
        const VALUE: u64 = $value;
        const _: () = {
            if VALUE > 0xFFFF_FFFF_FFFF {
                panic!("EUI-48 value must fit in 48 bits");
            }
        };
        $crate::addressing::Eui48::from_u64(VALUE)
    }};
}
