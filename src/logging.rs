//! Unified Logging Macros for avdecc-pico
//!
//! This module provides a unified logging interface that automatically
//! selects between `log::` and `defmt::` based on the active feature flags.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::avdecc_log;
//!
//! avdecc_log!(info, "Entity acquired by {}", controller_id);
//! avdecc_log!(debug, "Sent {} bytes", n);
//! avdecc_log!(warn, "Command timed out");
//! avdecc_log!(trace, "Ignoring frame");
//! ```
//!
//! # Feature Flags
//!
//! - `log` - Uses `log::` crate
//! - `defmt` - Uses `defmt::` (more efficient for embedded)
//! - neither - Log statements compile to nothing

/// Unified logging macro - automatically selects log:: or defmt:: based on features
///
/// This macro provides a consistent logging API across the entire crate,
/// regardless of which logging backend is configured at compile time.
/// When both backends are enabled `log` wins.
#[macro_export]
#[cfg(feature = "log")]
macro_rules! avdecc_log {
    (info, $($arg:tt)*) => { log::info!($($arg)*) };
    (debug, $($arg:tt)*) => { log::debug!($($arg)*) };
    (warn, $($arg:tt)*) => { log::warn!($($arg)*) };
    (error, $($arg:tt)*) => { log::error!($($arg)*) };
    (trace, $($arg:tt)*) => { log::trace!($($arg)*) };
}

#[macro_export]
#[cfg(all(feature = "defmt", not(feature = "log")))]
macro_rules! avdecc_log {
    (info, $($arg:tt)*) => { defmt::info!($($arg)*) };
    (debug, $($arg:tt)*) => { defmt::debug!($($arg)*) };
    (warn, $($arg:tt)*) => { defmt::warn!($($arg)*) };
    (error, $($arg:tt)*) => { defmt::error!($($arg)*) };
    (trace, $($arg:tt)*) => { defmt::trace!($($arg)*) };
}

// No backend: arguments are still type-checked so disabling logging never
// produces unused-variable warnings.
#[macro_export]
#[cfg(not(any(feature = "defmt", feature = "log")))]
macro_rules! avdecc_log {
    ($level:ident, $($arg:tt)*) => {{
        if false {
            let _ = ::core::format_args!($($arg)*);
        }
    }};
}
