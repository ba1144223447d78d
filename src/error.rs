//! Error types for AVDECC operations following M-ERRORS-CANONICAL-STRUCTS guideline.
//!
//! These errors describe local failures (malformed buffers, transport problems,
//! exhausted tables). Protocol-level outcomes that travel on the wire are
//! [`AemStatus`](crate::protocol::AemStatus) / [`AaStatus`](crate::protocol::AaStatus)
//! values and never appear here.

use core::fmt;

#[cfg(feature = "std")]
use std::backtrace::Backtrace;

/// Result type alias for AVDECC operations.
pub type Result<T> = core::result::Result<T, AvdeccError>;

// =============================================================================
// Error Kind Enums (Internal)
// =============================================================================

/// Protocol error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ProtocolErrorKind {
    MalformedPdu,
    InvalidEthertype,
    UnexpectedSubtype,
    UnsupportedVersion,
    UnexpectedMessageType,
}

/// Transport error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum TransportErrorKind {
    SendFailed,
    ReceiveFailed,
    NoHardwareAddress,
}

/// Capacity error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum CapacityErrorKind {
    BufferOverflow,
    TableFull,
}

/// Command flow-control error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum CommandErrorKind {
    CommandInFlight,
}

/// Configuration error variants (internal)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub(crate) enum ConfigErrorKind {
    InvalidValue,
    UnknownKey,
}

// =============================================================================
// Main Error Type
// =============================================================================

/// AVDECC stack error types.
///
/// This is the main error type returned by all fallible operations.
/// It contains a backtrace (when std feature is enabled) and detailed
/// error information through helper methods.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AvdeccError {
    /// Wire format errors (truncated frame, wrong subtype, version, ...)
    Protocol(ProtocolError),
    /// Transport errors (send/receive failed, no MAC address)
    Transport(TransportError),
    /// A fixed-capacity buffer or table is exhausted
    Capacity(CapacityError),
    /// Outstanding-command flow control violations
    Command(CommandError),
    /// Malformed EUI-48 / EUI-64 text or value
    Addressing(AddressingError),
    /// Invalid configuration text
    Config(ConfigError),
    /// Generic operation errors
    InvalidState,
    Timeout,
}

// =============================================================================
// Structured Error Types
// =============================================================================

/// Protocol error with optional backtrace
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ProtocolError {
    kind: ProtocolErrorKind,
    #[cfg(feature = "std")]
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    backtrace: Backtrace,
}

impl ProtocolError {
    pub(crate) fn new(kind: ProtocolErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if the PDU was truncated or internally inconsistent
    pub fn is_malformed(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::MalformedPdu)
    }

    /// Check if the frame carried another AVTP subtype or ethertype
    pub fn is_foreign(&self) -> bool {
        matches!(
            self.kind,
            ProtocolErrorKind::InvalidEthertype | ProtocolErrorKind::UnexpectedSubtype
        )
    }

    /// Check if this is an unsupported version error
    pub fn is_unsupported_version(&self) -> bool {
        matches!(self.kind, ProtocolErrorKind::UnsupportedVersion)
    }
}

/// Transport error with optional backtrace
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransportError {
    kind: TransportErrorKind,
    #[cfg(feature = "std")]
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    backtrace: Backtrace,
}

impl TransportError {
    pub(crate) fn new(kind: TransportErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if a frame could not be handed to the driver
    pub fn is_send_failed(&self) -> bool {
        matches!(self.kind, TransportErrorKind::SendFailed)
    }
}

/// Capacity error with optional backtrace
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CapacityError {
    kind: CapacityErrorKind,
    #[cfg(feature = "std")]
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    backtrace: Backtrace,
}

impl CapacityError {
    pub(crate) fn new(kind: CapacityErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if a frame buffer ran out of room
    pub fn is_buffer_overflow(&self) -> bool {
        matches!(self.kind, CapacityErrorKind::BufferOverflow)
    }

    /// Check if a bounded table is full
    pub fn is_table_full(&self) -> bool {
        matches!(self.kind, CapacityErrorKind::TableFull)
    }
}

/// Command flow-control error with optional backtrace
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CommandError {
    kind: CommandErrorKind,
    #[cfg(feature = "std")]
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    backtrace: Backtrace,
}

impl CommandError {
    pub(crate) fn new(kind: CommandErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if another tracked command is still awaiting its response
    pub fn is_in_flight(&self) -> bool {
        matches!(self.kind, CommandErrorKind::CommandInFlight)
    }
}

/// Addressing error with optional backtrace
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AddressingError {
    #[cfg(feature = "std")]
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    backtrace: Backtrace,
}

impl AddressingError {
    pub(crate) fn new() -> Self {
        Self {
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }
}

/// Configuration error with optional backtrace
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConfigError {
    kind: ConfigErrorKind,
    #[cfg(feature = "std")]
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    backtrace: Backtrace,
}

impl ConfigError {
    pub(crate) fn new(kind: ConfigErrorKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "std")]
            backtrace: Backtrace::capture(),
        }
    }

    /// Check if the configuration text named an unknown key
    pub fn is_unknown_key(&self) -> bool {
        matches!(self.kind, ConfigErrorKind::UnknownKey)
    }
}

// =============================================================================
// Convenience Constructors for AvdeccError
// =============================================================================

impl AvdeccError {
    // Protocol errors
    pub(crate) fn malformed_pdu() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::MalformedPdu))
    }

    pub(crate) fn invalid_ethertype() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::InvalidEthertype))
    }

    pub(crate) fn unexpected_subtype() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::UnexpectedSubtype))
    }

    pub(crate) fn unsupported_version() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::UnsupportedVersion))
    }

    pub(crate) fn unexpected_message_type() -> Self {
        Self::Protocol(ProtocolError::new(ProtocolErrorKind::UnexpectedMessageType))
    }

    // Transport errors
    pub fn send_failed() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::SendFailed))
    }

    pub fn receive_failed() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::ReceiveFailed))
    }

    pub fn no_hardware_address() -> Self {
        Self::Transport(TransportError::new(TransportErrorKind::NoHardwareAddress))
    }

    // Capacity errors
    pub(crate) fn buffer_overflow() -> Self {
        Self::Capacity(CapacityError::new(CapacityErrorKind::BufferOverflow))
    }

    pub(crate) fn table_full() -> Self {
        Self::Capacity(CapacityError::new(CapacityErrorKind::TableFull))
    }

    // Command errors
    pub(crate) fn command_in_flight() -> Self {
        Self::Command(CommandError::new(CommandErrorKind::CommandInFlight))
    }

    // Addressing errors
    pub(crate) fn invalid_eui() -> Self {
        Self::Addressing(AddressingError::new())
    }

    // Config errors
    pub(crate) fn invalid_config_value() -> Self {
        Self::Config(ConfigError::new(ConfigErrorKind::InvalidValue))
    }

    pub(crate) fn unknown_config_key() -> Self {
        Self::Config(ConfigError::new(ConfigErrorKind::UnknownKey))
    }

    /// True for errors caused by a frame that is not meant for the parser
    /// that rejected it (other subtype, other message type). Handlers pass
    /// such frames on silently.
    pub fn is_not_for_me(&self) -> bool {
        match self {
            AvdeccError::Protocol(e) => e.is_foreign() || matches!(e.kind, ProtocolErrorKind::UnexpectedMessageType),
            _ => false,
        }
    }
}

// =============================================================================
// Display Implementation
// =============================================================================

impl fmt::Display for AvdeccError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AvdeccError::Protocol(e) => write!(f, "Protocol error: {:?}", e.kind),
            AvdeccError::Transport(e) => write!(f, "Transport error: {:?}", e.kind),
            AvdeccError::Capacity(e) => write!(f, "Capacity error: {:?}", e.kind),
            AvdeccError::Command(e) => write!(f, "Command error: {:?}", e.kind),
            AvdeccError::Addressing(_) => write!(f, "Addressing error: invalid EUI"),
            AvdeccError::Config(e) => write!(f, "Configuration error: {:?}", e.kind),
            AvdeccError::InvalidState => write!(f, "Invalid state"),
            AvdeccError::Timeout => write!(f, "Operation timeout"),
        }
    }
}

// Implement std::error::Error for std-based applications
#[cfg(feature = "std")]
impl std::error::Error for AvdeccError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_foreign_frames_are_not_for_me() {
        assert!(AvdeccError::unexpected_subtype().is_not_for_me());
        assert!(AvdeccError::unexpected_message_type().is_not_for_me());
        assert!(!AvdeccError::malformed_pdu().is_not_for_me());
        assert!(!AvdeccError::buffer_overflow().is_not_for_me());
    }

    #[test]
    fn test_capacity_helpers() {
        match AvdeccError::table_full() {
            AvdeccError::Capacity(e) => {
                assert!(e.is_table_full());
                assert!(!e.is_buffer_overflow());
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(
            format!("{}", AvdeccError::command_in_flight()),
            "Command error: CommandInFlight"
        );
        assert_eq!(format!("{}", AvdeccError::Timeout), "Operation timeout");
    }
}
