//! IEEE 1722 / 1722.1 protocol constants, message types and status codes.

use crate::addressing::Eui48;

/// AVTP ethertype
pub const AVTP_ETHERTYPE: u16 = 0x22F0;

/// Ethernet header size (dest MAC, source MAC, ethertype)
pub const ETHERNET_HEADER_SIZE: usize = 14;

/// AVTP control header size (subtype, version/message type, status/length, stream or entity id)
pub const CONTROL_HEADER_SIZE: usize = 12;

/// Largest frame the stack builds or accepts
pub const MAX_FRAME_SIZE: usize = 640;

/// ADP/ACMP multicast destination MAC address
pub const ADP_MULTICAST_MAC: Eui48 = Eui48::new([0x91, 0xE0, 0xF0, 0x01, 0x00, 0x00]);

/// AVTP version carried in byte 1 of every control header
pub const AVTP_VERSION: u8 = 0;

// =============================================================================
// Subtypes
// =============================================================================

/// ADP subtype
pub const SUBTYPE_ADP: u8 = 0x7A;

/// AECP subtype
pub const SUBTYPE_AECP: u8 = 0x7B;

/// ACMP subtype
pub const SUBTYPE_ACMP: u8 = 0x7C;

/// Control frames set the `cd` bit on top of the subtype
pub const CONTROL_DATA_BIT: u8 = 0x80;

// =============================================================================
// ADP
// =============================================================================

/// control_data_length of an ADPDU
pub const ADPDU_CONTROL_DATA_LENGTH: u16 = 56;

/// ADPDU size after the Ethernet header
pub const ADPDU_SIZE: usize = CONTROL_HEADER_SIZE + ADPDU_CONTROL_DATA_LENGTH as usize;

/// Full ADP frame size (Ethernet header + ADPDU)
pub const ADP_FRAME_SIZE: usize = ETHERNET_HEADER_SIZE + ADPDU_SIZE;

/// ADP message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AdpMessageType {
    /// `ENTITY_AVAILABLE`
    EntityAvailable = 0,
    /// `ENTITY_DEPARTING`
    EntityDeparting = 1,
    /// `ENTITY_DISCOVER`
    EntityDiscover = 2,
}

impl AdpMessageType {
    /// Convert u8 to `AdpMessageType`
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::EntityAvailable),
            1 => Some(Self::EntityDeparting),
            2 => Some(Self::EntityDiscover),
            _ => None,
        }
    }

    /// Convert `AdpMessageType` to u8
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

// =============================================================================
// AECP
// =============================================================================

/// AECP message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AecpMessageType {
    /// `AEM_COMMAND`
    AemCommand = 0,
    /// `AEM_RESPONSE`
    AemResponse = 1,
    /// `ADDRESS_ACCESS_COMMAND`
    AddressAccessCommand = 2,
    /// `ADDRESS_ACCESS_RESPONSE`
    AddressAccessResponse = 3,
}

impl AecpMessageType {
    /// Convert u8 to `AecpMessageType`
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::AemCommand),
            1 => Some(Self::AemResponse),
            2 => Some(Self::AddressAccessCommand),
            3 => Some(Self::AddressAccessResponse),
            _ => None,
        }
    }

    /// Convert `AecpMessageType` to u8
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// True for the two command message types
    pub const fn is_command(self) -> bool {
        matches!(self, Self::AemCommand | Self::AddressAccessCommand)
    }

    /// The response type answering this command type (responses map to themselves)
    pub const fn to_response(self) -> Self {
        match self {
            Self::AemCommand | Self::AemResponse => Self::AemResponse,
            Self::AddressAccessCommand | Self::AddressAccessResponse => {
                Self::AddressAccessResponse
            }
        }
    }
}

/// AEM header size after the control header (sequence_id + command_type)
pub const AEM_HEADER_SIZE: usize = 4;

/// Bit set in `command_type` of unsolicited responses
pub const AEM_UNSOLICITED_BIT: u16 = 0x8000;

/// AEM command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum AemCommandType {
    AcquireEntity = 0x0000,
    LockEntity = 0x0001,
    EntityAvailable = 0x0002,
    ControllerAvailable = 0x0003,
    ReadDescriptor = 0x0004,
    WriteDescriptor = 0x0005,
    SetConfiguration = 0x0006,
    GetConfiguration = 0x0007,
    SetStreamFormat = 0x0008,
    GetStreamFormat = 0x0009,
    SetVideoFormat = 0x000A,
    GetVideoFormat = 0x000B,
    SetSensorFormat = 0x000C,
    GetSensorFormat = 0x000D,
    SetStreamInfo = 0x000E,
    GetStreamInfo = 0x000F,
    SetName = 0x0010,
    GetName = 0x0011,
    SetAssociationId = 0x0012,
    GetAssociationId = 0x0013,
    SetSamplingRate = 0x0014,
    GetSamplingRate = 0x0015,
    SetClockSource = 0x0016,
    GetClockSource = 0x0017,
    SetControl = 0x0018,
    GetControl = 0x0019,
    IncrementControl = 0x001A,
    DecrementControl = 0x001B,
    SetSignalSelector = 0x001C,
    GetSignalSelector = 0x001D,
    SetMixer = 0x001E,
    GetMixer = 0x001F,
    SetMatrix = 0x0020,
    GetMatrix = 0x0021,
    StartStreaming = 0x0022,
    StopStreaming = 0x0023,
    RegisterUnsolicitedNotification = 0x0024,
    DeregisterUnsolicitedNotification = 0x0025,
    IdentifyNotification = 0x0026,
}

impl AemCommandType {
    /// Convert a u16 (with or without the unsolicited bit) to `AemCommandType`
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value & !AEM_UNSOLICITED_BIT {
            0x0000 => Some(Self::AcquireEntity),
            0x0001 => Some(Self::LockEntity),
            0x0002 => Some(Self::EntityAvailable),
            0x0003 => Some(Self::ControllerAvailable),
            0x0004 => Some(Self::ReadDescriptor),
            0x0005 => Some(Self::WriteDescriptor),
            0x0006 => Some(Self::SetConfiguration),
            0x0007 => Some(Self::GetConfiguration),
            0x0008 => Some(Self::SetStreamFormat),
            0x0009 => Some(Self::GetStreamFormat),
            0x000A => Some(Self::SetVideoFormat),
            0x000B => Some(Self::GetVideoFormat),
            0x000C => Some(Self::SetSensorFormat),
            0x000D => Some(Self::GetSensorFormat),
            0x000E => Some(Self::SetStreamInfo),
            0x000F => Some(Self::GetStreamInfo),
            0x0010 => Some(Self::SetName),
            0x0011 => Some(Self::GetName),
            0x0012 => Some(Self::SetAssociationId),
            0x0013 => Some(Self::GetAssociationId),
            0x0014 => Some(Self::SetSamplingRate),
            0x0015 => Some(Self::GetSamplingRate),
            0x0016 => Some(Self::SetClockSource),
            0x0017 => Some(Self::GetClockSource),
            0x0018 => Some(Self::SetControl),
            0x0019 => Some(Self::GetControl),
            0x001A => Some(Self::IncrementControl),
            0x001B => Some(Self::DecrementControl),
            0x001C => Some(Self::SetSignalSelector),
            0x001D => Some(Self::GetSignalSelector),
            0x001E => Some(Self::SetMixer),
            0x001F => Some(Self::GetMixer),
            0x0020 => Some(Self::SetMatrix),
            0x0021 => Some(Self::GetMatrix),
            0x0022 => Some(Self::StartStreaming),
            0x0023 => Some(Self::StopStreaming),
            0x0024 => Some(Self::RegisterUnsolicitedNotification),
            0x0025 => Some(Self::DeregisterUnsolicitedNotification),
            0x0026 => Some(Self::IdentifyNotification),
            _ => None,
        }
    }

    /// Convert `AemCommandType` to u16
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Commands that change entity state. Only these are gated by
    /// acquire/lock ownership and fanned out to subscribers.
    pub const fn is_state_mutating(self) -> bool {
        matches!(
            self,
            Self::SetConfiguration | Self::SetName | Self::SetControl
        )
    }
}

/// AEM status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AemStatus {
    Success = 0,
    NotImplemented = 1,
    NoSuchDescriptor = 2,
    EntityLocked = 3,
    EntityAcquired = 4,
    NotAuthenticated = 5,
    AuthenticationDisabled = 6,
    BadArguments = 7,
    NoResources = 8,
    InProgress = 9,
    EntityMisbehaving = 10,
    NotSupported = 11,
    StreamIsRunning = 12,
}

impl AemStatus {
    /// Convert u8 to `AemStatus`
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Success),
            1 => Some(Self::NotImplemented),
            2 => Some(Self::NoSuchDescriptor),
            3 => Some(Self::EntityLocked),
            4 => Some(Self::EntityAcquired),
            5 => Some(Self::NotAuthenticated),
            6 => Some(Self::AuthenticationDisabled),
            7 => Some(Self::BadArguments),
            8 => Some(Self::NoResources),
            9 => Some(Self::InProgress),
            10 => Some(Self::EntityMisbehaving),
            11 => Some(Self::NotSupported),
            12 => Some(Self::StreamIsRunning),
            _ => None,
        }
    }

    /// Convert `AemStatus` to u8
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// True for `SUCCESS`
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Address access status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AaStatus {
    Success = 0,
    NotImplemented = 1,
    AddressTooLow = 2,
    AddressTooHigh = 3,
    AddressInvalid = 4,
    TlvInvalid = 5,
    DataInvalid = 6,
    Unsupported = 7,
}

impl AaStatus {
    /// Convert u8 to `AaStatus`
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Success),
            1 => Some(Self::NotImplemented),
            2 => Some(Self::AddressTooLow),
            3 => Some(Self::AddressTooHigh),
            4 => Some(Self::AddressInvalid),
            5 => Some(Self::TlvInvalid),
            6 => Some(Self::DataInvalid),
            7 => Some(Self::Unsupported),
            _ => None,
        }
    }

    /// Convert `AaStatus` to u8
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// True for `SUCCESS`
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Address access TLV modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum AaMode {
    Read = 0,
    Write = 1,
    Execute = 2,
}

impl AaMode {
    /// Convert the 4-bit mode field to `AaMode`
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Read),
            1 => Some(Self::Write),
            2 => Some(Self::Execute),
            _ => None,
        }
    }

    /// Convert `AaMode` to u8
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

// =============================================================================
// Descriptor Types
// =============================================================================

pub const DESCRIPTOR_ENTITY: u16 = 0x0000;
pub const DESCRIPTOR_CONFIGURATION: u16 = 0x0001;
pub const DESCRIPTOR_AUDIO_UNIT: u16 = 0x0002;
pub const DESCRIPTOR_VIDEO_UNIT: u16 = 0x0003;
pub const DESCRIPTOR_SENSOR_UNIT: u16 = 0x0004;
pub const DESCRIPTOR_STREAM_INPUT: u16 = 0x0005;
pub const DESCRIPTOR_STREAM_OUTPUT: u16 = 0x0006;
pub const DESCRIPTOR_JACK_INPUT: u16 = 0x0007;
pub const DESCRIPTOR_JACK_OUTPUT: u16 = 0x0008;
pub const DESCRIPTOR_AVB_INTERFACE: u16 = 0x0009;
pub const DESCRIPTOR_CLOCK_SOURCE: u16 = 0x000A;
pub const DESCRIPTOR_MEMORY_OBJECT: u16 = 0x000B;
pub const DESCRIPTOR_LOCALE: u16 = 0x000C;
pub const DESCRIPTOR_STRINGS: u16 = 0x000D;
pub const DESCRIPTOR_CONTROL: u16 = 0x001A;

// =============================================================================
// Command Flags
// =============================================================================

/// ACQUIRE_ENTITY: keep ownership until explicitly released
pub const ACQUIRE_FLAG_PERSISTENT: u32 = 0x0000_0001;

/// ACQUIRE_ENTITY: release instead of acquire
pub const ACQUIRE_FLAG_RELEASE: u32 = 0x8000_0000;

/// LOCK_ENTITY: unlock instead of lock
pub const LOCK_FLAG_UNLOCK: u32 = 0x0000_0001;

// =============================================================================
// Capabilities
// =============================================================================

pub const ENTITY_CAP_EFU_MODE: u32 = 0x0000_0001;
pub const ENTITY_CAP_ADDRESS_ACCESS_SUPPORTED: u32 = 0x0000_0002;
pub const ENTITY_CAP_GATEWAY_ENTITY: u32 = 0x0000_0004;
pub const ENTITY_CAP_AEM_SUPPORTED: u32 = 0x0000_0008;
pub const ENTITY_CAP_LEGACY_AVC: u32 = 0x0000_0010;
pub const ENTITY_CAP_ASSOCIATION_ID_SUPPORTED: u32 = 0x0000_0020;
pub const ENTITY_CAP_ASSOCIATION_ID_VALID: u32 = 0x0000_0040;
pub const ENTITY_CAP_VENDOR_UNIQUE_SUPPORTED: u32 = 0x0000_0080;
pub const ENTITY_CAP_CLASS_A_SUPPORTED: u32 = 0x0000_0100;
pub const ENTITY_CAP_CLASS_B_SUPPORTED: u32 = 0x0000_0200;
pub const ENTITY_CAP_GPTP_SUPPORTED: u32 = 0x0000_0400;

pub const CONTROLLER_CAP_IMPLEMENTED: u32 = 0x0000_0001;

pub const TALKER_CAP_IMPLEMENTED: u16 = 0x0001;
pub const LISTENER_CAP_IMPLEMENTED: u16 = 0x0001;

// =============================================================================
// Timing
// =============================================================================

/// A lock not refreshed within this many milliseconds is released
pub const LOCK_TIMEOUT_MS: u64 = 60_000;

/// An outstanding AEM command not answered within this many milliseconds times out
pub const AEM_TIMEOUT_MS: u64 = 250;

/// Default advertised valid time in seconds
pub const DEFAULT_VALID_TIME_SECONDS: u8 = 62;

/// Shortest valid time an entity may advertise (one 2-second unit)
pub const MIN_VALID_TIME_SECONDS: u8 = 2;

/// Longest valid time the 5-bit field can carry (31 two-second units)
pub const MAX_VALID_TIME_SECONDS: u8 = 62;

/// Capacity of the unsolicited notification subscriber table
pub const MAX_REGISTERED_CONTROLLERS: usize = 4;
