//! Entity configuration.
//!
//! An [`EntityConfig`] holds everything a local entity advertises about itself
//! plus the protocol timers. It can be built in code or read from `KEY=VALUE`
//! text such as [`SAMPLE_CONFIG`], which makes it easy to keep per-device
//! settings in a file that is `include_str!`'d into firmware.

use crate::addressing::{EntityId, EntityModelId, Eui64};
use crate::error::{AvdeccError, Result};
use crate::protocol::constants::{
    AEM_TIMEOUT_MS, CONTROLLER_CAP_IMPLEMENTED, DEFAULT_VALID_TIME_SECONDS,
    ENTITY_CAP_AEM_SUPPORTED, LOCK_TIMEOUT_MS, MAX_VALID_TIME_SECONDS, MIN_VALID_TIME_SECONDS,
};

/// Example configuration text accepted by [`EntityConfig::from_kv_str`].
pub const SAMPLE_CONFIG: &str = r"
# Identity
ENTITY_ID=70:b3:d5:ed:c0:00:00:01
ENTITY_MODEL_ID=70:b3:d5:ed:c0:00:10:00

# Advertised capabilities
ENTITY_CAPABILITIES=0x00000008
CONTROLLER_CAPABILITIES=0x00000001
TALKER_STREAM_SOURCES=0
TALKER_CAPABILITIES=0
LISTENER_STREAM_SINKS=0
LISTENER_CAPABILITIES=0

# Timers
VALID_TIME=62
LOCK_TIMEOUT_MS=60000
COMMAND_TIMEOUT_MS=250
";

/// Configuration of a local entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityConfig {
    pub entity_id: EntityId,
    pub entity_model_id: EntityModelId,
    pub entity_capabilities: u32,
    pub controller_capabilities: u32,
    pub talker_stream_sources: u16,
    pub talker_capabilities: u16,
    pub listener_stream_sinks: u16,
    pub listener_capabilities: u16,
    /// Advertised validity in seconds. Sent in 2-second units, so odd values round down.
    pub valid_time_seconds: u8,
    pub gptp_grandmaster_id: Eui64,
    pub gptp_domain_number: u8,
    pub identify_control_index: u16,
    pub interface_index: u16,
    pub association_id: Eui64,
    pub lock_timeout_ms: u64,
    pub command_timeout_ms: u64,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            entity_id: Eui64::ZERO,
            entity_model_id: Eui64::ZERO,
            entity_capabilities: ENTITY_CAP_AEM_SUPPORTED,
            controller_capabilities: 0,
            talker_stream_sources: 0,
            talker_capabilities: 0,
            listener_stream_sinks: 0,
            listener_capabilities: 0,
            valid_time_seconds: DEFAULT_VALID_TIME_SECONDS,
            gptp_grandmaster_id: Eui64::ZERO,
            gptp_domain_number: 0,
            identify_control_index: 0,
            interface_index: 0,
            association_id: Eui64::ZERO,
            lock_timeout_ms: LOCK_TIMEOUT_MS,
            command_timeout_ms: AEM_TIMEOUT_MS,
        }
    }
}

impl EntityConfig {
    /// Configuration for an entity with the given identity and default everything else.
    pub fn new(entity_id: EntityId, entity_model_id: EntityModelId) -> Self {
        Self {
            entity_id,
            entity_model_id,
            ..Self::default()
        }
    }

    /// Same configuration advertising controller capability.
    #[must_use]
    pub fn as_controller(mut self) -> Self {
        self.controller_capabilities |= CONTROLLER_CAP_IMPLEMENTED;
        self
    }

    #[must_use]
    pub fn with_entity_capabilities(mut self, caps: u32) -> Self {
        self.entity_capabilities = caps;
        self
    }

    #[must_use]
    pub fn with_controller_capabilities(mut self, caps: u32) -> Self {
        self.controller_capabilities = caps;
        self
    }

    #[must_use]
    pub fn with_talker(mut self, sources: u16, caps: u16) -> Self {
        self.talker_stream_sources = sources;
        self.talker_capabilities = caps;
        self
    }

    #[must_use]
    pub fn with_listener(mut self, sinks: u16, caps: u16) -> Self {
        self.listener_stream_sinks = sinks;
        self.listener_capabilities = caps;
        self
    }

    /// Advertised valid time, clamped to 2..=62 seconds.
    #[must_use]
    pub fn with_valid_time(mut self, seconds: u8) -> Self {
        self.valid_time_seconds = seconds.clamp(MIN_VALID_TIME_SECONDS, MAX_VALID_TIME_SECONDS);
        self
    }

    #[must_use]
    pub fn with_gptp_grandmaster(mut self, id: Eui64, domain: u8) -> Self {
        self.gptp_grandmaster_id = id;
        self.gptp_domain_number = domain;
        self
    }

    #[must_use]
    pub fn with_lock_timeout_ms(mut self, ms: u64) -> Self {
        self.lock_timeout_ms = ms;
        self
    }

    #[must_use]
    pub fn with_command_timeout_ms(mut self, ms: u64) -> Self {
        self.command_timeout_ms = ms;
        self
    }

    /// Valid time as carried on the wire, in 2-second units (1..=31).
    pub const fn encoded_valid_time(&self) -> u8 {
        let units = self.valid_time_seconds / 2;
        if units < MIN_VALID_TIME_SECONDS / 2 {
            MIN_VALID_TIME_SECONDS / 2
        } else if units > MAX_VALID_TIME_SECONDS / 2 {
            MAX_VALID_TIME_SECONDS / 2
        } else {
            units
        }
    }

    /// Milliseconds between two ENTITY_AVAILABLE advertisements: a quarter of
    /// the valid time that is actually advertised.
    pub const fn advertise_interval_ms(&self) -> u64 {
        self.encoded_valid_time() as u64 * 2 * 250
    }

    /// Parse `KEY=VALUE` lines on top of the defaults.
    ///
    /// Blank lines and lines starting with `#` are skipped. Numbers are decimal
    /// or `0x` hex, identifiers use any form [`Eui64`] parses.
    ///
    /// # Errors
    ///
    /// - `UnknownKey` for a key this configuration does not have
    /// - `InvalidValue` for a line without `=`, a value that does not parse or a
    ///   `VALID_TIME` outside 2..=62
    ///
    /// # Examples
    ///
    /// ```
    /// use avdecc_pico::configuration::{EntityConfig, SAMPLE_CONFIG};
    ///
    /// let config = EntityConfig::from_kv_str(SAMPLE_CONFIG).unwrap();
    /// assert_eq!(config.entity_id.to_u64(), 0x70b3_d5ed_c000_0001);
    /// assert_eq!(config.advertise_interval_ms(), 15_500);
    /// ```
    pub fn from_kv_str(text: &str) -> Result<Self> {
        let mut config = Self::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (key, value) = line
                .split_once('=')
                .ok_or_else(AvdeccError::invalid_config_value)?;
            config.apply(key.trim(), value.trim())?;
        }
        Ok(config)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "ENTITY_ID" => self.entity_id = parse_eui64(value)?,
            "ENTITY_MODEL_ID" => self.entity_model_id = parse_eui64(value)?,
            "ENTITY_CAPABILITIES" => self.entity_capabilities = parse_number(value)?,
            "CONTROLLER_CAPABILITIES" => self.controller_capabilities = parse_number(value)?,
            "TALKER_STREAM_SOURCES" => self.talker_stream_sources = parse_number(value)?,
            "TALKER_CAPABILITIES" => self.talker_capabilities = parse_number(value)?,
            "LISTENER_STREAM_SINKS" => self.listener_stream_sinks = parse_number(value)?,
            "LISTENER_CAPABILITIES" => self.listener_capabilities = parse_number(value)?,
            "VALID_TIME" => self.valid_time_seconds = parse_valid_time(value)?,
            "GPTP_GRANDMASTER_ID" => self.gptp_grandmaster_id = parse_eui64(value)?,
            "LOCK_TIMEOUT_MS" => self.lock_timeout_ms = parse_number(value)?,
            "COMMAND_TIMEOUT_MS" => self.command_timeout_ms = parse_number(value)?,
            _ => return Err(AvdeccError::unknown_config_key()),
        }
        Ok(())
    }
}

fn parse_eui64(value: &str) -> Result<Eui64> {
    value
        .parse()
        .map_err(|_: AvdeccError| AvdeccError::invalid_config_value())
}

fn parse_valid_time(value: &str) -> Result<u8> {
    let seconds: u8 = parse_number(value)?;
    if (MIN_VALID_TIME_SECONDS..=MAX_VALID_TIME_SECONDS).contains(&seconds) {
        Ok(seconds)
    } else {
        Err(AvdeccError::invalid_config_value())
    }
}

fn parse_number<T: TryFrom<u64>>(value: &str) -> Result<T> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse::<u64>(),
    };
    parsed
        .ok()
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(AvdeccError::invalid_config_value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EntityConfig::default();
        assert_eq!(config.valid_time_seconds, 62);
        assert_eq!(config.lock_timeout_ms, 60_000);
        assert_eq!(config.command_timeout_ms, 250);
        assert_eq!(config.advertise_interval_ms(), 15_500);
    }

    #[test]
    fn test_sample_config() {
        let config = EntityConfig::from_kv_str(SAMPLE_CONFIG).unwrap();
        assert_eq!(config.entity_model_id.to_u64(), 0x70b3_d5ed_c000_1000);
        assert_eq!(config.controller_capabilities, CONTROLLER_CAP_IMPLEMENTED);
        assert_eq!(config.entity_capabilities, ENTITY_CAP_AEM_SUPPORTED);
    }

    #[test]
    fn test_unknown_key() {
        match EntityConfig::from_kv_str("WIFI_NETWORK=home") {
            Err(AvdeccError::Config(e)) => assert!(e.is_unknown_key()),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn test_invalid_values() {
        assert!(EntityConfig::from_kv_str("VALID_TIME=300").is_err());
        assert!(EntityConfig::from_kv_str("ENTITY_ID=12:34").is_err());
        assert!(EntityConfig::from_kv_str("LOCK_TIMEOUT_MS").is_err());
    }

    #[test]
    fn test_valid_time_range() {
        for bad in ["VALID_TIME=0", "VALID_TIME=1", "VALID_TIME=63", "VALID_TIME=255"] {
            match EntityConfig::from_kv_str(bad) {
                Err(AvdeccError::Config(e)) => assert!(!e.is_unknown_key()),
                other => panic!("{bad}: unexpected result {other:?}"),
            }
        }
        let shortest = EntityConfig::from_kv_str("VALID_TIME=2").unwrap();
        assert_eq!(shortest.advertise_interval_ms(), 500);

        let config = EntityConfig::default().with_valid_time(255);
        assert_eq!(config.valid_time_seconds, 62);
        let config = EntityConfig::default().with_valid_time(0);
        assert_eq!(config.valid_time_seconds, 2);
    }

    #[test]
    fn test_interval_stays_inside_advertised_window() {
        let mut config = EntityConfig::default();
        for seconds in [0, 1, 2, 7, 62, 63, 200, 255] {
            config.valid_time_seconds = seconds;
            let advertised_ms = u64::from(config.encoded_valid_time()) * 2 * 1_000;
            assert!(config.advertise_interval_ms() > 0, "{seconds}");
            assert_eq!(config.advertise_interval_ms() * 4, advertised_ms, "{seconds}");
        }
        // Odd values round down to the 2-second unit
        config.valid_time_seconds = 7;
        assert_eq!(config.advertise_interval_ms(), 1_500);
    }

    #[test]
    fn test_builder() {
        let config = EntityConfig::new(Eui64::from_u64(1), Eui64::from_u64(2))
            .as_controller()
            .with_valid_time(10)
            .with_listener(2, 1);
        assert_eq!(config.controller_capabilities, CONTROLLER_CAP_IMPLEMENTED);
        assert_eq!(config.advertise_interval_ms(), 2_500);
        assert_eq!(config.listener_stream_sinks, 2);
    }
}
