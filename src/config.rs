use std::path::Path;

use anyhow::{Context, Error};
use log::info;
use serde::{Deserialize, Serialize};

use crate::switches::SwitchFunction;

pub const CONFIG_PATH: &str = "config.ron";

/// GPIO wired to the factory reset button.
pub const FACTORY_RESET_PIN: u8 = 9;
pub const SAMPLE_INTERVAL_MS: u32 = 10;
pub const STEERING_RETRY_MS: u64 = 1000;
pub const RESTART_DELAY_MS: u64 = 2000;

pub const SENSOR_ENDPOINT: u8 = 1;
pub const ED_AGING_TIMEOUT_MINUTES: u16 = 64;
pub const KEEP_ALIVE_MS: u32 = 3000;
/// Channels 11 through 26.
pub const ALL_CHANNELS_MASK: u32 = 0x07ff_f800;

#[derive(Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub switches: Vec<Switch>,
    pub debounce: DebounceConfig,
    pub commissioning: CommissioningConfig,
    pub zigbee: ZigbeeConfig,
    pub identify: IdentifyConfig,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct Switch {
    pub pin: u8,
    pub function: SwitchFunction,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DebounceConfig {
    pub sample_interval_ms: u32,
    /// Pressed samples required before a release confirms the press.
    pub min_press_samples: u32,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: SAMPLE_INTERVAL_MS,
            min_press_samples: 1,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CommissioningConfig {
    pub steering_retry_ms: u64,
    pub restart_delay_ms: u64,
}

impl Default for CommissioningConfig {
    fn default() -> Self {
        Self {
            steering_retry_ms: STEERING_RETRY_MS,
            restart_delay_ms: RESTART_DELAY_MS,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ZigbeeConfig {
    pub endpoint: u8,
    pub manufacturer_name: String,
    pub model_identifier: String,
    pub install_code_policy: bool,
    pub ed_aging_timeout_minutes: u16,
    pub keep_alive_ms: u32,
    pub channel_mask: u32,
    pub power_source: u8,
}

impl Default for ZigbeeConfig {
    fn default() -> Self {
        Self {
            endpoint: SENSOR_ENDPOINT,
            manufacturer_name: "Skye Harris".to_string(),
            model_identifier: "Zigbee Device".to_string(),
            install_code_policy: false,
            ed_aging_timeout_minutes: ED_AGING_TIMEOUT_MINUTES,
            keep_alive_ms: KEEP_ALIVE_MS,
            channel_mask: ALL_CHANNELS_MASK,
            power_source: common::zcl::BASIC_POWER_SOURCE_DEFAULT,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct IdentifyConfig {
    pub brightness: u8,
    pub frame_interval_ms: u64,
}

impl Default for IdentifyConfig {
    fn default() -> Self {
        Self {
            brightness: 64,
            frame_interval_ms: 50,
        }
    }
}

impl Config {
    pub fn load() -> Result<Config, Error> {
        Self::load_from(CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Config, Error> {
        let path = path.as_ref();
        let config = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let mut config: Config = ron::from_str(&config)?;
        if config.switches.is_empty() {
            config.switches = default_switches();
        }
        Ok(config)
    }

    /// Loads `config.ron` if present, otherwise the built-in defaults.
    pub fn load_or_default() -> Result<Config, Error> {
        if Path::new(CONFIG_PATH).exists() {
            return Self::load();
        }

        info!("No {} found, using defaults", CONFIG_PATH);
        Ok(Config {
            switches: default_switches(),
            ..Default::default()
        })
    }
}

pub fn default_switches() -> Vec<Switch> {
    vec![Switch {
        pin: FACTORY_RESET_PIN,
        function: SwitchFunction::FactoryReset,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load() {
        let path = std::env::temp_dir().join(format!("sensor-node-{}.ron", std::process::id()));
        std::fs::write(
            &path,
            r#"(
    switches: [
        Switch(
            pin: 4,
            function: FactoryReset,
        ),
    ],
    debounce: (
        min_press_samples: 3,
    ),
    zigbee: (
        model_identifier: "porch-sensor",
    ),
)"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(
            config.switches,
            vec![Switch {
                pin: 4,
                function: SwitchFunction::FactoryReset,
            }]
        );
        assert_eq!(config.debounce.min_press_samples, 3);
        assert_eq!(config.debounce.sample_interval_ms, SAMPLE_INTERVAL_MS);
        assert_eq!(config.zigbee.model_identifier, "porch-sensor");
        assert_eq!(config.zigbee.manufacturer_name, "Skye Harris");
        assert_eq!(config.zigbee.channel_mask, ALL_CHANNELS_MASK);
        assert_eq!(config.commissioning, CommissioningConfig::default());
    }

    #[test]
    fn test_empty_config_gets_default_switch() {
        let path = std::env::temp_dir().join(format!("sensor-node-empty-{}.ron", std::process::id()));
        std::fs::write(&path, "()").unwrap();

        let config = Config::load_from(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.switches, default_switches());
        assert_eq!(config.switches[0].pin, 9);
        assert_eq!(config.zigbee.manufacturer_name, "Skye Harris");
        assert_eq!(config.zigbee.model_identifier, "Zigbee Device");
    }
}
