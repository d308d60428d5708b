// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Connection details, blocking-wait timing and device lists.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use toolkit_common::DeviceKind;

use crate::Result;

/// Data server endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub api_level: u8,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            host: "localhost".to_string(),
            port: 8004,
            api_level: 6,
        }
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Polling behavior of the blocking AWG operations. Durations are given in
/// seconds in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AwgTiming {
    #[serde(with = "seconds")]
    pub poll_interval: Duration,
    #[serde(with = "seconds")]
    pub compile_timeout: Duration,
    #[serde(with = "seconds")]
    pub upload_timeout: Duration,
}

impl Default for AwgTiming {
    fn default() -> Self {
        AwgTiming {
            poll_interval: Duration::from_millis(100),
            compile_timeout: Duration::from_secs(10),
            upload_timeout: Duration::from_secs(10),
        }
    }
}

fn default_interface() -> String {
    "1GbE".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    pub name: String,
    pub kind: DeviceKind,
    pub serial: String,
    #[serde(default = "default_interface")]
    pub interface: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolkitConfig {
    pub api: ApiConfig,
    pub timing: AwgTiming,
    pub devices: Vec<DeviceConfig>,
}

impl ToolkitConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config = serde_json::from_str(json).context("Invalid toolkit configuration")?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn device(&self, name: &str) -> Option<&DeviceConfig> {
        self.devices.iter().find(|d| d.name == name)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = ToolkitConfig::from_json("{}").unwrap();
        assert_eq!(config.api.host, "localhost");
        assert_eq!(config.api.port, 8004);
        assert_eq!(config.api.api_level, 6);
        assert_eq!(config.timing.poll_interval, Duration::from_millis(100));
        assert!(config.devices.is_empty());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "api": {{"host": "10.42.0.1"}},
                "timing": {{"poll_interval": 0.01, "upload_timeout": 2.5}},
                "devices": [
                    {{"name": "hdawg1", "kind": "hdawg", "serial": "dev8000"}},
                    {{"name": "qa", "kind": "uhfqa", "serial": "dev2000", "interface": "USB"}}
                ]
            }}"#
        )
        .unwrap();
        let config = ToolkitConfig::from_file(file.path()).unwrap();
        assert_eq!(config.api.host, "10.42.0.1");
        assert_eq!(config.api.port, 8004);
        assert_eq!(config.timing.poll_interval, Duration::from_millis(10));
        assert_eq!(config.timing.upload_timeout, Duration::from_millis(2500));
        assert_eq!(config.timing.compile_timeout, Duration::from_secs(10));
        assert_eq!(config.device("hdawg1").unwrap().interface, "1GbE");
        assert_eq!(config.device("qa").unwrap().kind, DeviceKind::Uhfqa);
        assert!(config.device("missing").is_none());
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(ToolkitConfig::from_json(r#"{"api": {"hots": "x"}}"#).is_err());
    }
}
