//! Daemon configuration.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CaptureConfig {
    pub mqtt: MqttConfig,
    /// Base channel key, base64. Derivation handles malformed values
    /// by falling back to an inert zero key.
    #[serde(default = "default_channel_key")]
    pub channel_key: String,
    /// Retention window in hours. Zero disables the sweep.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,
    #[serde(default = "default_client_id")]
    pub client_id: String,
}

impl CaptureConfig {
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }
}

fn default_channel_key() -> String {
    // Well-known default key for the public channel.
    "1PG7OiApB1nwvP+rz05pAQ==".to_string()
}

fn default_retention_hours() -> u64 {
    168
}

fn default_sweep_interval_secs() -> u64 {
    3_600
}

fn default_db_path() -> PathBuf {
    PathBuf::from("meshsink.db")
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_topics() -> Vec<String> {
    vec!["msh/#".to_string()]
}

fn default_client_id() -> String {
    "meshsinkd".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = CaptureConfig::from_toml("[mqtt]\nhost = \"broker.example\"\n")
            .expect("parse");
        assert_eq!(config.mqtt.host, "broker.example");
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.topics, vec!["msh/#".to_string()]);
        assert_eq!(config.retention_hours, 168);
        assert_eq!(config.db_path, PathBuf::from("meshsink.db"));
    }

    #[test]
    fn full_config_parses() {
        let config = CaptureConfig::from_toml(
            r#"
            channel_key = "AQIDBAUGBwgJCgsMDQ4PEBESExQVFhcYGRobHB0eHyA="
            retention_hours = 24
            sweep_interval_secs = 600
            db_path = "/var/lib/meshsink/capture.db"

            [mqtt]
            host = "mqtt.mesh.example"
            port = 8883
            username = "capture"
            password = "hunter2"
            topics = ["msh/EU_868/#", "msh/EU_433/#"]
            client_id = "meshsinkd-eu"
            "#,
        )
        .expect("parse");
        assert_eq!(config.retention_hours, 24);
        assert_eq!(config.mqtt.topics.len(), 2);
        assert_eq!(config.mqtt.username.as_deref(), Some("capture"));
    }

    #[test]
    fn missing_mqtt_section_is_an_error() {
        assert!(CaptureConfig::from_toml("retention_hours = 24\n").is_err());
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[mqtt]\nhost = \"broker.example\"\n").expect("write");

        let config = CaptureConfig::from_path(&path).expect("load");
        assert_eq!(config.mqtt.host, "broker.example");
        assert_eq!(config.retention_hours, 168);

        assert!(CaptureConfig::from_path(dir.path().join("missing.toml")).is_err());
    }
}
