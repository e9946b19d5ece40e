use std::collections::HashMap;

use anyhow::{Context, Result};

use crate::db::models::ReadingKind;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_client_id: String,
    /// Broker topic carrying `{"degrees": <f64>, "source"?: <string>}`.
    pub mqtt_topic_temperature: String,
    /// Broker topic carrying `{"airQuality": <f64>, "source"?: <string>}`.
    pub mqtt_topic_air: String,
    /// Delay before re-polling the event loop after a transport error.
    pub mqtt_reconnect_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            mqtt_host: optional("MQTT_HOST", "localhost"),
            mqtt_port: optional("MQTT_PORT", "1883")
                .parse()
                .context("MQTT_PORT must be a valid port number")?,
            mqtt_client_id: optional("MQTT_CLIENT_ID", "telemetry-service"),
            mqtt_topic_temperature: optional("MQTT_TOPIC_TEMPERATURE", "sensors/temperature"),
            mqtt_topic_air: optional("MQTT_TOPIC_AIR", "sensors/air"),
            mqtt_reconnect_secs: optional("MQTT_RECONNECT_SECS", "5")
                .parse()
                .context("MQTT_RECONNECT_SECS must be a positive integer")?,
        })
    }

    /// Static exact-match topic → reading-kind routing table, resolved once
    /// at startup.
    pub fn topic_map(&self) -> HashMap<String, ReadingKind> {
        HashMap::from([
            (self.mqtt_topic_temperature.clone(), ReadingKind::Temperature),
            (self.mqtt_topic_air.clone(), ReadingKind::AirQuality),
        ])
    }
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            database_url: "postgres://localhost/telemetry".into(),
            server_host: "0.0.0.0".into(),
            server_port: 8080,
            mqtt_host: "localhost".into(),
            mqtt_port: 1883,
            mqtt_client_id: "telemetry-service".into(),
            mqtt_topic_temperature: "sensors/temperature".into(),
            mqtt_topic_air: "sensors/air".into(),
            mqtt_reconnect_secs: 5,
        }
    }

    #[test]
    fn topic_map_covers_every_kind() {
        let map = test_config().topic_map();
        assert_eq!(map.len(), ReadingKind::ALL.len());
        assert_eq!(map["sensors/temperature"], ReadingKind::Temperature);
        assert_eq!(map["sensors/air"], ReadingKind::AirQuality);
    }

    #[test]
    fn topic_map_is_exact_match_only() {
        let map = test_config().topic_map();
        assert!(!map.contains_key("sensors/temperature/"));
        assert!(!map.contains_key("sensors/+"));
    }
}
