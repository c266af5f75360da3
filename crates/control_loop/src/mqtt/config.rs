use crate::mqtt::topic::{parse_broker_url, validate_subscription_filter};
use common::domain::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MIN_KEEP_ALIVE_SECS: u64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttSessionConfig {
    /// Broker host, optionally with a scheme and port (`mqtt://host:port`)
    pub broker: String,

    /// Port used when `broker` does not carry one
    pub port: u16,

    pub client_id: String,

    /// Wildcard filter covering every vehicle status topic
    pub subscribe_topic: String,

    pub keep_alive_secs: u64,

    /// Pause between reconnect attempts once a session has been established
    pub reconnect_delay_secs: u64,

    /// Capacity of the client's outbound request queue
    pub request_channel_capacity: usize,
}

impl Default for MqttSessionConfig {
    fn default() -> Self {
        Self {
            broker: "mosquitto".to_string(),
            port: 1883,
            client_id: "agv-manager".to_string(),
            subscribe_topic: "factory/agv/+".to_string(),
            keep_alive_secs: 30,
            reconnect_delay_secs: 3,
            request_channel_capacity: 100,
        }
    }
}

impl MqttSessionConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    /// Host and port actually dialled
    pub fn broker_address(&self) -> DomainResult<(String, u16)> {
        let (host, port) = parse_broker_url(&self.broker, self.port)?;
        Ok((host.to_string(), port))
    }

    pub fn validate(&self) -> DomainResult<()> {
        self.broker_address()?;
        validate_subscription_filter(&self.subscribe_topic)?;

        if self.client_id.trim().is_empty() {
            return Err(DomainError::InvalidConfig(
                "MQTT client id cannot be empty".to_string(),
            ));
        }

        if self.keep_alive_secs < MIN_KEEP_ALIVE_SECS {
            return Err(DomainError::InvalidConfig(format!(
                "MQTT keep alive must be at least {} seconds",
                MIN_KEEP_ALIVE_SECS
            )));
        }

        if self.request_channel_capacity == 0 {
            return Err(DomainError::InvalidConfig(
                "MQTT request channel capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MqttSessionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.broker_address().unwrap(),
            ("mosquitto".to_string(), 1883)
        );
    }

    #[test]
    fn test_broker_port_overrides_default_port() {
        let config = MqttSessionConfig {
            broker: "mqtt://broker.local:8883".to_string(),
            ..MqttSessionConfig::default()
        };
        assert_eq!(
            config.broker_address().unwrap(),
            ("broker.local".to_string(), 8883)
        );
    }

    #[test]
    fn test_rejects_invalid_filter() {
        let config = MqttSessionConfig {
            subscribe_topic: "factory/#/agv".to_string(),
            ..MqttSessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(DomainError::InvalidTopic(_))));
    }

    #[test]
    fn test_rejects_empty_client_id() {
        let config = MqttSessionConfig {
            client_id: "  ".to_string(),
            ..MqttSessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(DomainError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_short_keep_alive() {
        let config = MqttSessionConfig {
            keep_alive_secs: 1,
            ..MqttSessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(DomainError::InvalidConfig(_))));
    }
}
