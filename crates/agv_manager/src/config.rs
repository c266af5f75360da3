use common::postgres::PostgresConfig;
use common::telemetry::{LogFormat, TelemetryConfig};
use config::{Config, ConfigError, Environment};
use control_loop::domain::LowBatteryRuleConfig;
use control_loop::ingestion_loop::IngestionLoopConfig;
use control_loop::mqtt::{CommandDispatcherConfig, MqttSessionConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SERVICE_NAME: &str = "agv-manager";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Console log format (json, text)
    #[serde(default)]
    pub log_format: LogFormat,

    // MQTT configuration
    /// MQTT broker host, optionally `mqtt://host:port`
    #[serde(default = "default_mqtt_broker")]
    pub mqtt_broker: String,

    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,

    /// Subscription filter for vehicle status topics
    #[serde(default = "default_mqtt_topic")]
    pub mqtt_topic: String,

    #[serde(default = "default_mqtt_client_id")]
    pub mqtt_client_id: String,

    #[serde(default = "default_mqtt_keep_alive_secs")]
    pub mqtt_keep_alive_secs: u64,

    /// Wait between reconnect attempts after a lost session
    #[serde(default = "default_mqtt_reconnect_delay_secs")]
    pub mqtt_reconnect_delay_secs: u64,

    /// Commands are published to `{control_topic_prefix}/{short id}`
    #[serde(default = "default_control_topic_prefix")]
    pub control_topic_prefix: String,

    // Rule configuration
    /// Battery percentage below which a moving vehicle is recalled
    #[serde(default = "default_low_battery_threshold")]
    pub low_battery_threshold: i32,

    // PostgreSQL configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password", skip_serializing)]
    pub postgres_password: String,

    #[serde(default = "default_postgres_max_pool_size")]
    pub postgres_max_pool_size: usize,

    #[serde(default = "default_postgres_connect_timeout_secs")]
    pub postgres_connect_timeout_secs: u64,

    /// Interval between schema checks while the store is unavailable
    #[serde(default = "default_schema_retry_interval_secs")]
    pub schema_retry_interval_secs: u64,

    /// Upper bound on closer execution at shutdown
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

// MQTT defaults
fn default_mqtt_broker() -> String {
    "mosquitto".to_string()
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_mqtt_topic() -> String {
    "factory/agv/+".to_string()
}

fn default_mqtt_client_id() -> String {
    SERVICE_NAME.to_string()
}

fn default_mqtt_keep_alive_secs() -> u64 {
    30
}

fn default_mqtt_reconnect_delay_secs() -> u64 {
    3
}

fn default_control_topic_prefix() -> String {
    "factory/control".to_string()
}

fn default_low_battery_threshold() -> i32 {
    20
}

// PostgreSQL defaults
fn default_postgres_host() -> String {
    "iot-postgres".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "iot-db".to_string()
}

fn default_postgres_username() -> String {
    "test_user".to_string()
}

fn default_postgres_password() -> String {
    "1234abcd!@#$".to_string()
}

fn default_postgres_max_pool_size() -> usize {
    5
}

fn default_postgres_connect_timeout_secs() -> u64 {
    10
}

fn default_schema_retry_interval_secs() -> u64 {
    3
}

fn default_shutdown_timeout_secs() -> u64 {
    10
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("AGV"))
            .build()?
            .try_deserialize()
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: SERVICE_NAME.to_string(),
            log_level: self.log_level.clone(),
            log_format: self.log_format,
        }
    }

    pub fn postgres_config(&self) -> PostgresConfig {
        PostgresConfig {
            host: self.postgres_host.clone(),
            port: self.postgres_port,
            database: self.postgres_database.clone(),
            username: self.postgres_username.clone(),
            password: self.postgres_password.clone(),
            max_pool_size: self.postgres_max_pool_size,
            connect_timeout_secs: self.postgres_connect_timeout_secs,
        }
    }

    pub fn ingestion_loop_config(&self) -> IngestionLoopConfig {
        IngestionLoopConfig {
            session: MqttSessionConfig {
                broker: self.mqtt_broker.clone(),
                port: self.mqtt_port,
                client_id: self.mqtt_client_id.clone(),
                subscribe_topic: self.mqtt_topic.clone(),
                keep_alive_secs: self.mqtt_keep_alive_secs,
                reconnect_delay_secs: self.mqtt_reconnect_delay_secs,
                ..MqttSessionConfig::default()
            },
            dispatcher: CommandDispatcherConfig {
                control_topic_prefix: self.control_topic_prefix.clone(),
            },
        }
    }

    pub fn low_battery_rule_config(&self) -> LowBatteryRuleConfig {
        LowBatteryRuleConfig {
            threshold: self.low_battery_threshold,
        }
    }

    pub fn schema_retry_interval(&self) -> Duration {
        Duration::from_secs(self.schema_retry_interval_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
