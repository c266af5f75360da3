use serde::{Deserialize, Serialize};
use std::time::Duration;

/// PostgreSQL configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_pool_size: usize,
    pub connect_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            host: "iot-postgres".to_string(),
            port: 5432,
            database: "iot-db".to_string(),
            username: "test_user".to_string(),
            password: "1234abcd!@#$".to_string(),
            max_pool_size: 5,
            connect_timeout_secs: 10,
        }
    }
}

impl PostgresConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
