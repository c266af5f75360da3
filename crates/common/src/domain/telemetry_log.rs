use crate::domain::reading::Reading;
use crate::domain::result::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Durable projection of a [`Reading`] as written to the telemetry log
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryLogRow {
    pub vehicle_id: String,
    pub battery: i32,
    pub status: String,
    pub recorded_at: DateTime<Utc>,
}

impl TelemetryLogRow {
    /// `recorded_at` is the moment the store starts the write, not when the
    /// reading was received
    pub fn from_reading(reading: &Reading, recorded_at: DateTime<Utc>) -> Self {
        Self {
            vehicle_id: reading.vehicle_id().to_string(),
            battery: reading.battery(),
            status: reading.status().as_str().to_string(),
            recorded_at,
        }
    }
}

/// Repository trait for the append-only telemetry log
/// Infrastructure layer (e.g., PostgreSQL) implements this trait
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    /// Append one row for the reading
    /// A failed write is reported to the caller and never retried here
    async fn record(&self, reading: &Reading) -> DomainResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::VehicleStatus;

    #[test]
    fn test_row_from_reading_uses_store_timestamp() {
        let received_at = Utc::now();
        let recorded_at = received_at + chrono::Duration::milliseconds(250);
        let reading = Reading::new("factory/agv/002", 64, VehicleStatus::Charging, received_at);

        let row = TelemetryLogRow::from_reading(&reading, recorded_at);

        assert_eq!(row.vehicle_id, "factory/agv/002");
        assert_eq!(row.battery, 64);
        assert_eq!(row.status, "CHARGING");
        assert_eq!(row.recorded_at, recorded_at);
    }
}
