use crate::domain::{DomainError, DomainResult, Reading, TelemetryLogRow, TelemetryRepository};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument};

const INSERT_TELEMETRY_LOG: &str =
    "INSERT INTO agv_logs (vehicle_id, battery, status, recorded_at) VALUES ($1, $2, $3, $4)";

#[derive(Clone)]
pub struct PostgresTelemetryRepository {
    client: PostgresClient,
}

impl PostgresTelemetryRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TelemetryRepository for PostgresTelemetryRepository {
    #[instrument(
        name = "telemetry_record",
        skip_all,
        fields(vehicle_id = %reading.vehicle_id())
    )]
    async fn record(&self, reading: &Reading) -> DomainResult<()> {
        let row = TelemetryLogRow::from_reading(reading, Utc::now());

        // Checked out for this write only; returned to the pool on every path
        let conn = self.client.get_connection().await?;

        conn.execute(
            INSERT_TELEMETRY_LOG,
            &[&row.vehicle_id, &row.battery, &row.status, &row.recorded_at],
        )
        .await
        .map_err(|e| DomainError::PersistenceError(row.vehicle_id.clone(), e.to_string()))?;

        debug!(
            battery = row.battery,
            status = %row.status,
            recorded_at = %row.recorded_at,
            "telemetry row inserted"
        );

        Ok(())
    }
}
