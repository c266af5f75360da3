use crate::postgres::PostgresClient;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// DDL for the append-only telemetry log
pub const CREATE_AGV_LOGS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS agv_logs (
    id BIGSERIAL PRIMARY KEY,
    vehicle_id VARCHAR(50) NOT NULL,
    battery INTEGER,
    status VARCHAR(50),
    recorded_at TIMESTAMPTZ NOT NULL DEFAULT now()
)";

const AGV_LOGS_PRESENT: &str = "SELECT to_regclass('agv_logs') IS NOT NULL";

/// Trait for preparing the backing schema before ingestion starts
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SchemaBootstrap: Send + Sync {
    /// Create the schema if needed and confirm it is present
    async fn ensure_schema(&self) -> Result<()>;
}

pub struct PostgresSchemaBootstrap {
    client: PostgresClient,
}

impl PostgresSchemaBootstrap {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SchemaBootstrap for PostgresSchemaBootstrap {
    async fn ensure_schema(&self) -> Result<()> {
        let conn = self.client.get_connection().await?;

        conn.batch_execute(CREATE_AGV_LOGS_TABLE)
            .await
            .context("failed to create agv_logs table")?;

        let row = conn
            .query_one(AGV_LOGS_PRESENT, &[])
            .await
            .context("failed to check for agv_logs table")?;
        let present: bool = row.try_get(0)?;

        if !present {
            bail!("agv_logs table is missing after bootstrap");
        }

        Ok(())
    }
}

/// Result of the startup gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaReadiness {
    Ready { attempts: u32 },
    Cancelled { attempts: u32 },
}

/// Block until the schema is confirmed present
///
/// Retries at a fixed interval with no attempt limit. Returns
/// [`SchemaReadiness::Cancelled`] if the token fires first.
#[instrument(
    name = "schema_gate",
    skip_all,
    fields(retry_interval_ms = retry_interval.as_millis() as u64)
)]
pub async fn wait_for_schema(
    bootstrap: &dyn SchemaBootstrap,
    retry_interval: Duration,
    token: &CancellationToken,
) -> SchemaReadiness {
    let mut attempts: u32 = 0;

    loop {
        if token.is_cancelled() {
            return SchemaReadiness::Cancelled { attempts };
        }

        attempts = attempts.saturating_add(1);
        info!(attempt = attempts, "checking telemetry store schema");

        match bootstrap.ensure_schema().await {
            Ok(()) => {
                info!(attempt = attempts, "telemetry store ready");
                return SchemaReadiness::Ready { attempts };
            }
            Err(e) => {
                let error = format!("{e:#}");
                warn!(
                    attempt = attempts,
                    error = %error,
                    retry_in_ms = retry_interval.as_millis() as u64,
                    "telemetry store not ready, retrying"
                );
            }
        }

        tokio::select! {
            _ = token.cancelled() => return SchemaReadiness::Cancelled { attempts },
            _ = tokio::time::sleep(retry_interval) => {}
        }
    }
}
