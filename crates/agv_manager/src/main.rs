mod config;

use agv_runner::Runner;
use common::postgres::{PostgresClient, PostgresSchemaBootstrap, PostgresTelemetryRepository};
use common::telemetry::init_telemetry;
use config::ServiceConfig;
use control_loop::domain::RuleEngine;
use control_loop::ingestion_loop::IngestionLoop;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_telemetry(&config.telemetry_config()) {
        eprintln!("Failed to initialize telemetry: {:#}", e);
        std::process::exit(1);
    }

    info!(
        mqtt_broker = %config.mqtt_broker,
        mqtt_port = config.mqtt_port,
        mqtt_topic = %config.mqtt_topic,
        control_topic_prefix = %config.control_topic_prefix,
        low_battery_threshold = config.low_battery_threshold,
        postgres_host = %config.postgres_host,
        postgres_database = %config.postgres_database,
        "Starting agv-manager service"
    );

    // Pool creation is lazy; the schema gate waits for the database itself
    let postgres_client = match PostgresClient::new(&config.postgres_config()) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Failed to create PostgreSQL client");
            std::process::exit(1);
        }
    };

    let telemetry_repository = Arc::new(PostgresTelemetryRepository::new(postgres_client.clone()));
    let schema_bootstrap = Arc::new(PostgresSchemaBootstrap::new(postgres_client.clone()));
    let rule_engine = RuleEngine::standard(&config.low_battery_rule_config());

    let ingestion_loop = match IngestionLoop::new(
        telemetry_repository,
        rule_engine,
        config.ingestion_loop_config(),
    ) {
        Ok(ingestion_loop) => {
            ingestion_loop.with_startup_gate(schema_bootstrap, config.schema_retry_interval())
        }
        Err(e) => {
            error!(error = %e, "Failed to initialize ingestion loop");
            std::process::exit(1);
        }
    };

    let runner = Runner::new()
        .with_named_process("ingestion_loop", ingestion_loop.into_runner_process())
        .with_closer(move || async move {
            info!("Closing PostgreSQL pool");
            postgres_client.close();
            Ok(())
        })
        .with_closer_timeout(config.shutdown_timeout());

    let outcome = runner.run().await;
    std::process::exit(outcome.exit_code());
}
