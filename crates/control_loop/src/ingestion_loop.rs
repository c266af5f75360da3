use crate::domain::{IngestionService, RuleEngine};
use crate::mqtt::{
    CommandDispatcherConfig, MqttCommandDispatcher, MqttSessionConfig, RumqttcPublisher, connect,
    run_ingestion_session, validate_topic_prefix,
};
use common::domain::{DomainResult, TelemetryRepository};
use common::postgres::{SchemaBootstrap, SchemaReadiness, wait_for_schema};
use rumqttc::{AsyncClient, EventLoop};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct IngestionLoopConfig {
    pub session: MqttSessionConfig,
    pub dispatcher: CommandDispatcherConfig,
}

struct StartupGate {
    bootstrap: Arc<dyn SchemaBootstrap>,
    retry_interval: Duration,
}

/// The telemetry control loop: one MQTT session feeding the ingestion service
///
/// Inbound readings and outbound commands share the same client, so commands
/// go out over the session that received the triggering reading.
pub struct IngestionLoop {
    client: AsyncClient,
    eventloop: EventLoop,
    session_config: MqttSessionConfig,
    service: Arc<IngestionService>,
    startup_gate: Option<StartupGate>,
}

impl IngestionLoop {
    pub fn new(
        telemetry_repository: Arc<dyn TelemetryRepository>,
        rule_engine: RuleEngine,
        config: IngestionLoopConfig,
    ) -> DomainResult<Self> {
        debug!("initializing ingestion loop");

        validate_topic_prefix(&config.dispatcher.control_topic_prefix)?;
        let (client, eventloop) = connect(&config.session)?;

        let publisher = Arc::new(RumqttcPublisher::new(client.clone()));
        let dispatcher = Arc::new(MqttCommandDispatcher::new(publisher, config.dispatcher));

        info!(rules = ?rule_engine.rule_names(), "rule engine loaded");

        let service = Arc::new(IngestionService::new(
            telemetry_repository,
            rule_engine,
            dispatcher,
        ));

        Ok(Self {
            client,
            eventloop,
            session_config: config.session,
            service,
            startup_gate: None,
        })
    }

    /// Hold off subscribing until the telemetry store schema is confirmed
    pub fn with_startup_gate(
        mut self,
        bootstrap: Arc<dyn SchemaBootstrap>,
        retry_interval: Duration,
    ) -> Self {
        self.startup_gate = Some(StartupGate {
            bootstrap,
            retry_interval,
        });
        self
    }

    pub async fn run(self, ctx: CancellationToken) -> anyhow::Result<()> {
        if let Some(gate) = &self.startup_gate {
            match wait_for_schema(gate.bootstrap.as_ref(), gate.retry_interval, &ctx).await {
                SchemaReadiness::Ready { .. } => {}
                SchemaReadiness::Cancelled { attempts } => {
                    info!(attempts, "shutdown requested before telemetry store was ready");
                    return Ok(());
                }
            }
        }

        run_ingestion_session(
            self.client,
            self.eventloop,
            &self.session_config,
            self.service,
            ctx,
        )
        .await
    }

    #[allow(clippy::type_complexity)]
    pub fn into_runner_process(
        self,
    ) -> Box<
        dyn FnOnce(
                CancellationToken,
            ) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
            > + Send,
    > {
        Box::new(move |ctx| Box::pin(async move { self.run(ctx).await }))
    }
}
