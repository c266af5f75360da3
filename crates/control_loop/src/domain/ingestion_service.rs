use crate::domain::RuleEngine;
use chrono::Utc;
use common::domain::{CommandDispatcher, Reading, TelemetryRepository};
use std::sync::Arc;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

/// What happened to one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Payload could not be decoded; nothing was stored or evaluated
    Malformed,
    Handled {
        persisted: bool,
        command_issued: bool,
        command_dispatched: bool,
    },
}

/// Domain service that turns one telemetry message into its side effects
///
/// Flow:
/// 1. Decode the payload into a Reading (malformed payloads stop here)
/// 2. Append the reading to the telemetry log
/// 3. Evaluate the rule engine
/// 4. Dispatch the resulting command, if any
///
/// Store and dispatch failures are logged and absorbed; they never
/// propagate to the caller.
pub struct IngestionService {
    telemetry_repository: Arc<dyn TelemetryRepository>,
    rule_engine: RuleEngine,
    command_dispatcher: Arc<dyn CommandDispatcher>,
}

impl IngestionService {
    pub fn new(
        telemetry_repository: Arc<dyn TelemetryRepository>,
        rule_engine: RuleEngine,
        command_dispatcher: Arc<dyn CommandDispatcher>,
    ) -> Self {
        Self {
            telemetry_repository,
            rule_engine,
            command_dispatcher,
        }
    }

    /// Process one message to completion
    ///
    /// Each message gets its own root span, independent of the session span.
    pub async fn handle_message(&self, topic: &str, payload: &[u8]) -> MessageOutcome {
        let span = info_span!(
            parent: Span::none(),
            "telemetry_message",
            topic = %topic,
            payload_size = payload.len(),
            vehicle_id = tracing::field::Empty,
        );

        self.process(payload).instrument(span).await
    }

    async fn process(&self, payload: &[u8]) -> MessageOutcome {
        let reading = match Reading::decode(payload, Utc::now()) {
            Ok(reading) => reading,
            Err(e) => {
                warn!(
                    error = %e,
                    payload = %String::from_utf8_lossy(payload),
                    "dropping malformed telemetry message"
                );
                return MessageOutcome::Malformed;
            }
        };

        Span::current().record("vehicle_id", reading.vehicle_id());

        let persisted = match self.telemetry_repository.record(&reading).await {
            Ok(()) => {
                info!(
                    battery = reading.battery(),
                    status = %reading.status(),
                    "reading recorded"
                );
                true
            }
            Err(e) => {
                error!(error = %e, "failed to record reading, dropping it");
                false
            }
        };

        let Some(command) = self.rule_engine.evaluate(&reading, Utc::now()) else {
            debug!("no command issued");
            return MessageOutcome::Handled {
                persisted,
                command_issued: false,
                command_dispatched: false,
            };
        };

        info!(
            battery = reading.battery(),
            target_id = %command.target_vehicle_id,
            action = command.action.as_str(),
            reason = %command.reason,
            "issuing command"
        );

        let command_dispatched = match self.command_dispatcher.dispatch(&command).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "failed to dispatch command");
                false
            }
        };

        MessageOutcome::Handled {
            persisted,
            command_issued: true,
            command_dispatched,
        }
    }
}
