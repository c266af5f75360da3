use crate::mqtt::MqttPublisher;
use crate::mqtt::topic::control_topic;
use async_trait::async_trait;
use common::domain::{Command, CommandAction, CommandDispatcher, DomainError, DomainResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDispatcherConfig {
    /// Commands for vehicle `{id}` go to `{control_topic_prefix}/{id}`
    pub control_topic_prefix: String,
}

impl Default for CommandDispatcherConfig {
    fn default() -> Self {
        Self {
            control_topic_prefix: "factory/control".to_string(),
        }
    }
}

/// Wire format of a command published to a vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub target_id: String,
    pub command: CommandAction,
    pub reason: String,
    /// Seconds since the Unix epoch
    pub timestamp: f64,
}

impl From<&Command> for CommandMessage {
    fn from(command: &Command) -> Self {
        Self {
            target_id: command.target_vehicle_id.clone(),
            command: command.action,
            reason: command.reason.clone(),
            timestamp: command.issued_at.timestamp_micros() as f64 / 1_000_000.0,
        }
    }
}

/// Publishes commands to per-vehicle control topics, fire-and-forget
pub struct MqttCommandDispatcher {
    publisher: Arc<dyn MqttPublisher>,
    control_topic_prefix: String,
}

impl MqttCommandDispatcher {
    pub fn new(publisher: Arc<dyn MqttPublisher>, config: CommandDispatcherConfig) -> Self {
        info!(
            control_topic_prefix = %config.control_topic_prefix,
            "created MQTT command dispatcher"
        );
        Self {
            publisher,
            control_topic_prefix: config.control_topic_prefix,
        }
    }
}

#[async_trait]
impl CommandDispatcher for MqttCommandDispatcher {
    async fn dispatch(&self, command: &Command) -> DomainResult<()> {
        let topic = control_topic(&self.control_topic_prefix, &command.target_vehicle_id);

        let payload = serde_json::to_vec(&CommandMessage::from(command)).map_err(|e| {
            DomainError::DispatchError(command.target_vehicle_id.clone(), e.to_string())
        })?;

        debug!(
            topic = %topic,
            size_bytes = payload.len(),
            "publishing command"
        );

        self.publisher
            .publish(topic.clone(), payload.into())
            .await
            .map_err(|e| {
                DomainError::DispatchError(command.target_vehicle_id.clone(), format!("{e:#}"))
            })?;

        info!(
            topic = %topic,
            target_id = %command.target_vehicle_id,
            command = command.action.as_str(),
            "command dispatched"
        );

        Ok(())
    }
}
