mod command_dispatcher;
mod config;
mod publisher;
mod session;
mod topic;

pub use command_dispatcher::{CommandDispatcherConfig, CommandMessage, MqttCommandDispatcher};
pub use config::MqttSessionConfig;
pub use publisher::{MqttPublisher, RumqttcPublisher};
pub use session::{connect, run_ingestion_session};
pub use topic::{
    control_topic, parse_broker_url, validate_subscription_filter, validate_topic_prefix,
};

#[cfg(test)]
pub use publisher::MockMqttPublisher;
