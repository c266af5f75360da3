use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::{AsyncClient, QoS};

/// Trait for publishing raw payloads onto the MQTT bus
/// Abstracts the client so dispatch logic can be tested without a broker
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MqttPublisher: Send + Sync {
    /// Queue a message for delivery. Delivery is at most once.
    async fn publish(&self, topic: String, payload: Bytes) -> Result<()>;
}

/// [`MqttPublisher`] backed by the rumqttc client that owns the session
///
/// Publishing never waits on the event loop: the request is queued and fails
/// immediately if the client's request queue is full or closed.
#[derive(Clone)]
pub struct RumqttcPublisher {
    client: AsyncClient,
}

impl RumqttcPublisher {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MqttPublisher for RumqttcPublisher {
    async fn publish(&self, topic: String, payload: Bytes) -> Result<()> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .context("failed to queue MQTT publish")
    }
}
