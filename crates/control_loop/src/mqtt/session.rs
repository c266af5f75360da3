use crate::domain::IngestionService;
use crate::mqtt::MqttSessionConfig;
use anyhow::{Context, Result, anyhow};
use common::domain::DomainResult;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Upper bound on flushing the DISCONNECT packet at shutdown
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Build the MQTT client and its event loop
///
/// Nothing is dialled until the event loop is first polled.
pub fn connect(config: &MqttSessionConfig) -> DomainResult<(AsyncClient, EventLoop)> {
    config.validate()?;
    let (host, port) = config.broker_address()?;

    let mut mqtt_options = MqttOptions::new(&config.client_id, host, port);
    mqtt_options.set_keep_alive(config.keep_alive());
    mqtt_options.set_clean_session(true);

    Ok(AsyncClient::new(mqtt_options, config.request_channel_capacity))
}

/// Drive one MQTT session until cancelled
///
/// Subscribes on every ConnAck, so the subscription survives reconnects.
/// Messages are handled one at a time in arrival order. An event loop error
/// before the first ConnAck is returned; later errors are logged and the
/// event loop is polled again after the reconnect delay. On cancellation a
/// DISCONNECT is sent if a session was ever established.
#[instrument(
    name = "mqtt_session",
    skip_all,
    fields(
        broker = %config.broker,
        client_id = %config.client_id,
        topic = %config.subscribe_topic,
    )
)]
pub async fn run_ingestion_session(
    client: AsyncClient,
    mut eventloop: EventLoop,
    config: &MqttSessionConfig,
    service: Arc<IngestionService>,
    token: CancellationToken,
) -> Result<()> {
    let mut sessions: u64 = 0;

    info!("starting MQTT session");

    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => {
                debug!("shutdown signal received");
                if sessions > 0 {
                    disconnect(&client, &mut eventloop).await;
                }
                info!(sessions, "MQTT session stopped");
                return Ok(());
            }
            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        sessions += 1;
                        info!(sessions, "connected to MQTT broker");

                        subscribe(&client, &config.subscribe_topic, sessions)?;
                    }
                    Ok(Event::Incoming(Packet::SubAck(_))) => {
                        info!("subscription acknowledged");
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        service.handle_message(&publish.topic, &publish.payload).await;
                    }
                    Ok(Event::Incoming(Packet::PingResp)) => {}
                    Ok(_) => {}
                    Err(e) if sessions == 0 => {
                        return Err(anyhow!(e)).context("failed to connect to MQTT broker");
                    }
                    Err(e) => {
                        warn!(
                            error = %e,
                            retry_in_ms = config.reconnect_delay().as_millis() as u64,
                            "MQTT connection lost, reconnecting"
                        );

                        tokio::select! {
                            _ = token.cancelled() => {}
                            _ = tokio::time::sleep(config.reconnect_delay()) => {}
                        }
                    }
                }
            }
        }
    }
}

/// Queue the subscription for a freshly acknowledged session
///
/// Only the first session fails hard; a resubscribe that cannot be queued is
/// logged and the session carries on.
fn subscribe(client: &AsyncClient, topic: &str, sessions: u64) -> Result<()> {
    match client.try_subscribe(topic, QoS::AtLeastOnce) {
        Ok(()) => Ok(()),
        Err(e) if sessions <= 1 => {
            Err(anyhow!(e)).with_context(|| format!("failed to subscribe to {topic}"))
        }
        Err(e) => {
            warn!(error = %e, topic, "failed to resubscribe after reconnect");
            Ok(())
        }
    }
}

/// Queue a DISCONNECT and poll until it has been written out
async fn disconnect(client: &AsyncClient, eventloop: &mut EventLoop) {
    if let Err(e) = client.try_disconnect() {
        debug!(error = %e, "disconnect request not queued");
        return;
    }

    let flushed = tokio::time::timeout(DISCONNECT_TIMEOUT, async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => return true,
                Ok(_) => {}
                Err(_) => return false,
            }
        }
    })
    .await;

    match flushed {
        Ok(true) => debug!("disconnect sent to broker"),
        _ => debug!("disconnect could not be confirmed"),
    }
}
