use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use common::domain::{DomainResult, Reading, TelemetryLogRow, TelemetryRepository};
use control_loop::domain::{IngestionService, LowBatteryRuleConfig, MessageOutcome, RuleEngine};
use control_loop::mqtt::{CommandDispatcherConfig, MqttCommandDispatcher, MqttPublisher};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct RecordingRepository {
    rows: Mutex<Vec<TelemetryLogRow>>,
}

#[async_trait]
impl TelemetryRepository for RecordingRepository {
    async fn record(&self, reading: &Reading) -> DomainResult<()> {
        self.rows
            .lock()
            .unwrap()
            .push(TelemetryLogRow::from_reading(reading, Utc::now()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingPublisher {
    published: Mutex<Vec<(String, Bytes)>>,
}

#[async_trait]
impl MqttPublisher for RecordingPublisher {
    async fn publish(&self, topic: String, payload: Bytes) -> Result<()> {
        self.published.lock().unwrap().push((topic, payload));
        Ok(())
    }
}

struct Pipeline {
    repository: Arc<RecordingRepository>,
    publisher: Arc<RecordingPublisher>,
    service: IngestionService,
}

impl Pipeline {
    fn new() -> Self {
        let repository = Arc::new(RecordingRepository::default());
        let publisher = Arc::new(RecordingPublisher::default());
        let dispatcher = MqttCommandDispatcher::new(
            publisher.clone(),
            CommandDispatcherConfig::default(),
        );
        let service = IngestionService::new(
            repository.clone(),
            RuleEngine::standard(&LowBatteryRuleConfig::default()),
            Arc::new(dispatcher),
        );

        Self {
            repository,
            publisher,
            service,
        }
    }

    fn rows(&self) -> Vec<TelemetryLogRow> {
        self.repository.rows.lock().unwrap().clone()
    }

    fn published(&self) -> Vec<(String, serde_json::Value)> {
        self.publisher
            .published
            .lock()
            .unwrap()
            .iter()
            .map(|(topic, payload)| (topic.clone(), serde_json::from_slice(payload).unwrap()))
            .collect()
    }
}

#[tokio::test]
async fn low_battery_moving_vehicle_is_logged_and_sent_home() {
    let pipeline = Pipeline::new();
    let before = Utc::now().timestamp() as f64;

    pipeline
        .service
        .handle_message(
            "factory/agv/007",
            br#"{"agv_id":"factory/agv/007","battery":15,"status":"MOVING"}"#,
        )
        .await;

    let rows = pipeline.rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].vehicle_id, "factory/agv/007");
    assert_eq!(rows[0].battery, 15);
    assert_eq!(rows[0].status, "MOVING");

    let published = pipeline.published();
    assert_eq!(published.len(), 1);
    let (topic, body) = &published[0];
    assert_eq!(topic, "factory/control/007");
    assert_eq!(body["target_id"], "007");
    assert_eq!(body["command"], "RETURN_TO_BASE");
    assert_eq!(body["reason"], "Low Battery");
    assert!(body["timestamp"].as_f64().unwrap() >= before);
    assert_eq!(body.as_object().unwrap().len(), 4);
}

#[tokio::test]
async fn returning_vehicle_is_logged_without_command() {
    let pipeline = Pipeline::new();

    pipeline
        .service
        .handle_message(
            "factory/agv/007",
            br#"{"agv_id":"factory/agv/007","battery":15,"status":"RETURNING"}"#,
        )
        .await;

    assert_eq!(pipeline.rows().len(), 1);
    assert!(pipeline.published().is_empty());
}

#[tokio::test]
async fn malformed_payload_is_dropped_and_next_message_still_flows() {
    let pipeline = Pipeline::new();

    let outcome = pipeline
        .service
        .handle_message("factory/agv/007", b"not-json")
        .await;
    assert_eq!(outcome, MessageOutcome::Malformed);
    assert!(pipeline.rows().is_empty());
    assert!(pipeline.published().is_empty());

    pipeline
        .service
        .handle_message(
            "factory/agv/012",
            br#"{"agv_id":"factory/agv/012","battery":80,"status":"MOVING"}"#,
        )
        .await;
    assert_eq!(pipeline.rows().len(), 1);
    assert!(pipeline.published().is_empty());
}

#[tokio::test]
async fn threshold_is_exclusive() {
    let pipeline = Pipeline::new();

    for battery in [20, 19] {
        let payload = format!(
            r#"{{"agv_id":"factory/agv/009","battery":{battery},"status":"MOVING"}}"#
        );
        pipeline
            .service
            .handle_message("factory/agv/009", payload.as_bytes())
            .await;
    }

    assert_eq!(pipeline.rows().len(), 2);
    let published = pipeline.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "factory/control/009");
}

#[tokio::test]
async fn messages_are_logged_in_arrival_order() {
    let pipeline = Pipeline::new();

    for (vehicle, battery) in [("001", 55), ("002", 10), ("001", 54)] {
        let payload = format!(
            r#"{{"agv_id":"factory/agv/{vehicle}","battery":{battery},"status":"CHARGING"}}"#
        );
        pipeline
            .service
            .handle_message(&format!("factory/agv/{vehicle}"), payload.as_bytes())
            .await;
    }

    let batteries: Vec<i32> = pipeline.rows().iter().map(|row| row.battery).collect();
    assert_eq!(batteries, vec![55, 10, 54]);
    assert!(pipeline.published().is_empty());
}
