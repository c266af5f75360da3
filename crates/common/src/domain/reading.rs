use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Placeholder recorded when a payload omits the vehicle id or status
pub const UNKNOWN: &str = "Unknown";

/// Reported operating state of a vehicle
///
/// Values outside the known set are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VehicleStatus {
    Moving,
    Charging,
    Returning,
    Idle,
    Other(String),
}

impl VehicleStatus {
    pub fn as_str(&self) -> &str {
        match self {
            VehicleStatus::Moving => "MOVING",
            VehicleStatus::Charging => "CHARGING",
            VehicleStatus::Returning => "RETURNING",
            VehicleStatus::Idle => "IDLE",
            VehicleStatus::Other(raw) => raw,
        }
    }

    /// Map an `Other` carrying a known status back onto its variant
    pub fn normalized(self) -> Self {
        match self {
            VehicleStatus::Other(raw) => VehicleStatus::from(raw.as_str()),
            known => known,
        }
    }
}

impl From<&str> for VehicleStatus {
    fn from(raw: &str) -> Self {
        match raw {
            "MOVING" => VehicleStatus::Moving,
            "CHARGING" => VehicleStatus::Charging,
            "RETURNING" => VehicleStatus::Returning,
            "IDLE" => VehicleStatus::Idle,
            other => VehicleStatus::Other(other.to_string()),
        }
    }
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an inbound payload could not be turned into a [`Reading`]
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("payload is a JSON {0}, expected an object")]
    NotAnObject(&'static str),
}

/// One telemetry event reported by a vehicle
///
/// Built once per inbound message and never modified afterwards; the
/// accessors are the only way to read it back.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    vehicle_id: String,
    battery: i32,
    status: VehicleStatus,
    received_at: DateTime<Utc>,
}

impl Reading {
    pub fn new(
        vehicle_id: impl Into<String>,
        battery: i32,
        status: VehicleStatus,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            battery,
            status: status.normalized(),
            received_at,
        }
    }

    /// Decode a raw bus payload of the form
    /// `{"agv_id": string, "battery": integer, "status": string}`
    ///
    /// Every field is optional. A missing or mistyped `agv_id` or `status`
    /// becomes `"Unknown"`. `battery` accepts any whole number that fits an
    /// `i32`, including `80.0`; anything else becomes `0`.
    pub fn decode(payload: &[u8], received_at: DateTime<Utc>) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(payload)?;

        match serde_json::from_str::<Value>(text)? {
            Value::Object(fields) => Ok(Self::from_fields(&fields, received_at)),
            other => Err(DecodeError::NotAnObject(json_kind(&other))),
        }
    }

    fn from_fields(fields: &Map<String, Value>, received_at: DateTime<Utc>) -> Self {
        let vehicle_id = fields
            .get("agv_id")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN);

        let battery = fields.get("battery").and_then(whole_i32).unwrap_or(0);

        let status = fields
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN);

        Self::new(vehicle_id, battery, VehicleStatus::from(status), received_at)
    }

    pub fn vehicle_id(&self) -> &str {
        &self.vehicle_id
    }

    pub fn battery(&self) -> i32 {
        self.battery
    }

    pub fn status(&self) -> &VehicleStatus {
        &self.status
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Trailing path segment of the vehicle id, used to address its control topic
    pub fn short_vehicle_id(&self) -> &str {
        short_vehicle_id(&self.vehicle_id)
    }
}

/// Return the segment after the last `/`, or the whole id when it has none
///
/// # Examples
/// ```
/// use common::domain::short_vehicle_id;
///
/// assert_eq!(short_vehicle_id("factory/agv/001"), "001");
/// assert_eq!(short_vehicle_id("agv-7"), "agv-7");
/// ```
pub fn short_vehicle_id(vehicle_id: &str) -> &str {
    vehicle_id.rsplit('/').next().unwrap_or(vehicle_id)
}

fn whole_i32(value: &Value) -> Option<i32> {
    if let Some(integer) = value.as_i64() {
        return i32::try_from(integer).ok();
    }

    let float = value.as_f64()?;
    let in_range = (i32::MIN as f64..=i32::MAX as f64).contains(&float);
    (float.fract() == 0.0 && in_range).then_some(float as i32)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
