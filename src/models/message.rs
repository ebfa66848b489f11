use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use crate::error::ValidationError;
use crate::models::event::Event;

/// Telemetry payload as published on the ingestion topic. Gateways emit
/// either the decoded envelope or a flat event object. Any object with a
/// `data` member is an envelope.
#[derive(Debug)]
pub enum DeviceMessage {
    Envelope(EnvelopeMessage),
    Flat(FlatMessage),
}

#[derive(Debug, Deserialize)]
pub struct EnvelopeMessage {
    pub data: Data,
    #[serde(default)]
    pub metadata: Metadata,
    pub uuid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Data {
    #[serde(rename = "ALERT")]
    pub alert: Option<String>,
    #[serde(rename = "MSG_CLASS")]
    pub msg_class: Option<String>,
    #[serde(rename = "GPS_DATETIME")]
    pub gps_datetime: Option<String>,
    #[serde(rename = "LATITUD", default, deserialize_with = "parse_f64_option")]
    pub latitude: Option<f64>,
    #[serde(rename = "LONGITUD", default, deserialize_with = "parse_f64_option")]
    pub longitude: Option<f64>,
    #[serde(rename = "DEVICE_ID")]
    pub device_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Metadata {
    #[serde(rename = "DEVICE_ID")]
    pub device_id: Option<String>,
    #[serde(flatten)]
    pub other: HashMap<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatMessage {
    #[serde(alias = "deviceId")]
    pub imei: Option<String>,
    #[serde(alias = "eventKind")]
    pub event_type: Option<String>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub longitude: Option<f64>,
    pub timestamp: Option<String>,
}

impl DeviceMessage {
    pub fn parse(payload: &[u8]) -> Result<Self, ValidationError> {
        let malformed = |e: serde_json::Error| ValidationError::MalformedPayload(e.to_string());
        let value: Value = serde_json::from_slice(payload).map_err(malformed)?;
        if value.get("data").is_some() {
            serde_json::from_value(value)
                .map(DeviceMessage::Envelope)
                .map_err(malformed)
        } else {
            serde_json::from_value(value)
                .map(DeviceMessage::Flat)
                .map_err(malformed)
        }
    }

    pub fn get_device_id(&self) -> Option<&str> {
        match self {
            DeviceMessage::Envelope(m) => m
                .data
                .device_id
                .as_deref()
                .or(m.metadata.device_id.as_deref()),
            DeviceMessage::Flat(m) => m.imei.as_deref(),
        }
    }

    /// Validates the payload into an [`Event`]. `received_at` stands in for a
    /// missing or unreadable device timestamp.
    pub fn into_event(self, received_at: DateTime<Utc>) -> Result<Event, ValidationError> {
        let device_id = self.get_device_id().map(str::to_string);
        match self {
            DeviceMessage::Envelope(m) => {
                let timestamp = m
                    .data
                    .gps_datetime
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .and_then(|s| usable_timestamp(parse_gps_datetime(s)));
                let kind = m.data.alert.as_deref().or(m.data.msg_class.as_deref());
                Event::new(
                    kind,
                    device_id.as_deref(),
                    m.data.latitude,
                    m.data.longitude,
                    timestamp,
                    received_at,
                )
            }
            DeviceMessage::Flat(m) => {
                let timestamp = m
                    .timestamp
                    .as_deref()
                    .and_then(|s| usable_timestamp(parse_rfc3339(s)));
                Event::new(
                    m.event_type.as_deref(),
                    device_id.as_deref(),
                    m.latitude,
                    m.longitude,
                    timestamp,
                    received_at,
                )
            }
        }
    }
}

fn usable_timestamp(parsed: Result<DateTime<Utc>, ValidationError>) -> Option<DateTime<Utc>> {
    parsed.map_err(|e| warn!("Using arrival time: {}", e)).ok()
}

/// Gateway timestamps are UTC without an offset.
fn parse_gps_datetime(s: &str) -> Result<DateTime<Utc>, ValidationError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .map(|t| t.and_utc())
        .map_err(|_| ValidationError::InvalidTimestamp(s.to_string()))
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| ValidationError::InvalidTimestamp(s.to_string()))
}

fn parse_f64_option<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrFloat {
        String(String),
        Float(f64),
    }

    let v: Option<StringOrFloat> = Option::deserialize(deserializer)?;
    match v {
        Some(StringOrFloat::Float(f)) => Ok(Some(f)),
        Some(StringOrFloat::String(s)) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                s.trim().parse::<f64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
        None => Ok(None),
    }
}
