use chrono::{DateTime, Utc};
use std::fmt;
use tracing::warn;

use crate::error::ValidationError;
use crate::models::trip::Location;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
}

impl Position {
    pub fn new(lat: f64, lng: f64) -> Result<Self, ValidationError> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        if !valid {
            return Err(ValidationError::InvalidCoordinates { lat, lng });
        }
        Ok(Self { lat, lng })
    }

    /// Both coordinates must be present for a position to exist.
    pub fn from_parts(lat: Option<f64>, lng: Option<f64>) -> Result<Option<Self>, ValidationError> {
        match (lat, lng) {
            (Some(lat), Some(lng)) => Self::new(lat, lng).map(Some),
            _ => Ok(None),
        }
    }

    pub fn at(&self, timestamp: DateTime<Utc>) -> Location {
        Location {
            lat: self.lat,
            lng: self.lng,
            timestamp,
        }
    }
}

/// Fields shared by every event kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetry {
    pub device_id: String,
    pub position: Option<Position>,
    pub timestamp: DateTime<Utc>,
}

impl Telemetry {
    pub fn location(&self) -> Option<Location> {
        self.position.map(|p| p.at(self.timestamp))
    }
}

/// A validated telemetry event. Everything the trip engine consumes goes
/// through [`Event::new`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    IgnitionOn(Telemetry),
    IgnitionOff(Telemetry),
    PositionUpdate(Telemetry),
    Other { kind: String, telemetry: Telemetry },
}

impl Event {
    /// Validates raw event fields. `timestamp` falls back to `received_at`.
    ///
    /// Only a missing device id rejects the event. Unusable coordinates are
    /// dropped so the event still drives the state machine without a position.
    pub fn new(
        kind: Option<&str>,
        device_id: Option<&str>,
        lat: Option<f64>,
        lng: Option<f64>,
        timestamp: Option<DateTime<Utc>>,
        received_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let device_id = device_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(ValidationError::MissingDeviceId)?;

        let position = Position::from_parts(lat, lng).unwrap_or_else(|e| {
            warn!("Dropping position of event from {}: {}", device_id, e);
            None
        });

        let telemetry = Telemetry {
            device_id: device_id.to_string(),
            position,
            timestamp: timestamp.unwrap_or(received_at),
        };

        let normalized: String = kind
            .unwrap_or_default()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_uppercase();

        Ok(match normalized.as_str() {
            "IGNITIONON" | "ENGINEON" => Event::IgnitionOn(telemetry),
            "IGNITIONOFF" | "ENGINEOFF" => Event::IgnitionOff(telemetry),
            "" | "POSITIONUPDATE" | "POSITION" | "LOCATION" | "STATUS" => {
                Event::PositionUpdate(telemetry)
            }
            _ => Event::Other {
                kind: kind.unwrap_or_default().trim().to_string(),
                telemetry,
            },
        })
    }

    pub fn telemetry(&self) -> &Telemetry {
        match self {
            Event::IgnitionOn(t) | Event::IgnitionOff(t) | Event::PositionUpdate(t) => t,
            Event::Other { telemetry, .. } => telemetry,
        }
    }

    pub fn device_id(&self) -> &str {
        &self.telemetry().device_id
    }

    pub fn kind(&self) -> &str {
        match self {
            Event::IgnitionOn(_) => "IgnitionOn",
            Event::IgnitionOff(_) => "IgnitionOff",
            Event::PositionUpdate(_) => "PositionUpdate",
            Event::Other { kind, .. } => kind,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {}", self.kind(), self.device_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 29, 6, 15, 15).unwrap()
    }

    #[test]
    fn test_kind_aliases() {
        let cases = [
            ("IgnitionOn", "IgnitionOn"),
            ("Engine On", "IgnitionOn"),
            ("ENGINE OFF", "IgnitionOff"),
            ("ignition_off", "IgnitionOff"),
            ("PositionUpdate", "PositionUpdate"),
            ("STATUS", "PositionUpdate"),
            ("Power Cut", "Power Cut"),
        ];

        for (raw, expected) in cases {
            let event = Event::new(Some(raw), Some("D1"), None, None, None, now()).unwrap();
            assert_eq!(event.kind(), expected, "raw kind {}", raw);
        }
    }

    #[test]
    fn test_missing_device_id_is_rejected() {
        let err = Event::new(Some("IgnitionOn"), None, Some(1.0), Some(1.0), None, now());
        assert_eq!(err, Err(ValidationError::MissingDeviceId));

        let err = Event::new(Some("IgnitionOn"), Some("   "), None, None, None, now());
        assert_eq!(err, Err(ValidationError::MissingDeviceId));
    }

    #[test]
    fn test_position_needs_both_coordinates() {
        let event = Event::new(None, Some("D1"), Some(37.0), None, None, now()).unwrap();
        assert!(event.telemetry().position.is_none());

        let event = Event::new(None, Some("D1"), Some(37.0), Some(-122.0), None, now()).unwrap();
        assert_eq!(event.telemetry().position, Some(Position { lat: 37.0, lng: -122.0 }));
    }

    #[test]
    fn test_out_of_range_coordinates_drop_only_the_position() {
        let event = Event::new(Some("IgnitionOff"), Some("D1"), Some(91.0), Some(0.0), None, now()).unwrap();
        assert!(matches!(event, Event::IgnitionOff(_)));
        assert!(event.telemetry().position.is_none());

        let event = Event::new(None, Some("D1"), Some(0.0), Some(f64::NAN), None, now()).unwrap();
        assert!(matches!(event, Event::PositionUpdate(_)));
        assert!(event.telemetry().position.is_none());

        assert!(matches!(
            Position::new(0.0, 181.0),
            Err(ValidationError::InvalidCoordinates { .. })
        ));
    }

    #[test]
    fn test_timestamp_defaults_to_arrival() {
        let event = Event::new(None, Some(" D1 "), None, None, None, now()).unwrap();
        assert_eq!(event.telemetry().timestamp, now());
        assert_eq!(event.device_id(), "D1");
    }
}
