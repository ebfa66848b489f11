use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::geo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Active,
    Completed,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Active => "active",
            TripStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TripStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(TripStatus::Active),
            "completed" => Ok(TripStatus::Completed),
            other => Err(format!("unknown trip status '{}'", other)),
        }
    }
}

/// A recorded sample on a trip's path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    pub timestamp: DateTime<Utc>,
}

impl Location {
    pub fn distance_km_to(&self, other: &Location) -> f64 {
        geo::distance_km(self.lat, self.lng, other.lat, other.lng)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub device_id: String,
    pub status: TripStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub start_lat: Option<f64>,
    pub start_lng: Option<f64>,
    pub end_lat: Option<f64>,
    pub end_lng: Option<f64>,
    /// Chronological and never empty.
    pub locations: Vec<Location>,
    /// Kilometers, rounded to 3 decimals after every accumulation step.
    pub total_distance: f64,
    /// Milliseconds, set on completion.
    pub duration: Option<i64>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    /// Opens a new active trip at `start`.
    pub fn start(device_id: &str, start: Location, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id: device_id.to_string(),
            status: TripStatus::Active,
            start_time: start.timestamp,
            end_time: None,
            start_lat: Some(start.lat),
            start_lng: Some(start.lng),
            end_lat: None,
            end_lng: None,
            locations: vec![start],
            total_distance: 0.0,
            duration: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TripStatus::Active
    }

    pub fn last_location(&self) -> Option<&Location> {
        self.locations.last()
    }

    /// Total distance after travelling from the last recorded point to `next`.
    pub fn distance_with(&self, next: &Location) -> f64 {
        let leg = self
            .last_location()
            .map(|last| last.distance_km_to(next))
            .unwrap_or(0.0);
        geo::round_km(self.total_distance + leg)
    }

    /// Returns the trip extended by `next`. The stored version is left alone;
    /// the store bumps it on write.
    pub fn extended(&self, next: Location, now: DateTime<Utc>) -> Self {
        let total_distance = self.distance_with(&next);
        let mut locations = self.locations.clone();
        locations.push(next);

        Self {
            locations,
            total_distance,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Returns the completed form of this trip. The final leg is only added
    /// when the ignition-off event carried a position.
    pub fn completed(
        &self,
        end: Option<Location>,
        end_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        let base = match end {
            Some(point) => self.extended(point, now),
            None => self.clone(),
        };
        let duration = (end_time - self.start_time).num_milliseconds();

        Self {
            status: TripStatus::Completed,
            end_time: Some(end_time),
            end_lat: end.map(|p| p.lat),
            end_lng: end.map(|p| p.lng),
            duration: Some(duration),
            updated_at: now,
            ..base
        }
    }
}
