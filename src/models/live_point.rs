use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::trip::{Location, Trip, TripStatus};

/// Position received while the device had no active trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrphanPoint {
    pub id: Uuid,
    pub device_id: String,
    pub lat: f64,
    pub lng: f64,
    pub event_kind: String,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl OrphanPoint {
    pub fn new(device_id: &str, event_kind: &str, location: Location, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_id: device_id.to_string(),
            lat: location.lat,
            lng: location.lng,
            event_kind: event_kind.to_string(),
            timestamp: location.timestamp,
            created_at: now,
        }
    }
}

/// Where a device was last seen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum LivePoint {
    Trip {
        trip_id: Uuid,
        status: TripStatus,
        location: Location,
    },
    Orphan(OrphanPoint),
}

impl LivePoint {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LivePoint::Trip { location, .. } => location.timestamp,
            LivePoint::Orphan(point) => point.timestamp,
        }
    }
}

/// Latest trip of a device, without its path, for fleet overviews.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    pub device_id: String,
    pub trip_id: Uuid,
    pub status: TripStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_distance: f64,
    pub last_location: Option<Location>,
}

impl From<&Trip> for DeviceSnapshot {
    fn from(trip: &Trip) -> Self {
        Self {
            device_id: trip.device_id.clone(),
            trip_id: trip.id,
            status: trip.status,
            start_time: trip.start_time,
            end_time: trip.end_time,
            total_distance: trip.total_distance,
            last_location: trip.last_location().copied(),
        }
    }
}
