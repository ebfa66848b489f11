use chrono::Utc;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{StoreError, TripStore};
use crate::error::{EngineError, ValidationError};
use crate::models::event::{Event, Telemetry};
use crate::models::live_point::OrphanPoint;
use crate::models::trip::{Location, Trip};

/// Why an event left the device state untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Ignition on while a trip is already running.
    TripAlreadyActive,
    /// Ignition off with nothing to finalize.
    NoActiveTrip,
    /// Event carried no usable position.
    MissingPosition,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IgnoreReason::TripAlreadyActive => "trip already active",
            IgnoreReason::NoActiveTrip => "no active trip",
            IgnoreReason::MissingPosition => "missing position",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    TripStarted { trip_id: Uuid },
    TripExtended { trip_id: Uuid, total_distance: f64 },
    TripCompleted { trip_id: Uuid, total_distance: f64, duration: i64 },
    OrphanRecorded { point_id: Uuid },
    Ignored(IgnoreReason),
}

type DeviceLocksMap = DashMap<String, Arc<Mutex<()>>>;

/// Applies telemetry events to the per-device trip state held in a [`TripStore`].
///
/// Read-decide-write for one device runs under that device's lock, and every
/// write against an existing trip is conditional on the version that was
/// read, so a writer outside this process cannot cause a lost update either.
pub struct TripEngine {
    store: Arc<dyn TripStore>,
    device_locks: DeviceLocksMap,
}

impl TripEngine {
    pub fn new(store: Arc<dyn TripStore>) -> Self {
        Self {
            store,
            device_locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn TripStore> {
        &self.store
    }

    fn device_lock(&self, device_id: &str) -> Arc<Mutex<()>> {
        self.device_locks
            .entry(device_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Applies one event. On a version conflict the state is re-read and the
    /// transition applied once more before the conflict is surfaced.
    pub async fn handle(&self, event: &Event) -> Result<Outcome, EngineError> {
        if event.device_id().trim().is_empty() {
            return Err(ValidationError::MissingDeviceId.into());
        }

        let outcome = {
            let lock = self.device_lock(event.device_id());
            let _guard = lock.lock().await;
            self.apply_with_retry(event).await
        };
        self.release_device_lock(event.device_id());
        outcome
    }

    async fn apply_with_retry(&self, event: &Event) -> Result<Outcome, EngineError> {
        match self.apply(event).await {
            Err(EngineError::Store(StoreError::Conflict { id })) => {
                warn!(
                    "Write conflict on trip {} for device {}, re-reading state",
                    id,
                    event.device_id()
                );
                self.apply(event).await
            }
            other => other,
        }
    }

    /// Drops the device's lock entry once no caller holds or waits on it.
    /// The count is checked under the map's shard lock, so a concurrent
    /// `device_lock` either sees the entry or creates a fresh one.
    fn release_device_lock(&self, device_id: &str) {
        self.device_locks.remove_if(device_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn apply(&self, event: &Event) -> Result<Outcome, EngineError> {
        let telemetry = event.telemetry();
        let device_id = telemetry.device_id.as_str();

        // Only ignition off can act without a position.
        let location = match (event, telemetry.location()) {
            (Event::IgnitionOff(_), location) => location,
            (_, Some(location)) => Some(location),
            (_, None) => {
                debug!("Ignored {}: {}", event, IgnoreReason::MissingPosition);
                return Ok(Outcome::Ignored(IgnoreReason::MissingPosition));
            }
        };

        let active = self.store.find_active_trip(device_id).await?;

        let outcome = match (event, active, location) {
            (Event::IgnitionOn(_), None, Some(start)) => self.start_trip(device_id, start).await?,
            (Event::IgnitionOn(_), Some(trip), _) => {
                info!("Ignored ignition on for device {}: trip {} already active", device_id, trip.id);
                Outcome::Ignored(IgnoreReason::TripAlreadyActive)
            }
            (Event::IgnitionOff(_), Some(trip), end) => self.complete_trip(&trip, telemetry, end).await?,
            (Event::IgnitionOff(_), None, _) => {
                info!("Ignored ignition off for device {}: no active trip", device_id);
                Outcome::Ignored(IgnoreReason::NoActiveTrip)
            }
            (_, Some(trip), Some(next)) => self.extend_trip(&trip, next).await?,
            (_, None, Some(point)) => self.record_orphan(device_id, event.kind(), point).await?,
            (_, _, None) => Outcome::Ignored(IgnoreReason::MissingPosition),
        };

        Ok(outcome)
    }

    async fn start_trip(&self, device_id: &str, start: Location) -> Result<Outcome, EngineError> {
        let trip = Trip::start(device_id, start, Utc::now());
        self.store.insert_trip(&trip).await?;

        info!("Started new trip {} for device {}", trip.id, device_id);
        Ok(Outcome::TripStarted { trip_id: trip.id })
    }

    async fn extend_trip(&self, trip: &Trip, next: Location) -> Result<Outcome, EngineError> {
        let total_distance = trip.distance_with(&next);
        self.store
            .append_location(trip.id, next, total_distance, trip.version)
            .await?;

        debug!(
            "Trip {} for device {} extended to {} km",
            trip.id, trip.device_id, total_distance
        );
        Ok(Outcome::TripExtended {
            trip_id: trip.id,
            total_distance,
        })
    }

    async fn complete_trip(
        &self,
        trip: &Trip,
        telemetry: &Telemetry,
        end: Option<Location>,
    ) -> Result<Outcome, EngineError> {
        if end.is_none() {
            warn!(
                "Ignition off for device {} carried no position, final leg of trip {} omitted",
                trip.device_id, trip.id
            );
        }

        let completed = trip.completed(end, telemetry.timestamp, Utc::now());
        self.store.replace_trip(trip.id, &completed, trip.version).await?;

        let duration = completed.duration.unwrap_or_default();
        info!(
            "Trip {} completed for device {}, distance: {}km, duration: {}ms",
            trip.id, trip.device_id, completed.total_distance, duration
        );
        Ok(Outcome::TripCompleted {
            trip_id: trip.id,
            total_distance: completed.total_distance,
            duration,
        })
    }

    async fn record_orphan(
        &self,
        device_id: &str,
        kind: &str,
        location: Location,
    ) -> Result<Outcome, EngineError> {
        let point = OrphanPoint::new(device_id, kind, location, Utc::now());
        self.store.insert_orphan_point(&point).await?;

        debug!("Recorded live point {} for device {} outside any trip", point.id, device_id);
        Ok(Outcome::OrphanRecorded { point_id: point.id })
    }
}
