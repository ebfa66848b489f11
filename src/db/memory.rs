use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{StoreError, StoreResult, TripStore};
use crate::models::live_point::OrphanPoint;
use crate::models::trip::{Location, Trip};

#[derive(Default)]
struct Collections {
    trips: HashMap<Uuid, Trip>,
    live_points: Vec<OrphanPoint>,
}

/// Process-local store with the same conflict rules as the Postgres one.
#[derive(Default)]
pub struct MemoryTripStore {
    inner: RwLock<Collections>,
}

impl MemoryTripStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn trip_count(&self) -> usize {
        self.inner.read().await.trips.len()
    }

    pub async fn live_points(&self) -> Vec<OrphanPoint> {
        self.inner.read().await.live_points.clone()
    }
}

fn newest_start_first(trips: &mut [Trip]) {
    trips.sort_by(|a, b| b.start_time.cmp(&a.start_time));
}

#[async_trait]
impl TripStore for MemoryTripStore {
    async fn find_active_trip(&self, device_id: &str) -> StoreResult<Option<Trip>> {
        let inner = self.inner.read().await;
        Ok(inner
            .trips
            .values()
            .find(|t| t.device_id == device_id && t.is_active())
            .cloned())
    }

    async fn insert_trip(&self, trip: &Trip) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let duplicate_active = trip.is_active()
            && inner
                .trips
                .values()
                .any(|t| t.device_id == trip.device_id && t.is_active());
        if duplicate_active || inner.trips.contains_key(&trip.id) {
            return Err(StoreError::Conflict { id: trip.id });
        }
        inner.trips.insert(trip.id, trip.clone());
        Ok(())
    }

    async fn replace_trip(&self, id: Uuid, trip: &Trip, expected_version: i64) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let stored = inner.trips.get_mut(&id).ok_or(StoreError::Conflict { id })?;
        if stored.version != expected_version {
            return Err(StoreError::Conflict { id });
        }
        *stored = Trip {
            id,
            version: expected_version + 1,
            ..trip.clone()
        };
        Ok(())
    }

    async fn append_location(
        &self,
        id: Uuid,
        location: Location,
        total_distance: f64,
        expected_version: i64,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let stored = inner.trips.get_mut(&id).ok_or(StoreError::Conflict { id })?;
        if stored.version != expected_version {
            return Err(StoreError::Conflict { id });
        }
        stored.locations.push(location);
        stored.total_distance = total_distance;
        stored.version += 1;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn find_trips_by_device(&self, device_id: &str) -> StoreResult<Vec<Trip>> {
        let inner = self.inner.read().await;
        let mut trips: Vec<Trip> = inner
            .trips
            .values()
            .filter(|t| t.device_id == device_id)
            .cloned()
            .collect();
        newest_start_first(&mut trips);
        Ok(trips)
    }

    async fn find_trip(&self, id: Uuid) -> StoreResult<Option<Trip>> {
        Ok(self.inner.read().await.trips.get(&id).cloned())
    }

    async fn find_active_trips(&self) -> StoreResult<Vec<Trip>> {
        let inner = self.inner.read().await;
        let mut trips: Vec<Trip> = inner.trips.values().filter(|t| t.is_active()).cloned().collect();
        newest_start_first(&mut trips);
        Ok(trips)
    }

    async fn insert_orphan_point(&self, point: &OrphanPoint) -> StoreResult<()> {
        self.inner.write().await.live_points.push(point.clone());
        Ok(())
    }

    async fn find_latest_live_point(&self, device_id: &str) -> StoreResult<Option<OrphanPoint>> {
        let inner = self.inner.read().await;
        Ok(inner
            .live_points
            .iter()
            .filter(|p| p.device_id == device_id)
            .max_by_key(|p| (p.timestamp, p.created_at))
            .cloned())
    }

    async fn find_latest_trips_per_device(&self) -> StoreResult<Vec<Trip>> {
        let inner = self.inner.read().await;
        let mut latest: HashMap<&str, &Trip> = HashMap::new();
        for trip in inner.trips.values() {
            latest
                .entry(trip.device_id.as_str())
                .and_modify(|current| {
                    if (trip.created_at, trip.start_time) > (current.created_at, current.start_time) {
                        *current = trip;
                    }
                })
                .or_insert(trip);
        }
        let mut trips: Vec<Trip> = latest.into_values().cloned().collect();
        trips.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        Ok(trips)
    }
}
