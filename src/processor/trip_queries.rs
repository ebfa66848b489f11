use std::sync::Arc;
use uuid::Uuid;

use crate::db::{StoreResult, TripStore};
use crate::models::live_point::{DeviceSnapshot, LivePoint};
use crate::models::trip::Trip;

/// Read side used by dashboards.
#[derive(Clone)]
pub struct TripQueries {
    store: Arc<dyn TripStore>,
}

impl TripQueries {
    pub fn new(store: Arc<dyn TripStore>) -> Self {
        Self { store }
    }

    pub async fn active_trips_for_all(&self) -> StoreResult<Vec<Trip>> {
        self.store.find_active_trips().await
    }

    /// Unknown and malformed ids both yield `None`.
    pub async fn trip_by_id(&self, id: &str) -> StoreResult<Option<Trip>> {
        match Uuid::parse_str(id.trim()) {
            Ok(id) => self.store.find_trip(id).await,
            Err(_) => Ok(None),
        }
    }

    /// Most recent start first.
    pub async fn trips_for_device(&self, device_id: &str) -> StoreResult<Vec<Trip>> {
        self.store.find_trips_by_device(device_id).await
    }

    /// Newest known position of a device, from either its latest trip or the
    /// points it reported outside a trip.
    pub async fn live_track(&self, device_id: &str) -> StoreResult<Option<LivePoint>> {
        let trips = self.store.find_trips_by_device(device_id).await?;
        let from_trip = trips.first().and_then(|trip| {
            trip.last_location().map(|location| LivePoint::Trip {
                trip_id: trip.id,
                status: trip.status,
                location: *location,
            })
        });
        let orphan = self
            .store
            .find_latest_live_point(device_id)
            .await?
            .map(LivePoint::Orphan);

        Ok(match (from_trip, orphan) {
            (Some(a), Some(b)) => Some(if b.timestamp() > a.timestamp() { b } else { a }),
            (a, b) => a.or(b),
        })
    }

    pub async fn device_snapshots(&self) -> StoreResult<Vec<DeviceSnapshot>> {
        let trips = self.store.find_latest_trips_per_device().await?;
        Ok(trips.iter().map(DeviceSnapshot::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryTripStore;
    use crate::models::event::{Event, Position, Telemetry};
    use crate::models::trip::TripStatus;
    use crate::processor::trip_engine::TripEngine;
    use chrono::{TimeZone, Utc};

    fn event(device: &str, kind: &str, lat: f64, secs: i64) -> Event {
        let telemetry = Telemetry {
            device_id: device.to_string(),
            position: Some(Position { lat, lng: -99.0 }),
            timestamp: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        };
        match kind {
            "on" => Event::IgnitionOn(telemetry),
            "off" => Event::IgnitionOff(telemetry),
            _ => Event::PositionUpdate(telemetry),
        }
    }

    async fn seeded() -> (TripEngine, TripQueries) {
        let store: Arc<dyn TripStore> = Arc::new(MemoryTripStore::new());
        let engine = TripEngine::new(store.clone());
        let events = [
            event("A", "on", 19.0, 0),
            event("A", "pos", 19.01, 10),
            event("A", "off", 19.02, 20),
            event("A", "on", 19.02, 30),
            event("B", "on", 20.0, 5),
            event("C", "pos", 21.0, 7),
        ];
        for e in &events {
            engine.handle(e).await.unwrap();
        }
        (engine, TripQueries::new(store))
    }

    #[tokio::test]
    async fn test_active_trips_and_device_history() {
        let (_engine, queries) = seeded().await;

        let active = queries.active_trips_for_all().await.unwrap();
        let mut devices: Vec<_> = active.iter().map(|t| t.device_id.as_str()).collect();
        devices.sort();
        assert_eq!(devices, vec!["A", "B"]);

        let history = queries.trips_for_device("A").await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].start_time > history[1].start_time);
        assert_eq!(history[1].status, TripStatus::Completed);

        assert!(queries.trips_for_device("C").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_trip_by_id() {
        let (_engine, queries) = seeded().await;
        let trip = queries.trips_for_device("B").await.unwrap().remove(0);

        let found = queries.trip_by_id(&trip.id.to_string()).await.unwrap();
        assert_eq!(found, Some(trip));

        assert_eq!(queries.trip_by_id(&Uuid::new_v4().to_string()).await.unwrap(), None);
        assert_eq!(queries.trip_by_id("not-a-trip-id").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_live_track_prefers_newest_point() {
        let (engine, queries) = seeded().await;

        let Some(LivePoint::Orphan(point)) = queries.live_track("C").await.unwrap() else {
            panic!("expected orphan point for C");
        };
        assert_eq!(point.lat, 21.0);

        let Some(LivePoint::Trip { status, location, .. }) = queries.live_track("A").await.unwrap() else {
            panic!("expected trip point for A");
        };
        assert_eq!(status, TripStatus::Active);
        assert_eq!(location.lat, 19.02);

        // A newer point outside any trip wins once B's trip has ended.
        engine.handle(&event("B", "off", 20.01, 50)).await.unwrap();
        engine.handle(&event("B", "pos", 20.5, 60)).await.unwrap();
        let live = queries.live_track("B").await.unwrap().unwrap();
        assert!(matches!(live, LivePoint::Orphan(ref p) if p.lat == 20.5));

        assert!(queries.live_track("Z").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_device_snapshots() {
        let (_engine, queries) = seeded().await;

        let snapshots = queries.device_snapshots().await.unwrap();
        assert_eq!(snapshots.len(), 2);

        let a = snapshots.iter().find(|s| s.device_id == "A").unwrap();
        assert_eq!(a.status, TripStatus::Active);
        assert_eq!(a.total_distance, 0.0);
        assert_eq!(a.last_location.map(|l| l.lat), Some(19.02));
    }
}
