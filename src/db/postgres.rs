use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::{queries, DbPool, StoreError, StoreResult, TripStore};
use crate::models::live_point::OrphanPoint;
use crate::models::trip::{Location, Trip};

#[derive(Debug, FromRow)]
struct TripRow {
    trip_id: Uuid,
    device_id: String,
    status: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    start_lat: Option<f64>,
    start_lng: Option<f64>,
    end_lat: Option<f64>,
    end_lng: Option<f64>,
    locations: Json<Vec<Location>>,
    total_distance: f64,
    duration_ms: Option<i64>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TripRow> for Trip {
    type Error = StoreError;

    fn try_from(row: TripRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(StoreError::Corrupt)?;
        if row.locations.0.is_empty() {
            return Err(StoreError::Corrupt(format!("trip {} has no locations", row.trip_id)));
        }
        Ok(Trip {
            id: row.trip_id,
            device_id: row.device_id,
            status,
            start_time: row.start_time,
            end_time: row.end_time,
            start_lat: row.start_lat,
            start_lng: row.start_lng,
            end_lat: row.end_lat,
            end_lng: row.end_lng,
            locations: row.locations.0,
            total_distance: row.total_distance,
            duration: row.duration_ms,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct LivePointRow {
    point_id: Uuid,
    device_id: String,
    lat: f64,
    lng: f64,
    event_kind: String,
    timestamp: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<LivePointRow> for OrphanPoint {
    fn from(row: LivePointRow) -> Self {
        OrphanPoint {
            id: row.point_id,
            device_id: row.device_id,
            lat: row.lat,
            lng: row.lng,
            event_kind: row.event_kind,
            timestamp: row.timestamp,
            created_at: row.created_at,
        }
    }
}

fn into_trips(rows: Vec<TripRow>) -> StoreResult<Vec<Trip>> {
    rows.into_iter().map(Trip::try_from).collect()
}

/// Maps a unique-index violation (second active trip) to a conflict.
fn conflict_or(id: Uuid, e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict { id },
        _ => StoreError::Database(e),
    }
}

#[derive(Clone)]
pub struct PgTripStore {
    pool: DbPool,
}

impl PgTripStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TripStore for PgTripStore {
    async fn find_active_trip(&self, device_id: &str) -> StoreResult<Option<Trip>> {
        let row = sqlx::query_as::<_, TripRow>(queries::SELECT_ACTIVE_TRIP)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Trip::try_from).transpose()
    }

    async fn insert_trip(&self, trip: &Trip) -> StoreResult<()> {
        sqlx::query(queries::INSERT_TRIP)
            .bind(trip.id)
            .bind(&trip.device_id)
            .bind(trip.status.as_str())
            .bind(trip.start_time)
            .bind(trip.end_time)
            .bind(trip.start_lat)
            .bind(trip.start_lng)
            .bind(trip.end_lat)
            .bind(trip.end_lng)
            .bind(Json(&trip.locations))
            .bind(trip.total_distance)
            .bind(trip.duration)
            .bind(trip.version)
            .bind(trip.created_at)
            .bind(trip.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_or(trip.id, e))?;
        Ok(())
    }

    async fn replace_trip(&self, id: Uuid, trip: &Trip, expected_version: i64) -> StoreResult<()> {
        let result = sqlx::query(queries::REPLACE_TRIP)
            .bind(id)
            .bind(trip.status.as_str())
            .bind(trip.start_time)
            .bind(trip.end_time)
            .bind(trip.start_lat)
            .bind(trip.start_lng)
            .bind(trip.end_lat)
            .bind(trip.end_lng)
            .bind(Json(&trip.locations))
            .bind(trip.total_distance)
            .bind(trip.duration)
            .bind(expected_version)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_or(id, e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict { id });
        }
        Ok(())
    }

    async fn append_location(
        &self,
        id: Uuid,
        location: Location,
        total_distance: f64,
        expected_version: i64,
    ) -> StoreResult<()> {
        let result = sqlx::query(queries::APPEND_LOCATION)
            .bind(id)
            .bind(Json([location]))
            .bind(total_distance)
            .bind(expected_version)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict { id });
        }
        Ok(())
    }

    async fn find_trips_by_device(&self, device_id: &str) -> StoreResult<Vec<Trip>> {
        let rows = sqlx::query_as::<_, TripRow>(queries::SELECT_TRIPS_BY_DEVICE)
            .bind(device_id)
            .fetch_all(&self.pool)
            .await?;
        into_trips(rows)
    }

    async fn find_trip(&self, id: Uuid) -> StoreResult<Option<Trip>> {
        let row = sqlx::query_as::<_, TripRow>(queries::SELECT_TRIP_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Trip::try_from).transpose()
    }

    async fn find_active_trips(&self) -> StoreResult<Vec<Trip>> {
        let rows = sqlx::query_as::<_, TripRow>(queries::SELECT_ACTIVE_TRIPS)
            .fetch_all(&self.pool)
            .await?;
        into_trips(rows)
    }

    async fn insert_orphan_point(&self, point: &OrphanPoint) -> StoreResult<()> {
        sqlx::query(queries::INSERT_LIVE_POINT)
            .bind(point.id)
            .bind(&point.device_id)
            .bind(point.lat)
            .bind(point.lng)
            .bind(&point.event_kind)
            .bind(point.timestamp)
            .bind(point.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_latest_live_point(&self, device_id: &str) -> StoreResult<Option<OrphanPoint>> {
        let row = sqlx::query_as::<_, LivePointRow>(queries::SELECT_LATEST_LIVE_POINT)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(OrphanPoint::from))
    }

    async fn find_latest_trips_per_device(&self) -> StoreResult<Vec<Trip>> {
        let rows = sqlx::query_as::<_, TripRow>(queries::SELECT_LATEST_TRIP_PER_DEVICE)
            .fetch_all(&self.pool)
            .await?;
        into_trips(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(status: &str, locations: Vec<Location>) -> TripRow {
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap();
        TripRow {
            trip_id: Uuid::new_v4(),
            device_id: "356938035643809".to_string(),
            status: status.to_string(),
            start_time: t,
            end_time: None,
            start_lat: Some(20.65),
            start_lng: Some(-100.39),
            end_lat: None,
            end_lng: None,
            locations: Json(locations),
            total_distance: 0.0,
            duration_ms: None,
            version: 3,
            created_at: t,
            updated_at: t,
        }
    }

    #[test]
    fn test_row_maps_to_trip() {
        let start = Location {
            lat: 20.65,
            lng: -100.39,
            timestamp: Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap(),
        };
        let trip = Trip::try_from(row("active", vec![start])).unwrap();
        assert!(trip.is_active());
        assert_eq!(trip.version, 3);
        assert_eq!(trip.locations, vec![start]);
    }

    #[test]
    fn test_corrupt_rows_are_rejected() {
        let start = Location {
            lat: 0.0,
            lng: 0.0,
            timestamp: Utc::now(),
        };
        assert!(matches!(
            Trip::try_from(row("paused", vec![start])),
            Err(StoreError::Corrupt(_))
        ));
        assert!(matches!(
            Trip::try_from(row("completed", vec![])),
            Err(StoreError::Corrupt(_))
        ));
    }
}
