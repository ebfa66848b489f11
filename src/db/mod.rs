use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use thiserror::Error;
use uuid::Uuid;

use crate::models::live_point::OrphanPoint;
use crate::models::trip::{Location, Trip};

mod memory;
mod postgres;
pub mod queries;

pub use memory::MemoryTripStore;
pub use postgres::PgTripStore;

pub type DbPool = Pool<Postgres>;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    MIGRATOR.run(&pool).await?;
    Ok(pool)
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// The trip changed since it was read, or the write would open a second
    /// active trip for the device.
    #[error("write conflict on trip {id}")]
    Conflict { id: Uuid },
    #[error("corrupt trip record: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence used by the trip engine and the read-side queries.
///
/// Writes against an existing trip carry the `version` the caller read and
/// fail with [`StoreError::Conflict`] when the stored version differs. A
/// successful write bumps the stored version by one.
#[async_trait]
pub trait TripStore: Send + Sync {
    async fn find_active_trip(&self, device_id: &str) -> StoreResult<Option<Trip>>;

    async fn insert_trip(&self, trip: &Trip) -> StoreResult<()>;

    async fn replace_trip(&self, id: Uuid, trip: &Trip, expected_version: i64) -> StoreResult<()>;

    async fn append_location(
        &self,
        id: Uuid,
        location: Location,
        total_distance: f64,
        expected_version: i64,
    ) -> StoreResult<()>;

    /// Newest start first.
    async fn find_trips_by_device(&self, device_id: &str) -> StoreResult<Vec<Trip>>;

    async fn find_trip(&self, id: Uuid) -> StoreResult<Option<Trip>>;

    async fn find_active_trips(&self) -> StoreResult<Vec<Trip>>;

    async fn insert_orphan_point(&self, point: &OrphanPoint) -> StoreResult<()>;

    async fn find_latest_live_point(&self, device_id: &str) -> StoreResult<Option<OrphanPoint>>;

    /// Most recently created trip of every device.
    async fn find_latest_trips_per_device(&self) -> StoreResult<Vec<Trip>>;
}
