pub const SELECT_ACTIVE_TRIP: &str = r#"
SELECT
    trip_id, device_id, status, start_time, end_time, start_lat, start_lng, end_lat, end_lng,
    locations, total_distance, duration_ms, version, created_at, updated_at
FROM trips
WHERE device_id = $1 AND status = 'active'
LIMIT 1;
"#;

pub const SELECT_TRIP_BY_ID: &str = r#"
SELECT
    trip_id, device_id, status, start_time, end_time, start_lat, start_lng, end_lat, end_lng,
    locations, total_distance, duration_ms, version, created_at, updated_at
FROM trips
WHERE trip_id = $1;
"#;

pub const SELECT_ACTIVE_TRIPS: &str = r#"
SELECT
    trip_id, device_id, status, start_time, end_time, start_lat, start_lng, end_lat, end_lng,
    locations, total_distance, duration_ms, version, created_at, updated_at
FROM trips
WHERE status = 'active'
ORDER BY start_time DESC;
"#;

pub const SELECT_TRIPS_BY_DEVICE: &str = r#"
SELECT
    trip_id, device_id, status, start_time, end_time, start_lat, start_lng, end_lat, end_lng,
    locations, total_distance, duration_ms, version, created_at, updated_at
FROM trips
WHERE device_id = $1
ORDER BY start_time DESC;
"#;

pub const SELECT_LATEST_TRIP_PER_DEVICE: &str = r#"
SELECT DISTINCT ON (device_id)
    trip_id, device_id, status, start_time, end_time, start_lat, start_lng, end_lat, end_lng,
    locations, total_distance, duration_ms, version, created_at, updated_at
FROM trips
ORDER BY device_id, created_at DESC, start_time DESC;
"#;

pub const INSERT_TRIP: &str = r#"
INSERT INTO trips (
    trip_id, device_id, status, start_time, end_time, start_lat, start_lng, end_lat, end_lng,
    locations, total_distance, duration_ms, version, created_at, updated_at
) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15);
"#;

pub const REPLACE_TRIP: &str = r#"
UPDATE trips
SET status = $2,
    start_time = $3,
    end_time = $4,
    start_lat = $5,
    start_lng = $6,
    end_lat = $7,
    end_lng = $8,
    locations = $9,
    total_distance = $10,
    duration_ms = $11,
    version = version + 1,
    updated_at = NOW()
WHERE trip_id = $1 AND version = $12;
"#;

pub const APPEND_LOCATION: &str = r#"
UPDATE trips
SET locations = locations || $2,
    total_distance = $3,
    version = version + 1,
    updated_at = NOW()
WHERE trip_id = $1 AND version = $4;
"#;

pub const INSERT_LIVE_POINT: &str = r#"
INSERT INTO live_points (point_id, device_id, lat, lng, event_kind, "timestamp", created_at)
VALUES ($1, $2, $3, $4, $5, $6, $7);
"#;

pub const SELECT_LATEST_LIVE_POINT: &str = r#"
SELECT point_id, device_id, lat, lng, event_kind, "timestamp", created_at
FROM live_points
WHERE device_id = $1
ORDER BY "timestamp" DESC, created_at DESC
LIMIT 1;
"#;
