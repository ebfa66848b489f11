use chrono::Utc;
use tracing::{debug, warn};

use crate::models::message::DeviceMessage;
use crate::processor::dispatcher::Dispatcher;

/// Decodes one raw payload and queues it for its device's worker.
///
/// Payloads that fail validation are logged and skipped; only a dead worker
/// queue is reported as an error.
pub async fn process_message(dispatcher: &Dispatcher, payload: &[u8]) -> anyhow::Result<()> {
    let received_at = Utc::now();

    let message = match DeviceMessage::parse(payload) {
        Ok(m) => m,
        Err(e) => {
            warn!("Failed to parse message: {}", e);
            return Ok(());
        }
    };

    let event = match message.into_event(received_at) {
        Ok(event) => event,
        Err(e) => {
            warn!("Rejected message: {}", e);
            return Ok(());
        }
    };

    debug!("Processing {}", event);
    dispatcher.dispatch(event).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryTripStore, TripStore};
    use crate::models::trip::TripStatus;
    use crate::processor::trip_engine::TripEngine;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_payloads_drive_a_trip() {
        let store = Arc::new(MemoryTripStore::new());
        let dispatcher = Dispatcher::spawn(Arc::new(TripEngine::new(store.clone())), 2, 16);

        let payloads = [
            r#"{"imei": "D10", "eventType": "IgnitionOn", "latitude": 37.0, "longitude": -122.0, "timestamp": "2024-03-01T10:00:00Z"}"#,
            r#"{"imei": "D10", "eventType": "PositionUpdate", "latitude": 37.01, "longitude": -122.0, "timestamp": "2024-03-01T10:05:00Z"}"#,
            r#"not even json"#,
            r#"{"eventType": "PositionUpdate", "latitude": 1.0, "longitude": 1.0}"#,
            r#"{"data": {"DEVICE_ID": "D10", "ALERT": "Engine Off", "GPS_DATETIME": "2024-03-01 10:10:00", "LATITUD": "37.02", "LONGITUD": "-122.0"}}"#,
        ];
        for payload in payloads {
            process_message(&dispatcher, payload.as_bytes()).await.unwrap();
        }
        dispatcher.shutdown().await;

        let trips = store.find_trips_by_device("D10").await.unwrap();
        assert_eq!(trips.len(), 1);
        assert_eq!(trips[0].status, TripStatus::Completed);
        assert_eq!(trips[0].locations.len(), 3);
        assert_eq!(trips[0].duration, Some(600_000));
        assert_eq!(trips[0].total_distance, 2.224);
        assert!(store.live_points().await.is_empty());
    }

    #[tokio::test]
    async fn test_bad_fields_do_not_drop_ignition_off() {
        let store = Arc::new(MemoryTripStore::new());
        let dispatcher = Dispatcher::spawn(Arc::new(TripEngine::new(store.clone())), 2, 16);

        let payloads = [
            r#"{"imei": "D12", "eventType": "IgnitionOn", "latitude": 37.0, "longitude": -122.0, "timestamp": "2024-03-01T10:00:00Z"}"#,
            r#"{"imei": "D12", "eventType": "IgnitionOff", "latitude": 91.0, "longitude": -122.0, "timestamp": "2024-03-01T10:20:00Z"}"#,
            r#"{"imei": "D13", "eventType": "IgnitionOn", "latitude": 37.0, "longitude": -122.0, "timestamp": "2024-03-01T10:00:00Z"}"#,
            r#"{"data": {"DEVICE_ID": "D13", "ALERT": "Engine Off", "GPS_DATETIME": "garbled", "LATITUD": "37.01", "LONGITUD": "-122.0"}}"#,
        ];
        for payload in payloads {
            process_message(&dispatcher, payload.as_bytes()).await.unwrap();
        }
        dispatcher.shutdown().await;

        assert!(store.find_active_trips().await.unwrap().is_empty());

        let d12 = &store.find_trips_by_device("D12").await.unwrap()[0];
        assert_eq!(d12.status, TripStatus::Completed);
        assert_eq!(d12.locations.len(), 1);
        assert_eq!(d12.end_lat, None);
        assert_eq!(d12.duration, Some(1_200_000));

        let d13 = &store.find_trips_by_device("D13").await.unwrap()[0];
        assert_eq!(d13.status, TripStatus::Completed);
        assert_eq!(d13.locations.len(), 2);
        assert_eq!(d13.end_lat, Some(37.01));
    }
}
