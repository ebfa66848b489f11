use thiserror::Error;

use crate::db::StoreError;

/// Rejections raised while turning a raw payload into an [`Event`](crate::models::event::Event).
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("event is missing a device id")]
    MissingDeviceId,
    #[error("invalid coordinates: lat={lat}, lng={lng}")]
    InvalidCoordinates { lat: f64, lng: f64 },
    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
