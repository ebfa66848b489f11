pub mod event;
pub mod live_point;
pub mod message;
pub mod trip;
