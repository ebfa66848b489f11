pub mod dispatcher;
pub mod message_processor;
pub mod trip_engine;
pub mod trip_queries;
