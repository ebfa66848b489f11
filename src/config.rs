use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub kafka_bootstrap_servers: String,
    pub kafka_topic: String,
    pub kafka_group_id: String,
    pub kafka_auto_offset_reset: String,
    pub kafka_sasl_mechanism: String,
    pub kafka_username: String,
    pub kafka_password: String,
    pub kafka_security_protocol: String,
    pub kafka_max_retries: u32,
    pub kafka_circuit_breaker_cooldown: u64,
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: String,
    pub trip_workers: usize,
    pub trip_queue_capacity: usize,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let kafka_bootstrap_servers = var_or("KAFKA_BOOTSTRAP_SERVERS", "localhost:9092");
        let kafka_topic = var_or("KAFKA_TOPIC", "device-telemetry");
        let kafka_group_id = var_or("KAFKA_GROUP_ID", "fleet-trips-consumer");
        let kafka_auto_offset_reset = var_or("KAFKA_AUTO_OFFSET_RESET", "latest");
        let kafka_sasl_mechanism = var_or("KAFKA_SASL_MECHANISM", "SCRAM-SHA-256");
        let kafka_username = env::var("KAFKA_USERNAME").unwrap_or_default();
        let kafka_password = env::var("KAFKA_PASSWORD").unwrap_or_default();
        let kafka_security_protocol = var_or("KAFKA_SECURITY_PROTOCOL", "SASL_PLAINTEXT");
        let kafka_max_retries = parse_or("KAFKA_MAX_RETRIES", 5u32);
        let kafka_circuit_breaker_cooldown = parse_or("KAFKA_CIRCUIT_BREAKER_COOLDOWN", 300u64);

        let db_host = var_or("DB_HOST", "localhost");
        let db_port = var_or("DB_PORT", "5432");
        let db_name = var_or("DB_DATABASE", "fleet_trips");
        let db_user = var_or("DB_USER", "fleet");
        let db_pwd = var_or("DB_PWD", "fleet");

        let database_url = format!(
            "postgres://{}:{}@{}:{}/{}",
            db_user, db_pwd, db_host, db_port, db_name
        );
        let db_max_connections = parse_or("DB_MAX_CONNECTIONS", 50u32);

        let log_level = var_or("LOG_LEVEL", "info");

        let trip_workers = parse_or("TRIP_WORKERS", 8usize).max(1);
        let trip_queue_capacity = parse_or("TRIP_QUEUE_CAPACITY", 1024usize).max(1);

        Ok(Self {
            kafka_bootstrap_servers,
            kafka_topic,
            kafka_group_id,
            kafka_auto_offset_reset,
            kafka_sasl_mechanism,
            kafka_username,
            kafka_password,
            kafka_security_protocol,
            kafka_max_retries,
            kafka_circuit_breaker_cooldown,
            database_url,
            db_max_connections,
            log_level,
            trip_workers,
            trip_queue_capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_falls_back_on_garbage() {
        env::set_var("FLEET_TRIPS_TEST_WORKERS", " 12 ");
        assert_eq!(parse_or("FLEET_TRIPS_TEST_WORKERS", 8usize), 12);

        env::set_var("FLEET_TRIPS_TEST_WORKERS", "many");
        assert_eq!(parse_or("FLEET_TRIPS_TEST_WORKERS", 8usize), 8);

        assert_eq!(parse_or("FLEET_TRIPS_TEST_UNSET", 300u64), 300);
    }
}
