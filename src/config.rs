use crate::engine::PlaceholderLabels;
use std::collections::HashMap;
use std::net::IpAddr;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind_addr: IpAddr,
    pub database_path: String,
    pub db_max_connections: u32,
    /// Upper bound on one profit cycle close.
    pub close_timeout_ms: u64,
    pub takeaway_label: String,
    pub walk_in_label: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_path = env
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        Ok(Config {
            port: parse_var(&env, "PORT", 8080u16, "must be a valid u16")?,
            bind_addr: parse_var(
                &env,
                "BIND_ADDR",
                IpAddr::from([127, 0, 0, 1]),
                "must be an IPv4 or IPv6 address",
            )?,
            database_path,
            db_max_connections: positive(
                "DB_MAX_CONNECTIONS",
                parse_var(&env, "DB_MAX_CONNECTIONS", 5u32, "must be a positive integer")?,
                "must be a positive integer",
            )?,
            close_timeout_ms: positive(
                "CLOSE_TIMEOUT_MS",
                parse_var(
                    &env,
                    "CLOSE_TIMEOUT_MS",
                    30_000u64,
                    "must be a positive number of milliseconds",
                )?,
                "must be a positive number of milliseconds",
            )?,
            takeaway_label: label_var(&env, "TAKEAWAY_LABEL", "Takeaway")?,
            walk_in_label: label_var(&env, "WALK_IN_LABEL", "Walk-in customer")?,
        })
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    pub fn placeholder_labels(&self) -> PlaceholderLabels {
        PlaceholderLabels {
            takeaway: self.takeaway_label.clone(),
            walk_in: self.walk_in_label.clone(),
        }
    }
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue(key.to_string(), reason.to_string())
}

/// Parse `key` when set, otherwise fall back to `default`.
fn parse_var<T: FromStr>(
    env: &HashMap<String, String>,
    key: &str,
    default: T,
    reason: &str,
) -> Result<T, ConfigError> {
    match env.get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|_| invalid(key, reason)),
    }
}

fn positive<T: PartialOrd + Default>(key: &str, value: T, reason: &str) -> Result<T, ConfigError> {
    if value > T::default() {
        Ok(value)
    } else {
        Err(invalid(key, reason))
    }
}

fn label_var(env: &HashMap<String, String>, key: &str, default: &str) -> Result<String, ConfigError> {
    match env.get(key).map(|v| v.trim()) {
        None => Ok(default.to_string()),
        Some("") => Err(invalid(key, "must not be blank")),
        Some(label) => Ok(label.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_env() -> HashMap<String, String> {
        HashMap::from([("DATABASE_PATH".to_string(), "/tmp/test.db".to_string())])
    }

    fn with(key: &str, value: &str) -> HashMap<String, String> {
        let mut env = base_env();
        env.insert(key.to_string(), value.to_string());
        env
    }

    fn rejected_key(env: HashMap<String, String>) -> String {
        match Config::from_env_map(env) {
            Err(ConfigError::InvalidValue(key, _)) => key,
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(base_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1");
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.close_timeout(), Duration::from_secs(30));
        assert_eq!(config.placeholder_labels(), PlaceholderLabels::default());
    }

    #[test]
    fn test_database_path_required() {
        match Config::from_env_map(HashMap::new()) {
            Err(ConfigError::MissingEnv(key)) => assert_eq!(key, "DATABASE_PATH"),
            other => panic!("expected MissingEnv, got {other:?}"),
        }
    }

    #[test]
    fn test_overrides() {
        let mut env = with("PORT", "9090");
        env.insert("BIND_ADDR".to_string(), "0.0.0.0".to_string());
        env.insert("CLOSE_TIMEOUT_MS".to_string(), "1500".to_string());
        let config = Config::from_env_map(env).unwrap();
        assert_eq!(config.port, 9090);
        assert!(config.bind_addr.is_unspecified());
        assert_eq!(config.close_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn test_malformed_values_name_their_key() {
        assert_eq!(rejected_key(with("PORT", "not_a_number")), "PORT");
        assert_eq!(rejected_key(with("BIND_ADDR", "localhost:80")), "BIND_ADDR");
        assert_eq!(rejected_key(with("CLOSE_TIMEOUT_MS", "0")), "CLOSE_TIMEOUT_MS");
        assert_eq!(rejected_key(with("DB_MAX_CONNECTIONS", "0")), "DB_MAX_CONNECTIONS");
        assert_eq!(rejected_key(with("WALK_IN_LABEL", "   ")), "WALK_IN_LABEL");
    }

    #[test]
    fn test_custom_labels() {
        let mut env = with("TAKEAWAY_LABEL", "Mang về");
        env.insert("WALK_IN_LABEL".to_string(), " Khách vãng lai ".to_string());
        let labels = Config::from_env_map(env).unwrap().placeholder_labels();
        assert_eq!(labels.takeaway, "Mang về");
        assert_eq!(labels.walk_in, "Khách vãng lai");
    }
}
