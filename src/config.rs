// config.rs
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub port: u16,
    pub client_url: String,
    // Offset from UTC used to decide whether a requested slot is in the future
    pub schedule_utc_offset_minutes: i32,
}

impl Config {
    pub fn init() -> Result<Config, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = required(&lookup, "DATABASE_URL")?;
        // there is no default signing key
        let jwt_secret = required(&lookup, "JWT_SECRET_KEY")?;

        let port = parsed(&lookup, "PORT", 8000)?;
        let database_max_connections = parsed(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?;
        let schedule_utc_offset_minutes = parsed(&lookup, "SCHEDULE_UTC_OFFSET_MINUTES", 0)?;

        if !(-14 * 60..=14 * 60).contains(&schedule_utc_offset_minutes) {
            return Err(ConfigError::Invalid {
                key: "SCHEDULE_UTC_OFFSET_MINUTES",
                value: schedule_utc_offset_minutes.to_string(),
            });
        }

        let client_url = lookup("CLIENT_URL")
            .unwrap_or_else(|| "http://localhost:5173".to_string());

        Ok(Config {
            database_url,
            database_max_connections,
            jwt_secret,
            port,
            client_url,
            schedule_utc_offset_minutes,
        })
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn parsed<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn loads_defaults_for_optional_values() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/estate"),
            ("JWT_SECRET_KEY", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8000);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.schedule_utc_offset_minutes, 0);
        assert_eq!(config.client_url, "http://localhost:5173");
    }

    #[test]
    fn missing_jwt_secret_is_fatal() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/estate"),
        ]))
        .unwrap_err();

        assert_eq!(err, ConfigError::Missing("JWT_SECRET_KEY"));
    }

    #[test]
    fn blank_jwt_secret_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/estate"),
            ("JWT_SECRET_KEY", "   "),
        ]))
        .unwrap_err();

        assert_eq!(err, ConfigError::Missing("JWT_SECRET_KEY"));
    }

    #[test]
    fn rejects_unparsable_port() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/estate"),
            ("JWT_SECRET_KEY", "secret"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn rejects_out_of_range_offset() {
        let err = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/estate"),
            ("JWT_SECRET_KEY", "secret"),
            ("SCHEDULE_UTC_OFFSET_MINUTES", "1000"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { key: "SCHEDULE_UTC_OFFSET_MINUTES", .. }));
    }
}
