use std::{env, fmt::Display, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    DynamoDb,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dynamodb" | "dynamo" => Ok(StoreBackend::DynamoDb),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend '{}'", other)),
        }
    }
}

/// Settings read once per cold start.
#[derive(Debug, Clone)]
pub struct Config {
    pub table_name: String,
    pub store_backend: StoreBackend,
    pub session_ttl_hours: i64,
    pub cookie_secure: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            table_name: "storefront".to_string(),
            store_backend: StoreBackend::DynamoDb,
            session_ttl_hours: 24,
            cookie_secure: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Self {
            table_name: env::var("TABLE_NAME").unwrap_or(defaults.table_name),
            store_backend: try_load("STORE_BACKEND", defaults.store_backend),
            session_ttl_hours: session_ttl_hours(
                try_load("SESSION_TTL_HOURS", defaults.session_ttl_hours),
                defaults.session_ttl_hours,
            ),
            cookie_secure: try_load("COOKIE_SECURE", defaults.cookie_secure),
        }
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }
}

const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

fn session_ttl_hours(hours: i64, default: i64) -> i64 {
    if (1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
        hours
    } else {
        tracing::warn!(
            "SESSION_TTL_HOURS must be between 1 and {}, got {}, using default",
            MAX_SESSION_TTL_HOURS,
            hours
        );
        default
    }
}

fn try_load<T: FromStr>(key: &str, default: T) -> T
where
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            tracing::warn!("Invalid {} value '{}': {}, using default", key, raw, e);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!("DynamoDB".parse::<StoreBackend>(), Ok(StoreBackend::DynamoDb));
        assert!("postgres".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_default_session_ttl_is_a_day() {
        assert_eq!(Config::default().session_ttl(), chrono::Duration::hours(24));
    }

    #[test]
    fn test_session_ttl_out_of_range_falls_back() {
        assert_eq!(session_ttl_hours(0, 24), 24);
        assert_eq!(session_ttl_hours(-5, 24), 24);
        assert_eq!(session_ttl_hours(i64::MAX, 24), 24);
        assert_eq!(session_ttl_hours(48, 24), 48);
        assert_eq!(session_ttl_hours(MAX_SESSION_TTL_HOURS, 24), MAX_SESSION_TTL_HOURS);
    }
}
