// Service configuration loaded from environment variables

use std::env;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while reading configuration at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Runtime configuration for the service
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    /// Shared secret the scheduler presents on the execution endpoint.
    /// `None` leaves the endpoint open.
    pub cron_secret: Option<String>,
    pub dispatch_timeout: Duration,
    pub automation_concurrency: usize,
    /// When set, passes also run in-process on this interval
    pub automation_interval: Option<Duration>,
    pub notify_api_url: Option<String>,
    pub notify_api_key: Option<String>,
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let automation_concurrency: usize =
            parse_or("AUTOMATION_CONCURRENCY", get("AUTOMATION_CONCURRENCY"), 4)?;
        if automation_concurrency == 0 {
            return Err(ConfigError::Invalid {
                name: "AUTOMATION_CONCURRENCY",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let dispatch_timeout_secs: u64 =
            parse_or("DISPATCH_TIMEOUT_SECS", get("DISPATCH_TIMEOUT_SECS"), 10)?;
        if dispatch_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "DISPATCH_TIMEOUT_SECS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let automation_interval = match get("AUTOMATION_INTERVAL_SECS") {
            Some(raw) => {
                let secs: u64 = parse_value("AUTOMATION_INTERVAL_SECS", &raw)?;
                if secs == 0 {
                    None
                } else {
                    Some(Duration::from_secs(secs))
                }
            }
            None => None,
        };

        Ok(Config {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or("PORT", get("PORT"), 8080)?,
            database_url,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), 5)?,
            jwt_secret,
            cron_secret: get("CRON_SECRET"),
            dispatch_timeout: Duration::from_secs(dispatch_timeout_secs),
            automation_concurrency,
            automation_interval,
            notify_api_url: get("NOTIFY_API_URL"),
            notify_api_key: get("NOTIFY_API_KEY"),
        })
    }

    /// Address the HTTP listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => parse_value(name, &value),
        None => Ok(default),
    }
}

fn parse_value<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        value: raw.to_string(),
        reason: e.to_string(),
    })
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
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/salon"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.dispatch_timeout, Duration::from_secs(10));
        assert_eq!(config.automation_concurrency, 4);
        assert!(config.cron_secret.is_none());
        assert!(config.automation_interval.is_none());
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_missing_database_url() {
        let result = Config::from_lookup(lookup_from(&[("JWT_SECRET", "secret")]));
        assert!(matches!(result, Err(ConfigError::Missing("DATABASE_URL"))));
    }

    #[test]
    fn test_empty_value_treated_as_unset() {
        let result = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/salon"),
            ("JWT_SECRET", "  "),
        ]));
        assert!(matches!(result, Err(ConfigError::Missing("JWT_SECRET"))));
    }

    #[test]
    fn test_invalid_port_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/salon"),
            ("JWT_SECRET", "secret"),
            ("PORT", "eighty"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid { name: "PORT", .. })));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/salon"),
            ("JWT_SECRET", "secret"),
            ("AUTOMATION_CONCURRENCY", "0"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_dispatch_timeout_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/salon"),
            ("JWT_SECRET", "secret"),
            ("DISPATCH_TIMEOUT_SECS", "0"),
        ]));
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { name: "DISPATCH_TIMEOUT_SECS", .. })
        ));

        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/salon"),
            ("JWT_SECRET", "secret"),
            ("DISPATCH_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();
        assert_eq!(config.dispatch_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_optional_values_parsed() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/salon"),
            ("JWT_SECRET", "secret"),
            ("CRON_SECRET", "cron-token"),
            ("AUTOMATION_INTERVAL_SECS", "600"),
            ("NOTIFY_API_URL", "https://notify.internal/send"),
        ]))
        .unwrap();

        assert_eq!(config.cron_secret.as_deref(), Some("cron-token"));
        assert_eq!(config.automation_interval, Some(Duration::from_secs(600)));
        assert_eq!(config.notify_api_url.as_deref(), Some("https://notify.internal/send"));
    }

    #[test]
    fn test_zero_interval_disables_scheduler() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/salon"),
            ("JWT_SECRET", "secret"),
            ("AUTOMATION_INTERVAL_SECS", "0"),
        ]))
        .unwrap();
        assert!(config.automation_interval.is_none());
    }
}
