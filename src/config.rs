use std::env;
use std::str::FromStr;
use std::time::Duration as StdDuration;
use chrono::Duration;

use crate::domain::services::rate_limiter::{RateAction, RateLimitConfig, RatePolicy};
use crate::error::AppError;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    /// Relay endpoint for notification intents. `None` logs them instead.
    pub mail_service_url: Option<String>,
    pub mail_service_token: String,
    pub frontend_url: String,
    pub reset_token_ttl: Duration,
    pub purge_interval: StdDuration,
    pub purge_retention: Duration,
    pub rate_limits: RateLimitConfig,
    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests need not touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| AppError::Config("DATABASE_URL must be set".into()))?;

        let mut rate_limits = RateLimitConfig::default();
        for action in RateAction::ALL {
            let key = format!("RATE_LIMIT_{}", action.as_str().to_uppercase());
            if let Some(raw) = lookup(&key) {
                let policy = RatePolicy::parse(&raw)
                    .ok_or_else(|| AppError::Config(format!("{} must look like <limit>/<window_secs>, got {:?}", key, raw)))?;
                rate_limits = rate_limits.with_policy(action, policy);
            }
        }

        let purge_interval_secs: u64 = parse_or(&lookup, "PURGE_INTERVAL_SECS", 3600)?;
        if purge_interval_secs == 0 {
            return Err(AppError::Config("PURGE_INTERVAL_SECS must be greater than zero".into()));
        }

        let reset_token_ttl = minutes(&lookup, "RESET_TOKEN_TTL_MINUTES", 60)?;
        if reset_token_ttl <= Duration::zero() {
            return Err(AppError::Config("RESET_TOKEN_TTL_MINUTES must be greater than zero".into()));
        }
        let purge_retention = minutes(&lookup, "PURGE_RETENTION_MINUTES", 0)?;
        if purge_retention < Duration::zero() {
            return Err(AppError::Config("PURGE_RETENTION_MINUTES must not be negative".into()));
        }

        Ok(Self {
            database_url,
            mail_service_url: lookup("MAIL_SERVICE_URL").filter(|v| !v.trim().is_empty()),
            mail_service_token: lookup("MAIL_SERVICE_TOKEN").unwrap_or_default(),
            frontend_url: lookup("FRONTEND_URL").unwrap_or_else(|| "http://localhost:4200".to_string()),
            reset_token_ttl,
            purge_interval: StdDuration::from_secs(purge_interval_secs),
            purge_retention,
            rate_limits,
            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "./logs".to_string()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| AppError::Config(format!("{} must be a number, got {:?}", key, raw))),
        None => Ok(default),
    }
}

fn minutes<F>(lookup: &F, key: &str, default: i64) -> Result<Duration, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let value: i64 = parse_or(lookup, key, default)?;
    Duration::try_minutes(value).ok_or_else(|| AppError::Config(format!("{} is out of range, got {}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[("DATABASE_URL", "sqlite://app.db")])).unwrap();
        assert_eq!(config.reset_token_ttl, Duration::hours(1));
        assert_eq!(config.purge_interval, StdDuration::from_secs(3600));
        assert!(config.mail_service_url.is_none());
        assert_eq!(config.rate_limits.policy(RateAction::Login), RatePolicy::default());
    }

    #[test]
    fn test_rate_limit_override() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite://app.db"),
            ("RATE_LIMIT_LOGIN", "5/300"),
        ])).unwrap();
        assert_eq!(config.rate_limits.policy(RateAction::Login).limit, 5);
        assert_eq!(config.rate_limits.policy(RateAction::PasswordResetRequest).limit, 20);
    }

    #[test]
    fn test_missing_database_url() {
        assert!(matches!(Config::from_lookup(lookup_from(&[])), Err(AppError::Config(_))));
    }

    #[test]
    fn test_malformed_values() {
        let bad_ttl = Config::from_lookup(lookup_from(&[("DATABASE_URL", "x"), ("RESET_TOKEN_TTL_MINUTES", "soon")]));
        assert!(matches!(bad_ttl, Err(AppError::Config(_))));
        let bad_rate = Config::from_lookup(lookup_from(&[("DATABASE_URL", "x"), ("RATE_LIMIT_LOGIN", "lots")]));
        assert!(matches!(bad_rate, Err(AppError::Config(_))));

        for (key, value) in [
            ("RESET_TOKEN_TTL_MINUTES", "999999999999999"),
            ("RESET_TOKEN_TTL_MINUTES", "-30"),
            ("RESET_TOKEN_TTL_MINUTES", "0"),
            ("PURGE_RETENTION_MINUTES", "-1"),
            ("PURGE_RETENTION_MINUTES", "999999999999999"),
            ("RATE_LIMIT_LOGIN", "5/99999999999999999"),
        ] {
            let res = Config::from_lookup(lookup_from(&[("DATABASE_URL", "x"), (key, value)]));
            assert!(matches!(res, Err(AppError::Config(_))), "{}={} should be rejected", key, value);
        }
    }
}
