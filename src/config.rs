use chrono::{Duration, FixedOffset};
use std::str::FromStr;
use thiserror::Error;

use crate::cache::CACHE_DURATION_SECS;
use crate::ons::BASE_URL;

const DEFAULT_UTC_OFFSET_HOURS: i32 = -3;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3044";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub base_url: String,
    pub cache_duration: Duration,
    /// Wall clock the intraday grid is expressed in
    pub utc_offset: FixedOffset,
    pub bind_addr: String,
}

impl DashboardConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("ONS_API_BASE_URL").unwrap_or_else(|| BASE_URL.to_string());
        let bind_addr = lookup("ONS_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let cache_secs: i64 = parse_var(&lookup, "ONS_CACHE_SECS", CACHE_DURATION_SECS)?;
        if cache_secs < 0 {
            return Err(invalid("ONS_CACHE_SECS", cache_secs));
        }

        let offset_hours: i32 =
            parse_var(&lookup, "ONS_UTC_OFFSET_HOURS", DEFAULT_UTC_OFFSET_HOURS)?;
        let utc_offset = offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| invalid("ONS_UTC_OFFSET_HOURS", offset_hours))?;

        Ok(Self {
            base_url,
            cache_duration: Duration::seconds(cache_secs),
            utc_offset,
            bind_addr,
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(raw) => raw.trim().parse().map_err(|_| invalid(name, raw)),
        None => Ok(default),
    }
}

fn invalid(name: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<DashboardConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DashboardConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.base_url, BASE_URL);
        assert_eq!(config.cache_duration, Duration::minutes(5));
        assert_eq!(config.utc_offset.local_minus_utc(), -3 * 3600);
        assert_eq!(config.bind_addr, "0.0.0.0:3044");
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("ONS_API_BASE_URL", "http://localhost:9000/Get"),
            ("ONS_CACHE_SECS", "60"),
            ("ONS_UTC_OFFSET_HOURS", "0"),
        ])
        .unwrap();
        assert_eq!(config.base_url, "http://localhost:9000/Get");
        assert_eq!(config.cache_duration, Duration::seconds(60));
        assert_eq!(config.utc_offset.local_minus_utc(), 0);
    }

    #[test]
    fn test_invalid_values() {
        assert_eq!(
            config(&[("ONS_CACHE_SECS", "soon")]).unwrap_err(),
            ConfigError::InvalidValue {
                name: "ONS_CACHE_SECS",
                value: "soon".to_string()
            }
        );
        assert!(config(&[("ONS_CACHE_SECS", "-1")]).is_err());
        assert!(config(&[("ONS_UTC_OFFSET_HOURS", "30")]).is_err());
        assert_eq!(
            config(&[("ONS_UTC_OFFSET_HOURS", "1000000")]).unwrap_err(),
            ConfigError::InvalidValue {
                name: "ONS_UTC_OFFSET_HOURS",
                value: "1000000".to_string()
            }
        );
        assert!(config(&[("ONS_UTC_OFFSET_HOURS", "-2147483648")]).is_err());
    }
}
