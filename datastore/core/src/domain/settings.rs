// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Settings Contract
//!
//! Read-only view of process configuration consumed by the bootstrap and the
//! datastore. [`EnvSettings`] backs it with environment variables; hosts with
//! their own config system implement [`Settings`] directly.
//!
//! Keys read by this crate:
//!
//! | Key | Used by |
//! |-----|---------|
//! | `DATABASE_URL` | connection bootstrap |
//! | `GCLOUD_SQL_INSTANCE` | host resolution for managed sockets |
//! | `APP_ENV` | production / development mode (`EnvSettings` only) |

use std::collections::HashMap;
use std::time::Duration;

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const GCLOUD_SQL_INSTANCE: &str = "GCLOUD_SQL_INSTANCE";
pub const APP_ENV: &str = "APP_ENV";

/// Process configuration consumed by the datastore
pub trait Settings: Send + Sync {
    /// Raw value, empty when unset
    fn get(&self, key: &str) -> String;

    /// Duration value, zero when unset or unparsable
    fn get_duration(&self, key: &str) -> Duration;

    /// Boolean value, false when unset or unparsable
    fn get_bool(&self, key: &str) -> bool;

    fn is_production(&self) -> bool;

    fn is_development(&self) -> bool;
}

/// Deployment environment derived from `APP_ENV`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Unrecognized or missing values are treated as development
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

/// Environment-variable backed settings with in-process overrides
#[derive(Debug, Clone, Default)]
pub struct EnvSettings {
    overrides: HashMap<String, String>,
}

impl EnvSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override a key without touching the process environment
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }

    pub fn environment(&self) -> Environment {
        Environment::parse(&self.get(APP_ENV))
    }
}

impl Settings for EnvSettings {
    fn get(&self, key: &str) -> String {
        if let Some(value) = self.overrides.get(key) {
            return value.clone();
        }
        std::env::var(key).unwrap_or_default()
    }

    fn get_duration(&self, key: &str) -> Duration {
        let raw = self.get(key);
        if raw.is_empty() {
            return Duration::ZERO;
        }
        match humantime::parse_duration(raw.trim()) {
            Ok(duration) => duration,
            Err(e) => {
                tracing::warn!(key, value = %raw, error = %e, "Invalid duration setting, using zero");
                Duration::ZERO
            }
        }
    }

    fn get_bool(&self, key: &str) -> bool {
        let raw = self.get(key);
        match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" | "" => false,
            _ => {
                tracing::warn!(key, value = %raw, "Invalid boolean setting, using false");
                false
            }
        }
    }

    fn is_production(&self) -> bool {
        self.environment() == Environment::Production
    }

    fn is_development(&self) -> bool {
        self.environment() == Environment::Development
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_win() {
        let settings = EnvSettings::new().with_value("SITESTORE_TEST_KEY", "abc");
        assert_eq!(settings.get("SITESTORE_TEST_KEY"), "abc");
        assert_eq!(settings.get("SITESTORE_TEST_KEY_THAT_IS_NOT_SET"), "");
    }

    #[test]
    fn test_get_bool() {
        let settings = EnvSettings::new()
            .with_value("A", "yes")
            .with_value("B", "OFF")
            .with_value("C", "maybe");
        assert!(settings.get_bool("A"));
        assert!(!settings.get_bool("B"));
        assert!(!settings.get_bool("C"));
        assert!(!settings.get_bool("SITESTORE_UNSET_BOOL"));
    }

    #[test]
    fn test_get_duration() {
        let settings = EnvSettings::new()
            .with_value("TTL", "5m")
            .with_value("BAD", "soon");
        assert_eq!(settings.get_duration("TTL"), Duration::from_secs(300));
        assert_eq!(settings.get_duration("BAD"), Duration::ZERO);
    }

    #[test]
    fn test_environment_modes() {
        let prod = EnvSettings::new().with_value(APP_ENV, "Production");
        assert!(prod.is_production());
        assert!(!prod.is_development());

        let staging = EnvSettings::new().with_value(APP_ENV, "staging");
        assert!(!staging.is_production());
        assert!(!staging.is_development());

        let dev = EnvSettings::new().with_value(APP_ENV, "");
        assert!(dev.is_development());
    }
}
