// src/config.rs

use std::{env, path::PathBuf, str::FromStr};

use dotenvy::dotenv;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Whether a subject can be attempted again once passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetakePolicy {
    #[default]
    Locked,
    Always,
}

impl FromStr for RetakePolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "locked" => Ok(RetakePolicy::Locked),
            "always" => Ok(RetakePolicy::Always),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetakeRules {
    pub policy: RetakePolicy,

    /// Attempts after which a subject that was never passed is locked.
    pub max_attempts: Option<u32>,
}

/// Where records are read from and written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreSettings {
    Path(PathBuf),
    Remote(Url),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub store: StoreSettings,
    pub cache_path: Option<PathBuf>,
    pub retake: RetakeRules,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let jwt_secret = env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;

        // A remote store takes precedence over the local file.
        let store = match env::var("STORE_URL").ok().filter(|v| !v.trim().is_empty()) {
            Some(raw) => StoreSettings::Remote(Url::parse(raw.trim()).map_err(|_| {
                ConfigError::Invalid {
                    name: "STORE_URL",
                    value: raw.clone(),
                }
            })?),
            None => StoreSettings::Path(
                env::var("DB_PATH")
                    .unwrap_or_else(|_| "data/db.json".to_string())
                    .into(),
            ),
        };

        let cache_path = env::var("LOCAL_CACHE_PATH")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let retake = RetakeRules {
            policy: parse_var("RETAKE_POLICY")?.unwrap_or_default(),
            max_attempts: parse_var::<u32>("MAX_ATTEMPTS")?.filter(|n| *n > 0),
        };

        let port = parse_var("PORT")?.unwrap_or(3000);

        let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            jwt_secret,
            store,
            cache_path,
            retake,
            port,
            rust_log,
        })
    }

    /// In-memory defaults for tests and tooling.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            store: StoreSettings::Path("data/db.json".into()),
            cache_path: None,
            retake: RetakeRules::default(),
            port: 3000,
            rust_log: "info".to_string(),
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retake_policy_parses_case_insensitively() {
        assert_eq!("Always".parse(), Ok(RetakePolicy::Always));
        assert_eq!(" locked ".parse(), Ok(RetakePolicy::Locked));
        assert!("sometimes".parse::<RetakePolicy>().is_err());
    }

    #[test]
    fn defaults_lock_after_pass() {
        let config = Config::with_secret("secret");
        assert_eq!(config.retake.policy, RetakePolicy::Locked);
        assert_eq!(config.retake.max_attempts, None);
        assert_eq!(config.store, StoreSettings::Path("data/db.json".into()));
    }
}
