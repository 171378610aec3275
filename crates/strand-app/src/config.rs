use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::AlbumSort;

pub const ENV_SESSION_CHECK_SECS: &str = "STRAND_SESSION_CHECK_SECS";
pub const ENV_LOG: &str = "STRAND_LOG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("`{field}` must be greater than zero")]
    Zero { field: &'static str },
    #[error("{var}={value:?} is not a valid value")]
    Env { var: &'static str, value: String },
}

/// Runtime settings for the state layer. Missing fields take their defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// How often the session is re-fetched while something observes it.
    pub session_check_secs: u64,
    pub default_album_sort: AlbumSort,
    /// `env_logger` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            session_check_secs: 300,
            default_album_sort: AlbumSort::TitleAsc,
            log_filter: "info".into(),
        }
    }
}

impl AppConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: AppConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_check_secs == 0 {
            return Err(ConfigError::Zero {
                field: "session_check_secs",
            });
        }
        Ok(())
    }

    /// Applies `STRAND_SESSION_CHECK_SECS` and `STRAND_LOG` from the process environment.
    pub fn from_env(self) -> Result<Self, ConfigError> {
        self.overlay(|var| std::env::var(var).ok())
    }

    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(ENV_SESSION_CHECK_SECS) {
            self.session_check_secs = value.trim().parse().map_err(|_| ConfigError::Env {
                var: ENV_SESSION_CHECK_SECS,
                value: value.clone(),
            })?;
        }
        if let Some(filter) = lookup(ENV_LOG)
            && !filter.trim().is_empty()
        {
            self.log_filter = filter;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn session_check_interval(&self) -> Duration {
        Duration::from_secs(self.session_check_secs)
    }
}
