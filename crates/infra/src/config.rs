//! Configuration loading and representation.
//!
//! Values come from the process environment:
//!
//! | variable | default | meaning |
//! |---|---|---|
//! | `STREAKPROJ_QUALIFYING_TYPES` | `post.created` | comma-separated event types that count as contributions |
//! | `STREAKPROJ_DEFAULT_TIMEZONE` | unset | IANA zone for subjects without their own |
//! | `STREAKPROJ_CHECKPOINT_INTERVAL` | `0` | persist an intermediate state every N folded events (0 = end of batch only) |
//! | `STREAKPROJ_WORKER_PARTITIONS` | `1` | number of partitioned projection workers |
//! | `DATABASE_URL` | unset | enables the Postgres state store |

use thiserror::Error;

use streakproj_events::EVENT_POST_CREATED;
use streakproj_projector::{QualifyingPolicy, Tz, parse_timezone};

pub const ENV_QUALIFYING_TYPES: &str = "STREAKPROJ_QUALIFYING_TYPES";
pub const ENV_DEFAULT_TIMEZONE: &str = "STREAKPROJ_DEFAULT_TIMEZONE";
pub const ENV_CHECKPOINT_INTERVAL: &str = "STREAKPROJ_CHECKPOINT_INTERVAL";
pub const ENV_WORKER_PARTITIONS: &str = "STREAKPROJ_WORKER_PARTITIONS";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Runtime settings for projection pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectorConfig {
    pub qualifying_types: Vec<String>,
    pub default_timezone: Option<Tz>,
    pub checkpoint_interval: u32,
    pub worker_partitions: usize,
    pub database_url: Option<String>,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            qualifying_types: vec![EVENT_POST_CREATED.to_string()],
            default_timezone: None,
            checkpoint_interval: 0,
            worker_partitions: 1,
            database_url: None,
        }
    }
}

impl ProjectorConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (tests, layered sources).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let qualifying_types = match get(ENV_QUALIFYING_TYPES) {
            Some(raw) => {
                let types: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
                if types.is_empty() {
                    return Err(ConfigError::invalid(
                        ENV_QUALIFYING_TYPES,
                        "at least one event type is required",
                    ));
                }
                types
            }
            None => defaults.qualifying_types,
        };

        let default_timezone = get(ENV_DEFAULT_TIMEZONE)
            .map(|name| {
                parse_timezone(&name)
                    .map_err(|e| ConfigError::invalid(ENV_DEFAULT_TIMEZONE, e.to_string()))
            })
            .transpose()?;

        let checkpoint_interval = match get(ENV_CHECKPOINT_INTERVAL) {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .map_err(|e| ConfigError::invalid(ENV_CHECKPOINT_INTERVAL, e.to_string()))?,
            None => defaults.checkpoint_interval,
        };

        let worker_partitions = match get(ENV_WORKER_PARTITIONS) {
            Some(raw) => {
                let n = raw
                    .trim()
                    .parse::<usize>()
                    .map_err(|e| ConfigError::invalid(ENV_WORKER_PARTITIONS, e.to_string()))?;
                if n == 0 {
                    return Err(ConfigError::invalid(ENV_WORKER_PARTITIONS, "must be at least 1"));
                }
                n
            }
            None => defaults.worker_partitions,
        };

        Ok(Self {
            qualifying_types,
            default_timezone,
            checkpoint_interval,
            worker_partitions,
            database_url: get(ENV_DATABASE_URL),
        })
    }

    pub fn qualifying_policy(&self) -> QualifyingPolicy {
        QualifyingPolicy::new(self.qualifying_types.iter().cloned())
    }
}
