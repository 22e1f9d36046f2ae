//! Infrastructure around the projector: event log, state persistence, configuration,
//! and the orchestration that loads, folds, and conditionally writes per subject.

pub mod config;
pub mod event_log;
pub mod service;
pub mod state_store;
pub mod timezones;
pub mod workers;

#[cfg(test)]
mod integration_tests;

pub use config::{ConfigError, ProjectorConfig};
pub use service::{ProjectionService, ServiceError};
