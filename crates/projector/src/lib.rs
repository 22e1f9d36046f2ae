//! `streakproj-projector`: idempotent fold of a subject's event stream into a
//! checkpointed contribution projection.
//!
//! The fold is pure and synchronous: loading state, loading events, and persisting
//! the result all happen in the caller (see `streakproj-infra`).

pub mod day_key;
pub mod error;
pub mod projector;
pub mod qualifying;
pub mod state;

#[cfg(test)]
mod properties;

pub use day_key::{DayKey, day_key, parse_timezone};
pub use error::ProjectionError;
pub use projector::{Fold, PROJECTOR_VERSION, Projector};
pub use qualifying::QualifyingPolicy;
pub use state::ProjectionState;

pub use chrono_tz::Tz;
