//! Subject timezone lookup.
//!
//! The day a contribution counts for depends on where the subject lives, so every
//! fold needs the subject's IANA timezone. Missing entries fall back to the configured
//! default; with neither, folding a qualifying event fails with `ClockAmbiguity`.
//! A registry that cannot answer reports an error instead of an absent entry, so the
//! default never stands in for a zone that exists but could not be read.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use streakproj_core::SubjectId;

#[derive(Debug, Error)]
pub enum TimezoneError {
    #[error("timezone registry unavailable: {0}")]
    Unavailable(String),
}

/// Source of subjects' configured timezones (IANA names).
pub trait TimezoneRegistry: Send + Sync {
    /// `Ok(None)` means the subject has no timezone of its own.
    fn timezone_of(&self, subject_id: SubjectId) -> Result<Option<String>, TimezoneError>;
}

impl<R> TimezoneRegistry for Arc<R>
where
    R: TimezoneRegistry + ?Sized,
{
    fn timezone_of(&self, subject_id: SubjectId) -> Result<Option<String>, TimezoneError> {
        (**self).timezone_of(subject_id)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTimezoneRegistry {
    inner: RwLock<HashMap<SubjectId, String>>,
}

impl InMemoryTimezoneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(
        &self,
        subject_id: SubjectId,
        timezone: impl Into<String>,
    ) -> Result<(), TimezoneError> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| TimezoneError::Unavailable("lock poisoned".to_string()))?;
        map.insert(subject_id, timezone.into());
        Ok(())
    }

    pub fn clear(&self, subject_id: SubjectId) -> Result<(), TimezoneError> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| TimezoneError::Unavailable("lock poisoned".to_string()))?;
        map.remove(&subject_id);
        Ok(())
    }
}

impl TimezoneRegistry for InMemoryTimezoneRegistry {
    fn timezone_of(&self, subject_id: SubjectId) -> Result<Option<String>, TimezoneError> {
        let map = self
            .inner
            .read()
            .map_err(|_| TimezoneError::Unavailable("lock poisoned".to_string()))?;
        Ok(map.get(&subject_id).cloned())
    }
}
