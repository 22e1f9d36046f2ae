use std::sync::Arc;

use thiserror::Error;

use streakproj_core::{ExpectedVersion, SubjectId};
use streakproj_projector::ProjectionState;

/// State store operation error.
///
/// - **Conflict**: another writer advanced the checkpoint since it was loaded;
///   reload and fold again (the fold is pure, so retrying is safe)
/// - **Regression**: the write would move `applied_seq` backwards
/// - **Corrupt**: a stored record cannot be mapped back to a state
/// - **Storage**: backend failure
#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("checkpoint conflict for subject {subject_id}: expected {expected:?}, stored applied_seq={actual}")]
    Conflict {
        subject_id: SubjectId,
        expected: ExpectedVersion,
        actual: u64,
    },

    #[error("checkpoint regression for subject {subject_id}: stored {stored}, attempted {attempted}")]
    Regression {
        subject_id: SubjectId,
        stored: u64,
        attempted: u64,
    },

    #[error("corrupt stored state: {0}")]
    Corrupt(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

/// Durable home of projection states, keyed by subject.
///
/// An absent state behaves as `applied_seq = 0` for conditional writes, so the
/// first writer of a subject passes `ExpectedVersion::Exact(0)`.
pub trait StateStore: Send + Sync {
    fn load(&self, subject_id: SubjectId) -> Result<Option<ProjectionState>, StateStoreError>;

    /// Persist `state` if the stored checkpoint matches `expected`.
    ///
    /// Implementations must also refuse any write that lowers the stored `applied_seq`.
    fn save(
        &self,
        subject_id: SubjectId,
        state: &ProjectionState,
        expected: ExpectedVersion,
    ) -> Result<(), StateStoreError>;

    /// Remove a subject's state (subject-data erasure). Returns whether one existed.
    fn erase(&self, subject_id: SubjectId) -> Result<bool, StateStoreError>;

    fn subjects(&self) -> Result<Vec<SubjectId>, StateStoreError>;
}

impl<S> StateStore for Arc<S>
where
    S: StateStore + ?Sized,
{
    fn load(&self, subject_id: SubjectId) -> Result<Option<ProjectionState>, StateStoreError> {
        (**self).load(subject_id)
    }

    fn save(
        &self,
        subject_id: SubjectId,
        state: &ProjectionState,
        expected: ExpectedVersion,
    ) -> Result<(), StateStoreError> {
        (**self).save(subject_id, state, expected)
    }

    fn erase(&self, subject_id: SubjectId) -> Result<bool, StateStoreError> {
        (**self).erase(subject_id)
    }

    fn subjects(&self) -> Result<Vec<SubjectId>, StateStoreError> {
        (**self).subjects()
    }
}
