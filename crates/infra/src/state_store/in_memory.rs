use std::collections::HashMap;
use std::sync::RwLock;

use streakproj_core::{ExpectedVersion, SubjectId};
use streakproj_projector::ProjectionState;

use super::r#trait::{StateStore, StateStoreError};

/// In-memory state store for tests/dev.
///
/// The compare-and-set happens under the write lock, so it has the same semantics
/// as the conditional `UPDATE` of the Postgres store.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    inner: RwLock<HashMap<SubjectId, ProjectionState>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for InMemoryStateStore {
    fn load(&self, subject_id: SubjectId) -> Result<Option<ProjectionState>, StateStoreError> {
        let map = self
            .inner
            .read()
            .map_err(|_| StateStoreError::Storage("lock poisoned".to_string()))?;
        Ok(map.get(&subject_id).cloned())
    }

    fn save(
        &self,
        subject_id: SubjectId,
        state: &ProjectionState,
        expected: ExpectedVersion,
    ) -> Result<(), StateStoreError> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| StateStoreError::Storage("lock poisoned".to_string()))?;

        let stored = map.get(&subject_id).map(|s| s.applied_seq).unwrap_or(0);

        if !expected.matches(stored) {
            return Err(StateStoreError::Conflict {
                subject_id,
                expected,
                actual: stored,
            });
        }
        if state.applied_seq < stored {
            return Err(StateStoreError::Regression {
                subject_id,
                stored,
                attempted: state.applied_seq,
            });
        }

        map.insert(subject_id, state.clone());
        Ok(())
    }

    fn erase(&self, subject_id: SubjectId) -> Result<bool, StateStoreError> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| StateStoreError::Storage("lock poisoned".to_string()))?;
        Ok(map.remove(&subject_id).is_some())
    }

    fn subjects(&self) -> Result<Vec<SubjectId>, StateStoreError> {
        let map = self
            .inner
            .read()
            .map_err(|_| StateStoreError::Storage("lock poisoned".to_string()))?;
        let mut ids: Vec<SubjectId> = map.keys().copied().collect();
        ids.sort();
        Ok(ids)
    }
}
