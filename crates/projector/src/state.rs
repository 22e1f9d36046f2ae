use serde::{Deserialize, Serialize};

use crate::DayKey;

/// Per-subject contribution projection plus its idempotency checkpoint.
///
/// Serialized in the `StreamProjectionPhase1` document shape
/// (`lastContributionDate`, `currentDayPostCount`, `appliedSeq`, `projectorVersion`).
///
/// Invariants:
/// - `applied_seq` never decreases over the life of a state
/// - `current_day_post_count` counts qualifying events on `last_contribution_date` only
/// - `projector_version` names the fold logic that wrote the state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionState {
    pub last_contribution_date: Option<DayKey>,
    pub current_day_post_count: u32,
    pub applied_seq: u64,
    pub projector_version: String,
}

impl ProjectionState {
    /// State of a subject with no applied events.
    pub fn zero(projector_version: impl Into<String>) -> Self {
        Self {
            last_contribution_date: None,
            current_day_post_count: 0,
            applied_seq: 0,
            projector_version: projector_version.into(),
        }
    }
}
