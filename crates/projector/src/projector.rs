//! The fold: `apply(state, events) -> state`.
//!
//! A batch goes through four stages:
//!
//! 1. **Validate** the whole batch (no mutation happens on rejection)
//! 2. **Filter** to `seq > state.applied_seq` (re-delivered events become no-ops)
//! 3. **Sort** by `seq` and drop identical duplicates (out-of-order delivery)
//! 4. **Fold** one event at a time, advancing `applied_seq` after every step
//!
//! Because of (2) and (3), folding any permutation of a batch, any number of times,
//! with the checkpoint persisted at any point in between, converges to the same state
//! as one ordered, duplicate-free pass.

use std::collections::HashMap;

use chrono_tz::Tz;
use tracing::debug;

use streakproj_events::Event;

use crate::{DayKey, ProjectionError, ProjectionState, QualifyingPolicy, day_key};

/// Version stamped on every state this fold logic produces.
pub const PROJECTOR_VERSION: &str = "phase1-v1";

/// Folds a subject's events into its [`ProjectionState`].
///
/// Stateless apart from configuration; one instance can serve any number of subjects
/// concurrently, since callers own the states.
#[derive(Debug, Clone)]
pub struct Projector {
    version: &'static str,
    policy: QualifyingPolicy,
}

impl Default for Projector {
    fn default() -> Self {
        Self::new(QualifyingPolicy::default())
    }
}

impl Projector {
    pub fn new(policy: QualifyingPolicy) -> Self {
        Self::with_version(policy, PROJECTOR_VERSION)
    }

    /// Build a projector for a revised fold logic.
    ///
    /// States written by a projector with a different version are refused by this one
    /// until they are rebuilt.
    pub fn with_version(policy: QualifyingPolicy, version: &'static str) -> Self {
        Self { version, policy }
    }

    pub fn version(&self) -> &'static str {
        self.version
    }

    pub fn policy(&self) -> &QualifyingPolicy {
        &self.policy
    }

    /// Zero value for a subject without stored state.
    pub fn zero_state(&self) -> ProjectionState {
        ProjectionState::zero(self.version)
    }

    /// Fold `events` into `state` and return the new state.
    ///
    /// `tz` is the subject's timezone; it is only required when the batch contains a
    /// qualifying event that still has to be folded.
    pub fn apply(
        &self,
        state: &ProjectionState,
        events: &[Event],
        tz: Option<Tz>,
    ) -> Result<ProjectionState, ProjectionError> {
        Ok(self.prepare(state, events, tz)?.finish())
    }

    /// Validate and order a batch, returning a stepwise [`Fold`].
    ///
    /// All rejection happens here. Once a `Fold` exists, every remaining step succeeds,
    /// so callers may persist the intermediate states it yields as checkpoints.
    pub fn prepare(
        &self,
        state: &ProjectionState,
        events: &[Event],
        tz: Option<Tz>,
    ) -> Result<Fold, ProjectionError> {
        if state.projector_version != self.version {
            return Err(ProjectionError::IncompatibleState {
                found: state.projector_version.clone(),
                expected: self.version.to_string(),
            });
        }

        validate_batch(events)?;

        let mut fresh: Vec<&Event> = events
            .iter()
            .filter(|e| e.seq > state.applied_seq)
            .collect();
        fresh.sort_by_key(|e| e.seq);
        fresh.dedup_by_key(|e| e.seq);

        let mut steps = Vec::with_capacity(fresh.len());
        for event in fresh {
            let day = if self.policy.qualifies(&event.event_type) {
                let tz = tz.ok_or_else(|| {
                    ProjectionError::ClockAmbiguity(format!(
                        "subject has no timezone; cannot attribute event seq={} to a day",
                        event.seq
                    ))
                })?;
                Some(day_key(event.occurred_at, tz))
            } else {
                None
            };
            steps.push(Step {
                seq: event.seq,
                day,
            });
        }

        debug!(
            applied_seq = state.applied_seq,
            received = events.len(),
            to_fold = steps.len(),
            "prepared projection batch"
        );

        Ok(Fold {
            version: self.version,
            state: state.clone(),
            steps: steps.into_iter(),
        })
    }
}

/// Rejects the batch if any event is malformed, before anything is folded.
fn validate_batch(events: &[Event]) -> Result<(), ProjectionError> {
    let mut by_seq: HashMap<u64, &Event> = HashMap::with_capacity(events.len());

    for event in events {
        if event.seq == 0 {
            return Err(ProjectionError::malformed(0, "sequence numbers start at 1"));
        }
        if event.event_type.trim().is_empty() {
            return Err(ProjectionError::malformed(event.seq, "event type is empty"));
        }
        if let Some(seen) = by_seq.insert(event.seq, event) {
            if seen != event {
                return Err(ProjectionError::malformed(
                    event.seq,
                    "two different events share this sequence number",
                ));
            }
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct Step {
    seq: u64,
    /// Day-key for qualifying events; `None` means checkpoint-only.
    day: Option<DayKey>,
}

/// An in-progress, already-validated fold.
///
/// Iterating yields the state after each applied event (its `applied_seq` is that
/// event's `seq`). A caller that persists one of those states and then crashes resumes
/// correctly: the events after it are simply folded again from the stored checkpoint.
#[derive(Debug)]
pub struct Fold {
    version: &'static str,
    state: ProjectionState,
    steps: std::vec::IntoIter<Step>,
}

impl Fold {
    /// Events left to fold.
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }

    /// State after the steps taken so far.
    pub fn current(&self) -> &ProjectionState {
        &self.state
    }

    /// First `seq` missing between the checkpoint and the last event left to fold.
    ///
    /// Folding past a missing `seq` moves the checkpoint beyond it, after which that
    /// event is filtered out as already applied. Callers that can still obtain the
    /// missing events should do so before folding.
    pub fn missing_seq(&self) -> Option<u64> {
        let mut expected = self.state.applied_seq.saturating_add(1);
        for step in self.steps.as_slice() {
            if step.seq != expected {
                return Some(expected);
            }
            expected = expected.saturating_add(1);
        }
        None
    }

    /// Fold all remaining events and return the final state.
    pub fn finish(mut self) -> ProjectionState {
        while self.advance() {}
        self.state
    }

    fn advance(&mut self) -> bool {
        let Some(step) = self.steps.next() else {
            return false;
        };

        if let Some(day) = step.day {
            if self.state.last_contribution_date == Some(day) {
                self.state.current_day_post_count =
                    self.state.current_day_post_count.saturating_add(1);
            } else {
                self.state.last_contribution_date = Some(day);
                self.state.current_day_post_count = 1;
            }
        }

        self.state.applied_seq = step.seq;
        self.state.projector_version = self.version.to_string();
        true
    }
}

impl Iterator for Fold {
    type Item = ProjectionState;

    fn next(&mut self) -> Option<Self::Item> {
        self.advance().then(|| self.state.clone())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.steps.size_hint()
    }
}

impl ExactSizeIterator for Fold {}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use serde_json::json;

    use streakproj_events::{EVENT_POST_CREATED, EVENT_POST_EDITED};

    use super::*;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    fn post(seq: u64, when: &str) -> Event {
        Event::new(seq, EVENT_POST_CREATED, at(when), json!({}))
    }

    fn state(date: Option<&str>, count: u32, applied_seq: u64) -> ProjectionState {
        ProjectionState {
            last_contribution_date: date.map(|d| d.parse().unwrap()),
            current_day_post_count: count,
            applied_seq,
            projector_version: PROJECTOR_VERSION.to_string(),
        }
    }

    #[test]
    fn day_rollover_resets_counter() {
        let s = state(Some("2024-01-01"), 3, 5);
        let out = Projector::default()
            .apply(&s, &[post(6, "2024-01-02T00:05:00Z")], Some(Tz::UTC))
            .unwrap();
        assert_eq!(out, state(Some("2024-01-02"), 1, 6));
    }

    #[test]
    fn same_day_increments_counter() {
        let s = state(Some("2024-01-01"), 3, 5);
        let out = Projector::default()
            .apply(&s, &[post(6, "2024-01-01T23:00:00Z")], Some(Tz::UTC))
            .unwrap();
        assert_eq!(out, state(Some("2024-01-01"), 4, 6));
    }

    #[test]
    fn stale_replay_is_a_no_op() {
        let s = state(Some("2024-01-01"), 3, 10);
        let batch = [
            post(3, "2024-01-05T10:00:00Z"),
            post(10, "2024-01-05T11:00:00Z"),
            post(7, "2024-01-05T12:00:00Z"),
        ];
        let out = Projector::default().apply(&s, &batch, Some(Tz::UTC)).unwrap();
        assert_eq!(out, s);
    }

    #[test]
    fn empty_batch_returns_state_unchanged() {
        let s = state(Some("2024-01-01"), 2, 4);
        let out = Projector::default().apply(&s, &[], None).unwrap();
        assert_eq!(out, s);
    }

    #[test]
    fn zero_seq_rejects_whole_batch() {
        let s = state(Some("2024-01-01"), 3, 5);
        let snapshot = s.clone();
        let batch = [post(6, "2024-01-01T10:00:00Z"), post(0, "2024-01-01T11:00:00Z")];

        let err = Projector::default()
            .apply(&s, &batch, Some(Tz::UTC))
            .unwrap_err();

        assert!(matches!(err, ProjectionError::MalformedEvent { seq: 0, .. }));
        assert_eq!(s, snapshot);
    }

    #[test]
    fn conflicting_duplicate_is_malformed() {
        let s = state(None, 0, 0);
        let batch = [
            post(1, "2024-01-01T10:00:00Z"),
            post(1, "2024-01-03T10:00:00Z"),
        ];
        let err = Projector::default()
            .apply(&s, &batch, Some(Tz::UTC))
            .unwrap_err();
        assert!(matches!(err, ProjectionError::MalformedEvent { seq: 1, .. }));
    }

    #[test]
    fn identical_duplicates_count_once() {
        let s = state(None, 0, 0);
        let e = post(1, "2024-01-01T10:00:00Z");
        let out = Projector::default()
            .apply(&s, &[e.clone(), e.clone(), e], Some(Tz::UTC))
            .unwrap();
        assert_eq!(out, state(Some("2024-01-01"), 1, 1));
    }

    #[test]
    fn out_of_order_batch_is_sorted() {
        let s = state(None, 0, 0);
        let batch = [
            post(3, "2024-01-02T09:00:00Z"),
            post(1, "2024-01-01T09:00:00Z"),
            post(2, "2024-01-01T18:00:00Z"),
        ];
        let out = Projector::default().apply(&s, &batch, Some(Tz::UTC)).unwrap();
        assert_eq!(out, state(Some("2024-01-02"), 1, 3));
    }

    #[test]
    fn non_qualifying_events_only_advance_checkpoint() {
        let s = state(Some("2024-01-01"), 3, 5);
        let edit = Event::new(6, EVENT_POST_EDITED, at("2024-01-09T10:00:00Z"), json!({}));
        let out = Projector::default().apply(&s, &[edit], None).unwrap();
        assert_eq!(out, state(Some("2024-01-01"), 3, 6));
    }

    #[test]
    fn missing_timezone_for_qualifying_event_is_fatal() {
        let s = state(None, 0, 0);
        let err = Projector::default()
            .apply(&s, &[post(1, "2024-01-01T10:00:00Z")], None)
            .unwrap_err();
        assert!(matches!(err, ProjectionError::ClockAmbiguity(_)));
    }

    #[test]
    fn subject_timezone_decides_the_day() {
        let s = state(Some("2024-01-01"), 1, 1);
        // 2024-01-01T16:00Z is 2024-01-02 01:00 in Seoul.
        let out = Projector::default()
            .apply(&s, &[post(2, "2024-01-01T16:00:00Z")], Some(Tz::Asia__Seoul))
            .unwrap();
        assert_eq!(out, state(Some("2024-01-02"), 1, 2));
    }

    #[test]
    fn version_mismatch_is_incompatible() {
        let mut s = state(Some("2024-01-01"), 3, 5);
        s.projector_version = "phase0".to_string();

        let err = Projector::default()
            .apply(&s, &[post(6, "2024-01-01T10:00:00Z")], Some(Tz::UTC))
            .unwrap_err();

        assert_eq!(
            err,
            ProjectionError::IncompatibleState {
                found: "phase0".to_string(),
                expected: PROJECTOR_VERSION.to_string(),
            }
        );
    }

    #[test]
    fn fold_yields_a_checkpoint_per_event() {
        let s = state(None, 0, 0);
        let batch = [
            post(1, "2024-01-01T09:00:00Z"),
            Event::new(2, EVENT_POST_EDITED, at("2024-01-01T10:00:00Z"), json!({})),
            post(3, "2024-01-01T11:00:00Z"),
        ];
        let fold = Projector::default().prepare(&s, &batch, Some(Tz::UTC)).unwrap();
        assert_eq!(fold.remaining(), 3);

        let checkpoints: Vec<_> = fold.map(|st| (st.applied_seq, st.current_day_post_count)).collect();
        assert_eq!(checkpoints, vec![(1, 1), (2, 1), (3, 2)]);
    }

    #[test]
    fn resuming_from_an_intermediate_checkpoint_converges() {
        let s = state(None, 0, 0);
        let batch = [
            post(1, "2024-01-01T09:00:00Z"),
            post(2, "2024-01-01T10:00:00Z"),
            post(3, "2024-01-02T11:00:00Z"),
        ];
        let projector = Projector::default();

        let mid = projector
            .prepare(&s, &batch, Some(Tz::UTC))
            .unwrap()
            .nth(1)
            .unwrap();
        let resumed = projector.apply(&mid, &batch, Some(Tz::UTC)).unwrap();
        let direct = projector.apply(&s, &batch, Some(Tz::UTC)).unwrap();

        assert_eq!(resumed, direct);
    }

    #[test]
    fn missing_seq_reports_the_first_hole_above_the_checkpoint() {
        let projector = Projector::default();
        let at_two = state(Some("2024-01-01"), 1, 2);

        let contiguous = projector
            .prepare(&at_two, &[post(4, "2024-01-01T10:00:00Z"), post(3, "2024-01-01T09:00:00Z")], Some(Tz::UTC))
            .unwrap();
        assert_eq!(contiguous.missing_seq(), None);

        let holed = projector
            .prepare(&at_two, &[post(3, "2024-01-01T09:00:00Z"), post(6, "2024-01-01T10:00:00Z")], Some(Tz::UTC))
            .unwrap();
        assert_eq!(holed.missing_seq(), Some(4));

        let ahead = projector
            .prepare(&at_two, &[post(5, "2024-01-01T09:00:00Z")], Some(Tz::UTC))
            .unwrap();
        assert_eq!(ahead.missing_seq(), Some(3));

        let stale = projector
            .prepare(&at_two, &[post(1, "2024-01-01T08:00:00Z")], Some(Tz::UTC))
            .unwrap();
        assert_eq!(stale.missing_seq(), None);
    }
}
