//! Load → fold → conditional write, per subject.
//!
//! The projector itself is pure; this service performs the I/O around it:
//!
//! 1. load the subject's stored state (or the zero value)
//! 2. resolve the subject's timezone
//! 3. fold the batch, first filling any sequence gap above the checkpoint from the log
//! 4. persist with `ExpectedVersion::Exact(loaded.applied_seq)`
//!
//! Step 3 keeps the checkpoint contiguous: a batch that starts above
//! `applied_seq + 1` (the bus does not order deliveries) is completed from the event
//! log, and if the log cannot supply the missing events the batch is refused with
//! `ServiceError::SequenceGap` and nothing is written.
//!
//! Step 4 is what serializes concurrent writers of one subject: whoever persists second
//! gets `StateStoreError::Conflict` and must reload. The service never retries on its
//! own; that is left to the orchestration (a worker, a job, a redelivery).

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use streakproj_core::{ExpectedVersion, SubjectId};
use streakproj_events::{Event, SubjectEvent};
use streakproj_projector::{ProjectionError, ProjectionState, Projector, Tz, parse_timezone};

use crate::config::ProjectorConfig;
use crate::event_log::{EventLog, EventLogError};
use crate::state_store::{StateStore, StateStoreError};
use crate::timezones::{TimezoneError, TimezoneRegistry};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Store(#[from] StateStoreError),

    #[error(transparent)]
    Log(#[from] EventLogError),

    #[error(transparent)]
    Timezone(#[from] TimezoneError),

    #[error("subject {subject_id} is missing seq {missing}; batch not applied")]
    SequenceGap { subject_id: SubjectId, missing: u64 },
}

/// Projection pipeline for any number of subjects.
///
/// Safe to share across threads (`Arc<ProjectionService<..>>`); subjects are independent
/// and a subject's writes are serialized by the store's conditional write.
#[derive(Debug)]
pub struct ProjectionService<L, S, Z> {
    log: L,
    store: S,
    timezones: Z,
    projector: Projector,
    default_timezone: Option<Tz>,
    checkpoint_interval: u32,
}

impl<L, S, Z> ProjectionService<L, S, Z>
where
    L: EventLog,
    S: StateStore,
    Z: TimezoneRegistry,
{
    pub fn new(log: L, store: S, timezones: Z, config: &ProjectorConfig) -> Self {
        Self {
            log,
            store,
            timezones,
            projector: Projector::new(config.qualifying_policy()),
            default_timezone: config.default_timezone,
            checkpoint_interval: config.checkpoint_interval,
        }
    }

    /// Replace the fold logic (e.g. after a version bump).
    pub fn with_projector(mut self, projector: Projector) -> Self {
        self.projector = projector;
        self
    }

    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current stored state of a subject.
    pub fn state(&self, subject_id: SubjectId) -> Result<Option<ProjectionState>, ServiceError> {
        Ok(self.store.load(subject_id)?)
    }

    /// Fold `events` into the subject's stored state and persist the result.
    ///
    /// Returns the stored state unchanged (without writing) when nothing new was folded.
    #[instrument(skip(self, events), fields(subject_id = %subject_id, batch = events.len()), err)]
    pub fn project(
        &self,
        subject_id: SubjectId,
        events: &[Event],
    ) -> Result<ProjectionState, ServiceError> {
        let loaded = self
            .store
            .load(subject_id)?
            .unwrap_or_else(|| self.projector.zero_state());
        let tz = self.timezone_for(subject_id)?;

        let mut fold = self.projector.prepare(&loaded, events, tz)?;
        if let Some(missing) = fold.missing_seq() {
            let mut filled: Vec<Event> = self
                .log
                .load_after(subject_id, loaded.applied_seq)?
                .into_iter()
                .map(SubjectEvent::into_event)
                .collect();
            filled.extend_from_slice(events);
            debug!(missing, from_log = filled.len() - events.len(), "filling sequence gap from the event log");

            fold = self.projector.prepare(&loaded, &filled, tz)?;
            if let Some(missing) = fold.missing_seq() {
                warn!(missing, applied_seq = loaded.applied_seq, "sequence gap the log cannot fill; batch held back");
                return Err(ServiceError::SequenceGap {
                    subject_id,
                    missing,
                });
            }
        }

        if fold.remaining() == 0 {
            debug!(applied_seq = loaded.applied_seq, "nothing new to fold");
            return Ok(loaded);
        }

        let mut expected = ExpectedVersion::Exact(loaded.applied_seq);

        if self.checkpoint_interval > 0 {
            let interval = self.checkpoint_interval as usize;
            let mut since_checkpoint = 0usize;
            while fold.remaining() > 1 {
                let Some(step) = fold.next() else { break };
                since_checkpoint += 1;
                if since_checkpoint == interval {
                    self.store.save(subject_id, &step, expected)?;
                    debug!(applied_seq = step.applied_seq, "intermediate checkpoint");
                    expected = ExpectedVersion::Exact(step.applied_seq);
                    since_checkpoint = 0;
                }
            }
        }

        let projected = fold.finish();
        self.store.save(subject_id, &projected, expected)?;

        info!(
            from_seq = loaded.applied_seq,
            to_seq = projected.applied_seq,
            last_contribution_date = ?projected.last_contribution_date,
            current_day_post_count = projected.current_day_post_count,
            "projection advanced"
        );
        Ok(projected)
    }

    /// Handle a single delivered message (worker entry point).
    ///
    /// A message that arrives ahead of its predecessors folds them from the log too.
    pub fn handle(&self, message: SubjectEvent) -> Result<ProjectionState, ServiceError> {
        let subject_id = message.subject_id();
        self.project(subject_id, &[message.into_event()])
    }

    /// Fold whatever the event log holds after the stored checkpoint.
    #[instrument(skip(self), fields(subject_id = %subject_id), err)]
    pub fn catch_up(&self, subject_id: SubjectId) -> Result<ProjectionState, ServiceError> {
        let checkpoint = self
            .store
            .load(subject_id)?
            .map(|s| s.applied_seq)
            .unwrap_or(0);

        let events: Vec<Event> = self
            .log
            .load_after(subject_id, checkpoint)?
            .into_iter()
            .map(SubjectEvent::into_event)
            .collect();

        self.project(subject_id, &events)
    }

    /// Rebuild a subject's state from its full history with the current fold logic.
    ///
    /// This is the explicit migration path for states refused with
    /// `ProjectionError::IncompatibleState`. The stored state is replaced only if no
    /// other writer moved its checkpoint during the rebuild. A stored state that cannot
    /// be read at all (`StateStoreError::Corrupt`) is replaced unconditionally.
    #[instrument(skip(self), fields(subject_id = %subject_id), err)]
    pub fn rebuild(&self, subject_id: SubjectId) -> Result<ProjectionState, ServiceError> {
        let (stale, expected) = match self.store.load(subject_id) {
            Ok(stale) => {
                let seq = stale.as_ref().map(|s| s.applied_seq).unwrap_or(0);
                (stale, ExpectedVersion::Exact(seq))
            }
            Err(StateStoreError::Corrupt(reason)) => {
                warn!(%reason, "stored state is unreadable; replacing it");
                (None, ExpectedVersion::Any)
            }
            Err(err) => return Err(err.into()),
        };

        let history: Vec<Event> = self
            .log
            .load_stream(subject_id)?
            .into_iter()
            .map(SubjectEvent::into_event)
            .collect();
        let tz = self.timezone_for(subject_id)?;

        let rebuilt = self
            .projector
            .apply(&self.projector.zero_state(), &history, tz)?;
        self.store.save(subject_id, &rebuilt, expected)?;

        info!(
            previous_version = stale.as_ref().map(|s| s.projector_version.as_str()),
            version = self.projector.version(),
            applied_seq = rebuilt.applied_seq,
            "projection rebuilt"
        );
        Ok(rebuilt)
    }

    /// Rebuild every stored state written by another projector version, or unreadable.
    ///
    /// Returns the rebuilt subjects. Stops at the first failure; states rebuilt before
    /// it stay rebuilt, so the call can simply be repeated.
    #[instrument(skip(self), err)]
    pub fn rebuild_stale(&self) -> Result<Vec<SubjectId>, ServiceError> {
        let mut rebuilt = Vec::new();

        for subject_id in self.store.subjects()? {
            let stale = match self.store.load(subject_id) {
                Ok(Some(state)) => state.projector_version != self.projector.version(),
                Ok(None) => false,
                Err(StateStoreError::Corrupt(_)) => true,
                Err(err) => return Err(err.into()),
            };
            if stale {
                self.rebuild(subject_id)?;
                rebuilt.push(subject_id);
            }
        }

        info!(count = rebuilt.len(), version = self.projector.version(), "stale projections rebuilt");
        Ok(rebuilt)
    }

    /// Subject-data erasure.
    pub fn erase(&self, subject_id: SubjectId) -> Result<bool, ServiceError> {
        Ok(self.store.erase(subject_id)?)
    }

    fn timezone_for(&self, subject_id: SubjectId) -> Result<Option<Tz>, ServiceError> {
        match self.timezones.timezone_of(subject_id)? {
            Some(name) => {
                let tz = parse_timezone(&name).inspect_err(|e| {
                    warn!(subject_id = %subject_id, error = %e, "subject timezone is invalid");
                })?;
                Ok(Some(tz))
            }
            None => Ok(self.default_timezone),
        }
    }
}
