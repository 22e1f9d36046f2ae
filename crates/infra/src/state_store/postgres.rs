//! Postgres-backed projection state store.
//!
//! Schema: `migrations/0001_stream_projections.sql`. One row per subject.
//!
//! ## Conditional writes
//!
//! | expected | statement | succeeds when |
//! |---|---|---|
//! | `Exact(n)`, n > 0 | `UPDATE ... WHERE applied_seq = n` | row exists at checkpoint `n` |
//! | `Exact(0)` | `INSERT ... ON CONFLICT DO UPDATE ... WHERE applied_seq = 0` | no row, or a row still at 0 |
//! | `Any` | `INSERT ... ON CONFLICT DO UPDATE ... WHERE applied_seq <= new` | checkpoint does not regress |
//!
//! Zero affected rows means another writer got there first (or the write would
//! regress), reported as `StateStoreError::Conflict` with the currently stored value.
//!
//! ## Sync facade
//!
//! `StateStore` is synchronous like the rest of the projection pipeline. The trait impl
//! drives the async methods on the ambient tokio runtime with `block_in_place`, so it
//! must be called from a multi-threaded runtime worker (or any thread with a runtime
//! handle entered).

use std::sync::Arc;

use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use tracing::{debug, instrument};

use streakproj_core::{ExpectedVersion, SubjectId};
use streakproj_projector::{DayKey, ProjectionState};

use super::r#trait::{StateStore, StateStoreError};

/// Postgres-backed state store.
#[derive(Debug, Clone)]
pub struct PostgresStateStore {
    pool: Arc<PgPool>,
}

impl PostgresStateStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect using a database URL (e.g. `ProjectorConfig::database_url`).
    pub async fn connect(database_url: &str) -> Result<Self, StateStoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    #[instrument(skip(self), fields(subject_id = %subject_id), err)]
    pub async fn load_state(
        &self,
        subject_id: SubjectId,
    ) -> Result<Option<ProjectionState>, StateStoreError> {
        let row = sqlx::query(
            r#"
            SELECT last_contribution_date, current_day_post_count, applied_seq, projector_version
            FROM stream_projections
            WHERE subject_id = $1
            "#,
        )
        .bind(subject_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_state", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let read = |e: sqlx::Error| StateStoreError::Corrupt(format!("failed to read row: {e}"));
        let state = state_from_columns(
            row.try_get("last_contribution_date").map_err(read)?,
            row.try_get("current_day_post_count").map_err(read)?,
            row.try_get("applied_seq").map_err(read)?,
            row.try_get("projector_version").map_err(read)?,
        )?;
        Ok(Some(state))
    }

    #[instrument(skip(self, state), fields(subject_id = %subject_id, applied_seq = state.applied_seq), err)]
    pub async fn save_state(
        &self,
        subject_id: SubjectId,
        state: &ProjectionState,
        expected: ExpectedVersion,
    ) -> Result<(), StateStoreError> {
        let date: Option<NaiveDate> = state.last_contribution_date.map(|d| d.date());
        let count = i32::try_from(state.current_day_post_count)
            .map_err(|_| StateStoreError::Storage("current_day_post_count overflows INT".to_string()))?;
        let applied = i64::try_from(state.applied_seq)
            .map_err(|_| StateStoreError::Storage("applied_seq overflows BIGINT".to_string()))?;

        let query = match expected {
            ExpectedVersion::Exact(n) if n > 0 => {
                let n = i64::try_from(n)
                    .map_err(|_| StateStoreError::Storage("expected seq overflows BIGINT".to_string()))?;
                sqlx::query(
                    r#"
                    UPDATE stream_projections
                    SET last_contribution_date = $2,
                        current_day_post_count = $3,
                        applied_seq = $4,
                        projector_version = $5,
                        updated_at = NOW()
                    WHERE subject_id = $1 AND applied_seq = $6 AND applied_seq <= $4
                    "#,
                )
                .bind(subject_id.as_uuid())
                .bind(date)
                .bind(count)
                .bind(applied)
                .bind(&state.projector_version)
                .bind(n)
            }
            ExpectedVersion::Exact(_) => sqlx::query(
                r#"
                INSERT INTO stream_projections (
                    subject_id, last_contribution_date, current_day_post_count,
                    applied_seq, projector_version
                )
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (subject_id) DO UPDATE SET
                    last_contribution_date = EXCLUDED.last_contribution_date,
                    current_day_post_count = EXCLUDED.current_day_post_count,
                    applied_seq = EXCLUDED.applied_seq,
                    projector_version = EXCLUDED.projector_version,
                    updated_at = NOW()
                WHERE stream_projections.applied_seq = 0
                "#,
            )
            .bind(subject_id.as_uuid())
            .bind(date)
            .bind(count)
            .bind(applied)
            .bind(&state.projector_version),
            ExpectedVersion::Any => sqlx::query(
                r#"
                INSERT INTO stream_projections (
                    subject_id, last_contribution_date, current_day_post_count,
                    applied_seq, projector_version
                )
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (subject_id) DO UPDATE SET
                    last_contribution_date = EXCLUDED.last_contribution_date,
                    current_day_post_count = EXCLUDED.current_day_post_count,
                    applied_seq = EXCLUDED.applied_seq,
                    projector_version = EXCLUDED.projector_version,
                    updated_at = NOW()
                WHERE stream_projections.applied_seq <= EXCLUDED.applied_seq
                "#,
            )
            .bind(subject_id.as_uuid())
            .bind(date)
            .bind(count)
            .bind(applied)
            .bind(&state.projector_version),
        };

        let result = query
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("save_state", e))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let actual = self
            .load_state(subject_id)
            .await?
            .map(|s| s.applied_seq)
            .unwrap_or(0);
        debug!(actual, ?expected, "conditional write rejected");

        if expected.matches(actual) {
            Err(StateStoreError::Regression {
                subject_id,
                stored: actual,
                attempted: state.applied_seq,
            })
        } else {
            Err(StateStoreError::Conflict {
                subject_id,
                expected,
                actual,
            })
        }
    }

    #[instrument(skip(self), fields(subject_id = %subject_id), err)]
    pub async fn erase_state(&self, subject_id: SubjectId) -> Result<bool, StateStoreError> {
        let result = sqlx::query("DELETE FROM stream_projections WHERE subject_id = $1")
            .bind(subject_id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("erase_state", e))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_subjects(&self) -> Result<Vec<SubjectId>, StateStoreError> {
        let rows = sqlx::query("SELECT subject_id FROM stream_projections ORDER BY subject_id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_subjects", e))?;

        rows.iter()
            .map(|row| {
                row.try_get::<uuid::Uuid, _>("subject_id")
                    .map(SubjectId::from_uuid)
                    .map_err(|e| StateStoreError::Corrupt(format!("failed to read subject_id: {e}")))
            })
            .collect()
    }
}

fn block_on<F, T>(fut: F) -> Result<T, StateStoreError>
where
    F: std::future::Future<Output = Result<T, StateStoreError>>,
{
    let handle = tokio::runtime::Handle::try_current().map_err(|_| {
        StateStoreError::Storage(
            "PostgresStateStore requires a tokio runtime; call it from within a runtime context"
                .to_string(),
        )
    })?;
    tokio::task::block_in_place(|| handle.block_on(fut))
}

impl StateStore for PostgresStateStore {
    fn load(&self, subject_id: SubjectId) -> Result<Option<ProjectionState>, StateStoreError> {
        block_on(self.load_state(subject_id))
    }

    fn save(
        &self,
        subject_id: SubjectId,
        state: &ProjectionState,
        expected: ExpectedVersion,
    ) -> Result<(), StateStoreError> {
        block_on(self.save_state(subject_id, state, expected))
    }

    fn erase(&self, subject_id: SubjectId) -> Result<bool, StateStoreError> {
        block_on(self.erase_state(subject_id))
    }

    fn subjects(&self) -> Result<Vec<SubjectId>, StateStoreError> {
        block_on(self.list_subjects())
    }
}

/// Map stored columns back to a state, rejecting values no fold can produce.
fn state_from_columns(
    last_contribution_date: Option<NaiveDate>,
    current_day_post_count: i32,
    applied_seq: i64,
    projector_version: String,
) -> Result<ProjectionState, StateStoreError> {
    let current_day_post_count = u32::try_from(current_day_post_count).map_err(|_| {
        StateStoreError::Corrupt(format!(
            "negative current_day_post_count: {current_day_post_count}"
        ))
    })?;
    let applied_seq = u64::try_from(applied_seq)
        .map_err(|_| StateStoreError::Corrupt(format!("negative applied_seq: {applied_seq}")))?;

    if last_contribution_date.is_none() && current_day_post_count != 0 {
        return Err(StateStoreError::Corrupt(
            "post count without a contribution date".to_string(),
        ));
    }

    Ok(ProjectionState {
        last_contribution_date: last_contribution_date.map(DayKey::from_date),
        current_day_post_count,
        applied_seq,
        projector_version,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StateStoreError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23514") => {
            StateStoreError::Corrupt(format!("{operation}: check constraint violated: {db}"))
        }
        _ => StateStoreError::Storage(format!("{operation}: {err}")),
    }
}
