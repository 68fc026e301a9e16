use std::sync::Arc;

use chrono::{DateTime, Utc};
use exam_core::model::{TestId, UserId};
use exam_core::scoring::QuestionOutcome;
use storage::repository::{InMemoryRepository, ProgressRecord, ProgressRepository};

use crate::error::SessionError;

/// Best-effort persistence of per-question results.
///
/// Failures are logged and swallowed; a submitted session never depends on
/// the write succeeding.
#[derive(Clone)]
pub struct ProgressSyncService {
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressSyncService {
    #[must_use]
    pub fn new(progress: Arc<dyn ProgressRepository>) -> Self {
        Self { progress }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRepository::new()))
    }

    /// Build upsert rows for a submission, stamped with `recorded_at`.
    #[must_use]
    pub fn rows_for(
        user_id: UserId,
        test_id: &TestId,
        outcomes: Vec<QuestionOutcome>,
        recorded_at: DateTime<Utc>,
    ) -> Vec<ProgressRecord> {
        outcomes
            .into_iter()
            .map(|o| ProgressRecord {
                user_id,
                test_id: test_id.clone(),
                question_id: o.question_id,
                selected_answer: o.selected_answer,
                is_correct: o.is_correct,
                recorded_at,
            })
            .collect()
    }

    /// Upsert `rows`. Returns whether the write went through.
    pub async fn sync(&self, rows: &[ProgressRecord]) -> bool {
        let Some(first) = rows.first() else {
            return true;
        };
        match self.progress.upsert_progress(rows).await {
            Ok(()) => {
                tracing::info!(
                    user_id = %first.user_id,
                    test_id = %first.test_id,
                    rows = rows.len(),
                    "progress synced"
                );
                true
            }
            Err(err) => {
                tracing::warn!(
                    user_id = %first.user_id,
                    test_id = %first.test_id,
                    error = %err,
                    "progress sync failed"
                );
                false
            }
        }
    }

    /// Stored results for a user and test, ordered by question id.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` on repository failures.
    pub async fn list_progress(
        &self,
        user_id: UserId,
        test_id: &TestId,
    ) -> Result<Vec<ProgressRecord>, SessionError> {
        Ok(self.progress.list_progress(user_id, test_id).await?)
    }
}
