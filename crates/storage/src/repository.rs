use async_trait::async_trait;
use chrono::{DateTime, Utc};
use exam_core::model::{ChoiceLetter, Question, QuestionId, TestId, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted per-question result of a submitted session.
///
/// Rows are keyed by `(user_id, test_id, question_id)`; writing the same key
/// again overwrites the previous row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub user_id: UserId,
    pub test_id: TestId,
    pub question_id: QuestionId,
    pub selected_answer: Option<ChoiceLetter>,
    pub is_correct: bool,
    pub recorded_at: DateTime<Utc>,
}

/// Content loader contract: the question set of a test.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Fetch the ordered question set for a test.
    ///
    /// Returns `Ok(None)` when the test has no uploaded content.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` for transient failures or unreadable content.
    async fn load_questions(&self, test_id: &TestId) -> Result<Option<Vec<Question>>, StorageError>;

    /// Persist or replace the question set of a test.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the content cannot be stored.
    async fn save_questions(
        &self,
        test_id: &TestId,
        test_name: Option<&str>,
        questions: &[Question],
    ) -> Result<(), StorageError>;
}

/// Progress sync contract: per-question results of submitted sessions.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Upsert rows keyed by `(user_id, test_id, question_id)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the rows cannot be stored.
    async fn upsert_progress(&self, rows: &[ProgressRecord]) -> Result<(), StorageError>;

    /// Fetch stored rows for a user and test, ordered by question id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on read failures.
    async fn list_progress(
        &self,
        user_id: UserId,
        test_id: &TestId,
    ) -> Result<Vec<ProgressRecord>, StorageError>;
}

type ProgressKey = (UserId, TestId, QuestionId);

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tests: Arc<Mutex<HashMap<TestId, Vec<Question>>>>,
    progress: Arc<Mutex<HashMap<ProgressKey, ProgressRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored progress rows across all users and tests.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the lock is poisoned.
    pub fn progress_len(&self) -> Result<usize, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.len())
    }
}

#[async_trait]
impl ContentRepository for InMemoryRepository {
    async fn load_questions(&self, test_id: &TestId) -> Result<Option<Vec<Question>>, StorageError> {
        let guard = self
            .tests
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(test_id).cloned())
    }

    async fn save_questions(
        &self,
        test_id: &TestId,
        _test_name: Option<&str>,
        questions: &[Question],
    ) -> Result<(), StorageError> {
        let mut guard = self
            .tests
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(test_id.clone(), questions.to_vec());
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn upsert_progress(&self, rows: &[ProgressRecord]) -> Result<(), StorageError> {
        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        for row in rows {
            let key = (row.user_id, row.test_id.clone(), row.question_id.clone());
            guard.insert(key, row.clone());
        }
        Ok(())
    }

    async fn list_progress(
        &self,
        user_id: UserId,
        test_id: &TestId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut rows: Vec<_> = guard
            .values()
            .filter(|r| r.user_id == user_id && &r.test_id == test_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.question_id.cmp(&b.question_id));
        Ok(rows)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub content: Arc<dyn ContentRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let content: Arc<dyn ContentRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo);
        Self { content, progress }
    }
}
