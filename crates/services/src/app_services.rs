use std::sync::Arc;

use exam_core::ExamSettings;
use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::progress_sync::ProgressSyncService;
use crate::sessions::ExamLoopService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    exam_loop: Arc<ExamLoopService>,
    progress_sync: ProgressSyncService,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or the
    /// settings are out of range.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        settings: ExamSettings,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Self::from_storage(storage, clock, settings)
    }

    /// Build services over in-memory repositories.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError::Settings` if the settings are out of range.
    pub fn in_memory(clock: Clock, settings: ExamSettings) -> Result<Self, AppServicesError> {
        Self::from_storage(Storage::in_memory(), clock, settings)
    }

    fn from_storage(
        storage: Storage,
        clock: Clock,
        settings: ExamSettings,
    ) -> Result<Self, AppServicesError> {
        settings.validate()?;
        let progress_sync = ProgressSyncService::new(Arc::clone(&storage.progress));
        let exam_loop = Arc::new(ExamLoopService::new(
            clock,
            settings,
            Arc::clone(&storage.content),
            progress_sync.clone(),
        ));
        Ok(Self {
            storage,
            exam_loop,
            progress_sync,
        })
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn exam_loop(&self) -> Arc<ExamLoopService> {
        Arc::clone(&self.exam_loop)
    }

    #[must_use]
    pub fn progress_sync(&self) -> ProgressSyncService {
        self.progress_sync.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::model::{Choice, ChoiceLetter, Question, QuestionId, TestId, UserId};
    use exam_core::time::fixed_clock;
    use storage::repository::ContentRepository;

    #[tokio::test]
    async fn in_memory_wiring_shares_one_store() {
        let services = AppServices::in_memory(fixed_clock(), ExamSettings::default()).unwrap();
        let a: ChoiceLetter = "A".parse().unwrap();
        let question = Question::new(
            QuestionId::new("q1"),
            1,
            1,
            None,
            "Prompt",
            vec![Choice::new(a, "a")],
            a,
            None,
        )
        .unwrap();
        services
            .storage()
            .content
            .save_questions(&TestId::new("t1"), None, &[question])
            .await
            .unwrap();

        let user = UserId::random();
        let exam_loop = services.exam_loop();
        let mut session = exam_loop.open(Some("t1"), Some(user)).await;
        session.start().unwrap();
        session.set_answer(&QuestionId::new("q1"), a).unwrap();
        exam_loop.submit(&mut session).await.unwrap();

        let rows = services
            .progress_sync()
            .list_progress(user, &TestId::new("t1"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_correct);
    }
}
