use std::sync::Arc;

use exam_core::ExamSettings;
use exam_core::model::{TestId, UserId};
use storage::repository::ContentRepository;

use super::service::{ExamSession, ModuleAdvance, SubmitOutcome, TickOutcome};
use super::view::LockReason;
use crate::Clock;
use crate::error::SessionError;
use crate::progress_sync::ProgressSyncService;

/// Orchestrates content loading and persisted submission.
///
/// Each method that can submit awaits progress sync before returning; sync
/// failures are logged and never change the outcome.
#[derive(Clone)]
pub struct ExamLoopService {
    clock: Clock,
    settings: ExamSettings,
    content: Arc<dyn ContentRepository>,
    sync: ProgressSyncService,
}

impl ExamLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        settings: ExamSettings,
        content: Arc<dyn ContentRepository>,
        sync: ProgressSyncService,
    ) -> Self {
        Self {
            clock,
            settings,
            content,
            sync,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ExamSettings {
        &self.settings
    }

    #[must_use]
    pub fn sync(&self) -> &ProgressSyncService {
        &self.sync
    }

    /// Load content for the test named by the host parameter.
    ///
    /// Never fails: a blank parameter, missing or empty content, or a loader
    /// error all produce a `Locked` session with the matching reason.
    pub async fn open(&self, test_param: Option<&str>, user_id: Option<UserId>) -> ExamSession {
        let test_id = TestId::from_param(test_param);
        let mut session = ExamSession::loading(test_id.clone(), user_id, self.settings.clone(), self.clock);

        let Some(test_id) = test_id else {
            session.lock(LockReason::MissingTestId);
            return session;
        };

        match self.content.load_questions(&test_id).await {
            Ok(Some(questions)) => {
                if let Err(err) = session.attach_content(questions) {
                    session.lock(LockReason::LoadFailed(err.to_string()));
                }
            }
            Ok(None) => session.lock(LockReason::NotFound),
            Err(err) => {
                tracing::warn!(test_id = %test_id, error = %err, "content load failed");
                session.lock(LockReason::LoadFailed(err.to_string()));
            }
        }
        session
    }

    /// Submit and sync.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` if the session has not started.
    pub async fn submit(&self, session: &mut ExamSession) -> Result<SubmitOutcome, SessionError> {
        let outcome = session.submit()?;
        self.dispatch(&outcome).await;
        Ok(outcome)
    }

    /// Finish the active module, syncing if that submitted the session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is in progress.
    pub async fn finish_module(
        &self,
        session: &mut ExamSession,
    ) -> Result<ModuleAdvance, SessionError> {
        let advance = session.finish_module()?;
        if let ModuleAdvance::Submitted(outcome) = &advance {
            self.dispatch(outcome).await;
        }
        Ok(advance)
    }

    /// Tick once, syncing if expiry submitted the session.
    pub async fn tick(&self, session: &mut ExamSession) -> TickOutcome {
        let outcome = session.tick();
        if let TickOutcome::Submitted(submitted) = &outcome {
            self.dispatch(submitted).await;
        }
        outcome
    }

    async fn dispatch(&self, outcome: &SubmitOutcome) {
        match outcome {
            SubmitOutcome::Submitted {
                progress: Some(rows),
                ..
            } => {
                self.sync.sync(rows).await;
            }
            SubmitOutcome::Submitted { progress: None, .. } => {
                tracing::debug!("anonymous submission, progress sync skipped");
            }
            SubmitOutcome::AlreadySubmitted(_) => {}
        }
    }
}
