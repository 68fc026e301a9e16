use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::fmt;

use exam_core::model::{
    ChoiceLetter, Question, QuestionId, ScoreResult, SessionStatus, TestId, UserId,
};
use exam_core::{Clock, Countdown, ExamSettings, ItemStore, Navigator, TickEvent, scoring};
use storage::repository::ProgressRecord;

use super::progress::ModuleProgress;
use super::view::{LockReason, PaletteEntry, QuestionView, ReviewItem, SessionState};
use crate::error::SessionError;
use crate::progress_sync::ProgressSyncService;

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// Result of a submit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// This call scored the session. `progress` holds the rows to sync, or
    /// `None` when the session has no user or test id.
    Submitted {
        score: ScoreResult,
        progress: Option<Vec<ProgressRecord>>,
    },
    /// The session was already submitted; nothing was recomputed.
    AlreadySubmitted(ScoreResult),
}

impl SubmitOutcome {
    #[must_use]
    pub fn score(&self) -> ScoreResult {
        match self {
            SubmitOutcome::Submitted { score, .. } | SubmitOutcome::AlreadySubmitted(score) => {
                *score
            }
        }
    }

    /// True when this call performed the scoring.
    #[must_use]
    pub fn is_first(&self) -> bool {
        matches!(self, SubmitOutcome::Submitted { .. })
    }

    /// Rows to hand to progress sync, if any.
    #[must_use]
    pub fn into_progress(self) -> Option<Vec<ProgressRecord>> {
        match self {
            SubmitOutcome::Submitted { progress, .. } => progress,
            SubmitOutcome::AlreadySubmitted(_) => None,
        }
    }
}

/// What a countdown tick did to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not in progress; nothing changed.
    Idle,
    Running,
    /// The hidden timer was forced visible.
    Revealed,
    /// The module countdown expired and the next module began.
    ModuleAdvanced { module_index: usize },
    /// The last module expired and the session was submitted.
    Submitted(SubmitOutcome),
}

/// Result of finishing the active module early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleAdvance {
    Next { module_index: usize },
    Submitted(SubmitOutcome),
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One timed exam attempt over a fixed question set.
///
/// The session owns the item state, the per-module countdown and navigation.
/// It never schedules itself: the owner drives [`ExamSession::tick`] once per
/// second and forwards progress rows from [`SubmitOutcome`] to sync.
pub struct ExamSession {
    test_id: Option<TestId>,
    user_id: Option<UserId>,
    settings: ExamSettings,
    clock: Clock,
    status: SessionStatus,
    lock_reason: Option<LockReason>,
    questions: Vec<Question>,
    // Question indexes per module, modules in ascending module number.
    modules: Vec<Vec<usize>>,
    module_index: usize,
    items: ItemStore,
    navigator: Navigator,
    countdown: Countdown,
    score: Option<ScoreResult>,
    started_at: Option<DateTime<Utc>>,
    submitted_at: Option<DateTime<Utc>>,
}

impl ExamSession {
    /// A session waiting for its content.
    #[must_use]
    pub fn loading(
        test_id: Option<TestId>,
        user_id: Option<UserId>,
        settings: ExamSettings,
        clock: Clock,
    ) -> Self {
        let navigator = Navigator::new(0, transition_lock(&settings));
        let countdown = fresh_countdown(&settings);
        let items = ItemStore::from_questions(&[])
            .with_clear_answer_on_eliminate(settings.clear_answer_on_eliminate());
        Self {
            test_id,
            user_id,
            settings,
            clock,
            status: SessionStatus::Loading,
            lock_reason: None,
            questions: Vec::new(),
            modules: Vec::new(),
            module_index: 0,
            items,
            navigator,
            countdown,
            score: None,
            started_at: None,
            submitted_at: None,
        }
    }

    /// Build a session and attach `questions` in one step.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`ExamSession::attach_content`].
    pub fn with_questions(
        test_id: Option<TestId>,
        user_id: Option<UserId>,
        questions: Vec<Question>,
        settings: ExamSettings,
        clock: Clock,
    ) -> Result<Self, SessionError> {
        let mut session = Self::loading(test_id, user_id, settings, clock);
        session.attach_content(questions)?;
        Ok(session)
    }

    /// Deliver loaded questions. Moves `Loading` or `Locked` to `NotStarted`,
    /// or to `Locked` when there is nothing usable to run.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` once the session has content.
    pub fn attach_content(&mut self, questions: Vec<Question>) -> Result<SessionStatus, SessionError> {
        self.ensure_status("load content", &[SessionStatus::Loading, SessionStatus::Locked])?;

        if self.test_id.is_none() {
            self.lock(LockReason::MissingTestId);
            return Ok(self.status);
        }
        if questions.is_empty() {
            self.lock(LockReason::Empty);
            return Ok(self.status);
        }
        if let Some(id) = first_duplicate(&questions) {
            self.lock(LockReason::LoadFailed(format!("duplicate question id {id}")));
            return Ok(self.status);
        }

        self.modules = group_modules(&questions);
        self.items = ItemStore::from_questions(&questions)
            .with_clear_answer_on_eliminate(self.settings.clear_answer_on_eliminate());
        self.questions = questions;
        self.module_index = 0;
        self.reset_module();
        self.lock_reason = None;
        self.status = SessionStatus::NotStarted;

        tracing::info!(
            test_id = ?self.test_id,
            questions = self.questions.len(),
            modules = self.modules.len(),
            "exam content loaded"
        );
        Ok(self.status)
    }

    /// Record that no content is available. Only valid before content arrives.
    pub fn lock(&mut self, reason: LockReason) {
        if !matches!(self.status, SessionStatus::Loading | SessionStatus::Locked) {
            return;
        }
        tracing::info!(test_id = ?self.test_id, reason = reason.message(), "exam locked");
        self.lock_reason = Some(reason);
        self.status = SessionStatus::Locked;
    }

    //
    // ─── LIFECYCLE ─────────────────────────────────────────────────────────────
    //

    /// Begin the first module and its countdown.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is `NotStarted`.
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.ensure_status("start", &[SessionStatus::NotStarted])?;
        self.module_index = 0;
        self.reset_module();
        self.countdown.start();
        self.started_at = Some(self.clock.now());
        self.status = SessionStatus::InProgress;
        tracing::info!(
            test_id = ?self.test_id,
            remaining_secs = self.countdown.remaining_secs(),
            "exam started"
        );
        Ok(())
    }

    /// Score and close the session.
    ///
    /// Scoring and the status change happen together; a second call returns
    /// the cached score without rescoring. From `Reviewing` with review editing
    /// enabled the session is rescored and new progress rows are produced.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` before the session has started.
    pub fn submit(&mut self) -> Result<SubmitOutcome, SessionError> {
        match self.status {
            SessionStatus::InProgress => Ok(self.finalize()),
            SessionStatus::Reviewing if self.settings.review_editable() => Ok(self.finalize()),
            SessionStatus::Submitted | SessionStatus::Reviewing => {
                self.score
                    .map(SubmitOutcome::AlreadySubmitted)
                    .ok_or(SessionError::InvalidTransition {
                        action: "submit",
                        status: self.status,
                    })
            }
            status => Err(SessionError::InvalidTransition {
                action: "submit",
                status,
            }),
        }
    }

    /// Open a submitted session for review, starting at the first question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is `Submitted`.
    pub fn reopen_for_review(&mut self) -> Result<(), SessionError> {
        self.ensure_status("review", &[SessionStatus::Submitted])?;
        self.module_index = 0;
        self.navigator.reset_for_module(self.module_len());
        self.status = SessionStatus::Reviewing;
        Ok(())
    }

    /// Switch the module shown while reviewing. Out-of-range indexes clamp.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is `Reviewing`.
    pub fn select_review_module(&mut self, module_index: usize) -> Result<usize, SessionError> {
        self.ensure_status("switch module", &[SessionStatus::Reviewing])?;
        self.module_index = module_index.min(self.modules.len().saturating_sub(1));
        self.navigator.reset_for_module(self.module_len());
        Ok(self.module_index)
    }

    /// Discard all answers and return to the start screen.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` while loading or locked.
    pub fn restart(&mut self) -> Result<(), SessionError> {
        self.ensure_status(
            "restart",
            &[
                SessionStatus::NotStarted,
                SessionStatus::InProgress,
                SessionStatus::Submitted,
                SessionStatus::Reviewing,
            ],
        )?;
        self.items.reset();
        self.module_index = 0;
        self.reset_module();
        self.score = None;
        self.started_at = None;
        self.submitted_at = None;
        self.status = SessionStatus::NotStarted;
        tracing::info!(test_id = ?self.test_id, "exam restarted");
        Ok(())
    }

    /// End the active module early. On the last module this submits.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the session is `InProgress`.
    pub fn finish_module(&mut self) -> Result<ModuleAdvance, SessionError> {
        self.ensure_status("finish module", &[SessionStatus::InProgress])?;
        if self.has_next_module() {
            Ok(ModuleAdvance::Next {
                module_index: self.advance_module(),
            })
        } else {
            Ok(ModuleAdvance::Submitted(self.finalize()))
        }
    }

    /// Advance the active countdown by one second.
    pub fn tick(&mut self) -> TickOutcome {
        if self.status != SessionStatus::InProgress {
            return TickOutcome::Idle;
        }

        match self.countdown.tick() {
            TickEvent::Idle => TickOutcome::Idle,
            TickEvent::Running => TickOutcome::Running,
            TickEvent::Revealed => {
                tracing::debug!(
                    remaining_secs = self.countdown.remaining_secs(),
                    "timer forced visible"
                );
                TickOutcome::Revealed
            }
            TickEvent::Expired => {
                tracing::info!(module_index = self.module_index, "module time expired");
                if self.has_next_module() {
                    TickOutcome::ModuleAdvanced {
                        module_index: self.advance_module(),
                    }
                } else {
                    TickOutcome::Submitted(self.finalize())
                }
            }
        }
    }

    /// Flip timer visibility. Returns the new value.
    pub fn toggle_timer_visibility(&mut self) -> bool {
        self.countdown.toggle_visibility()
    }

    //
    // ─── ITEM MUTATIONS ────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// Returns `SessionError::NotEditable` outside an editable status, or
    /// `SessionError::Item` for unknown questions and letters.
    pub fn set_answer(&mut self, id: &QuestionId, letter: ChoiceLetter) -> Result<(), SessionError> {
        self.ensure_editable()?;
        self.items.set_answer(id, letter)?;
        Ok(())
    }

    /// Returns whether the letter is now eliminated.
    ///
    /// # Errors
    ///
    /// Same as [`ExamSession::set_answer`].
    pub fn toggle_eliminate(
        &mut self,
        id: &QuestionId,
        letter: ChoiceLetter,
    ) -> Result<bool, SessionError> {
        self.ensure_editable()?;
        Ok(self.items.toggle_eliminate(id, letter)?)
    }

    /// Returns the new flag value.
    ///
    /// # Errors
    ///
    /// Same as [`ExamSession::set_answer`].
    pub fn toggle_flag(&mut self, id: &QuestionId) -> Result<bool, SessionError> {
        self.ensure_editable()?;
        Ok(self.items.toggle_flag(id)?)
    }

    /// # Errors
    ///
    /// Same as [`ExamSession::set_answer`].
    pub fn set_note(&mut self, id: &QuestionId, note: impl Into<String>) -> Result<(), SessionError> {
        self.ensure_editable()?;
        self.items.set_note(id, note)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Same as [`ExamSession::set_answer`], plus `ItemError::EmptyHighlight`.
    pub fn add_highlight(
        &mut self,
        id: &QuestionId,
        span: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.ensure_editable()?;
        self.items.add_highlight(id, span)?;
        Ok(())
    }

    /// Returns whether the span was present.
    ///
    /// # Errors
    ///
    /// Same as [`ExamSession::set_answer`].
    pub fn remove_highlight(&mut self, id: &QuestionId, span: &str) -> Result<bool, SessionError> {
        self.ensure_editable()?;
        Ok(self.items.remove_highlight(id, span)?)
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────────
    //

    /// Jump within the active module. Returns the index applied after clamping.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless in progress or reviewing.
    pub fn navigate_to(&mut self, index: i64) -> Result<usize, SessionError> {
        self.ensure_navigable("navigate")?;
        Ok(self.navigator.navigate_to(index, self.clock.now()))
    }

    /// # Errors
    ///
    /// Same as [`ExamSession::navigate_to`].
    pub fn next(&mut self) -> Result<usize, SessionError> {
        self.ensure_navigable("navigate")?;
        Ok(self.navigator.next(self.clock.now()))
    }

    /// # Errors
    ///
    /// Same as [`ExamSession::navigate_to`].
    pub fn previous(&mut self) -> Result<usize, SessionError> {
        self.ensure_navigable("navigate")?;
        Ok(self.navigator.previous(self.clock.now()))
    }

    //
    // ─── READ ACCESSORS ────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn lock_reason(&self) -> Option<&LockReason> {
        self.lock_reason.as_ref()
    }

    #[must_use]
    pub fn test_id(&self) -> Option<&TestId> {
        self.test_id.as_ref()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    #[must_use]
    pub fn settings(&self) -> &ExamSettings {
        &self.settings
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn items(&self) -> &ItemStore {
        &self.items
    }

    #[must_use]
    pub fn score(&self) -> Option<ScoreResult> {
        self.score
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.countdown.remaining_secs()
    }

    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn module_index(&self) -> usize {
        self.module_index
    }

    #[must_use]
    pub fn question_index(&self) -> usize {
        self.navigator.index()
    }

    /// If the session clock is fixed, move it forward. Used by tests and replays.
    pub fn advance_clock(&mut self, delta: Duration) {
        self.clock.advance(delta);
    }

    /// Questions of the active module in load order.
    #[must_use]
    pub fn module_questions(&self) -> Vec<&Question> {
        self.modules
            .get(self.module_index)
            .map(|indexes| indexes.iter().filter_map(|&i| self.questions.get(i)).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        let index = *self
            .modules
            .get(self.module_index)?
            .get(self.navigator.index())?;
        self.questions.get(index)
    }

    /// The current question with item state folded in. Correct answers are
    /// only included once the session has been submitted.
    #[must_use]
    pub fn current_view(&self) -> Option<QuestionView> {
        let question = self.current_question()?;
        let state = self.items.get(question.id())?;
        Some(QuestionView::build(question, state, self.status.is_finished()))
    }

    #[must_use]
    pub fn palette(&self) -> Vec<PaletteEntry> {
        let current = self.navigator.index();
        self.module_questions()
            .into_iter()
            .enumerate()
            .filter_map(|(index, q)| {
                Some(PaletteEntry {
                    index,
                    number: q.number(),
                    status: self.items.status(q.id())?,
                    is_current: index == current,
                })
            })
            .collect()
    }

    #[must_use]
    pub fn module_progress(&self) -> ModuleProgress {
        let questions = self.module_questions();
        let mut answered = 0;
        let mut flagged = 0;
        for q in &questions {
            if let Some(state) = self.items.get(q.id()) {
                answered += usize::from(state.is_answered());
                flagged += usize::from(state.flagged);
            }
        }
        ModuleProgress {
            module_index: self.module_index,
            module_count: self.modules.len(),
            answered,
            flagged,
            total: questions.len(),
        }
    }

    /// Per-question results across all modules. Empty until submitted.
    #[must_use]
    pub fn review_items(&self) -> Vec<ReviewItem> {
        if !self.status.is_finished() {
            return Vec::new();
        }
        self.questions
            .iter()
            .filter_map(|q| Some(ReviewItem::build(q, self.items.get(q.id())?)))
            .collect()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState {
            status: self.status,
            module_index: self.module_index,
            module_count: self.modules.len(),
            question_index: self.navigator.index(),
            remaining_secs: self.countdown.remaining_secs(),
            timer_visible: self.countdown.is_visible(),
            timer_warning: self.countdown.is_warning(),
            transitioning: self.navigator.is_transitioning(self.clock.now()),
        }
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    fn ensure_status(
        &self,
        action: &'static str,
        allowed: &[SessionStatus],
    ) -> Result<(), SessionError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(SessionError::InvalidTransition {
                action,
                status: self.status,
            })
        }
    }

    fn ensure_editable(&self) -> Result<(), SessionError> {
        match self.status {
            SessionStatus::InProgress => Ok(()),
            SessionStatus::Reviewing if self.settings.review_editable() => Ok(()),
            status => Err(SessionError::NotEditable { status }),
        }
    }

    fn ensure_navigable(&self, action: &'static str) -> Result<(), SessionError> {
        self.ensure_status(action, &[SessionStatus::InProgress, SessionStatus::Reviewing])
    }

    fn module_len(&self) -> usize {
        self.modules.get(self.module_index).map_or(0, Vec::len)
    }

    fn has_next_module(&self) -> bool {
        self.module_index + 1 < self.modules.len()
    }

    /// Point navigation at the active module and give it a fresh countdown.
    fn reset_module(&mut self) {
        self.navigator.reset_for_module(self.module_len());
        self.countdown = fresh_countdown(&self.settings);
    }

    fn advance_module(&mut self) -> usize {
        self.module_index += 1;
        self.reset_module();
        self.countdown.start();
        tracing::info!(
            module_index = self.module_index,
            module_count = self.modules.len(),
            "next module started"
        );
        self.module_index
    }

    fn finalize(&mut self) -> SubmitOutcome {
        let score = scoring::compute(&self.items, &self.questions);
        let now = self.clock.now();
        self.countdown.stop();
        self.score = Some(score);
        self.submitted_at = Some(now);
        self.status = SessionStatus::Submitted;

        let progress = match (self.user_id, &self.test_id) {
            (Some(user_id), Some(test_id)) => Some(ProgressSyncService::rows_for(
                user_id,
                test_id,
                scoring::outcomes(&self.items, &self.questions),
                now,
            )),
            _ => None,
        };

        tracing::info!(test_id = ?self.test_id, %score, "exam submitted");
        SubmitOutcome::Submitted { score, progress }
    }
}

impl fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamSession")
            .field("test_id", &self.test_id)
            .field("status", &self.status)
            .field("questions_len", &self.questions.len())
            .field("module_index", &self.module_index)
            .field("question_index", &self.navigator.index())
            .field("remaining_secs", &self.countdown.remaining_secs())
            .field("score", &self.score)
            .finish_non_exhaustive()
    }
}

fn transition_lock(settings: &ExamSettings) -> Duration {
    Duration::milliseconds(i64::from(settings.transition_lock_ms()))
}

fn fresh_countdown(settings: &ExamSettings) -> Countdown {
    Countdown::new(
        settings.module_duration_secs(),
        settings.warning_threshold_secs(),
    )
}

fn group_modules(questions: &[Question]) -> Vec<Vec<usize>> {
    let mut numbers: Vec<u32> = questions.iter().map(Question::module).collect();
    numbers.sort_unstable();
    numbers.dedup();
    numbers
        .into_iter()
        .map(|module| {
            questions
                .iter()
                .enumerate()
                .filter(|(_, q)| q.module() == module)
                .map(|(i, _)| i)
                .collect()
        })
        .collect()
}

fn first_duplicate(questions: &[Question]) -> Option<&QuestionId> {
    let mut seen = HashSet::new();
    questions.iter().map(Question::id).find(|id| !seen.insert(*id))
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
