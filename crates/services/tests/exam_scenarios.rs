use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use exam_core::ExamSettings;
use exam_core::model::{
    Choice, ChoiceLetter, Question, QuestionId, ScoreResult, SessionStatus, TestId, UserId,
};
use exam_core::time::fixed_now;
use services::{Clock, ExamLoopService, ProgressSyncService, TickOutcome};
use storage::repository::{
    ContentRepository, InMemoryRepository, ProgressRecord, ProgressRepository, StorageError,
};

#[derive(Default)]
struct CountingProgress {
    inner: InMemoryRepository,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl ProgressRepository for CountingProgress {
    async fn upsert_progress(&self, rows: &[ProgressRecord]) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert_progress(rows).await
    }

    async fn list_progress(
        &self,
        user_id: UserId,
        test_id: &TestId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        self.inner.list_progress(user_id, test_id).await
    }
}

#[derive(Default)]
struct FailingProgress {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl ProgressRepository for FailingProgress {
    async fn upsert_progress(&self, _rows: &[ProgressRecord]) -> Result<(), StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(StorageError::Connection("database unreachable".into()))
    }

    async fn list_progress(
        &self,
        _user_id: UserId,
        _test_id: &TestId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        Ok(Vec::new())
    }
}

fn letter(s: &str) -> ChoiceLetter {
    s.parse().unwrap()
}

fn question(id: &str, number: u32, module: u32, correct: &str) -> Question {
    let choices = ["A", "B", "C", "D"]
        .iter()
        .map(|l| Choice::new(letter(l), format!("option {l}")))
        .collect();
    Question::new(
        QuestionId::new(id),
        number,
        module,
        None,
        format!("Question {number}"),
        choices,
        letter(correct),
        None,
    )
    .unwrap()
}

fn four_questions() -> Vec<Question> {
    vec![
        question("q1", 1, 1, "A"),
        question("q2", 2, 1, "B"),
        question("q3", 3, 1, "C"),
        question("q4", 4, 1, "D"),
    ]
}

async fn content_with(questions: &[Question]) -> Arc<InMemoryRepository> {
    let repo = InMemoryRepository::new();
    repo.save_questions(&TestId::new("sat-1"), Some("Practice SAT"), questions)
        .await
        .unwrap();
    Arc::new(repo)
}

fn loop_service(
    content: Arc<InMemoryRepository>,
    progress: Arc<dyn ProgressRepository>,
    settings: ExamSettings,
) -> ExamLoopService {
    ExamLoopService::new(
        Clock::fixed(fixed_now()),
        settings,
        content,
        ProgressSyncService::new(progress),
    )
}

#[tokio::test]
async fn scenario_a_manual_submit_scores_and_syncs() {
    let progress = Arc::new(CountingProgress::default());
    let svc = loop_service(
        content_with(&four_questions()).await,
        progress.clone(),
        ExamSettings::default(),
    );
    let user = UserId::random();
    let mut session = svc.open(Some("sat-1"), Some(user)).await;
    session.start().unwrap();

    session.set_answer(&QuestionId::new("q1"), letter("A")).unwrap();
    session.set_answer(&QuestionId::new("q2"), letter("B")).unwrap();
    assert!(session.set_answer(&QuestionId::new("q3"), letter("X")).is_err());
    session.set_answer(&QuestionId::new("q4"), letter("D")).unwrap();

    let outcome = svc.submit(&mut session).await.unwrap();
    assert_eq!(
        outcome.score(),
        ScoreResult {
            correct: 3,
            total: 4,
            percentage: 75
        }
    );
    assert_eq!(session.status(), SessionStatus::Submitted);

    let rows = svc.sync().list_progress(user, &TestId::new("sat-1")).await.unwrap();
    let correct: Vec<bool> = rows.iter().map(|r| r.is_correct).collect();
    assert_eq!(correct, vec![true, true, false, true]);
    assert_eq!(rows[2].selected_answer, None);
    assert_eq!(progress.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn scenario_b_expiry_submits_partial_answers() {
    let progress = Arc::new(CountingProgress::default());
    let settings = ExamSettings::default().with_module_duration_secs(5).unwrap();
    let svc = loop_service(content_with(&four_questions()).await, progress.clone(), settings);
    let mut session = svc.open(Some("sat-1"), Some(UserId::random())).await;
    session.start().unwrap();
    session.set_answer(&QuestionId::new("q2"), letter("B")).unwrap();

    let mut outcomes = Vec::new();
    for _ in 0..5 {
        outcomes.push(svc.tick(&mut session).await);
    }

    assert!(matches!(outcomes.last(), Some(TickOutcome::Submitted(_))));
    assert_eq!(session.status(), SessionStatus::Submitted);
    assert_eq!(session.remaining_secs(), 0);
    assert_eq!(session.score().map(|s| (s.correct, s.total)), Some((1, 4)));
    assert_eq!(progress.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn double_submit_syncs_once() {
    let progress = Arc::new(CountingProgress::default());
    let settings = ExamSettings::default().with_module_duration_secs(2).unwrap();
    let svc = loop_service(content_with(&four_questions()).await, progress.clone(), settings);
    let mut session = svc.open(Some("sat-1"), Some(UserId::random())).await;
    session.start().unwrap();

    let manual = svc.submit(&mut session).await.unwrap();
    // A tick racing the manual submit finds the session already closed.
    assert_eq!(svc.tick(&mut session).await, TickOutcome::Idle);
    let again = svc.submit(&mut session).await.unwrap();

    assert!(manual.is_first());
    assert!(!again.is_first());
    assert_eq!(manual.score(), again.score());
    assert_eq!(progress.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn scenario_e_failing_sync_still_submits() {
    let progress = Arc::new(FailingProgress::default());
    let svc = loop_service(
        content_with(&four_questions()).await,
        progress.clone(),
        ExamSettings::default(),
    );
    let mut session = svc.open(Some("sat-1"), Some(UserId::random())).await;
    session.start().unwrap();
    session.set_answer(&QuestionId::new("q1"), letter("A")).unwrap();

    let outcome = svc.submit(&mut session).await.unwrap();
    assert_eq!(session.status(), SessionStatus::Submitted);
    assert_eq!(outcome.score().correct, 1);
    assert_eq!(outcome.score().percentage, 25);
    assert_eq!(progress.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn editable_review_resubmission_overwrites_progress() {
    let progress = Arc::new(CountingProgress::default());
    let settings = ExamSettings::default().with_review_editable(true);
    let svc = loop_service(content_with(&four_questions()).await, progress.clone(), settings);
    let user = UserId::random();
    let mut session = svc.open(Some("sat-1"), Some(user)).await;
    session.start().unwrap();
    session.set_answer(&QuestionId::new("q1"), letter("C")).unwrap();
    svc.submit(&mut session).await.unwrap();

    session.reopen_for_review().unwrap();
    session.set_answer(&QuestionId::new("q1"), letter("A")).unwrap();
    let outcome = svc.submit(&mut session).await.unwrap();
    assert_eq!(outcome.score().correct, 1);

    let rows = svc.sync().list_progress(user, &TestId::new("sat-1")).await.unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].selected_answer, Some(letter("A")));
    assert!(rows[0].is_correct);
    assert_eq!(progress.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn two_modules_finish_then_expire() {
    let questions = vec![
        question("rw1", 1, 1, "A"),
        question("rw2", 2, 1, "B"),
        question("m1", 1, 2, "C"),
    ];
    let progress = Arc::new(CountingProgress::default());
    let settings = ExamSettings::default().with_module_duration_secs(3).unwrap();
    let svc = loop_service(content_with(&questions).await, progress.clone(), settings);
    let mut session = svc.open(Some("sat-1"), Some(UserId::random())).await;
    session.start().unwrap();
    session.set_answer(&QuestionId::new("rw1"), letter("A")).unwrap();

    svc.finish_module(&mut session).await.unwrap();
    assert_eq!(session.module_index(), 1);
    assert_eq!(session.module_progress().total, 1);
    session.set_answer(&QuestionId::new("m1"), letter("C")).unwrap();

    for _ in 0..3 {
        svc.tick(&mut session).await;
    }
    assert_eq!(session.status(), SessionStatus::Submitted);
    assert_eq!(session.score().map(|s| s.percentage), Some(67));
    assert_eq!(progress.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn missing_content_locks_without_retry() {
    let content = Arc::new(InMemoryRepository::new());
    let svc = loop_service(
        content,
        Arc::new(CountingProgress::default()),
        ExamSettings::default(),
    );
    let mut session = svc.open(Some("sat-404"), None).await;
    assert_eq!(session.status(), SessionStatus::Locked);
    assert!(session.start().is_err());
    assert!(svc.submit(&mut session).await.is_err());
}
