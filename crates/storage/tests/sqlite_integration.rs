use chrono::Duration;
use exam_core::model::{Choice, ChoiceLetter, Question, QuestionId, TestId, UserId};
use exam_core::time::fixed_now;
use storage::repository::{ContentRepository, ProgressRecord, ProgressRepository, Storage};
use storage::sqlite::SqliteRepository;

fn letter(s: &str) -> ChoiceLetter {
    s.parse().unwrap()
}

fn question(id: &str, number: u32, module: u32, correct: &str) -> Question {
    let choices = ["A", "B", "C", "D"]
        .iter()
        .map(|l| Choice::new(letter(l), format!("choice {l}")))
        .collect();
    Question::new(
        QuestionId::new(id),
        number,
        module,
        Some("Passage".into()),
        format!("Prompt {number}"),
        choices,
        letter(correct),
        None,
    )
    .unwrap()
}

fn record(user: UserId, question: &str, selected: Option<&str>, correct: bool) -> ProgressRecord {
    ProgressRecord {
        user_id: user,
        test_id: TestId::new("t1"),
        question_id: QuestionId::new(question),
        selected_answer: selected.map(letter),
        is_correct: correct,
        recorded_at: fixed_now(),
    }
}

#[tokio::test]
async fn sqlite_questions_round_trip_in_order() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_questions?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let test_id = TestId::new("t1");
    assert!(repo.load_questions(&test_id).await.unwrap().is_none());

    let questions = vec![question("q2", 1, 1, "B"), question("q1", 2, 2, "D")];
    repo.save_questions(&test_id, Some("Practice"), &questions)
        .await
        .unwrap();

    let loaded = repo.load_questions(&test_id).await.unwrap().unwrap();
    assert_eq!(loaded, questions);
    assert_eq!(loaded[0].passage(), Some("Passage"));

    // Re-saving replaces the set.
    repo.save_questions(&test_id, None, &questions[..1]).await.unwrap();
    let loaded = repo.load_questions(&test_id).await.unwrap().unwrap();
    assert_eq!(loaded.len(), 1);
}

#[tokio::test]
async fn sqlite_progress_upsert_overwrites_rows() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_progress?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let user = UserId::random();
    repo.upsert_progress(&[
        record(user, "q1", Some("A"), true),
        record(user, "q2", None, false),
    ])
    .await
    .unwrap();

    let mut again = record(user, "q1", Some("C"), false);
    again.recorded_at = fixed_now() + Duration::minutes(5);
    repo.upsert_progress(&[again]).await.unwrap();

    let rows = repo.list_progress(user, &TestId::new("t1")).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].question_id, QuestionId::new("q1"));
    assert_eq!(rows[0].selected_answer, Some(letter("C")));
    assert!(!rows[0].is_correct);
    assert_eq!(rows[0].recorded_at, fixed_now() + Duration::minutes(5));
    assert_eq!(rows[1].selected_answer, None);

    let other = repo.list_progress(UserId::random(), &TestId::new("t1")).await.unwrap();
    assert!(other.is_empty());
}

#[tokio::test]
async fn migrate_is_idempotent() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");
}

#[tokio::test]
async fn storage_sqlite_wires_both_repositories() {
    let storage = Storage::sqlite("sqlite:file:memdb_storage?mode=memory&cache=shared")
        .await
        .expect("storage");
    let test_id = TestId::new("t1");
    storage
        .content
        .save_questions(&test_id, None, &[question("q1", 1, 1, "A")])
        .await
        .unwrap();
    let loaded = storage.content.load_questions(&test_id).await.unwrap();
    assert_eq!(loaded.map(|q| q.len()), Some(1));

    let user = UserId::random();
    storage
        .progress
        .upsert_progress(&[record(user, "q1", Some("A"), true)])
        .await
        .unwrap();
    assert_eq!(storage.progress.list_progress(user, &test_id).await.unwrap().len(), 1);
}
