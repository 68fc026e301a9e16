use exam_core::model::{ChoiceLetter, Question, QuestionId, QuestionRecord, TestId, UserId};
use sqlx::Row;

use crate::repository::{ProgressRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn letter_from_db(value: Option<String>) -> Result<Option<ChoiceLetter>, StorageError> {
    value
        .map(|raw| {
            raw.parse::<ChoiceLetter>()
                .map_err(|_| StorageError::Serialization(format!("invalid letter: {raw}")))
        })
        .transpose()
}

pub(crate) fn letter_to_db(value: Option<ChoiceLetter>) -> Option<String> {
    value.map(|l| l.to_string())
}

pub(crate) fn user_id_from_db(raw: &str) -> Result<UserId, StorageError> {
    raw.parse()
        .map_err(|_| StorageError::Serialization(format!("invalid user_id: {raw}")))
}

/// Encodes questions as the JSON array stored in `test_resources.questions`.
pub(crate) fn questions_to_json(questions: &[Question]) -> Result<String, StorageError> {
    let records: Vec<QuestionRecord> = questions.iter().map(QuestionRecord::from_question).collect();
    serde_json::to_string(&records).map_err(ser)
}

/// Decodes and validates the stored JSON array.
pub(crate) fn questions_from_json(raw: &str) -> Result<Vec<Question>, StorageError> {
    let records: Vec<QuestionRecord> = serde_json::from_str(raw).map_err(ser)?;
    records
        .into_iter()
        .map(|r| r.into_question().map_err(ser))
        .collect()
}

pub(crate) fn map_progress_row(row: &sqlx::sqlite::SqliteRow) -> Result<ProgressRecord, StorageError> {
    let user: String = row.try_get("user_id").map_err(ser)?;
    let test: String = row.try_get("test_id").map_err(ser)?;
    let question: String = row.try_get("question_id").map_err(ser)?;
    let selected: Option<String> = row.try_get("selected_answer").map_err(ser)?;
    let is_correct: i64 = row.try_get("is_correct").map_err(ser)?;

    Ok(ProgressRecord {
        user_id: user_id_from_db(&user)?,
        test_id: TestId::new(test),
        question_id: QuestionId::new(question),
        selected_answer: letter_from_db(selected)?,
        is_correct: is_correct != 0,
        recorded_at: row.try_get("recorded_at").map_err(ser)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_map_both_ways() {
        let letter: ChoiceLetter = "C".parse().unwrap();
        assert_eq!(letter_to_db(Some(letter)), Some("C".to_string()));
        assert_eq!(letter_from_db(Some("c".into())).unwrap(), Some(letter));
        assert_eq!(letter_from_db(None).unwrap(), None);
        assert!(letter_from_db(Some("CC".into())).is_err());
    }

    #[test]
    fn invalid_question_json_is_a_serialization_error() {
        let err = questions_from_json(r#"[{"id": "q1"}]"#).unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }
}
