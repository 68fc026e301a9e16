use chrono::Utc;
use exam_core::model::{Question, TestId};
use sqlx::Row;

use super::{
    SqliteRepository,
    mapping::{conn, questions_from_json, questions_to_json, ser},
};
use crate::repository::{ContentRepository, StorageError};

#[async_trait::async_trait]
impl ContentRepository for SqliteRepository {
    async fn load_questions(&self, test_id: &TestId) -> Result<Option<Vec<Question>>, StorageError> {
        let row = sqlx::query(
            r"
                SELECT questions
                FROM test_resources
                WHERE test_id = ?1
            ",
        )
        .bind(test_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let raw: String = row.try_get("questions").map_err(ser)?;
        questions_from_json(&raw).map(Some)
    }

    async fn save_questions(
        &self,
        test_id: &TestId,
        test_name: Option<&str>,
        questions: &[Question],
    ) -> Result<(), StorageError> {
        let json = questions_to_json(questions)?;

        sqlx::query(
            r"
                INSERT INTO test_resources (test_id, test_name, questions, updated_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(test_id) DO UPDATE SET
                    test_name = COALESCE(excluded.test_name, test_resources.test_name),
                    questions = excluded.questions,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(test_id.as_str())
        .bind(test_name)
        .bind(json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }
}
