use exam_core::model::{TestId, UserId};

use super::{
    SqliteRepository,
    mapping::{conn, letter_to_db, map_progress_row},
};
use crate::repository::{ProgressRecord, ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn upsert_progress(&self, rows: &[ProgressRecord]) -> Result<(), StorageError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(conn)?;

        for row in rows {
            sqlx::query(
                r"
                    INSERT INTO test_user_progress (
                        user_id, test_id, question_id, selected_answer, is_correct, recorded_at
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(user_id, test_id, question_id) DO UPDATE SET
                        selected_answer = excluded.selected_answer,
                        is_correct = excluded.is_correct,
                        recorded_at = excluded.recorded_at
                ",
            )
            .bind(row.user_id.to_string())
            .bind(row.test_id.as_str())
            .bind(row.question_id.as_str())
            .bind(letter_to_db(row.selected_answer))
            .bind(i64::from(row.is_correct))
            .bind(row.recorded_at)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn list_progress(
        &self,
        user_id: UserId,
        test_id: &TestId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT
                    user_id, test_id, question_id, selected_answer, is_correct, recorded_at
                FROM test_user_progress
                WHERE user_id = ?1 AND test_id = ?2
                ORDER BY question_id ASC
            ",
        )
        .bind(user_id.to_string())
        .bind(test_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_progress_row(&row)?);
        }
        Ok(out)
    }
}
