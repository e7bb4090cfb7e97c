use chrono::{DateTime, Utc};
use course_core::model::{CourseId, LessonProgress, UserId};
use sqlx::{Row, Sqlite, Transaction};

use super::SqliteRepository;
use super::mapping::{id_i64, map_progress_row, ser};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn completed_for_course(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<LessonProgress>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT p.user_id, p.lesson_id, p.completed_at, p.score, p.time_spent_seconds
            FROM lesson_progress p
            JOIN lessons l ON p.lesson_id = l.id
            JOIN modules m ON l.module_id = m.id
            WHERE p.user_id = ?1 AND m.course_id = ?2
            ORDER BY p.completed_at ASC, p.lesson_id ASC
            ",
        )
        .bind(user_id.to_string())
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_progress_row(&row)?);
        }
        Ok(out)
    }

    async fn upsert_progress(&self, row: &LessonProgress) -> Result<LessonProgress, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let stored = upsert_progress_tx(&mut tx, row).await?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(stored)
    }
}

/// Upserts a progress row inside an open transaction.
///
/// Shared between the standalone upsert and `record_completion`, which also
/// writes the enrollment status in the same transaction. The existing
/// timestamp acts as a floor so a repeated completion can only move the
/// timestamp forward.
pub(super) async fn upsert_progress_tx(
    tx: &mut Transaction<'_, Sqlite>,
    row: &LessonProgress,
) -> Result<LessonProgress, StorageError> {
    let lesson_id = id_i64("lesson_id", row.lesson_id().value())?;

    let known = sqlx::query("SELECT 1 FROM lessons WHERE id = ?1")
        .bind(lesson_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;
    if known.is_none() {
        return Err(StorageError::NotFound);
    }

    let existing = sqlx::query(
        "SELECT completed_at FROM lesson_progress WHERE user_id = ?1 AND lesson_id = ?2",
    )
    .bind(row.user_id().to_string())
    .bind(lesson_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| StorageError::Connection(e.to_string()))?;

    let stored = match existing {
        Some(found) => {
            let floor: DateTime<Utc> = found.try_get("completed_at").map_err(ser)?;
            row.clamped_after(floor)
        }
        None => row.clone(),
    };

    sqlx::query(
        r"
        INSERT INTO lesson_progress (user_id, lesson_id, completed_at, score, time_spent_seconds)
        VALUES (?1, ?2, ?3, ?4, ?5)
        ON CONFLICT(user_id, lesson_id) DO UPDATE SET
            completed_at = excluded.completed_at,
            score = excluded.score,
            time_spent_seconds = excluded.time_spent_seconds
        ",
    )
    .bind(stored.user_id().to_string())
    .bind(lesson_id)
    .bind(stored.completed_at())
    .bind(stored.score().map(i64::from))
    .bind(i64::from(stored.time_spent_seconds()))
    .execute(&mut **tx)
    .await
    .map_err(|e| StorageError::Connection(e.to_string()))?;

    Ok(stored)
}
