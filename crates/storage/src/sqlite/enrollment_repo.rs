use chrono::{DateTime, Utc};
use course_core::model::{CourseId, Enrollment, EnrollmentStatus, LessonProgress, UserId};
use sqlx::{Row, Sqlite, Transaction};

use super::SqliteRepository;
use super::mapping::{id_i64, map_enrollment_row, parse_status, ser};
use super::progress_repo::upsert_progress_tx;
use crate::repository::{CompletionPersistence, EnrollmentRepository, StorageError};

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn enroll(
        &self,
        user_id: UserId,
        course_id: CourseId,
        at: DateTime<Utc>,
    ) -> Result<Enrollment, StorageError> {
        if self.get_enrollment(user_id, course_id).await?.is_some() {
            return Err(StorageError::Conflict);
        }

        let enrollment = Enrollment::new(user_id, course_id, at);
        sqlx::query(
            r"
            INSERT INTO enrollments (user_id, course_id, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(user_id.to_string())
        .bind(id_i64("course_id", course_id.value())?)
        .bind(enrollment.status().as_str())
        .bind(enrollment.created_at())
        .bind(enrollment.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(enrollment)
    }

    async fn get_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, course_id, status, created_at, updated_at
            FROM enrollments
            WHERE user_id = ?1 AND course_id = ?2
            ",
        )
        .bind(user_id.to_string())
        .bind(id_i64("course_id", course_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        match row {
            Some(row) => map_enrollment_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn set_status(
        &self,
        user_id: UserId,
        course_id: CourseId,
        status: EnrollmentStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        set_status_tx(&mut tx, user_id, course_id, status, at).await?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

/// Writes a derived status inside an open transaction.
///
/// An unchanged status is a no-op, and a `completed` enrollment is never
/// downgraded: a stale recompute may lag the true aggregate but must not
/// move status backward.
pub(super) async fn set_status_tx(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: UserId,
    course_id: CourseId,
    status: EnrollmentStatus,
    at: DateTime<Utc>,
) -> Result<(), StorageError> {
    let course = id_i64("course_id", course_id.value())?;

    let row = sqlx::query(
        "SELECT status FROM enrollments WHERE user_id = ?1 AND course_id = ?2",
    )
    .bind(user_id.to_string())
    .bind(course)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| StorageError::Connection(e.to_string()))?
    .ok_or(StorageError::NotFound)?;

    let current = parse_status(row.try_get::<String, _>("status").map_err(ser)?.as_str())?;
    if current == status {
        return Ok(());
    }
    if current == EnrollmentStatus::Completed && status != EnrollmentStatus::Completed {
        tracing::warn!(
            user = %user_id,
            course = %course_id,
            requested = status.as_str(),
            "refusing to downgrade a completed enrollment"
        );
        return Ok(());
    }

    sqlx::query(
        r"
        UPDATE enrollments
        SET status = ?3, updated_at = ?4
        WHERE user_id = ?1 AND course_id = ?2
        ",
    )
    .bind(user_id.to_string())
    .bind(course)
    .bind(status.as_str())
    .bind(at)
    .execute(&mut **tx)
    .await
    .map_err(|e| StorageError::Connection(e.to_string()))?;

    tracing::info!(
        user = %user_id,
        course = %course_id,
        from = current.as_str(),
        to = status.as_str(),
        "enrollment status changed"
    );

    Ok(())
}

#[async_trait::async_trait]
impl CompletionPersistence for SqliteRepository {
    async fn record_completion(
        &self,
        course_id: CourseId,
        row: &LessonProgress,
        status: EnrollmentStatus,
    ) -> Result<LessonProgress, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let stored = upsert_progress_tx(&mut tx, row).await?;
        set_status_tx(&mut tx, row.user_id(), course_id, status, stored.completed_at()).await?;

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        tracing::debug!(
            user = %row.user_id(),
            lesson = %row.lesson_id(),
            course = %course_id,
            "recorded lesson completion"
        );

        Ok(stored)
    }
}
