use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::model::{
    Course, CourseId, Enrollment, EnrollmentStatus, LessonId, LessonProgress, UserId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

/// Read access to course hierarchies, plus the authoring-side import used by
/// the seed binary and tests.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Persist a full hierarchy (course, modules, lessons) in one unit.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the hierarchy cannot be stored.
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError>;

    /// Fetch a course with modules and lessons in author-defined order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown course id.
    async fn get_course(&self, id: CourseId) -> Result<Course, StorageError>;

    /// Resolve the course that owns a lesson.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for an unknown lesson id.
    async fn course_for_lesson(&self, lesson_id: LessonId) -> Result<Course, StorageError>;

    /// List courses for the catalog, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError>;
}

/// Per-user, per-lesson completion records.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Completed rows for a user within one course, ordered by completion
    /// timestamp ascending. Rows are joined to the course through the
    /// hierarchy since they carry no course reference themselves.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn completed_for_course(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<LessonProgress>, StorageError>;

    /// Insert-or-update keyed on (user, lesson): score and time spent are
    /// overwritten and the completion timestamp is refreshed, clamped so it
    /// never moves backward. Returns the row as stored.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson id resolves to no
    /// known lesson.
    async fn upsert_progress(&self, row: &LessonProgress) -> Result<LessonProgress, StorageError>;
}

/// The per-(user, course) membership records.
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Create a `NotStarted` enrollment. This is the entry point the
    /// enrollment flow outside this core calls.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the user is already enrolled.
    async fn enroll(
        &self,
        user_id: UserId,
        course_id: CourseId,
        at: DateTime<Utc>,
    ) -> Result<Enrollment, StorageError>;

    /// Fetch an enrollment; `None` means not enrolled (distinct from a
    /// storage failure).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn get_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError>;

    /// Write a derived status. Idempotent: an unchanged status is a no-op
    /// that leaves `updated_at` untouched, and a `completed` enrollment is
    /// never downgraded by a stale recompute.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if no enrollment row exists.
    async fn set_status(
        &self,
        user_id: UserId,
        course_id: CourseId,
        status: EnrollmentStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;
}

/// Writes a completion's progress row and the reconciled enrollment status
/// as one unit, inside a single transaction where the backend supports it.
#[async_trait]
pub trait CompletionPersistence: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the lesson is unknown or the user
    /// has no enrollment row for the course.
    async fn record_completion(
        &self,
        course_id: CourseId,
        row: &LessonProgress,
        status: EnrollmentStatus,
    ) -> Result<LessonProgress, StorageError>;
}

//
// ─── IN-MEMORY BACKEND ─────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    courses: Arc<Mutex<HashMap<CourseId, Course>>>,
    progress: Arc<Mutex<HashMap<(UserId, LessonId), LessonProgress>>>,
    enrollments: Arc<Mutex<HashMap<(UserId, CourseId), Enrollment>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lesson_known(&self, lesson_id: LessonId) -> Result<bool, StorageError> {
        let guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.values().any(|course| course.contains_lesson(lesson_id)))
    }
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let mut guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(course.id(), course.clone());
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Course, StorageError> {
        let guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn course_for_lesson(&self, lesson_id: LessonId) -> Result<Course, StorageError> {
        let guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .values()
            .find(|course| course.contains_lesson(lesson_id))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError> {
        let guard = self
            .courses
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut courses: Vec<Course> = guard.values().cloned().collect();
        courses.sort_by_key(Course::id);
        courses.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(courses)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn completed_for_course(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Vec<LessonProgress>, StorageError> {
        let course = self.get_course(course_id).await?;
        let guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut rows: Vec<LessonProgress> = guard
            .iter()
            .filter(|((user, lesson), _)| {
                *user == user_id && course.contains_lesson(*lesson)
            })
            .map(|(_, row)| row.clone())
            .collect();
        rows.sort_by_key(|row| (row.completed_at(), row.lesson_id()));
        Ok(rows)
    }

    async fn upsert_progress(&self, row: &LessonProgress) -> Result<LessonProgress, StorageError> {
        if !self.lesson_known(row.lesson_id())? {
            return Err(StorageError::NotFound);
        }

        let mut guard = self
            .progress
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let key = (row.user_id(), row.lesson_id());
        let stored = match guard.get(&key) {
            Some(existing) => row.clamped_after(existing.completed_at()),
            None => row.clone(),
        };
        guard.insert(key, stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn enroll(
        &self,
        user_id: UserId,
        course_id: CourseId,
        at: DateTime<Utc>,
    ) -> Result<Enrollment, StorageError> {
        let mut guard = self
            .enrollments
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let key = (user_id, course_id);
        if guard.contains_key(&key) {
            return Err(StorageError::Conflict);
        }
        let enrollment = Enrollment::new(user_id, course_id, at);
        guard.insert(key, enrollment.clone());
        Ok(enrollment)
    }

    async fn get_enrollment(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let guard = self
            .enrollments
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&(user_id, course_id)).cloned())
    }

    async fn set_status(
        &self,
        user_id: UserId,
        course_id: CourseId,
        status: EnrollmentStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .enrollments
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let key = (user_id, course_id);
        let current = guard.get(&key).ok_or(StorageError::NotFound)?;

        if current.status() == status {
            return Ok(());
        }
        if current.status() == EnrollmentStatus::Completed
            && status != EnrollmentStatus::Completed
        {
            tracing::warn!(
                user = %user_id,
                course = %course_id,
                requested = status.as_str(),
                "refusing to downgrade a completed enrollment"
            );
            return Ok(());
        }

        let updated = current.with_status(status, at);
        guard.insert(key, updated);
        Ok(())
    }
}

#[async_trait]
impl CompletionPersistence for InMemoryRepository {
    async fn record_completion(
        &self,
        course_id: CourseId,
        row: &LessonProgress,
        status: EnrollmentStatus,
    ) -> Result<LessonProgress, StorageError> {
        if self.get_enrollment(row.user_id(), course_id).await?.is_none() {
            return Err(StorageError::NotFound);
        }
        let stored = self.upsert_progress(row).await?;
        self.set_status(row.user_id(), course_id, status, stored.completed_at())
            .await?;
        Ok(stored)
    }
}

//
// ─── STORAGE AGGREGATE ─────────────────────────────────────────────────────────
//

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub courses: Arc<dyn CourseRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub completions: Arc<dyn CompletionPersistence>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let courses: Arc<dyn CourseRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let enrollments: Arc<dyn EnrollmentRepository> = Arc::new(repo.clone());
        let completions: Arc<dyn CompletionPersistence> = Arc::new(repo);
        Self {
            courses,
            progress,
            enrollments,
            completions,
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{Lesson, LessonKind, Module, ModuleId};
    use course_core::time::fixed_now;
    use chrono::Duration;

    fn build_course(id: u64) -> Course {
        let lessons = vec![
            Lesson::new(LessonId::new(id * 10 + 1), "Intro", LessonKind::Video, 10, 0).unwrap(),
            Lesson::new(LessonId::new(id * 10 + 2), "Practice", LessonKind::Text, 20, 1).unwrap(),
        ];
        let module = Module::new(ModuleId::new(id), "Module", 0, lessons).unwrap();
        Course::new(CourseId::new(id), format!("Course {id}"), None, "1.0.0", 1, vec![module])
            .unwrap()
    }

    fn build_row(user: UserId, lesson: u64, minutes_later: i64) -> LessonProgress {
        LessonProgress::new(
            user,
            LessonId::new(lesson),
            fixed_now() + Duration::minutes(minutes_later),
            Some(90),
            120,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn upsert_progress_is_keyed_by_user_and_lesson() {
        let repo = InMemoryRepository::new();
        let course = build_course(1);
        repo.upsert_course(&course).await.unwrap();
        let user = UserId::generate();

        repo.upsert_progress(&build_row(user, 11, 0)).await.unwrap();
        repo.upsert_progress(&build_row(user, 11, 5)).await.unwrap();

        let rows = repo.completed_for_course(user, course.id()).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].completed_at(), fixed_now() + Duration::minutes(5));
    }

    #[tokio::test]
    async fn upsert_progress_never_moves_timestamp_backward() {
        let repo = InMemoryRepository::new();
        let course = build_course(1);
        repo.upsert_course(&course).await.unwrap();
        let user = UserId::generate();

        repo.upsert_progress(&build_row(user, 11, 10)).await.unwrap();
        let stored = repo.upsert_progress(&build_row(user, 11, 0)).await.unwrap();

        assert_eq!(stored.completed_at(), fixed_now() + Duration::minutes(10));
    }

    #[tokio::test]
    async fn upsert_progress_rejects_unknown_lesson() {
        let repo = InMemoryRepository::new();
        let err = repo
            .upsert_progress(&build_row(UserId::generate(), 999, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn completed_rows_come_back_ordered_by_timestamp() {
        let repo = InMemoryRepository::new();
        let course = build_course(1);
        repo.upsert_course(&course).await.unwrap();
        let user = UserId::generate();

        repo.upsert_progress(&build_row(user, 12, 10)).await.unwrap();
        repo.upsert_progress(&build_row(user, 11, 0)).await.unwrap();

        let rows = repo.completed_for_course(user, course.id()).await.unwrap();
        let ids: Vec<u64> = rows.iter().map(|r| r.lesson_id().value()).collect();
        assert_eq!(ids, vec![11, 12]);
    }

    #[tokio::test]
    async fn enroll_twice_conflicts() {
        let repo = InMemoryRepository::new();
        let user = UserId::generate();
        repo.enroll(user, CourseId::new(1), fixed_now()).await.unwrap();
        let err = repo.enroll(user, CourseId::new(1), fixed_now()).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn set_status_is_idempotent_and_never_downgrades_completed() {
        let repo = InMemoryRepository::new();
        let user = UserId::generate();
        let course_id = CourseId::new(1);
        let now = fixed_now();
        repo.enroll(user, course_id, now).await.unwrap();

        // Unchanged status leaves updated_at alone.
        repo.set_status(user, course_id, EnrollmentStatus::NotStarted, now + Duration::hours(1))
            .await
            .unwrap();
        let enrollment = repo.get_enrollment(user, course_id).await.unwrap().unwrap();
        assert_eq!(enrollment.updated_at(), now);

        repo.set_status(user, course_id, EnrollmentStatus::Completed, now)
            .await
            .unwrap();
        repo.set_status(user, course_id, EnrollmentStatus::InProgress, now)
            .await
            .unwrap();
        let enrollment = repo.get_enrollment(user, course_id).await.unwrap().unwrap();
        assert_eq!(enrollment.status(), EnrollmentStatus::Completed);
    }

    #[tokio::test]
    async fn set_status_without_enrollment_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = repo
            .set_status(
                UserId::generate(),
                CourseId::new(1),
                EnrollmentStatus::InProgress,
                fixed_now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn record_completion_requires_an_enrollment() {
        let repo = InMemoryRepository::new();
        let course = build_course(1);
        repo.upsert_course(&course).await.unwrap();
        let user = UserId::generate();

        let err = repo
            .record_completion(course.id(), &build_row(user, 11, 0), EnrollmentStatus::InProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));

        let rows = repo.completed_for_course(user, course.id()).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn course_for_lesson_resolves_the_owning_course() {
        let repo = InMemoryRepository::new();
        repo.upsert_course(&build_course(1)).await.unwrap();
        repo.upsert_course(&build_course(2)).await.unwrap();

        let course = repo.course_for_lesson(LessonId::new(21)).await.unwrap();
        assert_eq!(course.id(), CourseId::new(2));

        let err = repo.course_for_lesson(LessonId::new(999)).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }
}
