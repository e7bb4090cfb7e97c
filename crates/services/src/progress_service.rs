use std::sync::Arc;

use chrono::{DateTime, Utc};

use course_core::model::{Course, CourseId, LessonId, LessonProgress, UserId};
use course_core::{Clock, aggregate, resolve_current_lesson};
use storage::repository::{
    CompletionPersistence, CourseRepository, EnrollmentRepository, ProgressRepository, Storage,
    StorageError,
};

use crate::error::ProgressServiceError;
use crate::view::CourseView;

//
// ─── SERVICE ───────────────────────────────────────────────────────────────────
//

/// Coordinates course views and lesson completions for one storage backend.
///
/// The read path (`course_view`) never writes. The completion path is the
/// only component with side effects: it records the progress row and the
/// reconciled enrollment status through `CompletionPersistence`, then
/// returns a freshly derived view. The service performs no retries of its
/// own; a retried completion is safe because the progress upsert is
/// idempotent by (user, lesson) key.
pub struct ProgressService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    progress: Arc<dyn ProgressRepository>,
    enrollments: Arc<dyn EnrollmentRepository>,
    completions: Arc<dyn CompletionPersistence>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        progress: Arc<dyn ProgressRepository>,
        enrollments: Arc<dyn EnrollmentRepository>,
        completions: Arc<dyn CompletionPersistence>,
    ) -> Self {
        Self {
            clock,
            courses,
            progress,
            enrollments,
            completions,
        }
    }

    /// Builds a service over an assembled `Storage`.
    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.courses),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.enrollments),
            Arc::clone(&storage.completions),
        )
    }

    /// Current time according to the service's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Assembles the course view for one user: hierarchy, enrollment,
    /// derived completion metrics, and the lesson to resume at.
    ///
    /// # Errors
    ///
    /// Returns `CourseNotFound` for an unknown course, `NotEnrolled` when
    /// the user has no enrollment for it, and storage errors otherwise.
    pub async fn course_view(
        &self,
        user_id: UserId,
        course_id: CourseId,
    ) -> Result<CourseView, ProgressServiceError> {
        let course = match self.courses.get_course(course_id).await {
            Ok(course) => course,
            Err(StorageError::NotFound) => return Err(ProgressServiceError::CourseNotFound),
            Err(err) => return Err(err.into()),
        };
        self.view_for(user_id, course).await
    }

    /// Records a lesson completion and returns the refreshed view.
    ///
    /// Steps: validate inputs, resolve the owning course, require an
    /// enrollment, derive the post-completion status from the stored rows
    /// plus the new row, write both through one transactional scope, and
    /// re-derive the view. Re-completing an already-completed lesson is a
    /// pure overwrite and never decreases the completed count.
    ///
    /// # Errors
    ///
    /// Returns `LessonNotFound` for an unknown lesson, `NotEnrolled` when
    /// the user has no enrollment for the owning course, `Progress` when
    /// the score is out of range (rejected before any write), and storage
    /// errors otherwise.
    pub async fn complete_lesson(
        &self,
        user_id: UserId,
        lesson_id: LessonId,
        score: Option<u8>,
        time_spent_seconds: u32,
    ) -> Result<CourseView, ProgressServiceError> {
        let row = LessonProgress::new(user_id, lesson_id, self.clock.now(), score, time_spent_seconds)?;

        let course = match self.courses.course_for_lesson(lesson_id).await {
            Ok(course) => course,
            Err(StorageError::NotFound) => return Err(ProgressServiceError::LessonNotFound),
            Err(err) => return Err(err.into()),
        };

        let enrollment = self
            .enrollments
            .get_enrollment(user_id, course.id())
            .await?
            .ok_or(ProgressServiceError::NotEnrolled)?;

        // Derive the post-completion status from what is stored plus the
        // row about to be written; a concurrent completion of a different
        // lesson can only make the stored state ahead of this estimate,
        // never behind it.
        let mut rows = self
            .progress
            .completed_for_course(user_id, course.id())
            .await?;
        if !rows.iter().any(|r| r.lesson_id() == lesson_id) {
            rows.push(row.clone());
        }
        let prospective = aggregate(&course, &rows);
        let next_status = enrollment
            .status()
            .after_completion(prospective.completed_lessons, prospective.total_lessons);

        if next_status != enrollment.status() {
            tracing::info!(
                user = %user_id,
                course = %course.id(),
                from = enrollment.status().as_str(),
                to = next_status.as_str(),
                "lesson completion moves enrollment status"
            );
        }

        self.completions
            .record_completion(course.id(), &row, next_status)
            .await?;
        tracing::debug!(user = %user_id, lesson = %lesson_id, "lesson completion recorded");

        self.view_for(user_id, course).await
    }

    async fn view_for(
        &self,
        user_id: UserId,
        course: Course,
    ) -> Result<CourseView, ProgressServiceError> {
        let enrollment = self
            .enrollments
            .get_enrollment(user_id, course.id())
            .await?
            .ok_or(ProgressServiceError::NotEnrolled)?;
        let rows = self
            .progress
            .completed_for_course(user_id, course.id())
            .await?;

        let progress = aggregate(&course, &rows);
        let current_lesson = resolve_current_lesson(&course, &rows).cloned();

        Ok(CourseView {
            course,
            enrollment,
            progress,
            current_lesson,
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use course_core::model::{
        Course, CourseId, EnrollmentStatus, Lesson, LessonKind, Module, ModuleId,
    };
    use course_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    fn lesson(id: u64, order: u32) -> Lesson {
        Lesson::new(LessonId::new(id), format!("L{id}"), LessonKind::Video, 10, order).unwrap()
    }

    fn two_lesson_course() -> Course {
        let module = Module::new(
            ModuleId::new(1),
            "Only Module",
            0,
            vec![lesson(1, 0), lesson(2, 1)],
        )
        .unwrap();
        Course::new(CourseId::new(1), "Tiny Course", None, "1.0.0", 1, vec![module]).unwrap()
    }

    fn service_at(repo: &InMemoryRepository, at: chrono::DateTime<Utc>) -> ProgressService {
        ProgressService::new(
            Clock::fixed(at),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    async fn seeded_repo(course: &Course, user: UserId) -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        repo.upsert_course(course).await.unwrap();
        repo.enroll(user, course.id(), fixed_now()).await.unwrap();
        repo
    }

    #[tokio::test]
    async fn unknown_lesson_is_lesson_not_found() {
        let repo = InMemoryRepository::new();
        let service = service_at(&repo, fixed_now());
        let err = service
            .complete_lesson(UserId::generate(), LessonId::new(404), None, 60)
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::LessonNotFound));
    }

    #[tokio::test]
    async fn unknown_course_is_course_not_found() {
        let repo = InMemoryRepository::new();
        let service = service_at(&repo, fixed_now());
        let err = service
            .course_view(UserId::generate(), CourseId::new(404))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::CourseNotFound));
    }

    #[tokio::test]
    async fn completion_without_enrollment_is_rejected() {
        let course = two_lesson_course();
        let repo = InMemoryRepository::new();
        repo.upsert_course(&course).await.unwrap();
        let service = service_at(&repo, fixed_now());

        let err = service
            .complete_lesson(UserId::generate(), LessonId::new(1), None, 60)
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::NotEnrolled));
    }

    #[tokio::test]
    async fn out_of_range_score_is_rejected_before_any_write() {
        let course = two_lesson_course();
        let user = UserId::generate();
        let repo = seeded_repo(&course, user).await;
        let service = service_at(&repo, fixed_now());

        let err = service
            .complete_lesson(user, LessonId::new(1), Some(101), 60)
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressServiceError::Progress(_)));

        let rows = repo.completed_for_course(user, course.id()).await.unwrap();
        assert!(rows.is_empty());
        let enrollment = repo.get_enrollment(user, course.id()).await.unwrap().unwrap();
        assert_eq!(enrollment.status(), EnrollmentStatus::NotStarted);
    }

    #[tokio::test]
    async fn status_walks_not_started_in_progress_completed() {
        let course = two_lesson_course();
        let user = UserId::generate();
        let repo = seeded_repo(&course, user).await;

        let view = service_at(&repo, fixed_now())
            .complete_lesson(user, LessonId::new(1), Some(80), 300)
            .await
            .unwrap();
        assert_eq!(view.enrollment.status(), EnrollmentStatus::InProgress);
        assert_eq!(view.progress.completed_lessons, 1);

        let view = service_at(&repo, fixed_now() + Duration::minutes(10))
            .complete_lesson(user, LessonId::new(2), Some(90), 300)
            .await
            .unwrap();
        assert_eq!(view.enrollment.status(), EnrollmentStatus::Completed);
        assert!(view.progress.is_complete());
    }

    #[tokio::test]
    async fn repeat_completion_is_idempotent_on_counts() {
        let course = two_lesson_course();
        let user = UserId::generate();
        let repo = seeded_repo(&course, user).await;

        let first = service_at(&repo, fixed_now())
            .complete_lesson(user, LessonId::new(1), Some(70), 120)
            .await
            .unwrap();
        let second = service_at(&repo, fixed_now() + Duration::minutes(1))
            .complete_lesson(user, LessonId::new(1), Some(95), 240)
            .await
            .unwrap();

        assert_eq!(first.progress.completed_lessons, 1);
        assert_eq!(second.progress.completed_lessons, 1);
        assert_eq!(second.progress.average_score, Some(95.0));
        assert_eq!(second.progress.time_spent_seconds, 240);
    }

    #[tokio::test]
    async fn paused_enrollment_is_not_resumed_mid_course() {
        let course = two_lesson_course();
        let user = UserId::generate();
        let repo = seeded_repo(&course, user).await;
        repo.set_status(user, course.id(), EnrollmentStatus::Paused, fixed_now())
            .await
            .unwrap();

        let view = service_at(&repo, fixed_now())
            .complete_lesson(user, LessonId::new(1), None, 60)
            .await
            .unwrap();
        assert_eq!(view.enrollment.status(), EnrollmentStatus::Paused);

        // Finishing the course still completes a paused enrollment.
        let view = service_at(&repo, fixed_now() + Duration::minutes(5))
            .complete_lesson(user, LessonId::new(2), None, 60)
            .await
            .unwrap();
        assert_eq!(view.enrollment.status(), EnrollmentStatus::Completed);
    }

    #[tokio::test]
    async fn fresh_view_resumes_at_first_lesson() {
        let course = two_lesson_course();
        let user = UserId::generate();
        let repo = seeded_repo(&course, user).await;

        let view = service_at(&repo, fixed_now())
            .course_view(user, course.id())
            .await
            .unwrap();
        assert_eq!(view.current_lesson_id(), Some(LessonId::new(1)));
        assert_eq!(view.progress.completed_lessons, 0);
        assert_eq!(view.enrollment.status(), EnrollmentStatus::NotStarted);
    }
}
