use chrono::Duration;
use course_core::model::{
    Course, CourseId, EnrollmentStatus, Lesson, LessonId, LessonKind, LessonProgress, Module,
    ModuleId, UserId,
};
use course_core::time::fixed_now;
use storage::repository::{
    CompletionPersistence, CourseRepository, EnrollmentRepository, ProgressRepository, Storage,
    StorageError,
};

fn temp_db_url(tag: &str) -> String {
    let path = std::env::temp_dir().join(format!(
        "course_progress_{tag}_{}.sqlite3",
        std::process::id()
    ));
    let _ = std::fs::remove_file(&path);
    format!("sqlite:{}?mode=rwc", path.display())
}

fn build_course() -> Course {
    let m1 = Module::new(
        ModuleId::new(1),
        "Getting Started",
        0,
        vec![
            Lesson::new(LessonId::new(1), "Welcome", LessonKind::Video, 5, 0).unwrap(),
            Lesson::new(LessonId::new(2), "Setup", LessonKind::Text, 15, 1).unwrap(),
        ],
    )
    .unwrap();
    let m2 = Module::new(
        ModuleId::new(2),
        "Fundamentals",
        1,
        vec![Lesson::new(LessonId::new(3), "Ownership", LessonKind::Video, 25, 0).unwrap()],
    )
    .unwrap();
    Course::new(
        CourseId::new(1),
        "Rust Fundamentals",
        Some("From zero to ownership".into()),
        "1.2.0",
        6,
        vec![m1, m2],
    )
    .unwrap()
}

fn row(user: UserId, lesson: u64, minutes_later: i64, score: Option<u8>) -> LessonProgress {
    LessonProgress::new(
        user,
        LessonId::new(lesson),
        fixed_now() + Duration::minutes(minutes_later),
        score,
        180,
    )
    .unwrap()
}

#[tokio::test]
async fn hierarchy_round_trips_in_author_order() {
    let storage = Storage::sqlite(&temp_db_url("hierarchy")).await.unwrap();
    let course = build_course();
    storage.courses.upsert_course(&course).await.unwrap();

    let loaded = storage.courses.get_course(course.id()).await.unwrap();
    assert_eq!(loaded, course);

    let ids: Vec<u64> = loaded.lessons().map(|l| l.id().value()).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    let err = storage
        .courses
        .get_course(CourseId::new(404))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn course_for_lesson_and_catalog_listing() {
    let storage = Storage::sqlite(&temp_db_url("lookup")).await.unwrap();
    let course = build_course();
    storage.courses.upsert_course(&course).await.unwrap();

    let owner = storage
        .courses
        .course_for_lesson(LessonId::new(3))
        .await
        .unwrap();
    assert_eq!(owner.id(), course.id());

    let err = storage
        .courses
        .course_for_lesson(LessonId::new(404))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));

    let listed = storage.courses.list_courses(10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id(), course.id());
}

#[tokio::test]
async fn progress_upsert_overwrites_without_duplicating() {
    let storage = Storage::sqlite(&temp_db_url("upsert")).await.unwrap();
    let course = build_course();
    storage.courses.upsert_course(&course).await.unwrap();
    let user = UserId::generate();

    storage
        .progress
        .upsert_progress(&row(user, 1, 0, Some(70)))
        .await
        .unwrap();
    let stored = storage
        .progress
        .upsert_progress(&row(user, 1, 5, Some(95)))
        .await
        .unwrap();
    assert_eq!(stored.score(), Some(95));

    let rows = storage
        .progress
        .completed_for_course(user, course.id())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].score(), Some(95));
    assert_eq!(rows[0].completed_at(), fixed_now() + Duration::minutes(5));

    // Backdated re-completion keeps the later stored timestamp.
    let stored = storage
        .progress
        .upsert_progress(&row(user, 1, 0, Some(40)))
        .await
        .unwrap();
    assert_eq!(stored.completed_at(), fixed_now() + Duration::minutes(5));
    assert_eq!(stored.score(), Some(40));

    let err = storage
        .progress
        .upsert_progress(&row(user, 404, 0, None))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn completion_writes_progress_and_status_together() {
    let storage = Storage::sqlite(&temp_db_url("completion")).await.unwrap();
    let course = build_course();
    storage.courses.upsert_course(&course).await.unwrap();
    let user = UserId::generate();
    let now = fixed_now();

    storage
        .enrollments
        .enroll(user, course.id(), now)
        .await
        .unwrap();

    storage
        .completions
        .record_completion(course.id(), &row(user, 1, 0, None), EnrollmentStatus::InProgress)
        .await
        .unwrap();

    let enrollment = storage
        .enrollments
        .get_enrollment(user, course.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(enrollment.status(), EnrollmentStatus::InProgress);

    let rows = storage
        .progress
        .completed_for_course(user, course.id())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);

    // Without an enrollment nothing is written.
    let stranger = UserId::generate();
    let err = storage
        .completions
        .record_completion(course.id(), &row(stranger, 2, 0, None), EnrollmentStatus::InProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
    let rows = storage
        .progress
        .completed_for_course(stranger, course.id())
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn status_writes_are_idempotent_and_completed_is_sticky() {
    let storage = Storage::sqlite(&temp_db_url("status")).await.unwrap();
    let course = build_course();
    storage.courses.upsert_course(&course).await.unwrap();
    let user = UserId::generate();
    let now = fixed_now();

    storage
        .enrollments
        .enroll(user, course.id(), now)
        .await
        .unwrap();
    let err = storage
        .enrollments
        .enroll(user, course.id(), now)
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    // Re-writing the current status leaves updated_at alone.
    storage
        .enrollments
        .set_status(
            user,
            course.id(),
            EnrollmentStatus::NotStarted,
            now + Duration::hours(2),
        )
        .await
        .unwrap();
    let enrollment = storage
        .enrollments
        .get_enrollment(user, course.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(enrollment.updated_at(), now);

    storage
        .enrollments
        .set_status(user, course.id(), EnrollmentStatus::Completed, now)
        .await
        .unwrap();
    storage
        .enrollments
        .set_status(user, course.id(), EnrollmentStatus::InProgress, now)
        .await
        .unwrap();
    let enrollment = storage
        .enrollments
        .get_enrollment(user, course.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(enrollment.status(), EnrollmentStatus::Completed);
}
