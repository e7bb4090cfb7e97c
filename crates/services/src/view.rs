use serde::Serialize;

use course_core::CourseProgressView;
use course_core::model::{Course, Enrollment, Lesson};

/// Everything a caller needs to render a course for one user: the
/// hierarchy, the membership record, derived completion metrics, and the
/// lesson to resume at.
///
/// Returned by both the read path and the completion path so the front end
/// never has to stitch a view together from separate calls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseView {
    pub course: Course,
    pub enrollment: Enrollment,
    pub progress: CourseProgressView,
    pub current_lesson: Option<Lesson>,
}

impl CourseView {
    /// Convenience for callers that only care about the resume target id.
    #[must_use]
    pub fn current_lesson_id(&self) -> Option<course_core::model::LessonId> {
        self.current_lesson.as_ref().map(Lesson::id)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
