//! Selection of the lesson a returning learner should see as "current".

use crate::model::{Course, Lesson, LessonProgress};

/// Picks the lesson to resume at for a given hierarchy and progress history.
///
/// With no completed lessons the learner starts at the first lesson of the
/// first module (`None` for a course with no lessons). Otherwise the current
/// lesson is the one completed most recently, with timestamp ties broken by
/// the highest lesson order index and then the highest module order index.
///
/// This is deliberately a "continue where you stopped" policy rather than
/// "jump to the first incomplete lesson": a learner who revisits an earlier
/// lesson resumes there, even when later lessons are already done. Rows for
/// lessons outside the hierarchy are skipped, so a history of only stale
/// rows behaves like an empty one.
#[must_use]
pub fn resolve_current_lesson<'a>(
    course: &'a Course,
    rows: &[LessonProgress],
) -> Option<&'a Lesson> {
    let mut best: Option<(chrono::DateTime<chrono::Utc>, u32, u32, &Lesson)> = None;

    for row in rows {
        let Some((module, lesson)) = course.find_lesson(row.lesson_id()) else {
            continue;
        };
        let key = (row.completed_at(), lesson.order_index(), module.order_index());
        let replace = match &best {
            Some((at, lesson_order, module_order, _)) => {
                key > (*at, *lesson_order, *module_order)
            }
            None => true,
        };
        if replace {
            best = Some((key.0, key.1, key.2, lesson));
        }
    }

    match best {
        Some((_, _, _, lesson)) => Some(lesson),
        None => course.first_lesson(),
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CourseId, Lesson, LessonId, LessonKind, Module, ModuleId, UserId};
    use crate::time::fixed_now;
    use chrono::Duration;

    fn lesson(id: u64, order: u32) -> Lesson {
        Lesson::new(LessonId::new(id), format!("L{id}"), LessonKind::Text, 10, order).unwrap()
    }

    fn module(id: u64, order: u32, lessons: Vec<Lesson>) -> Module {
        Module::new(ModuleId::new(id), format!("M{id}"), order, lessons).unwrap()
    }

    fn course() -> Course {
        Course::new(
            CourseId::new(1),
            "Rust Basics",
            None,
            "1.0.0",
            2,
            vec![
                module(1, 0, vec![lesson(1, 0), lesson(2, 1)]),
                module(2, 1, vec![lesson(3, 0)]),
            ],
        )
        .unwrap()
    }

    fn completed(lesson: u64, minutes_later: i64) -> LessonProgress {
        LessonProgress::new(
            UserId::generate(),
            LessonId::new(lesson),
            fixed_now() + Duration::minutes(minutes_later),
            None,
            60,
        )
        .unwrap()
    }

    #[test]
    fn empty_history_starts_at_first_lesson() {
        let course = course();
        let current = resolve_current_lesson(&course, &[]).unwrap();
        assert_eq!(current.id(), LessonId::new(1));
    }

    #[test]
    fn empty_course_has_no_current_lesson() {
        let empty = Course::new(CourseId::new(2), "Empty", None, "1.0.0", 0, Vec::new()).unwrap();
        assert!(resolve_current_lesson(&empty, &[]).is_none());
    }

    #[test]
    fn resumes_at_most_recently_completed_lesson() {
        let course = course();
        // Completed out of linear order: L2 first, then L1.
        let rows = vec![completed(2, 0), completed(1, 5)];
        let current = resolve_current_lesson(&course, &rows).unwrap();
        assert_eq!(current.id(), LessonId::new(1));
    }

    #[test]
    fn timestamp_tie_prefers_highest_lesson_order_then_module_order() {
        let course = course();

        // L1 (order 0) and L2 (order 1) in the same module, same instant.
        let rows = vec![completed(1, 0), completed(2, 0)];
        let current = resolve_current_lesson(&course, &rows).unwrap();
        assert_eq!(current.id(), LessonId::new(2));

        // L3 (module order 1, lesson order 0) ties with L1 (module order 0,
        // lesson order 0): equal lesson order, so module order decides.
        let rows = vec![completed(1, 0), completed(3, 0)];
        let current = resolve_current_lesson(&course, &rows).unwrap();
        assert_eq!(current.id(), LessonId::new(3));
    }

    #[test]
    fn stale_rows_fall_back_to_first_lesson() {
        let course = course();
        let rows = vec![completed(999, 0)];
        let current = resolve_current_lesson(&course, &rows).unwrap();
        assert_eq!(current.id(), LessonId::new(1));
    }

    #[test]
    fn resolution_is_deterministic() {
        let course = course();
        let rows = vec![completed(2, 0), completed(3, 0), completed(1, 1)];
        let a = resolve_current_lesson(&course, &rows).map(Lesson::id);
        let b = resolve_current_lesson(&course, &rows).map(Lesson::id);
        assert_eq!(a, b);
    }
}
