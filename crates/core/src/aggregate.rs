//! Derivation of completion metrics from a course hierarchy and a user's
//! progress rows.
//!
//! Everything here is a pure, total function: identical inputs always yield
//! identical output, rows for lessons outside the hierarchy are ignored, and
//! a course with zero lessons reports 0% rather than a division fault.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Course, CourseId, LessonProgress, ModuleId};

//
// ─── VIEWS ─────────────────────────────────────────────────────────────────────
//

/// Completion rollup for a single module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleRollup {
    pub module_id: ModuleId,
    pub title: String,
    pub total_lessons: usize,
    pub completed_lessons: usize,
    pub completion_percent: f64,
}

impl ModuleRollup {
    /// Percentage rounded half-up for display.
    #[must_use]
    pub fn display_percent(&self) -> u8 {
        round_half_up(self.completion_percent)
    }
}

/// Derived completion metrics for one (user, course) pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseProgressView {
    pub course_id: CourseId,
    pub total_lessons: usize,
    pub completed_lessons: usize,
    pub completion_percent: f64,
    pub total_minutes: u64,
    pub completed_minutes: u64,
    pub time_spent_seconds: u64,
    pub average_score: Option<f64>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub modules: Vec<ModuleRollup>,
}

impl CourseProgressView {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total_lessons > 0 && self.completed_lessons == self.total_lessons
    }

    /// Percentage rounded half-up for display.
    #[must_use]
    pub fn display_percent(&self) -> u8 {
        round_half_up(self.completion_percent)
    }
}

//
// ─── AGGREGATION ───────────────────────────────────────────────────────────────
//

fn percent(completed: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    // Lesson counts stay far below 2^52, so the casts are exact.
    #[allow(clippy::cast_precision_loss)]
    let ratio = completed as f64 / total as f64;
    ratio * 100.0
}

/// Rounds a non-negative percentage half-up to the nearest integer.
#[must_use]
pub fn round_half_up(value: f64) -> u8 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let rounded = (value + 0.5).floor().clamp(0.0, 100.0) as u8;
    rounded
}

/// Combines a course hierarchy with a user's progress rows into derived
/// completion metrics.
///
/// Rows referencing lessons outside the hierarchy (stale cross-course rows)
/// are skipped, and a lesson id occurring more than once counts a single
/// completion, so `completed_lessons` can never exceed `total_lessons`.
#[must_use]
pub fn aggregate(course: &Course, rows: &[LessonProgress]) -> CourseProgressView {
    let mut completed_ids = HashSet::new();
    let mut time_spent_seconds: u64 = 0;
    let mut score_sum: u64 = 0;
    let mut score_count: u64 = 0;
    let mut last_activity_at: Option<DateTime<Utc>> = None;

    for row in rows {
        if !course.contains_lesson(row.lesson_id()) {
            continue;
        }
        if !completed_ids.insert(row.lesson_id()) {
            continue;
        }
        time_spent_seconds += u64::from(row.time_spent_seconds());
        if let Some(score) = row.score() {
            score_sum += u64::from(score);
            score_count += 1;
        }
        last_activity_at = Some(match last_activity_at {
            Some(latest) => latest.max(row.completed_at()),
            None => row.completed_at(),
        });
    }

    let mut total_lessons = 0;
    let mut completed_lessons = 0;
    let mut total_minutes: u64 = 0;
    let mut completed_minutes: u64 = 0;
    let mut modules = Vec::with_capacity(course.modules().len());

    for module in course.modules() {
        let module_total = module.lesson_count();
        let mut module_completed = 0;

        for lesson in module.lessons() {
            total_minutes += u64::from(lesson.duration_minutes());
            if completed_ids.contains(&lesson.id()) {
                module_completed += 1;
                completed_minutes += u64::from(lesson.duration_minutes());
            }
        }

        total_lessons += module_total;
        completed_lessons += module_completed;
        modules.push(ModuleRollup {
            module_id: module.id(),
            title: module.title().to_owned(),
            total_lessons: module_total,
            completed_lessons: module_completed,
            completion_percent: percent(module_completed, module_total),
        });
    }

    let average_score = if score_count == 0 {
        None
    } else {
        #[allow(clippy::cast_precision_loss)]
        let mean = score_sum as f64 / score_count as f64;
        Some(mean)
    };

    CourseProgressView {
        course_id: course.id(),
        total_lessons,
        completed_lessons,
        completion_percent: percent(completed_lessons, total_lessons),
        total_minutes,
        completed_minutes,
        time_spent_seconds,
        average_score,
        last_activity_at,
        modules,
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
