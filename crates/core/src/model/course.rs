use std::collections::HashSet;

use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{CourseId, LessonId};
use crate::model::lesson::Lesson;
use crate::model::module::Module;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course title cannot be empty")]
    EmptyTitle,

    #[error("lesson {0} appears more than once in the course")]
    DuplicateLesson(LessonId),
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// The Course→Module→Lesson ownership tree for one course.
///
/// Authored elsewhere and read-only from this subsystem's perspective.
/// Modules and lessons are held in author-defined order; the constructor
/// sorts by order index so callers never depend on input ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Course {
    id: CourseId,
    title: String,
    description: Option<String>,
    version: String,
    estimated_hours: u32,
    modules: Vec<Module>,
}

impl Course {
    /// Creates a course hierarchy.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::EmptyTitle` for a blank title and
    /// `CourseError::DuplicateLesson` when a lesson id appears in more than
    /// one place in the tree. The duplicate check is what lets progress
    /// aggregation treat lesson ids as unique keys.
    pub fn new(
        id: CourseId,
        title: impl Into<String>,
        description: Option<String>,
        version: impl Into<String>,
        estimated_hours: u32,
        mut modules: Vec<Module>,
    ) -> Result<Self, CourseError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CourseError::EmptyTitle);
        }

        let mut seen = HashSet::new();
        for module in &modules {
            for lesson in module.lessons() {
                if !seen.insert(lesson.id()) {
                    return Err(CourseError::DuplicateLesson(lesson.id()));
                }
            }
        }

        modules.sort_by_key(|module| (module.order_index(), module.id()));

        Ok(Self {
            id,
            title,
            description,
            version: version.into(),
            estimated_hours,
            modules,
        })
    }

    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Authored content version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Authored estimate of the whole course, in hours.
    #[must_use]
    pub fn estimated_hours(&self) -> u32 {
        self.estimated_hours
    }

    /// Modules in author-defined order.
    #[must_use]
    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    /// All lessons in author-defined order, flattened across modules.
    pub fn lessons(&self) -> impl Iterator<Item = &Lesson> {
        self.modules.iter().flat_map(|module| module.lessons().iter())
    }

    #[must_use]
    pub fn total_lessons(&self) -> usize {
        self.modules.iter().map(Module::lesson_count).sum()
    }

    /// Looks up a lesson together with its owning module.
    #[must_use]
    pub fn find_lesson(&self, lesson_id: LessonId) -> Option<(&Module, &Lesson)> {
        self.modules.iter().find_map(|module| {
            module
                .lessons()
                .iter()
                .find(|lesson| lesson.id() == lesson_id)
                .map(|lesson| (module, lesson))
        })
    }

    #[must_use]
    pub fn contains_lesson(&self, lesson_id: LessonId) -> bool {
        self.find_lesson(lesson_id).is_some()
    }

    /// First lesson of the first module, if the course has any lessons.
    #[must_use]
    pub fn first_lesson(&self) -> Option<&Lesson> {
        self.modules
            .iter()
            .find_map(|module| module.lessons().first())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
