use serde::Serialize;
use thiserror::Error;

use crate::model::ids::ModuleId;
use crate::model::lesson::Lesson;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModuleError {
    #[error("module title cannot be empty")]
    EmptyTitle,
}

//
// ─── MODULE ────────────────────────────────────────────────────────────────────
//

/// An ordered group of lessons inside a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Module {
    id: ModuleId,
    title: String,
    order_index: u32,
    lessons: Vec<Lesson>,
}

impl Module {
    /// Creates a module, sorting its lessons into author-defined order.
    ///
    /// # Errors
    ///
    /// Returns `ModuleError::EmptyTitle` if the title is blank.
    pub fn new(
        id: ModuleId,
        title: impl Into<String>,
        order_index: u32,
        mut lessons: Vec<Lesson>,
    ) -> Result<Self, ModuleError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ModuleError::EmptyTitle);
        }
        lessons.sort_by_key(|lesson| (lesson.order_index(), lesson.id()));
        Ok(Self {
            id,
            title,
            order_index,
            lessons,
        })
    }

    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Position within the owning course.
    #[must_use]
    pub fn order_index(&self) -> u32 {
        self.order_index
    }

    /// Lessons in author-defined order.
    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    #[must_use]
    pub fn lesson_count(&self) -> usize {
        self.lessons.len()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
