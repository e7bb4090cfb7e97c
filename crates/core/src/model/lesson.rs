use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::LessonId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson title cannot be empty")]
    EmptyTitle,
}

//
// ─── CONTENT KIND ──────────────────────────────────────────────────────────────
//

/// Delivery format of a lesson's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LessonKind {
    Video,
    Text,
    Audio,
}

impl LessonKind {
    /// Storage representation of the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LessonKind::Video => "video",
            LessonKind::Text => "text",
            LessonKind::Audio => "audio",
        }
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// A single unit of course content.
///
/// Lessons belong to exactly one module and are ordered within it by
/// `order_index`. The duration is an authored estimate used for course-level
/// time rollups, not a measured value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lesson {
    id: LessonId,
    title: String,
    kind: LessonKind,
    duration_minutes: u32,
    order_index: u32,
}

impl Lesson {
    /// Creates a lesson.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::EmptyTitle` if the title is blank.
    pub fn new(
        id: LessonId,
        title: impl Into<String>,
        kind: LessonKind,
        duration_minutes: u32,
        order_index: u32,
    ) -> Result<Self, LessonError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(LessonError::EmptyTitle);
        }
        Ok(Self {
            id,
            title,
            kind,
            duration_minutes,
            order_index,
        })
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn kind(&self) -> LessonKind {
        self.kind
    }

    /// Authored estimate of how long the lesson takes, in minutes.
    #[must_use]
    pub fn duration_minutes(&self) -> u32 {
        self.duration_minutes
    }

    /// Position within the owning module.
    #[must_use]
    pub fn order_index(&self) -> u32 {
        self.order_index
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
