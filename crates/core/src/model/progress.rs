use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::model::ids::{LessonId, UserId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("score must be between 0 and 100, got {0}")]
    ScoreOutOfRange(u8),
}

//
// ─── PROGRESS ROW ──────────────────────────────────────────────────────────────
//

/// A per-(user, lesson) record of completion.
///
/// There is at most one row per (user, lesson) pair; re-completing a lesson
/// overwrites score and time spent and refreshes the timestamp. The row does
/// not reference its module or course, so aggregation joins through the
/// hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonProgress {
    user_id: UserId,
    lesson_id: LessonId,
    completed_at: DateTime<Utc>,
    score: Option<u8>,
    time_spent_seconds: u32,
}

impl LessonProgress {
    /// Creates a completed progress row.
    ///
    /// Validation runs here so an out-of-range score is rejected before
    /// anything reaches storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::ScoreOutOfRange` if the score exceeds 100.
    pub fn new(
        user_id: UserId,
        lesson_id: LessonId,
        completed_at: DateTime<Utc>,
        score: Option<u8>,
        time_spent_seconds: u32,
    ) -> Result<Self, ProgressError> {
        if let Some(score) = score {
            if score > 100 {
                return Err(ProgressError::ScoreOutOfRange(score));
            }
        }
        Ok(Self {
            user_id,
            lesson_id,
            completed_at,
            score,
            time_spent_seconds,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    #[must_use]
    pub fn score(&self) -> Option<u8> {
        self.score
    }

    #[must_use]
    pub fn time_spent_seconds(&self) -> u32 {
        self.time_spent_seconds
    }

    /// Returns a copy whose timestamp is clamped to be no earlier than the
    /// given floor. Completion timestamps are monotonic non-decreasing
    /// across repeated completions; repositories use this when overwriting
    /// an existing row.
    #[must_use]
    pub fn clamped_after(&self, floor: DateTime<Utc>) -> Self {
        Self {
            completed_at: self.completed_at.max(floor),
            ..self.clone()
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
