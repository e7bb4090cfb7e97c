use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{CourseId, UserId};

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Lifecycle of a user's membership in a course.
///
/// Every status except `Paused` is derived from the progress rows for the
/// (user, course) pair; `Paused` is an explicit user action owned by a flow
/// outside this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    NotStarted,
    InProgress,
    Completed,
    Paused,
}

impl EnrollmentStatus {
    /// Storage representation of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EnrollmentStatus::NotStarted => "not_started",
            EnrollmentStatus::InProgress => "in_progress",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Paused => "paused",
        }
    }

    /// Applies the status transition rule for a lesson-completion event.
    ///
    /// With every lesson complete (and a non-empty course) the enrollment
    /// becomes `Completed`; a `NotStarted` enrollment moves to `InProgress`;
    /// anything else keeps its current status. In particular a `Paused`
    /// enrollment is not silently resumed by a completion event.
    #[must_use]
    pub fn after_completion(self, completed_lessons: usize, total_lessons: usize) -> Self {
        if completed_lessons == total_lessons && total_lessons > 0 {
            EnrollmentStatus::Completed
        } else if self == EnrollmentStatus::NotStarted {
            EnrollmentStatus::InProgress
        } else {
            self
        }
    }
}

//
// ─── ENROLLMENT ────────────────────────────────────────────────────────────────
//

/// The per-(user, course) membership record.
///
/// Created by the enrollment flow before this core ever runs; the status is
/// only mutated through the completion orchestrator's reconciliation step or
/// the explicit pause flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enrollment {
    user_id: UserId,
    course_id: CourseId,
    status: EnrollmentStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Enrollment {
    /// Creates a fresh enrollment in `NotStarted`.
    #[must_use]
    pub fn new(user_id: UserId, course_id: CourseId, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            course_id,
            status: EnrollmentStatus::NotStarted,
            created_at: at,
            updated_at: at,
        }
    }

    /// Rebuilds an enrollment from persisted fields.
    #[must_use]
    pub fn from_persisted(
        user_id: UserId,
        course_id: CourseId,
        status: EnrollmentStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            course_id,
            status,
            created_at,
            updated_at,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn status(&self) -> EnrollmentStatus {
        self.status
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns a copy with the given status and refreshed `updated_at`.
    #[must_use]
    pub fn with_status(&self, status: EnrollmentStatus, at: DateTime<Utc>) -> Self {
        Self {
            status,
            updated_at: at,
            ..self.clone()
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
