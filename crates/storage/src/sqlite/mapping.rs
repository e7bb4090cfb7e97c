use course_core::model::{
    CourseId, Enrollment, EnrollmentStatus, LessonId, LessonKind, LessonProgress, ModuleId, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn course_id_from_i64(v: i64) -> Result<CourseId, StorageError> {
    Ok(CourseId::new(i64_to_u64("course_id", v)?))
}

pub(crate) fn module_id_from_i64(v: i64) -> Result<ModuleId, StorageError> {
    Ok(ModuleId::new(i64_to_u64("module_id", v)?))
}

pub(crate) fn lesson_id_from_i64(v: i64) -> Result<LessonId, StorageError> {
    Ok(LessonId::new(i64_to_u64("lesson_id", v)?))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

/// User ids are stored as canonical hyphenated UUID text.
pub(crate) fn user_id_from_str(s: &str) -> Result<UserId, StorageError> {
    s.parse::<UserId>()
        .map_err(|_| StorageError::Serialization(format!("invalid user_id: {s}")))
}

pub(crate) fn parse_lesson_kind(s: &str) -> Result<LessonKind, StorageError> {
    match s {
        "video" => Ok(LessonKind::Video),
        "text" => Ok(LessonKind::Text),
        "audio" => Ok(LessonKind::Audio),
        _ => Err(StorageError::Serialization(format!("invalid lesson kind: {s}"))),
    }
}

/// Must stay consistent with `EnrollmentStatus::as_str`.
pub(crate) fn parse_status(s: &str) -> Result<EnrollmentStatus, StorageError> {
    match s {
        "not_started" => Ok(EnrollmentStatus::NotStarted),
        "in_progress" => Ok(EnrollmentStatus::InProgress),
        "completed" => Ok(EnrollmentStatus::Completed),
        "paused" => Ok(EnrollmentStatus::Paused),
        _ => Err(StorageError::Serialization(format!(
            "invalid enrollment status: {s}"
        ))),
    }
}

pub(crate) fn score_from_row(row: &SqliteRow) -> Result<Option<u8>, StorageError> {
    row.try_get::<Option<i64>, _>("score")
        .map_err(ser)?
        .map(|v| u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid score: {v}"))))
        .transpose()
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<LessonProgress, StorageError> {
    let user: String = row.try_get("user_id").map_err(ser)?;
    let time_spent: i64 = row.try_get("time_spent_seconds").map_err(ser)?;

    LessonProgress::new(
        user_id_from_str(&user)?,
        lesson_id_from_i64(row.try_get::<i64, _>("lesson_id").map_err(ser)?)?,
        row.try_get("completed_at").map_err(ser)?,
        score_from_row(row)?,
        u32_from_i64("time_spent_seconds", time_spent)?,
    )
    .map_err(ser)
}

pub(crate) fn map_enrollment_row(row: &SqliteRow) -> Result<Enrollment, StorageError> {
    let user: String = row.try_get("user_id").map_err(ser)?;
    let status: String = row.try_get("status").map_err(ser)?;

    Ok(Enrollment::from_persisted(
        user_id_from_str(&user)?,
        course_id_from_i64(row.try_get::<i64, _>("course_id").map_err(ser)?)?,
        parse_status(&status)?,
        row.try_get("created_at").map_err(ser)?,
        row.try_get("updated_at").map_err(ser)?,
    ))
}

pub(crate) fn order_index_from_row(row: &SqliteRow) -> Result<u32, StorageError> {
    u32_from_i64("order_index", row.try_get::<i64, _>("order_index").map_err(ser)?)
}

pub(crate) fn duration_from_row(row: &SqliteRow) -> Result<u32, StorageError> {
    u32_from_i64(
        "duration_minutes",
        row.try_get::<i64, _>("duration_minutes").map_err(ser)?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trip_matches_as_str() {
        for status in [
            EnrollmentStatus::NotStarted,
            EnrollmentStatus::InProgress,
            EnrollmentStatus::Completed,
            EnrollmentStatus::Paused,
        ] {
            assert_eq!(parse_status(status.as_str()).unwrap(), status);
        }
        assert!(parse_status("archived").is_err());
    }

    #[test]
    fn lesson_kind_round_trip_matches_as_str() {
        for kind in [LessonKind::Video, LessonKind::Text, LessonKind::Audio] {
            assert_eq!(parse_lesson_kind(kind.as_str()).unwrap(), kind);
        }
        assert!(parse_lesson_kind("hologram").is_err());
    }
}
