//! Seeds a local database with a demo course, an enrollment, and a couple of
//! completed lessons so the service layer has something to show.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use course_core::model::{
    Course, CourseId, Lesson, LessonId, LessonKind, LessonProgress, Module, ModuleId, UserId,
};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    course_id: CourseId,
    user_id: UserId,
    completions: u32,
    now: DateTime<Utc>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidCourseId { raw: String },
    InvalidUserId { raw: String },
    InvalidCompletions { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidCourseId { raw } => write!(f, "invalid --course-id value: {raw}"),
            ArgsError::InvalidUserId { raw } => {
                write!(f, "invalid --user value (expected UUID): {raw}")
            }
            ArgsError::InvalidCompletions { raw } => {
                write!(f, "invalid --completions value: {raw}")
            }
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("COURSE_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3?mode=rwc".into());
        let mut course_id = std::env::var("COURSE_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| CourseId::new(1), CourseId::new);
        let mut user_id = std::env::var("COURSE_USER")
            .ok()
            .and_then(|value| value.parse::<UserId>().ok());
        let mut completions = 2_u32;
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    db_url = require_value(&mut args, "--db")?;
                }
                "--course-id" => {
                    let value = require_value(&mut args, "--course-id")?;
                    course_id = value
                        .parse::<u64>()
                        .map(CourseId::new)
                        .map_err(|_| ArgsError::InvalidCourseId { raw: value })?;
                }
                "--user" => {
                    let value = require_value(&mut args, "--user")?;
                    user_id = Some(
                        value
                            .parse::<UserId>()
                            .map_err(|_| ArgsError::InvalidUserId { raw: value })?,
                    );
                }
                "--completions" => {
                    let value = require_value(&mut args, "--completions")?;
                    completions = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidCompletions { raw: value })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    now = Some(
                        value
                            .parse::<DateTime<Utc>>()
                            .map_err(|_| ArgsError::InvalidNow { raw: value })?,
                    );
                }
                other => return Err(ArgsError::UnknownArg(other.to_string())),
            }
        }

        Ok(Self {
            db_url,
            course_id,
            user_id: user_id.unwrap_or_else(UserId::generate),
            completions,
            now: now.unwrap_or_else(Utc::now),
        })
    }
}

fn demo_course(course_id: CourseId) -> Course {
    let base = course_id.value() * 100;
    let m1 = Module::new(
        ModuleId::new(base + 1),
        "Getting Started",
        0,
        vec![
            Lesson::new(LessonId::new(base + 1), "Welcome", LessonKind::Video, 5, 0)
                .expect("valid lesson"),
            Lesson::new(LessonId::new(base + 2), "Installing the Toolchain", LessonKind::Text, 15, 1)
                .expect("valid lesson"),
        ],
    )
    .expect("valid module");
    let m2 = Module::new(
        ModuleId::new(base + 2),
        "Fundamentals",
        1,
        vec![
            Lesson::new(LessonId::new(base + 3), "Ownership", LessonKind::Video, 25, 0)
                .expect("valid lesson"),
            Lesson::new(LessonId::new(base + 4), "Borrowing", LessonKind::Audio, 20, 1)
                .expect("valid lesson"),
        ],
    )
    .expect("valid module");

    Course::new(
        course_id,
        "Rust Fundamentals",
        Some("From zero to ownership".into()),
        "1.0.0",
        6,
        vec![m1, m2],
    )
    .expect("valid course")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse()?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let course = demo_course(args.course_id);
    storage.courses.upsert_course(&course).await?;

    match storage
        .enrollments
        .enroll(args.user_id, course.id(), args.now)
        .await
    {
        Ok(_) => {}
        Err(storage::repository::StorageError::Conflict) => {
            eprintln!("user {} already enrolled, reusing enrollment", args.user_id);
        }
        Err(err) => return Err(err.into()),
    }

    let lessons: Vec<&Lesson> = course.lessons().collect();
    let count = usize::try_from(args.completions).unwrap_or(usize::MAX);
    for (index, lesson) in lessons.iter().take(count).enumerate() {
        let offset = i64::try_from(index).unwrap_or(i64::MAX);
        let row = LessonProgress::new(
            args.user_id,
            lesson.id(),
            args.now + Duration::minutes(offset * 10),
            Some(80),
            lesson.duration_minutes() * 60,
        )?;
        storage.progress.upsert_progress(&row).await?;
    }

    println!(
        "seeded course {} ({} lessons) for user {} with {} completions in {}",
        course.id(),
        course.total_lessons(),
        args.user_id,
        count.min(lessons.len()),
        args.db_url,
    );

    Ok(())
}
