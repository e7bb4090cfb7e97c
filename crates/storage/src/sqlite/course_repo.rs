use std::collections::HashMap;

use course_core::model::{Course, CourseId, Lesson, LessonId, Module, ModuleId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    course_id_from_i64, duration_from_row, id_i64, lesson_id_from_i64, module_id_from_i64,
    order_index_from_row, parse_lesson_kind, ser,
};
use crate::repository::{CourseRepository, StorageError};

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        let course_id = id_i64("course_id", course.id().value())?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        sqlx::query(
            r"
            INSERT INTO courses (id, title, description, version, estimated_hours)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                version = excluded.version,
                estimated_hours = excluded.estimated_hours
            ",
        )
        .bind(course_id)
        .bind(course.title().to_owned())
        .bind(course.description().map(ToOwned::to_owned))
        .bind(course.version().to_owned())
        .bind(i64::from(course.estimated_hours()))
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        for module in course.modules() {
            let module_id = id_i64("module_id", module.id().value())?;
            sqlx::query(
                r"
                INSERT INTO modules (id, course_id, title, order_index)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    course_id = excluded.course_id,
                    title = excluded.title,
                    order_index = excluded.order_index
                ",
            )
            .bind(module_id)
            .bind(course_id)
            .bind(module.title().to_owned())
            .bind(i64::from(module.order_index()))
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

            for lesson in module.lessons() {
                sqlx::query(
                    r"
                    INSERT INTO lessons (id, module_id, title, kind, duration_minutes, order_index)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                    ON CONFLICT(id) DO UPDATE SET
                        module_id = excluded.module_id,
                        title = excluded.title,
                        kind = excluded.kind,
                        duration_minutes = excluded.duration_minutes,
                        order_index = excluded.order_index
                    ",
                )
                .bind(id_i64("lesson_id", lesson.id().value())?)
                .bind(module_id)
                .bind(lesson.title().to_owned())
                .bind(lesson.kind().as_str())
                .bind(i64::from(lesson.duration_minutes()))
                .bind(i64::from(lesson.order_index()))
                .execute(&mut *tx)
                .await
                .map_err(|e| StorageError::Connection(e.to_string()))?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Course, StorageError> {
        let course_id = id_i64("course_id", id.value())?;

        let course_row = sqlx::query(
            r"
            SELECT id, title, description, version, estimated_hours
            FROM courses WHERE id = ?1
            ",
        )
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        let module_rows = sqlx::query(
            r"
            SELECT id, title, order_index
            FROM modules
            WHERE course_id = ?1
            ORDER BY order_index ASC, id ASC
            ",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let lesson_rows = sqlx::query(
            r"
            SELECT l.id, l.module_id, l.title, l.kind, l.duration_minutes, l.order_index
            FROM lessons l
            JOIN modules m ON l.module_id = m.id
            WHERE m.course_id = ?1
            ORDER BY l.order_index ASC, l.id ASC
            ",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut lessons_by_module: HashMap<ModuleId, Vec<Lesson>> = HashMap::new();
        for row in &lesson_rows {
            let module_id = module_id_from_i64(row.try_get::<i64, _>("module_id").map_err(ser)?)?;
            let lesson = Lesson::new(
                lesson_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
                row.try_get::<String, _>("title").map_err(ser)?,
                parse_lesson_kind(row.try_get::<String, _>("kind").map_err(ser)?.as_str())?,
                duration_from_row(row)?,
                order_index_from_row(row)?,
            )
            .map_err(ser)?;
            lessons_by_module.entry(module_id).or_default().push(lesson);
        }

        let mut modules = Vec::with_capacity(module_rows.len());
        for row in &module_rows {
            let module_id = module_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
            let lessons = lessons_by_module.remove(&module_id).unwrap_or_default();
            modules.push(
                Module::new(
                    module_id,
                    row.try_get::<String, _>("title").map_err(ser)?,
                    order_index_from_row(row)?,
                    lessons,
                )
                .map_err(ser)?,
            );
        }

        let estimated_hours: i64 = course_row.try_get("estimated_hours").map_err(ser)?;
        Course::new(
            course_id_from_i64(course_row.try_get::<i64, _>("id").map_err(ser)?)?,
            course_row.try_get::<String, _>("title").map_err(ser)?,
            course_row
                .try_get::<Option<String>, _>("description")
                .map_err(ser)?,
            course_row.try_get::<String, _>("version").map_err(ser)?,
            u32::try_from(estimated_hours)
                .map_err(|_| StorageError::Serialization("estimated_hours overflow".into()))?,
            modules,
        )
        .map_err(ser)
    }

    async fn course_for_lesson(&self, lesson_id: LessonId) -> Result<Course, StorageError> {
        let row = sqlx::query(
            r"
            SELECT m.course_id
            FROM lessons l
            JOIN modules m ON l.module_id = m.id
            WHERE l.id = ?1
            ",
        )
        .bind(id_i64("lesson_id", lesson_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?
        .ok_or(StorageError::NotFound)?;

        let course_id = course_id_from_i64(row.try_get::<i64, _>("course_id").map_err(ser)?)?;
        self.get_course(course_id).await
    }

    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError> {
        let rows = sqlx::query("SELECT id FROM courses ORDER BY id ASC LIMIT ?1")
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut courses = Vec::with_capacity(rows.len());
        for row in rows {
            let id = course_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
            courses.push(self.get_course(id).await?);
        }
        Ok(courses)
    }
}
