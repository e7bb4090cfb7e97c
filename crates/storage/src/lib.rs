#![forbid(unsafe_code)]

//! Persistence for course progress tracking: repository contracts, an
//! in-memory backend for tests and prototyping, and the `SQLite` backend.

pub mod repository;
pub mod sqlite;

pub use repository::{
    CompletionPersistence, CourseRepository, EnrollmentRepository, InMemoryRepository,
    ProgressRepository, Storage, StorageError,
};
