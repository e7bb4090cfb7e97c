#![forbid(unsafe_code)]

//! Domain model and pure derivation logic for course progress tracking:
//! the course hierarchy, enrollment and progress records, completion
//! aggregation, and resumption. Everything fallible at runtime lives in the
//! storage and services crates; this crate has no I/O.

pub mod aggregate;
pub mod model;
pub mod resume;
pub mod time;

pub use aggregate::{aggregate, CourseProgressView, ModuleRollup};
pub use resume::resolve_current_lesson;
pub use time::Clock;
