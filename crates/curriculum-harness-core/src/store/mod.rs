//! Storage abstraction for curriculum records.
//!
//! The [`CourseStore`] trait is the seam between the pure pipeline and
//! wherever courses are persisted. Writes are whole-course: re-ingesting a
//! course deletes the previous record and inserts the new one, so a stored
//! course never mixes modules from two ingestion runs.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::models::Course;

/// Lightweight listing entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseSummary {
    pub id: String,
    pub name: String,
    pub modules: usize,
    pub total_hours: u32,
    pub ingested_at: String,
}

impl From<&Course> for CourseSummary {
    fn from(course: &Course) -> Self {
        Self {
            id: course.id.clone(),
            name: course.name.clone(),
            modules: course.modules.len(),
            total_hours: course.total_hours,
            ingested_at: course.ingested_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        }
    }
}

/// Abstract course storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`replace_course`](CourseStore::replace_course) | Delete-then-insert by course id |
/// | [`get_course`](CourseStore::get_course) | Fetch one course |
/// | [`list_courses`](CourseStore::list_courses) | Summaries ordered by id |
/// | [`delete_course`](CourseStore::delete_course) | Remove a course, reporting whether it existed |
#[async_trait]
pub trait CourseStore: Send + Sync {
    /// Replace every stored record for `course.id` with `course`.
    async fn replace_course(&self, course: &Course) -> Result<()>;

    async fn get_course(&self, id: &str) -> Result<Option<Course>>;

    async fn list_courses(&self) -> Result<Vec<CourseSummary>>;

    async fn delete_course(&self, id: &str) -> Result<bool>;

    /// Every stored course, in id order.
    async fn all_courses(&self) -> Result<Vec<Course>> {
        let mut courses = Vec::new();
        for summary in self.list_courses().await? {
            if let Some(course) = self.get_course(&summary.id).await? {
                courses.push(course);
            }
        }
        Ok(courses)
    }
}
