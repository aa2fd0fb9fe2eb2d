//! In-memory [`CourseStore`] for tests and dry runs.
//!
//! Uses a `BTreeMap` behind `std::sync::RwLock`, so listings come back in
//! id order.

use std::collections::BTreeMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::Course;

use super::{CourseStore, CourseSummary};

#[derive(Debug, Default)]
pub struct InMemoryCourseStore {
    courses: RwLock<BTreeMap<String, Course>>,
}

impl InMemoryCourseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("course store lock poisoned")
}

#[async_trait]
impl CourseStore for InMemoryCourseStore {
    async fn replace_course(&self, course: &Course) -> Result<()> {
        let mut guard = self.courses.write().map_err(poisoned)?;
        guard.remove(&course.id);
        guard.insert(course.id.clone(), course.clone());
        Ok(())
    }

    async fn get_course(&self, id: &str) -> Result<Option<Course>> {
        let guard = self.courses.read().map_err(poisoned)?;
        Ok(guard.get(id).cloned())
    }

    async fn list_courses(&self) -> Result<Vec<CourseSummary>> {
        let guard = self.courses.read().map_err(poisoned)?;
        Ok(guard.values().map(CourseSummary::from).collect())
    }

    async fn delete_course(&self, id: &str) -> Result<bool> {
        let mut guard = self.courses.write().map_err(poisoned)?;
        Ok(guard.remove(id).is_some())
    }
}
