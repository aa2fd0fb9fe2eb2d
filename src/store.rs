//! Filesystem [`CourseStore`]: one pretty-printed JSON file per course.
//!
//! Writes go to a temporary file in the same directory and are renamed
//! over the target, so a reader never sees a half-written course and a
//! re-ingested course fully replaces the previous record.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use curriculum_harness_core::models::Course;
use curriculum_harness_core::store::{CourseStore, CourseSummary};

pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn course_path(&self, id: &str) -> Result<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
        if !valid {
            bail!("invalid course id: '{}'", id);
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }

    async fn read_course(path: &Path) -> Result<Course> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt course record: {}", path.display()))
    }
}

#[async_trait]
impl CourseStore for JsonDirStore {
    async fn replace_course(&self, course: &Course) -> Result<()> {
        let target = self.course_path(&course.id)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create store directory {}", self.dir.display()))?;

        let json = serde_json::to_vec_pretty(course)?;
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", course.id, Uuid::new_v4()));
        tokio::fs::write(&tmp, &json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("Failed to replace {}", target.display()));
        }
        debug!(course = %course.id, path = %target.display(), "course stored");
        Ok(())
    }

    async fn get_course(&self, id: &str) -> Result<Option<Course>> {
        let path = self.course_path(id)?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        Ok(Some(Self::read_course(&path).await?))
    }

    async fn list_courses(&self) -> Result<Vec<CourseSummary>> {
        if !tokio::fs::try_exists(&self.dir).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to list {}", self.dir.display()))?;

        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = path.extension().and_then(|e| e.to_str()) == Some("json")
                && !entry.file_name().to_string_lossy().starts_with('.');
            if !is_record {
                continue;
            }
            let course = Self::read_course(&path).await?;
            summaries.push(CourseSummary::from(&course));
        }
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }

    async fn delete_course(&self, id: &str) -> Result<bool> {
        let path = self.course_path(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }
}
