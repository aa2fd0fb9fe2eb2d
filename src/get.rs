//! Course retrieval commands: `cur get`, `cur list` and `cur validate`.

use anyhow::{bail, Result};

use curriculum_harness_core::models::{Course, ValidationReport};
use curriculum_harness_core::store::CourseStore;
use curriculum_harness_core::validate::validate_course;

use crate::config::Config;
use crate::store::JsonDirStore;

/// Fetch a stored course or fail with a not-found error.
pub async fn get_course(config: &Config, id: &str) -> Result<Course> {
    let store = JsonDirStore::new(&config.store.dir);
    match store.get_course(id).await? {
        Some(course) => Ok(course),
        None => bail!("course not found: {}", id),
    }
}

/// CLI entry point: print the stored course as JSON.
pub async fn run_get(config: &Config, id: &str) -> Result<()> {
    let course = get_course(config, id).await?;
    println!("{}", serde_json::to_string_pretty(&course)?);
    Ok(())
}

/// CLI entry point: list stored courses.
pub async fn run_list(config: &Config) -> Result<()> {
    let store = JsonDirStore::new(&config.store.dir);
    let courses = store.list_courses().await?;
    if courses.is_empty() {
        println!("No courses stored in {}.", store.dir().display());
        return Ok(());
    }
    println!("{:<40} {:>7} {:>6}  {:<20}  NAME", "ID", "MODULES", "HOURS", "INGESTED");
    for c in &courses {
        println!(
            "{:<40} {:>7} {:>6}  {:<20}  {}",
            c.id, c.modules, c.total_hours, c.ingested_at, c.name
        );
    }
    Ok(())
}

/// CLI entry point: re-run validation over a stored course.
///
/// Returns the report so the caller can pick the exit code.
pub async fn run_validate(config: &Config, id: &str, json: bool) -> Result<ValidationReport> {
    let course = get_course(config, id).await?;
    let report = validate_course(&course);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report);
    }

    println!("validate {}", course.id);
    println!("  modules: {}", course.modules.len());
    println!("  warnings: {}", report.warnings.len());
    for w in &report.warnings {
        println!("    - {}", w);
    }
    println!("  errors: {}", report.errors.len());
    for e in &report.errors {
        println!("    - {}", e);
    }
    println!("{}", if report.valid { "valid" } else { "invalid" });
    Ok(report)
}
