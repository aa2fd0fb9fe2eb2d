//! `cur search`: rank stored course entities and methodology entries.
//!
//! The index is rebuilt from the store on every invocation; the corpus is
//! a few hundred documents at most.

use anyhow::Result;

use curriculum_harness_core::search::{EntityKind, RetrievalIndex, SearchHit};
use curriculum_harness_core::store::CourseStore;

use crate::config::Config;
use crate::store::JsonDirStore;

/// Search options from the command line.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub limit: Option<usize>,
    /// Restrict course entities to this course id (methodology stays).
    pub course: Option<String>,
    pub no_methodology: bool,
}

/// Core search returning structured hits (used by the CLI and tests).
pub async fn search_courses(
    config: &Config,
    query: &str,
    opts: &SearchOptions,
) -> Result<Vec<SearchHit>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }
    let store = JsonDirStore::new(&config.store.dir);
    let courses = store.all_courses().await?;
    let include_methodology = config.retrieval.include_methodology && !opts.no_methodology;
    let index = RetrievalIndex::from_courses(&courses, include_methodology);
    let limit = opts.limit.unwrap_or(config.retrieval.final_limit);

    let hits = match opts.course.as_deref() {
        Some(course) => index.search_where(query, limit, |meta| {
            meta.kind == EntityKind::Methodology || meta.course_id.as_deref() == Some(course)
        }),
        None => index.search(query, limit),
    };
    Ok(hits)
}

/// CLI entry point: prints ranked results.
pub async fn run_search(config: &Config, query: &str, opts: &SearchOptions, json: bool) -> Result<()> {
    let hits = search_courses(config, query, opts).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.2}] {} / {}", i + 1, hit.score, hit.meta.kind, hit.meta.title);
        if let Some(ref course) = hit.meta.course_id {
            println!("    course: {}", course);
        }
        if let Some(ref module) = hit.meta.module {
            println!("    module: {}", module);
        }
        if !hit.meta.text.is_empty() {
            println!("    excerpt: \"{}\"", excerpt(&hit.meta.text));
        }
        println!("    id: {}", hit.id);
        println!();
    }
    Ok(())
}

fn excerpt(text: &str) -> String {
    let flat = text.replace('\n', " ");
    let trimmed = flat.trim();
    if trimmed.chars().count() <= 240 {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(240).collect();
    format!("{}…", cut.trim_end())
}
