//! Ingestion pipeline orchestration.
//!
//! Coordinates one ingestion run: read both inputs → fingerprint →
//! spreadsheet fold → page segmentation → document scan (barrier) →
//! reconciliation → validation → store. A course whose report carries
//! errors is never stored.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, info_span, warn};
use uuid::Uuid;

use curriculum_harness_core::dialect::Dialect;
use curriculum_harness_core::error::IngestError;
use curriculum_harness_core::models::{Course, ValidationReport};
use curriculum_harness_core::reconcile::{reconcile, MatchParams};
use curriculum_harness_core::scan::scan_document;
use curriculum_harness_core::segment::{segment_page, Page, SegmentParams, SegmentedPage};
use curriculum_harness_core::sheet::{read_modules, SheetLayout};
use curriculum_harness_core::store::CourseStore;
use curriculum_harness_core::text::slugify;
use curriculum_harness_core::validate::validate_course;

use crate::config::Config;
use crate::extract::{document_pages, spreadsheet_rows, SpreadsheetFormat};
use crate::store::JsonDirStore;

/// Everything the pure part of the pipeline needs besides the inputs.
pub struct Pipeline<'a> {
    pub dialect: &'a Dialect,
    pub layout: &'a SheetLayout,
    pub segment: &'a SegmentParams,
    pub matching: &'a MatchParams,
}

/// An assembled course and what was learned while building it.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub course: Course,
    pub report: ValidationReport,
    pub pages: usize,
    pub skipped_rows: usize,
}

/// Labels used in hard errors.
pub struct SourceNames<'a> {
    pub spreadsheet: &'a str,
    pub document: &'a str,
}

impl Pipeline<'_> {
    /// Build and validate a course from decoded inputs.
    pub fn assemble(
        &self,
        name: &str,
        competency: Option<&str>,
        rows: &[Vec<String>],
        pages: &[Page],
        sources: &SourceNames<'_>,
        fingerprint: &str,
        ingested_at: DateTime<Utc>,
    ) -> Result<Assembly, IngestError> {
        let sheet = read_modules(rows, self.layout, self.dialect);
        if sheet.modules.is_empty() {
            return Err(IngestError::NoSpreadsheetModules {
                source_name: sources.spreadsheet.to_string(),
            });
        }

        let segmented: Vec<SegmentedPage> =
            pages.iter().map(|p| segment_page(p, self.segment)).collect();
        let scan = scan_document(&segmented, self.dialect);
        if scan.modules.is_empty() {
            return Err(IngestError::NoDocumentModules {
                source_name: sources.document.to_string(),
            });
        }

        let reconciled = reconcile(sheet.modules, &scan.modules, self.matching);
        let total_hours = reconciled
            .modules
            .iter()
            .filter_map(|m| m.hours)
            .fold(0u32, u32::saturating_add);
        let general_competency = match competency {
            Some(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => scan.general_competency.clone(),
        };

        let course = Course {
            id: slugify(name),
            name: name.trim().to_string(),
            total_hours,
            general_competency,
            modules: reconciled.modules,
            ingested_at,
            source_fingerprint: fingerprint.to_string(),
        };

        let mut report = validate_course(&course);
        report.extend_warnings(sheet.warnings);
        report.extend_warnings(scan.warnings);
        report.extend_warnings(reconciled.warnings);

        Ok(Assembly {
            course,
            report,
            pages: scan.pages,
            skipped_rows: sheet.skipped_rows,
        })
    }
}

/// SHA-256 over the spreadsheet bytes followed by the document bytes.
pub fn fingerprint(spreadsheet: &[u8], document: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((spreadsheet.len() as u64).to_le_bytes());
    hasher.update(spreadsheet);
    hasher.update(document);
    format!("{:x}", hasher.finalize())
}

pub struct IngestRequest {
    pub name: String,
    pub spreadsheet: PathBuf,
    pub document: PathBuf,
    pub competency: Option<String>,
    pub dry_run: bool,
}

/// Summary printed after a run (and emitted as JSON with `--json`).
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub run_id: String,
    pub course_id: String,
    pub course_name: String,
    pub modules: usize,
    pub capabilities: usize,
    pub knowledge_topics: usize,
    pub total_hours: u32,
    pub pages: usize,
    pub skipped_rows: usize,
    pub fingerprint: String,
    pub dry_run: bool,
    pub stored: bool,
    pub validation: ValidationReport,
}

async fn read_input(path: &Path, what: &str) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {} {}", what, path.display()))
}

/// Run the full pipeline for one course.
pub async fn run_ingest(config: &Config, req: &IngestRequest) -> Result<IngestReport> {
    let run_id = Uuid::new_v4().to_string();
    let span = info_span!("ingest", run = %run_id, course = %req.name);
    let _guard = span.enter();

    let dialect = config.extraction.load_dialect()?;
    let format = SpreadsheetFormat::from_path(&req.spreadsheet)?;
    let sheet_bytes = read_input(&req.spreadsheet, "spreadsheet").await?;
    let doc_bytes = read_input(&req.document, "document").await?;

    let rows = spreadsheet_rows(&sheet_bytes, format)
        .with_context(|| format!("Failed to decode spreadsheet {}", req.spreadsheet.display()))?;
    let pages = document_pages(&doc_bytes)
        .with_context(|| format!("Failed to decode document {}", req.document.display()))?;
    info!(rows = rows.len(), pages = pages.len(), "inputs decoded");

    let spreadsheet_label = req.spreadsheet.display().to_string();
    let document_label = req.document.display().to_string();
    let segment = config.extraction.segment_params();
    let matching = config.extraction.match_params();
    let pipeline = Pipeline {
        dialect: &dialect,
        layout: &config.spreadsheet,
        segment: &segment,
        matching: &matching,
    };
    let assembly = pipeline.assemble(
        &req.name,
        req.competency.as_deref(),
        &rows,
        &pages,
        &SourceNames {
            spreadsheet: &spreadsheet_label,
            document: &document_label,
        },
        &fingerprint(&sheet_bytes, &doc_bytes),
        Utc::now(),
    )?;

    let course = &assembly.course;
    let mut stored = false;
    if !assembly.report.valid {
        warn!(errors = assembly.report.errors.len(), "course failed validation, not stored");
    } else if !req.dry_run {
        let store = JsonDirStore::new(&config.store.dir);
        store.replace_course(course).await?;
        stored = true;
        info!(modules = course.modules.len(), "course stored");
    }

    Ok(IngestReport {
        run_id,
        course_id: course.id.clone(),
        course_name: course.name.clone(),
        modules: course.modules.len(),
        capabilities: course.modules.iter().map(|m| m.capabilities.len()).sum(),
        knowledge_topics: course.modules.iter().map(|m| m.knowledge.len()).sum(),
        total_hours: course.total_hours,
        pages: assembly.pages,
        skipped_rows: assembly.skipped_rows,
        fingerprint: course.source_fingerprint.clone(),
        dry_run: req.dry_run,
        stored,
        validation: assembly.report,
    })
}

/// Human-readable report on stdout.
pub fn print_report(report: &IngestReport) {
    if report.dry_run {
        println!("ingest {} (dry-run)", report.course_name);
    } else {
        println!("ingest {}", report.course_name);
    }
    println!("  run: {}", report.run_id);
    println!("  course id: {}", report.course_id);
    println!("  modules: {}", report.modules);
    println!("  capabilities: {}", report.capabilities);
    println!("  knowledge topics: {}", report.knowledge_topics);
    println!("  total hours: {}", report.total_hours);
    println!("  pages scanned: {}", report.pages);
    println!("  skipped rows: {}", report.skipped_rows);
    println!("  warnings: {}", report.validation.warnings.len());
    for w in &report.validation.warnings {
        println!("    - {}", w);
    }
    if !report.validation.errors.is_empty() {
        println!("  errors: {}", report.validation.errors.len());
        for e in &report.validation.errors {
            println!("    - {}", e);
        }
    }
    if report.stored {
        println!("ok");
    } else if !report.validation.valid {
        println!("invalid: course not stored");
    } else {
        println!("dry run: course not stored");
    }
}
