//! Spreadsheet reading: turns the module grid into [`Module`] records.
//!
//! The spreadsheet is the authoritative module list. Rows are read with a
//! fold whose state carries the last non-blank tier, period, and category
//! cells forward, because those columns are usually merged vertically and
//! only the first row of a merged block holds the value.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dialect::Dialect;
use crate::models::Module;
use crate::text::{collapse_whitespace, fold};

/// Zero-based column positions of the module grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetLayout {
    pub tier: usize,
    pub period: usize,
    pub category: usize,
    pub sequence: usize,
    pub name: usize,
    pub hours: usize,
    pub in_person_hours: usize,
    pub remote_hours: usize,
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            tier: 0,
            period: 1,
            category: 2,
            sequence: 4,
            name: 5,
            hours: 6,
            in_person_hours: 7,
            remote_hours: 8,
        }
    }
}

/// Values carried forward from earlier rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowContext {
    pub tier: String,
    pub period: String,
    pub category: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Header,
    Summary,
    NoName,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    Module(Module),
    Skipped(SkipReason),
}

/// Modules read from the spreadsheet plus row statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetScan {
    pub modules: Vec<Module>,
    pub skipped_rows: usize,
    pub warnings: Vec<String>,
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|s| s.trim()).unwrap_or("")
}

/// Parse the leading number of an hours cell: `"80"`, `"80h"`, `"80,0"`, `"40.5 h"`.
pub fn parse_hours(raw: &str) -> Option<u32> {
    let s = raw.trim();
    let end = s
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == ','))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    let number = s[..end].replace(',', ".");
    let value: f64 = number.parse().ok()?;
    let rounded = value.round();
    if rounded.is_finite() && (0.0..=f64::from(u32::MAX)).contains(&rounded) {
        Some(rounded as u32)
    } else {
        None
    }
}

/// Read one row against the carried context.
pub fn read_row(
    ctx: RowContext,
    row: &[String],
    layout: &SheetLayout,
    dialect: &Dialect,
) -> (RowContext, RowOutcome) {
    if row.iter().any(|c| dialect.is_summary_cell(c)) {
        return (ctx, RowOutcome::Skipped(SkipReason::Summary));
    }
    let name = collapse_whitespace(cell(row, layout.name));
    if dialect.is_header_cell(&name) {
        return (ctx, RowOutcome::Skipped(SkipReason::Header));
    }

    let carry = |previous: String, idx: usize| {
        let value = cell(row, idx);
        if value.is_empty() {
            previous
        } else {
            collapse_whitespace(value)
        }
    };
    let ctx = RowContext {
        tier: carry(ctx.tier, layout.tier),
        period: carry(ctx.period, layout.period),
        category: carry(ctx.category, layout.category),
    };

    if !name.chars().any(|c| c.is_alphabetic()) {
        return (ctx, RowOutcome::Skipped(SkipReason::NoName));
    }

    let sequence = cell(row, layout.sequence);
    let module = Module {
        name,
        tier: ctx.tier.clone(),
        category: ctx.category.clone(),
        period: ctx.period.clone(),
        sequence: (!sequence.is_empty()).then(|| sequence.to_string()),
        hours: parse_hours(cell(row, layout.hours)),
        in_person_hours: parse_hours(cell(row, layout.in_person_hours)),
        remote_hours: parse_hours(cell(row, layout.remote_hours)),
        ..Module::default()
    };
    (ctx, RowOutcome::Module(module))
}

/// Fold every row into the authoritative module list.
pub fn read_modules(rows: &[Vec<String>], layout: &SheetLayout, dialect: &Dialect) -> SheetScan {
    let (_, mut scan) = rows.iter().enumerate().fold(
        (RowContext::default(), SheetScan::default()),
        |(ctx, mut scan), (idx, row)| {
            let (ctx, outcome) = read_row(ctx, row, layout, dialect);
            match outcome {
                RowOutcome::Module(module) => scan.modules.push(module),
                RowOutcome::Skipped(reason) => {
                    debug!(row = idx + 1, ?reason, "skipped spreadsheet row");
                    scan.skipped_rows += 1;
                }
            }
            (ctx, scan)
        },
    );

    let mut seen = HashSet::new();
    for module in &scan.modules {
        if !seen.insert(fold(&module.name)) {
            scan.warnings.push(format!(
                "spreadsheet lists module '{}' more than once",
                module.name
            ));
        }
    }
    scan
}
