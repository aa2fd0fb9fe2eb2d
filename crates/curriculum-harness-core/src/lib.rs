//! # Curriculum Harness Core
//!
//! Pure logic for Curriculum Harness: curriculum data models, layout-aware
//! page segmentation, lexical entity extraction, spreadsheet reading,
//! multi-source reconciliation, validation, the in-memory retrieval index,
//! and recovery of structured output returned by text-generation services.
//!
//! This crate performs no filesystem or network I/O. Everything here is a
//! function of its inputs, which keeps extraction reproducible and lets the
//! application crate decide where documents come from and where courses go.
//!
//! ## Pipeline
//!
//! ```text
//! pages ──▶ segment ──▶ scan (fold) ──▶ extract ─┐
//!                                                ├──▶ reconcile ──▶ Course ──▶ validate
//! rows  ──────────────▶ sheet (fold) ────────────┘                   │
//!                                                                    ▼
//!                                                            RetrievalIndex
//! ```

pub mod dialect;
pub mod error;
pub mod extract;
pub mod methodology;
pub mod models;
pub mod reconcile;
pub mod recover;
pub mod scan;
pub mod search;
pub mod segment;
pub mod sheet;
pub mod store;
pub mod text;
pub mod validate;
