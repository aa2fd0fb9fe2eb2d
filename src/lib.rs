//! # Curriculum Harness
//!
//! Turns a curriculum spreadsheet and a free-form course document into a
//! validated, queryable course record, and grounds text generation in it.
//!
//! The pure pipeline lives in `curriculum-harness-core`; this crate adds
//! file decoding, configuration, the JSON course store, the completion
//! service client, and the `cur` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────┐   ┌──────────────┐
//! │ .xlsx / .json│──▶│ segment → scan → │──▶│ JsonDirStore │
//! │ pages .json  │   │ reconcile → valid│   │ one file/crs │
//! └──────────────┘   └──────────────────┘   └──────┬───────┘
//!                                                  │
//!                      ┌───────────────────────────┤
//!                      ▼                           ▼
//!               ┌──────────────┐           ┌──────────────┐
//!               │ TF-IDF index │──────────▶│  generation  │
//!               │   (search)   │  grounding│  + recovery  │
//!               └──────────────┘           └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! cur ingest --name "Técnico em Desenvolvimento de Sistemas" \
//!     --spreadsheet grade.xlsx --document plano.json
//! cur list
//! cur search "estruturas de repetição"
//! cur generate tecnico-em-desenvolvimento-de-sistemas "Lógica de Programação" \
//!     "Crie uma situação de aprendizagem"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`extract`] | XLSX / JSON grid and page decoding |
//! | [`ingest`] | Ingestion pipeline and report |
//! | [`store`] | JSON-directory course store |
//! | [`search`] | Search over stored courses |
//! | [`get`] | Course retrieval, listing and re-validation |
//! | [`generation`] | Completion service, timeout, retry and grounding |
//! | [`recover_cmd`] | Structured-output recovery on saved text |

pub mod config;
pub mod extract;
pub mod generation;
pub mod get;
pub mod ingest;
pub mod recover_cmd;
pub mod search;
pub mod store;
