//! Error types for the core pipeline.

use thiserror::Error;

/// Input-level failures that abort an ingestion batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error("spreadsheet {source_name} has no recognizable module rows (expected a module name column with hour totals)")]
    NoSpreadsheetModules { source_name: String },

    #[error("document {source_name} yielded no modules (no line matched the module heading pattern)")]
    NoDocumentModules { source_name: String },
}

/// Failures loading an extraction dialect.
#[derive(Error, Debug)]
pub enum DialectError {
    #[error("invalid {field} pattern: {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("dialect must list at least one action verb")]
    EmptyVocabulary,

    #[error("failed to parse dialect: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Structured output could not be recovered into a JSON object.
///
/// Position fields refer to the first parse failure on the cleaned-up
/// candidate text, before any normalisation or balancing was attempted.
/// `offset` and `column` count characters, not bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecoveryError {
    #[error("no JSON object found in generated output")]
    NoObject,

    #[error("unparseable structured output at character {offset} (line {line}, column {column}): {message}; near `{context}`")]
    Unparseable {
        offset: usize,
        line: usize,
        column: usize,
        context: String,
        message: String,
    },
}
