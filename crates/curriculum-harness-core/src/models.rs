//! Core curriculum data models.
//!
//! A [`Course`] exclusively owns its [`Module`]s; each module owns its
//! [`Capability`] statements and [`KnowledgeTopic`] hierarchy. These types
//! flow out of the ingestion pipeline, into the course store, and into the
//! retrieval index.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A course assembled from one spreadsheet + document batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    /// Slug of `name`; stable across re-ingestion.
    pub id: String,
    pub name: String,
    /// Sum of the modules' total hours.
    pub total_hours: u32,
    /// Free-text "general competency" statement.
    #[serde(default)]
    pub general_competency: String,
    #[serde(default)]
    pub modules: Vec<Module>,
    pub ingested_at: DateTime<Utc>,
    /// SHA-256 of the source inputs, hex encoded.
    #[serde(default)]
    pub source_fingerprint: String,
}

impl Course {
    /// Find a module by name, comparing case- and accent-insensitively.
    pub fn module(&self, name: &str) -> Option<&Module> {
        let key = crate::text::fold(name);
        self.modules
            .iter()
            .find(|m| crate::text::fold(&m.name) == key)
    }
}

/// A curricular unit with a fixed hour allocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub name: String,
    /// Tier label from the spreadsheet, e.g. `"1º ANO"`.
    #[serde(default)]
    pub tier: String,
    /// Module category, e.g. `"Introdutório"` or `"Específico I"`.
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub sequence: Option<String>,
    /// Total hours. `None` when the spreadsheet cell was missing or unreadable.
    #[serde(default)]
    pub hours: Option<u32>,
    #[serde(default)]
    pub in_person_hours: Option<u32>,
    #[serde(default)]
    pub remote_hours: Option<u32>,
    #[serde(default)]
    pub objective: String,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub knowledge: Vec<KnowledgeTopic>,
}

/// Which block of the document a capability statement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityCategory {
    Basic,
    Technical,
    Socioemotional,
}

impl CapabilityCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapabilityCategory::Basic => "basic",
            CapabilityCategory::Technical => "technical",
            CapabilityCategory::Socioemotional => "socioemotional",
        }
    }
}

impl fmt::Display for CapabilityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An action-verb competency statement, e.g. `CT1 Aplicar estruturas de repetição…`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub code: String,
    pub category: CapabilityCategory,
    pub description: String,
}

/// A numbered knowledge topic (`"1"`) with its subtopics (`"1.1"`, `"1.2"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeTopic {
    pub code: String,
    pub title: String,
    #[serde(default)]
    pub subtopics: Vec<KnowledgeSubtopic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeSubtopic {
    pub code: String,
    pub title: String,
}

impl fmt::Display for KnowledgeTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.title)
    }
}

impl fmt::Display for KnowledgeSubtopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.title)
    }
}

/// Module enrichment recovered from the free-form document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentModule {
    pub name: String,
    pub objective: String,
    pub capabilities: Vec<Capability>,
    pub knowledge: Vec<KnowledgeTopic>,
}

/// Validation outcome for an ingested course.
///
/// `errors` make the batch invalid; `warnings` are data-quality notes for
/// human review and never block storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Append warnings collected by earlier pipeline stages.
    pub fn extend_warnings<I: IntoIterator<Item = String>>(&mut self, warnings: I) {
        self.warnings.extend(warnings);
    }
}
