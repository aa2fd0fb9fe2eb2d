//! TOML configuration for the `cur` binary.
//!
//! Every section is optional. A missing file yields the built-in defaults,
//! so `cur ingest` works out of the box against `./data/courses`.
//!
//! ```toml
//! [store]
//! dir = "./data/courses"
//!
//! [extraction]
//! column_threshold = 300.0
//! line_tolerance = 4.0
//! vertical_origin = "bottom"
//! match_prefix_len = 20
//! dialect = "./config/dialect.toml"
//!
//! [spreadsheet]
//! name = 5
//! hours = 6
//!
//! [retrieval]
//! final_limit = 8
//! grounding_k = 6
//! include_methodology = true
//!
//! [generation]
//! provider = "openai"
//! model = "gpt-4o-mini"
//! timeout_secs = 60
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use curriculum_harness_core::dialect::{Dialect, DialectConfig};
use curriculum_harness_core::reconcile::MatchParams;
use curriculum_harness_core::segment::{SegmentParams, VerticalOrigin};
use curriculum_harness_core::sheet::SheetLayout;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub spreadsheet: SheetLayout,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("./data/courses")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_column_threshold")]
    pub column_threshold: f64,
    #[serde(default = "default_line_tolerance")]
    pub line_tolerance: f64,
    #[serde(default)]
    pub vertical_origin: VerticalOrigin,
    #[serde(default = "default_match_prefix_len")]
    pub match_prefix_len: usize,
    /// Optional TOML file replacing the built-in Portuguese dialect.
    #[serde(default)]
    pub dialect: Option<PathBuf>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            column_threshold: default_column_threshold(),
            line_tolerance: default_line_tolerance(),
            vertical_origin: VerticalOrigin::default(),
            match_prefix_len: default_match_prefix_len(),
            dialect: None,
        }
    }
}

fn default_column_threshold() -> f64 {
    300.0
}
fn default_line_tolerance() -> f64 {
    4.0
}
fn default_match_prefix_len() -> usize {
    20
}

impl ExtractionConfig {
    pub fn segment_params(&self) -> SegmentParams {
        SegmentParams {
            column_threshold: self.column_threshold,
            line_tolerance: self.line_tolerance,
            vertical_origin: self.vertical_origin,
        }
    }

    pub fn match_params(&self) -> MatchParams {
        MatchParams {
            prefix_chars: self.match_prefix_len,
        }
    }

    /// Compile the configured dialect, or the built-in one.
    pub fn load_dialect(&self) -> Result<Dialect> {
        match &self.dialect {
            Some(path) => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read dialect file: {}", path.display()))?;
                let dialect = DialectConfig::from_toml_str(&content)
                    .and_then(|d| d.compile())
                    .with_context(|| format!("Invalid dialect file: {}", path.display()))?;
                debug!(path = %path.display(), "loaded dialect");
                Ok(dialect)
            }
            None => DialectConfig::default()
                .compile()
                .context("Built-in dialect failed to compile"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
    /// Snippets placed in a generation prompt.
    #[serde(default = "default_grounding_k")]
    pub grounding_k: usize,
    #[serde(default = "default_true")]
    pub include_methodology: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            final_limit: default_final_limit(),
            grounding_k: default_grounding_k(),
            include_methodology: true,
        }
    }
}

fn default_final_limit() -> usize {
    8
}
fn default_grounding_k() -> usize {
    6
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Upper bound for one completion call, including HTTP retries.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// HTTP-level retries on 429/5xx/network errors.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Whole-generation attempts (timeout or unrecoverable output).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    3
}
fn default_max_attempts() -> u32 {
    3
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

/// Load and validate the configuration at `path`.
///
/// A missing file is not an error: defaults apply.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config = parse_config(&content)?;
    Ok(config)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let ex = &config.extraction;
    if !(ex.column_threshold > 0.0) {
        bail!("extraction.column_threshold must be > 0");
    }
    if !(ex.line_tolerance > 0.0) {
        bail!("extraction.line_tolerance must be > 0");
    }
    if ex.match_prefix_len == 0 {
        bail!("extraction.match_prefix_len must be > 0");
    }

    if config.retrieval.final_limit < 1 {
        bail!("retrieval.final_limit must be >= 1");
    }

    let gen = &config.generation;
    if gen.timeout_secs == 0 {
        bail!("generation.timeout_secs must be > 0");
    }
    if gen.max_attempts == 0 {
        bail!("generation.max_attempts must be >= 1");
    }
    match gen.provider.as_str() {
        "disabled" => {}
        "openai" => {
            if gen.model.is_none() {
                bail!("generation.model must be specified when provider is 'openai'");
            }
        }
        other => bail!(
            "Unknown generation provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(())
}
