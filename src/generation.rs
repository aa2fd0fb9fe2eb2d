//! Grounded structured generation through an external completion service.
//!
//! The service itself is opaque: it takes a prompt and returns text. This
//! module puts a hard timeout around every call, runs the text through
//! structured-output recovery, and retries failures that a second attempt
//! may fix.
//!
//! # Retry Strategy
//!
//! Two layers:
//! - **HTTP** ([`OpenAiCompletion`]): HTTP 429, 5xx and network errors are
//!   retried with exponential backoff (1s, 2s, 4s, ... capped at 2^5);
//!   other 4xx responses fail immediately.
//! - **Generation** ([`generate_with_retry`]): a timeout, a service failure
//!   or unrecoverable output starts a fresh attempt, up to `max_attempts`.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use curriculum_harness_core::error::RecoveryError;
use curriculum_harness_core::models::{Course, Module};
use curriculum_harness_core::recover::{recover_object, Recovered};
use curriculum_harness_core::search::{grounding_context, RetrievalIndex};
use curriculum_harness_core::store::CourseStore;

use crate::config::{Config, GenerationConfig};
use crate::store::JsonDirStore;

const SYSTEM_PROMPT: &str = "Você é um especialista em planejamento de ensino técnico. \
Use apenas os fatos fornecidos no contexto. Responda com um único objeto JSON válido, sem texto adicional.";

/// A text-completion backend.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Model identifier, for logs.
    fn model_name(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("completion service did not answer within {0:?}")]
    Timeout(Duration),

    #[error("completion service failed: {0}")]
    Service(String),

    #[error(transparent)]
    Recovery(#[from] RecoveryError),
}

impl GenerationError {
    /// All variants are retryable; a fresh sample may parse where the last did not.
    pub fn is_retryable(&self) -> bool {
        match self {
            GenerationError::Timeout(_) => true,
            GenerationError::Service(_) => true,
            GenerationError::Recovery(_) => true,
        }
    }
}

/// One call to the service, bounded by `timeout`, with recovery applied.
pub async fn generate_structured(
    service: &dyn CompletionService,
    prompt: &str,
    timeout: Duration,
) -> Result<Recovered, GenerationError> {
    let raw = tokio::time::timeout(timeout, service.complete(prompt))
        .await
        .map_err(|_| GenerationError::Timeout(timeout))?
        .map_err(|e| GenerationError::Service(format!("{:#}", e)))?;
    debug!(model = service.model_name(), bytes = raw.len(), "completion received");
    let recovered = recover_object(&raw)?;
    debug!(stage = ?recovered.stage, "structured output recovered");
    Ok(recovered)
}

/// [`generate_structured`] with up to `max_attempts` tries.
pub async fn generate_with_retry(
    service: &dyn CompletionService,
    prompt: &str,
    timeout: Duration,
    max_attempts: u32,
) -> Result<Recovered, GenerationError> {
    let attempts = max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match generate_structured(service, prompt, timeout).await {
            Ok(recovered) => return Ok(recovered),
            Err(e) if e.is_retryable() && attempt < attempts => {
                warn!(attempt, max_attempts = attempts, error = %e, "generation attempt failed, retrying");
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Compose a prompt from module facts, the top `k` grounding snippets for
/// this course, and the instruction.
pub fn build_grounded_prompt(
    index: &RetrievalIndex,
    course: &Course,
    module: &Module,
    instruction: &str,
    k: usize,
) -> String {
    let query = format!("{} {} {}", module.name, module.objective, instruction);
    let hits = index.search_where(&query, k, |meta| {
        meta.course_id.as_deref().map_or(true, |id| id == course.id)
    });

    let mut prompt = String::new();
    prompt.push_str(&format!("Curso: {}\n", course.name));
    if !course.general_competency.is_empty() {
        prompt.push_str(&format!("Competência geral: {}\n", course.general_competency));
    }
    prompt.push_str(&format!("Módulo: {}\n", module.name));
    if let Some(hours) = module.hours {
        prompt.push_str(&format!("Carga horária: {}h\n", hours));
    }
    if !module.objective.is_empty() {
        prompt.push_str(&format!("Objetivo: {}\n", module.objective));
    }
    if !module.capabilities.is_empty() {
        prompt.push_str("\nCapacidades:\n");
        for cap in &module.capabilities {
            prompt.push_str(&format!("- {} {}\n", cap.code, cap.description));
        }
    }
    if !module.knowledge.is_empty() {
        prompt.push_str("\nConhecimentos:\n");
        for topic in &module.knowledge {
            prompt.push_str(&format!("- {}\n", topic));
            for sub in &topic.subtopics {
                prompt.push_str(&format!("  - {}\n", sub));
            }
        }
    }
    if !hits.is_empty() {
        prompt.push_str("\nContexto de referência:\n");
        prompt.push_str(&grounding_context(&hits));
    }
    prompt.push_str("\nTarefa: ");
    prompt.push_str(instruction.trim());
    prompt.push_str("\n\nResponda somente com um objeto JSON.\n");
    prompt
}

// ============ OpenAI-compatible service ============

/// Chat-completions client for OpenAI-compatible endpoints.
///
/// The API key is read from the environment variable named by
/// `generation.api_key_env` (default `OPENAI_API_KEY`).
pub struct OpenAiCompletion {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_retries: u32,
}

impl OpenAiCompletion {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for OpenAI provider"))?;
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", config.api_key_env))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            model,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletion {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
        });
        let json = self.send_with_backoff(&body).await?;
        parse_chat_response(&json)
    }
}

/// Result of a single HTTP round trip.
enum Exchange {
    Reply(serde_json::Value),
    Transient(anyhow::Error),
    Fatal(anyhow::Error),
}

impl OpenAiCompletion {
    async fn exchange(&self, body: &serde_json::Value) -> Exchange {
        let response = match self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Exchange::Transient(e.into()),
        };

        let status = response.status();
        if status.is_success() {
            return match response.json().await {
                Ok(json) => Exchange::Reply(json),
                Err(e) => Exchange::Fatal(anyhow::Error::new(e).context("unreadable completion response")),
            };
        }
        let detail = response.text().await.unwrap_or_default();
        let err = anyhow::anyhow!("completion API error {}: {}", status, detail);
        if is_transient(status) {
            Exchange::Transient(err)
        } else {
            Exchange::Fatal(err)
        }
    }

    /// POST `body`, sleeping [`backoff_delay`] between transient failures.
    async fn send_with_backoff(&self, body: &serde_json::Value) -> Result<serde_json::Value> {
        let mut retries = 0u32;
        loop {
            match self.exchange(body).await {
                Exchange::Reply(json) => return Ok(json),
                Exchange::Fatal(e) => return Err(e),
                Exchange::Transient(e) if retries >= self.max_retries => {
                    return Err(e.context(format!(
                        "completion failed after {} retries",
                        self.max_retries
                    )));
                }
                Exchange::Transient(e) => {
                    let delay = backoff_delay(retries);
                    warn!(retry = retries + 1, ?delay, error = %e, "transient completion failure");
                    tokio::time::sleep(delay).await;
                    retries += 1;
                }
            }
        }
    }
}

/// Rate limiting and server-side failures are worth another try.
fn is_transient(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// 1s, 2s, 4s, ... capped at 32s.
fn backoff_delay(retry: u32) -> Duration {
    Duration::from_secs(1 << retry.min(5))
}

/// Extract `choices[0].message.content`.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid completion response: missing choices[0].message.content"))
}

/// Create the configured [`CompletionService`].
pub fn create_service(config: &GenerationConfig) -> Result<Box<dyn CompletionService>> {
    if !config.is_enabled() {
        bail!(
            "Generation is disabled. Set [generation] provider = \"openai\" and a model in the config file."
        );
    }
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAiCompletion::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

/// CLI entry point for `cur generate`.
pub async fn run_generate(
    config: &Config,
    course_id: &str,
    module_name: &str,
    instruction: &str,
) -> Result<()> {
    let store = JsonDirStore::new(&config.store.dir);
    let course = store
        .get_course(course_id)
        .await?
        .with_context(|| format!("course not found: {}", course_id))?;
    let module = course
        .module(module_name)
        .with_context(|| format!("module '{}' not found in course {}", module_name, course_id))?;

    let courses = store.all_courses().await?;
    let index = RetrievalIndex::from_courses(&courses, config.retrieval.include_methodology);
    let prompt = build_grounded_prompt(
        &index,
        &course,
        module,
        instruction,
        config.retrieval.grounding_k,
    );

    let service = create_service(&config.generation)?;
    info!(model = service.model_name(), module = %module.name, "generating");
    let recovered = generate_with_retry(
        service.as_ref(),
        &prompt,
        Duration::from_secs(config.generation.timeout_secs),
        config.generation.max_attempts,
    )
    .await?;

    println!("{}", serde_json::to_string_pretty(&recovered.value)?);
    Ok(())
}
