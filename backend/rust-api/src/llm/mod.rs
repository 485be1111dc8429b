//! Text-completion collaborator and the "ask for JSON, fall back" policy.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::metrics::LLM_FALLBACKS_TOTAL;

pub mod hosted;

pub use hosted::HostedCompletionClient;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("completion transport error: {0}")]
    Transport(String),
    #[error("completion endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion endpoint returned no text")]
    EmptyResponse,
    #[error("malformed completion output: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl GenerationParams {
    pub const fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature,
            max_tokens,
        }
    }
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, CollaboratorError>;
}

lazy_static! {
    static ref CODE_FENCE: Regex =
        Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)```").expect("valid code fence regex");
}

/// Candidate JSON payloads in free-form model output.
///
/// Models wrap JSON in markdown fences or chatter around it. Each opening
/// bracket, in order, yields the span up to the last matching closer.
pub fn json_candidates(raw: &str) -> impl Iterator<Item = &str> {
    let text = CODE_FENCE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw)
        .trim();

    text.match_indices(['{', '['])
        .filter_map(move |(start, opener)| {
            let closer = if opener == "{" { '}' } else { ']' };
            let end = text.rfind(closer)?;
            (end > start).then(|| &text[start..=end])
        })
}

/// Deserializes the first candidate payload that parses as `T`.
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, CollaboratorError> {
    let mut last_error = None;
    for candidate in json_candidates(raw) {
        match serde_json::from_str(candidate) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = Some(e.to_string()),
        }
    }
    Err(CollaboratorError::Malformed(
        last_error.unwrap_or_else(|| "no JSON payload in output".to_string()),
    ))
}

pub async fn complete_json<T: DeserializeOwned>(
    client: &dyn CompletionClient,
    prompt: &str,
    params: GenerationParams,
) -> Result<T, CollaboratorError> {
    let raw = client.complete(prompt, params).await?;
    parse_json(&raw)
}

/// Resolves a collaborator result, substituting deterministic content on
/// failure. Never propagates the error.
pub fn recover<T>(
    result: Result<T, CollaboratorError>,
    kind: &str,
    fallback: impl FnOnce(&CollaboratorError) -> T,
) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!("Completion for {} failed, using fallback: {}", kind, err);
            LLM_FALLBACKS_TOTAL.with_label_values(&[kind]).inc();
            fallback(&err)
        }
    }
}
