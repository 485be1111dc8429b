use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::{CollaboratorError, CompletionClient, GenerationParams};
use crate::config::LlmConfig;
use crate::metrics::LLM_REQUESTS_TOTAL;
use crate::utils::retry::{retry_async_with_config, RetryConfig};

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    temperature: f32,
    max_new_tokens: u32,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct Generation {
    generated_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InferenceResponse {
    Batch(Vec<Generation>),
    Single(Generation),
}

impl InferenceResponse {
    fn into_text(self) -> Option<String> {
        match self {
            InferenceResponse::Batch(items) => items.into_iter().next().map(|g| g.generated_text),
            InferenceResponse::Single(g) => Some(g.generated_text),
        }
    }
}

/// Client for a hosted text-generation inference endpoint
/// (`POST {api_url}/models/{model}`).
pub struct HostedCompletionClient {
    http: Client,
    endpoint: Url,
    api_token: Option<String>,
    temperature: Option<f32>,
    max_tokens: u32,
    retry: RetryConfig,
}

impl HostedCompletionClient {
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: model_endpoint(&config.api_url, &config.model)?,
            api_token: config.api_token.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retry: RetryConfig::completion(),
        })
    }
}

fn model_endpoint(api_url: &str, model: &str) -> anyhow::Result<Url> {
    let mut base = api_url.trim_end_matches('/').to_string();
    base.push('/');
    let url = Url::parse(&base)?.join(&format!("models/{}", model))?;
    Ok(url)
}

#[async_trait]
impl CompletionClient for HostedCompletionClient {
    async fn complete(
        &self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, CollaboratorError> {
        let body = InferenceRequest {
            inputs: prompt,
            parameters: InferenceParameters {
                temperature: self.temperature.unwrap_or(params.temperature),
                max_new_tokens: params.max_tokens.min(self.max_tokens),
                return_full_text: false,
            },
        };

        tracing::debug!(
            "Calling completion endpoint {} (prompt {} chars)",
            self.endpoint,
            prompt.len()
        );

        let response = retry_async_with_config(self.retry.clone(), || async {
            let mut request = self.http.post(self.endpoint.clone()).json(&body);
            if let Some(token) = &self.api_token {
                request = request.bearer_auth(token);
            }
            request.send().await
        })
        .await
        .map_err(|e| {
            LLM_REQUESTS_TOTAL.with_label_values(&["transport_error"]).inc();
            CollaboratorError::Transport(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            LLM_REQUESTS_TOTAL.with_label_values(&["http_error"]).inc();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CollaboratorError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: InferenceResponse = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Malformed(e.to_string()))?;

        LLM_REQUESTS_TOTAL.with_label_values(&["success"]).inc();

        parsed
            .into_text()
            .filter(|text| !text.trim().is_empty())
            .ok_or(CollaboratorError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_model_path() {
        let url = model_endpoint("https://api-inference.huggingface.co", "google/flan-t5-base")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api-inference.huggingface.co/models/google/flan-t5-base"
        );

        let nested = model_endpoint("http://localhost:8000/llm/", "tiny").unwrap();
        assert_eq!(nested.as_str(), "http://localhost:8000/llm/models/tiny");
    }

    #[test]
    fn response_accepts_batch_and_single_shapes() {
        let batch: InferenceResponse =
            serde_json::from_str(r#"[{"generated_text": "one"}, {"generated_text": "two"}]"#)
                .unwrap();
        assert_eq!(batch.into_text().as_deref(), Some("one"));

        let single: InferenceResponse =
            serde_json::from_str(r#"{"generated_text": "solo"}"#).unwrap();
        assert_eq!(single.into_text().as_deref(), Some("solo"));
    }
}
