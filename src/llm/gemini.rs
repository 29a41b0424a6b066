use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::{check_inputs, non_empty, LlmProvider};
use crate::config::DEFAULT_GEMINI_URL;
use crate::error::PipelineError;
use crate::http;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Adaptor over the hosted `generateContent` endpoint.
#[derive(Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: Content<'a>,
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Debug)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        Some(text)
    }
}

impl GeminiProvider {
    /// Creates a provider against the public Gemini endpoint.
    ///
    /// # Errors
    ///
    /// `PipelineError::Config` if the key is not valid header text.
    pub fn new(api_key: String) -> Result<Self, PipelineError> {
        Self::new_with_url(api_key, DEFAULT_GEMINI_URL, None)
    }

    /// Creates a provider against a custom base URL (e.g., a mock server).
    ///
    /// # Arguments
    ///
    /// * `api_key` - Sent as the `x-goog-api-key` header.
    /// * `base_url` - Host the `v1beta/models/...` path is joined onto. A
    ///   missing trailing slash is added.
    /// * `timeout` - Per-request timeout; `None` keeps the reqwest default.
    ///
    /// # Errors
    ///
    /// - `PipelineError::Config` if the key is not valid header text.
    /// - `PipelineError::UrlParseFailed` if `base_url` is invalid.
    /// - `PipelineError::RequestFailed` if the HTTP client fails to build.
    pub fn new_with_url(
        api_key: String,
        base_url: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, PipelineError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&api_key)
            .map_err(|_| PipelineError::Config("GEMINI_API_KEY is not valid header text".into()))?;
        headers.insert(HeaderName::from_static(API_KEY_HEADER), key);

        Ok(Self {
            client: http::build_client(headers, timeout)?,
            base_url: http::base_url(base_url)?,
        })
    }

    async fn request(
        &self,
        prompt: &str,
        model: &str,
        system_instruction: &str,
    ) -> Result<String, PipelineError> {
        let url = self
            .base_url
            .join(&format!("v1beta/models/{}:generateContent", model))?;
        let body = GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: [Part {
                    text: system_instruction,
                }],
            },
            contents: [Content {
                role: Some("user"),
                parts: [Part { text: prompt }],
            }],
        };

        let response = self.client.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(http::api_error(response).await);
        }

        let parsed: GenerateContentResponse = response.json().await?;
        if parsed.candidates.is_empty() {
            if let Some(reason) = parsed
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.as_deref())
            {
                return Err(PipelineError::ApiError {
                    message: format!("prompt blocked: {}", reason),
                });
            }
        }
        non_empty(parsed.text())
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        system_instruction: &str,
    ) -> Result<String, PipelineError> {
        check_inputs(prompt, system_instruction)?;
        tracing::debug!(model, "requesting Gemini draft");
        self.request(prompt, model, system_instruction)
            .await
            .inspect_err(|e| tracing::error!(model, error = %e, "Gemini generation failed"))
    }
}
