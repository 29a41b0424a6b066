use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use super::{check_inputs, non_empty, LlmProvider};
use crate::config::DEFAULT_CHAT_URL;
use crate::error::PipelineError;
use crate::http;

/// Adaptor over an OpenAI-compatible `chat/completions` endpoint.
///
/// The default base URL is the Hugging Face router, which forwards to the
/// inference provider named in the model id (e.g. `openai/gpt-oss-20b:groq`).
#[derive(Clone)]
pub struct ChatCompletionProvider {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    content: Option<String>,
}

impl ChatCompletionProvider {
    /// Creates a provider against the Hugging Face router.
    pub fn new(api_key: String) -> Result<Self, PipelineError> {
        Self::new_with_url(api_key, DEFAULT_CHAT_URL, None)
    }

    /// Creates a provider against any OpenAI-compatible host.
    ///
    /// # Arguments
    ///
    /// * `api_key` - Bearer token, usually `HF_TOKEN`.
    /// * `base_url` - Host the `v1/chat/completions` path is joined onto.
    /// * `timeout` - Per-request timeout; `None` keeps the reqwest default.
    ///
    /// # Errors
    ///
    /// - `PipelineError::Config` if the key is not valid header text.
    /// - `PipelineError::UrlParseFailed` if `base_url` is invalid.
    pub fn new_with_url(
        api_key: String,
        base_url: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, PipelineError> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, http::bearer(&api_key)?);

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
        let url = self.base_url.join("v1/chat/completions")?;
        let body = ChatRequest {
            model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_instruction,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self.client.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(http::api_error(response).await);
        }

        let parsed: ChatResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content);
        non_empty(content)
    }
}

#[async_trait]
impl LlmProvider for ChatCompletionProvider {
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        system_instruction: &str,
    ) -> Result<String, PipelineError> {
        check_inputs(prompt, system_instruction)?;
        tracing::debug!(model, "requesting chat completion draft");
        self.request(prompt, model, system_instruction)
            .await
            .inspect_err(|e| tracing::error!(model, error = %e, "chat completion failed"))
    }
}
