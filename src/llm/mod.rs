//! Prompt-drafting adaptors.
//!
//! Each adaptor wraps one vendor's text-generation API behind the single
//! [`LlmProvider::generate`] capability. The vendor is picked once from
//! configuration with [`from_config`].

mod chat;
mod gemini;

pub use chat::ChatCompletionProvider;
pub use gemini::GeminiProvider;

use async_trait::async_trait;

use crate::config::{LlmConfig, LlmVendor};
use crate::error::PipelineError;

/// Generates text from a prompt and a system instruction.
///
/// Implementations never retry. A transport or vendor failure is logged
/// and returned as `Err`; a successful call always yields non-empty text.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        model: &str,
        system_instruction: &str,
    ) -> Result<String, PipelineError>;
}

/// Builds the adaptor for `vendor` from the LLM section of the configuration.
pub fn from_config(
    vendor: LlmVendor,
    config: &LlmConfig,
    timeout: Option<std::time::Duration>,
) -> Result<Box<dyn LlmProvider>, PipelineError> {
    let provider: Box<dyn LlmProvider> = match vendor {
        LlmVendor::Gemini => {
            let key = config
                .gemini_api_key
                .clone()
                .ok_or(PipelineError::MissingApiKey("GEMINI_API_KEY"))?;
            Box::new(GeminiProvider::new_with_url(
                key,
                &config.gemini_base_url,
                timeout,
            )?)
        }
        LlmVendor::ChatCompletion => {
            let key = config
                .hf_token
                .clone()
                .ok_or(PipelineError::MissingApiKey("HF_TOKEN"))?;
            Box::new(ChatCompletionProvider::new_with_url(
                key,
                &config.chat_base_url,
                timeout,
            )?)
        }
    };
    Ok(provider)
}

pub(crate) fn check_inputs(prompt: &str, system_instruction: &str) -> Result<(), PipelineError> {
    if prompt.trim().is_empty() {
        return Err(PipelineError::EmptyInput("prompt"));
    }
    if system_instruction.trim().is_empty() {
        return Err(PipelineError::EmptyInput("system instruction"));
    }
    Ok(())
}

pub(crate) fn non_empty(text: Option<String>) -> Result<String, PipelineError> {
    match text {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        _ => Err(PipelineError::EmptyResponse),
    }
}
