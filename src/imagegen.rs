//! Text-to-image generation, one request per camera viewpoint.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use url::Url;

use crate::config::DEFAULT_IMAGE_URL;
use crate::error::PipelineError;
use crate::http;
use crate::types::GeneratedImage;
use crate::viewpoint::Viewpoint;

/// A backend that renders one image for a text prompt.
#[async_trait]
pub trait TextToImage: Send + Sync {
    /// Returns the encoded image bytes.
    async fn text_to_image(&self, prompt: &str, model: &str) -> Result<Vec<u8>, PipelineError>;
}

/// Client for the Hugging Face inference `models/{model}` endpoint.
#[derive(Clone)]
pub struct HfInferenceClient {
    client: reqwest::Client,
    base_url: Url,
}

#[derive(Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

impl HfInferenceClient {
    /// Creates a client against the hosted `hf-inference` router.
    pub fn new(api_key: String) -> Result<Self, PipelineError> {
        Self::new_with_url(api_key, DEFAULT_IMAGE_URL, None)
    }

    /// Creates a client with a custom base URL (e.g., a mock server).
    ///
    /// # Arguments
    ///
    /// * `api_key` - Bearer token for the inference endpoint.
    /// * `base_url` - Host the `models/{model}` path is joined onto.
    /// * `timeout` - Per-request timeout; `None` keeps the reqwest default.
    pub fn new_with_url(
        api_key: String,
        base_url: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, PipelineError> {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, http::bearer(&api_key)?);
        headers.insert(ACCEPT, HeaderValue::from_static("image/png"));

        Ok(Self {
            client: http::build_client(headers, timeout)?,
            base_url: http::base_url(base_url)?,
        })
    }
}

#[async_trait]
impl TextToImage for HfInferenceClient {
    async fn text_to_image(&self, prompt: &str, model: &str) -> Result<Vec<u8>, PipelineError> {
        let url = self.base_url.join(&format!("models/{}", model))?;
        let response = self
            .client
            .post(url)
            .json(&InferenceRequest { inputs: prompt })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(http::api_error(response).await);
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type.starts_with("image/") {
            return Err(PipelineError::InvalidImage { content_type });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Requests one image per viewpoint for an accepted prompt and saves each
/// as `<viewpoint>.png` under the output directory.
pub struct ViewpointImageRequester<'a> {
    backend: &'a dyn TextToImage,
    model: String,
    output_dir: PathBuf,
}

impl<'a> ViewpointImageRequester<'a> {
    /// # Arguments
    ///
    /// * `backend` - Renders each viewpoint.
    /// * `model` - Model id passed to every request.
    /// * `output_dir` - Where `<viewpoint>.png` files are written. Created if missing.
    pub fn new(
        backend: &'a dyn TextToImage,
        model: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Generates every viewpoint in [`Viewpoint::ALL`] order, one at a time.
    ///
    /// The first failure stops the run; images already saved stay on disk.
    ///
    /// # Errors
    ///
    /// - `PipelineError::EmptyInput` if `prompt` is blank.
    /// - `PipelineError::ViewpointFailed` naming the viewpoint that failed.
    pub async fn request_all(&self, prompt: &str) -> Result<Vec<GeneratedImage>, PipelineError> {
        if prompt.trim().is_empty() {
            return Err(PipelineError::EmptyInput("accepted prompt"));
        }
        fs::create_dir_all(&self.output_dir).await?;

        let mut images = Vec::with_capacity(Viewpoint::ALL.len());
        for viewpoint in Viewpoint::ALL {
            let image = self
                .request_one(viewpoint, prompt)
                .await
                .map_err(|e| {
                    tracing::error!(%viewpoint, error = %e, "image generation failed");
                    PipelineError::ViewpointFailed {
                        viewpoint,
                        source: Box::new(e),
                    }
                })?;
            images.push(image);
        }
        Ok(images)
    }

    async fn request_one(
        &self,
        viewpoint: Viewpoint,
        prompt: &str,
    ) -> Result<GeneratedImage, PipelineError> {
        let request = viewpoint.request_prompt(prompt);
        tracing::info!(%viewpoint, model = %self.model, "generating image");
        let bytes = self.backend.text_to_image(&request, &self.model).await?;

        let path = self.output_dir.join(viewpoint.file_name());
        fs::write(&path, &bytes).await?;
        tracing::info!(%viewpoint, path = %path.display(), bytes = bytes.len(), "saved image");

        Ok(GeneratedImage { viewpoint, path })
    }
}
