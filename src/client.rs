use crate::config::DEFAULT_TRIPO_URL;
use crate::error::PipelineError;
use crate::http;
use crate::types::{
    ApiResponse, Balance, FileContent, ImageTaskRequest, MultiviewTaskRequest, ResultFile,
    StandardUploadData, TaskResponse, TaskStatus, WatchMessage,
};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use serde::Serialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue as WsHeaderValue;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::multipart;
use tokio::fs::File;
use tokio_util::codec::{BytesCodec, FramedRead};

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$").unwrap()
});

/// An image handed to the reconstruction service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    /// A publicly reachable image URL.
    Url(String),
    /// A token returned by a previous upload.
    FileToken(String),
    /// A local file, uploaded before the task is created.
    Path(PathBuf),
}

impl ImageInput {
    /// Classifies `image` as a URL (`http://`/`https://`), a file token (a
    /// lowercase UUID), or otherwise a local path.
    pub fn parse(image: &str) -> Self {
        if image.starts_with("http://") || image.starts_with("https://") {
            ImageInput::Url(image.to_string())
        } else if UUID_RE.is_match(image) {
            ImageInput::FileToken(image.to_string())
        } else {
            ImageInput::Path(PathBuf::from(image))
        }
    }
}

impl From<PathBuf> for ImageInput {
    fn from(path: PathBuf) -> Self {
        ImageInput::Path(path)
    }
}

/// Client for the hosted image-to-3D reconstruction API.
///
/// It holds the shared `reqwest::Client` and the base URL for all API requests.
/// It is cloneable and safe to share across threads.
#[derive(Clone)]
pub struct ReconstructionClient {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl ReconstructionClient {
    /// Creates a client against the public API.
    ///
    /// The key comes from `api_key`, falling back to the `TRIPO_API_KEY`
    /// environment variable.
    ///
    /// # Errors
    ///
    /// - `PipelineError::MissingApiKey` if the API key is not provided in either way.
    /// - `PipelineError::RequestFailed` if the internal HTTP client fails to build.
    pub fn new(api_key: Option<String>) -> Result<Self, PipelineError> {
        let Some(key) = api_key.or_else(|| env::var("TRIPO_API_KEY").ok()) else {
            return Err(PipelineError::MissingApiKey("TRIPO_API_KEY"));
        };
        Self::new_with_url(key, DEFAULT_TRIPO_URL, None)
    }

    /// Creates a client with a custom base URL (e.g., a mock server).
    ///
    /// `base_url` should end with a slash; endpoint paths are joined onto it.
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
            api_key,
        })
    }

    /// Uploads a local image as multipart form data and returns its file token.
    pub async fn upload_file<P: AsRef<Path>>(&self, image_path: P) -> Result<String, PipelineError> {
        let image_path = image_path.as_ref();
        let url = self.base_url.join("upload/sts")?;

        let file = File::open(image_path).await?;
        let stream = FramedRead::new(file, BytesCodec::new());
        let file_body = reqwest::Body::wrap_stream(stream);

        let file_name = image_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                PipelineError::IoError(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("Could not determine file name of {}", image_path.display()),
                ))
            })?
            .to_string();

        let mime_type = mime_guess::from_path(image_path)
            .first_or_octet_stream()
            .to_string();

        let file_part = multipart::Part::stream(file_body)
            .file_name(file_name)
            .mime_str(&mime_type)?;
        let form = multipart::Form::new().part("file", file_part);

        let response = self.client.post(url).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(http::api_error(response).await);
        }
        let api_response: ApiResponse<StandardUploadData> = response.json().await?;
        tracing::info!(path = %image_path.display(), "uploaded image");
        Ok(api_response.data.image_token)
    }

    /// Resolves an [`ImageInput`] into the task's file descriptor, uploading
    /// local files first.
    pub async fn file_content(&self, input: &ImageInput) -> Result<FileContent, PipelineError> {
        let content = match input {
            ImageInput::Url(url) => FileContent {
                type_: "jpeg".to_string(),
                url: Some(url.clone()),
                ..Default::default()
            },
            ImageInput::FileToken(token) => FileContent {
                type_: "jpeg".to_string(),
                file_token: Some(token.clone()),
                ..Default::default()
            },
            ImageInput::Path(path) => {
                if !path.exists() {
                    return Err(PipelineError::IoError(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("Image file not found: {}", path.display()),
                    )));
                }
                let file_token = self.upload_file(path).await?;
                let extension = path
                    .extension()
                    .and_then(|s| s.to_str())
                    .unwrap_or("jpeg")
                    .to_string();
                FileContent {
                    type_: extension,
                    file_token: Some(file_token),
                    ..Default::default()
                }
            }
        };
        Ok(content)
    }

    /// Submits an image-to-model task.
    ///
    /// `image` may be a URL, a file token, or a path to a local file, which
    /// is uploaded first.
    pub async fn image_to_model(&self, image: &str) -> Result<TaskResponse, PipelineError> {
        self.image_input_to_model(&ImageInput::parse(image)).await
    }

    /// Submits an image-to-model task for an already classified input.
    ///
    /// # Arguments
    ///
    /// * `image` - The input image; a [`ImageInput::Path`] is uploaded first.
    ///
    /// # Returns
    ///
    /// A [`TaskResponse`] containing the ID of the newly created task.
    pub async fn image_input_to_model(
        &self,
        image: &ImageInput,
    ) -> Result<TaskResponse, PipelineError> {
        let file = self.file_content(image).await?;
        self.create_task(&ImageTaskRequest {
            type_: "image_to_model",
            file,
        })
        .await
    }

    /// Submits a multiview-to-model task.
    ///
    /// Views are ordered front, left, back, right; `None` leaves a slot empty.
    /// The front view is required by the service.
    pub async fn multiview_to_model(
        &self,
        views: [Option<ImageInput>; 4],
    ) -> Result<TaskResponse, PipelineError> {
        let mut files: [FileContent; 4] = Default::default();
        for (slot, view) in files.iter_mut().zip(views.iter()) {
            if let Some(view) = view {
                *slot = self.file_content(view).await?;
            }
        }
        self.create_task(&MultiviewTaskRequest {
            type_: "multiview_to_model",
            files,
        })
        .await
    }

    async fn create_task<T: Serialize>(&self, body: &T) -> Result<TaskResponse, PipelineError> {
        let url = self.base_url.join("task")?;
        let response = self.client.post(url).json(body).send().await?;

        if !response.status().is_success() {
            return Err(http::api_error(response).await);
        }
        let api_response: ApiResponse<TaskResponse> = response.json().await?;
        tracing::info!(task_id = %api_response.data.task_id, "created reconstruction task");
        Ok(api_response.data)
    }

    /// Retrieves the status of a specific task.
    ///
    /// # Arguments
    ///
    /// * `task_id` - The ID returned when the task was created.
    pub async fn get_task(&self, task_id: &str) -> Result<TaskStatus, PipelineError> {
        let url = self.base_url.join(&format!("task/{}", task_id))?;
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(http::api_error(response).await);
        }
        let api_response: ApiResponse<TaskStatus> = response.json().await?;
        Ok(api_response.data)
    }

    /// Queries the account balance.
    ///
    /// # Returns
    ///
    /// A [`Balance`] with the usable and frozen credit amounts.
    pub async fn get_balance(&self) -> Result<Balance, PipelineError> {
        let url = self.base_url.join("user/balance")?;
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(http::api_error(response).await);
        }
        let api_response: ApiResponse<Balance> = response.json().await?;
        Ok(api_response.data)
    }

    /// Polls `get_task` every `poll_interval` until the task reaches a terminal state.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use prompt2mesh::ReconstructionClient;
    /// # use std::time::Duration;
    /// # #[tokio::main]
    /// # async fn main() -> anyhow::Result<()> {
    /// # let client = ReconstructionClient::new(Some("your_api_key".to_string()))?;
    /// let final_status = client
    ///     .wait_for_task("some_task_id", Duration::from_secs(2))
    ///     .await?;
    /// println!("Task finished with status: {}", final_status.status);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn wait_for_task(
        &self,
        task_id: &str,
        poll_interval: Duration,
    ) -> Result<TaskStatus, PipelineError> {
        loop {
            let task_status = self.get_task(task_id).await?;
            tracing::info!(
                task_id,
                status = %task_status.status,
                progress = task_status.progress,
                "task status"
            );
            if task_status.status.is_terminal() {
                return Ok(task_status);
            }
            sleep(poll_interval).await;
        }
    }

    /// Subscribes to the task's websocket feed until it reports a terminal state.
    ///
    /// The websocket endpoint lives next to the REST API, with `http(s)`
    /// swapped for `ws(s)`.
    pub async fn watch_task(&self, task_id: &str) -> Result<TaskStatus, PipelineError> {
        let mut url = self.base_url.join(&format!("task/watch/{}", task_id))?;
        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(PipelineError::Config(format!(
                    "cannot watch tasks over `{other}`"
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| PipelineError::Config(format!("cannot switch {url} to {scheme}")))?;

        let mut request = url.as_str().into_client_request()?;
        let auth = WsHeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| PipelineError::Config("API key contains invalid header characters".into()))?;
        request.headers_mut().insert("authorization", auth);

        let (mut stream, _) = tokio_tungstenite::connect_async(request).await?;
        let mut last: Option<TaskStatus> = None;

        while let Some(message) = stream.next().await {
            let text = match message? {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };
            let update: WatchMessage = serde_json::from_str(&text)?;
            tracing::info!(
                task_id,
                event = %update.event,
                status = %update.data.status,
                progress = update.data.progress,
                "task update"
            );
            let finished = update.data.status.is_terminal();
            last = Some(update.data);
            if finished {
                if let Err(e) = stream.close(None).await {
                    tracing::debug!(error = %e, "closing watch stream");
                }
                break;
            }
        }

        match last {
            Some(status) if status.status.is_terminal() => Ok(status),
            _ => Err(PipelineError::ApiError {
                message: format!("watch stream for task {} closed before it finished", task_id),
            }),
        }
    }

    /// Downloads a result file to `dest`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// `PipelineError::ApiError` on a non-success HTTP status, or an I/O
    /// error if the file cannot be written.
    pub async fn download_model<P: AsRef<Path>>(
        &self,
        model_file: &ResultFile,
        dest: P,
    ) -> Result<PathBuf, PipelineError> {
        let dest = dest.as_ref();
        let response = self.client.get(model_file.url.as_str()).send().await?;

        if !response.status().is_success() {
            return Err(PipelineError::ApiError {
                message: format!("Failed to download file: status {}", response.status()),
            });
        }

        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(dest).await?;
        let content = response.bytes().await?;
        file.write_all(&content).await?;
        file.flush().await?;

        Ok(dest.to_path_buf())
    }
}
