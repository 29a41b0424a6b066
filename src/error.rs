use crate::viewpoint::Viewpoint;

/// Every failure the pipeline can surface.
///
/// Components log a diagnostic where the failure happens and hand the error
/// back to the caller, which decides whether to retry, skip, or abort.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("API key is missing. Please provide it or set the {0} environment variable.")]
    MissingApiKey(&'static str),
    #[error("Network request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Failed to parse API response: {0}")]
    ResponseParseFailed(#[from] serde_json::Error),
    #[error("API request failed: {message}")]
    ApiError { message: String },
    #[error("URL parsing failed: {0}")]
    UrlParseFailed(#[from] url::ParseError),
    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("{0} must not be empty")]
    EmptyInput(&'static str),
    #[error("The model returned an empty response")]
    EmptyResponse,
    #[error("The image backend did not return an image (content type: {content_type})")]
    InvalidImage { content_type: String },
    #[error("Image generation failed for the {viewpoint} viewpoint: {source}")]
    ViewpointFailed {
        viewpoint: Viewpoint,
        #[source]
        source: Box<PipelineError>,
    },
    #[error("No {0} view image was generated for reconstruction")]
    MissingView(Viewpoint),
    #[error("Reconstruction task {task_id} finished with status {status}")]
    TaskFailed { task_id: String, status: String },
    #[error("Reconstruction task {0} succeeded but produced no mesh")]
    NoMeshInResult(String),
    #[error("No headers found in {0}. Ensure the first row contains column names.")]
    NoHeaders(String),
    #[error("Sheet {0} has a header row but no data rows to update")]
    NoDataRows(String),
    #[error("Standard input was closed")]
    InputClosed,
    #[error("Aborted by user")]
    Aborted,
    #[error("Invalid configuration: {0}")]
    Config(String),
}
