use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::viewpoint::Viewpoint;

/// Describes the input file for a reconstruction task.
///
/// A file is given either as a publicly accessible URL (`url`) or as a
/// token for a previously uploaded file (`file_token`). An all-empty value
/// serializes to `{}` and marks an unused multiview slot.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct FileContent {
    /// The file format, e.g., "png", "jpeg".
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub type_: String,
    /// A direct URL to the image file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// A token representing a file uploaded via the multipart endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_token: Option<String>,
}

/// A request to create an image-to-model task.
#[derive(Serialize, Debug)]
pub(crate) struct ImageTaskRequest {
    #[serde(rename = "type")]
    pub(crate) type_: &'static str,
    pub(crate) file: FileContent,
}

/// A request to create a multiview-to-model task.
///
/// The service expects exactly four slots ordered front, left, back, right.
#[derive(Serialize, Debug)]
pub(crate) struct MultiviewTaskRequest {
    #[serde(rename = "type")]
    pub(crate) type_: &'static str,
    pub(crate) files: [FileContent; 4],
}

/// The response from an API call that successfully initiates a task.
#[derive(Deserialize, Debug)]
pub struct TaskResponse {
    /// The unique identifier for the newly created task.
    pub task_id: String,
}

/// (Internal) Holds the file token from a multipart upload.
#[derive(Deserialize, Debug)]
pub(crate) struct StandardUploadData {
    pub(crate) image_token: String,
}

/// Represents the lifecycle state of a reconstruction task.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Submitted but not yet started.
    #[serde(alias = "pending")]
    Queued,
    /// Actively being processed.
    Running,
    Success,
    #[serde(alias = "failure")]
    Failed,
    Cancelled,
    Banned,
    Expired,
    #[serde(other)]
    Unknown,
}

impl TaskState {
    /// Whether the service will report no further progress for the task.
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskState::Queued | TaskState::Running)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Success => "success",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
            TaskState::Banned => "banned",
            TaskState::Expired => "expired",
            TaskState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A downloadable file asset, typically a mesh.
#[derive(Debug, Deserialize, Clone)]
pub struct ResultFile {
    /// The direct URL to download the file.
    pub url: String,
}

/// The set of output files from a completed task.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TaskResult {
    /// The textured model in PBR (Physically-Based Rendering) format, typically GLB.
    #[serde(default)]
    pub pbr_model: Option<ResultFile>,
    #[serde(default)]
    pub model: Option<ResultFile>,
    /// The untextured base mesh.
    #[serde(default)]
    pub base_model: Option<ResultFile>,
}

impl TaskResult {
    /// The best available mesh: PBR first, then the plain model, then the base mesh.
    pub fn mesh(&self) -> Option<&ResultFile> {
        self.pbr_model
            .as_ref()
            .or(self.model.as_ref())
            .or(self.base_model.as_ref())
    }
}

/// A preview image generated during the task.
#[derive(Debug, Deserialize, Clone)]
pub struct TaskOutput {
    pub generated_image: Option<String>,
    pub rendered_image: Option<String>,
}

/// The detailed status and data of a reconstruction task.
#[derive(Debug, Deserialize, Clone)]
pub struct TaskStatus {
    pub task_id: String,
    pub status: TaskState,
    /// The completion progress of the task, from 0 to 100.
    #[serde(default)]
    pub progress: u8,
    /// The Unix timestamp of when the task was created.
    #[serde(default)]
    pub create_time: i64,
    #[serde(default)]
    pub result: TaskResult,
    #[serde(default)]
    pub output: Option<TaskOutput>,
}

impl TaskStatus {
    /// `create_time` as a UTC timestamp, or `None` if it is out of range.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.create_time, 0)
    }
}

/// The user's account balance on the reconstruction service.
#[derive(Deserialize, Debug)]
pub struct Balance {
    /// The available, usable balance.
    pub balance: f64,
    /// The amount of credits currently reserved for ongoing tasks.
    pub frozen: f64,
}

/// (Internal) A generic wrapper for API responses where the content is nested under a "data" field.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub(crate) data: T,
}

/// (Internal) A single message on the task watch websocket.
#[derive(Debug, Deserialize)]
pub(crate) struct WatchMessage {
    pub(crate) event: String,
    pub(crate) data: TaskStatus,
}

/// An image written to disk for one viewpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub viewpoint: Viewpoint,
    pub path: PathBuf,
}

/// The mesh downloaded from a successful reconstruction task.
#[derive(Debug, Clone)]
pub struct MeshArtifact {
    pub task_id: String,
    pub path: PathBuf,
}
