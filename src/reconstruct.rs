use std::path::PathBuf;
use std::time::Duration;

use crate::client::{ImageInput, ReconstructionClient};
use crate::config::{ReconstructionConfig, ReconstructionMode, TaskCompletion};
use crate::error::PipelineError;
use crate::types::{GeneratedImage, MeshArtifact, TaskResponse, TaskState, TaskStatus};
use crate::viewpoint::Viewpoint;

/// File name of the downloaded mesh inside the output directory.
pub const MESH_FILE_NAME: &str = "output_model.glb";

/// Slot order of a multiview task. `top` has no slot.
const MULTIVIEW_ORDER: [Viewpoint; 4] = [
    Viewpoint::Front,
    Viewpoint::Left,
    Viewpoint::Back,
    Viewpoint::Right,
];

/// Sends generated views to the reconstruction service and fetches the mesh.
pub struct ReconstructionSubmitter {
    client: ReconstructionClient,
    mode: ReconstructionMode,
    completion: TaskCompletion,
    poll_interval: Duration,
    open_viewer: bool,
    output_dir: PathBuf,
}

impl ReconstructionSubmitter {
    /// # Arguments
    ///
    /// * `client` - Connected reconstruction client.
    /// * `config` - Mode, completion strategy, poll interval and viewer flag.
    /// * `output_dir` - Where `output_model.glb` is written.
    pub fn new(
        client: ReconstructionClient,
        config: &ReconstructionConfig,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            mode: config.mode,
            completion: config.completion,
            poll_interval: config.poll_interval(),
            open_viewer: config.open_viewer,
            output_dir: output_dir.into(),
        }
    }

    /// Uploads the views, waits for the task, and downloads the mesh to
    /// `<output_dir>/output_model.glb`. Nothing is retried.
    ///
    /// # Errors
    ///
    /// - `PipelineError::MissingView` if the front view is not among `images`.
    /// - `PipelineError::TaskFailed` if the task ends in any state but success.
    /// - `PipelineError::NoMeshInResult` if a successful task has no mesh.
    /// - Transport, API or I/O errors from the upload and download steps.
    pub async fn submit(&self, images: &[GeneratedImage]) -> Result<MeshArtifact, PipelineError> {
        let task = self.create_task(images).await.inspect_err(|e| {
            tracing::error!(error = %e, "failed to submit reconstruction task");
        })?;

        let status = self.wait(&task.task_id).await?;
        if status.status != TaskState::Success {
            tracing::error!(task_id = %status.task_id, status = %status.status, "reconstruction failed");
            return Err(PipelineError::TaskFailed {
                task_id: status.task_id,
                status: status.status.to_string(),
            });
        }
        if let Some(created) = status.created_at() {
            tracing::debug!(task_id = %status.task_id, %created, "task created");
        }

        let mesh = status
            .result
            .mesh()
            .ok_or_else(|| PipelineError::NoMeshInResult(status.task_id.clone()))?;

        let dest = self.output_dir.join(MESH_FILE_NAME);
        let path = self
            .client
            .download_model(mesh, &dest)
            .await
            .inspect_err(|e| tracing::error!(error = %e, "mesh download failed"))?;
        tracing::info!(task_id = %status.task_id, path = %path.display(), "downloaded mesh");

        if self.open_viewer {
            if let Err(e) = open::that(&path) {
                tracing::warn!(path = %path.display(), error = %e, "could not open mesh viewer");
            }
        }

        Ok(MeshArtifact {
            task_id: status.task_id,
            path,
        })
    }

    async fn create_task(&self, images: &[GeneratedImage]) -> Result<TaskResponse, PipelineError> {
        let find = |viewpoint: Viewpoint| {
            images
                .iter()
                .find(|image| image.viewpoint == viewpoint)
                .map(|image| ImageInput::from(image.path.clone()))
        };
        let front = find(Viewpoint::Front).ok_or(PipelineError::MissingView(Viewpoint::Front))?;

        match self.mode {
            ReconstructionMode::Single => self.client.image_input_to_model(&front).await,
            ReconstructionMode::Multiview => {
                let views = MULTIVIEW_ORDER.map(find);
                self.client.multiview_to_model(views).await
            }
        }
    }

    async fn wait(&self, task_id: &str) -> Result<TaskStatus, PipelineError> {
        match self.completion {
            TaskCompletion::Poll => self.client.wait_for_task(task_id, self.poll_interval).await,
            TaskCompletion::Watch => self.client.watch_task(task_id).await,
        }
    }
}
