//! From a short phrase to a reconstructed 3D mesh.
//!
//! The pipeline asks an LLM to turn a phrase into an image-generation
//! prompt, refines that prompt with the user until it is accepted, renders
//! one image per camera viewpoint, and hands the views to a hosted
//! image-to-3D service before downloading the resulting mesh.
//!
//! ## Features
//! - Swappable prompt-drafting adaptors behind one [`LlmProvider`] trait.
//! - A feedback loop that folds user feedback into the next draft.
//! - Sequential per-viewpoint text-to-image requests.
//! - Single-view or multiview reconstruction, polled or watched over a websocket.
//! - A header-keyed spreadsheet recorder for logging runs.

pub mod client;
pub mod config;
pub mod console;
pub mod error;
mod http;
pub mod imagegen;
pub mod llm;
pub mod pipeline;
pub mod reconstruct;
pub mod refine;
pub mod sheets;
pub mod types;
pub mod viewpoint;

pub use client::{ImageInput, ReconstructionClient};
pub use config::{Config, LlmVendor, ReconstructionMode, TaskCompletion};
pub use console::{Console, Interaction};
pub use error::PipelineError;
pub use imagegen::{HfInferenceClient, TextToImage, ViewpointImageRequester};
pub use llm::{ChatCompletionProvider, GeminiProvider, LlmProvider};
pub use reconstruct::{ReconstructionSubmitter, MESH_FILE_NAME};
pub use refine::{PromptRefinementLoop, PromptSession, RefinementState};
pub use sheets::{GoogleSheetsClient, SheetRow, SheetsBackend, SpreadsheetRecorder};
pub use types::{
    Balance, FileContent, GeneratedImage, MeshArtifact, ResultFile, TaskResponse, TaskResult,
    TaskState, TaskStatus,
};
pub use viewpoint::Viewpoint;
