//! The interactive phrase-to-mesh sequence driven by the binary.

use crate::client::ReconstructionClient;
use crate::config::{Config, LlmVendor};
use crate::console::Interaction;
use crate::error::PipelineError;
use crate::imagegen::{HfInferenceClient, ViewpointImageRequester};
use crate::llm;
use crate::reconstruct::ReconstructionSubmitter;
use crate::refine::{PromptRefinementLoop, PromptSession};
use crate::types::{GeneratedImage, MeshArtifact};

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub prompt: String,
    pub images: Vec<GeneratedImage>,
    pub mesh: MeshArtifact,
}

/// Asks which LLM drafts prompts. Anything but `1` or `2` falls back to Gemini.
pub async fn choose_vendor<I>(io: &mut I) -> Result<LlmVendor, PipelineError>
where
    I: Interaction + ?Sized,
{
    io.show("Choose an LLM to generate prompts:");
    io.show(&format!("1. Gemini ({})", LlmVendor::Gemini.default_model()));
    io.show(&format!(
        "2. Chat completion ({} via Hugging Face)",
        LlmVendor::ChatCompletion.default_model()
    ));
    let answer = io.ask("Enter your choice (1 or 2): ").await?;
    match answer.trim() {
        "1" => Ok(LlmVendor::Gemini),
        "2" => Ok(LlmVendor::ChatCompletion),
        _ => {
            io.show("Invalid choice. Defaulting to Gemini.");
            Ok(LlmVendor::Gemini)
        }
    }
}

/// Runs phrase → accepted prompt → viewpoint images → mesh.
///
/// Every backend client is built before the first question so a missing
/// key fails fast.
pub async fn run<I>(config: &Config, io: &mut I) -> Result<PipelineOutput, PipelineError>
where
    I: Interaction + ?Sized,
{
    let timeout = config.request_timeout();

    let image_key = config
        .image
        .api_key
        .clone()
        .ok_or(PipelineError::MissingApiKey("HF_TOKEN"))?;
    let image_backend = HfInferenceClient::new_with_url(image_key, &config.image.base_url, timeout)?;

    let tripo_key = config
        .reconstruction
        .api_key
        .clone()
        .ok_or(PipelineError::MissingApiKey("TRIPO_API_KEY"))?;
    let reconstruction_client =
        ReconstructionClient::new_with_url(tripo_key, &config.reconstruction.base_url, timeout)?;

    let vendor = match config.llm.vendor {
        Some(vendor) => vendor,
        None => choose_vendor(io).await?,
    };
    let model = config.llm.model_for(vendor);
    let provider = llm::from_config(vendor, &config.llm, timeout)?;
    io.show(&format!("Using {} LLM ({})", vendor, model));
    tracing::info!(%vendor, model = %model, "selected LLM");

    let subject = loop {
        let answer = io.ask("What object would you like to be generated? ").await?;
        if !answer.trim().is_empty() {
            break answer.trim().to_string();
        }
    };

    let mut session = PromptSession::new(subject, config.llm.system_instruction.as_str());
    let prompt = PromptRefinementLoop::new(provider.as_ref(), model)
        .run(&mut session, io)
        .await?;
    tracing::info!(subject = session.subject(), drafts = session.drafts(), "prompt accepted");

    let requester =
        ViewpointImageRequester::new(&image_backend, config.image.model.as_str(), &config.output_dir);
    let images = requester.request_all(&prompt).await?;
    for image in &images {
        io.show(&format!("Image successfully saved to '{}'", image.path.display()));
    }

    io.show("Generating 3D model...");
    let submitter =
        ReconstructionSubmitter::new(reconstruction_client, &config.reconstruction, &config.output_dir);
    let mesh = submitter.submit(&images).await?;
    io.show(&format!("3D generation complete! Mesh saved to '{}'", mesh.path.display()));

    Ok(PipelineOutput {
        prompt,
        images,
        mesh,
    })
}
