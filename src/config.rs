use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::PipelineError;

pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/";
pub const DEFAULT_CHAT_URL: &str = "https://router.huggingface.co/";
pub const DEFAULT_IMAGE_URL: &str = "https://router.huggingface.co/hf-inference/";
pub const DEFAULT_TRIPO_URL: &str = "https://api.tripo3d.ai/v2/openapi/";
pub const DEFAULT_SHEETS_URL: &str = "https://sheets.googleapis.com/";
pub const DEFAULT_IMAGE_MODEL: &str = "black-forest-labs/FLUX.1-dev";
const DEFAULT_CONFIG_FILE: &str = "prompt2mesh.toml";

/// Base instruction handed to the LLM before any user feedback is folded in.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = r#"You are an expert prompt engineer for text-to-image models. Your sole purpose is to convert simple user keywords into a single, highly-detailed, and optimized prompt for generating multi-view images suitable for 3D reconstruction.

You will receive a simple user input (e.g., "a dining chair").
You MUST generate your response as a single, raw text paragraph. Do not add any preamble, conversation, or quotation marks. The output should be the prompt itself and nothing more.

You will construct this prompt by rigorously following a 4-layer framework:

**Layer 1: WHAT (Subject)**
* Identify the single, core entity.
* The prompt must focus on this entity alone to prevent focus scattering.

**Layer 2: FORM (Features)**
* Use precise, powerful adjectives to define shape and structure (e.g., "faceted geometric shape," "cylindrical," "aerodynamic bullpup design").

**Layer 3: MATERIAL (Surface/Texture)**
* Describe materials with extreme precision for PBR (Physically Based Rendering).
* Specify texture complexity, physical properties, and imperfections (e.g., "smooth polished light oak," "rough-hewn stone with moss," "glowing purple liquid," "brushed aluminum with fine scratches").

**Layer 4: AESTHETICS (Style/Genre)**
* Define the artistic style to constrain interpretation (e.g., "Scandinavian-style," "fantasy RPG asset," "photorealistic product mockup," "sci-fi hard-surface").

---
### **TASK: BUILD THE PROMPT**

* Synthesize Layers 1, 2, 3, and 4 into a single, cohesive paragraph.
* **Crucial Lighting & Composition:** The prompt MUST specify:
    * **Lighting:** "bright, even, neutral studio lighting," "soft, diffused lighting," "minimal shadows." (This is critical for 3D reconstruction).
    * **Background:** "plain neutral gray background," "isolated on a white background."
    * **Quality:** "hyperrealistic CG render," "high-fidelity," "8K," "Unreal Engine 5 render."


---
**Constraint:** Respond ONLY with the generated prompt. Do not include "Here is your prompt:" or any other text. Prompt has to be at a maximum of 2000 characters."#;

/// Which LLM adaptor drafts prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmVendor {
    Gemini,
    #[serde(alias = "chat", alias = "openai")]
    ChatCompletion,
}

impl LlmVendor {
    pub fn default_model(self) -> &'static str {
        match self {
            LlmVendor::Gemini => "gemini-2.5-flash",
            LlmVendor::ChatCompletion => "openai/gpt-oss-20b:groq",
        }
    }
}

impl std::fmt::Display for LlmVendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmVendor::Gemini => f.write_str("Gemini"),
            LlmVendor::ChatCompletion => f.write_str("chat completion"),
        }
    }
}

impl FromStr for LlmVendor {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "1" => Ok(LlmVendor::Gemini),
            "chat" | "chat_completion" | "openai" | "2" => Ok(LlmVendor::ChatCompletion),
            other => Err(PipelineError::Config(format!("unknown LLM provider `{other}`"))),
        }
    }
}

/// Which generated views are submitted for reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconstructionMode {
    /// Only the front view.
    #[default]
    Single,
    /// Front, left, back and right views together.
    Multiview,
}

impl FromStr for ReconstructionMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(ReconstructionMode::Single),
            "multiview" => Ok(ReconstructionMode::Multiview),
            other => Err(PipelineError::Config(format!(
                "unknown reconstruction mode `{other}`"
            ))),
        }
    }
}

/// How the pipeline waits for a reconstruction task to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskCompletion {
    #[default]
    Poll,
    Watch,
}

impl FromStr for TaskCompletion {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "poll" => Ok(TaskCompletion::Poll),
            "watch" => Ok(TaskCompletion::Watch),
            other => Err(PipelineError::Config(format!(
                "unknown task completion strategy `{other}`"
            ))),
        }
    }
}

/// Prompt-drafting settings.
#[derive(Clone, Debug)]
pub struct LlmConfig {
    /// `None` means the CLI asks once at start-up.
    pub vendor: Option<LlmVendor>,
    /// Overrides [`LlmVendor::default_model`] when Gemini drafts.
    pub gemini_model: Option<String>,
    /// Overrides [`LlmVendor::default_model`] when the chat-completion vendor drafts.
    pub chat_model: Option<String>,
    pub gemini_base_url: String,
    pub chat_base_url: String,
    /// The base instruction every session starts from.
    pub system_instruction: String,
    pub gemini_api_key: Option<String>,
    /// Hugging Face token, shared with the image backend.
    pub hf_token: Option<String>,
}

impl LlmConfig {
    /// The model `vendor` drafts with: its override if one is set, otherwise
    /// the vendor default. An override for one vendor never leaks into the other.
    pub fn model_for(&self, vendor: LlmVendor) -> String {
        let model = match vendor {
            LlmVendor::Gemini => &self.gemini_model,
            LlmVendor::ChatCompletion => &self.chat_model,
        };
        model
            .clone()
            .unwrap_or_else(|| vendor.default_model().to_string())
    }

    fn model_slot(&mut self, vendor: LlmVendor) -> &mut Option<String> {
        match vendor {
            LlmVendor::Gemini => &mut self.gemini_model,
            LlmVendor::ChatCompletion => &mut self.chat_model,
        }
    }
}

/// Text-to-image backend settings.
#[derive(Clone, Debug)]
pub struct ImageConfig {
    pub base_url: String,
    /// Model id appended to `models/` on the inference endpoint.
    pub model: String,
    pub api_key: Option<String>,
}

/// Reconstruction service settings.
#[derive(Clone, Debug)]
pub struct ReconstructionConfig {
    pub base_url: String,
    pub mode: ReconstructionMode,
    pub completion: TaskCompletion,
    /// Seconds between status polls. Never zero when loaded from the
    /// environment or a TOML file.
    pub poll_interval_secs: u64,
    /// Open the downloaded mesh with the platform viewer.
    pub open_viewer: bool,
    pub api_key: Option<String>,
}

impl ReconstructionConfig {
    /// `poll_interval_secs` as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Spreadsheet recorder settings.
#[derive(Clone, Debug)]
pub struct SheetsConfig {
    pub base_url: String,
    pub spreadsheet_id: Option<String>,
    /// OAuth bearer token for the Sheets API.
    pub access_token: Option<String>,
}

/// Complete pipeline configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub llm: LlmConfig,
    pub image: ImageConfig,
    pub reconstruction: ReconstructionConfig,
    pub sheets: SheetsConfig,
    /// Directory for viewpoint images and the downloaded mesh.
    pub output_dir: PathBuf,
    /// Applied to every HTTP client. `None` keeps the reqwest default.
    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                vendor: None,
                gemini_model: None,
                chat_model: None,
                gemini_base_url: DEFAULT_GEMINI_URL.to_string(),
                chat_base_url: DEFAULT_CHAT_URL.to_string(),
                system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
                gemini_api_key: None,
                hf_token: None,
            },
            image: ImageConfig {
                base_url: DEFAULT_IMAGE_URL.to_string(),
                model: DEFAULT_IMAGE_MODEL.to_string(),
                api_key: None,
            },
            reconstruction: ReconstructionConfig {
                base_url: DEFAULT_TRIPO_URL.to_string(),
                mode: ReconstructionMode::Single,
                completion: TaskCompletion::Poll,
                poll_interval_secs: 2,
                open_viewer: true,
                api_key: None,
            },
            sheets: SheetsConfig {
                base_url: DEFAULT_SHEETS_URL.to_string(),
                spreadsheet_id: None,
                access_token: None,
            },
            output_dir: PathBuf::from("."),
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Defaults, then environment variables, then the optional TOML file
    /// named by `PROMPT2MESH_CONFIG` (or `./prompt2mesh.toml`).
    pub fn load() -> Result<Self, PipelineError> {
        let config = Self::default().overlay_env(|key| std::env::var(key).ok())?;
        let path = std::env::var("PROMPT2MESH_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        config.overlay_file(Path::new(&path))
    }

    /// Applies environment overrides read through `lookup`. Empty values are ignored.
    pub fn overlay_env<F>(mut self, lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("GEMINI_API_KEY") {
            self.llm.gemini_api_key = Some(v);
        }
        if let Some(v) = var("HF_TOKEN") {
            self.llm.hf_token = Some(v.clone());
            self.image.api_key = Some(v);
        }
        if let Some(v) = var("TRIPO_API_KEY") {
            self.reconstruction.api_key = Some(v);
        }
        if let Some(v) = var("GOOGLE_SHEETS_ACCESS_TOKEN") {
            self.sheets.access_token = Some(v);
        }
        if let Some(v) = var("SPREADSHEET_ID") {
            self.sheets.spreadsheet_id = Some(v);
        }
        if let Some(v) = var("LLM_PROVIDER") {
            self.llm.vendor = Some(v.parse()?);
        }
        if let Some(v) = var("GEMINI_MODEL") {
            self.llm.gemini_model = Some(v);
        }
        if let Some(v) = var("CHAT_MODEL") {
            self.llm.chat_model = Some(v);
        }
        // Only meaningful once the vendor is pinned.
        if let Some(v) = var("LLM_MODEL") {
            let vendor = self.llm.vendor.ok_or_else(|| {
                PipelineError::Config(
                    "LLM_MODEL needs LLM_PROVIDER; use GEMINI_MODEL or CHAT_MODEL instead".into(),
                )
            })?;
            *self.llm.model_slot(vendor) = Some(v);
        }
        if let Some(v) = var("IMAGE_MODEL") {
            self.image.model = v;
        }
        if let Some(v) = var("OUTPUT_DIR") {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = var("RECONSTRUCTION_MODE") {
            self.reconstruction.mode = v.parse()?;
        }
        if let Some(v) = var("TASK_COMPLETION") {
            self.reconstruction.completion = v.parse()?;
        }
        if let Some(v) = var("POLL_INTERVAL_SECS") {
            let secs = v.trim().parse::<u64>().map_err(|e| {
                PipelineError::Config(format!("POLL_INTERVAL_SECS `{v}`: {e}"))
            })?;
            self.reconstruction.poll_interval_secs = check_poll_interval(secs)?;
        }
        if let Some(v) = var("OPEN_VIEWER") {
            self.reconstruction.open_viewer = parse_bool("OPEN_VIEWER", &v)?;
        }
        if let Some(v) = var("REQUEST_TIMEOUT_SECS") {
            let secs = v.trim().parse::<u64>().map_err(|e| {
                PipelineError::Config(format!("REQUEST_TIMEOUT_SECS `{v}`: {e}"))
            })?;
            self.request_timeout_secs = Some(secs);
        }
        Ok(self)
    }

    /// Overlays the TOML file at `path` if it exists.
    pub fn overlay_file(self, path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No TOML config found; using defaults/env");
            return Ok(self);
        }
        let text = fs::read_to_string(path)?;
        tracing::info!(path = %path.display(), "Loaded TOML config");
        self.overlay_toml(&text)
    }

    /// Overlays a TOML document. Unknown keys and a zero poll interval are
    /// `PipelineError::Config` errors.
    pub fn overlay_toml(self, text: &str) -> Result<Self, PipelineError> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        file.overlay(self)
    }

    /// Timeout applied to every HTTP client, if configured.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

fn check_poll_interval(secs: u64) -> Result<u64, PipelineError> {
    if secs == 0 {
        return Err(PipelineError::Config(
            "poll_interval_secs must be at least 1".into(),
        ));
    }
    Ok(secs)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, PipelineError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(PipelineError::Config(format!("{key} must be a boolean, got `{value}`"))),
    }
}

// TOML overlay. API keys only come from the environment.

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    output_dir: Option<PathBuf>,
    request_timeout_secs: Option<u64>,
    #[serde(default)]
    llm: LlmSection,
    #[serde(default)]
    image: ImageSection,
    #[serde(default)]
    reconstruction: ReconstructionSection,
    #[serde(default)]
    sheets: SheetsSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct LlmSection {
    vendor: Option<LlmVendor>,
    gemini_model: Option<String>,
    chat_model: Option<String>,
    gemini_base_url: Option<String>,
    chat_base_url: Option<String>,
    system_instruction: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ImageSection {
    base_url: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReconstructionSection {
    base_url: Option<String>,
    mode: Option<ReconstructionMode>,
    completion: Option<TaskCompletion>,
    poll_interval_secs: Option<u64>,
    open_viewer: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SheetsSection {
    base_url: Option<String>,
    spreadsheet_id: Option<String>,
}

impl ConfigFile {
    fn overlay(self, mut base: Config) -> Result<Config, PipelineError> {
        if let Some(v) = self.output_dir {
            base.output_dir = v;
        }
        if let Some(v) = self.request_timeout_secs {
            base.request_timeout_secs = Some(v);
        }

        let llm = self.llm;
        if llm.vendor.is_some() {
            base.llm.vendor = llm.vendor;
        }
        if llm.gemini_model.is_some() {
            base.llm.gemini_model = llm.gemini_model;
        }
        if llm.chat_model.is_some() {
            base.llm.chat_model = llm.chat_model;
        }
        if let Some(v) = llm.gemini_base_url {
            base.llm.gemini_base_url = v;
        }
        if let Some(v) = llm.chat_base_url {
            base.llm.chat_base_url = v;
        }
        if let Some(v) = llm.system_instruction {
            base.llm.system_instruction = v;
        }

        if let Some(v) = self.image.base_url {
            base.image.base_url = v;
        }
        if let Some(v) = self.image.model {
            base.image.model = v;
        }

        let rec = self.reconstruction;
        if let Some(v) = rec.base_url {
            base.reconstruction.base_url = v;
        }
        if let Some(v) = rec.mode {
            base.reconstruction.mode = v;
        }
        if let Some(v) = rec.completion {
            base.reconstruction.completion = v;
        }
        if let Some(v) = rec.poll_interval_secs {
            base.reconstruction.poll_interval_secs = check_poll_interval(v)?;
        }
        if let Some(v) = rec.open_viewer {
            base.reconstruction.open_viewer = v;
        }

        if let Some(v) = self.sheets.base_url {
            base.sheets.base_url = v;
        }
        if self.sheets.spreadsheet_id.is_some() {
            base.sheets.spreadsheet_id = self.sheets.spreadsheet_id;
        }
        Ok(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_defaults() {
        let config = Config::default()
            .overlay_env(env(&[
                ("HF_TOKEN", "hf_abc"),
                ("LLM_PROVIDER", "chat"),
                ("RECONSTRUCTION_MODE", "multiview"),
                ("OPEN_VIEWER", "false"),
                ("OUTPUT_DIR", "out"),
            ]))
            .unwrap();

        assert_eq!(config.llm.vendor, Some(LlmVendor::ChatCompletion));
        assert_eq!(config.llm.hf_token.as_deref(), Some("hf_abc"));
        assert_eq!(config.image.api_key.as_deref(), Some("hf_abc"));
        assert_eq!(config.reconstruction.mode, ReconstructionMode::Multiview);
        assert!(!config.reconstruction.open_viewer);
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(
            config.llm.model_for(LlmVendor::ChatCompletion),
            "openai/gpt-oss-20b:groq"
        );
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let config = Config::default()
            .overlay_env(env(&[("LLM_PROVIDER", "  "), ("GEMINI_API_KEY", "")]))
            .unwrap();
        assert_eq!(config.llm.vendor, None);
        assert_eq!(config.llm.gemini_api_key, None);
    }

    #[test]
    fn bad_env_value_is_a_config_error() {
        let err = Config::default()
            .overlay_env(env(&[("TASK_COMPLETION", "sometimes")]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn toml_overlays_env() {
        let config = Config::default()
            .overlay_env(env(&[("LLM_PROVIDER", "chat")]))
            .unwrap()
            .overlay_toml(
                r#"
                output_dir = "renders"

                request_timeout_secs = 30

                [llm]
                vendor = "gemini"
                gemini_model = "gemini-2.5-pro"

                [reconstruction]
                completion = "watch"
                poll_interval_secs = 5
                "#,
            )
            .unwrap();

        assert_eq!(config.llm.vendor, Some(LlmVendor::Gemini));
        assert_eq!(config.llm.model_for(LlmVendor::Gemini), "gemini-2.5-pro");
        assert_eq!(config.reconstruction.completion, TaskCompletion::Watch);
        assert_eq!(config.reconstruction.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.output_dir, PathBuf::from("renders"));
        assert_eq!(config.image.model, DEFAULT_IMAGE_MODEL);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(
            config.llm.model_for(LlmVendor::ChatCompletion),
            "openai/gpt-oss-20b:groq"
        );
    }

    #[test]
    fn model_override_stays_with_its_vendor() {
        let config = Config::default()
            .overlay_env(env(&[("GEMINI_MODEL", "gemini-2.5-pro")]))
            .unwrap();
        assert_eq!(config.llm.model_for(LlmVendor::Gemini), "gemini-2.5-pro");
        assert_eq!(
            config.llm.model_for(LlmVendor::ChatCompletion),
            "openai/gpt-oss-20b:groq"
        );

        let config = Config::default()
            .overlay_env(env(&[("LLM_PROVIDER", "chat"), ("LLM_MODEL", "meta-llama/Llama-3.1-8B")]))
            .unwrap();
        assert_eq!(
            config.llm.model_for(LlmVendor::ChatCompletion),
            "meta-llama/Llama-3.1-8B"
        );
        assert_eq!(config.llm.model_for(LlmVendor::Gemini), "gemini-2.5-flash");
    }

    #[test]
    fn llm_model_without_provider_is_rejected() {
        let err = Config::default()
            .overlay_env(env(&[("LLM_MODEL", "gemini-2.5-pro")]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(msg) if msg.contains("LLM_PROVIDER")));
    }

    #[test]
    fn request_timeout_from_env() {
        assert_eq!(Config::default().request_timeout(), None);
        let config = Config::default()
            .overlay_env(env(&[("REQUEST_TIMEOUT_SECS", "45")]))
            .unwrap();
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(45)));

        let err = Config::default()
            .overlay_env(env(&[("REQUEST_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let err = Config::default()
            .overlay_toml("[reconstruction]\npoll_interval_secs = 0\n")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));

        let err = Config::default()
            .overlay_env(env(&[("POLL_INTERVAL_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));

        let config = Config::default()
            .overlay_env(env(&[("POLL_INTERVAL_SECS", "7")]))
            .unwrap();
        assert_eq!(config.reconstruction.poll_interval(), Duration::from_secs(7));
    }

    #[test]
    fn default_instruction_keeps_reconstruction_guidance() {
        assert!(DEFAULT_SYSTEM_INSTRUCTION.contains("**Crucial Lighting & Composition:**"));
        assert!(DEFAULT_SYSTEM_INSTRUCTION.contains("(This is critical for 3D reconstruction)"));
        assert!(DEFAULT_SYSTEM_INSTRUCTION.contains("\"glowing purple liquid,\""));
        assert!(DEFAULT_SYSTEM_INSTRUCTION
            .ends_with("Prompt has to be at a maximum of 2000 characters."));
    }

    #[test]
    fn toml_rejects_unknown_keys() {
        let err = Config::default()
            .overlay_toml("[llm]\napi_key = \"nope\"\n")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn missing_file_keeps_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default()
            .overlay_file(&dir.path().join("absent.toml"))
            .unwrap();
        assert_eq!(config.reconstruction.poll_interval_secs, 2);
    }
}
