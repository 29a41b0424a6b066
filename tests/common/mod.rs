#![allow(dead_code)]

use async_trait::async_trait;
use prompt2mesh::{Interaction, PipelineError, ReconstructionClient};
use serde_json::{json, Value};
use std::collections::VecDeque;
use wiremock::MockServer;

/// Answers questions from a fixed script and records everything shown.
pub struct ScriptedInteraction {
    answers: VecDeque<String>,
    pub questions: Vec<String>,
    pub shown: Vec<String>,
}

impl ScriptedInteraction {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: answers.iter().map(|a| a.to_string()).collect(),
            questions: Vec::new(),
            shown: Vec::new(),
        }
    }
}

#[async_trait]
impl Interaction for ScriptedInteraction {
    async fn ask(&mut self, question: &str) -> Result<String, PipelineError> {
        self.questions.push(question.to_string());
        self.answers.pop_front().ok_or(PipelineError::InputClosed)
    }

    fn show(&mut self, text: &str) {
        self.shown.push(text.to_string());
    }
}

/// Base URL of the reconstruction API on a mock server.
pub fn tripo_base(server: &MockServer) -> String {
    format!("{}/v2/openapi/", server.uri())
}

pub fn tripo_client(server: &MockServer) -> ReconstructionClient {
    ReconstructionClient::new_with_url("test_api_key".to_string(), &tripo_base(server), None)
        .unwrap()
}

/// A `task/{id}` response body.
pub fn task_body(task_id: &str, status: &str, progress: u8, result: Value) -> Value {
    json!({
        "code": 0,
        "data": {
            "task_id": task_id,
            "type": "image_to_model",
            "status": status,
            "progress": progress,
            "create_time": 1752091365,
            "output": null,
            "result": result
        }
    })
}

/// PNG signature followed by filler bytes.
pub const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nfake-image-data";
