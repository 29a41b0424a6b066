mod common;

use common::ScriptedInteraction;
use prompt2mesh::{
    ChatCompletionProvider, PromptRefinementLoop, PromptSession, RefinementState,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Numbers each draft so the test can tell them apart.
struct DraftResponder(AtomicUsize);

impl wiremock::Respond for DraftResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": format!("draft {n}") } }]
        }))
    }
}

fn system_message(request: &Request) -> String {
    let body: Value = request.body_json().unwrap();
    body["messages"][0]["content"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_feedback_reaches_next_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(DraftResponder(AtomicUsize::new(0)))
        .expect(2)
        .mount(&server)
        .await;

    let provider =
        ChatCompletionProvider::new_with_url("hf_key".into(), &format!("{}/", server.uri()), None)
            .unwrap();
    let mut session = PromptSession::new("a lantern", "You write prompts.");
    let mut io = ScriptedInteraction::new(&["n", "make it brass", "y"]);

    let prompt = PromptRefinementLoop::new(&provider, "openai/gpt-oss-20b:groq")
        .run(&mut session, &mut io)
        .await
        .unwrap();

    assert_eq!(prompt, "draft 2");
    assert_eq!(session.state(), RefinementState::Accepted);
    assert_eq!(io.shown, vec!["draft 1", "draft 2"]);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(system_message(&requests[0]), "You write prompts.");
    assert_eq!(
        system_message(&requests[1]),
        "You write prompts.\n\n**User Feedback to incorporate:** make it brass"
    );
    let user: Value = requests[1].body_json().unwrap();
    assert_eq!(user["messages"][1]["content"], "a lantern");
}

#[tokio::test]
async fn test_vendor_failure_is_retried_without_a_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(DraftResponder(AtomicUsize::new(0)))
        .mount(&server)
        .await;

    let provider =
        ChatCompletionProvider::new_with_url("hf_key".into(), &format!("{}/", server.uri()), None)
            .unwrap();
    let mut session = PromptSession::new("a lantern", "You write prompts.");
    let mut io = ScriptedInteraction::new(&["", "y"]);

    let prompt = PromptRefinementLoop::new(&provider, "m")
        .run(&mut session, &mut io)
        .await
        .unwrap();

    assert_eq!(prompt, "draft 1");
    assert_eq!(session.drafts(), 1);
    assert!(io.shown[0].contains("overloaded"));
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(system_message(&requests[1]), "You write prompts.");
}
