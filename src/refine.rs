//! The human-in-the-loop prompt refinement loop.

use crate::console::{is_affirmative, Interaction};
use crate::error::PipelineError;
use crate::llm::LlmProvider;

const FEEDBACK_HEADER: &str = "\n\n**User Feedback to incorporate:** ";

/// Where a [`PromptSession`] stands. `Accepted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefinementState {
    Drafting,
    Accepted,
}

/// One subject being refined into an image prompt.
///
/// `current_instruction` is the only instruction value; every piece of
/// feedback is folded into it before the next draft.
#[derive(Debug, Clone)]
pub struct PromptSession {
    subject: String,
    current_instruction: String,
    accumulated_feedback: String,
    accepted: Option<String>,
    drafts: u32,
}

impl PromptSession {
    /// Starts drafting `subject` from `base_instruction`, with no feedback yet.
    pub fn new(subject: impl Into<String>, base_instruction: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            current_instruction: base_instruction.into(),
            accumulated_feedback: String::new(),
            accepted: None,
            drafts: 0,
        }
    }

    /// The user's phrase, sent unchanged as the prompt of every draft.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The instruction the next draft is requested with.
    pub fn current_instruction(&self) -> &str {
        &self.current_instruction
    }

    /// All feedback given so far, one entry per line.
    pub fn accumulated_feedback(&self) -> &str {
        &self.accumulated_feedback
    }

    /// Number of drafts received so far. Failed requests do not count.
    pub fn drafts(&self) -> u32 {
        self.drafts
    }

    pub fn state(&self) -> RefinementState {
        if self.accepted.is_some() {
            RefinementState::Accepted
        } else {
            RefinementState::Drafting
        }
    }

    /// The accepted draft, once the session is [`RefinementState::Accepted`].
    pub fn accepted_prompt(&self) -> Option<&str> {
        self.accepted.as_deref()
    }

    /// Folds `feedback` into the instruction used for the next draft.
    /// Blank feedback leaves the instruction unchanged.
    pub fn apply_feedback(&mut self, feedback: &str) {
        let feedback = feedback.trim();
        if feedback.is_empty() {
            return;
        }
        self.current_instruction.push_str(FEEDBACK_HEADER);
        self.current_instruction.push_str(feedback);
        if !self.accumulated_feedback.is_empty() {
            self.accumulated_feedback.push('\n');
        }
        self.accumulated_feedback.push_str(feedback);
    }

    fn accept(&mut self, prompt: String) {
        self.accepted = Some(prompt);
    }
}

/// Drafts prompts with an [`LlmProvider`] until the user accepts one.
pub struct PromptRefinementLoop<'a> {
    provider: &'a dyn LlmProvider,
    model: String,
}

impl<'a> PromptRefinementLoop<'a> {
    /// A loop that drafts with `provider` using `model`.
    pub fn new(provider: &'a dyn LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Runs until the user accepts a draft and returns it.
    ///
    /// There is no iteration bound. A failed draft is reported and the same
    /// state is retried once the user presses Enter; answering `q` aborts.
    ///
    /// # Errors
    ///
    /// - `PipelineError::Aborted` if the user quits after a failed draft.
    /// - `PipelineError::InputClosed` if input ends before a draft is accepted.
    pub async fn run<I>(
        &self,
        session: &mut PromptSession,
        io: &mut I,
    ) -> Result<String, PipelineError>
    where
        I: Interaction + ?Sized,
    {
        while session.state() == RefinementState::Drafting {
            let draft = match self
                .provider
                .generate(session.subject(), &self.model, session.current_instruction())
                .await
            {
                Ok(draft) => draft,
                Err(e) => {
                    io.show(&format!("An error has occurred: {}", e));
                    let answer = io
                        .ask("Press Enter to retry, or type 'q' to quit: ")
                        .await?;
                    if answer.trim().eq_ignore_ascii_case("q") {
                        return Err(PipelineError::Aborted);
                    }
                    continue;
                }
            };

            session.drafts += 1;
            tracing::info!(draft = session.drafts, "received prompt draft");
            io.show(&draft);

            let answer = io.ask("Are you satisfied with the prompt? (y/n): ").await?;
            if is_affirmative(&answer) {
                session.accept(draft);
            } else {
                let feedback = io
                    .ask("What feedback do you want to give to optimize prompt: ")
                    .await?;
                session.apply_feedback(&feedback);
            }
        }

        // Drafting only ends through `accept`.
        Ok(session.accepted.clone().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replies with queued results and records every instruction it saw.
    struct FakeProvider {
        replies: Mutex<VecDeque<Result<String, PipelineError>>>,
        instructions: Mutex<Vec<String>>,
    }

    impl FakeProvider {
        fn new(replies: Vec<Result<String, PipelineError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                instructions: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmProvider for FakeProvider {
        async fn generate(
            &self,
            _prompt: &str,
            _model: &str,
            system_instruction: &str,
        ) -> Result<String, PipelineError> {
            self.instructions
                .lock()
                .unwrap()
                .push(system_instruction.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(PipelineError::EmptyResponse))
        }
    }

    struct Script {
        answers: VecDeque<String>,
        shown: Vec<String>,
    }

    impl Script {
        fn new(answers: &[&str]) -> Self {
            Self {
                answers: answers.iter().map(|a| a.to_string()).collect(),
                shown: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Interaction for Script {
        async fn ask(&mut self, _question: &str) -> Result<String, PipelineError> {
            self.answers.pop_front().ok_or(PipelineError::InputClosed)
        }

        fn show(&mut self, text: &str) {
            self.shown.push(text.to_string());
        }
    }

    #[tokio::test]
    async fn accepts_first_draft() {
        let provider = FakeProvider::new(vec![Ok("oak chair".into())]);
        let mut session = PromptSession::new("a chair", "base");
        let mut io = Script::new(&["y"]);

        let prompt = PromptRefinementLoop::new(&provider, "m")
            .run(&mut session, &mut io)
            .await
            .unwrap();

        assert_eq!(prompt, "oak chair");
        assert_eq!(session.state(), RefinementState::Accepted);
        assert_eq!(session.accepted_prompt(), Some("oak chair"));
        assert_eq!(session.drafts(), 1);
        assert_eq!(io.shown, vec!["oak chair"]);
    }

    #[tokio::test]
    async fn feedback_compounds_into_instruction() {
        let provider = FakeProvider::new(vec![
            Ok("draft 1".into()),
            Ok("draft 2".into()),
            Ok("draft 3".into()),
        ]);
        let mut session = PromptSession::new("a chair", "base");
        let mut io = Script::new(&["n", "darker wood", "no", "add armrests", "y"]);

        let prompt = PromptRefinementLoop::new(&provider, "m")
            .run(&mut session, &mut io)
            .await
            .unwrap();

        assert_eq!(prompt, "draft 3");
        let seen = provider.instructions.lock().unwrap().clone();
        assert_eq!(seen[0], "base");
        assert_eq!(
            seen[1],
            "base\n\n**User Feedback to incorporate:** darker wood"
        );
        assert_eq!(
            seen[2],
            "base\n\n**User Feedback to incorporate:** darker wood\
             \n\n**User Feedback to incorporate:** add armrests"
        );
        assert_eq!(session.accumulated_feedback(), "darker wood\nadd armrests");
    }

    #[tokio::test]
    async fn failure_retries_same_state_without_feedback() {
        let provider = FakeProvider::new(vec![
            Err(PipelineError::EmptyResponse),
            Ok("draft".into()),
        ]);
        let mut session = PromptSession::new("a chair", "base");
        let mut io = Script::new(&["", "y"]);

        let prompt = PromptRefinementLoop::new(&provider, "m")
            .run(&mut session, &mut io)
            .await
            .unwrap();

        assert_eq!(prompt, "draft");
        assert_eq!(session.drafts(), 1);
        let seen = provider.instructions.lock().unwrap().clone();
        assert_eq!(seen, vec!["base", "base"]);
        assert!(io.shown[0].starts_with("An error has occurred"));
    }

    #[tokio::test]
    async fn quitting_after_failure_aborts() {
        let provider = FakeProvider::new(vec![Err(PipelineError::EmptyResponse)]);
        let mut session = PromptSession::new("a chair", "base");
        let mut io = Script::new(&["q"]);

        let err = PromptRefinementLoop::new(&provider, "m")
            .run(&mut session, &mut io)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Aborted));
        assert_eq!(session.state(), RefinementState::Drafting);
    }

    #[tokio::test]
    async fn closed_input_never_accepts() {
        let provider = FakeProvider::new(vec![Ok("a".into()), Ok("b".into())]);
        let mut session = PromptSession::new("a chair", "base");
        let mut io = Script::new(&["n", "more detail"]);

        let err = PromptRefinementLoop::new(&provider, "m")
            .run(&mut session, &mut io)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::InputClosed));
        assert_eq!(session.accepted_prompt(), None);
        assert_eq!(session.drafts(), 2);
    }

    #[test]
    fn blank_feedback_keeps_instruction() {
        let mut session = PromptSession::new("a chair", "base");
        session.apply_feedback("   ");
        assert_eq!(session.current_instruction(), "base");
        assert_eq!(session.accumulated_feedback(), "");
    }
}
