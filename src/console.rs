use async_trait::async_trait;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::error::PipelineError;

/// The human side of the pipeline: questions in, free-text answers out.
#[async_trait]
pub trait Interaction: Send {
    /// Asks `question` and waits for one line of input.
    ///
    /// Returns `PipelineError::InputClosed` once input is exhausted.
    async fn ask(&mut self, question: &str) -> Result<String, PipelineError>;

    /// Shows a status message or result.
    fn show(&mut self, text: &str);
}

/// Whether `answer` is a yes.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Standard input and output.
pub struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Console {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Interaction for Console {
    async fn ask(&mut self, question: &str) -> Result<String, PipelineError> {
        print!("{}", question);
        std::io::stdout().flush()?;
        match self.lines.next_line().await? {
            Some(line) => Ok(line),
            None => Err(PipelineError::InputClosed),
        }
    }

    fn show(&mut self, text: &str) {
        println!("{}", text);
    }
}

#[cfg(test)]
mod tests {
    use super::is_affirmative;

    #[test]
    fn only_yes_is_affirmative() {
        assert!(is_affirmative("y"));
        assert!(is_affirmative(" Yes\n"));
        assert!(is_affirmative("Y"));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("yep, but brighter"));
    }
}
