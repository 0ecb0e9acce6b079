use anyhow::Result;
#[cfg(test)]
use std::collections::VecDeque;
#[cfg(test)]
use std::sync::Mutex;

/// Response type for mock user input
#[cfg(test)]
#[derive(Debug, Clone)]
pub enum MockResponse {
    Secret(String),
    /// The user aborted the prompt (Esc / Ctrl-C)
    Cancelled,
}

/// Trait for user input operations to enable testing with mocks
pub trait UserInput: Send + Sync {
    /// Prompt for a value without echoing it
    fn secret(&self, prompt: &str) -> Result<String>;
}

/// Real user input implementation using inquire crate
pub struct InquireUserInput;

impl UserInput for InquireUserInput {
    fn secret(&self, prompt: &str) -> Result<String> {
        use inquire::Password;
        let answer = Password::new(prompt).without_confirmation().prompt()?;
        Ok(answer)
    }
}

/// Mock user input implementation for testing
#[cfg(test)]
pub struct MockUserInput {
    responses: Mutex<VecDeque<MockResponse>>,
    prompts: Mutex<Vec<String>>,
}

#[cfg(test)]
impl MockUserInput {
    /// Create new mock with no pre-configured responses
    pub fn new() -> Self {
        Self::with_responses(Vec::new())
    }

    /// Create mock with pre-configured responses
    pub fn with_responses(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Prompts shown so far, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Get the next response from the queue
    fn next_response(&self, prompt: &str) -> Result<MockResponse> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("No more mock responses available"))
    }
}

#[cfg(test)]
impl Default for MockUserInput {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl UserInput for MockUserInput {
    fn secret(&self, prompt: &str) -> Result<String> {
        match self.next_response(prompt)? {
            MockResponse::Secret(answer) => Ok(answer),
            MockResponse::Cancelled => anyhow::bail!("Operation was canceled by the user"),
        }
    }
}
