//! Test doubles for running pipelines without a model server.

use crate::backend::TextBackend;
use crate::errors::BackendError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// A backend that replays canned responses in call order and records every
/// prompt it receives.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<String, BackendError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    /// Creates a backend that answers with `responses`, one per call.
    #[must_use]
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queues a failure as the next unanswered call.
    #[must_use]
    pub fn then_fail(self, error: BackendError) -> Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    /// Returns the number of calls made so far.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.prompts.lock().len()
    }

    /// Returns every prompt received, in call order.
    #[must_use]
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl TextBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        self.prompts.lock().push(prompt.to_string());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::InvalidResponse("script exhausted".to_string())))
    }
}
