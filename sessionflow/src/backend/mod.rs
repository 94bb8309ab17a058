//! Text-generation backends.
//!
//! The pipeline only needs one capability from a backend: turn a prompt into
//! text. [`OllamaBackend`] talks to a local Ollama server; [`FnBackend`]
//! wraps a closure for tests and embedding.

mod ollama;

pub use ollama::OllamaBackend;

use crate::errors::BackendError;
use async_trait::async_trait;
use std::fmt::Debug;

/// A service that turns a prompt into free-form text.
#[async_trait]
pub trait TextBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Generates a completion for the prompt.
    ///
    /// # Errors
    ///
    /// Returns a [`BackendError`] if the backend cannot produce a response.
    async fn generate(&self, prompt: &str) -> Result<String, BackendError>;
}

/// A closure-based backend.
pub struct FnBackend<F>
where
    F: Fn(&str) -> Result<String, BackendError> + Send + Sync,
{
    func: F,
}

impl<F> FnBackend<F>
where
    F: Fn(&str) -> Result<String, BackendError> + Send + Sync,
{
    /// Creates a new function-based backend.
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

impl<F> Debug for FnBackend<F>
where
    F: Fn(&str) -> Result<String, BackendError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnBackend").finish_non_exhaustive()
    }
}

#[async_trait]
impl<F> TextBackend for FnBackend<F>
where
    F: Fn(&str) -> Result<String, BackendError> + Send + Sync,
{
    fn name(&self) -> &'static str {
        "fn"
    }

    async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
        (self.func)(prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fn_backend() {
        let backend = FnBackend::new(|prompt: &str| Ok(format!("{{\"len\": {}}}", prompt.len())));

        assert_eq!(backend.name(), "fn");
        assert_eq!(backend.generate("abcd").await.unwrap(), "{\"len\": 4}");
    }

    #[tokio::test]
    async fn test_fn_backend_propagates_errors() {
        let backend = FnBackend::new(|_: &str| Err(BackendError::InvalidResponse("nope".into())));
        assert!(backend.generate("x").await.is_err());
    }
}
