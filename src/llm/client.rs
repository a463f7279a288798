//! Text generation backend interface.

use async_trait::async_trait;

use crate::types::Result;

/// A model capable of answering a prompt with plain text.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    fn model_name(&self) -> &str;

    /// Produce a completion for the prompt. Failures map to
    /// [`crate::types::AppError::Generation`].
    async fn generate(&self, prompt: &str) -> Result<String>;
}
