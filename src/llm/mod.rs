pub mod client;
pub mod local;

use anyhow::Result;
use async_trait::async_trait;

pub use client::{LlmClient, LlmResponse, SamplingParams};
pub use local::LocalModel;

/// Prompt-in, text-out language model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<LlmResponse>;
}
