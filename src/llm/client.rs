use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// HTTP client for a local OpenAI-compatible text-completion server
/// (llama.cpp server, Ollama, vLLM).
#[derive(Debug, Clone)]
pub struct LlmClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SamplingParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    #[serde(rename = "n")]
    pub num_sequences: u32,
}

#[derive(Debug, Clone, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(flatten)]
    sampling: SamplingParams,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionChoice {
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CompletionUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmResponse {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmClient {
    pub fn new(api_key: Option<&str>, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.map(str::to_string),
            base_url: base_url.to_string(),
        }
    }

    pub async fn complete(
        &self,
        model: &str,
        prompt: &str,
        sampling: SamplingParams,
    ) -> Result<LlmResponse> {
        let request = CompletionRequest {
            model,
            prompt,
            sampling,
        };

        let mut builder = self
            .client
            .post(&self.base_url)
            .header("content-type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let response = builder
            .json(&request)
            .send()
            .await
            .context("Failed to send request to completion server")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Completion server error ({}): {}", status, body);
        }

        let api_response: CompletionResponse = response
            .json()
            .await
            .context("Failed to parse completion server response")?;

        let text = api_response
            .choices
            .first()
            .and_then(|c| c.text.as_deref())
            .unwrap_or("")
            .to_string();
        let (input_tokens, output_tokens) = api_response
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(LlmResponse {
            text,
            input_tokens,
            output_tokens,
        })
    }
}
