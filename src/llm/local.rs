use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tiktoken_rs::CoreBPE;
use tokio::sync::Mutex;
use tracing::debug;

use super::{LlmClient, LlmResponse, SamplingParams, TextGenerator};

/// GPT-2 context window, shared by prompt and completion.
pub const MAX_CONTEXT_TOKENS: usize = 1024;

const TOP_K: u32 = 50;
const TOP_P: f32 = 0.95;
const TEMPERATURE: f32 = 0.8;

/// Handle to the small causal model: the GPT-2 BPE for fitting prompts into the
/// context window, and the completion server that runs the model.
///
/// Built once at startup and shared. Generation is serialized because the
/// backing server is assumed to handle one request at a time.
pub struct LocalModel {
    bpe: CoreBPE,
    client: LlmClient,
    model: String,
    gate: Mutex<()>,
}

/// A prompt cut down to the context window.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedPrompt {
    pub text: String,
    pub tokens: usize,
}

impl LocalModel {
    pub fn load(client: LlmClient, model: &str) -> Result<Self> {
        let bpe = tiktoken_rs::r50k_base()
            .map_err(|e| anyhow!("Failed to load GPT-2 tokenizer: {}", e))?;

        Ok(Self {
            bpe,
            client,
            model: model.to_string(),
            gate: Mutex::new(()),
        })
    }

    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    /// Cuts `prompt` to its longest character prefix that fits in `max_tokens`.
    pub fn encode(&self, prompt: &str, max_tokens: usize) -> EncodedPrompt {
        let total = self.count_tokens(prompt);
        if total <= max_tokens {
            return EncodedPrompt {
                text: prompt.to_string(),
                tokens: total,
            };
        }

        let boundaries: Vec<usize> = prompt
            .char_indices()
            .map(|(idx, _)| idx)
            .chain(std::iter::once(prompt.len()))
            .collect();

        // boundaries[lo] always fits, boundaries[hi] never does.
        let (mut lo, mut hi) = (0, boundaries.len() - 1);
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if self.count_tokens(&prompt[..boundaries[mid]]) <= max_tokens {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let text = &prompt[..boundaries[lo]];
        EncodedPrompt {
            text: text.to_string(),
            tokens: self.count_tokens(text),
        }
    }
}

/// Completion budget left in the context window after the prompt.
pub fn sampling_for(prompt_tokens: usize) -> SamplingParams {
    SamplingParams {
        max_tokens: MAX_CONTEXT_TOKENS.saturating_sub(prompt_tokens) as u32,
        temperature: TEMPERATURE,
        top_p: TOP_P,
        top_k: TOP_K,
        num_sequences: 1,
    }
}

#[async_trait]
impl TextGenerator for LocalModel {
    async fn generate(&self, prompt: &str) -> Result<LlmResponse> {
        let encoded = self.encode(prompt, MAX_CONTEXT_TOKENS);
        let sampling = sampling_for(encoded.tokens);
        if sampling.max_tokens == 0 {
            return Ok(LlmResponse {
                input_tokens: encoded.tokens as u32,
                ..LlmResponse::default()
            });
        }

        debug!(
            prompt_tokens = encoded.tokens,
            max_new_tokens = sampling.max_tokens,
            "Requesting completion"
        );

        let _guard = self.gate.lock().await;
        self.client
            .complete(&self.model, &encoded.text, sampling)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn model(base_url: &str) -> LocalModel {
        LocalModel::load(LlmClient::new(None, base_url), "gpt2").unwrap()
    }

    #[test]
    fn short_prompts_pass_through_unchanged() {
        let model = model("http://127.0.0.1:1/v1/completions");
        let encoded = model.encode("Write a literature review about: graphs", 1024);
        assert_eq!(encoded.text, "Write a literature review about: graphs");
        assert!(encoded.tokens > 0 && encoded.tokens < 20);
    }

    #[test]
    fn long_prompts_are_cut_to_the_window() {
        let model = model("http://127.0.0.1:1/v1/completions");
        let long = "entanglement ".repeat(3000);

        let encoded = model.encode(&long, MAX_CONTEXT_TOKENS);
        assert!(encoded.tokens <= MAX_CONTEXT_TOKENS);
        assert!(encoded.tokens > MAX_CONTEXT_TOKENS - 8);
        assert!(encoded.text.len() < long.len());
        assert!(long.starts_with(&encoded.text));
    }

    #[test]
    fn completion_budget_fills_remaining_window() {
        assert_eq!(sampling_for(24).max_tokens, 1000);
        assert_eq!(sampling_for(MAX_CONTEXT_TOKENS).max_tokens, 0);
        assert_eq!(sampling_for(5000).max_tokens, 0);
        assert_eq!(sampling_for(0).num_sequences, 1);
    }

    #[tokio::test]
    async fn generate_returns_server_completion() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/completions")
            .match_body(Matcher::PartialJson(json!({"model": "gpt2", "top_k": 50})))
            .with_status(200)
            .with_body(json!({"choices": [{"text": "Findings suggest"}]}).to_string())
            .create_async()
            .await;

        let response = model(&format!("{}/v1/completions", server.url()))
            .generate("Write a literature review about: qubits")
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(response.text, "Findings suggest");
    }

    #[test]
    fn truncation_respects_multibyte_boundaries() {
        let model = model("http://127.0.0.1:1/v1/completions");
        let text = "Schrödinger équation für Quantenzustände ".repeat(20);

        let encoded = model.encode(&text, 5);
        assert!(encoded.tokens <= 5);
        assert!(!encoded.text.is_empty());
        assert!(text.starts_with(&encoded.text));
    }
}
