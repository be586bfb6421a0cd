use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::ReviewWriter;
use crate::llm::TextGenerator;
use crate::search::{PaperResult, SearchResult};
use crate::text::truncate;

pub const MAX_TOPIC_CHARS: usize = 200;
const MAX_CONTEXT_CHARS: usize = 1500;
const MAX_REVIEW_CHARS: usize = 5000;

pub const GENERATION_FAILED: &str = "Error generating literature review";
pub const EMPTY_GENERATION: &str = "Failed to generate review - empty output";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewOutput {
    pub text: String,
    pub generating_prompt: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Writes the review paragraph from both result lists.
pub struct Reporter {
    generator: Arc<dyn TextGenerator>,
}

impl Reporter {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

/// Renders records as JSON text, cut to the prompt's context budget.
fn render_context<T: Serialize>(records: &[T]) -> String {
    let rendered = serde_json::to_string(records).unwrap_or_default();
    truncate(&rendered, MAX_CONTEXT_CHARS).to_string()
}

pub fn build_prompt(topic: &str, web: &[SearchResult], papers: &[PaperResult]) -> String {
    format!(
        "Write a literature review about: {}\n\
         Web Results: {}\n\
         Arxiv Papers: {}\n\
         Requirements: Formal tone, synthesize key findings, reference Hayek at the end.\n",
        truncate(topic, MAX_TOPIC_CHARS),
        render_context(web),
        render_context(papers),
    )
}

#[async_trait]
impl ReviewWriter for Reporter {
    async fn write(
        &self,
        topic: &str,
        web: &[SearchResult],
        papers: &[PaperResult],
    ) -> Result<ReviewOutput> {
        info!("Report agent generating review");
        let prompt = build_prompt(topic, web, papers);

        let output = match self.generator.generate(&prompt).await {
            Ok(response) if response.text.trim().is_empty() => {
                warn!("Generation produced no text");
                ReviewOutput {
                    text: EMPTY_GENERATION.to_string(),
                    generating_prompt: prompt,
                    input_tokens: response.input_tokens,
                    output_tokens: response.output_tokens,
                }
            }
            Ok(response) => ReviewOutput {
                text: truncate(&response.text, MAX_REVIEW_CHARS).to_string(),
                generating_prompt: prompt,
                input_tokens: response.input_tokens,
                output_tokens: response.output_tokens,
            },
            Err(e) => {
                error!(error = %format!("{e:#}"), "Generation failed");
                ReviewOutput {
                    text: GENERATION_FAILED.to_string(),
                    generating_prompt: prompt,
                    input_tokens: 0,
                    output_tokens: 0,
                }
            }
        };

        Ok(output)
    }
}
