use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::agent::ReviewOutcome;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewLog {
    pub id: String,
    pub timestamp: String,
    pub topic: String,
    pub outcome: String,
    pub web_search_latency_ms: u64,
    pub web_results: u32,
    pub paper_search_latency_ms: u64,
    pub paper_results: u32,
    pub generation_latency_ms: u64,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub literature_review: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReviewLog {
    pub fn new(topic: &str, outcome: &ReviewOutcome) -> Self {
        let mut log = Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            topic: topic.to_string(),
            outcome: String::new(),
            web_search_latency_ms: 0,
            web_results: 0,
            paper_search_latency_ms: 0,
            paper_results: 0,
            generation_latency_ms: 0,
            input_tokens: 0,
            output_tokens: 0,
            total_latency_ms: 0,
            literature_review: None,
            error: None,
        };

        match outcome {
            ReviewOutcome::Completed(review) => {
                log.outcome = "completed".into();
                log.web_results = review.web_results.len() as u32;
                log.paper_results = review.paper_results.len() as u32;
                log.literature_review = Some(review.literature_review.clone());
            }
            ReviewOutcome::Failed { error } => {
                log.outcome = "failed".into();
                log.error = Some(error.clone());
            }
        }

        log
    }

    pub fn with_latencies(mut self, web_ms: u64, paper_ms: u64, generation_ms: u64, total_ms: u64) -> Self {
        self.web_search_latency_ms = web_ms;
        self.paper_search_latency_ms = paper_ms;
        self.generation_latency_ms = generation_ms;
        self.total_latency_ms = total_ms;
        self
    }

    pub fn with_tokens(mut self, input_tokens: u32, output_tokens: u32) -> Self {
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self
    }

    pub fn summary(&self) -> String {
        format!(
            "Outcome: {} | Web results: {} | Papers: {} | Total latency: {:.1}s | Tokens: {}",
            self.outcome,
            self.web_results,
            self.paper_results,
            self.total_latency_ms as f64 / 1000.0,
            self.input_tokens + self.output_tokens,
        )
    }
}

/// Appends one JSON line per review to `<dir>/reviews.jsonl`.
pub struct ReviewLogger {
    dir: PathBuf,
}

impl ReviewLogger {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).context("Failed to create logs directory")?;
        Ok(Self { dir })
    }

    pub fn write(&self, log: &ReviewLog) -> Result<()> {
        let path = self.dir.join("reviews.jsonl");
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context("Failed to open log file")?;

        let json = serde_json::to_string(log).context("Failed to serialize review log")?;
        writeln!(file, "{}", json).context("Failed to write log")?;

        Ok(())
    }
}
