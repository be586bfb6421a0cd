pub mod paper_scout;
pub mod reporter;
pub mod web_scout;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::instrumentation::{ReviewLog, ReviewLogger};
use crate::search::{PaperResult, SearchResult};
use crate::text::truncate;

pub use paper_scout::PaperScout;
pub use reporter::{ReviewOutput, Reporter, MAX_TOPIC_CHARS};
pub use web_scout::WebScout;

/// One search stage of a review.
#[async_trait]
pub trait SearchAgent: Send + Sync {
    type Record: Send;

    /// Describes the search this stage runs for `topic`, whether or not it succeeds.
    fn stage_prompt(&self, topic: &str) -> String;

    async fn run(&self, topic: &str) -> Result<Vec<Self::Record>>;
}

#[async_trait]
pub trait ReviewWriter: Send + Sync {
    async fn write(
        &self,
        topic: &str,
        web: &[SearchResult],
        papers: &[PaperResult],
    ) -> Result<ReviewOutput>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopicError {
    #[error("Please enter a valid topic!")]
    Empty,
}

/// A non-blank research topic, at most `MAX_TOPIC_CHARS` characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic(String);

impl Topic {
    pub fn parse(raw: &str) -> Result<Self, TopicError> {
        if raw.trim().is_empty() {
            return Err(TopicError::Empty);
        }
        Ok(Self(truncate(raw, MAX_TOPIC_CHARS).to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    pub topic: String,
    pub web_prompt: String,
    pub paper_prompt: String,
    pub report_prompt: String,
    pub web_results: Vec<SearchResult>,
    pub paper_results: Vec<PaperResult>,
    pub literature_review: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReviewOutcome {
    Completed(Box<Review>),
    Failed { error: String },
}

/// Runs web search, paper search, and report writing for one topic.
pub struct ReviewTeam {
    web_agent: Box<dyn SearchAgent<Record = SearchResult>>,
    paper_agent: Box<dyn SearchAgent<Record = PaperResult>>,
    reporter: Box<dyn ReviewWriter>,
    max_results: usize,
    logger: Option<ReviewLogger>,
}

#[derive(Default)]
struct StageTimings {
    web_ms: u64,
    paper_ms: u64,
    generation_ms: u64,
    input_tokens: u32,
    output_tokens: u32,
}

impl ReviewTeam {
    pub fn new(
        web_agent: Box<dyn SearchAgent<Record = SearchResult>>,
        paper_agent: Box<dyn SearchAgent<Record = PaperResult>>,
        reporter: Box<dyn ReviewWriter>,
        max_results: usize,
    ) -> Self {
        Self {
            web_agent,
            paper_agent,
            reporter,
            max_results,
            logger: None,
        }
    }

    pub fn with_logger(mut self, logger: ReviewLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Validates `raw_topic` and conducts the review. Blank topics are rejected
    /// before any search runs.
    pub async fn review(&self, raw_topic: &str, verbose: bool) -> Result<ReviewOutcome, TopicError> {
        let topic = Topic::parse(raw_topic)?;
        Ok(self.conduct_review(&topic, verbose).await)
    }

    pub async fn conduct_review(&self, topic: &Topic, verbose: bool) -> ReviewOutcome {
        let run_start = Instant::now();
        let mut timings = StageTimings::default();

        let outcome = match self.run_stages(topic, &mut timings, verbose).await {
            Ok(review) => ReviewOutcome::Completed(Box::new(review)),
            Err(e) => {
                error!(error = %format!("{e:#}"), "Review pipeline failed");
                ReviewOutcome::Failed {
                    error: format!("System error: {e}"),
                }
            }
        };

        let total_ms = run_start.elapsed().as_millis() as u64;
        if verbose {
            eprintln!("[team] Finished in {}ms", total_ms);
        }

        let log = ReviewLog::new(topic.as_str(), &outcome)
            .with_latencies(timings.web_ms, timings.paper_ms, timings.generation_ms, total_ms)
            .with_tokens(timings.input_tokens, timings.output_tokens);
        info!(id = %log.id, "{}", log.summary());

        if let Some(logger) = &self.logger {
            if let Err(e) = logger.write(&log) {
                warn!(error = %format!("{e:#}"), "Failed to write review log");
            }
        }

        outcome
    }

    async fn run_stages(
        &self,
        topic: &Topic,
        timings: &mut StageTimings,
        verbose: bool,
    ) -> Result<Review> {
        let web_start = Instant::now();
        let web_prompt = self.web_agent.stage_prompt(topic.as_str());
        let mut web_results = or_empty("web", self.web_agent.run(topic.as_str()).await);
        timings.web_ms = web_start.elapsed().as_millis() as u64;
        if verbose {
            eprintln!("[web] {} results in {}ms", web_results.len(), timings.web_ms);
        }

        let paper_start = Instant::now();
        let paper_prompt = self.paper_agent.stage_prompt(topic.as_str());
        let mut paper_results = or_empty("paper", self.paper_agent.run(topic.as_str()).await);
        timings.paper_ms = paper_start.elapsed().as_millis() as u64;
        if verbose {
            eprintln!("[arxiv] {} papers in {}ms", paper_results.len(), timings.paper_ms);
        }

        web_results.truncate(self.max_results);
        paper_results.truncate(self.max_results);
        let report_topic = truncate(topic.as_str(), MAX_TOPIC_CHARS);

        let generation_start = Instant::now();
        let output = self
            .reporter
            .write(report_topic, &web_results, &paper_results)
            .await?;
        timings.generation_ms = generation_start.elapsed().as_millis() as u64;
        timings.input_tokens = output.input_tokens;
        timings.output_tokens = output.output_tokens;
        if verbose {
            eprintln!("[report] Generated review in {}ms", timings.generation_ms);
        }

        info!(
            web_results = web_results.len(),
            paper_results = paper_results.len(),
            "Review completed"
        );

        Ok(Review {
            topic: report_topic.to_string(),
            web_prompt,
            paper_prompt,
            report_prompt: output.generating_prompt,
            web_results,
            paper_results,
            literature_review: output.text,
        })
    }
}

/// A failed search stage contributes no records.
fn or_empty<T>(stage: &str, result: Result<Vec<T>>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        warn!(stage, error = %format!("{e:#}"), "Search stage failed, continuing without its results");
        Vec::new()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{LlmResponse, TextGenerator};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubAgent<T> {
        records: Vec<T>,
        prompt: &'static str,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl<T: Clone + Send + Sync + 'static> SearchAgent for StubAgent<T> {
        type Record = T;

        fn stage_prompt(&self, topic: &str) -> String {
            format!("{}{}", self.prompt, topic)
        }

        async fn run(&self, _topic: &str) -> Result<Vec<T>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.records.clone())
        }
    }

    struct BrokenAgent;

    #[async_trait]
    impl SearchAgent for BrokenAgent {
        type Record = SearchResult;

        fn stage_prompt(&self, topic: &str) -> String {
            format!("Web search for: {}", topic)
        }

        async fn run(&self, _topic: &str) -> Result<Vec<SearchResult>> {
            anyhow::bail!("malformed search response")
        }
    }

    struct BrokenPaperAgent;

    #[async_trait]
    impl SearchAgent for BrokenPaperAgent {
        type Record = PaperResult;

        fn stage_prompt(&self, topic: &str) -> String {
            format!("arXiv search for: {}", topic)
        }

        async fn run(&self, _topic: &str) -> Result<Vec<PaperResult>> {
            anyhow::bail!("malformed search response")
        }
    }

    struct StubWriter;

    #[async_trait]
    impl ReviewWriter for StubWriter {
        async fn write(
            &self,
            _topic: &str,
            _web: &[SearchResult],
            _papers: &[PaperResult],
        ) -> Result<ReviewOutput> {
            Ok(ReviewOutput {
                text: "STUB REVIEW TEXT".into(),
                generating_prompt: "STUB PROMPT".into(),
                input_tokens: 0,
                output_tokens: 0,
            })
        }
    }

    struct FailingWriter;

    #[async_trait]
    impl ReviewWriter for FailingWriter {
        async fn write(
            &self,
            _topic: &str,
            _web: &[SearchResult],
            _papers: &[PaperResult],
        ) -> Result<ReviewOutput> {
            anyhow::bail!("tokenizer not initialized")
        }
    }

    struct RaisingGenerator;

    #[async_trait]
    impl TextGenerator for RaisingGenerator {
        async fn generate(&self, _prompt: &str) -> Result<LlmResponse> {
            anyhow::bail!("generation blew up")
        }
    }

    fn fake_search_result() -> SearchResult {
        SearchResult {
            title: "Quantum supremacy using a programmable superconducting processor".into(),
            link: "https://example.org/supremacy".into(),
            snippet: "53 qubits".into(),
            body: "random circuit sampling".into(),
        }
    }

    fn fake_paper() -> PaperResult {
        PaperResult {
            title: "Fault-tolerant quantum computation".into(),
            authors: vec!["P. Shor".into()],
            published: "1996-05-16".into(),
            abstract_text: "It has recently been realized...".into(),
            pdf_url: "https://arxiv.org/pdf/quant-ph/9605011".into(),
        }
    }

    struct Counters {
        web: Arc<AtomicUsize>,
        paper: Arc<AtomicUsize>,
    }

    fn stub_team(
        web: Vec<SearchResult>,
        papers: Vec<PaperResult>,
        reporter: Box<dyn ReviewWriter>,
    ) -> (ReviewTeam, Counters) {
        let counters = Counters {
            web: Arc::new(AtomicUsize::new(0)),
            paper: Arc::new(AtomicUsize::new(0)),
        };
        let team = ReviewTeam::new(
            Box::new(StubAgent {
                records: web,
                prompt: "Web search for: ",
                calls: counters.web.clone(),
            }),
            Box::new(StubAgent {
                records: papers,
                prompt: "arXiv search for: ",
                calls: counters.paper.clone(),
            }),
            reporter,
            2,
        );
        (team, counters)
    }

    fn completed(outcome: ReviewOutcome) -> Review {
        match outcome {
            ReviewOutcome::Completed(review) => *review,
            ReviewOutcome::Failed { error } => panic!("expected a completed review, got {error}"),
        }
    }

    #[tokio::test]
    async fn end_to_end_with_stubs() {
        let (team, counters) = stub_team(
            vec![fake_search_result()],
            vec![fake_paper()],
            Box::new(StubWriter),
        );

        let review = completed(team.review("quantum computing", false).await.unwrap());

        assert_eq!(review.literature_review, "STUB REVIEW TEXT");
        assert_eq!(review.web_results.len(), 1);
        assert_eq!(review.paper_results.len(), 1);
        assert_eq!(review.web_prompt, "Web search for: quantum computing");
        assert_eq!(review.paper_prompt, "arXiv search for: quantum computing");
        assert_eq!(review.report_prompt, "STUB PROMPT");
        assert_eq!(counters.web.load(Ordering::SeqCst), 1);
        assert_eq!(counters.paper.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_topic_is_rejected_before_searching() {
        let (team, counters) = stub_team(vec![], vec![], Box::new(StubWriter));

        assert_eq!(team.review("", false).await, Err(TopicError::Empty));
        assert_eq!(team.review("   \n", false).await, Err(TopicError::Empty));
        assert_eq!(counters.web.load(Ordering::SeqCst), 0);
        assert_eq!(counters.paper.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_search_stages_become_empty_lists() {
        let team = ReviewTeam::new(
            Box::new(BrokenAgent),
            Box::new(BrokenPaperAgent),
            Box::new(StubWriter),
            2,
        );

        let review = completed(team.review("quantum computing", false).await.unwrap());

        assert!(review.web_results.is_empty());
        assert!(review.paper_results.is_empty());
        assert_eq!(review.literature_review, "STUB REVIEW TEXT");
        assert_eq!(review.web_prompt, "Web search for: quantum computing");
        assert_eq!(review.paper_prompt, "arXiv search for: quantum computing");
    }

    #[tokio::test]
    async fn generation_failure_still_completes_with_prompt() {
        let (team, _) = stub_team(
            vec![fake_search_result()],
            vec![fake_paper()],
            Box::new(Reporter::new(Arc::new(RaisingGenerator))),
        );

        let review = completed(team.review("quantum computing", false).await.unwrap());

        assert_eq!(review.literature_review, reporter::GENERATION_FAILED);
        assert_eq!(
            review.report_prompt,
            reporter::build_prompt("quantum computing", &review.web_results, &review.paper_results)
        );
    }

    #[tokio::test]
    async fn writer_error_becomes_failed_outcome() {
        let (team, _) = stub_team(vec![], vec![], Box::new(FailingWriter));

        let outcome = team.review("quantum computing", false).await.unwrap();

        assert_eq!(
            outcome,
            ReviewOutcome::Failed {
                error: "System error: tokenizer not initialized".into()
            }
        );
    }

    #[tokio::test]
    async fn lists_are_capped_and_topic_truncated() {
        let (team, _) = stub_team(
            vec![fake_search_result(); 5],
            vec![fake_paper(); 4],
            Box::new(StubWriter),
        );

        let review = completed(team.review(&"t".repeat(450), false).await.unwrap());

        assert_eq!(review.web_results.len(), 2);
        assert_eq!(review.paper_results.len(), 2);
        assert_eq!(review.topic.chars().count(), MAX_TOPIC_CHARS);
    }

    #[tokio::test]
    async fn repeated_reviews_are_independent() {
        let (team, counters) = stub_team(
            vec![fake_search_result()],
            vec![fake_paper()],
            Box::new(StubWriter),
        );

        let first = team.review("quantum computing", false).await.unwrap();
        let second = team.review("quantum computing", false).await.unwrap();

        assert_eq!(first, second);
        let mut first = completed(first);
        first.web_results.clear();
        assert_eq!(completed(second).web_results.len(), 1);
        assert_eq!(counters.web.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn each_run_is_logged() {
        let dir = tempfile::tempdir().unwrap();
        let (team, _) = stub_team(vec![fake_search_result()], vec![], Box::new(StubWriter));
        let team = team.with_logger(ReviewLogger::new(dir.path()).unwrap());

        team.review("quantum computing", false).await.unwrap();
        team.review("topological qubits", false).await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("reviews.jsonl")).unwrap();
        let logs: Vec<ReviewLog> = written
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].topic, "quantum computing");
        assert_eq!(logs[0].web_results, 1);
        assert_eq!(logs[1].outcome, "completed");
        assert_ne!(logs[0].id, logs[1].id);
    }
}
