use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::web_scout::{LOG_TOPIC_CHARS, MAX_QUERY_CHARS};
use super::SearchAgent;
use crate::search::{ArxivSearcher, PaperResult};
use crate::text::truncate;

pub struct PaperScout {
    searcher: ArxivSearcher,
    max_results: usize,
}

impl PaperScout {
    pub fn new(searcher: ArxivSearcher, max_results: usize) -> Self {
        Self {
            searcher,
            max_results,
        }
    }
}

#[async_trait]
impl SearchAgent for PaperScout {
    type Record = PaperResult;

    fn stage_prompt(&self, topic: &str) -> String {
        format!("arXiv search for: {}", truncate(topic, MAX_QUERY_CHARS))
    }

    async fn run(&self, topic: &str) -> Result<Vec<PaperResult>> {
        info!(topic = %truncate(topic, LOG_TOPIC_CHARS), "arXiv search agent searching");
        let query = truncate(topic, MAX_QUERY_CHARS);
        Ok(self.searcher.search(query, self.max_results).await)
    }
}
