use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::SearchAgent;
use crate::search::{SearchResult, WebSearcher};
use crate::text::truncate;

/// Longest topic prefix sent to a search backend.
pub const MAX_QUERY_CHARS: usize = 100;
pub const LOG_TOPIC_CHARS: usize = 50;

pub struct WebScout {
    searcher: WebSearcher,
    max_results: usize,
}

impl WebScout {
    pub fn new(searcher: WebSearcher, max_results: usize) -> Self {
        Self {
            searcher,
            max_results,
        }
    }
}

#[async_trait]
impl SearchAgent for WebScout {
    type Record = SearchResult;

    fn stage_prompt(&self, topic: &str) -> String {
        format!("Web search for: {}", truncate(topic, MAX_QUERY_CHARS))
    }

    async fn run(&self, topic: &str) -> Result<Vec<SearchResult>> {
        info!(topic = %truncate(topic, LOG_TOPIC_CHARS), "Web search agent searching");
        let query = truncate(topic, MAX_QUERY_CHARS);
        Ok(self.searcher.search(query, self.max_results).await)
    }
}
