//! General web search over a search engine's HTML results page.
//!
//! The result markup is matched by fixed CSS markers, so a layout change on
//! the engine side shows up as an empty result list rather than an error.

use anyhow::{Context, Result};
use reqwest::Client;
use scraper::{ElementRef, Html, Node, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{
    Pacer, SearchResult, MAX_BODY_CHARS, MAX_BODY_WORDS, MAX_SNIPPET_CHARS, MAX_TITLE_CHARS,
};
use crate::text::{first_words, truncate};

const RESULT_SELECTOR: &str = "div.tF2Cxc";
const TITLE_SELECTOR: &str = "h3";
const LINK_SELECTOR: &str = "a[href]";
const SNIPPET_SELECTOR: &str = "span.aCOpRe";

const NO_TITLE: &str = "No title";
const NO_LINK: &str = "#";
const NO_SNIPPET: &str = "No snippet";

const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// A result block as it appears on the results page, before the linked page is fetched.
#[derive(Debug, Clone, PartialEq)]
struct ResultBlock {
    title: String,
    link: String,
    snippet: String,
}

pub struct WebSearcher {
    client: Client,
    search_url: String,
    page_timeout: Duration,
    pacer: Arc<Pacer>,
}

impl WebSearcher {
    pub fn new(
        search_url: &str,
        user_agent: &str,
        search_timeout: Duration,
        page_timeout: Duration,
        pacer: Arc<Pacer>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(search_timeout)
            .user_agent(user_agent)
            .build()
            .context("Failed to build web search HTTP client")?;

        Ok(Self {
            client,
            search_url: search_url.to_string(),
            page_timeout,
            pacer,
        })
    }

    /// Best-effort search: returns at most `cap` results and never fails.
    pub async fn search(&self, query: &str, cap: usize) -> Vec<SearchResult> {
        let mut results = Vec::new();
        if cap == 0 {
            return results;
        }

        let blocks = match self.fetch_result_blocks(query, cap).await {
            Ok(blocks) => blocks,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Web search failed");
                return results;
            }
        };
        info!(count = blocks.len(), "Parsed web search result blocks");

        for block in blocks.into_iter().take(cap) {
            let body = if block.link == NO_LINK {
                debug!(title = %block.title, "Result has no link, skipping content fetch");
                String::new()
            } else {
                self.pacer.pace().await;
                match self.fetch_page_text(&block.link).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(link = %block.link, error = %format!("{e:#}"), "Content fetch failed");
                        String::new()
                    }
                }
            };

            results.push(SearchResult {
                title: truncate(&block.title, MAX_TITLE_CHARS).to_string(),
                link: block.link,
                snippet: truncate(&block.snippet, MAX_SNIPPET_CHARS).to_string(),
                body: truncate(&body, MAX_BODY_CHARS).to_string(),
            });
        }

        results
    }

    async fn fetch_result_blocks(&self, query: &str, cap: usize) -> Result<Vec<ResultBlock>> {
        let url = format!("{}?q={}", self.search_url, urlencoding::encode(query));
        debug!(url = %url, "Requesting search results page");

        self.pacer.pace().await;
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send search request")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Search engine returned HTTP {}", status);
        }

        let html = response
            .text()
            .await
            .context("Failed to read search results page")?;

        Ok(parse_result_blocks(&html, cap))
    }

    async fn fetch_page_text(&self, link: &str) -> Result<String> {
        let response = self
            .client
            .get(link)
            .timeout(self.page_timeout)
            .send()
            .await
            .context("Failed to fetch linked page")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Linked page returned HTTP {}", status);
        }

        let html = response
            .text()
            .await
            .context("Failed to read linked page")?;

        Ok(first_words(&visible_text(&html), MAX_BODY_WORDS))
    }
}

/// Extracts up to `cap` result blocks. Missing pieces fall back to placeholders.
fn parse_result_blocks(html: &str, cap: usize) -> Vec<ResultBlock> {
    let (Ok(result_sel), Ok(title_sel), Ok(link_sel), Ok(snippet_sel)) = (
        Selector::parse(RESULT_SELECTOR),
        Selector::parse(TITLE_SELECTOR),
        Selector::parse(LINK_SELECTOR),
        Selector::parse(SNIPPET_SELECTOR),
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);

    document
        .select(&result_sel)
        .take(cap)
        .map(|block| {
            let title = block
                .select(&title_sel)
                .next()
                .map(|el| el.text().collect::<String>())
                .unwrap_or_else(|| NO_TITLE.to_string());
            let link = block
                .select(&link_sel)
                .next()
                .and_then(|el| el.value().attr("href"))
                .unwrap_or(NO_LINK)
                .to_string();
            let snippet = block
                .select(&snippet_sel)
                .next()
                .map(|el| el.text().collect::<String>())
                .unwrap_or_else(|| NO_SNIPPET.to_string());

            ResultBlock {
                title,
                link,
                snippet,
            }
        })
        .collect()
}

/// Flattens the visible text of an HTML page into space-separated words.
fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut parts: Vec<&str> = Vec::new();
    collect_text(&document.root_element(), &mut parts);

    parts
        .iter()
        .flat_map(|part| part.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect_text<'a>(node: &ElementRef<'a>, parts: &mut Vec<&'a str>) {
    for child in node.children() {
        match child.value() {
            Node::Text(text) => parts.push(text),
            Node::Element(el) if INVISIBLE_TAGS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    collect_text(&child_ref, parts);
                }
            }
            _ => {}
        }
    }
}
