//! Keyword search against the arXiv Atom API.

use anyhow::{anyhow, Context, Result};
use chrono::DateTime;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use super::{
    Pacer, PaperResult, MAX_ABSTRACT_CHARS, MAX_AUTHORS, MAX_AUTHOR_CHARS, MAX_PAPER_TITLE_CHARS,
};
use crate::text::{collapse_whitespace, truncate};

const NO_ABSTRACT: &str = "No abstract";
const NO_PDF: &str = "#";
const UNKNOWN_DATE: &str = "Unknown";

/// An Atom `<entry>` with only the fields the search needs.
#[derive(Debug, Default, Clone, PartialEq)]
struct AtomEntry {
    title: String,
    authors: Vec<String>,
    published: Option<String>,
    summary: Option<String>,
    pdf_url: Option<String>,
}

impl AtomEntry {
    fn into_paper(self) -> PaperResult {
        let title = collapse_whitespace(&self.title);
        let authors = self
            .authors
            .iter()
            .take(MAX_AUTHORS)
            .map(|name| truncate(name.trim(), MAX_AUTHOR_CHARS).to_string())
            .collect();
        let published = self
            .published
            .as_deref()
            .and_then(|raw| DateTime::parse_from_rfc3339(raw.trim()).ok())
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| UNKNOWN_DATE.to_string());
        let abstract_text = match self.summary.as_deref().map(collapse_whitespace) {
            Some(summary) if !summary.is_empty() => {
                truncate(&summary, MAX_ABSTRACT_CHARS).to_string()
            }
            _ => NO_ABSTRACT.to_string(),
        };

        PaperResult {
            title: truncate(&title, MAX_PAPER_TITLE_CHARS).to_string(),
            authors,
            published,
            abstract_text,
            pdf_url: self
                .pdf_url
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| NO_PDF.to_string()),
        }
    }
}

pub struct ArxivSearcher {
    client: Client,
    api_url: String,
    pacer: Arc<Pacer>,
}

impl ArxivSearcher {
    pub fn new(api_url: &str, timeout: Duration, pacer: Arc<Pacer>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("litreview/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build arXiv HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.to_string(),
            pacer,
        })
    }

    /// Relevance-sorted search: returns at most `cap` papers and never fails.
    pub async fn search(&self, query: &str, cap: usize) -> Vec<PaperResult> {
        if cap == 0 {
            return Vec::new();
        }

        match self.fetch_entries(query, cap).await {
            Ok(entries) => {
                let papers: Vec<PaperResult> = entries
                    .into_iter()
                    .take(cap)
                    .map(AtomEntry::into_paper)
                    .collect();
                info!(count = papers.len(), "arXiv search completed");
                papers
            }
            Err(e) => {
                error!(error = %format!("{e:#}"), "arXiv search failed");
                Vec::new()
            }
        }
    }

    async fn fetch_entries(&self, query: &str, cap: usize) -> Result<Vec<AtomEntry>> {
        self.pacer.pace().await;

        let response = self
            .client
            .get(&self.api_url)
            .query(&[("search_query", query)])
            .query(&[("start", 0), ("max_results", cap)])
            .query(&[("sortBy", "relevance"), ("sortOrder", "descending")])
            .send()
            .await
            .context("Failed to send arXiv request")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("arXiv API error: HTTP {}", status);
        }

        let xml = response
            .text()
            .await
            .context("Failed to read arXiv response")?;

        parse_atom_feed(&xml)
    }
}

fn local_name(raw: &[u8]) -> &[u8] {
    match raw.iter().position(|b| *b == b':') {
        Some(ix) => &raw[ix + 1..],
        None => raw,
    }
}

fn pdf_href(link: &BytesStart<'_>) -> Option<String> {
    let mut href = None;
    let mut is_pdf = false;
    for attr in link.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).to_string();
        match attr.key.as_ref() {
            b"href" => href = Some(value),
            b"title" if value.eq_ignore_ascii_case("pdf") => is_pdf = true,
            b"type" if value.contains("pdf") => is_pdf = true,
            _ => {}
        }
    }
    href.filter(|_| is_pdf)
}

#[derive(Clone, Copy)]
enum TextTarget {
    Title,
    Author,
    Published,
    Summary,
}

fn parse_atom_feed(xml: &str) -> Result<Vec<AtomEntry>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut entries = Vec::new();
    let mut current: Option<AtomEntry> = None;
    let mut target: Option<TextTarget> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.name();
                match local_name(name.as_ref()) {
                    b"entry" => {
                        current = Some(AtomEntry::default());
                        target = None;
                    }
                    b"title" if current.is_some() => target = Some(TextTarget::Title),
                    b"name" if current.is_some() => target = Some(TextTarget::Author),
                    b"published" if current.is_some() => target = Some(TextTarget::Published),
                    b"summary" if current.is_some() => target = Some(TextTarget::Summary),
                    b"link" => {
                        if let Some(entry) = current.as_mut().filter(|c| c.pdf_url.is_none()) {
                            entry.pdf_url = pdf_href(&e);
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => {
                let name = e.name();
                if local_name(name.as_ref()) == b"link" {
                    if let Some(entry) = current.as_mut().filter(|c| c.pdf_url.is_none()) {
                        entry.pdf_url = pdf_href(&e);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                if let (Some(tag), Some(entry)) = (target.take(), current.as_mut()) {
                    let text = t
                        .unescape()
                        .map_err(|e| anyhow!("XML unescape error: {}", e))?
                        .to_string();
                    match tag {
                        TextTarget::Title => entry.title = text,
                        TextTarget::Author => entry.authors.push(text),
                        TextTarget::Published => entry.published = Some(text),
                        TextTarget::Summary => entry.summary = Some(text),
                    }
                }
            }
            Ok(Event::End(e)) => {
                if local_name(e.name().as_ref()) == b"entry" {
                    if let Some(entry) = current.take() {
                        entries.push(entry);
                    }
                }
                target = None;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(anyhow!("XML parse error: {}", e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>arXiv Query: search_query=all:quantum</title>
  <entry>
    <id>http://arxiv.org/abs/2501.01234v1</id>
    <published>2025-01-15T12:00:00Z</published>
    <title>Surface codes
      at scale</title>
    <summary>We study   logical error rates &amp; decoders.</summary>
    <author><name>Doe, J.</name></author>
    <author><name>Smith, A.</name></author>
    <link rel="alternate" type="text/html" href="https://arxiv.org/abs/2501.01234v1"/>
    <link title="pdf" href="https://arxiv.org/pdf/2501.01234v1" rel="related" type="application/pdf"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2502.00001v2</id>
    <title>Bare entry</title>
  </entry>
</feed>
"#;

    fn searcher(api_url: &str) -> ArxivSearcher {
        ArxivSearcher::new(api_url, Duration::from_secs(2), Arc::new(Pacer::new(Duration::ZERO))).unwrap()
    }

    #[test]
    fn parses_entries_and_ignores_feed_title() {
        let entries = parse_atom_feed(SAMPLE).unwrap();
        assert_eq!(entries.len(), 2);

        let first = &entries[0];
        assert_eq!(first.title, "Surface codes\n      at scale");
        assert_eq!(first.authors, vec!["Doe, J.", "Smith, A."]);
        assert_eq!(first.published.as_deref(), Some("2025-01-15T12:00:00Z"));
        assert_eq!(
            first.pdf_url.as_deref(),
            Some("https://arxiv.org/pdf/2501.01234v1")
        );
        assert_eq!(entries[1].title, "Bare entry");
    }

    #[test]
    fn maps_entries_into_bounded_papers() {
        let entries = parse_atom_feed(SAMPLE).unwrap();
        let papers: Vec<PaperResult> = entries.into_iter().map(AtomEntry::into_paper).collect();

        assert_eq!(papers[0].title, "Surface codes at scale");
        assert_eq!(papers[0].published, "2025-01-15");
        assert_eq!(papers[0].abstract_text, "We study logical error rates & decoders.");

        assert_eq!(papers[1].published, UNKNOWN_DATE);
        assert_eq!(papers[1].abstract_text, NO_ABSTRACT);
        assert_eq!(papers[1].pdf_url, NO_PDF);
        assert!(papers[1].authors.is_empty());
    }

    #[test]
    fn long_fields_are_truncated() {
        let entry = AtomEntry {
            title: "x".repeat(1000),
            authors: (0..9).map(|i| format!("{i}{}", "n".repeat(80))).collect(),
            published: Some("not a date".into()),
            summary: Some("a".repeat(5000)),
            pdf_url: Some("https://arxiv.org/pdf/1".into()),
        };

        let paper = entry.into_paper();
        assert_eq!(paper.title.chars().count(), MAX_PAPER_TITLE_CHARS);
        assert_eq!(paper.authors.len(), MAX_AUTHORS);
        assert!(paper
            .authors
            .iter()
            .all(|a| a.chars().count() <= MAX_AUTHOR_CHARS));
        assert!(paper.authors[0].starts_with('0'));
        assert_eq!(paper.abstract_text.chars().count(), MAX_ABSTRACT_CHARS);
        assert_eq!(paper.published, UNKNOWN_DATE);
    }

    #[test]
    fn malformed_feed_is_an_error() {
        assert!(parse_atom_feed("<feed><entry><title>x</entry></feed>").is_err());
    }

    #[tokio::test]
    async fn search_sends_relevance_query_and_caps_results() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("search_query".into(), "quantum computing".into()),
                Matcher::UrlEncoded("max_results".into(), "1".into()),
                Matcher::UrlEncoded("sortBy".into(), "relevance".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/atom+xml")
            .with_body(SAMPLE)
            .create_async()
            .await;

        let papers = searcher(&format!("{}/api/query", server.url()))
            .search("quantum computing", 1)
            .await;

        mock.assert_async().await;
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].authors, vec!["Doe, J.", "Smith, A."]);
    }

    #[tokio::test]
    async fn server_error_yields_empty_list() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/query")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let papers = searcher(&format!("{}/api/query", server.url()))
            .search("topic", 2)
            .await;
        assert!(papers.is_empty());
    }

    #[tokio::test]
    async fn transport_error_yields_empty_list() {
        let papers = searcher("http://127.0.0.1:1/api/query").search("topic", 2).await;
        assert!(papers.is_empty());
    }
}
