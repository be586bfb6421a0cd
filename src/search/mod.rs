pub mod arxiv;
pub mod pacer;
pub mod web;

use serde::{Deserialize, Serialize};

pub use arxiv::ArxivSearcher;
pub use pacer::Pacer;
pub use web::WebSearcher;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_SNIPPET_CHARS: usize = 500;
pub const MAX_BODY_WORDS: usize = 2000;
pub const MAX_BODY_CHARS: usize = 2000;

pub const MAX_PAPER_TITLE_CHARS: usize = 300;
pub const MAX_AUTHORS: usize = 5;
pub const MAX_AUTHOR_CHARS: usize = 50;
pub const MAX_ABSTRACT_CHARS: usize = 1000;

/// One hit from the general web search, with the flattened text of the linked page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperResult {
    pub title: String,
    pub authors: Vec<String>,
    /// `YYYY-MM-DD`, or `Unknown`.
    pub published: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub pdf_url: String,
}
