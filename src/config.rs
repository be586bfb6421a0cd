use anyhow::{Context, Result};
use std::time::Duration;

/// Output format for log lines on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Anything other than `json` (case-insensitive) selects plain text.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub search_url: String,
    pub arxiv_api_url: String,
    pub llm_base_url: String,
    pub llm_api_key: Option<String>,
    pub llm_model: String,
    pub max_search_results: usize,
    pub request_interval: Duration,
    pub search_timeout: Duration,
    pub page_timeout: Duration,
    pub user_agent: String,
    /// `None` disables the JSONL run log.
    pub review_log_dir: Option<String>,
    pub log_format: LogFormat,
}

impl Config {
    /// Loads `.env` into the process environment, then reads every setting.
    /// Call this before tracing is initialized so `RUST_LOG` and `LOG_FORMAT`
    /// from `.env` take effect.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            search_url: std::env::var("SEARCH_URL")
                .unwrap_or_else(|_| "https://www.google.com/search".into()),
            arxiv_api_url: std::env::var("ARXIV_API_URL")
                .unwrap_or_else(|_| "https://export.arxiv.org/api/query".into()),
            llm_base_url: std::env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080/v1/completions".into()),
            llm_api_key: std::env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty()),
            llm_model: std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt2".into()),
            max_search_results: std::env::var("MAX_SEARCH_RESULTS")
                .unwrap_or_else(|_| "2".into())
                .parse()
                .context("MAX_SEARCH_RESULTS must be a number")?,
            request_interval: Duration::from_millis(
                std::env::var("REQUEST_INTERVAL_MS")
                    .unwrap_or_else(|_| "1000".into())
                    .parse()
                    .context("REQUEST_INTERVAL_MS must be a number")?,
            ),
            search_timeout: Duration::from_secs(
                std::env::var("SEARCH_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".into())
                    .parse()
                    .context("SEARCH_TIMEOUT_SECS must be a number")?,
            ),
            page_timeout: Duration::from_secs(
                std::env::var("PAGE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "5".into())
                    .parse()
                    .context("PAGE_TIMEOUT_SECS must be a number")?,
            ),
            user_agent: std::env::var("USER_AGENT").unwrap_or_else(|_| "Mozilla/5.0".into()),
            review_log_dir: match std::env::var("REVIEW_LOG_DIR") {
                Ok(dir) if dir.is_empty() => None,
                Ok(dir) => Some(dir),
                Err(_) => Some("logs".into()),
            },
            log_format: LogFormat::parse(std::env::var("LOG_FORMAT").ok().as_deref()),
        })
    }
}
