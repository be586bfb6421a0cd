mod agent;
mod config;
mod instrumentation;
mod llm;
mod search;
mod text;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::sync::Arc;
use std::time::Instant;

use agent::{PaperScout, Reporter, Review, ReviewOutcome, ReviewTeam, WebScout};
use config::{Config, LogFormat};
use instrumentation::ReviewLogger;
use llm::{LlmClient, LocalModel};
use search::{ArxivSearcher, Pacer, WebSearcher};
use text::truncate;

const PREVIEW_SNIPPET_CHARS: usize = 300;
const PREVIEW_AUTHORS_CHARS: usize = 100;
const MAX_DISPLAY_REVIEW_CHARS: usize = 10_000;
const MAX_DISPLAY_PROMPT_CHARS: usize = 2000;

#[derive(Parser)]
#[command(name = "litreview", about = "Literature review generator over web and arXiv search")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Show per-stage timings and the prompts used
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Review a single topic
    Review {
        /// The research topic
        topic: String,

        /// Print the outcome as JSON instead of rendered panels
        #[arg(long)]
        json: bool,
    },
    /// Review every topic in a JSONL file
    Batch {
        /// Path to JSONL file with {"topic": "..."} lines
        path: String,
    },
}

#[derive(serde::Deserialize)]
struct BatchTopic {
    topic: String,
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

fn build_team(config: &Config) -> Result<ReviewTeam> {
    let client = LlmClient::new(config.llm_api_key.as_deref(), &config.llm_base_url);
    let model = LocalModel::load(client, &config.llm_model)
        .context("Critical error - cannot continue without model")?;

    let pacer = Arc::new(Pacer::new(config.request_interval));
    if !pacer.is_enabled() {
        tracing::warn!("Request pacing disabled; searches may be rate limited");
    }
    let web = WebSearcher::new(
        &config.search_url,
        &config.user_agent,
        config.search_timeout,
        config.page_timeout,
        pacer.clone(),
    )?;
    let arxiv = ArxivSearcher::new(&config.arxiv_api_url, config.search_timeout, pacer)?;

    let team = ReviewTeam::new(
        Box::new(WebScout::new(web, config.max_search_results)),
        Box::new(PaperScout::new(arxiv, config.max_search_results)),
        Box::new(Reporter::new(Arc::new(model))),
        config.max_search_results,
    );

    Ok(match &config.review_log_dir {
        Some(dir) => team.with_logger(ReviewLogger::new(dir)?),
        None => team,
    })
}

fn render(review: &Review, max_results: usize, verbose: bool) {
    println!("\n== Search Results ==\n");

    println!("-- Web Results --");
    if review.web_results.is_empty() {
        println!("No web results found");
    }
    for (i, res) in review.web_results.iter().take(max_results).enumerate() {
        println!("### Result {}", i + 1);
        println!("Title: {}", res.title);
        println!("Preview: {}...", truncate(&res.snippet, PREVIEW_SNIPPET_CHARS));
        println!("Link: {}", res.link);
    }

    println!("\n-- arXiv Papers --");
    if review.paper_results.is_empty() {
        println!("No arXiv papers found");
    }
    for (i, paper) in review.paper_results.iter().take(max_results).enumerate() {
        let authors = if paper.authors.is_empty() {
            "Unknown".to_string()
        } else {
            paper.authors.join(", ")
        };
        println!("### Paper {}", i + 1);
        println!("Title: {}", paper.title);
        println!("Authors: {}...", truncate(&authors, PREVIEW_AUTHORS_CHARS));
        println!("PDF: {}", paper.pdf_url);
    }

    println!("\n== Generated Literature Review ==\n");
    println!("{}", truncate(&review.literature_review, MAX_DISPLAY_REVIEW_CHARS));

    if verbose {
        println!("\n== Technical Details ==\n");
        println!("Web Prompt: {}", review.web_prompt);
        println!("arXiv Prompt: {}", review.paper_prompt);
        println!(
            "Report Prompt: {}",
            truncate(&review.report_prompt, MAX_DISPLAY_PROMPT_CHARS)
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    match cli.command {
        Commands::Review { topic, json } => {
            if agent::Topic::parse(&topic).is_err() {
                eprintln!("Please enter a valid topic!");
                std::process::exit(2);
            }

            let team = build_team(&config)?;
            let outcome = team
                .review(&topic, cli.verbose)
                .await
                .context("Topic rejected")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            }

            match outcome {
                ReviewOutcome::Completed(review) => {
                    if !json {
                        eprintln!("Review process completed!");
                        render(&review, config.max_search_results, cli.verbose);
                    }
                }
                ReviewOutcome::Failed { error } => {
                    eprintln!("{}", error);
                    std::process::exit(1);
                }
            }
        }
        Commands::Batch { path } => {
            let file =
                std::fs::File::open(&path).context(format!("Failed to open topics file: {}", path))?;
            let reader = std::io::BufReader::new(file);
            let team = build_team(&config)?;

            let mut completed = 0;
            let mut failed = 0;
            let mut rejected = 0;
            let mut latencies: Vec<u128> = Vec::new();

            for (i, line) in reader.lines().enumerate() {
                let line = line.context("Failed to read line")?;
                if line.trim().is_empty() {
                    continue;
                }

                let entry: BatchTopic =
                    serde_json::from_str(&line).context(format!("Failed to parse line {}", i + 1))?;

                eprintln!("\n[{}] {}", i + 1, truncate(&entry.topic, 80));

                let start = Instant::now();
                match team.review(&entry.topic, cli.verbose).await {
                    Ok(ReviewOutcome::Completed(review)) => {
                        completed += 1;
                        println!(
                            "  completed | web: {} | papers: {} | review: {} chars",
                            review.web_results.len(),
                            review.paper_results.len(),
                            review.literature_review.chars().count()
                        );
                    }
                    Ok(ReviewOutcome::Failed { error }) => {
                        failed += 1;
                        println!("  failed | {}", error);
                    }
                    Err(e) => {
                        rejected += 1;
                        println!("  rejected | {}", e);
                        continue;
                    }
                }
                latencies.push(start.elapsed().as_millis());
            }

            println!("\n=== Batch Summary ===");
            println!(
                "Completed: {} | Failed: {} | Rejected: {}",
                completed, failed, rejected
            );
            if !latencies.is_empty() {
                let avg = latencies.iter().sum::<u128>() as f64 / latencies.len() as f64;
                println!("Avg latency: {:.1}s", avg / 1000.0);
            }
        }
    }

    Ok(())
}
