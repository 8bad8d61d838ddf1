use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use coderag_retrieval::{HybridRetrieval, RetrievalConfig, SearchRequest, preview};
use coderag_vector_store::{ContentTypeFilter, Document, NoopVectorSearch};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Hybrid code search over a document corpus
#[derive(Debug, Parser)]
#[command(name = "coderag", version, about)]
pub struct SearchCli {
    #[command(subcommand)]
    pub command: SearchCommand,
}

#[derive(Debug, Subcommand)]
pub enum SearchCommand {
    /// Search the corpus
    Search(SearchArgs),

    /// Show index and configuration statistics
    Stats(StatsArgs),
}

#[derive(Debug, Args)]
pub struct CorpusArgs {
    /// JSON file holding an array of documents
    #[arg(long, value_name = "PATH")]
    pub corpus: PathBuf,

    /// TOML retrieval configuration (defaults to lexical-only search)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// Search query; may be omitted with --file-path to list that file
    #[arg(value_name = "QUERY", default_value = "")]
    pub query: String,

    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Only return fragments in this language
    #[arg(long)]
    pub language: Option<String>,

    /// Only return fragments from this repository
    #[arg(long)]
    pub repo: Option<String>,

    /// Only return fragments of this source file (exact path)
    #[arg(long, value_name = "PATH")]
    pub file_path: Option<String>,

    /// Restrict to code, doc or both
    #[arg(long, value_name = "KIND")]
    pub content_type: Option<ContentTypeFilter>,

    /// Number of results to return (1-50)
    #[arg(short = 'n', long)]
    pub top_k: Option<usize>,

    /// Print the full result bundle as JSON
    #[arg(long)]
    pub json: bool,

    /// Characters of content shown per result
    #[arg(long, default_value_t = 200)]
    pub preview_chars: usize,

    /// Show timing breakdown
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Parser)]
pub struct StatsArgs {
    #[command(flatten)]
    pub corpus: CorpusArgs,

    /// Print statistics as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            SearchCommand::Search(args) => run_search(args).await,
            SearchCommand::Stats(args) => run_stats(args).await,
        }
    }
}

fn load_corpus(path: &Path) -> Result<Vec<Document>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read corpus {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse corpus {}", path.display()))
}

async fn open_retrieval(args: &CorpusArgs) -> Result<HybridRetrieval> {
    let config = match &args.config {
        Some(path) => RetrievalConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => RetrievalConfig::lexical_only(),
    };
    let documents = load_corpus(&args.corpus)?;

    let retrieval = HybridRetrieval::new(config, Arc::new(NoopVectorSearch))
        .context("Failed to initialize retrieval engine")?;
    retrieval
        .initialize(&documents)
        .await
        .context("Failed to index corpus")?;
    Ok(retrieval)
}

async fn run_search(args: SearchArgs) -> Result<()> {
    let retrieval = open_retrieval(&args.corpus).await?;

    let mut request = SearchRequest::new(args.query);
    request.language = args.language;
    request.repo = args.repo;
    request.content_type = args.content_type;
    request.file_path = args.file_path;
    request.top_k = args.top_k;

    let (results, stats) = retrieval
        .search_with_stats(&request)
        .await
        .context("Search failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("{} No results found", "✗".bright_red());
        return Ok(());
    }

    println!(
        "{} Found {} results in {}ms\n",
        "✓".bright_green(),
        results.len().to_string().bright_cyan(),
        stats.total_time_ms.to_string().bright_cyan()
    );

    for (i, result) in results.final_results.iter().enumerate() {
        let lines = match (result.start_line, result.end_line) {
            (Some(start), Some(end)) => format!(":{start}-{end}"),
            _ => String::new(),
        };
        let location = if result.repo.is_empty() {
            result.path.clone()
        } else {
            format!("{}/{}", result.repo, result.path)
        };
        println!(
            "{}. {}{}",
            (i + 1).to_string().bright_yellow(),
            location.bright_cyan(),
            lines.bright_black()
        );
        println!(
            "   {} {:.4} {} {}",
            "Score:".bright_black(),
            result.score,
            "Id:".bright_black(),
            result.id
        );
        for line in preview(&result.content, args.preview_chars).lines() {
            println!("   {}", line.dimmed());
        }
        println!();
    }

    if args.verbose {
        println!("{}", "Search Statistics:".bright_blue());
        println!(
            "  Vector search: {}ms ({} results)",
            stats.vector_time_ms, stats.vector_count
        );
        println!(
            "  Lexical search: {}ms ({} results)",
            stats.lexical_time_ms, stats.lexical_count
        );
        println!("  Fusion: {}ms", stats.fusion_time_ms);
        if stats.vector_degraded {
            println!("  {} Vector search unavailable", "!".bright_yellow());
        }
    }

    Ok(())
}

async fn run_stats(args: StatsArgs) -> Result<()> {
    let retrieval = open_retrieval(&args.corpus).await?;
    let stats = retrieval.stats().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let lexical = &stats.lexical;
    println!("{} Index Status", "▶".bright_blue());
    println!(
        "  Documents: {} indexed, {} skipped",
        lexical.indexed_documents.bright_cyan(),
        lexical.skipped_documents.bright_cyan()
    );
    println!("  Vocabulary: {} terms", lexical.vocabulary_size.bright_cyan());
    println!(
        "  Average length: {:.1} tokens",
        lexical.average_document_length
    );
    println!(
        "  BM25: k1={} b={} epsilon={}",
        lexical.k1, lexical.b, lexical.epsilon
    );
    println!(
        "  Weights: vector={} lexical={}",
        stats.config.vector_weight, stats.config.lexical_weight
    );
    let rerank = if stats.config.rerank_enabled {
        "enabled".bright_green().to_string()
    } else {
        "disabled".bright_black().to_string()
    };
    println!("  Rerank: {rerank}");

    Ok(())
}
