use anyhow::{Context, Result};
use clap::Parser;
use code_query::{
    config::{self, Config},
    embeddings::OpenAiEmbeddingProvider,
    http::HttpClient,
    llm::OpenAiChatModel,
    pipeline::{self, Pipeline},
    query::QueryLoop,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;

const USAGE: &str = "Usage:
  $ code-query <path to repository>

Options:
  --clear-cache, -c         Clears cache
  --no-summaries            Skip the summary pass when building the document cache
  --config <FILE>           Settings file (default: config/settings.toml)";

#[derive(Parser)]
#[command(name = "code-query")]
#[command(about = "Ask questions about a TypeScript codebase")]
#[command(version)]
struct Cli {
    /// Repository to index
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,

    /// Delete the persisted vector store before starting
    #[arg(short = 'c', long)]
    clear_cache: bool,

    /// Skip the summary pass when building the document cache
    #[arg(long)]
    no_summaries: bool,

    /// Settings file (overrides the default lookup)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn progress_bar(unit: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    let template = format!(
        "{{spinner:.green}} [{{elapsed_precise}}] [{{wide_bar:.cyan/blue}}] {{pos}}/{{len}} {}",
        unit
    );
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    config.validate()?;
    let api_key = config::api_key_from_env()?;

    let Some(path) = cli.path else {
        eprintln!("No file path provided. Please provide a path to a codebase.\n{}", USAGE);
        std::process::exit(1);
    };

    if cli.clear_cache {
        pipeline::clear_vector_store(&config.paths)?;
    }

    let openai = &config.openai;
    let http = HttpClient::new(
        "OpenAI",
        &api_key,
        &openai.base_url,
        openai.timeout(),
        config.retry.policy(),
    )
    .context("Failed to create OpenAI client")?;

    let chat = Arc::new(
        OpenAiChatModel::new(http.clone(), &openai.chat_model).with_temperature(openai.chat_temperature),
    );
    let summary_model = Arc::new(OpenAiChatModel::new(http.clone(), &openai.summary_model).with_temperature(Some(0.0)));
    let embeddings = Arc::new(OpenAiEmbeddingProvider::new(http, &openai.embedding_model));

    let top_k = config.query.top_k;
    let pipeline = Pipeline::new(config, summary_model, embeddings)
        .with_progress(progress_bar("chunks summarized"), progress_bar("batches embedded"));
    let pipeline = if cli.no_summaries {
        pipeline.with_summaries(false)
    } else {
        pipeline
    };

    let store = pipeline.load_or_build_index(&path).await?;

    let query_loop = QueryLoop::new(Arc::new(store), chat).with_top_k(top_k);
    let mut stdout = tokio::io::stdout();
    query_loop
        .run(BufReader::new(tokio::io::stdin()), &mut stdout)
        .await?;

    Ok(())
}
