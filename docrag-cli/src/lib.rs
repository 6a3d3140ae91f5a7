//! Terminal front end for docrag.
//!
//! `docrag ask` answers a single question; `docrag chat` keeps one session
//! open and lets the user swap documents with `:load`.

pub mod cli;
pub mod repl;

pub use cli::{Cli, Commands, GlobalOpts};

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use docrag::ollama::{OllamaEmbeddingProvider, OllamaGenerator};
use docrag::{Answer, Document, IngestReport, RagPipeline, RagService, SessionId};
use tracing::info;

/// Wire the Ollama adapters into a pipeline and wrap it in a service.
pub fn build_service(opts: &GlobalOpts) -> Result<RagService> {
    let config = opts.rag_config().context("invalid chunking or retrieval settings")?;
    let base_url = opts.ollama_base_url();

    let embedder = OllamaEmbeddingProvider::new()
        .with_base_url(&base_url)
        .with_model(&opts.embedding_model)
        .with_timeout(config.embed_timeout());
    let generator = OllamaGenerator::new()
        .with_base_url(&base_url)
        .with_model(&opts.chat_model)
        .with_timeout(config.generation_timeout());

    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(embedder))
        .generator(Arc::new(generator))
        .build()?;

    Ok(RagService::new(Arc::new(pipeline)))
}

/// Read `path` as UTF-8 and make it the session's document.
pub async fn ingest_file(
    service: &RagService,
    session: SessionId,
    path: &Path,
) -> Result<IngestReport> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let document = Document::from_bytes(&bytes, path.display().to_string())?;
    let report = service.ingest(session, &document).await?;
    Ok(report)
}

pub fn print_answer(answer: &Answer, show_sources: bool) {
    println!("{}", answer.text.trim());
    if show_sources {
        for hit in answer.sources.iter() {
            let preview: String = hit.segment.text.chars().take(80).collect();
            let preview = preview.replace('\n', " ");
            println!("  [{:.3}] #{} {preview}", hit.score, hit.segment.ordinal);
        }
    }
}

async fn ask(
    service: &RagService,
    session: SessionId,
    file: &Path,
    question: &str,
    show_sources: bool,
) -> Result<()> {
    ingest_file(service, session, file).await?;
    let answer = service.answer(session, question).await?;
    print_answer(&answer, show_sources);
    Ok(())
}

pub async fn run(cli: Cli) -> Result<()> {
    let service = build_service(&cli.global)?;
    let session = service.open_session().await;
    info!(session.id = %session, ollama_url = %cli.global.ollama_base_url(), "session opened");

    let result = match &cli.command {
        Commands::Ask { file, question, sources } => {
            ask(&service, session, file, question, *sources).await
        }
        Commands::Chat { file } => repl::run(&service, session, file.as_deref()).await,
    };

    service.end_session(session).await;
    result
}
