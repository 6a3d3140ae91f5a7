//! Command-line argument definitions.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use docrag::RagConfig;
use docrag::chunking::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use docrag::ollama::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use docrag::retriever::DEFAULT_TOP_K;
use docrag_telemetry::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "docrag")]
#[command(
    about = "Ask questions about a text document using a local Ollama server",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Ingest a document and answer one question
    Ask {
        /// Text file to ingest
        #[arg(short, long)]
        file: PathBuf,

        /// Question to ask about the file
        #[arg(short, long)]
        question: String,

        /// Print the retrieved segments after the answer
        #[arg(short, long)]
        sources: bool,
    },

    /// Interactive question loop over one document
    Chat {
        /// Text file to ingest before the first prompt
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct GlobalOpts {
    /// Ollama server address
    #[arg(long, global = true, env = "OLLAMA_HOST", default_value = DEFAULT_BASE_URL)]
    pub ollama_url: String,

    /// Model used for document and question embeddings
    #[arg(long, global = true, env = "DOCRAG_EMBEDDING_MODEL", default_value = DEFAULT_MODEL)]
    pub embedding_model: String,

    /// Model used to generate answers
    #[arg(long, global = true, env = "DOCRAG_CHAT_MODEL", default_value = DEFAULT_MODEL)]
    pub chat_model: String,

    /// Maximum segment length in characters
    #[arg(long, global = true, env = "DOCRAG_CHUNK_SIZE", default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Characters shared between neighbouring segments
    #[arg(
        long,
        global = true,
        env = "DOCRAG_CHUNK_OVERLAP",
        default_value_t = DEFAULT_CHUNK_OVERLAP
    )]
    pub chunk_overlap: usize,

    /// Number of segments handed to the model per question
    #[arg(long, global = true, env = "DOCRAG_TOP_K", default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Seconds to wait for a generated answer
    #[arg(long, global = true, env = "DOCRAG_GENERATION_TIMEOUT", default_value_t = 120)]
    pub generation_timeout: u64,

    /// Log output: pretty or json
    #[arg(long, global = true, env = "DOCRAG_LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl GlobalOpts {
    /// The Ollama address with a scheme; `OLLAMA_HOST` is often a bare `host:port`.
    pub fn ollama_base_url(&self) -> String {
        if self.ollama_url.contains("://") {
            self.ollama_url.clone()
        } else {
            format!("http://{}", self.ollama_url)
        }
    }

    /// Validated pipeline configuration for these flags.
    pub fn rag_config(&self) -> docrag::Result<RagConfig> {
        RagConfig::builder()
            .chunk_size(self.chunk_size)
            .chunk_overlap(self.chunk_overlap)
            .top_k(self.top_k)
            .generation_timeout(Duration::from_secs(self.generation_timeout))
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_build_a_valid_config() {
        let cli = Cli::try_parse_from(["docrag", "chat"]).unwrap();
        let config = cli.global.rag_config().unwrap();
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.chunk_overlap, DEFAULT_CHUNK_OVERLAP);
        assert_eq!(config.generation_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn bare_host_gets_http_scheme() {
        let cli =
            Cli::try_parse_from(["docrag", "chat", "--ollama-url", "127.0.0.1:11434"]).unwrap();
        assert_eq!(cli.global.ollama_base_url(), "http://127.0.0.1:11434");
    }

    #[test]
    fn overlap_not_below_size_is_rejected() {
        let cli = Cli::try_parse_from([
            "docrag",
            "chat",
            "--chunk-size",
            "50",
            "--chunk-overlap",
            "50",
        ])
        .unwrap();
        assert!(matches!(cli.global.rag_config(), Err(docrag::RagError::InvalidConfiguration(_))));
    }
}
