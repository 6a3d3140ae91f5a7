use clap::Parser;
use docrag_cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    docrag_telemetry::init_with_format("docrag", cli.global.log_format)?;
    docrag_cli::run(cli).await
}
