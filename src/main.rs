mod codec;
mod error;
mod fetch;
mod launch;
mod menu;
mod node;
mod parse;
mod probe;
mod store;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Interactive node menu: pick an index, or `update` / `ping` / `exit`.
  Menu(menu::Args),

  /// Decode a subscription blob and output one JSON node per line.
  Parse(parse::Args),

  /// Ping every node in the subscription and output JSONL results.
  Probe(probe::Args),
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  match cli.command {
    Commands::Menu(args) => menu::run(args).await,
    Commands::Parse(args) => parse::run(args).await,
    Commands::Probe(args) => probe::run(args).await,
  }
}
