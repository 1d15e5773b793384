use anyhow::Result;
use clap::Args as ClapArgs;
use tokio::io::{AsyncReadExt, BufReader};
use tracing::warn;

use crate::store::{LoadPolicy, NodeStore};

#[derive(ClapArgs, Debug, Clone)]
pub struct Args {
  /// Read the raw subscription blob from stdin.
  #[arg(long, default_value_t = false)]
  pub stdin: bool,

  /// Blob provided directly as an argument. Prefer --stdin for large inputs.
  #[arg(long)]
  pub text: Option<String>,

  /// Abort on the first malformed entry instead of skipping it.
  #[arg(long, default_value_t = false)]
  pub strict: bool,
}

pub async fn run(args: Args) -> Result<()> {
  let input = if args.stdin || args.text.is_none() {
    let mut buf = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    stdin.read_to_string(&mut buf).await?;
    buf
  } else {
    args.text.unwrap_or_default()
  };

  let policy = if args.strict {
    LoadPolicy::Strict
  } else {
    LoadPolicy::Skip
  };
  let store = NodeStore::load(&input, policy)?;
  if store.skipped() > 0 {
    warn!("{} malformed entries skipped", store.skipped());
  }

  let (nodes, failed) = store.resolve_all();
  if failed > 0 {
    warn!("{failed} nodes dropped: credential fields were not valid base64");
  }
  for n in nodes {
    if let Ok(line) = serde_json::to_string(&n) {
      println!("{line}");
    }
  }
  Ok(())
}
