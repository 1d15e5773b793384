use anyhow::{Context, Result};
use clap::Args as ClapArgs;
use serde::Serialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::warn;

use crate::fetch;
use crate::store::{LoadPolicy, NodeStore};

#[derive(ClapArgs, Debug, Clone)]
pub struct Args {
  /// Read the raw subscription blob from stdin instead of the cache file.
  #[arg(long, default_value_t = false)]
  pub stdin: bool,

  /// Cache file holding the raw subscription blob.
  #[arg(long)]
  pub cache: Option<PathBuf>,

  /// Echo requests per node.
  #[arg(long, default_value_t = 1)]
  pub count: u32,

  /// Per-node timeout (ms).
  #[arg(long, default_value_t = 5_000)]
  pub timeout_ms: u64,

  /// Max concurrent probes.
  #[arg(long, default_value_t = 8)]
  pub concurrency: usize,
}

#[derive(Serialize)]
struct ProbeOut {
  index: usize,
  remarks: String,
  address: String,
  ok: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  code: Option<i32>,
  ms: u64,
  #[serde(skip_serializing_if = "Option::is_none")]
  error: Option<String>,
}

fn ping_args(address: &str, count: u32) -> Vec<String> {
  #[cfg(windows)]
  let count_flag = "-n";
  #[cfg(not(windows))]
  let count_flag = "-c";
  vec![count_flag.to_string(), count.to_string(), address.to_string()]
}

/// Runs the system ping with the node's address, inheriting stdio so the
/// replies are visible. Used by the interactive `ping` mode; the exit code is
/// the reachability verdict.
pub async fn ping_streamed(address: &str, count: u32) -> crate::error::Result<i32> {
  let mut cmd = Command::new("ping");
  cmd.args(ping_args(address, count));
  let status = cmd.status().await?;
  Ok(status.code().unwrap_or(-1))
}

/// Quiet, timed variant for batch probing.
async fn ping_quiet(address: &str, count: u32, timeout_ms: u64) -> (bool, Option<i32>, u64, Option<String>) {
  let t0 = Instant::now();
  let mut cmd = Command::new("ping");
  cmd
    .args(ping_args(address, count))
    .stdout(Stdio::null())
    .stderr(Stdio::null());

  let outcome = tokio::time::timeout(Duration::from_millis(timeout_ms.max(1)), cmd.status()).await;
  let ms = t0.elapsed().as_millis() as u64;
  match outcome {
    Ok(Ok(status)) => (status.success(), status.code(), ms, None),
    Ok(Err(e)) => (false, None, ms, Some(e.to_string())),
    Err(_) => (false, None, ms, Some("timeout".to_string())),
  }
}

pub async fn run(args: Args) -> Result<()> {
  let raw = if args.stdin {
    let mut buf = String::new();
    let mut stdin = BufReader::new(tokio::io::stdin());
    stdin.read_to_string(&mut buf).await?;
    buf
  } else {
    let path = args.cache.clone().unwrap_or_else(fetch::default_cache_file);
    fetch::read_cache(&path)
      .await
      .with_context(|| format!("read cache {}", path.display()))?
  };

  let store = NodeStore::load(&raw, LoadPolicy::Skip)?;
  if store.skipped() > 0 {
    warn!("{} malformed entries skipped", store.skipped());
  }

  let sem = Arc::new(Semaphore::new(args.concurrency.max(1)));
  let mut handles = Vec::with_capacity(store.len());

  for (index, remarks, address) in store.probe_targets() {
    let sem = sem.clone();
    let count = args.count.max(1);
    let timeout_ms = args.timeout_ms;
    handles.push(tokio::spawn(async move {
      let _permit = sem.acquire_owned().await.expect("semaphore closed");
      let (ok, code, ms, error) = ping_quiet(&address, count, timeout_ms).await;
      ProbeOut {
        index,
        remarks,
        address,
        ok,
        code,
        ms,
        error,
      }
    }));
  }

  for h in handles {
    if let Ok(out) = h.await {
      if let Ok(line) = serde_json::to_string(&out) {
        println!("{line}");
      }
    }
  }

  Ok(())
}
