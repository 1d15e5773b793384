use anyhow::Result;
use clap::Args as ClapArgs;
use reqwest::Client;
use std::io::Write as _;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::warn;
use url::Url;

use crate::error::SsrError;
use crate::fetch;
use crate::launch;
use crate::probe;
use crate::store::{LoadPolicy, NodeStore};

const RETRY_DELAY_MS: u64 = 2_000;
const PING_COUNT: u32 = 4;

#[derive(ClapArgs, Debug, Clone)]
pub struct Args {
  /// Subscription URL used by the `update` action.
  #[arg(long)]
  pub url: Option<Url>,

  /// Cache file for the raw subscription blob (defaults to the user config dir).
  #[arg(long)]
  pub cache: Option<PathBuf>,

  /// External SSR client executable.
  #[arg(long, default_value = "ssr-local")]
  pub ssr_bin: PathBuf,

  /// Local listen address handed to the client.
  #[arg(long, default_value = "127.0.0.1")]
  pub local_address: String,

  /// Local listen port handed to the client.
  #[arg(long, default_value_t = 1080)]
  pub local_port: u16,

  /// Fetch timeout (ms).
  #[arg(long, default_value_t = 15_000)]
  pub timeout_ms: u64,

  /// Fetch attempts per update.
  #[arg(long, default_value_t = 3)]
  pub attempts: u32,

  /// Abort a load on the first malformed entry instead of skipping it.
  #[arg(long, default_value_t = false)]
  pub strict: bool,
}

struct Session {
  args: Args,
  client: Client,
  cache: PathBuf,
  policy: LoadPolicy,
  /// Last known good raw blob; the store is always rebuilt from this.
  raw: String,
  store: NodeStore,
}

impl Session {
  /// Builds a fresh store from the session blob and swaps it in whole. An
  /// undecodable or empty blob leaves an empty list and a hint, not a crash.
  fn rebuild(&mut self) {
    match NodeStore::load(&self.raw, self.policy) {
      Ok(store) => {
        if store.skipped() > 0 {
          warn!("{} malformed entries skipped", store.skipped());
        }
        self.store = store;
      }
      Err(e @ SsrError::NotInitialized) => {
        self.store = NodeStore::default();
        println!("{e}");
      }
      Err(e) => {
        self.store = NodeStore::default();
        eprintln!("subscription decode failed: {e}");
      }
    }
  }

  /// The `update` action: fetch, persist, rebuild. Any failure keeps the
  /// last known good list.
  async fn refresh(&mut self) {
    let Some(url) = self.args.url.clone() else {
      eprintln!("no --url configured, cannot update");
      return;
    };
    match fetch::fetch_subscription(&self.client, &url, self.args.attempts, RETRY_DELAY_MS).await {
      Ok(body) => {
        if let Err(e) = fetch::write_cache(&self.cache, &body).await {
          warn!("cache write failed: {e}");
        }
        self.raw = body;
        self.rebuild();
        println!("subscription updated: {} nodes", self.store.len());
      }
      Err(e) => eprintln!("update failed, keeping current list: {e}"),
    }
  }

  fn print_list(&self) {
    if self.store.is_empty() {
      println!("(no nodes)");
      return;
    }
    for (index, remarks) in self.store.render() {
      println!("{index:>3}. {remarks}");
    }
  }
}

fn prompt(text: &str) -> Result<()> {
  print!("{text}");
  std::io::stdout().flush()?;
  Ok(())
}

/// Inner loop of the `ping` mode: resolve only the address of the chosen
/// node and hand it to the system reachability check, until exit or EOF.
async fn probing(lines: &mut Lines<BufReader<Stdin>>, session: &Session) -> Result<()> {
  loop {
    prompt("node to ping (exit to stop) >>> ")?;
    let Some(line) = lines.next_line().await? else {
      return Ok(());
    };
    let input = line.trim();
    if input.is_empty() || input == "exit" {
      return Ok(());
    }
    match session.store.address_of(input) {
      Ok(address) => match probe::ping_streamed(&address, PING_COUNT).await {
        Ok(code) => println!("ping exited with code {code}"),
        Err(e) => eprintln!("ping failed: {e}"),
      },
      Err(e) => eprintln!("{e}"),
    }
  }
}

pub async fn run(args: Args) -> Result<()> {
  let cache = args.cache.clone().unwrap_or_else(fetch::default_cache_file);
  let client = fetch::build_client(args.timeout_ms)?;
  let policy = if args.strict {
    LoadPolicy::Strict
  } else {
    LoadPolicy::Skip
  };

  let mut session = Session {
    args,
    client,
    cache,
    policy,
    raw: String::new(),
    store: NodeStore::default(),
  };

  match fetch::read_cache(&session.cache).await {
    Ok(raw) => {
      session.raw = raw;
      session.rebuild();
    }
    Err(SsrError::NotInitialized) => println!("no cached subscription yet, enter `update` to fetch one"),
    Err(e) => return Err(e.into()),
  }

  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  loop {
    session.print_list();
    prompt("index | update | ping | exit >>> ")?;
    // EOF unwinds like an explicit exit.
    let Some(line) = lines.next_line().await? else {
      break;
    };

    match line.trim() {
      "" | "exit" => break,
      "update" => session.refresh().await,
      "ping" => probing(&mut lines, &session).await?,
      input => match session.store.select(input) {
        Ok(node) => {
          let child = launch::spawn(
            &session.args.ssr_bin,
            &node,
            &session.args.local_address,
            session.args.local_port,
          )?;
          println!(
            "launched {} -> {}:{} (pid {:?})",
            node.remarks, node.address, node.port,
            child.id()
          );
          // Selection is terminal for the session; the client keeps running.
          break;
        }
        Err(e @ SsrError::Selection { .. }) => {
          eprintln!("{e}");
          session.rebuild();
        }
        Err(e) => eprintln!("{e}"),
      },
    }
  }

  Ok(())
}
