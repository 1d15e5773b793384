use reqwest::Client;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Result, SsrError};

const DEFAULT_UA: &str =
  "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub fn build_client(timeout_ms: u64) -> Result<Client> {
  let client = Client::builder()
    .user_agent(DEFAULT_UA)
    .redirect(reqwest::redirect::Policy::limited(10))
    .timeout(Duration::from_millis(timeout_ms.max(1)))
    .build()?;
  Ok(client)
}

fn rand_jitter_ms(max_jitter: u64) -> u64 {
  if max_jitter == 0 {
    0
  } else {
    fastrand::u64(0..max_jitter)
  }
}

/// GETs the subscription body, retrying up to `attempts` times with a
/// jittered pause between tries. Whether the body decodes to anything is the
/// store's business, not the fetcher's.
pub async fn fetch_subscription(
  client: &Client,
  url: &Url,
  attempts: u32,
  retry_delay_ms: u64,
) -> Result<String> {
  let attempts = attempts.max(1);
  let mut last: Option<SsrError> = None;

  for attempt in 1..=attempts {
    if attempt > 1 {
      let wait = retry_delay_ms.saturating_add(rand_jitter_ms(retry_delay_ms / 2 + 1));
      debug!("retrying in {wait} ms (attempt {attempt}/{attempts})");
      sleep(Duration::from_millis(wait)).await;
    }

    match client.get(url.clone()).send().await.and_then(|r| r.error_for_status()) {
      Ok(resp) => match resp.text().await {
        Ok(body) => {
          debug!("fetched {} bytes from {url}", body.len());
          return Ok(body);
        }
        Err(e) => {
          warn!("reading subscription body failed: {e}");
          last = Some(e.into());
        }
      },
      Err(e) => {
        warn!("fetch attempt {attempt}/{attempts} failed: {e}");
        last = Some(e.into());
      }
    }
  }

  Err(last.unwrap_or(SsrError::NotInitialized))
}

/// Reads the cached raw blob. A missing cache file is the ordinary
/// first-run state, reported as `NotInitialized` rather than an io error.
pub async fn read_cache(path: &Path) -> Result<String> {
  match tokio::fs::read_to_string(path).await {
    Ok(text) => Ok(text),
    Err(e) if e.kind() == ErrorKind::NotFound => Err(SsrError::NotInitialized),
    Err(e) => Err(e.into()),
  }
}

/// Writes the raw blob, creating parent directories first.
pub async fn write_cache(path: &Path, text: &str) -> Result<()> {
  if let Some(parent) = path.parent() {
    tokio::fs::create_dir_all(parent).await?;
  }
  tokio::fs::write(path, text).await?;
  Ok(())
}

pub fn default_cache_file() -> PathBuf {
  directories::ProjectDirs::from("", "", "ssrsub")
    .map(|dirs| dirs.config_dir().join("subscription.txt"))
    .unwrap_or_else(|| PathBuf::from("ssrsub-subscription.txt"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn cache_roundtrip_creates_parent_dirs() {
    let dir = std::env::temp_dir().join(format!("ssrsub-cache-test-{}", std::process::id()));
    let path = dir.join("nested").join("subscription.txt");
    write_cache(&path, "blob").await.unwrap();
    assert_eq!(read_cache(&path).await.unwrap(), "blob");
    let _ = tokio::fs::remove_dir_all(&dir).await;
  }

  #[tokio::test]
  async fn missing_cache_is_not_initialized() {
    let path = std::env::temp_dir().join(format!("ssrsub-no-such-{}", std::process::id()));
    assert!(matches!(read_cache(&path).await, Err(SsrError::NotInitialized)));
  }

  #[test]
  fn jitter_respects_bounds() {
    assert_eq!(rand_jitter_ms(0), 0);
    for _ in 0..32 {
      assert!(rand_jitter_ms(10) < 10);
    }
  }
}
