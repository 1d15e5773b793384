use thiserror::Error;

/// Domain errors for the subscription pipeline.
///
/// Parse-level errors (`Decode`, `MalformedRecord`) are recoverable per entry;
/// `NotInitialized` and `Selection` are surfaced to the interactive loop and
/// answered with a prompt, never a process exit.
#[derive(Error, Debug)]
pub enum SsrError {
  #[error("invalid base64: {0}")]
  Decode(String),

  #[error("malformed record: {0}")]
  MalformedRecord(String),

  #[error("no subscription data available, run `update` (or pass --url) first")]
  NotInitialized,

  #[error("invalid selection {input:?}: expected an index in 1..={len}")]
  Selection { input: String, len: usize },

  #[error("subscription fetch failed: {0}")]
  Fetch(#[from] reqwest::Error),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SsrError>;
