use tracing::{debug, warn};

use crate::codec;
use crate::error::{Result, SsrError};
use crate::node::{self, ResolvedNode, SsrNode};

/// What to do with an entry that fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
  /// Keep the remaining valid nodes, count the bad ones.
  #[default]
  Skip,
  /// Abort the whole load on the first bad entry.
  Strict,
}

/// The decoded node list for one session.
///
/// A store is only ever built wholesale by `load` and swapped in by the
/// caller; there is no incremental mutation, so a reader can never observe a
/// half-built list.
#[derive(Debug, Default)]
pub struct NodeStore {
  nodes: Vec<SsrNode>,
  skipped: usize,
}

impl NodeStore {
  /// Decodes the outer base64 layer of a raw subscription blob and parses
  /// every whitespace-separated entry, in source order.
  pub fn load(raw: &str, policy: LoadPolicy) -> Result<NodeStore> {
    let raw = raw.trim();
    if raw.is_empty() {
      return Err(SsrError::NotInitialized);
    }

    let text = codec::decode_str(raw)?;
    let mut nodes = Vec::new();
    let mut skipped = 0usize;
    for entry in text.split_whitespace() {
      match node::parse_link(entry) {
        Ok(n) => nodes.push(n),
        Err(e) if policy == LoadPolicy::Strict => return Err(e),
        Err(e) => {
          warn!("skipping entry: {e}");
          skipped += 1;
        }
      }
    }

    if nodes.is_empty() && skipped == 0 {
      return Err(SsrError::NotInitialized);
    }
    debug!("loaded {} nodes ({} skipped)", nodes.len(), skipped);
    Ok(NodeStore { nodes, skipped })
  }

  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  /// Entries rejected under `LoadPolicy::Skip`.
  pub fn skipped(&self) -> usize {
    self.skipped
  }

  /// 1-based index plus display remarks for every node, in source order.
  pub fn render(&self) -> Vec<(usize, String)> {
    self
      .nodes
      .iter()
      .enumerate()
      .map(|(i, n)| (i + 1, n.remarks_plain()))
      .collect()
  }

  fn index(&self, input: &str) -> Result<usize> {
    let selection_err = || SsrError::Selection {
      input: input.trim().to_string(),
      len: self.nodes.len(),
    };
    let idx: usize = input.trim().parse().map_err(|_| selection_err())?;
    if idx == 0 || idx > self.nodes.len() {
      return Err(selection_err());
    }
    Ok(idx - 1)
  }

  /// Validates a 1-based index and resolves the node's credential fields.
  pub fn select(&self, input: &str) -> Result<ResolvedNode> {
    self.nodes[self.index(input)?].resolve()
  }

  /// Validates a 1-based index and returns only the address, for the
  /// reachability check (no credential decode).
  pub fn address_of(&self, input: &str) -> Result<String> {
    Ok(self.nodes[self.index(input)?].address.clone())
  }

  /// (1-based index, display remarks, address) rows for batch probing.
  pub fn probe_targets(&self) -> Vec<(usize, String, String)> {
    self
      .nodes
      .iter()
      .enumerate()
      .map(|(i, n)| (i + 1, n.remarks_plain(), n.address.clone()))
      .collect()
  }

  /// Resolves every node, skipping those whose trailing fields fail to
  /// decode. Used by the non-interactive `parse` output.
  pub fn resolve_all(&self) -> (Vec<ResolvedNode>, usize) {
    let mut out = Vec::with_capacity(self.nodes.len());
    let mut failed = 0usize;
    for n in &self.nodes {
      match n.resolve() {
        Ok(r) => out.push(r),
        Err(e) => {
          warn!("skipping node {}: {e}", n.address);
          failed += 1;
        }
      }
    }
    (out, failed)
  }
}
