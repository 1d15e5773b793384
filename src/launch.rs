use std::path::Path;
use tokio::process::{Child, Command};
use tracing::info;

use crate::error::Result;
use crate::node::ResolvedNode;

/// Flags of the ssr-local style client, paired positionally with
/// `ResolvedNode::launch_params`.
const PARAM_FLAGS: [&str; 8] = ["-s", "-p", "-k", "-m", "-o", "-O", "-G", "-g"];

/// Builds the client invocation as an argument list. Node fields never pass
/// through a shell, so delimiter or quote characters in remarks/address
/// cannot change the command.
pub fn build_command(
  bin: &Path,
  node: &ResolvedNode,
  local_address: &str,
  local_port: u16,
) -> Command {
  let mut cmd = Command::new(bin);
  for (flag, value) in PARAM_FLAGS.iter().zip(node.launch_params()) {
    cmd.arg(flag).arg(value);
  }
  cmd
    .arg("-b")
    .arg(local_address)
    .arg("-l")
    .arg(local_port.to_string());
  cmd
}

/// Spawns the client and hands back the child. Lifecycle, output and exit
/// code belong to the external process from here on.
pub fn spawn(
  bin: &Path,
  node: &ResolvedNode,
  local_address: &str,
  local_port: u16,
) -> Result<Child> {
  let child = build_command(bin, node, local_address, local_port).spawn()?;
  info!(
    "launched {} for {}:{} (pid {:?})",
    bin.display(),
    node.address,
    node.port,
    child.id()
  );
  Ok(child)
}
