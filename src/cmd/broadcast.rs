/*!
`broadcast.rs`

Runs an argument-free command (e.g. `list`) on every node and merges the
output into one table with a leading node column:

  Node        VMID       Status     Lock         Name
  pve1        101        running                 db
  pve2        102        running                 webserver

  - local node first, then the others by name
  - nodes are contacted one at a time
  - the header comes from the local node's first line
  - every node's first line is dropped, its other lines get the node prefix
  - a node that cannot be reached (spawn failure / non-zero exit) keeps
    whatever rows it printed and gets an `UNREACHABLE (...)` row after them
*/

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use crate::cmd::catalog::Command;
use crate::cmd::error::{DispatchError, Result};
use crate::cmd::registry::Registry;
use crate::cmd::route::{PCT, ssh_argv};
use crate::config::Settings;
use crate::utils::current_thread_runtime;

/// Narrowest node column, before the gap.
pub const MIN_NODE_WIDTH: usize = 9;
/// Gap between node column and command output.
pub const NODE_GAP: usize = 3;

const HEADER_LABEL: &str = "Node";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    Output(String),
    /// `output` is whatever stdout was captured before the failure.
    Unreachable { output: String, reason: String },
}

impl NodeOutcome {
    fn output(&self) -> &str {
        match self {
            NodeOutcome::Output(output) | NodeOutcome::Unreachable { output, .. } => output,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    pub node: String,
    pub outcome: NodeOutcome,
}

/// Per-node results in contact order (local node first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub width: usize,
    pub rows: Vec<NodeReport>,
}

impl Report {
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (idx, row) in self.rows.iter().enumerate() {
            let prefix = pad(&row.node, self.width);
            let text = row.outcome.output();
            if idx == 0 {
                let header = text.split('\n').next().unwrap_or("");
                out.push_str(&format!("{}{header}\n", pad(HEADER_LABEL, self.width)));
            }
            for line in text.trim_end().split('\n').skip(1) {
                out.push_str(&format!("{prefix}{line}\n"));
            }
            if let NodeOutcome::Unreachable { reason, .. } = &row.outcome {
                out.push_str(&format!("{prefix}UNREACHABLE ({reason})\n"));
            }
        }
        out
    }
}

fn pad(s: &str, width: usize) -> String {
    format!("{s:<width$}")
}

/// `max(9, longest node name) + 3`.
pub fn column_width<'a>(nodes: impl IntoIterator<Item = &'a str>) -> usize {
    nodes
        .into_iter()
        .map(str::len)
        .fold(MIN_NODE_WIDTH, usize::max)
        + NODE_GAP
}

/// Local node first, then every other node by name.
pub fn node_order(nodes: &BTreeSet<String>, local_node: &str) -> Vec<String> {
    std::iter::once(local_node.to_string())
        .chain(nodes.iter().filter(|n| *n != local_node).cloned())
        .collect()
}

/// Run `command` on every node, sequentially, capturing stdout.
pub fn run_broadcast(
    command: &Command,
    registry: &Registry,
    local_node: &str,
    settings: &Settings,
) -> Result<Report> {
    let order = node_order(&registry.nodes, local_node);
    let width = column_width(order.iter().map(String::as_str));

    let rt = current_thread_runtime().map_err(|e| DispatchError::Environment(format!("failed to create runtime: {e}")))?;

    let rows = rt.block_on(async {
        let mut rows = Vec::with_capacity(order.len());
        for node in &order {
            let (program, argv) = invocation(&command.name, node, local_node, settings);
            let outcome = capture(&program, &argv).await;
            if let NodeOutcome::Unreachable { reason, .. } = &outcome {
                tracing::warn!(node = %node, reason = %reason, "node unreachable");
            }
            rows.push(NodeReport {
                node: node.clone(),
                outcome,
            });
        }
        rows
    });

    Ok(Report { width, rows })
}

fn invocation(
    command: &str,
    node: &str,
    local_node: &str,
    settings: &Settings,
) -> (PathBuf, Vec<String>) {
    let pct_argv = vec![PCT.to_string(), command.to_string()];
    if node == local_node {
        (settings.pct_path.clone(), pct_argv)
    } else {
        (
            settings.ssh_path.clone(),
            ssh_argv(settings, node, &pct_argv, false),
        )
    }
}

async fn capture(program: &Path, argv: &[String]) -> NodeOutcome {
    tracing::debug!(program = %program.display(), argv = ?argv, "broadcast");
    let result = tokio::process::Command::new(program)
        .args(argv.iter().skip(1))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .output()
        .await;

    match result {
        Ok(output) if output.status.success() => {
            NodeOutcome::Output(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => NodeOutcome::Unreachable {
            output: String::from_utf8_lossy(&output.stdout).into_owned(),
            reason: match output.status.code() {
                Some(code) => format!("exit code {code}"),
                None => "terminated by signal".to_string(),
            },
        },
        Err(e) => NodeOutcome::Unreachable {
            output: String::new(),
            reason: e.to_string(),
        },
    }
}
