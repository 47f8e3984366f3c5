/*!
`resolve.rs`

Turns the user's container token into a registry id.

  - all digits  -> literal id, must be in the registry
  - otherwise   -> hostname, looked up in `<pve_root>/nodes/<node>/lxc/<id>.conf`

Hostname scan order is fixed: nodes by name, then config files by
numeric id. The first config whose `hostname` matches wins. Only the
main section of a config counts; `[snapshot]` sections carry historic
values.
*/

use std::cmp::Ordering;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::cmd::error::{DispatchError, Result};
use crate::cmd::registry::Registry;
use crate::config::Settings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub id: String,
    pub owner_node: String,
}

pub fn is_numeric_id(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

pub fn resolve(token: &str, registry: &Registry, settings: &Settings) -> Result<ResolvedTarget> {
    let id = if is_numeric_id(token) {
        token.to_string()
    } else {
        find_by_hostname(token, registry, settings)?
            .ok_or_else(|| DispatchError::UnknownContainer(token.to_string()))?
    };

    let record = registry
        .get(&id)
        .ok_or_else(|| DispatchError::UnknownContainer(token.to_string()))?;
    if !record.is_container() {
        tracing::warn!(
            id = %record.id,
            kind = record.kind.as_deref().unwrap_or("?"),
            "guest is not a container"
        );
    }
    tracing::debug!(token, id = %record.id, node = %record.owner_node, "resolved");
    Ok(ResolvedTarget {
        id: record.id.clone(),
        owner_node: record.owner_node.clone(),
    })
}

/// Scan every node's container configs for `hostname`. Returns the id.
fn find_by_hostname(
    hostname: &str,
    registry: &Registry,
    settings: &Settings,
) -> Result<Option<String>> {
    for node in &registry.nodes {
        for (id, path) in node_configs(node, registry, settings)? {
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "skipping unreadable config"
                    );
                    continue;
                }
            };
            if config_hostname(&content) == Some(hostname) {
                tracing::debug!(hostname, id = %id, node = %node, "hostname match");
                return Ok(Some(id));
            }
        }
    }
    Ok(None)
}

/// Config files of one node whose stem is a known id, in numeric id order.
fn node_configs(
    node: &str,
    registry: &Registry,
    settings: &Settings,
) -> Result<Vec<(String, PathBuf)>> {
    let dir = settings.lxc_dir(node);
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::trace!(dir = %dir.display(), "no container configs");
            return Ok(Vec::new());
        }
        Err(e) => return Err(DispatchError::io(&dir, e)),
    };

    let mut configs = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| DispatchError::io(&dir, e))?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("conf") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        // Unknown guest, left over from a migration.
        if !registry.contains(stem) {
            continue;
        }
        configs.push((stem.to_string(), path.clone()));
    }
    configs.sort_by(|a, b| numeric_order(&a.0, &b.0));
    Ok(configs)
}

fn numeric_order(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Value of the `hostname` property in the main section of a config.
///
/// Accepts both `hostname: web` (what the cluster writes) and `hostname web`.
pub fn config_hostname(content: &str) -> Option<&str> {
    for line in content.lines() {
        let line = line.trim_end();
        if line.starts_with('[') {
            break;
        }
        let mut parts = line.split_whitespace();
        let Some(key) = parts.next() else {
            continue;
        };
        if key.trim_end_matches(':') == "hostname" {
            return parts.next();
        }
    }
    None
}
