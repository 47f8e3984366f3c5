/*!
`registry.rs`

Cluster registry: which node owns which guest.

Source is the shared `.vmlist` document:

{
  "version": 12,
  "ids": {
    "101": { "node": "pve1", "type": "lxc", "version": 3 },
    "102": { "node": "pve2", "type": "lxc", "version": 5 }
  }
}

Loaded fresh on every run and never written.
*/

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Deserialize;

use crate::cmd::error::{DispatchError, Result};
use crate::config::Settings;

#[derive(Debug, Deserialize)]
struct VmList {
    ids: HashMap<String, VmEntry>,
}

#[derive(Debug, Deserialize)]
struct VmEntry {
    node: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// One guest and its owning node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    pub id: String,
    pub owner_node: String,
    /// `lxc` / `qemu` when the registry says so.
    pub kind: Option<String>,
}

impl ContainerRecord {
    pub fn is_container(&self) -> bool {
        self.kind.as_deref().is_none_or(|k| k == "lxc")
    }
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    /// All nodes that own at least one guest, in name order.
    pub nodes: BTreeSet<String>,
    pub containers: BTreeMap<String, ContainerRecord>,
}

impl Registry {
    pub fn load(settings: &Settings) -> Result<Registry> {
        let path = settings.vmlist_path();
        let raw = std::fs::read_to_string(&path).map_err(|e| DispatchError::io(&path, e))?;
        let registry = Registry::parse(&raw).map_err(|reason| {
            DispatchError::Environment(format!("malformed {}: {reason}", path.display()))
        })?;
        if registry.nodes.is_empty() {
            return Err(DispatchError::Environment("no nodes present".to_string()));
        }
        tracing::debug!(
            nodes = registry.nodes.len(),
            guests = registry.containers.len(),
            "registry loaded"
        );
        Ok(registry)
    }

    /// Parse a `.vmlist` document. Does not enforce a non-empty node set.
    pub fn parse(raw: &str) -> std::result::Result<Registry, String> {
        let list: VmList = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        let mut registry = Registry::default();
        for (id, entry) in list.ids {
            registry.nodes.insert(entry.node.clone());
            registry.containers.insert(
                id.clone(),
                ContainerRecord {
                    id,
                    owner_node: entry.node,
                    kind: entry.kind,
                },
            );
        }
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Option<&ContainerRecord> {
        self.containers.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.containers.contains_key(id)
    }
}
