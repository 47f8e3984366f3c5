//! Tool settings.
//!
//! Defaults describe a stock Proxmox VE node. A YAML file (`--config` or
//! `PCT_AUTO_CONFIG`) may override any field:
//!
//! ```yaml
//! pve_root: /etc/pve
//! pct_path: /usr/sbin/pct
//! ssh_path: /usr/bin/ssh
//! remote_user: root
//! broadcast_commands: [list]
//! catalog_file: /etc/pct-auto/catalog.json
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cmd::error::{DispatchError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Mount point of the cluster filesystem.
    pub pve_root: PathBuf,
    /// Mount table consulted by the preflight check.
    pub mounts_file: PathBuf,
    pub pct_path: PathBuf,
    pub ssh_path: PathBuf,
    /// User for remote-shell hops.
    pub remote_user: String,
    /// Interpreter used for command introspection.
    pub perl_path: PathBuf,
    /// Argument-free commands run on every node.
    pub broadcast_commands: Vec<String>,
    /// Static command table; skips live introspection when set.
    pub catalog_file: Option<PathBuf>,
    /// Overrides the system hostname as the local node name.
    pub node_name: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            pve_root: PathBuf::from("/etc/pve"),
            mounts_file: PathBuf::from("/proc/mounts"),
            pct_path: PathBuf::from("/usr/sbin/pct"),
            ssh_path: PathBuf::from("/usr/bin/ssh"),
            remote_user: "root".to_string(),
            perl_path: PathBuf::from("perl"),
            broadcast_commands: vec!["list".to_string()],
            catalog_file: None,
            node_name: None,
        }
    }
}

impl Settings {
    /// Load settings; `None` yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Settings> {
        let Some(path) = path else {
            return Ok(Settings::default());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| DispatchError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Settings::from_yaml(&raw).map_err(|reason| DispatchError::Config {
            path: path.to_path_buf(),
            reason,
        })
    }

    fn from_yaml(raw: &str) -> std::result::Result<Settings, String> {
        // An empty document deserializes to unit, not a map.
        if raw.trim().is_empty() {
            return Ok(Settings::default());
        }
        serde_yaml::from_str(raw).map_err(|e| e.to_string())
    }

    /// Shared registry document (`<pve_root>/.vmlist`).
    pub fn vmlist_path(&self) -> PathBuf {
        self.pve_root.join(".vmlist")
    }

    /// Per-node container configuration directory.
    pub fn lxc_dir(&self, node: &str) -> PathBuf {
        self.pve_root.join("nodes").join(node).join("lxc")
    }

    /// Name of the node we run on.
    pub fn local_node(&self) -> String {
        if let Some(name) = &self.node_name {
            return name.clone();
        }
        hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "localhost".to_string())
    }

    pub fn is_broadcast(&self, name: &str) -> bool {
        self.broadcast_commands.iter().any(|c| c == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_stock_node() {
        let s = Settings::load(None).unwrap();
        assert_eq!(s.vmlist_path(), PathBuf::from("/etc/pve/.vmlist"));
        assert_eq!(s.lxc_dir("pve2"), PathBuf::from("/etc/pve/nodes/pve2/lxc"));
        assert!(s.is_broadcast("list"));
        assert!(!s.is_broadcast("start"));
    }

    #[test]
    fn yaml_overrides_selected_fields() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "pve_root: /tmp/pve\nremote_user: admin\nnode_name: pve9").unwrap();
        let s = Settings::load(Some(f.path())).unwrap();
        assert_eq!(s.pve_root, PathBuf::from("/tmp/pve"));
        assert_eq!(s.remote_user, "admin");
        assert_eq!(s.local_node(), "pve9");
        assert_eq!(s.pct_path, PathBuf::from("/usr/sbin/pct"));
    }

    #[test]
    fn empty_file_is_defaults() {
        let f = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(Settings::load(Some(f.path())).unwrap(), Settings::default());
    }

    #[test]
    fn unknown_key_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "pve_rot: /tmp/pve").unwrap();
        let err = Settings::load(Some(f.path())).unwrap_err();
        assert!(matches!(err, DispatchError::Config { .. }));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = Settings::load(Some(Path::new("/nonexistent/pct-auto.yaml"))).unwrap_err();
        assert!(matches!(err, DispatchError::Config { .. }));
    }
}
