/*!
`preflight.rs`

Startup validation run before anything touches the cluster filesystem:

  - effective uid must be 0 (read from `/proc/self/status`)
  - `<pve_root>` must be an active mount point (read from the mount table)

The parsing halves are pure so they can be exercised without root.
*/

use std::path::Path;

use crate::cmd::error::{DispatchError, Result};
use crate::config::Settings;

/// Outcome of a successful preflight, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preflight {
    pub euid: u32,
    /// Device backing the cluster filesystem (e.g. `/dev/fuse`).
    pub mount_source: String,
}

impl Preflight {
    pub fn check(settings: &Settings, executable: &str) -> Result<Preflight> {
        let status = std::fs::read_to_string("/proc/self/status")
            .map_err(|e| DispatchError::io("/proc/self/status", e))?;
        let euid = parse_effective_uid(&status).ok_or_else(|| {
            DispatchError::Environment("cannot determine effective uid".to_string())
        })?;
        if euid != 0 {
            return Err(DispatchError::Privilege(executable.to_string()));
        }

        let mounts = std::fs::read_to_string(&settings.mounts_file)
            .map_err(|e| DispatchError::io(&settings.mounts_file, e))?;
        let mount_source = mount_source(&mounts, &settings.pve_root).ok_or_else(|| {
            DispatchError::Environment(format!("{} is not mounted", settings.pve_root.display()))
        })?;

        Ok(Preflight {
            euid,
            mount_source: mount_source.to_string(),
        })
    }
}

/// Effective uid from a `/proc/<pid>/status` document.
///
/// The `Uid:` line lists real, effective, saved and filesystem uids.
pub fn parse_effective_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|l| l.strip_prefix("Uid:"))
        .and_then(|rest| rest.split_whitespace().nth(1))
        .and_then(|v| v.parse().ok())
}

/// Source of the entry mounted exactly at `mount_point` in a `/proc/mounts` table.
pub fn mount_source<'a>(mounts: &'a str, mount_point: &Path) -> Option<&'a str> {
    mounts.lines().find_map(|l| {
        let mut fields = l.split_whitespace();
        let source = fields.next()?;
        let target = fields.next()?;
        (Path::new(target) == mount_point).then_some(source)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "Name:\tpct-auto\nUmask:\t0022\nState:\tR (running)\nUid:\t1000\t0\t0\t0\nGid:\t1000\t1000\t1000\t1000\n";

    #[test]
    fn effective_uid_is_second_field() {
        assert_eq!(parse_effective_uid(STATUS), Some(0));
    }

    #[test]
    fn effective_uid_missing_line() {
        assert_eq!(parse_effective_uid("Name:\tx\n"), None);
    }

    #[test]
    fn mount_point_must_match_exactly() {
        let mounts = "proc /proc proc rw 0 0\n/dev/fuse /etc/pve fuse rw,nosuid 0 0\n";
        assert_eq!(mount_source(mounts, Path::new("/etc/pve")), Some("/dev/fuse"));

        let only_sub = "tmpfs /etc/pve-backup tmpfs rw 0 0\n";
        assert_eq!(mount_source(only_sub, Path::new("/etc/pve")), None);
    }

    #[test]
    fn unmounted_root_is_environment_error() {
        let dir = tempfile::tempdir().unwrap();
        let mounts = dir.path().join("mounts");
        std::fs::write(&mounts, "proc /proc proc rw 0 0\n").unwrap();
        let settings = Settings {
            mounts_file: mounts,
            ..Settings::default()
        };
        // Running as root or not, one of the two checks has to fail here.
        let err = Preflight::check(&settings, "pct-auto").unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Environment(_) | DispatchError::Privilege(_)
        ));
    }
}
