//! Dispatcher error type.
//!
//! Every variant is terminal: the process reports it once and exits 1.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Not running with the privilege needed to read the cluster filesystem.
    #[error("{0} requires root access")]
    Privilege(String),

    /// Cluster filesystem missing or unusable (not mounted, bad registry, no nodes).
    #[error("{0}")]
    Environment(String),

    /// Settings file could not be read or parsed.
    #[error("invalid configuration '{path}': {reason}")]
    Config { path: PathBuf, reason: String },

    /// Command introspection failed or produced output we cannot use.
    #[error("command catalog unavailable: {0}")]
    Catalog(String),

    #[error("no command specified")]
    NoCommand,

    #[error("unknown command '{executable} {command}'")]
    UnknownCommand { executable: String, command: String },

    #[error("too many arguments")]
    ArgumentCount,

    #[error("missing container id or hostname for '{0}'")]
    MissingTarget(String),

    #[error("unknown vm name: '{0}'")]
    UnknownContainer(String),

    /// The replacement program could not be executed.
    #[error("failed to execute '{program}': {source}")]
    Execution {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DispatchError {
    /// Errors that are followed by the command listing.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            DispatchError::NoCommand
                | DispatchError::UnknownCommand { .. }
                | DispatchError::MissingTarget(_)
        )
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DispatchError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_command_message() {
        let err = DispatchError::UnknownCommand {
            executable: "pct-auto".into(),
            command: "frobnicate".into(),
        };
        assert_eq!(err.to_string(), "unknown command 'pct-auto frobnicate'");
        assert!(err.is_usage());
    }

    #[test]
    fn unknown_container_is_not_usage() {
        let err = DispatchError::UnknownContainer("web".into());
        assert_eq!(err.to_string(), "unknown vm name: 'web'");
        assert!(!err.is_usage());
    }

    #[test]
    fn io_error_keeps_source() {
        use std::error::Error;
        let err = DispatchError::io(
            "/etc/pve/.vmlist",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.source().is_some());
        assert!(err.to_string().contains("/etc/pve/.vmlist"));
    }
}
