//! Utilities: logging setup (verbosity flags -> tracing filter), the
//! executable name used in messages and usage text, and the short-lived
//! runtime child processes are awaited on.
//!
//! Key items:
//!   init_logging / derive_level
//!   executable_name
//!   current_thread_runtime

use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Logging helpers.
pub mod logging {
    use super::*;

    #[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
    pub enum LogLevel {
        Error = 0,
        Warn = 1,
        Debug = 2,
        Trace = 3,
    }

    impl LogLevel {
        pub fn as_str(&self) -> &'static str {
            match self {
                LogLevel::Error => "error",
                LogLevel::Warn => "warn",
                LogLevel::Debug => "debug",
                LogLevel::Trace => "trace",
            }
        }
    }

    /// Map `-v` count / `-q` to a level. The default stays at `warn` so the
    /// wrapped command's output is never interleaved with our own.
    pub fn derive_level(verbose: u8, quiet: bool) -> LogLevel {
        if quiet {
            return LogLevel::Error;
        }
        match verbose {
            0 => LogLevel::Warn,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// Install the global subscriber on stderr. `RUST_LOG` wins over flags.
    pub fn init_logging(level: LogLevel) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("pct_auto={}", level.as_str())));

        // A second init (tests) is harmless; ignore the error.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

pub use logging::{derive_level, init_logging};

/// Name this tool was invoked as (`argv[0]` file name), for messages.
pub fn executable_name(argv0: Option<&str>) -> String {
    argv0
        .and_then(|a| Path::new(a).file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "pct-auto".to_string())
}

/// Single-threaded runtime for awaiting child processes one at a time.
pub fn current_thread_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

#[cfg(test)]
mod tests {
    use super::logging::LogLevel;
    use super::*;

    #[test]
    fn quiet_overrides_verbose() {
        assert_eq!(derive_level(3, true), LogLevel::Error);
    }

    #[test]
    fn verbosity_steps() {
        assert_eq!(derive_level(0, false), LogLevel::Warn);
        assert_eq!(derive_level(1, false), LogLevel::Debug);
        assert_eq!(derive_level(2, false), LogLevel::Trace);
    }

    #[test]
    fn executable_name_strips_directories() {
        assert_eq!(executable_name(Some("/usr/local/bin/pct-auto")), "pct-auto");
        assert_eq!(executable_name(Some("pcta")), "pcta");
        assert_eq!(executable_name(None), "pct-auto");
    }
}
