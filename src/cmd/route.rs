/*!
`route.rs`

Local vs. remote execution of an id-scoped command.

`plan` is pure: it only decides. `ExecPlan::exec` is the single place
that replaces the process image, so the wrapped command's streams and
exit code become ours.
*/

use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::Command as Process;

use crate::cmd::catalog::Command;
use crate::cmd::error::DispatchError;
use crate::cmd::resolve::ResolvedTarget;
use crate::config::Settings;

/// argv[0] of the wrapped tool.
pub const PCT: &str = "pct";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecPlan {
    Local {
        program: PathBuf,
        argv: Vec<String>,
    },
    Remote {
        node: String,
        program: PathBuf,
        argv: Vec<String>,
    },
}

impl ExecPlan {
    pub fn program(&self) -> &PathBuf {
        match self {
            ExecPlan::Local { program, .. } | ExecPlan::Remote { program, .. } => program,
        }
    }

    pub fn argv(&self) -> &[String] {
        match self {
            ExecPlan::Local { argv, .. } | ExecPlan::Remote { argv, .. } => argv,
        }
    }

    /// Replace the current process. Only returns on failure.
    pub fn exec(self) -> DispatchError {
        let program = self.program().clone();
        let argv = self.argv();
        tracing::debug!(program = %program.display(), argv = ?argv, "exec");

        let mut process = Process::new(&program);
        if let Some((arg0, rest)) = argv.split_first() {
            process.arg0(arg0).args(rest);
        }
        let source = process.exec();
        DispatchError::Execution {
            program: program.display().to_string(),
            source,
        }
    }
}

/// Decide where `command` runs for `target`.
pub fn plan(
    command: &Command,
    target: &ResolvedTarget,
    passthrough: &[String],
    local_node: &str,
    settings: &Settings,
) -> ExecPlan {
    let mut pct_argv = vec![PCT.to_string(), command.name.clone(), target.id.clone()];
    pct_argv.extend(passthrough.iter().cloned());

    if target.owner_node == local_node {
        return ExecPlan::Local {
            program: settings.pct_path.clone(),
            argv: pct_argv,
        };
    }

    ExecPlan::Remote {
        node: target.owner_node.clone(),
        program: settings.ssh_path.clone(),
        argv: ssh_argv(settings, &target.owner_node, &pct_argv, true),
    }
}

/// `ssh [-t] -o LogLevel=QUIET <user>@<node> <quoted command...>`.
///
/// The remote side re-splits the command through a shell, so each word is
/// quoted. Plain words pass through unchanged.
pub fn ssh_argv(settings: &Settings, node: &str, remote: &[String], tty: bool) -> Vec<String> {
    let mut argv = vec!["ssh".to_string()];
    if tty {
        argv.push("-t".to_string());
    }
    argv.extend(["-o".to_string(), "LogLevel=QUIET".to_string()]);
    argv.push(format!("{}@{node}", settings.remote_user));
    argv.extend(remote.iter().map(|w| shell_words::quote(w).into_owned()));
    argv
}
