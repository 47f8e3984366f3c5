/*!
Command dispatcher.

Flow for one invocation:

  preflight -> registry -> catalog -> decide -> exec | broadcast

Modules:
  preflight.rs  (privilege + mount checks)
  registry.rs   (container -> node map)
  catalog.rs    (exposed pct commands)
  resolve.rs    (id / hostname -> container id)
  route.rs      (local vs. ssh exec plan, process replacement)
  broadcast.rs  (run on every node, merged table)
  error.rs      (DispatchError)

`Context::decide` is pure apart from reading container configs, so every
routing decision can be tested without spawning anything.
*/

pub mod broadcast;
pub mod catalog;
pub mod error;
pub mod preflight;
pub mod registry;
pub mod resolve;
pub mod route;

use crate::config::Settings;
use broadcast::run_broadcast;
use catalog::{Catalog, Command};
use error::{DispatchError, Result};
use preflight::Preflight;
use registry::Registry;
use route::ExecPlan;

/// What an invocation turns into once validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Replace this process (locally or through ssh).
    Exec(ExecPlan),
    /// Run on every node and print the merged table.
    Broadcast(Command),
}

/// A dispatch error plus the command listing when it helps the user.
#[derive(Debug)]
pub struct Failure {
    pub error: DispatchError,
    pub usage: Option<String>,
}

impl From<DispatchError> for Failure {
    fn from(error: DispatchError) -> Self {
        Failure { error, usage: None }
    }
}

/// Everything known before looking at the user's arguments.
#[derive(Debug, Clone)]
pub struct Context {
    pub executable: String,
    pub settings: Settings,
    pub registry: Registry,
    pub catalog: Catalog,
    pub local_node: String,
}

impl Context {
    pub fn prepare(executable: &str, settings: Settings) -> Result<Context> {
        let preflight = Preflight::check(&settings, executable)?;
        tracing::debug!(
            euid = preflight.euid,
            source = %preflight.mount_source,
            root = %settings.pve_root.display(),
            "preflight passed"
        );
        let registry = Registry::load(&settings)?;
        let catalog = Catalog::discover(&settings)?;
        let local_node = settings.local_node();
        tracing::debug!(node = %local_node, "local node");
        Ok(Context {
            executable: executable.to_string(),
            settings,
            registry,
            catalog,
            local_node,
        })
    }

    /// Validate `args` (`<command> [token] [passthrough...]`) and pick an action.
    pub fn decide(&self, args: &[String]) -> Result<Action> {
        let Some((name, rest)) = args.split_first() else {
            return Err(DispatchError::NoCommand);
        };
        let command = self
            .catalog
            .get(name)
            .ok_or_else(|| DispatchError::UnknownCommand {
                executable: self.executable.clone(),
                command: name.clone(),
            })?;

        if command.is_broadcast() {
            if !rest.is_empty() {
                return Err(DispatchError::ArgumentCount);
            }
            return Ok(Action::Broadcast(command.clone()));
        }

        let Some((token, passthrough)) = rest.split_first() else {
            return Err(DispatchError::MissingTarget(name.clone()));
        };
        let target = resolve::resolve(token, &self.registry, &self.settings)?;
        Ok(Action::Exec(route::plan(
            command,
            &target,
            passthrough,
            &self.local_node,
            &self.settings,
        )))
    }

    pub fn usage(&self) -> String {
        self.catalog.usage(&self.executable)
    }
}

/// Run one invocation. Returns only for broadcasts or on failure.
pub fn execute(
    executable: &str,
    settings: Settings,
    args: &[String],
) -> std::result::Result<(), Failure> {
    let ctx = Context::prepare(executable, settings)?;

    let action = ctx.decide(args).map_err(|error| {
        let usage = error.is_usage().then(|| ctx.usage());
        Failure { error, usage }
    })?;

    match action {
        Action::Exec(plan) => Err(plan.exec().into()),
        Action::Broadcast(command) => {
            let report = run_broadcast(&command, &ctx.registry, &ctx.local_node, &ctx.settings)?;
            print!("{}", report.render());
            Ok(())
        }
    }
}
