/*!
`catalog.rs`

Discovers which `pct` commands this tool exposes.

Introspection contract (version 1), produced either by the Perl dump
script below or by a static `catalog_file`:

{
  "version": 1,
  "commands": [
    { "name": "start", "args": ["vmid"], "alias": false },
    { "name": "list",  "args": [],       "alias": false },
    { "name": "status-alias", "args": [], "alias": true }
  ]
}

Retention rules:
  - alias entries are dropped
  - commands taking a `vmid` argument are id-scoped
  - commands named in `broadcast_commands` are run on every node
  - everything else is not reachable through this tool
*/

use std::collections::BTreeMap;
use std::process::Stdio;

use serde::Deserialize;

use crate::cmd::error::{DispatchError, Result};
use crate::config::Settings;
use crate::utils::current_thread_runtime;

pub const SCHEMA_VERSION: u32 = 1;

/// Formal argument naming the target container.
pub const ID_ARG: &str = "vmid";

/// Dumps `$PVE::CLI::pct::cmddef` in the version 1 schema. Non-array
/// definitions are aliases or nested groups.
const DUMP_SCRIPT: &str = r#"
use strict;
use warnings;
use JSON::PP;
use PVE::CLI::pct;

my @commands;
while (my ($name, $def) = each %$PVE::CLI::pct::cmddef) {
    if (ref($def) ne 'ARRAY') {
        push @commands, { name => $name, args => [], alias => JSON::PP::true };
        next;
    }
    push @commands, { name => $name, args => [ @{ $def->[2] // [] } ], alias => JSON::PP::false };
}

print JSON::PP->new->canonical->encode({ version => 1, commands => \@commands });
"#;

#[derive(Debug, Deserialize)]
struct Introspection {
    version: u32,
    commands: Vec<IntrospectedCommand>,
}

#[derive(Debug, Deserialize)]
struct IntrospectedCommand {
    name: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    alias: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    IdScoped,
    Broadcast,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub name: String,
    pub formal_args: Vec<String>,
    pub classification: Classification,
}

impl Command {
    pub fn is_broadcast(&self) -> bool {
        self.classification == Classification::Broadcast
    }
}

/// Commands keyed (and therefore listed) by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    commands: BTreeMap<String, Command>,
}

impl Catalog {
    /// Build the catalog from the configured source.
    pub fn discover(settings: &Settings) -> Result<Catalog> {
        let raw = match &settings.catalog_file {
            Some(path) => {
                tracing::debug!(path = %path.display(), "using static command table");
                std::fs::read_to_string(path).map_err(|e| {
                    DispatchError::Catalog(format!("cannot read {}: {e}", path.display()))
                })?
            }
            None => introspect(settings)?,
        };
        let catalog = Catalog::parse(&raw, settings)?;
        tracing::debug!(commands = catalog.len(), "command catalog ready");
        Ok(catalog)
    }

    /// Classify introspection output. Pure; same input, same catalog.
    pub fn parse(raw: &str, settings: &Settings) -> Result<Catalog> {
        let doc: Introspection = serde_json::from_str(raw)
            .map_err(|e| DispatchError::Catalog(format!("unparsable introspection output: {e}")))?;
        if doc.version != SCHEMA_VERSION {
            return Err(DispatchError::Catalog(format!(
                "unsupported introspection schema version {} (expected {SCHEMA_VERSION})",
                doc.version
            )));
        }

        let mut commands = BTreeMap::new();
        for c in doc.commands.into_iter().filter(|c| !c.alias) {
            let classification = if c.args.iter().any(|a| a == ID_ARG) {
                Classification::IdScoped
            } else if settings.is_broadcast(&c.name) {
                Classification::Broadcast
            } else {
                tracing::trace!(command = %c.name, "not exposed");
                continue;
            };
            commands.insert(
                c.name.clone(),
                Command {
                    name: c.name,
                    formal_args: c.args,
                    classification,
                },
            );
        }
        Ok(Catalog { commands })
    }

    pub fn get(&self, name: &str) -> Option<&Command> {
        self.commands.get(name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.values()
    }

    /// Usage text listing every exposed command with its placeholders.
    pub fn usage(&self, executable: &str) -> String {
        let mut out = format!("Usage: {executable} <COMMAND> [ARGS] [OPTIONS]\n\n");
        for cmd in self.iter() {
            out.push_str(&format!("    {executable} {}", cmd.name));
            for arg in &cmd.formal_args {
                out.push_str(&format!(" <{arg}>"));
            }
            out.push('\n');
        }
        out
    }
}

/// Run the dump script through perl and return its stdout.
fn introspect(settings: &Settings) -> Result<String> {
    let perl = settings.perl_path.display().to_string();
    let rt = current_thread_runtime()
        .map_err(|e| DispatchError::Catalog(format!("failed to create runtime: {e}")))?;
    let _guard = rt.enter();

    let output = rt
        .block_on(
            tokio::process::Command::new(&settings.perl_path)
                .arg("-e")
                .arg(DUMP_SCRIPT)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::inherit())
                .output(),
        )
        .map_err(|e| DispatchError::Catalog(format!("failed to run {perl}: {e}")))?;
    if !output.status.success() {
        return Err(DispatchError::Catalog(format!(
            "introspection exited with {}",
            output.status
        )));
    }
    String::from_utf8(output.stdout)
        .map_err(|e| DispatchError::Catalog(format!("introspection output is not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": 1,
        "commands": [
            {"name": "start", "args": ["vmid"], "alias": false},
            {"name": "enter", "args": ["vmid"], "alias": false},
            {"name": "set", "args": ["vmid"]},
            {"name": "list", "args": [], "alias": false},
            {"name": "create", "args": ["vmid", "ostemplate"], "alias": false},
            {"name": "cpusets", "args": [], "alias": false},
            {"name": "destroy-alias", "args": ["vmid"], "alias": true}
        ]
    }"#;

    fn settings() -> Settings {
        Settings::default()
    }

    #[test]
    fn classifies_and_filters() {
        let cat = Catalog::parse(SAMPLE, &settings()).unwrap();
        assert_eq!(
            cat.get("start").unwrap().classification,
            Classification::IdScoped
        );
        assert!(cat.get("list").unwrap().is_broadcast());
        assert!(cat.get("cpusets").is_none(), "no vmid, not broadcast");
        assert!(cat.get("destroy-alias").is_none(), "aliases dropped");
        assert_eq!(cat.len(), 5);
    }

    #[test]
    fn classification_is_idempotent() {
        let a = Catalog::parse(SAMPLE, &settings()).unwrap();
        let b = Catalog::parse(SAMPLE, &settings()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn usage_is_sorted_with_placeholders() {
        let cat = Catalog::parse(SAMPLE, &settings()).unwrap();
        let usage = cat.usage("pct-auto");
        let lines: Vec<&str> = usage.lines().collect();
        assert_eq!(lines[0], "Usage: pct-auto <COMMAND> [ARGS] [OPTIONS]");
        assert_eq!(lines[2], "    pct-auto create <vmid> <ostemplate>");
        assert_eq!(lines[3], "    pct-auto enter <vmid>");
        assert_eq!(lines[4], "    pct-auto list");
    }

    #[test]
    fn wrong_schema_version_rejected() {
        let err = Catalog::parse(r#"{"version": 2, "commands": []}"#, &settings()).unwrap_err();
        assert!(matches!(err, DispatchError::Catalog(_)));
    }

    #[test]
    fn garbage_output_rejected() {
        let err = Catalog::parse("start=vmid\nlist=\n", &settings()).unwrap_err();
        assert!(err.to_string().contains("unparsable"));
    }

    #[test]
    fn discover_reads_static_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, SAMPLE).unwrap();
        let settings = Settings {
            catalog_file: Some(path),
            ..Settings::default()
        };
        let cat = Catalog::discover(&settings).unwrap();
        assert!(cat.get("enter").is_some());
    }

    #[test]
    fn discover_fails_when_interpreter_missing() {
        let settings = Settings {
            perl_path: "/nonexistent/perl".into(),
            ..Settings::default()
        };
        assert!(matches!(
            Catalog::discover(&settings),
            Err(DispatchError::Catalog(_))
        ));
    }

    #[test]
    fn broadcast_list_follows_settings() {
        let settings = Settings {
            broadcast_commands: vec!["cpusets".to_string()],
            ..Settings::default()
        };
        let cat = Catalog::parse(SAMPLE, &settings).unwrap();
        assert!(cat.get("cpusets").unwrap().is_broadcast());
        assert!(cat.get("list").is_none());
    }

    #[test]
    fn discover_fails_when_introspection_exits_non_zero() {
        let settings = Settings {
            perl_path: "/bin/false".into(),
            ..Settings::default()
        };
        let err = Catalog::discover(&settings).unwrap_err();
        assert!(err.to_string().contains("introspection exited"));
    }
}
