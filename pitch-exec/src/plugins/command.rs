//! External plugins backed by a command line.
//!
//! A manifest is a YAML (or JSON) list of `{name, description, command}` entries.
//! When one runs, the command receives `{"plugin", "phase", "arguments", "context"}`
//! as JSON on stdin; a JSON object printed on stdout is merged into the variables.

use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::context::{ExecutionContext, Phase};
use crate::plugins::{ArgumentSpec, Plugin, PluginDescriptor, PluginError, PluginRegistry};

#[derive(Debug, Clone, PartialEq, serde::Deserialize)]
pub struct CommandPluginSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Program followed by its arguments.
    pub command: Vec<String>,
}

pub fn load_manifest(path: &Path) -> Result<Vec<CommandPluginSpec>, PluginError> {
    let text = std::fs::read_to_string(path)?;
    let specs: Vec<CommandPluginSpec> = serde_yaml::from_str(&text).map_err(|e| {
        PluginError::Other(format!("invalid plugin manifest {}: {e}", path.display()))
    })?;
    for spec in &specs {
        if spec.name.trim().is_empty() || spec.command.is_empty() {
            return Err(PluginError::Other(format!(
                "invalid plugin manifest {}: every entry needs a name and a command",
                path.display()
            )));
        }
    }
    Ok(specs)
}

/// Registers every spec for `phase`, replacing built-ins of the same name.
pub fn register_command_plugins(registry: &mut PluginRegistry, phase: Phase, specs: Vec<CommandPluginSpec>) {
    for spec in specs {
        let spec = Arc::new(spec);
        let descriptor = PluginDescriptor::new(spec.name.clone(), phase, spec.description.clone())
            .argument(ArgumentSpec::required("**arguments"));
        registry.register(descriptor, move |mut args| {
            Ok(Box::new(CommandPlugin {
                spec: Arc::clone(&spec),
                phase,
                arguments: args.take_rest(),
                output: Value::Null,
            }) as Box<dyn Plugin>)
        });
    }
}

pub struct CommandPlugin {
    spec: Arc<CommandPluginSpec>,
    phase: Phase,
    arguments: Map<String, Value>,
    output: Value,
}

#[async_trait]
impl Plugin for CommandPlugin {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<(), PluginError> {
        let payload = json!({
            "plugin": self.spec.name,
            "phase": self.phase,
            "arguments": self.arguments,
            "context": Value::Object(ctx.namespace()),
        });
        let input = serde_json::to_vec(&payload).map_err(|e| PluginError::Other(e.to_string()))?;

        let (program, rest) = self
            .spec
            .command
            .split_first()
            .ok_or_else(|| PluginError::Other(format!("plugin '{}' has no command", self.spec.name)))?;
        debug!(plugin = %self.spec.name, program = %program, "{} spawning plugin command", ctx.instance().prefix());

        let mut child = Command::new(program)
            .args(rest)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input).await?;
        }
        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PluginError::Other(format!(
                "plugin '{}' exited with {}: {}",
                self.spec.name,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            return Ok(());
        }
        match serde_json::from_str::<Value>(stdout) {
            Ok(Value::Object(updates)) => {
                ctx.variables.extend(updates.clone());
                self.output = Value::Object(updates);
                Ok(())
            }
            Ok(_) | Err(_) => Err(PluginError::Other(format!(
                "plugin '{}' must print a JSON object, got: {stdout}",
                self.spec.name
            ))),
        }
    }

    fn result(&self) -> Value {
        self.output.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn manifest_entries_register_for_the_given_phase() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "- name: sign_request\n  description: adds a signature\n  command: [\"./sign.sh\", \"--fast\"]"
        )
        .unwrap();

        let specs = load_manifest(file.path()).unwrap();
        assert_eq!(specs[0].command, vec!["./sign.sh", "--fast"]);

        let mut registry = PluginRegistry::new();
        register_command_plugins(&mut registry, Phase::Request, specs);
        assert!(registry.lookup(Phase::Request, "sign_request").is_some());
        assert!(registry.lookup(Phase::Response, "sign_request").is_none());
    }

    #[test]
    fn manifest_without_command_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "- name: broken\n  command: []").unwrap();
        assert!(load_manifest(file.path()).is_err());
    }
}
