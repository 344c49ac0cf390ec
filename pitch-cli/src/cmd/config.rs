use std::sync::Arc;
use std::time::Duration;

use pitch_core::expressions::{parse_scalar, Namespace};
use pitch_core::Sequence;
use pitch_exec::context::Phase;
use pitch_exec::executor::{EventSink, ExecutorConfig, NoOpEventSink, RunnerConfig, StdoutEventSink, TracingEventSink};
use pitch_exec::plugins::command::{load_manifest, register_command_plugins};
use pitch_exec::plugins::{PluginError, PluginRegistry};

use crate::{EventsFormat, PluginManifestArgs, RunArgs};

/// Parses `--set KEY=VALUE` pairs. Values are read as YAML scalars so
/// `--set count=3` yields a number; anything unparsable stays a string.
pub fn parse_set_variables(pairs: &[String]) -> Result<Namespace, String> {
    let mut variables = Namespace::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            return Err(format!("invalid --set '{pair}' (expected KEY=VALUE)"));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("invalid --set '{pair}' (empty key)"));
        }
        let value = parse_scalar(raw).unwrap_or_else(|| serde_json::Value::String(raw.to_string()));
        variables.insert(key.to_string(), value);
    }
    Ok(variables)
}

/// Built-in plugins plus the command plugins from every manifest.
pub fn load_registry(manifests: &PluginManifestArgs) -> Result<PluginRegistry, PluginError> {
    let mut registry = PluginRegistry::with_builtins();
    for (phase, paths) in [
        (Phase::Request, &manifests.request_plugins),
        (Phase::Response, &manifests.response_plugins),
    ] {
        for path in paths {
            let specs = load_manifest(path)?;
            register_command_plugins(&mut registry, phase, specs);
        }
    }
    Ok(registry)
}

fn env_count(name: &str) -> Option<usize> {
    std::env::var(name).ok()?.trim().parse().ok()
}

/// Flag, then environment variable, then the sequence document.
pub fn resolve_processes(run: &RunArgs, sequence: &Sequence) -> usize {
    run.processes
        .or_else(|| env_count("PITCH_PROCESSES"))
        .unwrap_or_else(|| sequence.processes())
        .max(1)
}

pub fn resolve_threads(run: &RunArgs, sequence: &Sequence) -> usize {
    run.threads
        .or_else(|| env_count("PITCH_THREADS"))
        .unwrap_or_else(|| sequence.threads())
        .max(1)
}

pub fn build_executor_config(run: &RunArgs) -> Result<ExecutorConfig, String> {
    let request_timeout = match run.timeout {
        Some(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
        Some(secs) => return Err(format!("invalid --timeout {secs} (expected positive seconds)")),
        None => None,
    };
    Ok(ExecutorConfig {
        request_timeout,
        ..ExecutorConfig::default()
    })
}

pub fn build_runner_config(run: &RunArgs, sequence: &Sequence) -> Result<RunnerConfig, String> {
    Ok(RunnerConfig {
        process_id: run.process_id.unwrap_or(1).max(1),
        threads: resolve_threads(run, sequence),
        repeat: run.repeat.unwrap_or_else(|| sequence.repeat()).max(1),
        variables: parse_set_variables(&run.set_variables)?,
        executor: build_executor_config(run)?,
    })
}

pub fn build_event_sink(format: EventsFormat) -> Arc<dyn EventSink> {
    match format {
        EventsFormat::Text => Arc::new(TracingEventSink),
        EventsFormat::Json => Arc::new(StdoutEventSink),
        EventsFormat::None => Arc::new(NoOpEventSink),
    }
}
