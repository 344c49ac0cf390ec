use std::path::PathBuf;

use clap::Args;

use crate::output::OutputFormat;

#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,
    /// Only print warnings and errors.
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EventsFormat {
    /// Log lines through the tracing subscriber.
    Text,
    /// One JSON object per event on stdout.
    Json,
    None,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Sibling processes to start (falls back to PITCH_PROCESSES, then the document).
    #[arg(long, short = 'P')]
    pub processes: Option<usize>,
    /// Concurrent runs per process (falls back to PITCH_THREADS, then the document).
    #[arg(long)]
    pub threads: Option<usize>,
    /// Total runs per process.
    #[arg(long)]
    pub repeat: Option<usize>,
    /// Default per-request timeout in seconds.
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<f64>,
    #[arg(long, value_enum, default_value_t = EventsFormat::Text)]
    pub events: EventsFormat,
    /// Initial variable, value parsed as a YAML scalar. Repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set_variables: Vec<String>,
    /// Set on child processes started for `--processes`.
    #[arg(long, hide = true)]
    pub process_id: Option<usize>,
}

#[derive(Debug, Args, Clone, Default)]
pub struct PluginManifestArgs {
    /// Manifest of additional request-phase command plugins. Repeatable.
    #[arg(long = "request-plugins", short = 'R', value_name = "MANIFEST")]
    pub request_plugins: Vec<PathBuf>,
    /// Manifest of additional response-phase command plugins. Repeatable.
    #[arg(long = "response-plugins", short = 'S', value_name = "MANIFEST")]
    pub response_plugins: Vec<PathBuf>,
}
