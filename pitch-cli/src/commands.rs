use std::path::PathBuf;

use clap::Subcommand;

use crate::args::*;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Execute a sequence.
    Run {
        path: PathBuf,
        #[command(flatten)]
        run: RunArgs,
        #[command(flatten)]
        plugins: PluginManifestArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Parse and validate a sequence without sending anything.
    Validate {
        path: PathBuf,
        #[command(flatten)]
        plugins: PluginManifestArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Inspect the plugin registry.
    Plugins {
        #[command(subcommand)]
        command: PluginsCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum PluginsCommand {
    /// List every registered plugin with its arguments.
    List {
        /// Only show `request` or `response` plugins.
        #[arg(long)]
        phase: Option<String>,
        #[command(flatten)]
        plugins: PluginManifestArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
}

impl Command {
    pub fn output(&self) -> &OutputArgs {
        match self {
            Command::Run { output, .. } | Command::Validate { output, .. } => output,
            Command::Plugins {
                command: PluginsCommand::List { output, .. },
            } => output,
        }
    }
}
