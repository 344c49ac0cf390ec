use clap::Parser;
use tracing_subscriber::EnvFilter;

mod args;
mod cmd;
mod commands;
mod exit_codes;
mod output;

pub use args::*;
use commands::{Command, PluginsCommand};

#[derive(Debug, Parser)]
#[command(name = "pitch", version, about = "HTTP request sequence runner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.command.output().quiet);

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {e}");
            std::process::exit(exit_codes::RUNTIME_ERROR);
        }
    };

    let exit_code = rt.block_on(run_command(cli.command));
    std::process::exit(exit_code);
}

/// `PITCH_LOG`, then `RUST_LOG`, then `info` (`warn` with `--quiet`). Logs go to stderr.
fn init_tracing(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = std::env::var("PITCH_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

async fn run_command(command: Command) -> i32 {
    match command {
        Command::Run {
            path,
            run,
            plugins,
            output,
        } => cmd::run::run_cmd(&path, run, plugins, output).await,
        Command::Validate {
            path,
            plugins,
            output,
        } => cmd::validate::validate_cmd(&path, plugins, output).await,
        Command::Plugins {
            command: PluginsCommand::List {
                phase,
                plugins,
                output,
            },
        } => cmd::plugins::list_cmd(phase.as_deref(), plugins, output).await,
    }
}
