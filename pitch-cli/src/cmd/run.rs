use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;

use clap::ValueEnum;
use pitch_exec::executor::{ReqwestTransportFactory, RunReport, SequenceRunner};
use serde::Serialize;
use tracing::{info, warn};

use crate::cmd::config::{build_event_sink, build_runner_config, load_registry, resolve_processes, resolve_threads};
use crate::cmd::validate::{collect_errors, read_sequence};
use crate::exit_codes;
use crate::output::{print_error, print_result, OutputFormat};
use crate::{OutputArgs, PluginManifestArgs, RunArgs};

#[derive(Serialize)]
struct FailedRun {
    thread_id: usize,
    loop_id: usize,
    error: String,
}

#[derive(Serialize)]
struct RunResult {
    process_id: usize,
    runs: usize,
    succeeded: usize,
    failed: usize,
    requests_sent: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failures: Vec<FailedRun>,
}

pub async fn run_cmd(path: &Path, run: RunArgs, plugins: PluginManifestArgs, output: OutputArgs) -> i32 {
    let parsed = match read_sequence(path, &output) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let registry = match load_registry(&plugins) {
        Ok(r) => r,
        Err(e) => {
            print_error(output.format, output.quiet, &e.to_string());
            return exit_codes::VALIDATION_FAILED;
        }
    };
    let errors = collect_errors(&parsed, &registry);
    if !errors.is_empty() {
        print_error(output.format, output.quiet, &errors.join("; "));
        return exit_codes::VALIDATION_FAILED;
    }

    let processes = resolve_processes(&run, &parsed.sequence);
    if processes > 1 && run.process_id.is_none() {
        let threads = resolve_threads(&run, &parsed.sequence);
        return run_processes(path, &run, &plugins, &output, processes, threads).await;
    }

    let config = match build_runner_config(&run, &parsed.sequence) {
        Ok(c) => c,
        Err(message) => {
            print_error(output.format, output.quiet, &message);
            return exit_codes::VALIDATION_FAILED;
        }
    };
    let process_id = config.process_id;
    let transports = Arc::new(ReqwestTransportFactory {
        default_timeout: config.executor.request_timeout,
    });
    let runner = SequenceRunner::new(parsed.sequence, registry, transports, build_event_sink(run.events));

    let cancel = runner.cancellation();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling remaining runs");
            cancel.cancel();
        }
    });
    let result = runner.run(config).await;
    interrupt.abort();

    match result {
        Ok(report) => report_runs(process_id, &report, &output),
        Err(e) => {
            print_error(output.format, output.quiet, &e.to_string());
            if e.is_configuration() {
                exit_codes::VALIDATION_FAILED
            } else {
                exit_codes::RUNTIME_ERROR
            }
        }
    }
}

fn report_runs(process_id: usize, report: &RunReport, output: &OutputArgs) -> i32 {
    let result = RunResult {
        process_id,
        runs: report.runs.len(),
        succeeded: report.succeeded(),
        failed: report.failed(),
        requests_sent: report.requests_sent(),
        failures: report
            .failures()
            .map(|(instance, e)| FailedRun {
                thread_id: instance.thread_id,
                loop_id: instance.loop_id,
                error: e.to_string(),
            })
            .collect(),
    };

    if output.format == OutputFormat::Text {
        if report.is_success() {
            if !output.quiet {
                println!(
                    "ok: {} run(s) succeeded, {} request(s) sent",
                    result.succeeded, result.requests_sent
                );
            }
        } else {
            eprintln!("error: {} of {} run(s) failed", result.failed, result.runs);
            for (instance, e) in report.failures() {
                eprintln!("- {} {e}", instance.prefix());
            }
        }
    } else {
        print_result(output.format, output.quiet, &result);
    }

    if report.is_success() {
        exit_codes::SUCCESS
    } else {
        exit_codes::RUN_FAILED
    }
}

fn value_name<T: ValueEnum>(value: &T) -> String {
    value
        .to_possible_value()
        .map(|v| v.get_name().to_string())
        .unwrap_or_default()
}

/// Arguments for child `process_id`: the parent's settings with the fan-out pinned to one process.
fn child_args(
    path: &Path,
    run: &RunArgs,
    plugins: &PluginManifestArgs,
    output: &OutputArgs,
    process_id: usize,
    threads: usize,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["run".into(), path.as_os_str().to_owned()];
    let mut flag = |name: &str, value: String| {
        args.push(name.into());
        args.push(value.into());
    };
    flag("--processes", "1".to_string());
    flag("--process-id", process_id.to_string());
    flag("--threads", threads.to_string());
    if let Some(repeat) = run.repeat {
        flag("--repeat", repeat.to_string());
    }
    if let Some(timeout) = run.timeout {
        flag("--timeout", timeout.to_string());
    }
    flag("--events", value_name(&run.events));
    flag("--format", value_name(&output.format));
    for pair in &run.set_variables {
        flag("--set", pair.clone());
    }
    for manifest in &plugins.request_plugins {
        flag("--request-plugins", manifest.display().to_string());
    }
    for manifest in &plugins.response_plugins {
        flag("--response-plugins", manifest.display().to_string());
    }
    if output.quiet {
        args.push("--quiet".into());
    }
    args
}

/// Re-executes this binary once per process and waits for all of them.
async fn run_processes(
    path: &Path,
    run: &RunArgs,
    plugins: &PluginManifestArgs,
    output: &OutputArgs,
    processes: usize,
    threads: usize,
) -> i32 {
    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            print_error(output.format, output.quiet, &format!("cannot locate own executable: {e}"));
            return exit_codes::RUNTIME_ERROR;
        }
    };
    info!(processes, "starting {processes} process(es)");

    let commands = (1..=processes)
        .map(|process_id| {
            let mut command = tokio::process::Command::new(&exe);
            command.args(child_args(path, run, plugins, output, process_id, threads));
            (process_id, command)
        })
        .collect();
    run_children(commands, output).await
}

/// Spawns every command and waits for every child that started. A spawn
/// failure counts as a runtime error for that process only; siblings keep
/// running. The worst exit code wins.
async fn run_children(commands: Vec<(usize, tokio::process::Command)>, output: &OutputArgs) -> i32 {
    let mut exit_code = exit_codes::SUCCESS;
    let mut children = Vec::with_capacity(commands.len());
    for (process_id, mut command) in commands {
        match command.kill_on_drop(true).spawn() {
            Ok(child) => children.push((process_id, child)),
            Err(e) => {
                print_error(
                    output.format,
                    output.quiet,
                    &format!("failed to start process {process_id}: {e}"),
                );
                exit_code = merge_exit_code(exit_code, exit_codes::RUNTIME_ERROR);
            }
        }
    }

    for (process_id, mut child) in children {
        let code = match child.wait().await {
            Ok(status) => status.code().unwrap_or(exit_codes::RUNTIME_ERROR),
            Err(e) => {
                warn!(process_id, "failed to wait for process: {e}");
                exit_codes::RUNTIME_ERROR
            }
        };
        if code != exit_codes::SUCCESS {
            warn!(process_id, code, "process exited with failure");
        }
        exit_code = merge_exit_code(exit_code, code);
    }
    exit_code
}

/// The worst of two process exit codes.
fn merge_exit_code(current: i32, next: i32) -> i32 {
    current.max(next)
}
