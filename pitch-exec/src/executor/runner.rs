//! Fans a sequence out into independent runs inside one process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use pitch_core::expressions::{Namespace, Renderer};
use pitch_core::Sequence;
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::{ExecutionContext, InstanceInfo};
use crate::executor::analysis::analyze_plugins;
use crate::executor::concurrency::ConcurrencyLimit;
use crate::executor::driver::{ExecutorDeps, SequenceExecutor};
use crate::executor::events::EventSink;
use crate::executor::http::TransportFactory;
use crate::executor::{ExecutionError, ExecutorConfig, RunSummary};
use crate::plugins::PluginRegistry;

/// Set once (e.g. on Ctrl-C); runs check it before starting and between steps.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub process_id: usize,
    /// Runs in flight at once.
    pub threads: usize,
    /// Total runs in this process.
    pub repeat: usize,
    /// Initial variables that take precedence over the sequence's own.
    pub variables: Namespace,
    pub executor: ExecutorConfig,
}

impl RunnerConfig {
    /// Concurrency settings taken from the sequence document.
    pub fn for_sequence(sequence: &Sequence) -> Self {
        Self {
            process_id: 1,
            threads: sequence.threads(),
            repeat: sequence.repeat(),
            variables: Namespace::new(),
            executor: ExecutorConfig::default(),
        }
    }
}

#[derive(Debug)]
pub struct RunOutcome {
    pub run_id: Option<Uuid>,
    pub instance: InstanceInfo,
    pub result: Result<RunSummary, ExecutionError>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub runs: Vec<RunOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.runs.iter().filter(|r| r.succeeded()).count()
    }

    pub fn failed(&self) -> usize {
        self.runs.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = (&InstanceInfo, &ExecutionError)> {
        self.runs
            .iter()
            .filter_map(|r| r.result.as_ref().err().map(|e| (&r.instance, e)))
    }

    pub fn requests_sent(&self) -> usize {
        self.runs
            .iter()
            .filter_map(|r| r.result.as_ref().ok())
            .map(|s| s.requests_sent)
            .sum()
    }
}

pub struct SequenceRunner {
    sequence: Arc<Sequence>,
    registry: Arc<PluginRegistry>,
    transports: Arc<dyn TransportFactory>,
    events: Arc<dyn EventSink>,
    renderer: Renderer,
    cancel: CancellationFlag,
}

impl SequenceRunner {
    pub fn new(
        sequence: Sequence,
        registry: PluginRegistry,
        transports: Arc<dyn TransportFactory>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            sequence: Arc::new(sequence),
            registry: Arc::new(registry),
            transports,
            events,
            renderer: Renderer::default(),
            cancel: CancellationFlag::new(),
        }
    }

    /// Renders templates with a custom filter/test environment.
    pub fn with_renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Runs `config.repeat` independent runs, at most `config.threads` at a time,
    /// and waits for all of them. Only plugin analysis fails the call itself; a
    /// failing run is reported in the [`RunReport`] without stopping its siblings.
    pub async fn run(&self, config: RunnerConfig) -> Result<RunReport, ExecutionError> {
        analyze_plugins(&self.sequence, &self.registry)?;

        let threads = config.threads.max(1);
        let limit = ConcurrencyLimit::new(threads);
        let deps = ExecutorDeps {
            registry: Arc::clone(&self.registry),
            events: Arc::clone(&self.events),
            config: config.executor.clone(),
            cancel: self.cancel.clone(),
        };
        info!(
            process = config.process_id,
            threads,
            repeat = config.repeat,
            "starting {} run(s)",
            config.repeat
        );

        let mut handles = Vec::with_capacity(config.repeat);
        for loop_index in 0..config.repeat {
            let instance = InstanceInfo::new(config.process_id, loop_index, threads);
            let limit = limit.clone();
            let sequence = Arc::clone(&self.sequence);
            let deps = deps.clone();
            let transports = Arc::clone(&self.transports);
            let renderer = self.renderer.clone();
            let variables = config.variables.clone();

            let handle = tokio::spawn(async move {
                let _permit = match limit.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => return (None, Err(e)),
                };
                if deps.cancel.is_cancelled() {
                    return (None, Err(ExecutionError::Cancelled));
                }
                let transport = match transports.create() {
                    Ok(transport) => transport,
                    Err(e) => return (None, Err(ExecutionError::Transport(e))),
                };
                let ctx = ExecutionContext::new(variables, instance, renderer);
                let mut executor = SequenceExecutor::new(sequence, deps, transport, ctx);
                let run_id = executor.run_id();
                (Some(run_id), executor.run().await)
            });
            handles.push((instance, handle));
        }

        let instances: Vec<InstanceInfo> = handles.iter().map(|(i, _)| *i).collect();
        let joined = join_all(handles.into_iter().map(|(_, h)| h)).await;

        let mut report = RunReport::default();
        for (instance, joined) in instances.into_iter().zip(joined) {
            let (run_id, result) = match joined {
                Ok(outcome) => outcome,
                Err(e) => (None, Err(ExecutionError::Task(e.to_string()))),
            };
            if let Err(e) = &result {
                warn!("{} run failed: {e}", instance.prefix());
            }
            report.runs.push(RunOutcome { run_id, instance, result });
        }
        Ok(report)
    }
}
