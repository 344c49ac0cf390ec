use async_trait::async_trait;
use pitch_core::LoopKind;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::context::{InstanceInfo, Phase};

#[derive(Debug, Clone)]
pub struct Event {
    pub run_id: Uuid,
    pub instance: InstanceInfo,
    pub kind: EventKind,
}

impl Event {
    pub fn new(run_id: Uuid, instance: InstanceInfo, kind: EventKind) -> Self {
        Self { run_id, instance, kind }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    RunStarted {
        steps: usize,
    },
    RunFinished {
        succeeded: bool,
        error: Option<String>,
    },
    StepStarted {
        step: usize,
    },
    StepSkipped {
        step: usize,
    },
    LoopResolved {
        step: usize,
        kind: LoopKind,
        items: usize,
    },
    RequestSent {
        step: usize,
        method: String,
        url: String,
    },
    ResponseReceived {
        step: usize,
        status_code: u16,
        elapsed_ms: u128,
    },
    TransportFailed {
        step: usize,
        error: String,
    },
    PluginStarted {
        step: usize,
        phase: Phase,
        plugin: String,
    },
    PluginFinished {
        step: usize,
        phase: Phase,
        plugin: String,
        ok: bool,
    },
}

impl EventKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            EventKind::RunStarted { .. } => "run.started",
            EventKind::RunFinished { .. } => "run.finished",
            EventKind::StepStarted { .. } => "step.started",
            EventKind::StepSkipped { .. } => "step.skipped",
            EventKind::LoopResolved { .. } => "loop.resolved",
            EventKind::RequestSent { .. } => "request.sent",
            EventKind::ResponseReceived { .. } => "response.received",
            EventKind::TransportFailed { .. } => "transport.failed",
            EventKind::PluginStarted { .. } => "plugin.started",
            EventKind::PluginFinished { .. } => "plugin.finished",
        }
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: Event);
}

pub struct CompositeEventSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl Default for CompositeEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeEventSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }
}

#[async_trait]
impl EventSink for CompositeEventSink {
    async fn emit(&self, event: Event) {
        for sink in &self.sinks {
            sink.emit(event.clone()).await;
        }
    }
}

/// Logs every event through `tracing`, prefixed with the run's correlation ids.
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: Event) {
        let prefix = event.instance.prefix();
        match event.kind {
            EventKind::RunStarted { steps } => info!(run_id = %event.run_id, "{prefix} run started ({steps} steps)"),
            EventKind::RunFinished { succeeded: true, .. } => info!(run_id = %event.run_id, "{prefix} run finished"),
            EventKind::RunFinished { error, .. } => warn!(
                run_id = %event.run_id,
                "{prefix} run failed: {}",
                error.unwrap_or_default()
            ),
            EventKind::StepStarted { step } => debug!(step, "{prefix} step {step} started"),
            EventKind::StepSkipped { step } => info!(step, "{prefix} step {step} skipped"),
            EventKind::LoopResolved { step, kind, items } => {
                debug!(step, "{prefix} step {step} {kind} resolved to {items} item(s)")
            }
            EventKind::RequestSent { step, method, url } => info!(step, "{prefix} {method} {url}"),
            EventKind::ResponseReceived { step, status_code, elapsed_ms } => {
                info!(step, status_code, "{prefix} <- {status_code} in {elapsed_ms}ms")
            }
            EventKind::TransportFailed { step, error } => warn!(step, "{prefix} request failed: {error}"),
            EventKind::PluginStarted { step, phase, plugin } => {
                debug!(step, %phase, plugin = %plugin, "{prefix} plugin {plugin} started")
            }
            EventKind::PluginFinished { step, phase, plugin, ok } => {
                debug!(step, %phase, plugin = %plugin, ok, "{prefix} plugin {plugin} finished")
            }
        }
    }
}

/// JSON lines on stdout.
pub struct StdoutEventSink;

impl StdoutEventSink {
    pub fn to_json(event: &Event) -> serde_json::Value {
        let mut value = match &event.kind {
            EventKind::RunStarted { steps } => json!({ "steps": steps }),
            EventKind::RunFinished { succeeded, error } => json!({ "succeeded": succeeded, "error": error }),
            EventKind::StepStarted { step } | EventKind::StepSkipped { step } => json!({ "step": step }),
            EventKind::LoopResolved { step, kind, items } => {
                json!({ "step": step, "loop": kind.keyword(), "items": items })
            }
            EventKind::RequestSent { step, method, url } => json!({ "step": step, "method": method, "url": url }),
            EventKind::ResponseReceived { step, status_code, elapsed_ms } => {
                json!({ "step": step, "status_code": status_code, "elapsed_ms": elapsed_ms })
            }
            EventKind::TransportFailed { step, error } => json!({ "step": step, "error": error }),
            EventKind::PluginStarted { step, phase, plugin } => {
                json!({ "step": step, "phase": phase, "plugin": plugin })
            }
            EventKind::PluginFinished { step, phase, plugin, ok } => {
                json!({ "step": step, "phase": phase, "plugin": plugin, "ok": ok })
            }
        };
        value["type"] = json!(event.kind.type_name());
        value["run_id"] = json!(event.run_id.to_string());
        value["process_id"] = json!(event.instance.process_id);
        value["thread_id"] = json!(event.instance.thread_id);
        value["loop_id"] = json!(event.instance.loop_id);
        value
    }
}

#[async_trait]
impl EventSink for StdoutEventSink {
    async fn emit(&self, event: Event) {
        println!("{}", serde_json::to_string(&Self::to_json(&event)).unwrap_or_default());
    }
}

pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: Event) {}
}
