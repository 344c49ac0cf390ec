use std::sync::Arc;

use async_trait::async_trait;
use pitch_core::expressions::value::to_text;
use pitch_core::{PluginInvocation, Sequence, Step};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::{ExecutionContext, InstanceInfo, StepState};
use crate::executor::analysis::analyze_plugins;
use crate::executor::command::{compile_plan, CommandInvoker, Instruction, Scheduler};
use crate::executor::control_flow::{Conditional, Loop};
use crate::executor::events::{Event, EventKind, EventSink};
use crate::executor::http::{HttpError, HttpTransport, PreparedRequest};
use crate::executor::request::{build_request, merge_maps};
use crate::executor::runner::CancellationFlag;
use crate::executor::{ExecutionError, ExecutorConfig, RunSummary};
use crate::plugins::{execute_plugins, step_plugins, PluginRegistry};

/// Collaborators shared by every run of a sequence.
#[derive(Clone)]
pub struct ExecutorDeps {
    pub registry: Arc<PluginRegistry>,
    pub events: Arc<dyn EventSink>,
    pub config: ExecutorConfig,
    pub cancel: CancellationFlag,
}

/// Drives one run of a sequence over its own context and transport session.
pub struct SequenceExecutor {
    sequence: Arc<Sequence>,
    deps: ExecutorDeps,
    transport: Arc<dyn HttpTransport>,
    run_id: Uuid,
    ctx: ExecutionContext,
    summary: RunSummary,
    plugins: Vec<PluginInvocation>,
    prepared: Option<PreparedRequest>,
}

impl SequenceExecutor {
    pub fn new(
        sequence: Arc<Sequence>,
        deps: ExecutorDeps,
        transport: Arc<dyn HttpTransport>,
        ctx: ExecutionContext,
    ) -> Self {
        Self {
            sequence,
            deps,
            transport,
            run_id: Uuid::new_v4(),
            ctx,
            summary: RunSummary::default(),
            plugins: Vec::new(),
            prepared: None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    pub fn instance(&self) -> InstanceInfo {
        self.ctx.instance()
    }

    /// Runs every step to completion; the first error ends the run.
    pub async fn run(&mut self) -> Result<RunSummary, ExecutionError> {
        self.emit(EventKind::RunStarted {
            steps: self.sequence.steps.len(),
        })
        .await;

        let outcome = self.run_steps().await;
        self.emit(EventKind::RunFinished {
            succeeded: outcome.is_ok(),
            error: outcome.as_ref().err().map(ToString::to_string),
        })
        .await;
        outcome.map(|()| self.summary.clone())
    }

    async fn run_steps(&mut self) -> Result<(), ExecutionError> {
        analyze_plugins(&self.sequence, &self.deps.registry)?;
        self.initialize_variables()?;
        let plan = compile_plan(self.sequence.steps.len());
        Scheduler::new(plan).run(self).await
    }

    /// Renders the sequence `variables` once; values already in the context win.
    fn initialize_variables(&mut self) -> Result<(), ExecutionError> {
        let mut ns = self.sequence.variables.clone();
        ns.extend(self.ctx.variables.clone());
        let rendered = self.ctx.renderer().render_map(&self.sequence.variables, &ns)?;
        for (key, value) in rendered {
            self.ctx.variables.entry(key).or_insert(value);
        }
        Ok(())
    }

    async fn emit(&self, kind: EventKind) {
        self.deps
            .events
            .emit(Event::new(self.run_id, self.ctx.instance(), kind))
            .await;
    }

    fn step_index(&self) -> usize {
        self.ctx.step.as_ref().map(|s| s.index).unwrap_or_default()
    }

    fn current_step(&self) -> Result<&Step, ExecutionError> {
        let index = self.step_index();
        self.sequence
            .steps
            .get(index)
            .ok_or(ExecutionError::StepNotFound(index))
    }

    fn set_step(&mut self, index: usize) -> Result<(), ExecutionError> {
        if self.deps.cancel.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }
        let sequence = Arc::clone(&self.sequence);
        let step = sequence
            .steps
            .get(index)
            .ok_or(ExecutionError::StepNotFound(index))?;

        self.ctx.reset_step();
        self.ctx.variables.remove("item");
        self.prepared = None;
        self.plugins = step_plugins(&sequence, step);
        self.ctx.step = Some(StepState {
            index,
            failfast: step
                .failfast
                .or(sequence.failfast)
                .unwrap_or(self.deps.config.default_failfast),
            loop_kind: step.loop_directive().map(|(kind, _)| kind),
        });
        self.summary.record_step();
        Ok(())
    }

    async fn prepare_request(&mut self) -> Result<(), ExecutionError> {
        let sequence = Arc::clone(&self.sequence);
        let step = self.current_step()?.clone();
        self.ctx.request = None;
        self.ctx.plugins.clear();
        self.prepared = None;

        if !step.variables.is_empty() {
            let rendered = self.ctx.renderer().render_map(&step.variables, &self.ctx.namespace())?;
            self.ctx.variables.extend(rendered);
        }

        let fields = merge_maps(&sequence.requests, &step.request_fields());
        let ns = self.ctx.namespace();
        let rendered = self.ctx.renderer().render_map(&fields, &ns)?;
        let base_url = step.base_url.as_deref().unwrap_or(&sequence.base_url);
        let base_url = to_text(&self.ctx.renderer().render_str(base_url, &ns)?);
        self.ctx.request = Some(build_request(&base_url, &rendered)?);

        execute_plugins(
            &mut self.ctx,
            &self.plugins,
            &self.deps.registry,
            self.deps.events.as_ref(),
            self.run_id,
        )
        .await?;

        let request = self
            .ctx
            .request
            .as_ref()
            .ok_or_else(|| ExecutionError::InvalidRequest("request was removed by a plugin".to_string()))?;
        let prepared = self.transport.prepare(request).map_err(|e| match e {
            HttpError::InvalidRequest(message) => ExecutionError::InvalidRequest(message),
            other => ExecutionError::InvalidRequest(other.to_string()),
        })?;
        self.prepared = Some(prepared);
        Ok(())
    }

    async fn send_request(&mut self) -> Result<(), ExecutionError> {
        let step = self.step_index();
        let prepared = self
            .prepared
            .take()
            .ok_or_else(|| ExecutionError::InvalidRequest("no prepared request".to_string()))?;
        self.emit(EventKind::RequestSent {
            step,
            method: prepared.method.clone(),
            url: prepared.url.to_string(),
        })
        .await;

        match self.transport.send(prepared).await {
            Ok(response) => {
                self.emit(EventKind::ResponseReceived {
                    step,
                    status_code: response.status_code,
                    elapsed_ms: response.elapsed.as_millis(),
                })
                .await;
                self.ctx.response = Some(response);
                self.summary.record_request(true);
            }
            Err(e) => {
                warn!(step, error = %e, "{} transport error", self.ctx.instance().prefix());
                self.emit(EventKind::TransportFailed {
                    step,
                    error: e.to_string(),
                })
                .await;
                self.ctx.response = None;
                self.summary.record_request(false);
            }
        }
        Ok(())
    }

    fn initialize_responses(&mut self) {
        let loops = self.ctx.step.as_ref().is_some_and(|s| s.loop_kind.is_some());
        if loops && self.ctx.responses.is_none() {
            self.ctx.responses = Some(Vec::new());
        }
    }

    async fn process_response(&mut self) -> Result<(), ExecutionError> {
        execute_plugins(
            &mut self.ctx,
            &self.plugins,
            &self.deps.registry,
            self.deps.events.as_ref(),
            self.run_id,
        )
        .await?;
        if let (Some(responses), Some(response)) = (self.ctx.responses.as_mut(), self.ctx.response.as_ref()) {
            responses.push(response.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl CommandInvoker for SequenceExecutor {
    async fn invoke(&mut self, instruction: Instruction) -> Result<(), ExecutionError> {
        debug!(?instruction, "{} invoke", self.ctx.instance().prefix());
        match instruction {
            Instruction::SetStep(index) => {
                self.set_step(index)?;
                self.emit(EventKind::StepStarted { step: index }).await;
            }
            Instruction::BindItem(item) => self.ctx.bind_item(item),
            Instruction::SetPhase(phase) => self.ctx.phase = Some(phase),
            Instruction::PrepareRequest => self.prepare_request().await?,
            Instruction::SendRequest => self.send_request().await?,
            Instruction::InitializeResponses => self.initialize_responses(),
            Instruction::ProcessResponse => self.process_response().await?,
        }
        Ok(())
    }

    async fn evaluate_conditional(&mut self) -> Result<bool, ExecutionError> {
        let step = self.current_step()?;
        let run = Conditional::of(step).evaluate(self.ctx.renderer(), &self.ctx.namespace())?;
        if !run {
            self.summary.record_skip();
            self.emit(EventKind::StepSkipped { step: self.step_index() }).await;
        }
        Ok(run)
    }

    async fn evaluate_loop(&mut self) -> Result<Option<Vec<Value>>, ExecutionError> {
        let step = self.current_step()?;
        let Some(directive) = Loop::of(step) else {
            return Ok(None);
        };
        let kind = directive.kind();
        let items = directive.evaluate(
            self.ctx.renderer(),
            &self.ctx.namespace(),
            self.deps.config.max_loop_items,
        )?;
        self.emit(EventKind::LoopResolved {
            step: self.step_index(),
            kind,
            items: items.len(),
        })
        .await;
        Ok(Some(items))
    }
}
