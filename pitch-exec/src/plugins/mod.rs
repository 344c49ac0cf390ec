//! Plugin contract, argument handling and the per-phase records kept on the context.

mod args;
pub mod builtin;
pub mod command;
mod pipeline;
mod registry;

use std::any::Any;

use async_trait::async_trait;
use pitch_core::expressions::ExpressionError;
use serde_json::{Map, Value};

use crate::context::{ExecutionContext, Phase};

pub use args::PluginArgs;
pub use pipeline::{execute_plugins, step_plugins, DEFAULT_PLUGINS};
pub use registry::{ArgumentSpec, PluginDescriptor, PluginFactory, PluginRegistry};

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("invalid arguments for plugin '{plugin}': {message}")]
    InvalidArguments { plugin: String, message: String },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Aborts the whole run.
    #[error("{0}")]
    Stop(String),
    #[error(transparent)]
    Expression(#[from] ExpressionError),
    #[error("{0}")]
    Other(String),
}

impl PluginError {
    pub fn invalid(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        PluginError::InvalidArguments {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A unit of request or response side effects.
///
/// Instances are built from rendered arguments right before they run and live
/// on in the context's [`PluginLedger`] until the next step starts, so a later
/// plugin can inspect an earlier one.
#[async_trait]
pub trait Plugin: AsAny + Send + Sync {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<(), PluginError>;

    /// Value exposed to templates under `request.plugins.<name>` / `response.plugins.<name>`.
    fn result(&self) -> Value {
        Value::Null
    }
}

pub struct PluginRecord {
    pub name: String,
    pub phase: Phase,
    pub instance: Box<dyn Plugin>,
}

impl PluginRecord {
    pub fn downcast_ref<T: Plugin>(&self) -> Option<&T> {
        let plugin: &dyn Plugin = self.instance.as_ref();
        plugin.as_any().downcast_ref::<T>()
    }
}

impl std::fmt::Debug for PluginRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRecord")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

/// Plugins that already ran in one phase, in execution order.
#[derive(Debug, Default)]
pub struct PluginCollection {
    records: Vec<PluginRecord>,
}

impl PluginCollection {
    pub fn push(&mut self, record: PluginRecord) {
        self.records.push(record);
    }

    /// The most recent record with this name.
    pub fn get(&self, name: &str) -> Option<&PluginRecord> {
        self.records.iter().rev().find(|r| r.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Name to result; a later plugin with the same name wins.
    pub fn results(&self) -> Map<String, Value> {
        let mut out = Map::new();
        for record in &self.records {
            out.insert(record.name.clone(), record.instance.result());
        }
        out
    }
}

#[derive(Debug, Default)]
pub struct PluginLedger {
    pub request: PluginCollection,
    pub response: PluginCollection,
}

impl PluginLedger {
    pub fn phase(&self, phase: Phase) -> &PluginCollection {
        match phase {
            Phase::Request => &self.request,
            Phase::Response => &self.response,
        }
    }

    pub fn phase_mut(&mut self, phase: Phase) -> &mut PluginCollection {
        match phase {
            Phase::Request => &mut self.request,
            Phase::Response => &mut self.response,
        }
    }

    pub fn clear(&mut self) {
        self.request.clear();
        self.response.clear();
    }
}
