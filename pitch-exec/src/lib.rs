#![forbid(unsafe_code)]

//! Runtime engine for pitch sequences: the shared execution context, the plugin
//! pipeline, control flow, the command scheduler and the multi-run runner.

pub mod context;
pub mod executor;
pub mod plugins;

pub use crate::context::{ExecutionContext, InstanceInfo, Phase, StepState};
pub use crate::executor::{
    ExecutionError, ExecutorConfig, RunReport, RunnerConfig, SequenceExecutor, SequenceRunner,
};
pub use crate::plugins::{Plugin, PluginError, PluginRegistry};
