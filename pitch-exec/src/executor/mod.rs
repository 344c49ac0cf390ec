mod analysis;
pub mod command;
mod concurrency;
pub mod control_flow;
pub mod driver;
pub mod events;
pub mod http;
pub mod request;
mod result;
pub mod runner;
mod types;

pub use analysis::analyze_plugins;
pub use command::{compile_plan, compile_step, Command, CommandInvoker, CommandStack, Instruction, Scheduler};
pub use concurrency::ConcurrencyLimit;
pub use control_flow::{Conditional, Loop};
pub use driver::{ExecutorDeps, SequenceExecutor};
pub use events::{CompositeEventSink, Event, EventKind, EventSink, NoOpEventSink, StdoutEventSink, TracingEventSink};
pub use http::{
    HttpError, HttpRequest, HttpResponse, HttpTransport, PreparedRequest, ReqwestTransport,
    ReqwestTransportFactory, TransportFactory,
};
pub use request::{build_request, compose_url, merge_maps};
pub use result::{ExecutionError, RunSummary};
pub use runner::{CancellationFlag, RunOutcome, RunReport, RunnerConfig, SequenceRunner};
pub use types::ExecutorConfig;
