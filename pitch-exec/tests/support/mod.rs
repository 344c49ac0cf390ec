#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pitch_core::{parse_sequence_str, DocumentFormat, Renderer, Sequence};
use pitch_exec::context::{ExecutionContext, InstanceInfo};
use pitch_exec::executor::{
    CancellationFlag, Event, EventKind, EventSink, ExecutorDeps, HttpError, HttpResponse, HttpTransport,
    PreparedRequest, TransportFactory,
};
use pitch_exec::{ExecutionError, ExecutorConfig, PluginRegistry, SequenceExecutor};

type Responder = dyn Fn(&PreparedRequest) -> Result<HttpResponse, HttpError> + Send + Sync;

/// Answers every request through a closure and remembers what was sent.
#[derive(Clone)]
pub struct MockTransport {
    pub sent: Arc<Mutex<Vec<PreparedRequest>>>,
    responder: Arc<Responder>,
}

impl MockTransport {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&PreparedRequest) -> Result<HttpResponse, HttpError> + Send + Sync + 'static,
    {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            responder: Arc::new(responder),
        }
    }

    pub fn ok() -> Self {
        Self::new(|_| Ok(HttpResponse::new(200, "{}")))
    }

    pub fn with_status(status: u16) -> Self {
        Self::new(move |_| Ok(HttpResponse::new(status, "{}")))
    }

    pub fn paths(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|r| match r.url.query() {
                Some(q) => format!("{}?{q}", r.url.path()),
                None => r.url.path().to_string(),
            })
            .collect()
    }

    pub fn requests(&self) -> Vec<PreparedRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: PreparedRequest) -> Result<HttpResponse, HttpError> {
        let response = (self.responder)(&request);
        let url = request.url.to_string();
        self.sent.lock().unwrap().push(request);
        response.map(|mut r| {
            r.url = url;
            r
        })
    }
}

impl TransportFactory for MockTransport {
    fn create(&self) -> Result<Arc<dyn HttpTransport>, HttpError> {
        Ok(Arc::new(self.clone()))
    }
}

#[derive(Clone, Default)]
pub struct RecordingSink {
    pub events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingSink {
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().unwrap().iter().map(|e| e.kind.clone()).collect()
    }

    /// `"started:<plugin>"` / `"finished:<plugin>"` markers in emission order.
    pub fn plugin_markers(&self) -> Vec<String> {
        self.kinds()
            .into_iter()
            .filter_map(|k| match k {
                EventKind::PluginStarted { plugin, .. } => Some(format!("started:{plugin}")),
                EventKind::PluginFinished { plugin, .. } => Some(format!("finished:{plugin}")),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn emit(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

pub fn sequence(yaml: &str) -> Sequence {
    parse_sequence_str(yaml, DocumentFormat::Yaml).unwrap().sequence
}

pub struct Harness {
    pub transport: MockTransport,
    pub sink: RecordingSink,
    pub registry: PluginRegistry,
    pub config: ExecutorConfig,
}

impl Harness {
    pub fn new(transport: MockTransport) -> Self {
        Self {
            transport,
            sink: RecordingSink::default(),
            registry: PluginRegistry::with_builtins(),
            config: ExecutorConfig::default(),
        }
    }

    pub fn executor(&self, sequence: Sequence) -> SequenceExecutor {
        let deps = ExecutorDeps {
            registry: Arc::new(self.registry.clone()),
            events: Arc::new(self.sink.clone()),
            config: self.config.clone(),
            cancel: CancellationFlag::new(),
        };
        let ctx = ExecutionContext::new(Default::default(), InstanceInfo::default(), Renderer::default());
        SequenceExecutor::new(Arc::new(sequence), deps, Arc::new(self.transport.clone()), ctx)
    }

    pub async fn run(&self, yaml: &str) -> (Result<pitch_exec::executor::RunSummary, ExecutionError>, SequenceExecutor) {
        let mut executor = self.executor(sequence(yaml));
        let result = executor.run().await;
        (result, executor)
    }
}
