//! The mutable state threaded through one run of a sequence.

use std::fmt;
use std::str::FromStr;

use pitch_core::expressions::{ExpressionError, Namespace, Renderer};
use pitch_core::LoopKind;
use serde_json::{json, Value};

use crate::executor::http::{HttpRequest, HttpResponse};
use crate::plugins::PluginLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Request,
    Response,
}

impl Phase {
    pub const ALL: [Phase; 2] = [Phase::Request, Phase::Response];

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Request => "request",
            Phase::Response => "response",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid plugin phase '{0}' (expected 'request' or 'response')")]
pub struct InvalidPhase(pub String);

impl FromStr for Phase {
    type Err = InvalidPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "request" => Ok(Phase::Request),
            "response" => Ok(Phase::Response),
            _ => Err(InvalidPhase(s.to_string())),
        }
    }
}

/// Identifies one concurrent run for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub struct InstanceInfo {
    pub process_id: usize,
    pub thread_id: usize,
    pub loop_id: usize,
}

impl InstanceInfo {
    /// `loop_index` is zero-based; `loop_id` is one-based.
    pub fn new(process_id: usize, loop_index: usize, threads: usize) -> Self {
        Self {
            process_id,
            thread_id: loop_index % threads.max(1) + 1,
            loop_id: loop_index + 1,
        }
    }

    pub fn prefix(&self) -> String {
        format!(
            "[Process={:02},Thread={:02},Loop={:04}]",
            self.process_id, self.thread_id, self.loop_id
        )
    }
}

impl Default for InstanceInfo {
    fn default() -> Self {
        Self::new(1, 0, 1)
    }
}

/// Per-step facts resolved when the step becomes current.
#[derive(Debug, Clone, PartialEq)]
pub struct StepState {
    pub index: usize,
    pub failfast: bool,
    pub loop_kind: Option<LoopKind>,
}

/// Shared state of a single run.
///
/// `variables` accumulates for the whole run; `request`, `response`, `phase`,
/// `responses` and `step` belong to the current step and are reset when the next
/// step starts.
pub struct ExecutionContext {
    pub variables: Namespace,
    pub request: Option<HttpRequest>,
    pub response: Option<HttpResponse>,
    pub phase: Option<Phase>,
    /// Responses collected across the iterations of a looping step.
    pub responses: Option<Vec<HttpResponse>>,
    pub plugins: PluginLedger,
    pub step: Option<StepState>,
    instance: InstanceInfo,
    renderer: Renderer,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("variables", &self.variables)
            .field("request", &self.request)
            .field("response", &self.response)
            .field("phase", &self.phase)
            .field("step", &self.step)
            .field("instance", &self.instance)
            .finish_non_exhaustive()
    }
}

impl ExecutionContext {
    pub fn new(variables: Namespace, instance: InstanceInfo, renderer: Renderer) -> Self {
        Self {
            variables,
            request: None,
            response: None,
            phase: None,
            responses: None,
            plugins: PluginLedger::default(),
            step: None,
            instance,
            renderer,
        }
    }

    pub fn instance(&self) -> InstanceInfo {
        self.instance
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn reset_step(&mut self) {
        self.request = None;
        self.response = None;
        self.phase = None;
        self.responses = None;
        self.step = None;
        self.plugins.clear();
    }

    pub fn bind_item(&mut self, item: Value) {
        self.variables.insert("item".to_string(), item);
    }

    /// Snapshot of everything templates can see.
    ///
    /// Variables sit at the top level; `variables`, `request`, `response`,
    /// `responses`, `phase` and `instance` are reserved and shadow variables of
    /// the same name.
    pub fn namespace(&self) -> Namespace {
        let mut ns = self.variables.clone();
        ns.insert("variables".to_string(), Value::Object(self.variables.clone()));

        let request = match &self.request {
            Some(req) => {
                let mut value = req.to_value();
                value["plugins"] = Value::Object(self.plugins.request.results());
                value
            }
            None => Value::Null,
        };
        ns.insert("request".to_string(), request);

        let response = match &self.response {
            Some(resp) => {
                let mut value = resp.to_value();
                let mut plugins = self.plugins.request.results();
                plugins.extend(self.plugins.response.results());
                value["plugins"] = Value::Object(plugins);
                value
            }
            None => Value::Null,
        };
        ns.insert("response".to_string(), response);

        let responses = match &self.responses {
            Some(list) => Value::Array(list.iter().map(HttpResponse::to_value).collect()),
            None => Value::Null,
        };
        ns.insert("responses".to_string(), responses);
        ns.insert(
            "phase".to_string(),
            self.phase.map(|p| Value::String(p.to_string())).unwrap_or(Value::Null),
        );
        ns.insert(
            "instance".to_string(),
            json!({
                "process_id": self.instance.process_id,
                "thread_id": self.instance.thread_id,
                "loop_id": self.instance.loop_id,
            }),
        );
        ns
    }

    /// Renders a value tree against the current namespace.
    pub fn render(&self, value: &Value) -> Result<Value, ExpressionError> {
        self.renderer.render_nested(value, &self.namespace())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_info_derives_thread_and_loop_ids() {
        let info = InstanceInfo::new(4, 30, 8);
        assert_eq!((info.process_id, info.thread_id, info.loop_id), (4, 7, 31));
        assert_eq!(info.prefix(), "[Process=04,Thread=07,Loop=0031]");
        assert_eq!(InstanceInfo::new(1, 5, 0).thread_id, 1);
    }

    #[test]
    fn phase_parsing() {
        assert_eq!("Response".parse::<Phase>().unwrap(), Phase::Response);
        assert_eq!("teardown".parse::<Phase>(), Err(InvalidPhase("teardown".into())));
    }

    #[test]
    fn namespace_exposes_variables_and_reserved_entries() {
        let mut vars = Namespace::new();
        vars.insert("token".into(), json!("abc"));
        vars.insert("request".into(), json!("shadowed"));
        let mut ctx = ExecutionContext::new(vars, InstanceInfo::default(), Renderer::default());
        ctx.bind_item(json!(3));
        let ns = ctx.namespace();
        assert_eq!(ns["token"], json!("abc"));
        assert_eq!(ns["item"], json!(3));
        assert_eq!(ns["variables"]["token"], json!("abc"));
        assert_eq!(ns["request"], Value::Null);
        assert_eq!(ns["instance"]["loop_id"], json!(1));
        assert_eq!(
            ctx.render(&json!({"auth": "Bearer {{ token }}", "n": "{{ item * 2 }}"})).unwrap(),
            json!({"auth": "Bearer abc", "n": 6})
        );
    }
}
