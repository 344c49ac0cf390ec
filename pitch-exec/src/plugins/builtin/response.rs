use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::context::{ExecutionContext, Phase};
use crate::plugins::builtin::common::resolve_path;
use crate::plugins::builtin::request::RequestProfilerPlugin;
use crate::plugins::{Plugin, PluginArgs, PluginError};

/// `response_as_json()`: parses the body into `response.json`. A body that is
/// not JSON leaves it `null` and is reported in the plugin result.
pub struct ResponseAsJsonPlugin {
    outcome: Value,
}

impl ResponseAsJsonPlugin {
    pub fn from_args(args: PluginArgs) -> Result<Box<dyn Plugin>, PluginError> {
        args.finish()?;
        Ok(Box::new(Self { outcome: Value::Null }))
    }
}

#[async_trait]
impl Plugin for ResponseAsJsonPlugin {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<(), PluginError> {
        let Some(response) = ctx.response.as_mut() else {
            self.outcome = json!({ "ok": false, "error": "no response" });
            return Ok(());
        };
        match serde_json::from_str::<Value>(&response.body) {
            Ok(parsed) => {
                response.json = Some(parsed);
                self.outcome = json!({ "ok": true, "error": null });
            }
            Err(e) => {
                response.json = None;
                self.outcome = json!({ "ok": false, "error": e.to_string() });
            }
        }
        Ok(())
    }

    fn result(&self) -> Value {
        self.outcome.clone()
    }
}

/// `json_file_output(filename, create_dirs=true)`
pub struct JsonFileOutputPlugin {
    path: PathBuf,
    create_dirs: bool,
}

impl JsonFileOutputPlugin {
    pub fn from_args(mut args: PluginArgs) -> Result<Box<dyn Plugin>, PluginError> {
        let path = resolve_path(&args.require_string("filename")?)?;
        let create_dirs = args.take_bool("create_dirs")?.unwrap_or(true);
        args.finish()?;
        Ok(Box::new(Self { path, create_dirs }))
    }
}

#[async_trait]
impl Plugin for JsonFileOutputPlugin {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<(), PluginError> {
        if let Some(dir) = self.path.parent() {
            if !dir.exists() {
                if !self.create_dirs {
                    return Err(PluginError::Other(format!("directory {} does not exist", dir.display())));
                }
                tokio::fs::create_dir_all(dir).await?;
            }
        }
        let body = ctx.response.as_ref().and_then(|r| r.json.clone()).unwrap_or(Value::Null);
        let text = serde_json::to_string(&body).map_err(|e| PluginError::Other(e.to_string()))?;
        tokio::fs::write(&self.path, text).await?;
        Ok(())
    }
}

/// Response half of `profiler`: seconds since the request-phase profiler ran.
pub struct ResponseProfilerPlugin {
    elapsed: Option<f64>,
}

impl ResponseProfilerPlugin {
    pub fn from_args(args: PluginArgs) -> Result<Box<dyn Plugin>, PluginError> {
        args.finish()?;
        Ok(Box::new(Self { elapsed: None }))
    }

    pub fn elapsed(&self) -> Option<f64> {
        self.elapsed
    }
}

#[async_trait]
impl Plugin for ResponseProfilerPlugin {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<(), PluginError> {
        self.elapsed = ctx
            .plugins
            .phase(Phase::Request)
            .get("profiler")
            .and_then(|record| record.downcast_ref::<RequestProfilerPlugin>())
            .and_then(RequestProfilerPlugin::started_at)
            .map(|started| started.elapsed().as_secs_f64());
        Ok(())
    }

    fn result(&self) -> Value {
        json!({ "elapsed": self.elapsed })
    }
}

/// `stdout_writer()`: prints `response.json` with four-space indentation.
pub struct StdoutWriterPlugin;

impl StdoutWriterPlugin {
    pub fn from_args(args: PluginArgs) -> Result<Box<dyn Plugin>, PluginError> {
        args.finish()?;
        Ok(Box::new(Self))
    }

    pub fn render(value: &Value) -> Result<String, PluginError> {
        let mut out = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
        value
            .serialize(&mut serializer)
            .map_err(|e| PluginError::Other(e.to_string()))?;
        String::from_utf8(out).map_err(|e| PluginError::Other(e.to_string()))
    }
}

#[async_trait]
impl Plugin for StdoutWriterPlugin {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<(), PluginError> {
        let body = ctx.response.as_ref().and_then(|r| r.json.clone()).unwrap_or(Value::Null);
        println!("{}", Self::render(&body)?);
        Ok(())
    }
}

/// `assert_http_status_code(expect=200, failfast)`
///
/// A missing response (transport failure) never matches. With failfast the
/// mismatch stops the run; otherwise it is only logged.
pub struct AssertHttpStatusCodePlugin {
    expect: Vec<u16>,
    failfast: Option<bool>,
    received: Option<u16>,
    passed: Option<bool>,
}

impl AssertHttpStatusCodePlugin {
    pub fn from_args(mut args: PluginArgs) -> Result<Box<dyn Plugin>, PluginError> {
        let plugin = args.plugin().to_string();
        let expect = match args.take("expect") {
            None => vec![200],
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| status_code(&plugin, v))
                .collect::<Result<Vec<_>, _>>()?,
            Some(v) => vec![status_code(&plugin, &v)?],
        };
        let failfast = args.take_bool("failfast")?;
        args.finish()?;
        Ok(Box::new(Self {
            expect,
            failfast,
            received: None,
            passed: None,
        }))
    }
}

fn status_code(plugin: &str, value: &Value) -> Result<u16, PluginError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u16>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| PluginError::invalid(plugin, format!("invalid status code: {value}")))
}

#[async_trait]
impl Plugin for AssertHttpStatusCodePlugin {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<(), PluginError> {
        let failfast = self
            .failfast
            .or_else(|| ctx.step.as_ref().map(|s| s.failfast))
            .unwrap_or(true);
        self.received = ctx.response.as_ref().map(|r| r.status_code);
        let passed = self.received.is_some_and(|code| self.expect.contains(&code));
        self.passed = Some(passed);
        if passed {
            return Ok(());
        }

        let message = match self.received {
            Some(code) => format!("expected HTTP status code {:?}, received {code}", self.expect),
            None => format!("expected HTTP status code {:?}, received no response", self.expect),
        };
        if failfast {
            return Err(PluginError::Stop(message));
        }
        warn!("{} {message}", ctx.instance().prefix());
        Ok(())
    }

    fn result(&self) -> Value {
        json!({
            "expected": self.expect,
            "received": self.received,
            "passed": self.passed,
        })
    }
}
