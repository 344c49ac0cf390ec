use std::path::PathBuf;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use crate::context::ExecutionContext;
use crate::plugins::builtin::common::resolve_path;
use crate::plugins::{Plugin, PluginArgs, PluginError};

/// `file_input(filename)`: the file's contents become the plugin result.
pub struct FileInputPlugin {
    path: PathBuf,
    contents: Option<String>,
}

impl FileInputPlugin {
    pub fn from_args(mut args: PluginArgs) -> Result<Box<dyn Plugin>, PluginError> {
        let filename = args.require_string("filename")?;
        let path = resolve_path(&filename)?;
        if !path.is_file() {
            return Err(PluginError::invalid(
                args.plugin(),
                format!("file {} does not exist", path.display()),
            ));
        }
        args.finish()?;
        Ok(Box::new(Self { path, contents: None }))
    }
}

#[async_trait]
impl Plugin for FileInputPlugin {
    async fn execute(&mut self, _ctx: &mut ExecutionContext) -> Result<(), PluginError> {
        self.contents = Some(tokio::fs::read_to_string(&self.path).await?);
        Ok(())
    }

    fn result(&self) -> Value {
        self.contents.clone().map(Value::String).unwrap_or(Value::Null)
    }
}

/// Request half of `profiler`; the response half measures from here.
pub struct RequestProfilerPlugin {
    started: Option<(Instant, DateTime<Utc>)>,
}

impl RequestProfilerPlugin {
    pub fn from_args(args: PluginArgs) -> Result<Box<dyn Plugin>, PluginError> {
        args.finish()?;
        Ok(Box::new(Self { started: None }))
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started.map(|(instant, _)| instant)
    }
}

#[async_trait]
impl Plugin for RequestProfilerPlugin {
    async fn execute(&mut self, _ctx: &mut ExecutionContext) -> Result<(), PluginError> {
        self.started = Some((Instant::now(), Utc::now()));
        Ok(())
    }

    fn result(&self) -> Value {
        match self.started {
            Some((_, wall)) => json!({ "started_at": wall.to_rfc3339() }),
            None => Value::Null,
        }
    }
}

/// `json_post_data()`: serializes the request `data` into a JSON body.
pub struct JsonPostDataPlugin;

impl JsonPostDataPlugin {
    pub fn from_args(args: PluginArgs) -> Result<Box<dyn Plugin>, PluginError> {
        args.finish()?;
        Ok(Box::new(Self))
    }
}

#[async_trait]
impl Plugin for JsonPostDataPlugin {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<(), PluginError> {
        let Some(request) = ctx.request.as_mut() else {
            return Ok(());
        };
        if let Some(data) = request.data.take() {
            let encoded = serde_json::to_string(&data).map_err(|e| PluginError::Other(e.to_string()))?;
            request.data = Some(Value::String(encoded));
            if !request.headers.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
                request
                    .headers
                    .insert("Content-Type".to_string(), "application/json".to_string());
            }
        }
        Ok(())
    }
}

/// `add_header(header, value)`
pub struct AddHeaderPlugin {
    header: String,
    value: String,
}

impl AddHeaderPlugin {
    pub fn from_args(mut args: PluginArgs) -> Result<Box<dyn Plugin>, PluginError> {
        let header = args.require_string("header")?;
        let value = args.require_string("value")?;
        args.finish()?;
        Ok(Box::new(Self { header, value }))
    }
}

#[async_trait]
impl Plugin for AddHeaderPlugin {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<(), PluginError> {
        if let Some(request) = ctx.request.as_mut() {
            request.headers.insert(self.header.clone(), self.value.clone());
        }
        Ok(())
    }
}
