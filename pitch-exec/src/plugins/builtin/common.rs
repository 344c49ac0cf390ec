//! Plugins available in both phases.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use pitch_core::expressions::value::to_text;
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::context::ExecutionContext;
use crate::plugins::{Plugin, PluginArgs, PluginError};

const DEFAULT_FORMAT: &str = "%(asctime)s\t%(levelname)s\t%(message)s";

/// Expands a leading `~/` and makes the path absolute against the working directory.
pub(crate) fn resolve_path(raw: &str) -> Result<PathBuf, PluginError> {
    let expanded = match raw.strip_prefix("~/") {
        Some(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => PathBuf::from(raw),
        },
        None => PathBuf::from(raw),
    };
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(std::env::current_dir()?.join(expanded))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FileHandler {
    path: PathBuf,
    truncate: bool,
}

/// Logs its (already rendered) message through `tracing`, or appends it to a file when a
/// `handler: {filename, mode}` is given.
pub struct LoggerPlugin {
    logger_name: String,
    message: Value,
    handler: Option<FileHandler>,
    format: String,
}

impl LoggerPlugin {
    pub fn from_args(mut args: PluginArgs) -> Result<Box<dyn Plugin>, PluginError> {
        let plugin = args.plugin().to_string();
        let logger_name = format!(
            "pitch.{}",
            args.take_string("logger_name")?.unwrap_or_else(|| "logger.plugin".to_string())
        );
        let message = args.take("message").unwrap_or(Value::Null);

        let handler = match args.take("handler") {
            None => None,
            Some(Value::Object(mut handler)) => {
                let filename = handler
                    .remove("filename")
                    .map(|v| to_text(&v))
                    .ok_or_else(|| PluginError::invalid(&plugin, "handler needs a 'filename'"))?;
                let truncate = match handler.remove("mode").map(|v| to_text(&v)).as_deref() {
                    None | Some("a") => false,
                    Some("w") => true,
                    Some(other) => {
                        return Err(PluginError::invalid(&plugin, format!("unsupported handler mode '{other}'")))
                    }
                };
                Some(FileHandler {
                    path: resolve_path(&filename)?,
                    truncate,
                })
            }
            Some(_) => return Err(PluginError::invalid(&plugin, "handler must be a mapping")),
        };
        let format = match args.take("formatter") {
            Some(Value::Object(formatter)) => formatter
                .get("fmt")
                .map(to_text)
                .unwrap_or_else(|| DEFAULT_FORMAT.to_string()),
            Some(_) => return Err(PluginError::invalid(&plugin, "formatter must be a mapping")),
            None => DEFAULT_FORMAT.to_string(),
        };
        args.finish()?;

        Ok(Box::new(Self {
            logger_name,
            message,
            handler,
            format,
        }))
    }

    fn format_line(&self, message: &str) -> String {
        let asctime = chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f").to_string();
        self.format
            .replace("%(asctime)s", &asctime)
            .replace("%(levelname)s", "INFO")
            .replace("%(name)s", &self.logger_name)
            .replace("%(message)s", message)
    }
}

#[async_trait]
impl Plugin for LoggerPlugin {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<(), PluginError> {
        let message = to_text(&self.message);
        let Some(handler) = &mut self.handler else {
            info!(logger = %self.logger_name, "{} {message}", ctx.instance().prefix());
            return Ok(());
        };

        let mut options = tokio::fs::OpenOptions::new();
        options.create(true);
        if handler.truncate {
            // Only the first write of this instance truncates.
            options.write(true).truncate(true);
            handler.truncate = false;
        } else {
            options.append(true);
        }
        let path = handler.path.clone();
        let line = self.format_line(&message);
        let mut file = options.open(&path).await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }
}

/// `request_delay(seconds)`
pub struct DelayPlugin {
    delay: Duration,
}

impl DelayPlugin {
    pub fn from_args(mut args: PluginArgs) -> Result<Box<dyn Plugin>, PluginError> {
        let seconds = args
            .take_f64("seconds")?
            .ok_or_else(|| PluginError::invalid(args.plugin(), "missing required argument 'seconds'"))?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(PluginError::invalid(args.plugin(), format!("invalid delay: {seconds}")));
        }
        args.finish()?;
        Ok(Box::new(Self {
            delay: Duration::from_secs_f64(seconds),
        }))
    }
}

#[async_trait]
impl Plugin for DelayPlugin {
    async fn execute(&mut self, _ctx: &mut ExecutionContext) -> Result<(), PluginError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

/// `pre_register` / `post_register`: writes every argument into the variables.
///
/// A string value naming something in the namespace (`response.json.token`)
/// stores what it names; anything else is stored as given.
pub struct RegisterPlugin {
    updates: Map<String, Value>,
}

impl RegisterPlugin {
    pub fn from_args(mut args: PluginArgs) -> Result<Box<dyn Plugin>, PluginError> {
        Ok(Box::new(Self {
            updates: args.take_rest(),
        }))
    }
}

#[async_trait]
impl Plugin for RegisterPlugin {
    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<(), PluginError> {
        let ns = ctx.namespace();
        let mut resolved = Map::new();
        for (key, value) in &self.updates {
            let value = match value {
                Value::String(source) => ctx
                    .renderer()
                    .lookup(source, &ns)
                    .unwrap_or_else(|| value.clone()),
                other => other.clone(),
            };
            resolved.insert(key.clone(), value);
        }
        ctx.variables.extend(resolved);
        Ok(())
    }

    fn result(&self) -> Value {
        Value::Object(self.updates.clone())
    }
}
