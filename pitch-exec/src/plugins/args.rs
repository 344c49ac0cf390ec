use pitch_core::expressions::value::to_text;
use serde_json::{Map, Value};

use crate::plugins::PluginError;

/// Rendered construction arguments of one plugin invocation.
///
/// Factories take what they understand and call [`finish`](Self::finish) so that
/// misspelled arguments are reported instead of ignored.
#[derive(Debug, Clone, Default)]
pub struct PluginArgs {
    plugin: String,
    values: Map<String, Value>,
}

impl PluginArgs {
    pub fn new(plugin: impl Into<String>, values: Map<String, Value>) -> Self {
        Self {
            plugin: plugin.into(),
            values,
        }
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Removes an argument; an explicit `null` counts as absent.
    pub fn take(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key).filter(|v| !v.is_null())
    }

    pub fn require(&mut self, key: &str) -> Result<Value, PluginError> {
        self.take(key)
            .ok_or_else(|| PluginError::invalid(&self.plugin, format!("missing required argument '{key}'")))
    }

    pub fn take_string(&mut self, key: &str) -> Result<Option<String>, PluginError> {
        match self.take(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(to_text(&v))),
            Some(_) => Err(PluginError::invalid(&self.plugin, format!("argument '{key}' must be a string"))),
        }
    }

    pub fn require_string(&mut self, key: &str) -> Result<String, PluginError> {
        self.take_string(key)?
            .ok_or_else(|| PluginError::invalid(&self.plugin, format!("missing required argument '{key}'")))
    }

    pub fn take_f64(&mut self, key: &str) -> Result<Option<f64>, PluginError> {
        match self.take(key) {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| PluginError::invalid(&self.plugin, format!("argument '{key}' must be a number"))),
            Some(_) => Err(PluginError::invalid(&self.plugin, format!("argument '{key}' must be a number"))),
        }
    }

    pub fn take_bool(&mut self, key: &str) -> Result<Option<bool>, PluginError> {
        match self.take(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(b)),
            Some(Value::String(s)) => match pitch_core::expressions::parse_scalar(&s) {
                Some(Value::Bool(b)) => Ok(Some(b)),
                _ => Err(PluginError::invalid(&self.plugin, format!("argument '{key}' must be a boolean"))),
            },
            Some(_) => Err(PluginError::invalid(&self.plugin, format!("argument '{key}' must be a boolean"))),
        }
    }

    /// Everything not taken yet.
    pub fn take_rest(&mut self) -> Map<String, Value> {
        std::mem::take(&mut self.values)
    }

    pub fn finish(self) -> Result<(), PluginError> {
        if self.values.is_empty() {
            return Ok(());
        }
        let names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        Err(PluginError::invalid(
            &self.plugin,
            format!("unexpected argument(s): {}", names.join(", ")),
        ))
    }
}
