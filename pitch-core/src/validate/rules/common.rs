use serde_json::Value;

use crate::expressions::{has_markers, Template};
use crate::validate::validator::Validator;

/// Every string leaf carrying markers must parse as a template.
pub(crate) fn validate_templates(v: &mut Validator, path: &str, value: &Value) {
    match value {
        Value::String(s) => validate_template_string(v, path, s),
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                validate_templates(v, &format!("{path}[{idx}]"), item);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                validate_templates(v, &format!("{path}.{key}"), item);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

pub(crate) fn validate_template_string(v: &mut Validator, path: &str, s: &str) {
    if !has_markers(s) {
        return;
    }
    if let Err(e) = Template::parse(s) {
        v.push(path, format!("invalid template: {e}"));
    }
}
