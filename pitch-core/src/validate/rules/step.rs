use serde_json::Value;

use crate::expressions::has_markers;
use crate::types::{LoopKind, Step, REQUEST_FIELDS};
use crate::validate::rules::{
    common::{validate_template_string, validate_templates},
    plugins,
};
use crate::validate::validator::{Validator, METHOD_RE};

pub(crate) fn validate_step(v: &mut Validator, step: &Step, path: &str) {
    if let Some(url) = &step.url {
        validate_template_string(v, &format!("{path}.url"), url);
    }
    if let Some(base_url) = &step.base_url {
        validate_template_string(v, &format!("{path}.base_url"), base_url);
    }

    if let Some(method) = &step.method {
        let mpath = format!("{path}.method");
        if has_markers(method) {
            validate_template_string(v, &mpath, method);
        } else if !METHOD_RE.is_match(method.trim()) {
            v.push(mpath, "must be an HTTP method name");
        }
    }

    match &step.when {
        None | Some(Value::Bool(_)) | Some(Value::Null) => {}
        Some(Value::String(s)) => validate_template_string(v, &format!("{path}.when"), s),
        Some(_) => v.push(format!("{path}.when"), "must be a boolean or an expression string"),
    }

    let loops = step.loop_keywords();
    if loops.len() > 1 {
        let names: Vec<&str> = loops.iter().map(|k| k.keyword()).collect();
        v.push(
            path,
            format!("only one loop keyword may be used, found {}", names.join(", ")),
        );
    }
    if let Some((kind, value)) = step.loop_directive() {
        let lpath = format!("{path}.{}", kind.keyword());
        if kind == LoopKind::Nested && !matches!(value, Value::Array(_) | Value::String(_)) {
            v.push(&lpath, "must be a list of collections or an expression string");
        }
        validate_templates(v, &lpath, value);
    }

    for (key, value) in &step.fields {
        if key.starts_with("x-") {
            continue;
        }
        let fpath = format!("{path}.{key}");
        if !REQUEST_FIELDS.contains(&key.as_str()) {
            v.push(fpath, "unknown field");
            continue;
        }
        validate_templates(v, &fpath, value);
    }

    for (key, value) in &step.variables {
        validate_templates(v, &format!("{path}.variables.{key}"), value);
    }

    plugins::validate_plugin_list(v, &format!("{path}.plugins"), &step.plugins);
}
