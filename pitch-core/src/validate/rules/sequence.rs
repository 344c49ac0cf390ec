use crate::expressions::has_markers;
use crate::types::{Sequence, REQUEST_FIELDS};
use crate::validate::rules::{common::validate_templates, plugins, step};
use crate::validate::validator::{Validator, ABSOLUTE_URL_RE};

pub(crate) fn validate_sequence(v: &mut Validator, sequence: &Sequence) {
    v.validate_extensions("$", &sequence.extensions);
    v.validate_positive("$.threads", sequence.threads);
    v.validate_positive("$.repeat", sequence.repeat);
    v.validate_positive("$.processes", sequence.processes);

    let base_url = sequence.base_url.trim();
    if !base_url.is_empty() && !has_markers(base_url) && !ABSOLUTE_URL_RE.is_match(base_url) {
        v.push("$.base_url", "must be an absolute http(s) URL");
    }

    for (key, value) in &sequence.requests {
        let path = format!("$.requests.{key}");
        if key != "url" && key != "method" && !REQUEST_FIELDS.contains(&key.as_str()) {
            v.push(path, "unknown request field");
            continue;
        }
        validate_templates(v, &path, value);
    }

    for (key, value) in &sequence.variables {
        validate_templates(v, &format!("$.variables.{key}"), value);
    }

    plugins::validate_plugin_list(v, "$.plugins", &sequence.plugins);

    if sequence.steps.is_empty() {
        v.push("$.steps", "must contain at least one step");
    }
    for (idx, s) in sequence.steps.iter().enumerate() {
        step::validate_step(v, s, &format!("$.steps[{idx}]"));
    }
}
