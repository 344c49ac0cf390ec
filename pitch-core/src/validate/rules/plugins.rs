use crate::types::PluginInvocation;
use crate::validate::rules::common::{validate_template_string, validate_templates};
use crate::validate::validator::{Validator, PLUGIN_NAME_RE};

pub(crate) fn validate_plugin_list(v: &mut Validator, path: &str, plugins: &[PluginInvocation]) {
    for (idx, invocation) in plugins.iter().enumerate() {
        let ppath = format!("{path}[{idx}]");
        let name = invocation.plugin.trim();
        if name.is_empty() {
            v.push(format!("{ppath}.plugin"), "must not be empty");
        } else if name.contains("{{") {
            validate_template_string(v, &format!("{ppath}.plugin"), name);
        } else if !PLUGIN_NAME_RE.is_match(name) {
            v.push(
                format!("{ppath}.plugin"),
                "plugin name must match ^[A-Za-z_][A-Za-z0-9_]*$",
            );
        }
        for (key, value) in &invocation.arguments {
            validate_templates(v, &format!("{ppath}.{key}"), value);
        }
    }
}
