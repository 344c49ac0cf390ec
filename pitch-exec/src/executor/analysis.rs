use std::collections::BTreeSet;

use pitch_core::expressions::has_markers;
use pitch_core::Sequence;

use crate::executor::ExecutionError;
use crate::plugins::{step_plugins, PluginRegistry};

/// Checks every literal plugin name against the registry before anything runs.
///
/// Templated names can only be checked once rendered, by the pipeline.
pub fn analyze_plugins(sequence: &Sequence, registry: &PluginRegistry) -> Result<(), ExecutionError> {
    let mut unknown = BTreeSet::new();
    for step in &sequence.steps {
        for invocation in step_plugins(sequence, step) {
            let name = invocation.plugin.trim();
            if !has_markers(name) && !registry.is_known(name) {
                unknown.insert(name.to_string());
            }
        }
    }
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(ExecutionError::UnknownPlugin(unknown.into_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use pitch_core::{PluginInvocation, Step};

    use super::*;

    #[test]
    fn reports_each_unknown_name_once() {
        let step = Step {
            plugins: vec![
                PluginInvocation::new("does_not_exist"),
                PluginInvocation::new("request_delay"),
                PluginInvocation::new("{{ chosen_plugin }}"),
            ],
            ..Step::default()
        };
        let sequence = Sequence {
            steps: vec![step.clone(), step],
            plugins: vec![PluginInvocation::new("also_missing")],
            ..Sequence::default()
        };
        let err = analyze_plugins(&sequence, &PluginRegistry::with_builtins()).unwrap_err();
        match err {
            ExecutionError::UnknownPlugin(names) => assert_eq!(names, ["also_missing", "does_not_exist"]),
            other => panic!("unexpected error: {other}"),
        }
    }
}
