use pitch_core::expressions::value::to_text;
use pitch_core::{PluginInvocation, Sequence, Step};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::executor::events::{Event, EventKind, EventSink};
use crate::executor::ExecutionError;
use crate::plugins::{PluginArgs, PluginError, PluginRecord, PluginRegistry};

/// Prepended to a step's list when `use_default_plugins` is on.
pub const DEFAULT_PLUGINS: &[&str] = &["response_as_json", "assert_http_status_code"];

/// Effective plugin list of a step: defaults, then sequence plugins, then the step's own.
pub fn step_plugins(sequence: &Sequence, step: &Step) -> Vec<PluginInvocation> {
    let use_defaults = step
        .use_default_plugins
        .or(sequence.use_default_plugins)
        .unwrap_or(false);
    let mut out: Vec<PluginInvocation> = Vec::new();
    if use_defaults {
        out.extend(DEFAULT_PLUGINS.iter().map(|name| PluginInvocation::new(*name)));
    }
    out.extend(sequence.plugins.iter().cloned());
    out.extend(step.plugins.iter().cloned());
    out
}

/// Runs the invocations registered for the context's current phase, in order.
///
/// Names not registered for the current phase are skipped. A name known to no
/// phase at all can only get here through a template and is logged as a warning.
pub async fn execute_plugins(
    ctx: &mut ExecutionContext,
    invocations: &[PluginInvocation],
    registry: &PluginRegistry,
    events: &dyn EventSink,
    run_id: Uuid,
) -> Result<(), ExecutionError> {
    let phase = ctx
        .phase
        .ok_or_else(|| ExecutionError::InvalidPluginPhase("none".to_string()))?;
    let step = ctx.step.as_ref().map(|s| s.index).unwrap_or_default();

    for invocation in invocations {
        let name = {
            let ns = ctx.namespace();
            to_text(&ctx.renderer().render_str(&invocation.plugin, &ns)?)
        };
        let Some(factory) = registry.lookup(phase, &name) else {
            if !registry.is_known(&name) {
                warn!(plugin = %name, %phase, step, "{} skipping unknown plugin", ctx.instance().prefix());
            }
            continue;
        };

        let arguments = match ctx.render(&Value::Object(invocation.arguments.clone()))? {
            Value::Object(map) => map,
            _ => Default::default(),
        };
        let mut instance = factory(PluginArgs::new(name.clone(), arguments)).map_err(|source| {
            ExecutionError::Plugin {
                name: name.clone(),
                phase,
                source,
            }
        })?;

        let instance_info = ctx.instance();
        events
            .emit(Event::new(
                run_id,
                instance_info,
                EventKind::PluginStarted { step, phase, plugin: name.clone() },
            ))
            .await;
        debug!(plugin = %name, %phase, step, "{} executing plugin", instance_info.prefix());

        let outcome = instance.execute(ctx).await;
        events
            .emit(Event::new(
                run_id,
                instance_info,
                EventKind::PluginFinished {
                    step,
                    phase,
                    plugin: name.clone(),
                    ok: outcome.is_ok(),
                },
            ))
            .await;

        match outcome {
            Ok(()) => {}
            Err(PluginError::Stop(message)) => return Err(ExecutionError::Stopped(message)),
            Err(source) => {
                return Err(ExecutionError::Plugin { name, phase, source });
            }
        }

        ctx.plugins.phase_mut(phase).push(PluginRecord { name, phase, instance });
    }
    Ok(())
}
