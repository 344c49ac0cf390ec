mod common;
mod plugin;
mod sequence;
mod step;

pub use common::{AnyValue, Extensions, REQUEST_FIELDS, STEP_KEYWORDS};
pub use plugin::PluginInvocation;
pub use sequence::Sequence;
pub use step::{LoopKind, Step};
