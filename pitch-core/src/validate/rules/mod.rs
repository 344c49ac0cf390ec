pub(crate) mod common;
pub(crate) mod plugins;
pub(crate) mod sequence;
pub(crate) mod step;
