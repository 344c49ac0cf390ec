//! Process exit codes, stable for scripts and CI.

pub const SUCCESS: i32 = 0;
/// Unreadable document, failed validation, unknown plugin or bad plugin manifest.
pub const VALIDATION_FAILED: i32 = 2;
/// At least one run ended with an error.
pub const RUN_FAILED: i32 = 3;
pub const RUNTIME_ERROR: i32 = 4;
