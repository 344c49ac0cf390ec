use std::collections::BTreeMap;

pub type AnyValue = serde_json::Value;

/// Fields that are not part of the document model.
///
/// Steps collect their free-form request fields here as well; validation decides
/// which keys are acceptable (`x-*` extensions are always allowed).
pub type Extensions = BTreeMap<String, serde_json::Value>;

/// Step keys that drive the executor and never reach the HTTP request.
pub const STEP_KEYWORDS: &[&str] = &[
    "plugins",
    "base_url",
    "when",
    "with_items",
    "with_indexed_items",
    "with_nested",
    "use_default_plugins",
    "failfast",
    "variables",
];

/// Request fields understood by the transport besides `url` and `method`.
pub const REQUEST_FIELDS: &[&str] = &["headers", "params", "data", "json", "cookies", "timeout"];
