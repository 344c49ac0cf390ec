use serde_json::{Map, Value};

use crate::types::{Extensions, PluginInvocation};

/// One HTTP call plus its control-flow and plugin directives.
///
/// Request fields (`headers`, `params`, `data`, ...) are kept in `fields` as
/// written; they are merged with the sequence defaults and rendered per iteration.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Step {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_items: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_indexed_items: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_nested: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginInvocation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failfast: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_default_plugins: Option<bool>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, Value>,

    #[serde(flatten, default)]
    pub fields: Extensions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopKind {
    Items,
    IndexedItems,
    Nested,
}

impl LoopKind {
    pub fn keyword(self) -> &'static str {
        match self {
            LoopKind::Items => "with_items",
            LoopKind::IndexedItems => "with_indexed_items",
            LoopKind::Nested => "with_nested",
        }
    }
}

impl std::fmt::Display for LoopKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

impl Step {
    /// The effective loop keyword, honoring `with_items` > `with_indexed_items` > `with_nested`.
    pub fn loop_directive(&self) -> Option<(LoopKind, &Value)> {
        if let Some(v) = &self.with_items {
            return Some((LoopKind::Items, v));
        }
        if let Some(v) = &self.with_indexed_items {
            return Some((LoopKind::IndexedItems, v));
        }
        self.with_nested.as_ref().map(|v| (LoopKind::Nested, v))
    }

    /// Every loop keyword present on the step, in precedence order.
    pub fn loop_keywords(&self) -> Vec<LoopKind> {
        [
            (LoopKind::Items, self.with_items.is_some()),
            (LoopKind::IndexedItems, self.with_indexed_items.is_some()),
            (LoopKind::Nested, self.with_nested.is_some()),
        ]
        .into_iter()
        .filter_map(|(kind, present)| present.then_some(kind))
        .collect()
    }

    /// The step's own request parameters: `url`, `method` and the non-extension fields.
    pub fn request_fields(&self) -> Map<String, Value> {
        let mut out = Map::new();
        if let Some(url) = &self.url {
            out.insert("url".to_string(), Value::String(url.clone()));
        }
        if let Some(method) = &self.method {
            out.insert("method".to_string(), Value::String(method.clone()));
        }
        for (key, value) in &self.fields {
            if !key.starts_with("x-") {
                out.insert(key.clone(), value.clone());
            }
        }
        out
    }
}
