use std::collections::BTreeMap;

use pitch_core::expressions::value::to_text;
use serde_json::{Map, Value};

use crate::executor::http::HttpRequest;
use crate::executor::ExecutionError;

/// Deep merge: nested mappings merge key-wise, anything else in `overrides` wins.
pub fn merge_maps(base: &Map<String, Value>, overrides: &Map<String, Value>) -> Map<String, Value> {
    let mut out = base.clone();
    for (key, value) in overrides {
        let merged = match (out.get(key), value) {
            (Some(Value::Object(a)), Value::Object(b)) => Value::Object(merge_maps(a, b)),
            _ => value.clone(),
        };
        out.insert(key.clone(), merged);
    }
    out
}

/// Joins a step URL onto the base URL; a URL that already carries a scheme is used as-is.
pub fn compose_url(base_url: &str, url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        if !parsed.cannot_be_a_base() {
            return url.to_string();
        }
    }
    if url.is_empty() {
        return base_url.to_string();
    }
    if base_url.is_empty() {
        return url.to_string();
    }
    format!("{}/{}", base_url.trim_end_matches('/'), url.trim_start_matches('/'))
}

/// Turns a rendered request mapping into a request descriptor.
pub fn build_request(base_url: &str, fields: &Map<String, Value>) -> Result<HttpRequest, ExecutionError> {
    let url = match fields.get("url") {
        Some(Value::Null) | None => String::new(),
        Some(v) => to_text(v),
    };
    let method = match fields.get("method") {
        Some(Value::Null) | None => "GET".to_string(),
        Some(v) => to_text(v).to_ascii_uppercase(),
    };

    let mut request = HttpRequest::new(method, compose_url(base_url, &url));
    request.headers = string_map(fields, "headers")?;
    request.cookies = string_map(fields, "cookies")?;
    request.params = match fields.get("params") {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::Null) | None => Map::new(),
        Some(_) => return Err(invalid("params must be a mapping")),
    };
    request.data = fields.get("data").filter(|v| !v.is_null()).cloned();
    request.json = fields.get("json").filter(|v| !v.is_null()).cloned();
    request.timeout = match fields.get("timeout") {
        Some(Value::Null) | None => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => Some(
            s.trim()
                .parse::<f64>()
                .map_err(|_| invalid(format!("timeout must be a number, got '{s}'")))?,
        ),
        Some(_) => return Err(invalid("timeout must be a number")),
    };
    Ok(request)
}

fn string_map(fields: &Map<String, Value>, key: &str) -> Result<BTreeMap<String, String>, ExecutionError> {
    match fields.get(key) {
        Some(Value::Object(map)) => Ok(map
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), to_text(v)))
            .collect()),
        Some(Value::Null) | None => Ok(BTreeMap::new()),
        Some(_) => Err(invalid(format!("{key} must be a mapping"))),
    }
}

fn invalid(message: impl Into<String>) -> ExecutionError {
    ExecutionError::InvalidRequest(message.into())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn compose_url_joins_or_overrides() {
        assert_eq!(compose_url("http://host/api", "/users"), "http://host/api/users");
        assert_eq!(compose_url("http://host/api/", "users"), "http://host/api/users");
        assert_eq!(compose_url("http://host", "http://other/x"), "http://other/x");
        assert_eq!(compose_url("http://host", ""), "http://host");
        assert_eq!(compose_url("", "/only"), "/only");
    }

    #[test]
    fn merge_is_deep_and_step_wins() {
        let defaults = map(json!({"headers": {"Accept": "json", "X-Env": "dev"}, "timeout": 5}));
        let step = map(json!({"headers": {"X-Env": "prod"}, "url": "/a"}));
        assert_eq!(
            Value::Object(merge_maps(&defaults, &step)),
            json!({"headers": {"Accept": "json", "X-Env": "prod"}, "timeout": 5, "url": "/a"})
        );
    }

    #[test]
    fn build_request_reads_every_field() {
        let fields = map(json!({
            "url": "/users",
            "method": "post",
            "headers": {"X-Count": 3},
            "params": {"q": "x"},
            "json": {"a": 1},
            "timeout": "2.5"
        }));
        let request = build_request("http://host/api", &fields).unwrap();
        assert_eq!(request.method, "POST");
        assert_eq!(request.url, "http://host/api/users");
        assert_eq!(request.headers["X-Count"], "3");
        assert_eq!(request.params["q"], json!("x"));
        assert_eq!(request.json, Some(json!({"a": 1})));
        assert_eq!(request.timeout, Some(2.5));

        let defaulted = build_request("http://host", &Map::new()).unwrap();
        assert_eq!((defaulted.method.as_str(), defaulted.url.as_str()), ("GET", "http://host"));

        assert!(build_request("http://host", &map(json!({"headers": "nope"}))).is_err());
    }
}
