use serde_json::Value;

/// Parses rendered text the way a YAML 1.1 loader reads a plain scalar, so that
/// `yes`, `Off` or `True` become booleans. Returns `None` for text that is not a
/// valid YAML document.
pub fn parse_scalar(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    match trimmed {
        "yes" | "Yes" | "YES" | "true" | "True" | "TRUE" | "on" | "On" | "ON" => {
            return Some(Value::Bool(true))
        }
        "no" | "No" | "NO" | "false" | "False" | "FALSE" | "off" | "Off" | "OFF" => {
            return Some(Value::Bool(false))
        }
        "" | "~" | "null" | "Null" | "NULL" => return Some(Value::Null),
        _ => {}
    }
    serde_yaml::from_str::<Value>(trimmed).ok()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn yaml_one_one_booleans() {
        assert_eq!(parse_scalar("yes"), Some(json!(true)));
        assert_eq!(parse_scalar(" Off "), Some(json!(false)));
        assert_eq!(parse_scalar("True"), Some(json!(true)));
    }

    #[test]
    fn other_scalars() {
        assert_eq!(parse_scalar("42"), Some(json!(42)));
        assert_eq!(parse_scalar(""), Some(Value::Null));
        assert_eq!(parse_scalar("~"), Some(Value::Null));
        assert_eq!(parse_scalar("hello"), Some(json!("hello")));
        assert_eq!(parse_scalar("a: [b"), None);
    }
}
