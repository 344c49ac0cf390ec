use pitch_core::{
    parse_sequence_str, validate_sequence, DocumentFormat, LoopKind, ParseError, Validate,
};
use serde_json::json;

fn minimal_valid_yaml() -> &'static str {
    r#"
base_url: http://localhost:8080/api
requests:
  headers:
    Accept: application/json
variables:
  user: alice
steps:
  - url: /users/{{ user }}
    plugins:
      - plugin: response_as_json
  - url: /items
    method: post
    json:
      name: "{{ item }}"
    with_items: [a, b]
"#
}

#[test]
fn parse_yaml_and_validate_ok() {
    let parsed = parse_sequence_str(minimal_valid_yaml(), DocumentFormat::Yaml).unwrap();
    validate_sequence(&parsed.sequence).unwrap();
    assert_eq!(parsed.sequence.steps.len(), 2);
    assert_eq!(parsed.sequence.variables["user"], json!("alice"));
}

#[test]
fn parse_auto_detects_yaml() {
    let parsed = parse_sequence_str(minimal_valid_yaml(), DocumentFormat::Auto).unwrap();
    assert_eq!(parsed.format, DocumentFormat::Yaml);
}

#[test]
fn parse_json_and_validate_ok() {
    let input = r#"
{
  "base_url": "https://example.com",
  "steps": [
    { "url": "/ping", "when": true, "plugins": [{ "plugin": "assert_http_status_code", "expect": 204 }] }
  ]
}
"#;
    let parsed = parse_sequence_str(input, DocumentFormat::Auto).unwrap();
    assert_eq!(parsed.format, DocumentFormat::Json);
    parsed.sequence.validate().unwrap();
    let plugin = &parsed.sequence.steps[0].plugins[0];
    assert_eq!(plugin.plugin, "assert_http_status_code");
    assert_eq!(plugin.arguments["expect"], json!(204));
}

#[test]
fn step_request_fields_are_kept_apart_from_keywords() {
    let parsed = parse_sequence_str(minimal_valid_yaml(), DocumentFormat::Yaml).unwrap();
    let step = &parsed.sequence.steps[1];
    let fields = step.request_fields();
    assert_eq!(fields["url"], json!("/items"));
    assert_eq!(fields["method"], json!("post"));
    assert_eq!(fields["json"], json!({"name": "{{ item }}"}));
    assert!(!fields.contains_key("with_items"));
    assert_eq!(step.loop_directive().map(|(k, _)| k), Some(LoopKind::Items));
}

#[test]
fn loop_keyword_precedence() {
    let parsed = parse_sequence_str(
        r#"
steps:
  - url: /x
    with_nested: [[1], [2]]
    with_indexed_items: [a]
"#,
        DocumentFormat::Yaml,
    )
    .unwrap();
    let step = &parsed.sequence.steps[0];
    assert_eq!(step.loop_directive().map(|(k, _)| k), Some(LoopKind::IndexedItems));
    assert_eq!(step.loop_keywords(), vec![LoopKind::IndexedItems, LoopKind::Nested]);
}

#[test]
fn empty_steps_fail_validation() {
    let parsed = parse_sequence_str("base_url: http://localhost\n", DocumentFormat::Yaml).unwrap();
    let err = validate_sequence(&parsed.sequence).unwrap_err();
    assert!(err.violations.iter().any(|v| v.path == "$.steps"));
}

#[test]
fn collects_every_violation() {
    let input = r#"
base_url: not a url
threads: 0
unknown_top: 1
requests:
  bogus: 1
steps:
  - url: /a/{{ id
    method: "GET /"
    with_items: [1]
    with_nested: [[1]]
    payload: nope
    x-note: fine
    plugins:
      - plugin: ""
      - plugin: "bad name"
"#;
    let parsed = parse_sequence_str(input, DocumentFormat::Yaml).unwrap();
    let err = validate_sequence(&parsed.sequence).unwrap_err();
    let paths: Vec<&str> = err.violations.iter().map(|v| v.path.as_str()).collect();
    for expected in [
        "$.base_url",
        "$.threads",
        "$.unknown_top",
        "$.requests.bogus",
        "$.steps[0].url",
        "$.steps[0].method",
        "$.steps[0]",
        "$.steps[0].payload",
        "$.steps[0].plugins[0].plugin",
        "$.steps[0].plugins[1].plugin",
    ] {
        assert!(paths.contains(&expected), "missing violation for {expected}: {paths:?}");
    }
    assert!(!paths.iter().any(|p| p.contains("x-note")));
}

#[test]
fn invalid_yaml_reports_yaml_error() {
    let err = parse_sequence_str("steps: [", DocumentFormat::Auto).unwrap_err();
    assert!(matches!(err, ParseError::Yaml(_)));
}

#[test]
fn sequence_concurrency_defaults() {
    let parsed = parse_sequence_str("steps:\n  - url: /\n", DocumentFormat::Yaml).unwrap();
    assert_eq!(parsed.sequence.threads(), 1);
    assert_eq!(parsed.sequence.repeat(), 1);
    assert_eq!(parsed.sequence.processes(), 1);
}
