use assert_cmd::Command;
use tempfile::NamedTempFile;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut f = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("tempfile");
    std::io::Write::write_all(&mut f, contents.as_bytes()).expect("write");
    f
}

fn pitch() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pitch"));
    cmd.env_remove("PITCH_PROCESSES")
        .env_remove("PITCH_THREADS")
        .env_remove("PITCH_LOG")
        .env_remove("RUST_LOG");
    cmd
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

const SKIPPED: &str = r#"
base_url: http://127.0.0.1:1
steps:
  - url: /never
    when: false
"#;

// Port 1 on loopback refuses connections, so the request fails without leaving the host.
const REFUSED: &str = r#"
base_url: http://127.0.0.1:1
use_default_plugins: true
steps:
  - url: /down
"#;

#[test]
fn validate_returns_0_for_valid_doc() {
    let f = write_temp(SKIPPED);
    let assert = pitch()
        .args(["validate", f.path().to_string_lossy().as_ref()])
        .assert()
        .success();
    assert!(stdout(assert.get_output()).contains("ok: valid sequence (yaml, 1 steps)"));
}

#[test]
fn validate_json_output() {
    let f = write_temp(SKIPPED);
    let assert = pitch()
        .args(["validate", "--format", "json", f.path().to_string_lossy().as_ref()])
        .assert()
        .success();
    let result: serde_json::Value = serde_json::from_str(stdout(assert.get_output()).trim()).expect("json");
    assert_eq!(result["valid"], serde_json::json!(true));
    assert_eq!(result["steps"], serde_json::json!(1));
}

#[test]
fn validate_returns_2_for_invalid_doc() {
    let f = write_temp("base_url: not-a-url\nsteps: []\n");
    let assert = pitch()
        .args(["validate", f.path().to_string_lossy().as_ref()])
        .assert()
        .code(2);
    let err = stderr(assert.get_output());
    assert!(err.contains("$.base_url"));
    assert!(err.contains("$.steps"));
}

#[test]
fn validate_reports_unknown_plugins() {
    let doc = r#"
steps:
  - url: http://127.0.0.1:1/
    plugins:
      - plugin: no_such_plugin
"#;
    let f = write_temp(doc);
    let assert = pitch()
        .args(["validate", f.path().to_string_lossy().as_ref()])
        .assert()
        .code(2);
    assert!(stderr(assert.get_output()).contains("unknown plugin 'no_such_plugin'"));
}

#[test]
fn missing_file_is_a_runtime_error() {
    pitch().args(["validate", "/definitely/not/here.yaml"]).assert().code(4);
}

#[test]
fn plugins_list_shows_signatures() {
    let assert = pitch().args(["plugins", "list"]).assert().success();
    let out = stdout(assert.get_output());
    assert!(out.contains("request plugins:"));
    assert!(out.contains("response plugins:"));
    assert!(out.contains("request_delay(seconds)"));
    assert!(out.contains("json_file_output(filename, create_dirs=true)"));
}

#[test]
fn plugins_list_filters_by_phase() {
    let assert = pitch()
        .args(["plugins", "list", "--phase", "request", "--format", "json"])
        .assert()
        .success();
    let entries: Vec<serde_json::Value> = serde_json::from_str(stdout(assert.get_output()).trim()).expect("json");
    assert!(!entries.is_empty());
    assert!(entries.iter().all(|e| e["phase"] == "request"));
    pitch().args(["plugins", "list", "--phase", "sideways"]).assert().code(2);
}

#[test]
fn run_with_only_skipped_steps_succeeds() {
    let f = write_temp(SKIPPED);
    let assert = pitch()
        .args(["run", "--events", "none", f.path().to_string_lossy().as_ref()])
        .assert()
        .success();
    assert!(stdout(assert.get_output()).contains("ok: 1 run(s) succeeded, 0 request(s) sent"));
}

#[test]
fn run_summary_as_json() {
    let f = write_temp(SKIPPED);
    let assert = pitch()
        .args([
            "run",
            "--events",
            "none",
            "--format",
            "json",
            "--threads",
            "2",
            "--repeat",
            "3",
            f.path().to_string_lossy().as_ref(),
        ])
        .assert()
        .success();
    let result: serde_json::Value = serde_json::from_str(stdout(assert.get_output()).trim()).expect("json");
    assert_eq!(result["runs"], serde_json::json!(3));
    assert_eq!(result["failed"], serde_json::json!(0));
}

#[test]
fn run_refuses_unknown_plugins_before_sending() {
    let doc = r#"
steps:
  - url: http://127.0.0.1:1/
    plugins:
      - plugin: no_such_plugin
"#;
    let f = write_temp(doc);
    pitch()
        .args(["run", f.path().to_string_lossy().as_ref()])
        .assert()
        .code(2);
}

#[test]
fn failed_status_assertion_exits_3() {
    let f = write_temp(REFUSED);
    let assert = pitch()
        .args(["run", "--events", "none", "--timeout", "5", f.path().to_string_lossy().as_ref()])
        .assert()
        .code(3);
    let err = stderr(assert.get_output());
    assert!(err.contains("1 of 1 run(s) failed"));
    assert!(err.contains("[Process=01,Thread=01,Loop=0001]"));
}

#[test]
fn set_overrides_reach_templates() {
    let doc = r#"
base_url: http://127.0.0.1:1
variables:
  name: alice
steps:
  - url: /greet
    plugins:
      - plugin: request_logger
        message: "hello {{ name }}"
"#;
    let f = write_temp(doc);
    let assert = pitch()
        .args([
            "run",
            "--events",
            "none",
            "--timeout",
            "5",
            "--set",
            "name=bob",
            f.path().to_string_lossy().as_ref(),
        ])
        .assert()
        .success();
    assert!(stderr(assert.get_output()).contains("hello bob"));
}

#[test]
fn processes_fan_out_into_children() {
    let f = write_temp(SKIPPED);
    let assert = pitch()
        .args([
            "run",
            "--events",
            "none",
            "--processes",
            "2",
            f.path().to_string_lossy().as_ref(),
        ])
        .assert()
        .success();
    assert_eq!(stdout(assert.get_output()).matches("ok: 1 run(s) succeeded").count(), 2);
}

#[test]
fn bad_set_pair_is_rejected() {
    let f = write_temp(SKIPPED);
    pitch()
        .args(["run", "--set", "novalue", f.path().to_string_lossy().as_ref()])
        .assert()
        .code(2);
}
