mod support;

use pitch_exec::context::Phase;
use pitch_exec::plugins::command::{register_command_plugins, CommandPluginSpec};
use pitch_exec::ExecutionError;
use serde_json::json;

use support::{Harness, MockTransport};

fn yaml_path(path: &std::path::Path) -> String {
    path.display().to_string().replace('\\', "/")
}

#[tokio::test]
async fn file_plugins_read_and_write_the_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("payload.txt");
    std::fs::write(&input, "from disk").unwrap();
    let output = dir.path().join("nested/out/body.json");

    let transport = MockTransport::new(|_| {
        Ok(pitch_exec::executor::HttpResponse::new(200, r#"{"ok": true}"#))
    });
    let harness = Harness::new(transport);
    let yaml = format!(
        r#"
base_url: http://api.test
steps:
  - url: /upload
    method: POST
    plugins:
      - plugin: file_input
        filename: "{input}"
      - plugin: pre_register
        body: request.plugins.file_input
      - plugin: response_as_json
      - plugin: json_file_output
        filename: "{output}"
"#,
        input = yaml_path(&input),
        output = yaml_path(&output),
    );
    let (result, executor) = harness.run(&yaml).await;

    result.unwrap();
    assert_eq!(executor.context().variables["body"], json!("from disk"));
    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written, json!({"ok": true}));
}

#[tokio::test]
async fn missing_input_file_is_a_plugin_error() {
    let harness = Harness::new(MockTransport::ok());
    let (result, _) = harness
        .run(
            r#"
base_url: http://api.test
steps:
  - url: /x
    plugins:
      - plugin: file_input
        filename: /definitely/not/here.txt
"#,
        )
        .await;
    match result {
        Err(ExecutionError::Plugin { name, phase, .. }) => {
            assert_eq!(name, "file_input");
            assert_eq!(phase, Phase::Request);
        }
        other => panic!("expected plugin error, got {other:?}"),
    }
    assert!(harness.transport.paths().is_empty());
}

#[tokio::test]
async fn logger_appends_formatted_lines_to_its_handler() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("requests.log");
    let harness = Harness::new(MockTransport::ok());
    let yaml = format!(
        r#"
base_url: http://api.test
steps:
  - url: "/item/{{{{ item }}}}"
    with_items: [1, 2]
    plugins:
      - plugin: request_logger
        message: "sending {{{{ request.url }}}}"
        handler:
          filename: "{log}"
        formatter:
          fmt: "%(levelname)s %(message)s"
"#,
        log = yaml_path(&log),
    );
    let (result, _) = harness.run(&yaml).await;
    result.unwrap();

    let contents = std::fs::read_to_string(&log).unwrap();
    assert_eq!(
        contents,
        "INFO sending http://api.test/item/1\nINFO sending http://api.test/item/2\n"
    );
}

#[tokio::test]
async fn misspelled_argument_is_rejected() {
    let harness = Harness::new(MockTransport::ok());
    let (result, _) = harness
        .run(
            r#"
base_url: http://api.test
steps:
  - url: /x
    plugins:
      - plugin: request_delay
        secs: 1
"#,
        )
        .await;
    assert!(matches!(result, Err(ExecutionError::Plugin { .. })), "{result:?}");
}

#[tokio::test]
async fn templated_plugin_names_resolve_per_iteration() {
    let harness = Harness::new(MockTransport::ok());
    let (result, executor) = harness
        .run(
            r#"
base_url: http://api.test
variables:
  register_with: post_register
steps:
  - url: /x
    plugins:
      - plugin: "{{ register_with }}"
        seen: "{{ response.status_code }}"
"#,
        )
        .await;
    result.unwrap();
    assert_eq!(executor.context().variables["seen"], json!(200));

    let (result, executor) = harness
        .run(
            r#"
base_url: http://api.test
variables:
  chosen: nothing_by_that_name
steps:
  - url: /x
    plugins:
      - plugin: "{{ chosen }}"
"#,
        )
        .await;
    result.unwrap();
    assert!(executor.context().plugins.request.is_empty());
    assert!(executor.context().plugins.response.is_empty());
    assert_eq!(harness.transport.paths().len(), 2);
}

#[cfg(unix)]
#[tokio::test]
async fn command_plugins_merge_their_json_output() {
    let mut harness = Harness::new(MockTransport::ok());
    register_command_plugins(
        &mut harness.registry,
        Phase::Request,
        vec![CommandPluginSpec {
            name: "sign".into(),
            description: "test signer".into(),
            command: vec![
                "sh".into(),
                "-c".into(),
                r#"cat > /dev/null; echo '{"signature": "s3cr3t"}'"#.into(),
            ],
        }],
    );
    let (result, executor) = harness
        .run(
            r#"
base_url: http://api.test
steps:
  - url: /signed
    plugins:
      - plugin: sign
        key: abc
      - plugin: add_header
        header: X-Signature
        value: "{{ signature }}"
"#,
        )
        .await;

    result.unwrap();
    assert_eq!(executor.context().variables["signature"], json!("s3cr3t"));
    assert_eq!(harness.transport.requests()[0].headers["X-Signature"], "s3cr3t");
}
