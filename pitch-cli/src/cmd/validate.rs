use std::path::Path;

use pitch_core::{load_sequence, validate_sequence, DocumentFormat, ParseError, ParsedSequence, SequenceError};
use pitch_exec::executor::{analyze_plugins, ExecutionError};
use pitch_exec::plugins::PluginRegistry;
use serde::Serialize;

use crate::cmd::config::load_registry;
use crate::exit_codes;
use crate::output::{print_error, print_result, OutputFormat};
use crate::{OutputArgs, PluginManifestArgs};

#[derive(Serialize)]
struct ValidateResult {
    valid: bool,
    format: String,
    steps: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

/// Reads and parses `path`, printing the failure and returning the exit code on error.
pub fn read_sequence(path: &Path, output: &OutputArgs) -> Result<ParsedSequence, i32> {
    match load_sequence(path) {
        Ok(parsed) => Ok(parsed),
        Err(SequenceError::Io { path, source }) => {
            print_error(
                output.format,
                output.quiet,
                &format!("failed to read {}: {source}", path.display()),
            );
            Err(exit_codes::RUNTIME_ERROR)
        }
        Err(SequenceError::Parse(err)) => {
            let message = match err {
                ParseError::Json(e) => format!("JSON parse failed: {e}"),
                ParseError::Yaml(e) => format!("YAML parse failed: {e}"),
                ParseError::UnknownFormat => "input is neither valid JSON nor valid YAML".to_string(),
            };
            print_error(output.format, output.quiet, &message);
            Err(exit_codes::VALIDATION_FAILED)
        }
        Err(SequenceError::Validation(err)) => {
            print_error(output.format, output.quiet, &err.to_string());
            Err(exit_codes::VALIDATION_FAILED)
        }
    }
}

/// Structural violations followed by unknown plugin names.
pub fn collect_errors(parsed: &ParsedSequence, registry: &PluginRegistry) -> Vec<String> {
    let mut errors: Vec<String> = match validate_sequence(&parsed.sequence) {
        Ok(()) => Vec::new(),
        Err(err) => err.violations.iter().map(|v| v.to_string()).collect(),
    };
    if let Err(ExecutionError::UnknownPlugin(names)) = analyze_plugins(&parsed.sequence, registry) {
        errors.extend(names.into_iter().map(|n| format!("plugins: unknown plugin '{n}'")));
    }
    errors
}

fn format_name(format: DocumentFormat) -> String {
    format!("{format:?}").to_lowercase()
}

pub async fn validate_cmd(path: &Path, plugins: PluginManifestArgs, output: OutputArgs) -> i32 {
    let parsed = match read_sequence(path, &output) {
        Ok(p) => p,
        Err(code) => return code,
    };
    let registry = match load_registry(&plugins) {
        Ok(r) => r,
        Err(e) => {
            print_error(output.format, output.quiet, &e.to_string());
            return exit_codes::VALIDATION_FAILED;
        }
    };

    let errors = collect_errors(&parsed, &registry);
    let result = ValidateResult {
        valid: errors.is_empty(),
        format: format_name(parsed.format),
        steps: parsed.sequence.steps.len(),
        errors: errors.clone(),
    };

    if errors.is_empty() {
        if output.format == OutputFormat::Text && !output.quiet {
            println!(
                "ok: valid sequence ({}, {} steps)",
                result.format, result.steps
            );
        } else {
            print_result(output.format, output.quiet, &result);
        }
        exit_codes::SUCCESS
    } else {
        if output.format == OutputFormat::Text && !output.quiet {
            eprintln!("error: validation failed");
            for e in &errors {
                eprintln!("- {e}");
            }
        } else {
            print_result(output.format, output.quiet, &result);
        }
        exit_codes::VALIDATION_FAILED
    }
}
