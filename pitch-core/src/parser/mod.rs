use std::path::Path;

use crate::error::{ParseError, SequenceError};
use crate::types::Sequence;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
    Auto,
}

#[derive(Debug, Clone)]
pub struct ParsedSequence {
    pub sequence: Sequence,
    pub format: DocumentFormat,
}

pub fn parse_sequence_str(input: &str, format: DocumentFormat) -> Result<ParsedSequence, ParseError> {
    match format {
        DocumentFormat::Json => Ok(ParsedSequence {
            sequence: serde_json::from_str::<Sequence>(input)?,
            format,
        }),
        DocumentFormat::Yaml => Ok(ParsedSequence {
            sequence: serde_yaml::from_str::<Sequence>(input)?,
            format,
        }),
        DocumentFormat::Auto => parse_sequence_auto(input),
    }
}

/// Reads and parses a sequence file, picking the format from the file extension
/// (`.json`, `.yml`/`.yaml`) and auto-detecting otherwise.
pub fn load_sequence(path: &Path) -> Result<ParsedSequence, SequenceError> {
    let content = std::fs::read_to_string(path).map_err(|source| SequenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let format = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => DocumentFormat::Json,
        Some("yml") | Some("yaml") => DocumentFormat::Yaml,
        _ => DocumentFormat::Auto,
    };
    Ok(parse_sequence_str(&content, format)?)
}

fn parse_sequence_auto(input: &str) -> Result<ParsedSequence, ParseError> {
    // JSON always starts with `{` after trimming; YAML is a superset so it is the fallback.
    let trimmed = input.trim_start();
    if trimmed.is_empty() {
        return Err(ParseError::UnknownFormat);
    }
    if trimmed.starts_with('{') {
        return match serde_json::from_str::<Sequence>(input) {
            Ok(sequence) => Ok(ParsedSequence {
                sequence,
                format: DocumentFormat::Json,
            }),
            Err(e) => match serde_yaml::from_str::<Sequence>(input) {
                Ok(sequence) => Ok(ParsedSequence {
                    sequence,
                    format: DocumentFormat::Yaml,
                }),
                Err(_) => Err(ParseError::Json(e)),
            },
        };
    }

    match serde_yaml::from_str::<Sequence>(input) {
        Ok(sequence) => Ok(ParsedSequence {
            sequence,
            format: DocumentFormat::Yaml,
        }),
        Err(e) => {
            if let Ok(sequence) = serde_json::from_str::<Sequence>(input) {
                return Ok(ParsedSequence {
                    sequence,
                    format: DocumentFormat::Json,
                });
            }
            Err(ParseError::Yaml(e))
        }
    }
}
