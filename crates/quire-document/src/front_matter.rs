//! Front-matter splitting and YAML parsing.
//!
//! A front-matter block starts on the very first line with `---` and ends at
//! the next line that is exactly `---` (or `...`). Anything else, including
//! a file that opens with `---` but never closes it, has no front matter.

use serde_json::{Map, Value};

/// Front matter parse failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct FrontMatterError(String);

/// Parsed front-matter block and the body that follows it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontMatter {
    /// Declared key/value pairs.
    pub data: Map<String, Value>,
    /// Body with leading whitespace trimmed.
    pub content: String,
}

/// Split raw text into its YAML block and body.
///
/// Returns `None` when the text has no complete front-matter block.
pub fn split(raw: &str) -> Option<(&str, &str)> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let first_end = raw.find('\n')?;
    if raw[..first_end].trim_end() != "---" {
        return None;
    }

    let yaml_start = first_end + 1;
    let mut offset = yaml_start;
    for line in raw[yaml_start..].split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return Some((&raw[yaml_start..offset], &raw[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Whether `raw` opens with a complete front-matter block.
pub fn has_front_matter(raw: &str) -> bool {
    split(raw).is_some()
}

/// Parse YAML front matter into a JSON-like mapping.
///
/// Empty content returns an empty mapping.
///
/// # Errors
///
/// Returns an error if the YAML is malformed or is not a mapping.
pub fn parse_yaml(yaml: &str) -> Result<Map<String, Value>, FrontMatterError> {
    let trimmed = yaml.trim();
    if trimmed.is_empty() {
        return Ok(Map::new());
    }

    match serde_yaml::from_str::<Value>(trimmed) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => Ok(Map::new()),
        Ok(other) => Err(FrontMatterError(format!(
            "Front matter must be a mapping, found {}",
            json_type(&other)
        ))),
        Err(e) => Err(FrontMatterError(format!("Invalid YAML: {e}"))),
    }
}

/// Parse a whole file: front matter (if any) plus body.
///
/// Text without a front-matter block is all body.
///
/// # Errors
///
/// Returns an error if a front-matter block exists but is malformed.
pub fn parse(raw: &str) -> Result<FrontMatter, FrontMatterError> {
    match split(raw) {
        Some((yaml, body)) => Ok(FrontMatter {
            data: parse_yaml(yaml)?,
            content: body.trim_start().to_owned(),
        }),
        None => Ok(FrontMatter {
            data: Map::new(),
            content: raw.strip_prefix('\u{feff}').unwrap_or(raw).to_owned(),
        }),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
