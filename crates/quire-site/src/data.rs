//! Data-file parsing for `site.data`.
//!
//! YAML and JSON files parse to nested values. CSV and TSV files parse to a
//! list of row objects keyed by the header row: an empty header cell becomes
//! `column_<n>` (1-based position among all columns), extra cells are
//! dropped and missing cells become empty strings.

use std::path::Path;

use serde_json::{Map, Value};

use crate::error::DataError;

/// Extensions recognised in the data directory.
pub const DATA_EXTENSIONS: [&str; 5] = ["yml", "yaml", "json", "csv", "tsv"];

/// Whether `path` has a data-file extension.
pub fn is_data_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| DATA_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

/// Parse data-file content according to its extension.
///
/// # Errors
///
/// Returns [`DataError`] when the content is malformed or the extension has
/// no reader.
pub fn parse_data(extension: &str, content: &str) -> Result<Value, DataError> {
    match extension.to_lowercase().as_str() {
        "yml" | "yaml" => {
            if content.trim().is_empty() {
                return Ok(Value::Null);
            }
            Ok(serde_yaml::from_str(content)?)
        }
        "json" => Ok(serde_json::from_str(content)?),
        "csv" => parse_delimited(content, b','),
        "tsv" => parse_delimited(content, b'\t'),
        other => Err(DataError::Unsupported(other.to_owned())),
    }
}

fn parse_delimited(content: &str, delimiter: u8) -> Result<Value, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let name = name.trim();
            if name.is_empty() {
                format!("column_{}", i + 1)
            } else {
                name.to_owned()
            }
        })
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Map<String, Value> = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let cell = record.get(i).unwrap_or_default();
                (header.clone(), Value::String(cell.to_owned()))
            })
            .collect();
        rows.push(Value::Object(row));
    }
    Ok(Value::Array(rows))
}

/// Key path for a data file: parent directories, then the file stem.
///
/// `team/members.yml` relative to the data directory gives
/// `["team", "members"]`.
pub fn key_path(relative: &Path) -> Vec<String> {
    let mut keys: Vec<String> = relative
        .parent()
        .into_iter()
        .flat_map(Path::components)
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if let Some(stem) = relative.file_stem() {
        keys.push(stem.to_string_lossy().into_owned());
    }
    keys
}

/// Insert `value` at `keys` without replacing anything already present.
///
/// Intermediate objects are created as needed. Returns `false` when an
/// existing value blocked the insert.
pub fn insert_missing(map: &mut Map<String, Value>, keys: &[String], value: Value) -> bool {
    let Some((last, parents)) = keys.split_last() else {
        return false;
    };

    let mut current = map;
    for key in parents {
        let entry = current
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        match entry {
            Value::Object(child) => current = child,
            _ => return false,
        }
    }

    if current.contains_key(last) {
        return false;
    }
    current.insert(last.clone(), value);
    true
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_parse_yaml_and_json() {
        assert_eq!(
            parse_data("yml", "name: Ada\nlangs: [rust]").unwrap(),
            json!({"name": "Ada", "langs": ["rust"]})
        );
        assert_eq!(parse_data("json", r#"{"a": 1}"#).unwrap(), json!({"a": 1}));
        assert_eq!(parse_data("yaml", "").unwrap(), Value::Null);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(parse_data("yml", "a: [b"), Err(DataError::Yaml(_))));
        assert!(matches!(parse_data("json", "{"), Err(DataError::Json(_))));
        assert!(matches!(parse_data("xml", "<a/>"), Err(DataError::Unsupported(_))));
    }

    #[test]
    fn test_csv_rows_keyed_by_header() {
        let value = parse_data("csv", "name,role\nAda,admin\nGrace,dev\n").unwrap();
        assert_eq!(
            value,
            json!([
                {"name": "Ada", "role": "admin"},
                {"name": "Grace", "role": "dev"}
            ])
        );
    }

    #[test]
    fn test_csv_empty_header_is_positional() {
        let value = parse_data("csv", "name,,role\nAda,x,admin\n").unwrap();
        assert_eq!(value, json!([{"name": "Ada", "column_2": "x", "role": "admin"}]));
    }

    #[test]
    fn test_csv_extra_and_missing_cells() {
        let value = parse_data("csv", "a,b\n1,2,3\n4\n").unwrap();
        assert_eq!(value, json!([{"a": "1", "b": "2"}, {"a": "4", "b": ""}]));
    }

    #[test]
    fn test_tsv() {
        let value = parse_data("tsv", "a\tb\n1\t2\n").unwrap();
        assert_eq!(value, json!([{"a": "1", "b": "2"}]));
    }

    #[test]
    fn test_key_path() {
        assert_eq!(key_path(&PathBuf::from("team/members.yml")), vec!["team", "members"]);
        assert_eq!(key_path(&PathBuf::from("authors.json")), vec!["authors"]);
    }

    #[test]
    fn test_insert_missing_keeps_existing() {
        let mut map = Map::new();
        map.insert("github".to_owned(), json!({"seeded": true}));

        assert!(!insert_missing(&mut map, &["github".to_owned()], json!({"file": true})));
        assert!(insert_missing(
            &mut map,
            &["team".to_owned(), "members".to_owned()],
            json!(["a"])
        ));

        assert_eq!(map.get("github"), Some(&json!({"seeded": true})));
        assert_eq!(map.get("team"), Some(&json!({"members": ["a"]})));
    }

    #[test]
    fn test_insert_missing_blocked_by_scalar() {
        let mut map = Map::new();
        map.insert("team".to_owned(), json!("flat"));
        assert!(!insert_missing(
            &mut map,
            &["team".to_owned(), "members".to_owned()],
            json!([])
        ));
    }

    #[test]
    fn test_is_data_file() {
        assert!(is_data_file(Path::new("a/b.YML")));
        assert!(is_data_file(Path::new("a.tsv")));
        assert!(!is_data_file(Path::new("a.txt")));
    }
}
