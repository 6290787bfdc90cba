//! Non-document files copied verbatim to the destination.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use quire_document::date::format_timestamp;
use quire_document::relative_path;
use serde_json::{Map, Value};

use crate::url::escape_path;

/// Descriptor of a static file.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticFile {
    /// Absolute source path.
    pub path: PathBuf,
    /// Path relative to the site source.
    pub relative_path: String,
    /// File name with extension.
    pub name: String,
    /// File name without extension.
    pub basename: String,
    /// Extension with the leading dot, or empty.
    pub extname: String,
    /// Size in bytes.
    pub size: u64,
    /// Modification time.
    pub modified: SystemTime,
    /// Owning collection, for files under a collection directory.
    pub collection: Option<String>,
    url: String,
}

impl StaticFile {
    /// Describe a file found under `source`.
    #[must_use]
    pub fn new(
        path: PathBuf,
        source: &Path,
        size: u64,
        modified: SystemTime,
        collection: Option<String>,
    ) -> Self {
        let relative_path = relative_path(&path, source);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let basename = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extname = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let url = format!("/{}", escape_path(&relative_path));

        Self {
            path,
            relative_path,
            name,
            basename,
            extname,
            size,
            modified,
            collection,
            url,
        }
    }

    /// URL the file is served from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Output path under `destination`.
    pub fn destination(&self, destination: &Path) -> PathBuf {
        destination.join(&self.relative_path)
    }

    /// Template-facing hash.
    pub fn to_json(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("path".to_owned(), Value::String(self.relative_path.clone()));
        map.insert("name".to_owned(), Value::String(self.name.clone()));
        map.insert("basename".to_owned(), Value::String(self.basename.clone()));
        map.insert("extname".to_owned(), Value::String(self.extname.clone()));
        map.insert("url".to_owned(), Value::String(self.url.clone()));
        map.insert("size".to_owned(), Value::from(self.size));
        map.insert(
            "modified_time".to_owned(),
            Value::String(format_timestamp(&DateTime::<Utc>::from(self.modified))),
        );
        if let Some(collection) = &self.collection {
            map.insert("collection".to_owned(), Value::String(collection.clone()));
        }
        map
    }
}
