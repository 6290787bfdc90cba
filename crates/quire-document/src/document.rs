//! Source document model.
//!
//! A [`Document`] is one source file (page, post, collection entry, layout
//! or include) with its declared front matter merged over configured
//! defaults, and its raw body. Typed values such as the title, date or tags
//! are derived from the front matter on every call instead of being stored
//! twice.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use quire_config::Config;
use serde_json::{Map, Value};

use crate::date::{format_timestamp, parse_date, parse_filename_date};
use crate::error::DocumentError;
use crate::front_matter;

/// Default excerpt separator (first blank line).
const DEFAULT_EXCERPT_SEPARATOR: &str = "\n\n";

/// Document classification, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    /// Standalone page with front matter.
    Page,
    /// Dated post from `_posts` (or `_drafts`).
    Post,
    /// Member of a configured collection.
    Collection,
    /// Wrapper template from the layouts directory.
    Layout,
    /// Template fragment from the includes directory.
    Include,
}

impl DocumentKind {
    /// Lowercase name used in logs and template data.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Post => "post",
            Self::Collection => "collection",
            Self::Layout => "layout",
            Self::Include => "include",
        }
    }
}

/// One parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    path: PathBuf,
    relative_path: String,
    kind: DocumentKind,
    collection: Option<String>,
    modified: SystemTime,
    data: Map<String, Value>,
    content: String,
    excerpt_separator: String,
    url: Option<String>,
}

impl Document {
    /// Read and parse a document from disk.
    ///
    /// # Arguments
    ///
    /// * `path` - Absolute path of the file
    /// * `source` - Site source directory
    /// * `kind` - Document classification
    /// * `collection` - Collection label for collection members
    /// * `config` - Configuration supplying front-matter defaults
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::FileSystem`] if the file cannot be stat'ed or
    /// read, and [`DocumentError::FrontMatter`] if its front matter is malformed.
    pub async fn load(
        path: &Path,
        source: &Path,
        kind: DocumentKind,
        collection: Option<&str>,
        config: Option<&Config>,
    ) -> Result<Self, DocumentError> {
        let relative = relative_path(path, source);
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| DocumentError::io(e, &relative))?;
        let modified = metadata
            .modified()
            .map_err(|e| DocumentError::io(e, &relative))?;
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DocumentError::io(e, &relative))?;
        tracing::trace!(path = %relative, kind = kind.as_str(), bytes = raw.len(), "Loaded document");

        Self::parse(path, source, kind, collection, modified, &raw, config)
    }

    /// Build a document from text the caller already read.
    ///
    /// Produces exactly what [`Document::load`] produces for the same file,
    /// without touching the disk.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::FrontMatter`] if the front matter is malformed.
    pub fn parse(
        path: &Path,
        source: &Path,
        kind: DocumentKind,
        collection: Option<&str>,
        modified: SystemTime,
        raw: &str,
        config: Option<&Config>,
    ) -> Result<Self, DocumentError> {
        let relative = relative_path(path, source);
        let parsed = front_matter::parse(raw).map_err(|e| DocumentError::FrontMatter {
            path: PathBuf::from(&relative),
            message: e.to_string(),
        })?;

        let document = Self::from_parts(
            path.to_path_buf(),
            relative,
            kind,
            collection.map(str::to_owned),
            modified,
            parsed.data,
            parsed.content,
        );
        Ok(match config {
            Some(config) => document.with_config(config),
            None => document,
        })
    }

    /// Assemble a document from already-parsed parts.
    ///
    /// Pure data construction: no I/O and no defaults applied.
    #[must_use]
    pub fn from_parts(
        path: PathBuf,
        relative_path: String,
        kind: DocumentKind,
        collection: Option<String>,
        modified: SystemTime,
        front_matter: Map<String, Value>,
        content: String,
    ) -> Self {
        Self {
            path,
            relative_path,
            kind,
            collection,
            modified,
            data: front_matter,
            content,
            excerpt_separator: DEFAULT_EXCERPT_SEPARATOR.to_owned(),
            url: None,
        }
    }

    /// Layer configured front-matter defaults under the declared values.
    #[must_use]
    pub fn with_config(mut self, config: &Config) -> Self {
        let mut merged = config.front_matter_defaults(&self.relative_path, &self.type_tag());
        for (key, value) in std::mem::take(&mut self.data) {
            merged.insert(key, value);
        }
        self.data = merged;
        self.excerpt_separator = match self.data.get("excerpt_separator") {
            Some(Value::String(sep)) => sep.clone(),
            _ => config.excerpt_separator.clone(),
        };
        self
    }

    /// Absolute file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path relative to the site source, with `/` separators.
    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    /// Document classification.
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// Collection label, for collection members.
    pub fn collection(&self) -> Option<&str> {
        self.collection.as_deref()
    }

    /// File modification time.
    pub fn modified(&self) -> SystemTime {
        self.modified
    }

    /// Front matter (defaults merged with declared values).
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Mutable front matter, for plugins writing metadata back.
    pub fn data_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.data
    }

    /// Set one front-matter value.
    pub fn set_data(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    /// Raw front-matter value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Body text (front matter removed).
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Output URL, once assigned.
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Assign the output URL.
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = Some(url.into());
    }

    /// Type tag used for defaults and templates.
    ///
    /// `pages`, `posts`, `drafts`, the collection label, `layouts` or `includes`.
    pub fn type_tag(&self) -> String {
        match self.kind {
            DocumentKind::Page => "pages".to_owned(),
            DocumentKind::Post if self.is_draft() => "drafts".to_owned(),
            DocumentKind::Post => "posts".to_owned(),
            DocumentKind::Collection => self
                .collection
                .clone()
                .unwrap_or_else(|| "collection".to_owned()),
            DocumentKind::Layout => "layouts".to_owned(),
            DocumentKind::Include => "includes".to_owned(),
        }
    }

    /// Whether this post was read from `_drafts`.
    pub fn is_draft(&self) -> bool {
        self.kind == DocumentKind::Post
            && (self.relative_path.starts_with("_drafts/")
                || self.relative_path.contains("/_drafts/"))
    }

    /// File name with extension.
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// File name without extension.
    pub fn basename(&self) -> &str {
        self.path
            .file_stem()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    /// Extension without the leading dot, lowercased.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default()
    }

    /// Title from front matter, else the file basename.
    pub fn title(&self) -> String {
        match self.data.get("title") {
            Some(Value::String(title)) => title.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => self.basename().to_owned(),
        }
    }

    /// Slug: front matter `slug`, else the basename without a date prefix.
    pub fn slug(&self) -> String {
        if let Some(Value::String(slug)) = self.data.get("slug") {
            return slug.clone();
        }
        let stem = self.basename();
        match parse_filename_date(stem) {
            Some((_, slug)) => slug.to_owned(),
            None => stem.to_owned(),
        }
    }

    /// Publish date.
    ///
    /// Front matter `date` wins; posts fall back to the `YYYY-MM-DD-`
    /// filename prefix. Date-only values are UTC midnight.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        let declared = match self.data.get("date") {
            Some(Value::String(s)) => parse_date(s).map(|dt| dt.with_timezone(&Utc)),
            _ => None,
        };
        declared.or_else(|| {
            if matches!(self.kind, DocumentKind::Post | DocumentKind::Collection) {
                parse_filename_date(self.basename()).map(|(dt, _)| dt)
            } else {
                None
            }
        })
    }

    /// False iff `published: false` or `draft: true`.
    pub fn published(&self) -> bool {
        let unpublished = self.data.get("published").is_some_and(is_false);
        let draft = self.data.get("draft").is_some_and(is_true);
        !(unpublished || draft)
    }

    /// Layout name, if the document declares one.
    ///
    /// `none`, `null` and the empty string mean no layout.
    pub fn layout(&self) -> Option<&str> {
        match self.data.get("layout") {
            Some(Value::String(name)) if !name.trim().is_empty() && name != "none" => {
                Some(name.trim())
            }
            _ => None,
        }
    }

    /// Permalink template from front matter.
    pub fn permalink(&self) -> Option<&str> {
        match self.data.get("permalink") {
            Some(Value::String(p)) if !p.is_empty() => Some(p),
            _ => None,
        }
    }

    /// Categories from `category` or `categories`.
    pub fn categories(&self) -> Vec<String> {
        pluralized_list(&self.data, "category", "categories")
    }

    /// Tags from `tag` or `tags`.
    pub fn tags(&self) -> Vec<String> {
        pluralized_list(&self.data, "tag", "tags")
    }

    /// Content up to the excerpt separator.
    ///
    /// A front matter `excerpt` overrides the computed one.
    pub fn excerpt(&self) -> String {
        if let Some(Value::String(excerpt)) = self.data.get("excerpt") {
            return excerpt.clone();
        }
        if self.excerpt_separator.is_empty() {
            return String::new();
        }
        match self.content.split_once(&self.excerpt_separator) {
            Some((head, _)) => head.to_owned(),
            None => self.content.clone(),
        }
    }

    /// Template-facing hash: front matter plus computed fields.
    pub fn to_json(&self) -> Map<String, Value> {
        let mut map = self.data.clone();
        map.insert("path".to_owned(), Value::String(self.relative_path.clone()));
        map.insert("name".to_owned(), Value::String(self.name().to_owned()));
        map.insert("ext".to_owned(), Value::String(format!(".{}", self.extension())));
        map.insert("title".to_owned(), Value::String(self.title()));
        map.insert("slug".to_owned(), Value::String(self.slug()));
        map.insert("content".to_owned(), Value::String(self.content.clone()));
        map.insert(
            "url".to_owned(),
            self.url
                .as_ref()
                .map_or(Value::Null, |u| Value::String(u.clone())),
        );
        if let Some(date) = self.date() {
            map.insert("date".to_owned(), Value::String(format_timestamp(&date)));
        }
        if matches!(self.kind, DocumentKind::Post | DocumentKind::Collection) {
            map.insert("excerpt".to_owned(), Value::String(self.excerpt()));
            map.insert("draft".to_owned(), Value::Bool(self.is_draft()));
        }
        map.insert("categories".to_owned(), string_array(self.categories()));
        map.insert("tags".to_owned(), string_array(self.tags()));
        let collection = match self.kind {
            DocumentKind::Post => Some("posts".to_owned()),
            DocumentKind::Collection => self.collection.clone(),
            _ => None,
        };
        if let Some(label) = collection {
            map.insert("collection".to_owned(), Value::String(label));
        }
        map
    }
}

/// Path of `path` relative to `source`, using `/` separators.
///
/// Files outside the source fall back to their file name.
pub fn relative_path(path: &Path, source: &Path) -> String {
    let relative = path.strip_prefix(source).unwrap_or_else(|_| {
        path.file_name()
            .map_or(path, Path::new)
    });
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_false(value: &Value) -> bool {
    match value {
        Value::Bool(b) => !b,
        Value::String(s) => s.eq_ignore_ascii_case("false"),
        _ => false,
    }
}

fn is_true(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Normalize `category`/`categories` style values to a list of strings.
///
/// The singular key, when present, is a single entry; the plural key may be
/// a list or a whitespace-delimited string.
fn pluralized_list(data: &Map<String, Value>, singular: &str, plural: &str) -> Vec<String> {
    match data.get(singular) {
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                Vec::new()
            } else {
                vec![s.to_owned()]
            }
        }
        Some(Value::Array(items)) => list_items(items),
        Some(Value::Number(n)) => vec![n.to_string()],
        _ => match data.get(plural) {
            Some(Value::String(s)) => s.split_whitespace().map(str::to_owned).collect(),
            Some(Value::Array(items)) => list_items(items),
            Some(Value::Number(n)) => vec![n.to_string()],
            _ => Vec::new(),
        },
    }
}

fn list_items(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .collect()
}

fn string_array(items: Vec<String>) -> Value {
    Value::Array(items.into_iter().map(Value::String).collect())
}

#[cfg(test)]
mod tests {
    static_assertions::assert_impl_all!(super::Document: Send, Sync);

    use std::fs;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn doc(kind: DocumentKind, relative: &str, raw: &str) -> Document {
        let source = Path::new("/site");
        Document::parse(
            &source.join(relative),
            source,
            kind,
            None,
            SystemTime::UNIX_EPOCH,
            raw,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(
            relative_path(Path::new("/site/_posts/a.md"), Path::new("/site")),
            "_posts/a.md"
        );
        assert_eq!(
            relative_path(Path::new("/elsewhere/b.md"), Path::new("/site")),
            "b.md"
        );
    }

    #[test]
    fn test_title_falls_back_to_basename() {
        assert_eq!(doc(DocumentKind::Page, "about.md", "---\n---\n").title(), "about");
        assert_eq!(
            doc(DocumentKind::Page, "about.md", "---\ntitle: About Us\n---\n").title(),
            "About Us"
        );
    }

    #[test]
    fn test_published_flags() {
        let cases = [
            ("", true),
            ("published: true\n", true),
            ("published: false\n", false),
            ("draft: true\n", false),
            ("draft: false\n", true),
            ("published: false\ndraft: true\n", false),
        ];
        for (front_matter, expected) in cases {
            let raw = format!("---\n{front_matter}---\nBody");
            assert_eq!(
                doc(DocumentKind::Page, "a.md", &raw).published(),
                expected,
                "front matter: {front_matter:?}"
            );
        }
    }

    #[test]
    fn test_categories_normalization() {
        let cases: [(&str, Vec<&str>); 7] = [
            ("categories: [a, b]\n", vec!["a", "b"]),
            ("categories: a b  c\n", vec!["a", "b", "c"]),
            ("category: Web Dev\n", vec!["Web Dev"]),
            ("categories: \"\"\n", vec![]),
            ("categories: \"   \"\n", vec![]),
            ("category: \" \"\n", vec![]),
            ("", vec![]),
        ];
        for (front_matter, expected) in cases {
            let raw = format!("---\n{front_matter}---\n");
            assert_eq!(
                doc(DocumentKind::Post, "_posts/2024-01-01-x.md", &raw).categories(),
                expected,
                "front matter: {front_matter:?}"
            );
        }
    }

    #[test]
    fn test_tags_from_list_with_numbers() {
        let d = doc(DocumentKind::Page, "a.md", "---\ntags: [rust, 2024, \" \"]\n---\n");
        assert_eq!(d.tags(), vec!["rust".to_owned(), "2024".to_owned()]);
    }

    #[test]
    fn test_post_date_from_filename_is_utc_midnight() {
        let d = doc(DocumentKind::Post, "_posts/2024-01-15-hello.md", "---\n---\n");
        assert_eq!(
            d.date().unwrap().to_rfc3339(),
            "2024-01-15T00:00:00+00:00"
        );
        assert_eq!(d.slug(), "hello");
    }

    #[test]
    fn test_front_matter_date_wins() {
        let d = doc(
            DocumentKind::Post,
            "_posts/2024-01-15-hello.md",
            "---\ndate: 2023-06-01 12:00:00 +0200\n---\n",
        );
        assert_eq!(
            d.date().unwrap().to_rfc3339(),
            "2023-06-01T10:00:00+00:00"
        );
    }

    #[test]
    fn test_page_without_date() {
        assert!(doc(DocumentKind::Page, "2024-01-15-a.md", "---\n---\n").date().is_none());
    }

    #[test]
    fn test_layout_none() {
        assert_eq!(doc(DocumentKind::Page, "a.md", "---\nlayout: none\n---\n").layout(), None);
        assert_eq!(doc(DocumentKind::Page, "a.md", "---\nlayout: null\n---\n").layout(), None);
        assert_eq!(
            doc(DocumentKind::Page, "a.md", "---\nlayout: post\n---\n").layout(),
            Some("post")
        );
    }

    #[test]
    fn test_excerpt() {
        let d = doc(
            DocumentKind::Post,
            "_posts/2024-01-15-a.md",
            "---\n---\nFirst para.\n\nSecond para.",
        );
        assert_eq!(d.excerpt(), "First para.");
    }

    #[test]
    fn test_defaults_under_declared_values() {
        let yaml = r#"
defaults:
  - scope: { path: "", type: posts }
    values: { layout: post, author: Site }
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let source = Path::new("/site");
        let d = Document::parse(
            &source.join("_posts/2024-01-15-a.md"),
            source,
            DocumentKind::Post,
            None,
            SystemTime::UNIX_EPOCH,
            "---\nauthor: Ada\n---\n",
            Some(&config),
        )
        .unwrap();

        assert_eq!(d.layout(), Some("post"));
        assert_eq!(d.get("author"), Some(&json!("Ada")));
    }

    #[test]
    fn test_collection_defaults_use_label() {
        let yaml = r#"
defaults:
  - scope: { type: recipes }
    values: { layout: recipe }
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let source = Path::new("/site");
        let d = Document::parse(
            &source.join("_recipes/soup.md"),
            source,
            DocumentKind::Collection,
            Some("recipes"),
            SystemTime::UNIX_EPOCH,
            "---\n---\n",
            Some(&config),
        )
        .unwrap();

        assert_eq!(d.type_tag(), "recipes");
        assert_eq!(d.layout(), Some("recipe"));
    }

    #[test]
    fn test_malformed_front_matter_is_front_matter_error() {
        let source = Path::new("/site");
        let err = Document::parse(
            &source.join("bad.md"),
            source,
            DocumentKind::Page,
            None,
            SystemTime::UNIX_EPOCH,
            "---\ntitle: [oops\n---\n",
            None,
        )
        .unwrap_err();

        assert!(err.is_front_matter());
        assert_eq!(err.path(), Path::new("bad.md"));
    }

    #[test]
    fn test_to_json_computed_fields() {
        let mut d = doc(
            DocumentKind::Post,
            "_posts/2024-01-15-hello.md",
            "---\ntitle: Hello\ntags: a b\n---\nBody",
        );
        d.set_url("/2024/01/15/hello.html");

        let json = d.to_json();

        assert_eq!(json.get("title"), Some(&json!("Hello")));
        assert_eq!(json.get("date"), Some(&json!("2024-01-15 00:00:00 +0000")));
        assert_eq!(json.get("tags"), Some(&json!(["a", "b"])));
        assert_eq!(json.get("url"), Some(&json!("/2024/01/15/hello.html")));
        assert_eq!(json.get("path"), Some(&json!("_posts/2024-01-15-hello.md")));
        assert_eq!(json.get("collection"), Some(&json!("posts")));
        assert_eq!(json.get("ext"), Some(&json!(".md")));
    }

    #[test]
    fn test_draft_type_tag() {
        let d = doc(DocumentKind::Post, "_drafts/idea.md", "---\n---\n");
        assert!(d.is_draft());
        assert_eq!(d.type_tag(), "drafts");
    }

    #[tokio::test]
    async fn test_load_matches_parse() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.md");
        let raw = "---\ntitle: Same\n---\nBody";
        fs::write(&path, raw).unwrap();
        let modified = fs::metadata(&path).unwrap().modified().unwrap();

        let loaded = Document::load(&path, dir.path(), DocumentKind::Page, None, None)
            .await
            .unwrap();
        let parsed = Document::parse(
            &path,
            dir.path(),
            DocumentKind::Page,
            None,
            modified,
            raw,
            None,
        )
        .unwrap();

        assert_eq!(loaded, parsed);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_file_system_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Document::load(
            &dir.path().join("missing.md"),
            dir.path(),
            DocumentKind::Page,
            None,
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, DocumentError::FileSystem { .. }));
        assert_eq!(err.path(), Path::new("missing.md"));
    }
}
