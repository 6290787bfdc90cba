//! Configuration management for quire.
//!
//! Parses `_config.yml` (or `_config.yaml` / `_config.toml`) with serde and
//! fills in Jekyll-compatible defaults for every key that is absent.
//! Unknown keys are kept in [`Config::extra`] so templates can read them as
//! `site.<key>`.
//!
//! CLI settings can be applied during load via [`CliSettings`].
//!
//! ## Environment Variable Expansion
//!
//! `url` and `baseurl` support `${VAR}` and `${VAR:-default}`. Paths
//! (`source`, `destination`) expand a leading `~`.

mod defaults;
mod expand;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub use defaults::{DefaultScope, FrontMatterDefault};

/// Configuration filenames searched for, in order.
pub const CONFIG_FILENAMES: [&str; 3] = ["_config.yml", "_config.yaml", "_config.toml"];

/// Default comma-separated markdown extension list.
pub const DEFAULT_MARKDOWN_EXT: &str = "markdown,mkdown,mkdn,mkd,md";

/// Default markdown engine identifier.
pub const DEFAULT_MARKDOWN_ENGINE: &str = "kramdown";

/// Entries that are always excluded from the scan, besides the destination.
const ALWAYS_EXCLUDED: &[&str] = &[
    ".sass-cache",
    ".jekyll-cache",
    "gemfiles",
    "Gemfile",
    "Gemfile.lock",
    "node_modules",
    "vendor/bundle/",
    "vendor/cache/",
    "vendor/gems/",
    "vendor/ruby/",
    "target",
];

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override source directory.
    pub source: Option<PathBuf>,
    /// Override destination directory.
    pub destination: Option<PathBuf>,
    /// Render `_drafts`.
    pub show_drafts: Option<bool>,
    /// Publish posts dated in the future.
    pub future: Option<bool>,
    /// Render documents marked `published: false`.
    pub unpublished: Option<bool>,
}

/// Site configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Source directory.
    pub source: PathBuf,
    /// Output directory.
    pub destination: PathBuf,
    /// Layout directory name, relative to the source.
    pub layouts_dir: String,
    /// Include directory name, relative to the source.
    pub includes_dir: String,
    /// Data directory name, relative to the source.
    pub data_dir: String,
    /// Comma-separated list of markdown extensions.
    pub markdown_ext: String,
    /// Markdown engine identifier.
    pub markdown: String,
    /// Source file encoding.
    pub encoding: String,
    /// Site-wide permalink style or template.
    pub permalink: String,
    /// Path prefix the site is served under (e.g. `/blog`).
    pub baseurl: String,
    /// Scheme and host the site is served from.
    pub url: String,
    /// Paths and globs never read.
    pub exclude: Vec<String>,
    /// Dot/underscore entries that are read anyway.
    pub include: Vec<String>,
    /// Destination files kept between builds.
    pub keep_files: Vec<String>,
    /// Collections keyed by label.
    #[serde(deserialize_with = "deserialize_collections")]
    pub collections: BTreeMap<String, CollectionConfig>,
    /// Front-matter default rules.
    pub defaults: Vec<FrontMatterDefault>,
    /// Posts per page, when pagination is on.
    pub paginate: Option<u32>,
    /// Pagination URL template.
    pub paginate_path: String,
    /// Publish posts dated in the future.
    pub future: bool,
    /// Render documents marked `published: false`.
    pub unpublished: bool,
    /// Render `_drafts`.
    pub show_drafts: bool,
    /// Separator that ends a document excerpt.
    pub excerpt_separator: String,
    /// Time zone name exposed to templates.
    pub timezone: Option<String>,
    /// Plugin names.
    pub plugins: Vec<String>,
    /// Every other key in the file.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: PathBuf::from("."),
            destination: PathBuf::from("_site"),
            layouts_dir: "_layouts".to_owned(),
            includes_dir: "_includes".to_owned(),
            data_dir: "_data".to_owned(),
            markdown_ext: DEFAULT_MARKDOWN_EXT.to_owned(),
            markdown: DEFAULT_MARKDOWN_ENGINE.to_owned(),
            encoding: "utf-8".to_owned(),
            permalink: "date".to_owned(),
            baseurl: String::new(),
            url: String::new(),
            exclude: Vec::new(),
            include: vec![".htaccess".to_owned()],
            keep_files: vec![".git".to_owned(), ".svn".to_owned()],
            collections: BTreeMap::new(),
            defaults: Vec::new(),
            paginate: None,
            paginate_path: "/page:num/".to_owned(),
            future: false,
            unpublished: false,
            show_drafts: false,
            excerpt_separator: "\n\n".to_owned(),
            timezone: None,
            plugins: Vec::new(),
            extra: Map::new(),
            config_path: None,
        }
    }
}

/// Per-collection configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CollectionConfig {
    /// Whether documents are written to the destination.
    pub output: bool,
    /// Permalink template for documents in this collection.
    pub permalink: Option<String>,
    /// Front-matter key documents are sorted by.
    pub sort_by: Option<String>,
    /// Any other metadata (exposed to templates).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `collections` may be a list of labels or a label -> settings map.
fn deserialize_collections<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, CollectionConfig>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<String>),
        Map(BTreeMap<String, Option<CollectionConfig>>),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => BTreeMap::new(),
        Some(Raw::List(labels)) => labels
            .into_iter()
            .map(|label| (label, CollectionConfig::default()))
            .collect(),
        Some(Raw::Map(map)) => map
            .into_iter()
            .map(|(label, cfg)| (label, cfg.unwrap_or_default()))
            .collect(),
    })
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
    /// Environment variable error during expansion.
    #[error("Environment variable error in {field}: {message}")]
    EnvVar {
        /// Config field path (e.g., "`url`").
        field: String,
        /// Error message (e.g., "${`SITE_URL`} not set").
        message: String,
    },
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise searches
    /// `dir` for one of [`CONFIG_FILENAMES`] and falls back to defaults.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist or parsing fails.
    pub fn load(
        config_path: Option<&Path>,
        dir: &Path,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if let Some(discovered) = Self::discover_config(dir) {
            Self::load_from_file(&discovered)?
        } else {
            tracing::debug!(dir = %dir.display(), "No config file found, using defaults");
            Self::default_with_base(dir)
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
        }

        Ok(config)
    }

    /// Load configuration from `path` when it exists, otherwise defaults.
    ///
    /// A missing file is not an error; defaults resolve against the
    /// file's parent directory.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.is_file() {
            return Self::load_from_file(path);
        }
        let base = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::env::current_dir().unwrap_or_default(),
        };
        tracing::debug!(path = %path.display(), "Config file missing, using defaults");
        Ok(Self::default_with_base(&base))
    }

    /// Apply CLI settings to the configuration.
    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        let old_destination = self.destination.clone();
        if let Some(source) = &settings.source {
            self.source = expand::expand_tilde(source);
        }
        if let Some(destination) = &settings.destination {
            self.destination = expand::expand_tilde(destination);
        }
        if let Some(show_drafts) = settings.show_drafts {
            self.show_drafts = show_drafts;
        }
        if let Some(future) = settings.future {
            self.future = future;
        }
        if let Some(unpublished) = settings.unpublished {
            self.unpublished = unpublished;
        }
        if self.destination != old_destination || settings.source.is_some() {
            self.exclude_destination();
        }
    }

    /// Search `dir` for a config file.
    fn discover_config(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILENAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    /// Create default config with paths relative to given base directory.
    #[must_use]
    pub fn default_with_base(base: &Path) -> Self {
        let mut config = Self::default();
        config.source = base.to_path_buf();
        config.destination = base.join("_site");
        config.add_implicit_excludes();
        config
    }

    /// Load configuration from a specific file.
    ///
    /// The format is chosen by extension: `.toml` is TOML, anything else YAML.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&content, path)?;

        config.expand_env_vars()?;

        let config_dir = path.parent().unwrap_or(Path::new("."));
        config.resolve_paths(config_dir);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;

        Ok(config)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        if path.extension().is_some_and(|e| e == "toml") {
            return Ok(toml::from_str(content)?);
        }
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.markdown_extensions().is_empty() {
            return Err(ConfigError::Validation(
                "markdown_ext must list at least one extension".to_owned(),
            ));
        }
        require_non_empty(&self.layouts_dir, "layouts_dir")?;
        require_non_empty(&self.includes_dir, "includes_dir")?;
        require_non_empty(&self.data_dir, "data_dir")?;

        if !self.url.is_empty()
            && !self.url.starts_with("http://")
            && !self.url.starts_with("https://")
        {
            return Err(ConfigError::Validation(
                "url must start with http:// or https://".to_owned(),
            ));
        }

        if let Some(label) = self.collections.keys().find(|label| label.contains('/')) {
            return Err(ConfigError::Validation(format!(
                "collection name '{label}' cannot contain '/'"
            )));
        }

        Ok(())
    }

    /// Expand environment variable references in configuration strings.
    fn expand_env_vars(&mut self) -> Result<(), ConfigError> {
        self.url = expand::expand_env(&self.url, "url")?;
        self.baseurl = expand::expand_env(&self.baseurl, "baseurl")?;
        Ok(())
    }

    /// Resolve relative paths against the config file directory.
    fn resolve_paths(&mut self, config_dir: &Path) {
        let resolve = |path: &Path| {
            let path = expand::expand_tilde(path);
            if path == Path::new(".") {
                config_dir.to_path_buf()
            } else {
                config_dir.join(path)
            }
        };
        self.source = resolve(&self.source);
        self.destination = resolve(&self.destination);
        self.add_implicit_excludes();
    }

    fn add_implicit_excludes(&mut self) {
        for entry in ALWAYS_EXCLUDED {
            if !self.exclude.iter().any(|e| e == entry) {
                self.exclude.push((*entry).to_owned());
            }
        }
        self.exclude_destination();
    }

    /// Exclude the destination when it lives inside the source tree.
    fn exclude_destination(&mut self) {
        let Ok(relative) = self.destination.strip_prefix(&self.source) else {
            return;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");
        let relative = relative.trim_start_matches("./").to_owned();
        if !relative.is_empty() && !self.exclude.contains(&relative) {
            self.exclude.push(relative);
        }
    }

    /// Markdown extensions without leading dots, lowercased.
    #[must_use]
    pub fn markdown_extensions(&self) -> Vec<String> {
        self.markdown_ext
            .split(',')
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect()
    }

    /// Whether `ext` (with or without a leading dot) is a markdown extension.
    #[must_use]
    pub fn is_markdown_ext(&self, ext: &str) -> bool {
        let ext = ext.trim_start_matches('.').to_lowercase();
        self.markdown_extensions().contains(&ext)
    }

    /// Whether a source-relative path is excluded from the scan.
    ///
    /// An entry matches the path itself, anything below it, or (when it
    /// contains glob characters) any path the glob matches.
    #[must_use]
    pub fn is_excluded(&self, relative_path: &str) -> bool {
        self.exclude
            .iter()
            .any(|pattern| path_matches(pattern, relative_path))
    }

    /// Whether a dot/underscore entry is whitelisted through `include`.
    #[must_use]
    pub fn is_included(&self, relative_path: &str) -> bool {
        self.include
            .iter()
            .any(|pattern| path_matches(pattern, relative_path))
    }

    /// Front-matter defaults for a document.
    ///
    /// # Arguments
    ///
    /// * `relative_path` - Document path relative to the source
    /// * `type_tag` - `pages`, `posts`, `drafts` or a collection label
    #[must_use]
    pub fn front_matter_defaults(&self, relative_path: &str, type_tag: &str) -> Map<String, Value> {
        defaults::resolve(&self.defaults, relative_path, type_tag)
    }

    /// Whether a collection writes its documents to the destination.
    #[must_use]
    pub fn collection_outputs(&self, label: &str) -> bool {
        self.collections.get(label).is_some_and(|c| c.output)
    }

    /// Configuration as JSON, the shape templates see under `site`.
    #[must_use]
    pub fn to_json(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

fn path_matches(pattern: &str, relative_path: &str) -> bool {
    let trimmed = pattern.trim_start_matches("./").trim_end_matches('/');
    if trimmed.is_empty() {
        return false;
    }
    if relative_path == trimmed
        || relative_path
            .strip_prefix(trimmed)
            .is_some_and(|rest| rest.starts_with('/'))
    {
        return true;
    }
    if trimmed.contains(['*', '?', '[']) {
        return glob::Pattern::new(trimmed).is_ok_and(|p| p.matches(relative_path));
    }
    false
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default_with_base(Path::new("/test"));
        assert_eq!(config.source, PathBuf::from("/test"));
        assert_eq!(config.destination, PathBuf::from("/test/_site"));
        assert_eq!(config.layouts_dir, "_layouts");
        assert_eq!(config.includes_dir, "_includes");
        assert_eq!(config.data_dir, "_data");
        assert_eq!(config.markdown, "kramdown");
        assert_eq!(config.permalink, "date");
        assert!(config.exclude.contains(&"_site".to_owned()));
        assert!(config.exclude.contains(&"node_modules".to_owned()));
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let config = Config::parse("", Path::new("_config.yml")).unwrap();
        assert_eq!(config.markdown_ext, DEFAULT_MARKDOWN_EXT);
        assert!(config.collections.is_empty());
    }

    #[test]
    fn test_parse_yaml_with_extra_keys() {
        let yaml = r#"
title: My Blog
baseurl: /blog
url: https://example.com
author:
  name: Ada
"#;
        let config = Config::parse(yaml, Path::new("_config.yml")).unwrap();
        assert_eq!(config.baseurl, "/blog");
        assert_eq!(config.url, "https://example.com");
        assert_eq!(config.extra.get("title"), Some(&json!("My Blog")));
        assert_eq!(config.extra.get("author"), Some(&json!({"name": "Ada"})));

        let site = config.to_json();
        assert_eq!(site.get("title"), Some(&json!("My Blog")));
        assert_eq!(site.get("baseurl"), Some(&json!("/blog")));
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
baseurl = "/docs"
markdown_ext = "md"

[collections.recipes]
output = true
"#;
        let config = Config::parse(toml, Path::new("_config.toml")).unwrap();
        assert_eq!(config.baseurl, "/docs");
        assert!(config.collection_outputs("recipes"));
    }

    #[test]
    fn test_collections_as_list() {
        let yaml = "collections:\n  - recipes\n  - authors\n";
        let config = Config::parse(yaml, Path::new("_config.yml")).unwrap();
        assert_eq!(
            config.collections.keys().cloned().collect::<Vec<_>>(),
            vec!["authors".to_owned(), "recipes".to_owned()]
        );
        assert!(!config.collection_outputs("recipes"));
    }

    #[test]
    fn test_collections_as_map() {
        let yaml = r#"
collections:
  recipes:
    output: true
    permalink: /cook/:name/
  notes:
"#;
        let config = Config::parse(yaml, Path::new("_config.yml")).unwrap();
        let recipes = &config.collections["recipes"];
        assert!(recipes.output);
        assert_eq!(recipes.permalink.as_deref(), Some("/cook/:name/"));
        assert!(!config.collections["notes"].output);
    }

    #[test]
    fn test_markdown_extensions() {
        let config = Config {
            markdown_ext: " md, .Markdown ,,txt".to_owned(),
            ..Config::default()
        };
        assert_eq!(
            config.markdown_extensions(),
            vec!["md".to_owned(), "markdown".to_owned(), "txt".to_owned()]
        );
        assert!(config.is_markdown_ext(".MD"));
        assert!(!config.is_markdown_ext("html"));
    }

    #[test]
    fn test_is_excluded() {
        let mut config = Config::default_with_base(Path::new("/site"));
        config.exclude.push("drafts/*.txt".to_owned());
        config.exclude.push("README.md".to_owned());

        assert!(config.is_excluded("_site"));
        assert!(config.is_excluded("_site/index.html"));
        assert!(config.is_excluded("node_modules/pkg/index.js"));
        assert!(config.is_excluded("vendor/bundle/gems/x.rb"));
        assert!(config.is_excluded("drafts/notes.txt"));
        assert!(config.is_excluded("README.md"));
        assert!(!config.is_excluded("_sites/index.html"));
        assert!(!config.is_excluded("about.md"));
    }

    #[test]
    fn test_destination_outside_source_not_excluded() {
        let mut config = Config::default_with_base(Path::new("/site"));
        config.destination = PathBuf::from("/public");
        config.exclude.clear();
        config.add_implicit_excludes();

        assert!(!config.exclude.iter().any(|e| e.contains("public")));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("_config.yml")).unwrap();

        assert_eq!(config.source, dir.path());
        assert_eq!(config.markdown, DEFAULT_MARKDOWN_ENGINE);
        assert!(config.config_path.is_none());
    }

    #[test]
    fn test_load_from_file_resolves_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("_config.yml");
        std::fs::write(&path, "destination: public\ntitle: Test\n").unwrap();

        let config = Config::load_or_default(&path).unwrap();

        assert_eq!(config.source, dir.path());
        assert_eq!(config.destination, dir.path().join("public"));
        assert!(config.is_excluded("public/index.html"));
        assert_eq!(config.config_path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_load_discovers_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("_config.toml"), "baseurl = \"/x\"\n").unwrap();

        let config = Config::load(None, dir.path(), None).unwrap();

        assert_eq!(config.baseurl, "/x");
    }

    #[test]
    fn test_load_explicit_missing_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.yml");

        let err = Config::load(Some(&missing), dir.path(), None).unwrap_err();

        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("_config.yml");
        std::fs::write(&path, "title: [unclosed\n").unwrap();

        let err = Config::load_or_default(&path).unwrap_err();

        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = Config {
            url: "example.com".to_owned(),
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("url"));
    }

    #[test]
    fn test_validate_rejects_empty_markdown_ext() {
        let config = Config {
            markdown_ext: " , ".to_owned(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_apply_cli_settings() {
        let mut config = Config::default_with_base(Path::new("/site"));
        let overrides = CliSettings {
            destination: Some(PathBuf::from("/site/out")),
            show_drafts: Some(true),
            ..Default::default()
        };

        config.apply_cli_settings(&overrides);

        assert_eq!(config.destination, PathBuf::from("/site/out"));
        assert!(config.show_drafts);
        assert!(!config.future);
        assert!(config.is_excluded("out/index.html"));
    }

    #[test]
    fn test_front_matter_defaults() {
        let yaml = r#"
defaults:
  - scope:
      path: ""
      type: posts
    values:
      layout: post
"#;
        let config = Config::parse(yaml, Path::new("_config.yml")).unwrap();
        let values = config.front_matter_defaults("_posts/2024-01-01-x.md", "posts");
        assert_eq!(values.get("layout"), Some(&json!("post")));
    }
}
