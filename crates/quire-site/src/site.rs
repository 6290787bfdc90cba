//! The site model: every document, data file and static file of one source tree.
//!
//! A [`Site`] is created from configuration and filled by [`Site::read`].
//! Plugins may seed [`Site::data_mut`] or add documents before the read;
//! seeded data keys survive it, and documents the read did not discover are
//! kept.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use quire_site::create_site_from_config;
//!
//! let mut site = create_site_from_config(Path::new("blog/_config.yml"))?;
//! site.read().await?;
//! site.assign_urls(|ext| if ext == "md" { ".html".into() } else { format!(".{ext}") });
//! for post in site.posts() {
//!     println!("{} -> {:?}", post.title(), post.url());
//! }
//! ```

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use percent_encoding::percent_decode_str;
use quire_config::Config;
use quire_document::date::format_timestamp;
use quire_document::{Document, DocumentError, DocumentKind, front_matter, relative_path};
use serde_json::{Map, Value};

use crate::data;
use crate::error::SiteError;
use crate::scanner::Scanner;
use crate::static_file::StaticFile;
use crate::url;

/// Bytes read to decide whether a loose file may have front matter.
const SNIFF_LEN: u64 = 8;

/// UTF-8 byte order mark.
const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Create a site from a configuration file path.
///
/// A missing file is not an error: defaults apply, resolved against the
/// file's directory.
///
/// # Errors
///
/// Returns [`SiteError::Config`] if the file exists but is invalid.
pub fn create_site_from_config(path: &Path) -> Result<Site, SiteError> {
    Ok(Site::new(Config::load_or_default(path)?))
}

/// All content of one site.
#[derive(Debug)]
pub struct Site {
    config: Config,
    time: DateTime<Utc>,
    pages: Vec<Document>,
    posts: Vec<Document>,
    layouts: HashMap<String, Document>,
    includes: HashMap<String, Document>,
    collections: BTreeMap<String, Vec<Document>>,
    data: Map<String, Value>,
    static_files: Vec<StaticFile>,
    /// Top-level data keys filled from files by the last read, with the
    /// value each was given.
    file_data: HashMap<String, Value>,
    /// Relative paths of documents discovered by the last read.
    scanned_paths: HashSet<String>,
}

/// Result of checking a loose file for front matter.
enum Sniffed {
    Page(String),
    Static,
}

impl Site {
    /// Create an empty site for `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            time: Utc::now(),
            pages: Vec::new(),
            posts: Vec::new(),
            layouts: HashMap::new(),
            includes: HashMap::new(),
            collections: BTreeMap::new(),
            data: Map::new(),
            static_files: Vec::new(),
            file_data: HashMap::new(),
            scanned_paths: HashSet::new(),
        }
    }

    /// Scan the source tree and load every document and data file.
    ///
    /// File reads run concurrently. Data files that fail to parse are logged
    /// and skipped; a document that fails to load aborts the read.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Document`] for unreadable or malformed documents,
    /// [`SiteError::Io`] for unreadable loose files.
    pub async fn read(&mut self) -> Result<(), SiteError> {
        self.time = Utc::now();
        let config = Arc::new(self.config.clone());

        let scan = {
            let config = Arc::clone(&config);
            tokio::task::spawn_blocking(move || Scanner::new(&config).scan()).await?
        };
        tracing::debug!(
            posts = scan.posts.len(),
            candidates = scan.candidates.len(),
            layouts = scan.layouts.len(),
            "Scanned source tree"
        );

        let layouts = load_documents(&config, scan.layouts, DocumentKind::Layout).await?;
        let includes = load_documents(&config, scan.includes, DocumentKind::Include).await?;
        let posts = load_documents(&config, scan.posts, DocumentKind::Post).await?;
        let collections = load_collection_documents(&config, scan.collections).await?;
        let (pages, mut static_files) = load_candidates(&config, scan.candidates).await?;
        let data_files = load_data_files(&config, scan.data).await?;

        for (label, path) in scan.collection_files {
            if config.collection_outputs(&label) {
                static_files.push(static_file(&config.source, path, Some(label))?);
            }
        }

        let mut discovered = HashSet::new();
        let layouts_root = config.source.join(&config.layouts_dir);
        self.layouts = layouts
            .into_iter()
            .map(|doc| {
                discovered.insert(doc.relative_path().to_owned());
                (layout_name(doc.path(), &layouts_root), doc)
            })
            .collect();
        let includes_root = config.source.join(&config.includes_dir);
        self.includes = includes
            .into_iter()
            .map(|doc| {
                discovered.insert(doc.relative_path().to_owned());
                (relative_path(doc.path(), &includes_root), doc)
            })
            .collect();

        let previous_scan = std::mem::take(&mut self.scanned_paths);
        let injected = |doc: &Document| !previous_scan.contains(doc.relative_path());

        let mut next_pages: Vec<Document> = Vec::new();
        for doc in pages {
            discovered.insert(doc.relative_path().to_owned());
            if self.is_visible(&doc) {
                next_pages.push(doc);
            }
        }
        next_pages.extend(self.pages.drain(..).filter(|d| injected(d)));
        self.pages = next_pages;

        let mut next_posts: Vec<Document> = Vec::new();
        for doc in posts {
            discovered.insert(doc.relative_path().to_owned());
            if self.is_visible(&doc) {
                next_posts.push(doc);
            }
        }
        next_posts.extend(self.posts.drain(..).filter(|d| injected(d)));
        self.posts = next_posts;
        self.sort_posts();

        let mut next_collections: BTreeMap<String, Vec<Document>> = config
            .collections
            .keys()
            .filter(|label| label.as_str() != "posts")
            .map(|label| (label.clone(), Vec::new()))
            .collect();
        for (label, doc) in collections {
            discovered.insert(doc.relative_path().to_owned());
            if self.is_visible(&doc) {
                next_collections.entry(label).or_default().push(doc);
            }
        }
        for (label, docs) in std::mem::take(&mut self.collections) {
            next_collections
                .entry(label)
                .or_default()
                .extend(docs.into_iter().filter(|d| injected(d)));
        }
        for (label, docs) in &mut next_collections {
            if let Some(key) = config
                .collections
                .get(label)
                .and_then(|c| c.sort_by.as_deref())
            {
                docs.sort_by(|a, b| compare_values(a.get(key), b.get(key)));
            }
        }
        self.collections = next_collections;

        self.static_files = static_files;
        self.scanned_paths = discovered;
        self.merge_data(data_files);

        tracing::info!(
            pages = self.pages.len(),
            posts = self.posts.len(),
            static_files = self.static_files.len(),
            "Site read"
        );
        Ok(())
    }

    /// Merge file-sourced data without replacing caller-seeded keys.
    ///
    /// A key the previous read filled from files is refreshed only while it
    /// still holds that value; once a caller changes it, it counts as seeded.
    fn merge_data(&mut self, files: Vec<(Vec<String>, Value)>) {
        for (key, value) in std::mem::take(&mut self.file_data) {
            if self.data.get(&key) == Some(&value) {
                self.data.remove(&key);
            }
        }
        let seeded: HashSet<String> = self.data.keys().cloned().collect();

        for (keys, value) in files {
            if !data::insert_missing(&mut self.data, &keys, value) {
                tracing::debug!(key = %keys.join("."), "Data key already set, keeping existing value");
            }
        }

        self.file_data = self
            .data
            .iter()
            .filter(|(key, _)| !seeded.contains(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
    }

    fn is_visible(&self, doc: &Document) -> bool {
        if !self.config.unpublished && !doc.published() {
            tracing::debug!(path = %doc.relative_path(), "Skipping unpublished document");
            return false;
        }
        let dated = matches!(doc.kind(), DocumentKind::Post | DocumentKind::Collection);
        if dated && !self.config.future && doc.date().is_some_and(|date| date > self.time) {
            tracing::debug!(path = %doc.relative_path(), "Skipping future-dated document");
            return false;
        }
        true
    }

    /// Newest first; equal dates keep scan order.
    fn sort_posts(&mut self) {
        self.posts.sort_by(|a, b| b.date().cmp(&a.date()));
    }

    /// Compute and store the URL of every page, post and collection document.
    ///
    /// `output_ext` maps a source extension (without dot) to the output
    /// extension (with dot), normally through the converter registry.
    pub fn assign_urls(&mut self, output_ext: impl Fn(&str) -> String) {
        let config = &self.config;
        let time = self.time;
        let documents = self
            .pages
            .iter_mut()
            .chain(self.posts.iter_mut())
            .chain(self.collections.values_mut().flatten());
        for doc in documents {
            let ext = output_ext(&doc.extension());
            let url = url::document_url(doc, config, &ext, time);
            doc.set_url(url);
        }
    }

    /// Add a document produced outside the scan (e.g. by a generator).
    ///
    /// Pages go to `pages`; posts (or `collection == "posts"`) go to `posts`,
    /// which is re-sorted; other labels go to that collection.
    pub fn add_document(&mut self, document: Document, collection: Option<&str>, is_page: bool) {
        if is_page {
            self.pages.push(document);
            return;
        }
        let label = collection
            .map(str::to_owned)
            .or_else(|| document.collection().map(str::to_owned));
        match (document.kind(), label.as_deref()) {
            (DocumentKind::Post, _) | (_, Some("posts")) => {
                self.posts.push(document);
                self.sort_posts();
            }
            (_, Some(label)) => self
                .collections
                .entry(label.to_owned())
                .or_default()
                .push(document),
            _ => self.pages.push(document),
        }
    }

    /// Register a layout under `name` (e.g. from a theme plugin).
    pub fn add_layout(&mut self, name: impl Into<String>, layout: Document) {
        self.layouts.insert(name.into(), layout);
    }

    /// Source directory.
    pub fn source(&self) -> &Path {
        &self.config.source
    }

    /// Destination directory.
    pub fn destination(&self) -> &Path {
        &self.config.destination
    }

    /// Site configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Time the last read started.
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Pages in scan order, followed by added pages.
    pub fn pages(&self) -> &[Document] {
        &self.pages
    }

    /// Mutable pages, for plugins that edit front matter or URLs.
    pub fn pages_mut(&mut self) -> &mut Vec<Document> {
        &mut self.pages
    }

    /// Posts, newest first.
    pub fn posts(&self) -> &[Document] {
        &self.posts
    }

    /// Mutable posts.
    ///
    /// Callers that change dates are responsible for the order.
    pub fn posts_mut(&mut self) -> &mut Vec<Document> {
        &mut self.posts
    }

    /// Layouts keyed by name (path under the layouts directory, no extension).
    pub fn layouts(&self) -> &HashMap<String, Document> {
        &self.layouts
    }

    /// Includes keyed by path relative to the includes directory.
    pub fn includes(&self) -> &HashMap<String, Document> {
        &self.includes
    }

    /// Named collections (posts excluded).
    pub fn collections(&self) -> &BTreeMap<String, Vec<Document>> {
        &self.collections
    }

    /// `site.data`: data files merged over caller-seeded values.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Mutable `site.data`; keys set here survive later reads.
    pub fn data_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.data
    }

    /// Files copied to the destination unchanged.
    pub fn static_files(&self) -> &[StaticFile] {
        &self.static_files
    }

    /// Layout by name (path under the layouts directory, no extension).
    ///
    /// A name given with an extension also matches.
    pub fn get_layout(&self, name: &str) -> Option<&Document> {
        self.layouts.get(name).or_else(|| {
            let (stem, _) = name.rsplit_once('.')?;
            self.layouts.get(stem)
        })
    }

    /// Include by path relative to the includes directory.
    pub fn get_include(&self, relative_path: &str) -> Option<&Document> {
        self.includes.get(relative_path)
    }

    /// Documents of a collection; `posts` names the posts. Unknown names give
    /// an empty slice.
    pub fn get_collection(&self, name: &str) -> &[Document] {
        if name == "posts" {
            return &self.posts;
        }
        match self.collections.get(name) {
            Some(docs) => docs,
            None => &[],
        }
    }

    /// Pages, posts and collection documents.
    pub fn all_documents(&self) -> Vec<&Document> {
        self.pages
            .iter()
            .chain(&self.posts)
            .chain(self.collections.values().flatten())
            .collect()
    }

    /// Documents written to the destination: pages, posts and documents of
    /// collections configured with `output: true`.
    pub fn output_documents(&self) -> Vec<&Document> {
        self.pages
            .iter()
            .chain(&self.posts)
            .chain(
                self.collections
                    .iter()
                    .filter(|(label, _)| self.config.collection_outputs(label))
                    .flat_map(|(_, docs)| docs),
            )
            .collect()
    }

    /// File under the destination that a URL is written to.
    ///
    /// Directory URLs get `index.html`; URLs without an extension get
    /// `.html`. `..` segments are dropped so the result stays inside the
    /// destination.
    pub fn output_path(&self, url: &str) -> PathBuf {
        let decoded = percent_decode_str(url).decode_utf8_lossy();
        let mut path = self.config.destination.clone();
        let mut has_segment = false;
        for segment in decoded.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                continue;
            }
            path.push(segment);
            has_segment = true;
        }
        if !has_segment || decoded.ends_with('/') {
            path.push("index.html");
        } else if path.extension().is_none() {
            path.set_extension("html");
        }
        path
    }

    /// Site-wide template data: configuration, collections, data and files.
    pub fn to_json(&self) -> Map<String, Value> {
        let mut site = self.config.to_json();
        site.insert("time".to_owned(), Value::String(format_timestamp(&self.time)));
        site.insert("pages".to_owned(), documents_json(&self.pages));
        site.insert("posts".to_owned(), documents_json(&self.posts));
        site.insert("data".to_owned(), Value::Object(self.data.clone()));
        site.insert(
            "static_files".to_owned(),
            Value::Array(
                self.static_files
                    .iter()
                    .map(|f| Value::Object(f.to_json()))
                    .collect(),
            ),
        );
        site.insert(
            "documents".to_owned(),
            Value::Array(
                self.all_documents()
                    .into_iter()
                    .map(|d| Value::Object(d.to_json()))
                    .collect(),
            ),
        );
        site.insert("categories".to_owned(), group_posts(&self.posts, Document::categories));
        site.insert("tags".to_owned(), group_posts(&self.posts, Document::tags));

        let mut collections = vec![collection_json("posts", &self.posts, true)];
        for (label, docs) in &self.collections {
            site.entry(label.clone())
                .or_insert_with(|| documents_json(docs));
            collections.push(collection_json(
                label,
                docs,
                self.config.collection_outputs(label),
            ));
        }
        site.insert("collections".to_owned(), Value::Array(collections));
        site
    }
}

async fn load_documents(
    config: &Arc<Config>,
    paths: Vec<PathBuf>,
    kind: DocumentKind,
) -> Result<Vec<Document>, SiteError> {
    let handles: Vec<_> = paths
        .into_iter()
        .map(|path| {
            let config = Arc::clone(config);
            tokio::spawn(async move {
                Document::load(&path, &config.source, kind, None, Some(&*config)).await
            })
        })
        .collect();

    let mut documents = Vec::with_capacity(handles.len());
    for handle in handles {
        documents.push(handle.await??);
    }
    Ok(documents)
}

async fn load_collection_documents(
    config: &Arc<Config>,
    entries: Vec<(String, PathBuf)>,
) -> Result<Vec<(String, Document)>, SiteError> {
    let handles: Vec<_> = entries
        .into_iter()
        .map(|(label, path)| {
            let config = Arc::clone(config);
            tokio::spawn(async move {
                let doc = Document::load(
                    &path,
                    &config.source,
                    DocumentKind::Collection,
                    Some(&label),
                    Some(&*config),
                )
                .await;
                doc.map(|doc| (label, doc))
            })
        })
        .collect();

    let mut documents = Vec::with_capacity(handles.len());
    for handle in handles {
        documents.push(handle.await??);
    }
    Ok(documents)
}

/// Split loose files into pages (valid front matter) and static files.
async fn load_candidates(
    config: &Arc<Config>,
    paths: Vec<PathBuf>,
) -> Result<(Vec<Document>, Vec<StaticFile>), SiteError> {
    let handles: Vec<_> = paths
        .into_iter()
        .map(|path| {
            tokio::task::spawn_blocking(move || {
                let metadata = std::fs::metadata(&path);
                let sniffed = sniff(&path);
                (path, metadata, sniffed)
            })
        })
        .collect();

    let mut pages = Vec::new();
    let mut static_files = Vec::new();
    for handle in handles {
        let (path, metadata, sniffed) = handle.await?;
        let io_error = |source: std::io::Error| SiteError::Io {
            path: path.clone(),
            source,
        };
        let metadata = metadata.map_err(io_error)?;
        match sniffed.map_err(io_error)? {
            Sniffed::Page(raw) => {
                let modified = metadata
                    .modified()
                    .map_err(|e| DocumentError::io(e, relative_path(&path, &config.source)))?;
                pages.push(Document::parse(
                    &path,
                    &config.source,
                    DocumentKind::Page,
                    None,
                    modified,
                    &raw,
                    Some(&**config),
                )?);
            }
            Sniffed::Static => {
                let modified = metadata.modified().map_err(io_error)?;
                static_files.push(StaticFile::new(
                    path,
                    &config.source,
                    metadata.len(),
                    modified,
                    None,
                ));
            }
        }
    }
    Ok((pages, static_files))
}

/// Read a loose file far enough to classify it.
///
/// Only files opening with `---` are read in full; a file whose block never
/// closes, or that is not UTF-8, is static.
fn sniff(path: &Path) -> std::io::Result<Sniffed> {
    let mut head = Vec::new();
    std::fs::File::open(path)?
        .take(SNIFF_LEN)
        .read_to_end(&mut head)?;
    let head = head.strip_prefix(BOM).unwrap_or(&head);
    if !head.starts_with(b"---") {
        return Ok(Sniffed::Static);
    }

    match std::fs::read_to_string(path) {
        Ok(raw) if front_matter::has_front_matter(&raw) => Ok(Sniffed::Page(raw)),
        Ok(_) => Ok(Sniffed::Static),
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => Ok(Sniffed::Static),
        Err(e) => Err(e),
    }
}

fn static_file(
    source: &Path,
    path: PathBuf,
    collection: Option<String>,
) -> Result<StaticFile, SiteError> {
    let io_error = |source: std::io::Error| SiteError::Io {
        path: path.clone(),
        source,
    };
    let metadata = std::fs::metadata(&path).map_err(io_error)?;
    let modified = metadata.modified().map_err(io_error)?;
    Ok(StaticFile::new(path, source, metadata.len(), modified, collection))
}

/// Read and parse data files; failures are logged and skipped.
async fn load_data_files(
    config: &Arc<Config>,
    paths: Vec<PathBuf>,
) -> Result<Vec<(Vec<String>, Value)>, SiteError> {
    let data_root = config.source.join(&config.data_dir);
    let handles: Vec<_> = paths
        .into_iter()
        .map(|path| {
            tokio::spawn(async move {
                let parsed = match tokio::fs::read_to_string(&path).await {
                    Ok(content) => {
                        let ext = path
                            .extension()
                            .map(|e| e.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        data::parse_data(&ext, &content)
                    }
                    Err(e) => Err(e.into()),
                };
                (path, parsed)
            })
        })
        .collect();

    let mut loaded = Vec::with_capacity(handles.len());
    for handle in handles {
        let (path, parsed) = handle.await?;
        match parsed {
            Ok(value) => {
                let relative = path.strip_prefix(&data_root).unwrap_or(&path);
                loaded.push((data::key_path(relative), value));
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping malformed data file");
            }
        }
    }
    Ok(loaded)
}

/// Layout name: path under the layouts directory without extension.
fn layout_name(path: &Path, layouts_root: &Path) -> String {
    let relative = relative_path(path, layouts_root);
    match relative.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() && !stem.ends_with('/') => stem.to_owned(),
        _ => relative,
    }
}

fn documents_json(docs: &[Document]) -> Value {
    Value::Array(docs.iter().map(|d| Value::Object(d.to_json())).collect())
}

fn collection_json(label: &str, docs: &[Document], output: bool) -> Value {
    let mut map = Map::new();
    map.insert("label".to_owned(), Value::String(label.to_owned()));
    map.insert("docs".to_owned(), documents_json(docs));
    map.insert("output".to_owned(), Value::Bool(output));
    map.insert(
        "relative_directory".to_owned(),
        Value::String(format!("_{label}")),
    );
    Value::Object(map)
}

/// `{ name: [posts...] }` for categories or tags, in post order.
fn group_posts(posts: &[Document], keys: fn(&Document) -> Vec<String>) -> Value {
    let mut groups: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for post in posts {
        for key in keys(post) {
            groups
                .entry(key)
                .or_default()
                .push(Value::Object(post.to_json()));
        }
    }
    Value::Object(
        groups
            .into_iter()
            .map(|(k, v)| (k, Value::Array(v)))
            .collect(),
    )
}

/// Order front-matter values for `sort_by`: numbers, then strings, missing last.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
        (None, None) => Ordering::Equal,
    }
}
