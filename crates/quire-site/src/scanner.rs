//! Source tree discovery.
//!
//! The scanner walks the source directory once and sorts every regular file
//! into a bucket by location. It reads no file contents: deciding whether a
//! loose file is a page or a static file needs its front matter, which
//! [`Site::read`](crate::Site::read) checks afterwards.

use std::fs;
use std::path::{Path, PathBuf};

use quire_config::Config;
use quire_document::date::parse_filename_date;

/// Files found by one scan, grouped by role.
#[derive(Debug, Default)]
pub(crate) struct ScanResult {
    /// Files under the layouts directory.
    pub layouts: Vec<PathBuf>,
    /// Files under the includes directory.
    pub includes: Vec<PathBuf>,
    /// Data files under the data directory.
    pub data: Vec<PathBuf>,
    /// Posts (and drafts, when enabled).
    pub posts: Vec<PathBuf>,
    /// Collection documents with their label.
    pub collections: Vec<(String, PathBuf)>,
    /// Non-document files inside collection directories.
    pub collection_files: Vec<(String, PathBuf)>,
    /// Loose files: a page if it has front matter, else static.
    pub candidates: Vec<PathBuf>,
}

/// Region of the tree a directory belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Region {
    Site,
    Layouts,
    Includes,
    Data,
    Posts { drafts: bool },
    Collection(String),
}

/// Walks the source tree and classifies files.
pub(crate) struct Scanner<'a> {
    config: &'a Config,
    markdown_extensions: Vec<String>,
}

impl<'a> Scanner<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            markdown_extensions: config.markdown_extensions(),
        }
    }

    /// Scan the configured source directory.
    ///
    /// Returns an empty result if the source directory doesn't exist.
    pub fn scan(&self) -> ScanResult {
        let mut result = ScanResult::default();
        if self.config.source.is_dir() {
            self.scan_directory(&self.config.source, "", &Region::Site, &mut result);
        }
        result
    }

    fn scan_directory(&self, dir: &Path, prefix: &str, region: &Region, out: &mut ScanResult) {
        let Ok(entries) = fs::read_dir(dir) else {
            tracing::warn!(path = %dir.display(), "Failed to read directory");
            return;
        };

        let mut entries: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|e| {
                let is_dir = e.file_type().is_ok_and(|t| t.is_dir());
                let name = e.file_name().to_string_lossy().into_owned();
                (e.path(), is_dir, name)
            })
            .collect();
        entries.sort_by(|a, b| a.2.cmp(&b.2));

        for (path, is_dir, name) in entries {
            let relative = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };

            if name.starts_with('.') && !self.config.is_included(&relative) {
                continue;
            }
            if self.config.is_excluded(&relative) || path == self.config.destination {
                tracing::trace!(path = %relative, "Excluded");
                continue;
            }

            if is_dir {
                if let Some(child) = self.child_region(region, &relative, &name) {
                    self.scan_directory(&path, &relative, &child, out);
                }
            } else {
                self.classify_file(path, &name, region, out);
            }
        }
    }

    /// Region for a subdirectory, or `None` to skip it.
    fn child_region(&self, parent: &Region, relative: &str, name: &str) -> Option<Region> {
        if *parent != Region::Site {
            return Some(parent.clone());
        }

        let trimmed = |dir: &str| dir.trim_matches('/').to_owned();
        if relative == trimmed(&self.config.layouts_dir) {
            return Some(Region::Layouts);
        }
        if relative == trimmed(&self.config.includes_dir) {
            return Some(Region::Includes);
        }
        if relative == trimmed(&self.config.data_dir) {
            return Some(Region::Data);
        }
        if name == "_posts" {
            return Some(Region::Posts { drafts: false });
        }
        if name == "_drafts" {
            return self
                .config
                .show_drafts
                .then_some(Region::Posts { drafts: true });
        }
        if let Some(label) = name.strip_prefix('_')
            && relative == name
            && self.config.collections.contains_key(label)
            && label != "posts"
        {
            return Some(Region::Collection(label.to_owned()));
        }
        if name.starts_with('_') && !self.config.is_included(relative) {
            return None;
        }
        Some(Region::Site)
    }

    fn classify_file(&self, path: PathBuf, name: &str, region: &Region, out: &mut ScanResult) {
        match region {
            Region::Layouts => out.layouts.push(path),
            Region::Includes => out.includes.push(path),
            Region::Data => {
                if crate::data::is_data_file(&path) {
                    out.data.push(path);
                }
            }
            Region::Posts { drafts } => {
                let dated = path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|stem| parse_filename_date(stem).is_some());
                if self.is_markdown(&path) && (dated || *drafts) {
                    out.posts.push(path);
                } else {
                    tracing::debug!(path = %path.display(), "Ignoring post without date prefix");
                }
            }
            Region::Collection(label) => {
                if self.is_markdown(&path) {
                    out.collections.push((label.clone(), path));
                } else {
                    out.collection_files.push((label.clone(), path));
                }
            }
            Region::Site => {
                if name.starts_with('_') && !self.config.is_included(name) {
                    return;
                }
                out.candidates.push(path);
            }
        }
    }

    fn is_markdown(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.markdown_extensions.contains(&e.to_lowercase()))
    }
}
