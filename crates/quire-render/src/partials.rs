//! Include resolution and the partial store behind the include tags.
//!
//! Include sources are keyed by name relative to the includes directory
//! (`nav/menu.html`). `include_relative` targets are keyed by their path
//! relative to the site source, behind [`RELATIVE_PREFIX`] so the two
//! namespaces can't collide. Sources are read once and kept until the site
//! cache is invalidated.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use liquid_core::partials::PartialSource;
use liquid_core::{Error, Result};
use quire_config::Config;
use quire_deps::DependencyTracker;
use quire_document::{front_matter, relative_path};
use quire_site::Site;

use crate::tags::IncludeKind;

/// Partial-name prefix for `include_relative` targets.
pub(crate) const RELATIVE_PREFIX: &str = "relative:";

/// Lexically normalize `path`: drop `.` and apply `..`.
///
/// A `..` only cancels a preceding normal segment; leading `..` segments
/// are kept and `..` at the root stays at the root.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Absolute, normalized form of the site source.
fn absolute_root(source: &Path) -> PathBuf {
    let source = if source.as_os_str().is_empty() {
        Path::new(".")
    } else {
        source
    };
    normalize(&std::path::absolute(source).unwrap_or_else(|_| source.to_path_buf()))
}

/// A resolved include target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Resolved {
    /// Key in the partial store.
    pub partial: String,
    /// Source-relative path recorded as a dependency.
    pub dependency: String,
}

/// Shared state of the include tags.
#[derive(Debug)]
pub(crate) struct IncludeEnv {
    source: PathBuf,
    includes_root: PathBuf,
    deps: Arc<DependencyTracker>,
    sources: RwLock<HashMap<String, Arc<str>>>,
    outputs: RwLock<HashMap<String, String>>,
}

impl IncludeEnv {
    pub(crate) fn new(config: &Config, deps: Arc<DependencyTracker>) -> Self {
        let source = absolute_root(&config.source);
        let includes_root = normalize(&source.join(config.includes_dir.trim_matches('/')));
        Self {
            source,
            includes_root,
            deps,
            sources: RwLock::new(HashMap::new()),
            outputs: RwLock::new(HashMap::new()),
        }
    }

    /// Load every include the site read into the store.
    pub(crate) fn preload(&self, site: &Site) {
        let mut sources = self.sources.write().unwrap_or_else(PoisonError::into_inner);
        for (name, include) in site.includes() {
            sources.insert(name.clone(), Arc::from(include.content()));
        }
        tracing::debug!(count = sources.len(), "Preloaded includes");
    }

    /// Forget stored sources and `include_cached` output.
    pub(crate) fn clear(&self) {
        self.sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.outputs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Resolve an include name for the document at `current`.
    ///
    /// `current` is the including document's source-relative path; without
    /// it, relative includes resolve against the source root.
    pub(crate) fn resolve(
        &self,
        kind: IncludeKind,
        name: &str,
        current: Option<&str>,
    ) -> Result<Resolved> {
        let (root, target) = match kind {
            IncludeKind::Include | IncludeKind::Cached => {
                (&self.includes_root, normalize(&self.includes_root.join(name)))
            }
            IncludeKind::Relative => {
                let base = current
                    .and_then(|doc| normalize(&self.source.join(doc)).parent().map(Path::to_path_buf))
                    .unwrap_or_else(|| self.source.clone());
                (&self.source, normalize(&base.join(name)))
            }
        };

        if root.as_os_str().is_empty() || !target.starts_with(root) || target == *root {
            let scope = match kind {
                IncludeKind::Relative => "source",
                IncludeKind::Include | IncludeKind::Cached => "includes",
            };
            return Err(Error::with_msg(format!(
                "Invalid path: '{name}' resolves outside the {scope} directory"
            )));
        }

        let partial = match kind {
            IncludeKind::Relative => format!("{RELATIVE_PREFIX}{}", relative_path(&target, &self.source)),
            IncludeKind::Include | IncludeKind::Cached => relative_path(&target, &self.includes_root),
        };

        if !self.is_stored(&partial) {
            if !target.exists() {
                return Err(Error::with_msg(format!("File not found: '{name}'")));
            }
            if !target.is_file() {
                return Err(Error::with_msg(format!("Path is not a file: '{name}'")));
            }
        }

        Ok(Resolved {
            partial,
            dependency: relative_path(&target, &self.source),
        })
    }

    /// Record that `document` used `dependency`.
    pub(crate) fn record(&self, document: &str, dependency: &str) {
        self.deps.add_dependency(document, dependency);
    }

    pub(crate) fn cached_output(&self, key: &str) -> Option<String> {
        self.outputs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub(crate) fn store_output(&self, key: String, output: String) {
        self.outputs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, output);
    }

    fn is_stored(&self, partial: &str) -> bool {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(partial)
    }

    fn path_for(&self, partial: &str) -> PathBuf {
        match partial.strip_prefix(RELATIVE_PREFIX) {
            Some(relative) => self.source.join(relative),
            None => self.includes_root.join(partial),
        }
    }

    /// Source text of `partial`, reading and storing it on first use.
    fn text(&self, partial: &str) -> Option<Arc<str>> {
        if let Some(text) = self
            .sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(partial)
        {
            return Some(Arc::clone(text));
        }

        let path = self.path_for(partial);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read include");
                return None;
            }
        };
        let body = match front_matter::parse(&raw) {
            Ok(parsed) => parsed.content,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring malformed include front matter");
                raw
            }
        };

        let text: Arc<str> = Arc::from(body);
        self.sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(partial.to_owned(), Arc::clone(&text));
        Some(text)
    }
}

/// Partial source handed to the template engine.
#[derive(Debug, Clone)]
pub(crate) struct IncludeSource(pub Arc<IncludeEnv>);

impl PartialSource for IncludeSource {
    fn contains(&self, name: &str) -> bool {
        self.0.is_stored(name) || self.0.path_for(name).is_file()
    }

    fn names(&self) -> Vec<&str> {
        Vec::new()
    }

    fn try_get<'a>(&'a self, name: &str) -> Option<Cow<'a, str>> {
        self.0.text(name).map(|text| Cow::Owned(text.to_string()))
    }

    fn get<'a>(&'a self, name: &str) -> Result<Cow<'a, str>> {
        self.try_get(name)
            .ok_or_else(|| Error::with_msg(format!("File not found: '{name}'")))
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;

    use super::*;

    fn env(root: &Path) -> IncludeEnv {
        IncludeEnv::new(&Config::default_with_base(root), Arc::new(DependencyTracker::new()))
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
        assert_eq!(normalize(Path::new("../../b")), PathBuf::from("../../b"));
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize(Path::new(".")), PathBuf::new());
    }

    #[test]
    fn test_relative_source_is_anchored() {
        let env = IncludeEnv::new(
            &Config::default_with_base(Path::new(".")),
            Arc::new(DependencyTracker::new()),
        );
        assert!(env.source.is_absolute());

        let err = env
            .resolve(IncludeKind::Relative, "../secret.txt", Some("index.md"))
            .unwrap_err();
        assert!(err.to_string().contains("resolves outside the source directory"));
        let err = env
            .resolve(IncludeKind::Relative, "../../secret.txt", Some("docs/page.md"))
            .unwrap_err();
        assert!(err.to_string().contains("resolves outside the source directory"));
    }

    #[test]
    fn test_resolve_include() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("_includes/nav")).unwrap();
        fs::write(dir.path().join("_includes/nav/menu.html"), "menu").unwrap();
        let env = env(dir.path());

        let resolved = env.resolve(IncludeKind::Include, "nav/menu.html", None).unwrap();
        assert_eq!(resolved.partial, "nav/menu.html");
        assert_eq!(resolved.dependency, "_includes/nav/menu.html");

        let err = env.resolve(IncludeKind::Include, "../secret.txt", None).unwrap_err();
        assert!(err.to_string().contains("Invalid path: '../secret.txt'"));
        let err = env.resolve(IncludeKind::Include, "missing.html", None).unwrap_err();
        assert!(err.to_string().contains("File not found: 'missing.html'"));
        let err = env.resolve(IncludeKind::Include, "nav", None).unwrap_err();
        assert!(err.to_string().contains("Path is not a file: 'nav'"));
    }

    #[test]
    fn test_resolve_relative_to_document() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docs/parts")).unwrap();
        fs::write(dir.path().join("docs/parts/intro.md"), "intro").unwrap();
        let env = env(dir.path());

        let resolved = env
            .resolve(IncludeKind::Relative, "parts/intro.md", Some("docs/guide.md"))
            .unwrap();
        assert_eq!(resolved.partial, "relative:docs/parts/intro.md");
        assert_eq!(resolved.dependency, "docs/parts/intro.md");

        let err = env
            .resolve(IncludeKind::Relative, "../../etc/passwd", Some("docs/guide.md"))
            .unwrap_err();
        assert!(err.to_string().contains("resolves outside the source directory"));
    }

    #[test]
    fn test_text_is_read_once_and_cleared() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("_includes")).unwrap();
        let path = dir.path().join("_includes/note.html");
        fs::write(&path, "---\ntitle: x\n---\nfirst").unwrap();
        let env = env(dir.path());

        assert_eq!(env.text("note.html").as_deref(), Some("first"));
        fs::write(&path, "second").unwrap();
        assert_eq!(env.text("note.html").as_deref(), Some("first"));

        env.clear();
        assert_eq!(env.text("note.html").as_deref(), Some("second"));
    }

    #[test]
    fn test_cached_output_cleared() {
        let dir = tempfile::tempdir().unwrap();
        let env = env(dir.path());
        env.store_output("k".to_owned(), "v".to_owned());
        assert_eq!(env.cached_output("k"), Some("v".to_owned()));
        env.clear();
        assert_eq!(env.cached_output("k"), None);
    }
}
