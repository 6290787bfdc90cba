//! Dependency tracking for incremental builds.
//!
//! [`DependencyTracker`] records which layouts and includes each document
//! used while it was rendered. Keys are paths relative to the site source
//! (`about.md`, `_layouts/default.html`, `_includes/nav.html`), the same
//! keys the site model uses for its registries.
//!
//! The tracker keeps forward (document -> dependencies) and reverse
//! (dependency -> documents) mappings so a changed include can be mapped
//! back to the documents that must be re-rendered.
//!
//! # Thread Safety
//!
//! Renders run in parallel, so every operation takes `&self` and the graph
//! lives behind an `RwLock`. Concurrent writes to the same document are
//! merged as a set union.

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

type PathSet = HashSet<String>;

#[derive(Debug, Default)]
struct Graph {
    /// Document -> files it used.
    forward: HashMap<String, PathSet>,
    /// File -> documents that used it.
    reverse: HashMap<String, PathSet>,
}

impl Graph {
    fn insert(&mut self, document: &str, dependency: &str) -> bool {
        let added = self
            .forward
            .entry(document.to_owned())
            .or_default()
            .insert(dependency.to_owned());
        if added {
            self.reverse
                .entry(dependency.to_owned())
                .or_default()
                .insert(document.to_owned());
        }
        added
    }

    fn remove(&mut self, document: &str) {
        let Some(old) = self.forward.remove(document) else {
            return;
        };
        for dep in old {
            if let Some(dependents) = self.reverse.get_mut(&dep) {
                dependents.remove(document);
                if dependents.is_empty() {
                    self.reverse.remove(&dep);
                }
            }
        }
    }
}

/// Build-scoped document dependency graph.
///
/// # Invariants
/// - Each dependency is recorded at most once per document
/// - Forward and reverse mappings are always consistent
/// - A document never depends on itself
#[derive(Debug, Default)]
pub struct DependencyTracker {
    graph: RwLock<Graph>,
}

impl DependencyTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `document` used `dependency`.
    ///
    /// Idempotent: recording the same pair twice has no additional effect.
    /// Self references are ignored.
    pub fn add_dependency(&self, document: &str, dependency: &str) {
        if document == dependency {
            return;
        }
        if self.write().insert(document, dependency) {
            tracing::trace!(document, dependency, "Recorded dependency");
        }
    }

    /// Dependencies recorded for `document`, sorted for stable output.
    ///
    /// Returns an empty list for unknown documents.
    #[must_use]
    pub fn get_dependencies(&self, document: &str) -> Vec<String> {
        let graph = self.read();
        let mut deps: Vec<String> = graph
            .forward
            .get(document)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        deps.sort();
        deps
    }

    /// Documents that used `dependency`, sorted.
    ///
    /// This is the lookup an incremental rebuild needs when a layout or
    /// include changes on disk.
    #[must_use]
    pub fn dependents_of(&self, dependency: &str) -> Vec<String> {
        let graph = self.read();
        let mut docs: Vec<String> = graph
            .reverse
            .get(dependency)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        docs.sort();
        docs
    }

    /// Whether `document` has `dependency` recorded.
    #[must_use]
    pub fn has_dependency(&self, document: &str, dependency: &str) -> bool {
        self.read()
            .forward
            .get(document)
            .is_some_and(|set| set.contains(dependency))
    }

    /// Forget everything recorded for `document`.
    ///
    /// Used before re-rendering a single document so stale edges vanish.
    pub fn remove_document(&self, document: &str) {
        self.write().remove(document);
    }

    /// Drop all recorded dependencies.
    ///
    /// Called at the start of each full build.
    pub fn clear(&self) {
        let mut graph = self.write();
        graph.forward.clear();
        graph.reverse.clear();
    }

    /// Number of documents with at least one dependency.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().forward.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().forward.is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, Graph> {
        self.graph.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Graph> {
        self.graph.write().unwrap_or_else(PoisonError::into_inner)
    }
}
