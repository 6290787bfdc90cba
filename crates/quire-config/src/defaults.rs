//! Front-matter defaults.
//!
//! A rule looks like this in `_config.yml`:
//!
//! ```yaml
//! defaults:
//!   - scope:
//!       path: "docs"
//!       type: "pages"
//!     values:
//!       layout: "doc"
//! ```
//!
//! Rules are ordered by specificity before they are applied: a deeper
//! `path` beats a shallower one, and a rule with a `type` beats an untyped
//! rule with the same path. Among equally specific rules the first one in
//! the file wins. The document's own front matter always wins over defaults.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single `defaults` entry.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct FrontMatterDefault {
    /// Which documents this rule applies to.
    pub scope: DefaultScope,
    /// Values merged into matching documents.
    pub values: Map<String, Value>,
}

/// Scope of a [`FrontMatterDefault`] rule.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DefaultScope {
    /// Path prefix (or glob when it contains `*`) relative to the source.
    /// Empty matches everything.
    pub path: String,
    /// Document type tag (`pages`, `posts`, `drafts`, a collection label).
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl DefaultScope {
    /// Whether the scope applies to a document.
    ///
    /// # Arguments
    ///
    /// * `relative_path` - Document path relative to the site source
    /// * `type_tag` - Document type tag
    pub fn matches(&self, relative_path: &str, type_tag: &str) -> bool {
        self.matches_type(type_tag) && self.matches_path(relative_path)
    }

    fn matches_type(&self, type_tag: &str) -> bool {
        match self.kind.as_deref() {
            None | Some("") => true,
            Some(kind) => normalize_type(kind) == normalize_type(type_tag),
        }
    }

    fn matches_path(&self, relative_path: &str) -> bool {
        let scope = self.path.trim_matches('/');
        if scope.is_empty() || scope == "." {
            return true;
        }
        if scope.contains('*') {
            return glob::Pattern::new(scope).is_ok_and(|p| p.matches(relative_path));
        }
        relative_path == scope
            || relative_path
                .strip_prefix(scope)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Number of path segments; used to rank rules.
    fn depth(&self) -> usize {
        self.path
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .count()
    }

    fn has_type(&self) -> bool {
        self.kind.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// Accept the singular spellings Jekyll users commonly write.
fn normalize_type(kind: &str) -> &str {
    match kind {
        "page" => "pages",
        "post" => "posts",
        "draft" => "drafts",
        other => other,
    }
}

/// Collect default values for a document.
///
/// Returns the merged mapping of every matching rule; the caller layers the
/// document's own front matter on top.
pub(crate) fn resolve(
    rules: &[FrontMatterDefault],
    relative_path: &str,
    type_tag: &str,
) -> Map<String, Value> {
    let mut matching: Vec<&FrontMatterDefault> = rules
        .iter()
        .filter(|rule| rule.scope.matches(relative_path, type_tag))
        .collect();

    // Stable sort keeps file order among equally specific rules.
    matching.sort_by(|a, b| {
        (b.scope.depth(), b.scope.has_type()).cmp(&(a.scope.depth(), a.scope.has_type()))
    });

    let mut merged = Map::new();
    for rule in matching {
        for (key, value) in &rule.values {
            if !merged.contains_key(key) {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn rule(path: &str, kind: Option<&str>, values: Value) -> FrontMatterDefault {
        FrontMatterDefault {
            scope: DefaultScope {
                path: path.to_owned(),
                kind: kind.map(str::to_owned),
            },
            values: values.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_type_only_rule() {
        let rules = vec![rule("", Some("posts"), json!({"layout": "post"}))];

        assert_eq!(
            resolve(&rules, "_posts/2024-01-01-a.md", "posts").get("layout"),
            Some(&json!("post"))
        );
        assert!(resolve(&rules, "about.md", "pages").is_empty());
    }

    #[test]
    fn test_singular_type_spelling() {
        let rules = vec![rule("", Some("page"), json!({"layout": "page"}))];

        assert_eq!(
            resolve(&rules, "about.md", "pages").get("layout"),
            Some(&json!("page"))
        );
    }

    #[test]
    fn test_more_specific_path_wins() {
        let rules = vec![
            rule("", None, json!({"layout": "default", "author": "site"})),
            rule("docs", None, json!({"layout": "doc"})),
            rule("docs/api", None, json!({"layout": "api"})),
        ];

        let merged = resolve(&rules, "docs/api/index.md", "pages");

        assert_eq!(merged.get("layout"), Some(&json!("api")));
        assert_eq!(merged.get("author"), Some(&json!("site")));
        assert_eq!(
            resolve(&rules, "docs/intro.md", "pages").get("layout"),
            Some(&json!("doc"))
        );
    }

    #[test]
    fn test_path_match_beats_type_only_match() {
        let rules = vec![
            rule("", Some("pages"), json!({"layout": "page"})),
            rule("guides", None, json!({"layout": "guide"})),
        ];

        assert_eq!(
            resolve(&rules, "guides/setup.md", "pages").get("layout"),
            Some(&json!("guide"))
        );
    }

    #[test]
    fn test_typed_rule_beats_untyped_rule_at_same_depth() {
        let rules = vec![
            rule("blog", None, json!({"layout": "plain"})),
            rule("blog", Some("posts"), json!({"layout": "post"})),
        ];

        assert_eq!(
            resolve(&rules, "blog/_posts/2024-01-01-a.md", "posts").get("layout"),
            Some(&json!("post"))
        );
    }

    #[test]
    fn test_first_rule_wins_among_equals() {
        let rules = vec![
            rule("", None, json!({"layout": "first"})),
            rule("", None, json!({"layout": "second"})),
        ];

        assert_eq!(
            resolve(&rules, "index.md", "pages").get("layout"),
            Some(&json!("first"))
        );
    }

    #[test]
    fn test_path_prefix_requires_segment_boundary() {
        let scope = DefaultScope {
            path: "doc".to_owned(),
            kind: None,
        };

        assert!(scope.matches("doc/a.md", "pages"));
        assert!(!scope.matches("docs/a.md", "pages"));
    }

    #[test]
    fn test_glob_path() {
        let scope = DefaultScope {
            path: "projects/*/index.md".to_owned(),
            kind: None,
        };

        assert!(scope.matches("projects/quire/index.md", "pages"));
        assert!(!scope.matches("projects/quire/notes.md", "pages"));
    }
}
