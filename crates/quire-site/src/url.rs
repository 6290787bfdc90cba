//! Permalink expansion and slug generation.
//!
//! URLs are produced from templates such as `/:categories/:year/:month/:day/:title:output_ext`.
//! Placeholder values are percent-encoded; the template text is not.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Timelike, Utc};
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use quire_config::Config;
use quire_document::{Document, DocumentKind};
use regex::Regex;

/// Characters escaped inside placeholder values.
const PATH_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

static SLUG_DEFAULT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{M}\p{L}\p{Nd}]+").expect("static regex is valid"));
static SLUG_PRETTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\p{M}\p{L}\p{Nd}._~!$&'()+,;=@]+").expect("static regex is valid")
});
static SLUG_ASCII: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9]+").expect("static regex is valid"));
static SLUG_RAW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex is valid"));
static MULTI_SLASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/{2,}").expect("static regex is valid"));

/// Character classes [`slugify`] replaces with hyphens.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SlugMode {
    /// Only lowercase.
    None,
    /// Replace whitespace.
    Raw,
    /// Replace everything but letters, marks and digits.
    #[default]
    Default,
    /// Like `Default`, but keep URL-safe punctuation.
    Pretty,
    /// Replace everything but ASCII letters and digits.
    Ascii,
    /// Transliterate to ASCII first, then behave like `Default`.
    Latin,
}

impl SlugMode {
    /// Parse a mode name; unknown names fall back to [`SlugMode::Default`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "none" => Self::None,
            "raw" => Self::Raw,
            "pretty" => Self::Pretty,
            "ascii" => Self::Ascii,
            "latin" => Self::Latin,
            _ => Self::Default,
        }
    }
}

/// Turn `input` into a URL slug.
///
/// Runs of replaced characters collapse to one hyphen; leading and trailing
/// hyphens are removed. Output is lowercased unless `cased` is set.
pub fn slugify(input: &str, mode: SlugMode, cased: bool) -> String {
    let slug = match mode {
        SlugMode::None => input.to_owned(),
        SlugMode::Raw => SLUG_RAW.replace_all(input, "-").into_owned(),
        SlugMode::Default => SLUG_DEFAULT.replace_all(input, "-").into_owned(),
        SlugMode::Pretty => SLUG_PRETTY.replace_all(input, "-").into_owned(),
        SlugMode::Ascii => SLUG_ASCII.replace_all(input, "-").into_owned(),
        SlugMode::Latin => SLUG_DEFAULT
            .replace_all(&deunicode::deunicode(input), "-")
            .into_owned(),
    };
    let slug = if mode == SlugMode::None {
        slug
    } else {
        slug.trim_matches('-').to_owned()
    };
    if cased { slug } else { slug.to_lowercase() }
}

/// Template for a named permalink style, or `None` for a custom template.
pub fn style_template(style: &str) -> Option<&'static str> {
    match style {
        "date" => Some("/:categories/:year/:month/:day/:title:output_ext"),
        "pretty" => Some("/:categories/:year/:month/:day/:title/"),
        "ordinal" => Some("/:categories/:year/:y_day/:title:output_ext"),
        "weekdate" => Some("/:categories/:year/W:week/:short_day/:title:output_ext"),
        "none" => Some("/:categories/:title:output_ext"),
        _ => None,
    }
}

/// Replace `:name` placeholders and normalize slashes.
///
/// Longer placeholder names are substituted first so `:i_month` is never
/// mistaken for `:month`.
pub fn expand_permalink(template: &str, placeholders: &[(&str, String)]) -> String {
    let mut ordered: Vec<&(&str, String)> = placeholders.iter().collect();
    ordered.sort_by_key(|(name, _)| std::cmp::Reverse(name.len()));

    let mut url = template.to_owned();
    for (name, value) in ordered {
        url = url.replace(&format!(":{name}"), value);
    }
    let url = MULTI_SLASH.replace_all(&url, "/");
    if url.starts_with('/') {
        url.into_owned()
    } else {
        format!("/{url}")
    }
}

/// Percent-encode a placeholder value, keeping `/` separators.
pub fn escape_path(value: &str) -> String {
    utf8_percent_encode(value, PATH_ESCAPE).to_string()
}

/// Compute the URL of a document.
///
/// # Arguments
///
/// * `document` - Page, post or collection member
/// * `config` - Site configuration (permalink style, collection settings)
/// * `output_ext` - Output extension including the dot, e.g. `.html`
/// * `site_time` - Fallback date for documents without one
pub fn document_url(
    document: &Document,
    config: &Config,
    output_ext: &str,
    site_time: DateTime<Utc>,
) -> String {
    match document.kind() {
        DocumentKind::Page => page_url(document, config, output_ext),
        DocumentKind::Post => {
            let template = document
                .permalink()
                .map_or_else(|| template_for(&config.permalink), str::to_owned);
            expand_permalink(&template, &placeholders(document, output_ext, site_time))
        }
        DocumentKind::Collection => {
            let label = document.collection().unwrap_or_default();
            let template = document.permalink().map_or_else(
                || {
                    config
                        .collections
                        .get(label)
                        .and_then(|c| c.permalink.as_deref())
                        .map_or_else(
                            || {
                                if config.permalink == "pretty" {
                                    "/:collection/:path/".to_owned()
                                } else {
                                    "/:collection/:path:output_ext".to_owned()
                                }
                            },
                            template_for,
                        )
                },
                str::to_owned,
            );
            expand_permalink(&template, &placeholders(document, output_ext, site_time))
        }
        DocumentKind::Layout | DocumentKind::Include => String::new(),
    }
}

fn template_for(style: &str) -> String {
    style_template(style).map_or_else(|| style.to_owned(), str::to_owned)
}

fn page_url(document: &Document, config: &Config, output_ext: &str) -> String {
    let relative = document.relative_path();
    let dir = relative.rsplit_once('/').map_or("", |(dir, _)| dir);
    let basename = document.basename();

    if let Some(permalink) = document.permalink() {
        let values = [
            ("path", escape_path(dir)),
            ("basename", escape_path(basename)),
            ("output_ext", output_ext.to_owned()),
        ];
        return expand_permalink(permalink, &values);
    }

    let dir = escape_path(dir);
    if basename == "index" && output_ext == ".html" {
        return expand_permalink(&format!("/{dir}/"), &[]);
    }
    if config.permalink == "pretty" && output_ext == ".html" {
        return expand_permalink(&format!("/{dir}/{}/", escape_path(basename)), &[]);
    }
    expand_permalink(&format!("/{dir}/{}{output_ext}", escape_path(basename)), &[])
}

fn placeholders(
    document: &Document,
    output_ext: &str,
    site_time: DateTime<Utc>,
) -> Vec<(&'static str, String)> {
    let date = document.date().unwrap_or(site_time);
    let categories: Vec<String> = {
        let mut seen = Vec::new();
        for category in document.categories() {
            let lower = category.to_lowercase();
            if !seen.contains(&lower) {
                seen.push(lower);
            }
        }
        seen
    };
    let collection_path = collection_relative_path(document);

    vec![
        ("year", date.format("%Y").to_string()),
        ("short_year", date.format("%y").to_string()),
        ("month", date.format("%m").to_string()),
        ("i_month", date.month().to_string()),
        ("short_month", date.format("%b").to_string()),
        ("long_month", date.format("%B").to_string()),
        ("day", date.format("%d").to_string()),
        ("i_day", date.day().to_string()),
        ("y_day", format!("{:03}", date.ordinal())),
        ("week", date.format("%V").to_string()),
        ("short_day", date.format("%a").to_string()),
        ("hour", format!("{:02}", date.hour())),
        ("minute", format!("{:02}", date.minute())),
        ("second", format!("{:02}", date.second())),
        (
            "title",
            escape_path(&slugify(&document.slug(), SlugMode::Pretty, true)),
        ),
        (
            "slug",
            escape_path(&slugify(&document.slug(), SlugMode::Default, false)),
        ),
        (
            "name",
            escape_path(&slugify(document.basename(), SlugMode::Default, false)),
        ),
        ("categories", escape_path(&categories.join("/"))),
        (
            "collection",
            escape_path(document.collection().unwrap_or("posts")),
        ),
        ("path", escape_path(&collection_path)),
        ("output_ext", output_ext.to_owned()),
    ]
}

/// Path inside the collection directory, without extension.
fn collection_relative_path(document: &Document) -> String {
    let relative = document.relative_path();
    let inner = relative.split_once('/').map_or(relative, |(_, rest)| rest);
    match inner.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_owned(),
        _ => inner.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::SystemTime;

    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(kind: DocumentKind, relative: &str, collection: Option<&str>, raw: &str) -> Document {
        let source = Path::new("/site");
        Document::parse(
            &source.join(relative),
            source,
            kind,
            collection,
            SystemTime::UNIX_EPOCH,
            raw,
            None,
        )
        .unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(0, 0).unwrap()
    }

    #[test]
    fn test_slugify_modes() {
        assert_eq!(slugify("Hello, World!", SlugMode::Default, false), "hello-world");
        assert_eq!(slugify("  The _config.yml file?", SlugMode::Pretty, false), "the-_config.yml-file");
        assert_eq!(slugify("Hello World", SlugMode::Raw, false), "hello-world");
        assert_eq!(slugify("Café au lait", SlugMode::Ascii, false), "caf-au-lait");
        assert_eq!(slugify("Café au lait", SlugMode::Latin, false), "cafe-au-lait");
        assert_eq!(slugify("Keep Case", SlugMode::Default, true), "Keep-Case");
        assert_eq!(slugify("As Is!", SlugMode::None, false), "as is!");
    }

    #[test]
    fn test_expand_permalink_longest_first() {
        let url = expand_permalink(
            "/:year/:i_month/:month/:title/",
            &[
                ("year", "2024".to_owned()),
                ("month", "01".to_owned()),
                ("i_month", "1".to_owned()),
                ("title", "x".to_owned()),
            ],
        );
        assert_eq!(url, "/2024/1/01/x/");
    }

    #[test]
    fn test_expand_permalink_collapses_slashes() {
        assert_eq!(
            expand_permalink("/:categories/:title.html", &[
                ("categories", String::new()),
                ("title", "a".to_owned())
            ]),
            "/a.html"
        );
    }

    #[test]
    fn test_post_url_date_style() {
        let post = parse(
            DocumentKind::Post,
            "_posts/2024-01-15-hello-world.md",
            None,
            "---\ncategories: [Rust, Web]\n---\n",
        );
        let config = Config::default();
        assert_eq!(
            document_url(&post, &config, ".html", now()),
            "/rust/web/2024/01/15/hello-world.html"
        );
    }

    #[test]
    fn test_post_url_pretty_and_custom() {
        let post = parse(DocumentKind::Post, "_posts/2024-01-15-hello.md", None, "---\n---\n");
        let mut config = Config::default();
        config.permalink = "pretty".to_owned();
        assert_eq!(document_url(&post, &config, ".html", now()), "/2024/01/15/hello/");

        config.permalink = "/blog/:year/:slug:output_ext".to_owned();
        assert_eq!(document_url(&post, &config, ".html", now()), "/blog/2024/hello.html");
    }

    #[test]
    fn test_front_matter_permalink_wins() {
        let post = parse(
            DocumentKind::Post,
            "_posts/2024-01-15-hello.md",
            None,
            "---\npermalink: /custom/:title/\n---\n",
        );
        assert_eq!(
            document_url(&post, &Config::default(), ".html", now()),
            "/custom/hello/"
        );
    }

    #[test]
    fn test_page_urls() {
        let config = Config::default();
        let index = parse(DocumentKind::Page, "docs/index.md", None, "---\n---\n");
        let about = parse(DocumentKind::Page, "about.md", None, "---\n---\n");
        let feed = parse(DocumentKind::Page, "feed.xml", None, "---\n---\n");

        assert_eq!(document_url(&index, &config, ".html", now()), "/docs/");
        assert_eq!(document_url(&about, &config, ".html", now()), "/about.html");
        assert_eq!(document_url(&feed, &config, ".xml", now()), "/feed.xml");
    }

    #[test]
    fn test_page_url_escapes_spaces() {
        let page = parse(DocumentKind::Page, "my notes.md", None, "---\n---\n");
        assert_eq!(
            document_url(&page, &Config::default(), ".html", now()),
            "/my%20notes.html"
        );
    }

    #[test]
    fn test_collection_url() {
        let doc = parse(
            DocumentKind::Collection,
            "_recipes/soups/tomato.md",
            Some("recipes"),
            "---\n---\n",
        );
        assert_eq!(
            document_url(&doc, &Config::default(), ".html", now()),
            "/recipes/soups/tomato.html"
        );
    }
}
