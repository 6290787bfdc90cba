//! URL filters.

use std::sync::LazyLock;

use liquid_core::model::{Value, ValueView};
use regex::Regex;

use super::{FilterContext, FnFilter, property, text};

static SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("static regex is valid"));

pub(super) fn filters(context: &FilterContext) -> Vec<FnFilter> {
    let baseurl = context.baseurl.clone();
    let site_url = context.url.clone();
    let relative_base = baseurl.clone();

    vec![
        FnFilter::new("relative_url", move |input, _args| {
            Ok(url_input(input).map_or(Value::Nil, |path| {
                Value::scalar(relative_url(&path, &relative_base))
            }))
        }),
        FnFilter::new("absolute_url", move |input, _args| {
            Ok(url_input(input).map_or(Value::Nil, |path| {
                Value::scalar(absolute_url(&path, &baseurl, &site_url))
            }))
        }),
    ]
}

/// The path a URL filter operates on: the input itself, or its `url`
/// property when given a document.
fn url_input(input: &dyn ValueView) -> Option<String> {
    if input.is_nil() {
        return None;
    }
    if input.as_object().is_some() {
        return property(input, "url").map(|v| text(v));
    }
    Some(text(input))
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("//") || SCHEME.is_match(url)
}

fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{path}")
    }
}

/// Prefix a site path with the base URL.
///
/// Absolute URLs pass through unchanged.
pub(crate) fn relative_url(input: &str, baseurl: &str) -> String {
    if is_absolute(input) {
        return input.to_owned();
    }
    let base = baseurl.trim_end_matches('/');
    let base = if base.is_empty() {
        String::new()
    } else {
        ensure_leading_slash(base)
    };
    format!("{base}{}", ensure_leading_slash(input))
}

/// Prefix a site path with the site URL and base URL.
///
/// Without a configured site URL this is [`relative_url`].
pub(crate) fn absolute_url(input: &str, baseurl: &str, site_url: &str) -> String {
    if is_absolute(input) {
        return input.to_owned();
    }
    let relative = relative_url(input, baseurl);
    let site_url = site_url.trim_end_matches('/');
    format!("{site_url}{relative}")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::filters::test_support::{apply, s};
    use crate::value::TemplateValue;

    #[test]
    fn test_relative_url() {
        assert_eq!(relative_url("/about", "/blog"), "/blog/about");
        assert_eq!(relative_url("about", "blog/"), "/blog/about");
        assert_eq!(relative_url("", "/blog"), "/blog/");
        assert_eq!(relative_url("/about", ""), "/about");
        assert_eq!(relative_url("https://x.org/a", "/blog"), "https://x.org/a");
    }

    #[test]
    fn test_absolute_url() {
        assert_eq!(
            absolute_url("/about", "/blog", "https://example.com"),
            "https://example.com/blog/about"
        );
        assert_eq!(
            absolute_url("/about", "", "https://example.com/"),
            "https://example.com/about"
        );
        assert_eq!(absolute_url("/about", "/blog", ""), "/blog/about");
        assert_eq!(absolute_url("mailto:a@b.c", "/blog", "https://x"), "mailto:a@b.c");
    }

    #[test]
    fn test_filters_use_site_settings() {
        assert_eq!(
            apply("absolute_url", &s("/about"), &[]).to_kstr().as_str(),
            "https://example.com/blog/about"
        );
        assert!(apply("relative_url", &Value::Nil, &[]).is_nil());
    }

    #[test]
    fn test_document_input_uses_url() {
        let page = TemplateValue::from_json(&json!({"url": "/posts/a.html"}));
        let value = apply("relative_url", &page.to_value(), &[]);
        assert_eq!(value.to_kstr().as_str(), "/blog/posts/a.html");
    }
}
