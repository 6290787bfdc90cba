//! Markdown conversion.
//!
//! # Example
//!
//! ```ignore
//! use quire_render::{MarkdownConverter, PluginRegistry};
//!
//! let mut registry = PluginRegistry::new();
//! registry.register_converter(MarkdownConverter::from_config(site.config()));
//! ```

use pulldown_cmark::{Options, Parser, html};
use quire_config::Config;
use quire_document::Document;
use quire_site::Site;

use crate::error::PluginError;
use crate::plugin::ConverterPlugin;

/// Render CommonMark with tables, strikethrough, task lists and the other
/// GitHub extensions enabled.
pub fn markdown_to_html(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_GFM
        | Options::ENABLE_FOOTNOTES;
    let parser = Parser::new_ext(markdown, options);
    let mut output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output
}

/// Converter for the configured Markdown extensions.
#[derive(Debug, Clone)]
pub struct MarkdownConverter {
    extensions: Vec<String>,
}

impl MarkdownConverter {
    /// Converter for the given extensions (without dots, case-insensitive).
    #[must_use]
    pub fn new(extensions: Vec<String>) -> Self {
        Self {
            extensions: extensions.into_iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    /// Converter for `markdown_ext` from the site configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.markdown_extensions())
    }
}

impl ConverterPlugin for MarkdownConverter {
    fn name(&self) -> &str {
        "markdown"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn matches(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.').to_lowercase();
        self.extensions.contains(&extension)
    }

    fn output_ext(&self, _extension: &str) -> String {
        ".html".to_owned()
    }

    fn convert(&self, content: &str, _document: &Document, _site: &Site) -> Result<String, PluginError> {
        Ok(markdown_to_html(content))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_markdown_to_html() {
        assert_eq!(markdown_to_html("# Title"), "<h1>Title</h1>\n");
        assert!(markdown_to_html("| a |\n|---|\n| 1 |").contains("<table>"));
        assert!(markdown_to_html("~~gone~~").contains("<del>gone</del>"));
    }

    #[test]
    fn test_matches_configured_extensions() {
        let converter = MarkdownConverter::new(vec!["md".to_owned(), "Markdown".to_owned()]);
        assert!(converter.matches("md"));
        assert!(converter.matches(".MD"));
        assert!(converter.matches("markdown"));
        assert!(!converter.matches("html"));
        assert_eq!(converter.output_ext("md"), ".html");
    }
}
