//! Plugin capabilities and the registry that orders them.
//!
//! A plugin offers exactly one capability:
//!
//! - [`BasicPlugin`]: registers filters or tags and may seed site data
//!   before the site is read.
//! - [`GeneratorPlugin`]: produces extra files or documents after reading.
//! - [`ConverterPlugin`]: turns document bodies of some extensions into
//!   output markup.
//!
//! Within each capability plugins run in ascending priority; equal
//! priorities keep registration order. Converter selection picks the first
//! converter, in that order, that accepts the document's extension.

use std::path::PathBuf;
use std::sync::Arc;

use quire_document::Document;
use quire_site::Site;

use crate::error::PluginError;
use crate::renderer::Renderer;

/// Priority of plugins that don't choose one.
pub const DEFAULT_PRIORITY: i32 = 50;

/// Registers template extensions and seeds site data.
pub trait BasicPlugin: Send + Sync {
    /// Name for diagnostics.
    fn name(&self) -> &str;

    /// Ordering key; lower runs first.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Add filters, tags or blocks to `renderer`, or data to `site`.
    fn register(&self, renderer: &mut Renderer, site: &mut Site) -> Result<(), PluginError>;
}

/// Produces content after the site has been read.
pub trait GeneratorPlugin: Send + Sync {
    /// Name for diagnostics.
    fn name(&self) -> &str;

    /// Ordering key; lower runs first.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Generate output for `site`.
    fn generate(&self, site: &Site, renderer: &Renderer) -> Result<GeneratorOutput, PluginError>;
}

/// Converts document bodies to output markup.
pub trait ConverterPlugin: Send + Sync {
    /// Name for diagnostics.
    fn name(&self) -> &str;

    /// Ordering key; lower is tried first.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Whether this converter handles files with `extension` (no dot).
    fn matches(&self, extension: &str) -> bool;

    /// Output extension, with the dot, for inputs with `extension`.
    fn output_ext(&self, extension: &str) -> String;

    /// Convert `content` of `document`.
    fn convert(&self, content: &str, document: &Document, site: &Site) -> Result<String, PluginError>;
}

/// A plugin tagged with its capability.
#[derive(Clone)]
pub enum Plugin {
    Basic(Arc<dyn BasicPlugin>),
    Generator(Arc<dyn GeneratorPlugin>),
    Converter(Arc<dyn ConverterPlugin>),
}

/// A file written verbatim by a generator, relative to the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub content: String,
}

/// A document added to the site by a generator.
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    pub document: Document,
    /// Target collection, or `None` for pages and posts.
    pub collection: Option<String>,
    /// Add as a page rather than a post when `collection` is `None`.
    pub is_page: bool,
}

/// Everything one generator produced.
#[derive(Debug, Clone, Default)]
pub struct GeneratorOutput {
    pub files: Vec<GeneratedFile>,
    pub documents: Vec<GeneratedDocument>,
}

impl GeneratorOutput {
    /// Whether nothing was produced.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.documents.is_empty()
    }

    /// Add the generated documents to `site` and return the loose files.
    pub fn apply(self, site: &mut Site) -> Vec<GeneratedFile> {
        for generated in self.documents {
            site.add_document(
                generated.document,
                generated.collection.as_deref(),
                generated.is_page,
            );
        }
        self.files
    }
}

/// Plugins grouped by capability, each group in run order.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    basic: Vec<Arc<dyn BasicPlugin>>,
    generators: Vec<Arc<dyn GeneratorPlugin>>,
    converters: Vec<Arc<dyn ConverterPlugin>>,
}

/// Insert keeping ascending priority, after existing equal priorities.
fn insert_ordered<T: ?Sized>(list: &mut Vec<Arc<T>>, plugin: Arc<T>, priority: impl Fn(&T) -> i32) {
    let key = priority(&plugin);
    let index = list.partition_point(|p| priority(p) <= key);
    list.insert(index, plugin);
}

impl PluginRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin.
    pub fn register(&mut self, plugin: Plugin) {
        match plugin {
            Plugin::Basic(p) => {
                tracing::debug!(plugin = p.name(), "Registered basic plugin");
                insert_ordered(&mut self.basic, p, |p| p.priority());
            }
            Plugin::Generator(p) => {
                tracing::debug!(plugin = p.name(), "Registered generator");
                insert_ordered(&mut self.generators, p, |p| p.priority());
            }
            Plugin::Converter(p) => {
                tracing::debug!(plugin = p.name(), "Registered converter");
                insert_ordered(&mut self.converters, p, |p| p.priority());
            }
        }
    }

    /// Register a basic plugin.
    pub fn register_basic(&mut self, plugin: impl BasicPlugin + 'static) {
        self.register(Plugin::Basic(Arc::new(plugin)));
    }

    /// Register a generator.
    pub fn register_generator(&mut self, plugin: impl GeneratorPlugin + 'static) {
        self.register(Plugin::Generator(Arc::new(plugin)));
    }

    /// Register a converter.
    pub fn register_converter(&mut self, plugin: impl ConverterPlugin + 'static) {
        self.register(Plugin::Converter(Arc::new(plugin)));
    }

    /// Basic plugins in run order.
    pub fn basic(&self) -> &[Arc<dyn BasicPlugin>] {
        &self.basic
    }

    /// Generators in run order.
    pub fn generators(&self) -> &[Arc<dyn GeneratorPlugin>] {
        &self.generators
    }

    /// Converters in selection order.
    pub fn converters(&self) -> &[Arc<dyn ConverterPlugin>] {
        &self.converters
    }

    /// Number of registered plugins.
    pub fn len(&self) -> usize {
        self.basic.len() + self.generators.len() + self.converters.len()
    }

    /// Whether no plugin is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// First converter accepting `extension`.
    pub fn converter_for(&self, extension: &str) -> Option<&dyn ConverterPlugin> {
        let extension = extension.trim_start_matches('.');
        self.converters
            .iter()
            .find(|c| c.matches(extension))
            .map(|c| &**c)
    }

    /// Output extension for source `extension`; unconverted files keep theirs.
    pub fn output_ext(&self, extension: &str) -> String {
        let extension = extension.trim_start_matches('.');
        match self.converter_for(extension) {
            Some(converter) => converter.output_ext(extension),
            None if extension.is_empty() => String::new(),
            None => format!(".{extension}"),
        }
    }

    /// Convert a document body with the matching converter.
    ///
    /// Without a matching converter the content is returned unchanged.
    pub fn convert(&self, content: &str, document: &Document, site: &Site) -> Result<String, PluginError> {
        match self.converter_for(&document.extension()) {
            Some(converter) => converter.convert(content, document, site),
            None => Ok(content.to_owned()),
        }
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names = |list: Vec<&str>| list.join(", ");
        f.debug_struct("PluginRegistry")
            .field("basic", &names(self.basic.iter().map(|p| p.name()).collect()))
            .field("generators", &names(self.generators.iter().map(|p| p.name()).collect()))
            .field("converters", &names(self.converters.iter().map(|p| p.name()).collect()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::time::SystemTime;

    use pretty_assertions::assert_eq;
    use quire_config::Config;
    use quire_document::DocumentKind;
    use serde_json::Map;

    use super::*;

    struct Upper {
        name: &'static str,
        priority: i32,
    }

    impl ConverterPlugin for Upper {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn matches(&self, extension: &str) -> bool {
            extension == "up"
        }

        fn output_ext(&self, _extension: &str) -> String {
            ".txt".to_owned()
        }

        fn convert(&self, content: &str, _document: &Document, _site: &Site) -> Result<String, PluginError> {
            Ok(format!("{}:{}", self.name, content.to_uppercase()))
        }
    }

    struct Named(&'static str, i32);

    impl GeneratorPlugin for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn priority(&self) -> i32 {
            self.1
        }

        fn generate(&self, _site: &Site, _renderer: &Renderer) -> Result<GeneratorOutput, PluginError> {
            Ok(GeneratorOutput::default())
        }
    }

    fn document(name: &str) -> Document {
        Document::from_parts(
            PathBuf::from(format!("/site/{name}")),
            name.to_owned(),
            DocumentKind::Page,
            None,
            SystemTime::UNIX_EPOCH,
            Map::new(),
            "body".to_owned(),
        )
    }

    #[test]
    fn test_priority_then_registration_order() {
        let mut registry = PluginRegistry::new();
        registry.register_generator(Named("late", 90));
        registry.register_generator(Named("first-default", DEFAULT_PRIORITY));
        registry.register_generator(Named("early", 1));
        registry.register_generator(Named("second-default", DEFAULT_PRIORITY));

        let names: Vec<&str> = registry.generators().iter().map(|g| g.name()).collect();
        assert_eq!(names, vec!["early", "first-default", "second-default", "late"]);
        assert_eq!(registry.len(), 4);
    }

    #[test]
    fn test_converter_selection_by_priority() {
        let mut registry = PluginRegistry::new();
        registry.register_converter(Upper { name: "slow", priority: 60 });
        registry.register_converter(Upper { name: "fast", priority: 5 });

        let site = Site::new(Config::default_with_base(Path::new("/site")));
        let converted = registry.convert("hi", &document("a.up"), &site).unwrap();
        assert_eq!(converted, "fast:HI");
        assert_eq!(registry.output_ext("up"), ".txt");
    }

    #[test]
    fn test_identity_without_converter() {
        let registry = PluginRegistry::new();
        let site = Site::new(Config::default_with_base(Path::new("/site")));

        assert_eq!(registry.convert("<b>x</b>", &document("a.html"), &site).unwrap(), "<b>x</b>");
        assert_eq!(registry.output_ext("html"), ".html");
        assert_eq!(registry.output_ext(""), "");
        assert!(registry.is_empty());
    }
}
