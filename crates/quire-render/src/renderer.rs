//! Template rendering with layouts, includes and plugins.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use quire_render::{MarkdownConverter, PluginRegistry, Renderer};
//!
//! let mut registry = PluginRegistry::new();
//! registry.register_converter(MarkdownConverter::from_config(site.config()));
//!
//! let renderer = Renderer::new(&site, Arc::new(registry));
//! renderer.preload_site_data(&site);
//! let html = renderer.render_document(&site, &site.pages()[0])?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use liquid_core::model::{Value, ValueView};
use liquid_core::parser::{ParseBlock, ParseFilter, ParseTag};
use liquid_core::partials::OnDemandCompiler;
use quire_deps::DependencyTracker;
use quire_document::Document;
use quire_site::Site;
use serde_json::Map;

use crate::error::RenderError;
use crate::filters::{self, FilterContext, FnFilter};
use crate::partials::{IncludeEnv, IncludeSource};
use crate::plugin::PluginRegistry;
use crate::tags::{IncludeKind, IncludeTag};
use crate::value::{Globals, TemplateObject, TemplateValue};

type TagFactory = Arc<dyn Fn() -> Box<dyn ParseTag> + Send + Sync>;
type BlockFactory = Arc<dyn Fn() -> Box<dyn ParseBlock> + Send + Sync>;

/// Path reported for templates rendered through [`Renderer::render`].
const INLINE_TEMPLATE: &str = "<template>";

/// Renders documents and ad-hoc templates for one site.
///
/// Rendering takes `&self` and may run on many threads at once. The
/// template-facing `site` value is built once and shared by every render
/// until [`invalidate_site_cache`](Self::invalidate_site_cache) is called;
/// call that after mutating the site between renders.
///
/// Every layout and include used while rendering a document is recorded in
/// [`dependencies`](Self::dependencies).
pub struct Renderer {
    filters: Vec<FnFilter>,
    tags: Vec<(String, TagFactory)>,
    blocks: Vec<(String, BlockFactory)>,
    plugins: Arc<PluginRegistry>,
    deps: Arc<DependencyTracker>,
    includes: Arc<IncludeEnv>,
    parser: RwLock<Option<Arc<liquid::Parser>>>,
    site_value: RwLock<Option<Arc<TemplateValue>>>,
    layouts: RwLock<HashMap<String, Arc<liquid::Template>>>,
}

impl Renderer {
    /// Create a renderer for `site` with the given plugins.
    ///
    /// The built-in filters and the `include`, `include_relative` and
    /// `include_cached` tags are registered; basic plugins are not run.
    pub fn new(site: &Site, plugins: Arc<PluginRegistry>) -> Self {
        let config = site.config();
        let deps = Arc::new(DependencyTracker::new());
        let includes = Arc::new(IncludeEnv::new(config, Arc::clone(&deps)));

        let context = FilterContext {
            baseurl: config.baseurl.clone(),
            url: config.url.clone(),
        };

        let mut renderer = Self {
            filters: filters::builtin(&context),
            tags: Vec::new(),
            blocks: Vec::new(),
            plugins,
            deps,
            includes: Arc::clone(&includes),
            parser: RwLock::new(None),
            site_value: RwLock::new(None),
            layouts: RwLock::new(HashMap::new()),
        };
        for kind in [IncludeKind::Include, IncludeKind::Relative, IncludeKind::Cached] {
            renderer.register_tag(IncludeTag::new(kind, Arc::clone(&includes)));
        }
        renderer
    }

    /// Register a filter function, replacing any filter with the same name.
    pub fn register_filter<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&dyn ValueView, &[Value]) -> liquid_core::Result<Value> + Send + Sync + 'static,
    {
        self.filters.retain(|f| f.name() != name);
        self.filters.push(FnFilter::new(name, func));
        self.reset_parser();
    }

    /// Register a tag, replacing any tag with the same name.
    pub fn register_tag<T>(&mut self, tag: T)
    where
        T: ParseTag + Clone + 'static,
    {
        let name = tag.reflection().tag().to_owned();
        self.tags.retain(|(existing, _)| *existing != name);
        self.tags
            .push((name, Arc::new(move || Box::new(tag.clone()) as Box<dyn ParseTag>)));
        self.reset_parser();
    }

    /// Register a block tag, replacing any block with the same name.
    pub fn register_block<T>(&mut self, block: T)
    where
        T: ParseBlock + Clone + 'static,
    {
        let name = block.reflection().start_tag().to_owned();
        self.blocks.retain(|(existing, _)| *existing != name);
        self.blocks
            .push((name, Arc::new(move || Box::new(block.clone()) as Box<dyn ParseBlock>)));
        self.reset_parser();
    }

    /// Registered plugins.
    pub fn plugins(&self) -> &Arc<PluginRegistry> {
        &self.plugins
    }

    /// Layouts and includes each rendered document used.
    pub fn dependencies(&self) -> &Arc<DependencyTracker> {
        &self.deps
    }

    /// Render an ad-hoc template.
    ///
    /// # Arguments
    ///
    /// * `site` - Site providing the `site` variable
    /// * `template` - Template source
    /// * `context` - Additional root variables; these shadow `site`
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Template`] if the template fails to parse or
    /// evaluate.
    pub fn render(
        &self,
        site: &Site,
        template: &str,
        context: &Map<String, serde_json::Value>,
    ) -> Result<String, RenderError> {
        let globals = Globals::new(self.site_value(site), TemplateObject::from_map(context));
        self.render_source(INLINE_TEMPLATE, template, &globals)
    }

    /// Render a document through its converter and layout chain.
    ///
    /// The body is converted first, then rendered as a template with `page`
    /// and `site` in scope. Each layout is then rendered with `content`
    /// holding the output so far and `layout` holding the layout's front
    /// matter, until a layout names no parent.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::MissingLayout`] for an unknown layout,
    /// [`RenderError::CircularLayout`] if the chain revisits a layout,
    /// [`RenderError::Converter`] if conversion fails and
    /// [`RenderError::Template`] for template errors.
    pub fn render_document(&self, site: &Site, document: &Document) -> Result<String, RenderError> {
        let path = document.relative_path();
        let converted = self
            .plugins
            .convert(document.content(), document, site)
            .map_err(|source| RenderError::Converter {
                path: path.to_owned(),
                source,
            })?;

        let site_value = self.site_value(site);
        let mut page = TemplateObject::from_map(&document.to_json());
        page.insert("content", TemplateValue::string(converted.as_str()));
        let page = TemplateValue::Object(page);

        let mut entries = TemplateObject::default();
        entries.insert("page", page.clone());
        let mut output =
            self.render_source(path, &converted, &Globals::new(Arc::clone(&site_value), entries))?;

        let mut chain: Vec<String> = Vec::new();
        let mut next = document.layout().map(str::to_owned);
        while let Some(name) = next {
            if chain.contains(&name) {
                chain.push(name);
                return Err(RenderError::CircularLayout {
                    chain: chain.join(" -> "),
                });
            }
            let layout = site
                .get_layout(&name)
                .ok_or_else(|| RenderError::MissingLayout {
                    name: name.clone(),
                    document: path.to_owned(),
                })?;
            self.deps.add_dependency(path, layout.relative_path());

            let mut entries = TemplateObject::default();
            entries.insert("page", page.clone());
            entries.insert("content", TemplateValue::string(output));
            entries.insert("layout", TemplateValue::Object(TemplateObject::from_map(layout.data())));

            let template = self.layout_template(layout)?;
            output = template
                .render(&Globals::new(Arc::clone(&site_value), entries))
                .map_err(|e| RenderError::template(layout.relative_path(), e))?;

            next = layout.layout().map(str::to_owned);
            chain.push(name);
        }

        tracing::debug!(document = %path, layouts = chain.len(), "Rendered document");
        Ok(output)
    }

    /// Build the shared `site` value and load every include up front.
    ///
    /// Calling it again without an invalidation in between does nothing
    /// new.
    pub fn preload_site_data(&self, site: &Site) {
        drop(self.site_value(site));
        self.includes.preload(site);
    }

    /// Drop the shared `site` value, cached layouts, stored include sources
    /// and `include_cached` output.
    pub fn invalidate_site_cache(&self) {
        *self
            .site_value
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.layouts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.includes.clear();
        tracing::debug!("Invalidated site cache");
    }

    fn site_value(&self, site: &Site) -> Arc<TemplateValue> {
        if let Some(value) = self
            .site_value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Arc::clone(value);
        }
        let value = Arc::new(TemplateValue::Object(TemplateObject::from_map(&site.to_json())));
        *self
            .site_value
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&value));
        value
    }

    fn reset_parser(&mut self) {
        *self.parser.get_mut().unwrap_or_else(PoisonError::into_inner) = None;
        self.layouts
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn parser(&self) -> Result<Arc<liquid::Parser>, RenderError> {
        if let Some(parser) = self
            .parser
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(Arc::clone(parser));
        }

        let mut builder = liquid::ParserBuilder::with_stdlib()
            .partials(OnDemandCompiler::new(IncludeSource(Arc::clone(&self.includes))));
        for filter in &self.filters {
            builder = builder.filter(Box::new(filter.clone()) as Box<dyn ParseFilter>);
        }
        for (_, tag) in &self.tags {
            builder = builder.tag(tag());
        }
        for (_, block) in &self.blocks {
            builder = builder.block(block());
        }
        let parser = Arc::new(
            builder
                .build()
                .map_err(|e| RenderError::template("<parser>", e))?,
        );

        *self.parser.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&parser));
        Ok(parser)
    }

    fn render_source(&self, path: &str, source: &str, globals: &Globals) -> Result<String, RenderError> {
        let template = self
            .parser()?
            .parse(source)
            .map_err(|e| RenderError::template(path, e))?;
        template
            .render(globals)
            .map_err(|e| RenderError::template(path, e))
    }

    fn layout_template(&self, layout: &Document) -> Result<Arc<liquid::Template>, RenderError> {
        let key = layout.relative_path();
        if let Some(template) = self
            .layouts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Ok(Arc::clone(template));
        }

        let template = Arc::new(
            self.parser()?
                .parse(layout.content())
                .map_err(|e| RenderError::template(key, e))?,
        );
        self.layouts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), Arc::clone(&template));
        Ok(template)
    }
}

impl fmt::Debug for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderer")
            .field("filters", &self.filters.len())
            .field("tags", &self.tags.len())
            .field("blocks", &self.blocks.len())
            .field("plugins", &self.plugins)
            .finish_non_exhaustive()
    }
}
