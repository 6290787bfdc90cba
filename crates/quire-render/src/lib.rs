//! Liquid rendering for quire sites.
//!
//! [`Renderer`] turns documents into output: it converts the body with the
//! matching [`ConverterPlugin`], renders it as a Liquid template, then wraps
//! it in the document's layout chain. Templates see `site`, `page`,
//! `content` and `layout`, plus Jekyll's filters and the `include`,
//! `include_relative` and `include_cached` tags.
//!
//! Lookups of missing keys render empty instead of failing, so templates
//! can probe optional front matter freely.
//!
//! # Plugins
//!
//! [`PluginRegistry`] holds [`BasicPlugin`]s (register filters and tags,
//! seed data), [`GeneratorPlugin`]s (add files and documents after reading)
//! and [`ConverterPlugin`]s (body conversion), each ordered by priority.

mod convert;
mod error;
mod filters;
mod partials;
mod plugin;
mod renderer;
mod tags;
mod value;

pub use convert::{MarkdownConverter, markdown_to_html};
pub use error::{PluginError, RenderError};
pub use filters::{FilterFn, FnFilter};
pub use plugin::{
    BasicPlugin, ConverterPlugin, DEFAULT_PRIORITY, GeneratedDocument, GeneratedFile,
    GeneratorOutput, GeneratorPlugin, Plugin, PluginRegistry,
};
pub use renderer::Renderer;
pub use value::{TemplateArray, TemplateObject, TemplateValue};

/// Template engine types needed to write filters and tags.
pub use liquid_core;
