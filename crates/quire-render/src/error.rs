//! Render and plugin errors.

/// Error returned when rendering fails.
///
/// Missing and circular layouts have their own variants so tooling can
/// point at the layout rather than at a generic template failure.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A document or layout names a layout that does not exist.
    #[error("Layout '{name}' not found (requested by {document})")]
    MissingLayout {
        /// Requested layout name.
        name: String,
        /// Document being rendered.
        document: String,
    },
    /// The layout chain revisits a layout.
    #[error("Circular layout reference detected: {chain}")]
    CircularLayout {
        /// Layout names in visit order, ending with the repeated one.
        chain: String,
    },
    /// Template parse or evaluation failed.
    #[error("Template error in {path}: {source}")]
    Template {
        /// Template being rendered.
        path: String,
        /// Engine error.
        #[source]
        source: liquid::Error,
    },
    /// A converter plugin failed.
    #[error("Conversion failed for {path}: {source}")]
    Converter {
        /// Document being converted.
        path: String,
        /// Plugin error.
        #[source]
        source: PluginError,
    },
    /// Any other plugin failure.
    #[error(transparent)]
    Plugin(#[from] PluginError),
}

impl RenderError {
    pub(crate) fn template(path: impl Into<String>, source: liquid::Error) -> Self {
        Self::Template {
            path: path.into(),
            source,
        }
    }
}

/// Error returned by plugins.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// Plugin-specific failure.
    #[error("Plugin '{plugin}' failed: {message}")]
    Failed {
        /// Plugin name.
        plugin: String,
        /// Description.
        message: String,
    },
    /// A render requested by the plugin failed.
    #[error(transparent)]
    Render(Box<RenderError>),
}

impl PluginError {
    /// Create a plugin failure.
    #[must_use]
    pub fn failed(plugin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            plugin: plugin.into(),
            message: message.into(),
        }
    }
}

impl From<RenderError> for PluginError {
    fn from(e: RenderError) -> Self {
        Self::Render(Box::new(e))
    }
}
