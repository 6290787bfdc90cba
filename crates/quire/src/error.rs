//! CLI error types.

use quire_config::ConfigError;
use quire_render::PluginError;
use quire_site::SiteError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Site(#[from] SiteError),

    #[error("{0}")]
    Plugin(#[from] PluginError),

    #[error("{failed} of {total} documents failed to render")]
    Render { failed: usize, total: usize },
}
