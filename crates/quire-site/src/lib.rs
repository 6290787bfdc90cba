//! Site model for the quire static-site generator.
//!
//! [`Site`] aggregates every source file of a site: pages, posts, layouts,
//! includes, named collections, `_data` files and static files. It is filled
//! by the asynchronous [`Site::read`] and then handed to the renderer.
//!
//! # Classification
//!
//! | Location | Role |
//! |---|---|
//! | `_layouts/**` | layout, keyed by path without extension |
//! | `_includes/**` | include, keyed by path with extension |
//! | `_data/**` | YAML/JSON/CSV/TSV data, nested by directory |
//! | `_posts/YYYY-MM-DD-title.md` | post |
//! | `_<label>/**` | collection member, for configured labels |
//! | anything else with front matter | page |
//! | everything else | static file |

mod data;
mod error;
mod scanner;
mod site;
mod static_file;
pub mod url;

pub use data::{DATA_EXTENSIONS, parse_data};
pub use error::{DataError, SiteError};
pub use site::{Site, create_site_from_config};
pub use static_file::StaticFile;
