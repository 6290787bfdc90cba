//! Document model for the quire site generator.
//!
//! This crate turns one source file into a [`Document`]: front matter parsed
//! from a leading YAML block, merged over configured defaults, plus the raw
//! body. It also holds the date helpers shared with template filters.
//!
//! # Example
//!
//! ```ignore
//! use std::path::Path;
//! use quire_document::{Document, DocumentKind};
//!
//! let doc = Document::load(
//!     Path::new("site/_posts/2024-01-15-hello.md"),
//!     Path::new("site"),
//!     DocumentKind::Post,
//!     None,
//!     None,
//! )
//! .await?;
//! assert_eq!(doc.slug(), "hello");
//! ```

pub mod date;
mod document;
mod error;
pub mod front_matter;

pub use document::{Document, DocumentKind, relative_path};
pub use error::DocumentError;
pub use front_matter::{FrontMatter, FrontMatterError};
