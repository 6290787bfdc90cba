//! Custom template tags.

mod include;

pub(crate) use include::{IncludeKind, IncludeTag};
