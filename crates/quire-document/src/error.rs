//! Document construction errors.

use std::path::{Path, PathBuf};

/// Error returned when a document cannot be constructed.
///
/// The two variants let callers tell a file with bad metadata apart from a
/// file that simply could not be read.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The file could not be read or stat'ed.
    #[error("Failed to read {}: {source}", .path.display())]
    FileSystem {
        /// Path relative to the site source.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The front-matter block is malformed.
    #[error("Invalid front matter in {}: {message}", .path.display())]
    FrontMatter {
        /// Path relative to the site source.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
}

impl DocumentError {
    /// Create a file-system error.
    #[must_use]
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }

    /// Path of the offending file, relative to the site source.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::FileSystem { path, .. } | Self::FrontMatter { path, .. } => path,
        }
    }

    /// Whether this is a front-matter error.
    #[must_use]
    pub fn is_front_matter(&self) -> bool {
        matches!(self, Self::FrontMatter { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_system_error_display() {
        let err = DocumentError::io(
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            "posts/a.md",
        );

        assert_eq!(err.path(), Path::new("posts/a.md"));
        assert!(!err.is_front_matter());
        assert_eq!(err.to_string(), "Failed to read posts/a.md: denied");
    }

    #[test]
    fn test_front_matter_error_display() {
        let err = DocumentError::FrontMatter {
            path: PathBuf::from("about.md"),
            message: "Invalid YAML: bad".to_owned(),
        };

        assert!(err.is_front_matter());
        assert!(err.to_string().contains("about.md"));
        assert!(err.to_string().contains("Invalid YAML"));
    }
}
