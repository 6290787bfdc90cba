//! Environment variable expansion for configuration strings.
//!
//! Supports:
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//!
//! Paths additionally get `~` expanded to the home directory.

use std::path::{Path, PathBuf};

use crate::ConfigError;

/// Expand environment variable references in a string.
///
/// Returns the original string unchanged if no `${}` patterns are present,
/// so URLs containing a bare `$` survive untouched.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    shellexpand::env_with_context(value, |var| -> Result<Option<String>, LookupError> {
        match std::env::var(var) {
            Ok(val) => Ok(Some(val)),
            Err(_) => Err(LookupError {
                var_name: var.to_owned(),
            }),
        }
    })
    .map(std::borrow::Cow::into_owned)
    .map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: format!("${{{0}}} not set", e.cause.var_name),
    })
}

/// Expand a leading `~` in a configured path.
///
/// Non UTF-8 paths are returned as-is.
pub(crate) fn expand_tilde(path: &Path) -> PathBuf {
    match path.to_str() {
        Some(s) if s.starts_with('~') => PathBuf::from(shellexpand::tilde(s).into_owned()),
        _ => path.to_path_buf(),
    }
}

/// Error returned when environment variable lookup fails.
struct LookupError {
    var_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_with_default_uses_default() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("QUIRE_UNSET_URL");
        }
        let result = expand_env("${QUIRE_UNSET_URL:-http://localhost:4000}", "url").unwrap();
        assert_eq!(result, "http://localhost:4000");
    }

    #[test]
    fn test_expand_embedded_var() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::set_var("QUIRE_HOST_TEST", "example.com");
        }
        let result = expand_env("https://${QUIRE_HOST_TEST}", "url").unwrap();
        assert_eq!(result, "https://example.com");
        unsafe {
            std::env::remove_var("QUIRE_HOST_TEST");
        }
    }

    #[test]
    fn test_expand_missing_var_error() {
        // SAFETY: test runs single-threaded per test function
        unsafe {
            std::env::remove_var("QUIRE_MISSING_TEST");
        }
        let err = expand_env("${QUIRE_MISSING_TEST}", "baseurl").unwrap_err();
        assert!(matches!(err, ConfigError::EnvVar { .. }));
        assert!(err.to_string().contains("QUIRE_MISSING_TEST"));
        assert!(err.to_string().contains("baseurl"));
    }

    #[test]
    fn test_bare_dollar_not_expanded() {
        let result = expand_env("/blog/$draft", "baseurl").unwrap();
        assert_eq!(result, "/blog/$draft");
    }

    #[test]
    fn test_expand_tilde_leaves_relative_paths() {
        assert_eq!(expand_tilde(Path::new("_site")), PathBuf::from("_site"));
    }
}
