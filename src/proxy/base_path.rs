//! External base path handling.

use std::fmt;

/// The path segment the front door places in front of every request.
///
/// Stored without a trailing slash so joins never double it; the root
/// path `/` is stored as the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BasePath(String);

impl BasePath {
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Self(String::new());
        }
        if trimmed.starts_with('/') {
            Self(trimmed.to_string())
        } else {
            Self(format!("/{trimmed}"))
        }
    }

    /// Prefix without trailing slash, e.g. `/driver-proxy/o/1/abc/8080`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Prefix with trailing slash; the application root as the caller sees it.
    pub fn root(&self) -> String {
        format!("{}/", self.0)
    }

    /// Join an absolute path onto the prefix.
    pub fn join(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }

    /// Remove the prefix from an inbound path.
    ///
    /// Returns `None` when the path does not live under the prefix. The
    /// result always starts with `/`.
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.is_root() {
            return Some(path);
        }
        let rest = path.strip_prefix(self.0.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

impl fmt::Display for BasePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root())
    }
}
