//! Request path resolution.
//!
//! Maps a URL path onto the served directory. Normalization is purely
//! lexical and happens before the containment check; the filesystem is only
//! consulted to pick the default index for the root path.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;

/// Request path escapes the served directory.
#[derive(Debug, thiserror::Error)]
#[error("Access denied: {path}")]
pub(crate) struct AccessDenied {
    path: String,
}

impl AccessDenied {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_owned(),
        }
    }
}

/// Result of resolving a request path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ResolvedPath {
    /// Filesystem path inside the served directory.
    pub(crate) path: PathBuf,
    /// Normalized route, always starting with `/`.
    pub(crate) route: String,
    /// Whether the request path ended with `/`.
    pub(crate) trailing_slash: bool,
}

impl ResolvedPath {
    /// Whether this is the served directory itself.
    pub(crate) fn is_root(&self) -> bool {
        self.route == "/"
    }
}

/// Canonical directory the server is allowed to expose.
#[derive(Clone, Debug)]
pub(crate) struct ServeRoot {
    root: PathBuf,
}

impl ServeRoot {
    /// Canonicalize `path` and use it as the served directory.
    pub(crate) fn new(path: &Path) -> std::io::Result<Self> {
        Ok(Self {
            root: path.canonicalize()?,
        })
    }

    /// Canonical path of the served directory.
    pub(crate) fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve a raw (still percent-encoded) request path.
    ///
    /// An empty or `/` path defaults to `/index.php` when that script exists,
    /// else `/index.html`. Any `..` that would climb above the served
    /// directory is rejected rather than clamped.
    pub(crate) fn resolve(&self, request_path: &str) -> Result<ResolvedPath, AccessDenied> {
        let decoded = percent_decode_str(request_path).decode_utf8_lossy();

        let raw = if decoded.is_empty() || decoded == "/" {
            if self.root.join("index.php").is_file() {
                "/index.php"
            } else {
                "/index.html"
            }
        } else {
            decoded.as_ref()
        };

        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split(['/', '\\']) {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(AccessDenied::new(request_path));
                    }
                }
                s => segments.push(s),
            }
        }

        let mut path = self.root.clone();
        path.extend(&segments);
        if !path.starts_with(&self.root) {
            return Err(AccessDenied::new(request_path));
        }

        Ok(ResolvedPath {
            path,
            route: format!("/{}", segments.join("/")),
            trailing_slash: raw.len() > 1 && raw.ends_with('/'),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn serve_root() -> (TempDir, ServeRoot) {
        let dir = TempDir::new().unwrap();
        let root = ServeRoot::new(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn test_resolve_simple_path() {
        let (_dir, root) = serve_root();

        let resolved = root.resolve("/css/site.css").unwrap();

        assert_eq!(resolved.path, root.path().join("css").join("site.css"));
        assert_eq!(resolved.route, "/css/site.css");
        assert!(!resolved.trailing_slash);
    }

    #[test]
    fn test_resolve_collapses_dot_segments() {
        let (_dir, root) = serve_root();

        let resolved = root.resolve("/a/./b/../page.html").unwrap();

        assert_eq!(resolved.route, "/a/page.html");
        assert_eq!(resolved.path, root.path().join("a").join("page.html"));
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let (_dir, root) = serve_root();

        assert!(root.resolve("/../../etc/passwd").is_err());
        assert!(root.resolve("/a/../../secret").is_err());
        assert!(root.resolve("/..").is_err());
    }

    #[test]
    fn test_resolve_rejects_encoded_escape() {
        let (_dir, root) = serve_root();

        assert!(root.resolve("/%2e%2e/%2e%2e/etc/passwd").is_err());
        assert!(root.resolve("/a/..%2f..%2fetc").is_err());
        assert!(root.resolve("/..\\..\\windows").is_err());
    }

    #[test]
    fn test_resolve_inside_root_keeps_prefix() {
        let (_dir, root) = serve_root();

        for path in ["/x", "/x/y/../z", "/./q.php", "//double//slash.js"] {
            let resolved = root.resolve(path).unwrap();
            assert!(resolved.path.starts_with(root.path()), "{path}");
        }
    }

    #[test]
    fn test_resolve_decodes_percent_escapes() {
        let (_dir, root) = serve_root();

        let resolved = root.resolve("/my%20page.html").unwrap();

        assert_eq!(resolved.path, root.path().join("my page.html"));
    }

    #[test]
    fn test_resolve_root_prefers_index_php() {
        let (dir, root) = serve_root();
        std::fs::write(dir.path().join("index.php"), "<?php echo 1;").unwrap();
        std::fs::write(dir.path().join("index.html"), "<p>1</p>").unwrap();

        let resolved = root.resolve("/").unwrap();

        assert_eq!(resolved.route, "/index.php");
        assert_eq!(resolved.path, root.path().join("index.php"));
    }

    #[test]
    fn test_resolve_root_falls_back_to_index_html() {
        let (_dir, root) = serve_root();

        let resolved = root.resolve("").unwrap();

        assert_eq!(resolved.route, "/index.html");
        assert!(!resolved.is_root());
    }

    #[test]
    fn test_resolve_trailing_slash() {
        let (_dir, root) = serve_root();

        let resolved = root.resolve("/docs/").unwrap();

        assert_eq!(resolved.route, "/docs");
        assert!(resolved.trailing_slash);
    }

    #[test]
    fn test_resolve_dot_path_is_root() {
        let (_dir, root) = serve_root();

        let resolved = root.resolve("/./").unwrap();

        assert!(resolved.is_root());
        assert_eq!(resolved.path, root.path());
    }
}
