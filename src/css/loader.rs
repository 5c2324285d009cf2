//! Fetching linked and imported stylesheets.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Why a stylesheet could not be loaded.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("stylesheet not found: {0}")]
    NotFound(String),

    /// The sheet exists but its rules may not be read.
    #[error("stylesheet is cross-origin: {0}")]
    CrossOrigin(String),

    #[error("I/O error loading stylesheet: {0}")]
    Io(#[from] io::Error),
}

/// Source of stylesheet text for `<link>` and `@import` hrefs.
///
/// Hrefs arrive already resolved against the referring sheet.
pub trait StylesheetLoader {
    fn load(&self, href: &str) -> Result<String, LoadError>;
}

/// Loader for documents with no external stylesheets.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLoader;

impl StylesheetLoader for NoLoader {
    fn load(&self, href: &str) -> Result<String, LoadError> {
        Err(LoadError::NotFound(href.to_string()))
    }
}

/// In-memory stylesheets keyed by href.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    sheets: HashMap<String, String>,
    cross_origin: HashSet<String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, href: impl Into<String>, css: impl Into<String>) -> &mut Self {
        self.sheets.insert(href.into(), css.into());
        self
    }

    /// Register an href whose rules are inaccessible.
    pub fn insert_cross_origin(&mut self, href: impl Into<String>) -> &mut Self {
        self.cross_origin.insert(href.into());
        self
    }

    pub fn with(mut self, href: impl Into<String>, css: impl Into<String>) -> Self {
        self.insert(href, css);
        self
    }
}

impl StylesheetLoader for MemoryLoader {
    fn load(&self, href: &str) -> Result<String, LoadError> {
        if self.cross_origin.contains(href) {
            return Err(LoadError::CrossOrigin(href.to_string()));
        }
        self.sheets
            .get(href)
            .cloned()
            .ok_or_else(|| LoadError::NotFound(href.to_string()))
    }
}

/// Loads stylesheets from a directory. Absolute URLs are treated as
/// cross-origin.
#[derive(Debug, Clone)]
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl StylesheetLoader for FsLoader {
    fn load(&self, href: &str) -> Result<String, LoadError> {
        if is_remote(href) {
            return Err(LoadError::CrossOrigin(href.to_string()));
        }

        let path = strip_query(href);
        let decoded = percent_encoding::percent_decode_str(path).decode_utf8_lossy();
        let relative = decoded.trim_start_matches('/');

        // Never escape the root directory.
        if Path::new(relative)
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(LoadError::NotFound(href.to_string()));
        }

        let full = self.root.join(relative);
        let bytes = match fs::read(&full) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(LoadError::NotFound(href.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(crate::util::decode_text(&bytes, None).into_owned())
    }
}

fn is_remote(href: &str) -> bool {
    href.starts_with("http://") || href.starts_with("https://") || href.starts_with("//")
}

fn strip_query(href: &str) -> &str {
    let end = href.find(['?', '#']).unwrap_or(href.len());
    &href[..end]
}

/// Resolve `href` relative to the sheet or document it appears in.
///
/// For example, `../theme/base.css` referenced from `css/site.css` resolves
/// to `theme/base.css`. Absolute URLs and root-relative paths are returned
/// unchanged.
pub fn resolve_href(base: Option<&str>, href: &str) -> String {
    let href = href.trim();
    if href.contains("://") || href.starts_with('/') || href.starts_with("data:") {
        return href.to_string();
    }

    let base_dir = match base {
        Some(base) if !is_remote(base) => match base.rfind('/') {
            Some(pos) => &base[..pos],
            None => "",
        },
        Some(base) => match base.rfind('/') {
            Some(pos) => return format!("{}/{}", &base[..pos], href),
            None => "",
        },
        None => "",
    };

    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in href.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            name => segments.push(name),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_href() {
        assert_eq!(resolve_href(None, "site.css"), "site.css");
        assert_eq!(resolve_href(Some("css/site.css"), "base.css"), "css/base.css");
        assert_eq!(
            resolve_href(Some("css/site.css"), "../theme/base.css"),
            "theme/base.css"
        );
        assert_eq!(resolve_href(Some("css/site.css"), "./a/./b.css"), "css/a/b.css");
        assert_eq!(
            resolve_href(Some("css/site.css"), "https://cdn.example/x.css"),
            "https://cdn.example/x.css"
        );
    }

    #[test]
    fn test_memory_loader() {
        let mut loader = MemoryLoader::new();
        loader.insert("a.css", "p {}").insert_cross_origin("https://cdn/x.css");

        assert_eq!(loader.load("a.css").unwrap(), "p {}");
        assert!(matches!(loader.load("b.css"), Err(LoadError::NotFound(_))));
        assert!(matches!(
            loader.load("https://cdn/x.css"),
            Err(LoadError::CrossOrigin(_))
        ));
    }

    #[test]
    fn test_fs_loader() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css/my site.css"), "nav { --body: (hi); }").unwrap();

        let loader = FsLoader::new(dir.path());
        assert_eq!(
            loader.load("css/my%20site.css").unwrap(),
            "nav { --body: (hi); }"
        );
        assert!(matches!(
            loader.load("css/missing.css"),
            Err(LoadError::NotFound(_))
        ));
        assert!(matches!(
            loader.load("../outside.css"),
            Err(LoadError::NotFound(_))
        ));
        assert!(matches!(
            loader.load("https://example.com/a.css"),
            Err(LoadError::CrossOrigin(_))
        ));
    }
}
