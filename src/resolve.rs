//! Bidirectional mapping between content paths and public URLs.
//!
//! Forward resolution turns a root-relative content reference into the URL
//! it is published under; backward resolution turns a requested URL into the
//! pages file that answers it. The two directions are mutual inverses on
//! the canonical page and post forms, which is what lets the live preview
//! and the static build emit byte-identical links.
//!
//! # Reference families (forward)
//!
//! | Reference                        | URL                              |
//! |----------------------------------|----------------------------------|
//! | `/posts/2021-08-23-hello.md`     | `<root>/post/2021/08/23/hello/`  |
//! | `/pages/about/index.md`          | `<root>/about/`                  |
//! | `/pages/foo/bar.md`              | `<root>/foo/bar.html`            |
//! | `/raw/foo/baz.html`              | `<root>/foo/baz.html`            |
//! | anything else                    | unchanged                        |

use crate::utils::fs::safe_join;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Dated-post filename stem: `YYYY-MM-DD-slug`.
static POST_STEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})-(.+)$").unwrap());

/// Dated-post detail URL: `/post/YYYY/MM/DD/slug/`.
static POST_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/post/(\d{4})/(\d{2})/(\d{2})/([^/]+)/$").unwrap());

/// Resolves content paths to public URLs and back.
#[derive(Debug, Clone)]
pub struct UrlResolver {
    /// Application root URL path, trailing slash stripped. Empty for live
    /// preview; the path component of `--url-root` for static builds.
    root: String,
    pages_dir: PathBuf,
}

impl UrlResolver {
    pub fn new(url_root: &str, pages_dir: PathBuf) -> Self {
        Self {
            root: url_root.trim_end_matches('/').to_string(),
            pages_dir,
        }
    }

    /// The resolved application root (no trailing slash).
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Base URL for static assets, with trailing slash.
    pub fn static_url(&self) -> String {
        format!("{}/static/", self.root)
    }

    /// Forward resolution: root-relative content path to public URL.
    ///
    /// References outside the three content families pass through unchanged,
    /// so external-looking or already-public hrefs are never mangled.
    pub fn path_to_url(&self, path: &str) -> String {
        if let Some(rest) = path.strip_prefix("/posts/") {
            // Exactly the first three hyphens separate the date components;
            // hyphens inside the slug survive.
            let dated = rest.splitn(4, '-').collect::<Vec<_>>().join("/");
            let tail = match dated.strip_suffix(".md") {
                Some(stem) => format!("{stem}/"),
                None => dated,
            };
            format!("{}/post/{}", self.root, tail)
        } else if let Some(rest) = path.strip_prefix("/pages/") {
            let tail = if let Some(stem) = rest.strip_suffix("index.md") {
                stem.to_string()
            } else if let Some(stem) = rest.strip_suffix(".md") {
                format!("{stem}.html")
            } else {
                rest.to_string()
            };
            format!("{}/{}", self.root, tail)
        } else if let Some(rest) = path.strip_prefix("/raw/") {
            format!("{}/{}", self.root, rest)
        } else {
            path.to_string()
        }
    }

    /// Detail URL for a dated post file stem, or `None` when the stem does
    /// not carry a date prefix.
    pub fn post_url(&self, stem: &str) -> Option<String> {
        POST_STEM.is_match(stem).then(|| {
            let dated = stem.splitn(4, '-').collect::<Vec<_>>().join("/");
            format!("{}/post/{}/", self.root, dated)
        })
    }

    /// Public URL of a page addressed by its site-relative URL path.
    pub fn page_url(&self, rel_url: &str) -> String {
        format!("{}/{}", self.root, rel_url)
    }

    /// Backward resolution: site-relative URL to a file under `pages/`.
    ///
    /// `None` means not-found: either the join escaped the pages root or the
    /// URL shape cannot name a page. Existence is the caller's concern.
    pub fn page_path(&self, rel_url: &str) -> Option<PathBuf> {
        let joined = safe_join(&self.pages_dir, rel_url)?;
        if rel_url.is_empty() || rel_url.ends_with('/') {
            Some(joined.join("index.md"))
        } else if rel_url.ends_with(".html") {
            Some(joined.with_extension("md"))
        } else {
            let mut with_ext = joined.into_os_string();
            with_ext.push(".md");
            Some(PathBuf::from(with_ext))
        }
    }

    /// Backward resolution for dated-post URLs: `/post/YYYY/MM/DD/slug/`
    /// to the `YYYY-MM-DD-slug.md` filename inside the posts folder.
    pub fn post_path(&self, path: &str, posts_dir: &Path) -> Option<PathBuf> {
        let caps = POST_URL.captures(path)?;
        let filename = format!("{}-{}-{}-{}.md", &caps[1], &caps[2], &caps[3], &caps[4]);
        safe_join(posts_dir, &filename)
    }
}
