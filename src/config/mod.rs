//! Site configuration management for `platen.toml`.
//!
//! # Sections
//!
//! | Section    | Purpose                                             |
//! |------------|-----------------------------------------------------|
//! | `[site]`   | Free-form operator data, injected into every render |
//! | `[config]` | Recognized settings (`mappings` collection list)    |
//!
//! # Example
//!
//! ```toml
//! [site]
//! title = "My Blog"
//! author = "Alice"
//!
//! [[config.mappings]]
//! title = "Projects"
//! path = "/projects"
//! detail_url = "/project"
//! index_template = "projects"
//! detail_template = "project"
//! sort = "order"
//! ```

mod error;

pub use error::ConfigError;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Document extension recognized by every loader.
pub const DOC_EXT: &str = "md";

/// Root configuration structure representing platen.toml.
///
/// A missing config file is not an error: every section defaults to empty,
/// so a bare directory of pages previews fine. A *malformed* file or mapping
/// is fatal at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PressConfig {
    /// Free-form site metadata, passed verbatim to templates as `global.site`
    #[serde(default)]
    pub site: toml::Table,

    /// Recognized configuration keys
    #[serde(default)]
    pub config: SectionConfig,
}

/// `[config]` section - settings the compiler itself interprets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SectionConfig {
    /// Operator-defined collections, each an index/detail route pair
    #[serde(default)]
    pub mappings: Vec<MappingConfig>,
}

/// Sort policy for a collection listing.
///
/// `Order`: ascending by the `order` frontmatter key, entries without it
/// last. `Created`: descending by `created`, entries without it first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortPolicy {
    #[default]
    Order,
    Created,
}

/// One `[[config.mappings]]` record - an operator-defined collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingConfig {
    /// Listing title passed to the index template
    pub title: String,

    /// Source folder, rooted at `/` relative to the content root
    pub path: String,

    /// Index route, defaults to `path`
    #[serde(default)]
    pub index_url: Option<String>,

    /// Detail route prefix, defaults to `path`
    #[serde(default)]
    pub detail_url: Option<String>,

    /// Template for the listing view
    pub index_template: String,

    /// Template for the per-entry view
    pub detail_template: String,

    /// Listing sort policy
    #[serde(default)]
    pub sort: SortPolicy,
}

impl MappingConfig {
    /// Index route normalized to trailing-slash form, e.g. `/projects/`.
    pub fn index_url(&self) -> String {
        let url = self.index_url.as_deref().unwrap_or(&self.path);
        format!("{}/", url.trim_end_matches('/'))
    }

    /// Detail route prefix normalized to trailing-slash form.
    pub fn detail_url(&self) -> String {
        let url = self.detail_url.as_deref().unwrap_or(&self.path);
        format!("{}/", url.trim_end_matches('/'))
    }

    /// Reject mappings whose routes are not rooted at `/`.
    ///
    /// Called while the route table is built, before any request is served:
    /// a bad mapping fails the whole startup rather than producing a
    /// partially-configured route table.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("path", self.path.as_str()),
            ("index_url", self.index_url.as_deref().unwrap_or("/")),
            ("detail_url", self.detail_url.as_deref().unwrap_or("/")),
        ] {
            if !value.starts_with('/') {
                bail!(ConfigError::Validation(format!(
                    "mapping \"{}\": `{field}` must start with /",
                    self.title
                )));
            }
        }
        Ok(())
    }
}

impl PressConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: PressConfig = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path. Missing file yields defaults.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => return Err(ConfigError::Io(path.to_path_buf(), err).into()),
        };
        Self::from_str(&content)
    }
}

/// Fixed directory layout under the content root.
///
/// | Folder            | Role                                      |
/// |-------------------|-------------------------------------------|
/// | `pages/`          | Nested page documents                     |
/// | `posts/`          | Flat dated-post documents                 |
/// | `raw/`            | Verbatim passthrough files                |
/// | `static/`         | Site asset mount                          |
/// | `templates/`      | Operator templates, shadow theme ones     |
/// | `theme/static/`   | Theme asset mount                         |
/// | `theme/templates/`| Theme templates (`custom/` overrides)     |
/// | `build/`          | Static build output                       |
#[derive(Debug, Clone)]
pub struct Paths {
    pub root: PathBuf,
    pub pages: PathBuf,
    pub posts: PathBuf,
    pub raw: PathBuf,
    pub static_dir: PathBuf,
    pub templates: PathBuf,
    pub theme_static: PathBuf,
    pub theme_templates: PathBuf,
    pub build: PathBuf,
}

impl Paths {
    pub fn new(root: &Path) -> Self {
        let root = normalize_path(root);
        Self {
            pages: root.join("pages"),
            posts: root.join("posts"),
            raw: root.join("raw"),
            static_dir: root.join("static"),
            templates: root.join("templates"),
            theme_static: root.join("theme").join("static"),
            theme_templates: root.join("theme").join("templates"),
            build: root.join("build"),
            root,
        }
    }

    /// Config file location within the content root.
    pub fn config_file(&self) -> PathBuf {
        self.root.join("platen.toml")
    }
}

/// Normalize a path to absolute, using canonicalize if the path exists
fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}
