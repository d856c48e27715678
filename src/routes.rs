//! Route table and request handling.
//!
//! A `Site` is built once at startup and then answers site-relative paths,
//! for the preview server and the static build alike. Both go through the
//! same `handle` path so their output cannot drift apart.
//!
//! Dispatch order per request:
//! 1. operator mapping index URLs;
//! 2. operator mapping detail URLs (single trailing segment);
//! 3. `/` - the built-in posts index;
//! 4. `/post/YYYY/MM/DD/slug/` - a dated post;
//! 5. backward resolution into `pages/`;
//! 6. verbatim lookup under `raw/`;
//! 7. not-found.

use crate::collection::load_entries;
use crate::config::{DOC_EXT, MappingConfig, Paths, PressConfig, SortPolicy};
use crate::entry::{Entry, load_entry};
use crate::resolve::UrlResolver;
use crate::templates::TemplateEngine;
use crate::utils::fs::safe_join;
use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

/// One operator mapping, resolved against the content root.
///
/// URLs are held in normalized trailing-slash form so request matching is a
/// plain comparison.
#[derive(Debug, Clone)]
pub struct MappingRoute {
    pub title: String,
    pub folder: PathBuf,
    pub index_url: String,
    pub detail_url: String,
    pub index_template: String,
    pub detail_template: String,
    pub sort: SortPolicy,
}

impl MappingRoute {
    fn from_config(mapping: &MappingConfig, root: &Path) -> Result<Self> {
        mapping.validate()?;
        let Some(folder) = safe_join(root, &mapping.path) else {
            bail!("mapping \"{}\": `path` escapes the content root", mapping.title);
        };
        Ok(Self {
            title: mapping.title.clone(),
            folder,
            index_url: mapping.index_url(),
            detail_url: mapping.detail_url(),
            index_template: mapping.index_template.clone(),
            detail_template: mapping.detail_template.clone(),
            sort: mapping.sort,
        })
    }
}

/// Outcome of handling one site-relative path.
pub enum Resolved {
    /// A rendered document.
    Html(String),
    /// A file to serve or copy verbatim.
    File(PathBuf),
    NotFound,
}

pub struct Site {
    pub config: PressConfig,
    pub paths: Paths,
    pub resolver: UrlResolver,
    pub routes: Vec<MappingRoute>,
    templates: TemplateEngine,
}

impl Site {
    /// Construct a site rooted at `root`, emitting URLs under `url_root`
    /// (empty for live preview).
    ///
    /// Fails fast: a malformed config or mapping aborts startup instead of
    /// surfacing per request.
    pub fn load(root: &Path, url_root: &str) -> Result<Self> {
        let paths = Paths::new(root);
        let config = PressConfig::from_path(&paths.config_file())?;
        let routes = config
            .config
            .mappings
            .iter()
            .map(|m| MappingRoute::from_config(m, &paths.root))
            .collect::<Result<Vec<_>>>()?;
        let templates = TemplateEngine::new(&paths.templates, &paths.theme_templates)?;
        let resolver = UrlResolver::new(url_root, paths.pages.clone());
        Ok(Self {
            config,
            paths,
            resolver,
            routes,
            templates,
        })
    }

    /// Handle one site-relative path (leading `/`, percent-decoded, no query
    /// string).
    pub fn handle(&self, path: &str) -> Result<Resolved> {
        for route in &self.routes {
            if path == route.index_url {
                return self.mapping_index(route).map(Resolved::Html);
            }
            if let Some(name) = single_segment(path, &route.detail_url) {
                return self.mapping_detail(route, name);
            }
        }

        if path == "/" {
            return self.posts_index().map(Resolved::Html);
        }
        if let Some(file) = self.resolver.post_path(path, &self.paths.posts) {
            return self.post_detail(&file, path);
        }

        let rel_url = path.trim_start_matches('/');
        if let Some(file) = self.resolver.page_path(rel_url) {
            if let Some(html) = self.page(&file, rel_url)? {
                return Ok(Resolved::Html(html));
            }
        }

        self.raw_file(path)
    }

    /// The rendered not-found document. Used for live 404 responses and for
    /// the `404.html` the static build always emits.
    pub fn not_found_page(&self) -> Result<String> {
        let ctx = self.templates.base_context(&self.config);
        self.templates.render("404", &ctx)
    }

    /// Listing for one mapping, entry URLs attached. Public because the
    /// static build enumerates detail pages from the same listing.
    pub fn mapping_entries(&self, route: &MappingRoute) -> Result<Vec<Entry>> {
        let mut entries = load_entries(&route.folder, true, route.sort, &self.resolver)?;
        for entry in &mut entries {
            entry.url = Some(format!(
                "{}{}{}/",
                self.resolver.root(),
                route.detail_url,
                entry.stem()
            ));
        }
        Ok(entries)
    }

    /// Listing of the built-in posts collection, newest first. Every listed
    /// post must carry a date-prefixed filename, otherwise it has no URL to
    /// attach and the whole listing fails.
    pub fn post_entries(&self) -> Result<Vec<Entry>> {
        let mut entries =
            load_entries(&self.paths.posts, true, SortPolicy::Created, &self.resolver)?;
        for entry in &mut entries {
            let Some(url) = self.resolver.post_url(entry.stem()) else {
                bail!(
                    "Post filename {} is not of the form YYYY-MM-DD-slug",
                    entry.file.display()
                );
            };
            entry.url = Some(url);
        }
        Ok(entries)
    }

    fn mapping_index(&self, route: &MappingRoute) -> Result<String> {
        let entries = self.mapping_entries(route)?;
        let mut ctx = self.templates.base_context(&self.config);
        ctx.insert("title", &route.title);
        ctx.insert("entries", &entries);
        self.templates.render(&route.index_template, &ctx)
    }

    fn mapping_detail(&self, route: &MappingRoute, name: &str) -> Result<Resolved> {
        let Some(file) = safe_join(&route.folder, &format!("{name}.{DOC_EXT}")) else {
            return Ok(Resolved::NotFound);
        };
        let Some(mut entry) = load_entry(&file, false, &self.resolver)? else {
            return Ok(Resolved::NotFound);
        };
        entry.url = Some(format!(
            "{}{}{name}/",
            self.resolver.root(),
            route.detail_url
        ));
        let mut ctx = self.templates.base_context(&self.config);
        ctx.insert("entry", &entry);
        Ok(Resolved::Html(
            self.templates.render(&route.detail_template, &ctx)?,
        ))
    }

    fn posts_index(&self) -> Result<String> {
        let entries = self.post_entries()?;
        let mut ctx = self.templates.base_context(&self.config);
        ctx.insert("title", "Posts");
        ctx.insert("entries", &entries);
        self.templates.render("index", &ctx)
    }

    fn post_detail(&self, file: &Path, path: &str) -> Result<Resolved> {
        let Some(mut entry) = load_entry(file, false, &self.resolver)? else {
            return Ok(Resolved::NotFound);
        };
        entry.url = Some(format!("{}{path}", self.resolver.root()));
        let mut ctx = self.templates.base_context(&self.config);
        ctx.insert("entry", &entry);
        Ok(Resolved::Html(self.templates.render("post", &ctx)?))
    }

    /// `Ok(None)` when no page answers this URL; the caller falls through to
    /// the raw lookup.
    fn page(&self, file: &Path, rel_url: &str) -> Result<Option<String>> {
        let Some(mut entry) = load_entry(file, false, &self.resolver)? else {
            return Ok(None);
        };
        entry.url = Some(self.resolver.page_url(rel_url));
        let template = entry.template_override().unwrap_or("page").to_string();
        let mut ctx = self.templates.base_context(&self.config);
        ctx.insert("entry", &entry);
        self.templates
            .render(&template, &ctx)
            .with_context(|| format!("Failed to render {}", file.display()))
            .map(Some)
    }

    fn raw_file(&self, path: &str) -> Result<Resolved> {
        let candidate = if path.ends_with('/') {
            format!("{path}index.html")
        } else {
            path.to_string()
        };
        match safe_join(&self.paths.raw, &candidate) {
            Some(file) if file.is_file() => Ok(Resolved::File(file)),
            _ => Ok(Resolved::NotFound),
        }
    }
}

/// The single path segment following `prefix`, for detail URLs of the form
/// `<prefix><name>/`.
fn single_segment<'a>(path: &'a str, prefix: &str) -> Option<&'a str> {
    let name = path.strip_prefix(prefix)?.strip_suffix('/')?;
    (!name.is_empty() && !name.contains('/')).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// A small fixture site exercising every route family.
    fn fixture_site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();

        write(
            root,
            "platen.toml",
            r#"
[site]
title = "Fixture"

[[config.mappings]]
title = "Projects"
path = "/projects"
detail_url = "/project"
index_template = "projects"
detail_template = "project"
sort = "order"
"#,
        );

        write(root, "theme/templates/index.html", "{{ title }}:{% for e in entries %}{{ e.title }}@{{ e.url }};{% endfor %}");
        write(root, "theme/templates/post.html", "post:{{ entry.title }}:{{ entry.content }}");
        write(root, "theme/templates/page.html", "page:{{ entry.title }}:{{ entry.url }}");
        write(root, "theme/templates/wide.html", "wide:{{ entry.title }}");
        write(root, "theme/templates/projects.html", "{{ title }}:{% for e in entries %}{{ e.url }};{% endfor %}");
        write(root, "theme/templates/project.html", "project:{{ entry.title }}");
        write(root, "theme/templates/404.html", "lost ({{ global.site.title }})");

        write(root, "posts/2021-08-23-hello.md", "---\ntitle: Hello\ncreated: 2021-08-23\n---\nFirst *post*");
        write(root, "posts/2021-09-01-later.md", "---\ntitle: Later\ncreated: 2021-09-01\n---\nSecond");
        write(root, "posts/2021-09-02-quiet.md", "---\ntitle: Quiet\ncreated: 2021-09-02\nhidden: true\n---\nUnlisted");

        write(root, "pages/about/index.md", "---\ntitle: About\n---\nAbout body");
        write(root, "pages/notes/tips.md", "---\ntitle: Tips\ntemplate: wide\n---\nTips body");

        write(root, "projects/alpha.md", "---\ntitle: Alpha\norder: 1\n---\nAlpha body");
        write(root, "projects/beta.md", "---\ntitle: Beta\norder: 2\n---\nBeta body");

        write(root, "raw/robots.txt", "User-agent: *\n");
        write(root, "raw/legacy/index.html", "<html>old</html>");

        dir
    }

    fn html(site: &Site, path: &str) -> String {
        match site.handle(path).unwrap() {
            Resolved::Html(html) => html,
            Resolved::File(file) => panic!("expected html, got file {}", file.display()),
            Resolved::NotFound => panic!("expected html, got not-found"),
        }
    }

    #[test]
    fn test_posts_index_newest_first_with_urls() {
        let dir = fixture_site();
        let site = Site::load(dir.path(), "").unwrap();
        assert_eq!(
            html(&site, "/"),
            "Posts:Later@/post/2021/09/01/later/;Hello@/post/2021/08/23/hello/;"
        );
    }

    #[test]
    fn test_post_detail_rendered() {
        let dir = fixture_site();
        let site = Site::load(dir.path(), "").unwrap();
        let out = html(&site, "/post/2021/08/23/hello/");
        assert!(out.starts_with("post:Hello:"));
        assert!(out.contains("<em>post</em>"));
    }

    #[test]
    fn test_hidden_post_unlisted_but_reachable() {
        let dir = fixture_site();
        let site = Site::load(dir.path(), "").unwrap();
        assert!(!html(&site, "/").contains("Quiet"));
        assert!(html(&site, "/post/2021/09/02/quiet/").contains("Quiet"));
    }

    #[test]
    fn test_page_directory_style_and_template_override() {
        let dir = fixture_site();
        let site = Site::load(dir.path(), "").unwrap();
        assert_eq!(html(&site, "/about/"), "page:About:/about/");
        assert_eq!(html(&site, "/notes/tips.html"), "wide:Tips");
    }

    #[test]
    fn test_mapping_index_and_detail() {
        let dir = fixture_site();
        let site = Site::load(dir.path(), "").unwrap();
        assert_eq!(html(&site, "/projects/"), "Projects:/project/alpha/;/project/beta/;");
        assert_eq!(html(&site, "/project/beta/"), "project:Beta");
    }

    #[test]
    fn test_mapping_detail_missing_entry_not_found() {
        let dir = fixture_site();
        let site = Site::load(dir.path(), "").unwrap();
        assert!(matches!(site.handle("/project/gamma/").unwrap(), Resolved::NotFound));
        // nested segments never match a detail route
        assert!(matches!(site.handle("/project/a/b/").unwrap(), Resolved::NotFound));
    }

    #[test]
    fn test_raw_passthrough() {
        let dir = fixture_site();
        let site = Site::load(dir.path(), "").unwrap();
        match site.handle("/robots.txt").unwrap() {
            Resolved::File(file) => assert!(file.ends_with("raw/robots.txt")),
            _ => panic!("expected raw file"),
        }
        // directory-style URLs look up index.html
        match site.handle("/legacy/").unwrap() {
            Resolved::File(file) => assert!(file.ends_with("raw/legacy/index.html")),
            _ => panic!("expected raw index.html"),
        }
    }

    #[test]
    fn test_unknown_path_not_found() {
        let dir = fixture_site();
        let site = Site::load(dir.path(), "").unwrap();
        assert!(matches!(site.handle("/nope/").unwrap(), Resolved::NotFound));
        assert!(matches!(site.handle("/../platen.toml").unwrap(), Resolved::NotFound));
    }

    #[test]
    fn test_not_found_page_uses_global() {
        let dir = fixture_site();
        let site = Site::load(dir.path(), "").unwrap();
        assert_eq!(site.not_found_page().unwrap(), "lost (Fixture)");
    }

    #[test]
    fn test_url_root_prefixes_attached_urls() {
        let dir = fixture_site();
        let site = Site::load(dir.path(), "/blog/").unwrap();
        let out = html(&site, "/");
        assert!(out.contains("Later@/blog/post/2021/09/01/later/"), "{out}");
        assert_eq!(html(&site, "/projects/"), "Projects:/blog/project/alpha/;/blog/project/beta/;");
    }

    #[test]
    fn test_undated_post_fails_listing() {
        let dir = fixture_site();
        write(dir.path(), "posts/not-dated.md", "---\ntitle: Bad\n---\nx");
        let site = Site::load(dir.path(), "").unwrap();
        assert!(site.handle("/").is_err());
    }

    #[test]
    fn test_malformed_mapping_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "platen.toml",
            "[[config.mappings]]\ntitle = \"X\"\npath = \"x\"\nindex_template = \"a\"\ndetail_template = \"b\"\n",
        );
        assert!(Site::load(dir.path(), "").is_err());
    }
}
