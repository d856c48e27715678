//! Static build: materialize the whole site into `build/`.
//!
//! Every HTML document is produced by probing the same `Site` handler the
//! preview server dispatches through, so a built page is byte-identical to
//! its previewed counterpart. The output directory is removed and recreated
//! on each run; any failure aborts the whole build.

use crate::config::DOC_EXT;
use crate::entry::load_entry;
use crate::log;
use crate::routes::{Resolved, Site};
use crate::utils::fs::copy_dir_contents;
use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Build the site rooted at `root` into `<root>/build/`, emitting URLs under
/// `url_root`.
pub fn build_site(root: &Path, url_root: &str) -> Result<()> {
    let site = Site::load(root, url_root)?;
    let out = site.paths.build.clone();

    if out.exists() {
        fs::remove_dir_all(&out)
            .with_context(|| format!("Failed to clear {}", out.display()))?;
    }
    fs::create_dir_all(&out).with_context(|| format!("Failed to create {}", out.display()))?;

    log!("build"; "copying raw files");
    copy_dir_contents(&site.paths.raw, &out)?;

    log!("build"; "copying static assets");
    copy_dir_contents(&site.paths.theme_static, &out.join("static").join("theme"))?;
    copy_dir_contents(&site.paths.static_dir, &out.join("static"))?;

    log!("build"; "building pages");
    build_pages(&site, &out)?;

    log!("build"; "building posts");
    write_page(&site, &out, "/")?;
    for entry in site.post_entries()? {
        write_page(&site, &out, site_relative(&site, entry_url(&entry)?)?)?;
    }

    for route in &site.routes {
        log!("build"; "building {}", route.title);
        write_page(&site, &out, &route.index_url)?;
        for entry in site.mapping_entries(route)? {
            write_page(&site, &out, site_relative(&site, entry_url(&entry)?)?)?;
        }
    }

    log!("build"; "writing 404 page");
    fs::write(out.join("404.html"), site.not_found_page()?)?;

    log!("build"; "done: {}", out.display());
    Ok(())
}

/// Walk `pages/`, skipping dot-entries. Documents go through the handler and
/// land with an `.html` extension; anything else is copied verbatim. Hidden
/// documents are left out of the output tree entirely.
fn build_pages(site: &Site, out: &Path) -> Result<()> {
    let pages = &site.paths.pages;
    if !pages.is_dir() {
        return Ok(());
    }
    let walker = WalkDir::new(pages).into_iter().filter_entry(|e| {
        !e.file_name().to_string_lossy().starts_with('.')
    });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(pages)
            .context("walked outside the pages folder")?;
        let Some(rel_str) = rel.to_str() else {
            bail!("Non-UTF-8 page path {:?}", rel);
        };

        if rel.extension().is_some_and(|ext| ext == DOC_EXT) {
            let meta = load_entry(entry.path(), true, &site.resolver)?;
            if meta.is_some_and(|e| e.hidden) {
                continue;
            }
            // forward resolution yields the public (root-prefixed) URL; the
            // handler and the output tree both want the site-relative form
            let url = site.resolver.path_to_url(&format!("/pages/{rel_str}"));
            write_page(site, out, site_relative(site, &url)?)?;
        } else {
            let target = out.join(rel);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

/// Probe the handler for one site-relative path and write the result into
/// the output tree. Directory-style paths land as `<path>/index.html`.
fn write_page(site: &Site, out: &Path, path: &str) -> Result<()> {
    let rel = if path.ends_with('/') {
        format!("{}index.html", path.trim_start_matches('/'))
    } else {
        path.trim_start_matches('/').to_string()
    };
    let target = out.join(&rel);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    match site.handle(path).with_context(|| format!("Failed to build {path}"))? {
        Resolved::Html(html) => fs::write(&target, html)
            .with_context(|| format!("Failed to write {}", target.display()))?,
        Resolved::File(file) => {
            fs::copy(&file, &target)
                .with_context(|| format!("Failed to copy {}", file.display()))?;
        }
        Resolved::NotFound => bail!("No document answers {path}"),
    }
    Ok(())
}

/// The attached URL of a listed entry.
fn entry_url(entry: &crate::entry::Entry) -> Result<&str> {
    entry
        .url
        .as_deref()
        .with_context(|| format!("Entry {} carries no URL", entry.file.display()))
}

/// The site-relative path of a public URL, obtained by stripping the
/// URL-root prefix.
fn site_relative<'a>(site: &Site, url: &'a str) -> Result<&'a str> {
    match url.strip_prefix(site.resolver.root()) {
        Some(rel) if rel.starts_with('/') => Ok(rel),
        _ => bail!("URL {url:?} is outside the site root"),
    }
}
