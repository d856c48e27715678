//! Live preview server.
//!
//! A lightweight HTTP server built on `tiny_http` that answers every request
//! through the same `Site` handler the static build uses, so previewed pages
//! are byte-identical to built ones. The site is re-loaded per request:
//! content, config and template edits show up on the next refresh without a
//! restart.
//!
//! Shutdown is a Ctrl+C handler that unblocks the accept loop.

use crate::config::Paths;
use crate::log;
use crate::routes::{Resolved, Site};
use crate::utils::fs::safe_join;
use anyhow::{Context, Result};
use std::{
    fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

/// Start the preview server and block until Ctrl+C.
pub fn serve_site(root: &Path, host: &str, port: u16, debug: bool) -> Result<()> {
    // Validate config, mappings and templates up front so a broken site
    // fails the command instead of the first request.
    Site::load(root, "")?;

    let interface: std::net::IpAddr = host
        .parse()
        .with_context(|| format!("Invalid host address {host:?}"))?;
    let (server, addr) = try_bind_port(interface, port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        server_for_signal.unblock();
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    for request in server.incoming_requests() {
        // Re-load the site on each request so edits are picked up
        if let Err(e) = handle_request(request, root, debug) {
            log!("serve"; "request error: {e}");
        }
    }

    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(
    interface: std::net::IpAddr,
    base_port: u16,
    max_retries: u16,
) -> Result<(Server, SocketAddr)> {
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(_) if offset + 1 < max_retries => continue,
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to bind after {} attempts (ports {}-{}): {}",
                    max_retries,
                    base_port,
                    port,
                    e
                ));
            }
        }
    }
    unreachable!()
}

/// Handle a single HTTP request.
fn handle_request(request: Request, root: &Path, debug: bool) -> Result<()> {
    let site = match Site::load(root, "") {
        Ok(site) => site,
        Err(err) => return serve_error(request, &err, debug),
    };

    let path = request_path(request.url());

    if let Some(rest) = path.strip_prefix("/static/") {
        if let Some(file) = static_file(&site.paths, rest) {
            return serve_file(request, &file);
        }
        return serve_not_found(request, &site);
    }

    match site.handle(&path) {
        Ok(Resolved::Html(html)) => serve_html(request, html),
        Ok(Resolved::File(file)) => serve_file(request, &file),
        Ok(Resolved::NotFound) => serve_not_found(request, &site),
        Err(err) => serve_error(request, &err, debug),
    }
}

/// Site-relative path of a request URL: query string stripped, then
/// percent-decoded, leading slash kept. The query is split off before
/// decoding so an encoded `?` inside a path segment stays a path character.
fn request_path(url: &str) -> String {
    let path = url.split('?').next().unwrap_or_default();
    urlencoding::decode(path)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_default()
}

/// Resolve a `/static/`-relative reference against the asset mounts: the
/// site's own `static/` first, then `theme/` falls back to the theme's
/// static folder (mirroring where the build copies each of them).
fn static_file(paths: &Paths, rest: &str) -> Option<PathBuf> {
    if let Some(file) = safe_join(&paths.static_dir, rest).filter(|f| f.is_file()) {
        return Some(file);
    }
    rest.strip_prefix("theme/")
        .and_then(|sub| safe_join(&paths.theme_static, sub))
        .filter(|f| f.is_file())
}

/// Serve a file with appropriate content type.
fn serve_file(request: Request, path: &Path) -> Result<()> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let content_type = guess_content_type(path);

    let response = Response::from_data(content)
        .with_header(Header::from_bytes("Content-Type", content_type).unwrap());

    request.respond(response)?;
    Ok(())
}

/// Serve rendered HTML.
fn serve_html(request: Request, content: String) -> Result<()> {
    let response = Response::from_string(content)
        .with_header(Header::from_bytes("Content-Type", "text/html; charset=utf-8").unwrap());
    request.respond(response)?;
    Ok(())
}

/// Serve the site's rendered 404 page; plain text when the 404 template
/// itself cannot render.
fn serve_not_found(request: Request, site: &Site) -> Result<()> {
    let response = match site.not_found_page() {
        Ok(html) => Response::from_string(html)
            .with_header(Header::from_bytes("Content-Type", "text/html; charset=utf-8").unwrap()),
        Err(_) => Response::from_string("404 Not Found")
            .with_header(Header::from_bytes("Content-Type", "text/plain").unwrap()),
    };
    request.respond(response.with_status_code(StatusCode(404)))?;
    Ok(())
}

/// Serve a 500. The error chain is exposed only when the debug toggle is on.
fn serve_error(request: Request, err: &anyhow::Error, debug: bool) -> Result<()> {
    let body = if debug {
        format!("500 Internal Server Error\n\n{err:?}")
    } else {
        "500 Internal Server Error".to_string()
    };
    let response = Response::from_string(body)
        .with_header(Header::from_bytes("Content-Type", "text/plain; charset=utf-8").unwrap())
        .with_status_code(StatusCode(500));
    request.respond(response)?;
    Ok(())
}

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
fn guess_content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",

        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",

        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",

        Some("pdf") => "application/pdf",
        Some("txt") => "text/plain; charset=utf-8",
        Some("md") => "text/markdown; charset=utf-8",

        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_path_decode_and_query() {
        assert_eq!(request_path("/a/b/"), "/a/b/");
        assert_eq!(request_path("/font.woff2?t=123"), "/font.woff2");
        assert_eq!(request_path("/with%20space.html"), "/with space.html");
        // an encoded `?` in the path is not a query separator
        assert_eq!(request_path("/odd%3Fname.html?t=1"), "/odd?name.html");
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(
            guess_content_type(Path::new("a/index.html")),
            "text/html; charset=utf-8"
        );
        assert_eq!(guess_content_type(Path::new("x.png")), "image/png");
        assert_eq!(guess_content_type(Path::new("blob")), "application/octet-stream");
    }

    #[test]
    fn test_static_file_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        fs::create_dir_all(&paths.static_dir).unwrap();
        fs::create_dir_all(&paths.theme_static).unwrap();
        fs::write(paths.static_dir.join("site.css"), "a").unwrap();
        fs::write(paths.theme_static.join("theme.css"), "b").unwrap();

        assert!(static_file(&paths, "site.css").is_some());
        assert!(static_file(&paths, "theme/theme.css").is_some());
        assert!(static_file(&paths, "missing.css").is_none());
        // traversal out of the mounts resolves to nothing
        assert!(static_file(&paths, "../platen.toml").is_none());
    }
}
