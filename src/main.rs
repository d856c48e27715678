//! Platen - compiles a folder of Markdown content into a website.

mod build;
mod cli;
mod collection;
mod config;
mod entry;
mod markdown;
mod resolve;
mod rewrite;
mod routes;
mod serve;
mod templates;
mod utils;

use anyhow::{Context, Result};
use build::build_site;
use clap::Parser;
use cli::{Cli, Commands};
use serve::serve_site;
use std::io::{self, Write};
use std::path::Path;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let root = cli.root.as_deref().unwrap_or(Path::new("./"));

    match cli.command {
        Commands::Preview {
            ref host,
            port,
            no_debug,
        } => serve_site(root, host, port, !no_debug),
        Commands::Build { ref url_root } => {
            let url_root = match url_root {
                Some(url_root) => url_root.clone(),
                None => prompt_url_root()?,
            };
            build_site(root, &path_of_url_root(&url_root))
        }
    }
}

/// Ask for the URL root interactively when `--url-root` was not given.
fn prompt_url_root() -> Result<String> {
    print!("URL root (used as the prefix of generated URLs): ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .read_line(&mut line)
        .context("Failed to read URL root")?;
    Ok(line.trim().to_string())
}

/// Path component of the URL root, normalized to a no-trailing-slash,
/// leading-slash form. Accepts a full URL or a bare path; an empty or
/// root-only value yields the empty prefix.
fn path_of_url_root(url_root: &str) -> String {
    let raw = url_root.trim();
    let path = match raw.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("", |i| &rest[i..]),
        None => raw,
    };
    let path = path.trim_end_matches('/');
    if path.is_empty() {
        String::new()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
