//! Markdown body rendering.
//!
//! Converts an entry body to HTML with pulldown-cmark (tables,
//! strikethrough, task lists, footnotes), then applies the URL rewriting
//! passes so embedded references are correct for both live preview and
//! static builds.
//!
//! A fresh parser is constructed per call: render invocations are logically
//! independent, so rendering order can never affect output.

use crate::resolve::UrlResolver;
use crate::rewrite;
use anyhow::Result;
use pulldown_cmark::{Options, Parser, html::push_html};

/// Render an entry body to final HTML.
pub fn render(body: &str, resolver: &UrlResolver) -> Result<String> {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES;

    let parser = Parser::new_ext(body, options);
    let mut html = String::with_capacity(body.len() * 2);
    push_html(&mut html, parser);

    rewrite::rewrite_html(&html, resolver)
}
