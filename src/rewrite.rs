//! HTML rewriting passes over rendered bodies.
//!
//! Streams the rendered HTML through quick-xml and rebuilds elements whose
//! attributes need rewriting, at any nesting depth:
//!
//! - `img[src]` starting with the reserved `/static/` prefix is remapped to
//!   the resolved static base, so assets work both live and in a static tree;
//! - `a[href]` starting with `/` goes through forward URL resolution;
//!   relative and external hrefs pass through untouched.

use crate::resolve::UrlResolver;
use anyhow::Result;
use quick_xml::{
    Reader, Writer,
    events::{BytesStart, Event},
};
use std::borrow::Cow;
use std::io::Cursor;
use std::str;

/// Reserved static-asset prefix inside content references.
const STATIC_PREFIX: &str = "/static/";

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Apply both rewriting passes to a rendered HTML fragment.
pub fn rewrite_html(html: &str, resolver: &UrlResolver) -> Result<String> {
    let content = html.as_bytes();
    let mut reader = create_html_reader(content);
    let mut writer = Writer::new(Cursor::new(Vec::with_capacity(content.len())));

    loop {
        match reader.read_event() {
            Ok(Event::Start(elem)) => {
                let elem = rewrite_elem(&elem, resolver)?;
                writer.write_event(Event::Start(elem))?;
            }
            Ok(Event::Empty(elem)) => {
                let elem = rewrite_elem(&elem, resolver)?;
                writer.write_event(Event::Empty(elem))?;
            }
            Ok(Event::Eof) => break,
            Ok(event) => writer.write_event(event)?,
            Err(e) => anyhow::bail!(
                "HTML parse error at position {}: {:?}",
                reader.error_position(),
                e
            ),
        }
    }

    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

#[inline]
fn create_html_reader(content: &[u8]) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(content);
    reader.config_mut().trim_text(false);
    reader.config_mut().enable_all_checks(false);
    reader
}

/// Rebuild an element, rewriting the attribute the passes care about.
fn rewrite_elem(elem: &BytesStart<'_>, resolver: &UrlResolver) -> Result<BytesStart<'static>> {
    match elem.name().as_ref() {
        b"img" => rebuild_elem(elem, |key, value| {
            if key == b"src" {
                rewrite_static_src(&value, resolver)
            } else {
                Ok(value.into_owned().into())
            }
        }),
        b"a" => rebuild_elem(elem, |key, value| {
            if key == b"href" {
                rewrite_internal_href(&value, resolver)
            } else {
                Ok(value.into_owned().into())
            }
        }),
        _ => Ok(elem.to_owned().into_owned()),
    }
}

/// Rebuild an element with fallible attribute transformation.
fn rebuild_elem<F>(elem: &BytesStart<'_>, mut transform: F) -> Result<BytesStart<'static>>
where
    F: FnMut(&[u8], Cow<'_, [u8]>) -> Result<Cow<'static, [u8]>>,
{
    let tag = String::from_utf8_lossy(elem.name().as_ref()).into_owned();
    let attrs: Result<Vec<_>> = elem
        .attributes()
        .flatten()
        .map(|attr| {
            let key = attr.key.as_ref().to_vec();
            let value = transform(attr.key.as_ref(), attr.value)?;
            Ok((key, value))
        })
        .collect();

    let mut new_elem = BytesStart::new(tag);
    for (k, v) in attrs? {
        new_elem.push_attribute((k.as_slice(), v.as_ref()));
    }
    Ok(new_elem)
}

/// Remap the reserved static prefix to the resolved static base URL.
fn rewrite_static_src(value: &[u8], resolver: &UrlResolver) -> Result<Cow<'static, [u8]>> {
    let src = str::from_utf8(value)?;
    let rewritten = match src.strip_prefix(STATIC_PREFIX) {
        Some(rest) => format!("{}{}", resolver.static_url(), rest),
        None => src.to_string(),
    };
    Ok(Cow::Owned(rewritten.into_bytes()))
}

/// Forward-resolve root-relative hrefs; leave everything else alone.
fn rewrite_internal_href(value: &[u8], resolver: &UrlResolver) -> Result<Cow<'static, [u8]>> {
    let href = str::from_utf8(value)?;
    let rewritten = if href.starts_with('/') {
        resolver.path_to_url(href)
    } else {
        href.to_string()
    };
    Ok(Cow::Owned(rewritten.into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn resolver(root: &str) -> UrlResolver {
        UrlResolver::new(root, PathBuf::from("/site/pages"))
    }

    #[test]
    fn test_img_static_prefix_rewritten() {
        let html = rewrite_html(r#"<p><img src="/static/x.png" alt="x"/></p>"#, &resolver("/blog"))
            .unwrap();
        assert!(html.contains(r#"src="/blog/static/x.png""#), "{html}");
        assert!(html.contains(r#"alt="x""#));
    }

    #[test]
    fn test_img_without_prefix_untouched() {
        let html =
            rewrite_html(r#"<img src="https://cdn.example/x.png"/>"#, &resolver("/blog")).unwrap();
        assert!(html.contains(r#"src="https://cdn.example/x.png""#));
    }

    #[test]
    fn test_link_root_relative_resolved() {
        let html = rewrite_html(
            r#"<a href="/posts/2021-08-23-hi.md">hi</a>"#,
            &resolver(""),
        )
        .unwrap();
        assert!(html.contains(r#"href="/post/2021/08/23/hi/""#), "{html}");
    }

    #[test]
    fn test_link_external_and_relative_untouched() {
        let html = rewrite_html(
            r##"<a href="https://example.com/">x</a><a href="other.html">y</a><a href="#frag">z</a>"##,
            &resolver(""),
        )
        .unwrap();
        assert!(html.contains(r#"href="https://example.com/""#));
        assert!(html.contains(r#"href="other.html""#));
        assert!(html.contains(r##"href="#frag""##));
    }

    #[test]
    fn test_rewrites_apply_at_depth() {
        let html = rewrite_html(
            r#"<ul><li><blockquote><a href="/pages/a/index.md">a</a></blockquote></li></ul>"#,
            &resolver(""),
        )
        .unwrap();
        assert!(html.contains(r#"href="/a/""#), "{html}");
    }

    #[test]
    fn test_non_target_elements_pass_through() {
        let input = r#"<h2 id="x">T</h2><pre><code>let a = 1;</code></pre>"#;
        let html = rewrite_html(input, &resolver("/blog")).unwrap();
        assert_eq!(html, input);
    }
}
