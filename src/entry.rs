//! Entry parsing: one content document in, one structured entry out.
//!
//! An entry is frontmatter metadata plus a markup body. Parsing knows
//! nothing about URLs; `url` is attached later by whichever route loaded
//! the entry.

use crate::markdown;
use crate::resolve::UrlResolver;
use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_yaml_ng::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};

const FRONTMATTER_DELIM: &str = "---";

/// One parsed content document.
///
/// Reserved frontmatter keys (`title`, `created`, `updated`, `hidden`,
/// `order`) are promoted into typed fields; everything else stays in `meta`
/// and is flattened into the template context alongside them.
#[derive(Debug, Clone, Serialize)]
pub struct Entry {
    /// Source path the document was read from
    pub file: PathBuf,

    /// Never empty: explicit metadata, else a consumed leading `# ` heading,
    /// else the humanized filename stem
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<NaiveDateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<NaiveDateTime>,

    /// Excluded from listings, still reachable by direct URL
    #[serde(skip)]
    pub hidden: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,

    /// Raw markup, frontmatter and consumed title heading stripped
    #[serde(skip)]
    pub body: String,

    /// Rendered HTML, present only for full-mode loads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Public URL, attached by the route that loaded the entry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Remaining operator-defined frontmatter keys
    #[serde(flatten)]
    pub meta: Mapping,
}

impl Entry {
    /// File stem used as the entry's slug.
    pub fn stem(&self) -> &str {
        self.file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }

    /// Per-page template override from frontmatter, if any.
    pub fn template_override(&self) -> Option<&str> {
        self.meta.get("template").and_then(Value::as_str)
    }
}

/// Parse one document. `Ok(None)` when the file does not exist - a missing
/// document is an expected condition for callers, never an error.
///
/// In metadata-only mode the body is kept raw and no rendering happens; in
/// full mode the body is rendered through the content renderer.
pub fn load_entry(path: &Path, meta_only: bool, resolver: &UrlResolver) -> Result<Option<Entry>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to read {}", path.display()));
        }
    };

    let (frontmatter, body) = split_frontmatter(&text);
    let mut meta: Mapping = if frontmatter.trim().is_empty() {
        Mapping::new()
    } else {
        serde_yaml_ng::from_str(frontmatter)
            .with_context(|| format!("Malformed frontmatter in {}", path.display()))?
    };

    let mut body = body.trim().to_string();

    let title = match meta.remove("title") {
        Some(Value::String(title)) => title,
        Some(other) => bail!(
            "`title` in {} must be a string, got {other:?}",
            path.display()
        ),
        None => derive_title(&mut body, path),
    };
    if title.is_empty() {
        bail!("Empty title in {}", path.display());
    }

    let created = take_datetime(&mut meta, "created", path)?;
    let updated = take_datetime(&mut meta, "updated", path)?;
    let hidden = meta
        .remove("hidden")
        .as_ref()
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let order = meta.remove("order").as_ref().and_then(Value::as_i64);

    let content = if meta_only {
        None
    } else {
        Some(
            markdown::render(&body, resolver)
                .with_context(|| format!("Failed to render {}", path.display()))?,
        )
    };

    Ok(Some(Entry {
        file: path.to_path_buf(),
        title,
        created,
        updated,
        hidden,
        order,
        body,
        content,
        url: None,
        meta,
    }))
}

/// Split a document into frontmatter and body.
///
/// A frontmatter block exists only when the first line is exactly the
/// delimiter *and* a later line closes it; otherwise the whole document is
/// body. An unterminated opener therefore degrades to plain body rather
/// than erroring.
fn split_frontmatter(text: &str) -> (&str, &str) {
    let Some(first_end) = text.find('\n') else {
        return ("", text);
    };
    if text[..first_end].trim() != FRONTMATTER_DELIM {
        return ("", text);
    }
    let rest = &text[first_end + 1..];
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim() == FRONTMATTER_DELIM {
            return (&rest[..offset], &rest[offset + line.len()..]);
        }
        offset += line.len();
    }
    // opener with no closing delimiter: everything is body
    ("", text)
}

/// Title fallback chain when no `title` metadata exists: consume a leading
/// level-1 heading, else humanize the filename stem.
fn derive_title(body: &mut String, path: &Path) -> String {
    if let Some(rest) = body.strip_prefix("# ") {
        let (heading, remainder) = rest.split_once('\n').unwrap_or((rest, ""));
        let title = heading.trim().to_string();
        *body = remainder.trim().to_string();
        return title;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .replace('-', " ")
}

/// Remove and normalize a date-or-datetime metadata value.
///
/// A bare calendar date is promoted to midnight so every populated
/// timestamp carries full date+time precision.
fn take_datetime(meta: &mut Mapping, key: &str, path: &Path) -> Result<Option<NaiveDateTime>> {
    let Some(value) = meta.remove(key) else {
        return Ok(None);
    };
    let Value::String(raw) = &value else {
        bail!("`{key}` in {} must be a date string, got {value:?}", path.display());
    };
    let raw = raw.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(Some(dt));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        // normalize date-only values to midnight
        return Ok(Some(date.and_hms_opt(0, 0, 0).unwrap_or_default()));
    }
    bail!("Malformed `{key}` value {raw:?} in {}", path.display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn resolver() -> UrlResolver {
        UrlResolver::new("", PathBuf::from("/site/pages"))
    }

    fn write_doc(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_missing_file_is_none() {
        let entry = load_entry(Path::new("/nonexistent/doc.md"), true, &resolver()).unwrap();
        assert!(entry.is_none());
    }

    #[test]
    fn test_frontmatter_and_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(
            dir.path(),
            "doc.md",
            "---\ntitle: Hello\ncategory: misc\n---\n\nBody text.\n",
        );
        let entry = load_entry(&path, true, &resolver()).unwrap().unwrap();
        assert_eq!(entry.title, "Hello");
        assert_eq!(entry.body, "Body text.");
        assert_eq!(
            entry.meta.get("category").and_then(Value::as_str),
            Some("misc")
        );
        assert!(entry.content.is_none());
    }

    #[test]
    fn test_no_frontmatter_whole_doc_is_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(dir.path(), "doc.md", "Just text.\nMore text.\n");
        let entry = load_entry(&path, true, &resolver()).unwrap().unwrap();
        assert!(entry.meta.is_empty());
        assert_eq!(entry.body, "Just text.\nMore text.");
    }

    #[test]
    fn test_unterminated_frontmatter_is_body() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(dir.path(), "dashes.md", "---\ntitle: Oops\nno closing line\n");
        let entry = load_entry(&path, true, &resolver()).unwrap().unwrap();
        assert!(entry.meta.is_empty());
        assert!(entry.body.starts_with("---"));
        // title falls back to the filename stem
        assert_eq!(entry.title, "dashes");
    }

    #[test]
    fn test_title_from_leading_heading_consumed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(dir.path(), "doc.md", "# My Title\nBody text");
        let entry = load_entry(&path, false, &resolver()).unwrap().unwrap();
        assert_eq!(entry.title, "My Title");
        assert_eq!(entry.body, "Body text");
        // rendered body excludes the heading line
        assert!(!entry.content.unwrap().contains("<h1>"));
    }

    #[test]
    fn test_title_from_filename_humanized() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(dir.path(), "my-cool-post.md", "no heading here");
        let entry = load_entry(&path, true, &resolver()).unwrap().unwrap();
        assert_eq!(entry.title, "my cool post");
    }

    #[test]
    fn test_explicit_title_beats_heading() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(
            dir.path(),
            "doc.md",
            "---\ntitle: Explicit\n---\n# Heading\nBody",
        );
        let entry = load_entry(&path, true, &resolver()).unwrap().unwrap();
        assert_eq!(entry.title, "Explicit");
        // heading not consumed when the title came from metadata
        assert!(entry.body.starts_with("# Heading"));
    }

    #[test]
    fn test_date_normalized_to_midnight() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(
            dir.path(),
            "doc.md",
            "---\ntitle: T\ncreated: 2021-08-23\nupdated: 2021-08-24 10:30:00\n---\nBody",
        );
        let entry = load_entry(&path, true, &resolver()).unwrap().unwrap();
        assert_eq!(
            entry.created.unwrap(),
            NaiveDate::from_ymd_opt(2021, 8, 23).unwrap().and_hms_opt(0, 0, 0).unwrap()
        );
        assert_eq!(
            entry.updated.unwrap(),
            NaiveDate::from_ymd_opt(2021, 8, 24).unwrap().and_hms_opt(10, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_malformed_date_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(dir.path(), "doc.md", "---\ntitle: T\ncreated: someday\n---\nBody");
        assert!(load_entry(&path, true, &resolver()).is_err());
    }

    #[test]
    fn test_malformed_frontmatter_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(dir.path(), "doc.md", "---\n- just\n- a list\n---\nBody");
        assert!(load_entry(&path, true, &resolver()).is_err());
    }

    #[test]
    fn test_hidden_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(
            dir.path(),
            "doc.md",
            "---\ntitle: T\nhidden: true\norder: 3\n---\nBody",
        );
        let entry = load_entry(&path, true, &resolver()).unwrap().unwrap();
        assert!(entry.hidden);
        assert_eq!(entry.order, Some(3));
        // promoted keys are removed from the residual metadata
        assert!(entry.meta.get("hidden").is_none());
        assert!(entry.meta.get("order").is_none());
    }

    #[test]
    fn test_full_mode_renders() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(dir.path(), "doc.md", "---\ntitle: T\n---\nSome *body*");
        let entry = load_entry(&path, false, &resolver()).unwrap().unwrap();
        assert!(entry.content.unwrap().contains("<em>body</em>"));
    }

    #[test]
    fn test_stem() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_doc(dir.path(), "2021-08-23-hi.md", "x");
        let entry = load_entry(&path, true, &resolver()).unwrap().unwrap();
        assert_eq!(entry.stem(), "2021-08-23-hi");
    }
}
