#[cfg(test)]
mod tests;

use std::sync::LazyLock;

use fancy_regex::Regex;
use serde::Deserialize;

use crate::{RagError, Result};

/// Document frontmatter fields used for chunk metadata; unrecognized keys
/// are ignored
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Frontmatter {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

static IMPORT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^import\s+.*$").expect("valid regex"));
static SELF_CLOSING_COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[A-Z][^>]*/>").expect("valid regex"));
static OPENING_COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[A-Z][^>]*>").expect("valid regex"));
static CLOSING_COMPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</[A-Z][^>]*>").expect("valid regex"));
static HTML_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static FENCE_LANGUAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("```\\w+\n").expect("valid regex"));
static EXCESS_BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Strip MDX-specific markup, leaving plain prose untouched.
///
/// Import lines, component tags (inner text preserved), HTML comments, and
/// code-fence language annotations are removed; runs of blank lines collapse
/// to a single blank line. Best-effort textual transform, not a full parser.
#[inline]
pub fn clean_markup(content: &str) -> String {
    let content = IMPORT_LINE.replace_all(content, "");
    let content = SELF_CLOSING_COMPONENT.replace_all(&content, "");
    let content = OPENING_COMPONENT.replace_all(&content, "");
    let content = CLOSING_COMPONENT.replace_all(&content, "");
    let content = HTML_COMMENT.replace_all(&content, "");
    let content = FENCE_LANGUAGE.replace_all(&content, "```\n");
    let content = EXCESS_BLANK_LINES.replace_all(&content, "\n\n");
    content.trim().to_string()
}

/// Split a raw document into frontmatter and cleaned body.
///
/// A document without a frontmatter block yields empty metadata; a block that
/// is opened but never closed, or that holds invalid YAML, is a parse error.
#[inline]
pub fn parse_document(raw: &str) -> Result<(Frontmatter, String)> {
    let (frontmatter, body) = split_frontmatter(raw)?;
    Ok((frontmatter, clean_markup(body)))
}

fn split_frontmatter(raw: &str) -> Result<(Frontmatter, &str)> {
    let Some(after_open) = raw.strip_prefix("---\n").or_else(|| raw.strip_prefix("---\r\n"))
    else {
        return Ok((Frontmatter::default(), raw));
    };

    let Some(close) = find_closing_fence(after_open) else {
        return Err(RagError::Parse(
            "unterminated frontmatter block".to_string(),
        ));
    };

    let (metadata_block, rest) = after_open.split_at(close.start);
    let frontmatter = if metadata_block.trim().is_empty() {
        Frontmatter::default()
    } else {
        serde_yaml::from_str(metadata_block)
            .map_err(|e| RagError::Parse(format!("invalid frontmatter: {e}")))?
    };

    Ok((frontmatter, &rest[close.len..]))
}

struct FenceMatch {
    start: usize,
    len: usize,
}

// The closing fence is a line consisting of exactly "---"
fn find_closing_fence(text: &str) -> Option<FenceMatch> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            return Some(FenceMatch {
                start: offset,
                len: line.len(),
            });
        }
        offset += line.len();
    }
    None
}
