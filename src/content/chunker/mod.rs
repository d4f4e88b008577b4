
use std::sync::LazyLock;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::content::parser::parse_document;
use crate::content::tokenizer::count_tokens;

/// Metadata attached to every indexed chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Stable identifier, `{chapter}:{section-slug}:{position}`
    pub chunk_id: String,
    /// Chapter identifier (e.g. `02-ros2`)
    pub chapter: String,
    /// Human-readable chapter title from frontmatter
    pub chapter_title: String,
    /// Section heading this chunk belongs to
    pub section: String,
    /// Zero-based index within the section
    pub position: usize,
    /// Keywords from document frontmatter
    pub keywords: Vec<String>,
}

static SENTENCE_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?<=[.!?])\s+").expect("valid regex"));

/// Split cleaned body text into (heading, content) sections on level-2 headings.
///
/// Lines before the first heading form an "Introduction" section; sections
/// whose content trims to nothing are dropped.
#[inline]
pub fn extract_sections(content: &str) -> Vec<(String, String)> {
    let mut sections = Vec::new();
    let mut current_heading = "Introduction".to_string();
    let mut current_lines: Vec<&str> = Vec::new();

    for line in content.lines() {
        if let Some(heading) = line.strip_prefix("## ") {
            push_section(&mut sections, &current_heading, &current_lines);
            current_heading = heading.trim().to_string();
            current_lines.clear();
        } else {
            current_lines.push(line);
        }
    }

    push_section(&mut sections, &current_heading, &current_lines);

    sections
}

fn push_section(sections: &mut Vec<(String, String)>, heading: &str, lines: &[&str]) {
    if lines.is_empty() {
        return;
    }
    let text = lines.join("\n").trim().to_string();
    if !text.is_empty() {
        sections.push((heading.to_string(), text));
    }
}

/// Split a section into chunks that respect the token budget.
///
/// Paragraphs are packed greedily; a paragraph that alone exceeds the budget
/// is split on sentence boundaries and its sentences packed the same way.
/// Only a single sentence larger than the budget can force a chunk over it.
#[inline]
pub fn chunk_section(section_text: &str, max_tokens: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0;

    for para in section_text.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }

        let para_tokens = count_tokens(para);

        if para_tokens > max_tokens {
            if !current.is_empty() {
                chunks.push(current.join("\n\n"));
                current.clear();
                current_tokens = 0;
            }
            chunk_oversize_paragraph(para, max_tokens, &mut chunks);
        } else if current_tokens + para_tokens > max_tokens {
            if !current.is_empty() {
                chunks.push(current.join("\n\n"));
            }
            current = vec![para];
            current_tokens = para_tokens;
        } else {
            current.push(para);
            current_tokens += para_tokens;
        }
    }

    if !current.is_empty() {
        chunks.push(current.join("\n\n"));
    }

    chunks
}

// Greedily pack sentences of a paragraph that exceeds the token budget
fn chunk_oversize_paragraph(para: &str, max_tokens: usize, chunks: &mut Vec<String>) {
    let mut sentence_chunk: Vec<&str> = Vec::new();
    let mut sentence_tokens = 0;

    for sentence in split_sentences(para) {
        let tokens = count_tokens(sentence);
        if sentence_tokens + tokens > max_tokens && !sentence_chunk.is_empty() {
            chunks.push(sentence_chunk.join(" "));
            sentence_chunk.clear();
            sentence_tokens = 0;
        }
        sentence_chunk.push(sentence);
        sentence_tokens += tokens;
    }

    if !sentence_chunk.is_empty() {
        chunks.push(sentence_chunk.join(" "));
    }
}

// End-of-sentence punctuation followed by whitespace
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for boundary in SENTENCE_BOUNDARY.find_iter(text).flatten() {
        sentences.push(&text[start..boundary.start()]);
        start = boundary.end();
    }

    if start < text.len() {
        sentences.push(&text[start..]);
    }

    sentences
}

/// Generate the stable chunk identifier for a section position
#[inline]
pub fn generate_chunk_id(chapter: &str, section: &str, position: usize) -> String {
    format!("{}:{}:{}", chapter, slugify(section), position)
}

// Lowercase, runs of non-alphanumerics become a single hyphen, edges trimmed
fn slugify(section: &str) -> String {
    let mut slug = String::with_capacity(section.len());
    for c in section.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_matches('-').to_string()
}

/// Process a raw document into ordered (chunk_text, metadata) pairs.
///
/// Chunk identity is deterministic: re-chunking an unchanged document yields
/// identical ids and identical chunk boundaries.
#[inline]
pub fn chunk_document(
    raw: &str,
    chapter: &str,
    max_tokens: usize,
) -> Result<Vec<(String, ChunkMetadata)>> {
    let (frontmatter, body) = parse_document(raw)?;

    let chapter_title = frontmatter
        .title
        .unwrap_or_else(|| chapter.to_string());
    let keywords = frontmatter.keywords;

    let mut chunks = Vec::new();

    for (section_heading, section_content) in extract_sections(&body) {
        for (position, chunk_text) in chunk_section(&section_content, max_tokens)
            .into_iter()
            .enumerate()
        {
            let metadata = ChunkMetadata {
                chunk_id: generate_chunk_id(chapter, &section_heading, position),
                chapter: chapter.to_string(),
                chapter_title: chapter_title.clone(),
                section: section_heading.clone(),
                position,
                keywords: keywords.clone(),
            };
            chunks.push((chunk_text, metadata));
        }
    }

    debug!(
        "Chunked chapter '{}' into {} chunks across {} sections",
        chapter,
        chunks.len(),
        chunks
            .iter()
            .map(|(_, m)| m.section.as_str())
            .collect::<std::collections::HashSet<_>>()
            .len()
    );

    Ok(chunks)
}
