
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::content::chunker::{ChunkMetadata, chunk_document};
use crate::{RagError, Result};

/// Outcome of a batch indexing pass over the content directory.
///
/// Per-file failures are recorded rather than aborting the batch.
#[derive(Debug, Default)]
pub struct IndexingReport {
    pub chunks: Vec<(String, ChunkMetadata)>,
    pub files_processed: Vec<String>,
    pub errors: Vec<String>,
}

/// Discover chapter files under the content root.
///
/// Chapter directories contain an `index.mdx`; a root-level `intro.mdx`
/// sorts first when present. Hidden directories are skipped.
#[inline]
pub fn discover_content_files(content_root: &Path) -> Result<Vec<PathBuf>> {
    if !content_root.is_dir() {
        return Err(RagError::NotFound(format!(
            "Content path does not exist: {}",
            content_root.display()
        )));
    }

    let mut chapter_dirs: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(content_root)? {
        let entry = entry?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if path.is_dir() && !hidden {
            chapter_dirs.push(path);
        }
    }
    chapter_dirs.sort();

    let mut files: Vec<PathBuf> = chapter_dirs
        .into_iter()
        .map(|dir| dir.join("index.mdx"))
        .filter(|file| file.exists())
        .collect();

    let intro = content_root.join("intro.mdx");
    if intro.exists() {
        files.insert(0, intro);
    }

    Ok(files)
}

/// Chapter identifier for a content file: its directory name, or the file
/// stem for files directly under the content root
#[inline]
pub fn chapter_for(file: &Path, content_root: &Path) -> String {
    let in_root = file.parent().is_some_and(|parent| parent == content_root);

    if in_root {
        file.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        file.parent()
            .and_then(|parent| parent.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Chunk every discovered content file, isolating per-file failures
#[inline]
pub fn process_content(content_root: &Path, max_tokens: usize) -> Result<IndexingReport> {
    let files = discover_content_files(content_root)?;

    let mut report = IndexingReport::default();

    for file in files {
        let rel_path = file
            .strip_prefix(content_root)
            .unwrap_or(&file)
            .to_string_lossy()
            .into_owned();

        match index_file(&file, content_root, max_tokens) {
            Ok(chunks) => {
                debug!("Processed {} into {} chunks", rel_path, chunks.len());
                report.chunks.extend(chunks);
                report.files_processed.push(rel_path);
            }
            Err(e) => {
                warn!("Error processing {}: {}", rel_path, e);
                report.errors.push(format!("{}: {}", rel_path, e));
            }
        }
    }

    Ok(report)
}

fn index_file(
    file: &Path,
    content_root: &Path,
    max_tokens: usize,
) -> Result<Vec<(String, ChunkMetadata)>> {
    let raw = fs::read_to_string(file)
        .map_err(|e| RagError::Io(std::io::Error::new(e.kind(), format!("{}: {}", file.display(), e))))?;

    let chapter = chapter_for(file, content_root);
    chunk_document(&raw, &chapter, max_tokens)
}
