//! Chunk loader — turns source documents into [`ContextChunk`]s.
//!
//! Reads every `.md`, `.markdown` and `.txt` file in a directory (sorted by
//! file name so the corpus order is stable) and splits each with the
//! Markdown-aware splitter. Extraction from other formats happens upstream.

use std::fs;
use std::path::{Path, PathBuf};

use text_splitter::MarkdownSplitter;
use tracing::{debug, info};

use crate::error::AppError;
use super::{ContextChunk, SessionId};

const EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

/// Split `text` into non-blank chunks of at most ~`chunk_size` characters.
pub fn split_text(text: &str, chunk_size: usize) -> Vec<String> {
    MarkdownSplitter::new(chunk_size)
        .chunks(text)
        .filter(|c| !c.trim().is_empty())
        .map(str::to_string)
        .collect()
}

fn source_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let entries = fs::read_dir(dir)
        .map_err(|e| AppError::Context(format!("cannot read {}: {e}", dir.display())))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| AppError::Context(format!("cannot list {}: {e}", dir.display())))?
            .path();
        let wanted = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if path.is_file() && wanted {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load the system-wide corpus from `dir`. Called once at startup; the
/// result is owned by the [`ContextStore`](super::ContextStore).
pub fn load_system_chunks(dir: &Path, chunk_size: usize) -> Result<Vec<ContextChunk>, AppError> {
    if chunk_size == 0 {
        return Err(AppError::Context("chunk_size must be > 0".into()));
    }
    let mut chunks = Vec::new();
    for path in source_files(dir)? {
        let text = fs::read_to_string(&path)
            .map_err(|e| AppError::Context(format!("cannot read {}: {e}", path.display())))?;
        let before = chunks.len();
        chunks.extend(split_text(&text, chunk_size).into_iter().map(ContextChunk::system));
        debug!(file = %path.display(), chunks = chunks.len() - before, "source document split");
    }
    info!(dir = %dir.display(), chunks = chunks.len(), "system context loaded");
    Ok(chunks)
}

/// Read one uploaded document and split it into texts for `session`.
pub fn load_upload(path: &Path, chunk_size: usize, session: &SessionId) -> Result<Vec<String>, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::Context(format!("cannot read upload {}: {e}", path.display())))?;
    let texts = split_text(&text, chunk_size.max(1));
    debug!(%session, file = %path.display(), chunks = texts.len(), "upload split");
    Ok(texts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn loads_supported_files_in_name_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.md"), "# B\n\nsecond doc").unwrap();
        fs::write(dir.path().join("a.txt"), "first doc").unwrap();
        fs::write(dir.path().join("skip.pdf"), "binary").unwrap();
        fs::write(dir.path().join("blank.md"), "   \n").unwrap();

        let chunks = load_system_chunks(dir.path(), 1000).unwrap();
        let texts: Vec<_> = chunks.iter().map(ContextChunk::text).collect();
        assert_eq!(texts, ["first doc", "# B\n\nsecond doc"]);
        assert!(chunks.iter().all(|c| c.session_id().is_none()));
    }

    #[test]
    fn long_documents_are_split() {
        let para = "word ".repeat(40);
        let doc = format!("{para}\n\n{para}\n\n{para}");
        let parts = split_text(&doc, 250);
        assert!(parts.len() >= 2);
        assert!(parts.iter().all(|p| p.chars().count() <= 250));
    }

    #[test]
    fn missing_dir_errors() {
        let err = load_system_chunks(Path::new("/nonexistent/docs"), 100).unwrap_err();
        assert!(err.to_string().contains("context error"));
    }

    #[test]
    fn upload_is_split_into_texts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.md");
        fs::write(&path, "RAG notes").unwrap();
        let texts = load_upload(&path, 500, &"s1".into()).unwrap();
        assert_eq!(texts, ["RAG notes"]);
    }
}
