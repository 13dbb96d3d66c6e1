//! Corpus loading: plain-text documents from a community directory.

use curator_core::error::IndexError;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

/// File extensions eligible for indexing.
const EXTENSIONS: &[&str] = &["md", "txt"];

/// One corpus document. `id` is the file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub id: String,
    pub text: String,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Load every `.md`/`.txt` file directly inside `dir`, in file-name order.
///
/// A missing directory yields an empty corpus. Subdirectories are not
/// descended into; non-UTF-8 files are skipped.
pub async fn load_corpus(dir: &Path) -> Result<Vec<Document>, IndexError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(dir = %dir.display(), "Corpus directory does not exist; index will be empty");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(IndexError::Io {
                path: dir.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };

    let mut files = Vec::new();
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                return Err(IndexError::Io {
                    path: dir.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };

        let path = entry.path();
        let eligible = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| EXTENSIONS.contains(&ext));
        if !eligible {
            continue;
        }
        match entry.file_type().await {
            Ok(ft) if ft.is_file() => {}
            _ => continue,
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
            continue;
        };
        files.push((name, path));
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut documents = Vec::with_capacity(files.len());
    for (name, path) in files {
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => documents.push(Document::new(name, text)),
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping unreadable corpus file");
            }
        }
    }

    if documents.is_empty() {
        warn!(dir = %dir.display(), "No .md or .txt documents found");
    } else {
        debug!(dir = %dir.display(), docs = documents.len(), "Corpus loaded");
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn loads_only_md_and_txt_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "bravo").unwrap();
        std::fs::write(dir.path().join("a.md"), "alpha").unwrap();
        std::fs::write(dir.path().join("c.pdf"), "ignored").unwrap();
        std::fs::write(dir.path().join("notes"), "ignored").unwrap();

        let docs = load_corpus(dir.path()).await.unwrap();
        assert_eq!(
            docs,
            vec![Document::new("a.md", "alpha"), Document::new("b.txt", "bravo")]
        );
    }

    #[tokio::test]
    async fn does_not_recurse() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested.md")).unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("deep.md"), "deep").unwrap();

        let docs = load_corpus(dir.path()).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let docs = load_corpus(&dir.path().join("community-nope")).await.unwrap();
        assert!(docs.is_empty());
    }

    #[tokio::test]
    async fn non_utf8_file_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.txt"), [0xff, 0xfe, 0x00]).unwrap();
        std::fs::write(dir.path().join("good.txt"), "fine").unwrap();

        let docs = load_corpus(dir.path()).await.unwrap();
        assert_eq!(docs, vec![Document::new("good.txt", "fine")]);
    }
}
