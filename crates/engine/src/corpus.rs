//! Corpus sources
//!
//! A corpus is any iterator of `Result<Input, DocumentError>`. Errors are
//! per-document: the builder logs and skips them.

use derivex_core::{Document, DocumentError, LabeledDocument, Result};
use std::io;
use std::path::{Path, PathBuf};

/// One document per regular file of a directory, in file-name order.
///
/// Files are read lazily as the iterator advances. Document ids are
/// `file://` URLs of the canonical file paths. Subdirectories are ignored.
#[derive(Debug)]
pub struct DirectoryCorpus {
    files: std::vec::IntoIter<PathBuf>,
}

impl DirectoryCorpus {
    /// List the regular files of `dir`.
    pub fn open(dir: &Path) -> Result<Self> {
        let dir = dir.canonicalize()?;
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(DirectoryCorpus {
            files: files.into_iter(),
        })
    }

    /// Files not yet read.
    pub fn remaining(&self) -> usize {
        self.files.len()
    }

    /// Tag every document as inside or outside a category.
    pub fn labeled(self, in_category: bool) -> Labeled<Self> {
        Labeled::new(self, in_category)
    }
}

fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

impl Iterator for DirectoryCorpus {
    type Item = std::result::Result<Document, DocumentError>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.files.next()?;
        let id = file_url(&path);
        Some(match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Document::new(id, text)),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                Err(DocumentError::new(id, "file is not valid UTF-8"))
            }
            Err(e) => Err(DocumentError::new(id, e.to_string())),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.files.size_hint()
    }
}

/// Adapter turning a document corpus into a labeled one.
#[derive(Debug, Clone)]
pub struct Labeled<I> {
    inner: I,
    in_category: bool,
}

impl<I> Labeled<I> {
    /// Label every document of `inner` with `in_category`.
    pub fn new(inner: I, in_category: bool) -> Self {
        Labeled { inner, in_category }
    }
}

impl<I> Iterator for Labeled<I>
where
    I: Iterator<Item = std::result::Result<Document, DocumentError>>,
{
    type Item = std::result::Result<LabeledDocument, DocumentError>;

    fn next(&mut self) -> Option<Self::Item> {
        let in_category = self.in_category;
        self.inner
            .next()
            .map(|item| item.map(|doc| LabeledDocument::new(doc, in_category)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
