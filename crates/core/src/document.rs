//! Corpus input types
//!
//! Documents are transient: the build pipeline reads each one once, turns
//! it into observations and drops it.

/// A document to index: its URL and extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Document identifier, normally a URL
    pub id: String,
    /// Extracted plain text
    pub text: String,
}

impl Document {
    /// Create a document.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Document {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A document tagged as inside or outside the category being trained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledDocument {
    /// The document itself
    pub document: Document,
    /// Whether the document belongs to the category
    pub in_category: bool,
}

impl LabeledDocument {
    /// Create a labeled document.
    pub fn new(document: Document, in_category: bool) -> Self {
        LabeledDocument {
            document,
            in_category,
        }
    }

    /// Shorthand for a document inside the category.
    pub fn positive(document: Document) -> Self {
        Self::new(document, true)
    }

    /// Shorthand for a document outside the category.
    pub fn negative(document: Document) -> Self {
        Self::new(document, false)
    }
}
