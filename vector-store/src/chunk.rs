use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Category of an indexed fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Source code
    #[default]
    Code,
    /// Prose documentation (README, guides, docstrings extracted as text)
    Doc,
    /// Configuration files
    Config,
    /// Markup (HTML, XML, ...)
    Markup,
    /// Anything else
    Other,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Code => "code",
            ContentType::Doc => "doc",
            ContentType::Config => "config",
            ContentType::Markup => "markup",
            ContentType::Other => "other",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A retrievable fragment of a repository.
///
/// Documents are immutable once handed to an index. The `metadata` bag is
/// opaque to the retrieval core and is carried through to results unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier
    pub id: String,

    /// Textual content
    pub content: String,

    /// Owning project / repository name
    #[serde(default)]
    pub repo: String,

    /// Path of the file containing this fragment
    #[serde(default)]
    pub path: String,

    /// Content category
    #[serde(default)]
    pub content_type: ContentType,

    /// Language tag (`rust`, `python`, `markdown`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Starting line number (1-indexed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<usize>,

    /// Ending line number (1-indexed, inclusive)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,

    /// Opaque metadata
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Reason a document cannot be indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidDocument {
    EmptyId,
    InvertedLineRange { start: usize, end: usize },
}

impl fmt::Display for InvalidDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidDocument::EmptyId => f.write_str("document id is empty"),
            InvalidDocument::InvertedLineRange { start, end } => {
                write!(f, "start line {start} is after end line {end}")
            }
        }
    }
}

impl Document {
    /// Create a code document with no location information
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            repo: String::new(),
            path: String::new(),
            content_type: ContentType::Code,
            language: None,
            start_line: None,
            end_line: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = repo.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_lines(mut self, start_line: usize, end_line: usize) -> Self {
        self.start_line = Some(start_line);
        self.end_line = Some(end_line);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Get the number of lines covered, if a line range is known
    pub fn line_count(&self) -> Option<usize> {
        match (self.start_line, self.end_line) {
            (Some(start), Some(end)) if end >= start => Some(end - start + 1),
            _ => None,
        }
    }

    /// Check the structural invariants an index relies on
    pub fn validate(&self) -> Result<(), InvalidDocument> {
        if self.id.trim().is_empty() {
            return Err(InvalidDocument::EmptyId);
        }
        match (self.start_line, self.end_line) {
            (Some(start), Some(end)) if start > end => {
                Err(InvalidDocument::InvertedLineRange { start, end })
            }
            _ => Ok(()),
        }
    }
}
