use crate::chunk::{ContentType, Document};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Content-type restriction requested by a caller.
///
/// `Both` (or an absent filter) matches every document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContentTypeFilter {
    Code,
    Doc,
    #[default]
    Both,
}

impl ContentTypeFilter {
    pub fn matches(self, content_type: ContentType) -> bool {
        match self {
            ContentTypeFilter::Both => true,
            ContentTypeFilter::Code => content_type == ContentType::Code,
            ContentTypeFilter::Doc => content_type == ContentType::Doc,
        }
    }
}

impl FromStr for ContentTypeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "code" => Ok(ContentTypeFilter::Code),
            "doc" | "docs" => Ok(ContentTypeFilter::Doc),
            "both" | "all" => Ok(ContentTypeFilter::Both),
            other => Err(format!(
                "unknown content type '{other}' (expected code, doc or both)"
            )),
        }
    }
}

/// Equality filters applied per document before scoring
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentTypeFilter>,

    /// Exact source path; restricts results to one file's fragments
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        self.language.is_none()
            && self.repo.is_none()
            && self.path.is_none()
            && self
                .content_type
                .is_none_or(|filter| filter == ContentTypeFilter::Both)
    }

    /// Check whether a document passes every configured filter
    pub fn matches(&self, document: &Document) -> bool {
        if let Some(language) = &self.language {
            if document.language.as_deref() != Some(language.as_str()) {
                return false;
            }
        }
        if let Some(repo) = &self.repo {
            if document.repo != *repo {
                return false;
            }
        }
        if let Some(path) = &self.path {
            if document.path != *path {
                return false;
            }
        }
        self.content_type
            .is_none_or(|filter| filter.matches(document.content_type))
    }
}
