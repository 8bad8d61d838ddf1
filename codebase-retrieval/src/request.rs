use crate::error::{Result, RetrievalError};
use coderag_vector_store::{ContentTypeFilter, SearchFilters};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TOP_K: usize = 20;
pub const MAX_TOP_K: usize = 50;

/// Query object handed in by tool-level callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentTypeFilter>,

    /// Restrict results to fragments of one source file. With a blank query
    /// the file's fragments are listed instead of searched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,

    /// Requested result count; see [`SearchRequest::top_k`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            language: None,
            repo: None,
            content_type: None,
            file_path: None,
            top_k: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_repo(mut self, repo: impl Into<String>) -> Self {
        self.repo = Some(repo.into());
        self
    }

    pub fn with_content_type(mut self, content_type: ContentTypeFilter) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn with_file_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Effective result count: 20 when absent, clamped to 1..=50
    pub fn top_k(&self) -> usize {
        self.top_k_or(DEFAULT_TOP_K)
    }

    /// Effective result count with a caller-chosen default
    pub fn top_k_or(&self, default: usize) -> usize {
        self.top_k.unwrap_or(default).clamp(1, MAX_TOP_K)
    }

    pub fn filters(&self) -> SearchFilters {
        SearchFilters {
            language: self.language.clone(),
            repo: self.repo.clone(),
            content_type: self.content_type,
            path: self.file_path.clone(),
        }
    }

    /// True for a blank query scoped to one file
    pub fn is_file_listing(&self) -> bool {
        self.query.trim().is_empty() && self.file_path.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.file_path {
            if path.trim().is_empty() {
                return Err(RetrievalError::InvalidRequest(
                    "filePath must not be empty".to_string(),
                ));
            }
            return Ok(());
        }
        if self.query.trim().is_empty() {
            return Err(RetrievalError::InvalidRequest(
                "query must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Shorten content for display, cutting on a char boundary
pub fn preview(content: &str, max_chars: usize) -> String {
    match content.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &content[..end]),
        None => content.to_string(),
    }
}
