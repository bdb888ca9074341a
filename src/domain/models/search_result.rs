use serde::{Deserialize, Serialize};

use super::{Chunk, ContentType};

/// One fused/scored hit returned by the hybrid query engine.
///
/// Usually wraps a `Chunk`; when an SQI match has no vector-result partner in
/// its file/line range, the engine may synthesize a placeholder chunk that
/// carries the SQI symbol's name/kind/location with a placeholder body
/// (§4.J Fusion).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    chunk: Chunk,
    score: f32,
    highlights: Option<Vec<String>>,
    matched_symbol: Option<String>,
}

impl SearchResult {
    pub fn new(chunk: Chunk, score: f32) -> Self {
        Self {
            chunk,
            score,
            highlights: None,
            matched_symbol: None,
        }
    }

    pub fn with_highlights(mut self, highlights: Vec<String>) -> Self {
        self.highlights = Some(highlights);
        self
    }

    pub fn with_matched_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.matched_symbol = Some(symbol.into());
        self
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = score;
        self
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn highlights(&self) -> Option<&[String]> {
        self.highlights.as_deref()
    }

    pub fn matched_symbol(&self) -> Option<&str> {
        self.matched_symbol.as_deref()
    }

    pub fn is_relevant(&self, threshold: f32) -> bool {
        self.score >= threshold
    }

    pub fn has_highlights(&self) -> bool {
        self.highlights.as_ref().is_some_and(|h| !h.is_empty())
    }

    pub fn display_line(&self) -> String {
        format!("{} (score: {:.3})", self.chunk.location(), self.score)
    }

    /// Fusion merge key (§4.J): `(path, start_line)`.
    pub fn merge_key(&self) -> (String, u32) {
        (self.chunk.file_path().to_string(), self.chunk.start_line())
    }
}

/// Query parameters for `query()` (§4.J contract).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    repo_id: String,
    sha: String,
    query: String,
    limit: usize,
    cursor: Option<Cursor>,
    language: Option<String>,
    path_pattern: Option<String>,
    content_type: Option<ContentType>,
    include_all_content_types: bool,
    hybrid: bool,
    boost: bool,
}

pub const DEFAULT_MAX_LIMIT: usize = 100;
pub const DEFAULT_LIMIT: usize = 50;

impl SearchQuery {
    pub fn new(repo_id: impl Into<String>, sha: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            sha: sha.into(),
            query: query.into(),
            limit: DEFAULT_LIMIT,
            cursor: None,
            language: None,
            path_pattern: None,
            content_type: None,
            include_all_content_types: false,
            hybrid: false,
            boost: false,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    pub fn with_cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_path_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.path_pattern = Some(pattern.into());
        self
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = Some(content_type);
        self
    }

    pub fn with_include_all_content_types(mut self, include_all: bool) -> Self {
        self.include_all_content_types = include_all;
        self
    }

    pub fn with_hybrid(mut self, hybrid: bool) -> Self {
        self.hybrid = hybrid;
        self
    }

    pub fn with_boost(mut self, boost: bool) -> Self {
        self.boost = boost;
        self
    }

    pub fn repo_id(&self) -> &str {
        &self.repo_id
    }

    pub fn sha(&self) -> &str {
        &self.sha
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn path_pattern(&self) -> Option<&str> {
        self.path_pattern.as_deref()
    }

    /// `content_type` defaults to `code` unless `include_all_content_types`
    /// or an explicit list was supplied (§4.E filter semantics).
    pub fn effective_content_types(&self) -> Vec<ContentType> {
        if self.include_all_content_types {
            vec![ContentType::Code, ContentType::Docs, ContentType::Config]
        } else if let Some(ct) = self.content_type {
            vec![ct]
        } else {
            vec![ContentType::Code]
        }
    }

    pub fn is_hybrid(&self) -> bool {
        self.hybrid
    }

    pub fn is_boost(&self) -> bool {
        self.boost
    }

    pub fn validate(&self, max_limit: usize) -> Result<(), String> {
        if self.limit == 0 {
            return Err("INVALID_PARAMS: limit must be positive".to_string());
        }
        if self.limit > max_limit {
            return Err(format!("LIMIT_EXCEEDED: limit {} > max {}", self.limit, max_limit));
        }
        Ok(())
    }
}

/// Cursor for stable pagination: `(last_score, last_id)` (§4.J Pagination).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub last_score: f32,
    pub last_id: u64,
}

impl Cursor {
    pub fn new(last_score: f32, last_id: u64) -> Self {
        Self { last_score, last_id }
    }

    /// Cursor filtering: admit everything with strictly lower score, and for
    /// ties on score, everything with a strictly lower id (stable ordering).
    pub fn admits(&self, score: f32, id: u64) -> bool {
        score < self.last_score || (score == self.last_score && id < self.last_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Language, SymbolKind};

    fn sample_chunk() -> Chunk {
        Chunk::new(
            "repo".to_string(),
            "test.rs".to_string(),
            "fn test() {}".to_string(),
            1,
            1,
            Language::Rust,
            SymbolKind::Function,
        )
    }

    #[test]
    fn test_search_result_creation() {
        let chunk = sample_chunk();
        let result = SearchResult::new(chunk, 0.95);

        assert_eq!(result.score(), 0.95);
        assert!(result.is_relevant(0.5));
        assert!(!result.is_relevant(0.99));
    }

    #[test]
    fn test_search_query_builder() {
        let query = SearchQuery::new("repo-1", "abc123", "find functions")
            .with_limit(20)
            .with_language("rust");

        assert_eq!(query.query(), "find functions");
        assert_eq!(query.limit(), 20);
        assert_eq!(query.language(), Some("rust"));
    }

    #[test]
    fn content_type_defaults_to_code() {
        let query = SearchQuery::new("repo-1", "abc123", "how does auth work");
        assert_eq!(query.effective_content_types(), vec![ContentType::Code]);
    }

    #[test]
    fn limit_validation_rejects_overflow() {
        let query = SearchQuery::new("repo-1", "abc123", "x").with_limit(200);
        assert!(query.validate(100).is_err());
    }

    #[test]
    fn cursor_admits_strictly_lower_scores() {
        let cursor = Cursor::new(0.85, 3);
        assert!(cursor.admits(0.80, 4));
        assert!(!cursor.admits(0.85, 3));
        assert!(!cursor.admits(0.90, 1));
    }
}
