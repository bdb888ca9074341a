use async_trait::async_trait;

use crate::domain::{Chunk, DomainError, Import, Language, Symbol, Usage};

/// Outcome of `parse_file` (§4.A). A file that fails to parse is not an
/// error at this boundary: it is reported with `success = false` and an
/// empty chunk list so the caller can isolate the failure to one file.
#[derive(Debug, Clone)]
pub struct ParseFileResult {
    pub path: String,
    pub language: Language,
    pub chunks: Vec<Chunk>,
    pub success: bool,
    pub error: Option<String>,
}

/// Outcome of `extract` (§4.B).
#[derive(Debug, Clone, Default)]
pub struct ExtractResult {
    pub symbols: Vec<Symbol>,
    pub usages: Vec<Usage>,
    pub imports: Vec<Import>,
    pub success: bool,
}

/// Parses source into semantic chunks and extracts structural (SQI) data.
#[async_trait]
pub trait ParserService: Send + Sync {
    /// Parse a file into semantic code chunks (functions, classes, etc.).
    async fn parse_file(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
        repository_id: &str,
        commit_sha: &str,
    ) -> Result<ParseFileResult, DomainError>;

    /// Extract symbols, usages, and imports from a file (§4.B).
    async fn extract(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
        repository_id: &str,
        commit_sha: &str,
    ) -> Result<ExtractResult, DomainError>;

    fn supported_languages(&self) -> Vec<Language>;

    fn supports_language(&self, language: Language) -> bool {
        self.supported_languages().contains(&language)
    }
}
