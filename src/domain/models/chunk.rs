use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::Language;

/// A semantic code unit, typically one symbol's body.
///
/// Identity is content-addressed: `(relative_path, symbol_name, start_line,
/// end_line, content)` always produces the same id, so two commits that
/// contain an unchanged file share chunk ids exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    id: String,
    repository_id: String,
    /// Commits this chunk currently appears in. Empty makes the chunk GC-eligible.
    commits: BTreeSet<String>,
    branches: Vec<String>,
    file_path: String,
    content: String,
    start_line: u32,
    end_line: u32,
    language: Language,
    symbol_kind: SymbolKind,
    content_type: ContentType,
    symbol_name: Option<String>,
    parent_symbol: Option<String>,
}

impl Chunk {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository_id: String,
        file_path: String,
        content: String,
        start_line: u32,
        end_line: u32,
        language: Language,
        symbol_kind: SymbolKind,
    ) -> Self {
        let id = compute_chunk_id(&file_path, None, start_line, end_line, &content);
        Self {
            id,
            repository_id,
            commits: BTreeSet::new(),
            branches: Vec::new(),
            file_path,
            content,
            start_line,
            end_line,
            language,
            symbol_kind,
            content_type: ContentType::Code,
            symbol_name: None,
            parent_symbol: None,
        }
    }

    /// Reconstitutes from persisted data (used by adapters).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        repository_id: String,
        commits: BTreeSet<String>,
        branches: Vec<String>,
        file_path: String,
        content: String,
        start_line: u32,
        end_line: u32,
        language: Language,
        symbol_kind: SymbolKind,
        content_type: ContentType,
        symbol_name: Option<String>,
        parent_symbol: Option<String>,
    ) -> Self {
        Self {
            id,
            repository_id,
            commits,
            branches,
            file_path,
            content,
            start_line,
            end_line,
            language,
            symbol_kind,
            content_type,
            symbol_name,
            parent_symbol,
        }
    }

    pub fn with_symbol_name(mut self, name: impl Into<String>) -> Self {
        self.symbol_name = Some(name.into());
        self.id = compute_chunk_id(
            &self.file_path,
            self.symbol_name.as_deref(),
            self.start_line,
            self.end_line,
            &self.content,
        );
        self
    }

    pub fn with_parent_symbol(mut self, parent: impl Into<String>) -> Self {
        self.parent_symbol = Some(parent.into());
        self
    }

    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    pub fn with_commit(mut self, commit_sha: impl Into<String>) -> Self {
        self.commits.insert(commit_sha.into());
        self
    }

    pub fn add_commit(&mut self, commit_sha: impl Into<String>) -> bool {
        self.commits.insert(commit_sha.into())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }

    pub fn commits(&self) -> &BTreeSet<String> {
        &self.commits
    }

    pub fn branches(&self) -> &[String] {
        &self.branches
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn symbol_kind(&self) -> SymbolKind {
        self.symbol_kind
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    pub fn symbol_name(&self) -> Option<&str> {
        self.symbol_name.as_deref()
    }

    pub fn parent_symbol(&self) -> Option<&str> {
        self.parent_symbol.as_deref()
    }

    pub fn location(&self) -> String {
        format!("{}:{}-{}", self.file_path, self.start_line, self.end_line)
    }

    pub fn line_count(&self) -> u32 {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    pub fn is_callable(&self) -> bool {
        matches!(self.symbol_kind, SymbolKind::Function | SymbolKind::Method)
    }

    pub fn is_type_definition(&self) -> bool {
        matches!(
            self.symbol_kind,
            SymbolKind::Class | SymbolKind::Module | SymbolKind::Other
        )
    }

    pub fn preview(&self, max_lines: usize) -> String {
        self.content
            .lines()
            .take(max_lines)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn belongs_to_repository(&self, repository_id: &str) -> bool {
        self.repository_id == repository_id
    }

    /// Content-addressed invariant 2: a chunk with no commits is GC-eligible.
    pub fn is_gc_eligible(&self) -> bool {
        self.commits.is_empty()
    }

    pub fn qualified_name(&self) -> Option<String> {
        match (&self.parent_symbol, &self.symbol_name) {
            (Some(parent), Some(name)) => Some(format!("{}.{}", parent, name)),
            (None, Some(name)) => Some(name.clone()),
            _ => None,
        }
    }
}

/// Deterministically derives a chunk id from its content-addressing key.
///
/// The same `(path, symbol, start, end, content)` always yields the same id
/// (invariant 1); the digest is reformatted as a UUID-shaped string purely
/// for external-interface consistency with the rest of the id space.
pub fn compute_chunk_id(
    path: &str,
    symbol: Option<&str>,
    start_line: u32,
    end_line: u32,
    content: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update(b"\0");
    hasher.update(symbol.unwrap_or("").as_bytes());
    hasher.update(b"\0");
    hasher.update(start_line.to_le_bytes());
    hasher.update(end_line.to_le_bytes());
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    Uuid::from_slice(&digest[..16])
        .map(|u| u.to_string())
        .unwrap_or_else(|_| Uuid::nil().to_string())
}

/// Open enum of symbol kinds a chunk can represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
    Method,
    Module,
    Other,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Class => "class",
            SymbolKind::Method => "method",
            SymbolKind::Module => "module",
            SymbolKind::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "function" => SymbolKind::Function,
            "class" => SymbolKind::Class,
            "method" => SymbolKind::Method,
            "module" => SymbolKind::Module,
            _ => SymbolKind::Other,
        }
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The broad content category a chunk belongs to, used for query filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Code,
    Docs,
    Config,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Code => "code",
            ContentType::Docs => "docs",
            ContentType::Config => "config",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "docs" => ContentType::Docs,
            "config" => ContentType::Config,
            _ => ContentType::Code,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_deterministic() {
        let id1 = compute_chunk_id("src/lib.rs", Some("add"), 10, 12, "fn add() {}");
        let id2 = compute_chunk_id("src/lib.rs", Some("add"), 10, 12, "fn add() {}");
        assert_eq!(id1, id2);
    }

    #[test]
    fn chunk_id_changes_with_content() {
        let id1 = compute_chunk_id("src/lib.rs", Some("add"), 10, 12, "fn add() {}");
        let id2 = compute_chunk_id("src/lib.rs", Some("add"), 10, 12, "fn add() { 1 }");
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_chunk_creation() {
        let chunk = Chunk::new(
            "repo-123".to_string(),
            "src/lib.rs".to_string(),
            "fn add(a: i32, b: i32) -> i32 { a + b }".to_string(),
            10,
            12,
            Language::Rust,
            SymbolKind::Function,
        )
        .with_symbol_name("add");

        assert_eq!(chunk.file_path(), "src/lib.rs");
        assert_eq!(chunk.symbol_name(), Some("add"));
        assert_eq!(chunk.line_count(), 3);
        assert!(chunk.is_callable());
        assert!(chunk.is_gc_eligible());
    }

    #[test]
    fn qualified_name_joins_parent() {
        let chunk = Chunk::new(
            "repo".to_string(),
            "src/lib.rs".to_string(),
            "fn method() {}".to_string(),
            1,
            1,
            Language::Rust,
            SymbolKind::Method,
        )
        .with_symbol_name("method")
        .with_parent_symbol("MyStruct");

        assert_eq!(chunk.qualified_name(), Some("MyStruct.method".to_string()));
    }

    #[test]
    fn add_commit_membership() {
        let mut chunk = Chunk::new(
            "repo".to_string(),
            "test.rs".to_string(),
            "code".to_string(),
            5,
            10,
            Language::Rust,
            SymbolKind::Function,
        );
        assert!(chunk.is_gc_eligible());
        assert!(chunk.add_commit("deadbeef"));
        assert!(!chunk.is_gc_eligible());
        assert!(!chunk.add_commit("deadbeef"));
        assert!(chunk.commits().contains("deadbeef"));
    }
}
