use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;
use uuid::Uuid;

/// The type of vector storage backend used for a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VectorStore {
    #[default]
    DuckDb,
    InMemory,
}

impl VectorStore {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorStore::DuckDb => "duckdb",
            VectorStore::InMemory => "memory",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "duckdb" => VectorStore::DuckDb,
            "memory" | "inmemory" | "in_memory" => VectorStore::InMemory,
            unknown => {
                warn!(
                    "Unknown vector store type '{}', defaulting to DuckDB",
                    unknown
                );
                VectorStore::DuckDb
            }
        }
    }
}

/// Per-language aggregate stats rolled up after each `indexCommit`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LanguageStats {
    pub file_count: u64,
    pub chunk_count: u64,
}

/// Repo id format: UUID-shaped (`8-4-4-4-12`), derived deterministically from
/// the canonical, symlink-resolved repository path (§6). Worktrees resolve to
/// the same id as their main repository because `canonical_path` is expected
/// to already have been resolved to the main repo's checkout before calling.
pub fn derive_repository_id(canonical_path: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"codesearch-repo-id:");
    hasher.update(canonical_path.as_bytes());
    let digest = hasher.finalize();
    Uuid::from_slice(&digest[..16])
        .map(|u| u.to_string())
        .unwrap_or_else(|_| Uuid::nil().to_string())
}

/// A registered source repository. Repositories are created by an explicit
/// register call and never deleted implicitly (§3 lifecycles).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    id: String,
    name: String,
    path: String,
    created_at: i64,
    updated_at: i64,
    chunk_count: u64,
    file_count: u64,
    store: VectorStore,
    namespace: Option<String>,
    languages: HashMap<String, LanguageStats>,
}

impl Repository {
    /// Registers a repository by its canonical path, deriving a stable id.
    pub fn register(name: String, canonical_path: String) -> Self {
        let now = current_timestamp();
        Self {
            id: derive_repository_id(&canonical_path),
            name,
            path: canonical_path,
            created_at: now,
            updated_at: now,
            chunk_count: 0,
            file_count: 0,
            store: VectorStore::default(),
            namespace: None,
            languages: HashMap::new(),
        }
    }

    /// Reconstitutes from persisted data (used by adapters).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        name: String,
        path: String,
        created_at: i64,
        updated_at: i64,
        chunk_count: u64,
        file_count: u64,
        store: VectorStore,
        namespace: Option<String>,
        languages: HashMap<String, LanguageStats>,
    ) -> Self {
        Self {
            id,
            name,
            path,
            created_at,
            updated_at,
            chunk_count,
            file_count,
            store,
            namespace,
            languages,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    pub fn file_count(&self) -> u64 {
        self.file_count
    }

    pub fn store(&self) -> VectorStore {
        self.store
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn languages(&self) -> &HashMap<String, LanguageStats> {
        &self.languages
    }

    pub fn update_stats(&mut self, chunk_count: u64, file_count: u64) {
        self.chunk_count = chunk_count;
        self.file_count = file_count;
        self.updated_at = current_timestamp();
    }

    pub fn update_languages(&mut self, languages: HashMap<String, LanguageStats>) {
        self.languages = languages;
        self.updated_at = current_timestamp();
    }

    pub fn is_indexed(&self) -> bool {
        self.chunk_count > 0
    }

    pub fn is_empty(&self) -> bool {
        self.file_count == 0
    }

    pub fn average_chunks_per_file(&self) -> f64 {
        if self.file_count == 0 {
            0.0
        } else {
            self.chunk_count as f64 / self.file_count as f64
        }
    }

    pub fn summary(&self) -> String {
        format!(
            "{} ({} files, {} chunks)",
            self.name, self.file_count, self.chunk_count
        )
    }

    pub fn matches_path(&self, path: &str) -> bool {
        self.path == path
    }

    pub fn age_seconds(&self) -> i64 {
        current_timestamp().saturating_sub(self.created_at)
    }

    pub fn seconds_since_update(&self) -> i64 {
        current_timestamp().saturating_sub(self.updated_at)
    }
}

fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Aggregate indexing status surfaced by `getIndexingStatus` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexingStatus {
    NotIndexed,
    InProgress,
    Indexed,
}

impl IndexingStatus {
    pub fn is_complete(&self) -> bool {
        matches!(self, IndexingStatus::Indexed)
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, IndexingStatus::InProgress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_id_is_deterministic() {
        let id1 = derive_repository_id("/home/user/project");
        let id2 = derive_repository_id("/home/user/project");
        assert_eq!(id1, id2);
        assert_eq!(id1.len(), 36);
    }

    #[test]
    fn different_paths_yield_different_ids() {
        let id1 = derive_repository_id("/home/user/project-a");
        let id2 = derive_repository_id("/home/user/project-b");
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_repository_registration() {
        let repo = Repository::register("my-repo".to_string(), "/path/to/repo".to_string());

        assert_eq!(repo.name(), "my-repo");
        assert_eq!(repo.path(), "/path/to/repo");
        assert_eq!(repo.chunk_count(), 0);
        assert!(!repo.is_indexed());
        assert!(repo.is_empty());
    }

    #[test]
    fn test_update_stats() {
        let mut repo = Repository::register("test".to_string(), "/test".to_string());

        repo.update_stats(100, 10);

        assert_eq!(repo.chunk_count(), 100);
        assert_eq!(repo.file_count(), 10);
        assert!(repo.is_indexed());
        assert!(!repo.is_empty());
    }

    #[test]
    fn test_average_chunks_per_file() {
        let mut repo = Repository::register("test".to_string(), "/test".to_string());

        repo.update_stats(50, 10);

        assert!((repo.average_chunks_per_file() - 5.0).abs() < 0.01);
    }
}
