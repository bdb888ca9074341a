use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{Chunk, DomainError, Embedding, SearchQuery, SearchResult};

/// Vector storage and commit-scoped similarity search (§4.E).
#[async_trait]
pub trait VectorRepository: Send + Sync {
    async fn upsert_chunks(
        &self,
        chunks: &[Chunk],
        embeddings: &[Embedding],
    ) -> Result<(), DomainError>;

    async fn search(
        &self,
        query_embedding: &[f32],
        query: &SearchQuery,
    ) -> Result<Vec<SearchResult>, DomainError>;

    /// Idempotently appends `sha` to a chunk's `commits[]` payload field.
    async fn add_commit_to_chunk(&self, chunk_id: &str, sha: &str) -> Result<(), DomainError>;

    /// Returns the subset of `ids` that already exist in the store. Callers
    /// are expected to consult the LRU existence cache before calling this.
    async fn chunks_exist(&self, ids: &[String]) -> Result<Vec<String>, DomainError>;

    async fn get_chunks(&self, ids: &[String]) -> Result<HashMap<String, Chunk>, DomainError>;

    async fn delete_chunks(&self, ids: &[String]) -> Result<(), DomainError>;

    /// Deletes every chunk belonging to a repository, returning the count
    /// deleted.
    async fn delete_by_repo_id(&self, repository_id: &str) -> Result<u64, DomainError>;

    async fn get_stats(&self) -> Result<VectorStoreStats, DomainError>;

    async fn count(&self) -> Result<u64, DomainError>;
}

#[derive(Debug, Clone, Default)]
pub struct VectorStoreStats {
    pub total_chunks: u64,
    pub total_repositories: u64,
}
