use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{DomainError, FileBlobEntry, IndexedCommit, LanguageStats, Repository};

/// Three-state indexing status surfaced by `getIndexingStatus` (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitIndexState {
    Indexed,
    InProgress,
    NotIndexed,
}

/// Persistence for repository metadata, indexed-commit lifecycle, and the
/// content-addressed dedup/reference tables (§4.D): `repositories`,
/// `indexed_commits`, `chunk_refs`, `file_blobs`, `blob_chunks`,
/// `gc_candidates`. All mutations touching a single commit's state are
/// expected to run inside one transaction.
#[async_trait]
pub trait MetadataRepository: Send + Sync {
    // --- repositories ---

    async fn register_repository(&self, repository: &Repository) -> Result<(), DomainError>;

    async fn find_repository_by_id(&self, id: &str) -> Result<Option<Repository>, DomainError>;

    async fn find_repository_by_path(&self, path: &str) -> Result<Option<Repository>, DomainError>;

    async fn list_repositories(&self) -> Result<Vec<Repository>, DomainError>;

    async fn update_repository_stats(
        &self,
        id: &str,
        chunk_count: u64,
        file_count: u64,
        languages: HashMap<String, LanguageStats>,
    ) -> Result<(), DomainError>;

    // --- indexed_commits ---

    /// Inserts a new `in_progress` row. Fails with `AlreadyExists` if
    /// `(repo_id, sha)` already has a non-deleted row (callers wanting to
    /// restart a run must `delete_commit` first, per the `force` path).
    async fn start_indexing(
        &self,
        repo_id: &str,
        sha: &str,
        embeddings_enabled: bool,
    ) -> Result<IndexedCommit, DomainError>;

    async fn complete_indexing(&self, commit_id: &str, chunk_count: u64) -> Result<(), DomainError>;

    async fn fail_indexing(&self, commit_id: &str) -> Result<(), DomainError>;

    async fn find_commit(&self, repo_id: &str, sha: &str) -> Result<Option<IndexedCommit>, DomainError>;

    async fn is_commit_indexed(&self, repo_id: &str, sha: &str) -> Result<bool, DomainError> {
        Ok(self
            .find_commit(repo_id, sha)
            .await?
            .is_some_and(|c| c.is_queryable()))
    }

    async fn indexing_status(&self, repo_id: &str, sha: &str) -> Result<CommitIndexState, DomainError> {
        Ok(match self.find_commit(repo_id, sha).await? {
            None => CommitIndexState::NotIndexed,
            Some(c) if c.is_queryable() => CommitIndexState::Indexed,
            Some(_) => CommitIndexState::InProgress,
        })
    }

    /// Deletes the commit row and its `chunk_refs`/`file_blobs` rows; used
    /// by the `force` reindex path (§4.F step 2).
    async fn delete_commit(&self, commit_id: &str) -> Result<(), DomainError>;

    // --- chunk_refs ---

    async fn add_chunk_refs(&self, commit_id: &str, chunk_ids: &[String]) -> Result<(), DomainError>;

    /// Copies every chunk ref from `from_commit_id` to `to_commit_id` except
    /// those belonging to files in `exclude_paths`, returning the set of
    /// chunk ids copied (§4.G unchanged-set carry-forward).
    async fn copy_chunk_refs(
        &self,
        from_commit_id: &str,
        to_commit_id: &str,
        exclude_paths: &[String],
    ) -> Result<Vec<String>, DomainError>;

    async fn commit_chunk_count(&self, commit_id: &str) -> Result<u64, DomainError>;

    // --- file_blobs ---

    async fn record_file_blobs(&self, entries: &[FileBlobEntry]) -> Result<(), DomainError>;

    async fn file_blobs_for_commit(&self, commit_id: &str) -> Result<Vec<FileBlobEntry>, DomainError>;

    // --- blob_chunks ---

    async fn record_blob_chunks(&self, blob_sha: &str, chunk_ids: &[String]) -> Result<(), DomainError>;

    async fn chunks_for_blob(&self, blob_sha: &str) -> Result<Vec<String>, DomainError>;

    /// For each blob sha with a recorded mapping, returns its chunk ids.
    /// Blobs absent from the map have never been indexed.
    async fn indexed_blobs(
        &self,
        blob_shas: &[String],
    ) -> Result<HashMap<String, Vec<String>>, DomainError>;

    /// Deletes `blob_chunks` rows for the given blobs (orphan cleanup ahead
    /// of re-parse, §4.F step 7).
    async fn delete_blob_chunks(&self, blob_shas: &[String]) -> Result<(), DomainError>;

    // --- gc_candidates ---

    async fn mark_gc_candidate(&self, chunk_id: &str, orphaned_at: i64, eligible_at: i64) -> Result<(), DomainError>;

    async fn unmark_gc_candidate(&self, chunk_id: &str) -> Result<(), DomainError>;

    async fn list_eligible_gc(&self, as_of: i64) -> Result<Vec<String>, DomainError>;
}
