use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStatus {
    InProgress,
    Complete,
    Failed,
}

impl CommitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommitStatus::InProgress => "in_progress",
            CommitStatus::Complete => "complete",
            CommitStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "complete" => CommitStatus::Complete,
            "failed" => CommitStatus::Failed,
            _ => CommitStatus::InProgress,
        }
    }
}

impl std::fmt::Display for CommitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingStatus {
    None,
    Pending,
    Complete,
}

impl EmbeddingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbeddingStatus::None => "none",
            EmbeddingStatus::Pending => "pending",
            EmbeddingStatus::Complete => "complete",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => EmbeddingStatus::Pending,
            "complete" => EmbeddingStatus::Complete,
            _ => EmbeddingStatus::None,
        }
    }
}

impl std::fmt::Display for EmbeddingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `(repo_id, commit_sha)` plus lifecycle state. Unique on `(repo_id, sha)`.
/// A commit is queryable only when `status = Complete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedCommit {
    id: String,
    repository_id: String,
    sha: String,
    status: CommitStatus,
    embedding_status: EmbeddingStatus,
    chunk_count: u64,
    created_at: i64,
    updated_at: i64,
}

impl IndexedCommit {
    pub fn start(repository_id: String, sha: String, embeddings_enabled: bool) -> Self {
        let now = current_timestamp();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            repository_id,
            sha,
            status: CommitStatus::InProgress,
            embedding_status: if embeddings_enabled {
                EmbeddingStatus::Complete
            } else {
                EmbeddingStatus::None
            },
            chunk_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        repository_id: String,
        sha: String,
        status: CommitStatus,
        embedding_status: EmbeddingStatus,
        chunk_count: u64,
        created_at: i64,
        updated_at: i64,
    ) -> Self {
        Self {
            id,
            repository_id,
            sha,
            status,
            embedding_status,
            chunk_count,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }
    pub fn sha(&self) -> &str {
        &self.sha
    }
    pub fn status(&self) -> CommitStatus {
        self.status
    }
    pub fn embedding_status(&self) -> EmbeddingStatus {
        self.embedding_status
    }
    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }
    pub fn created_at(&self) -> i64 {
        self.created_at
    }
    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    pub fn is_queryable(&self) -> bool {
        self.status == CommitStatus::Complete
    }

    pub fn complete(&mut self, chunk_count: u64) {
        self.status = CommitStatus::Complete;
        self.chunk_count = chunk_count;
        self.updated_at = current_timestamp();
    }

    pub fn fail(&mut self) {
        self.status = CommitStatus::Failed;
        self.updated_at = current_timestamp();
    }
}

fn current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_commit_is_in_progress() {
        let commit = IndexedCommit::start("repo".into(), "abc123".into(), true);
        assert_eq!(commit.status(), CommitStatus::InProgress);
        assert!(!commit.is_queryable());
        assert_eq!(commit.embedding_status(), EmbeddingStatus::Complete);
    }

    #[test]
    fn complete_makes_queryable() {
        let mut commit = IndexedCommit::start("repo".into(), "abc123".into(), false);
        commit.complete(42);
        assert!(commit.is_queryable());
        assert_eq!(commit.chunk_count(), 42);
    }

    #[test]
    fn fail_is_not_queryable() {
        let mut commit = IndexedCommit::start("repo".into(), "abc123".into(), true);
        commit.fail();
        assert_eq!(commit.status(), CommitStatus::Failed);
        assert!(!commit.is_queryable());
    }
}
