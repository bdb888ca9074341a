use async_trait::async_trait;

use crate::domain::DomainError;

/// Mode + blob identity of one path in a tree listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub mode: u32,
    pub blob_sha: String,
}

/// Raw blob content plus a cheap binary-detection result (NUL byte in the
/// first 8000 bytes, matching Git's own heuristic).
#[derive(Debug, Clone)]
pub struct BlobContent {
    pub bytes: Vec<u8>,
    pub is_binary: bool,
}

/// One entry of a `(from, to)` name-status diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub status: DiffStatus,
    pub from_path: Option<String>,
    pub to_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffStatus {
    Added,
    Modified,
    Deleted,
    Renamed,
    Copied,
}

/// Working-tree status relative to `HEAD`.
#[derive(Debug, Clone, Default)]
pub struct WorkingTreeStatus {
    pub modified: Vec<String>,
    pub staged: Vec<String>,
    pub untracked: Vec<String>,
    pub deleted: Vec<String>,
}

/// Read-only access to a Git repository's commit history (spec.md §1's Git
/// adapter collaborator). Implementations are expected to be synchronous
/// under the hood (`git2`) and run blocking calls off the async executor.
#[async_trait]
pub trait GitRepository: Send + Sync {
    /// Resolves a ref (branch, tag, short sha, `HEAD`, …) to a 40-char sha.
    async fn resolve_ref(&self, ref_name: &str) -> Result<String, DomainError>;

    /// Lists `(path, mode, blob_sha)` for every blob reachable from a commit's tree.
    async fn list_tree(&self, commit_sha: &str) -> Result<Vec<TreeEntry>, DomainError>;

    async fn read_blob(&self, blob_sha: &str) -> Result<BlobContent, DomainError>;

    /// Name-status diff between two commits, with rename/copy detection.
    async fn diff(&self, from_sha: &str, to_sha: &str) -> Result<Vec<DiffEntry>, DomainError>;

    async fn working_tree_status(&self) -> Result<WorkingTreeStatus, DomainError>;

    /// Canonical, symlink-resolved path of the repository's main worktree —
    /// the input to `derive_repository_id` (§6).
    fn canonical_path(&self) -> &str;
}
