use async_trait::async_trait;
use git2::{Delta, DiffFindOptions, DiffOptions, ObjectType, Oid, Status, TreeWalkMode, TreeWalkResult};
use tracing::warn;

use crate::application::{
    BlobContent, DiffEntry, DiffStatus, GitRepository, TreeEntry, WorkingTreeStatus,
};
use crate::domain::DomainError;

/// `git2`-backed read-only repository access. Each call reopens the
/// repository on a blocking thread rather than holding a `git2::Repository`
/// across an await point (it is not `Sync`), mirroring how the DuckDB
/// adapters keep their connection behind a lock instead of across awaits.
pub struct Git2Repository {
    canonical_path: String,
}

impl Git2Repository {
    pub fn open(canonical_path: impl Into<String>) -> Result<Self, DomainError> {
        let canonical_path = canonical_path.into();
        git2::Repository::discover(&canonical_path)
            .map_err(|e| DomainError::NotARepository(format!("{canonical_path}: {e}")))?;
        Ok(Self { canonical_path })
    }

    fn discover(&self) -> Result<git2::Repository, DomainError> {
        git2::Repository::discover(&self.canonical_path)
            .map_err(|e| DomainError::NotARepository(e.to_string()))
    }
}

#[async_trait]
impl GitRepository for Git2Repository {
    async fn resolve_ref(&self, ref_name: &str) -> Result<String, DomainError> {
        let ref_name = ref_name.to_string();
        let path = self.canonical_path.clone();
        tokio::task::spawn_blocking(move || {
            let repo = git2::Repository::discover(&path)
                .map_err(|e| DomainError::NotARepository(e.to_string()))?;
            let obj = repo
                .revparse_single(&ref_name)
                .map_err(|_| DomainError::RefNotFound(ref_name.clone()))?;
            let commit = obj
                .peel_to_commit()
                .map_err(|_| DomainError::RefNotFound(ref_name.clone()))?;
            Ok(commit.id().to_string())
        })
        .await
        .map_err(|e| DomainError::GitOperationFailed(e.to_string()))?
    }

    async fn list_tree(&self, commit_sha: &str) -> Result<Vec<TreeEntry>, DomainError> {
        let sha = commit_sha.to_string();
        let path = self.canonical_path.clone();
        tokio::task::spawn_blocking(move || {
            let repo = git2::Repository::discover(&path)
                .map_err(|e| DomainError::NotARepository(e.to_string()))?;
            let oid = Oid::from_str(&sha).map_err(|_| DomainError::CommitNotFound(sha.clone()))?;
            let commit = repo
                .find_commit(oid)
                .map_err(|_| DomainError::CommitNotFound(sha.clone()))?;
            let tree = commit
                .tree()
                .map_err(|e| DomainError::GitOperationFailed(e.to_string()))?;

            let mut entries = Vec::new();
            tree.walk(TreeWalkMode::PreOrder, |root, entry| {
                if entry.kind() == Some(ObjectType::Blob) {
                    if let Some(name) = entry.name() {
                        entries.push(TreeEntry {
                            path: format!("{root}{name}"),
                            mode: entry.filemode() as u32,
                            blob_sha: entry.id().to_string(),
                        });
                    }
                }
                TreeWalkResult::Ok
            })
            .map_err(|e| DomainError::GitOperationFailed(e.to_string()))?;

            Ok(entries)
        })
        .await
        .map_err(|e| DomainError::GitOperationFailed(e.to_string()))?
    }

    async fn read_blob(&self, blob_sha: &str) -> Result<BlobContent, DomainError> {
        let sha = blob_sha.to_string();
        let path = self.canonical_path.clone();
        tokio::task::spawn_blocking(move || {
            let repo = git2::Repository::discover(&path)
                .map_err(|e| DomainError::NotARepository(e.to_string()))?;
            let oid = Oid::from_str(&sha).map_err(|_| DomainError::GitFileNotFound(sha.clone()))?;
            let blob = repo
                .find_blob(oid)
                .map_err(|_| DomainError::GitFileNotFound(sha.clone()))?;
            Ok(BlobContent {
                bytes: blob.content().to_vec(),
                is_binary: blob.is_binary(),
            })
        })
        .await
        .map_err(|e| DomainError::GitOperationFailed(e.to_string()))?
    }

    async fn diff(&self, from_sha: &str, to_sha: &str) -> Result<Vec<DiffEntry>, DomainError> {
        let from = from_sha.to_string();
        let to = to_sha.to_string();
        let path = self.canonical_path.clone();
        tokio::task::spawn_blocking(move || {
            let repo = git2::Repository::discover(&path)
                .map_err(|e| DomainError::NotARepository(e.to_string()))?;
            let from_tree = repo
                .find_commit(Oid::from_str(&from).map_err(|_| DomainError::CommitNotFound(from.clone()))?)
                .map_err(|_| DomainError::CommitNotFound(from.clone()))?
                .tree()
                .map_err(|e| DomainError::GitOperationFailed(e.to_string()))?;
            let to_tree = repo
                .find_commit(Oid::from_str(&to).map_err(|_| DomainError::CommitNotFound(to.clone()))?)
                .map_err(|_| DomainError::CommitNotFound(to.clone()))?
                .tree()
                .map_err(|e| DomainError::GitOperationFailed(e.to_string()))?;

            let mut opts = DiffOptions::new();
            let mut diff = repo
                .diff_tree_to_tree(Some(&from_tree), Some(&to_tree), Some(&mut opts))
                .map_err(|e| DomainError::GitOperationFailed(e.to_string()))?;
            diff.find_similar(Some(DiffFindOptions::new().renames(true).copies(true)))
                .map_err(|e| DomainError::GitOperationFailed(e.to_string()))?;

            let entries = diff
                .deltas()
                .filter_map(|delta| {
                    let status = match delta.status() {
                        Delta::Added => DiffStatus::Added,
                        Delta::Deleted => DiffStatus::Deleted,
                        Delta::Renamed => DiffStatus::Renamed,
                        Delta::Copied => DiffStatus::Copied,
                        Delta::Modified | Delta::Typechange => DiffStatus::Modified,
                        _ => return None,
                    };
                    Some(DiffEntry {
                        status,
                        from_path: delta.old_file().path().map(|p| p.to_string_lossy().to_string()),
                        to_path: delta.new_file().path().map(|p| p.to_string_lossy().to_string()),
                    })
                })
                .collect();

            Ok(entries)
        })
        .await
        .map_err(|e| DomainError::GitOperationFailed(e.to_string()))?
    }

    async fn working_tree_status(&self) -> Result<WorkingTreeStatus, DomainError> {
        let path = self.canonical_path.clone();
        tokio::task::spawn_blocking(move || {
            let repo = git2::Repository::discover(&path)
                .map_err(|e| DomainError::NotARepository(e.to_string()))?;
            let statuses = repo
                .statuses(None)
                .map_err(|e| DomainError::GitOperationFailed(e.to_string()))?;

            let mut result = WorkingTreeStatus::default();
            for entry in statuses.iter() {
                let Some(path) = entry.path() else { continue };
                let status = entry.status();
                if status.intersects(Status::WT_NEW) {
                    result.untracked.push(path.to_string());
                } else if status.intersects(Status::WT_DELETED | Status::INDEX_DELETED) {
                    result.deleted.push(path.to_string());
                } else if status.intersects(Status::INDEX_NEW | Status::INDEX_MODIFIED | Status::INDEX_RENAMED) {
                    result.staged.push(path.to_string());
                } else if status.intersects(Status::WT_MODIFIED) {
                    result.modified.push(path.to_string());
                } else {
                    warn!(path, ?status, "unclassified git status, skipping");
                }
            }
            Ok(result)
        })
        .await
        .map_err(|e| DomainError::GitOperationFailed(e.to_string()))?
    }

    fn canonical_path(&self) -> &str {
        &self.canonical_path
    }
}
