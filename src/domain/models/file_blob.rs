use serde::{Deserialize, Serialize};

/// `path -> blob_sha` mapping for a single commit. Enables diffing coverage
/// without rescanning the working tree. Unique on `(commit_id, path)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileBlobEntry {
    commit_id: String,
    path: String,
    blob_sha: String,
}

impl FileBlobEntry {
    pub fn new(commit_id: String, path: String, blob_sha: String) -> Self {
        Self {
            commit_id,
            path,
            blob_sha,
        }
    }

    pub fn commit_id(&self) -> &str {
        &self.commit_id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn blob_sha(&self) -> &str {
        &self.blob_sha
    }
}

/// `(chunk_id, commit_id)` pair; multiplicity across commits yields a
/// chunk's reference count (invariant 2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChunkRef {
    chunk_id: String,
    commit_id: String,
}

impl ChunkRef {
    pub fn new(chunk_id: String, commit_id: String) -> Self {
        Self { chunk_id, commit_id }
    }

    pub fn chunk_id(&self) -> &str {
        &self.chunk_id
    }

    pub fn commit_id(&self) -> &str {
        &self.commit_id
    }
}
