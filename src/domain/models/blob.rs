use serde::{Deserialize, Serialize};

/// A Git blob SHA identifies an unchanged file body across commits.
///
/// A blob is considered indexed iff `blob_chunks[sha]` is non-empty and every
/// referenced chunk still exists in the vector store; otherwise it is
/// orphaned and must be re-parsed (invariant 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blob {
    sha: String,
    repository_id: String,
}

impl Blob {
    pub fn new(sha: String, repository_id: String) -> Self {
        Self { sha, repository_id }
    }

    pub fn sha(&self) -> &str {
        &self.sha
    }

    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }
}

/// Whether a file's blob sha is already known to the blob→chunks mapping,
/// returned by the two-level skip check (§4.F step 7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobStatus {
    /// `blob_chunks[sha]` exists and every chunk it names is present in the
    /// vector store — safe to reuse without reparsing.
    Indexed { chunk_ids: Vec<String> },
    /// Either unknown, or known but referencing a chunk missing from the
    /// vector store (orphaned) — must be re-parsed.
    NeedsParse,
}
