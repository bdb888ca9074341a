use serde::{Deserialize, Serialize};

/// Events emitted by the full and incremental indexers, in the order of the
/// declared state machine (§4.F, §9). Consumers must tolerate unknown fields
/// — new variants may be added without breaking existing `onProgress` callbacks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    Started {
        repo_id: String,
        commit_sha: String,
        timestamp: i64,
    },
    FilesListed {
        repo_id: String,
        commit_sha: String,
        timestamp: i64,
        file_count: usize,
    },
    GrammarsInstalling {
        repo_id: String,
        commit_sha: String,
        timestamp: i64,
        languages: Vec<String>,
    },
    FileParsed {
        repo_id: String,
        commit_sha: String,
        timestamp: i64,
        path: String,
        chunks_emitted: usize,
    },
    ChunksEmbedded {
        repo_id: String,
        commit_sha: String,
        timestamp: i64,
        count: usize,
    },
    ChunksStored {
        repo_id: String,
        commit_sha: String,
        timestamp: i64,
        count: usize,
    },
    SqiExtracting {
        repo_id: String,
        commit_sha: String,
        timestamp: i64,
    },
    Completed {
        repo_id: String,
        commit_sha: String,
        timestamp: i64,
        files_processed: usize,
        chunks_created: usize,
        chunks_reused: usize,
        duration_ms: u64,
    },
    Failed {
        repo_id: String,
        commit_sha: String,
        timestamp: i64,
        error: String,
    },
}

pub type ProgressCallback = Box<dyn Fn(ProgressEvent) + Send + Sync>;
