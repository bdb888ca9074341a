use thiserror::Error;

/// Error taxonomy by originating subsystem (§7). Chunker/extractor failures
/// are isolated to the file they came from and never surface as a
/// `DomainError` — they are logged and the file is counted processed with
/// zero chunks/symbols. Everything here aborts the operation that raised it.
#[derive(Debug, Error)]
pub enum DomainError {
    // --- Git ---
    #[error("not a git repository: {0}")]
    NotARepository(String),
    #[error("commit not found: {0}")]
    CommitNotFound(String),
    #[error("ref not found: {0}")]
    RefNotFound(String),
    #[error("file not found: {0}")]
    GitFileNotFound(String),
    #[error("git operation failed: {0}")]
    GitOperationFailed(String),

    // --- Parser ---
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("parse failed: {0}")]
    ParseError(String),
    #[error("grammar not loaded: {0}")]
    GrammarNotLoaded(String),

    // --- Indexer ---
    #[error("repository not found: {0}")]
    RepoNotFound(String),
    #[error("indexing already in progress for {0}")]
    IndexingInProgress(String),
    #[error("lock failed: {0}")]
    LockFailed(String),

    // --- Query ---
    #[error("commit is not indexed: {0}")]
    NotIndexed(String),
    #[error("invalid query parameters: {0}")]
    InvalidParams(String),
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    // --- Storage / Vector ---
    #[error("storage connection failed: {0}")]
    ConnectionFailed(String),
    #[error("collection error: {0}")]
    CollectionError(String),
    #[error("upsert failed: {0}")]
    UpsertFailed(String),
    #[error("search failed: {0}")]
    SearchFailed(String),
    #[error("invalid storage config: {0}")]
    InvalidConfig(String),
    #[error("storage not initialized: {0}")]
    NotInitialized(String),

    // --- Shared/general ---
    #[error("embedding error: {0}")]
    EmbeddingError(String),
    #[error("storage error: {0}")]
    StorageError(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::EmbeddingError(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn commit_not_found(msg: impl Into<String>) -> Self {
        Self::CommitNotFound(msg.into())
    }

    pub fn not_indexed(msg: impl Into<String>) -> Self {
        Self::NotIndexed(msg.into())
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::InvalidParams(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::RepoNotFound(_) | Self::CommitNotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            Self::StorageError(_)
                | Self::ConnectionFailed(_)
                | Self::CollectionError(_)
                | Self::UpsertFailed(_)
        )
    }
}
