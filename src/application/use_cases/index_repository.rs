use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use super::usage_linker::UsageLinkerUseCase;
use crate::application::{
    DiffStatus, EmbeddingService, GitRepository, MetadataRepository, ParserService, SqiRepository,
    VectorRepository,
};
use crate::domain::{
    Chunk, DomainError, FileBlobEntry, Import, Language, ProgressCallback, ProgressEvent, Symbol,
    Usage,
};

const DEFAULT_BATCH_SIZE: usize = 32;

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Parameters for `indexCommit` (§4.F / §4.G).
#[derive(Default)]
pub struct IndexCommitParams {
    pub repo_id: String,
    pub sha: String,
    pub branch: Option<String>,
    pub base_commit_sha: Option<String>,
    pub skip_embeddings: bool,
    pub force: bool,
    pub on_progress: Option<ProgressCallback>,
}

impl IndexCommitParams {
    pub fn new(repo_id: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            sha: sha.into(),
            ..Default::default()
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_base_commit(mut self, base_sha: impl Into<String>) -> Self {
        self.base_commit_sha = Some(base_sha.into());
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_skip_embeddings(mut self, skip: bool) -> Self {
        self.skip_embeddings = skip;
        self
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct IndexCommitResult {
    pub files_processed: usize,
    pub chunks_created: usize,
    pub chunks_reused: usize,
    pub duration_ms: u64,
    pub file_coverage: f64,
}

/// Single-writer-per-`(repo, sha)` lock registry (§5). `acquire` returns an
/// owned guard; its `Drop` is the scoped-cleanup release that fires on every
/// exit path, including early returns from a failed index run.
#[derive(Default)]
pub struct IndexerLockRegistry {
    locks: AsyncMutex<HashMap<(String, String), Arc<AsyncMutex<()>>>>,
}

pub struct IndexerLockGuard(#[allow(dead_code)] tokio::sync::OwnedMutexGuard<()>);

impl IndexerLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, repo_id: &str, sha: &str) -> Result<IndexerLockGuard, DomainError> {
        let key = (repo_id.to_string(), sha.to_string());
        let mutex = {
            let mut locks = self.locks.lock().await;
            locks.entry(key).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
        };
        mutex
            .try_lock_owned()
            .map(IndexerLockGuard)
            .map_err(|_| DomainError::IndexingInProgress(sha.to_string()))
    }
}

struct FileCandidate {
    path: String,
    blob_sha: String,
    language: Language,
}

/// Full + incremental indexer (§4.F, §4.G), grounded on the teacher's
/// `index_repository.rs` file walk and batching idiom, reworked around
/// commit-scoped blob diffing instead of whole-file content hashing.
pub struct IndexRepositoryUseCase {
    git_repo: Arc<dyn GitRepository>,
    metadata_repo: Arc<dyn MetadataRepository>,
    vector_repo: Arc<dyn VectorRepository>,
    sqi_repo: Arc<dyn SqiRepository>,
    parser_service: Arc<dyn ParserService>,
    embedding_service: Arc<dyn EmbeddingService>,
    usage_linker: UsageLinkerUseCase,
    locks: Arc<IndexerLockRegistry>,
    batch_size: usize,
}

impl IndexRepositoryUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        git_repo: Arc<dyn GitRepository>,
        metadata_repo: Arc<dyn MetadataRepository>,
        vector_repo: Arc<dyn VectorRepository>,
        sqi_repo: Arc<dyn SqiRepository>,
        parser_service: Arc<dyn ParserService>,
        embedding_service: Arc<dyn EmbeddingService>,
    ) -> Self {
        Self {
            git_repo,
            metadata_repo,
            vector_repo,
            sqi_repo,
            parser_service,
            embedding_service,
            usage_linker: UsageLinkerUseCase::new(),
            locks: Arc::new(IndexerLockRegistry::new()),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn emit(params: &IndexCommitParams, event: ProgressEvent) {
        if let Some(cb) = &params.on_progress {
            cb(event);
        }
    }

    pub async fn execute(&self, params: IndexCommitParams) -> Result<IndexCommitResult, DomainError> {
        // Step 1: single-writer-per-commit lock.
        let _guard = self.locks.acquire(&params.repo_id, &params.sha).await?;

        let start = Instant::now();
        Self::emit(
            &params,
            ProgressEvent::Started {
                repo_id: params.repo_id.clone(),
                commit_sha: params.sha.clone(),
                timestamp: now_ms(),
            },
        );

        // Step 2: force cleanup, or idempotent short-circuit if already indexed.
        if params.force {
            if let Some(existing) = self.metadata_repo.find_commit(&params.repo_id, &params.sha).await? {
                self.metadata_repo.delete_commit(existing.id()).await?;
                self.sqi_repo.delete_sqi_for_commit(existing.id()).await?;
            }
        } else if let Some(existing) = self.metadata_repo.find_commit(&params.repo_id, &params.sha).await? {
            if existing.is_queryable() {
                Self::emit(
                    &params,
                    ProgressEvent::Completed {
                        repo_id: params.repo_id.clone(),
                        commit_sha: params.sha.clone(),
                        timestamp: now_ms(),
                        files_processed: 0,
                        chunks_created: 0,
                        chunks_reused: 0,
                        duration_ms: start.elapsed().as_millis() as u64,
                    },
                );
                return Ok(IndexCommitResult {
                    duration_ms: start.elapsed().as_millis() as u64,
                    ..Default::default()
                });
            }
        }

        // Step 3: verify the target commit exists.
        self.git_repo.resolve_ref(&params.sha).await.map_err(|_| {
            DomainError::CommitNotFound(params.sha.clone())
        })?;

        // Step 4: start_indexing.
        let commit = self
            .metadata_repo
            .start_indexing(&params.repo_id, &params.sha, !params.skip_embeddings)
            .await?;

        let result = match &params.base_commit_sha {
            Some(base_sha) => self.run_incremental(&params, &commit, base_sha).await,
            None => self.run_full(&params, &commit).await,
        };

        match result {
            Ok((result, chunk_count)) => {
                self.metadata_repo.complete_indexing(commit.id(), chunk_count).await?;
                Self::emit(
                    &params,
                    ProgressEvent::Completed {
                        repo_id: params.repo_id.clone(),
                        commit_sha: params.sha.clone(),
                        timestamp: now_ms(),
                        files_processed: result.files_processed,
                        chunks_created: result.chunks_created,
                        chunks_reused: result.chunks_reused,
                        duration_ms: start.elapsed().as_millis() as u64,
                    },
                );
                Ok(IndexCommitResult {
                    duration_ms: start.elapsed().as_millis() as u64,
                    ..result
                })
            }
            Err(e) => {
                self.metadata_repo.fail_indexing(commit.id()).await?;
                Self::emit(
                    &params,
                    ProgressEvent::Failed {
                        repo_id: params.repo_id.clone(),
                        commit_sha: params.sha.clone(),
                        timestamp: now_ms(),
                        error: e.to_string(),
                    },
                );
                Err(e)
            }
        }
    }

    /// Step 5: list files at the commit, filtered to languages with a registered chunker.
    async fn list_candidates(&self, commit_sha: &str) -> Result<Vec<FileCandidate>, DomainError> {
        let entries = self.git_repo.list_tree(commit_sha).await?;
        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                let language = Language::from_path(std::path::Path::new(&entry.path));
                if language.is_known() && self.parser_service.supports_language(language) {
                    Some(FileCandidate {
                        path: entry.path,
                        blob_sha: entry.blob_sha,
                        language,
                    })
                } else {
                    None
                }
            })
            .collect())
    }

    async fn run_full(
        &self,
        params: &IndexCommitParams,
        commit: &crate::domain::IndexedCommit,
    ) -> Result<(IndexCommitResult, u64), DomainError> {
        let candidates = self.list_candidates(&params.sha).await?;
        Self::emit(
            params,
            ProgressEvent::FilesListed {
                repo_id: params.repo_id.clone(),
                commit_sha: params.sha.clone(),
                timestamp: now_ms(),
                file_count: candidates.len(),
            },
        );

        let languages: Vec<String> = {
            let mut seen = HashSet::new();
            candidates
                .iter()
                .filter(|c| seen.insert(c.language))
                .map(|c| c.language.as_str().to_string())
                .collect()
        };
        if !languages.is_empty() {
            Self::emit(
                params,
                ProgressEvent::GrammarsInstalling {
                    repo_id: params.repo_id.clone(),
                    commit_sha: params.sha.clone(),
                    timestamp: now_ms(),
                    languages,
                },
            );
        }

        // Two-level skip: pre-fetch every file's blob -> chunk-id mapping.
        let blob_shas: Vec<String> = candidates.iter().map(|c| c.blob_sha.clone()).collect();
        let indexed_blobs = self.metadata_repo.indexed_blobs(&blob_shas).await?;

        let mut chunks_created = 0usize;
        let mut chunks_reused = 0usize;
        let mut files_processed = 0usize;
        let mut all_chunk_ids: Vec<String> = Vec::new();
        let mut file_blobs: Vec<FileBlobEntry> = Vec::new();
        let mut embed_buffer: Vec<Chunk> = Vec::new();
        let mut sqi_queue: Vec<(String, String, Language)> = Vec::new();

        for candidate in &candidates {
            let blob = self.git_repo.read_blob(&candidate.blob_sha).await?;
            file_blobs.push(FileBlobEntry::new(
                commit.id().to_string(),
                candidate.path.clone(),
                candidate.blob_sha.clone(),
            ));
            if blob.is_binary {
                files_processed += 1;
                continue;
            }
            let content = String::from_utf8_lossy(&blob.bytes).into_owned();

            let chunk_ids = self
                .resolve_chunks(
                    params,
                    &candidate.path,
                    &candidate.blob_sha,
                    candidate.language,
                    &content,
                    indexed_blobs.get(&candidate.blob_sha),
                    &mut chunks_created,
                    &mut chunks_reused,
                    &mut embed_buffer,
                )
                .await?;

            Self::emit(
                params,
                ProgressEvent::FileParsed {
                    repo_id: params.repo_id.clone(),
                    commit_sha: params.sha.clone(),
                    timestamp: now_ms(),
                    path: candidate.path.clone(),
                    chunks_emitted: chunk_ids.len(),
                },
            );

            all_chunk_ids.extend(chunk_ids);
            sqi_queue.push((candidate.path.clone(), content, candidate.language));
            files_processed += 1;
        }

        self.flush_embed_buffer(&mut embed_buffer).await?;
        Self::emit(
            params,
            ProgressEvent::ChunksEmbedded {
                repo_id: params.repo_id.clone(),
                commit_sha: params.sha.clone(),
                timestamp: now_ms(),
                count: chunks_created,
            },
        );
        self.metadata_repo.record_file_blobs(&file_blobs).await?;
        if !all_chunk_ids.is_empty() {
            self.metadata_repo.add_chunk_refs(commit.id(), &all_chunk_ids).await?;
        }
        Self::emit(
            params,
            ProgressEvent::ChunksStored {
                repo_id: params.repo_id.clone(),
                commit_sha: params.sha.clone(),
                timestamp: now_ms(),
                count: all_chunk_ids.len(),
            },
        );

        // Step 10: SQI extraction + linking over every file whose content was read.
        Self::emit(
            params,
            ProgressEvent::SqiExtracting {
                repo_id: params.repo_id.clone(),
                commit_sha: params.sha.clone(),
                timestamp: now_ms(),
            },
        );
        let (symbols, usages, imports) = self.extract_sqi(&sqi_queue, &params.repo_id, &params.sha).await?;
        let linked_usages = self.usage_linker.link(&symbols, usages);
        self.sqi_repo.record_symbols(commit.id(), &symbols).await?;
        self.sqi_repo.record_usages(commit.id(), &linked_usages).await?;
        self.sqi_repo.record_imports(commit.id(), &imports).await?;

        let distinct_chunks: HashSet<&String> = all_chunk_ids.iter().collect();
        let file_coverage = if candidates.is_empty() {
            1.0
        } else {
            files_processed as f64 / candidates.len() as f64
        };

        Ok((
            IndexCommitResult {
                files_processed,
                chunks_created,
                chunks_reused,
                duration_ms: 0,
                file_coverage,
            },
            distinct_chunks.len() as u64,
        ))
    }

    async fn run_incremental(
        &self,
        params: &IndexCommitParams,
        commit: &crate::domain::IndexedCommit,
        base_sha: &str,
    ) -> Result<(IndexCommitResult, u64), DomainError> {
        let base_commit = self
            .metadata_repo
            .find_commit(&params.repo_id, base_sha)
            .await?
            .filter(|c| c.is_queryable())
            .ok_or_else(|| DomainError::CommitNotFound(base_sha.to_string()))?;

        let diff = self.git_repo.diff(base_sha, &params.sha).await?;
        let mut changed: HashSet<String> = HashSet::new();
        let mut deleted: HashSet<String> = HashSet::new();
        for entry in &diff {
            match entry.status {
                DiffStatus::Deleted => {
                    if let Some(path) = &entry.from_path {
                        deleted.insert(path.clone());
                    }
                }
                DiffStatus::Added | DiffStatus::Modified => {
                    if let Some(path) = &entry.to_path {
                        changed.insert(path.clone());
                    }
                }
                // (a): rename/copy treated as modified at the new path.
                DiffStatus::Renamed | DiffStatus::Copied => {
                    if let Some(path) = &entry.to_path {
                        changed.insert(path.clone());
                    }
                    if let Some(path) = &entry.from_path {
                        deleted.insert(path.clone());
                    }
                }
            }
        }

        let candidates = self.list_candidates(&params.sha).await?;
        Self::emit(
            params,
            ProgressEvent::FilesListed {
                repo_id: params.repo_id.clone(),
                commit_sha: params.sha.clone(),
                timestamp: now_ms(),
                file_count: candidates.len(),
            },
        );

        let excluded: Vec<String> = deleted.union(&changed).cloned().collect();
        let copied_ids = self
            .metadata_repo
            .copy_chunk_refs(base_commit.id(), commit.id(), &excluded)
            .await?;
        for chunk_id in &copied_ids {
            self.vector_repo.add_commit_to_chunk(chunk_id, &params.sha).await?;
        }

        let blob_shas: Vec<String> = candidates
            .iter()
            .filter(|c| changed.contains(&c.path))
            .map(|c| c.blob_sha.clone())
            .collect();
        let indexed_blobs = self.metadata_repo.indexed_blobs(&blob_shas).await?;

        let mut chunks_created = 0usize;
        let mut chunks_reused = 0usize;
        let mut files_processed = 0usize;
        let mut all_chunk_ids = copied_ids.clone();
        let mut file_blobs: Vec<FileBlobEntry> = Vec::new();
        let mut embed_buffer: Vec<Chunk> = Vec::new();
        let mut sqi_queue: Vec<(String, String, Language)> = Vec::new();

        for candidate in &candidates {
            file_blobs.push(FileBlobEntry::new(
                commit.id().to_string(),
                candidate.path.clone(),
                candidate.blob_sha.clone(),
            ));
            if !changed.contains(&candidate.path) {
                continue;
            }

            let blob = self.git_repo.read_blob(&candidate.blob_sha).await?;
            if blob.is_binary {
                files_processed += 1;
                continue;
            }
            let content = String::from_utf8_lossy(&blob.bytes).into_owned();

            let chunk_ids = self
                .resolve_chunks(
                    params,
                    &candidate.path,
                    &candidate.blob_sha,
                    candidate.language,
                    &content,
                    indexed_blobs.get(&candidate.blob_sha),
                    &mut chunks_created,
                    &mut chunks_reused,
                    &mut embed_buffer,
                )
                .await?;

            Self::emit(
                params,
                ProgressEvent::FileParsed {
                    repo_id: params.repo_id.clone(),
                    commit_sha: params.sha.clone(),
                    timestamp: now_ms(),
                    path: candidate.path.clone(),
                    chunks_emitted: chunk_ids.len(),
                },
            );

            all_chunk_ids.extend(chunk_ids);
            sqi_queue.push((candidate.path.clone(), content, candidate.language));
            files_processed += 1;
        }

        self.flush_embed_buffer(&mut embed_buffer).await?;
        Self::emit(
            params,
            ProgressEvent::ChunksEmbedded {
                repo_id: params.repo_id.clone(),
                commit_sha: params.sha.clone(),
                timestamp: now_ms(),
                count: chunks_created,
            },
        );
        self.metadata_repo.record_file_blobs(&file_blobs).await?;
        let new_refs: Vec<String> = all_chunk_ids
            .iter()
            .filter(|id| !copied_ids.contains(id))
            .cloned()
            .collect();
        if !new_refs.is_empty() {
            self.metadata_repo.add_chunk_refs(commit.id(), &new_refs).await?;
        }
        Self::emit(
            params,
            ProgressEvent::ChunksStored {
                repo_id: params.repo_id.clone(),
                commit_sha: params.sha.clone(),
                timestamp: now_ms(),
                count: all_chunk_ids.len(),
            },
        );

        // SQI: carry forward everything outside the changed/deleted set, then
        // extract fresh data for the changed files and link against the union.
        Self::emit(
            params,
            ProgressEvent::SqiExtracting {
                repo_id: params.repo_id.clone(),
                commit_sha: params.sha.clone(),
                timestamp: now_ms(),
            },
        );
        let base_symbols = self.sqi_repo.symbols_for_commit(base_commit.id()).await?;
        let base_usages = self.sqi_repo.usages_for_commit(base_commit.id()).await?;
        let base_imports = self.sqi_repo.imports_for_commit(base_commit.id()).await?;
        let carried_symbols: Vec<Symbol> = base_symbols
            .into_iter()
            .filter(|s| !changed.contains(s.file()) && !deleted.contains(s.file()))
            .collect();
        let carried_usages: Vec<Usage> = base_usages
            .into_iter()
            .filter(|u| !changed.contains(u.file()) && !deleted.contains(u.file()))
            .collect();
        let carried_imports: Vec<Import> = base_imports
            .into_iter()
            .filter(|i| !changed.contains(i.file()) && !deleted.contains(i.file()))
            .collect();

        let (new_symbols, new_usages, new_imports) =
            self.extract_sqi(&sqi_queue, &params.repo_id, &params.sha).await?;
        let combined_symbols: Vec<Symbol> = carried_symbols
            .iter()
            .cloned()
            .chain(new_symbols.iter().cloned())
            .collect();
        let linked_new_usages = self.usage_linker.link(&combined_symbols, new_usages);

        let mut all_symbols = carried_symbols;
        all_symbols.extend(new_symbols);
        let mut all_usages = carried_usages;
        all_usages.extend(linked_new_usages);
        let mut all_imports = carried_imports;
        all_imports.extend(new_imports);

        self.sqi_repo.record_symbols(commit.id(), &all_symbols).await?;
        self.sqi_repo.record_usages(commit.id(), &all_usages).await?;
        self.sqi_repo.record_imports(commit.id(), &all_imports).await?;

        let distinct_chunks: HashSet<&String> = all_chunk_ids.iter().collect();
        let file_coverage = if candidates.is_empty() {
            1.0
        } else {
            (candidates.len() - deleted.len()) as f64 / candidates.len().max(1) as f64
        };

        Ok((
            IndexCommitResult {
                files_processed,
                chunks_created,
                chunks_reused,
                duration_ms: 0,
                file_coverage,
            },
            distinct_chunks.len() as u64,
        ))
    }

    /// §4.F step 7/8: reuse every chunk of an indexed blob whose chunks still
    /// all exist in the vector store; otherwise (re-)chunk, reusing whatever
    /// individual chunk ids already exist and embedding only the new ones.
    #[allow(clippy::too_many_arguments)]
    async fn resolve_chunks(
        &self,
        params: &IndexCommitParams,
        path: &str,
        blob_sha: &str,
        language: Language,
        content: &str,
        known_chunk_ids: Option<&Vec<String>>,
        chunks_created: &mut usize,
        chunks_reused: &mut usize,
        embed_buffer: &mut Vec<Chunk>,
    ) -> Result<Vec<String>, DomainError> {
        if let Some(existing_ids) = known_chunk_ids {
            let present = self.vector_repo.chunks_exist(existing_ids).await?;
            if present.len() == existing_ids.len() {
                for id in existing_ids {
                    self.vector_repo.add_commit_to_chunk(id, &params.sha).await?;
                }
                *chunks_reused += existing_ids.len();
                return Ok(existing_ids.clone());
            }
            // Orphaned: some chunks vanished from the store; force a re-parse.
            self.metadata_repo.delete_blob_chunks(&[blob_sha.to_string()]).await?;
        }

        let parsed = self
            .parser_service
            .parse_file(content, path, language, &params.repo_id, &params.sha)
            .await?;
        if !parsed.success {
            warn!("Failed to parse {}: isolated to this file", path);
            return Ok(Vec::new());
        }

        let mut unique: HashMap<String, Chunk> = HashMap::new();
        for chunk in parsed.chunks {
            unique.entry(chunk.id().to_string()).or_insert(chunk);
        }
        let ids: Vec<String> = unique.keys().cloned().collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let existing = self.vector_repo.chunks_exist(&ids).await?;
        let existing_set: HashSet<String> = existing.iter().cloned().collect();
        for id in &existing {
            self.vector_repo.add_commit_to_chunk(id, &params.sha).await?;
        }
        *chunks_reused += existing.len();

        let new_chunks: Vec<Chunk> = unique
            .into_values()
            .filter(|c| !existing_set.contains(c.id()))
            .collect();
        *chunks_created += new_chunks.len();
        embed_buffer.extend(new_chunks);
        if embed_buffer.len() >= self.batch_size {
            self.flush_embed_buffer(embed_buffer).await?;
        }

        self.metadata_repo.record_blob_chunks(blob_sha, &ids).await?;
        debug!("resolved {} chunks for {}", ids.len(), path);
        Ok(ids)
    }

    async fn flush_embed_buffer(&self, buffer: &mut Vec<Chunk>) -> Result<(), DomainError> {
        if buffer.is_empty() {
            return Ok(());
        }
        let drained = std::mem::take(buffer);
        for batch in drained.chunks(self.batch_size) {
            let embeddings = self.embedding_service.embed_chunks(batch).await?;
            self.vector_repo.upsert_chunks(batch, &embeddings).await?;
        }
        Ok(())
    }

    async fn extract_sqi(
        &self,
        queue: &[(String, String, Language)],
        repo_id: &str,
        sha: &str,
    ) -> Result<(Vec<Symbol>, Vec<Usage>, Vec<Import>), DomainError> {
        let mut symbols = Vec::new();
        let mut usages = Vec::new();
        let mut imports = Vec::new();
        for (path, content, language) in queue {
            match self.parser_service.extract(content, path, *language, repo_id, sha).await {
                Ok(result) if result.success => {
                    symbols.extend(result.symbols);
                    usages.extend(result.usages);
                    imports.extend(result.imports);
                }
                Ok(_) => {}
                Err(e) => warn!("SQI extraction failed for {}: {}", path, e),
            }
        }
        Ok((symbols, usages, imports))
    }
}
