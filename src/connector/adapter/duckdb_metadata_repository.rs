use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection, Row};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::MetadataRepository;
use crate::domain::{
    CommitStatus, DomainError, EmbeddingStatus, FileBlobEntry, IndexedCommit, LanguageStats,
    Repository, VectorStore,
};

pub struct DuckdbMetadataRepository {
    conn: Arc<Mutex<Connection>>,
}

const REPO_COLUMNS: &str =
    "id, name, path, created_at, updated_at, chunk_count, file_count, store, namespace, languages";
const COMMIT_COLUMNS: &str =
    "id, repo_id, sha, status, embedding_status, chunk_count, created_at, updated_at";

impl DuckdbMetadataRepository {
    pub fn new(db_path: &Path) -> Result<Self, DomainError> {
        let conn = Connection::open(db_path)
            .map_err(|e| DomainError::storage(format!("Failed to open DuckDB database: {}", e)))?;
        Self::initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a new adapter using an existing shared connection.
    /// This is useful when multiple adapters need to share the same DuckDB file
    /// (DuckDB only allows one write connection per file).
    pub fn with_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, DomainError> {
        {
            let guard = conn.try_lock().map_err(|_| {
                DomainError::storage("shared connection is locked during initialization")
            })?;
            Self::initialize_schema(&guard)?;
        }
        Ok(Self { conn })
    }

    /// Returns a clone of the shared connection Arc, so other adapters can
    /// share the same DuckDB connection/file.
    pub fn shared_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    #[allow(dead_code)]
    pub fn in_memory() -> Result<Self, DomainError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            DomainError::storage(format!("Failed to open DuckDB in-memory DB: {}", e))
        })?;
        Self::initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DomainError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS repositories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                path TEXT NOT NULL UNIQUE,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL,
                chunk_count BIGINT DEFAULT 0,
                file_count BIGINT DEFAULT 0,
                store TEXT DEFAULT 'duckdb',
                namespace TEXT,
                languages TEXT
            );

            CREATE TABLE IF NOT EXISTS indexed_commits (
                id TEXT PRIMARY KEY,
                repo_id TEXT NOT NULL,
                sha TEXT NOT NULL,
                status TEXT NOT NULL,
                embedding_status TEXT NOT NULL,
                chunk_count BIGINT DEFAULT 0,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL,
                UNIQUE(repo_id, sha)
            );

            CREATE TABLE IF NOT EXISTS chunk_refs (
                chunk_id TEXT NOT NULL,
                commit_id TEXT NOT NULL,
                PRIMARY KEY (chunk_id, commit_id)
            );

            CREATE TABLE IF NOT EXISTS file_blobs (
                commit_id TEXT NOT NULL,
                path TEXT NOT NULL,
                blob_sha TEXT NOT NULL,
                UNIQUE(commit_id, path)
            );

            CREATE TABLE IF NOT EXISTS blob_chunks (
                blob_sha TEXT NOT NULL,
                chunk_id TEXT NOT NULL,
                PRIMARY KEY (blob_sha, chunk_id)
            );

            CREATE TABLE IF NOT EXISTS gc_candidates (
                chunk_id TEXT PRIMARY KEY,
                orphaned_at BIGINT NOT NULL,
                eligible_at BIGINT NOT NULL
            );
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize schema: {}", e)))?;

        debug!("DuckDB metadata schema initialized");
        Ok(())
    }

    fn serialize_languages(languages: &HashMap<String, LanguageStats>) -> Option<String> {
        if languages.is_empty() {
            None
        } else {
            serde_json::to_string(languages).ok()
        }
    }

    fn deserialize_languages(json: Option<String>) -> HashMap<String, LanguageStats> {
        json.and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    fn row_to_repository(row: &Row) -> Result<Repository, duckdb::Error> {
        let store_str: String = row
            .get::<_, Option<String>>(7)?
            .unwrap_or_else(|| "duckdb".to_string());
        let namespace: Option<String> = row.get(8)?;
        let languages_json: Option<String> = row.get(9)?;
        Ok(Repository::reconstitute(
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get::<_, i64>(5)? as u64,
            row.get::<_, i64>(6)? as u64,
            VectorStore::from_str(&store_str),
            namespace,
            Self::deserialize_languages(languages_json),
        ))
    }

    fn row_to_commit(row: &Row) -> Result<IndexedCommit, duckdb::Error> {
        let status: String = row.get(3)?;
        let embedding_status: String = row.get(4)?;
        Ok(IndexedCommit::reconstitute(
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            CommitStatus::parse(&status),
            EmbeddingStatus::parse(&embedding_status),
            row.get::<_, i64>(5)? as u64,
            row.get(6)?,
            row.get(7)?,
        ))
    }

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

#[async_trait]
impl MetadataRepository for DuckdbMetadataRepository {
    async fn register_repository(&self, repository: &Repository) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        let languages_json = Self::serialize_languages(repository.languages());

        conn.execute(
            r#"
            INSERT INTO repositories (id, name, path, created_at, updated_at, chunk_count, file_count, store, namespace, languages)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                path = excluded.path,
                updated_at = excluded.updated_at,
                chunk_count = excluded.chunk_count,
                file_count = excluded.file_count,
                store = excluded.store,
                namespace = excluded.namespace,
                languages = excluded.languages
            "#,
            params![
                repository.id(),
                repository.name(),
                repository.path(),
                repository.created_at(),
                repository.updated_at(),
                repository.chunk_count() as i64,
                repository.file_count() as i64,
                repository.store().as_str(),
                repository.namespace(),
                languages_json,
            ],
        )
        .map_err(|e| DomainError::storage(format!("Failed to register repository: {}", e)))?;

        Ok(())
    }

    async fn find_repository_by_id(&self, id: &str) -> Result<Option<Repository>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM repositories WHERE id = ?1",
                REPO_COLUMNS
            ))
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;

        match stmt.query_row(params![id], Self::row_to_repository) {
            Ok(repo) => Ok(Some(repo)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!(
                "Failed to query repository: {}",
                e
            ))),
        }
    }

    async fn find_repository_by_path(&self, path: &str) -> Result<Option<Repository>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM repositories WHERE path = ?1",
                REPO_COLUMNS
            ))
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;

        match stmt.query_row(params![path], Self::row_to_repository) {
            Ok(repo) => Ok(Some(repo)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!(
                "Failed to query repository by path: {}",
                e
            ))),
        }
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM repositories ORDER BY name",
                REPO_COLUMNS
            ))
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;

        let rows = stmt
            .query_map([], Self::row_to_repository)
            .map_err(|e| DomainError::storage(format!("Failed to query repositories: {}", e)))?;

        let mut repos = Vec::new();
        for row in rows {
            repos.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }
        Ok(repos)
    }

    async fn update_repository_stats(
        &self,
        id: &str,
        chunk_count: u64,
        file_count: u64,
        languages: HashMap<String, LanguageStats>,
    ) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        let languages_json = Self::serialize_languages(&languages);

        conn.execute(
            "UPDATE repositories SET chunk_count = ?1, file_count = ?2, languages = ?3, updated_at = ?4 WHERE id = ?5",
            params![chunk_count as i64, file_count as i64, languages_json, Self::now(), id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to update repository stats: {}", e)))?;

        Ok(())
    }

    async fn start_indexing(
        &self,
        repo_id: &str,
        sha: &str,
        embeddings_enabled: bool,
    ) -> Result<IndexedCommit, DomainError> {
        let conn = self.conn.lock().await;

        let exists: Option<String> = conn
            .query_row(
                "SELECT id FROM indexed_commits WHERE repo_id = ?1 AND sha = ?2",
                params![repo_id, sha],
                |row| row.get(0),
            )
            .ok();
        if exists.is_some() {
            return Err(DomainError::already_exists(format!(
                "commit {}@{} already has an indexing row",
                repo_id, sha
            )));
        }

        let commit = IndexedCommit::start(repo_id.to_string(), sha.to_string(), embeddings_enabled);
        conn.execute(
            &format!(
                "INSERT INTO indexed_commits ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                COMMIT_COLUMNS
            ),
            params![
                commit.id(),
                commit.repository_id(),
                commit.sha(),
                commit.status().as_str(),
                commit.embedding_status().as_str(),
                commit.chunk_count() as i64,
                commit.created_at(),
                commit.updated_at(),
            ],
        )
        .map_err(|e| DomainError::storage(format!("Failed to start indexing: {}", e)))?;

        Ok(commit)
    }

    async fn complete_indexing(&self, commit_id: &str, chunk_count: u64) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE indexed_commits SET status = 'complete', chunk_count = ?1, updated_at = ?2 WHERE id = ?3",
            params![chunk_count as i64, Self::now(), commit_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to complete indexing: {}", e)))?;
        Ok(())
    }

    async fn fail_indexing(&self, commit_id: &str) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "UPDATE indexed_commits SET status = 'failed', updated_at = ?1 WHERE id = ?2",
            params![Self::now(), commit_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to fail indexing: {}", e)))?;
        Ok(())
    }

    async fn find_commit(&self, repo_id: &str, sha: &str) -> Result<Option<IndexedCommit>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM indexed_commits WHERE repo_id = ?1 AND sha = ?2",
                COMMIT_COLUMNS
            ))
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;

        match stmt.query_row(params![repo_id, sha], Self::row_to_commit) {
            Ok(commit) => Ok(Some(commit)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(DomainError::storage(format!("Failed to find commit: {}", e))),
        }
    }

    async fn delete_commit(&self, commit_id: &str) -> Result<(), DomainError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;
        tx.execute(
            "DELETE FROM chunk_refs WHERE commit_id = ?1",
            params![commit_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to delete chunk refs: {}", e)))?;
        tx.execute(
            "DELETE FROM file_blobs WHERE commit_id = ?1",
            params![commit_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to delete file blobs: {}", e)))?;
        tx.execute(
            "DELETE FROM indexed_commits WHERE id = ?1",
            params![commit_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to delete commit: {}", e)))?;
        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit transaction: {}", e)))?;
        Ok(())
    }

    async fn add_chunk_refs(&self, commit_id: &str, chunk_ids: &[String]) -> Result<(), DomainError> {
        if chunk_ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;
        {
            let mut stmt = tx
                .prepare("INSERT OR IGNORE INTO chunk_refs (chunk_id, commit_id) VALUES (?1, ?2)")
                .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;
            for chunk_id in chunk_ids {
                stmt.execute(params![chunk_id, commit_id])
                    .map_err(|e| DomainError::storage(format!("Failed to add chunk ref: {}", e)))?;
            }
        }
        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit transaction: {}", e)))?;
        Ok(())
    }

    async fn copy_chunk_refs(
        &self,
        from_commit_id: &str,
        to_commit_id: &str,
        exclude_paths: &[String],
    ) -> Result<Vec<String>, DomainError> {
        let mut conn = self.conn.lock().await;

        let all_chunk_ids: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT chunk_id FROM chunk_refs WHERE commit_id = ?1")
                .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
            stmt.query_map(params![from_commit_id], |row| row.get(0))
                .map_err(|e| DomainError::storage(format!("Failed to query chunk refs: {}", e)))?
                .collect::<Result<_, _>>()
                .map_err(|e| DomainError::storage(format!("Failed to read chunk ref row: {}", e)))?
        };

        // `chunk_refs` carries no path; chunks owned by excluded paths are
        // found via `file_blobs` -> `blob_chunks` on the source commit.
        let excluded_chunk_ids: std::collections::HashSet<String> = if exclude_paths.is_empty() {
            std::collections::HashSet::new()
        } else {
            let placeholders: Vec<String> = (0..exclude_paths.len())
                .map(|i| format!("?{}", i + 2))
                .collect();
            let sql = format!(
                "SELECT bc.chunk_id FROM blob_chunks bc \
                 JOIN file_blobs fb ON fb.blob_sha = bc.blob_sha \
                 WHERE fb.commit_id = ?1 AND fb.path IN ({})",
                placeholders.join(", ")
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
            let mut params_vec: Vec<&dyn duckdb::ToSql> = vec![&from_commit_id];
            for path in exclude_paths {
                params_vec.push(path);
            }
            stmt.query_map(params_vec.as_slice(), |row| row.get(0))
                .map_err(|e| DomainError::storage(format!("Failed to query excluded chunks: {}", e)))?
                .collect::<Result<_, _>>()
                .map_err(|e| DomainError::storage(format!("Failed to read excluded row: {}", e)))?
        };

        let to_copy: Vec<String> = all_chunk_ids
            .into_iter()
            .filter(|id| !excluded_chunk_ids.contains(id))
            .collect();

        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;
        {
            let mut stmt = tx
                .prepare("INSERT OR IGNORE INTO chunk_refs (chunk_id, commit_id) VALUES (?1, ?2)")
                .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;
            for chunk_id in &to_copy {
                stmt.execute(params![chunk_id, to_commit_id])
                    .map_err(|e| DomainError::storage(format!("Failed to copy chunk ref: {}", e)))?;
            }
        }
        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit transaction: {}", e)))?;

        Ok(to_copy)
    }

    async fn commit_chunk_count(&self, commit_id: &str) -> Result<u64, DomainError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM chunk_refs WHERE commit_id = ?1",
                params![commit_id],
                |row| row.get(0),
            )
            .map_err(|e| DomainError::storage(format!("Failed to count chunk refs: {}", e)))?;
        Ok(count as u64)
    }

    async fn record_file_blobs(&self, entries: &[FileBlobEntry]) -> Result<(), DomainError> {
        if entries.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO file_blobs (commit_id, path, blob_sha) VALUES (?1, ?2, ?3) \
                     ON CONFLICT (commit_id, path) DO UPDATE SET blob_sha = excluded.blob_sha",
                )
                .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;
            for entry in entries {
                stmt.execute(params![entry.commit_id(), entry.path(), entry.blob_sha()])
                    .map_err(|e| DomainError::storage(format!("Failed to record file blob: {}", e)))?;
            }
        }
        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit transaction: {}", e)))?;
        Ok(())
    }

    async fn file_blobs_for_commit(&self, commit_id: &str) -> Result<Vec<FileBlobEntry>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT commit_id, path, blob_sha FROM file_blobs WHERE commit_id = ?1")
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![commit_id], |row| {
                Ok(FileBlobEntry::new(row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(|e| DomainError::storage(format!("Failed to query file blobs: {}", e)))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }
        Ok(entries)
    }

    async fn record_blob_chunks(&self, blob_sha: &str, chunk_ids: &[String]) -> Result<(), DomainError> {
        if chunk_ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;
        {
            let mut stmt = tx
                .prepare("INSERT OR IGNORE INTO blob_chunks (blob_sha, chunk_id) VALUES (?1, ?2)")
                .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;
            for chunk_id in chunk_ids {
                stmt.execute(params![blob_sha, chunk_id])
                    .map_err(|e| DomainError::storage(format!("Failed to record blob chunk: {}", e)))?;
            }
        }
        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit transaction: {}", e)))?;
        Ok(())
    }

    async fn chunks_for_blob(&self, blob_sha: &str) -> Result<Vec<String>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT chunk_id FROM blob_chunks WHERE blob_sha = ?1")
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![blob_sha], |row| row.get(0))
            .map_err(|e| DomainError::storage(format!("Failed to query blob chunks: {}", e)))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }
        Ok(ids)
    }

    async fn indexed_blobs(
        &self,
        blob_shas: &[String],
    ) -> Result<HashMap<String, Vec<String>>, DomainError> {
        if blob_shas.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.conn.lock().await;
        let placeholders: Vec<String> = (0..blob_shas.len()).map(|i| format!("?{}", i + 1)).collect();
        let sql = format!(
            "SELECT blob_sha, chunk_id FROM blob_chunks WHERE blob_sha IN ({})",
            placeholders.join(", ")
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let params_vec: Vec<&dyn duckdb::ToSql> =
            blob_shas.iter().map(|s| s as &dyn duckdb::ToSql).collect();
        let rows = stmt
            .query_map(params_vec.as_slice(), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| DomainError::storage(format!("Failed to query indexed blobs: {}", e)))?;

        let mut map: HashMap<String, Vec<String>> = HashMap::new();
        for row in rows {
            let (sha, chunk_id) =
                row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            map.entry(sha).or_default().push(chunk_id);
        }
        Ok(map)
    }

    async fn delete_blob_chunks(&self, blob_shas: &[String]) -> Result<(), DomainError> {
        if blob_shas.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().await;
        let placeholders: Vec<String> = (0..blob_shas.len()).map(|i| format!("?{}", i + 1)).collect();
        let sql = format!(
            "DELETE FROM blob_chunks WHERE blob_sha IN ({})",
            placeholders.join(", ")
        );
        let params_vec: Vec<&dyn duckdb::ToSql> =
            blob_shas.iter().map(|s| s as &dyn duckdb::ToSql).collect();
        conn.execute(&sql, params_vec.as_slice())
            .map_err(|e| DomainError::storage(format!("Failed to delete blob chunks: {}", e)))?;
        Ok(())
    }

    async fn mark_gc_candidate(&self, chunk_id: &str, orphaned_at: i64, eligible_at: i64) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO gc_candidates (chunk_id, orphaned_at, eligible_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT (chunk_id) DO UPDATE SET orphaned_at = excluded.orphaned_at, eligible_at = excluded.eligible_at",
            params![chunk_id, orphaned_at, eligible_at],
        )
        .map_err(|e| DomainError::storage(format!("Failed to mark gc candidate: {}", e)))?;
        Ok(())
    }

    async fn unmark_gc_candidate(&self, chunk_id: &str) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM gc_candidates WHERE chunk_id = ?1",
            params![chunk_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to unmark gc candidate: {}", e)))?;
        Ok(())
    }

    async fn list_eligible_gc(&self, as_of: i64) -> Result<Vec<String>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT chunk_id FROM gc_candidates WHERE eligible_at <= ?1")
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![as_of], |row| row.get(0))
            .map_err(|e| DomainError::storage(format!("Failed to query gc candidates: {}", e)))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }
        Ok(ids)
    }
}
