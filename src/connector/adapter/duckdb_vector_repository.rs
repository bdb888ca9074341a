use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection, Row};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::{VectorRepository, VectorStoreStats};
use crate::domain::{Chunk, ContentType, DomainError, Embedding, Language, SearchQuery, SearchResult, SymbolKind};

const VECTOR_DIMENSIONS: usize = 384;

pub struct DuckdbVectorRepository {
    conn: Arc<Mutex<Connection>>,
    namespace: String,
}

impl DuckdbVectorRepository {
    pub fn new(path: &Path) -> Result<Self, DomainError> {
        Self::new_with_namespace(path, "main")
    }

    pub fn new_with_namespace(path: &Path, namespace: &str) -> Result<Self, DomainError> {
        let conn = Connection::open(path)
            .map_err(|e| DomainError::storage(format!("Failed to open DuckDB database: {}", e)))?;
        Self::initialize(&conn, namespace)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            namespace: namespace.to_string(),
        })
    }

    #[allow(dead_code)]
    pub fn in_memory() -> Result<Self, DomainError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            DomainError::storage(format!("Failed to open DuckDB in-memory DB: {}", e))
        })?;
        let namespace = "main";
        Self::initialize(&conn, namespace)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            namespace: namespace.to_string(),
        })
    }

    /// Returns a clone of the shared connection Arc.
    /// This allows other adapters to share the same DuckDB connection,
    /// which is necessary because DuckDB only allows one write connection per file.
    pub fn shared_connection(&self) -> Arc<Mutex<Connection>> {
        Arc::clone(&self.conn)
    }

    /// Initializes tables and enables the VSS extension.
    fn initialize(conn: &Connection, schema: &str) -> Result<(), DomainError> {
        let schema = schema.trim();
        let schema_name = if schema.is_empty() { "main" } else { schema };
        debug!("Initializing DuckDB with schema: {}", schema_name);

        conn.execute_batch("INSTALL vss; LOAD vss; SET hnsw_enable_experimental_persistence = true;")
            .map_err(|e| DomainError::storage(format!("Failed to initialize VSS extension: {}", e)))?;

        let schema_sql = format!(
            r#"
            CREATE SCHEMA IF NOT EXISTS "{schema}";

            CREATE TABLE IF NOT EXISTS "{schema}".chunks (
                id TEXT PRIMARY KEY,
                repository_id TEXT NOT NULL,
                branches TEXT,
                file_path TEXT NOT NULL,
                content TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                language TEXT NOT NULL,
                symbol_kind TEXT NOT NULL,
                content_type TEXT NOT NULL,
                symbol_name TEXT,
                parent_symbol TEXT
            );

            CREATE TABLE IF NOT EXISTS "{schema}".chunk_commits (
                chunk_id TEXT NOT NULL,
                commit_sha TEXT NOT NULL,
                PRIMARY KEY (chunk_id, commit_sha)
            );

            CREATE TABLE IF NOT EXISTS "{schema}".embeddings (
                chunk_id TEXT PRIMARY KEY,
                vector FLOAT[384] NOT NULL,
                model TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS embedding_hnsw_idx ON "{schema}".embeddings USING HNSW (vector) WITH (metric = 'cosine');
            "#,
            schema = schema_name,
        );

        conn.execute_batch(&schema_sql)
            .map_err(|e| DomainError::storage(format!("Failed to initialize DuckDB schema: {}", e)))?;

        debug!("DuckDB vector schema initialized successfully");
        Ok(())
    }

    fn vector_to_array_literal(vector: &[f32]) -> Result<String, DomainError> {
        if vector.len() != VECTOR_DIMENSIONS {
            return Err(DomainError::invalid_input(format!(
                "Expected embedding dimension {}, got {}",
                VECTOR_DIMENSIONS,
                vector.len()
            )));
        }
        let mut s = String::with_capacity(vector.len() * 8);
        s.push('[');
        for (i, v) in vector.iter().enumerate() {
            if i > 0 {
                s.push_str(", ");
            }
            s.push_str(&format!("{}", v));
        }
        s.push(']');
        s.push_str("::FLOAT[384]");
        Ok(s)
    }

    fn serialize_branches(branches: &[String]) -> String {
        serde_json::to_string(branches).unwrap_or_else(|_| "[]".to_string())
    }

    fn deserialize_branches(json: Option<String>) -> Vec<String> {
        json.and_then(|s| serde_json::from_str(&s).ok()).unwrap_or_default()
    }

    fn row_to_chunk_without_commits(row: &Row) -> Result<Chunk, duckdb::Error> {
        let branches_json: Option<String> = row.get(2)?;
        Ok(Chunk::reconstitute(
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            BTreeSet::new(),
            Self::deserialize_branches(branches_json),
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            u32::try_from(row.get::<_, i64>(5)?).unwrap_or(0),
            u32::try_from(row.get::<_, i64>(6)?).unwrap_or(0),
            Language::parse(&row.get::<_, String>(7)?),
            SymbolKind::parse(&row.get::<_, String>(8)?),
            ContentType::parse(&row.get::<_, String>(9)?),
            row.get::<_, Option<String>>(10)?,
            row.get::<_, Option<String>>(11)?,
        ))
    }

    fn commits_for_chunk_ids(
        conn: &Connection,
        namespace: &str,
        chunk_ids: &[String],
    ) -> Result<HashMap<String, BTreeSet<String>>, DomainError> {
        if chunk_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders: Vec<String> = (0..chunk_ids.len()).map(|i| format!("?{}", i + 1)).collect();
        let sql = format!(
            "SELECT chunk_id, commit_sha FROM \"{}\".chunk_commits WHERE chunk_id IN ({})",
            namespace,
            placeholders.join(", ")
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let params_vec: Vec<&dyn duckdb::ToSql> = chunk_ids.iter().map(|s| s as &dyn duckdb::ToSql).collect();
        let rows = stmt
            .query_map(params_vec.as_slice(), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| DomainError::storage(format!("Failed to query chunk commits: {}", e)))?;

        let mut map: HashMap<String, BTreeSet<String>> = HashMap::new();
        for row in rows {
            let (chunk_id, sha) = row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            map.entry(chunk_id).or_default().insert(sha);
        }
        Ok(map)
    }
}

const CHUNK_COLUMNS: &str = "id, repository_id, branches, file_path, content, start_line, end_line, language, symbol_kind, content_type, symbol_name, parent_symbol";

#[async_trait]
impl VectorRepository for DuckdbVectorRepository {
    async fn upsert_chunks(&self, chunks: &[Chunk], embeddings: &[Embedding]) -> Result<(), DomainError> {
        if chunks.is_empty() {
            return Ok(());
        }
        if chunks.len() != embeddings.len() {
            return Err(DomainError::invalid_input(
                "Chunk and embedding count mismatch".to_string(),
            ));
        }

        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT INTO \"{}\".chunks ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                     ON CONFLICT (id) DO UPDATE SET \
                        branches = excluded.branches, content = excluded.content, \
                        symbol_name = excluded.symbol_name, parent_symbol = excluded.parent_symbol",
                    self.namespace, CHUNK_COLUMNS
                ))
                .map_err(|e| DomainError::storage(format!("Failed to prepare chunk insert: {}", e)))?;

            let mut commit_stmt = tx
                .prepare(&format!(
                    "INSERT OR IGNORE INTO \"{}\".chunk_commits (chunk_id, commit_sha) VALUES (?, ?)",
                    self.namespace
                ))
                .map_err(|e| DomainError::storage(format!("Failed to prepare commit insert: {}", e)))?;

            for chunk in chunks {
                stmt.execute(params![
                    chunk.id(),
                    chunk.repository_id(),
                    Self::serialize_branches(chunk.branches()),
                    chunk.file_path(),
                    chunk.content(),
                    chunk.start_line() as i64,
                    chunk.end_line() as i64,
                    chunk.language().as_str(),
                    chunk.symbol_kind().as_str(),
                    chunk.content_type().as_str(),
                    chunk.symbol_name(),
                    chunk.parent_symbol(),
                ])
                .map_err(|e| DomainError::storage(format!("Failed to insert chunk {}: {}", chunk.id(), e)))?;

                for sha in chunk.commits() {
                    commit_stmt
                        .execute(params![chunk.id(), sha])
                        .map_err(|e| DomainError::storage(format!("Failed to insert chunk commit: {}", e)))?;
                }
            }
        }

        for embedding in embeddings {
            let array_lit = Self::vector_to_array_literal(embedding.vector())?;
            // The array literal must be part of the SQL statement (not parameterized)
            // because DuckDB's FLOAT[384] type doesn't support parameterization.
            let sql = format!(
                "INSERT OR REPLACE INTO \"{}\".embeddings (chunk_id, vector, model) VALUES (?, {}, ?)",
                self.namespace, array_lit
            );
            tx.execute(&sql, params![embedding.chunk_id(), embedding.model()])
                .map_err(|e| {
                    DomainError::storage(format!(
                        "Failed to insert embedding for chunk {}: {}",
                        embedding.chunk_id(),
                        e
                    ))
                })?;
        }

        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;

        debug!("Upserted {} chunks and {} embeddings", chunks.len(), embeddings.len());
        Ok(())
    }

    async fn search(&self, query_embedding: &[f32], query: &SearchQuery) -> Result<Vec<SearchResult>, DomainError> {
        if query_embedding.len() != VECTOR_DIMENSIONS {
            return Err(DomainError::invalid_input(format!(
                "Expected query embedding dimension {}, got {}",
                VECTOR_DIMENSIONS,
                query_embedding.len()
            )));
        }

        let array_lit = Self::vector_to_array_literal(query_embedding)?;
        let conn = self.conn.lock().await;

        let mut sql = format!(
            "SELECT c.id, c.repository_id, c.branches, c.file_path, c.content, c.start_line, c.end_line, \
                    c.language, c.symbol_kind, c.content_type, c.symbol_name, c.parent_symbol, \
                    1.0 - array_cosine_distance(e.vector, {array_lit}) AS score \
             FROM \"{ns}\".embeddings e \
             JOIN \"{ns}\".chunks c ON c.id = e.chunk_id \
             JOIN \"{ns}\".chunk_commits cc ON cc.chunk_id = c.id \
             WHERE c.repository_id = ? AND cc.commit_sha = ?",
            array_lit = array_lit,
            ns = self.namespace,
        );

        let mut params_vec: Vec<Box<dyn duckdb::ToSql>> =
            vec![Box::new(query.repo_id().to_string()), Box::new(query.sha().to_string())];

        if let Some(language) = query.language() {
            sql.push_str(" AND c.language = ?");
            params_vec.push(Box::new(language.to_string()));
        }
        if let Some(pattern) = query.path_pattern() {
            sql.push_str(" AND c.file_path GLOB ?");
            params_vec.push(Box::new(pattern.to_string()));
        }
        let content_types = query.effective_content_types();
        let placeholders: Vec<String> = (0..content_types.len())
            .map(|i| format!("?{}", params_vec.len() + i + 1))
            .collect();
        sql.push_str(&format!(" AND c.content_type IN ({})", placeholders.join(", ")));
        for ct in &content_types {
            params_vec.push(Box::new(ct.as_str().to_string()));
        }

        let fetch_limit = query.limit() * 3;
        sql.push_str(&format!(
            " ORDER BY array_cosine_distance(e.vector, {}) LIMIT ?",
            array_lit
        ));
        params_vec.push(Box::new(fetch_limit as i64));

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare vector search: {}", e)))?;
        let param_refs: Vec<&dyn duckdb::ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
        let mut rows = stmt
            .query(param_refs.as_slice())
            .map_err(|e| DomainError::storage(format!("Failed to run vector search: {}", e)))?;

        let mut results = Vec::new();
        let mut chunk_ids = Vec::new();
        let mut pending: Vec<(Chunk, f32)> = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DomainError::storage(format!("Failed to read search row: {}", e)))?
        {
            let score: f32 = row
                .get(12)
                .map_err(|e| DomainError::storage(format!("Failed to read score: {}", e)))?;
            let chunk = Self::row_to_chunk_without_commits(row)
                .map_err(|e| DomainError::storage(format!("Failed to parse chunk row: {}", e)))?;
            chunk_ids.push(chunk.id().to_string());
            pending.push((chunk, score));
        }

        let commit_map = Self::commits_for_chunk_ids(&conn, &self.namespace, &chunk_ids)?;
        for (mut chunk, score) in pending {
            if let Some(commits) = commit_map.get(chunk.id()) {
                for sha in commits {
                    chunk.add_commit(sha.clone());
                }
            }
            results.push(SearchResult::new(chunk, score));
        }

        Ok(results)
    }

    async fn add_commit_to_chunk(&self, chunk_id: &str, sha: &str) -> Result<(), DomainError> {
        let conn = self.conn.lock().await;
        conn.execute(
            &format!(
                "INSERT OR IGNORE INTO \"{}\".chunk_commits (chunk_id, commit_sha) VALUES (?, ?)",
                self.namespace
            ),
            params![chunk_id, sha],
        )
        .map_err(|e| DomainError::storage(format!("Failed to add commit to chunk: {}", e)))?;
        Ok(())
    }

    async fn chunks_exist(&self, ids: &[String]) -> Result<Vec<String>, DomainError> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let conn = self.conn.lock().await;
        let placeholders: Vec<String> = (0..ids.len()).map(|i| format!("?{}", i + 1)).collect();
        let sql = format!(
            "SELECT id FROM \"{}\".chunks WHERE id IN ({})",
            self.namespace,
            placeholders.join(", ")
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let params_vec: Vec<&dyn duckdb::ToSql> = ids.iter().map(|s| s as &dyn duckdb::ToSql).collect();
        let rows = stmt
            .query_map(params_vec.as_slice(), |row| row.get(0))
            .map_err(|e| DomainError::storage(format!("Failed to query existing chunks: {}", e)))?;
        let mut existing = Vec::new();
        for row in rows {
            existing.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }
        Ok(existing)
    }

    async fn get_chunks(&self, ids: &[String]) -> Result<HashMap<String, Chunk>, DomainError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.conn.lock().await;
        let placeholders: Vec<String> = (0..ids.len()).map(|i| format!("?{}", i + 1)).collect();
        let sql = format!(
            "SELECT {} FROM \"{}\".chunks WHERE id IN ({})",
            CHUNK_COLUMNS,
            self.namespace,
            placeholders.join(", ")
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let params_vec: Vec<&dyn duckdb::ToSql> = ids.iter().map(|s| s as &dyn duckdb::ToSql).collect();
        let rows = stmt
            .query_map(params_vec.as_slice(), Self::row_to_chunk_without_commits)
            .map_err(|e| DomainError::storage(format!("Failed to query chunks: {}", e)))?;

        let mut chunks = Vec::new();
        for row in rows {
            chunks.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
        }
        let chunk_ids: Vec<String> = chunks.iter().map(|c| c.id().to_string()).collect();
        let commit_map = Self::commits_for_chunk_ids(&conn, &self.namespace, &chunk_ids)?;

        let mut map = HashMap::new();
        for mut chunk in chunks {
            if let Some(commits) = commit_map.get(chunk.id()) {
                for sha in commits {
                    chunk.add_commit(sha.clone());
                }
            }
            map.insert(chunk.id().to_string(), chunk);
        }
        Ok(map)
    }

    async fn delete_chunks(&self, ids: &[String]) -> Result<(), DomainError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;
        let placeholders: Vec<String> = (0..ids.len()).map(|i| format!("?{}", i + 1)).collect();
        let in_clause = placeholders.join(", ");
        let params_vec: Vec<&dyn duckdb::ToSql> = ids.iter().map(|s| s as &dyn duckdb::ToSql).collect();

        tx.execute(
            &format!("DELETE FROM \"{}\".embeddings WHERE chunk_id IN ({})", self.namespace, in_clause),
            params_vec.as_slice(),
        )
        .map_err(|e| DomainError::storage(format!("Failed to delete embeddings: {}", e)))?;
        tx.execute(
            &format!("DELETE FROM \"{}\".chunk_commits WHERE chunk_id IN ({})", self.namespace, in_clause),
            params_vec.as_slice(),
        )
        .map_err(|e| DomainError::storage(format!("Failed to delete chunk commits: {}", e)))?;
        tx.execute(
            &format!("DELETE FROM \"{}\".chunks WHERE id IN ({})", self.namespace, in_clause),
            params_vec.as_slice(),
        )
        .map_err(|e| DomainError::storage(format!("Failed to delete chunks: {}", e)))?;
        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;
        Ok(())
    }

    async fn delete_by_repo_id(&self, repository_id: &str) -> Result<u64, DomainError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            &format!(
                "DELETE FROM \"{0}\".embeddings WHERE chunk_id IN (SELECT id FROM \"{0}\".chunks WHERE repository_id = ?)",
                self.namespace
            ),
            params![repository_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to delete embeddings: {}", e)))?;
        tx.execute(
            &format!(
                "DELETE FROM \"{0}\".chunk_commits WHERE chunk_id IN (SELECT id FROM \"{0}\".chunks WHERE repository_id = ?)",
                self.namespace
            ),
            params![repository_id],
        )
        .map_err(|e| DomainError::storage(format!("Failed to delete chunk commits: {}", e)))?;
        let deleted = tx
            .execute(
                &format!("DELETE FROM \"{}\".chunks WHERE repository_id = ?", self.namespace),
                params![repository_id],
            )
            .map_err(|e| DomainError::storage(format!("Failed to delete chunks: {}", e)))?;

        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit: {}", e)))?;
        Ok(deleted as u64)
    }

    async fn get_stats(&self) -> Result<VectorStoreStats, DomainError> {
        let conn = self.conn.lock().await;
        let total_chunks: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{}\".chunks", self.namespace), [], |row| {
                row.get(0)
            })
            .map_err(|e| DomainError::storage(format!("Failed to count chunks: {}", e)))?;
        let total_repositories: i64 = conn
            .query_row(
                &format!("SELECT COUNT(DISTINCT repository_id) FROM \"{}\".chunks", self.namespace),
                [],
                |row| row.get(0),
            )
            .map_err(|e| DomainError::storage(format!("Failed to count repositories: {}", e)))?;
        Ok(VectorStoreStats {
            total_chunks: total_chunks as u64,
            total_repositories: total_repositories as u64,
        })
    }

    async fn count(&self) -> Result<u64, DomainError> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row(&format!("SELECT COUNT(*) FROM \"{}\".chunks", self.namespace), [], |row| {
                row.get(0)
            })
            .map_err(|e| DomainError::storage(format!("Failed to count chunks: {}", e)))?;
        Ok(count as u64)
    }
}
