use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection, Row};
use tokio::sync::Mutex;
use tracing::debug;

use crate::application::SqiRepository;
use crate::domain::{
    DomainError, Import, ImportBinding, ImportType, Language, Symbol, SqiSymbolKind, Usage,
    UsageType, Visibility,
};

pub struct DuckdbSqiRepository {
    conn: Arc<Mutex<Connection>>,
}

impl DuckdbSqiRepository {
    pub fn new(db_path: &Path) -> Result<Self, DomainError> {
        let conn = Connection::open(db_path)
            .map_err(|e| DomainError::storage(format!("Failed to open DuckDB database: {}", e)))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a new adapter using an existing shared connection (DuckDB only
    /// allows one write connection per file).
    pub fn with_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, DomainError> {
        {
            let guard = conn.try_lock().map_err(|_| {
                DomainError::storage("shared connection is locked during initialization")
            })?;
            Self::initialize_schema(&guard)?;
        }
        Ok(Self { conn })
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
            CREATE TABLE IF NOT EXISTS symbols (
                id TEXT PRIMARY KEY,
                commit_id TEXT NOT NULL,
                repository_id TEXT NOT NULL,
                commit_sha TEXT NOT NULL,
                name TEXT NOT NULL,
                qualified_name TEXT NOT NULL,
                kind TEXT NOT NULL,
                file TEXT NOT NULL,
                start_line INTEGER NOT NULL,
                end_line INTEGER NOT NULL,
                language TEXT NOT NULL,
                visibility TEXT,
                is_async BOOLEAN NOT NULL,
                is_static BOOLEAN NOT NULL,
                is_exported BOOLEAN NOT NULL,
                return_type TEXT,
                parameters TEXT,
                docstring TEXT,
                content_hash TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS usages (
                commit_id TEXT NOT NULL,
                repository_id TEXT NOT NULL,
                commit_sha TEXT NOT NULL,
                symbol_name TEXT NOT NULL,
                file TEXT NOT NULL,
                line INTEGER NOT NULL,
                col INTEGER NOT NULL,
                usage_type TEXT NOT NULL,
                language TEXT NOT NULL,
                enclosing_symbol_id TEXT,
                definition_symbol_id TEXT
            );

            CREATE TABLE IF NOT EXISTS imports (
                commit_id TEXT NOT NULL,
                repository_id TEXT NOT NULL,
                commit_sha TEXT NOT NULL,
                file TEXT NOT NULL,
                line INTEGER NOT NULL,
                import_type TEXT NOT NULL,
                module_specifier TEXT NOT NULL,
                bindings TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS symbols_by_commit_name ON symbols (commit_id, name);
            CREATE INDEX IF NOT EXISTS usages_by_commit_symbol ON usages (commit_id, definition_symbol_id);
            CREATE INDEX IF NOT EXISTS imports_by_commit_module ON imports (commit_id, module_specifier);
            "#,
        )
        .map_err(|e| DomainError::storage(format!("Failed to initialize schema: {}", e)))?;

        debug!("DuckDB SQI schema initialized");
        Ok(())
    }

    fn row_to_symbol(row: &Row) -> Result<Symbol, duckdb::Error> {
        let kind: String = row.get(6)?;
        let visibility: Option<String> = row.get(11)?;
        let parameters_json: Option<String> = row.get(16)?;
        Ok(Symbol::reconstitute(
            row.get(0)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            SqiSymbolKind::parse(&kind),
            row.get(7)?,
            row.get::<_, i64>(8)? as u32,
            row.get::<_, i64>(9)? as u32,
            Language::parse(&row.get::<_, String>(10)?),
            visibility.map(|v| match v.as_str() {
                "public" => Visibility::Public,
                "private" => Visibility::Private,
                "protected" => Visibility::Protected,
                _ => Visibility::Undefined,
            }),
            row.get(12)?,
            row.get(13)?,
            row.get(14)?,
            row.get(15)?,
            parameters_json.and_then(|j| serde_json::from_str(&j).ok()),
            row.get(17)?,
            row.get(18)?,
        ))
    }

    fn row_to_usage(row: &Row) -> Result<Usage, duckdb::Error> {
        let usage_type: String = row.get(7)?;
        let mut usage = Usage::new(
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get::<_, i64>(5)? as u32,
            row.get::<_, i64>(6)? as u32,
            parse_usage_type(&usage_type),
            Language::parse(&row.get::<_, String>(8)?),
        );
        if let Some(enclosing) = row.get::<_, Option<String>>(9)? {
            usage = usage.with_enclosing_symbol(enclosing);
        }
        if let Some(definition) = row.get::<_, Option<String>>(10)? {
            usage = usage.with_definition_symbol(definition);
        }
        Ok(usage)
    }

    fn row_to_import(row: &Row) -> Result<Import, duckdb::Error> {
        let import_type: String = row.get(5)?;
        let bindings_json: String = row.get(7)?;
        let bindings: Vec<ImportBinding> = serde_json::from_str(&bindings_json).unwrap_or_default();
        Ok(Import::new(
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get::<_, i64>(4)? as u32,
            parse_import_type(&import_type),
            row.get(6)?,
        )
        .with_bindings(bindings))
    }
}

fn parse_usage_type(s: &str) -> UsageType {
    match s {
        "write" => UsageType::Write,
        "call" => UsageType::Call,
        "instantiate" => UsageType::Instantiate,
        "extend" => UsageType::Extend,
        "implement" => UsageType::Implement,
        "type_ref" => UsageType::TypeRef,
        "decorator" => UsageType::Decorator,
        _ => UsageType::Read,
    }
}

fn parse_import_type(s: &str) -> ImportType {
    match s {
        "commonjs" => ImportType::Commonjs,
        "dynamic_import" => ImportType::DynamicImport,
        "namespace_import" => ImportType::NamespaceImport,
        "es_import" => ImportType::EsImport,
        _ => ImportType::Other,
    }
}

#[async_trait]
impl SqiRepository for DuckdbSqiRepository {
    async fn record_symbols(&self, commit_id: &str, symbols: &[Symbol]) -> Result<(), DomainError> {
        if symbols.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO symbols (id, commit_id, repository_id, commit_sha, name, qualified_name, \
                     kind, file, start_line, end_line, language, visibility, is_async, is_static, \
                     is_exported, return_type, parameters, docstring, content_hash) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
                     ON CONFLICT DO NOTHING",
                )
                .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;
            for symbol in symbols {
                let visibility = symbol.visibility().map(|v| v.as_str());
                let parameters_json = symbol.parameters().map(|p| serde_json::to_string(p).unwrap_or_default());
                stmt.execute(params![
                    symbol.id(),
                    commit_id,
                    symbol.repository_id(),
                    symbol.commit_sha(),
                    symbol.name(),
                    symbol.qualified_name(),
                    symbol.kind().as_str(),
                    symbol.file(),
                    symbol.start_line() as i64,
                    symbol.end_line() as i64,
                    symbol.language().as_str(),
                    visibility,
                    symbol.is_async(),
                    symbol.is_static(),
                    symbol.is_exported(),
                    symbol.return_type(),
                    parameters_json,
                    symbol.docstring(),
                    symbol.content_hash(),
                ])
                .map_err(|e| DomainError::storage(format!("Failed to record symbol: {}", e)))?;
            }
        }
        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit transaction: {}", e)))?;
        Ok(())
    }

    async fn record_usages(&self, commit_id: &str, usages: &[Usage]) -> Result<(), DomainError> {
        if usages.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO usages (commit_id, repository_id, commit_sha, symbol_name, file, line, col, \
                     usage_type, language, enclosing_symbol_id, definition_symbol_id) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;
            for usage in usages {
                stmt.execute(params![
                    commit_id,
                    usage.repository_id(),
                    usage.commit_sha(),
                    usage.symbol_name(),
                    usage.file(),
                    usage.line() as i64,
                    usage.column() as i64,
                    usage.usage_type().as_str(),
                    usage.language().as_str(),
                    usage.enclosing_symbol_id(),
                    usage.definition_symbol_id(),
                ])
                .map_err(|e| DomainError::storage(format!("Failed to record usage: {}", e)))?;
            }
        }
        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit transaction: {}", e)))?;
        Ok(())
    }

    async fn record_imports(&self, commit_id: &str, imports: &[Import]) -> Result<(), DomainError> {
        if imports.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO imports (commit_id, repository_id, commit_sha, file, line, import_type, \
                     module_specifier, bindings) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .map_err(|e| DomainError::storage(format!("Failed to prepare insert: {}", e)))?;
            for import in imports {
                let bindings_json = serde_json::to_string(import.bindings()).unwrap_or_default();
                stmt.execute(params![
                    commit_id,
                    import.repository_id(),
                    import.commit_sha(),
                    import.file(),
                    import.line() as i64,
                    import.import_type().as_str(),
                    import.module_specifier(),
                    bindings_json,
                ])
                .map_err(|e| DomainError::storage(format!("Failed to record import: {}", e)))?;
            }
        }
        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit transaction: {}", e)))?;
        Ok(())
    }

    async fn symbols_for_commit(&self, commit_id: &str) -> Result<Vec<Symbol>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT * FROM symbols WHERE commit_id = ?1")
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![commit_id], Self::row_to_symbol)
            .map_err(|e| DomainError::storage(format!("Failed to query symbols: {}", e)))?;
        collect(rows)
    }

    async fn usages_for_commit(&self, commit_id: &str) -> Result<Vec<Usage>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT * FROM usages WHERE commit_id = ?1")
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![commit_id], Self::row_to_usage)
            .map_err(|e| DomainError::storage(format!("Failed to query usages: {}", e)))?;
        collect(rows)
    }

    async fn imports_for_commit(&self, commit_id: &str) -> Result<Vec<Import>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT * FROM imports WHERE commit_id = ?1")
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![commit_id], Self::row_to_import)
            .map_err(|e| DomainError::storage(format!("Failed to query imports: {}", e)))?;
        collect(rows)
    }

    async fn symbols_by_name(&self, commit_id: &str, name: &str) -> Result<Vec<Symbol>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT * FROM symbols WHERE commit_id = ?1 AND name = ?2")
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![commit_id, name], Self::row_to_symbol)
            .map_err(|e| DomainError::storage(format!("Failed to query symbols by name: {}", e)))?;
        collect(rows)
    }

    async fn usages_of(&self, commit_id: &str, symbol_id: &str) -> Result<Vec<Usage>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT * FROM usages WHERE commit_id = ?1 AND definition_symbol_id = ?2")
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![commit_id, symbol_id], Self::row_to_usage)
            .map_err(|e| DomainError::storage(format!("Failed to query usages of symbol: {}", e)))?;
        collect(rows)
    }

    async fn imports_of_file(&self, commit_id: &str, file: &str) -> Result<Vec<Import>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT * FROM imports WHERE commit_id = ?1 AND file = ?2")
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![commit_id, file], Self::row_to_import)
            .map_err(|e| DomainError::storage(format!("Failed to query imports of file: {}", e)))?;
        collect(rows)
    }

    async fn importers_of(
        &self,
        commit_id: &str,
        module_specifier: &str,
    ) -> Result<Vec<Import>, DomainError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT * FROM imports WHERE commit_id = ?1 AND module_specifier = ?2")
            .map_err(|e| DomainError::storage(format!("Failed to prepare statement: {}", e)))?;
        let rows = stmt
            .query_map(params![commit_id, module_specifier], Self::row_to_import)
            .map_err(|e| DomainError::storage(format!("Failed to query importers: {}", e)))?;
        collect(rows)
    }

    async fn search_symbols(
        &self,
        commit_id: &str,
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<Symbol>, DomainError> {
        if terms.is_empty() {
            return Ok(vec![]);
        }
        let conn = self.conn.lock().await;

        let meaningful_kinds: Vec<&'static str> = [
            SqiSymbolKind::Function,
            SqiSymbolKind::Method,
            SqiSymbolKind::Class,
            SqiSymbolKind::Interface,
            SqiSymbolKind::TypeAlias,
            SqiSymbolKind::Enum,
            SqiSymbolKind::Module,
            SqiSymbolKind::Namespace,
            SqiSymbolKind::Struct,
            SqiSymbolKind::Trait,
            SqiSymbolKind::Impl,
        ]
        .iter()
        .map(|k| k.as_str())
        .collect();
        let kind_placeholders: Vec<String> = (0..meaningful_kinds.len())
            .map(|i| format!("?{}", i + 2))
            .collect();

        let mut match_parts = Vec::new();
        let mut term_params: Vec<String> = Vec::new();
        for term in terms {
            let idx_base = 2 + meaningful_kinds.len() + term_params.len() * 2;
            match_parts.push(format!(
                "jaro_winkler_similarity(name, ?{}) >= 0.4 OR name ILIKE ?{}",
                idx_base,
                idx_base + 1
            ));
            term_params.push(term.clone());
            term_params.push(format!("%{}%", term));
        }

        let sql = format!(
            "SELECT * FROM symbols WHERE commit_id = ?1 AND kind IN ({}) AND ({}) LIMIT ?{}",
            kind_placeholders.join(", "),
            match_parts.join(" OR "),
            2 + meaningful_kinds.len() + term_params.len()
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| DomainError::storage(format!("Failed to prepare fuzzy search: {}", e)))?;

        let mut params_vec: Vec<Box<dyn duckdb::ToSql>> = vec![Box::new(commit_id.to_string())];
        for k in &meaningful_kinds {
            params_vec.push(Box::new(k.to_string()));
        }
        for p in &term_params {
            params_vec.push(Box::new(p.clone()));
        }
        params_vec.push(Box::new(limit as i64));

        let param_refs: Vec<&dyn duckdb::ToSql> = params_vec.iter().map(|b| b.as_ref()).collect();
        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_symbol)
            .map_err(|e| DomainError::storage(format!("Failed to run fuzzy symbol search: {}", e)))?;

        let mut seen = std::collections::HashSet::new();
        let mut results = Vec::new();
        for row in rows {
            let symbol = row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?;
            if seen.insert(symbol.id().to_string()) {
                results.push(symbol);
            }
        }
        Ok(results)
    }

    async fn delete_sqi_for_commit(&self, commit_id: &str) -> Result<(), DomainError> {
        let mut conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;
        tx.execute("DELETE FROM symbols WHERE commit_id = ?1", params![commit_id])
            .map_err(|e| DomainError::storage(format!("Failed to delete symbols: {}", e)))?;
        tx.execute("DELETE FROM usages WHERE commit_id = ?1", params![commit_id])
            .map_err(|e| DomainError::storage(format!("Failed to delete usages: {}", e)))?;
        tx.execute("DELETE FROM imports WHERE commit_id = ?1", params![commit_id])
            .map_err(|e| DomainError::storage(format!("Failed to delete imports: {}", e)))?;
        tx.commit()
            .map_err(|e| DomainError::storage(format!("Failed to commit transaction: {}", e)))?;
        Ok(())
    }
}

fn collect<T>(rows: duckdb::MappedRows<impl FnMut(&Row) -> Result<T, duckdb::Error>>) -> Result<Vec<T>, DomainError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row.map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?);
    }
    Ok(out)
}
