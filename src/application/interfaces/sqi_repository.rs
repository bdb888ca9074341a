use async_trait::async_trait;

use crate::domain::{DomainError, Import, Symbol, Usage};

/// Persistence for the structural query index (§3, §4.D): symbols, usages,
/// and imports, scoped to an `indexed_commits.id`. Usage linking itself
/// (§4.C) runs in memory over a commit's full symbol set before anything
/// here is called; this trait only stores the linked result and serves the
/// read paths (`findDefinition`, `findUsages`, `findImports`,
/// `findImporters`, and the hybrid engine's SQI retrieval leg).
#[async_trait]
pub trait SqiRepository: Send + Sync {
    async fn record_symbols(&self, commit_id: &str, symbols: &[Symbol]) -> Result<(), DomainError>;

    async fn record_usages(&self, commit_id: &str, usages: &[Usage]) -> Result<(), DomainError>;

    async fn record_imports(&self, commit_id: &str, imports: &[Import]) -> Result<(), DomainError>;

    async fn symbols_for_commit(&self, commit_id: &str) -> Result<Vec<Symbol>, DomainError>;

    async fn usages_for_commit(&self, commit_id: &str) -> Result<Vec<Usage>, DomainError>;

    async fn imports_for_commit(&self, commit_id: &str) -> Result<Vec<Import>, DomainError>;

    /// Exact-name candidates within a commit, for `findDefinition` (§6).
    async fn symbols_by_name(&self, commit_id: &str, name: &str) -> Result<Vec<Symbol>, DomainError>;

    async fn usages_of(&self, commit_id: &str, symbol_id: &str) -> Result<Vec<Usage>, DomainError>;

    async fn imports_of_file(&self, commit_id: &str, file: &str) -> Result<Vec<Import>, DomainError>;

    /// Imports whose `module_specifier` matches, for `findImporters` (§6).
    async fn importers_of(
        &self,
        commit_id: &str,
        module_specifier: &str,
    ) -> Result<Vec<Import>, DomainError>;

    /// Fuzzy (similarity ≥ 0.4) and substring name matches among meaningful
    /// kinds, deduplicated, for the hybrid engine's SQI leg (§4.J).
    async fn search_symbols(
        &self,
        commit_id: &str,
        terms: &[String],
        limit: usize,
    ) -> Result<Vec<Symbol>, DomainError>;

    /// Deletes every symbol/usage/import row for a commit (force-reindex path).
    async fn delete_sqi_for_commit(&self, commit_id: &str) -> Result<(), DomainError>;
}
