use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use super::query_parser::{ParsedQuery, QueryIntent, QueryParserUseCase};
use super::rrf_fuse::{SQI_WEIGHT, VECTOR_WEIGHT};
use crate::application::{EmbeddingService, MetadataRepository, SqiRepository, VectorRepository};
use crate::domain::{Chunk, Cursor, DomainError, SearchQuery, SearchResult, SqiSymbolKind, Symbol, SymbolKind};

const RRF_K: f32 = 60.0;

/// Outcome of `query()` (§4.J). `success = false` with `is_indexed = false`
/// means the target commit isn't queryable yet; that's a normal result, not
/// a `DomainError`.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub success: bool,
    pub is_indexed: bool,
    pub results: Vec<SearchResult>,
    pub total_count: usize,
    pub next_cursor: Option<Cursor>,
    pub error: Option<String>,
}

impl QueryResult {
    fn not_indexed(hint: impl Into<String>) -> Self {
        Self {
            success: false,
            is_indexed: false,
            results: Vec::new(),
            total_count: 0,
            next_cursor: None,
            error: Some(hint.into()),
        }
    }

    fn ok(results: Vec<SearchResult>, total_count: usize, next_cursor: Option<Cursor>) -> Self {
        Self {
            success: true,
            is_indexed: true,
            results,
            total_count,
            next_cursor,
            error: None,
        }
    }
}

pub struct SearchCodeUseCase {
    vector_repo: Arc<dyn VectorRepository>,
    sqi_repo: Arc<dyn SqiRepository>,
    metadata_repo: Arc<dyn MetadataRepository>,
    embedding_service: Arc<dyn EmbeddingService>,
    query_parser: QueryParserUseCase,
}

impl SearchCodeUseCase {
    pub fn new(
        vector_repo: Arc<dyn VectorRepository>,
        sqi_repo: Arc<dyn SqiRepository>,
        metadata_repo: Arc<dyn MetadataRepository>,
        embedding_service: Arc<dyn EmbeddingService>,
    ) -> Self {
        Self {
            vector_repo,
            sqi_repo,
            metadata_repo,
            embedding_service,
            query_parser: QueryParserUseCase::new(),
        }
    }

    pub async fn execute(&self, query: SearchQuery) -> Result<QueryResult, DomainError> {
        query.validate(crate::domain::DEFAULT_MAX_LIMIT).map_err(|e| {
            if let Some(msg) = e.strip_prefix("LIMIT_EXCEEDED: ") {
                DomainError::LimitExceeded(msg.to_string())
            } else {
                DomainError::invalid_params(e)
            }
        })?;

        let commit = self
            .metadata_repo
            .find_commit(query.repo_id(), query.sha())
            .await?;
        let Some(commit) = commit.filter(|c| c.is_queryable()) else {
            return Ok(QueryResult::not_indexed(format!(
                "commit {} is not indexed for repository {}",
                query.sha(),
                query.repo_id()
            )));
        };

        let start = Instant::now();
        let parsed = self.query_parser.parse(query.query());
        info!("Searching ({:?} intent): {}", parsed.intent, query.query());

        let fetch_limit = (query.limit() * 3).min(crate::domain::DEFAULT_MAX_LIMIT);
        let fetch_query = query.clone().with_limit(fetch_limit);

        let query_embedding = self
            .embedding_service
            .embed_query(&parsed.for_embedding)
            .await?;

        let results = if query.is_hybrid() {
            let terms = Self::sqi_search_terms(&parsed);
            let (vector_results, sqi_symbols) = tokio::join!(
                self.vector_repo.search(&query_embedding, &fetch_query),
                self.sqi_repo.search_symbols(commit.id(), &terms, fetch_limit),
            );
            let vector_results = vector_results?;
            let sqi_symbols = sqi_symbols?;
            debug!(
                "Hybrid: {} vector + {} SQI candidates",
                vector_results.len(),
                sqi_symbols.len()
            );
            Self::fuse_hybrid(
                vector_results,
                sqi_symbols,
                query.repo_id(),
                query.is_boost(),
            )
        } else {
            let mut results = self.vector_repo.search(&query_embedding, &fetch_query).await?;
            if !query.is_boost() {
                Self::rerank_by_symbol_name(&mut results, &parsed);
            } else {
                Self::apply_structural_boost(&mut results);
            }
            results
        };

        let (page, total_count, next_cursor) = Self::paginate(results, &query);

        debug!(
            "Query resolved {} results in {:.2}s",
            page.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(QueryResult::ok(page, total_count, next_cursor))
    }

    pub async fn search(
        &self,
        repo_id: &str,
        sha: &str,
        query: &str,
        limit: usize,
    ) -> Result<QueryResult, DomainError> {
        let search_query = SearchQuery::new(repo_id, sha, query).with_limit(limit);
        self.execute(search_query).await
    }

    /// Identifier terms handed to the SQI leg: the parsed symbol terms, with
    /// each camelCase/snake_case identifier also split into its sub-words so
    /// `getUserById` also matches a symbol named `user`.
    fn sqi_search_terms(parsed: &ParsedQuery) -> Vec<String> {
        let mut terms: Vec<String> = Vec::new();
        let source: Vec<String> = if !parsed.symbol_terms.is_empty() {
            parsed.symbol_terms.clone()
        } else {
            parsed
                .for_embedding
                .split_whitespace()
                .map(|w| w.to_string())
                .collect()
        };
        for term in source {
            for part in Self::split_identifier(&term) {
                if !terms.contains(&part) {
                    terms.push(part);
                }
            }
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
        terms
    }

    fn split_identifier(term: &str) -> Vec<String> {
        let mut parts = Vec::new();
        let mut current = String::new();
        let mut prev_lower = false;
        for c in term.chars() {
            if c == '_' || c == '-' {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
                prev_lower = false;
                continue;
            }
            if c.is_uppercase() && prev_lower && !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            prev_lower = c.is_lowercase();
            current.push(c.to_ascii_lowercase());
        }
        if !current.is_empty() {
            parts.push(current);
        }
        parts.into_iter().filter(|p| p.len() > 1).collect()
    }

    /// Path-glob structural boost/penalty table (DESIGN.md Open Question b).
    fn structural_factor(path: &str) -> f32 {
        if path.contains("mocks/") {
            0.4
        } else if path.contains("tests/")
            || path.contains("vendor/")
            || path.contains("node_modules/")
            || path.contains("dist/")
            || path.contains("build/")
        {
            0.85
        } else if path.contains("src/") || !path.contains('/') {
            1.1
        } else {
            1.0
        }
    }

    fn apply_structural_boost(results: &mut [SearchResult]) {
        for result in results.iter_mut() {
            let factor = Self::structural_factor(result.chunk().file_path());
            let score = result.score() * factor;
            *result = result.clone().with_score(score);
        }
        results.sort_by(|a, b| b.score().partial_cmp(&a.score()).unwrap_or(Ordering::Equal));
    }

    /// Symbol-name re-ranking bonus for the non-hybrid, non-boost path (§4.J).
    fn rerank_by_symbol_name(results: &mut [SearchResult], parsed: &ParsedQuery) {
        for result in results.iter_mut() {
            let mut bonus = 0.0f32;
            if let Some(name) = result.chunk().symbol_name() {
                let name_lower = name.to_lowercase();
                let exact = parsed
                    .symbol_terms
                    .iter()
                    .any(|t| t.to_lowercase() == name_lower);
                let partial = !exact
                    && parsed
                        .symbol_terms
                        .iter()
                        .any(|t| name_lower.contains(&t.to_lowercase()));
                if exact {
                    bonus += 0.5;
                } else if partial {
                    bonus += 0.2;
                }
            }
            if parsed
                .symbol_types
                .iter()
                .any(|k| symbol_kind_matches(*k, result.chunk().symbol_kind()))
            {
                bonus += 0.15;
            }
            if parsed.intent == QueryIntent::Definition && is_definition_like(result.chunk().symbol_kind()) {
                bonus += 0.1;
            }
            if is_top_level(result.chunk().symbol_kind()) {
                bonus += 0.05;
            }
            if is_index_file(result.chunk().file_path()) {
                bonus += 0.05;
            }
            let score = (result.score() + bonus).min(1.0);
            *result = result.clone().with_score(score);
        }
        results.sort_by(|a, b| b.score().partial_cmp(&a.score()).unwrap_or(Ordering::Equal));
    }

    /// Hybrid fusion (§4.J): RRF with `vector = 2.0`/`sqi = 1.0` weights,
    /// merged on `(path, start_line)`. An SQI match with no exact-line vector
    /// partner is reconciled against any vector result in the same file whose
    /// range overlaps the symbol's; lacking that, a synthetic placeholder
    /// result is emitted.
    fn fuse_hybrid(
        vector_results: Vec<SearchResult>,
        sqi_symbols: Vec<Symbol>,
        repository_id: &str,
        boost: bool,
    ) -> Vec<SearchResult> {
        let mut vector_results = vector_results;
        if boost {
            for result in vector_results.iter_mut() {
                let factor = Self::structural_factor(result.chunk().file_path());
                let score = result.score() * factor;
                *result = result.clone().with_score(score);
            }
            vector_results.sort_by(|a, b| b.score().partial_cmp(&a.score()).unwrap_or(Ordering::Equal));
        }

        let mut by_file: HashMap<String, Vec<(u32, u32, (String, u32))>> = HashMap::new();
        let mut merged: HashMap<(String, u32), SearchResult> = HashMap::new();
        let mut fused_scores: HashMap<(String, u32), f32> = HashMap::new();

        for (rank, result) in vector_results.into_iter().enumerate() {
            let rrf = VECTOR_WEIGHT / (RRF_K + (rank + 1) as f32);
            let key = result.merge_key();
            by_file
                .entry(result.chunk().file_path().to_string())
                .or_default()
                .push((result.chunk().start_line(), result.chunk().end_line(), key.clone()));
            *fused_scores.entry(key.clone()).or_insert(0.0) += rrf;
            merged.insert(key, result);
        }

        let mut sqi_entries: Vec<(Symbol, f32)> = sqi_symbols
            .into_iter()
            .filter(|s| s.kind().is_meaningful())
            .map(|s| {
                let factor = Self::structural_factor(s.file());
                (s, factor)
            })
            .collect();
        if boost {
            sqi_entries.retain(|(_, factor)| *factor >= 0.6);
            sqi_entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        }

        for (rank, (symbol, _factor)) in sqi_entries.into_iter().enumerate() {
            let rrf = SQI_WEIGHT / (RRF_K + (rank + 1) as f32);
            let exact_key = (symbol.file().to_string(), symbol.start_line());

            if let Some(existing) = merged.get(&exact_key) {
                let updated = existing.clone().with_matched_symbol(symbol.name().to_string());
                merged.insert(exact_key.clone(), updated);
                *fused_scores.entry(exact_key).or_insert(0.0) += rrf;
                continue;
            }

            let overlap_key = by_file.get(symbol.file()).and_then(|spans| {
                spans
                    .iter()
                    .find(|(start, end, _)| *start <= symbol.end_line() && *end >= symbol.start_line())
                    .map(|(_, _, key)| key.clone())
            });

            if let Some(key) = overlap_key {
                if let Some(existing) = merged.get(&key) {
                    let updated = existing.clone().with_matched_symbol(symbol.name().to_string());
                    merged.insert(key.clone(), updated);
                }
                *fused_scores.entry(key).or_insert(0.0) += rrf;
                continue;
            }

            let synthetic = Self::synthesize_result(&symbol, repository_id);
            let key = synthetic.merge_key();
            by_file
                .entry(symbol.file().to_string())
                .or_default()
                .push((symbol.start_line(), symbol.end_line(), key.clone()));
            *fused_scores.entry(key.clone()).or_insert(0.0) += rrf;
            merged.insert(key, synthetic);
        }

        let mut fused: Vec<SearchResult> = merged
            .into_iter()
            .map(|(key, result)| {
                let score = *fused_scores.get(&key).unwrap_or(&0.0);
                result.with_score(score)
            })
            .collect();
        fused.sort_by(|a, b| b.score().partial_cmp(&a.score()).unwrap_or(Ordering::Equal));
        fused
    }

    fn synthesize_result(symbol: &Symbol, repository_id: &str) -> SearchResult {
        let placeholder = format!(
            "// {} {} (no indexed content for this symbol)",
            symbol.kind().as_str(),
            symbol.qualified_name()
        );
        let chunk = Chunk::new(
            repository_id.to_string(),
            symbol.file().to_string(),
            placeholder,
            symbol.start_line(),
            symbol.end_line(),
            symbol.language(),
            sqi_kind_to_symbol_kind(symbol.kind()),
        )
        .with_symbol_name(symbol.name().to_string())
        .with_commit(symbol.commit_sha().to_string());
        SearchResult::new(chunk, 0.0).with_matched_symbol(symbol.name().to_string())
    }

    /// Cursor-based pagination (§4.J): admit results strictly before the
    /// cursor, truncate to `limit`, and yield a fresh cursor iff truncated.
    fn paginate(mut results: Vec<SearchResult>, query: &SearchQuery) -> (Vec<SearchResult>, usize, Option<Cursor>) {
        if let Some(cursor) = query.cursor() {
            results.retain(|r| cursor.admits(r.score(), result_id(r)));
        }
        let total_count = results.len();
        let truncated = total_count > query.limit();
        results.truncate(query.limit());
        let next_cursor = if truncated {
            results
                .last()
                .map(|r| Cursor::new(r.score(), result_id(r)))
        } else {
            None
        };
        (results, total_count, next_cursor)
    }
}

fn result_id(result: &SearchResult) -> u64 {
    let mut hasher = DefaultHasher::new();
    result.chunk().id().hash(&mut hasher);
    hasher.finish()
}

fn symbol_kind_matches(sqi_kind: SqiSymbolKind, chunk_kind: SymbolKind) -> bool {
    matches!(
        (sqi_kind, chunk_kind),
        (SqiSymbolKind::Function, SymbolKind::Function)
            | (SqiSymbolKind::Method, SymbolKind::Method)
            | (SqiSymbolKind::Class, SymbolKind::Class)
            | (SqiSymbolKind::Struct, SymbolKind::Class)
            | (SqiSymbolKind::Interface, SymbolKind::Class)
            | (SqiSymbolKind::Module, SymbolKind::Module)
            | (SqiSymbolKind::Namespace, SymbolKind::Module)
    )
}

fn is_definition_like(kind: SymbolKind) -> bool {
    matches!(kind, SymbolKind::Function | SymbolKind::Method | SymbolKind::Class)
}

fn is_top_level(kind: SymbolKind) -> bool {
    matches!(kind, SymbolKind::Class | SymbolKind::Module)
}

fn is_index_file(path: &str) -> bool {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    matches!(
        file_name,
        "index.ts" | "index.tsx" | "index.js" | "index.jsx" | "index.mjs" | "index.cjs"
    )
}

fn sqi_kind_to_symbol_kind(kind: SqiSymbolKind) -> SymbolKind {
    match kind {
        SqiSymbolKind::Function => SymbolKind::Function,
        SqiSymbolKind::Method => SymbolKind::Method,
        SqiSymbolKind::Class
        | SqiSymbolKind::Struct
        | SqiSymbolKind::Interface
        | SqiSymbolKind::Enum
        | SqiSymbolKind::Trait
        | SqiSymbolKind::Impl => SymbolKind::Class,
        SqiSymbolKind::Module | SqiSymbolKind::Namespace => SymbolKind::Module,
        _ => SymbolKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_factor_penalizes_mocks_below_threshold() {
        assert!(SearchCodeUseCase::structural_factor("src/tests/mocks/fake.ts") < 0.6);
    }

    #[test]
    fn structural_factor_keeps_tests_above_threshold() {
        assert!(SearchCodeUseCase::structural_factor("src/tests/a.ts") >= 0.6);
    }

    #[test]
    fn split_identifier_breaks_camel_case() {
        let parts = SearchCodeUseCase::split_identifier("getUserById");
        assert_eq!(parts, vec!["get", "user", "by", "id"]);
    }

    #[test]
    fn split_identifier_breaks_snake_case() {
        let parts = SearchCodeUseCase::split_identifier("user_id");
        assert_eq!(parts, vec!["user", "id"]);
    }

    #[test]
    fn index_file_detection() {
        assert!(is_index_file("src/components/index.ts"));
        assert!(!is_index_file("src/components/button.ts"));
    }
}
