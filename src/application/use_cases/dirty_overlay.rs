use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use super::usage_linker::UsageLinkerUseCase;
use crate::application::{GitRepository, ParserService};
use crate::domain::{Language, Symbol, Usage};

const DEFAULT_SOURCE_ROOTS: &[&str] = &["src", "lib", "app", "internal", "pkg", "cmd", "source"];

/// Result of `getDirtySymbols` (§4.H): the structural view of whatever the
/// working tree currently holds, scoped per file so callers can merge it over
/// a committed result without touching persistence.
#[derive(Debug, Clone, Default)]
pub struct DirtyOverlayResult {
    pub symbols_by_file: HashMap<String, Vec<Symbol>>,
    pub usages_by_file: HashMap<String, Vec<Usage>>,
    pub dirty_file_paths: Vec<String>,
    pub deleted_file_paths: Vec<String>,
}

/// In-memory working-tree overlay (§4.H): re-parses every modified, staged,
/// or newly-created file without writing anything to the metadata/vector/SQI
/// stores. Grounded on the teacher's `index_repository.rs` file-walk idiom,
/// scoped down to a handful of dirty paths instead of a whole tree.
pub struct DirtyOverlayUseCase {
    git_repo: Arc<dyn GitRepository>,
    parser_service: Arc<dyn ParserService>,
    usage_linker: UsageLinkerUseCase,
    source_roots: Vec<String>,
}

impl DirtyOverlayUseCase {
    pub fn new(git_repo: Arc<dyn GitRepository>, parser_service: Arc<dyn ParserService>) -> Self {
        Self {
            git_repo,
            parser_service,
            usage_linker: UsageLinkerUseCase::new(),
            source_roots: DEFAULT_SOURCE_ROOTS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_source_roots(mut self, roots: Vec<String>) -> Self {
        self.source_roots = roots;
        self
    }

    pub async fn execute(
        &self,
        repository_id: &str,
        commit_sha: &str,
    ) -> Result<DirtyOverlayResult, crate::domain::DomainError> {
        let status = self.git_repo.working_tree_status().await?;

        let mut dirty_paths: Vec<String> = Vec::new();
        for path in status.modified.iter().chain(status.staged.iter()) {
            if !dirty_paths.contains(path) {
                dirty_paths.push(path.clone());
            }
        }
        for path in &status.untracked {
            if self.admits_untracked(path) && !dirty_paths.contains(path) {
                dirty_paths.push(path.clone());
            }
        }

        let deleted_paths: Vec<String> = status.deleted.clone();
        let base = std::path::Path::new(self.git_repo.canonical_path());

        let mut symbols_by_file = HashMap::new();
        let mut usages_by_file = HashMap::new();

        for path in &dirty_paths {
            let language = Language::from_path(std::path::Path::new(path));
            if !language.is_known() || !self.parser_service.supports_language(language) {
                continue;
            }
            let content = match tokio::fs::read_to_string(base.join(path)).await {
                Ok(content) => content,
                Err(e) => {
                    debug!("skipping unreadable dirty file {}: {}", path, e);
                    continue;
                }
            };

            let extracted = match self
                .parser_service
                .extract(&content, path, language, repository_id, commit_sha)
                .await
            {
                Ok(result) if result.success => result,
                Ok(_) => continue,
                Err(e) => {
                    debug!("skipping unparseable dirty file {}: {}", path, e);
                    continue;
                }
            };

            // Link against this file's own symbols only; the overlay has no
            // whole-repository view to resolve cross-file definitions.
            let linked = self.usage_linker.link(&extracted.symbols, extracted.usages);
            if !extracted.symbols.is_empty() {
                symbols_by_file.insert(path.clone(), extracted.symbols);
            }
            if !linked.is_empty() {
                usages_by_file.insert(path.clone(), linked);
            }
        }

        Ok(DirtyOverlayResult {
            symbols_by_file,
            usages_by_file,
            dirty_file_paths: dirty_paths,
            deleted_file_paths: deleted_paths,
        })
    }

    fn admits_untracked(&self, path: &str) -> bool {
        let language = Language::from_path(std::path::Path::new(path));
        if !language.is_known() {
            return false;
        }
        let mut components = std::path::Path::new(path).components();
        match components.next() {
            Some(std::path::Component::Normal(first)) => {
                let first = first.to_string_lossy();
                self.source_roots.iter().any(|root| root == first.as_ref())
                    || components.next().is_none()
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::interfaces::{BlobContent, DiffEntry, ExtractResult, TreeEntry, WorkingTreeStatus};
    use crate::domain::DomainError;
    use async_trait::async_trait;

    struct FakeGit {
        status: WorkingTreeStatus,
        root: String,
    }

    #[async_trait]
    impl GitRepository for FakeGit {
        async fn resolve_ref(&self, _ref_name: &str) -> Result<String, DomainError> {
            Ok("sha".into())
        }
        async fn list_tree(&self, _commit_sha: &str) -> Result<Vec<TreeEntry>, DomainError> {
            Ok(Vec::new())
        }
        async fn read_blob(&self, _blob_sha: &str) -> Result<BlobContent, DomainError> {
            unimplemented!()
        }
        async fn diff(&self, _from: &str, _to: &str) -> Result<Vec<DiffEntry>, DomainError> {
            Ok(Vec::new())
        }
        async fn working_tree_status(&self) -> Result<WorkingTreeStatus, DomainError> {
            Ok(self.status.clone())
        }
        fn canonical_path(&self) -> &str {
            &self.root
        }
    }

    struct FakeParser;

    #[async_trait]
    impl ParserService for FakeParser {
        async fn parse_file(
            &self,
            _content: &str,
            _file_path: &str,
            _language: Language,
            _repository_id: &str,
            _commit_sha: &str,
        ) -> Result<crate::application::interfaces::ParseFileResult, DomainError> {
            unimplemented!()
        }
        async fn extract(
            &self,
            _content: &str,
            _file_path: &str,
            _language: Language,
            _repository_id: &str,
            _commit_sha: &str,
        ) -> Result<ExtractResult, DomainError> {
            Ok(ExtractResult::default())
        }
        fn supported_languages(&self) -> Vec<Language> {
            vec![Language::Rust]
        }
    }

    #[test]
    fn untracked_under_source_root_is_admitted() {
        let git = Arc::new(FakeGit {
            status: WorkingTreeStatus::default(),
            root: "/repo".into(),
        });
        let overlay = DirtyOverlayUseCase::new(git, Arc::new(FakeParser));
        assert!(overlay.admits_untracked("src/main.rs"));
        assert!(!overlay.admits_untracked("vendor/third_party/lib.rs"));
        assert!(!overlay.admits_untracked("notes.txt"));
    }

    #[test]
    fn untracked_at_repo_root_is_admitted() {
        let git = Arc::new(FakeGit {
            status: WorkingTreeStatus::default(),
            root: "/repo".into(),
        });
        let overlay = DirtyOverlayUseCase::new(git, Arc::new(FakeParser));
        assert!(overlay.admits_untracked("build.rs"));
    }
}
