use serde::{Deserialize, Serialize};

use super::Language;

/// The syntactic role a usage plays at its reference site (§4.B usage-type rules).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageType {
    Read,
    Write,
    Call,
    Instantiate,
    Extend,
    Implement,
    TypeRef,
    Decorator,
}

impl UsageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageType::Read => "read",
            UsageType::Write => "write",
            UsageType::Call => "call",
            UsageType::Instantiate => "instantiate",
            UsageType::Extend => "extend",
            UsageType::Implement => "implement",
            UsageType::TypeRef => "type_ref",
            UsageType::Decorator => "decorator",
        }
    }
}

impl std::fmt::Display for UsageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reference to a symbol name at a specific location, scoped to a commit.
///
/// Linking (definition, enclosing) is a separate best-effort pass (4.C);
/// an unlinked usage is still valid and queryable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    repository_id: String,
    commit_sha: String,
    symbol_name: String,
    file: String,
    line: u32,
    column: u32,
    usage_type: UsageType,
    language: Language,
    enclosing_symbol_id: Option<String>,
    definition_symbol_id: Option<String>,
}

impl Usage {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository_id: String,
        commit_sha: String,
        symbol_name: String,
        file: String,
        line: u32,
        column: u32,
        usage_type: UsageType,
        language: Language,
    ) -> Self {
        Self {
            repository_id,
            commit_sha,
            symbol_name,
            file,
            line,
            column,
            usage_type,
            language,
            enclosing_symbol_id: None,
            definition_symbol_id: None,
        }
    }

    pub fn with_enclosing_symbol(mut self, symbol_id: impl Into<String>) -> Self {
        self.enclosing_symbol_id = Some(symbol_id.into());
        self
    }

    pub fn with_definition_symbol(mut self, symbol_id: impl Into<String>) -> Self {
        self.definition_symbol_id = Some(symbol_id.into());
        self
    }

    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }
    pub fn commit_sha(&self) -> &str {
        &self.commit_sha
    }
    pub fn symbol_name(&self) -> &str {
        &self.symbol_name
    }
    pub fn file(&self) -> &str {
        &self.file
    }
    pub fn line(&self) -> u32 {
        self.line
    }
    pub fn column(&self) -> u32 {
        self.column
    }
    pub fn usage_type(&self) -> UsageType {
        self.usage_type
    }
    pub fn language(&self) -> Language {
        self.language
    }
    pub fn enclosing_symbol_id(&self) -> Option<&str> {
        self.enclosing_symbol_id.as_deref()
    }
    pub fn definition_symbol_id(&self) -> Option<&str> {
        self.definition_symbol_id.as_deref()
    }
    pub fn is_linked(&self) -> bool {
        self.definition_symbol_id.is_some()
    }

    /// Dedup key per §4.B: usages are keyed by `(line, column, symbol_name)` per file.
    pub fn dedup_key(&self) -> (String, u32, u32, String) {
        (
            self.file.clone(),
            self.line,
            self.column,
            self.symbol_name.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_starts_unlinked() {
        let usage = Usage::new(
            "repo".into(),
            "sha".into(),
            "foo".into(),
            "src/a.ts".into(),
            5,
            2,
            UsageType::Call,
            Language::TypeScript,
        );
        assert!(!usage.is_linked());
    }

    #[test]
    fn linking_sets_definition() {
        let usage = Usage::new(
            "repo".into(),
            "sha".into(),
            "foo".into(),
            "src/a.ts".into(),
            5,
            2,
            UsageType::Call,
            Language::TypeScript,
        )
        .with_definition_symbol("sym-1")
        .with_enclosing_symbol("sym-0");
        assert!(usage.is_linked());
        assert_eq!(usage.enclosing_symbol_id(), Some("sym-0"));
    }
}
