use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::Language;

/// An open enum of structural symbol kinds produced by the SQI extractors.
/// Richer than `SymbolKind` (the chunker's coarse grouping): every node kind
/// the parser backends recognize as definition-like gets its own variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqiSymbolKind {
    Function,
    Class,
    Method,
    Field,
    Interface,
    TypeAlias,
    Enum,
    Namespace,
    Module,
    Property,
    Variable,
    Constant,
    Struct,
    Trait,
    Impl,
}

impl SqiSymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqiSymbolKind::Function => "function",
            SqiSymbolKind::Class => "class",
            SqiSymbolKind::Method => "method",
            SqiSymbolKind::Field => "field",
            SqiSymbolKind::Interface => "interface",
            SqiSymbolKind::TypeAlias => "type_alias",
            SqiSymbolKind::Enum => "enum",
            SqiSymbolKind::Namespace => "namespace",
            SqiSymbolKind::Module => "module",
            SqiSymbolKind::Property => "property",
            SqiSymbolKind::Variable => "variable",
            SqiSymbolKind::Constant => "constant",
            SqiSymbolKind::Struct => "struct",
            SqiSymbolKind::Trait => "trait",
            SqiSymbolKind::Impl => "impl",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "class" => SqiSymbolKind::Class,
            "method" => SqiSymbolKind::Method,
            "field" => SqiSymbolKind::Field,
            "interface" => SqiSymbolKind::Interface,
            "type_alias" => SqiSymbolKind::TypeAlias,
            "enum" => SqiSymbolKind::Enum,
            "namespace" => SqiSymbolKind::Namespace,
            "module" => SqiSymbolKind::Module,
            "property" => SqiSymbolKind::Property,
            "variable" => SqiSymbolKind::Variable,
            "constant" => SqiSymbolKind::Constant,
            "struct" => SqiSymbolKind::Struct,
            "trait" => SqiSymbolKind::Trait,
            "impl" => SqiSymbolKind::Impl,
            _ => SqiSymbolKind::Function,
        }
    }

    /// "Meaningful" kinds per the glossary: executable or top-level structural
    /// code, used to filter noisy SQI retrieval candidates (§4.J).
    pub fn is_meaningful(&self) -> bool {
        matches!(
            self,
            SqiSymbolKind::Function
                | SqiSymbolKind::Method
                | SqiSymbolKind::Class
                | SqiSymbolKind::Interface
                | SqiSymbolKind::TypeAlias
                | SqiSymbolKind::Enum
                | SqiSymbolKind::Module
                | SqiSymbolKind::Namespace
                | SqiSymbolKind::Struct
                | SqiSymbolKind::Trait
                | SqiSymbolKind::Impl
        )
    }

    /// Top-level kinds used by the symbol-name re-ranking bonus (§4.J).
    pub fn is_top_level(&self) -> bool {
        matches!(
            self,
            SqiSymbolKind::Class
                | SqiSymbolKind::Interface
                | SqiSymbolKind::TypeAlias
                | SqiSymbolKind::Struct
                | SqiSymbolKind::Enum
        )
    }

    /// Definition-like kinds used by the "definition intent" re-ranking bonus.
    pub fn is_definition_like(&self) -> bool {
        matches!(
            self,
            SqiSymbolKind::Function
                | SqiSymbolKind::Method
                | SqiSymbolKind::Class
                | SqiSymbolKind::Interface
                | SqiSymbolKind::Struct
                | SqiSymbolKind::Trait
                | SqiSymbolKind::Enum
        )
    }
}

impl std::fmt::Display for SqiSymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Private,
    Protected,
    Undefined,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Protected => "protected",
            Visibility::Undefined => "undefined",
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A definition extracted from a parse tree, scoped to a single commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Symbol {
    id: String,
    repository_id: String,
    commit_sha: String,
    name: String,
    qualified_name: String,
    kind: SqiSymbolKind,
    file: String,
    start_line: u32,
    end_line: u32,
    language: Language,
    visibility: Option<Visibility>,
    is_async: bool,
    is_static: bool,
    is_exported: bool,
    return_type: Option<String>,
    parameters: Option<Vec<String>>,
    docstring: Option<String>,
    content_hash: String,
}

impl Symbol {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repository_id: String,
        commit_sha: String,
        name: String,
        qualified_name: String,
        kind: SqiSymbolKind,
        file: String,
        start_line: u32,
        end_line: u32,
        language: Language,
        content_hash: String,
    ) -> Self {
        let id = compute_symbol_id(&repository_id, &commit_sha, &file, &qualified_name, start_line);
        Self {
            id,
            repository_id,
            commit_sha,
            name,
            qualified_name,
            kind,
            file,
            start_line,
            end_line,
            language,
            visibility: None,
            is_async: false,
            is_static: false,
            is_exported: false,
            return_type: None,
            parameters: None,
            docstring: None,
            content_hash,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_flags(mut self, is_async: bool, is_static: bool, is_exported: bool) -> Self {
        self.is_async = is_async;
        self.is_static = is_static;
        self.is_exported = is_exported;
        self
    }

    pub fn with_return_type(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = Some(return_type.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Vec<String>) -> Self {
        self.parameters = Some(parameters);
        self
    }

    pub fn with_docstring(mut self, docstring: impl Into<String>) -> Self {
        self.docstring = Some(docstring.into());
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: String,
        repository_id: String,
        commit_sha: String,
        name: String,
        qualified_name: String,
        kind: SqiSymbolKind,
        file: String,
        start_line: u32,
        end_line: u32,
        language: Language,
        visibility: Option<Visibility>,
        is_async: bool,
        is_static: bool,
        is_exported: bool,
        return_type: Option<String>,
        parameters: Option<Vec<String>>,
        docstring: Option<String>,
        content_hash: String,
    ) -> Self {
        Self {
            id,
            repository_id,
            commit_sha,
            name,
            qualified_name,
            kind,
            file,
            start_line,
            end_line,
            language,
            visibility,
            is_async,
            is_static,
            is_exported,
            return_type,
            parameters,
            docstring,
            content_hash,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }
    pub fn commit_sha(&self) -> &str {
        &self.commit_sha
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }
    pub fn kind(&self) -> SqiSymbolKind {
        self.kind
    }
    pub fn file(&self) -> &str {
        &self.file
    }
    pub fn start_line(&self) -> u32 {
        self.start_line
    }
    pub fn end_line(&self) -> u32 {
        self.end_line
    }
    pub fn language(&self) -> Language {
        self.language
    }
    pub fn visibility(&self) -> Option<Visibility> {
        self.visibility
    }
    pub fn is_async(&self) -> bool {
        self.is_async
    }
    pub fn is_static(&self) -> bool {
        self.is_static
    }
    pub fn is_exported(&self) -> bool {
        self.is_exported
    }
    pub fn return_type(&self) -> Option<&str> {
        self.return_type.as_deref()
    }
    pub fn parameters(&self) -> Option<&[String]> {
        self.parameters.as_deref()
    }
    pub fn docstring(&self) -> Option<&str> {
        self.docstring.as_deref()
    }
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn contains_line(&self, line: u32) -> bool {
        self.start_line <= line && line <= self.end_line
    }
}

/// Deterministic symbol id, exposed so extraction can compute the id of an
/// enclosing symbol without constructing the full `Symbol` for it.
pub fn compute_symbol_id(
    repository_id: &str,
    commit_sha: &str,
    file: &str,
    qualified_name: &str,
    start_line: u32,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(repository_id.as_bytes());
    hasher.update(commit_sha.as_bytes());
    hasher.update(file.as_bytes());
    hasher.update(qualified_name.as_bytes());
    hasher.update(start_line.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meaningful_kinds_exclude_variables() {
        assert!(SqiSymbolKind::Function.is_meaningful());
        assert!(SqiSymbolKind::Class.is_meaningful());
        assert!(!SqiSymbolKind::Variable.is_meaningful());
        assert!(!SqiSymbolKind::Field.is_meaningful());
    }

    #[test]
    fn top_level_kinds() {
        assert!(SqiSymbolKind::Class.is_top_level());
        assert!(SqiSymbolKind::Struct.is_top_level());
        assert!(!SqiSymbolKind::Method.is_top_level());
    }

    #[test]
    fn symbol_contains_line() {
        let symbol = Symbol::new(
            "repo".into(),
            "sha".into(),
            "foo".into(),
            "foo".into(),
            SqiSymbolKind::Function,
            "src/a.ts".into(),
            10,
            20,
            Language::TypeScript,
            "hash".into(),
        );
        assert!(symbol.contains_line(15));
        assert!(!symbol.contains_line(25));
    }
}
