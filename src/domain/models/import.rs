use serde::{Deserialize, Serialize};

/// A single `(imported_name, local_name, is_type_only?)` binding within an import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBinding {
    pub imported_name: String,
    pub local_name: String,
    pub is_type_only: bool,
}

impl ImportBinding {
    pub fn new(imported_name: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            imported_name: imported_name.into(),
            local_name: local_name.into(),
            is_type_only: false,
        }
    }

    pub fn type_only(mut self) -> Self {
        self.is_type_only = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportType {
    EsImport,
    Commonjs,
    DynamicImport,
    NamespaceImport,
    Other,
}

impl ImportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportType::EsImport => "es_import",
            ImportType::Commonjs => "commonjs",
            ImportType::DynamicImport => "dynamic_import",
            ImportType::NamespaceImport => "namespace_import",
            ImportType::Other => "other",
        }
    }
}

impl std::fmt::Display for ImportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An import statement extracted from a parse tree, scoped to a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Import {
    repository_id: String,
    commit_sha: String,
    file: String,
    line: u32,
    import_type: ImportType,
    module_specifier: String,
    bindings: Vec<ImportBinding>,
}

impl Import {
    pub fn new(
        repository_id: String,
        commit_sha: String,
        file: String,
        line: u32,
        import_type: ImportType,
        module_specifier: String,
    ) -> Self {
        Self {
            repository_id,
            commit_sha,
            file,
            line,
            import_type,
            module_specifier,
            bindings: Vec::new(),
        }
    }

    pub fn with_bindings(mut self, bindings: Vec<ImportBinding>) -> Self {
        self.bindings = bindings;
        self
    }

    pub fn repository_id(&self) -> &str {
        &self.repository_id
    }
    pub fn commit_sha(&self) -> &str {
        &self.commit_sha
    }
    pub fn file(&self) -> &str {
        &self.file
    }
    pub fn line(&self) -> u32 {
        self.line
    }
    pub fn import_type(&self) -> ImportType {
        self.import_type
    }
    pub fn module_specifier(&self) -> &str {
        &self.module_specifier
    }
    pub fn bindings(&self) -> &[ImportBinding] {
        &self.bindings
    }

    /// A dynamic import call yields an import record with no bindings (§4.B).
    pub fn has_no_bindings(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dynamic_import_has_no_bindings() {
        let import = Import::new(
            "repo".into(),
            "sha".into(),
            "src/a.ts".into(),
            3,
            ImportType::DynamicImport,
            "./lazy".into(),
        );
        assert!(import.has_no_bindings());
    }

    #[test]
    fn es_import_carries_bindings() {
        let import = Import::new(
            "repo".into(),
            "sha".into(),
            "src/a.ts".into(),
            1,
            ImportType::EsImport,
            "./util".into(),
        )
        .with_bindings(vec![ImportBinding::new("foo", "bar")]);
        assert_eq!(import.bindings().len(), 1);
        assert_eq!(import.bindings()[0].local_name, "bar");
    }
}
