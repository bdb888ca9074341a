use std::collections::HashSet;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use streaming_iterator::StreamingIterator;
use tracing::debug;
use tree_sitter::{Parser, Query, QueryCursor};

use crate::application::{ExtractResult, ParseFileResult, ParserService};
use crate::domain::{
    Chunk, DomainError, Import, ImportBinding, ImportType, Language, SqiSymbolKind, Symbol, SymbolKind,
    Usage, UsageType, Visibility,
};

/// Fallback chunk size (lines) when a file has a grammar but produces no
/// definitions, or no grammar is registered at all for its language.
const FIXED_LINE_CHUNK_SIZE: usize = 50;

/// Normalize import paths by stripping surrounding delimiters.
/// - Go imports: "fmt" -> fmt
/// - C++ string includes: "header.h" -> header.h
/// - C++ system includes: <iostream> -> iostream
fn normalize_import_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.len() < 2 {
        return trimmed.to_string();
    }

    if (trimmed.starts_with('"') && trimmed.ends_with('"'))
        || (trimmed.starts_with('\'') && trimmed.ends_with('\''))
    {
        return trimmed[1..trimmed.len() - 1].to_string();
    }

    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        return trimmed[1..trimmed.len() - 1].to_string();
    }

    trimmed.to_string()
}

fn is_noise_name(name: &str) -> bool {
    name.len() < 2
        || matches!(
            name,
            "if" | "else"
                | "for"
                | "while"
                | "return"
                | "true"
                | "false"
                | "null"
                | "None"
                | "self"
                | "this"
                | "super"
                | "int"
                | "i8"
                | "i16"
                | "i32"
                | "i64"
                | "i128"
                | "u8"
                | "u16"
                | "u32"
                | "u64"
                | "u128"
                | "f32"
                | "f64"
                | "bool"
                | "char"
                | "str"
                | "void"
                | "string"
                | "float"
                | "double"
                | "byte"
                | "short"
                | "long"
                | "usize"
                | "isize"
                | "String"
                | "Bool"
                | "Double"
                | "Float"
                | "Int"
                | "Int8"
                | "Int16"
                | "Int32"
                | "Int64"
                | "UInt"
                | "UInt8"
                | "UInt16"
                | "UInt32"
                | "UInt64"
                | "Character"
                | "Unit"
                | "Any"
                | "Nothing"
                | "Boolean"
                | "Long"
                | "Short"
                | "Byte"
        )
}

/// One matched definition-like node from a chunk query: a function, class,
/// struct, module, etc. Shared by the chunker and the SQI symbol extractor
/// so both walk the tree through the same query/capture logic.
struct Definition {
    capture_name: String,
    name: Option<String>,
    /// Explicit parent captured via a `*.name` field (only C++'s
    /// namespace-qualified function pattern sets this); nesting-derived
    /// parents are resolved separately from the enclosing class range.
    parent: Option<String>,
    start_line: u32,
    end_line: u32,
    content: String,
}

fn enclosing_class<'a>(class_scopes: &'a [(u32, u32, String)], start: u32, end: u32) -> Option<&'a str> {
    class_scopes
        .iter()
        .filter(|(s, e, _)| *s <= start && *e >= end && !(*s == start && *e == end))
        .min_by_key(|(s, e, _)| e - s)
        .map(|(_, _, name)| name.as_str())
}

fn lookup_enclosing(scopes: &[(u32, u32, String)], line: u32) -> Option<String> {
    scopes
        .iter()
        .filter(|(start, end, _)| *start <= line && line <= *end)
        .min_by_key(|(start, end, _)| end - start)
        .map(|(_, _, id)| id.clone())
}

fn infer_visibility(head: &str) -> Option<Visibility> {
    if head.contains("pub ") || head.contains("public ") || head.trim_start().starts_with("export") {
        Some(Visibility::Public)
    } else if head.contains("private ") {
        Some(Visibility::Private)
    } else if head.contains("protected ") {
        Some(Visibility::Protected)
    } else {
        None
    }
}

fn infer_return_type(head: &str) -> Option<String> {
    let idx = head.find("->")?;
    let rest = head[idx + 2..].trim();
    let end = rest.find('{').unwrap_or(rest.len());
    let ty = rest[..end].trim();
    if ty.is_empty() {
        None
    } else {
        Some(ty.to_string())
    }
}

fn infer_parameters(head: &str) -> Option<Vec<String>> {
    let open = head.find('(')?;
    let close = open + head[open..].find(')')?;
    let inner = head[open + 1..close].trim();
    if inner.is_empty() {
        return Some(Vec::new());
    }
    Some(inner.split(',').map(|p| p.trim().to_string()).collect())
}

/// Preceding comment block becomes the docstring; a leading `/** ... */`
/// block is stripped of its comment frame and `@tag` lines.
fn extract_docstring(lines: &[&str], def_start_line: u32) -> Option<String> {
    if def_start_line < 2 {
        return None;
    }
    let mut i = (def_start_line - 2) as i64;
    let mut block = Vec::new();
    while i >= 0 {
        let line = lines[i as usize].trim();
        if line.is_empty() {
            break;
        }
        if line.starts_with("//") || line.starts_with("/*") || line.starts_with('*') || line.starts_with('#') {
            block.push(line);
            i -= 1;
        } else {
            break;
        }
    }
    if block.is_empty() {
        return None;
    }
    block.reverse();

    let is_jsdoc = block[0].trim_start().starts_with("/**");
    if is_jsdoc {
        let stripped: Vec<String> = block
            .iter()
            .map(|l| {
                l.trim()
                    .trim_start_matches("/**")
                    .trim_start_matches("/*")
                    .trim_end_matches("*/")
                    .trim_start_matches('*')
                    .trim()
                    .to_string()
            })
            .filter(|l| !l.starts_with('@') && !l.is_empty())
            .collect();
        if stripped.is_empty() {
            None
        } else {
            Some(stripped.join(" "))
        }
    } else {
        let stripped: Vec<String> = block
            .iter()
            .map(|l| l.trim_start_matches("//").trim_start_matches('#').trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if stripped.is_empty() {
            None
        } else {
            Some(stripped.join(" "))
        }
    }
}

fn whole_file_chunk(
    content: &str,
    file_path: &str,
    language: Language,
    repository_id: &str,
    commit_sha: &str,
) -> Chunk {
    let end_line = content.lines().count().max(1) as u32;
    Chunk::new(
        repository_id.to_string(),
        file_path.to_string(),
        content.to_string(),
        1,
        end_line,
        language,
        SymbolKind::Module,
    )
    .with_commit(commit_sha)
}

fn fixed_line_chunks(
    content: &str,
    file_path: &str,
    language: Language,
    repository_id: &str,
    commit_sha: &str,
) -> Vec<Chunk> {
    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return vec![whole_file_chunk(content, file_path, language, repository_id, commit_sha)];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < lines.len() {
        let end = (start + FIXED_LINE_CHUNK_SIZE).min(lines.len());
        let slice = lines[start..end].join("\n");
        chunks.push(
            Chunk::new(
                repository_id.to_string(),
                file_path.to_string(),
                slice,
                (start + 1) as u32,
                end as u32,
                language,
                SymbolKind::Other,
            )
            .with_commit(commit_sha),
        );
        start = end;
    }
    chunks
}

pub struct TreeSitterParser {
    supported_languages: Vec<Language>,
}

impl TreeSitterParser {
    pub fn new() -> Self {
        Self {
            supported_languages: Language::all_supported(),
        }
    }

    fn get_ts_language(&self, language: Language) -> Option<tree_sitter::Language> {
        match language {
            Language::Rust => Some(tree_sitter_rust::LANGUAGE.into()),
            Language::Python => Some(tree_sitter_python::LANGUAGE.into()),
            Language::JavaScript => Some(tree_sitter_javascript::LANGUAGE.into()),
            Language::TypeScript => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            Language::Go => Some(tree_sitter_go::LANGUAGE.into()),
            Language::HCL => Some(tree_sitter_hcl::LANGUAGE.into()),
            Language::Php => Some(tree_sitter_php::LANGUAGE_PHP.into()),
            Language::Cpp => Some(tree_sitter_cpp::LANGUAGE.into()),
            Language::Swift => Some(tree_sitter_swift::LANGUAGE.into()),
            Language::Kotlin => Some(tree_sitter_kotlin_ng::LANGUAGE.into()),
            Language::Unknown => None,
        }
    }

    /// Chunk queries: one pattern set per language, each capturing a
    /// definition-like node (`@function`, `@class`, ...) plus its `@name`.
    fn get_query_patterns(&self, language: Language) -> &'static str {
        match language {
            Language::Rust => {
                r#"
                (function_item name: (identifier) @name) @function
                (impl_item) @impl
                (struct_item name: (type_identifier) @name) @struct
                (enum_item name: (type_identifier) @name) @enum
                (trait_item name: (type_identifier) @name) @trait
                (mod_item name: (identifier) @name) @module
                (const_item name: (identifier) @name) @constant
                (static_item name: (identifier) @name) @constant
                (type_item name: (type_identifier) @name) @typedef
                "#
            }
            Language::Python => {
                r#"
                (function_definition name: (identifier) @name) @function
                (class_definition name: (identifier) @name) @class
                "#
            }
            Language::JavaScript => {
                r#"
                (function_declaration name: (identifier) @name) @function
                (class_declaration name: (identifier) @name) @class
                (method_definition name: (property_identifier) @name) @function
                (arrow_function) @function
                "#
            }
            Language::TypeScript => {
                r#"
                (function_declaration name: (identifier) @name) @function
                (class_declaration name: (type_identifier) @name) @class
                (method_definition name: (property_identifier) @name) @function
                (arrow_function) @function
                (interface_declaration name: (type_identifier) @name) @interface
                (type_alias_declaration name: (type_identifier) @name) @typedef
                (export_statement (interface_declaration name: (type_identifier) @name)) @interface
                (export_statement (type_alias_declaration name: (type_identifier) @name)) @typedef
                "#
            }
            Language::Go => {
                r#"
                (function_declaration name: (identifier) @name) @function
                (method_declaration name: (field_identifier) @name) @function
                (type_declaration (type_spec name: (type_identifier) @name)) @struct
                "#
            }
            Language::HCL => {
                r#"
                (block (identifier) @name) @block
                (attribute (identifier) @name) @constant
                "#
            }
            Language::Php => {
                r#"
                (function_definition name: (name) @name) @function
                (method_declaration name: (name) @name) @function
                (class_declaration name: (name) @name) @class
                (interface_declaration name: (name) @name) @interface
                (trait_declaration name: (name) @name) @trait
                (namespace_definition name: (namespace_name) @name) @module
                (enum_declaration name: (name) @name) @enum
                "#
            }
            Language::Cpp => {
                r#"
                ; Classes and structs
                (class_specifier name: (type_identifier) @name) @class
                (struct_specifier name: (type_identifier) @name) @struct
                (union_specifier name: (type_identifier) @name) @class

                ; Functions and methods
                (function_definition
                  declarator: (function_declarator declarator: (identifier) @name)) @function
                (function_definition
                  declarator: (function_declarator declarator: (field_identifier) @name)) @function
                (function_definition
                  declarator: (function_declarator
                    declarator: (qualified_identifier
                      scope: (namespace_identifier) @class.name
                      name: (identifier) @name))) @function

                ; Destructors
                (function_definition
                  declarator: (function_declarator
                    (destructor_name
                      (identifier) @name))) @function

                ; Operators (use function_definition with operator_cast)
                (function_definition
                  declarator: (operator_cast) @name) @function
                (function_definition
                  declarator: (qualified_identifier
                    scope: (namespace_identifier) @class.name
                    name: (operator_cast) @name)) @function

                ; Operator declarations
                (declaration
                  declarator: (operator_cast) @name) @function

                ; Template declarations - capture the nested declaration's name
                (template_declaration
                  (alias_declaration
                    name: (type_identifier) @name)) @template
                (template_declaration
                  (function_definition
                    declarator: (function_declarator declarator: (identifier) @name))) @template
                (template_declaration
                  (class_specifier
                    name: (type_identifier) @name)) @template

                ; Template instantiations - these have a declarator field
                (template_instantiation
                  declarator: (_declarator
                    (identifier) @name)) @template

                ; Namespaces
                (namespace_definition
                  name: (namespace_identifier) @name) @module
                (namespace_alias_definition
                  name: (namespace_identifier) @name) @module

                ; Types
                (type_definition declarator: (type_identifier) @name) @typedef
                (enum_specifier name: (type_identifier) @name) @enum

                ; Aliases and using
                (using_declaration
                  (identifier) @name) @using
                (alias_declaration
                  name: (type_identifier) @name) @alias

                ; Concepts (C++20)
                (concept_definition
                  name: (identifier) @name) @concept
                "#
            }
            Language::Swift => {
                r#"
                ; Free functions and methods
                (function_declaration name: (simple_identifier) @name) @function

                ; Classes
                (class_declaration
                  declaration_kind: "class"
                  name: (type_identifier) @name) @class

                ; Structs
                (class_declaration
                  declaration_kind: "struct"
                  name: (type_identifier) @name) @struct

                ; Enums
                (class_declaration
                  declaration_kind: "enum"
                  name: (type_identifier) @name) @enum

                ; Actors (treated as classes)
                (class_declaration
                  declaration_kind: "actor"
                  name: (type_identifier) @name) @class

                ; Protocols (like traits/interfaces)
                (protocol_declaration name: (type_identifier) @name) @trait

                ; Extensions (like impl blocks)
                (class_declaration declaration_kind: "extension") @impl

                ; Type aliases
                (typealias_declaration name: (type_identifier) @name) @typedef
                "#
            }
            Language::Kotlin => {
                r#"
                ; Top-level functions and methods
                (function_declaration (simple_identifier) @name) @function

                ; Classes (includes data classes, sealed classes, abstract classes,
                ; interfaces, enum classes, and annotation classes)
                (class_declaration (type_identifier) @name) @class

                ; Object declarations (singletons and companion objects)
                (object_declaration (type_identifier) @name) @struct

                ; Type aliases
                (type_alias (type_identifier) @name) @typedef
                "#
            }
            Language::Unknown => "",
        }
    }

    /// Coarse chunk-kind collapse per the chunker's five-way vocabulary.
    fn capture_to_symbol_kind(capture_name: &str) -> SymbolKind {
        match capture_name {
            "function" => SymbolKind::Function,
            "class" | "struct" | "enum" | "trait" | "interface" | "impl" => SymbolKind::Class,
            "module" => SymbolKind::Module,
            _ => SymbolKind::Other,
        }
    }

    /// Richer SQI kind vocabulary; functions nested in a class range are
    /// reclassified as methods by the caller, not here.
    fn capture_to_sqi_kind(capture_name: &str) -> SqiSymbolKind {
        match capture_name {
            "function" => SqiSymbolKind::Function,
            "class" => SqiSymbolKind::Class,
            "struct" => SqiSymbolKind::Struct,
            "enum" => SqiSymbolKind::Enum,
            "trait" | "concept" => SqiSymbolKind::Trait,
            "impl" => SqiSymbolKind::Impl,
            "module" => SqiSymbolKind::Module,
            "constant" => SqiSymbolKind::Constant,
            "typedef" | "template" | "using" | "alias" => SqiSymbolKind::TypeAlias,
            "interface" => SqiSymbolKind::Interface,
            _ => SqiSymbolKind::Variable,
        }
    }

    /// Get tree-sitter query patterns for extracting symbol references.
    fn get_reference_query_patterns(&self, language: Language) -> &'static str {
        match language {
            Language::Rust => {
                r#"
                ; Function calls
                (call_expression
                    function: (identifier) @callee) @call

                ; Method calls
                (call_expression
                    function: (field_expression
                        field: (field_identifier) @callee)) @method_call

                ; Scoped calls (e.g., Module::function())
                (call_expression
                    function: (scoped_identifier
                        name: (identifier) @callee)) @call

                ; Macro invocations
                (macro_invocation
                    macro: (identifier) @callee) @macro

                ; Use statements (imports)
                (use_declaration
                    argument: (scoped_identifier
                        name: (identifier) @callee)) @import
                (use_declaration
                    argument: (identifier) @callee) @import

                ; Struct instantiation
                (struct_expression
                    name: (type_identifier) @callee) @instantiation
                "#
            }
            Language::Python => {
                r#"
                ; Function calls (also covers class instantiation in Python)
                (call
                    function: (identifier) @callee) @call

                ; Method calls
                (call
                    function: (attribute
                        attribute: (identifier) @callee)) @method_call

                ; Import statements
                (import_statement
                    name: (dotted_name
                        (identifier) @callee)) @import
                (import_from_statement
                    name: (dotted_name
                        (identifier) @callee)) @import

                ; Type annotations (Python 3.5+)
                (type
                    (identifier) @callee) @type_ref

                ; Decorator usage
                (decorator
                    (identifier) @callee) @decorator
                (decorator
                    (call
                        function: (identifier) @callee)) @decorator
                "#
            }
            Language::JavaScript => {
                r#"
                ; Function calls
                (call_expression
                    function: (identifier) @callee) @call

                ; Method calls
                (call_expression
                    function: (member_expression
                        property: (property_identifier) @callee)) @method_call

                ; New expressions (instantiation)
                (new_expression
                    constructor: (identifier) @callee) @instantiation

                ; Import statements
                (import_statement
                    (import_clause
                        (identifier) @callee)) @import
                (import_statement
                    (import_clause
                        (named_imports
                            (import_specifier
                                name: (identifier) @callee)))) @import

                ; JSX elements (React components)
                (jsx_element
                    open_tag: (jsx_opening_element
                        name: (identifier) @callee)) @instantiation
                (jsx_self_closing_element
                    name: (identifier) @callee) @instantiation
                "#
            }
            Language::TypeScript => {
                r#"
                ; Function calls
                (call_expression
                    function: (identifier) @callee) @call

                ; Method calls
                (call_expression
                    function: (member_expression
                        property: (property_identifier) @callee)) @method_call

                ; New expressions (instantiation)
                (new_expression
                    constructor: (identifier) @callee) @instantiation

                ; Import statements
                (import_statement
                    (import_clause
                        (identifier) @callee)) @import
                (import_statement
                    (import_clause
                        (named_imports
                            (import_specifier
                                name: (identifier) @callee)))) @import

                ; Type annotations
                (type_annotation
                    (type_identifier) @callee) @type_ref
                "#
            }
            Language::Go => {
                r#"
                ; Function calls
                (call_expression
                    function: (identifier) @callee) @call

                ; Package-qualified calls (also covers method calls on package variables)
                (call_expression
                    function: (selector_expression
                        operand: (identifier) @_pkg
                        field: (field_identifier) @callee)) @call

                ; Type references
                (type_identifier) @type_ref

                ; Import statements
                (import_spec
                    path: (interpreted_string_literal) @callee) @import

                ; Struct instantiation (composite literal)
                (composite_literal
                    type: (type_identifier) @callee) @instantiation
                "#
            }
            Language::Php => {
                r#"
                ; Function calls
                (function_call_expression
                    function: (name) @callee) @call

                ; Method calls
                (member_call_expression
                    name: (name) @callee) @method_call

                ; Static method calls
                (scoped_call_expression
                    name: (name) @callee) @method_call

                ; New expressions (instantiation)
                (object_creation_expression
                    (name) @callee) @instantiation

                ; Use statements (imports)
                (namespace_use_clause
                    (qualified_name) @callee) @import

                ; Class extends
                (base_clause
                    (name) @callee) @inheritance

                ; Interface implements
                (class_interface_clause
                    (name) @callee) @implementation

                ; Type hints
                (type_list
                    (named_type
                        (name) @callee)) @type_ref
                "#
            }
            Language::Cpp => {
                r#"
                ; Function calls
                (call_expression
                    function: (identifier) @callee) @call

                ; Method calls
                (call_expression
                    function: (field_expression
                        field: (field_identifier) @callee)) @method_call

                ; Scoped calls (namespace::function)
                (call_expression
                    function: (qualified_identifier
                        name: (identifier) @callee)) @call

                ; Constructor calls (new)
                (new_expression
                    type: (type_identifier) @callee) @instantiation

                ; Type references
                (type_identifier) @type_ref

                ; Include statements
                (preproc_include
                    path: (string_literal) @callee) @import
                (preproc_include
                    path: (system_lib_string) @callee) @import

                ; Template arguments
                (template_argument_list
                    (type_descriptor
                        type: (type_identifier) @callee)) @generic

                ; Inheritance
                (base_class_clause
                    (type_identifier) @callee) @inheritance
                "#
            }
            Language::HCL => {
                r#"
                ; Function calls
                (function_call
                    (identifier) @callee) @call

                ; Variable references
                (variable_expr
                    (identifier) @callee) @variable_ref

                ; Block references (resource, data, module)
                (block
                    (identifier) @callee) @call
                "#
            }
            Language::Swift => {
                r#"
                ; Simple function calls: foo()
                (call_expression
                    (simple_identifier) @callee) @call

                ; Method calls: obj.method()
                (call_expression
                    (navigation_expression
                        suffix: (navigation_suffix
                            suffix: (simple_identifier) @callee))) @method_call

                ; Import statements: import Foundation
                (import_declaration
                    (identifier (simple_identifier) @callee)) @import

                ; Type references (user-defined types in annotations, generics, etc.)
                (user_type (type_identifier) @callee) @type_ref

                ; Inheritance / protocol conformance
                (inheritance_specifier (user_type (type_identifier) @callee)) @inheritance
                "#
            }
            Language::Kotlin => {
                r#"
                ; Simple function calls: foo(...)
                (call_expression (identifier) @callee) @call

                ; Method calls: obj.bar(...) — anchor captures only the method name
                (call_expression
                    (navigation_expression (identifier) @callee .)) @method_call

                ; Type references in annotations, generics, supertypes, etc.
                (user_type (identifier) @callee) @type_ref

                ; Import statements — capture the identifier (full dotted path)
                (import_header (identifier) @callee) @import

                ; Class/interface inheritance and delegation
                (delegation_specifier
                    (constructor_invocation
                        (user_type (identifier) @callee))) @inheritance
                (delegation_specifier
                    (user_type (identifier) @callee)) @inheritance
                "#
            }
            Language::Unknown => "",
        }
    }

    /// Usage-type rules (§4.B), reduced to the capture name the query already
    /// resolved the syntactic role to. `import` captures never reach here —
    /// they are routed to `Import` records before this is consulted.
    fn capture_to_usage_type(capture_name: &str) -> Option<UsageType> {
        match capture_name {
            "call" | "macro" => Some(UsageType::Call),
            "method_call" => Some(UsageType::Call),
            "instantiation" => Some(UsageType::Instantiate),
            "inheritance" => Some(UsageType::Extend),
            "implementation" => Some(UsageType::Implement),
            "type_ref" | "generic" => Some(UsageType::TypeRef),
            "decorator" => Some(UsageType::Decorator),
            "variable_ref" => Some(UsageType::Read),
            _ => None,
        }
    }

    fn build_import(
        language: Language,
        repository_id: &str,
        commit_sha: &str,
        file_path: &str,
        line: u32,
        raw_name: &str,
    ) -> Import {
        let module_specifier = normalize_import_path(raw_name);
        let import_type = match language {
            Language::JavaScript | Language::TypeScript => ImportType::EsImport,
            _ => ImportType::Other,
        };
        // Rust/Go/Cpp/HCL import queries capture the module path itself, not
        // a named binding, so those yield no bindings (§4.B dynamic-import rule).
        let path_only = matches!(language, Language::Rust | Language::Go | Language::Cpp | Language::HCL);

        let mut import = Import::new(
            repository_id.to_string(),
            commit_sha.to_string(),
            file_path.to_string(),
            line,
            import_type,
            module_specifier.clone(),
        );
        if !path_only {
            import = import.with_bindings(vec![ImportBinding::new(module_specifier.clone(), module_specifier)]);
        }
        import
    }

    /// Walk one query over the tree, collecting every matched definition-like
    /// node with its (optional) name and explicitly-captured parent.
    fn collect_definitions(&self, content: &str, tree: &tree_sitter::Tree, query: &Query) -> Vec<Definition> {
        let mut cursor = QueryCursor::new();
        let text_bytes = content.as_bytes();
        let capture_names: Vec<&str> = query.capture_names().to_vec();

        let mut defs = Vec::new();
        let mut matches_iter = cursor.matches(query, tree.root_node(), text_bytes);

        while let Some(query_match) = matches_iter.next() {
            let mut symbol_name: Option<String> = None;
            let mut parent_symbol: Option<String> = None;
            let mut main_node = None;
            let mut capture_name = String::new();

            for capture in query_match.captures {
                let name = capture_names.get(capture.index as usize).copied().unwrap_or("");
                if name == "name" {
                    symbol_name = Some(content[capture.node.byte_range()].to_string());
                } else if name.ends_with(".name") {
                    parent_symbol = Some(content[capture.node.byte_range()].to_string());
                } else {
                    main_node = Some(capture.node);
                    capture_name = name.to_string();
                }
            }

            if let Some(node) = main_node {
                let start_line = node.start_position().row as u32 + 1;
                let end_line = node.end_position().row as u32 + 1;
                let node_content = content[node.byte_range()].to_string();
                defs.push(Definition {
                    capture_name,
                    name: symbol_name,
                    parent: parent_symbol,
                    start_line,
                    end_line,
                    content: node_content,
                });
            }
        }

        defs
    }
}

impl Default for TreeSitterParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ParserService for TreeSitterParser {
    async fn parse_file(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
        repository_id: &str,
        commit_sha: &str,
    ) -> Result<ParseFileResult, DomainError> {
        let query_source = self.get_query_patterns(language);
        let ts_language = self.get_ts_language(language);

        let (ts_language, query_source) = match (ts_language, query_source) {
            (Some(l), q) if !q.trim().is_empty() => (l, q),
            _ => {
                return Ok(ParseFileResult {
                    path: file_path.to_string(),
                    language,
                    chunks: fixed_line_chunks(content, file_path, language, repository_id, commit_sha),
                    success: true,
                    error: None,
                });
            }
        };

        let mut parser = Parser::new();
        if parser.set_language(&ts_language).is_err() {
            return Ok(ParseFileResult {
                path: file_path.to_string(),
                language,
                chunks: fixed_line_chunks(content, file_path, language, repository_id, commit_sha),
                success: true,
                error: None,
            });
        }

        let Some(tree) = parser.parse(content, None) else {
            return Ok(ParseFileResult {
                path: file_path.to_string(),
                language,
                chunks: Vec::new(),
                success: false,
                error: Some("tree-sitter failed to produce a parse tree".to_string()),
            });
        };

        let query = match Query::new(&ts_language, query_source) {
            Ok(q) => q,
            Err(e) => {
                return Ok(ParseFileResult {
                    path: file_path.to_string(),
                    language,
                    chunks: Vec::new(),
                    success: false,
                    error: Some(format!("query error: {e}")),
                });
            }
        };

        let defs = self.collect_definitions(content, &tree, &query);
        let class_scopes: Vec<(u32, u32, String)> = defs
            .iter()
            .filter(|d| matches!(Self::capture_to_symbol_kind(&d.capture_name), SymbolKind::Class))
            .filter_map(|d| d.name.clone().map(|n| (d.start_line, d.end_line, n)))
            .collect();

        let mut chunks = Vec::new();
        for def in &defs {
            if def.content.trim().len() < 10 {
                continue;
            }

            let mut kind = Self::capture_to_symbol_kind(&def.capture_name);
            let name = def.name.clone().unwrap_or_else(|| format!("anonymous_{}", def.start_line));
            let parent = def
                .parent
                .clone()
                .or_else(|| enclosing_class(&class_scopes, def.start_line, def.end_line).map(str::to_string));

            let qualified_name = if kind == SymbolKind::Function && parent.is_some() {
                kind = SymbolKind::Method;
                format!("{}.{}", parent.as_ref().unwrap(), name)
            } else {
                name
            };

            let mut chunk = Chunk::new(
                repository_id.to_string(),
                file_path.to_string(),
                def.content.clone(),
                def.start_line,
                def.end_line,
                language,
                kind,
            )
            .with_symbol_name(qualified_name)
            .with_commit(commit_sha);

            if let Some(parent) = parent {
                chunk = chunk.with_parent_symbol(parent);
            }

            chunks.push(chunk);
        }

        if chunks.is_empty() {
            chunks.push(whole_file_chunk(content, file_path, language, repository_id, commit_sha));
        }

        debug!(file_path, chunk_count = chunks.len(), ?language, "parsed chunks");

        Ok(ParseFileResult {
            path: file_path.to_string(),
            language,
            chunks,
            success: true,
            error: None,
        })
    }

    fn supported_languages(&self) -> Vec<Language> {
        self.supported_languages.clone()
    }

    async fn extract(
        &self,
        content: &str,
        file_path: &str,
        language: Language,
        repository_id: &str,
        commit_sha: &str,
    ) -> Result<ExtractResult, DomainError> {
        let Some(ts_language) = self.get_ts_language(language) else {
            return Ok(ExtractResult {
                success: true,
                ..Default::default()
            });
        };

        let mut parser = Parser::new();
        if parser.set_language(&ts_language).is_err() {
            return Ok(ExtractResult {
                success: true,
                ..Default::default()
            });
        }

        let Some(tree) = parser.parse(content, None) else {
            return Ok(ExtractResult {
                success: false,
                ..Default::default()
            });
        };

        let lines: Vec<&str> = content.lines().collect();

        // Symbols, derived from the same definition query the chunker uses.
        let mut symbols = Vec::new();
        let mut scope_index: Vec<(u32, u32, String)> = Vec::new();

        let def_query_source = self.get_query_patterns(language);
        if !def_query_source.trim().is_empty() {
            if let Ok(def_query) = Query::new(&ts_language, def_query_source) {
                let defs = self.collect_definitions(content, &tree, &def_query);
                let class_scopes: Vec<(u32, u32, String)> = defs
                    .iter()
                    .filter(|d| matches!(Self::capture_to_symbol_kind(&d.capture_name), SymbolKind::Class))
                    .filter_map(|d| d.name.clone().map(|n| (d.start_line, d.end_line, n)))
                    .collect();

                for def in &defs {
                    let name = def.name.clone().unwrap_or_else(|| format!("anonymous_{}", def.start_line));
                    let mut kind = Self::capture_to_sqi_kind(&def.capture_name);
                    let mut qualified_name = name.clone();

                    if matches!(kind, SqiSymbolKind::Function) {
                        if let Some(class_name) = enclosing_class(&class_scopes, def.start_line, def.end_line) {
                            kind = SqiSymbolKind::Method;
                            qualified_name = format!("{}.{}", class_name, name);
                        }
                    }

                    let head = def.content.lines().next().unwrap_or("");
                    let visibility = infer_visibility(head);
                    let is_async = head.contains("async ");
                    let is_static = head.contains("static ") || head.contains("companion object");
                    let is_exported =
                        matches!(visibility, Some(Visibility::Public)) || head.trim_start().starts_with("export");
                    let content_hash = format!("{:x}", Sha256::digest(def.content.as_bytes()));

                    let mut symbol = Symbol::new(
                        repository_id.to_string(),
                        commit_sha.to_string(),
                        name,
                        qualified_name,
                        kind,
                        file_path.to_string(),
                        def.start_line,
                        def.end_line,
                        language,
                        content_hash,
                    )
                    .with_flags(is_async, is_static, is_exported);

                    if let Some(v) = visibility {
                        symbol = symbol.with_visibility(v);
                    }
                    if let Some(rt) = infer_return_type(head) {
                        symbol = symbol.with_return_type(rt);
                    }
                    if let Some(params) = infer_parameters(head) {
                        symbol = symbol.with_parameters(params);
                    }
                    if let Some(doc) = extract_docstring(&lines, def.start_line) {
                        symbol = symbol.with_docstring(doc);
                    }

                    scope_index.push((def.start_line, def.end_line, symbol.id().to_string()));
                    symbols.push(symbol);
                }
            }
        }

        // Usages and imports from the reference query.
        let mut usages = Vec::new();
        let mut imports = Vec::new();

        let ref_query_source = self.get_reference_query_patterns(language);
        if !ref_query_source.trim().is_empty() {
            if let Ok(ref_query) = Query::new(&ts_language, ref_query_source) {
                let mut cursor = QueryCursor::new();
                let text_bytes = content.as_bytes();
                let capture_names: Vec<&str> = ref_query.capture_names().to_vec();
                let mut seen: HashSet<(u32, u32, String)> = HashSet::new();

                let mut matches_iter = cursor.matches(&ref_query, tree.root_node(), text_bytes);
                while let Some(query_match) = matches_iter.next() {
                    let mut callee_name: Option<String> = None;
                    let mut outer_capture = String::new();
                    let mut ref_node = None;

                    for capture in query_match.captures {
                        let capture_name = capture_names.get(capture.index as usize).copied().unwrap_or("");
                        if capture_name.starts_with('_') {
                            // throwaway anchor capture (e.g. Go's package operand), not a role tag
                            continue;
                        }
                        if capture_name == "callee" {
                            callee_name = Some(content[capture.node.byte_range()].to_string());
                            ref_node = Some(capture.node);
                        } else if capture_name == "type_ref" {
                            if outer_capture.is_empty() {
                                outer_capture = "type_ref".to_string();
                            }
                            if callee_name.is_none() {
                                callee_name = Some(content[capture.node.byte_range()].to_string());
                                ref_node = Some(capture.node);
                            }
                        } else if outer_capture.is_empty() {
                            outer_capture = capture_name.to_string();
                        }
                    }

                    let (Some(mut name), Some(node)) = (callee_name, ref_node) else {
                        continue;
                    };

                    if outer_capture == "import" {
                        name = normalize_import_path(&name);
                    }
                    if is_noise_name(&name) {
                        continue;
                    }

                    let line = node.start_position().row as u32 + 1;
                    let column = node.start_position().column as u32 + 1;

                    if outer_capture == "import" {
                        imports.push(Self::build_import(language, repository_id, commit_sha, file_path, line, &name));
                        continue;
                    }

                    let Some(usage_type) = Self::capture_to_usage_type(&outer_capture) else {
                        continue;
                    };

                    let key = (line, column, name.clone());
                    if !seen.insert(key) {
                        continue;
                    }

                    let mut usage = Usage::new(
                        repository_id.to_string(),
                        commit_sha.to_string(),
                        name,
                        file_path.to_string(),
                        line,
                        column,
                        usage_type,
                        language,
                    );
                    if let Some(enclosing_id) = lookup_enclosing(&scope_index, line) {
                        usage = usage.with_enclosing_symbol(enclosing_id);
                    }
                    usages.push(usage);
                }
            }
        }

        debug!(
            file_path,
            symbol_count = symbols.len(),
            usage_count = usages.len(),
            import_count = imports.len(),
            ?language,
            "extracted structural data"
        );

        Ok(ExtractResult {
            symbols,
            usages,
            imports,
            success: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parse_rust_function() {
        let parser = TreeSitterParser::new();
        let content = r#"
fn hello_world() {
    println!("Hello, world!");
}

fn add(a: i32, b: i32) -> i32 {
    a + b
}
"#;

        let result = parser
            .parse_file(content, "test.rs", Language::Rust, "test-repo", "sha1")
            .await
            .unwrap();

        assert!(result.success);
        assert!(!result.chunks.is_empty());
        assert!(result.chunks.iter().any(|c| c.symbol_name() == Some("add")));
    }

    #[tokio::test]
    async fn test_parse_python_class_prefixes_methods() {
        let parser = TreeSitterParser::new();
        let content = r#"
class Calculator:
    def add(self, a, b):
        return a + b

    def subtract(self, a, b):
        return a - b
"#;

        let result = parser
            .parse_file(content, "calc.py", Language::Python, "test-repo", "sha1")
            .await
            .unwrap();

        assert!(result.chunks.iter().any(|c| c.symbol_name() == Some("Calculator.add")));
        let add_chunk = result
            .chunks
            .iter()
            .find(|c| c.symbol_name() == Some("Calculator.add"))
            .unwrap();
        assert_eq!(add_chunk.symbol_kind(), SymbolKind::Method);
        assert_eq!(add_chunk.parent_symbol(), Some("Calculator"));
    }

    #[tokio::test]
    async fn test_parse_php_class() {
        let parser = TreeSitterParser::new();
        let content = r#"
<?php
class Calculator {
    public function add($a, $b) {
        return $a + $b;
    }
}
"#;

        let result = parser
            .parse_file(content, "calc.php", Language::Php, "test-repo", "sha1")
            .await
            .unwrap();

        assert!(result.chunks.iter().any(|c| c.symbol_name() == Some("Calculator.add")));
    }

    #[tokio::test]
    async fn test_parse_cpp_function() {
        let parser = TreeSitterParser::new();
        let content = r#"
double calculate_area(double radius) {
    return 3.14159 * radius * radius;
}

int main() {
    return 0;
}
"#;

        let result = parser
            .parse_file(content, "shapes.cpp", Language::Cpp, "test-repo", "sha1")
            .await
            .unwrap();

        let area_count = result
            .chunks
            .iter()
            .filter(|c| c.symbol_name() == Some("calculate_area"))
            .count();
        assert_eq!(area_count, 1);
        assert!(result.chunks.iter().any(|c| c.symbol_name() == Some("main")));
    }

    #[tokio::test]
    async fn test_parse_swift_class_struct_protocol() {
        let parser = TreeSitterParser::new();
        let content = r#"
protocol Shape {
    func area() -> Double
}

class Circle: Shape {
    var radius: Double
    func area() -> Double {
        return 3.14159 * radius * radius
    }
}

struct Rectangle: Shape {
    var width: Double
    var height: Double
    func area() -> Double {
        return width * height
    }
}
"#;

        let result = parser
            .parse_file(content, "shapes.swift", Language::Swift, "test-repo", "sha1")
            .await
            .unwrap();

        assert!(result.chunks.iter().any(|c| c.symbol_name() == Some("Circle")));
        assert!(result.chunks.iter().any(|c| c.symbol_name() == Some("Rectangle")));
        assert!(result.chunks.iter().any(|c| c.symbol_name() == Some("Shape")));
    }

    #[tokio::test]
    async fn test_parse_kotlin_class_and_type_alias() {
        let parser = TreeSitterParser::new();
        let content = r#"
interface Shape {
    fun area(): Double
}

class Circle(val radius: Double) : Shape {
    override fun area(): Double = 3.14159 * radius * radius
}

data class Rectangle(val width: Double, val height: Double) : Shape {
    override fun area(): Double = width * height
}

typealias ShapeList = List<Shape>
"#;

        let result = parser
            .parse_file(content, "shapes.kt", Language::Kotlin, "test-repo", "sha1")
            .await
            .unwrap();

        assert!(result.chunks.iter().any(|c| c.symbol_name() == Some("Circle")));
        assert!(result.chunks.iter().any(|c| c.symbol_name() == Some("Rectangle")));
        assert!(result.chunks.iter().any(|c| c.symbol_name() == Some("Shape")));
        assert!(result.chunks.iter().any(|c| c.symbol_name() == Some("ShapeList")));
    }

    #[tokio::test]
    async fn test_fixed_line_fallback_for_unknown_language() {
        let parser = TreeSitterParser::new();
        let content = (0..120).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");

        let result = parser
            .parse_file(&content, "data.txt", Language::Unknown, "test-repo", "sha1")
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.chunks.len(), 3);
        assert_eq!(result.chunks[0].start_line(), 1);
        assert_eq!(result.chunks[0].end_line(), 50);
        assert_eq!(result.chunks[2].start_line(), 101);
    }

    #[tokio::test]
    async fn test_module_level_fallback_when_no_definitions() {
        let parser = TreeSitterParser::new();
        let content = "let x = 1;\n";

        let result = parser
            .parse_file(content, "consts.rs", Language::Rust, "test-repo", "sha1")
            .await
            .unwrap();

        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.chunks[0].symbol_kind(), SymbolKind::Module);
    }

    #[tokio::test]
    async fn test_extract_rust_function_calls() {
        let parser = TreeSitterParser::new();
        let content = r#"
fn helper() -> i32 {
    42
}

fn main() {
    let x = helper();
    println!("Result: {}", x);
}
"#;

        let result = parser
            .extract(content, "test.rs", Language::Rust, "test-repo", "sha1")
            .await
            .unwrap();

        let helper_calls: Vec<_> = result.usages.iter().filter(|u| u.symbol_name() == "helper").collect();
        assert!(!helper_calls.is_empty());
        assert_eq!(helper_calls[0].usage_type(), UsageType::Call);

        assert!(result.usages.iter().any(|u| u.symbol_name() == "println"));
    }

    #[tokio::test]
    async fn test_extract_usage_enclosing_symbol() {
        let parser = TreeSitterParser::new();
        let content = r#"
fn helper() -> i32 {
    42
}

fn caller() {
    let x = helper();
}
"#;

        let result = parser
            .extract(content, "test.rs", Language::Rust, "test-repo", "sha1")
            .await
            .unwrap();

        let helper_call = result.usages.iter().find(|u| u.symbol_name() == "helper").unwrap();
        let caller_symbol = result.symbols.iter().find(|s| s.name() == "caller").unwrap();
        assert_eq!(helper_call.enclosing_symbol_id(), Some(caller_symbol.id()));
    }

    #[tokio::test]
    async fn test_extract_python_calls_and_imports() {
        let parser = TreeSitterParser::new();
        let content = r#"
import os

def helper():
    return 42

def main():
    result = helper()
    os.path.exists("/tmp")
"#;

        let result = parser
            .extract(content, "test.py", Language::Python, "test-repo", "sha1")
            .await
            .unwrap();

        assert!(result.usages.iter().any(|u| u.symbol_name() == "helper"));
        assert!(result.imports.iter().any(|i| i.module_specifier() == "os"));
    }

    #[tokio::test]
    async fn test_extract_typescript_type_references() {
        let parser = TreeSitterParser::new();
        let content = r#"
interface User {
    name: string;
}

function greet(user: User): string {
    return user.name;
}
"#;

        let result = parser
            .extract(content, "test.ts", Language::TypeScript, "test-repo", "sha1")
            .await
            .unwrap();

        let user_refs: Vec<_> = result.usages.iter().filter(|u| u.symbol_name() == "User").collect();
        assert!(!user_refs.is_empty());
        assert_eq!(user_refs[0].usage_type(), UsageType::TypeRef);
    }

    #[tokio::test]
    async fn test_go_imports_strip_quotes() {
        let parser = TreeSitterParser::new();
        let content = r#"
package main

import (
    "fmt"
    "os"
)

func main() {
    fmt.Println("hello")
}
"#;

        let result = parser
            .extract(content, "main.go", Language::Go, "test-repo", "sha1")
            .await
            .unwrap();

        assert!(result.imports.iter().any(|i| i.module_specifier() == "fmt"));
        assert!(result.imports.iter().any(|i| i.module_specifier() == "os"));
        assert!(!result.imports.iter().any(|i| i.module_specifier().starts_with('"')));
    }

    #[tokio::test]
    async fn test_go_no_duplicate_package_calls() {
        let parser = TreeSitterParser::new();
        let content = r#"
package main

import "fmt"

func main() {
    fmt.Println("hello")
}
"#;

        let result = parser
            .extract(content, "main.go", Language::Go, "test-repo", "sha1")
            .await
            .unwrap();

        let println_calls: Vec<_> = result
            .usages
            .iter()
            .filter(|u| u.symbol_name() == "Println" && u.usage_type() == UsageType::Call)
            .collect();
        assert_eq!(println_calls.len(), 1);
    }

    #[tokio::test]
    async fn test_cpp_includes_strip_quotes_and_brackets() {
        let parser = TreeSitterParser::new();
        let content = r#"
#include <iostream>
#include <vector>
#include "myheader.h"

int main() {
    return 0;
}
"#;

        let result = parser
            .extract(content, "main.cpp", Language::Cpp, "test-repo", "sha1")
            .await
            .unwrap();

        assert!(result.imports.iter().any(|i| i.module_specifier() == "iostream"));
        assert!(result.imports.iter().any(|i| i.module_specifier() == "vector"));
        assert!(result.imports.iter().any(|i| i.module_specifier() == "myheader.h"));
        assert!(!result
            .imports
            .iter()
            .any(|i| i.module_specifier().starts_with('<') || i.module_specifier().starts_with('"')));
    }

    #[tokio::test]
    async fn test_extract_kotlin_imports_and_calls() {
        let parser = TreeSitterParser::new();
        let content = r#"
package com.example

import kotlin.math.sqrt

fun hypotenuse(a: Double, b: Double): Double {
    return sqrt(a * a + b * b)
}
"#;

        let result = parser
            .extract(content, "test.kt", Language::Kotlin, "test-repo", "sha1")
            .await
            .unwrap();

        assert!(result.imports.iter().any(|i| i.module_specifier() == "sqrt"));
        assert!(result
            .usages
            .iter()
            .any(|u| u.symbol_name() == "sqrt" && u.usage_type() == UsageType::Call));
    }

    #[tokio::test]
    async fn test_extract_kotlin_inheritance() {
        let parser = TreeSitterParser::new();
        let content = r#"
interface Animal {
    fun speak(): String
}

class Dog : Animal {
    override fun speak(): String = "Woof"
}
"#;

        let result = parser
            .extract(content, "test.kt", Language::Kotlin, "test-repo", "sha1")
            .await
            .unwrap();

        assert!(result
            .usages
            .iter()
            .any(|u| u.symbol_name() == "Animal" && u.usage_type() == UsageType::Extend));
    }

    #[tokio::test]
    async fn test_extract_swift_imports() {
        let parser = TreeSitterParser::new();
        let content = r#"
import Foundation

func greet(name: String) -> String {
    return "Hello, \(name)!"
}

let message = greet(name: "World")
print(message)
"#;

        let result = parser
            .extract(content, "test.swift", Language::Swift, "test-repo", "sha1")
            .await
            .unwrap();

        assert!(result.imports.iter().any(|i| i.module_specifier() == "Foundation"));
    }

    #[tokio::test]
    async fn test_symbol_docstring_extraction() {
        let parser = TreeSitterParser::new();
        let content = r#"
/**
 * Adds two numbers.
 * @param a first
 * @param b second
 */
function add(a, b) {
    return a + b;
}
"#;

        let result = parser
            .extract(content, "math.js", Language::JavaScript, "test-repo", "sha1")
            .await
            .unwrap();

        let add = result.symbols.iter().find(|s| s.name() == "add").unwrap();
        assert_eq!(add.docstring(), Some("Adds two numbers."));
    }

    #[tokio::test]
    async fn test_symbol_return_type_and_parameters() {
        let parser = TreeSitterParser::new();
        let content = r#"
fn add(a: i32, b: i32) -> i32 {
    a + b
}
"#;

        let result = parser
            .extract(content, "test.rs", Language::Rust, "test-repo", "sha1")
            .await
            .unwrap();

        let add = result.symbols.iter().find(|s| s.name() == "add").unwrap();
        assert_eq!(add.return_type(), Some("i32"));
        assert_eq!(add.parameters(), Some(&["a: i32".to_string(), "b: i32".to_string()][..]));
    }
}
