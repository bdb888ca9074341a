use crate::domain::{ContentType, SqiSymbolKind};

/// Filler phrases stripped before intent keyword matching, longest first so
/// multi-word phrases go before their constituent words.
const FILLER_PHRASES: &[&str] = &[
    "show me all",
    "give me all",
    "find me all",
    "show me the",
    "give me the",
    "find me the",
    "i'm looking for",
    "i am looking for",
    "search for all",
    "look for all",
    "show me",
    "find me",
    "give me",
    "tell me",
    "what is",
    "what are",
    "how does",
    "how do",
    "how is",
    "where is",
    "where are",
    "search for",
    "look for",
    "find all",
    "find the",
    "list all",
    "list the",
    "get all",
    "get the",
];

const DEFINITION_KEYWORDS: &[&str] = &["where is", "defined", "definition", "declared", "declaration"];
const USAGE_KEYWORDS: &[&str] = &["used", "usage", "calls", "called", "references", "referenced"];

const STOP_WORDS: &[&str] = &[
    "find", "show", "get", "give", "tell", "search", "look", "list", "the", "a", "an", "some",
    "any", "all", "which", "that", "this", "these", "those", "for", "from", "in", "on", "at",
    "to", "of", "with", "by", "via", "is", "are", "was", "were", "be", "been", "being", "do",
    "does", "did", "have", "has", "had", "where", "how", "what",
];

/// The query's retrieval intent, classified by keyword (§4.I).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryIntent {
    Definition,
    Usage,
    General,
}

/// Parsed query handed to the hybrid engine (§4.I).
#[derive(Debug, Clone)]
pub struct ParsedQuery {
    pub original: String,
    pub for_embedding: String,
    pub intent: QueryIntent,
    pub symbol_terms: Vec<String>,
    pub symbol_types: Vec<SqiSymbolKind>,
    pub content_types: Vec<ContentType>,
}

/// Rule-based natural-language query parser (§4.I), grounded on the same
/// filler-phrase/stop-word stripping technique used for embedding cleanup.
pub struct QueryParserUseCase;

impl Default for QueryParserUseCase {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryParserUseCase {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, text: &str) -> ParsedQuery {
        let lower = text.to_lowercase();

        ParsedQuery {
            original: text.to_string(),
            for_embedding: Self::strip_intent_keywords(text, &lower),
            intent: Self::classify_intent(&lower),
            symbol_terms: Self::extract_symbol_terms(text),
            symbol_types: Self::classify_symbol_types(&lower),
            content_types: Self::classify_content_types(&lower),
        }
    }

    fn classify_intent(lower: &str) -> QueryIntent {
        if DEFINITION_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            QueryIntent::Definition
        } else if USAGE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            QueryIntent::Usage
        } else {
            QueryIntent::General
        }
    }

    fn classify_symbol_types(lower: &str) -> Vec<SqiSymbolKind> {
        let mut kinds = Vec::new();
        let mut push = |kind: SqiSymbolKind| {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        };
        if lower.contains("class") {
            push(SqiSymbolKind::Class);
        }
        if lower.contains("interface") {
            push(SqiSymbolKind::Interface);
        }
        if lower.contains("struct") {
            push(SqiSymbolKind::Struct);
        }
        if lower.contains("enum") {
            push(SqiSymbolKind::Enum);
        }
        if lower.contains("trait") {
            push(SqiSymbolKind::Trait);
        }
        if lower.contains("function") || lower.contains("func ") || lower.contains(" fn ") {
            push(SqiSymbolKind::Function);
        }
        if lower.contains("method") {
            push(SqiSymbolKind::Method);
        }
        if lower.contains("module") {
            push(SqiSymbolKind::Module);
        }
        if lower.contains("namespace") {
            push(SqiSymbolKind::Namespace);
        }
        if lower.contains("type alias") || lower.contains("typedef") {
            push(SqiSymbolKind::TypeAlias);
        }
        kinds
    }

    fn classify_content_types(lower: &str) -> Vec<ContentType> {
        if lower.contains("docs") || lower.contains("readme") || lower.contains("comment") {
            vec![ContentType::Docs]
        } else if lower.contains("yaml")
            || lower.contains("json")
            || lower.contains("toml")
            || lower.contains("settings")
            || lower.contains("config")
        {
            vec![ContentType::Config]
        } else {
            vec![ContentType::Code]
        }
    }

    /// Non-keyword words matching CamelCase / camelCase / snake_case, taken
    /// from the untouched original text so identifier casing survives.
    fn extract_symbol_terms(text: &str) -> Vec<String> {
        let mut terms = Vec::new();
        for word in text.split_whitespace() {
            let cleaned: String = word
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if cleaned.len() < 2 {
                continue;
            }
            if Self::looks_like_identifier(&cleaned) && !terms.contains(&cleaned) {
                terms.push(cleaned);
            }
        }
        terms
    }

    fn looks_like_identifier(word: &str) -> bool {
        if word.contains('_') && word.chars().any(|c| c.is_alphabetic()) {
            return true;
        }
        let mut saw_lower_then_upper = false;
        let mut prev_lower = false;
        for c in word.chars() {
            if c.is_lowercase() {
                prev_lower = true;
            } else if c.is_uppercase() && prev_lower {
                saw_lower_then_upper = true;
                break;
            }
        }
        saw_lower_then_upper
    }

    /// Strips multi-word filler phrases and remaining stop words; falls back
    /// to the original text if stripping leaves nothing.
    fn strip_intent_keywords(original: &str, lower: &str) -> String {
        let mut cleaned = lower.to_string();
        for phrase in FILLER_PHRASES {
            cleaned = cleaned.replace(phrase, " ");
        }
        let tokens: Vec<&str> = cleaned
            .split_whitespace()
            .filter(|w| !STOP_WORDS.contains(w))
            .collect();
        let joined = tokens.join(" ");
        if joined.is_empty() {
            original.to_string()
        } else {
            joined
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_definition_intent() {
        let parsed = QueryParserUseCase::new().parse("where is UserService defined");
        assert_eq!(parsed.intent, QueryIntent::Definition);
    }

    #[test]
    fn classifies_usage_intent() {
        let parsed = QueryParserUseCase::new().parse("where is UserService used");
        assert_eq!(parsed.intent, QueryIntent::Usage);
    }

    #[test]
    fn defaults_to_general_intent() {
        let parsed = QueryParserUseCase::new().parse("authentication error handling");
        assert_eq!(parsed.intent, QueryIntent::General);
    }

    #[test]
    fn extracts_camel_case_symbol_terms() {
        let parsed = QueryParserUseCase::new().parse("find usages of getUserById");
        assert!(parsed.symbol_terms.contains(&"getUserById".to_string()));
    }

    #[test]
    fn extracts_snake_case_symbol_terms() {
        let parsed = QueryParserUseCase::new().parse("where is user_id validated");
        assert!(parsed.symbol_terms.contains(&"user_id".to_string()));
    }

    #[test]
    fn content_type_defaults_to_code() {
        let parsed = QueryParserUseCase::new().parse("how does auth work");
        assert_eq!(parsed.content_types, vec![ContentType::Code]);
    }

    #[test]
    fn content_type_switches_to_docs() {
        let parsed = QueryParserUseCase::new().parse("readme for the auth module");
        assert_eq!(parsed.content_types, vec![ContentType::Docs]);
    }

    #[test]
    fn for_embedding_falls_back_when_empty() {
        let parsed = QueryParserUseCase::new().parse("the a an");
        assert_eq!(parsed.for_embedding, "the a an");
    }

    #[test]
    fn symbol_types_detects_class_keyword() {
        let parsed = QueryParserUseCase::new().parse("find the UserService class");
        assert!(parsed.symbol_types.contains(&SqiSymbolKind::Class));
    }
}
