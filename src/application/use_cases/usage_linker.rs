use std::collections::HashMap;

use crate::domain::{Symbol, Usage};

/// Post-extraction linking pass (§4.C): binds every usage to its lexically
/// enclosing symbol and, best-effort, to the symbol it references. Runs
/// entirely in memory over a commit's (or a single file's) symbol/usage set —
/// no persistence of its own, since the caller decides what to do with the
/// linked usages (store them, or merge them into a dirty-overlay result).
pub struct UsageLinkerUseCase;

impl Default for UsageLinkerUseCase {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageLinkerUseCase {
    pub fn new() -> Self {
        Self
    }

    pub fn link(&self, symbols: &[Symbol], usages: Vec<Usage>) -> Vec<Usage> {
        let mut by_name: HashMap<&str, Vec<&Symbol>> = HashMap::new();
        for symbol in symbols {
            by_name.entry(symbol.name()).or_default().push(symbol);
        }

        let mut by_file: HashMap<&str, Vec<&Symbol>> = HashMap::new();
        for symbol in symbols {
            by_file.entry(symbol.file()).or_default().push(symbol);
        }
        for list in by_file.values_mut() {
            list.sort_by(|a, b| b.start_line().cmp(&a.start_line()));
        }

        usages
            .into_iter()
            .map(|usage| Self::link_one(&by_name, &by_file, usage))
            .collect()
    }

    fn link_one(
        by_name: &HashMap<&str, Vec<&Symbol>>,
        by_file: &HashMap<&str, Vec<&Symbol>>,
        usage: Usage,
    ) -> Usage {
        let mut usage = usage;

        if let Some(file_symbols) = by_file.get(usage.file()) {
            if let Some(enclosing) = file_symbols.iter().find(|s| s.contains_line(usage.line())) {
                usage = usage.with_enclosing_symbol(enclosing.id().to_string());
            }
        }

        let Some(candidates) = by_name.get(usage.symbol_name()) else {
            return usage;
        };
        if candidates.is_empty() {
            return usage;
        }
        if candidates.len() == 1 {
            return usage.with_definition_symbol(candidates[0].id().to_string());
        }

        // 2. restrict to the same file, if any candidate lives there.
        let same_file: Vec<&Symbol> = candidates
            .iter()
            .filter(|s| s.file() == usage.file())
            .copied()
            .collect();
        if same_file.len() == 1 {
            return usage.with_definition_symbol(same_file[0].id().to_string());
        }
        let pool: Vec<&Symbol> = if !same_file.is_empty() {
            same_file
        } else {
            candidates.clone()
        };

        // 3. prefer exported among the remaining pool.
        let exported: Vec<&Symbol> = pool.iter().filter(|s| s.is_exported()).copied().collect();
        if exported.len() == 1 {
            return usage.with_definition_symbol(exported[0].id().to_string());
        }
        let pool = if !exported.is_empty() { exported } else { pool };

        // 4. among same-file candidates, nearest strictly-preceding definition wins.
        let nearest = pool
            .iter()
            .filter(|s| s.file() == usage.file() && s.start_line() < usage.line())
            .max_by_key(|s| s.start_line());
        if let Some(nearest) = nearest {
            return usage.with_definition_symbol(nearest.id().to_string());
        }

        // 5. ambiguous — take the first candidate.
        usage.with_definition_symbol(pool[0].id().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Language, SqiSymbolKind, UsageType};

    fn sym(name: &str, file: &str, start: u32, end: u32, exported: bool) -> Symbol {
        Symbol::new(
            "repo".into(),
            "sha".into(),
            name.into(),
            name.into(),
            SqiSymbolKind::Function,
            file.into(),
            start,
            end,
            Language::TypeScript,
            "hash".into(),
        )
        .with_flags(false, false, exported)
    }

    fn usg(name: &str, file: &str, line: u32) -> Usage {
        Usage::new(
            "repo".into(),
            "sha".into(),
            name.into(),
            file.into(),
            line,
            0,
            UsageType::Call,
            Language::TypeScript,
        )
    }

    #[test]
    fn single_candidate_links_immediately() {
        let symbols = vec![sym("helper", "a.ts", 1, 5, false)];
        let linker = UsageLinkerUseCase::new();
        let linked = linker.link(&symbols, vec![usg("helper", "b.ts", 10)]);
        assert_eq!(linked[0].definition_symbol_id(), Some(symbols[0].id()));
    }

    #[test]
    fn same_file_candidate_wins_over_other_files() {
        let symbols = vec![
            sym("run", "other.ts", 1, 5, true),
            sym("run", "a.ts", 20, 30, false),
        ];
        let linker = UsageLinkerUseCase::new();
        let linked = linker.link(&symbols, vec![usg("run", "a.ts", 25)]);
        assert_eq!(linked[0].definition_symbol_id(), Some(symbols[1].id()));
    }

    #[test]
    fn exported_wins_when_same_file_is_ambiguous() {
        let symbols = vec![
            sym("run", "a.ts", 1, 5, false),
            sym("run", "a.ts", 10, 15, true),
        ];
        let linker = UsageLinkerUseCase::new();
        let linked = linker.link(&symbols, vec![usg("run", "a.ts", 12)]);
        assert_eq!(linked[0].definition_symbol_id(), Some(symbols[1].id()));
    }

    #[test]
    fn enclosing_symbol_is_innermost_containing_range() {
        let symbols = vec![sym("Outer.inner", "a.ts", 1, 20, false)];
        let linker = UsageLinkerUseCase::new();
        let linked = linker.link(&symbols, vec![usg("other", "a.ts", 10)]);
        assert_eq!(linked[0].enclosing_symbol_id(), Some(symbols[0].id()));
    }

    #[test]
    fn unmatched_name_stays_unlinked() {
        let symbols = vec![sym("helper", "a.ts", 1, 5, false)];
        let linker = UsageLinkerUseCase::new();
        let linked = linker.link(&symbols, vec![usg("missing", "a.ts", 2)]);
        assert!(!linked[0].is_linked());
    }
}
