use crate::symbols::SymbolTable;
use cairolink_core::{ContractInfo, ImportInfo};

/// Pass 2: resolve one import against the frozen symbol table.
///
/// Lookup strips a leading `crate::`; `super::`-relative imports cannot be
/// anchored without knowing the importer's position in a foreign crate and
/// stay unresolved. A miss retries progressively shorter prefixes, so
/// `a::b::Foo` matches a table entry `a::b` with `Foo` recorded as an
/// imported symbol rather than a module segment.
pub fn resolve_import(import: &mut ImportInfo, table: &SymbolTable) -> bool {
    if import.is_super_relative() {
        return false;
    }

    let path = import.lookup_path().to_string();
    if table.contains(&path) {
        import.resolved = true;
        return true;
    }

    let mut segments: Vec<&str> = path.split("::").collect();
    let mut tail: Vec<String> = Vec::new();
    while segments.len() > 1 {
        tail.insert(0, segments.pop().expect("len checked").to_string());
        let prefix = segments.join("::");
        if table.contains(&prefix) {
            import.resolved = true;
            for symbol in tail {
                if !import.symbols.contains(&symbol) {
                    import.symbols.push(symbol);
                }
            }
            return true;
        }
    }

    false
}

/// Resolve every import on a contract. Returns the lookup paths that
/// resolved and those that did not.
pub fn link_contract(
    contract: &mut ContractInfo,
    table: &SymbolTable,
) -> (Vec<String>, Vec<String>) {
    let mut resolved = Vec::new();
    let mut unresolved = Vec::new();
    for import in &mut contract.imports {
        if import.resolved {
            resolved.push(import.lookup_path().to_string());
            continue;
        }
        if resolve_import(import, table) {
            resolved.push(import.lookup_path().to_string());
        } else {
            unresolved.push(import.lookup_path().to_string());
        }
    }
    (resolved, unresolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::{SymbolId, SymbolTableBuilder};

    fn table_with(keys: &[&str]) -> SymbolTable {
        let mut builder = SymbolTableBuilder::new();
        for (i, key) in keys.iter().enumerate() {
            builder.insert(*key, SymbolId { file: i, entity: 0 });
        }
        builder.freeze()
    }

    #[test]
    fn exact_path_resolves() {
        let table = table_with(&["a::foo"]);
        let mut imp = ImportInfo::new("a::foo", vec![], 1);
        assert!(resolve_import(&mut imp, &table));
        assert!(imp.resolved);
        assert!(!imp.stub_created);
    }

    #[test]
    fn crate_prefix_is_stripped_before_lookup() {
        let table = table_with(&["a::foo::Foo"]);
        let mut imp = ImportInfo::new("crate::a::foo::Foo", vec![], 2);
        assert!(resolve_import(&mut imp, &table));
    }

    #[test]
    fn prefix_match_attaches_tail_as_symbols() {
        let table = table_with(&["a::b"]);
        let mut imp = ImportInfo::new("a::b::Foo", vec![], 1);
        assert!(resolve_import(&mut imp, &table));
        assert_eq!(imp.symbols, vec!["Foo"]);
    }

    #[test]
    fn deep_tail_keeps_segment_order() {
        let table = table_with(&["a"]);
        let mut imp = ImportInfo::new("a::b::c", vec![], 1);
        assert!(resolve_import(&mut imp, &table));
        assert_eq!(imp.symbols, vec!["b", "c"]);
    }

    #[test]
    fn unknown_external_stays_unresolved() {
        let table = table_with(&["a::foo"]);
        let mut imp = ImportInfo::new("core::array", vec!["ArrayTrait".to_string()], 1);
        assert!(!resolve_import(&mut imp, &table));
        assert!(!imp.resolved);
    }

    #[test]
    fn super_imports_are_unresolvable_external() {
        let table = table_with(&["helpers"]);
        let mut imp = ImportInfo::new("super::helpers", vec![], 1);
        assert!(!resolve_import(&mut imp, &table));
        assert!(!imp.resolved);
    }
}
