use indexmap::IndexMap;

/// Arena handle into the pipeline's parsed files: `(file index, entity
/// index)`. The table never owns contract data, so linking can mutate the
/// entities the reporter will eventually consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolId {
    pub file: usize,
    pub entity: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate(SymbolId),
}

/// Single-writer builder for the global symbol table. Pass 1 is the only
/// writer; freezing yields the immutable view the later passes read.
#[derive(Debug, Default)]
pub struct SymbolTableBuilder {
    entries: IndexMap<String, SymbolId>,
}

impl SymbolTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// First insertion wins; a duplicate reports the existing entry.
    pub fn insert(&mut self, key: impl Into<String>, id: SymbolId) -> InsertOutcome {
        let key = key.into();
        match self.entries.get(&key) {
            Some(&existing) => InsertOutcome::Duplicate(existing),
            None => {
                self.entries.insert(key, id);
                InsertOutcome::Inserted
            }
        }
    }

    pub fn freeze(self) -> SymbolTable {
        SymbolTable {
            entries: self.entries,
        }
    }
}

/// Immutable global symbol table mapping fully-qualified module paths to
/// entity handles. Write-closed before resolution begins.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    entries: IndexMap<String, SymbolId>,
}

impl SymbolTable {
    pub fn resolve(&self, path: &str) -> Option<SymbolId> {
        self.entries.get(path).copied()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_insert_wins_on_duplicates() {
        let mut builder = SymbolTableBuilder::new();
        let first = SymbolId { file: 0, entity: 1 };
        let second = SymbolId { file: 2, entity: 0 };

        assert_eq!(builder.insert("a::foo", first), InsertOutcome::Inserted);
        assert_eq!(
            builder.insert("a::foo", second),
            InsertOutcome::Duplicate(first)
        );

        let table = builder.freeze();
        assert_eq!(table.resolve("a::foo"), Some(first));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn keys_are_pairwise_distinct() {
        let mut builder = SymbolTableBuilder::new();
        builder.insert("a", SymbolId { file: 0, entity: 0 });
        builder.insert("a::b", SymbolId { file: 0, entity: 1 });
        builder.insert("a", SymbolId { file: 1, entity: 0 });
        let table = builder.freeze();

        let keys: Vec<&str> = table.keys().collect();
        let mut deduped = keys.clone();
        deduped.dedup();
        assert_eq!(keys, deduped);
        assert_eq!(table.len(), 2);
    }
}
