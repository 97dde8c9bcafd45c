use crate::function::FunctionInfo;
use crate::import::ImportInfo;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// What a top-level declaration is. Stubs stand in for modules the linker
/// could not see; everything else comes straight from source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Contract,
    Interface,
    Trait,
    Component,
    Module,
    Stub,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Contract => "contract",
            EntityKind::Interface => "interface",
            EntityKind::Trait => "trait",
            EntityKind::Component => "component",
            EntityKind::Module => "module",
            EntityKind::Stub => "stub",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    MalformedDeclaration,
    UnclosedBody,
    UnresolvedImport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub line: usize,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            message: message.into(),
            line,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageVarInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: String,
    pub line: usize,
    pub is_stub: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventInfo {
    pub name: String,
    pub fields: Vec<crate::function::Param>,
    pub line: usize,
    pub is_stub: bool,
}

/// One declared entity (or synthesized stub) with everything the lexical
/// parser and linker learned about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractInfo {
    pub name: String,
    /// Absent for stubs, which have no originating file.
    pub file_path: Option<String>,
    pub kind: EntityKind,
    /// Fully-qualified `::`-separated path this entity is registered under.
    pub module_path: String,
    pub functions: Vec<FunctionInfo>,
    pub storage_vars: Vec<StorageVarInfo>,
    pub events: Vec<EventInfo>,
    pub imports: Vec<ImportInfo>,
    /// Stubs synthesized for this entity's unresolved imports, keyed by the
    /// stubbed module path. Duplicate imports of one module share the entry.
    pub stub_modules: IndexMap<String, ContractInfo>,
    pub unresolved_calls: BTreeSet<String>,
    pub unresolved_types: BTreeSet<String>,
    pub parse_errors: Vec<Diagnostic>,
    pub parse_warnings: Vec<String>,
}

impl ContractInfo {
    pub fn new(name: impl Into<String>, kind: EntityKind, module_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file_path: None,
            kind,
            module_path: module_path.into(),
            functions: Vec::new(),
            storage_vars: Vec::new(),
            events: Vec::new(),
            imports: Vec::new(),
            stub_modules: IndexMap::new(),
            unresolved_calls: BTreeSet::new(),
            unresolved_types: BTreeSet::new(),
            parse_errors: Vec::new(),
            parse_warnings: Vec::new(),
        }
    }

    pub fn with_file(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = Some(file_path.into());
        self
    }

    pub fn is_stub(&self) -> bool {
        self.kind == EntityKind::Stub
    }

    /// True when nothing was declared inside this entity. File-level module
    /// shells with no declarations of their own are dropped from reports.
    pub fn is_empty_shell(&self) -> bool {
        self.functions.is_empty() && self.storage_vars.is_empty() && self.events.is_empty()
    }

    /// Symbol names this entity's imports bring into scope, including the
    /// trailing names of stubbed module paths. The dataflow analyzer uses
    /// this set to classify call sites as external.
    pub fn imported_symbols(&self) -> BTreeSet<String> {
        let mut symbols = BTreeSet::new();
        for imp in &self.imports {
            for sym in &imp.symbols {
                symbols.insert(sym.clone());
            }
            if let Some(last) = imp.module_path.rsplit("::").next() {
                symbols.insert(last.to_string());
            }
        }
        for path in self.stub_modules.keys() {
            if let Some(last) = path.rsplit("::").next() {
                symbols.insert(last.to_string());
            }
        }
        symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_kind_serializes_lowercase() {
        let json = serde_json::to_string(&EntityKind::Contract).unwrap();
        assert_eq!(json, "\"contract\"");
        let json = serde_json::to_string(&EntityKind::Stub).unwrap();
        assert_eq!(json, "\"stub\"");
    }

    #[test]
    fn imported_symbols_cover_imports_and_stubs() {
        let mut contract = ContractInfo::new("Vault", EntityKind::Contract, "vault::Vault");
        contract.imports.push(ImportInfo::new(
            "core::array",
            vec!["ArrayTrait".to_string()],
            1,
        ));
        contract.stub_modules.insert(
            "core::array".to_string(),
            ContractInfo::new("array", EntityKind::Stub, "core::array"),
        );

        let symbols = contract.imported_symbols();
        assert!(symbols.contains("ArrayTrait"));
        assert!(symbols.contains("array"));
    }
}
