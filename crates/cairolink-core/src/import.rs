use serde::{Deserialize, Serialize};

/// One `use` (or Cairo-0 `from .. import ..`) statement as written in source.
///
/// After linking, exactly one of `resolved` / `stub_created` is set when
/// stubbing is enabled; with stubbing disabled an unresolved import leaves
/// both false and a diagnostic on the owning contract instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportInfo {
    pub module_path: String,
    /// Imported symbol names, empty for whole-module or wildcard imports.
    pub symbols: Vec<String>,
    pub line: usize,
    pub resolved: bool,
    pub stub_created: bool,
}

impl ImportInfo {
    pub fn new(module_path: impl Into<String>, symbols: Vec<String>, line: usize) -> Self {
        Self {
            module_path: module_path.into(),
            symbols,
            line,
            resolved: false,
            stub_created: false,
        }
    }

    /// Module path with a leading `crate::` or `super::` removed. Table
    /// lookups and stub keys always use this form.
    pub fn lookup_path(&self) -> &str {
        self.module_path
            .strip_prefix("crate::")
            .or_else(|| self.module_path.strip_prefix("super::"))
            .unwrap_or(&self.module_path)
    }

    pub fn is_super_relative(&self) -> bool {
        self.module_path.starts_with("super::")
    }
}
