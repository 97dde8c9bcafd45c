use crate::lexer::parse_source;
use crate::linker::link_contract;
use crate::scanner::{scan_roots, ScannedFile};
use crate::stubs::synthesize_stubs;
use crate::symbols::{InsertOutcome, SymbolId, SymbolTable, SymbolTableBuilder};
use anyhow::Result;
use cairolink_core::{ContractInfo, Diagnostic, DiagnosticKind};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("input path not found: {0}")]
    InputPath(String),
}

#[derive(Debug, Clone, Copy)]
pub struct LinkOptions {
    /// Pass 3: synthesize stubs for unresolved imports. When disabled,
    /// unresolved imports become parse errors instead.
    pub stub_missing: bool,
    pub exclude_tests: bool,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            stub_missing: true,
            exclude_tests: true,
        }
    }
}

#[derive(Debug)]
pub struct LinkedFile {
    pub path: PathBuf,
    pub module_path: String,
    /// Entity 0 is the file-level module; declared entities follow.
    pub contracts: Vec<ContractInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StubReport {
    pub total_stubs: usize,
    pub total_resolved: usize,
    pub total_symbols: usize,
    pub stubbed_modules: Vec<String>,
}

#[derive(Debug)]
pub struct LinkOutput {
    pub files: Vec<LinkedFile>,
    pub symbols: SymbolTable,
    pub stub_report: StubReport,
    pub io_errors: Vec<String>,
    pub warnings: Vec<String>,
    pub stubbing_enabled: bool,
}

impl LinkOutput {
    pub fn total_files(&self) -> usize {
        self.files.len()
    }

    /// Every parsed entity, file-level modules included.
    pub fn all_contracts(&self) -> impl Iterator<Item = &ContractInfo> {
        self.files.iter().flat_map(|f| f.contracts.iter())
    }

    /// Entities worth reporting: declared entities always, the file-level
    /// module only when it carries declarations of its own or stands alone.
    pub fn contracts(&self) -> impl Iterator<Item = &ContractInfo> {
        self.files.iter().flat_map(|f| {
            f.contracts.iter().enumerate().filter_map(|(i, c)| {
                if i == 0 && f.contracts.len() > 1 && c.is_empty_shell() {
                    None
                } else {
                    Some(c)
                }
            })
        })
    }

    pub fn contract_by_name(&self, name: &str) -> Option<&ContractInfo> {
        self.all_contracts().find(|c| c.name == name)
    }

    pub fn has_unresolved_imports(&self) -> bool {
        self.all_contracts()
            .flat_map(|c| c.imports.iter())
            .any(|i| !i.resolved && !i.stub_created)
    }
}

/// Three-pass linker over a set of source roots, GOT/PLT style: collect
/// every symbol, resolve imports against the frozen table, then stub what
/// the roots cannot provide.
#[derive(Debug, Default)]
pub struct LinkPipeline {
    options: LinkOptions,
}

impl LinkPipeline {
    pub fn new(options: LinkOptions) -> Self {
        Self { options }
    }

    pub fn run(&self, roots: &[PathBuf]) -> Result<LinkOutput> {
        for root in roots {
            if !root.exists() {
                return Err(LinkError::InputPath(root.display().to_string()).into());
            }
        }

        let scan = scan_roots(roots, self.options.exclude_tests);
        let warnings = scan.warnings;
        let mut io_errors = Vec::new();

        let mut files: Vec<LinkedFile> = Vec::new();
        for ScannedFile { path, module_path } in scan.files {
            match fs::read_to_string(&path) {
                Ok(source) => {
                    let contracts = parse_source(&source, &path, &module_path);
                    files.push(LinkedFile {
                        path,
                        module_path,
                        contracts,
                    });
                }
                Err(err) => {
                    log::warn!("skipping unreadable file {}: {err}", path.display());
                    io_errors.push(format!("{}: {err}", path.display()));
                }
            }
        }

        // Pass 1: single writer populates the table, then it freezes.
        let mut builder = SymbolTableBuilder::new();
        let mut duplicate_notes: Vec<(usize, usize, String)> = Vec::new();
        for (fi, file) in files.iter().enumerate() {
            for (ci, contract) in file.contracts.iter().enumerate() {
                if contract.module_path.is_empty() {
                    continue;
                }
                let id = SymbolId {
                    file: fi,
                    entity: ci,
                };
                if let InsertOutcome::Duplicate(existing) =
                    builder.insert(contract.module_path.clone(), id)
                {
                    duplicate_notes.push((
                        fi,
                        ci,
                        format!(
                            "duplicate symbol '{}' already defined in {}",
                            contract.module_path,
                            files[existing.file].path.display()
                        ),
                    ));
                }
            }
        }
        for (fi, ci, note) in duplicate_notes {
            files[fi].contracts[ci].parse_warnings.push(note);
        }
        let symbols = builder.freeze();
        log::debug!(
            "pass 1/3: {} files parsed, {} symbols registered",
            files.len(),
            symbols.len()
        );

        // Pass 2: resolution reads the frozen table only.
        let mut resolved_paths: BTreeSet<String> = BTreeSet::new();
        let mut unresolved_count = 0usize;
        for file in &mut files {
            for contract in &mut file.contracts {
                let (resolved, unresolved) = link_contract(contract, &symbols);
                resolved_paths.extend(resolved);
                unresolved_count += unresolved.len();
            }
        }
        log::debug!(
            "pass 2/3: {} module paths resolved, {} imports unresolved",
            resolved_paths.len(),
            unresolved_count
        );

        // Pass 3: stub the outside world, or fail the imports that need it.
        let mut stubbed: BTreeSet<String> = BTreeSet::new();
        if self.options.stub_missing {
            for file in &mut files {
                for contract in &mut file.contracts {
                    stubbed.extend(synthesize_stubs(contract));
                }
            }
            log::debug!("pass 3/3: {} external modules stubbed", stubbed.len());
        } else {
            for file in &mut files {
                for contract in &mut file.contracts {
                    let errors: Vec<Diagnostic> = contract
                        .imports
                        .iter()
                        .filter(|i| !i.resolved)
                        .map(|i| {
                            Diagnostic::new(
                                DiagnosticKind::UnresolvedImport,
                                format!("unresolved import '{}'", i.module_path),
                                i.line,
                            )
                        })
                        .collect();
                    contract.parse_errors.extend(errors);
                }
            }
        }

        let stub_report = StubReport {
            total_stubs: stubbed.len(),
            total_resolved: resolved_paths.len(),
            total_symbols: symbols.len(),
            stubbed_modules: stubbed.into_iter().collect(),
        };

        Ok(LinkOutput {
            files,
            symbols,
            stub_report,
            io_errors,
            warnings,
            stubbing_enabled: self.options.stub_missing,
        })
    }
}
