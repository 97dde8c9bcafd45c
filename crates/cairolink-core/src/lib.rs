/*! Core model and analysis engine for Cairo contract linking.
 *
 * Auditing a Cairo codebase starts from structure, not semantics: which contracts exist, what
 * they import, which storage they touch. This crate provides the shared contract model that the
 * linker populates, plus the per-function analysis stack (statement classification, control flow
 * graphs, dataflow) that runs on top of it.
 */

pub mod analysis;
pub mod contract;
pub mod function;
pub mod import;

pub use contract::{ContractInfo, Diagnostic, DiagnosticKind, EntityKind, EventInfo, StorageVarInfo};
pub use function::{FunctionBody, FunctionInfo, Param, Visibility};
pub use import::ImportInfo;

pub use analysis::analyzer::{
    summarize, AnalysisSummary, AnalyzeOptions, ContractAnalysis, ContractAnalyzer,
    FunctionAnalysis,
};
pub use analysis::cfg::{Cfg, CfgBuilder, CfgNode, NodeId, NodeKind, PathEnumeration};
pub use analysis::dataflow::{
    AccessType, AnalysisWarning, DataflowAnalyzer, DataflowResult, DefUseChain, ExternalCall,
    StorageAccess, WarningKind,
};
pub use analysis::statements::{Statement, StatementKind, StatementParser};
