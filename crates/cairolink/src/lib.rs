/*! Unified interface for Cairo contract linking and analysis.
 *
 * Single import for everything you need: scanning source roots, linking imports with stub
 * synthesis, running the CFG/dataflow analyses, and rendering reports.
 */

pub use cairolink_core as core;
pub use cairolink_link as link;
pub use cairolink_report as report;

pub use cairolink_core::{
    AnalyzeOptions, Cfg, CfgBuilder, ContractAnalyzer, ContractInfo, DataflowAnalyzer, EntityKind,
    FunctionInfo, ImportInfo, NodeKind, Statement, StatementKind, StatementParser, Visibility,
};

pub use cairolink_link::{LinkOptions, LinkOutput, LinkPipeline, SymbolTable};

pub use cairolink_report::{build_report, render_json, render_summary, render_yaml};
