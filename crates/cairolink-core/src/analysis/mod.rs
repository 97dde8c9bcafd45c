/*! Statement classification, control flow, and dataflow.
 *
 * Finding issues in contract code requires knowing which paths are reachable and how values flow
 * along them. These passes turn raw body text into a flat statement list, fold it into a CFG with
 * dominators and path enumeration, and run the classical dataflow analyses on top.
 */

pub mod analyzer;
pub mod cfg;
pub mod dataflow;
pub mod statements;

pub use analyzer::{summarize, AnalysisSummary, AnalyzeOptions, ContractAnalyzer};
pub use cfg::{Cfg, CfgBuilder, CfgNode, NodeId, NodeKind, PathEnumeration};
pub use dataflow::{DataflowAnalyzer, DataflowResult};
pub use statements::{Statement, StatementKind, StatementParser};
