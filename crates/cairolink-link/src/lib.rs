/*! Turn Cairo source trees into a linked contract model.
 *
 * The front-end never calls the Cairo compiler. A lexical parser recovers declared structure
 * file by file, then three linker-style passes stitch the files together: build the global
 * symbol table, resolve imports against it, and synthesize stubs for whatever lives outside
 * the scanned roots. The output feeds the analysis engine and the reporters unchanged.
 */

pub mod lexer;
pub mod linker;
pub mod pipeline;
pub mod scanner;
pub mod stubs;
pub mod symbols;

pub use lexer::parse_source;
pub use linker::resolve_import;
pub use pipeline::{LinkError, LinkOptions, LinkOutput, LinkPipeline, LinkedFile, StubReport};
pub use scanner::{scan_roots, ScanResult, ScannedFile};
pub use stubs::synthesize_stubs;
pub use symbols::{SymbolId, SymbolTable, SymbolTableBuilder};
