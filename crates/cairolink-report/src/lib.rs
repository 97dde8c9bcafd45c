/*! Serialize linked contracts and analysis results for consumers.
 *
 * The JSON tree is the authoritative shape; YAML is a faithful rendering of the same value, and
 * the text summary is for humans skimming a run. Object keys sort lexicographically and arrays
 * stay in input-file order, so identical inputs produce byte-identical output.
 */

pub mod report;
pub mod summary;

pub use report::{build_report, render_json, render_yaml, OutputFormat};
pub use summary::render_summary;
