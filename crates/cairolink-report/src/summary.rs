use cairolink_core::{summarize, ContractAnalysis, ContractInfo};
use cairolink_link::LinkOutput;
use std::fmt::Write;

/// Human-readable run summary: one section per contract, optional stub
/// report and analysis warnings.
pub fn render_summary(
    output: &LinkOutput,
    analyses: Option<&[ContractAnalysis]>,
    include_stub_report: bool,
    show_warnings: bool,
) -> String {
    let mut out = String::new();
    let contracts: Vec<&ContractInfo> = output.contracts().collect();

    section(&mut out, "Cairo Linker Results");
    let _ = writeln!(out, "Total Files: {}", output.total_files());
    let _ = writeln!(out, "Total Contracts: {}", contracts.len());

    for contract in &contracts {
        out.push_str(&contract_summary(contract));
    }

    if !output.io_errors.is_empty() {
        section(&mut out, "Read Errors");
        for err in &output.io_errors {
            let _ = writeln!(out, "  ! {err}");
        }
    }

    if include_stub_report {
        section(&mut out, "Stub Report");
        let report = &output.stub_report;
        let _ = writeln!(out, "Total Stubs: {}", report.total_stubs);
        let _ = writeln!(out, "Total Resolved: {}", report.total_resolved);
        let _ = writeln!(out, "Total Symbols: {}", report.total_symbols);
        if !report.stubbed_modules.is_empty() {
            let _ = writeln!(out, "Stubbed Modules:");
            for module in &report.stubbed_modules {
                let _ = writeln!(out, "  - {module}");
            }
        }
    }

    if let Some(analyses) = analyses {
        if show_warnings {
            section(&mut out, "Analysis Warnings");
            let mut any = false;
            for contract in analyses {
                for function in &contract.functions {
                    for warning in &function.warnings {
                        any = true;
                        let _ = writeln!(
                            out,
                            "  {}::{} line {}: {}",
                            contract.contract, function.function_name, warning.line, warning.message
                        );
                    }
                }
            }
            if !any {
                out.push_str("  (none)\n");
            }
        }

        let stats = summarize(analyses);
        section(&mut out, "Analysis Summary");
        let _ = writeln!(
            out,
            "Functions analyzed: {} (no body: {})",
            stats.functions_with_body, stats.functions_without_body
        );
        let _ = writeln!(
            out,
            "Storage reads: {}, writes: {}",
            stats.total_storage_reads, stats.total_storage_writes
        );
        let _ = writeln!(out, "External calls: {}", stats.total_external_calls);
        let _ = writeln!(out, "Warnings: {}", stats.total_warnings);
    }

    out
}

pub fn contract_summary(contract: &ContractInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\n{}: {}",
        contract.kind.as_str().to_uppercase(),
        contract.name
    );
    if let Some(path) = &contract.file_path {
        let _ = writeln!(out, "  File: {path}");
    }

    if !contract.functions.is_empty() {
        let _ = writeln!(out, "  Functions ({}):", contract.functions.len());
        for func in &contract.functions {
            let stub = if func.is_stub { " [STUB]" } else { "" };
            let _ = writeln!(
                out,
                "    - {} ({}){}",
                func.name,
                func.visibility.as_str(),
                stub
            );
        }
    }

    if !contract.storage_vars.is_empty() {
        let _ = writeln!(out, "  Storage Variables ({}):", contract.storage_vars.len());
        for var in &contract.storage_vars {
            let _ = writeln!(out, "    - {}: {}", var.name, var.var_type);
        }
    }

    if !contract.events.is_empty() {
        let _ = writeln!(out, "  Events ({}):", contract.events.len());
        for event in &contract.events {
            let _ = writeln!(out, "    - {}", event.name);
        }
    }

    if !contract.imports.is_empty() {
        let _ = writeln!(out, "  Imports ({}):", contract.imports.len());
        for import in &contract.imports {
            let status = if import.resolved { "ok" } else { "stubbed" };
            let symbols = if import.symbols.is_empty() {
                String::new()
            } else {
                format!(" {{{}}}", import.symbols.join(", "))
            };
            let _ = writeln!(out, "    [{status}] {}{}", import.module_path, symbols);
        }
    }

    if !contract.stub_modules.is_empty() {
        let _ = writeln!(
            out,
            "  Stub Modules Created ({}):",
            contract.stub_modules.len()
        );
        for name in contract.stub_modules.keys() {
            let _ = writeln!(out, "    - {name}");
        }
    }

    for warning in &contract.parse_warnings {
        let _ = writeln!(out, "  warning: {warning}");
    }
    for error in &contract.parse_errors {
        let _ = writeln!(out, "  error (line {}): {}", error.line, error.message);
    }

    out
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out, "\n{}", "=".repeat(60));
    let _ = writeln!(out, "{title}");
    let _ = writeln!(out, "{}", "=".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairolink_link::{LinkOptions, LinkPipeline};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn summary_lists_contracts_and_import_status() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(
            src.join("m.cairo"),
            "use core::array::ArrayTrait;\nmod M {\n    fn f() {}\n}\n",
        )
        .unwrap();

        let output = LinkPipeline::new(LinkOptions::default())
            .run(&[dir.path().to_path_buf()])
            .unwrap();
        let text = render_summary(&output, None, true, false);

        assert!(text.contains("MODULE: M"));
        assert!(text.contains("[stubbed] core::array {ArrayTrait}"));
        assert!(text.contains("Stub Report"));
        assert!(text.contains("- core::array"));
    }
}
