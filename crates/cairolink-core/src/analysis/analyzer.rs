use crate::analysis::cfg::{Cfg, CfgBuilder, PathEnumeration};
use crate::analysis::dataflow::{AnalysisWarning, DataflowAnalyzer, DataflowResult};
use crate::analysis::statements::StatementParser;
use crate::contract::ContractInfo;
use crate::function::FunctionInfo;
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy)]
pub struct AnalyzeOptions {
    /// Cap on CFG path enumeration; exceeding it sets `truncated`.
    pub max_paths: usize,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self { max_paths: 100 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionAnalysis {
    pub function_name: String,
    pub has_body: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cfg: Option<Cfg>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataflow: Option<DataflowResult>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<AnalysisWarning>,
    #[serde(skip)]
    pub paths: Option<PathEnumeration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContractAnalysis {
    pub contract: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub functions: Vec<FunctionAnalysis>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisSummary {
    pub total_contracts: usize,
    pub total_functions: usize,
    pub functions_with_body: usize,
    pub functions_without_body: usize,
    pub total_warnings: usize,
    pub total_storage_reads: usize,
    pub total_storage_writes: usize,
    pub total_external_calls: usize,
}

/// Per-function orchestration: statements → CFG → dataflow. Stub entities
/// are skipped entirely; functions without a body are reported but not
/// analyzed.
#[derive(Debug, Default)]
pub struct ContractAnalyzer {
    parser: StatementParser,
    options: AnalyzeOptions,
}

impl ContractAnalyzer {
    pub fn new(options: AnalyzeOptions) -> Self {
        Self {
            parser: StatementParser::new(),
            options,
        }
    }

    pub fn analyze_contracts<'a, I>(&self, contracts: I) -> Vec<ContractAnalysis>
    where
        I: IntoIterator<Item = &'a ContractInfo>,
    {
        contracts
            .into_iter()
            .filter(|c| !c.is_stub())
            .map(|c| self.analyze_contract(c))
            .collect()
    }

    pub fn analyze_contract(&self, contract: &ContractInfo) -> ContractAnalysis {
        let imported = contract.imported_symbols();
        ContractAnalysis {
            contract: contract.name.clone(),
            file_path: contract.file_path.clone(),
            functions: contract
                .functions
                .iter()
                .map(|f| self.analyze_function(f, &imported))
                .collect(),
        }
    }

    pub fn analyze_function(
        &self,
        function: &FunctionInfo,
        imported: &BTreeSet<String>,
    ) -> FunctionAnalysis {
        let Some(body) = function.body.as_ref() else {
            return FunctionAnalysis {
                function_name: function.name.clone(),
                has_body: false,
                cfg: None,
                dataflow: None,
                warnings: Vec::new(),
                paths: None,
            };
        };

        let statements = self.parser.parse(&body.text, body.start_line);
        let cfg = CfgBuilder::build(&function.name, &statements);
        let paths = cfg.enumerate_paths(self.options.max_paths);

        let parameters: BTreeSet<String> = function
            .parameter_names()
            .map(|s| s.to_string())
            .collect();
        let analyzer = DataflowAnalyzer::new(&cfg, parameters, imported.clone());
        let (dataflow, warnings) = analyzer.analyze();

        FunctionAnalysis {
            function_name: function.name.clone(),
            has_body: true,
            cfg: Some(cfg),
            dataflow: Some(dataflow),
            warnings,
            paths: Some(paths),
        }
    }
}

pub fn summarize(results: &[ContractAnalysis]) -> AnalysisSummary {
    let mut summary = AnalysisSummary {
        total_contracts: results.len(),
        ..Default::default()
    };
    for contract in results {
        for function in &contract.functions {
            summary.total_functions += 1;
            if function.has_body {
                summary.functions_with_body += 1;
            } else {
                summary.functions_without_body += 1;
            }
            summary.total_warnings += function.warnings.len();
            if let Some(dataflow) = &function.dataflow {
                for access in &dataflow.storage_accesses {
                    match access.access_type {
                        crate::analysis::dataflow::AccessType::Read => {
                            summary.total_storage_reads += 1
                        }
                        crate::analysis::dataflow::AccessType::Write => {
                            summary.total_storage_writes += 1
                        }
                    }
                }
                summary.total_external_calls += dataflow
                    .external_calls
                    .iter()
                    .filter(|c| !c.internal)
                    .count();
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::EntityKind;
    use crate::function::FunctionBody;

    fn function_with_body(name: &str, body: &str) -> FunctionInfo {
        let mut func = FunctionInfo::new(name, 1);
        func.body = Some(FunctionBody {
            text: body.to_string(),
            start_line: 1,
            end_line: body.lines().count(),
        });
        func
    }

    #[test]
    fn bodyless_functions_are_reported_but_not_analyzed() {
        let analyzer = ContractAnalyzer::default();
        let func = FunctionInfo::new("declared_only", 4);
        let analysis = analyzer.analyze_function(&func, &BTreeSet::new());
        assert!(!analysis.has_body);
        assert!(analysis.cfg.is_none());
        assert!(analysis.dataflow.is_none());
    }

    #[test]
    fn stub_contracts_are_skipped() {
        let analyzer = ContractAnalyzer::default();
        let mut stub = ContractInfo::new("array", EntityKind::Stub, "core::array");
        stub.functions.push(FunctionInfo::stub("append"));
        let real = ContractInfo::new("Vault", EntityKind::Contract, "vault::Vault");

        let results = analyzer.analyze_contracts([&stub, &real]);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].contract, "Vault");
    }

    #[test]
    fn summary_counts_storage_traffic() {
        let analyzer = ContractAnalyzer::default();
        let mut contract = ContractInfo::new("Counter", EntityKind::Contract, "counter::Counter");
        contract.functions.push(function_with_body(
            "bump",
            "fn bump() {\n    let v = self.storage.count.read();\n    self.storage.count.write(v + 1);\n}",
        ));

        let results = analyzer.analyze_contracts([&contract]);
        let summary = summarize(&results);
        assert_eq!(summary.total_functions, 1);
        assert_eq!(summary.functions_with_body, 1);
        assert_eq!(summary.total_storage_reads, 1);
        assert_eq!(summary.total_storage_writes, 1);
        assert_eq!(summary.total_warnings, 0);
    }

    #[test]
    fn path_enumeration_respects_the_cap() {
        let analyzer = ContractAnalyzer::new(AnalyzeOptions { max_paths: 2 });
        let body = "fn f(a: bool, b: bool) {\n    if a {\n        let x = 1;\n    }\n    if b {\n        let y = 2;\n    }\n    return;\n}";
        let func = function_with_body("f", body);
        let analysis = analyzer.analyze_function(&func, &BTreeSet::new());
        let paths = analysis.paths.unwrap();
        assert_eq!(paths.paths.len(), 2);
        assert!(paths.truncated);
    }
}
