use crate::analysis::cfg::{Cfg, NodeId};
use crate::analysis::statements::StatementKind;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Read,
    Write,
}

#[derive(Debug, Clone, Serialize)]
pub struct StorageAccess {
    pub access_type: AccessType,
    pub storage_var: String,
    pub line: usize,
    pub node_id: NodeId,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExternalCall {
    pub function_name: String,
    pub arguments: Vec<String>,
    pub line: usize,
    pub node_id: NodeId,
    pub internal: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DefUseChain {
    pub variable: String,
    pub definitions: Vec<NodeId>,
    pub uses: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    UninitializedUse,
    UnusedDefinition,
    UnreachableCode,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisWarning {
    pub kind: WarningKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataflowResult {
    pub def_use_chains: Vec<DefUseChain>,
    pub storage_accesses: Vec<StorageAccess>,
    pub external_calls: Vec<ExternalCall>,
}

/// Classical dataflow over a function CFG: reaching definitions feed the
/// def-use chains, a must-defined intersection analysis drives the
/// uninitialized-use warnings, and a downstream liveness walk finds dead
/// definitions.
pub struct DataflowAnalyzer<'a> {
    cfg: &'a Cfg,
    parameters: BTreeSet<String>,
    imported_symbols: BTreeSet<String>,
}

impl<'a> DataflowAnalyzer<'a> {
    pub fn new(
        cfg: &'a Cfg,
        parameters: BTreeSet<String>,
        imported_symbols: BTreeSet<String>,
    ) -> Self {
        Self {
            cfg,
            parameters,
            imported_symbols,
        }
    }

    pub fn analyze(&self) -> (DataflowResult, Vec<AnalysisWarning>) {
        let result = DataflowResult {
            def_use_chains: self.def_use_chains(),
            storage_accesses: self.storage_accesses(),
            external_calls: self.external_calls(),
        };
        let mut warnings = self.uninitialized_uses();
        warnings.extend(self.unused_definitions());
        warnings.extend(self.unreachable_code());
        (result, warnings)
    }

    fn defined_at(&self, id: NodeId) -> Option<&str> {
        self.cfg
            .node(id)
            .statement
            .as_ref()
            .and_then(|s| s.defined.as_deref())
    }

    fn used_at(&self, id: NodeId) -> &[String] {
        self.cfg
            .node(id)
            .statement
            .as_ref()
            .map(|s| s.used.as_slice())
            .unwrap_or(&[])
    }

    /// Forward may-analysis: `OUT(n) = GEN(n) ∪ (IN(n) − KILL(n))`,
    /// `IN(n) = ⋃ OUT(p)`. Returns the IN sets as (variable, defining node).
    pub fn reaching_definitions(&self) -> HashMap<NodeId, HashSet<(String, NodeId)>> {
        let ids: Vec<NodeId> = self.cfg.nodes.iter().map(|n| n.id).collect();
        let mut reaching_in: HashMap<NodeId, HashSet<(String, NodeId)>> = HashMap::new();
        let mut reaching_out: HashMap<NodeId, HashSet<(String, NodeId)>> = HashMap::new();
        for &id in &ids {
            reaching_in.insert(id, HashSet::new());
            reaching_out.insert(id, HashSet::new());
        }

        let mut changed = true;
        while changed {
            changed = false;
            for &id in &ids {
                let mut new_in = HashSet::new();
                for &pred in self.cfg.predecessors(id) {
                    new_in.extend(reaching_out[&pred].iter().cloned());
                }

                let mut new_out = new_in.clone();
                if let Some(var) = self.defined_at(id) {
                    new_out.retain(|(v, d)| v != var || *d == id);
                    new_out.insert((var.to_string(), id));
                }

                if new_in != reaching_in[&id] {
                    reaching_in.insert(id, new_in);
                    changed = true;
                }
                if new_out != reaching_out[&id] {
                    reaching_out.insert(id, new_out);
                    changed = true;
                }
            }
        }

        reaching_in
    }

    /// Def-use chains for every variable defined in the function. A use is
    /// counted only when at least one definition reaches it.
    pub fn def_use_chains(&self) -> Vec<DefUseChain> {
        let reaching = self.reaching_definitions();

        let mut defs: HashMap<&str, Vec<NodeId>> = HashMap::new();
        for node in &self.cfg.nodes {
            if let Some(var) = self.defined_at(node.id) {
                defs.entry(var).or_default().push(node.id);
            }
        }

        let mut variables: Vec<&str> = defs.keys().copied().collect();
        variables.sort_unstable();

        variables
            .into_iter()
            .map(|var| {
                let mut uses = Vec::new();
                for node in &self.cfg.nodes {
                    if self.used_at(node.id).iter().any(|u| u == var)
                        && reaching[&node.id].iter().any(|(v, _)| v == var)
                    {
                        uses.push(node.id);
                    }
                }
                DefUseChain {
                    variable: var.to_string(),
                    definitions: defs[var].clone(),
                    uses,
                }
            })
            .collect()
    }

    pub fn storage_accesses(&self) -> Vec<StorageAccess> {
        let mut accesses = Vec::new();
        for node in &self.cfg.nodes {
            let Some(stmt) = node.statement.as_ref() else {
                continue;
            };
            let Some(var) = stmt.storage_var.as_ref() else {
                continue;
            };
            let access_type = match stmt.kind {
                StatementKind::StorageRead => AccessType::Read,
                StatementKind::StorageWrite => AccessType::Write,
                _ => continue,
            };
            accesses.push(StorageAccess {
                access_type,
                storage_var: var.clone(),
                line: stmt.line,
                node_id: node.id,
            });
        }
        accesses
    }

    /// Every call statement is recorded; a call is external when its callee
    /// qualifies an imported or stubbed symbol, or when it goes through a
    /// dispatcher object. Everything else is flagged `internal`.
    pub fn external_calls(&self) -> Vec<ExternalCall> {
        let mut calls = Vec::new();
        for node in &self.cfg.nodes {
            let Some(stmt) = node.statement.as_ref() else {
                continue;
            };
            if stmt.kind != StatementKind::Call {
                continue;
            }
            let Some(callee) = stmt.callee.as_ref() else {
                continue;
            };

            let qualifier_root = stmt
                .qualifier
                .as_deref()
                .and_then(|q| q.split("::").next())
                .map(|q| q.split('.').next().unwrap_or(q));
            let via_import = qualifier_root
                .map(|q| self.imported_symbols.contains(q))
                .unwrap_or(false)
                || self.imported_symbols.contains(callee.as_str());
            let via_dispatcher = stmt.raw_text.to_lowercase().contains("dispatcher");

            calls.push(ExternalCall {
                function_name: callee.clone(),
                arguments: stmt.arguments.clone(),
                line: stmt.line,
                node_id: node.id,
                internal: !(via_import || via_dispatcher),
            });
        }
        calls
    }

    /// Forward must-analysis over the reachable subgraph: a variable is
    /// definitely initialized at N only if every path from entry defines it
    /// first. Parameters seed the entry set.
    fn must_defined(&self) -> HashMap<NodeId, BTreeSet<String>> {
        let mut universe: BTreeSet<String> = self.parameters.clone();
        for node in &self.cfg.nodes {
            if let Some(var) = self.defined_at(node.id) {
                universe.insert(var.to_string());
            }
        }

        let reachable = self.cfg.reachable();
        let mut defined_in: HashMap<NodeId, BTreeSet<String>> = HashMap::new();
        let mut defined_out: HashMap<NodeId, BTreeSet<String>> = HashMap::new();
        for node in &self.cfg.nodes {
            defined_in.insert(node.id, universe.clone());
            defined_out.insert(node.id, universe.clone());
        }
        defined_in.insert(self.cfg.entry_node, self.parameters.clone());
        defined_out.insert(self.cfg.entry_node, self.parameters.clone());

        let mut changed = true;
        while changed {
            changed = false;
            for node in &self.cfg.nodes {
                if node.id == self.cfg.entry_node || !reachable.contains(&node.id) {
                    continue;
                }
                let mut new_in: Option<BTreeSet<String>> = None;
                for &pred in self.cfg.predecessors(node.id) {
                    if !reachable.contains(&pred) {
                        continue;
                    }
                    let pred_out = &defined_out[&pred];
                    new_in = Some(match new_in {
                        None => pred_out.clone(),
                        Some(acc) => acc.intersection(pred_out).cloned().collect(),
                    });
                }
                let new_in = new_in.unwrap_or_else(|| self.parameters.clone());

                let mut new_out = new_in.clone();
                if let Some(var) = self.defined_at(node.id) {
                    new_out.insert(var.to_string());
                }

                if new_in != defined_in[&node.id] {
                    defined_in.insert(node.id, new_in);
                    changed = true;
                }
                if new_out != defined_out[&node.id] {
                    defined_out.insert(node.id, new_out);
                    changed = true;
                }
            }
        }

        defined_in
    }

    pub fn uninitialized_uses(&self) -> Vec<AnalysisWarning> {
        let defined_in = self.must_defined();
        let reachable = self.cfg.reachable();
        let mut warnings = Vec::new();

        for node in &self.cfg.nodes {
            if !reachable.contains(&node.id) {
                continue;
            }
            let Some(stmt) = node.statement.as_ref() else {
                continue;
            };
            for var in &stmt.used {
                if self.parameters.contains(var) {
                    continue;
                }
                if !defined_in[&node.id].contains(var) {
                    warnings.push(AnalysisWarning {
                        kind: WarningKind::UninitializedUse,
                        variable: Some(var.clone()),
                        line: stmt.line,
                        message: format!("variable '{var}' may be used before initialization"),
                    });
                }
            }
        }

        warnings
    }

    pub fn unused_definitions(&self) -> Vec<AnalysisWarning> {
        let mut warnings = Vec::new();

        for node in &self.cfg.nodes {
            let Some(var) = self.defined_at(node.id) else {
                continue;
            };
            if var.starts_with('_') || self.parameters.contains(var) {
                continue;
            }
            if !self.def_has_live_use(node.id, var) {
                let line = node.statement.as_ref().map(|s| s.line).unwrap_or(0);
                warnings.push(AnalysisWarning {
                    kind: WarningKind::UnusedDefinition,
                    variable: Some(var.to_string()),
                    line,
                    message: format!("variable '{var}' is defined but never used"),
                });
            }
        }

        warnings
    }

    /// Walk forward from a definition; a use before any redefinition keeps
    /// it alive, a redefinition kills the path.
    fn def_has_live_use(&self, def_node: NodeId, var: &str) -> bool {
        let mut queue: VecDeque<NodeId> = self.cfg.successors(def_node).iter().copied().collect();
        let mut visited: HashSet<NodeId> = HashSet::new();

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            if self.used_at(id).iter().any(|u| u == var) {
                return true;
            }
            if self.defined_at(id) == Some(var) {
                continue;
            }
            for &succ in self.cfg.successors(id) {
                queue.push_back(succ);
            }
        }
        false
    }

    pub fn unreachable_code(&self) -> Vec<AnalysisWarning> {
        let reachable = self.cfg.reachable();
        let mut warnings = Vec::new();
        for node in &self.cfg.nodes {
            if reachable.contains(&node.id) {
                continue;
            }
            if let Some(stmt) = node.statement.as_ref() {
                warnings.push(AnalysisWarning {
                    kind: WarningKind::UnreachableCode,
                    variable: None,
                    line: stmt.line,
                    message: format!("statement at line {} is unreachable", stmt.line),
                });
            }
        }
        warnings.sort_by_key(|w| w.line);
        warnings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::cfg::CfgBuilder;
    use crate::analysis::statements::StatementParser;

    fn analyze_body(
        body: &str,
        params: &[&str],
        imports: &[&str],
    ) -> (DataflowResult, Vec<AnalysisWarning>) {
        let statements = StatementParser::new().parse(body, 1);
        let cfg = CfgBuilder::build("test", &statements);
        let analyzer = DataflowAnalyzer::new(
            &cfg,
            params.iter().map(|s| s.to_string()).collect(),
            imports.iter().map(|s| s.to_string()).collect(),
        );
        analyzer.analyze()
    }

    #[test]
    fn storage_read_then_write_is_tracked_in_order() {
        let body = "fn g() {\n    let v = self.storage.balance.read();\n    self.storage.balance.write(v + 1);\n}";
        let (result, warnings) = analyze_body(body, &[], &[]);

        assert_eq!(result.storage_accesses.len(), 2);
        assert_eq!(result.storage_accesses[0].access_type, AccessType::Read);
        assert_eq!(result.storage_accesses[0].storage_var, "balance");
        assert_eq!(result.storage_accesses[1].access_type, AccessType::Write);
        assert_eq!(result.storage_accesses[1].storage_var, "balance");

        let chain = result
            .def_use_chains
            .iter()
            .find(|c| c.variable == "v")
            .unwrap();
        assert_eq!(chain.definitions.len(), 1);
        assert_eq!(chain.uses.len(), 1);
        assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    }

    #[test]
    fn partial_initialization_warns_on_merge_path() {
        // The path where cond is false reaches the return with no
        // definition of x.
        let body = "fn h(cond: bool) {\n    let x;\n    if cond {\n        x = 1;\n    }\n    return x;\n}";
        let (_, warnings) = analyze_body(body, &["cond"], &[]);

        let uninit: Vec<_> = warnings
            .iter()
            .filter(|w| w.kind == WarningKind::UninitializedUse)
            .collect();
        assert_eq!(uninit.len(), 1);
        assert_eq!(uninit[0].variable.as_deref(), Some("x"));
        assert_eq!(uninit[0].line, 6);
    }

    #[test]
    fn both_arms_defined_means_no_warning() {
        let body = "fn h(cond: bool) {\n    if cond {\n        x = 1;\n    } else {\n        x = 2;\n    }\n    return x;\n}";
        let (_, warnings) = analyze_body(body, &["cond"], &[]);
        assert!(warnings
            .iter()
            .all(|w| w.kind != WarningKind::UninitializedUse));
    }

    #[test]
    fn parameters_are_never_uninitialized() {
        let body = "fn f(amount: u256) {\n    return amount;\n}";
        let (_, warnings) = analyze_body(body, &["amount"], &[]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn unused_definition_is_flagged() {
        let body = "fn f() {\n    let waste = 1;\n    return;\n}";
        let (_, warnings) = analyze_body(body, &[], &[]);
        let unused: Vec<_> = warnings
            .iter()
            .filter(|w| w.kind == WarningKind::UnusedDefinition)
            .collect();
        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].variable.as_deref(), Some("waste"));
    }

    #[test]
    fn underscore_definitions_are_exempt() {
        let body = "fn f() {\n    let _ignored = probe();\n    return;\n}";
        let (_, warnings) = analyze_body(body, &[], &[]);
        assert!(warnings
            .iter()
            .all(|w| w.kind != WarningKind::UnusedDefinition));
    }

    #[test]
    fn redefinition_kills_the_earlier_def() {
        let body = "fn f() {\n    let x = 1;\n    x = 2;\n    return x;\n}";
        let (result, warnings) = analyze_body(body, &[], &[]);

        let chain = result
            .def_use_chains
            .iter()
            .find(|c| c.variable == "x")
            .unwrap();
        assert_eq!(chain.definitions.len(), 2);
        // The first definition is overwritten before any use.
        let unused: Vec<_> = warnings
            .iter()
            .filter(|w| w.kind == WarningKind::UnusedDefinition)
            .collect();
        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].line, 2);
    }

    #[test]
    fn loop_carried_use_keeps_definition_alive() {
        let body = "fn f() {\n    let i = 0;\n    while go {\n        i = i + 1;\n    }\n    return i;\n}";
        let (_, warnings) = analyze_body(body, &["go"], &[]);
        assert!(warnings
            .iter()
            .all(|w| w.kind != WarningKind::UnusedDefinition));
    }

    #[test]
    fn dispatcher_calls_are_external() {
        let body = "fn f() {\n    dispatcher.transfer(to, amount);\n    helper(x);\n}";
        let (result, _) = analyze_body(body, &["to", "amount", "x"], &[]);

        assert_eq!(result.external_calls.len(), 2);
        let transfer = result
            .external_calls
            .iter()
            .find(|c| c.function_name == "transfer")
            .unwrap();
        assert!(!transfer.internal);
        let helper = result
            .external_calls
            .iter()
            .find(|c| c.function_name == "helper")
            .unwrap();
        assert!(helper.internal);
    }

    #[test]
    fn imported_symbol_qualifier_is_external() {
        let body = "fn f() {\n    ArrayTrait::new();\n}";
        let (result, _) = analyze_body(body, &[], &["ArrayTrait"]);
        assert_eq!(result.external_calls.len(), 1);
        assert!(!result.external_calls[0].internal);
    }

    #[test]
    fn unreachable_statements_are_reported() {
        let body = "fn f() {\n    return;\n    let dead = 1;\n}";
        let (_, warnings) = analyze_body(body, &[], &[]);
        let unreachable: Vec<_> = warnings
            .iter()
            .filter(|w| w.kind == WarningKind::UnreachableCode)
            .collect();
        assert_eq!(unreachable.len(), 1);
        assert_eq!(unreachable[0].line, 3);
    }

    #[test]
    fn every_recorded_use_has_a_reaching_definition() {
        let body = "fn f(seed: u64) {\n    let a = seed;\n    if a {\n        let b = a + 1;\n        return b;\n    }\n    return a;\n}";
        let statements = StatementParser::new().parse(body, 1);
        let cfg = CfgBuilder::build("f", &statements);
        let analyzer =
            DataflowAnalyzer::new(&cfg, ["seed".to_string()].into(), BTreeSet::new());
        let reaching = analyzer.reaching_definitions();

        for chain in analyzer.def_use_chains() {
            for use_node in &chain.uses {
                assert!(
                    reaching[use_node].iter().any(|(v, _)| *v == chain.variable),
                    "use of {} at {} has no reaching definition",
                    chain.variable,
                    use_node
                );
            }
        }
    }
}
