use anyhow::Result;
use cairolink_core::{summarize, ContractAnalysis};
use cairolink_link::LinkOutput;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Summary,
    Json,
    Yaml,
}

/// Assemble the root report object. With the default `serde_json` value
/// representation, object keys come out lexicographically sorted, which is
/// what makes two identical runs byte-identical.
pub fn build_report(output: &LinkOutput, analyses: Option<&[ContractAnalysis]>) -> Result<Value> {
    let mut contract_map = Map::new();
    for contract in output.contracts() {
        // Name collisions across files keep the first occurrence, matching
        // the symbol table's discipline.
        if !contract_map.contains_key(&contract.name) {
            contract_map.insert(contract.name.clone(), serde_json::to_value(contract)?);
        }
    }

    let mut root = Map::new();
    root.insert(
        "metadata".to_string(),
        json!({
            "total_files": output.total_files(),
            "total_contracts": contract_map.len(),
            "stubbing_enabled": output.stubbing_enabled,
        }),
    );
    root.insert("contracts".to_string(), Value::Object(contract_map));
    root.insert(
        "stub_report".to_string(),
        serde_json::to_value(&output.stub_report)?,
    );
    if !output.io_errors.is_empty() {
        root.insert("errors".to_string(), serde_json::to_value(&output.io_errors)?);
    }
    if !output.warnings.is_empty() {
        root.insert("warnings".to_string(), serde_json::to_value(&output.warnings)?);
    }
    if let Some(analyses) = analyses {
        root.insert("analysis".to_string(), serde_json::to_value(analyses)?);
        root.insert(
            "analysis_summary".to_string(),
            serde_json::to_value(summarize(analyses))?,
        );
    }

    Ok(Value::Object(root))
}

pub fn render_json(value: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn render_yaml(value: &Value) -> Result<String> {
    Ok(serde_yaml::to_string(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairolink_link::{LinkOptions, LinkPipeline};
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(
            src.join("token.cairo"),
            "use core::array::ArrayTrait;\n#[starknet::contract]\nmod Token {\n    fn total() -> u256 {\n        let t = self.storage.supply.read();\n        return t;\n    }\n}\n",
        )
        .unwrap();
        dir
    }

    fn link(dir: &TempDir) -> LinkOutput {
        LinkPipeline::new(LinkOptions::default())
            .run(&[dir.path().to_path_buf()])
            .unwrap()
    }

    #[test]
    fn report_carries_metadata_contracts_and_stub_report() {
        let dir = fixture();
        let output = link(&dir);
        let report = build_report(&output, None).unwrap();

        assert_eq!(report["metadata"]["total_files"], 1);
        assert_eq!(report["metadata"]["stubbing_enabled"], true);
        assert!(report["contracts"]["Token"].is_object());
        assert_eq!(report["contracts"]["Token"]["kind"], "contract");
        assert_eq!(report["stub_report"]["total_stubs"], 1);
        assert_eq!(report["stub_report"]["stubbed_modules"][0], "core::array");
    }

    #[test]
    fn identical_runs_render_byte_identical_json() {
        let dir = fixture();
        let first = render_json(&build_report(&link(&dir), None).unwrap()).unwrap();
        let second = render_json(&build_report(&link(&dir), None).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn yaml_is_a_faithful_rendering_of_the_same_value() {
        let dir = fixture();
        let report = build_report(&link(&dir), None).unwrap();
        let yaml = render_yaml(&report).unwrap();
        let reparsed: Value = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(reparsed, report);
    }

    #[test]
    fn analysis_section_appears_only_when_requested() {
        let dir = fixture();
        let output = link(&dir);

        let bare = build_report(&output, None).unwrap();
        assert!(bare.get("analysis").is_none());

        let analyzer = cairolink_core::ContractAnalyzer::default();
        let analyses: Vec<_> = analyzer.analyze_contracts(output.contracts());
        let full = build_report(&output, Some(&analyses)).unwrap();
        assert!(full["analysis"].is_array());
        assert!(full["analysis_summary"]["total_functions"].as_u64().unwrap() >= 1);

        let token = full["analysis"]
            .as_array()
            .unwrap()
            .iter()
            .find(|c| c["contract"] == "Token")
            .unwrap();
        let func = &token["functions"][0];
        assert_eq!(func["function_name"], "total");
        assert_eq!(func["has_body"], true);
        assert!(func["cfg"]["nodes"].is_array());
        assert!(func["cfg"]["edges"].is_array());
        assert!(func["dataflow"]["storage_accesses"].is_array());
    }
}
