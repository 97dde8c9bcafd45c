use cairolink_core::{ContractInfo, EntityKind, FunctionInfo};

/// Pass 3: materialize placeholder modules for a contract's unresolved
/// imports so downstream consumers see a uniform shape.
///
/// One stub per module path; duplicate imports of the same module within a
/// contract share the entry. Each imported symbol becomes a bodyless
/// external function on the stub. Returns the module paths newly stubbed
/// for this contract.
pub fn synthesize_stubs(contract: &mut ContractInfo) -> Vec<String> {
    let mut created = Vec::new();

    for idx in 0..contract.imports.len() {
        if contract.imports[idx].resolved {
            continue;
        }
        let key = contract.imports[idx].lookup_path().to_string();
        let symbols = contract.imports[idx].symbols.clone();
        contract.imports[idx].stub_created = true;

        for symbol in &symbols {
            if symbol.chars().next().map(char::is_uppercase).unwrap_or(false) {
                contract.unresolved_types.insert(symbol.clone());
            } else {
                contract.unresolved_calls.insert(symbol.clone());
            }
        }

        match contract.stub_modules.get_mut(&key) {
            Some(stub) => {
                for symbol in symbols {
                    if !stub.functions.iter().any(|f| f.name == symbol) {
                        stub.functions.push(FunctionInfo::stub(symbol));
                    }
                }
            }
            None => {
                contract.stub_modules.insert(key.clone(), build_stub(&key, symbols));
                created.push(key);
            }
        }
    }

    created
}

fn build_stub(module_path: &str, symbols: Vec<String>) -> ContractInfo {
    let name = module_path.rsplit("::").next().unwrap_or(module_path);
    let mut stub = ContractInfo::new(name, EntityKind::Stub, module_path);
    for symbol in symbols {
        stub.functions.push(FunctionInfo::stub(symbol));
    }
    stub.parse_warnings
        .push(format!("stub created for missing module: {module_path}"));
    stub
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairolink_core::ImportInfo;

    #[test]
    fn unresolved_import_gets_a_stub() {
        let mut contract = ContractInfo::new("M", EntityKind::Module, "m");
        contract.imports.push(ImportInfo::new(
            "core::array",
            vec!["ArrayTrait".to_string()],
            1,
        ));

        let created = synthesize_stubs(&mut contract);
        assert_eq!(created, vec!["core::array"]);
        assert!(contract.imports[0].stub_created);
        assert!(!contract.imports[0].resolved);

        let stub = &contract.stub_modules["core::array"];
        assert_eq!(stub.kind, EntityKind::Stub);
        assert_eq!(stub.name, "array");
        assert!(stub.file_path.is_none());
        assert_eq!(stub.functions.len(), 1);
        assert!(stub.functions[0].is_stub);
        assert!(contract.unresolved_types.contains("ArrayTrait"));
    }

    #[test]
    fn duplicate_imports_share_one_stub() {
        let mut contract = ContractInfo::new("M", EntityKind::Module, "m");
        contract.imports.push(ImportInfo::new(
            "core::array",
            vec!["ArrayTrait".to_string()],
            1,
        ));
        contract.imports.push(ImportInfo::new(
            "core::array",
            vec!["SpanTrait".to_string()],
            2,
        ));

        let created = synthesize_stubs(&mut contract);
        assert_eq!(created.len(), 1);
        assert_eq!(contract.stub_modules.len(), 1);
        let stub = &contract.stub_modules["core::array"];
        let names: Vec<&str> = stub.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["ArrayTrait", "SpanTrait"]);
    }

    #[test]
    fn resolved_imports_are_left_alone() {
        let mut contract = ContractInfo::new("M", EntityKind::Module, "m");
        let mut imp = ImportInfo::new("a::foo", vec![], 1);
        imp.resolved = true;
        contract.imports.push(imp);

        let created = synthesize_stubs(&mut contract);
        assert!(created.is_empty());
        assert!(contract.stub_modules.is_empty());
        assert!(!contract.imports[0].stub_created);
    }
}
