use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    External,
    View,
    Internal,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::External => "external",
            Visibility::View => "view",
            Visibility::Internal => "internal",
        }
    }
}

/// A name/type pair. Return slots and event fields reuse the shape with an
/// empty name when no binding exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }

    /// Fallback for pieces that failed to split on `:`.
    pub fn unnamed(ty: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            ty: ty.into(),
        }
    }
}

/// Raw body text captured by brace matching, anchored at the line holding
/// the opening brace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionBody {
    pub text: String,
    pub start_line: usize,
    pub end_line: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionInfo {
    pub name: String,
    pub visibility: Visibility,
    pub parameters: Vec<Param>,
    pub returns: Vec<Param>,
    pub decorators: Vec<String>,
    pub line: usize,
    pub is_stub: bool,
    pub body: Option<FunctionBody>,
}

impl FunctionInfo {
    pub fn new(name: impl Into<String>, line: usize) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Internal,
            parameters: Vec::new(),
            returns: Vec::new(),
            decorators: Vec::new(),
            line,
            is_stub: false,
            body: None,
        }
    }

    /// Placeholder function inside a synthesized stub module.
    pub fn stub(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::External,
            parameters: Vec::new(),
            returns: Vec::new(),
            decorators: vec!["stub".to_string()],
            line: 0,
            is_stub: true,
            body: None,
        }
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .iter()
            .filter(|p| !p.name.is_empty())
            .map(|p| p.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_functions_are_external() {
        let func = FunctionInfo::stub("transfer");
        assert!(func.is_stub);
        assert_eq!(func.visibility, Visibility::External);
        assert!(!func.has_body());
        assert_eq!(func.decorators, vec!["stub"]);
    }

    #[test]
    fn parameter_names_skip_unnamed_slots() {
        let mut func = FunctionInfo::new("f", 1);
        func.parameters.push(Param::new("amount", "u256"));
        func.parameters.push(Param::unnamed("felt252"));
        let names: Vec<_> = func.parameter_names().collect();
        assert_eq!(names, vec!["amount"]);
    }
}
