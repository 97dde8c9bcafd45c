use cairolink_core::{
    ContractInfo, Diagnostic, DiagnosticKind, EntityKind, EventInfo, FunctionBody, FunctionInfo,
    ImportInfo, Param, StorageVarInfo, Visibility,
};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dialect {
    Cairo0,
    Cairo1,
}

lazy_static! {
    static ref MOD_DECL: Regex = Regex::new(r"^(?:pub\s+)?mod\s+(\w+)").unwrap();
    static ref TRAIT_DECL: Regex = Regex::new(r"^(?:pub\s+)?trait\s+(\w+)").unwrap();
    static ref FN_DECL: Regex =
        Regex::new(r"^(?:pub(?:\(crate\))?\s+)?(?:fn|func)\s+(\w+)").unwrap();
    static ref EVENT_DECL: Regex = Regex::new(r"^(?:pub\s+)?(?:enum|struct)\s+(\w+)").unwrap();
    static ref STORAGE_FIELD: Regex = Regex::new(r"^(?:pub\s+)?(\w+)\s*:\s*(.+?),?\s*$").unwrap();
    static ref USE_BRACES: Regex = Regex::new(r"^use\s+([\w:]+)::\{([^}]*)\}\s*;?").unwrap();
    static ref USE_SIMPLE: Regex = Regex::new(r"^use\s+([\w:]+)(?:\s+as\s+\w+)?\s*;?$").unwrap();
    static ref FROM_IMPORT: Regex = Regex::new(r"^from\s+([\w.]+)\s+import\s+(.+)$").unwrap();
}

/// Parse one file's text into its contract entities. The first element is
/// always the file-level module; declared entities follow in source order.
/// The parser is tolerant: malformed constructs record warnings or errors
/// on the owning entity and never abort the file.
pub fn parse_source(source: &str, file_path: &Path, module_path: &str) -> Vec<ContractInfo> {
    let dialect = detect_dialect(source);
    let lines: Vec<&str> = source.lines().collect();

    let file_name = module_path
        .rsplit("::")
        .next()
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| {
            file_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("module")
                .to_string()
        });

    let file_str = file_path.display().to_string();
    let mut contracts = vec![
        ContractInfo::new(file_name, EntityKind::Module, module_path).with_file(file_str.clone())
    ];
    let mut current = 0usize;

    let mut imports: Vec<ImportInfo> = Vec::new();
    let mut pending_decorators: Vec<String> = Vec::new();
    let mut pending_annotation: Option<(EntityKind, usize)> = None;

    let mut i = 0;
    while i < lines.len() {
        let line_no = i + 1;
        let raw = lines[i];
        let stripped = raw.trim();

        if stripped.is_empty() || stripped.starts_with("//") {
            i += 1;
            continue;
        }

        // Attributes either announce an entity, open a storage/event block,
        // or decorate the next function.
        if stripped.starts_with("#[") {
            if stripped.contains("starknet::contract") {
                pending_annotation = Some((EntityKind::Contract, 3));
            } else if stripped.contains("starknet::interface") {
                pending_annotation = Some((EntityKind::Interface, 3));
            } else if stripped.contains("starknet::component") {
                pending_annotation = Some((EntityKind::Component, 3));
            } else if stripped.starts_with("#[storage]") {
                let vars = parse_storage_block(&lines, i);
                contracts[current].storage_vars.extend(vars);
            } else if stripped.starts_with("#[event]") {
                if let Some(event) = parse_event_decl(&lines, i) {
                    contracts[current].events.push(event);
                }
            } else {
                pending_decorators.push(stripped.to_string());
            }
            i += 1;
            continue;
        }

        // Cairo-0 decorators: @external, @view, @storage_var.
        if stripped.starts_with('@') {
            pending_decorators.push(stripped.to_string());
            i += 1;
            continue;
        }

        // An annotation is looking for its mod/trait within the next lines.
        if let Some((kind, remaining)) = pending_annotation.take() {
            let decl = match kind {
                EntityKind::Interface => TRAIT_DECL.captures(stripped),
                _ => MOD_DECL.captures(stripped),
            };
            if let Some(caps) = decl {
                current = push_entity(
                    &mut contracts,
                    &caps[1],
                    kind,
                    module_path,
                    &file_str,
                );
                i += 1;
                continue;
            }
            if remaining > 1 {
                pending_annotation = Some((kind, remaining - 1));
            } else {
                contracts[current].parse_warnings.push(format!(
                    "annotation for {} entity at line {} has no matching declaration",
                    kind.as_str(),
                    line_no
                ));
            }
        }

        if let Some(caps) = FROM_IMPORT.captures(stripped) {
            if dialect == Dialect::Cairo0 {
                imports.push(parse_from_import(&caps, line_no));
                i += 1;
                continue;
            }
        }
        if stripped.starts_with("use ") {
            let code = stripped.split("//").next().unwrap_or(stripped).trim();
            if let Some(import) = parse_use(code, line_no) {
                imports.push(import);
            } else {
                contracts[current]
                    .parse_warnings
                    .push(format!("unrecognized import at line {line_no}"));
            }
            i += 1;
            continue;
        }

        // Bare module/trait declarations at column 0.
        if !raw.starts_with(char::is_whitespace) {
            if let Some(caps) = MOD_DECL.captures(stripped) {
                current = push_entity(
                    &mut contracts,
                    &caps[1],
                    EntityKind::Module,
                    module_path,
                    &file_str,
                );
                i += 1;
                continue;
            }
            if let Some(caps) = TRAIT_DECL.captures(stripped) {
                current = push_entity(
                    &mut contracts,
                    &caps[1],
                    EntityKind::Trait,
                    module_path,
                    &file_str,
                );
                i += 1;
                continue;
            }
        }

        if FN_DECL.is_match(stripped) {
            let next = parse_function(
                &lines,
                i,
                std::mem::take(&mut pending_decorators),
                &mut contracts[current],
            );
            i = next;
            continue;
        }

        // Derive-style attributes on structs and enums are not function
        // decorators; drop whatever accumulated.
        if stripped.starts_with("struct ")
            || stripped.starts_with("enum ")
            || stripped.starts_with("impl ")
        {
            pending_decorators.clear();
        }

        i += 1;
    }

    for contract in &mut contracts {
        contract.imports = imports.clone();
    }

    contracts
}

fn push_entity(
    contracts: &mut Vec<ContractInfo>,
    name: &str,
    kind: EntityKind,
    module_path: &str,
    file_path: &str,
) -> usize {
    let qualified = if module_path.is_empty() {
        name.to_string()
    } else {
        format!("{module_path}::{name}")
    };
    contracts.push(ContractInfo::new(name, kind, qualified).with_file(file_path));
    contracts.len() - 1
}

/// Cairo-0 sources lead with `func`, `felt` and `@`-decorators; Cairo-1 with
/// `fn`, attributes and `use`. Defaults to Cairo-1.
fn detect_dialect(source: &str) -> Dialect {
    const CAIRO1_MARKERS: [&str; 5] = [
        "#[starknet::contract]",
        "#[starknet::interface]",
        "#[storage]",
        "felt252",
        "fn ",
    ];
    const CAIRO0_MARKERS: [&str; 4] = ["@storage_var", "@external", "@view", "func "];

    if CAIRO1_MARKERS.iter().any(|m| source.contains(m)) {
        return Dialect::Cairo1;
    }
    if CAIRO0_MARKERS.iter().any(|m| source.contains(m)) {
        return Dialect::Cairo0;
    }
    Dialect::Cairo1
}

fn parse_use(line: &str, line_no: usize) -> Option<ImportInfo> {
    if let Some(caps) = USE_BRACES.captures(line) {
        let symbols = caps[2]
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        return Some(ImportInfo::new(&caps[1], symbols, line_no));
    }
    if let Some(caps) = USE_SIMPLE.captures(line) {
        let path = caps[1].to_string();
        let parts: Vec<&str> = path.split("::").collect();
        // An uppercase tail is an imported item, not a module segment.
        if parts.len() > 1
            && parts
                .last()
                .and_then(|p| p.chars().next())
                .map(|c| c.is_uppercase())
                .unwrap_or(false)
        {
            let symbols = vec![parts[parts.len() - 1].to_string()];
            let module = parts[..parts.len() - 1].join("::");
            return Some(ImportInfo::new(module, symbols, line_no));
        }
        return Some(ImportInfo::new(path, Vec::new(), line_no));
    }
    None
}

fn parse_from_import(caps: &regex::Captures<'_>, line_no: usize) -> ImportInfo {
    let module = caps[1].replace('.', "::");
    let symbols_str = caps[2].trim();
    let symbols = if symbols_str == "*" {
        Vec::new()
    } else {
        symbols_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    };
    ImportInfo::new(module, symbols, line_no)
}

/// Parse one function starting at `start`. Returns the index of the first
/// line after the function (past the body when one was captured).
fn parse_function(
    lines: &[&str],
    start: usize,
    decorators: Vec<String>,
    owner: &mut ContractInfo,
) -> usize {
    let line_no = start + 1;

    // Fold the signature until its body opens or the declaration ends.
    let mut signature = lines[start].trim().to_string();
    let mut end = start;
    while !signature.contains('{') && !signature.ends_with(';') && end + 1 < lines.len() {
        if end - start >= 20 {
            break;
        }
        end += 1;
        signature.push(' ');
        signature.push_str(lines[end].trim());
    }

    let Some(caps) = FN_DECL.captures(&signature) else {
        return start + 1;
    };
    let mut func = FunctionInfo::new(&caps[1], line_no);

    if let Some(params) = slice_between(&signature, '(', ')') {
        func.parameters = parse_params(params);
    }
    if let Some(arrow) = signature.find("->") {
        let ret = signature[arrow + 2..]
            .split(['{', ';'])
            .next()
            .unwrap_or("")
            .trim();
        func.returns = parse_returns(ret);
    }

    func.visibility = visibility_from(&decorators, &signature);
    func.decorators = decorators;

    if signature.contains('{') {
        let brace_line = (start..=end)
            .find(|&j| lines[j].contains('{'))
            .unwrap_or(end);
        match capture_body(lines, brace_line) {
            Some((text, body_end)) => {
                func.body = Some(FunctionBody {
                    text,
                    start_line: brace_line + 1,
                    end_line: body_end + 1,
                });
                owner.functions.push(func);
                return body_end + 1;
            }
            None => {
                owner.parse_errors.push(Diagnostic::new(
                    DiagnosticKind::UnclosedBody,
                    format!("function '{}' has an unclosed body", caps[1].to_string()),
                    line_no,
                ));
                owner.functions.push(func);
                return end + 1;
            }
        }
    }

    owner.functions.push(func);
    end + 1
}

fn visibility_from(decorators: &[String], signature: &str) -> Visibility {
    for d in decorators {
        if d.starts_with("#[external") || d.starts_with("@external") {
            return Visibility::External;
        }
        if d.starts_with("#[view") || d.starts_with("@view") {
            return Visibility::View;
        }
    }
    if signature.starts_with("pub ") || signature.starts_with("pub(crate)") {
        return Visibility::External;
    }
    Visibility::Internal
}

fn slice_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0;
    for (idx, c) in text[start..].char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some(&text[start + 1..start + idx]);
            }
        }
    }
    None
}

/// Split on top-level commas (respecting `<>`/`()` nesting), then on the
/// first `:`. Pieces that fail to split keep the whole text as the type.
fn parse_params(text: &str) -> Vec<Param> {
    split_nested(text)
        .into_iter()
        .map(|piece| {
            let piece = piece
                .trim()
                .trim_start_matches("ref ")
                .trim_start_matches("mut ")
                .trim();
            match piece.split_once(':') {
                Some((name, ty)) => Param::new(name.trim(), ty.trim()),
                None => Param::unnamed(piece),
            }
        })
        .filter(|p| !p.ty.is_empty() || !p.name.is_empty())
        .collect()
}

fn parse_returns(text: &str) -> Vec<Param> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    let inner = trimmed
        .strip_prefix('(')
        .and_then(|t| t.strip_suffix(')'))
        .unwrap_or(trimmed);
    split_nested(inner)
        .into_iter()
        .map(|piece| match piece.split_once(':') {
            Some((name, ty)) => Param::new(name.trim(), ty.trim()),
            None => Param::unnamed(piece.trim()),
        })
        .filter(|p| !p.ty.is_empty())
        .collect()
}

fn split_nested(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '(' | '<' | '[' => {
                depth += 1;
                current.push(c);
            }
            ')' | '>' | ']' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                if !current.trim().is_empty() {
                    parts.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// Capture a function body by brace counting, ignoring braces inside string
/// literals and comments. Returns the body text (opening line included) and
/// the index of the closing line.
fn capture_body(lines: &[&str], brace_line: usize) -> Option<(String, usize)> {
    let mut depth = 0i32;
    let mut opened = false;
    let mut in_block_comment = false;
    let mut body = String::new();

    for (offset, line) in lines[brace_line..].iter().enumerate() {
        let mut in_string = false;
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            if in_block_comment {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    in_block_comment = false;
                }
                continue;
            }
            if in_string {
                if c == '"' {
                    in_string = false;
                }
                continue;
            }
            match c {
                '"' => in_string = true,
                '/' if chars.peek() == Some(&'/') => break,
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    in_block_comment = true;
                }
                '{' => {
                    depth += 1;
                    opened = true;
                }
                '}' => depth -= 1,
                _ => {}
            }
        }

        if opened {
            if !body.is_empty() {
                body.push('\n');
            }
            body.push_str(line);
        }
        if opened && depth == 0 {
            return Some((body, brace_line + offset));
        }
    }

    None
}

/// `#[storage]` is followed by `struct Storage { .. }`; every field becomes
/// a storage variable.
fn parse_storage_block(lines: &[&str], attr_line: usize) -> Vec<StorageVarInfo> {
    let mut vars = Vec::new();
    let limit = (attr_line + 50).min(lines.len());

    let Some(struct_line) = (attr_line..limit).find(|&j| lines[j].contains("struct Storage"))
    else {
        return vars;
    };

    let mut depth = 0i32;
    let mut opened = false;
    let end = (struct_line + 100).min(lines.len());
    for j in struct_line..end {
        let line = lines[j].trim();
        depth += line.matches('{').count() as i32;

        if opened && depth > 0 {
            if let Some(caps) = STORAGE_FIELD.captures(line) {
                vars.push(StorageVarInfo {
                    name: caps[1].to_string(),
                    var_type: caps[2].trim().trim_end_matches(',').to_string(),
                    line: j + 1,
                    is_stub: false,
                });
            }
        }
        if depth > 0 {
            opened = true;
        }

        depth -= line.matches('}').count() as i32;
        if opened && depth == 0 {
            break;
        }
    }

    vars
}

fn parse_event_decl(lines: &[&str], attr_line: usize) -> Option<EventInfo> {
    let limit = (attr_line + 10).min(lines.len());
    for j in attr_line..limit {
        if let Some(caps) = EVENT_DECL.captures(lines[j].trim()) {
            return Some(EventInfo {
                name: caps[1].to_string(),
                fields: Vec::new(),
                line: j + 1,
                is_stub: false,
            });
        }
    }
    None
}
