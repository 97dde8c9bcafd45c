use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Assignment,
    LetBinding,
    StorageRead,
    StorageWrite,
    Call,
    Return,
    If,
    Else,
    Loop,
    While,
    For,
    Break,
    Continue,
    BlockOpen,
    BlockClose,
    MatchArm,
    Other,
}

/// One classified line-level unit of a function body. Multi-line statements
/// are folded onto their first line; block delimiters become explicit
/// `BlockOpen`/`BlockClose` markers the CFG builder consumes as structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub kind: StatementKind,
    pub line: usize,
    pub raw_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defined: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub used: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qualifier: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub arguments: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_var: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl Statement {
    pub fn new(kind: StatementKind, line: usize, raw_text: impl Into<String>) -> Self {
        Self {
            kind,
            line,
            raw_text: raw_text.into(),
            defined: None,
            used: Vec::new(),
            callee: None,
            qualifier: None,
            arguments: Vec::new(),
            storage_var: None,
            condition: None,
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(
            self.kind,
            StatementKind::If
                | StatementKind::Else
                | StatementKind::Loop
                | StatementKind::While
                | StatementKind::For
        )
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self.kind,
            StatementKind::Return | StatementKind::Break | StatementKind::Continue
        )
    }
}

lazy_static! {
    static ref KEYWORDS: HashSet<&'static str> = [
        "let", "mut", "if", "else", "match", "return", "true", "false", "self", "loop", "while",
        "for", "in", "break", "continue", "fn", "func", "ref", "as", "use", "mod", "struct",
        "enum", "trait", "impl", "pub", "super", "crate", "felt", "felt252", "bool", "usize",
        "u8", "u16", "u32", "u64", "u128", "u256", "i8", "i16", "i32", "i64", "i128",
    ]
    .into_iter()
    .collect();

    static ref IDENT: Regex = Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap();
    static ref FN_SIGNATURE: Regex = Regex::new(r"^(?:pub(?:\(crate\))?\s+)?(?:fn|func)\s+\w+").unwrap();
    static ref STORAGE_WRITE: Regex =
        Regex::new(r"self\.(?:storage\.)?(\w+)\.write\s*\((.*)\)").unwrap();
    static ref STORAGE_READ: Regex = Regex::new(r"self\.(?:storage\.)?(\w+)\.read\s*\(").unwrap();
    static ref LET_BINDING: Regex =
        Regex::new(r"^let\s+(?:mut\s+)?(\w+)\s*(?::[^=]*)?=\s*(.*?);?$").unwrap();
    static ref LET_DECL: Regex = Regex::new(r"^let\s+(?:mut\s+)?(\w+)\s*(?::[^=;]*)?;$").unwrap();
    static ref ASSIGNMENT: Regex =
        Regex::new(r"^([A-Za-z_]\w*)\s*([+\-*/%])?=\s*([^=].*?);?$").unwrap();
    static ref RETURN_STMT: Regex = Regex::new(r"^return(?:\s+(.*?))?;?$").unwrap();
    static ref WHILE_STMT: Regex = Regex::new(r"^while\s+(.*?)\s*\{?$").unwrap();
    static ref FOR_STMT: Regex = Regex::new(r"^for\s+(\w+)\s+in\s+(.*?)\s*\{?$").unwrap();
    static ref IF_STMT: Regex = Regex::new(r"^if\s+(.*?)\s*\{?$").unwrap();
    static ref ELSE_IF_STMT: Regex = Regex::new(r"^else\s+if\s+(.*?)\s*\{?$").unwrap();
    static ref CALL_STMT: Regex =
        Regex::new(r"^([A-Za-z_][\w:.]*?)\s*\((.*)\)\s*;?$").unwrap();
}

/// Line-oriented statement parser. Frankly lexical: anything it cannot
/// classify flows through as `Other` and still reaches the CFG.
#[derive(Debug, Default)]
pub struct StatementParser;

impl StatementParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse raw body text into a flat statement list. `start_line` is the
    /// 1-based line of the opening brace so every statement carries its
    /// absolute source line.
    pub fn parse(&self, body: &str, start_line: usize) -> Vec<Statement> {
        let lines: Vec<&str> = body.lines().collect();
        let mut statements = Vec::new();
        let mut in_block_comment = false;
        let mut i = 0;

        while i < lines.len() {
            let line_num = start_line + i;
            let (text, still_open) = strip_comments(lines[i], in_block_comment);
            in_block_comment = still_open;
            let mut text = text.trim().to_string();
            i += 1;

            if text.is_empty() {
                continue;
            }

            // The captured body starts at the signature line; only its brace
            // contributes structure.
            if FN_SIGNATURE.is_match(&text) {
                if text.ends_with('{') {
                    statements.push(Statement::new(StatementKind::BlockOpen, line_num, "{"));
                }
                continue;
            }

            // Leading closers come first so `} else {` splits cleanly.
            while let Some(rest) = text.strip_prefix('}') {
                statements.push(Statement::new(StatementKind::BlockClose, line_num, "}"));
                text = rest.trim_start_matches(';').trim().to_string();
            }
            if text.is_empty() {
                continue;
            }

            // Fold continuations of a multi-line statement onto this line.
            // Never swallow a closing brace; it must stay a block marker.
            let mut folded = 0;
            while !ends_statement(&text) && i < lines.len() && folded < 8 {
                let (next, open) = strip_comments(lines[i], in_block_comment);
                let next = next.trim().to_string();
                if next.starts_with('}') || next.is_empty() {
                    break;
                }
                in_block_comment = open;
                i += 1;
                folded += 1;
                text.push(' ');
                text.push_str(&next);
            }
            let text = text.trim().to_string();

            let stmt = self.classify(&text, line_num);
            let emit_open = text.ends_with('{') && stmt.kind != StatementKind::BlockOpen;
            statements.push(stmt);
            if emit_open {
                statements.push(Statement::new(StatementKind::BlockOpen, line_num, "{"));
            }
        }

        statements
    }

    fn classify(&self, text: &str, line: usize) -> Statement {
        if text == "{" {
            return Statement::new(StatementKind::BlockOpen, line, "{");
        }

        // Storage accesses win over the binding shape so that
        // `let v = self.storage.balance.read();` is both a read and a def.
        if let Some(caps) = STORAGE_WRITE.captures(text) {
            let mut stmt = Statement::new(StatementKind::StorageWrite, line, text);
            stmt.storage_var = Some(caps[1].to_string());
            stmt.used = identifiers(&caps[2]);
            stmt.defined = binding_target(text);
            return stmt;
        }
        if let Some(caps) = STORAGE_READ.captures(text) {
            let mut stmt = Statement::new(StatementKind::StorageRead, line, text);
            stmt.storage_var = Some(caps[1].to_string());
            stmt.defined = binding_target(text);
            return stmt;
        }

        if text.starts_with("else") {
            let mut stmt = Statement::new(StatementKind::Else, line, text);
            if let Some(caps) = ELSE_IF_STMT.captures(text) {
                let cond = caps[1].trim().to_string();
                stmt.used = identifiers(&cond);
                stmt.condition = Some(cond);
            }
            return stmt;
        }
        if text.starts_with("if ") || text.starts_with("if(") {
            let mut stmt = Statement::new(StatementKind::If, line, text);
            if let Some(caps) = IF_STMT.captures(text) {
                let cond = caps[1].trim().to_string();
                stmt.used = identifiers(&cond);
                stmt.condition = Some(cond);
            }
            return stmt;
        }
        if text == "loop" || text.starts_with("loop ") || text.starts_with("loop{") {
            return Statement::new(StatementKind::Loop, line, text);
        }
        if text.starts_with("while ") || text.starts_with("while(") {
            let mut stmt = Statement::new(StatementKind::While, line, text);
            if let Some(caps) = WHILE_STMT.captures(text) {
                let cond = caps[1].trim().to_string();
                stmt.used = identifiers(&cond);
                stmt.condition = Some(cond);
            }
            return stmt;
        }
        if text.starts_with("for ") {
            let mut stmt = Statement::new(StatementKind::For, line, text);
            if let Some(caps) = FOR_STMT.captures(text) {
                stmt.defined = Some(caps[1].to_string());
                let iter = caps[2].trim().to_string();
                stmt.used = identifiers(&iter);
                stmt.condition = Some(iter);
            }
            return stmt;
        }
        if text.starts_with("break") {
            return Statement::new(StatementKind::Break, line, text);
        }
        if text.starts_with("continue") {
            return Statement::new(StatementKind::Continue, line, text);
        }
        if text.starts_with("return") {
            let mut stmt = Statement::new(StatementKind::Return, line, text);
            if let Some(caps) = RETURN_STMT.captures(text) {
                if let Some(expr) = caps.get(1) {
                    stmt.used = identifiers(expr.as_str());
                }
            }
            return stmt;
        }

        if text.contains("=>") {
            let mut stmt = Statement::new(StatementKind::MatchArm, line, text);
            stmt.used = identifiers(text);
            return stmt;
        }

        // A bare `let x;` declares without initializing: neither a def nor
        // a use, so downstream paths must still assign before reading.
        if LET_DECL.is_match(text) {
            return Statement::new(StatementKind::Other, line, text);
        }
        if let Some(caps) = LET_BINDING.captures(text) {
            let mut stmt = Statement::new(StatementKind::LetBinding, line, text);
            stmt.defined = Some(caps[1].to_string());
            stmt.used = identifiers(&caps[2]);
            return stmt;
        }
        if let Some(caps) = ASSIGNMENT.captures(text) {
            let name = caps[1].to_string();
            if !KEYWORDS.contains(name.as_str()) {
                let mut stmt = Statement::new(StatementKind::Assignment, line, text);
                stmt.used = identifiers(&caps[3]);
                // Compound assignment reads the target before writing it.
                if caps.get(2).is_some() && !stmt.used.contains(&name) {
                    stmt.used.insert(0, name.clone());
                }
                stmt.defined = Some(name);
                return stmt;
            }
        }
        if let Some(caps) = CALL_STMT.captures(text) {
            let path = caps[1].to_string();
            let args_text = caps[2].to_string();
            let (qualifier, callee) = split_call_path(&path);
            let mut stmt = Statement::new(StatementKind::Call, line, text);
            stmt.callee = Some(callee);
            stmt.qualifier = qualifier;
            stmt.arguments = split_top_level(&args_text);
            stmt.used = identifiers(&args_text);
            return stmt;
        }

        let mut stmt = Statement::new(StatementKind::Other, line, text);
        stmt.used = identifiers(text);
        stmt
    }
}

/// A folded statement is complete once it ends in a terminator the grammar
/// treats as closing: `;`, a brace, or a match-arm comma.
fn ends_statement(text: &str) -> bool {
    text.ends_with(';') || text.ends_with('{') || text.ends_with('}') || text.ends_with(',')
}

/// `let NAME =` / `NAME =` prefix of a line whose kind is claimed by a more
/// specific pattern (storage accesses).
fn binding_target(text: &str) -> Option<String> {
    if let Some(caps) = LET_BINDING.captures(text) {
        return Some(caps[1].to_string());
    }
    ASSIGNMENT
        .captures(text)
        .map(|caps| caps[1].to_string())
        .filter(|name| !KEYWORDS.contains(name.as_str()))
}

fn split_call_path(path: &str) -> (Option<String>, String) {
    if let Some(idx) = path.rfind("::") {
        (Some(path[..idx].to_string()), path[idx + 2..].to_string())
    } else if let Some(idx) = path.rfind('.') {
        (Some(path[..idx].to_string()), path[idx + 1..].to_string())
    } else {
        (None, path.to_string())
    }
}

/// Identifier uses in an expression: tokens matching the identifier shape
/// that are not keywords, not callees (followed by `(`), and not member or
/// path tails (preceded by `.` or `::`).
pub fn identifiers(expr: &str) -> Vec<String> {
    let bytes = expr.as_bytes();
    let mut out: Vec<String> = Vec::new();
    for m in IDENT.find_iter(expr) {
        let token = m.as_str();
        if KEYWORDS.contains(token) {
            continue;
        }
        if m.start() > 0 {
            let prev = bytes[m.start() - 1];
            if prev == b'.' || prev == b':' {
                continue;
            }
        }
        let mut rest = expr[m.end()..].chars();
        let next = rest.find(|c| !c.is_whitespace());
        if next == Some('(') {
            continue;
        }
        if !out.iter().any(|s| s == token) {
            out.push(token.to_string());
        }
    }
    out
}

/// Split on top-level commas, respecting paren/bracket/angle/brace nesting.
pub fn split_top_level(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '(' | '[' | '{' | '<' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' | '>' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                let piece = current.trim();
                if !piece.is_empty() {
                    parts.push(piece.to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    let piece = current.trim();
    if !piece.is_empty() {
        parts.push(piece.to_string());
    }
    parts
}

/// Remove `//` line comments and `/* .. */` spans. Returns the cleaned text
/// and whether a block comment is still open at end of line.
fn strip_comments(line: &str, mut in_block: bool) -> (String, bool) {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        if in_block {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_block = false;
            }
            continue;
        }
        if in_string {
            out.push(c);
            if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => break,
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                in_block = true;
            }
            _ => out.push(c),
        }
    }
    (out, in_block)
}
