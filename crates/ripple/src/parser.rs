//! Source parsing into structural facts.
//!
//! Ripple does not type-check or execute code. The [`HeuristicParser`] reads
//! files line by line and extracts what the graph builder needs: import strings,
//! class and function declarations, call names, and which function each call
//! appears in. Dynamic imports (`import("x")`, `__import__`) are ignored.
//!
//! Parsing is a pure function of `(path, language, source)`, so unchanged
//! content always yields identical facts.

use crate::types::{Declaration, FunctionCall, Language, ParsedFile};

/// Turns source text into structural facts.
pub trait SourceParser: Send + Sync {
    /// Parse one file. Must be deterministic for identical input.
    fn parse(&self, path: &str, language: Language, source: &str) -> ParsedFile;
}

/// Line-oriented parser for Python, JavaScript/TypeScript and Java.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicParser;

impl SourceParser for HeuristicParser {
    fn parse(&self, path: &str, language: Language, source: &str) -> ParsedFile {
        let mut facts = ParsedFile::new(path, language);
        match language {
            Language::Python => parse_python(source, &mut facts),
            Language::JavaScript | Language::TypeScript => parse_braced(source, &mut facts, Flavor::Script),
            Language::Java => parse_braced(source, &mut facts, Flavor::Java),
        }
        facts
    }
}

/// Words that look like calls but are control flow or declarations.
const NOT_CALLS: &[&str] = &[
    "if", "elif", "while", "for", "switch", "catch", "return", "function", "def", "class",
    "with", "and", "or", "not", "in", "is", "lambda", "new", "typeof", "await", "yield",
    "super", "this", "import", "require", "assert", "except", "print", "synchronized",
];

// === Python ===

fn parse_python(source: &str, facts: &mut ParsedFile) {
    // (indent, function name) of enclosing `def`s
    let mut scope: Vec<(usize, String)> = Vec::new();

    for (idx, raw) in source.lines().enumerate() {
        let line_no = line_number(idx);
        let code = strip_comment(raw, "#");
        let trimmed = code.trim();
        if trimmed.is_empty() {
            continue;
        }
        let indent = raw.len() - raw.trim_start().len();
        while scope.last().is_some_and(|(level, _)| indent <= *level) {
            scope.pop();
        }

        if let Some(rest) = trimmed.strip_prefix("import ") {
            for part in rest.split(',') {
                if let Some(module) = part.split(" as ").next().map(str::trim) {
                    push_import(facts, module);
                }
            }
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("from ") {
            let mut halves = rest.splitn(2, " import ");
            let module = halves.next().unwrap_or("").trim();
            let names = halves.next().unwrap_or("");
            if !module.is_empty() && module.chars().all(|c| c == '.') {
                // `from . import a, b` imports sibling modules
                for name in names.trim_matches(|c| c == '(' || c == ')').split(',') {
                    if let Some(name) = name.split(" as ").next().map(str::trim) {
                        if !name.is_empty() && name != "*" {
                            push_import(facts, &format!("{module}{name}"));
                        }
                    }
                }
            } else {
                push_import(facts, module);
            }
            continue;
        }

        let declaration = trimmed
            .strip_prefix("async def ")
            .or_else(|| trimmed.strip_prefix("def "));
        if let Some(name) = declaration.and_then(leading_identifier) {
            facts.functions.push(Declaration {
                name: name.to_string(),
                line: line_no,
            });
            scope.push((indent, name.to_string()));
            continue;
        }
        if let Some(name) = trimmed.strip_prefix("class ").and_then(leading_identifier) {
            facts.classes.push(Declaration {
                name: name.to_string(),
                line: line_no,
            });
            continue;
        }

        let enclosing = scope.last().map(|(_, name)| name.as_str());
        record_calls(facts, trimmed, enclosing);
    }
}

// === JavaScript / TypeScript / Java ===

#[derive(Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Script,
    Java,
}

fn parse_braced(source: &str, facts: &mut ParsedFile, flavor: Flavor) {
    let mut depth: usize = 0;
    // (depth at which the body opened, function name)
    let mut scope: Vec<(usize, String)> = Vec::new();
    let mut in_block_comment = false;

    for (idx, raw) in source.lines().enumerate() {
        let line_no = line_number(idx);
        let mut code = raw.trim();
        if in_block_comment {
            match code.find("*/") {
                Some(end) => {
                    code = &code[end + 2..];
                    in_block_comment = false;
                }
                None => continue,
            }
        }
        if code.starts_with("/*") && !code.contains("*/") {
            in_block_comment = true;
            continue;
        }
        let code = strip_comment(code, "//").trim();
        if code.is_empty() || code.starts_with('*') {
            continue;
        }

        let mut declared = None;
        if let Some(module) = braced_import(code, flavor) {
            push_import(facts, &module);
        } else if let Some(name) = class_declaration(code) {
            facts.classes.push(Declaration {
                name: name.to_string(),
                line: line_no,
            });
        } else if let Some(name) = function_declaration(code, flavor) {
            facts.functions.push(Declaration {
                name: name.to_string(),
                line: line_no,
            });
            declared = Some(name.to_string());
        }

        if declared.is_none() {
            let enclosing = scope.last().map(|(_, name)| name.as_str());
            record_calls(facts, code, enclosing);
        }

        for ch in code.chars() {
            match ch {
                '{' => {
                    depth += 1;
                    if let Some(name) = declared.take() {
                        scope.push((depth, name));
                    }
                }
                '}' => {
                    while scope.last().is_some_and(|(level, _)| *level >= depth) {
                        scope.pop();
                    }
                    depth = depth.saturating_sub(1);
                }
                _ => {}
            }
        }
    }
}

fn braced_import(code: &str, flavor: Flavor) -> Option<String> {
    match flavor {
        Flavor::Java => {
            let rest = code.strip_prefix("import ")?;
            let rest = rest.strip_prefix("static ").unwrap_or(rest);
            let module = rest.trim_end_matches(';').trim();
            (!module.is_empty()).then(|| module.trim_end_matches(".*").to_string())
        }
        Flavor::Script => {
            let is_static = code.starts_with("import ")
                || (code.starts_with("export ") && code.contains(" from "));
            if is_static {
                return quoted(code.rsplit_once(" from ").map_or(code, |(_, tail)| tail));
            }
            let start = code.find("require(")?;
            quoted(&code[start + "require(".len()..])
        }
    }
}

fn class_declaration(code: &str) -> Option<&str> {
    let mut words = code.split_whitespace().peekable();
    while let Some(word) = words.next() {
        match word {
            "class" | "interface" | "enum" => return words.next().and_then(leading_identifier),
            "export" | "default" | "public" | "private" | "protected" | "abstract" | "final"
            | "static" | "sealed" | "declare" => {}
            _ => return None,
        }
    }
    None
}

fn function_declaration(code: &str, flavor: Flavor) -> Option<&str> {
    let code = code.strip_prefix("export ").unwrap_or(code);
    let code = code.strip_prefix("default ").unwrap_or(code);
    let code = code.strip_prefix("async ").unwrap_or(code);
    if let Some(rest) = code.strip_prefix("function") {
        return leading_identifier(rest.trim_start_matches('*').trim_start());
    }
    if flavor == Flavor::Script {
        for keyword in ["const ", "let ", "var "] {
            if let Some(rest) = code.strip_prefix(keyword) {
                let name = leading_identifier(rest)?;
                let value = rest[name.len()..].trim_start().strip_prefix('=')?.trim_start();
                let value = value.strip_prefix("async ").unwrap_or(value);
                let is_function = value.starts_with("function")
                    || (value.starts_with('(') && value.contains("=>"))
                    || value.split_once("=>").is_some_and(|(params, _)| {
                        leading_identifier(params.trim()).is_some_and(|p| p.len() == params.trim().len())
                    });
                return is_function.then_some(name);
            }
        }
    }

    // Method: `[modifiers] [ReturnType] name(args) {`
    let open = code.find('(')?;
    if !code.ends_with('{') || code.contains('=') || code.contains(';') {
        return None;
    }
    let head = code[..open].trim_end();
    let name = head.rsplit(|c: char| c.is_whitespace()).next()?;
    if name.is_empty() || !is_identifier(name) || NOT_CALLS.contains(&name) {
        return None;
    }
    let words_before = head.split_whitespace().count() - 1;
    if flavor == Flavor::Java && words_before == 0 {
        return None;
    }
    let first = head.split_whitespace().next().unwrap_or("");
    if matches!(first, "else" | "do" | "try" | "return" | "new" | "throw") {
        return None;
    }
    Some(name)
}

// === Shared helpers ===

fn record_calls(facts: &mut ParsedFile, code: &str, enclosing: Option<&str>) {
    for callee in call_names(code) {
        if !facts.calls.iter().any(|c| c == callee) {
            facts.calls.push(callee.to_string());
        }
        if let Some(caller) = enclosing {
            let call = FunctionCall {
                caller: caller.to_string(),
                callee: callee.to_string(),
            };
            if !facts.function_calls.contains(&call) {
                facts.function_calls.push(call);
            }
        }
    }
}

/// Names immediately followed by `(`; for `a.b(` the name is `b`.
fn call_names(code: &str) -> Vec<&str> {
    let mut names = Vec::new();
    let bytes = code.as_bytes();
    for (pos, &b) in bytes.iter().enumerate() {
        if b != b'(' {
            continue;
        }
        let end = code[..pos].trim_end().len();
        let start = code[..end]
            .char_indices()
            .rev()
            .find(|&(_, c)| !(c.is_alphanumeric() || c == '_' || c == '$'))
            .map_or(0, |(i, c)| i + c.len_utf8());
        let name = &code[start..end];
        if is_identifier(name) && !NOT_CALLS.contains(&name) {
            names.push(name);
        }
    }
    names
}

fn push_import(facts: &mut ParsedFile, module: &str) {
    let module = module.trim();
    if !module.is_empty() && !facts.imports.iter().any(|m| m == module) {
        facts.imports.push(module.to_string());
    }
}

fn quoted(text: &str) -> Option<String> {
    let start = text.find(['\'', '"', '`'])?;
    let quote = text[start..].chars().next()?;
    let rest = &text[start + 1..];
    let end = rest.find(quote)?;
    let value = &rest[..end];
    (!value.is_empty()).then(|| value.to_string())
}

fn leading_identifier(text: &str) -> Option<&str> {
    let end = text
        .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
        .unwrap_or(text.len());
    let ident = &text[..end];
    is_identifier(ident).then_some(ident)
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn strip_comment<'a>(line: &'a str, marker: &str) -> &'a str {
    line.find(marker).map_or(line, |pos| &line[..pos])
}

fn line_number(idx: usize) -> u32 {
    u32::try_from(idx + 1).unwrap_or(u32::MAX)
}
