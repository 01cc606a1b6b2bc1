//! Minimal `#define` / `#ifdef` preprocessor for the WGSL templates.
//!
//! WGSL has no preprocessor, so shader permutations are spelled with C-style
//! directives and resolved here before the source reaches wgpu. Supported:
//! `#define NAME`, `#ifdef NAME`, `#ifndef NAME`,
//! `#if defined(A) || defined(B) ...`, `#else`, `#endif`.
//!
//! Directive lines and inactive lines become blank lines so that line numbers
//! in compiler diagnostics match the unprocessed source.

use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprocessError {
    /// 1-based line of the offending directive.
    pub line: usize,
    pub message: String,
}

struct Branch {
    /// Whether the enclosing region emits lines.
    parent_active: bool,
    /// Whether the current arm's condition held.
    taken: bool,
    seen_else: bool,
}

pub fn preprocess(source: &str) -> Result<String, PreprocessError> {
    let mut defines: HashSet<String> = HashSet::new();
    let mut stack: Vec<Branch> = Vec::new();
    let mut out = String::with_capacity(source.len());

    for (index, raw_line) in source.lines().enumerate() {
        let line_no = index + 1;
        let active = stack.last().map_or(true, |b| b.parent_active && b.taken);
        let trimmed = raw_line.trim_start();

        let Some(directive) = trimmed.strip_prefix('#') else {
            if active {
                out.push_str(raw_line);
            }
            out.push('\n');
            continue;
        };

        let (keyword, rest) = split_directive(directive);
        match keyword {
            "define" => {
                if active {
                    let name = rest.split_whitespace().next().ok_or_else(|| {
                        error(line_no, "#define without a name".to_string())
                    })?;
                    defines.insert(name.to_string());
                }
            }
            "ifdef" | "ifndef" => {
                let name = single_name(rest, line_no, keyword)?;
                let present = defines.contains(name);
                stack.push(Branch {
                    parent_active: active,
                    taken: if keyword == "ifdef" { present } else { !present },
                    seen_else: false,
                });
            }
            "if" => {
                let taken = eval_defined_any(rest, &defines)
                    .ok_or_else(|| error(line_no, format!("unsupported #if expression '{rest}'")))?;
                stack.push(Branch {
                    parent_active: active,
                    taken,
                    seen_else: false,
                });
            }
            "else" => {
                let branch = stack
                    .last_mut()
                    .ok_or_else(|| error(line_no, "#else without #if".to_string()))?;
                if branch.seen_else {
                    return Err(error(line_no, "duplicate #else".to_string()));
                }
                branch.seen_else = true;
                branch.taken = !branch.taken;
            }
            "endif" => {
                stack
                    .pop()
                    .ok_or_else(|| error(line_no, "#endif without #if".to_string()))?;
            }
            other => {
                return Err(error(line_no, format!("unknown directive #{other}")));
            }
        }
        out.push('\n');
    }

    if !stack.is_empty() {
        return Err(error(
            source.lines().count(),
            format!("{} unterminated conditional block(s)", stack.len()),
        ));
    }
    Ok(out)
}

/// Prefixes every line with its 1-based number, for error reports.
pub fn numbered_source(source: &str) -> String {
    source
        .lines()
        .enumerate()
        .map(|(i, line)| format!("{:4}: {}", i + 1, line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn split_directive(directive: &str) -> (&str, &str) {
    let directive = directive.trim();
    match directive.find(|c: char| c.is_whitespace()) {
        Some(split) => (&directive[..split], directive[split..].trim()),
        None => (directive, ""),
    }
}

fn single_name<'a>(rest: &'a str, line: usize, keyword: &str) -> Result<&'a str, PreprocessError> {
    let mut words = rest.split_whitespace();
    match (words.next(), words.next()) {
        (Some(name), None) => Ok(name),
        _ => Err(error(line, format!("#{keyword} expects exactly one name"))),
    }
}

/// Evaluates `defined(A) || defined(B) || ...`; `None` for anything else.
fn eval_defined_any(expr: &str, defines: &HashSet<String>) -> Option<bool> {
    let mut any = false;
    for term in expr.split("||") {
        let name = term
            .trim()
            .strip_prefix("defined(")?
            .strip_suffix(')')?
            .trim();
        if name.is_empty() {
            return None;
        }
        any |= defines.contains(name);
    }
    Some(any)
}

fn error(line: usize, message: String) -> PreprocessError {
    PreprocessError { line, message }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emitted(out: &str) -> Vec<&str> {
        out.lines().filter(|l| !l.trim().is_empty()).collect()
    }

    #[test]
    fn ifdef_selects_branch() {
        let src = "#define A\n#ifdef A\nyes\n#else\nno\n#endif\n";
        let out = preprocess(src).unwrap();
        assert_eq!(emitted(&out), vec!["yes"]);
    }

    #[test]
    fn line_count_is_preserved() {
        let src = "#define A\n#ifndef A\ndropped\n#endif\nkept\n";
        let out = preprocess(src).unwrap();
        assert_eq!(out.lines().count(), src.lines().count());
        assert_eq!(out.lines().nth(4), Some("kept"));
    }

    #[test]
    fn nested_blocks_respect_parent() {
        let src = "#ifdef OUTER\n#define INNER\n#ifdef INNER\nin\n#endif\n#else\nout\n#endif\n";
        let out = preprocess(src).unwrap();
        assert_eq!(emitted(&out), vec!["out"]);
    }

    #[test]
    fn defines_inside_inactive_blocks_are_ignored() {
        let src = "#ifdef NOPE\n#define LATER\n#endif\n#ifdef LATER\nbad\n#endif\n";
        let out = preprocess(src).unwrap();
        assert!(emitted(&out).is_empty());
    }

    #[test]
    fn defined_or_expression() {
        let src = "#define B\n#if defined(A) || defined(B)\nhit\n#endif\n";
        assert_eq!(emitted(&preprocess(src).unwrap()), vec!["hit"]);
        let src = "#if defined(A) || defined(C)\nhit\n#endif\n";
        assert!(emitted(&preprocess(src).unwrap()).is_empty());
    }

    #[test]
    fn unbalanced_blocks_are_errors() {
        assert_eq!(preprocess("#endif\n").unwrap_err().line, 1);
        assert!(preprocess("#ifdef A\nx\n").is_err());
        assert!(preprocess("#ifdef A\n#else\n#else\n#endif\n").is_err());
        assert!(preprocess("#pragma once\n").is_err());
    }

    #[test]
    fn numbered_source_prefixes_lines() {
        let listing = numbered_source("a\nb");
        assert_eq!(listing, "   1: a\n   2: b");
    }
}
