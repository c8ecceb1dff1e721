//! Raw-text scan for condition literals.
//!
//! The data walk only sees conditions at the paths the authoring format
//! defines. This pass reads every content file line by line and checks any
//! `if = {..}`, `requires = {..}` or `state = {..}` literal, and any dotted
//! `[scenes.x...if]` style table, wherever it appears.

use regex::Regex;

use story_rules::{CONDITION_KEYS, REL_THRESHOLD_KEYS};

use crate::content::{Diagnostic, DiagnosticCode, Fragment};

const CONDITION_FIELDS: [&str; 3] = ["if", "requires", "state"];

/// What kind of table a dotted header opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Condition,
    Threshold,
    Other,
}

/// Scan one file for condition literals with unrecognized keys.
pub fn scan_fragment(fragment: &Fragment) -> Vec<Diagnostic> {
    let (Ok(inline), Ok(header), Ok(assignment)) = (
        Regex::new(r"(?:^|[\s,{])(if|requires|state)\s*=\s*\{"),
        Regex::new(r"^\s*\[\[?\s*([^\]]+?)\s*\]\]?\s*(?:#.*)?$"),
        Regex::new(r#"^\s*"?([A-Za-z0-9_-]+)"?\s*="#),
    ) else {
        return Vec::new();
    };

    let mut diagnostics = Vec::new();
    let mut block = Block::Other;

    for (idx, line) in fragment.source.lines().enumerate() {
        let line_no = idx + 1;
        let code = strip_comment(line);

        if let Some(caps) = header.captures(code) {
            block = classify(&caps[1]);
            continue;
        }

        match block {
            Block::Condition => match code.parse::<toml::Table>() {
                Ok(entry) => {
                    for key in unknown_keys(&entry) {
                        diagnostics.push(unknown_key(fragment, line_no, &key));
                    }
                }
                Err(_) => {
                    if let Some(caps) = assignment.captures(code) {
                        if !CONDITION_KEYS.contains(&&caps[1]) {
                            diagnostics.push(unknown_key(fragment, line_no, &caps[1]));
                        }
                    }
                }
            },
            Block::Threshold => {
                if let Some(caps) = assignment.captures(code) {
                    if !REL_THRESHOLD_KEYS.contains(&&caps[1]) {
                        let key = format!("relAtLeast.{}", &caps[1]);
                        diagnostics.push(unknown_key(fragment, line_no, &key));
                    }
                }
            }
            Block::Other => {}
        }

        for caps in inline.captures_iter(code) {
            let Some(field) = caps.get(1) else {
                continue;
            };
            if inside_string(code, field.start()) {
                continue;
            }
            let open = caps.get(0).map_or(field.end(), |m| m.end() - 1);
            let Some(literal) = balanced(&code[open..]) else {
                continue;
            };
            for key in literal_keys(literal) {
                diagnostics.push(unknown_key(fragment, line_no, &key));
            }
        }
    }

    diagnostics
}

fn unknown_key(fragment: &Fragment, line: usize, key: &str) -> Diagnostic {
    let diagnostic = Diagnostic::new(
        DiagnosticCode::UnknownConditionKey,
        format!("unknown condition key `{key}`"),
    )
    .at(Some(fragment.location(line)));
    match fragment.scene_at(line) {
        Some(scene) => diagnostic.in_scene(scene),
        None => diagnostic,
    }
}

fn classify(path: &str) -> Block {
    let parts: Vec<&str> = path.split('.').map(str::trim).collect();
    match parts.as_slice() {
        [.., field] if CONDITION_FIELDS.contains(field) => Block::Condition,
        [.., field, "relAtLeast"] if CONDITION_FIELDS.contains(field) => Block::Threshold,
        _ => Block::Other,
    }
}

/// Drop a trailing `#` comment, ignoring `#` inside double-quoted strings.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
        } else if ch == '"' {
            in_string = true;
        } else if ch == '#' {
            return &line[..idx];
        }
    }
    line
}

/// Whether byte offset `at` of `line` falls inside a double-quoted string.
fn inside_string(line: &str, at: usize) -> bool {
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in line.char_indices() {
        if idx >= at {
            break;
        }
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
        } else if ch == '"' {
            in_string = true;
        }
    }
    in_string
}

/// The `{...}` literal at the start of `text`, braces included.
fn balanced(text: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..=idx]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Unrecognized keys of a condition literal, `relAtLeast` members prefixed.
fn literal_keys(literal: &str) -> Vec<String> {
    let Ok(parsed) = format!("c = {literal}").parse::<toml::Table>() else {
        return Vec::new();
    };
    parsed
        .get("c")
        .and_then(toml::Value::as_table)
        .map(unknown_keys)
        .unwrap_or_default()
}

fn unknown_keys(table: &toml::Table) -> Vec<String> {
    let mut unknown = Vec::new();
    for (key, value) in table {
        if !CONDITION_KEYS.contains(&key.as_str()) {
            unknown.push(key.clone());
            continue;
        }
        if let (true, Some(threshold)) = (key == "relAtLeast", value.as_table()) {
            unknown.extend(
                threshold
                    .keys()
                    .filter(|k| !REL_THRESHOLD_KEYS.contains(&k.as_str()))
                    .map(|k| format!("relAtLeast.{k}")),
            );
        }
    }
    unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::load_content;
    use std::fs;

    fn scan(source: &str) -> Vec<Diagnostic> {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("story.toml");
        fs::write(&manifest, source).unwrap();
        let content = load_content(&manifest);
        scan_fragment(&content.fragments[0])
    }

    #[test]
    fn test_inline_literals() {
        let found = scan(
            r#"
[scenes.s01]
type = "dialogue"
title = "x"

[[scenes.s01.choices]]
text = "Go"
if = { flagsAll = ["a"], flagz = ["b"] }
next = "END"

[[scenes.s01.choices]]
text = "Stay"
requires = { relAtLeast = { name = "hacker", val = 1, min = 2 } } # note = { x = 1 }
next = "END"
"#,
        );
        let messages: Vec<String> = found.iter().map(ToString::to_string).collect();
        assert_eq!(
            messages,
            vec![
                "[scene:s01 story.toml:8] unknown condition key `flagz`",
                "[scene:s01 story.toml:13] unknown condition key `relAtLeast.min`",
            ]
        );
    }

    #[test]
    fn test_nested_state_literal() {
        let found = scan(
            r#"
[[scenes.s05.effects]]
id = "x"
when = { tagsAny = ["sweet"], state = { itemAll = ["memoryTape"] } }
"#,
        );
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].message, "unknown condition key `itemAll`");
        assert_eq!(found[0].scene.as_deref(), Some("s05"));
    }

    #[test]
    fn test_dotted_condition_headers() {
        let found = scan(
            r#"
[scenes.s02.if]
flagsAny = ["corpTrust"]
hasItem = ["memoryTape"]

[scenes.s02.if.relAtLeast]
name = "liaison"
val = 1
above = 3

[scenes.s02.next]
flagsAll = 1
"#,
        );
        let keys: Vec<&str> = found.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "unknown condition key `hasItem`",
                "unknown condition key `relAtLeast.above`",
            ]
        );
        assert_eq!(found[0].location.as_ref().unwrap().line, 4);
    }

    #[test]
    fn test_strings_and_comments_are_ignored() {
        let found = scan(
            r#"
[scenes.s03]
text = "if = { nope = 1 }"
# requires = { nope = 1 }
"#,
        );
        assert!(found.is_empty());
    }

    #[test]
    fn test_prose_that_looks_like_a_condition() {
        let found = scan(
            r#"
[scenes.s03]
text = "She shrugs, if = { maybe = 1 } is all she says."

[[scenes.s03.choices]]
text = "Ask again, requires = { patience = 9 }"
if = { flagsAll = ["a"], mood = "x" } # "quoted" comment
next = "END"
"#,
        );
        let messages: Vec<&str> = found.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["unknown condition key `mood`"]);
        assert_eq!(found[0].location.as_ref().unwrap().line, 7);
    }

    #[test]
    fn test_inside_string() {
        let line = r#"text = "a, if = {" if = {"#;
        assert!(inside_string(line, line.find("if").unwrap()));
        assert!(!inside_string(line, line.rfind("if").unwrap()));
        let escaped = r#"t = "say \" if = {""#;
        assert!(inside_string(escaped, escaped.find("if").unwrap()));
    }

    #[test]
    fn test_balanced_extraction() {
        assert_eq!(balanced("{ a = { b = 1 } } tail"), Some("{ a = { b = 1 } }"));
        assert_eq!(balanced(r#"{ a = "}" }"#), Some(r#"{ a = "}" }"#));
        assert_eq!(balanced("{ a = 1"), None);
    }
}
