//! Parser for KOReader-style `metadata.*.lua` annotation files.
//!
//! The input is a Lua source file whose entire content is `return { ... }`.
//! This is deliberately not a Lua interpreter: the parser extracts exactly
//! the four fields the import pipeline consumes (`annotations`, `doc_props`,
//! `doc_path`, `partial_md5_checksum`) by locating their assignments and
//! counting braces to the matching close. Everything else in the file is
//! ignored, and malformed or partial input degrades field-by-field to absent
//! values — [`parse`] never fails. Only [`parse_file`] can error, on
//! unreadable or non-UTF-8 input.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::models::{DocProps, RawAnnotation, RawDocument};

static RETURN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"return\s+\{").expect("valid return regex"));

/// Matches `["key"] = "value"` with escape-aware value capture.
static KV_STRING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\["([A-Za-z0-9_]+)"\]\s*=\s*"((?:[^"\\]|\\.)*)""#).expect("valid kv regex")
});

static PAGENO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\["pageno"\]\s*=\s*(\d+)"#).expect("valid pageno regex"));

/// Matches the start of one annotation entry: `[N] = {`.
static ENTRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\[\d+\]\s*=\s*\{").expect("valid entry regex"));

/// Read and parse one annotation file.
///
/// I/O and encoding errors propagate; the caller is expected to log and
/// treat the file as contributing zero imports.
pub fn parse_file(path: &Path) -> Result<RawDocument> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse(&contents))
}

/// Parse the full text of one annotation file. Never fails: a file without
/// a `return { ... }` literal yields a [`RawDocument`] with all fields
/// absent.
pub fn parse(contents: &str) -> RawDocument {
    let Some(body) = return_table(contents) else {
        return RawDocument::default();
    };

    let annotations = table_field(body, "annotations")
        .map(parse_annotations)
        .unwrap_or_default();
    let doc_props = table_field(body, "doc_props")
        .map(parse_doc_props)
        .unwrap_or_default();

    let mut doc = RawDocument {
        doc_props,
        annotations,
        ..Default::default()
    };

    // Top-level simple fields: first match anywhere in the table body wins.
    // These are stored verbatim (no unescaping).
    for caps in KV_STRING_RE.captures_iter(body) {
        match &caps[1] {
            "doc_path" if doc.doc_path.is_none() => doc.doc_path = Some(caps[2].to_string()),
            "partial_md5_checksum" if doc.partial_md5_checksum.is_none() => {
                doc.partial_md5_checksum = Some(caps[2].to_string())
            }
            _ => {}
        }
    }

    doc
}

/// Locate the first `return { ... }` literal and return the table body
/// between the outer braces.
fn return_table(contents: &str) -> Option<&str> {
    let m = RETURN_RE.find(contents)?;
    // The match ends on the opening brace.
    balanced_inner(contents, m.end() - 1)
}

/// Locate `["name"] = { ... }` within a table body and return the inner
/// text between the braces.
fn table_field<'a>(body: &'a str, name: &str) -> Option<&'a str> {
    let needle = format!("[\"{name}\"]");
    let mut from = 0;
    while let Some(rel) = body[from..].find(&needle) {
        let after = from + rel + needle.len();
        let rest = body[after..].trim_start();
        if let Some(rest) = rest.strip_prefix('=') {
            let rest = rest.trim_start();
            if rest.starts_with('{') {
                // All slices above are suffixes of `body`, so the offset of
                // the opening brace falls out of the lengths.
                return balanced_inner(body, body.len() - rest.len());
            }
        }
        from = after;
    }
    None
}

/// Given the byte offset of an opening brace, return the text between it
/// and its matching close via brace-depth counting. Returns `None` when the
/// braces never balance.
fn balanced_inner(s: &str, open: usize) -> Option<&str> {
    let mut depth = 0i64;
    for (i, b) in s.bytes().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[open + 1..i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split the annotations-array text into per-entry blocks and extract the
/// known fields from each. A block starts at a line matching `[N] = {` and
/// ends when its braces balance; entries whose text matched no known field
/// are dropped.
fn parse_annotations(src: &str) -> Vec<RawAnnotation> {
    let mut blocks: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut depth = 0i64;
    let mut in_entry = false;

    for line in src.lines() {
        if ENTRY_RE.is_match(line) {
            if !current.is_empty() {
                blocks.push(current.join("\n"));
            }
            current = vec![line];
            depth = 1;
            in_entry = true;
        } else if in_entry {
            current.push(line);
            depth += line.matches('{').count() as i64 - line.matches('}').count() as i64;
            if depth == 0 {
                blocks.push(current.join("\n"));
                current = Vec::new();
                in_entry = false;
            }
        }
    }

    blocks
        .iter()
        .filter_map(|block| {
            let ann = parse_annotation_block(block);
            (!ann.is_empty()).then_some(ann)
        })
        .collect()
}

fn parse_annotation_block(block: &str) -> RawAnnotation {
    let mut ann = RawAnnotation::default();
    for caps in KV_STRING_RE.captures_iter(block) {
        let value = unescape(&caps[2]);
        match &caps[1] {
            "chapter" => ann.chapter = Some(value),
            "color" => ann.color = Some(value),
            "datetime" => ann.datetime = Some(value),
            "page" => ann.page = Some(value),
            "text" => ann.text = Some(value),
            "drawer" => ann.drawer = Some(value),
            "pos0" => ann.pos0 = Some(value),
            "pos1" => ann.pos1 = Some(value),
            _ => {}
        }
    }
    if let Some(caps) = PAGENO_RE.captures(block) {
        ann.pageno = caps[1].parse().ok();
    }
    ann
}

fn parse_doc_props(src: &str) -> DocProps {
    let mut props = DocProps::default();
    for caps in KV_STRING_RE.captures_iter(src) {
        let value = unescape(&caps[2]);
        match &caps[1] {
            "authors" => props.authors = Some(value),
            "title" => props.title = Some(value),
            "language" => props.language = Some(value),
            "description" => props.description = Some(value),
            "identifiers" => props.identifiers = Some(value),
            "series" => props.series = Some(value),
            _ => {}
        }
    }
    props
}

/// Resolve Lua backslash-escape sequences.
///
/// `\\` is swapped for a sentinel first so that a literal backslash followed
/// by `n` does not get mangled into a newline, then swapped back last.
fn unescape(s: &str) -> String {
    const SENTINEL: &str = "\u{0}";
    s.replace(r"\\", SENTINEL)
        .replace(r#"\""#, "\"")
        .replace(r"\'", "'")
        .replace(r"\n", "\n")
        .replace(r"\r", "\r")
        .replace(r"\t", "\t")
        .replace(SENTINEL, "\\")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnnotationKind;

    const SAMPLE: &str = r#"
return {
    ["doc_props"] = {
        ["title"] = "Dune",
        ["authors"] = "Frank Herbert",
    },
    ["annotations"] = {
        [1] = {
            ["color"] = "yellow",
            ["text"] = "Fear is the mind-killer.",
            ["pos0"] = "a",
            ["pos1"] = "b",
            ["pageno"] = 42,
            ["chapter"] = "Ch1",
        },
    },
    ["partial_md5_checksum"] = "abc123",
}
"#;

    #[test]
    fn test_parse_sample_file() {
        let doc = parse(SAMPLE);
        assert_eq!(doc.doc_props.title.as_deref(), Some("Dune"));
        assert_eq!(doc.doc_props.authors.as_deref(), Some("Frank Herbert"));
        assert_eq!(doc.partial_md5_checksum.as_deref(), Some("abc123"));
        assert_eq!(doc.annotations.len(), 1);

        let ann = &doc.annotations[0];
        assert_eq!(ann.text.as_deref(), Some("Fear is the mind-killer."));
        assert_eq!(ann.color.as_deref(), Some("yellow"));
        assert_eq!(ann.chapter.as_deref(), Some("Ch1"));
        assert_eq!(ann.pageno, Some(42));
        assert_eq!(ann.kind(), AnnotationKind::Highlight);
    }

    #[test]
    fn test_no_return_clause_is_empty_not_error() {
        let doc = parse("-- just a comment\nlocal x = 1\n");
        assert!(doc.annotations.is_empty());
        assert!(doc.doc_props.title.is_none());
        assert!(doc.partial_md5_checksum.is_none());
        assert!(doc.doc_path.is_none());
    }

    #[test]
    fn test_empty_input() {
        let doc = parse("");
        assert!(doc.annotations.is_empty());
    }

    #[test]
    fn test_unbalanced_braces_degrade() {
        let doc = parse("return {\n[\"annotations\"] = {\n");
        assert!(doc.annotations.is_empty());
    }

    #[test]
    fn test_unescape_escaped_backslash_before_n() {
        // The two-character sequence \n is a newline; the three-character
        // sequence \\n is a backslash followed by a literal n.
        assert_eq!(unescape(r"a\nb"), "a\nb");
        assert_eq!(unescape(r"a\\nb"), "a\\nb");
        assert_eq!(unescape(r#"say \"hi\""#), "say \"hi\"");
        assert_eq!(unescape(r"tab\there"), "tab\there");
        assert_eq!(unescape(r"\r\n"), "\r\n");
        assert_eq!(unescape(r"\\\\"), "\\\\");
    }

    #[test]
    fn test_escaped_quote_inside_value() {
        let src = r#"
return {
    ["annotations"] = {
        [1] = {
            ["color"] = "red",
            ["text"] = "He said \"stop\" twice.",
            ["pos0"] = "x",
            ["pos1"] = "y",
        },
    },
}
"#;
        let doc = parse(src);
        assert_eq!(doc.annotations.len(), 1);
        assert_eq!(
            doc.annotations[0].text.as_deref(),
            Some("He said \"stop\" twice.")
        );
    }

    #[test]
    fn test_absent_field_is_none_not_empty() {
        let src = r#"
return {
    ["annotations"] = {
        [1] = {
            ["color"] = "gray",
            ["pos0"] = "x",
            ["pos1"] = "y",
        },
    },
}
"#;
        let doc = parse(src);
        let ann = &doc.annotations[0];
        assert!(ann.text.is_none());
        assert!(ann.chapter.is_none());
        assert_eq!(ann.kind(), AnnotationKind::HighlightEmpty);
    }

    #[test]
    fn test_multiple_annotation_entries_in_order() {
        let src = r#"
return {
    ["annotations"] = {
        [1] = {
            ["color"] = "yellow",
            ["text"] = "first",
            ["pos0"] = "a",
            ["pos1"] = "b",
        },
        [2] = {
            ["text"] = "a lone bookmark note",
        },
        [3] = {
            ["color"] = "green",
            ["text"] = "third",
            ["pos0"] = "c",
            ["pos1"] = "d",
        },
    },
}
"#;
        let doc = parse(src);
        assert_eq!(doc.annotations.len(), 3);
        assert_eq!(doc.annotations[0].text.as_deref(), Some("first"));
        assert_eq!(doc.annotations[1].kind(), AnnotationKind::Bookmark);
        assert_eq!(doc.annotations[2].text.as_deref(), Some("third"));
    }

    #[test]
    fn test_entry_with_nested_table_stays_one_block() {
        // Position locators are sometimes nested tables; the block must not
        // end until the entry's braces balance.
        let src = r#"
return {
    ["annotations"] = {
        [1] = {
            ["color"] = "yellow",
            ["text"] = "nested",
            ["pos0"] = "a",
            ["pos1"] = "b",
            ["extras"] = {
                ["zoom"] = {
                },
            },
        },
        [2] = {
            ["text"] = "after nested",
        },
    },
}
"#;
        let doc = parse(src);
        assert_eq!(doc.annotations.len(), 2);
        assert_eq!(doc.annotations[0].text.as_deref(), Some("nested"));
        assert_eq!(doc.annotations[1].text.as_deref(), Some("after nested"));
    }

    #[test]
    fn test_doc_path_and_checksum_first_match_wins() {
        let src = r#"
return {
    ["doc_path"] = "/books/dune.epub",
    ["stats"] = {
        ["doc_path"] = "/ignored/dup.epub",
    },
    ["partial_md5_checksum"] = "feedface",
}
"#;
        let doc = parse(src);
        assert_eq!(doc.doc_path.as_deref(), Some("/books/dune.epub"));
        assert_eq!(doc.partial_md5_checksum.as_deref(), Some("feedface"));
    }

    #[test]
    fn test_doc_props_full_set() {
        let src = r#"
return {
    ["doc_props"] = {
        ["authors"] = "Ursula K. Le Guin",
        ["title"] = "The Dispossessed",
        ["language"] = "en",
        ["description"] = "An ambiguous utopia.",
        ["identifiers"] = "isbn:9780061054884",
        ["series"] = "Hainish Cycle",
    },
}
"#;
        let props = parse(src).doc_props;
        assert_eq!(props.authors.as_deref(), Some("Ursula K. Le Guin"));
        assert_eq!(props.title.as_deref(), Some("The Dispossessed"));
        assert_eq!(props.language.as_deref(), Some("en"));
        assert_eq!(props.description.as_deref(), Some("An ambiguous utopia."));
        assert_eq!(props.identifiers.as_deref(), Some("isbn:9780061054884"));
        assert_eq!(props.series.as_deref(), Some("Hainish Cycle"));
    }

    #[test]
    fn test_entry_with_no_known_fields_is_dropped() {
        let src = r#"
return {
    ["annotations"] = {
        [1] = {
            ["mystery"] = 7,
        },
        [2] = {
            ["text"] = "kept",
        },
    },
}
"#;
        let doc = parse(src);
        assert_eq!(doc.annotations.len(), 1);
        assert_eq!(doc.annotations[0].text.as_deref(), Some("kept"));
    }

    #[test]
    fn test_parse_file_missing_path_errors() {
        let err = parse_file(Path::new("/definitely/not/here/metadata.epub.lua"));
        assert!(err.is_err());
    }
}
