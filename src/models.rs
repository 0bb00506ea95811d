//! Core data models used throughout marginalia.
//!
//! Two families of types live here: the transient structures produced by the
//! annotation-file parser ([`RawDocument`], [`DocProps`], [`RawAnnotation`])
//! and the persistent aggregates the import engine maintains ([`Book`],
//! [`Highlight`], [`Note`]).
//!
//! Throughout these types, `None` means the field was absent from the source
//! file — which is not the same thing as an explicit empty string. The dedup
//! and backfill logic in the import engine depends on that distinction.

use serde::Serialize;

/// Semantic kind assigned to a raw annotation by the classifier.
///
/// Only the three highlight variants are ever persisted as [`Highlight`]
/// rows; `Bookmark` becomes a [`Note`] when it carries text, and `Unknown`
/// is dropped entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationKind {
    Highlight,
    HighlightEmpty,
    HighlightNoPosition,
    Bookmark,
    Unknown,
}

impl AnnotationKind {
    /// Stable string form used in the database `kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationKind::Highlight => "highlight",
            AnnotationKind::HighlightEmpty => "highlight_empty",
            AnnotationKind::HighlightNoPosition => "highlight_no_position",
            AnnotationKind::Bookmark => "bookmark",
            AnnotationKind::Unknown => "unknown",
        }
    }

    /// Parse the database string form. Unrecognized values map to `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s {
            "highlight" => AnnotationKind::Highlight,
            "highlight_empty" => AnnotationKind::HighlightEmpty,
            "highlight_no_position" => AnnotationKind::HighlightNoPosition,
            "bookmark" => AnnotationKind::Bookmark,
            _ => AnnotationKind::Unknown,
        }
    }

    /// True for the three kinds that participate in highlight dedup.
    pub fn is_highlight(&self) -> bool {
        matches!(
            self,
            AnnotationKind::Highlight
                | AnnotationKind::HighlightEmpty
                | AnnotationKind::HighlightNoPosition
        )
    }
}

/// One annotation entry as extracted from a metadata file.
///
/// Every field is optional: the parser leaves a field `None` when the
/// corresponding pattern did not match, rather than defaulting to `""`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawAnnotation {
    pub chapter: Option<String>,
    pub color: Option<String>,
    /// Free-form timestamp text; not guaranteed to be any fixed format.
    pub datetime: Option<String>,
    /// Structural page locator (xpath-like), not a page number.
    pub page: Option<String>,
    pub text: Option<String>,
    /// Tool used to create the annotation (e.g. "lighten").
    pub drawer: Option<String>,
    pub pos0: Option<String>,
    pub pos1: Option<String>,
    pub pageno: Option<i64>,
}

fn present(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.is_empty())
}

impl RawAnnotation {
    /// Classify this annotation from the presence of color, text, and the
    /// position pair. Pure and total; evaluated top to bottom, first match
    /// wins:
    ///
    /// | color | text | pos0+pos1 | kind |
    /// |-------|------|-----------|------|
    /// | yes | yes | yes | highlight |
    /// | yes | no  | yes | highlight_empty |
    /// | yes | —   | no  | highlight_no_position |
    /// | no  | yes | —   | bookmark |
    /// | otherwise |  |  | unknown |
    pub fn kind(&self) -> AnnotationKind {
        let has_color = present(&self.color);
        let has_text = present(&self.text);
        let has_positions = present(&self.pos0) && present(&self.pos1);

        if has_color && has_text && has_positions {
            AnnotationKind::Highlight
        } else if has_color && has_positions {
            AnnotationKind::HighlightEmpty
        } else if has_color {
            AnnotationKind::HighlightNoPosition
        } else if has_text {
            AnnotationKind::Bookmark
        } else {
            AnnotationKind::Unknown
        }
    }

    /// True when no field at all was extracted for this entry.
    pub fn is_empty(&self) -> bool {
        *self == RawAnnotation::default()
    }
}

/// Document properties from the metadata file's `doc_props` table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocProps {
    pub authors: Option<String>,
    pub title: Option<String>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub identifiers: Option<String>,
    pub series: Option<String>,
}

/// Parser output for one annotation file.
#[derive(Debug, Clone, Default)]
pub struct RawDocument {
    pub doc_props: DocProps,
    /// Annotations in order of appearance in the source text.
    pub annotations: Vec<RawAnnotation>,
    /// Content-based identifier of the annotated book file; primary dedup key.
    pub partial_md5_checksum: Option<String>,
    /// Original path of the book file on the device.
    pub doc_path: Option<String>,
}

/// Persistent book aggregate. Exactly one row exists per distinct checksum.
///
/// The `raw_*` fields are first-writer-wins: populated from the first file
/// seen for this book and only ever filled in where still empty.
/// `clean_title` / `clean_authors` are curated separately; the import engine
/// only seeds `clean_title` when it is unset.
#[derive(Debug, Clone, Default)]
pub struct Book {
    pub id: i64,
    /// Source partial checksum, or a SHA-256 fallback key. Unique, 64 chars.
    pub checksum: String,
    pub raw_title: Option<String>,
    pub raw_authors: Option<String>,
    pub identifiers: Option<String>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub file_path: Option<String>,
    pub clean_title: Option<String>,
    pub clean_authors: Option<String>,
}

/// A highlight owned by a book. Within one book, no two rows of highlight
/// kind share identical `text` — enforced by the import engine, not the
/// database.
#[derive(Debug, Clone)]
pub struct Highlight {
    pub id: i64,
    pub book_id: i64,
    pub text: String,
    pub chapter: String,
    /// 0 means unknown.
    pub page_number: i64,
    pub datetime: String,
    pub color: String,
    pub drawer: String,
    /// Device that first created this row. The full set of devices that have
    /// seen it lives in the highlight_devices association.
    pub device_id: String,
    pub page_xpath: String,
    pub kind: AnnotationKind,
    /// UI-only flag; never set by the import engine.
    pub hidden: bool,
}

/// A textual bookmark, stored per import. Unlike highlights, notes are not
/// deduplicated across devices or re-scans.
#[derive(Debug, Clone)]
pub struct Note {
    pub id: i64,
    pub book_id: i64,
    pub text: String,
    pub datetime: String,
    pub device_id: String,
}

/// Totals accumulated over one scan invocation.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ScanSummary {
    pub roots_scanned: u64,
    pub files_scanned: u64,
    pub new_books: u64,
    pub new_highlights: u64,
    pub new_notes: u64,
}

impl ScanSummary {
    pub fn merge(&mut self, other: &ScanSummary) {
        self.roots_scanned += other.roots_scanned;
        self.files_scanned += other.files_scanned;
        self.new_books += other.new_books;
        self.new_highlights += other.new_highlights;
        self.new_notes += other.new_notes;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ann(color: Option<&str>, text: Option<&str>, positions: bool) -> RawAnnotation {
        RawAnnotation {
            color: color.map(String::from),
            text: text.map(String::from),
            pos0: positions.then(|| "p0".to_string()),
            pos1: positions.then(|| "p1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_classifier_decision_table() {
        assert_eq!(
            ann(Some("yellow"), Some("body"), true).kind(),
            AnnotationKind::Highlight
        );
        assert_eq!(
            ann(Some("yellow"), None, true).kind(),
            AnnotationKind::HighlightEmpty
        );
        assert_eq!(
            ann(Some("yellow"), Some("body"), false).kind(),
            AnnotationKind::HighlightNoPosition
        );
        assert_eq!(
            ann(Some("yellow"), None, false).kind(),
            AnnotationKind::HighlightNoPosition
        );
        assert_eq!(ann(None, Some("body"), true).kind(), AnnotationKind::Bookmark);
        assert_eq!(ann(None, Some("body"), false).kind(), AnnotationKind::Bookmark);
        assert_eq!(ann(None, None, true).kind(), AnnotationKind::Unknown);
        assert_eq!(ann(None, None, false).kind(), AnnotationKind::Unknown);
    }

    #[test]
    fn test_classifier_empty_string_is_absent() {
        // Explicit "" must behave like a missing field.
        assert_eq!(ann(Some(""), Some("body"), true).kind(), AnnotationKind::Bookmark);
        assert_eq!(
            ann(Some("red"), Some(""), true).kind(),
            AnnotationKind::HighlightEmpty
        );
    }

    #[test]
    fn test_classifier_requires_both_positions() {
        let a = RawAnnotation {
            color: Some("red".to_string()),
            text: Some("t".to_string()),
            pos0: Some("p0".to_string()),
            pos1: None,
            ..Default::default()
        };
        assert_eq!(a.kind(), AnnotationKind::HighlightNoPosition);
    }

    #[test]
    fn test_kind_string_round_trip() {
        for kind in [
            AnnotationKind::Highlight,
            AnnotationKind::HighlightEmpty,
            AnnotationKind::HighlightNoPosition,
            AnnotationKind::Bookmark,
            AnnotationKind::Unknown,
        ] {
            assert_eq!(AnnotationKind::parse(kind.as_str()), kind);
        }
        assert_eq!(AnnotationKind::parse("garbage"), AnnotationKind::Unknown);
    }

    #[test]
    fn test_highlight_kind_set() {
        assert!(AnnotationKind::Highlight.is_highlight());
        assert!(AnnotationKind::HighlightEmpty.is_highlight());
        assert!(AnnotationKind::HighlightNoPosition.is_highlight());
        assert!(!AnnotationKind::Bookmark.is_highlight());
        assert!(!AnnotationKind::Unknown.is_highlight());
    }
}
