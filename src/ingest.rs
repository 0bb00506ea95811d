//! Import/dedup engine and scan orchestration.
//!
//! One call to [`import_file`] ingests a single parsed annotation file:
//! resolve or create the owning book, classify each annotation, and
//! insert/merge it into the book's highlight and note collections while
//! tracking which devices have seen each highlight. Re-importing the same
//! file is a no-op for highlights, so re-scans are idempotent.
//!
//! Notes (textual bookmarks) are NOT deduplicated — a re-scan duplicates
//! them. That asymmetry matches the observed behavior of the data this
//! pipeline was built against and is kept deliberately visible rather than
//! silently fixed; see DESIGN.md.
//!
//! A scan runs as a single sequential worker: no two files are imported
//! concurrently, which keeps the text-dedup logic race-free without
//! locking. Concurrent scan invocations must be serialized by the caller.

use std::path::{Path, PathBuf};

use anyhow::Result;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::config::{Config, ScanConfig, SourceRoot};
use crate::db;
use crate::discover;
use crate::models::{AnnotationKind, Book, Highlight, Note, RawAnnotation, ScanSummary};
use crate::parser;
use crate::store::sqlite::SqliteStore;
use crate::store::Store;

/// Rows created by importing one file.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileImport {
    pub new_book: bool,
    pub new_highlights: u64,
    pub new_notes: u64,
}

/// Import one annotation file for the given device.
///
/// Parse failures (unreadable or non-UTF-8 files) are logged and count as
/// zero imports; they do not abort a scan. Store failures propagate.
pub async fn import_file(
    store: &dyn Store,
    path: &Path,
    device_id: &str,
) -> Result<FileImport> {
    let parsed = match parser::parse_file(path) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse annotation file");
            return Ok(FileImport::default());
        }
    };

    let title_candidate = parsed
        .doc_props
        .title
        .clone()
        .filter(|t| !t.is_empty())
        .or_else(|| folder_title(path));
    let norm_title = title_candidate
        .as_deref()
        .map(normalize_title)
        .filter(|t| !t.is_empty());
    let checksum = parsed.partial_md5_checksum.clone().filter(|c| !c.is_empty());

    // Resolve the owning book: exact checksum first, then case-insensitive
    // clean/raw title, then create with a deterministic fallback key.
    let mut book = None;
    if let Some(sum) = &checksum {
        book = store.find_book_by_checksum(sum).await?;
    }
    if book.is_none() {
        if let Some(norm) = &norm_title {
            book = store.find_book_by_title(norm).await?;
        }
    }

    let mut result = FileImport::default();
    let mut book = match book {
        Some(book) => book,
        None => {
            let key = checksum
                .clone()
                .unwrap_or_else(|| fallback_key(norm_title.as_deref(), path));
            result.new_book = true;
            Book {
                checksum: key,
                ..Default::default()
            }
        }
    };

    // First-writer-wins metadata: only fill fields that are still empty.
    fill_if_empty(&mut book.raw_title, title_candidate.as_deref());
    fill_if_empty(&mut book.raw_authors, parsed.doc_props.authors.as_deref());
    fill_if_empty(&mut book.identifiers, parsed.doc_props.identifiers.as_deref());
    fill_if_empty(&mut book.language, parsed.doc_props.language.as_deref());
    fill_if_empty(&mut book.description, parsed.doc_props.description.as_deref());
    fill_if_empty(&mut book.file_path, parsed.doc_path.as_deref());
    fill_if_empty(&mut book.clean_title, title_candidate.as_deref());

    if result.new_book {
        book.id = store.insert_book(&book).await?;
    } else {
        store.update_book(&book).await?;
    }

    for ann in &parsed.annotations {
        match ann.kind() {
            AnnotationKind::Bookmark => {
                if let Some(text) = ann.text.as_deref().filter(|t| !t.is_empty()) {
                    store
                        .insert_note(&Note {
                            id: 0,
                            book_id: book.id,
                            text: text.to_string(),
                            datetime: ann.datetime.clone().unwrap_or_default(),
                            device_id: device_id.to_string(),
                        })
                        .await?;
                    result.new_notes += 1;
                }
            }
            kind @ (AnnotationKind::Highlight
            | AnnotationKind::HighlightEmpty
            | AnnotationKind::HighlightNoPosition) => {
                let text = ann.text.clone().unwrap_or_default();
                match store.find_highlight_by_text(book.id, &text).await? {
                    Some(existing) => {
                        store.attach_device(existing.id, device_id).await?;
                        merge_into_existing(store, existing, ann).await?;
                    }
                    None => {
                        let highlight = Highlight {
                            id: 0,
                            book_id: book.id,
                            text,
                            chapter: ann.chapter.clone().unwrap_or_default(),
                            page_number: ann.pageno.unwrap_or(0),
                            datetime: ann.datetime.clone().unwrap_or_default(),
                            color: ann.color.clone().unwrap_or_default(),
                            drawer: ann.drawer.clone().unwrap_or_default(),
                            device_id: device_id.to_string(),
                            page_xpath: ann.page.clone().unwrap_or_default(),
                            kind,
                            hidden: false,
                        };
                        let id = store.insert_highlight(&highlight).await?;
                        store.attach_device(id, device_id).await?;
                        result.new_highlights += 1;
                    }
                }
            }
            AnnotationKind::Unknown => {}
        }
    }

    info!(
        path = %path.display(),
        device = device_id,
        new_highlights = result.new_highlights,
        new_notes = result.new_notes,
        book = book.raw_title.as_deref().unwrap_or(&book.checksum),
        "imported annotations"
    );

    Ok(result)
}

/// Backfill empty fields of a deduplicated highlight from a new sighting.
/// Existing non-empty values are never overwritten; a page number is only
/// adopted when the stored one is the unknown sentinel (0).
async fn merge_into_existing(
    store: &dyn Store,
    mut existing: Highlight,
    ann: &RawAnnotation,
) -> Result<()> {
    let mut changed = false;

    let backfills: [(&mut String, Option<&str>); 4] = [
        (&mut existing.chapter, ann.chapter.as_deref()),
        (&mut existing.datetime, ann.datetime.as_deref()),
        (&mut existing.page_xpath, ann.page.as_deref()),
        (&mut existing.color, ann.color.as_deref()),
    ];
    for (slot, value) in backfills {
        if slot.is_empty() {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                *slot = value.to_string();
                changed = true;
            }
        }
    }

    if existing.page_number == 0 {
        if let Some(pageno) = ann.pageno.filter(|p| *p > 0) {
            existing.page_number = pageno;
            changed = true;
        }
    }

    if changed {
        store.update_highlight(&existing).await?;
    }
    Ok(())
}

fn fill_if_empty(slot: &mut Option<String>, value: Option<&str>) {
    let empty = slot.as_deref().map_or(true, |s| s.is_empty());
    if empty {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            *slot = Some(value.to_string());
        }
    }
}

/// Title derived from the folder holding the file: a trailing `.sdr` suffix
/// is stripped (case-insensitively) and underscores become spaces.
fn folder_title(path: &Path) -> Option<String> {
    let name = path.parent()?.file_name()?.to_string_lossy().to_string();
    let stripped = if name.to_lowercase().ends_with(".sdr") {
        &name[..name.len() - 4]
    } else {
        &name
    };
    let title = stripped.replace('_', " ").trim().to_string();
    (!title.is_empty()).then_some(title)
}

/// Lowercase, whitespace-collapsed key for fuzzy title matching.
fn normalize_title(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Deterministic 64-character book key for checksum-less sources: SHA-256
/// of the normalized title, or of the file path when no title exists.
fn fallback_key(norm_title: Option<&str>, path: &Path) -> String {
    let base = match norm_title {
        Some(title) => title.to_string(),
        None => path.display().to_string(),
    };
    let mut hasher = Sha256::new();
    hasher.update(base.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Scan one base directory of device folders, importing every discovered
/// annotation file. A nonexistent base is logged and skipped.
pub async fn scan_root(
    store: &dyn Store,
    scan: &ScanConfig,
    root: &SourceRoot,
) -> Result<ScanSummary> {
    let mut summary = ScanSummary::default();

    if !root.path.exists() {
        warn!(path = %root.path.display(), "source root does not exist, skipping");
        return Ok(summary);
    }
    summary.roots_scanned = 1;

    let files = discover::metadata_files(&root.path, &scan.metadata_glob)?;
    for file in &files {
        let device_id = root
            .device_label
            .clone()
            .unwrap_or_else(|| discover::device_label(&root.path, file, &scan.internal_folders));
        let imported = import_file(store, file, &device_id).await?;
        summary.files_scanned += 1;
        if imported.new_book {
            summary.new_books += 1;
        }
        summary.new_highlights += imported.new_highlights;
        summary.new_notes += imported.new_notes;
    }

    Ok(summary)
}

/// Run a full scan from the CLI: every enabled configured source root, or a
/// single overriding path.
pub async fn run_scan(
    config: &Config,
    path: Option<PathBuf>,
    device: Option<String>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let roots: Vec<SourceRoot> = match path {
        Some(path) => vec![SourceRoot {
            path,
            enabled: true,
            device_label: device,
        }],
        None => {
            let mut roots: Vec<SourceRoot> = config
                .sources
                .iter()
                .filter(|s| s.enabled)
                .cloned()
                .collect();
            roots.sort_by(|a, b| a.path.cmp(&b.path));
            roots
        }
    };

    if roots.is_empty() {
        println!("No source roots configured; nothing to scan.");
        return Ok(());
    }

    if dry_run {
        println!("scan (dry-run)");
        let mut total = 0usize;
        for root in &roots {
            let files = discover::metadata_files(&root.path, &config.scan.metadata_glob)?;
            println!("  {}: {} file(s)", root.path.display(), files.len());
            total += files.len();
        }
        println!("  total files: {}", total);
        return Ok(());
    }

    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let mut summary = ScanSummary::default();
    for root in &roots {
        let root_summary = scan_root(&store, &config.scan, root).await?;
        summary.merge(&root_summary);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("scan");
        println!("  roots scanned: {}", summary.roots_scanned);
        println!("  files scanned: {}", summary.files_scanned);
        println!("  new books: {}", summary.new_books);
        println!("  new highlights: {}", summary.new_highlights);
        println!("  new notes: {}", summary.new_notes);
        println!("ok");
    }

    pool.close().await;
    Ok(())
}

/// Import a single file from the CLI.
pub async fn run_import(config: &Config, file: &Path, device: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let imported = import_file(&store, file, device).await?;

    println!("import {}", file.display());
    println!("  new book: {}", imported.new_book);
    println!("  new highlights: {}", imported.new_highlights);
    println!("  new notes: {}", imported.new_notes);
    println!("ok");

    pool.close().await;
    Ok(())
}
