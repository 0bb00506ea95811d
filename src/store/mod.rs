//! Storage abstraction for the import pipeline.
//!
//! The [`Store`] trait defines exactly the persistence operations the import
//! engine consumes, enabling pluggable backends (SQLite for the CLI, an
//! in-memory store for tests). The engine never touches SQL directly.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Book, Highlight, Note};

/// Abstract book/highlight/note storage.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find_book_by_checksum`](Store::find_book_by_checksum) | Exact checksum lookup |
/// | [`find_book_by_title`](Store::find_book_by_title) | Case-insensitive clean/raw title lookup |
/// | [`insert_book`](Store::insert_book) | Create a book, returning its id |
/// | [`update_book`](Store::update_book) | Persist changed book fields |
/// | [`find_highlight_by_text`](Store::find_highlight_by_text) | Dedup lookup by (book, exact text, highlight kinds) |
/// | [`insert_highlight`](Store::insert_highlight) | Create a highlight, returning its id |
/// | [`update_highlight`](Store::update_highlight) | Persist backfilled highlight fields |
/// | [`attach_device`](Store::attach_device) | Insert-if-absent device association |
/// | [`highlight_devices`](Store::highlight_devices) | List devices attached to a highlight |
/// | [`insert_note`](Store::insert_note) | Create a note (no dedup) |
#[async_trait]
pub trait Store: Send + Sync {
    /// Look up a book by its exact checksum key.
    async fn find_book_by_checksum(&self, checksum: &str) -> Result<Option<Book>>;

    /// Look up a book whose clean title — or failing that, raw title —
    /// matches the given normalized title case-insensitively. Clean-title
    /// matches take precedence.
    async fn find_book_by_title(&self, norm_title: &str) -> Result<Option<Book>>;

    /// Insert a new book and return its id.
    async fn insert_book(&self, book: &Book) -> Result<i64>;

    /// Persist the fields of an existing book.
    async fn update_book(&self, book: &Book) -> Result<()>;

    /// Find an existing highlight in the same book with identical text,
    /// among rows of the three highlight kinds. Page number and device are
    /// deliberately not part of the key.
    async fn find_highlight_by_text(&self, book_id: i64, text: &str)
        -> Result<Option<Highlight>>;

    /// Insert a new highlight and return its id.
    async fn insert_highlight(&self, highlight: &Highlight) -> Result<i64>;

    /// Persist the fields of an existing highlight.
    async fn update_highlight(&self, highlight: &Highlight) -> Result<()>;

    /// Record that a device has seen a highlight. Idempotent; returns true
    /// when a new association was created.
    async fn attach_device(&self, highlight_id: i64, device_id: &str) -> Result<bool>;

    /// Devices associated with a highlight.
    async fn highlight_devices(&self, highlight_id: i64) -> Result<Vec<String>>;

    /// Insert a note. Notes are never deduplicated.
    async fn insert_note(&self, note: &Note) -> Result<i64>;
}
