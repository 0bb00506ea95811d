//! In-memory [`Store`] implementation for testing.
//!
//! Uses `Vec`s behind `std::sync::RwLock` with monotonically assigned ids.
//! Lookups are linear scans, which is fine at test scale.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Book, Highlight, Note};

use super::Store;

#[derive(Default)]
struct Inner {
    books: Vec<Book>,
    highlights: Vec<Highlight>,
    notes: Vec<Note>,
    devices: Vec<(i64, String)>,
    next_id: i64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory store for the import-engine tests.
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Snapshot of all books, for assertions.
    pub fn books(&self) -> Vec<Book> {
        self.inner.read().unwrap().books.clone()
    }

    /// Snapshot of all highlights, for assertions.
    pub fn highlights(&self) -> Vec<Highlight> {
        self.inner.read().unwrap().highlights.clone()
    }

    /// Snapshot of all notes, for assertions.
    pub fn notes(&self) -> Vec<Note> {
        self.inner.read().unwrap().notes.clone()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_title(candidate: &Option<String>, norm_title: &str) -> bool {
    candidate
        .as_deref()
        .is_some_and(|t| t.to_lowercase() == norm_title)
}

#[async_trait]
impl Store for InMemoryStore {
    async fn find_book_by_checksum(&self, checksum: &str) -> Result<Option<Book>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.books.iter().find(|b| b.checksum == checksum).cloned())
    }

    async fn find_book_by_title(&self, norm_title: &str) -> Result<Option<Book>> {
        let inner = self.inner.read().unwrap();
        let by_clean = inner
            .books
            .iter()
            .find(|b| matches_title(&b.clean_title, norm_title));
        let found = by_clean.or_else(|| {
            inner
                .books
                .iter()
                .find(|b| matches_title(&b.raw_title, norm_title))
        });
        Ok(found.cloned())
    }

    async fn insert_book(&self, book: &Book) -> Result<i64> {
        let mut inner = self.inner.write().unwrap();
        let id = inner.next_id();
        let mut book = book.clone();
        book.id = id;
        inner.books.push(book);
        Ok(id)
    }

    async fn update_book(&self, book: &Book) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(existing) = inner.books.iter_mut().find(|b| b.id == book.id) {
            *existing = book.clone();
        }
        Ok(())
    }

    async fn find_highlight_by_text(
        &self,
        book_id: i64,
        text: &str,
    ) -> Result<Option<Highlight>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .highlights
            .iter()
            .find(|h| h.book_id == book_id && h.text == text && h.kind.is_highlight())
            .cloned())
    }

    async fn insert_highlight(&self, highlight: &Highlight) -> Result<i64> {
        let mut inner = self.inner.write().unwrap();
        let id = inner.next_id();
        let mut highlight = highlight.clone();
        highlight.id = id;
        inner.highlights.push(highlight);
        Ok(id)
    }

    async fn update_highlight(&self, highlight: &Highlight) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(existing) = inner.highlights.iter_mut().find(|h| h.id == highlight.id) {
            *existing = highlight.clone();
        }
        Ok(())
    }

    async fn attach_device(&self, highlight_id: i64, device_id: &str) -> Result<bool> {
        let mut inner = self.inner.write().unwrap();
        let exists = inner
            .devices
            .iter()
            .any(|(hid, dev)| *hid == highlight_id && dev == device_id);
        if exists {
            return Ok(false);
        }
        inner.devices.push((highlight_id, device_id.to_string()));
        Ok(true)
    }

    async fn highlight_devices(&self, highlight_id: i64) -> Result<Vec<String>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .devices
            .iter()
            .filter(|(hid, _)| *hid == highlight_id)
            .map(|(_, dev)| dev.clone())
            .collect())
    }

    async fn insert_note(&self, note: &Note) -> Result<i64> {
        let mut inner = self.inner.write().unwrap();
        let id = inner.next_id();
        let mut note = note.clone();
        note.id = id;
        inner.notes.push(note);
        Ok(id)
    }
}
