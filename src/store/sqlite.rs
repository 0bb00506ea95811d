//! SQLite [`Store`] implementation over an sqlx connection pool.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::models::{AnnotationKind, Book, Highlight, Note};

use super::Store;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn book_from_row(row: &SqliteRow) -> Book {
    Book {
        id: row.get("id"),
        checksum: row.get("checksum"),
        raw_title: row.get("raw_title"),
        raw_authors: row.get("raw_authors"),
        identifiers: row.get("identifiers"),
        language: row.get("language"),
        description: row.get("description"),
        file_path: row.get("file_path"),
        clean_title: row.get("clean_title"),
        clean_authors: row.get("clean_authors"),
    }
}

fn highlight_from_row(row: &SqliteRow) -> Highlight {
    let kind: String = row.get("kind");
    Highlight {
        id: row.get("id"),
        book_id: row.get("book_id"),
        text: row.get("text"),
        chapter: row.get("chapter"),
        page_number: row.get("page_number"),
        datetime: row.get("datetime"),
        color: row.get("color"),
        drawer: row.get("drawer"),
        device_id: row.get("device_id"),
        page_xpath: row.get("page_xpath"),
        kind: AnnotationKind::parse(&kind),
        hidden: row.get("hidden"),
    }
}

const BOOK_COLUMNS: &str = "id, checksum, raw_title, raw_authors, identifiers, language, \
     description, file_path, clean_title, clean_authors";

#[async_trait]
impl Store for SqliteStore {
    async fn find_book_by_checksum(&self, checksum: &str) -> Result<Option<Book>> {
        let row = sqlx::query(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE checksum = ?"
        ))
        .bind(checksum)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(book_from_row))
    }

    async fn find_book_by_title(&self, norm_title: &str) -> Result<Option<Book>> {
        // Clean-title matches take precedence over raw-title matches.
        let row = sqlx::query(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE lower(clean_title) = ? LIMIT 1"
        ))
        .bind(norm_title)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = row {
            return Ok(Some(book_from_row(&row)));
        }

        let row = sqlx::query(&format!(
            "SELECT {BOOK_COLUMNS} FROM books WHERE lower(raw_title) = ? LIMIT 1"
        ))
        .bind(norm_title)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(book_from_row))
    }

    async fn insert_book(&self, book: &Book) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO books (checksum, raw_title, raw_authors, identifiers, language,
                               description, file_path, clean_title, clean_authors,
                               created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&book.checksum)
        .bind(&book.raw_title)
        .bind(&book.raw_authors)
        .bind(&book.identifiers)
        .bind(&book.language)
        .bind(&book.description)
        .bind(&book.file_path)
        .bind(&book.clean_title)
        .bind(&book.clean_authors)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn update_book(&self, book: &Book) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            UPDATE books SET raw_title = ?, raw_authors = ?, identifiers = ?, language = ?,
                             description = ?, file_path = ?, clean_title = ?, clean_authors = ?,
                             updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&book.raw_title)
        .bind(&book.raw_authors)
        .bind(&book.identifiers)
        .bind(&book.language)
        .bind(&book.description)
        .bind(&book.file_path)
        .bind(&book.clean_title)
        .bind(&book.clean_authors)
        .bind(now)
        .bind(book.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_highlight_by_text(
        &self,
        book_id: i64,
        text: &str,
    ) -> Result<Option<Highlight>> {
        let row = sqlx::query(
            r#"
            SELECT id, book_id, text, chapter, page_number, datetime, color, drawer,
                   device_id, page_xpath, kind, hidden
            FROM highlights
            WHERE book_id = ? AND text = ?
              AND kind IN ('highlight', 'highlight_empty', 'highlight_no_position')
            LIMIT 1
            "#,
        )
        .bind(book_id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(highlight_from_row))
    }

    async fn insert_highlight(&self, highlight: &Highlight) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO highlights (book_id, text, chapter, page_number, datetime, color,
                                    drawer, device_id, page_xpath, kind, hidden,
                                    created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(highlight.book_id)
        .bind(&highlight.text)
        .bind(&highlight.chapter)
        .bind(highlight.page_number)
        .bind(&highlight.datetime)
        .bind(&highlight.color)
        .bind(&highlight.drawer)
        .bind(&highlight.device_id)
        .bind(&highlight.page_xpath)
        .bind(highlight.kind.as_str())
        .bind(highlight.hidden)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn update_highlight(&self, highlight: &Highlight) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            UPDATE highlights SET chapter = ?, page_number = ?, datetime = ?, color = ?,
                                  page_xpath = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&highlight.chapter)
        .bind(highlight.page_number)
        .bind(&highlight.datetime)
        .bind(&highlight.color)
        .bind(&highlight.page_xpath)
        .bind(now)
        .bind(highlight.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn attach_device(&self, highlight_id: i64, device_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO highlight_devices (highlight_id, device_id) VALUES (?, ?)",
        )
        .bind(highlight_id)
        .bind(device_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn highlight_devices(&self, highlight_id: i64) -> Result<Vec<String>> {
        let devices = sqlx::query_scalar(
            "SELECT device_id FROM highlight_devices WHERE highlight_id = ? ORDER BY device_id",
        )
        .bind(highlight_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(devices)
    }

    async fn insert_note(&self, note: &Note) -> Result<i64> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            r#"
            INSERT INTO notes (book_id, text, datetime, device_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(note.book_id)
        .bind(&note.text)
        .bind(&note.datetime)
        .bind(&note.device_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }
}
