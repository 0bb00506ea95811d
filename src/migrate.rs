use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Create books table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS books (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            checksum TEXT NOT NULL UNIQUE,
            raw_title TEXT,
            raw_authors TEXT,
            identifiers TEXT,
            language TEXT,
            description TEXT,
            file_path TEXT,
            clean_title TEXT,
            clean_authors TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create highlights table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS highlights (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
            text TEXT NOT NULL DEFAULT '',
            chapter TEXT NOT NULL DEFAULT '',
            page_number INTEGER NOT NULL DEFAULT 0,
            datetime TEXT NOT NULL DEFAULT '',
            color TEXT NOT NULL DEFAULT '',
            drawer TEXT NOT NULL DEFAULT '',
            device_id TEXT NOT NULL DEFAULT '',
            page_xpath TEXT NOT NULL DEFAULT '',
            kind TEXT NOT NULL DEFAULT 'highlight',
            hidden INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create device-association table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS highlight_devices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            highlight_id INTEGER NOT NULL REFERENCES highlights(id) ON DELETE CASCADE,
            device_id TEXT NOT NULL,
            UNIQUE(highlight_id, device_id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create notes table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id INTEGER NOT NULL REFERENCES books(id) ON DELETE CASCADE,
            text TEXT NOT NULL DEFAULT '',
            datetime TEXT NOT NULL DEFAULT '',
            device_id TEXT NOT NULL DEFAULT '',
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_highlights_book_id ON highlights(book_id)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_highlights_book_text ON highlights(book_id, text)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_notes_book_id ON notes(book_id)")
        .execute(&pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_highlight_devices_highlight_id \
         ON highlight_devices(highlight_id)",
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
