//! Database statistics and health overview.
//!
//! Provides a quick summary of what's been collected: book, highlight, and
//! note counts plus a per-device breakdown. Used by `marg stats` to give
//! confidence that scans are picking up what they should.

use anyhow::Result;
use sqlx::Row;

use crate::config::Config;
use crate::db;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    let total_books: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
        .fetch_one(&pool)
        .await?;

    let total_highlights: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM highlights")
        .fetch_one(&pool)
        .await?;

    let total_notes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes")
        .fetch_one(&pool)
        .await?;

    let total_device_links: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM highlight_devices")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("marginalia — Database Stats");
    println!("===========================");
    println!();
    println!("  Database:     {}", config.db.path.display());
    println!("  Size:         {}", format_bytes(db_size));
    println!();
    println!("  Books:        {}", total_books);
    println!("  Highlights:   {}", total_highlights);
    println!("  Notes:        {}", total_notes);
    println!("  Device links: {}", total_device_links);

    // Per-device breakdown
    let device_rows = sqlx::query(
        r#"
        SELECT hd.device_id, COUNT(DISTINCT hd.highlight_id) AS highlight_count
        FROM highlight_devices hd
        GROUP BY hd.device_id
        ORDER BY highlight_count DESC
        "#,
    )
    .fetch_all(&pool)
    .await?;

    if !device_rows.is_empty() {
        println!();
        println!("  By device:");
        println!("  {:<24} {:>10}", "DEVICE", "HIGHLIGHTS");
        println!("  {}", "-".repeat(36));
        for row in &device_rows {
            let device: String = row.get("device_id");
            let count: i64 = row.get("highlight_count");
            println!("  {:<24} {:>10}", device, count);
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
