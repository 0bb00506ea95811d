use anyhow::Result;

use crate::config::Config;

/// List the configured source roots and whether they exist on disk.
pub fn list_sources(config: &Config) -> Result<()> {
    if config.sources.is_empty() {
        println!("No source roots configured.");
        return Ok(());
    }

    println!("{:<40} {:<9} {:<8} DEVICE LABEL", "PATH", "ENABLED", "EXISTS");
    for source in &config.sources {
        let exists = if source.path.exists() { "yes" } else { "NO" };
        let enabled = if source.enabled { "yes" } else { "no" };
        let label = source.device_label.as_deref().unwrap_or("(derived)");
        println!(
            "{:<40} {:<9} {:<8} {}",
            source.path.display(),
            enabled,
            exists,
            label
        );
    }

    Ok(())
}
