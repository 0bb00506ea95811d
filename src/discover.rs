//! Discovery of annotation files under a base directory of device folders.
//!
//! The expected layout is `base/<deviceFolder>/**/metadata.*.lua`: each
//! immediate child directory of the base represents one source device, and
//! annotation files may sit at any depth inside it. A nonexistent base is an
//! empty result, not an error. The returned list is sorted for deterministic
//! processing, though the import engine does not depend on order for
//! correctness.

use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::Glob;
use walkdir::WalkDir;

/// Enumerate every file under the base's device folders whose name matches
/// the given pattern (normally `metadata.*.lua`).
pub fn metadata_files(base: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !base.exists() {
        return Ok(files);
    }

    let matcher = Glob::new(pattern)?.compile_matcher();

    for entry in std::fs::read_dir(base)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        for file in WalkDir::new(entry.path()) {
            let file = file?;
            if file.file_type().is_file() && matcher.is_match(Path::new(file.file_name())) {
                files.push(file.into_path());
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Derive the device label for a discovered file: the first path segment of
/// the file relative to the scanned base. Readers that export into an
/// internal folder (`storage`, `internal`, `sdcard` by default) get
/// collapsed onto the base directory's own name so that one physical device
/// keeps a stable identity.
pub fn device_label(base: &Path, file: &Path, internal_folders: &[String]) -> String {
    let base_name = base
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let first = file
        .strip_prefix(base)
        .ok()
        .and_then(|rel| rel.components().next())
        .map(|c| c.as_os_str().to_string_lossy().to_string());

    match first {
        Some(segment)
            if internal_folders
                .iter()
                .any(|name| name.eq_ignore_ascii_case(&segment)) =>
        {
            base_name
        }
        Some(segment) => segment,
        None => base_name,
    }
}
