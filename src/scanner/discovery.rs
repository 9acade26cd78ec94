use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::ensure_exists;
use crate::sidecar;

fn walker(directory: &Path, recursive: bool) -> WalkDir {
    let walk = WalkDir::new(directory).follow_links(false);
    if recursive {
        walk
    } else {
        walk.max_depth(1)
    }
}

/// Every regular file under `directory`, sorted by path.
pub fn collect_files(directory: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = walker(directory, recursive)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();

    files.sort();
    Ok(files)
}

/// True when `path` has one of `extensions` (case-insensitive, no dot).
pub fn has_image_extension(path: &Path, extensions: &[String]) -> bool {
    match path.extension() {
        Some(ext) => {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            extensions.iter().any(|e| e.to_lowercase() == ext_lower)
        }
        None => false,
    }
}

/// Image files under `directory` matching the extension allow-list.
///
/// Sidecars are never returned, even when an allow-list names `xmp`.
pub fn discover_images(directory: &Path, recursive: bool, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let images = collect_files(directory, recursive)?
        .into_iter()
        .filter(|path| !sidecar::is_sidecar(path) && has_image_extension(path, extensions))
        .collect();

    Ok(images)
}

/// Images named by a command argument: the file itself when `path` is a
/// supported image, otherwise the images found under it.
pub fn resolve_images(path: &Path, recursive: bool, extensions: &[String]) -> Result<Vec<PathBuf>> {
    ensure_exists(path)?;
    if path.is_file() {
        if has_image_extension(path, extensions) {
            return Ok(vec![path.to_path_buf()]);
        }
        return Ok(Vec::new());
    }
    discover_images(path, recursive, extensions)
}
