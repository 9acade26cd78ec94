//! Collection maintenance: renaming, extension checks, orphan cleanup.
//!
//! Renames never overwrite. A file whose target name is taken is reported
//! as skipped. An image's sidecar is moved along with it.

use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ensure_dir;
use crate::sanitize::sanitize_filename;
use crate::scanner::{collect_files, detect_format, metadata::extension_matches, metadata::format_extension};
use crate::sidecar;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Default)]
pub struct RenameReport {
    pub renamed: Vec<Rename>,
    /// Sidecars moved along with their images.
    pub sidecars_moved: usize,
    /// Renames not done because the target already existed.
    pub collisions: Vec<Rename>,
    pub failed: Vec<(PathBuf, String)>,
}

/// Rename every non-sidecar file in `files` to its sanitized name.
pub fn sanitize_collection(files: &[PathBuf], dry_run: bool) -> RenameReport {
    let mut report = RenameReport::default();

    for path in files {
        if sidecar::is_sidecar(path) {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };

        let new_name = sanitize_filename(&name);
        if new_name == name {
            continue;
        }
        let target = path.with_file_name(&new_name);
        let rename = Rename {
            from: path.clone(),
            to: target,
        };

        if dry_run {
            if sidecar::has_sidecar(path) {
                report.sidecars_moved += 1;
            }
            report.renamed.push(rename);
            continue;
        }

        match rename_image(&rename.from, &rename.to) {
            Ok(RenameOutcome::Renamed { sidecar_moved }) => {
                tracing::info!("Renamed {} -> {}", rename.from.display(), rename.to.display());
                if sidecar_moved {
                    report.sidecars_moved += 1;
                }
                report.renamed.push(rename);
            }
            Ok(RenameOutcome::TargetExists) => {
                tracing::warn!(
                    "Skipping {}: target '{}' already exists",
                    rename.from.display(),
                    rename.to.display()
                );
                report.collisions.push(rename);
            }
            Err(e) => {
                tracing::error!("Failed to rename {}: {}", rename.from.display(), e);
                report.failed.push((rename.from, e.to_string()));
            }
        }
    }

    report
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed { sidecar_moved: bool },
    TargetExists,
}

/// Rename an image and, if present, its sidecar. Nothing is touched when the
/// image target or the sidecar target already exists.
///
/// The sidecar moves first so that a failure leaves the image findable under
/// its old name.
pub fn rename_image(from: &Path, to: &Path) -> Result<RenameOutcome> {
    if from == to {
        return Ok(RenameOutcome::Renamed { sidecar_moved: false });
    }
    if to.exists() && !same_file(from, to) {
        return Ok(RenameOutcome::TargetExists);
    }
    if sidecar::has_sidecar(from) && sidecar::sidecar_path(to).exists() {
        return Ok(RenameOutcome::TargetExists);
    }

    let sidecar_moved = sidecar::rename_with_image(from, to)?;
    fs::rename(from, to)?;
    Ok(RenameOutcome::Renamed { sidecar_moved })
}

/// True when `a` and `b` name the same existing file, e.g. on a
/// case-insensitive filesystem where only the case differs.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// First free `stem.ext`, `stem_1.ext`, `stem_2.ext`, ... in `dir`.
///
/// A name also counts as taken when a sidecar for it exists. `current` is
/// the file being renamed; its own name counts as free.
pub fn unique_target(dir: &Path, stem: &str, extension: &str, current: &Path) -> PathBuf {
    let name = |suffix: Option<usize>| {
        let base = match suffix {
            Some(n) => format!("{}_{}", stem, n),
            None => stem.to_string(),
        };
        if extension.is_empty() {
            base
        } else {
            format!("{}.{}", base, extension)
        }
    };

    let mut candidate = dir.join(name(None));
    let mut counter = 1;
    while (candidate.exists() || sidecar::sidecar_path(&candidate).exists()) && candidate != current {
        candidate = dir.join(name(Some(counter)));
        counter += 1;
    }
    candidate
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    /// Content is an image whose canonical extension is `actual`.
    Mismatch { actual: &'static str },
    NotImage,
}

/// Compare a file's extension with the format sniffed from its header.
pub fn validate_file(path: &Path) -> Result<Validation> {
    let Some(format) = detect_format(path)? else {
        return Ok(Validation::NotImage);
    };
    let Some(actual) = format_extension(format) else {
        return Ok(Validation::NotImage);
    };

    let current = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if extension_matches(format, &current) {
        Ok(Validation::Valid)
    } else {
        Ok(Validation::Mismatch { actual })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidFile {
    pub path: PathBuf,
    pub actual: &'static str,
    /// New path when `--fix` renamed it.
    pub fixed_to: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ValidationReport {
    pub valid: usize,
    pub invalid: Vec<InvalidFile>,
    pub not_images: Vec<PathBuf>,
    /// Files that could not be read.
    pub failed: Vec<(PathBuf, String)>,
}

impl ValidationReport {
    pub fn fixed(&self) -> usize {
        self.invalid.iter().filter(|f| f.fixed_to.is_some()).count()
    }
}

/// Validate files whose extension is in `extensions`, optionally renaming
/// mismatched ones to the detected extension.
pub fn validate_collection(files: &[PathBuf], extensions: &[String], fix: bool) -> ValidationReport {
    let mut report = ValidationReport::default();

    for path in files {
        if !crate::scanner::has_image_extension(path, extensions) {
            continue;
        }

        match validate_file(path) {
            Ok(Validation::Valid) => report.valid += 1,
            Ok(Validation::NotImage) => report.not_images.push(path.clone()),
            Ok(Validation::Mismatch { actual }) => {
                let mut fixed_to = None;
                if fix {
                    let target = path.with_extension(actual);
                    match rename_image(path, &target) {
                        Ok(RenameOutcome::Renamed { .. }) => {
                            tracing::info!("Fixed extension {} -> {}", path.display(), target.display());
                            fixed_to = Some(target);
                        }
                        Ok(RenameOutcome::TargetExists) => {
                            tracing::warn!("Cannot fix {}: target '{}' exists", path.display(), target.display());
                        }
                        Err(e) => report.failed.push((path.clone(), e.to_string())),
                    }
                }
                report.invalid.push(InvalidFile {
                    path: path.clone(),
                    actual,
                    fixed_to,
                });
            }
            Err(e) => report.failed.push((path.clone(), e.to_string())),
        }
    }

    report
}

#[derive(Debug, Default)]
pub struct CleanupReport {
    pub sidecars_found: usize,
    pub removed: Vec<PathBuf>,
    pub bytes: u64,
}

/// Delete sidecars whose image no longer exists.
pub fn cleanup_orphans(root: &Path, recursive: bool, dry_run: bool) -> Result<CleanupReport> {
    ensure_dir(root)?;
    let mut report = CleanupReport::default();

    for path in collect_files(root, recursive)? {
        let Some(image) = sidecar::image_for_sidecar(&path) else {
            continue;
        };
        report.sidecars_found += 1;
        if image.exists() {
            continue;
        }

        report.bytes += fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        if !dry_run {
            fs::remove_file(&path)?;
            tracing::info!("Deleted orphaned sidecar {}", path.display());
        }
        report.removed.push(path);
    }

    Ok(report)
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CollectionInfo {
    pub total_files: usize,
    pub total_bytes: u64,
    pub with_spaces: usize,
    /// Lowercased extension (with dot, or `(no extension)`) and count,
    /// most common first.
    pub extensions: Vec<(String, usize)>,
}

pub fn collection_info(root: &Path, recursive: bool) -> Result<CollectionInfo> {
    ensure_dir(root)?;
    let mut info = CollectionInfo::default();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for path in collect_files(root, recursive)? {
        info.total_files += 1;
        info.total_bytes += fs::metadata(&path)?.len();

        let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
        if name.contains(' ') {
            info.with_spaces += 1;
        }

        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_else(|| "(no extension)".to_string());
        *counts.entry(ext).or_insert(0) += 1;
    }

    let mut extensions: Vec<(String, usize)> = counts.into_iter().collect();
    extensions.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    info.extensions = extensions;
    Ok(info)
}
