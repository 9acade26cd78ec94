//! Metadata generation flows built on the vision-model client.
//!
//! Images are processed one at a time. Each image gets its own outcome and
//! a failure on one never stops the rest of the batch.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::llm::LlmClient;
use crate::metadata::ImageMetadata;
use crate::organize::{rename_image, unique_target, RenameOutcome};
use crate::sanitize::sanitize_stem;
use crate::scanner::read_dimensions;
use crate::sidecar;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Metadata written (or, on a dry run, would be). `path` is where the
    /// image ends up.
    Done {
        path: PathBuf,
        renamed: bool,
        description: String,
    },
    /// Nothing needed changing.
    Unchanged,
    /// Not processed: existing description, model failure, name collision.
    Skipped { reason: String },
    /// A filesystem error while renaming or writing.
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOutcome {
    pub image: PathBuf,
    pub outcome: Outcome,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<ImageOutcome>,
}

impl BatchReport {
    fn count(&self, pred: impl Fn(&Outcome) -> bool) -> usize {
        self.items.iter().filter(|i| pred(&i.outcome)).count()
    }

    pub fn done(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Done { .. }))
    }

    pub fn renamed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Done { renamed: true, .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Unchanged))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, Outcome::Failed { .. }))
    }

    fn push(&mut self, image: &Path, outcome: Outcome, on_item: &mut dyn FnMut(&ImageOutcome)) {
        let item = ImageOutcome {
            image: image.to_path_buf(),
            outcome,
        };
        on_item(&item);
        self.items.push(item);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GenerateOptions {
    pub dry_run: bool,
    /// Regenerate images that already have a description.
    pub overwrite: bool,
    /// Rename images after their new description.
    pub rename: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            overwrite: false,
            rename: true,
        }
    }
}

/// Where `image` should move so its name reflects `description`, or `None`
/// when the name already matches.
fn rename_target(image: &Path, description: &str) -> Option<PathBuf> {
    let stem = sanitize_stem(description);
    let extension = image
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let wanted = if extension.is_empty() {
        stem.clone()
    } else {
        format!("{}.{}", stem, extension)
    };

    if image.file_name().map(|n| n.to_string_lossy() == wanted).unwrap_or(false) {
        return None;
    }
    let dir = image.parent().unwrap_or_else(|| Path::new("."));
    Some(unique_target(dir, &stem, &extension, image))
}

/// Move `image` to `target` with its sidecar, mapping collisions to a skip.
fn move_image(image: &Path, target: &Path) -> Result<Option<Outcome>> {
    match rename_image(image, target)? {
        RenameOutcome::Renamed { .. } => {
            tracing::info!("Renamed {} -> {}", image.display(), target.display());
            Ok(None)
        }
        RenameOutcome::TargetExists => Ok(Some(Outcome::Skipped {
            reason: format!("target '{}' already exists", target.display()),
        })),
    }
}

fn apply_dimensions(meta: &mut ImageMetadata, image: &Path) {
    match read_dimensions(image) {
        Ok((width, height)) => {
            meta.set_dimensions(width, height);
        }
        Err(e) => tracing::debug!("No dimensions for {}: {}", image.display(), e),
    }
}

/// Rename each image after a short model-written description and record the
/// description in its sidecar.
pub fn describe_and_rename(
    client: &LlmClient,
    images: &[PathBuf],
    dry_run: bool,
    on_item: &mut dyn FnMut(&ImageOutcome),
) -> BatchReport {
    let mut report = BatchReport::default();

    for image in images {
        let description = match client.describe(image) {
            Ok(description) => description,
            Err(e) => {
                tracing::warn!("Describe failed for {}: {}", image.display(), e);
                report.push(image, Outcome::Skipped { reason: e.to_string() }, on_item);
                continue;
            }
        };

        let Some(target) = rename_target(image, &description) else {
            report.push(image, Outcome::Unchanged, on_item);
            continue;
        };

        if dry_run {
            let outcome = Outcome::Done {
                path: target,
                renamed: true,
                description,
            };
            report.push(image, outcome, on_item);
            continue;
        }

        let outcome = match describe_one(client, image, &target, &description) {
            Ok(None) => Outcome::Done {
                path: target,
                renamed: true,
                description,
            },
            Ok(Some(outcome)) => outcome,
            Err(e) => Outcome::Failed { error: e.to_string() },
        };
        report.push(image, outcome, on_item);
    }

    report
}

fn describe_one(client: &LlmClient, image: &Path, target: &Path, description: &str) -> Result<Option<Outcome>> {
    if let Some(skip) = move_image(image, target)? {
        return Ok(Some(skip));
    }

    let mut meta = sidecar::read(target);
    meta.description = description.to_string();
    meta.ai_model = client.model().to_string();
    apply_dimensions(&mut meta, target);
    sidecar::write(target, &meta)?;
    Ok(None)
}

/// Fill each image's sidecar from a structured model analysis.
pub fn generate_metadata(
    client: &LlmClient,
    images: &[PathBuf],
    options: &GenerateOptions,
    on_item: &mut dyn FnMut(&ImageOutcome),
) -> BatchReport {
    let mut report = BatchReport::default();

    for image in images {
        let mut meta = sidecar::read(image);
        if !meta.description.is_empty() && !options.overwrite {
            report.push(
                image,
                Outcome::Skipped {
                    reason: "already has description".to_string(),
                },
                on_item,
            );
            continue;
        }

        let parsed = match client.analyze(image) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Analysis failed for {}: {}", image.display(), e);
                report.push(image, Outcome::Skipped { reason: e.to_string() }, on_item);
                continue;
            }
        };

        if parsed.is_empty() {
            report.push(
                image,
                Outcome::Skipped {
                    reason: "no metadata in model reply".to_string(),
                },
                on_item,
            );
            continue;
        }

        parsed.apply_to(&mut meta);
        meta.ai_model = client.model().to_string();

        let target = if options.rename && !meta.description.is_empty() {
            rename_target(image, &meta.description)
        } else {
            None
        };

        if options.dry_run {
            let outcome = Outcome::Done {
                renamed: target.is_some(),
                path: target.unwrap_or_else(|| image.clone()),
                description: meta.description,
            };
            report.push(image, outcome, on_item);
            continue;
        }

        let outcome = match generate_one(image, target.as_deref(), &mut meta) {
            Ok(Ok(path)) => Outcome::Done {
                renamed: target.is_some(),
                path,
                description: meta.description.clone(),
            },
            Ok(Err(skip)) => skip,
            Err(e) => Outcome::Failed { error: e.to_string() },
        };
        report.push(image, outcome, on_item);
    }

    report
}

/// Rename (if asked) then write the sidecar. The inner `Err` carries a
/// skip outcome for a rename collision.
fn generate_one(image: &Path, target: Option<&Path>, meta: &mut ImageMetadata) -> Result<Result<PathBuf, Outcome>> {
    let path = match target {
        Some(target) => {
            if let Some(skip) = move_image(image, target)? {
                return Ok(Err(skip));
            }
            target.to_path_buf()
        }
        None => image.to_path_buf(),
    };

    apply_dimensions(meta, &path);
    sidecar::write(&path, meta)?;
    Ok(Ok(path))
}

/// Refresh width, height and recommended screen in existing sidecars.
/// Images without a sidecar are skipped; no model is involved.
pub fn update_dimensions(images: &[PathBuf], dry_run: bool, on_item: &mut dyn FnMut(&ImageOutcome)) -> BatchReport {
    let mut report = BatchReport::default();

    for image in images {
        if !sidecar::has_sidecar(image) {
            report.push(
                image,
                Outcome::Skipped {
                    reason: "no sidecar".to_string(),
                },
                on_item,
            );
            continue;
        }

        let (width, height) = match read_dimensions(image) {
            Ok(dims) => dims,
            Err(e) => {
                report.push(image, Outcome::Failed { error: e.to_string() }, on_item);
                continue;
            }
        };

        let mut meta = sidecar::read(image);
        let before = meta.clone();
        if !meta.set_dimensions(width, height) {
            report.push(
                image,
                Outcome::Skipped {
                    reason: "image has zero size".to_string(),
                },
                on_item,
            );
            continue;
        }
        if meta == before {
            report.push(image, Outcome::Unchanged, on_item);
            continue;
        }

        if !dry_run {
            if let Err(e) = sidecar::write(image, &meta) {
                report.push(image, Outcome::Failed { error: e.to_string() }, on_item);
                continue;
            }
        }
        let outcome = Outcome::Done {
            path: image.clone(),
            renamed: false,
            description: meta.recommended_screen.clone(),
        };
        report.push(image, outcome, on_item);
    }

    report
}
