//! Walks a collection and mirrors its sidecars into the index.

use anyhow::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::db::{Database, UpsertOutcome};
use crate::error::ensure_dir;
use crate::sidecar;

use super::discover_images;

#[derive(Debug, Clone, Copy)]
pub struct IndexOptions {
    pub recursive: bool,
    /// Drop index rows for in-scope images that no longer exist.
    pub prune: bool,
    /// Clear the whole index before indexing.
    pub rebuild: bool,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            prune: false,
            rebuild: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Images enumerated under the root.
    pub found: usize,
    /// Images written to the index (inserted or replaced).
    pub indexed: usize,
    /// Images skipped because their watermark was current.
    pub unchanged: usize,
    /// Images enumerated without a sidecar.
    pub without_sidecar: usize,
    /// Rows removed by pruning, when it ran.
    pub pruned: Option<usize>,
}

#[derive(Debug, Clone)]
pub enum IndexProgress {
    Started { total_files: usize },
    Indexing { current: usize, total: usize, path: String },
    Completed { indexed: usize, unchanged: usize },
}

pub struct Indexer {
    extensions: Vec<String>,
}

impl Indexer {
    pub fn new(extensions: Vec<String>) -> Self {
        Self { extensions }
    }

    pub fn run(
        &self,
        db: &Database,
        root: &Path,
        options: &IndexOptions,
        progress_tx: Option<mpsc::Sender<IndexProgress>>,
    ) -> Result<IndexReport> {
        ensure_dir(root)?;

        if options.rebuild {
            tracing::info!("Clearing index before rebuild");
            db.clear()?;
        }

        let images = discover_images(root, options.recursive, &self.extensions)?;
        let total = images.len();
        if let Some(ref tx) = progress_tx {
            let _ = tx.send(IndexProgress::Started { total_files: total });
        }

        let mut report = IndexReport {
            found: total,
            ..Default::default()
        };

        for (index, image) in images.iter().enumerate() {
            if let Some(ref tx) = progress_tx {
                let _ = tx.send(IndexProgress::Indexing {
                    current: index + 1,
                    total,
                    path: image.to_string_lossy().to_string(),
                });
            }

            if !sidecar::has_sidecar(image) {
                report.without_sidecar += 1;
                continue;
            }

            let meta = sidecar::read(image);
            match db.upsert(image, &meta)? {
                UpsertOutcome::Unchanged => report.unchanged += 1,
                UpsertOutcome::Inserted | UpsertOutcome::Replaced => report.indexed += 1,
            }
        }

        if options.prune {
            let valid: HashSet<String> = images
                .iter()
                .map(|p: &PathBuf| p.to_string_lossy().to_string())
                .collect();
            report.pruned = Some(prune_in_scope(db, root, options.recursive, &valid)?);
        }

        if let Some(ref tx) = progress_tx {
            let _ = tx.send(IndexProgress::Completed {
                indexed: report.indexed,
                unchanged: report.unchanged,
            });
        }

        tracing::info!(
            "Indexed {}: {} found, {} indexed, {} unchanged",
            root.display(),
            report.found,
            report.indexed,
            report.unchanged
        );
        Ok(report)
    }
}

/// Prune in-scope rows that are not in `valid`. Rows outside the walked
/// directories are kept.
fn prune_in_scope(db: &Database, root: &Path, recursive: bool, valid: &HashSet<String>) -> Result<usize> {
    let mut keep = valid.clone();
    for row in db.query(&Default::default())? {
        let path = Path::new(&row.path);
        let in_scope = if recursive {
            path.starts_with(root)
        } else {
            path.parent() == Some(root)
        };
        if !in_scope {
            keep.insert(row.path);
        }
    }
    db.prune(&keep)
}

/// Index every image with a sidecar under `root`.
pub fn index_collection(
    db: &Database,
    root: &Path,
    options: &IndexOptions,
    extensions: &[String],
) -> Result<IndexReport> {
    Indexer::new(extensions.to_vec()).run(db, root, options, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Satellite;
    use crate::error::WallsortError;
    use crate::metadata::ImageMetadata;
    use crate::sanitize::sanitize_filename;
    use std::fs::{self, File};
    use tempfile::tempdir;

    fn exts() -> Vec<String> {
        vec!["jpg".to_string(), "png".to_string()]
    }

    fn db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    #[test]
    fn test_end_to_end_sanitize_then_index() {
        let dir = tempdir().unwrap();
        let original = dir.path().join("Beach Sunset!.jpg");
        File::create(&original).unwrap();

        let new_name = sanitize_filename("Beach Sunset!.jpg");
        assert_eq!(new_name, "beach_sunset.jpg");
        let renamed = dir.path().join(&new_name);
        fs::rename(&original, &renamed).unwrap();

        let db = db();
        let report = index_collection(&db, dir.path(), &IndexOptions::default(), &exts()).unwrap();
        assert_eq!(report.found, 1);
        assert_eq!(report.indexed, 0);
        assert_eq!(db.count().unwrap(), 0);

        let meta = ImageMetadata {
            description: "golden hour beach".to_string(),
            ..Default::default()
        };
        sidecar::write(&renamed, &meta).unwrap();

        let report = index_collection(&db, dir.path(), &IndexOptions::default(), &exts()).unwrap();
        assert_eq!(report.indexed, 1);
        assert_eq!(db.count().unwrap(), 1);

        let row = db.get(&renamed).unwrap().unwrap();
        assert_eq!(row.description.as_deref(), Some("golden hour beach"));
        for satellite in Satellite::ALL {
            assert_eq!(db.satellite_count(satellite).unwrap(), 0);
        }
    }

    #[test]
    fn test_reindex_is_a_no_op() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("a.jpg");
        File::create(&image).unwrap();
        sidecar::write(
            &image,
            &ImageMetadata {
                tags: vec!["x".to_string()],
                ..Default::default()
            },
        )
        .unwrap();

        let db = db();
        let first = index_collection(&db, dir.path(), &IndexOptions::default(), &exts()).unwrap();
        let second = index_collection(&db, dir.path(), &IndexOptions::default(), &exts()).unwrap();

        assert_eq!(first.indexed, 1);
        assert_eq!(second.indexed, 0);
        assert_eq!(second.unchanged, 1);
        assert_eq!(db.satellite_count(Satellite::Tags).unwrap(), 1);
    }

    #[test]
    fn test_prune_only_touches_scope() {
        let dir = tempdir().unwrap();
        let keep = dir.path().join("keep.jpg");
        let gone = dir.path().join("gone.jpg");
        for image in [&keep, &gone] {
            File::create(image).unwrap();
            sidecar::write(image, &ImageMetadata { description: "x".to_string(), ..Default::default() })
                .unwrap();
        }

        let db = db();
        index_collection(&db, dir.path(), &IndexOptions::default(), &exts()).unwrap();
        db.upsert_with_mtime(Path::new("/elsewhere/other.jpg"), &ImageMetadata::default(), 1.0)
            .unwrap();
        assert_eq!(db.count().unwrap(), 3);

        fs::remove_file(&gone).unwrap();
        let options = IndexOptions {
            prune: true,
            ..Default::default()
        };
        let report = index_collection(&db, dir.path(), &options, &exts()).unwrap();

        assert_eq!(report.pruned, Some(1));
        assert!(db.get(&gone).unwrap().is_none());
        assert!(db.get(&keep).unwrap().is_some());
        assert!(db.get(Path::new("/elsewhere/other.jpg")).unwrap().is_some());
    }

    #[test]
    fn test_non_recursive_and_rebuild() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let top = dir.path().join("top.png");
        let nested = dir.path().join("sub/nested.jpg");
        for image in [&top, &nested] {
            File::create(image).unwrap();
            sidecar::write(image, &ImageMetadata { style: "anime".to_string(), ..Default::default() })
                .unwrap();
        }

        let db = db();
        let options = IndexOptions {
            recursive: false,
            ..Default::default()
        };
        let report = index_collection(&db, dir.path(), &options, &exts()).unwrap();
        assert_eq!(report.found, 1);
        assert_eq!(db.count().unwrap(), 1);

        let options = IndexOptions {
            rebuild: true,
            ..Default::default()
        };
        let report = index_collection(&db, dir.path(), &options, &exts()).unwrap();
        assert_eq!(report.indexed, 2);
        assert_eq!(db.count().unwrap(), 2);
    }

    #[test]
    fn test_progress_messages() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("a.jpg")).unwrap();

        let (tx, rx) = mpsc::channel();
        let db = db();
        Indexer::new(exts())
            .run(&db, dir.path(), &IndexOptions::default(), Some(tx))
            .unwrap();

        let messages: Vec<IndexProgress> = rx.iter().collect();
        assert!(matches!(messages.first(), Some(IndexProgress::Started { total_files: 1 })));
        assert!(matches!(
            messages.last(),
            Some(IndexProgress::Completed { indexed: 0, unchanged: 0 })
        ));
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        let db = db();
        let err = index_collection(&db, &dir.path().join("nope"), &IndexOptions::default(), &exts())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WallsortError>(),
            Some(WallsortError::PathNotFound(_))
        ));
    }
}
