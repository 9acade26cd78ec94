mod query;
mod schema;
mod stats;

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use std::time::UNIX_EPOCH;

pub use query::{WallpaperQuery, WallpaperRow};
pub use schema::{Satellite, SCHEMA};
pub use stats::CollectionStats;

use crate::metadata::ImageMetadata;
use crate::sidecar;

/// What an upsert did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    /// Stored watermark matched the sidecar; nothing was written.
    Unchanged,
}

/// SQLite index of sidecar metadata.
pub struct Database {
    pub(crate) conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening index {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // Cascading satellite deletes depend on this, and it is per connection.
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Remove every wallpaper and its satellite rows.
    pub fn clear(&self) -> Result<()> {
        self.conn.execute("DELETE FROM wallpapers", [])?;
        Ok(())
    }

    /// Index `image_path` using its sidecar's modification time as watermark.
    pub fn upsert(&self, image_path: &Path, meta: &ImageMetadata) -> Result<UpsertOutcome> {
        let sidecar = sidecar::sidecar_path(image_path);
        let modified = std::fs::metadata(&sidecar)
            .and_then(|m| m.modified())
            .with_context(|| format!("reading mtime of {}", sidecar.display()))?;
        let mtime = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        self.upsert_with_mtime(image_path, meta, mtime)
    }

    /// Index `image_path` with an explicit watermark.
    ///
    /// Skips the write when the stored watermark equals `mtime`. Otherwise the
    /// old row (and through the cascade its satellites) is deleted and a fresh
    /// row is inserted in one transaction.
    pub fn upsert_with_mtime(
        &self,
        image_path: &Path,
        meta: &ImageMetadata,
        mtime: f64,
    ) -> Result<UpsertOutcome> {
        let path_str = image_path.to_string_lossy();

        let existing = self.watermark(&path_str)?;
        if existing == Some(mtime) {
            return Ok(UpsertOutcome::Unchanged);
        }

        let filename = image_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path_str.to_string());
        let extension = image_path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()));

        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM wallpapers WHERE path = ?", [path_str.as_ref()])?;
        tx.execute(
            r#"
            INSERT INTO wallpapers (
                path, filename, extension,
                description, scene, style, time_of_day, subject, source, ai_model,
                width, height, recommended_screen, mtime
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                path_str,
                filename,
                extension,
                non_empty(&meta.description),
                non_empty(&meta.scene),
                non_empty(&meta.style),
                non_empty(&meta.time_of_day),
                non_empty(&meta.subject),
                non_empty(&meta.source),
                non_empty(&meta.ai_model),
                meta.width,
                meta.height,
                non_empty(&meta.recommended_screen),
                mtime,
            ],
        )?;
        let wallpaper_id = tx.last_insert_rowid();

        for (satellite, values) in [
            (Satellite::Tags, &meta.tags),
            (Satellite::Moods, &meta.mood),
            (Satellite::Colors, &meta.colors),
        ] {
            let sql = format!(
                "INSERT INTO {} (wallpaper_id, {}) VALUES (?, ?)",
                satellite.table(),
                satellite.column()
            );
            let mut stmt = tx.prepare(&sql)?;
            for value in values.iter().filter(|v| !v.is_empty()) {
                stmt.execute(params![wallpaper_id, value])?;
            }
        }
        tx.commit()?;

        tracing::debug!("Indexed {}", path_str);
        Ok(if existing.is_some() {
            UpsertOutcome::Replaced
        } else {
            UpsertOutcome::Inserted
        })
    }

    /// Stored watermark for `path`, if the path is indexed.
    pub fn watermark(&self, path: &str) -> Result<Option<f64>> {
        let mtime = self
            .conn
            .query_row("SELECT mtime FROM wallpapers WHERE path = ?", [path], |row| row.get(0))
            .optional()?;
        Ok(mtime)
    }

    pub fn get(&self, path: &Path) -> Result<Option<WallpaperRow>> {
        let path_str = path.to_string_lossy();
        let sql = format!("SELECT {} FROM wallpapers w WHERE w.path = ?", query::ROW_COLUMNS);
        let row = self
            .conn
            .query_row(&sql, [path_str.as_ref()], WallpaperRow::from_row)
            .optional()?;
        Ok(row)
    }

    /// Values of one satellite relation for `path`, in insertion order.
    pub fn satellite_values(&self, path: &Path, satellite: Satellite) -> Result<Vec<String>> {
        let path_str = path.to_string_lossy();
        let sql = format!(
            "SELECT s.{col} FROM {table} s JOIN wallpapers w ON w.id = s.wallpaper_id \
             WHERE w.path = ? ORDER BY s.id",
            col = satellite.column(),
            table = satellite.table()
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let values = stmt
            .query_map([path_str.as_ref()], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(values)
    }

    /// Number of rows in a satellite table across the whole store.
    pub fn satellite_count(&self, satellite: Satellite) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", satellite.table());
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM wallpapers", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Delete every wallpaper whose path is not in `valid_paths`.
    pub fn prune(&self, valid_paths: &HashSet<String>) -> Result<usize> {
        let stale: Vec<i64> = {
            let mut stmt = self.conn.prepare("SELECT id, path FROM wallpapers")?;
            let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
            let mut stale = Vec::new();
            for row in rows {
                let (id, path) = row?;
                if !valid_paths.contains(&path) {
                    stale.push(id);
                }
            }
            stale
        };

        if stale.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare("DELETE FROM wallpapers WHERE id = ?")?;
            for id in &stale {
                stmt.execute([id])?;
            }
        }
        tx.commit()?;

        tracing::info!("Pruned {} stale index entries", stale.len());
        Ok(stale.len())
    }
}

fn non_empty(value: &str) -> Option<&str> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    fn db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn tagged(tags: &[&str]) -> ImageMetadata {
        ImageMetadata {
            description: "test image".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_upsert_is_idempotent_for_same_watermark() {
        let db = db();
        let path = PathBuf::from("/walls/a.jpg");
        let meta = tagged(&["nature", "sky"]);

        assert_eq!(db.upsert_with_mtime(&path, &meta, 100.0).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(db.upsert_with_mtime(&path, &meta, 100.0).unwrap(), UpsertOutcome::Unchanged);

        assert_eq!(db.count().unwrap(), 1);
        assert_eq!(db.satellite_count(Satellite::Tags).unwrap(), 2);
    }

    #[test]
    fn test_unchanged_watermark_ignores_new_content() {
        let db = db();
        let path = PathBuf::from("/walls/a.jpg");

        db.upsert_with_mtime(&path, &tagged(&["a"]), 5.0).unwrap();
        db.upsert_with_mtime(&path, &tagged(&["b"]), 5.0).unwrap();

        assert_eq!(db.satellite_values(&path, Satellite::Tags).unwrap(), vec!["a"]);
    }

    #[test]
    fn test_upsert_replaces_satellites_fully() {
        let db = db();
        let path = PathBuf::from("/walls/a.jpg");

        db.upsert_with_mtime(&path, &tagged(&["a", "b"]), 1.0).unwrap();
        let outcome = db.upsert_with_mtime(&path, &tagged(&["c"]), 2.0).unwrap();

        assert_eq!(outcome, UpsertOutcome::Replaced);
        assert_eq!(db.satellite_values(&path, Satellite::Tags).unwrap(), vec!["c"]);
        assert_eq!(db.satellite_count(Satellite::Tags).unwrap(), 1);
        assert_eq!(db.count().unwrap(), 1);
    }

    #[test]
    fn test_upsert_stores_scalars_and_nulls_empties() {
        let db = db();
        let path = PathBuf::from("/walls/Ocean.JPG");
        let meta = ImageMetadata {
            description: "calm sea".to_string(),
            mood: vec!["calm".to_string()],
            colors: vec!["blue".to_string(), "white".to_string()],
            width: Some(3840),
            height: Some(2160),
            recommended_screen: "4K".to_string(),
            ..Default::default()
        };
        db.upsert_with_mtime(&path, &meta, 1.5).unwrap();

        let row = db.get(&path).unwrap().unwrap();
        assert_eq!(row.filename, "Ocean.JPG");
        assert_eq!(row.extension.as_deref(), Some(".jpg"));
        assert_eq!(row.description.as_deref(), Some("calm sea"));
        assert_eq!(row.style, None);
        assert_eq!(row.width, Some(3840));
        assert_eq!(row.recommended_screen.as_deref(), Some("4K"));
        assert_eq!(row.mtime, 1.5);

        assert_eq!(db.satellite_values(&path, Satellite::Moods).unwrap(), vec!["calm"]);
        assert_eq!(db.satellite_values(&path, Satellite::Colors).unwrap(), vec!["blue", "white"]);
        assert!(db.get(Path::new("/walls/missing.jpg")).unwrap().is_none());
    }

    #[test]
    fn test_upsert_reads_sidecar_mtime() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("a.jpg");
        let meta = tagged(&["x"]);
        sidecar::write(&image, &meta).unwrap();

        let first = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        File::options()
            .write(true)
            .open(sidecar::sidecar_path(&image))
            .unwrap()
            .set_modified(first)
            .unwrap();

        let db = db();
        assert_eq!(db.upsert(&image, &meta).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(db.upsert(&image, &meta).unwrap(), UpsertOutcome::Unchanged);
        assert_eq!(
            db.watermark(&image.to_string_lossy()).unwrap(),
            Some(1_700_000_000.0)
        );

        File::options()
            .write(true)
            .open(sidecar::sidecar_path(&image))
            .unwrap()
            .set_modified(first + Duration::from_secs(60))
            .unwrap();
        assert_eq!(db.upsert(&image, &meta).unwrap(), UpsertOutcome::Replaced);
    }

    #[test]
    fn test_upsert_without_sidecar_fails() {
        let dir = tempdir().unwrap();
        let db = db();
        assert!(db.upsert(&dir.path().join("none.jpg"), &tagged(&[])).is_err());
    }

    #[test]
    fn test_prune_removes_only_invalid_paths() {
        let db = db();
        for (i, name) in ["/w/a.jpg", "/w/b.jpg", "/w/c.jpg"].iter().enumerate() {
            db.upsert_with_mtime(Path::new(name), &tagged(&["t"]), i as f64).unwrap();
        }

        let valid: HashSet<String> = ["/w/a.jpg", "/w/c.jpg"].iter().map(|s| s.to_string()).collect();
        assert_eq!(db.prune(&valid).unwrap(), 1);
        assert_eq!(db.count().unwrap(), 2);
        assert!(db.get(Path::new("/w/b.jpg")).unwrap().is_none());
        assert_eq!(db.satellite_count(Satellite::Tags).unwrap(), 2);

        assert_eq!(db.prune(&valid).unwrap(), 0);
    }

    #[test]
    fn test_clear_cascades() {
        let db = db();
        db.upsert_with_mtime(Path::new("/w/a.jpg"), &tagged(&["a", "b"]), 1.0).unwrap();

        db.clear().unwrap();
        assert_eq!(db.count().unwrap(), 0);
        for satellite in Satellite::ALL {
            assert_eq!(db.satellite_count(satellite).unwrap(), 0);
        }
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("index.db");

        let db = Database::open(&path).unwrap();
        db.initialize().unwrap();
        db.initialize().unwrap();
        assert!(path.exists());
    }
}
