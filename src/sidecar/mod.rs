//! XMP sidecar files holding per-image metadata.
//!
//! A sidecar lives next to its image and is named by appending `.xmp` to the
//! image's full filename (`sunset.jpg` -> `sunset.jpg.xmp`). The mapping is
//! never stored anywhere else.

mod xmp;

use anyhow::{bail, Result};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::SidecarError;
use crate::metadata::ImageMetadata;

pub use xmp::{NS_DC, NS_RDF, NS_WALLSORT, NS_X};

pub const SIDECAR_EXTENSION: &str = "xmp";

/// Sidecar path for an image.
pub fn sidecar_path(image_path: &Path) -> PathBuf {
    let mut name: OsString = image_path.as_os_str().to_owned();
    name.push(".");
    name.push(SIDECAR_EXTENSION);
    PathBuf::from(name)
}

pub fn is_sidecar(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(SIDECAR_EXTENSION))
        .unwrap_or(false)
}

/// Image a sidecar belongs to (`a.jpg.xmp` -> `a.jpg`).
pub fn image_for_sidecar(sidecar: &Path) -> Option<PathBuf> {
    if !is_sidecar(sidecar) {
        return None;
    }
    let stem = sidecar.file_stem()?;
    Some(sidecar.with_file_name(stem))
}

pub fn has_sidecar(image_path: &Path) -> bool {
    sidecar_path(image_path).is_file()
}

/// Read an image's sidecar, reporting exactly why it could not be used.
pub fn try_read(image_path: &Path) -> Result<ImageMetadata, SidecarError> {
    let path = sidecar_path(image_path);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SidecarError::NotFound(path));
        }
        Err(e) => return Err(SidecarError::Io(e)),
    };
    xmp::parse(&content)
}

/// Read an image's sidecar, falling back to an empty record.
///
/// Missing and malformed sidecars both yield `ImageMetadata::default()` so
/// that metadata problems never block file operations.
pub fn read(image_path: &Path) -> ImageMetadata {
    match try_read(image_path) {
        Ok(meta) => meta,
        Err(SidecarError::NotFound(_)) => ImageMetadata::default(),
        Err(e) => {
            tracing::warn!("Ignoring unreadable sidecar for {}: {}", image_path.display(), e);
            ImageMetadata::default()
        }
    }
}

/// Write `meta` to the image's sidecar, replacing any previous content.
pub fn write(image_path: &Path, meta: &ImageMetadata) -> Result<(), SidecarError> {
    let document = xmp::render(meta)?;
    let path = sidecar_path(image_path);

    let mut writer = BufWriter::new(File::create(&path)?);
    writer.write_all(&document)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;

    tracing::debug!("Wrote sidecar {}", path.display());
    Ok(())
}

/// Move the sidecar of `old_image` so it follows the image to `new_image`.
///
/// Returns `Ok(false)` when there was no sidecar to move. Fails rather than
/// overwrite a sidecar that already exists at the destination.
pub fn rename_with_image(old_image: &Path, new_image: &Path) -> Result<bool> {
    let old_sidecar = sidecar_path(old_image);
    if !old_sidecar.exists() {
        return Ok(false);
    }

    let new_sidecar = sidecar_path(new_image);
    if new_sidecar.exists() {
        bail!("sidecar target '{}' already exists", new_sidecar.display());
    }

    fs::rename(&old_sidecar, &new_sidecar)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn full_record() -> ImageMetadata {
        ImageMetadata {
            description: "golden hour beach".to_string(),
            scene: "Waves roll onto an empty beach as the sun sets. Warm & calm <light>.".to_string(),
            tags: vec!["beach".to_string(), "ocean".to_string(), "sunset".to_string()],
            mood: vec!["peaceful".to_string(), "warm".to_string()],
            style: "photography".to_string(),
            colors: vec!["orange".to_string(), "blue".to_string()],
            time_of_day: "golden hour".to_string(),
            subject: "landscape".to_string(),
            source: "https://example.com/a?b=1&c=2".to_string(),
            ai_model: "llava:13b".to_string(),
            width: Some(3840),
            height: Some(2160),
            recommended_screen: "4K".to_string(),
        }
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("/walls/sunset.jpg")),
            PathBuf::from("/walls/sunset.jpg.xmp")
        );
        assert_eq!(
            image_for_sidecar(Path::new("/walls/sunset.jpg.xmp")),
            Some(PathBuf::from("/walls/sunset.jpg"))
        );
        assert_eq!(image_for_sidecar(Path::new("/walls/sunset.jpg")), None);
    }

    #[test]
    fn test_missing_sidecar_reads_empty() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("nothing.jpg");

        assert!(matches!(try_read(&image), Err(SidecarError::NotFound(_))));
        assert!(read(&image).is_empty());
    }

    #[test]
    fn test_round_trip_full_record() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("beach.jpg");
        let meta = full_record();

        write(&image, &meta).unwrap();
        assert!(has_sidecar(&image));
        assert_eq!(read(&image), meta);
    }

    #[test]
    fn test_round_trip_empty_record() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("blank.png");

        write(&image, &ImageMetadata::default()).unwrap();
        let back = try_read(&image).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn test_round_trip_sparse_records() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("sparse.jpg");

        let only_tags = ImageMetadata {
            tags: vec!["a".to_string(), "b".to_string()],
            ..Default::default()
        };
        write(&image, &only_tags).unwrap();
        assert_eq!(read(&image), only_tags);

        let only_scalars = ImageMetadata {
            style: "anime".to_string(),
            height: Some(1080),
            ..Default::default()
        };
        write(&image, &only_scalars).unwrap();
        assert_eq!(read(&image), only_scalars);
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("one.jpg");
        let meta = ImageMetadata {
            description: "just this".to_string(),
            ..Default::default()
        };

        write(&image, &meta).unwrap();
        let xml = fs::read_to_string(sidecar_path(&image)).unwrap();
        assert!(xml.contains("just this"));
        assert!(!xml.contains("dc:subject"));
        assert!(!xml.contains("wallsort:mood"));
        assert!(!xml.contains("wallsort:width"));
    }

    #[test]
    fn test_malformed_sidecar_reads_empty() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("broken.jpg");
        fs::write(
            sidecar_path(&image),
            "<x:xmpmeta xmlns:x=\"adobe:ns:meta/\"><rdf:RDF xmlns:rdf=\"http://www.w3.org/1999/02/22-rdf-syntax-ns#\"><rdf:Description>",
        )
        .unwrap();

        assert!(matches!(try_read(&image), Err(SidecarError::Parse(_))));
        assert!(read(&image).is_empty());
    }

    #[test]
    fn test_reads_plain_description_with_other_prefixes() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("foreign.jpg");
        let xml = format!(
            r#"<?xml version="1.0"?>
<meta:xmpmeta xmlns:meta="{x}">
  <r:RDF xmlns:r="{rdf}">
    <r:Description xmlns:d="{dc}" xmlns:w="{ws}">
      <d:description>Plain text description</d:description>
      <d:subject><r:Bag><r:li>one</r:li><r:li>two</r:li></r:Bag></d:subject>
      <w:width>not a number</w:width>
      <w:unknown>ignored</w:unknown>
    </r:Description>
  </r:RDF>
</meta:xmpmeta>
"#,
            x = NS_X,
            rdf = NS_RDF,
            dc = NS_DC,
            ws = NS_WALLSORT
        );
        fs::write(sidecar_path(&image), xml).unwrap();

        let meta = try_read(&image).unwrap();
        assert_eq!(meta.description, "Plain text description");
        assert_eq!(meta.tags, vec!["one", "two"]);
        assert_eq!(meta.width, None);
    }

    #[test]
    fn test_write_overwrites_previous_content() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("over.jpg");

        write(&image, &full_record()).unwrap();
        let replacement = ImageMetadata {
            colors: vec!["green".to_string()],
            ..Default::default()
        };
        write(&image, &replacement).unwrap();

        assert_eq!(read(&image), replacement);
    }

    #[test]
    fn test_rename_with_image() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("Old Name.jpg");
        let new = dir.path().join("old_name.jpg");

        assert!(!rename_with_image(&old, &new).unwrap());

        write(&old, &full_record()).unwrap();
        assert!(rename_with_image(&old, &new).unwrap());
        assert!(!sidecar_path(&old).exists());
        assert_eq!(read(&new), full_record());

        write(&old, &ImageMetadata::default()).unwrap();
        assert!(rename_with_image(&old, &new).is_err());
    }
}
