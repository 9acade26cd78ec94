use anyhow::{Context, Result};
use image::ImageFormat;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Enough header bytes for every format `image` can sniff.
const SNIFF_LEN: usize = 64;

/// Pixel dimensions read from the image header, without decoding pixels.
pub fn read_dimensions(path: &Path) -> Result<(u32, u32)> {
    let reader = image::ImageReader::open(path)
        .with_context(|| format!("opening {}", path.display()))?
        .with_guessed_format()?;
    let dims = reader
        .into_dimensions()
        .with_context(|| format!("reading dimensions of {}", path.display()))?;
    Ok(dims)
}

/// Format detected from the file's magic bytes, `None` when unrecognised.
pub fn detect_format(path: &Path) -> Result<Option<ImageFormat>> {
    let mut header = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut header)?;
    Ok(image::guess_format(&header).ok())
}

/// Canonical lowercase extension for a detected format.
pub fn format_extension(format: ImageFormat) -> Option<&'static str> {
    format.extensions_str().first().copied()
}

/// Whether `extension` is a valid spelling for `format` (`jpeg` for JPEG, `tif` for TIFF).
pub fn extension_matches(format: ImageFormat, extension: &str) -> bool {
    let extension = extension.to_lowercase();
    format.extensions_str().iter().any(|e| *e == extension)
}
