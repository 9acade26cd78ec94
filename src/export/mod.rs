use anyhow::{bail, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use crate::db::WallpaperRow;

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExportFormat::Json => "JSON",
            ExportFormat::Csv => "CSV",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => bail!("Unknown export format '{}' (expected json or csv)", other),
        }
    }
}

/// Write query results to `writer`. Returns the number of rows written.
pub fn export_rows<W: Write>(rows: &[WallpaperRow], writer: W, format: ExportFormat) -> Result<usize> {
    match format {
        ExportFormat::Json => export_json(rows, writer)?,
        ExportFormat::Csv => export_csv(rows, writer)?,
    }
    Ok(rows.len())
}

/// Export rows to a file, replacing any existing one.
pub fn export_to_path(rows: &[WallpaperRow], output_path: &Path, format: ExportFormat) -> Result<usize> {
    let file = File::create(output_path)?;
    let count = export_rows(rows, BufWriter::new(file), format)?;
    tracing::info!("Exported {} wallpapers to {}", count, output_path.display());
    Ok(count)
}

fn export_json<W: Write>(rows: &[WallpaperRow], mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, rows)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

fn export_csv<W: Write>(rows: &[WallpaperRow], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    // Headers come from the row's field names; none are written for an empty set.
    for row in rows {
        wtr.serialize(row)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn row(id: i64, filename: &str, description: Option<&str>) -> WallpaperRow {
        WallpaperRow {
            id,
            path: format!("/walls/{}", filename),
            filename: filename.to_string(),
            extension: Some(".jpg".to_string()),
            description: description.map(str::to_string),
            scene: None,
            style: Some("photography".to_string()),
            time_of_day: None,
            subject: None,
            source: None,
            ai_model: None,
            width: Some(1920),
            height: Some(1080),
            recommended_screen: Some("1080p".to_string()),
            mtime: 1_700_000_000.5,
        }
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("html".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::Csv.extension(), "csv");
    }

    #[test]
    fn test_export_json() {
        let rows = vec![row(1, "beach.jpg", Some("beach, sunset"))];
        let mut out = Vec::new();
        assert_eq!(export_rows(&rows, &mut out, ExportFormat::Json).unwrap(), 1);

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value[0]["filename"], "beach.jpg");
        assert_eq!(value[0]["width"], 1920);
        assert!(value[0]["scene"].is_null());
    }

    #[test]
    fn test_export_csv_quotes_and_blanks() {
        let rows = vec![row(1, "beach.jpg", Some("beach, sunset")), row(2, "city.jpg", None)];
        let mut out = Vec::new();
        export_rows(&rows, &mut out, ExportFormat::Csv).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("id,path,filename,extension,description"));
        assert!(lines[1].contains("\"beach, sunset\""));
        assert!(lines[2].contains("city.jpg,.jpg,,"));
    }

    #[test]
    fn test_export_to_path() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("walls.json");
        let count = export_to_path(&[row(1, "a.jpg", None)], &output, ExportFormat::Json).unwrap();
        assert_eq!(count, 1);
        assert!(std::fs::read_to_string(&output).unwrap().contains("\"a.jpg\""));
    }
}
