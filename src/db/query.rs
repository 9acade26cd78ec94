//! Filtered search over the index.

use anyhow::Result;
use rusqlite::types::Value;
use rusqlite::Row;
use serde::Serialize;

use super::{Database, Satellite};

pub(crate) const ROW_COLUMNS: &str = "w.id, w.path, w.filename, w.extension, w.description, \
     w.scene, w.style, w.time_of_day, w.subject, w.source, w.ai_model, \
     w.width, w.height, w.recommended_screen, w.mtime";

/// One indexed wallpaper as stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WallpaperRow {
    pub id: i64,
    pub path: String,
    pub filename: String,
    pub extension: Option<String>,
    pub description: Option<String>,
    pub scene: Option<String>,
    pub style: Option<String>,
    pub time_of_day: Option<String>,
    pub subject: Option<String>,
    pub source: Option<String>,
    pub ai_model: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub recommended_screen: Option<String>,
    pub mtime: f64,
}

impl WallpaperRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            path: row.get(1)?,
            filename: row.get(2)?,
            extension: row.get(3)?,
            description: row.get(4)?,
            scene: row.get(5)?,
            style: row.get(6)?,
            time_of_day: row.get(7)?,
            subject: row.get(8)?,
            source: row.get(9)?,
            ai_model: row.get(10)?,
            width: row.get(11)?,
            height: row.get(12)?,
            recommended_screen: row.get(13)?,
            mtime: row.get(14)?,
        })
    }
}

/// Query filters. Every `Some` filter must match (logical AND).
///
/// Text filters are case-insensitive substring matches. Satellite filters
/// match when any value of that relation contains the text.
#[derive(Debug, Clone, Default)]
pub struct WallpaperQuery {
    pub description: Option<String>,
    pub style: Option<String>,
    pub subject: Option<String>,
    pub time_of_day: Option<String>,
    pub screen: Option<String>,
    /// Substring searched in description, scene, style and subject.
    pub search: Option<String>,
    pub tag: Option<String>,
    pub mood: Option<String>,
    pub color: Option<String>,
    pub min_width: Option<u32>,
    pub min_height: Option<u32>,
    /// `Some(0)` means no limit, like `None`.
    pub limit: Option<usize>,
    /// Arbitrary order that changes between calls instead of by filename.
    pub random: bool,
}

impl WallpaperQuery {
    /// Shortcut for a single random pick (`--one`).
    pub fn one(mut self) -> Self {
        self.random = true;
        self.limit = Some(1);
        self
    }

    fn build_sql(&self) -> (String, Vec<Value>) {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        let columns = [
            ("description", &self.description),
            ("style", &self.style),
            ("subject", &self.subject),
            ("time_of_day", &self.time_of_day),
            ("recommended_screen", &self.screen),
        ];
        for (column, filter) in columns {
            if let Some(text) = filter {
                conditions.push(format!("w.{} LIKE ? ESCAPE '\\'", column));
                params.push(Value::Text(like_pattern(text)));
            }
        }

        if let Some(text) = &self.search {
            let pattern = like_pattern(text);
            let fields = ["description", "scene", "style", "subject"];
            let ors: Vec<String> = fields
                .iter()
                .map(|field| format!("w.{} LIKE ? ESCAPE '\\'", field))
                .collect();
            conditions.push(format!("({})", ors.join(" OR ")));
            for _ in fields {
                params.push(Value::Text(pattern.clone()));
            }
        }

        for (satellite, filter) in [
            (Satellite::Tags, &self.tag),
            (Satellite::Moods, &self.mood),
            (Satellite::Colors, &self.color),
        ] {
            if let Some(text) = filter {
                conditions.push(format!(
                    "EXISTS (SELECT 1 FROM {table} s WHERE s.wallpaper_id = w.id AND s.{col} LIKE ? ESCAPE '\\')",
                    table = satellite.table(),
                    col = satellite.column()
                ));
                params.push(Value::Text(like_pattern(text)));
            }
        }

        if let Some(min) = self.min_width {
            conditions.push("w.width >= ?".to_string());
            params.push(Value::Integer(min as i64));
        }
        if let Some(min) = self.min_height {
            conditions.push("w.height >= ?".to_string());
            params.push(Value::Integer(min as i64));
        }

        let mut sql = format!("SELECT DISTINCT {} FROM wallpapers w", ROW_COLUMNS);
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        if self.random {
            sql.push_str(" ORDER BY RANDOM()");
        } else {
            sql.push_str(" ORDER BY w.filename, w.path");
        }
        // zero means no limit
        if let Some(limit) = self.limit.filter(|&limit| limit > 0) {
            sql.push_str(" LIMIT ?");
            params.push(Value::Integer(limit.min(i64::MAX as usize) as i64));
        }

        (sql, params)
    }
}

/// `%text%` with LIKE wildcards in `text` escaped.
fn like_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

impl Database {
    pub fn query(&self, query: &WallpaperQuery) -> Result<Vec<WallpaperRow>> {
        let (sql, params) = query.build_sql();
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params), WallpaperRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
