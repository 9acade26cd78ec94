use anyhow::Result;
use serde::Serialize;

use super::{Database, Satellite};

const TOP_TAGS: usize = 20;
const TOP_MOODS: usize = 10;
const TOP_COLORS: usize = 10;

/// Aggregate counts over the index. Grouped lists are `(value, count)`
/// sorted by count descending, then value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub total: usize,
    pub with_description: usize,
    pub by_screen: Vec<(String, usize)>,
    pub by_style: Vec<(String, usize)>,
    pub by_subject: Vec<(String, usize)>,
    pub top_tags: Vec<(String, usize)>,
    pub top_moods: Vec<(String, usize)>,
    pub top_colors: Vec<(String, usize)>,
}

impl Database {
    pub fn stats(&self) -> Result<CollectionStats> {
        let total = self.count()?;
        let with_description: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM wallpapers WHERE description IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        Ok(CollectionStats {
            total,
            with_description: with_description as usize,
            by_screen: self.group_counts("recommended_screen")?,
            by_style: self.group_counts("style")?,
            by_subject: self.group_counts("subject")?,
            top_tags: self.satellite_counts(Satellite::Tags, TOP_TAGS)?,
            top_moods: self.satellite_counts(Satellite::Moods, TOP_MOODS)?,
            top_colors: self.satellite_counts(Satellite::Colors, TOP_COLORS)?,
        })
    }

    fn group_counts(&self, column: &str) -> Result<Vec<(String, usize)>> {
        let sql = format!(
            "SELECT {col}, COUNT(*) AS n FROM wallpapers WHERE {col} IS NOT NULL \
             GROUP BY {col} ORDER BY n DESC, {col}",
            col = column
        );
        self.counts(&sql)
    }

    fn satellite_counts(&self, satellite: Satellite, limit: usize) -> Result<Vec<(String, usize)>> {
        let sql = format!(
            "SELECT {col}, COUNT(*) AS n FROM {table} GROUP BY {col} ORDER BY n DESC, {col} LIMIT {limit}",
            col = satellite.column(),
            table = satellite.table(),
            limit = limit
        );
        self.counts(&sql)
    }

    fn counts(&self, sql: &str) -> Result<Vec<(String, usize)>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
