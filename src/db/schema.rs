pub const SCHEMA: &str = r#"
-- Wallpapers table: one row per indexed image, mirrored from its sidecar
CREATE TABLE IF NOT EXISTS wallpapers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL UNIQUE,
    filename TEXT NOT NULL,
    extension TEXT,

    -- Sidecar metadata
    description TEXT,
    scene TEXT,
    style TEXT,
    time_of_day TEXT,
    subject TEXT,
    source TEXT,
    ai_model TEXT,

    -- Dimensions
    width INTEGER,
    height INTEGER,
    recommended_screen TEXT,

    -- Sidecar modification time (seconds) when last indexed
    mtime REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_wallpapers_description ON wallpapers(description);
CREATE INDEX IF NOT EXISTS idx_wallpapers_style ON wallpapers(style);
CREATE INDEX IF NOT EXISTS idx_wallpapers_subject ON wallpapers(subject);
CREATE INDEX IF NOT EXISTS idx_wallpapers_time_of_day ON wallpapers(time_of_day);
CREATE INDEX IF NOT EXISTS idx_wallpapers_screen ON wallpapers(recommended_screen);
CREATE INDEX IF NOT EXISTS idx_wallpapers_width ON wallpapers(width);
CREATE INDEX IF NOT EXISTS idx_wallpapers_height ON wallpapers(height);

-- Satellite tables: many values per wallpaper
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    wallpaper_id INTEGER NOT NULL,
    tag TEXT NOT NULL,
    FOREIGN KEY (wallpaper_id) REFERENCES wallpapers(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS moods (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    wallpaper_id INTEGER NOT NULL,
    mood TEXT NOT NULL,
    FOREIGN KEY (wallpaper_id) REFERENCES wallpapers(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS colors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    wallpaper_id INTEGER NOT NULL,
    color TEXT NOT NULL,
    FOREIGN KEY (wallpaper_id) REFERENCES wallpapers(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_tags_tag ON tags(tag);
CREATE INDEX IF NOT EXISTS idx_tags_wallpaper ON tags(wallpaper_id);
CREATE INDEX IF NOT EXISTS idx_moods_mood ON moods(mood);
CREATE INDEX IF NOT EXISTS idx_moods_wallpaper ON moods(wallpaper_id);
CREATE INDEX IF NOT EXISTS idx_colors_color ON colors(color);
CREATE INDEX IF NOT EXISTS idx_colors_wallpaper ON colors(wallpaper_id);
"#;

/// Satellite relation: table name and value column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Satellite {
    Tags,
    Moods,
    Colors,
}

impl Satellite {
    pub const ALL: [Satellite; 3] = [Satellite::Tags, Satellite::Moods, Satellite::Colors];

    pub fn table(self) -> &'static str {
        match self {
            Satellite::Tags => "tags",
            Satellite::Moods => "moods",
            Satellite::Colors => "colors",
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Satellite::Tags => "tag",
            Satellite::Moods => "mood",
            Satellite::Colors => "color",
        }
    }
}
