pub mod parser;

pub use parser::{parse_response, FieldValue, ParsedMetadata};

/// Descriptive metadata for a single wallpaper, mirrored in its XMP sidecar.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    /// Short description, also used to derive filenames.
    pub description: String,
    /// One to three sentences of prose about the image.
    pub scene: String,
    pub tags: Vec<String>,
    pub mood: Vec<String>,
    pub style: String,
    pub colors: Vec<String>,
    pub time_of_day: String,
    pub subject: String,
    /// Free-form provenance (URL, artist, ...).
    pub source: String,
    /// Name of the model that generated the description.
    pub ai_model: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub recommended_screen: String,
}

impl ImageMetadata {
    /// True when no field carries a value, i.e. "no metadata yet".
    pub fn is_empty(&self) -> bool {
        self.description.is_empty()
            && self.scene.is_empty()
            && self.tags.is_empty()
            && self.mood.is_empty()
            && self.style.is_empty()
            && self.colors.is_empty()
            && self.time_of_day.is_empty()
            && self.subject.is_empty()
            && self.source.is_empty()
            && self.ai_model.is_empty()
            && self.width.is_none()
            && self.height.is_none()
            && self.recommended_screen.is_empty()
    }

    /// Append tags that are not already present, keeping order.
    pub fn add_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            if !tag.is_empty() && !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
    }

    /// Record pixel dimensions and derive the recommended screen.
    ///
    /// Returns false (and leaves the record untouched) for zero dimensions.
    pub fn set_dimensions(&mut self, width: u32, height: u32) -> bool {
        if width == 0 || height == 0 {
            return false;
        }
        self.width = Some(width);
        self.height = Some(height);
        self.recommended_screen = recommended_screen(width, height);
        true
    }
}

/// Split a comma-separated user list ("a, b,,c") into trimmed items.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Best display class for an image of the given size.
///
/// The resolution tier comes from the short side so that portrait and
/// ultrawide images are classed by the screen height they can fill.
pub fn recommended_screen(width: u32, height: u32) -> String {
    let short = width.min(height);
    let long = width.max(height);

    let tier = match short {
        s if s >= 4320 => "8K",
        s if s >= 2880 => "5K",
        s if s >= 2160 => "4K",
        s if s >= 1440 => "1440p",
        s if s >= 1080 => "1080p",
        s if s >= 720 => "720p",
        _ => "SD",
    };

    if height > width {
        format!("Portrait {}", tier)
    } else if short > 0 && long as f64 / short as f64 >= 2.2 {
        format!("Ultrawide {}", tier)
    } else {
        tier.to_string()
    }
}
