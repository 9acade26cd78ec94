//! Best-effort parser for the `Label: value` text returned by vision models.
//!
//! Model output has no grammar guarantee, so nothing here fails: lines that do
//! not look like a field are dropped and missing fields simply stay absent.

use std::collections::BTreeMap;

use super::ImageMetadata;

/// Labels whose values are comma-separated lists.
const LIST_LABELS: &[&str] = &["tags", "mood", "colors"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

/// Fields recovered from one model response, keyed by lowercased label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMetadata {
    pub fields: BTreeMap<String, FieldValue>,
}

impl ParsedMetadata {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(FieldValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn list(&self, key: &str) -> Option<&[String]> {
        match self.fields.get(key) {
            Some(FieldValue::List(values)) => Some(values.as_slice()),
            _ => None,
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.text("description")
    }

    /// The time-of-day field under any of the labels models tend to use.
    pub fn time_of_day(&self) -> Option<&str> {
        ["time", "time_of_day", "time of day"]
            .iter()
            .find_map(|key| self.text(key))
    }

    /// Copy every recognised field onto `meta`. Fields the model did not
    /// return leave the existing value alone.
    pub fn apply_to(&self, meta: &mut ImageMetadata) {
        if let Some(value) = self.description() {
            meta.description = value.to_string();
        }
        if let Some(value) = self.text("scene") {
            meta.scene = value.to_string();
        }
        if let Some(values) = self.list("tags") {
            meta.tags = values.to_vec();
        }
        if let Some(values) = self.list("mood") {
            meta.mood = values.to_vec();
        }
        if let Some(value) = self.text("style") {
            meta.style = value.to_string();
        }
        if let Some(values) = self.list("colors") {
            meta.colors = values.to_vec();
        }
        if let Some(value) = self.time_of_day() {
            meta.time_of_day = value.to_string();
        }
        if let Some(value) = self.text("subject") {
            meta.subject = value.to_string();
        }
    }
}

/// Parse a model response into whatever fields it contains.
pub fn parse_response(raw: &str) -> ParsedMetadata {
    let mut parsed = ParsedMetadata::default();

    for line in raw.lines() {
        let Some((label, value)) = line.split_once(':') else {
            continue;
        };

        let label = normalize_label(label);
        let value = value.trim();
        if label.is_empty() || value.is_empty() {
            continue;
        }

        let field = if LIST_LABELS.contains(&label.as_str()) {
            let items: Vec<String> = value
                .split(',')
                .map(|item| trim_trailing_punctuation(item.trim()).to_lowercase())
                .filter(|item| !item.is_empty())
                .collect();
            if items.is_empty() {
                continue;
            }
            FieldValue::List(items)
        } else if label == "scene" {
            FieldValue::Text(value.to_string())
        } else {
            let value = trim_trailing_punctuation(value).to_lowercase();
            if value.is_empty() {
                continue;
            }
            FieldValue::Text(value)
        };

        parsed.fields.insert(label, field);
    }

    parsed
}

/// Lowercase a label and drop markdown decoration such as `**Tags**` or `- Mood`.
fn normalize_label(label: &str) -> String {
    label
        .trim()
        .trim_matches(|c: char| matches!(c, '*' | '-' | '#' | '_') || c.is_whitespace())
        .to_lowercase()
}

fn trim_trailing_punctuation(value: &str) -> &str {
    value.trim_end_matches(['.', ',', ';', '!']).trim_end()
}
