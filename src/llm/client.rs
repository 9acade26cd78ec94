use anyhow::{anyhow, Result};
use std::path::Path;
use std::sync::Arc;

use super::provider::{create_provider, LlmProvider, ModelInfo};
use crate::config::LlmConfig;
use crate::metadata::{parse_response, ParsedMetadata};

pub const DESCRIBE_PROMPT: &str = "Describe this image in 3-5 words suitable for a filename.
Focus on the main subject and style. Be concise and specific.
Output ONLY the description, no punctuation, no explanation.
Example outputs: mountain sunset landscape, cyberpunk city night, abstract blue waves";

pub const ANALYZE_PROMPT: &str = "Analyze this image and provide metadata in the following exact format.
Each field on its own line, use commas to separate multiple values.
Be concise and specific. Use lowercase.

Description: [3-5 word description for filename]
Scene: [1-3 sentence description of what the image depicts, including composition and atmosphere]
Tags: [comma-separated keywords, 3-6 tags]
Mood: [comma-separated moods like peaceful, dramatic, mysterious, vibrant, melancholic]
Style: [one of: photography, digital art, illustration, 3d render, anime, painting, pixel art]
Colors: [comma-separated dominant colors, 2-4 colors]
Time: [one of: day, night, sunset, sunrise, golden hour, overcast, or unknown]
Subject: [landscape, portrait, architecture, wildlife, abstract, space, urban, nature, fantasy]

Example output:
Description: neon cyberpunk city night
Tags: cyberpunk, city, neon, futuristic, rain
Mood: mysterious, vibrant
Style: digital art
Colors: purple, cyan, pink
Time: night
Subject: urban";

/// Vision-model client that wraps a provider implementation.
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn LlmProvider>,
}

impl LlmClient {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            provider: Arc::from(create_provider(config)),
        }
    }

    pub fn with_provider(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Model name recorded as `ai_model` in sidecars.
    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub fn list_models(&self) -> Result<Vec<ModelInfo>> {
        self.provider.list_models()
    }

    /// Short description suitable for a filename.
    pub fn describe(&self, image_path: &Path) -> Result<String> {
        let response = self.provider.describe_image(image_path, DESCRIBE_PROMPT)?;
        let description = clean_description(&response);
        if description.is_empty() {
            return Err(anyhow!("Model returned an empty description"));
        }
        Ok(description)
    }

    /// Structured metadata parsed from the model's reply.
    pub fn analyze(&self, image_path: &Path) -> Result<ParsedMetadata> {
        let response = self.provider.describe_image(image_path, ANALYZE_PROMPT)?;
        let parsed = parse_response(&response);
        if parsed.is_empty() {
            tracing::warn!("No metadata fields in model reply for {}", image_path.display());
        }
        Ok(parsed)
    }
}

/// First non-blank line of a reply, without quotes or trailing punctuation.
fn clean_description(response: &str) -> String {
    response
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
        .trim_matches(|c| c == '"' || c == '\'' || c == '`')
        .trim_end_matches(['.', '!', ','])
        .trim()
        .to_string()
}
