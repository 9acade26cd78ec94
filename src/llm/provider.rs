use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::GenericImageView;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use crate::config::{LlmConfig, LlmProviderType};

/// Longest side sent to a model; larger images are downscaled first.
const MAX_IMAGE_DIMENSION: u32 = 1024;

/// A model installed on or served by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub size_bytes: Option<u64>,
}

/// A vision model that can answer a prompt about an image.
pub trait LlmProvider: Send + Sync {
    /// Send `prompt` with the image at `image_path` and return the raw reply.
    fn describe_image(&self, image_path: &Path, prompt: &str) -> Result<String>;

    /// Models available from this provider.
    fn list_models(&self) -> Result<Vec<ModelInfo>>;

    fn provider_name(&self) -> &'static str;

    fn model(&self) -> &str;
}

// ============================================================================
// Ollama provider
// ============================================================================

pub struct OllamaProvider {
    endpoint: String,
    model: String,
    use_cpu: bool,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    images: Vec<String>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    num_gpu: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    name: String,
    #[serde(default)]
    size: Option<u64>,
}

impl OllamaProvider {
    pub fn new(endpoint: &str, model: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            use_cpu: false,
        }
    }

    /// Keep the model off the GPU (`num_gpu = 0`).
    pub fn with_cpu_only(mut self, use_cpu: bool) -> Self {
        self.use_cpu = use_cpu;
        self
    }

    fn build_request(&self, prompt: &str, image: String) -> OllamaRequest {
        OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            images: vec![image],
            stream: false,
            options: self.use_cpu.then_some(OllamaOptions { num_gpu: 0 }),
        }
    }
}

impl LlmProvider for OllamaProvider {
    fn describe_image(&self, image_path: &Path, prompt: &str) -> Result<String> {
        let (base64_image, _mime_type) = load_and_encode_image(image_path, MAX_IMAGE_DIMENSION)?;
        let request = self.build_request(prompt, base64_image);

        let url = format!("{}/api/generate", self.endpoint);
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(180))
            .build();

        let response = agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_json(&request)
            .map_err(|e| anyhow!("Ollama request failed: {}", e))?;

        let ollama_response: OllamaResponse = response
            .into_json()
            .map_err(|e| anyhow!("Failed to parse Ollama response: {}", e))?;

        Ok(ollama_response.response.trim().to_string())
    }

    fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.endpoint);
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();

        let tags: OllamaTagsResponse = agent
            .get(&url)
            .call()
            .map_err(|e| anyhow!("Could not reach Ollama at {}: {}", self.endpoint, e))?
            .into_json()
            .map_err(|e| anyhow!("Failed to parse Ollama model list: {}", e))?;

        Ok(tags
            .models
            .into_iter()
            .map(|m| ModelInfo {
                name: m.name,
                size_bytes: m.size,
            })
            .collect())
    }

    fn provider_name(&self) -> &'static str {
        "Ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// OpenAI-compatible provider (LM Studio, OpenAI and compatible APIs)
// ============================================================================

pub struct OpenAICompatibleProvider {
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: Vec<OpenAIContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum OpenAIContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIModelList {
    #[serde(default)]
    data: Vec<OpenAIModel>,
}

#[derive(Debug, Deserialize)]
struct OpenAIModel {
    id: String,
}

impl OpenAICompatibleProvider {
    pub fn new(endpoint: &str, model: &str, api_key: Option<&str>) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.filter(|k| !k.is_empty()).map(|s| s.to_string()),
        }
    }

    fn authorized(&self, req: ureq::Request) -> ureq::Request {
        match self.api_key {
            Some(ref api_key) => req.set("Authorization", &format!("Bearer {}", api_key)),
            None => req,
        }
    }
}

impl LlmProvider for OpenAICompatibleProvider {
    fn describe_image(&self, image_path: &Path, prompt: &str) -> Result<String> {
        let (base64_image, mime_type) = load_and_encode_image(image_path, MAX_IMAGE_DIMENSION)?;
        let data_url = format!("data:{};base64,{}", mime_type, base64_image);

        let request = OpenAIChatRequest {
            model: self.model.clone(),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: vec![
                    OpenAIContentPart::Text {
                        text: prompt.to_string(),
                    },
                    OpenAIContentPart::ImageUrl {
                        image_url: ImageUrl { url: data_url },
                    },
                ],
            }],
            max_tokens: 500,
            temperature: 0.2,
        };

        let url = format!("{}/chat/completions", self.endpoint);
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(120))
            .build();

        let req = self.authorized(agent.post(&url).set("Content-Type", "application/json"));
        let response = req
            .send_json(&request)
            .map_err(|e| anyhow!("LLM request failed: {}", e))?;

        let chat_response: OpenAIChatResponse = response
            .into_json()
            .map_err(|e| anyhow!("Failed to parse LLM response: {}", e))?;

        chat_response
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| anyhow!("No response from LLM"))
    }

    fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/models", self.endpoint);
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(30))
            .build();

        let list: OpenAIModelList = self
            .authorized(agent.get(&url))
            .call()
            .map_err(|e| anyhow!("Could not reach {}: {}", self.endpoint, e))?
            .into_json()
            .map_err(|e| anyhow!("Failed to parse model list: {}", e))?;

        Ok(list
            .data
            .into_iter()
            .map(|m| ModelInfo {
                name: m.id,
                size_bytes: None,
            })
            .collect())
    }

    fn provider_name(&self) -> &'static str {
        "OpenAI-compatible"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Load an image, downscale it if either side exceeds `max_dimension`,
/// re-encode as JPEG and return it base64-encoded with its MIME type.
pub fn load_and_encode_image(image_path: &Path, max_dimension: u32) -> Result<(String, &'static str)> {
    let img = image::open(image_path)
        .map_err(|e| anyhow!("Failed to open image {}: {}", image_path.display(), e))?;

    let (width, height) = img.dimensions();
    let img = if width > max_dimension || height > max_dimension {
        img.resize(max_dimension, max_dimension, image::imageops::FilterType::Triangle)
    } else {
        img
    };

    // JPEG has no alpha channel
    let img = image::DynamicImage::ImageRgb8(img.to_rgb8());

    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, 85);
    img.write_with_encoder(encoder)
        .map_err(|e| anyhow!("Failed to encode image as JPEG: {}", e))?;

    Ok((BASE64.encode(buf.into_inner()), "image/jpeg"))
}

/// Create an LLM provider based on configuration
pub fn create_provider(config: &LlmConfig) -> Box<dyn LlmProvider> {
    let endpoint = config.endpoint();
    match config.provider {
        LlmProviderType::Ollama => {
            Box::new(OllamaProvider::new(&endpoint, &config.model).with_cpu_only(config.use_cpu))
        }
        LlmProviderType::LmStudio | LlmProviderType::OpenAI => Box::new(
            OpenAICompatibleProvider::new(&endpoint, &config.model, config.api_key.as_deref()),
        ),
    }
}
