pub mod client;
pub mod provider;

pub use client::{LlmClient, ANALYZE_PROMPT, DESCRIBE_PROMPT};
pub use provider::{create_provider, load_and_encode_image, LlmProvider, ModelInfo};
