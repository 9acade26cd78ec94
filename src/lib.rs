pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod generate;
pub mod llm;
pub mod logging;
pub mod metadata;
pub mod organize;
pub mod sanitize;
pub mod scanner;
pub mod sidecar;

pub use error::{SidecarError, WallsortError};
pub use metadata::ImageMetadata;
