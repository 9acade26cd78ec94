use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "WALLSORT_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Default collection directory for commands run without a path.
    #[serde(default)]
    pub wallpaper_path: Option<PathBuf>,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub scanner: ScannerConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderType {
    #[default]
    Ollama,
    LmStudio,
    OpenAI,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProviderType,

    /// Base URL; when unset the provider's usual local address is used.
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "default_llm_model")]
    pub model: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Ask Ollama to keep the model off the GPU.
    #[serde(default)]
    pub use_cpu: bool,
}

impl LlmConfig {
    pub fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => match self.provider {
                LlmProviderType::Ollama => "http://localhost:11434".to_string(),
                LlmProviderType::LmStudio => "http://127.0.0.1:1234/v1".to_string(),
                LlmProviderType::OpenAI => "https://api.openai.com/v1".to_string(),
            },
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderType::default(),
            endpoint: None,
            model: default_llm_model(),
            api_key: None,
            use_cpu: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("wallsort")
        .join("index.db")
}

fn default_llm_model() -> String {
    "llava".to_string()
}

fn default_image_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "tif"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            wallpaper_path: None,
            llm: LlmConfig::default(),
            scanner: ScannerConfig::default(),
        }
    }
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# wallsort configuration

# SQLite index location
# db_path = "~/.local/share/wallsort/index.db"

# Collection used when a command is given no path
# wallpaper_path = "~/Pictures/Wallpapers"

[llm]
# ollama, lmstudio or openai
provider = "ollama"
# endpoint = "http://localhost:11434"
model = "llava"
# api_key = ""
use_cpu = false

[scanner]
image_extensions = ["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff", "tif"]
"#;

impl Config {
    /// Load from `WALLSORT_CONFIG` or the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load a config file. A missing file yields defaults and is not created.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;

        config.db_path = expand_tilde(&config.db_path);
        config.wallpaper_path = config.wallpaper_path.as_deref().map(expand_tilde);
        Ok(config)
    }

    /// Write the commented default config to `path` unless a file is there.
    ///
    /// Returns false when a config already existed.
    pub fn create_default(path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
        Ok(true)
    }

    pub fn config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return expand_tilde(Path::new(&path));
        }
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wallsort")
            .join("config.toml")
    }

    /// Lowercased extension allow-list.
    pub fn image_extensions(&self) -> Vec<String> {
        self.scanner
            .image_extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .collect()
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.llm.model, "llava");
        assert_eq!(config.llm.provider, LlmProviderType::Ollama);
        assert!(config.image_extensions().contains(&"webp".to_string()));
        assert!(!path.exists());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "db_path = \"/tmp/walls.db\"\n[llm]\nprovider = \"lmstudio\"\nmodel = \"qwen2-vl\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/walls.db"));
        assert_eq!(config.llm.provider, LlmProviderType::LmStudio);
        assert_eq!(config.llm.model, "qwen2-vl");
        assert_eq!(config.llm.endpoint(), "http://127.0.0.1:1234/v1");
        assert!(!config.llm.use_cpu);
        assert_eq!(config.scanner.image_extensions.len(), 8);
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "db_path = [unclosed").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_create_default_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        assert!(Config::create_default(&path).unwrap());
        assert!(!Config::create_default(&path).unwrap());

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.llm.model, "llava");
        assert_eq!(config.llm.endpoint(), "http://localhost:11434");
    }

    #[test]
    fn test_endpoint_trailing_slash_trimmed() {
        let llm = LlmConfig {
            endpoint: Some("http://gpu-box:11434/".to_string()),
            ..Default::default()
        };
        assert_eq!(llm.endpoint(), "http://gpu-box:11434");
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde(Path::new("/abs/path")), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/walls")), home.join("walls"));
        }
    }
}
