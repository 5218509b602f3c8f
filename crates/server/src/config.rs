use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerSection,
    pub storage: StorageSection,
    pub vision: VisionSection,
    pub intake: IntakeSection,
    pub validation: ValidationSection,
    pub categories: CategoriesSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: 8080,
            max_upload_bytes: ledgerlens_engine::pipeline::DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    pub db_path: PathBuf,
    pub attachments_dir: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/receipts.db"),
            attachments_dir: PathBuf::from("data/attachments"),
        }
    }
}

/// Which hosted vision model to consult, if any.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VisionSection {
    /// `"gemini"`, `"openai"`, or `"none"`.
    pub provider: String,
    pub model: String,
    /// Usually left blank in the file; `GEMINI_API_KEY` / `OPENAI_API_KEY`
    /// take precedence.
    pub api_key: String,
}

impl Default for VisionSection {
    fn default() -> Self {
        Self {
            provider: "none".to_string(),
            model: "gemini-2.0-flash".to_string(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct IntakeSection {
    /// When set, new files dropped here are processed automatically.
    pub watch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationSection {
    pub min_confidence: f32,
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self { min_confidence: 0.8 }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct CategoriesSection {
    /// TOML category table; the built-in table applies when unset.
    pub table_path: Option<PathBuf>,
}

impl Config {
    /// Load from a TOML file, falling back to defaults when it is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Secrets come from the environment when present; nothing else does.
    pub fn vision_api_key(&self) -> String {
        let var = match self.vision.provider.as_str() {
            "gemini" => "GEMINI_API_KEY",
            "openai" => "OPENAI_API_KEY",
            _ => return self.vision.api_key.clone(),
        };
        std::env::var(var).unwrap_or_else(|_| self.vision.api_key.clone())
    }
}
