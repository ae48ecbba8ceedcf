use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::constants;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub chat: ChatSettings,
    #[serde(default)]
    pub render: RenderSettings,
    #[serde(default)]
    pub support: SupportSettings,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    pub stream_path: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub max_history_length: usize,
    pub typing_delay_ms: u64,
}

/// Feature switches for the text renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub markdown_support: bool,
    pub link_enhancement: bool,
    pub phone_auto_detect: bool,
    pub email_auto_detect: bool,
    pub max_input_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupportSettings {
    pub hotline: String,
    pub email: String,
    pub website: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageSettings {
    /// Directory holding persisted conversations. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: constants::api::DEFAULT_BASE_URL.to_string(),
            stream_path: constants::api::STREAM_PATH.to_string(),
            request_timeout_secs: constants::api::REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_history_length: constants::chat::MAX_HISTORY_LENGTH,
            typing_delay_ms: constants::chat::TYPING_DELAY_MS,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            markdown_support: true,
            link_enhancement: true,
            phone_auto_detect: true,
            email_auto_detect: true,
            max_input_bytes: constants::render::MAX_INPUT_BYTES,
        }
    }
}

impl Default for SupportSettings {
    fn default() -> Self {
        Self {
            hotline: constants::support::HOTLINE.to_string(),
            email: constants::support::EMAIL.to_string(),
            website: constants::support::WEBSITE.to_string(),
        }
    }
}

impl ApiSettings {
    /// Full URL of the streaming endpoint, tolerating a trailing slash on the base.
    pub fn stream_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = self.stream_path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ChatSettings {
    pub fn typing_delay(&self) -> Duration {
        Duration::from_millis(self.typing_delay_ms)
    }
}

impl Settings {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(constants::storage::APP_DIR)
            .join(constants::storage::CONFIG_FILE)
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Load settings from `path`, falling back to defaults when the file is
    /// missing or does not parse.
    pub fn load_from(path: &std::path::Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Ignoring invalid config {}: {e}", path.display()),
                },
                Err(e) => tracing::warn!("Could not read config {}: {e}", path.display()),
            }
        }
        Self::default()
    }

    pub fn save(&self) -> Result<(), crate::error::ChatError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), crate::error::ChatError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::ChatError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Directory used by file-backed conversation storage.
    pub fn data_dir(&self) -> PathBuf {
        self.storage.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(constants::storage::APP_DIR)
        })
    }
}
