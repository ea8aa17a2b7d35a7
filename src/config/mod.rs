use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default target resolution when picking a format
pub const DEFAULT_TARGET_HEIGHT: u32 = 720;

fn default_server_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_bind_addr() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_target_height() -> u32 {
    DEFAULT_TARGET_HEIGHT
}

fn default_ytdlp_path() -> String {
    "yt-dlp".to_string()
}

/// Optional colour overrides, `#RRGGBB` or `#RGB`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ThemeConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub danger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base url of the download service the form posts to
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Address the download service listens on (`--serve`)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Where the service stores finished downloads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_dir: Option<PathBuf>,

    /// Preferred video height, closest mp4 format wins
    #[serde(default = "default_target_height")]
    pub target_height: u32,

    /// yt-dlp executable (name on PATH or absolute path)
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,

    /// Desktop notification when a download finishes
    #[serde(default)]
    pub notifications: bool,

    #[serde(default)]
    pub theme: ThemeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            bind_addr: default_bind_addr(),
            download_dir: None,
            target_height: DEFAULT_TARGET_HEIGHT,
            ytdlp_path: default_ytdlp_path(),
            notifications: false,
            theme: ThemeConfig::default(),
        }
    }
}

impl AppConfig {
    /// Directory holding config.toml and the UI log
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("vidfetch");

        if let Err(e) = std::fs::create_dir_all(&config_dir) {
            tracing::warn!("Could not create config directory: {}", e);
        }

        Ok(config_dir)
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from file, or create default
    pub fn load() -> Result<Self> {
        let path = match Self::config_path() {
            Ok(p) => p,
            Err(_) => return Ok(AppConfig::default()),
        };

        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(content) => match toml::from_str::<AppConfig>(&content) {
                    Ok(config) => return Ok(config.cleaned()),
                    Err(e) => tracing::warn!("Failed to parse config: {}", e),
                },
                Err(e) => tracing::warn!("Failed to read config: {}", e),
            }
            // Leave a broken file alone so the user can fix it
            return Ok(AppConfig::default());
        }

        let config = AppConfig::default();
        if let Err(e) = config.save() {
            tracing::warn!("Could not write default config: {}", e);
        }
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let content = toml::to_string_pretty(&self.clone().cleaned())?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Normalize values a hand-edited file may get slightly wrong
    fn cleaned(mut self) -> Self {
        let trimmed = self.server_url.trim().trim_end_matches('/');
        self.server_url = if trimmed.is_empty() {
            default_server_url()
        } else {
            trimmed.to_string()
        };

        if self.bind_addr.trim().is_empty() {
            self.bind_addr = default_bind_addr();
        }
        if self.target_height == 0 {
            self.target_height = DEFAULT_TARGET_HEIGHT;
        }
        if self.ytdlp_path.trim().is_empty() {
            self.ytdlp_path = default_ytdlp_path();
        }
        if self.download_dir.as_ref().map(|d| d.as_os_str().is_empty()).unwrap_or(false) {
            self.download_dir = None;
        }
        self
    }

    /// Resolved download directory
    pub fn download_dir(&self) -> PathBuf {
        self.download_dir.clone().unwrap_or_else(|| {
            dirs::download_dir()
                .map(|d| d.join("vidfetch"))
                .unwrap_or_else(|| PathBuf::from("downloads"))
        })
    }
}
