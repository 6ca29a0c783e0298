use crate::errors::{SessionError, SessionResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_COOKIE_NAME: &str = "session_id";
pub const DEFAULT_COOKIE_PATH: &str = "/";
pub const DEFAULT_MAX_AGE_SECONDS: i64 = 86400;
pub const DEFAULT_ID_LENGTH: usize = 32;
pub const DEFAULT_FILE_PREFIX: &str = "session-";

const APP_NAME: &str = "sessionkit";

/// SameSite attribute of the session cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    /// No attribute is sent; browsers apply their own default (lax).
    #[default]
    Default,
    Lax,
    Strict,
    /// Rendered together with `Secure`, which browsers require for it
    None,
}

/// Options controlling how a Manager issues sessions and cookies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerOptions {
    /// Name of the cookie carrying the session id
    pub cookie_name: String,
    /// Cookie path attribute
    pub path: String,
    /// Session lifetime and cookie max-age. Zero or negative means the
    /// session is expired as soon as it is issued.
    pub max_age_seconds: i64,
    /// Bytes of entropy in generated session ids
    pub id_length: usize,
    pub same_site: SameSite,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            path: DEFAULT_COOKIE_PATH.to_string(),
            max_age_seconds: DEFAULT_MAX_AGE_SECONDS,
            id_length: DEFAULT_ID_LENGTH,
            same_site: SameSite::Default,
        }
    }
}

impl ManagerOptions {
    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn with_max_age(mut self, seconds: i64) -> Self {
        self.max_age_seconds = seconds;
        self
    }

    pub fn with_id_length(mut self, bytes: usize) -> Self {
        self.id_length = bytes;
        self
    }

    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Replaces empty or zero fields with their defaults
    pub fn normalized(mut self) -> Self {
        if self.cookie_name.is_empty() {
            self.cookie_name = DEFAULT_COOKIE_NAME.to_string();
        }
        if self.path.is_empty() {
            self.path = DEFAULT_COOKIE_PATH.to_string();
        }
        if self.id_length == 0 {
            self.id_length = DEFAULT_ID_LENGTH;
        }
        self
    }
}

/// Settings for the file-backed provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProviderConfig {
    /// Directory holding one file per session
    pub dir: PathBuf,
    /// File name prefix; a session file is named `prefix + id`
    pub prefix: String,
}

impl Default for FileProviderConfig {
    fn default() -> Self {
        let dir = dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(APP_NAME)
            .join("sessions");
        Self {
            dir,
            prefix: DEFAULT_FILE_PREFIX.to_string(),
        }
    }
}

/// Top-level configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Registry name of the provider the Manager uses
    pub provider: String,
    pub manager: ManagerOptions,
    pub file: FileProviderConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            provider: "memory".to_string(),
            manager: ManagerOptions::default(),
            file: FileProviderConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> SessionResult<Self> {
        if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                SessionError::Config(format!("Failed to read config file: {}", e))
            })?;

            let mut config: Self = toml::from_str(&content).map_err(|e| {
                SessionError::Config(format!("Failed to parse config file: {}", e))
            })?;
            config.manager = config.manager.normalized();

            Ok(config)
        } else {
            debug!("Config file {} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Saves configuration to a file
    pub fn save_to_file(&self, path: &Path) -> SessionResult<()> {
        let content = toml::to_string(self)
            .map_err(|e| SessionError::Config(format!("Failed to serialize config: {}", e)))?;

        // Ensure the directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SessionError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        fs::write(path, content)
            .map_err(|e| SessionError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir() -> SessionResult<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        SessionError::Config("Could not determine home directory".to_string())
    })?;

    Ok(home_dir.join(".config").join(APP_NAME))
}

/// Helper function to get default config file path
pub fn get_default_config_file() -> SessionResult<PathBuf> {
    Ok(get_default_config_dir()?.join("config.toml"))
}
