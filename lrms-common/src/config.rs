//! Configuration loading and resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! The first two are gathered by the binary's argument parser into
//! [`ConfigOverrides`]; this module merges them with the TOML file and the
//! defaults. Missing config files are not an error.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::{Error, Result};

/// Upload size ceiling (16 MiB); larger uploads are rejected before parsing
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// The single non-deletable administrator
pub const ROOT_ADMIN_USERNAME: &str = "admin";

pub const DEFAULT_DATABASE_URL: &str = "sqlite://lrms.db?mode=rwc";
pub const DEFAULT_UPLOAD_DIR: &str = "tmp_uploads";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";
const DEFAULT_SESSION_SECRET: &str = "change_this_to_a_secret_key";
const DEFAULT_ROOT_ADMIN_PASSWORD: &str = "admin123";

/// Bootstrap configuration loaded from a TOML file
///
/// Every field is optional; absent fields fall through to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub database_url: Option<String>,

    #[serde(default)]
    pub session_secret: Option<String>,

    /// Directory holding uploaded workbooks until they are committed
    #[serde(default)]
    pub upload_dir: Option<PathBuf>,

    #[serde(default)]
    pub bind_addr: Option<String>,

    #[serde(default)]
    pub root_admin_password: Option<String>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub session_secret: Option<String>,
    pub upload_dir: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub root_admin_password: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub session_secret: String,
    pub upload_dir: PathBuf,
    pub bind_addr: String,
    pub root_admin_username: String,
    pub root_admin_password: String,
    pub max_upload_bytes: usize,
    pub log_level: String,
}

impl AppConfig {
    /// Merge overrides, the optional TOML file and compiled defaults
    pub fn resolve(overrides: ConfigOverrides, file: Option<TomlConfig>) -> Self {
        let file = file.unwrap_or_default();

        let session_secret = overrides
            .session_secret
            .or(file.session_secret)
            .unwrap_or_else(|| DEFAULT_SESSION_SECRET.to_string());

        let root_admin_password = overrides
            .root_admin_password
            .or(file.root_admin_password)
            .unwrap_or_else(|| DEFAULT_ROOT_ADMIN_PASSWORD.to_string());

        Self {
            database_url: overrides
                .database_url
                .or(file.database_url)
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            session_secret,
            upload_dir: overrides
                .upload_dir
                .or(file.upload_dir)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            bind_addr: overrides
                .bind_addr
                .or(file.bind_addr)
                .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
            root_admin_username: ROOT_ADMIN_USERNAME.to_string(),
            root_admin_password,
            max_upload_bytes: MAX_UPLOAD_BYTES,
            log_level: file.logging.level,
        }
    }

    /// Log a warning for each secret still at its development default.
    ///
    /// Returns how many were found.
    pub fn warn_development_defaults(&self) -> usize {
        let mut found = 0;
        if self.session_secret == DEFAULT_SESSION_SECRET {
            warn!("No session secret configured; using the insecure development default");
            found += 1;
        }
        if self.root_admin_password == DEFAULT_ROOT_ADMIN_PASSWORD {
            warn!("No root admin password configured; using the development default");
            found += 1;
        }
        found
    }

    /// Create the upload directory if it doesn't exist
    pub fn ensure_upload_dir(&self) -> Result<()> {
        if !self.upload_dir.exists() {
            std::fs::create_dir_all(&self.upload_dir)?;
            info!("Created upload directory: {}", self.upload_dir.display());
        }
        Ok(())
    }
}

/// Load a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Locate the TOML config file for this platform, if one exists
///
/// Checks the user config dir (`~/.config/lrms/config.toml` on Linux) then
/// `/etc/lrms/config.toml`.
pub fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("lrms").join("config.toml"));
    let system_config = PathBuf::from("/etc/lrms/config.toml");

    user_config
        .into_iter()
        .chain(std::iter::once(system_config))
        .find(|path| path.exists())
}

/// Load the TOML config from an explicit path or the platform location.
///
/// An explicit path that cannot be read is an error; a missing platform file
/// is not.
pub fn load_config_file(explicit: Option<&Path>) -> Result<Option<TomlConfig>> {
    match explicit {
        Some(path) => load_toml_config(path).map(Some),
        None => match find_config_file() {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                load_toml_config(&path).map(Some)
            }
            None => Ok(None),
        },
    }
}
