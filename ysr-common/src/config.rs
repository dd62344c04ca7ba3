//! Bootstrap configuration and root folder resolution
//!
//! Settings come from, in priority order:
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Compiled defaults
//!
//! A missing TOML file is not an error: a warning is logged and defaults apply.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "YSR_ROOT_FOLDER";

/// Database file created inside the root folder
pub const DATABASE_FILE: &str = "ysr.db";

/// Directory inside the root folder that relative audio paths resolve against
pub const MEDIA_DIR: &str = "media";

/// Placeholder shipped in example configs; treated as "not configured"
pub const REMOTE_URL_PLACEHOLDER: &str = "your-project-url";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and media directory
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub audio: AudioConfig,
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

/// Remote table-backed article service credentials
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteConfig {
    /// Project base URL, e.g. `https://abc.example.co`
    #[serde(default)]
    pub url: Option<String>,

    /// Anonymous API key sent as `apikey` and bearer token
    #[serde(default)]
    pub anon_key: Option<String>,
}

impl RemoteConfig {
    /// True when real credentials are present; otherwise the local mock store is used
    pub fn is_configured(&self) -> bool {
        let url_ok = self
            .url
            .as_deref()
            .map(|u| !u.trim().is_empty() && !u.contains(REMOTE_URL_PLACEHOLDER))
            .unwrap_or(false);
        let key_ok = self
            .anon_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false);
        url_ok && key_ok
    }
}

/// Which audio output backend to open sessions on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// System audio device via cpal
    #[default]
    Device,
    /// Consume frames in real time without a device
    Null,
}

impl std::str::FromStr for OutputKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "device" => Ok(OutputKind::Device),
            "null" => Ok(OutputKind::Null),
            other => Err(Error::Config(format!("Unknown audio output '{}'", other))),
        }
    }
}

/// Audio playback configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    #[serde(default)]
    pub output: OutputKind,

    /// Output device name (None = system default)
    #[serde(default)]
    pub device: Option<String>,

    /// Delay between end-of-audio and releasing the output stream
    #[serde(default = "default_release_grace_ms")]
    pub release_grace_ms: u64,

    /// Decoded clips kept in memory, keyed by reference (0 disables the cache)
    #[serde(default = "default_decode_cache_entries")]
    pub decode_cache_entries: usize,

    /// Directory that relative audio paths resolve against (default: `<root>/media`)
    #[serde(default)]
    pub media_root: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output: OutputKind::default(),
            device: None,
            release_grace_ms: default_release_grace_ms(),
            decode_cache_entries: default_decode_cache_entries(),
            media_root: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_release_grace_ms() -> u64 {
    100
}

fn default_decode_cache_entries() -> usize {
    32
}

/// Load a TOML configuration file.
///
/// A missing file yields defaults (with a warning); a malformed file is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file {} not found, using defaults", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Platform config file location (`<config dir>/ysr/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ysr").join("config.toml"))
}

/// Compiled-in defaults used when nothing else is configured
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub port: u16,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = dirs::data_local_dir()
            .map(|d| d.join("ysr"))
            .unwrap_or_else(|| PathBuf::from("./ysr_data"));

        Self {
            root_folder,
            port: 5730,
            log_level: default_log_level(),
        }
    }
}

/// Resolves the root folder following CLI > env > TOML > default
pub struct RootFolderResolver {
    module_name: String,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
        }
    }

    pub fn resolve(&self, cli_arg: Option<&Path>, toml: Option<&TomlConfig>) -> PathBuf {
        if let Some(path) = cli_arg {
            info!("{}: root folder from command line: {}", self.module_name, path.display());
            return path.to_path_buf();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                info!("{}: root folder from {}: {}", self.module_name, ROOT_FOLDER_ENV, path);
                return PathBuf::from(path);
            }
        }

        if let Some(path) = toml.and_then(|t| t.root_folder.as_ref()) {
            info!("{}: root folder from config file: {}", self.module_name, path.display());
            return path.clone();
        }

        let default = CompiledDefaults::for_current_platform().root_folder;
        info!("{}: using default root folder: {}", self.module_name, default.display());
        default
    }
}

/// Creates the root folder layout on first run
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn media_path(&self) -> PathBuf {
        self.root.join(MEDIA_DIR)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }

    /// Create the root and media directories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        if !self.root.exists() {
            info!("Creating root folder: {}", self.root.display());
        }
        std::fs::create_dir_all(&self.root)?;
        std::fs::create_dir_all(self.media_path())?;
        Ok(())
    }
}
