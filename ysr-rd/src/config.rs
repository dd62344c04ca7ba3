//! ysr-rd specific configuration
//!
//! Command-line arguments (with environment fallbacks) are merged over the
//! TOML bootstrap file and the compiled defaults.

use clap::Parser;
use std::path::PathBuf;
use ysr_common::config::{
    load_toml_config, AudioConfig, CompiledDefaults, OutputKind, RemoteConfig,
    RootFolderInitializer, RootFolderResolver, TomlConfig,
};

/// Command-line arguments for ysr-rd
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "ysr-rd")]
#[command(about = "Reading desk service for YaSong Reader")]
#[command(version)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, env = "YSR_PORT")]
    pub port: Option<u16>,

    /// Root folder holding the database and media directory
    #[arg(short, long, env = "YSR_ROOT_FOLDER")]
    pub root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "YSR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Remote article service base URL
    #[arg(long, env = "YSR_REMOTE_URL")]
    pub remote_url: Option<String>,

    /// Remote article service anonymous key
    #[arg(long, env = "YSR_REMOTE_KEY", hide_env_values = true)]
    pub remote_key: Option<String>,

    /// Audio output backend (device or null)
    #[arg(long, env = "YSR_AUDIO_OUTPUT")]
    pub audio_output: Option<OutputKind>,
}

/// Resolved reading desk configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub root_folder: PathBuf,
    pub database_path: PathBuf,
    pub media_root: PathBuf,
    pub port: u16,
    pub log_level: String,
    pub remote: RemoteConfig,
    pub audio: AudioConfig,
}

impl Config {
    /// TOML file named by the arguments, or the platform default
    pub fn config_path(args: &Args) -> Option<PathBuf> {
        args.config
            .clone()
            .or_else(ysr_common::config::default_config_path)
    }

    /// Load the TOML bootstrap file; a missing file gives defaults
    pub fn load_toml(args: &Args) -> ysr_common::Result<TomlConfig> {
        match Self::config_path(args) {
            Some(path) => load_toml_config(&path),
            None => Ok(TomlConfig::default()),
        }
    }

    /// Merge arguments over a parsed TOML file (CLI/env > TOML > defaults)
    pub fn resolve(args: &Args, toml: TomlConfig) -> Self {
        let defaults = CompiledDefaults::for_current_platform();
        let root_folder =
            RootFolderResolver::new("ysr-rd").resolve(args.root_folder.as_deref(), Some(&toml));
        let layout = RootFolderInitializer::new(root_folder.clone());

        let mut remote = toml.remote;
        if let Some(url) = &args.remote_url {
            remote.url = Some(url.clone());
        }
        if let Some(key) = &args.remote_key {
            remote.anon_key = Some(key.clone());
        }

        let mut audio = toml.audio;
        if let Some(output) = args.audio_output {
            audio.output = output;
        }
        let media_root = audio
            .media_root
            .clone()
            .unwrap_or_else(|| layout.media_path());

        Self {
            database_path: layout.database_path(),
            media_root,
            port: args.port.or(toml.port).unwrap_or(defaults.port),
            log_level: toml.logging.level,
            remote,
            audio,
            root_folder,
        }
    }
}
