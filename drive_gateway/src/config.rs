//! Layered settings: defaults, config files, then `DRIVE_GATEWAY__*` env vars.

use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub drive: DriveSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub static_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: default_cors_origins(),
            static_dir: None,
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DriveSettings {
    /// Service account key. Its presence is what enables the real backend.
    pub credentials_file: PathBuf,
    /// Stored user OAuth token, tried when the key is not usable.
    pub token_file: PathBuf,
    /// Folder every upload lands in and every listing is scoped to.
    pub folder_name: String,
    pub api_base_url: String,
    pub token_uri: String,
}

impl Default for DriveSettings {
    fn default() -> Self {
        Self {
            credentials_file: PathBuf::from("credentials.json"),
            token_file: PathBuf::from("token.json"),
            folder_name: "Drive Gateway Uploads".to_string(),
            api_base_url: "https://www.googleapis.com".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
        }
    }
}

fn default_cors_origins() -> Vec<String> {
    [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
        "http://localhost:8000",
        "http://127.0.0.1:8000",
        "https://*.netlify.app",
        "https://*.onrender.com",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Settings {
    /// Load settings, optionally layering an explicit config file on top of
    /// `config/default` and `config/local`.
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let server = ServerSettings::default();
        let drive = DriveSettings::default();

        let mut builder = Config::builder()
            .set_default("server.host", server.host)?
            .set_default("server.port", i64::from(server.port))?
            .set_default("server.cors_origins", server.cors_origins)?
            .set_default("server.max_upload_bytes", server.max_upload_bytes as i64)?
            .set_default(
                "drive.credentials_file",
                drive.credentials_file.to_string_lossy().into_owned(),
            )?
            .set_default(
                "drive.token_file",
                drive.token_file.to_string_lossy().into_owned(),
            )?
            .set_default("drive.folder_name", drive.folder_name)?
            .set_default("drive.api_base_url", drive.api_base_url)?
            .set_default("drive.token_uri", drive.token_uri)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder
            .add_source(
                Environment::with_prefix("DRIVE_GATEWAY")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins"),
            )
            .build()?
            .try_deserialize()
    }
}

/// Whether `origin` matches one of the configured patterns. A pattern may
/// carry a single `*` standing for any run of non-empty host characters.
pub fn origin_allowed(patterns: &[String], origin: &str) -> bool {
    patterns.iter().any(|pattern| match pattern.split_once('*') {
        None => pattern == origin,
        Some((prefix, suffix)) => {
            origin.len() > prefix.len() + suffix.len()
                && origin.starts_with(prefix)
                && origin.ends_with(suffix)
                && !origin[prefix.len()..origin.len() - suffix.len()].contains('/')
        }
    })
}
