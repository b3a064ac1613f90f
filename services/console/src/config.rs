//! Application Configuration Module
//!
//! Loads the console's settings from environment variables (and a `.env`
//! file, when present) into a single struct built once at startup.

use guide_console_core::tour::DEFAULT_MAX_POLL_ATTEMPTS;
use serde_json::Value;
use std::path::PathBuf;
use tracing::Level;

pub const DEFAULT_ROBOT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/v1/robot";
pub const DEFAULT_WEBRTC_URL: &str = "ws://127.0.0.1:7860/client";
pub const DEFAULT_ICE_SERVERS: &str = r#"[{"urls":"stun:stun.l.google.com:19302"}]"#;
pub const DEFAULT_AUDIO_ASSET_DIR: &str = "public";
pub const DEFAULT_AUDIO_PLAYER: &str = "ffplay -nodisp -autoexit -loglevel quiet";

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub robot_api_url: String,
    pub api_base_url: String,
    pub webrtc_url: String,
    pub ice_servers: Vec<Value>,
    pub audio_asset_dir: PathBuf,
    /// Program followed by its arguments; the asset path is appended.
    pub audio_player: Vec<String>,
    pub max_poll_attempts: u32,
    pub log_level: Level,
    /// Problems that fell back to a default. Logged once logging is up.
    pub warnings: Vec<String>,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// *   `ROBOT_API_URL`: Base URL of the robot position/move API. Defaults to "http://127.0.0.1:8000".
    /// *   `API_BASE_URL`: Base URL for telemetry (`/latest/{topic}`). Defaults to "http://localhost:8000/api/v1/robot".
    /// *   `WEBRTC_URL`: Signaling endpoint of the voice bot. Defaults to "ws://127.0.0.1:7860/client".
    /// *   `ICE_SERVERS_JSON`: (Optional) JSON array of ICE servers. Invalid input falls back to a public STUN server.
    /// *   `AUDIO_ASSET_DIR`: (Optional) Directory the per-stop audio paths resolve against. Defaults to "public".
    /// *   `AUDIO_PLAYER`: (Optional) Command used to play one asset. Defaults to "ffplay -nodisp -autoexit -loglevel quiet".
    /// *   `POLL_MAX_ATTEMPTS`: (Optional) Position checks before a move is abandoned; 0 means never. Defaults to 120.
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let mut warnings = Vec::new();

        let ice_servers = match lookup("ICE_SERVERS_JSON") {
            Some(raw) => parse_ice_servers(&raw).unwrap_or_else(|| {
                warnings.push(format!(
                    "ICE_SERVERS_JSON is not a JSON array, using {DEFAULT_ICE_SERVERS}"
                ));
                default_ice_servers()
            }),
            None => default_ice_servers(),
        };

        let audio_player: Vec<String> = var("AUDIO_PLAYER", DEFAULT_AUDIO_PLAYER)
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if audio_player.is_empty() {
            return Err(ConfigError::InvalidValue(
                "AUDIO_PLAYER".to_string(),
                "command is empty".to_string(),
            ));
        }

        let max_poll_attempts = match lookup("POLL_MAX_ATTEMPTS") {
            Some(raw) => raw.trim().parse::<u32>().map_err(|e| {
                ConfigError::InvalidValue("POLL_MAX_ATTEMPTS".to_string(), e.to_string())
            })?,
            None => DEFAULT_MAX_POLL_ATTEMPTS,
        };

        // Configure logging level from RUST_LOG, with a sensible default.
        let log_level_str = var("RUST_LOG", "INFO");
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            robot_api_url: var("ROBOT_API_URL", DEFAULT_ROBOT_API_URL),
            api_base_url: var("API_BASE_URL", DEFAULT_API_BASE_URL),
            webrtc_url: var("WEBRTC_URL", DEFAULT_WEBRTC_URL),
            ice_servers,
            audio_asset_dir: PathBuf::from(var("AUDIO_ASSET_DIR", DEFAULT_AUDIO_ASSET_DIR)),
            audio_player,
            max_poll_attempts,
            log_level,
            warnings,
        })
    }
}

fn parse_ice_servers(raw: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(raw).ok()? {
        Value::Array(servers) => Some(servers),
        _ => None,
    }
}

fn default_ice_servers() -> Vec<Value> {
    parse_ice_servers(DEFAULT_ICE_SERVERS).unwrap_or_default()
}
