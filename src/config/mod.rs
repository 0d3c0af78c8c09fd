//! Configuration types for the hub mapper.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::entry::{DEFAULT_CIRCLE_COLOR, DEFAULT_DOT_COLOR, DEFAULT_RADIUS_M};

/// Where the entry list is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Flat JSON file holding the whole entry list
    #[serde(default = "default_data_file")]
    pub data_file: PathBuf,

    /// Request timeout in seconds for a remote `/addresses` service
    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,
}

fn default_data_file() -> PathBuf {
    PathBuf::from("./data.json")
}

fn default_remote_timeout_secs() -> u64 {
    30
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_file: default_data_file(),
            remote_timeout_secs: default_remote_timeout_secs(),
        }
    }
}

/// HTTP persistence service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind; the `PORT` environment variable takes precedence
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest accepted JSON body in bytes
    #[serde(default = "default_payload_limit")]
    pub payload_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_payload_limit() -> usize {
    10 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            payload_limit_bytes: default_payload_limit(),
        }
    }
}

/// Geocoding API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocoderConfig {
    /// Geocoding JSON endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// API key; when unset the key is read from `api_key_env`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://maps.googleapis.com/maps/api/geocode/json".to_string()
}

fn default_api_key_env() -> String {
    "GOOGLE_MAPS_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Values given to new entries when the input leaves them blank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDefaults {
    /// Influence radius in meters
    #[serde(default = "default_radius_m")]
    pub radius_m: f64,

    #[serde(default = "default_circle_color")]
    pub circle_color: String,

    #[serde(default = "default_dot_color")]
    pub dot_color: String,
}

fn default_radius_m() -> f64 {
    DEFAULT_RADIUS_M
}

fn default_circle_color() -> String {
    DEFAULT_CIRCLE_COLOR.to_string()
}

fn default_dot_color() -> String {
    DEFAULT_DOT_COLOR.to_string()
}

impl Default for EntryDefaults {
    fn default() -> Self {
        Self {
            radius_m: default_radius_m(),
            circle_color: default_circle_color(),
            dot_color: default_dot_color(),
        }
    }
}

/// How a CSV import is applied to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// The imported rows become the whole list
    #[default]
    Replace,
    /// The imported rows are added after the existing entries
    Append,
}

/// Hub detection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubConfig {
    /// Combined count a hub must exceed; unset disables hub detection
    #[serde(default)]
    pub threshold: Option<f64>,

    /// Radius applied to every entry when hubs are computed; never saved
    #[serde(default)]
    pub radius_override: Option<f64>,

    #[serde(default)]
    pub import_mode: ImportMode,
}

/// Main configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapperConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub geocoder: GeocoderConfig,

    #[serde(default)]
    pub entries: EntryDefaults,

    #[serde(default)]
    pub hubs: HubConfig,
}

impl MapperConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: MapperConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
