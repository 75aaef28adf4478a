use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Mutex;

use log::{info, warn};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::clients::{ApiConfig, Credentials};

/// Directory name used under the platform config, data and temp dirs
pub const APP_DIR: &str = "photomesh";

/// How a generated model reaches the viewer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum MaterializationMode {
    /// Download, verify and keep a local copy
    #[default]
    Download,
    /// Hand the remote URL to the viewer
    Direct,
}

/// Type-safe configuration key that associates a key name with its value type
#[derive(Debug, Clone, Copy)]
pub struct ConfigKey<T> {
    name: &'static str,
    _phantom: PhantomData<T>,
}

impl<T> ConfigKey<T> {
    const fn new(name: &'static str) -> Self {
        Self {
            name,
            _phantom: PhantomData,
        }
    }

    pub fn key_name(&self) -> &'static str {
        self.name
    }
}

// ===== App Configuration =====

/// Asset host endpoint overrides
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetHostEndpoints {
    pub upload_base: Option<String>,
    pub cdn_base: Option<String>,
}

/// App configuration (stored locally)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub materialization: MaterializationMode,
    /// Where downloaded models are written (default: platform data dir)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub asset_host: AssetHostEndpoints,
    /// Prediction service base URL override
    #[serde(default)]
    pub prediction_api: Option<String>,
}

impl ConfigKey<AppConfig> {
    pub const APP: Self = Self::new("appConfig");
}

impl AppConfig {
    /// Endpoints with overrides applied on top of the public services
    pub fn api_config(&self, credentials: Credentials) -> ApiConfig {
        let mut api = ApiConfig::with_defaults(credentials);

        if let Some(base) = non_empty(&self.asset_host.upload_base) {
            api.upload_base = base;
        }
        if let Some(base) = non_empty(&self.asset_host.cdn_base) {
            api.cdn_base = base;
        }
        if let Some(base) = non_empty(&self.prediction_api) {
            api.prediction_base = base;
        }

        api
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(default_output_dir)
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ===== Telemetry Configuration =====

/// Telemetry configuration (stored locally)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryConfig {
    /// Anonymous id attached to reported failures
    pub install_id: String,
    pub telemetry_enabled: bool,
}

impl ConfigKey<TelemetryConfig> {
    pub const TELEMETRY: Self = Self::new("telemetryConfig");
}

// ===== Default Locations =====

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join("config.json")
}

pub fn default_output_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
        .join("models")
}

/// Scratch space for downscaled uploads
pub fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(APP_DIR)
}

// ===== Type-Safe Config Store =====

pub trait ConfigStore {
    fn get<T: DeserializeOwned>(&self, key: &ConfigKey<T>) -> Option<T>;
    fn set<T: Serialize>(&self, key: &ConfigKey<T>, value: T) -> Result<(), String>;
    fn delete<T>(&self, key: &ConfigKey<T>) -> Result<(), String>;
}

pub fn load_app_config(store: &impl ConfigStore) -> AppConfig {
    store.get(&ConfigKey::APP).unwrap_or_default()
}

/// Config store backed by a single JSON object on disk
pub struct FileConfigStore {
    path: PathBuf,
    data: Mutex<HashMap<String, serde_json::Value>>,
}

impl FileConfigStore {
    /// Load `path`, starting empty if it does not exist or cannot be parsed
    pub fn open(path: PathBuf) -> Self {
        let data = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(data) => data,
                Err(e) => {
                    warn!("Ignoring malformed config {:?}: {}", path, e);
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!("Failed to read config {:?}: {}", path, e);
                HashMap::new()
            }
        };

        Self {
            path,
            data: Mutex::new(data),
        }
    }

    pub fn open_default() -> Self {
        let path = default_config_path();
        info!("Using config file {:?}", path);
        Self::open(path)
    }

    fn save(&self, data: &HashMap<String, serde_json::Value>) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let contents = serde_json::to_string_pretty(data).map_err(|e| e.to_string())?;
        std::fs::write(&self.path, contents).map_err(|e| e.to_string())
    }
}

impl ConfigStore for FileConfigStore {
    fn get<T: DeserializeOwned>(&self, key: &ConfigKey<T>) -> Option<T> {
        let data = self.data.lock().ok()?;
        data.get(key.key_name())
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    fn set<T: Serialize>(&self, key: &ConfigKey<T>, value: T) -> Result<(), String> {
        let val = serde_json::to_value(value).map_err(|e| e.to_string())?;
        let mut data = self.data.lock().map_err(|e| e.to_string())?;
        data.insert(key.key_name().to_string(), val);
        self.save(&data)
    }

    fn delete<T>(&self, key: &ConfigKey<T>) -> Result<(), String> {
        let mut data = self.data.lock().map_err(|e| e.to_string())?;
        data.remove(key.key_name());
        self.save(&data)
    }
}
