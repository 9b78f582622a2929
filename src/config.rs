//! Configuration: defaults, JSON config file, environment overrides

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIR: &str = "airline-heatmap-tui";
const DEFAULT_BASE_URL: &str = "http://localhost:9000";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub airline_id: Option<i64>,
    pub airline_name: Option<String>,
    pub rival_airline_id: Option<i64>,
    /// Unset means no timeout beyond the transport's own
    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            airline_id: None,
            airline_name: None,
            rival_airline_id: None,
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Load from the config file (if present), then apply env overrides
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path();
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// A missing file yields the defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `lookup` is `std::env::var` in production; tests pass a closure
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("AIRLINE_HEATMAP_URL").filter(|s| !s.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        if let Some(id) = parse_env(&lookup, "AIRLINE_HEATMAP_AIRLINE_ID")? {
            self.airline_id = Some(id);
        }
        if let Some(id) = parse_env(&lookup, "AIRLINE_HEATMAP_RIVAL_ID")? {
            self.rival_airline_id = Some(id);
        }
        if let Some(secs) = parse_env(&lookup, "AIRLINE_HEATMAP_TIMEOUT_SECS")? {
            self.request_timeout_secs = Some(secs);
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
    }

    pub fn airline_context(&self) -> AirlineContext {
        AirlineContext {
            active_airline: self.airline_id.map(|id| Airline {
                id,
                name: self
                    .airline_name
                    .clone()
                    .unwrap_or_else(|| format!("Airline {}", id)),
            }),
            rival_map_airline_id: self.rival_airline_id,
        }
    }
}

fn parse_env<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(v) if v.trim().is_empty() => Ok(None),
        Some(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Env { var, value: v }),
    }
}

fn config_path() -> PathBuf {
    let config_dir = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{}/.config", home)
    });
    PathBuf::from(config_dir).join(APP_DIR).join("config.json")
}

/// Directory for the log file
pub fn cache_dir() -> PathBuf {
    let cache_dir = std::env::var("XDG_CACHE_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        format!("{}/.cache", home)
    });
    PathBuf::from(cache_dir).join(APP_DIR)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Airline {
    pub id: i64,
    pub name: String,
}

/// Airline selection owned by the surrounding application
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AirlineContext {
    pub active_airline: Option<Airline>,
    pub rival_map_airline_id: Option<i64>,
}

impl AirlineContext {
    /// Rival map airline wins over the active airline
    pub fn resolve_airline_id(&self) -> Option<i64> {
        self.rival_map_airline_id
            .or_else(|| self.active_airline.as_ref().map(|a| a.id))
    }
}
