//! `~/.diligence/config.toml` loading.
//!
//! Every section and key is optional. A missing file is not an error; the
//! caller falls back to built-in defaults.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use diligence_cost::{ActivityCatalog, AnchorCatalog, CatalogError, CostAnchor};
use diligence_types::{CostRange, UnitKind};
use serde::Deserialize;
use thiserror::Error;

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "DILIGENCE_CONFIG";

const DEFAULT_SNAPSHOT: &str = "analysis.json";

#[derive(Debug, Default, Deserialize)]
pub struct DiligenceConfig {
    pub store: Option<StoreConfig>,
    pub cost: Option<CostConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    /// Snapshot file read and written by the CLI.
    pub snapshot_path: Option<PathBuf>,
    /// Hex characters in finding identifiers (8..=64).
    pub id_hash_len: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CostConfig {
    pub default_scale_factor: Option<f64>,
    pub top_drivers: Option<usize>,
    /// Extra anchors, or replacements for built-in ones with the same key.
    #[serde(default)]
    pub anchors: Vec<AnchorConfig>,
    #[serde(default)]
    pub industry_factors: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnchorConfig {
    pub key: String,
    #[serde(default)]
    pub name: String,
    pub unit: UnitKind,
    /// tier name → `[low, high]`
    pub tiers: BTreeMap<String, [f64; 2]>,
}

impl AnchorConfig {
    pub fn to_anchor(&self) -> Result<CostAnchor, CatalogError> {
        let tiers = self
            .tiers
            .iter()
            .map(|(tier, [low, high])| (tier.clone(), CostRange::new(*low, *high)))
            .collect();
        CostAnchor::new(self.key.clone(), self.name.clone(), self.unit, tiers)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
}

impl DiligenceConfig {
    /// Load from [`config_path`]. `Ok(None)` when there is no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to read config");
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to parse config");
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.store
            .as_ref()
            .and_then(|store| store.snapshot_path.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT))
    }

    #[must_use]
    pub fn id_hash_len(&self) -> Option<usize> {
        self.store.as_ref().and_then(|store| store.id_hash_len)
    }

    #[must_use]
    pub fn default_scale_factor(&self) -> Option<f64> {
        self.cost.as_ref().and_then(|cost| cost.default_scale_factor)
    }

    #[must_use]
    pub fn top_drivers(&self) -> Option<usize> {
        self.cost.as_ref().and_then(|cost| cost.top_drivers)
    }

    #[must_use]
    pub fn log_filter(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|logging| logging.filter.as_deref())
    }

    /// Configured anchors, validated. One bad anchor fails the lot.
    pub fn anchor_overrides(&self) -> Result<Vec<CostAnchor>, CatalogError> {
        self.cost
            .iter()
            .flat_map(|cost| &cost.anchors)
            .map(AnchorConfig::to_anchor)
            .collect()
    }

    /// Built-in anchors with the configured overrides applied.
    pub fn anchor_catalog(&self) -> Result<AnchorCatalog, CatalogError> {
        Ok(AnchorCatalog::builtin().with_overrides(self.anchor_overrides()?))
    }

    /// Built-in activities with the configured industry factors applied.
    #[must_use]
    pub fn activity_catalog(&self) -> ActivityCatalog {
        let factors = self
            .cost
            .as_ref()
            .map(|cost| cost.industry_factors.clone())
            .unwrap_or_default();
        ActivityCatalog::builtin().with_industry_factors(factors)
    }
}

/// `$DILIGENCE_CONFIG` if set and non-empty, else `~/.diligence/config.toml`.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    match env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => dirs::home_dir().map(|home| home.join(".diligence").join("config.toml")),
    }
}
