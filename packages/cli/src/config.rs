//! `climada_hdx.toml` configuration.
//!
//! Every field has a default, so a missing file or a partial file is
//! fine. Credentials are never read from here; `HDX_API_KEY` comes from
//! the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "climada_hdx.toml";

/// Errors loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Config path.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`Config`].
    #[error("Invalid config {path}: {message}")]
    Parse {
        /// Config path.
        path: String,
        /// Parser message.
        message: String,
    },
}

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root of the CSV output tree.
    pub output_dir: PathBuf,
    /// Directory holding the UNMAP boundary GeoJSON files.
    pub boundary_dir: PathBuf,
    /// Natural Earth admin1 GeoJSON used when UNMAP has no shapes.
    pub natural_earth_path: PathBuf,
    /// Root of the hazard/exposure exports read by the file source.
    pub source_dir: PathBuf,
    /// Flood event date table (`id,date` CSV). Needed for flood runs over
    /// countries with malformed upstream dates.
    pub flood_date_table: Option<PathBuf>,
    /// HDX site.
    pub hdx_url: String,
    /// Organisation that owns published datasets.
    pub hdx_owner_org: String,
    /// CLIMADA data API.
    pub climada_api_url: String,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Per-request timeout.
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            boundary_dir: PathBuf::from("boundaries"),
            natural_earth_path: PathBuf::from("boundaries/ne_10m_admin_1_states_provinces.geojson"),
            source_dir: PathBuf::from("climada-data"),
            flood_date_table: None,
            hdx_url: climada_hdx_publish::hdx::DEFAULT_HDX_URL.to_string(),
            hdx_owner_org: "climada".to_string(),
            climada_api_url: climada_hdx_source::climada::DEFAULT_API_URL.to_string(),
            user_agent: format!("climada-hdx/{}", env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 120,
        }
    }
}

impl Config {
    /// Parses a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the text is not valid.
    pub fn from_toml(text: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::de::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })
    }

    /// Loads `path`, or the default config file if it exists, or the
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicitly given file cannot be read,
    /// or any file found is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !explicit && !path.is_file() {
            log::debug!("No {DEFAULT_CONFIG_FILE}, using defaults");
            return Ok(Self::default());
        }

        let origin = path.display().to_string();
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: origin.clone(),
            source,
        })?;
        let config = Self::from_toml(&text, &origin)?;
        log::info!("Loaded config from {origin}");
        Ok(config)
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
