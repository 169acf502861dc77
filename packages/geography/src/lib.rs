#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Admin boundary providers.
//!
//! Region shapes come from the OCHA/UNMAP admin boundary `GeoJSON` files
//! published on HDX, falling back to Natural Earth for countries the UNMAP
//! files do not cover. Providers are tried in order by a [`ProviderChain`];
//! [`best_admin_regions`] prefers admin2 shapes and falls back to admin1.

pub mod chain;
pub mod download;
pub mod natural_earth;
pub mod shapes;
pub mod unmap;

use climada_hdx_geography_models::{AdminLevel, AdminRegions};
use thiserror::Error;

pub use chain::{ProviderChain, best_admin_regions};

/// Errors that can occur during geography operations.
#[derive(Debug, Error)]
pub enum GeoError {
    /// Reading a boundary file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `GeoJSON` parsing failed.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// Catalogue request failed.
    #[error("Catalogue error: {0}")]
    Source(#[from] climada_hdx_source::SourceError),

    /// The provider has no shapes for this country and level.
    #[error("No admin{level} boundaries for {iso3}")]
    NotFound {
        /// Country code requested.
        iso3: String,
        /// Level requested.
        level: AdminLevel,
    },

    /// Data conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

impl GeoError {
    /// Whether the next provider in a chain should be tried.
    #[must_use]
    pub fn is_lookup_miss(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// Supplier of named admin region shapes for a country.
pub trait BoundaryProvider: Send + Sync {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Ordered regions of `iso3` at `level`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::NotFound`] when the provider has nothing for the
    /// country or level, or another [`GeoError`] if reading fails.
    fn regions(&self, iso3: &str, level: AdminLevel) -> Result<AdminRegions, GeoError>;
}
